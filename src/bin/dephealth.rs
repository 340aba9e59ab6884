//! CLI for scanning project dependencies against the DepHealth API

use clap::{Parser, Subcommand};
use colored::*;
use dephealth_client::{
    read_manifest, DepHealthClient, DepHealthConfig, Ecosystem, RiskLevel, ScanOutcome, Scanner,
    CancellationToken,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::process;
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "dephealth")]
#[command(about = "Check the health of your project's dependencies", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to custom configuration file (TOML)
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// API key (overrides config and DEPHEALTH_API_KEY)
    #[arg(long, env = "DEPHEALTH_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// API base URL
    #[arg(long)]
    api_url: Option<String>,

    /// Enable verbose logging
    #[arg(short = 'v', long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a package.json and report risky dependencies
    Scan {
        /// Path to package.json or the directory containing it
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Include devDependencies
        #[arg(long)]
        include_dev: bool,

        /// Exit non-zero if any package is at or above this risk level
        #[arg(long)]
        fail_on: Option<RiskLevel>,

        /// Output format
        #[arg(short = 'f', long, default_value = "text")]
        format: OutputFormat,
    },

    /// Look up a single package
    Package {
        /// Package name, e.g. lodash or @types/node
        name: String,

        #[arg(short = 'e', long, default_value = "npm")]
        ecosystem: Ecosystem,
    },

    /// Show API usage for the current key
    Usage,

    /// Check that the API is reachable
    Health,
}

#[derive(Clone, Debug)]
enum OutputFormat {
    Json,
    Text,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "text" => Ok(OutputFormat::Text),
            _ => Err(format!("Unknown format: {}", s)),
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let config = match load_config(&cli) {
        Ok(cfg) => cfg,
        Err(e) => fail(&format!("Failed to load config: {}", e)),
    };

    let code = match cli.command {
        Commands::Scan {
            path,
            include_dev,
            fail_on,
            format,
        } => run_scan(&config, &path, include_dev || config.scan.include_dev, fail_on, format).await,
        Commands::Package { name, ecosystem } => run_package(&config, &name, ecosystem).await,
        Commands::Usage => run_usage(&config).await,
        Commands::Health => run_health(&config).await,
    };

    process::exit(code);
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(cli: &Cli) -> anyhow::Result<DepHealthConfig> {
    let mut config = match &cli.config {
        Some(path) => DepHealthConfig::from_file(path)?,
        None => DepHealthConfig::default(),
    };

    if let Some(key) = &cli.api_key {
        config.network.api_key = Some(key.clone());
    }
    if let Some(url) = &cli.api_url {
        config.network.base_url = url.clone();
    }

    config.validate()?;
    Ok(config)
}

fn fail(message: &str) -> ! {
    eprintln!("{} {}", "Error:".red().bold(), message);
    process::exit(1);
}

fn client(config: &DepHealthConfig) -> DepHealthClient {
    DepHealthClient::new(&config.network).unwrap_or_else(|e| fail(&e.to_string()))
}

async fn run_scan(
    config: &DepHealthConfig,
    path: &Path,
    include_dev: bool,
    fail_on: Option<RiskLevel>,
    format: OutputFormat,
) -> i32 {
    let manifest = read_manifest(path, include_dev).unwrap_or_else(|e| fail(&e.to_string()));

    let token = CancellationToken::new();
    let on_ctrl_c = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping after the current chunk");
            on_ctrl_c.cancel();
        }
    });

    let scanner = Scanner::new(client(config), config.scan.clone())
        .unwrap_or_else(|e| fail(&e.to_string()))
        .with_cancellation(token);

    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(format!(
        "Scanning {} dependencies from {}...",
        manifest.dependencies.len(),
        manifest.format
    ));
    spinner.enable_steady_tick(std::time::Duration::from_millis(100));

    let result = scanner
        .scan_with_stats(&manifest.dependencies, manifest.ecosystem, include_dev)
        .await;

    spinner.finish_and_clear();

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) => fail(&format!("Scan failed: {}", e)),
    };

    match format {
        OutputFormat::Json => match serde_json::to_string_pretty(&outcome.result) {
            Ok(json) => println!("{}", json),
            Err(e) => fail(&format!("Failed to serialize report: {}", e)),
        },
        OutputFormat::Text => display_summary(&outcome),
    }

    if let Some(threshold) = fail_on {
        let failing = outcome.result.count_at_least(threshold);
        if failing > 0 {
            eprintln!(
                "\n{} {} package(s) at or above {}",
                "Failed:".red().bold(),
                failing,
                threshold
            );
            return 1;
        }
    }

    0
}

fn display_summary(outcome: &ScanOutcome) {
    let result = &outcome.result;

    println!("\n{}", "=== Dependency Health ===".bold());
    println!("Packages scored: {}", result.total);
    println!();
    println!("  {} {}", "●".red(), format!("Critical: {}", result.critical).red());
    println!(
        "  {} {}",
        "●".truecolor(255, 165, 0),
        format!("High: {}", result.high).truecolor(255, 165, 0)
    );
    println!("  {} {}", "●".yellow(), format!("Medium: {}", result.medium).yellow());
    println!("  {} {}", "●".green(), format!("Low: {}", result.low).green());

    if let Some(quality) = &result.data_quality {
        println!();
        println!(
            "Data quality: {} verified, {} partial, {} unverified",
            quality.verified, quality.partial, quality.unverified
        );
    }
    if let (Some(verified), Some(unverified)) =
        (result.verified_risk_count, result.unverified_risk_count)
    {
        println!(
            "High/critical risk: {} verified, {} unverified",
            verified, unverified
        );
    }

    let elevated: Vec<_> = result.elevated().collect();
    if !elevated.is_empty() {
        println!("\n{}", "Packages needing attention:".bold());
        for pkg in elevated {
            let level = match pkg.risk_level {
                Some(RiskLevel::Critical) => pkg.risk_label().red(),
                _ => pkg.risk_label().truecolor(255, 165, 0),
            };
            let score = pkg
                .health_score
                .map(|s| format!("{:.0}", s))
                .unwrap_or_else(|| "-".to_string());
            println!("  - {} [{}] score {}", pkg.package.bold(), level, score);
            if let Some(risk) = &pkg.abandonment_risk {
                for factor in &risk.risk_factors {
                    println!("      {}", factor.yellow());
                }
            }
        }
    }

    if let Some(missing) = result.not_found.as_ref().filter(|m| !m.is_empty()) {
        println!("\nNot found ({}): {}", missing.len(), missing.join(", "));
    }

    if !outcome.stats.unscored.is_empty() {
        println!(
            "\nNot scored yet ({}): {}",
            outcome.stats.unscored.len(),
            outcome.stats.unscored.join(", ")
        );
    }

    if !outcome.stats.is_complete() {
        eprintln!(
            "\n{} {} of {} requests failed; the report is incomplete",
            "Warning:".yellow().bold(),
            outcome.stats.failed_chunks,
            outcome.stats.chunks
        );
    }
}

async fn run_package(config: &DepHealthConfig, name: &str, ecosystem: Ecosystem) -> i32 {
    let detail = match client(config).get_package(ecosystem, name).await {
        Ok(detail) => detail,
        Err(e) => fail(&format!("Lookup failed: {}", e)),
    };
    let pkg = &detail.health;

    print!("{} ({})", pkg.package.bold(), ecosystem);
    if let Some(version) = &detail.latest_version {
        print!(" {}", version);
    }
    println!();
    if let Some(score) = pkg.health_score {
        println!("  Health score: {:.1}", score);
    }
    println!("  Risk level: {}", pkg.risk_label());
    println!("  Data quality: {:?}", pkg.data_quality());
    if let Some(confidence) = &detail.confidence {
        if let Some(level) = &confidence.level {
            println!("  Confidence: {}", level);
        }
    }
    if pkg.is_deprecated {
        println!("  {}", "Deprecated".red());
    }
    if pkg.archived {
        println!("  {}", "Repository archived".red());
    }
    if let Some(url) = &detail.repository_url {
        println!("  Repository: {}", url);
    }

    if let Some(signals) = &detail.signals {
        println!("\n{}", "Signals:".bold());
        let rows = [
            ("Weekly downloads", signals.weekly_downloads),
            ("Dependents", signals.dependents_count),
            ("Stars", signals.stars),
            ("Days since last commit", signals.days_since_last_commit),
            ("Commits (90d)", signals.commits_90d),
            ("Active contributors (90d)", signals.active_contributors_90d),
            ("Maintainers", signals.maintainer_count),
        ];
        for (label, value) in rows {
            if let Some(value) = value {
                println!("  {}: {}", label, value);
            }
        }
        if let Some(score) = signals.openssf_score {
            println!("  OpenSSF score: {:.1}", score);
        }
    }

    if let Some(risk) = &pkg.abandonment_risk {
        for factor in &risk.risk_factors {
            println!("  {}", factor.yellow());
        }
    }

    if !detail.advisories.is_empty() {
        println!("\n{} ({})", "Advisories".red().bold(), detail.advisories.len());
        for advisory in &detail.advisories {
            println!(
                "  - [{}] {} {}",
                advisory.severity.as_deref().unwrap_or("UNKNOWN"),
                advisory.id.as_deref().unwrap_or("-"),
                advisory.summary.as_deref().unwrap_or("")
            );
        }
    }
    0
}

async fn run_usage(config: &DepHealthConfig) -> i32 {
    let usage = match client(config).usage().await {
        Ok(usage) => usage,
        Err(e) => fail(&format!("Usage lookup failed: {}", e)),
    };

    println!("Tier: {}", usage.tier.cyan());
    println!(
        "Requests: {} / {} ({:.1}%)",
        usage.usage.requests_this_month, usage.usage.monthly_limit, usage.usage.usage_percentage
    );
    println!("Resets: {}", usage.reset.date);
    if let Some(alert) = usage.alert() {
        println!("{} {}", format!("[{}]", alert.level).yellow().bold(), alert.message);
    }
    0
}

async fn run_health(config: &DepHealthConfig) -> i32 {
    match client(config).health().await {
        Ok(health) => {
            println!(
                "{} {} {}",
                "API:".bold(),
                health.status.green(),
                health.version.unwrap_or_default()
            );
            0
        }
        Err(e) => fail(&format!("API unreachable: {}", e)),
    }
}
