//! Folding of per-chunk scan results into one report

use crate::types::{DataQuality, DataQualitySummary, Ecosystem, PackageHealth, RiskLevel, ScanResult};

/// Accumulates chunk results in submission order
#[derive(Debug, Default)]
pub struct Aggregator {
    packages: Vec<PackageHealth>,
    unscored: Vec<String>,
    not_found: Vec<String>,
    saw_not_found: bool,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Absorb one chunk. Its subtotal fields are ignored and packages
    /// without a risk level are set aside.
    pub fn push(&mut self, chunk: ScanResult) {
        for pkg in chunk.packages {
            if pkg.is_scored() {
                self.packages.push(pkg);
            } else {
                self.unscored.push(pkg.package);
            }
        }
        if let Some(names) = chunk.not_found {
            self.saw_not_found = true;
            self.not_found.extend(names);
        }
    }

    pub fn package_count(&self) -> usize {
        self.packages.len()
    }

    /// Names of packages that came back without a risk level
    pub fn unscored(&self) -> &[String] {
        &self.unscored
    }

    /// Build the final report, recomputing every count from the packages
    pub fn finish(self, ecosystem: Ecosystem) -> ScanResult {
        let mut result = summarize(self.packages);
        result.not_found = self.saw_not_found.then_some(self.not_found);
        result.ecosystem = Some(ecosystem);
        result
    }
}

/// Compute severity, data-quality and risk-split counts for a package list.
/// Packages without a risk level are dropped from the report.
pub fn summarize(packages: Vec<PackageHealth>) -> ScanResult {
    let packages: Vec<PackageHealth> = packages.into_iter().filter(|p| p.is_scored()).collect();
    let mut critical = 0;
    let mut high = 0;
    let mut medium = 0;
    let mut low = 0;
    let mut quality = DataQualitySummary::default();
    let mut verified_risk = 0;
    let mut unverified_risk = 0;

    for pkg in &packages {
        match pkg.risk_level {
            Some(RiskLevel::Critical) => critical += 1,
            Some(RiskLevel::High) => high += 1,
            Some(RiskLevel::Medium) => medium += 1,
            Some(RiskLevel::Low) => low += 1,
            None => continue,
        }

        let assessment = pkg.data_quality();
        match assessment {
            DataQuality::Verified => quality.verified += 1,
            DataQuality::Partial => quality.partial += 1,
            DataQuality::Unverified => quality.unverified += 1,
        }

        if pkg.is_elevated() {
            if assessment == DataQuality::Verified {
                verified_risk += 1;
            } else {
                unverified_risk += 1;
            }
        }
    }

    ScanResult {
        total: packages.len(),
        critical,
        high,
        medium,
        low,
        packages,
        not_found: None,
        data_quality: Some(quality),
        verified_risk_count: Some(verified_risk),
        unverified_risk_count: Some(unverified_risk),
        ecosystem: None,
    }
}
