//! Normative reference table
//!
//! Holds the (age band, gender, metric) strata that observed values are ranked against. The
//! built-in table reproduces Voss et al. (2015), 1,906 healthy subjects of the KORA S4 study
//! (782 females, 1,124 males). A replacement table can be loaded from TOML; it goes through the
//! same validation as the built-in one.
//!
//! Reference: Voss A, Schroeder R, Heitmann A, Peters A, Perz S (2015) Short-Term Heart Rate
//! Variability—Influence of Gender and Age in Healthy Subjects. PLoS ONE 10(3): e0118308.
//! https://doi.org/10.1371/journal.pone.0118308

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::error::{HrvError, Result};
use crate::models::{Gender, HrvMetric, NormativeStratum};

const VOSS_2015_SOURCE: &str = "Voss et al. (2015), KORA S4, PLoS ONE 10(3): e0118308";

/// One age/gender group of the published table: (mean, sd) for sdNN, RMSSD and HF plus n
struct PublishedGroup {
    gender: Gender,
    age_low: u32,
    age_high: u32,
    sample_size: u32,
    sdnn: (f64, f64),
    rmssd: (f64, f64),
    hf: (f64, f64),
}

#[rustfmt::skip]
const VOSS_2015: [PublishedGroup; 10] = [
    PublishedGroup { gender: Gender::Female, age_low: 25, age_high: 34, sample_size: 208, sdnn: (45.4, 18.0), rmssd: (36.1, 18.4), hf: (161.0, 167.0) },
    PublishedGroup { gender: Gender::Female, age_low: 35, age_high: 44, sample_size: 259, sdnn: (42.1, 16.8), rmssd: (30.7, 15.1), hf: (121.0, 145.0) },
    PublishedGroup { gender: Gender::Female, age_low: 45, age_high: 54, sample_size: 158, sdnn: (36.6, 14.7), rmssd: (24.5, 12.3), hf: (62.0, 83.0) },
    PublishedGroup { gender: Gender::Female, age_low: 55, age_high: 64, sample_size: 95, sdnn: (32.2, 13.5), rmssd: (20.3, 10.8), hf: (35.0, 53.0) },
    PublishedGroup { gender: Gender::Female, age_low: 65, age_high: 74, sample_size: 62, sdnn: (31.6, 13.6), rmssd: (19.4, 10.1), hf: (29.0, 38.0) },
    PublishedGroup { gender: Gender::Male, age_low: 25, age_high: 34, sample_size: 330, sdnn: (49.9, 19.8), rmssd: (36.2, 18.1), hf: (133.0, 174.0) },
    PublishedGroup { gender: Gender::Male, age_low: 35, age_high: 44, sample_size: 292, sdnn: (44.8, 18.1), rmssd: (30.6, 15.4), hf: (89.0, 118.0) },
    PublishedGroup { gender: Gender::Male, age_low: 45, age_high: 54, sample_size: 235, sdnn: (41.3, 17.6), rmssd: (26.8, 13.7), hf: (41.0, 49.0) },
    PublishedGroup { gender: Gender::Male, age_low: 55, age_high: 64, sample_size: 183, sdnn: (38.3, 17.0), rmssd: (23.4, 12.0), hf: (29.0, 38.0) },
    PublishedGroup { gender: Gender::Male, age_low: 65, age_high: 74, sample_size: 84, sdnn: (34.9, 15.9), rmssd: (21.1, 11.0), hf: (22.0, 29.0) },
];

/// On-disk layout of a normative table
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TableDocument {
    #[serde(default)]
    source: String,
    strata: Vec<NormativeStratum>,
}

/// Immutable set of reference strata, built once and shared by reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TableDocument", into = "TableDocument")]
pub struct NormativeTable {
    source: String,
    strata: Vec<NormativeStratum>,
    min_age: u32,
    max_age: u32,
}

impl TryFrom<TableDocument> for NormativeTable {
    type Error = HrvError;

    fn try_from(doc: TableDocument) -> Result<Self> {
        NormativeTable::from_strata(doc.source, doc.strata)
    }
}

impl From<NormativeTable> for TableDocument {
    fn from(table: NormativeTable) -> Self {
        TableDocument {
            source: table.source,
            strata: table.strata,
        }
    }
}

impl Default for NormativeTable {
    fn default() -> Self {
        Self::voss_2015()
    }
}

impl NormativeTable {
    /// Built-in table from the KORA S4 cohort
    pub fn voss_2015() -> Self {
        let strata: Vec<NormativeStratum> = VOSS_2015
            .iter()
            .flat_map(|group| {
                [
                    (HrvMetric::SdNn, group.sdnn),
                    (HrvMetric::Rmssd, group.rmssd),
                    (HrvMetric::Hf, group.hf),
                ]
                .into_iter()
                .map(move |(metric, (mean, sd))| {
                    NormativeStratum::new(
                        group.age_low,
                        group.age_high,
                        group.gender,
                        metric,
                        mean,
                        sd,
                        group.sample_size,
                    )
                })
            })
            .collect();

        Self {
            source: VOSS_2015_SOURCE.to_string(),
            strata,
            min_age: 25,
            max_age: 74,
        }
    }

    /// Build a table from arbitrary strata, validating their shape
    ///
    /// Bands for the same gender and metric must not overlap, every band must have
    /// `age_low <= age_high`, a finite mean and at least one subject. Standard deviations are
    /// not checked here: a degenerate stratum is reported when it is used.
    pub fn from_strata(source: impl Into<String>, strata: Vec<NormativeStratum>) -> Result<Self> {
        if strata.is_empty() {
            return Err(HrvError::InvalidTable("table has no strata".to_string()));
        }

        for (i, stratum) in strata.iter().enumerate() {
            if stratum.age_low > stratum.age_high {
                return Err(HrvError::InvalidTable(format!(
                    "age band {} is empty",
                    stratum.age_band()
                )));
            }
            if stratum.sample_size == 0 {
                return Err(HrvError::InvalidTable(format!(
                    "{} {} {} has a sample size of zero",
                    stratum.gender,
                    stratum.age_band(),
                    stratum.metric
                )));
            }
            if !stratum.mean.is_finite() {
                return Err(HrvError::InvalidTable(format!(
                    "{} {} {} has a non-finite mean",
                    stratum.gender,
                    stratum.age_band(),
                    stratum.metric
                )));
            }

            let overlap = strata[..i].iter().find(|other| {
                other.gender == stratum.gender
                    && other.metric == stratum.metric
                    && other.age_low <= stratum.age_high
                    && stratum.age_low <= other.age_high
            });
            if let Some(other) = overlap {
                return Err(HrvError::InvalidTable(format!(
                    "{} {} bands {} and {} overlap",
                    stratum.gender,
                    stratum.metric,
                    other.age_band(),
                    stratum.age_band()
                )));
            }
        }

        let min_age = strata.iter().map(|s| s.age_low).min().unwrap_or(0);
        let max_age = strata.iter().map(|s| s.age_high).max().unwrap_or(0);

        Ok(Self {
            source: source.into(),
            strata,
            min_age,
            max_age,
        })
    }

    /// Parse a table from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| HrvError::InvalidTable(e.to_string()))
    }

    /// Load a table from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(&path).with_context(|| {
            format!("Failed to read normative table: {}", path.as_ref().display())
        })?;

        let table = Self::from_toml_str(&content).with_context(|| {
            format!("Failed to parse normative table: {}", path.as_ref().display())
        })?;

        debug!(
            path = %path.as_ref().display(),
            strata = table.len(),
            "Loaded normative table"
        );
        Ok(table)
    }

    /// Serialize the table to TOML
    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize normative table to TOML")
    }

    /// Citation or description of where the numbers come from
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Youngest and oldest covered age (inclusive)
    pub fn age_range(&self) -> (u32, u32) {
        (self.min_age, self.max_age)
    }

    pub fn strata(&self) -> &[NormativeStratum] {
        &self.strata
    }

    pub fn len(&self) -> usize {
        self.strata.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strata.is_empty()
    }

    /// Look up the stratum for raw user input
    ///
    /// Age is checked first, then gender, then metric. Gender and metric are matched
    /// case-insensitively.
    pub fn find_stratum(&self, age: u32, gender: &str, metric: &str) -> Result<&NormativeStratum> {
        self.check_age(age)?;
        let gender: Gender = gender.parse()?;
        let metric: HrvMetric = metric.parse()?;
        self.find(age, gender, metric)
    }

    /// Look up the stratum for already-parsed input
    pub fn find(&self, age: u32, gender: Gender, metric: HrvMetric) -> Result<&NormativeStratum> {
        self.check_age(age)?;

        let stratum = self
            .strata
            .iter()
            .find(|s| s.gender == gender && s.metric == metric && s.contains_age(age))
            .ok_or_else(|| HrvError::StratumNotFound {
                age,
                gender: gender.to_string(),
                metric: metric.to_string(),
            })?;

        debug!(
            age,
            %gender,
            %metric,
            band = %stratum.age_band(),
            n = stratum.sample_size,
            "Matched normative stratum"
        );
        Ok(stratum)
    }

    fn check_age(&self, age: u32) -> Result<()> {
        if age < self.min_age || age > self.max_age {
            return Err(HrvError::OutOfRange {
                age,
                min: self.min_age,
                max: self.max_age,
            });
        }
        Ok(())
    }
}
