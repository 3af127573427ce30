use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::HrvError;

/// Smallest sample size rated as high reliability
pub const HIGH_RELIABILITY_MIN_N: u32 = 150;

/// Smallest sample size rated as moderate reliability
pub const MODERATE_RELIABILITY_MIN_N: u32 = 50;

/// Gender strata available in the reference cohort
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub const ALL: [Gender; 2] = [Gender::Female, Gender::Male];

    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gender {
    type Err = HrvError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            _ => Err(HrvError::InvalidGender { input: s.to_string() }),
        }
    }
}

/// Short-term HRV metrics with published norms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HrvMetric {
    /// Standard deviation of normal-to-normal intervals (ms)
    #[serde(rename = "sdNN", alias = "sdnn", alias = "SDNN")]
    SdNn,
    /// Root mean square of successive differences (ms)
    #[serde(rename = "RMSSD", alias = "rmssd")]
    Rmssd,
    /// High-frequency spectral power, 0.15-0.4 Hz (ms²)
    #[serde(rename = "HF", alias = "hf")]
    Hf,
}

impl HrvMetric {
    pub const ALL: [HrvMetric; 3] = [HrvMetric::SdNn, HrvMetric::Rmssd, HrvMetric::Hf];

    /// Canonical spelling used in the source paper
    pub fn as_str(&self) -> &'static str {
        match self {
            HrvMetric::SdNn => "sdNN",
            HrvMetric::Rmssd => "RMSSD",
            HrvMetric::Hf => "HF",
        }
    }

    /// Physiological floor applied to the lower end of a normative range
    ///
    /// A normal model puts the 5th percentile below zero for the skewed metrics, which is
    /// meaningless for a measured HRV value.
    pub fn range_floor(&self) -> f64 {
        match self {
            HrvMetric::SdNn => 0.1,
            HrvMetric::Rmssd => 1.0,
            HrvMetric::Hf => 5.0,
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            HrvMetric::SdNn | HrvMetric::Rmssd => "ms",
            HrvMetric::Hf => "ms²",
        }
    }
}

impl fmt::Display for HrvMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HrvMetric {
    type Err = HrvError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sdnn" => Ok(HrvMetric::SdNn),
            "rmssd" => Ok(HrvMetric::Rmssd),
            "hf" => Ok(HrvMetric::Hf),
            _ => Err(HrvError::UnknownMetric { input: s.to_string() }),
        }
    }
}

/// Reference group for one (age band, gender, metric) combination
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormativeStratum {
    /// Lowest age in the band (inclusive)
    pub age_low: u32,

    /// Highest age in the band (inclusive)
    pub age_high: u32,

    pub gender: Gender,

    pub metric: HrvMetric,

    /// Sample mean of the metric
    pub mean: f64,

    /// Sample standard deviation of the metric
    pub standard_deviation: f64,

    /// Number of subjects in the age/gender group
    pub sample_size: u32,
}

impl NormativeStratum {
    pub fn new(
        age_low: u32,
        age_high: u32,
        gender: Gender,
        metric: HrvMetric,
        mean: f64,
        standard_deviation: f64,
        sample_size: u32,
    ) -> Self {
        Self {
            age_low,
            age_high,
            gender,
            metric,
            mean,
            standard_deviation,
            sample_size,
        }
    }

    pub fn contains_age(&self, age: u32) -> bool {
        (self.age_low..=self.age_high).contains(&age)
    }

    /// Age band label such as "25-34"
    pub fn age_band(&self) -> String {
        format!("{}-{}", self.age_low, self.age_high)
    }
}

/// Confidence rating derived from the size of the reference group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Reliability {
    High,
    Moderate,
    Low,
}

impl Reliability {
    pub fn from_sample_size(sample_size: u32) -> Self {
        if sample_size >= HIGH_RELIABILITY_MIN_N {
            Reliability::High
        } else if sample_size >= MODERATE_RELIABILITY_MIN_N {
            Reliability::Moderate
        } else {
            Reliability::Low
        }
    }
}

impl fmt::Display for Reliability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reliability::High => write!(f, "High"),
            Reliability::Moderate => write!(f, "Moderate"),
            Reliability::Low => write!(f, "Low"),
        }
    }
}

/// Percentile ranking of one observed value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PercentileResult {
    /// Point estimate in [0, 100]
    pub percentile: f64,

    /// Lower bound of the 95% confidence interval
    pub ci_lower: f64,

    /// Upper bound of the 95% confidence interval
    pub ci_upper: f64,

    /// Sample size of the matched stratum
    pub sample_size: u32,

    pub reliability: Reliability,
}

/// Metric values bounding a central percentile range of the reference group
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormativeRange {
    pub lower_percentile: f64,
    pub upper_percentile: f64,
    pub lower_value: f64,
    pub upper_value: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gender_parsing_is_case_insensitive() {
        assert_eq!("MALE".parse::<Gender>().unwrap(), Gender::Male);
        assert_eq!(" Female ".parse::<Gender>().unwrap(), Gender::Female);
        assert!(matches!(
            "other".parse::<Gender>(),
            Err(HrvError::InvalidGender { .. })
        ));
    }

    #[test]
    fn test_metric_parsing_is_case_insensitive() {
        assert_eq!("sdnn".parse::<HrvMetric>().unwrap(), HrvMetric::SdNn);
        assert_eq!("SDNN".parse::<HrvMetric>().unwrap(), HrvMetric::SdNn);
        assert_eq!("rmssd".parse::<HrvMetric>().unwrap(), HrvMetric::Rmssd);
        assert_eq!("Hf".parse::<HrvMetric>().unwrap(), HrvMetric::Hf);
        assert!(matches!(
            "LF".parse::<HrvMetric>(),
            Err(HrvError::UnknownMetric { .. })
        ));
    }

    #[test]
    fn test_metric_display_uses_paper_spelling() {
        assert_eq!(HrvMetric::SdNn.to_string(), "sdNN");
        assert_eq!(HrvMetric::Rmssd.to_string(), "RMSSD");
        assert_eq!(HrvMetric::Hf.to_string(), "HF");
    }

    #[test]
    fn test_reliability_thresholds() {
        assert_eq!(Reliability::from_sample_size(330), Reliability::High);
        assert_eq!(Reliability::from_sample_size(150), Reliability::High);
        assert_eq!(Reliability::from_sample_size(149), Reliability::Moderate);
        assert_eq!(Reliability::from_sample_size(95), Reliability::Moderate);
        assert_eq!(Reliability::from_sample_size(50), Reliability::Moderate);
        assert_eq!(Reliability::from_sample_size(49), Reliability::Low);
        assert_eq!(Reliability::from_sample_size(2), Reliability::Low);
    }

    #[test]
    fn test_stratum_age_band() {
        let stratum = NormativeStratum::new(25, 34, Gender::Male, HrvMetric::SdNn, 49.9, 19.8, 330);
        assert!(stratum.contains_age(25));
        assert!(stratum.contains_age(34));
        assert!(!stratum.contains_age(35));
        assert_eq!(stratum.age_band(), "25-34");
    }
}
