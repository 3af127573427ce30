//! Percentile estimation against a normative stratum
//!
//! A value is standardised against the stratum mean and standard deviation and mapped through
//! the standard normal CDF. The 95% interval reflects how uncertain the stratum mean itself is:
//! the mean is shifted by ± t·SE (t with n − 1 degrees of freedom) and the value is ranked
//! against both shifted means.

use serde::Serialize;
use tracing::debug;

use crate::error::{HrvError, Result};
use crate::models::{
    Gender, HrvMetric, NormativeRange, NormativeStratum, PercentileResult, Reliability,
};
use crate::norms::NormativeTable;
use crate::stats::{self, CONFIDENCE_LEVEL};

/// A ranked observation together with the stratum it was ranked against
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Ranking {
    pub age: u32,
    pub gender: Gender,
    pub metric: HrvMetric,
    pub value: f64,
    pub stratum: NormativeStratum,
    pub result: PercentileResult,
}

/// Ranks observed HRV values against a normative table
#[derive(Debug, Clone, Copy)]
pub struct PercentileEstimator<'a> {
    table: &'a NormativeTable,
}

impl<'a> PercentileEstimator<'a> {
    pub fn new(table: &'a NormativeTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &'a NormativeTable {
        self.table
    }

    /// Look up the stratum for the subject and rank `value` against it
    pub fn rank(&self, age: u32, gender: &str, metric: &str, value: f64) -> Result<Ranking> {
        let stratum = *self.table.find_stratum(age, gender, metric)?;
        let result = Self::estimate_percentile(value, &stratum)?;

        Ok(Ranking {
            age,
            gender: stratum.gender,
            metric: stratum.metric,
            value,
            stratum,
            result,
        })
    }

    /// Percentile of `value` within `stratum`, with a 95% confidence interval
    pub fn estimate_percentile(value: f64, stratum: &NormativeStratum) -> Result<PercentileResult> {
        if !value.is_finite() {
            return Err(HrvError::InvalidValue { value });
        }
        let sd = checked_standard_deviation(stratum)?;

        let z = (value - stratum.mean) / sd;
        let percentile = stats::normal_cdf(z)? * 100.0;

        if stratum.sample_size < 2 {
            return Err(HrvError::InsufficientSample {
                sample_size: stratum.sample_size,
            });
        }
        let n = f64::from(stratum.sample_size);
        let standard_error = sd / n.sqrt();
        let t_crit = stats::t_critical(CONFIDENCE_LEVEL, stratum.sample_size - 1)?;
        let margin = t_crit * standard_error;

        // A higher population mean ranks the value lower, and vice versa
        let z_low = (value - (stratum.mean + margin)) / sd;
        let z_high = (value - (stratum.mean - margin)) / sd;
        let p_low = stats::normal_cdf(z_low)? * 100.0;
        let p_high = stats::normal_cdf(z_high)? * 100.0;

        let result = PercentileResult {
            percentile: clamp_percent(percentile),
            ci_lower: clamp_percent(p_low.min(p_high)),
            ci_upper: clamp_percent(p_low.max(p_high)),
            sample_size: stratum.sample_size,
            reliability: Reliability::from_sample_size(stratum.sample_size),
        };

        debug!(
            value,
            z,
            t_crit,
            percentile = result.percentile,
            ci_lower = result.ci_lower,
            ci_upper = result.ci_upper,
            "Estimated percentile"
        );
        Ok(result)
    }

    /// Metric value sitting at `target_percentile` of `stratum`
    ///
    /// Only the open interval (0, 100) is accepted; the normal model has no finite value at
    /// exactly 0 or 100.
    pub fn value_at_percentile(target_percentile: f64, stratum: &NormativeStratum) -> Result<f64> {
        if !(target_percentile > 0.0 && target_percentile < 100.0) {
            return Err(HrvError::InvalidPercentile {
                percentile: target_percentile,
            });
        }
        let sd = checked_standard_deviation(stratum)?;

        let z = stats::normal_quantile(target_percentile / 100.0)?;
        Ok(stratum.mean + sd * z)
    }

    /// Value at the 5th percentile, floored at zero since HRV metrics cannot be negative
    pub fn fifth_percentile_value(stratum: &NormativeStratum) -> Result<f64> {
        Ok(Self::value_at_percentile(5.0, stratum)?.max(0.0))
    }

    /// Values bounding the central `lower`..`upper` percentile range of `stratum`
    ///
    /// The lower value is raised to the metric's physiological floor.
    pub fn normative_range(
        stratum: &NormativeStratum,
        lower: f64,
        upper: f64,
    ) -> Result<NormativeRange> {
        if lower >= upper {
            return Err(HrvError::InvalidPercentile { percentile: lower });
        }
        let lower_value = Self::value_at_percentile(lower, stratum)?;
        let upper_value = Self::value_at_percentile(upper, stratum)?;

        Ok(NormativeRange {
            lower_percentile: lower,
            upper_percentile: upper,
            lower_value: lower_value.max(stratum.metric.range_floor()),
            upper_value,
        })
    }
}

fn checked_standard_deviation(stratum: &NormativeStratum) -> Result<f64> {
    let sd = stratum.standard_deviation;
    if !sd.is_finite() || sd <= 0.0 {
        return Err(HrvError::DegenerateStratum {
            standard_deviation: sd,
        });
    }
    Ok(sd)
}

fn clamp_percent(p: f64) -> f64 {
    p.clamp(0.0, 100.0)
}
