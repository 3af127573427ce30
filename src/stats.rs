//! Distribution helpers backed by `statrs`
//!
//! Thin wrappers around the standard normal and Student's t distributions that turn
//! construction failures into [`HrvError::Distribution`].

use statrs::distribution::{ContinuousCDF, Normal, StudentsT};

use crate::error::{HrvError, Result};

/// Two-sided confidence level used for every interval in the crate
pub const CONFIDENCE_LEVEL: f64 = 0.95;

fn standard_normal() -> Result<Normal> {
    Normal::new(0.0, 1.0).map_err(|e| HrvError::Distribution(e.to_string()))
}

/// Standard normal cumulative distribution Φ(z)
pub fn normal_cdf(z: f64) -> Result<f64> {
    Ok(standard_normal()?.cdf(z))
}

/// Standard normal quantile (probit) Φ⁻¹(p) for p in (0, 1)
pub fn normal_quantile(p: f64) -> Result<f64> {
    Ok(standard_normal()?.inverse_cdf(p))
}

/// Above this many degrees of freedom t and z agree to better than 1e-5
const NORMAL_APPROX_MIN_DF: u32 = 100_000;

/// Two-sided critical value of Student's t
///
/// For `confidence = 0.95` this is the 97.5th percentile of t with `degrees_of_freedom`.
/// Beyond 100,000 degrees of freedom the standard normal quantile is returned instead,
/// since `StudentsT::inverse_cdf` loses accuracy and slows down without bound there.
pub fn t_critical(confidence: f64, degrees_of_freedom: u32) -> Result<f64> {
    if degrees_of_freedom == 0 {
        return Err(HrvError::InsufficientSample { sample_size: 1 });
    }
    let upper_tail = 1.0 - (1.0 - confidence) / 2.0;
    if degrees_of_freedom > NORMAL_APPROX_MIN_DF {
        return normal_quantile(upper_tail);
    }
    let dist = StudentsT::new(0.0, 1.0, f64::from(degrees_of_freedom))
        .map_err(|e| HrvError::Distribution(e.to_string()))?;
    Ok(dist.inverse_cdf(upper_tail))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normal_cdf_accuracy() {
        assert!((normal_cdf(0.0).unwrap() - 0.5).abs() < 1e-12);
        assert!((normal_cdf(1.96).unwrap() - 0.975_002_104_851_78).abs() < 1e-6);
        assert!((normal_cdf(-1.0).unwrap() - 0.158_655_253_931_457).abs() < 1e-6);
        assert!((normal_cdf(3.0).unwrap() - 0.998_650_101_968_37).abs() < 1e-6);
    }

    #[test]
    fn test_normal_quantile_accuracy() {
        assert!(normal_quantile(0.5).unwrap().abs() < 1e-9);
        assert!((normal_quantile(0.05).unwrap() + 1.644_853_626_951_47).abs() < 1e-6);
        assert!((normal_quantile(0.975).unwrap() - 1.959_963_984_540_05).abs() < 1e-6);
    }

    #[test]
    fn test_t_critical_values() {
        assert!((t_critical(CONFIDENCE_LEVEL, 10).unwrap() - 2.228_139).abs() < 1e-4);
        assert!((t_critical(CONFIDENCE_LEVEL, 61).unwrap() - 1.999_624).abs() < 1e-4);
        assert!((t_critical(CONFIDENCE_LEVEL, 329).unwrap() - 1.967_201).abs() < 1e-4);
    }

    #[test]
    fn test_t_critical_approaches_normal() {
        let t = t_critical(CONFIDENCE_LEVEL, 10_000).unwrap();
        assert!((t - 1.960_201).abs() < 1e-3);
    }

    #[test]
    fn test_t_critical_huge_degrees_of_freedom() {
        for df in [100_001, 10_000_000, u32::MAX - 1] {
            let t = t_critical(CONFIDENCE_LEVEL, df).unwrap();
            assert!((t - 1.959_964).abs() < 1e-4, "df {} gave {}", df, t);
        }
    }

    #[test]
    fn test_t_critical_continuous_at_cutoff() {
        let below = t_critical(CONFIDENCE_LEVEL, NORMAL_APPROX_MIN_DF).unwrap();
        let above = t_critical(CONFIDENCE_LEVEL, NORMAL_APPROX_MIN_DF + 1).unwrap();
        assert!((below - above).abs() < 1e-4);
    }

    #[test]
    fn test_t_critical_requires_freedom() {
        assert!(matches!(
            t_critical(CONFIDENCE_LEVEL, 0),
            Err(HrvError::InsufficientSample { .. })
        ));
    }
}
