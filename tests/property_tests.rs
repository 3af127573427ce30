//! Property-based tests for percentile estimation
//!
//! Ranges cover every stratum of the built-in table and values well beyond the physiological
//! range, so clamping is exercised too.

use hrvrank::{NormativeTable, PercentileEstimator};
use proptest::prelude::*;

const METRICS: [&str; 3] = ["sdNN", "RMSSD", "HF"];
const GENDERS: [&str; 2] = ["male", "female"];

proptest! {
    #[test]
    fn test_bounds_are_ordered_and_clamped(
        age in 25u32..=74,
        gender_idx in 0usize..2,
        metric_idx in 0usize..3,
        value in -500.0f64..2000.0
    ) {
        let table = NormativeTable::voss_2015();
        let stratum = table.find_stratum(age, GENDERS[gender_idx], METRICS[metric_idx]).unwrap();
        let result = PercentileEstimator::estimate_percentile(value, stratum).unwrap();

        prop_assert!(result.ci_lower <= result.percentile);
        prop_assert!(result.percentile <= result.ci_upper);
        for p in [result.percentile, result.ci_lower, result.ci_upper] {
            prop_assert!((0.0..=100.0).contains(&p));
        }
        prop_assert_eq!(result.sample_size, stratum.sample_size);
    }

    #[test]
    fn test_percentile_is_monotonic_in_value(
        age in 25u32..=74,
        gender_idx in 0usize..2,
        metric_idx in 0usize..3,
        z1 in -4.0f64..4.0,
        dz in 0.01f64..2.0
    ) {
        let table = NormativeTable::voss_2015();
        let stratum = table.find_stratum(age, GENDERS[gender_idx], METRICS[metric_idx]).unwrap();

        // Stay within a few SDs so the normal CDF has not saturated
        let v1 = stratum.mean + z1 * stratum.standard_deviation;
        let v2 = v1 + dz * stratum.standard_deviation;

        let p1 = PercentileEstimator::estimate_percentile(v1, stratum).unwrap().percentile;
        let p2 = PercentileEstimator::estimate_percentile(v2, stratum).unwrap().percentile;
        prop_assert!(p1 < p2, "{} at {} not below {} at {}", p1, v1, p2, v2);
    }

    #[test]
    fn test_inverse_query_round_trip(
        age in 25u32..=74,
        gender_idx in 0usize..2,
        metric_idx in 0usize..3,
        target in 0.01f64..99.99
    ) {
        let table = NormativeTable::voss_2015();
        let stratum = table.find_stratum(age, GENDERS[gender_idx], METRICS[metric_idx]).unwrap();

        let value = PercentileEstimator::value_at_percentile(target, stratum).unwrap();
        let result = PercentileEstimator::estimate_percentile(value, stratum).unwrap();
        prop_assert!((result.percentile - target).abs() < 1e-3);
    }

    #[test]
    fn test_case_insensitive_lookup(
        age in 25u32..=74,
        metric_idx in 0usize..3,
        upper in any::<bool>()
    ) {
        let table = NormativeTable::voss_2015();
        let metric = if upper {
            METRICS[metric_idx].to_uppercase()
        } else {
            METRICS[metric_idx].to_lowercase()
        };
        let gender = if upper { "FEMALE" } else { "female" };

        let canonical = table.find_stratum(age, "female", METRICS[metric_idx]).unwrap();
        let variant = table.find_stratum(age, gender, &metric).unwrap();
        prop_assert_eq!(canonical, variant);
    }

    #[test]
    fn test_out_of_range_ages_rejected(age in prop_oneof![0u32..25, 75u32..200]) {
        let table = NormativeTable::voss_2015();
        let is_out_of_range = matches!(
            table.find_stratum(age, "male", "sdNN"),
            Err(hrvrank::HrvError::OutOfRange { .. })
        );
        prop_assert!(is_out_of_range);
    }
}
