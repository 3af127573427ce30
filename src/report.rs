//! Presentation of rankings, quantiles and the normative table
//!
//! Text output is meant for people and rounds to one decimal. JSON and CSV carry the same
//! numbers unrounded.

use anyhow::Result;
use serde::Serialize;
use std::fmt::Write as _;
use tabled::{settings::Style, Table, Tabled};

use crate::error::{self, HrvError};
use crate::models::{Gender, HrvMetric, NormativeRange, NormativeStratum};
use crate::norms::NormativeTable;
use crate::percentile::{PercentileEstimator, Ranking};

const SMALL_SAMPLE_WARNING: &str = "  ⚠️  Warning: Small sample size may affect reliability";

/// Value at a fixed percentile for one metric
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricQuantile {
    pub metric: HrvMetric,
    pub percentile: f64,
    pub value: f64,
}

/// Full result of the multi-metric report command
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub age: u32,
    pub gender: Gender,
    pub rankings: Vec<Ranking>,
    pub fifth_percentiles: Vec<MetricQuantile>,
}

impl Report {
    /// Rank every (metric, value) pair and collect the 5th percentile of all metrics
    ///
    /// Fails on the first metric that cannot be ranked; no partial report is produced.
    pub fn build(
        estimator: &PercentileEstimator<'_>,
        age: u32,
        gender: &str,
        observations: &[(String, f64)],
    ) -> error::Result<Self> {
        let table = estimator.table();

        // Age before gender, matching the precedence of single lookups
        let (min, max) = table.age_range();
        if age < min || age > max {
            return Err(HrvError::OutOfRange { age, min, max });
        }
        let gender: Gender = gender.parse()?;

        let rankings = observations
            .iter()
            .map(|(metric, value)| estimator.rank(age, gender.as_str(), metric, *value))
            .collect::<error::Result<Vec<_>>>()?;

        let fifth_percentiles = fifth_percentile_values(table, age, gender)?;

        Ok(Report {
            age,
            gender,
            rankings,
            fifth_percentiles,
        })
    }
}

/// 5th percentile value of each metric for the subject's stratum
///
/// Metrics the table has no stratum for are left out.
pub fn fifth_percentile_values(
    table: &NormativeTable,
    age: u32,
    gender: Gender,
) -> error::Result<Vec<MetricQuantile>> {
    let mut quantiles = Vec::with_capacity(HrvMetric::ALL.len());
    for metric in HrvMetric::ALL {
        let stratum = match table.find(age, gender, metric) {
            Ok(stratum) => stratum,
            Err(HrvError::StratumNotFound { .. }) => continue,
            Err(e) => return Err(e),
        };
        quantiles.push(MetricQuantile {
            metric,
            percentile: 5.0,
            value: PercentileEstimator::fifth_percentile_value(stratum)?,
        });
    }
    Ok(quantiles)
}

/// Format a metric value the way a user typed it: at least one decimal place
pub fn format_value(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}

/// Percentile label such as "5th" or "2.5th"
pub fn percentile_label(p: f64) -> String {
    if p.fract() == 0.0 {
        format!("{}th", p as i64)
    } else {
        format!("{}th", p)
    }
}

/// Two-line description of a single ranking, plus a warning for small reference groups
pub fn ranking_text(ranking: &Ranking, small_sample_warning: u32) -> String {
    let result = &ranking.result;
    let mut text = format!(
        "For a {}-year-old {}, an {} value of {} is at the {:.1}th percentile \
         (95% CI: {:.1}-{:.1}th percentile)\n  Sample size: n={}, Reliability: {}",
        ranking.age,
        ranking.gender,
        ranking.metric,
        format_value(ranking.value),
        result.percentile,
        result.ci_lower,
        result.ci_upper,
        result.sample_size,
        result.reliability,
    );

    if result.sample_size < small_sample_warning {
        text.push('\n');
        text.push_str(SMALL_SAMPLE_WARNING);
    }
    text
}

/// One line per metric: "sdNN 5th percentile: 17.3"
pub fn quantiles_text(quantiles: &[MetricQuantile]) -> String {
    quantiles
        .iter()
        .map(|q| {
            format!(
                "{} {} percentile: {:.1}",
                q.metric,
                percentile_label(q.percentile),
                q.value
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Plain-text body of a report: rankings, then the 5th percentile section
pub fn report_text(report: &Report, small_sample_warning: u32) -> String {
    let mut text = String::new();
    for ranking in &report.rankings {
        let _ = writeln!(text, "{}", ranking_text(ranking, small_sample_warning));
    }
    let _ = writeln!(text);
    let _ = writeln!(text, "5th Percentile Values:");
    let _ = writeln!(text, "{}", "-".repeat(25));
    let _ = writeln!(text, "{}", quantiles_text(&report.fifth_percentiles));
    text
}

pub fn range_text(metric: HrvMetric, range: &NormativeRange) -> String {
    format!(
        "{} normative range ({}-{} percentile): {:.1} - {:.1}",
        metric,
        percentile_label(range.lower_percentile),
        percentile_label(range.upper_percentile),
        range.lower_value,
        range.upper_value
    )
}

pub fn value_at_text(age: u32, gender: Gender, quantile: &MetricQuantile) -> String {
    format!(
        "For a {}-year-old {}, the {} percentile of {} is {:.1} {}",
        age,
        gender,
        percentile_label(quantile.percentile),
        quantile.metric,
        quantile.value,
        quantile.metric.unit()
    )
}

/// Flat CSV row for a ranking
#[derive(Debug, Serialize)]
struct RankingRow {
    age: u32,
    gender: Gender,
    metric: HrvMetric,
    value: f64,
    age_band: String,
    mean: f64,
    standard_deviation: f64,
    sample_size: u32,
    percentile: f64,
    ci_lower: f64,
    ci_upper: f64,
    reliability: String,
}

impl From<&Ranking> for RankingRow {
    fn from(r: &Ranking) -> Self {
        RankingRow {
            age: r.age,
            gender: r.gender,
            metric: r.metric,
            value: r.value,
            age_band: r.stratum.age_band(),
            mean: r.stratum.mean,
            standard_deviation: r.stratum.standard_deviation,
            sample_size: r.result.sample_size,
            percentile: r.result.percentile,
            ci_lower: r.result.ci_lower,
            ci_upper: r.result.ci_upper,
            reliability: r.result.reliability.to_string(),
        }
    }
}

/// Serialize any flat rows to CSV with a header line
pub fn to_csv<T: Serialize>(rows: &[T]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer.serialize(row)?;
    }
    let bytes = writer.into_inner().map_err(|e| anyhow::anyhow!(e.to_string()))?;
    Ok(String::from_utf8(bytes)?)
}

pub fn rankings_csv(rankings: &[Ranking]) -> Result<String> {
    let rows: Vec<RankingRow> = rankings.iter().map(RankingRow::from).collect();
    to_csv(&rows)
}

pub fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Normative table display row
#[derive(Tabled)]
struct StratumRow {
    #[tabled(rename = "Gender")]
    gender: String,
    #[tabled(rename = "Age")]
    age_band: String,
    #[tabled(rename = "Metric")]
    metric: String,
    #[tabled(rename = "Mean")]
    mean: String,
    #[tabled(rename = "SD")]
    sd: String,
    #[tabled(rename = "n")]
    sample_size: u32,
}

impl From<&NormativeStratum> for StratumRow {
    fn from(s: &NormativeStratum) -> Self {
        StratumRow {
            gender: s.gender.to_string(),
            age_band: s.age_band(),
            metric: s.metric.to_string(),
            mean: format!("{:.1}", s.mean),
            sd: format!("{:.1}", s.standard_deviation),
            sample_size: s.sample_size,
        }
    }
}

/// Render the strata matching the optional filters as a table
pub fn strata_table(
    table: &NormativeTable,
    gender: Option<Gender>,
    metric: Option<HrvMetric>,
) -> String {
    let rows: Vec<StratumRow> = table
        .strata()
        .iter()
        .filter(|s| gender.map_or(true, |g| s.gender == g))
        .filter(|s| metric.map_or(true, |m| s.metric == m))
        .map(StratumRow::from)
        .collect();

    Table::new(rows).with(Style::modern()).to_string()
}
