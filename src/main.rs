use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use hrvrank::config::{AppConfig, OutputFormat};
use hrvrank::logging::{init_logging, LogLevel};
use hrvrank::models::{Gender, HrvMetric};
use hrvrank::report::{self, MetricQuantile, Report};
use hrvrank::{HrvError, InteractiveSession, PercentileEstimator};

/// hrvrank - HRV percentile calculator
///
/// Ranks short-term heart rate variability metrics against age- and gender-matched
/// normative data from Voss et al. (2015).
#[derive(Parser)]
#[command(name = "hrvrank")]
#[command(author = "hrvrank contributors")]
#[command(version)]
#[command(about = "HRV percentile calculator", long_about = None)]
struct Cli {
    /// Sets a custom config file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Normative table in TOML format (overrides the config file)
    #[arg(long, value_name = "FILE", global = true)]
    norms: Option<PathBuf>,

    /// Output format (overrides the config file)
    #[arg(short = 'f', long, value_enum, global = true)]
    format: Option<OutputFormat>,

    /// Increase verbosity of output
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Rank a single HRV value
    Percentile {
        /// Age in years
        #[arg(short, long)]
        age: u32,

        /// male or female
        #[arg(short, long)]
        gender: String,

        /// sdNN, RMSSD or HF (case-insensitive)
        #[arg(short, long)]
        metric: String,

        /// Measured value (ms for sdNN/RMSSD, ms² for HF)
        #[arg(short = 'x', long, allow_negative_numbers = true)]
        value: f64,
    },

    /// Rank sdNN, RMSSD and optionally HF, then list 5th percentile values
    Report {
        /// Age in years
        age: u32,

        /// male or female
        gender: String,

        /// sdNN value in ms
        sdnn: f64,

        /// RMSSD value in ms
        rmssd: f64,

        /// HF power in ms²
        hf: Option<f64>,
    },

    /// Metric value at a given percentile of the reference group
    ValueAt {
        #[arg(short, long)]
        age: u32,

        #[arg(short, long)]
        gender: String,

        #[arg(short, long)]
        metric: String,

        /// Target percentile, strictly between 0 and 100
        #[arg(short, long)]
        percentile: f64,
    },

    /// Normative range between two percentiles
    Range {
        #[arg(short, long)]
        age: u32,

        #[arg(short, long)]
        gender: String,

        #[arg(short, long)]
        metric: String,

        /// Lower percentile
        #[arg(long, default_value = "5")]
        lower: f64,

        /// Upper percentile
        #[arg(long, default_value = "95")]
        upper: f64,
    },

    /// Display the normative reference table
    Table {
        /// Only show one gender
        #[arg(short, long)]
        gender: Option<String>,

        /// Only show one metric
        #[arg(short, long)]
        metric: Option<String>,
    },

    /// Prompt for age, gender and metric values
    Interactive,

    /// Manage the configuration file
    Config {
        /// Print the effective configuration
        #[arg(short, long)]
        show: bool,

        /// Write a default configuration file
        #[arg(short, long)]
        init: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match domain_error(&e) {
                Some(hrv_error) => {
                    tracing::debug!(
                        severity = ?hrv_error.severity(),
                        error = %hrv_error,
                        "Command failed"
                    );
                    eprintln!("{}", hrv_error.user_message().red());
                }
                None => eprintln!("{} {:#}", "Error:".red().bold(), e),
            }
            ExitCode::from(exit_code_for(&e))
        }
    }
}

/// The `HrvError` behind a failure, if it reached `main` without added context
///
/// Wrapped errors keep their context chain instead of the short user message.
fn domain_error(error: &anyhow::Error) -> Option<&HrvError> {
    if error.chain().count() == 1 {
        error.downcast_ref::<HrvError>()
    } else {
        None
    }
}

/// Process exit status: 2 for bad input, 1 for everything else
fn exit_code_for(error: &anyhow::Error) -> u8 {
    domain_error(error)
        .and_then(|e| u8::try_from(e.exit_code()).ok())
        .unwrap_or(1)
}

fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.clone();
    let mut config = match &config_path {
        Some(path) => AppConfig::load_from_file(path)?,
        None => AppConfig::load_or_default(),
    };

    if let Some(level) = LogLevel::from_verbosity(cli.verbose) {
        config.logging.level = level;
    }
    if let Some(format) = cli.format {
        config.output.format = format;
    }
    if let Some(norms) = &cli.norms {
        config.norms.table_path = Some(norms.clone());
    }

    init_logging(&config.logging)?;
    tracing::info!(config = ?config_path, norms = ?config.norms.table_path, "Starting hrvrank");

    let table = config.load_table()?;
    let estimator = PercentileEstimator::new(&table);
    let format = config.output.format;
    let small_sample_warning = config.output.small_sample_warning;

    match cli.command.unwrap_or(Commands::Interactive) {
        Commands::Percentile {
            age,
            gender,
            metric,
            value,
        } => {
            let ranking = estimator.rank(age, &gender, &metric, value)?;
            match format {
                OutputFormat::Text => {
                    println!("{}", report::ranking_text(&ranking, small_sample_warning))
                }
                OutputFormat::Json => println!("{}", report::to_json(&ranking)?),
                OutputFormat::Csv => print!("{}", report::rankings_csv(&[ranking])?),
            }
        }

        Commands::Report {
            age,
            gender,
            sdnn,
            rmssd,
            hf,
        } => {
            let mut observations = vec![
                (HrvMetric::SdNn.to_string(), sdnn),
                (HrvMetric::Rmssd.to_string(), rmssd),
            ];
            if let Some(hf) = hf {
                observations.push((HrvMetric::Hf.to_string(), hf));
            }

            let report = Report::build(&estimator, age, &gender, &observations)?;
            match format {
                OutputFormat::Text => {
                    println!("{}", "HRV Percentile Calculator".green().bold());
                    println!("{}", "=".repeat(25));
                    print!("{}", report::report_text(&report, small_sample_warning));
                }
                OutputFormat::Json => println!("{}", report::to_json(&report)?),
                OutputFormat::Csv => print!("{}", report::rankings_csv(&report.rankings)?),
            }
        }

        Commands::ValueAt {
            age,
            gender,
            metric,
            percentile,
        } => {
            let stratum = table.find_stratum(age, &gender, &metric)?;
            let quantile = MetricQuantile {
                metric: stratum.metric,
                percentile,
                value: PercentileEstimator::value_at_percentile(percentile, stratum)?,
            };
            match format {
                OutputFormat::Text => {
                    println!("{}", report::value_at_text(age, stratum.gender, &quantile))
                }
                OutputFormat::Json => println!("{}", report::to_json(&quantile)?),
                OutputFormat::Csv => print!("{}", report::to_csv(&[quantile])?),
            }
        }

        Commands::Range {
            age,
            gender,
            metric,
            lower,
            upper,
        } => {
            let stratum = table.find_stratum(age, &gender, &metric)?;
            let range = PercentileEstimator::normative_range(stratum, lower, upper)?;
            match format {
                OutputFormat::Text => println!("{}", report::range_text(stratum.metric, &range)),
                OutputFormat::Json => println!("{}", report::to_json(&range)?),
                OutputFormat::Csv => print!("{}", report::to_csv(&[range])?),
            }
        }

        Commands::Table { gender, metric } => {
            let gender = gender.map(|g| g.parse::<Gender>()).transpose()?;
            let metric = metric.map(|m| m.parse::<HrvMetric>()).transpose()?;
            match format {
                OutputFormat::Text => {
                    println!("{}", table.source().dimmed());
                    println!("{}", report::strata_table(&table, gender, metric));
                }
                OutputFormat::Json => println!("{}", report::to_json(table.strata())?),
                OutputFormat::Csv => print!("{}", report::to_csv(table.strata())?),
            }
        }

        Commands::Interactive => run_interactive(&estimator, small_sample_warning)?,

        Commands::Config { show, init } => {
            let path = config_path.unwrap_or_else(AppConfig::default_config_path);
            if init {
                if path.exists() {
                    anyhow::bail!("Config file already exists: {}", path.display());
                }
                AppConfig::default().save_to_file(&path)?;
                println!("{} {}", "✓ Wrote default configuration to".green(), path.display());
            }
            if show || !init {
                let rendered = toml::to_string_pretty(&config)
                    .context("Failed to serialize configuration to TOML")?;
                println!("{}", format!("# {}", path.display()).dimmed());
                print!("{}", rendered);
            }
        }
    }

    Ok(())
}

fn run_interactive(estimator: &PercentileEstimator<'_>, small_sample_warning: u32) -> Result<()> {
    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut session =
        InteractiveSession::new(*estimator, stdin.lock(), stdout.lock(), small_sample_warning);
    session.run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_report_positional_arguments() {
        let cli = Cli::try_parse_from(["hrvrank", "report", "30", "male", "45", "30.5"]).unwrap();
        match cli.command {
            Some(Commands::Report { age, gender, sdnn, rmssd, hf }) => {
                assert_eq!(age, 30);
                assert_eq!(gender, "male");
                assert_eq!(sdnn, 45.0);
                assert_eq!(rmssd, 30.5);
                assert_eq!(hf, None);
            }
            _ => panic!("expected report command"),
        }
    }

    #[test]
    fn test_no_subcommand_means_interactive() {
        let cli = Cli::try_parse_from(["hrvrank", "-vv"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_global_format_flag() {
        let cli = Cli::try_parse_from([
            "hrvrank",
            "percentile",
            "-a",
            "30",
            "-g",
            "male",
            "-m",
            "sdNN",
            "-x",
            "45",
            "--format",
            "json",
        ])
        .unwrap();
        assert_eq!(cli.format, Some(OutputFormat::Json));
    }

    #[test]
    fn test_exit_code_for_bare_errors() {
        let input = anyhow::Error::from(HrvError::InvalidGender {
            input: "other".to_string(),
        });
        assert_eq!(exit_code_for(&input), 2);
        assert!(domain_error(&input).is_some());

        let reference = anyhow::Error::from(HrvError::InsufficientSample { sample_size: 1 });
        assert_eq!(exit_code_for(&reference), 1);
    }

    #[test]
    fn test_exit_code_for_wrapped_errors() {
        let wrapped = anyhow::Error::from(HrvError::UnknownMetric {
            input: "LF".to_string(),
        })
        .context("Failed to rank observation");
        assert!(domain_error(&wrapped).is_none());
        assert_eq!(exit_code_for(&wrapped), 1);

        let plain = anyhow::anyhow!("Config file already exists: /tmp/config.toml");
        assert_eq!(exit_code_for(&plain), 1);
    }
}
