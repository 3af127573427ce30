//! Interactive prompt loop
//!
//! Asks for age and gender, then any number of metric/value pairs until `done`. Invalid input
//! is reported and asked for again; end of input stops the session without an error.

use anyhow::Result;
use std::io::{BufRead, Write};
use tracing::debug;

use crate::models::{Gender, HrvMetric};
use crate::percentile::PercentileEstimator;
use crate::report::{report_text, Report};

pub struct InteractiveSession<'a, R, W> {
    estimator: PercentileEstimator<'a>,
    input: R,
    output: W,
    small_sample_warning: u32,
}

impl<'a, R: BufRead, W: Write> InteractiveSession<'a, R, W> {
    pub fn new(
        estimator: PercentileEstimator<'a>,
        input: R,
        output: W,
        small_sample_warning: u32,
    ) -> Self {
        Self {
            estimator,
            input,
            output,
            small_sample_warning,
        }
    }

    /// Consume the session and hand back the output sink
    pub fn into_output(self) -> W {
        self.output
    }

    pub fn run(&mut self) -> Result<()> {
        writeln!(self.output, "HRV Percentile Calculator")?;
        writeln!(self.output, "{}", "=".repeat(25))?;

        let Some(age) = self.read_age()? else {
            return self.exit();
        };
        let Some(gender) = self.read_gender()? else {
            return self.exit();
        };

        writeln!(self.output)?;
        writeln!(self.output, "Available HRV metrics: sdNN, RMSSD, HF")?;
        writeln!(
            self.output,
            "You can enter multiple metrics (press Enter after each one, type 'done' when finished)"
        )?;
        let observations = self.read_observations()?;

        if observations.is_empty() {
            writeln!(self.output, "No metrics entered. Exiting.")?;
            return Ok(());
        }

        writeln!(self.output)?;
        writeln!(self.output, "Results:")?;
        writeln!(self.output, "{}", "-".repeat(50))?;

        match Report::build(&self.estimator, age, gender.as_str(), &observations) {
            Ok(report) => write!(
                self.output,
                "{}",
                report_text(&report, self.small_sample_warning)
            )?,
            Err(e) => writeln!(self.output, "{}", e.user_message())?,
        }
        Ok(())
    }

    fn exit(&mut self) -> Result<()> {
        writeln!(self.output)?;
        writeln!(self.output, "Exiting...")?;
        Ok(())
    }

    /// Print `message` and read one trimmed line, `None` at end of input
    fn prompt(&mut self, message: &str) -> Result<Option<String>> {
        write!(self.output, "{}", message)?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    fn read_age(&mut self) -> Result<Option<u32>> {
        let (min, max) = self.estimator.table().age_range();
        let message = format!("Enter your age ({}-{}): ", min, max);

        loop {
            let Some(line) = self.prompt(&message)? else {
                return Ok(None);
            };
            match line.parse::<u32>() {
                Ok(age) if (min..=max).contains(&age) => return Ok(Some(age)),
                Ok(age) => {
                    debug!(age, "Age outside table range");
                    writeln!(
                        self.output,
                        "Error: Age is outside the study's range ({}-{} years).",
                        min, max
                    )?;
                }
                Err(_) => {
                    debug!(input = %line, "Rejected age input");
                    writeln!(self.output, "Invalid age. Please enter a whole number.")?;
                }
            }
        }
    }

    fn read_gender(&mut self) -> Result<Option<Gender>> {
        loop {
            let Some(line) = self.prompt("Enter your gender (male/female): ")? else {
                return Ok(None);
            };
            match line.parse::<Gender>() {
                Ok(gender) => return Ok(Some(gender)),
                Err(e) => writeln!(self.output, "{}", e.user_message())?,
            }
        }
    }

    fn read_observations(&mut self) -> Result<Vec<(String, f64)>> {
        let mut observations = Vec::new();

        loop {
            let Some(line) = self.prompt("Enter HRV metric name (or 'done' to finish): ")? else {
                break;
            };
            if line.eq_ignore_ascii_case("done") {
                break;
            }
            if line.is_empty() {
                continue;
            }

            let metric = match line.parse::<HrvMetric>() {
                Ok(metric) => metric,
                Err(e) => {
                    writeln!(self.output, "{}", e.user_message())?;
                    continue;
                }
            };

            let Some(raw) = self.prompt(&format!("Enter your {} value: ", metric))? else {
                break;
            };
            match raw.parse::<f64>() {
                Ok(value) if value.is_finite() => {
                    debug!(%metric, value, "Recorded observation");
                    observations.push((metric.to_string(), value));
                }
                _ => writeln!(self.output, "Invalid value. Please enter a number.")?,
            }
        }

        Ok(observations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::norms::NormativeTable;
    use std::io::Cursor;

    fn run_session(script: &str) -> String {
        let table = NormativeTable::voss_2015();
        let estimator = PercentileEstimator::new(&table);
        let mut session =
            InteractiveSession::new(estimator, Cursor::new(script.to_string()), Vec::new(), 100);
        session.run().unwrap();
        String::from_utf8(session.into_output()).unwrap()
    }

    #[test]
    fn test_full_session() {
        let output = run_session("30\nmale\nsdNN\n50\nrmssd\n30\ndone\n");

        assert!(output.contains("Results:"));
        assert!(output.contains("an sdNN value of 50.0 is at the 50.2th percentile"));
        assert!(output.contains("an RMSSD value of 30.0"));
        assert!(output.contains("sdNN 5th percentile: 17.3"));
    }

    #[test]
    fn test_reprompts_on_invalid_input() {
        let output = run_session("abc\n10\n30\nother\nFemale\nLF\nhf\nlots\nhf\n150\ndone\n");

        assert!(output.contains("Invalid age. Please enter a whole number."));
        assert!(output.contains("Error: Age is outside the study's range (25-74 years)."));
        assert!(output.contains("Error: Gender must be 'male' or 'female'."));
        assert!(output.contains("Unknown HRV metric 'LF'"));
        assert!(output.contains("Invalid value. Please enter a number."));
        assert!(output.contains("For a 30-year-old female, an HF value of 150.0"));
    }

    #[test]
    fn test_no_metrics_entered() {
        let output = run_session("40\nmale\n\ndone\n");
        assert!(output.contains("No metrics entered. Exiting."));
        assert!(!output.contains("Results:"));
    }

    #[test]
    fn test_end_of_input_exits_quietly() {
        let output = run_session("40\n");
        assert!(output.ends_with("Exiting...\n"));

        let output = run_session("40\nmale\nsdNN\n45\n");
        assert!(output.contains("Results:"));
    }
}
