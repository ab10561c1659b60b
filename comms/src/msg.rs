//! Text payloads exchanged once per superstep.
//!
//! Sections are separated by `;`, per sample groups by `,` and the values inside a
//! group by whitespace.

use std::{
    fmt::{self, Display, Write},
    io,
    str::FromStr,
};

const SECTION: char = ';';
const GROUP: char = ',';

fn invalid_data<T>(text: String) -> io::Result<T> {
    Err(io::Error::new(io::ErrorKind::InvalidData, text))
}

fn parse_values<T: FromStr>(s: &str) -> io::Result<Vec<T>> {
    s.split_whitespace()
        .map(|value| match value.parse() {
            Ok(value) => Ok(value),
            Err(_) => invalid_data(format!("invalid number `{value}`")),
        })
        .collect()
}

fn parse_groups<T: FromStr>(s: &str) -> io::Result<Vec<Vec<T>>> {
    if s.trim().is_empty() {
        return Ok(Vec::new());
    }

    s.split(GROUP).map(parse_values::<T>).collect()
}

fn write_values<T: Display>(f: &mut fmt::Formatter<'_>, values: &[T]) -> fmt::Result {
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            f.write_char(' ')?;
        }

        write!(f, "{value}")?;
    }

    Ok(())
}

fn write_groups<T: Display>(f: &mut fmt::Formatter<'_>, groups: &[Vec<T>]) -> fmt::Result {
    for (i, group) in groups.iter().enumerate() {
        if i > 0 {
            f.write_char(GROUP)?;
        }

        write_values(f, group)?;
    }

    Ok(())
}

fn split_sections<'a>(s: &'a str, expected: usize, what: &str) -> io::Result<Vec<&'a str>> {
    let sections: Vec<_> = s.trim().split(SECTION).collect();
    if sections.len() != expected {
        let got = sections.len();
        return invalid_data(format!(
            "{what} must have {expected} sections, got {got}"
        ));
    }

    Ok(sections)
}

/// Parses a whitespace separated weight vector.
///
/// # Returns
/// The weights or an `io::ErrorKind::InvalidData` error on a non numeric entry.
pub fn parse_weights(s: &str) -> io::Result<Vec<f64>> {
    parse_values(s)
}

/// Encodes a weight vector the way `parse_weights` reads it.
pub fn encode_weights(weights: &[f64]) -> String {
    weights
        .iter()
        .map(f64::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

/// The aggregated result a training worker reports each superstep.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainReport {
    /// The predicted labeling of every sample.
    pub predictions: Vec<Vec<usize>>,
    /// The per sample feature joint difference.
    pub dpsi: Vec<Vec<f64>>,
    /// The elementwise sum of `dpsi`.
    pub dpsi_sum: Vec<f64>,
    /// The per sample loss.
    pub losses: Vec<f64>,
    /// The sum of `losses`.
    pub loss_sum: f64,
}

impl Display for TrainReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_groups(f, &self.predictions)?;
        f.write_char(SECTION)?;
        write_groups(f, &self.dpsi)?;
        f.write_char(SECTION)?;
        write_values(f, &self.dpsi_sum)?;
        f.write_char(SECTION)?;
        write_values(f, &self.losses)?;
        f.write_char(SECTION)?;
        write!(f, "{}", self.loss_sum)
    }
}

impl FromStr for TrainReport {
    type Err = io::Error;

    fn from_str(s: &str) -> io::Result<Self> {
        let sections = split_sections(s, 5, "a training report")?;

        let predictions = parse_groups(sections[0])?;
        let dpsi = parse_groups(sections[1])?;
        let dpsi_sum = parse_values(sections[2])?;
        let losses = parse_values(sections[3])?;

        let [loss_sum] = parse_values::<f64>(sections[4])?[..] else {
            return invalid_data(format!("expected a single summed loss, got `{}`", sections[4]));
        };

        let samples = predictions.len();
        if dpsi.len() != samples || losses.len() != samples {
            return invalid_data(format!(
                "per sample sections disagree: {samples} predictions, {} differences, {} losses",
                dpsi.len(),
                losses.len()
            ));
        }

        Ok(Self {
            predictions,
            dpsi,
            dpsi_sum,
            losses,
            loss_sum,
        })
    }
}

/// The predictions an inference worker reports in its single superstep.
#[derive(Debug, Clone, PartialEq)]
pub struct TestReport {
    /// The predicted labeling of every sample.
    pub predictions: Vec<Vec<usize>>,
    /// The label/area reference stored for every sample.
    pub references: Vec<Vec<f64>>,
}

impl Display for TestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_groups(f, &self.predictions)?;
        f.write_char(SECTION)?;
        write_groups(f, &self.references)
    }
}

impl FromStr for TestReport {
    type Err = io::Error;

    fn from_str(s: &str) -> io::Result<Self> {
        let sections = split_sections(s, 2, "a test report")?;

        let predictions = parse_groups(sections[0])?;
        let references = parse_groups(sections[1])?;

        if predictions.len() != references.len() {
            return invalid_data(format!(
                "per sample sections disagree: {} predictions, {} references",
                predictions.len(),
                references.len()
            ));
        }

        Ok(Self {
            predictions,
            references,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> TrainReport {
        TrainReport {
            predictions: vec![vec![0, 1, 1], vec![2]],
            dpsi: vec![vec![0.5, -1.25], vec![0.1, 0.2]],
            dpsi_sum: vec![0.6, -1.05],
            losses: vec![2.0, 0.0],
            loss_sum: 2.0,
        }
    }

    #[test]
    fn train_report_wire_layout() {
        let encoded = report().to_string();
        assert_eq!(encoded, "0 1 1,2;0.5 -1.25,0.1 0.2;0.6 -1.05;2 0;2");
    }

    #[test]
    fn train_report_decodes_what_it_encodes() {
        let report = TrainReport {
            dpsi_sum: vec![0.1 + 0.2, 1e-300],
            ..report()
        };

        let decoded: TrainReport = report.to_string().parse().unwrap();
        assert_eq!(decoded, report);
    }

    #[test]
    fn train_report_rejects_malformed_payloads() {
        let err = "0 1;0.5;0.5;1".parse::<TrainReport>().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);

        assert!("0 1;0.5;0.5;1 2;3".parse::<TrainReport>().is_err());
        assert!("0 x;0.5;0.5;1;1".parse::<TrainReport>().is_err());
        assert!("0;0.5;0.5;1;1 2".parse::<TrainReport>().is_err());
    }

    #[test]
    fn empty_shard_report() {
        let report = TrainReport {
            predictions: Vec::new(),
            dpsi: Vec::new(),
            dpsi_sum: Vec::new(),
            losses: Vec::new(),
            loss_sum: 0.0,
        };

        let encoded = report.to_string();
        assert_eq!(encoded, ";;;;0");
        assert_eq!(encoded.parse::<TrainReport>().unwrap(), report);
    }

    #[test]
    fn test_report_wire_layout() {
        let report = TestReport {
            predictions: vec![vec![1, 0], vec![2]],
            references: vec![vec![2.0, 10.5], vec![3.0]],
        };

        let encoded = report.to_string();
        assert_eq!(encoded, "1 0,2;2 10.5,3");
        assert_eq!(encoded.parse::<TestReport>().unwrap(), report);
        assert!("1 0,2;2".parse::<TestReport>().is_err());
    }

    #[test]
    fn weights() {
        assert_eq!(parse_weights("0.5  0.5\n-2").unwrap(), vec![0.5, 0.5, -2.0]);
        assert_eq!(parse_weights("3 4").unwrap(), vec![3.0, 4.0]);
        assert!(parse_weights("0.5 half").is_err());
        assert_eq!(encode_weights(&[0.5, 1.0, -2.25]), "0.5 1 -2.25");
    }
}
