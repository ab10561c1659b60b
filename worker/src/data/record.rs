use comms::Record;
use machine_learning::{Graph, Labels};
use ndarray::{Array2, ArrayView2, s};

use crate::{Result, WorkerErr};

const BLOCK: char = ';';
const ROW: char = ',';

/// One labeled graph read from the input.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// The identifier every block of the record carries in its first column.
    pub id: f64,
    pub x: Graph,
    /// Ground truth, 0-based class per node.
    pub y: Labels,
    /// The label block past its index column, row after row.
    pub reference: Vec<f64>,
}

fn malformed<T>(record: &Record, reason: impl Into<String>) -> Result<T> {
    Err(WorkerErr::MalformedRecord {
        key: record.key.clone(),
        reason: reason.into(),
    })
}

/// Parses a block of `,` separated rows of whitespace separated numbers.
///
/// Blank rows are skipped, every other row must have the same width.
fn parse_block(record: &Record, name: &'static str, block: &str) -> Result<Array2<f64>> {
    let mut values = Vec::new();
    let mut width = None;
    let mut rows = 0;

    for row in block.split(ROW).filter(|row| !row.trim().is_empty()) {
        let start = values.len();
        for value in row.split_whitespace() {
            match value.parse::<f64>() {
                Ok(value) => values.push(value),
                Err(_) => return malformed(record, format!("invalid number `{value}` in the {name} block")),
            }
        }

        let row_width = values.len() - start;
        match width {
            None => width = Some(row_width),
            Some(width) if width != row_width => {
                return malformed(
                    record,
                    format!("ragged {name} block, row {rows} has {row_width} values instead of {width}"),
                );
            }
            Some(_) => {}
        }

        rows += 1;
    }

    let Some(width) = width else {
        return malformed(record, format!("empty {name} block"));
    };

    Array2::from_shape_vec((rows, width), values)
        .or_else(|e| malformed(record, format!("invalid {name} block: {e}")))
}

fn require_columns(
    record: &Record,
    name: &'static str,
    block: &Array2<f64>,
    needed: usize,
) -> Result<()> {
    if block.ncols() < needed {
        let got = block.ncols();
        return malformed(
            record,
            format!("the {name} block needs at least {needed} columns, got {got}"),
        );
    }

    Ok(())
}

fn check_identifier(
    record: &Record,
    name: &'static str,
    block: &Array2<f64>,
    id: f64,
) -> Result<()> {
    match block.column(0).iter().find(|&&got| got != id) {
        Some(&got) => Err(WorkerErr::IdentifierMismatch {
            key: record.key.clone(),
            block: name,
            expected: id,
            got,
        }),
        None => Ok(()),
    }
}

/// Reads a column of 1-based indices as 0-based ones.
fn index_column(
    record: &Record,
    name: &'static str,
    block: &Array2<f64>,
    col: usize,
) -> Result<Vec<usize>> {
    block
        .column(col)
        .iter()
        .map(|&value| {
            if value.fract() != 0.0 || value < 1.0 || !value.is_finite() {
                return malformed(
                    record,
                    format!("column {col} of the {name} block holds `{value}`, expected a 1-based index"),
                );
            }

            Ok(value as usize - 1)
        })
        .collect()
}

fn tail(block: &Array2<f64>, from: usize) -> ArrayView2<'_, f64> {
    block.slice(s![.., from..])
}

/// Decomposes an input record into a `Sample`.
///
/// The record value holds at least three `;` separated blocks: node features, edges
/// and labels; any block past those is ignored. Column 0 of every row carries the
/// record identifier.
///
/// * node block: `id node feature...`
/// * edge block: `id from to feature...`, 1-based endpoints
/// * label block: `id node label extra...`, 1-based labels
///
/// # Returns
/// The sample, `WorkerErr::MalformedRecord` if the layout is wrong or
/// `WorkerErr::IdentifierMismatch` if the blocks disagree on the identifier.
pub fn parse_record(record: &Record) -> Result<Sample> {
    let blocks: Vec<_> = record.value.split(BLOCK).collect();
    let [node_block, edge_block, label_block, ..] = blocks[..] else {
        let got = blocks.len();
        return malformed(record, format!("expected at least 3 blocks, got {got}"));
    };

    let nodes = parse_block(record, "node", node_block)?;
    let edges = parse_block(record, "edge", edge_block)?;
    let labels = parse_block(record, "label", label_block)?;

    require_columns(record, "node", &nodes, 2)?;
    require_columns(record, "edge", &edges, 3)?;
    require_columns(record, "label", &labels, 3)?;

    let id = nodes[[0, 0]];
    check_identifier(record, "node", &nodes, id)?;
    check_identifier(record, "edge", &edges, id)?;
    check_identifier(record, "label", &labels, id)?;

    let from = index_column(record, "edge", &edges, 1)?;
    let to = index_column(record, "edge", &edges, 2)?;
    let endpoints = Array2::from_shape_fn((edges.nrows(), 2), |(e, end)| match end {
        0 => from[e],
        _ => to[e],
    });

    let x = Graph {
        nodes: tail(&nodes, 2).to_owned(),
        edges: endpoints,
        edge_features: tail(&edges, 3).to_owned(),
    };

    Ok(Sample {
        id,
        x,
        y: index_column(record, "label", &labels, 2)?,
        reference: tail(&labels, 2).iter().copied().collect(),
    })
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    fn record(value: &str) -> Record {
        Record::new("r0", value)
    }

    #[test]
    fn decomposes_the_blocks() {
        let rec = record("7 1 0.5 1.5,7 2 2 3;7 1 2 0.25;7 1 1 10,7 2 2 20;extra stuff");
        let sample = parse_record(&rec).unwrap();

        assert_eq!(sample.id, 7.0);
        assert_eq!(sample.x.nodes, array![[0.5, 1.5], [2.0, 3.0]]);
        assert_eq!(sample.x.edges, array![[0usize, 1]]);
        assert_eq!(sample.x.edge_features, array![[0.25]]);
        assert_eq!(sample.y, vec![0, 1]);
        assert_eq!(sample.reference, vec![1.0, 10.0, 2.0, 20.0]);
    }

    #[test]
    fn newlines_and_blank_rows_are_tolerated() {
        let rec = record("3 1 1\n,, 3 2 0\n;3 1 2;3 1 2,3 2 1");
        let sample = parse_record(&rec).unwrap();

        assert_eq!(sample.x.nodes, array![[1.0], [0.0]]);
        assert_eq!(sample.y, vec![1, 0]);
    }

    #[test]
    fn identifiers_must_agree_across_blocks() {
        let rec = record("7 1 0.5;7 1 1;8 1 1");
        let err = parse_record(&rec).unwrap_err();
        assert!(matches!(
            err,
            WorkerErr::IdentifierMismatch {
                block: "label",
                got: 8.0,
                ..
            }
        ));

        let rec = record("7 1 0.5,9 2 0.5;7 1 2;7 1 1,7 2 1");
        assert!(matches!(
            parse_record(&rec),
            Err(WorkerErr::IdentifierMismatch { block: "node", .. })
        ));
    }

    #[test]
    fn malformed_layouts_are_rejected() {
        let cases = [
            "7 1 0.5;7 1 2",
            "7 1 0.5;;7 1 1",
            "7 1 x;7 1 2;7 1 1",
            "7 1 0.5,7 2;7 1 2;7 1 1",
            "7 1 0.5;7 1;7 1 1",
            "7 1 0.5;7 0 1;7 1 1",
            "7 1 0.5;7 1 2;7 1 1.5",
        ];

        for case in cases {
            let res = parse_record(&record(case));
            assert!(
                matches!(res, Err(WorkerErr::MalformedRecord { .. })),
                "{case} should be rejected, got {res:?}"
            );
        }
    }
}
