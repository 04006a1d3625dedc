use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use ndarray::Array2;

use crate::{MlErr, Result};

/// A parsed csv file where every column but the last one is a numeric feature and the
/// last one is the raw label.
#[derive(Clone, Debug, PartialEq)]
pub struct CsvTable {
    pub feature_names: Vec<String>,
    pub label_name: String,
    pub features: Array2<f32>,
    pub labels: Vec<String>,
}

/// Reads and parses the csv file at `path`.
pub fn read_csv<P: AsRef<Path>>(path: P) -> Result<CsvTable> {
    let file = File::open(path)?;
    parse_csv(BufReader::new(file))
}

/// Parses a csv with a header row. Blank lines are ignored.
///
/// # Errors
/// `MlErr::Parse` with the offending line number (starting at 1) on ragged rows or
/// non numeric features, `MlErr::EmptyDataset` if there are no data rows.
pub fn parse_csv<R: BufRead>(reader: R) -> Result<CsvTable> {
    let mut lines = reader
        .lines()
        .enumerate()
        .map(|(i, line)| line.map(|l| (i + 1, l)))
        .filter(|line| !matches!(line, Ok((_, l)) if l.trim().is_empty()));

    let Some(header) = lines.next() else {
        return Err(MlErr::EmptyDataset);
    };
    let (_, header) = header?;
    let mut columns = split_fields(&header);

    if columns.len() < 2 {
        return Err(MlErr::Parse {
            line: 1,
            msg: "expected at least one feature column and a label column".into(),
        });
    }

    let label_name = columns.pop().unwrap_or_default();
    let x_size = columns.len();
    let mut features = Vec::new();
    let mut labels = Vec::new();

    for line in lines {
        let (number, line) = line?;
        let mut fields = split_fields(&line);

        if fields.len() != x_size + 1 {
            return Err(MlErr::Parse {
                line: number,
                msg: format!("expected {} fields, got {}", x_size + 1, fields.len()),
            });
        }

        labels.push(fields.pop().unwrap_or_default());

        for (field, name) in fields.iter().zip(&columns) {
            let value = field.parse::<f32>().map_err(|_| MlErr::Parse {
                line: number,
                msg: format!("column {name} has a non numeric value {field:?}"),
            })?;
            features.push(value);
        }
    }

    if labels.is_empty() {
        return Err(MlErr::EmptyDataset);
    }

    Ok(CsvTable {
        feature_names: columns,
        label_name,
        features: Array2::from_shape_vec((labels.len(), x_size), features)?,
        labels,
    })
}

fn split_fields(line: &str) -> Vec<String> {
    line.split(',')
        .map(|field| field.trim().trim_matches('"').to_string())
        .collect()
}
