//! CSV loader producing [`Table`]s.
//!
//! Column types are inferred from the cells: integer, then float (empty and
//! `nan` cells become NaN), then boolean (`True`/`False`), otherwise text.

use crate::core::table::{parse_bool, Column, Table};
use crate::error::Result;
use std::io;
use std::path::Path;

/// Load a CSV file with a header row. The table is named after the file stem.
pub fn load_csv(path: &Path) -> Result<Table> {
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "table".to_string());
    let file = std::fs::File::open(path)?;
    let table = read_csv(name, file)?;

    tracing::info!(
        "loaded {} rows x {} columns from {:?}",
        table.len(),
        table.column_names().count(),
        path
    );
    Ok(table)
}

/// Read CSV with a header row from any reader.
pub fn read_csv<R: io::Read>(name: impl Into<String>, reader: R) -> Result<Table> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = csv_reader.headers()?.iter().map(str::to_string).collect();
    let mut cells: Vec<Vec<String>> = vec![Vec::new(); headers.len()];

    for record in csv_reader.records() {
        let record = record?;
        for (i, column) in cells.iter_mut().enumerate() {
            column.push(record.get(i).unwrap_or("").to_string());
        }
    }

    let columns = headers
        .into_iter()
        .zip(cells)
        .map(|(header, values)| (header, infer_column(values)))
        .collect();

    Table::from_columns(name, columns)
}

/// Pick the narrowest column type every cell parses as.
fn infer_column(values: Vec<String>) -> Column {
    if values.is_empty() {
        return Column::Float(Vec::new());
    }

    if let Some(ints) = values
        .iter()
        .map(|v| v.parse::<i64>().ok())
        .collect::<Option<Vec<_>>>()
    {
        return Column::Int(ints);
    }

    if let Some(floats) = values
        .iter()
        .map(|v| {
            if v.is_empty() {
                Some(f64::NAN)
            } else {
                v.parse::<f64>().ok()
            }
        })
        .collect::<Option<Vec<_>>>()
    {
        return Column::Float(floats);
    }

    if let Some(bools) = values
        .iter()
        .map(|v| parse_bool(v))
        .collect::<Option<Vec<_>>>()
    {
        return Column::Bool(bools);
    }

    Column::Text(values)
}
