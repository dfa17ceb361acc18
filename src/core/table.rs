//! Columnar in-memory tables.
//!
//! A [`Table`] is an immutable, explicitly typed set of named columns that
//! share one row count. The loader produces tables, the joiner reads typed
//! views out of them, and the sinks consume them. Every transformation
//! returns a new table.

use crate::error::{JoinError, Result};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

/// Opaque event identifier, carried through unchanged.
pub type EventId = i64;

const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;

/// A single typed column.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    /// Floating-point values; missing cells are NaN
    Float(Vec<f64>),
    /// Integer values
    Int(Vec<i64>),
    /// Boolean values
    Bool(Vec<bool>),
    /// Anything that did not parse as one of the above
    Text(Vec<String>),
    /// Event labels written by tagging; `None` means unmatched
    Label(Vec<Option<EventId>>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Float(v) => v.len(),
            Column::Int(v) => v.len(),
            Column::Bool(v) => v.len(),
            Column::Text(v) => v.len(),
            Column::Label(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Short type name used in schema listings and error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Column::Float(_) => "float",
            Column::Int(_) => "int",
            Column::Bool(_) => "bool",
            Column::Text(_) => "text",
            Column::Label(_) => "label",
        }
    }

    /// Render one cell for text output. NaN and unmatched labels render empty.
    pub fn cell(&self, row: usize) -> String {
        match self {
            Column::Float(v) => {
                let x = v[row];
                if x.is_nan() {
                    String::new()
                } else {
                    x.to_string()
                }
            }
            Column::Int(v) => v[row].to_string(),
            Column::Bool(v) => (if v[row] { "True" } else { "False" }).to_string(),
            Column::Text(v) => v[row].clone(),
            Column::Label(v) => v[row].map(|id| id.to_string()).unwrap_or_default(),
        }
    }

    /// Keep only the rows where `mask` is true.
    fn retain(&self, mask: &[bool]) -> Column {
        fn pick<T: Clone>(values: &[T], mask: &[bool]) -> Vec<T> {
            values
                .iter()
                .zip(mask)
                .filter(|(_, &keep)| keep)
                .map(|(v, _)| v.clone())
                .collect()
        }

        match self {
            Column::Float(v) => Column::Float(pick(v, mask)),
            Column::Int(v) => Column::Int(pick(v, mask)),
            Column::Bool(v) => Column::Bool(pick(v, mask)),
            Column::Text(v) => Column::Text(pick(v, mask)),
            Column::Label(v) => Column::Label(pick(v, mask)),
        }
    }

    /// Whether the cell at `row` equals the textual `value`, compared in the
    /// column's own type.
    fn cell_equals(&self, row: usize, value: &str) -> bool {
        match self {
            Column::Float(v) => value.parse::<f64>().map(|x| v[row] == x).unwrap_or(false),
            Column::Int(v) => match value.parse::<i64>() {
                Ok(x) => v[row] == x,
                Err(_) => value
                    .parse::<f64>()
                    .map(|x| v[row] as f64 == x)
                    .unwrap_or(false),
            },
            Column::Bool(v) => parse_bool(value).map(|b| v[row] == b).unwrap_or(false),
            Column::Text(v) => v[row] == value,
            Column::Label(v) => {
                if value.is_empty() {
                    v[row].is_none()
                } else {
                    value.parse::<i64>().map(|x| v[row] == Some(x)).unwrap_or(false)
                }
            }
        }
    }
}

/// Parse the boolean spellings found in tabular exports.
pub fn parse_bool(s: &str) -> Option<bool> {
    match s.trim() {
        "True" | "true" | "TRUE" => Some(true),
        "False" | "false" | "FALSE" => Some(false),
        _ => None,
    }
}

/// An immutable table of named columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    name: String,
    columns: Vec<(String, Column)>,
    rows: usize,
}

impl Table {
    /// Create an empty table with no columns.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            rows: 0,
        }
    }

    /// Build a table from named columns, which must all have the same length.
    pub fn from_columns(name: impl Into<String>, columns: Vec<(String, Column)>) -> Result<Self> {
        let name = name.into();
        let rows = columns.first().map(|(_, c)| c.len()).unwrap_or(0);

        for (col_name, column) in &columns {
            if column.len() != rows {
                return Err(JoinError::InvalidSchema(format!(
                    "{name} table column '{col_name}' has {} rows, expected {rows}",
                    column.len()
                )));
            }
        }

        for (i, (col_name, _)) in columns.iter().enumerate() {
            if columns[..i].iter().any(|(other, _)| other == col_name) {
                return Err(JoinError::InvalidSchema(format!(
                    "{name} table has duplicate column '{col_name}'"
                )));
            }
        }

        Ok(Self {
            name,
            columns,
            rows,
        })
    }

    /// Table name, used in error messages.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Column names in table order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    /// Named columns in table order.
    pub fn columns(&self) -> impl Iterator<Item = (&str, &Column)> {
        self.columns.iter().map(|(name, col)| (name.as_str(), col))
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|(n, _)| n == name)
    }

    /// Look up a column, failing with `InvalidSchema` if it is absent.
    pub fn column(&self, name: &str) -> Result<&Column> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, c)| c)
            .ok_or_else(|| JoinError::missing_column(&self.name, name))
    }

    /// Read a numeric column as floats. Integer columns are widened.
    pub fn floats(&self, name: &str) -> Result<Cow<'_, [f64]>> {
        match self.column(name)? {
            Column::Float(v) => Ok(Cow::Borrowed(v.as_slice())),
            Column::Int(v) => Ok(Cow::Owned(v.iter().map(|&x| x as f64).collect())),
            other => Err(self.wrong_type(name, other, "numeric")),
        }
    }

    /// Read a column as integers. Float columns are accepted when every value
    /// is integral.
    pub fn ints(&self, name: &str) -> Result<Cow<'_, [i64]>> {
        match self.column(name)? {
            Column::Int(v) => Ok(Cow::Borrowed(v.as_slice())),
            Column::Float(v) => v
                .iter()
                .map(|&x| {
                    // 2^63 is exactly representable; i64::MAX is not.
                    if x.fract() == 0.0 && (-I64_BOUND..I64_BOUND).contains(&x) {
                        Ok(x as i64)
                    } else {
                        Err(JoinError::InvalidSchema(format!(
                            "{} table column '{name}' holds non-integer value {x}",
                            self.name
                        )))
                    }
                })
                .collect::<Result<Vec<_>>>()
                .map(Cow::Owned),
            other => Err(self.wrong_type(name, other, "integer")),
        }
    }

    /// Read a column as booleans. Integer 0/1 columns are accepted.
    pub fn bools(&self, name: &str) -> Result<Cow<'_, [bool]>> {
        match self.column(name)? {
            Column::Bool(v) => Ok(Cow::Borrowed(v.as_slice())),
            Column::Int(v) if v.iter().all(|&x| x == 0 || x == 1) => {
                Ok(Cow::Owned(v.iter().map(|&x| x == 1).collect()))
            }
            other => Err(self.wrong_type(name, other, "boolean")),
        }
    }

    /// Return a copy of this table with `column` added, replacing any existing
    /// column with the same name in place.
    pub fn with_column(&self, name: &str, column: Column) -> Result<Table> {
        if !self.columns.is_empty() && column.len() != self.rows {
            return Err(JoinError::InvalidSchema(format!(
                "column '{name}' has {} rows but {} table has {}",
                column.len(),
                self.name,
                self.rows
            )));
        }

        let mut table = self.clone();
        table.rows = column.len();
        match table.columns.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = column,
            None => table.columns.push((name.to_string(), column)),
        }
        Ok(table)
    }

    /// Project onto the named columns, in the order given.
    pub fn select(&self, names: &[&str]) -> Result<Table> {
        let columns = names
            .iter()
            .map(|&n| Ok((n.to_string(), self.column(n)?.clone())))
            .collect::<Result<Vec<_>>>()?;
        Table::from_columns(self.name.clone(), columns)
    }

    /// Keep only the rows matching `filter`.
    pub fn filter(&self, filter: &RowFilter) -> Result<Table> {
        let column = self.column(&filter.column)?;
        let mask: Vec<bool> = (0..self.rows)
            .map(|row| column.cell_equals(row, &filter.value))
            .collect();
        self.filter_mask(&mask)
    }

    /// Keep only the rows where `mask` is true.
    pub fn filter_mask(&self, mask: &[bool]) -> Result<Table> {
        if mask.len() != self.rows {
            return Err(JoinError::InvalidSchema(format!(
                "row mask has {} entries but {} table has {} rows",
                mask.len(),
                self.name,
                self.rows
            )));
        }

        let columns = self
            .columns
            .iter()
            .map(|(n, c)| (n.clone(), c.retain(mask)))
            .collect();
        Ok(Table {
            name: self.name.clone(),
            columns,
            rows: mask.iter().filter(|&&keep| keep).count(),
        })
    }

    fn wrong_type(&self, name: &str, column: &Column, expected: &str) -> JoinError {
        JoinError::InvalidSchema(format!(
            "{} table column '{name}' is {}, expected {expected}",
            self.name,
            column.type_name()
        ))
    }
}

/// Row predicate of the form `column=value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowFilter {
    pub column: String,
    pub value: String,
}

impl RowFilter {
    pub fn new(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }
}

impl FromStr for RowFilter {
    type Err = JoinError;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once('=') {
            Some((column, value)) if !column.trim().is_empty() => {
                Ok(RowFilter::new(column.trim(), value.trim()))
            }
            _ => Err(JoinError::InvalidRange(format!(
                "row filter '{s}' is not of the form column=value"
            ))),
        }
    }
}

impl fmt::Display for RowFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.column, self.value)
    }
}
