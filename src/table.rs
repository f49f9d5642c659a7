/*!
Run table
=========

One row per simulation run, one column per parameter or metric. Columns are
looked up by name; a name that is absent, or that appears as more than one
column heading, is a configuration error at the point of lookup, so metadata
and run data can never be silently coupled through column order.

Columns in which every cell parses as a number are stored as numbers. Empty
and `NA` cells are missing values; they are stored as NaN, which no tolerance
ever accepts. Everything else (NetLogo booleans, category labels) is kept as
text and only takes part in equality matching.
 */

use crate::error::{AbcError, Result};
use crate::metadata::{MetricSpec, ParameterSpec};
use rustc_hash::FxHashMap;
use std::fs::File;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Numeric(Vec<f64>),
    Text(Vec<String>),
}

fn is_missing(cell: &str) -> bool {
    cell.is_empty() || cell == "NA"
}

impl Column {
    /// A numeric column needs at least one number; the other cells may be
    /// missing.
    fn from_cells(cells: Vec<String>) -> Column {
        let parsed: Option<Vec<f64>> = cells
            .iter()
            .map(|c| {
                if is_missing(c) {
                    Some(f64::NAN)
                } else {
                    c.parse::<f64>().ok()
                }
            })
            .collect();
        match parsed {
            Some(values) if cells.is_empty() || cells.iter().any(|c| !is_missing(c)) => {
                Column::Numeric(values)
            }
            _ => Column::Text(cells),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Column::Numeric(v) => v.len(),
            Column::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_numeric(&self) -> Option<&[f64]> {
        match self {
            Column::Numeric(v) => Some(v),
            Column::Text(_) => None,
        }
    }

    /// Whether the cell in `row` equals the label `s`. Numeric cells compare
    /// numerically when `s` is a number.
    pub fn matches(&self, row: usize, s: &str) -> bool {
        let s = s.trim();
        match self {
            Column::Numeric(v) => match s.parse::<f64>() {
                Ok(x) => v[row] == x,
                Err(_) => false,
            },
            Column::Text(v) => v[row] == s,
        }
    }

    fn select(&self, rows: &[usize]) -> Column {
        match self {
            Column::Numeric(v) => Column::Numeric(rows.iter().map(|&r| v[r]).collect()),
            Column::Text(v) => Column::Text(rows.iter().map(|&r| v[r].clone()).collect()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunTable {
    headers: Vec<String>,
    columns: Vec<Column>,
    /// For each distinct header, every column index carrying it.
    index: FxHashMap<String, Vec<usize>>,
    rows: usize,
    source: String,
}

pub(crate) fn open_input(path: &Path, what: &str) -> Result<File> {
    if !path.exists() {
        return Err(AbcError::configuration(format!(
            "{} {} does not exist",
            what,
            path.display()
        )));
    }
    Ok(File::open(path)?)
}

impl RunTable {
    pub fn new(headers: Vec<String>, columns: Vec<Column>) -> Result<RunTable> {
        if headers.len() != columns.len() {
            return Err(AbcError::configuration(format!(
                "{} column headings for {} columns",
                headers.len(),
                columns.len()
            )));
        }
        let rows = columns.first().map(Column::len).unwrap_or(0);
        if let Some((h, c)) = headers.iter().zip(&columns).find(|(_, c)| c.len() != rows) {
            return Err(AbcError::configuration(format!(
                "Column {} has {} rows, expected {}",
                h,
                c.len(),
                rows
            )));
        }
        let mut index: FxHashMap<String, Vec<usize>> = FxHashMap::default();
        for (i, h) in headers.iter().enumerate() {
            index.entry(h.clone()).or_insert_with(Vec::new).push(i);
        }
        Ok(RunTable {
            headers,
            columns,
            index,
            rows,
            source: String::from("<memory>"),
        })
    }

    /// Build a table of numeric columns, mostly useful for tests and for
    /// callers that hold their run data in memory already.
    pub fn from_numeric_columns(columns: Vec<(&str, Vec<f64>)>) -> Result<RunTable> {
        let (headers, columns) = columns
            .into_iter()
            .map(|(h, v)| (h.to_string(), Column::Numeric(v)))
            .unzip();
        RunTable::new(headers, columns)
    }

    pub fn read<R: std::io::Read>(rdr: R, delimiter: u8) -> Result<RunTable> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .delimiter(delimiter)
            .trim(csv::Trim::All)
            .from_reader(rdr);
        let headers: Vec<String> = reader.headers()?.iter().map(String::from).collect();
        let mut cells: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
        for record in reader.records() {
            let record = record?;
            for (column, cell) in cells.iter_mut().zip(record.iter()) {
                column.push(cell.to_string());
            }
        }
        let columns = cells.into_iter().map(Column::from_cells).collect();
        RunTable::new(headers, columns)
    }

    pub fn load<P: AsRef<Path>>(path: P, delimiter: u8) -> Result<RunTable> {
        let path = path.as_ref();
        let file = open_input(path, "Run data file")?;
        let mut table = RunTable::read(file, delimiter)?;
        table.source = path.display().to_string();
        info!(
            "Read {} runs with {} columns from {}",
            table.rows,
            table.headers.len(),
            table.source
        );
        Ok(table)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    fn column_index(&self, name: &str) -> Result<usize> {
        match self.index.get(name).map(Vec::as_slice) {
            None | Some([]) => Err(AbcError::configuration(format!(
                "{} does not appear as a column heading in run data file {}",
                name, self.source
            ))),
            Some([i]) => Ok(*i),
            Some(_) => Err(AbcError::configuration(format!(
                "{} appears more than once as a column heading in run data file {}",
                name, self.source
            ))),
        }
    }

    pub fn column(&self, name: &str) -> Result<&Column> {
        Ok(&self.columns[self.column_index(name)?])
    }

    pub fn numeric_column(&self, name: &str) -> Result<&[f64]> {
        self.column(name)?.as_numeric().ok_or_else(|| {
            AbcError::configuration(format!(
                "Column {} in run data file {} is not numeric",
                name, self.source
            ))
        })
    }

    /// Check that every parameter and metric named in the metadata appears as
    /// exactly one column.
    pub fn check_names(&self, parameters: &[ParameterSpec], metrics: &[MetricSpec]) -> Result<()> {
        for p in parameters {
            self.column_index(&p.name).map_err(|e| match e {
                AbcError::Configuration(m) => AbcError::configuration(format!("Parameter name {}", m)),
                e => e,
            })?;
        }
        for m in metrics {
            self.column_index(&m.name).map_err(|e| match e {
                AbcError::Configuration(msg) => AbcError::configuration(format!("Metric name {}", msg)),
                e => e,
            })?;
        }
        Ok(())
    }

    /// A new table holding only the given rows, in the given order.
    pub fn select_rows(&self, rows: &[usize]) -> RunTable {
        RunTable {
            headers: self.headers.clone(),
            columns: self.columns.iter().map(|c| c.select(rows)).collect(),
            index: self.index.clone(),
            rows: rows.len(),
            source: self.source.clone(),
        }
    }
}
