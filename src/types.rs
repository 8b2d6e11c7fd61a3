//! Data structures produced by the ESIOS parsers
//!
//! All parsers hand ownership of these values to the caller; nothing is
//! retained between parse calls.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, FixedOffset, Utc};

/// Time-indexed table of named numeric series
///
/// Rows are timestamps, columns are series identifiers. Storage is a dense
/// row-major `f64` matrix. Two population models are supported:
///
/// - [`Table::zeroed`] builds the full matrix up front with every cell set
///   to `0.0`; parsers then overwrite cells in place. Sparse series never
///   leave cells unset, so later sum-style aggregation stays well defined.
/// - [`Table::upsert`] grows the table as observations arrive, keeping rows
///   in insertion order of first-seen timestamps (the indicator path).
///
/// Row lookup compares instants, so the same moment expressed in a
/// different UTC offset still resolves to the same row. An instant-keyed
/// map backs O(1) row lookup, keeping `upsert` linear over large payloads.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    index: Vec<DateTime<FixedOffset>>,
    columns: Vec<String>,
    values: Vec<Vec<f64>>,
    positions: HashMap<DateTime<Utc>, usize>,
}

impl Table {
    /// Create an empty table with no rows and no columns
    pub fn new() -> Self {
        Table {
            index: Vec::new(),
            columns: Vec::new(),
            values: Vec::new(),
            positions: HashMap::new(),
        }
    }

    /// Create a dense zero-filled table over the given index and columns
    pub fn zeroed(index: Vec<DateTime<FixedOffset>>, columns: Vec<String>) -> Self {
        let values = vec![vec![0.0; columns.len()]; index.len()];
        let positions = index
            .iter()
            .enumerate()
            .map(|(i, ts)| (ts.with_timezone(&Utc), i))
            .collect();
        Table {
            index,
            columns,
            values,
            positions,
        }
    }

    /// Row timestamps, in table order
    pub fn index(&self) -> &[DateTime<FixedOffset>] {
        &self.index
    }

    /// Column identifiers, in table order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of rows
    pub fn num_rows(&self) -> usize {
        self.index.len()
    }

    /// Number of columns
    pub fn num_cols(&self) -> usize {
        self.columns.len()
    }

    /// Position of a column identifier, if present
    pub fn column_position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Position of a timestamp row, compared by instant
    pub fn row_position(&self, ts: &DateTime<FixedOffset>) -> Option<usize> {
        self.positions.get(&ts.with_timezone(&Utc)).copied()
    }

    /// Cell value by row/column position
    pub fn value_at(&self, row: usize, col: usize) -> Option<f64> {
        self.values.get(row).and_then(|r| r.get(col)).copied()
    }

    /// Cell value by timestamp and column identifier
    pub fn get(&self, ts: &DateTime<FixedOffset>, column: &str) -> Option<f64> {
        let row = self.row_position(ts)?;
        let col = self.column_position(column)?;
        self.value_at(row, col)
    }

    /// All values of one column, in row order
    pub fn column_values(&self, name: &str) -> Option<Vec<f64>> {
        let col = self.column_position(name)?;
        Some(self.values.iter().map(|r| r[col]).collect())
    }

    /// One full row of values
    pub fn row(&self, row: usize) -> Option<&[f64]> {
        self.values.get(row).map(|r| r.as_slice())
    }

    /// Overwrite a cell in place. Positions must already exist.
    pub(crate) fn set(&mut self, row: usize, col: usize, value: f64) {
        self.values[row][col] = value;
    }

    /// Insert or overwrite the cell at (timestamp, column), growing the
    /// table as needed
    ///
    /// New rows append in first-seen order; new columns backfill existing
    /// rows with `0.0`. A duplicate (timestamp, column) pair overwrites:
    /// last write wins.
    pub fn upsert(&mut self, ts: DateTime<FixedOffset>, column: &str, value: f64) {
        let row = match self.row_position(&ts) {
            Some(r) => r,
            None => {
                let r = self.index.len();
                self.positions.insert(ts.with_timezone(&Utc), r);
                self.index.push(ts);
                self.values.push(vec![0.0; self.columns.len()]);
                r
            }
        };
        let col = match self.column_position(column) {
            Some(c) => c,
            None => {
                self.columns.push(column.to_string());
                for r in &mut self.values {
                    r.push(0.0);
                }
                self.columns.len() - 1
            }
        };
        self.values[row][col] = value;
    }

    /// Re-express the row index in the given UTC offset
    ///
    /// Presentation only: instants, row order and cell values are unchanged.
    pub fn convert_index(&mut self, offset: FixedOffset) {
        for ts in &mut self.index {
            *ts = ts.with_timezone(&offset);
        }
    }
}

impl Default for Table {
    fn default() -> Self {
        Table::new()
    }
}

/// One cell of a spreadsheet sheet
#[derive(Debug, Clone, PartialEq)]
pub enum SheetCell {
    /// Blank or unreadable cell
    Empty,
    /// Textual cell
    Text(String),
    /// Numeric cell (integers, floats and date serials)
    Number(f64),
    /// Boolean cell
    Bool(bool),
}

impl SheetCell {
    /// Text content, if this is a textual cell
    pub fn as_str(&self) -> Option<&str> {
        match self {
            SheetCell::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric content, if this is a numeric cell
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SheetCell::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Whether the cell is blank
    pub fn is_empty(&self) -> bool {
        matches!(self, SheetCell::Empty)
    }
}

/// One decoded spreadsheet sheet: column headers plus typed data rows
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    /// Column headers, taken from the sheet's header row
    pub headers: Vec<String>,
    /// Data rows, one `SheetCell` per header column
    pub rows: Vec<Vec<SheetCell>>,
}

impl Sheet {
    /// Number of data rows
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Position of a header, if present
    pub fn header_position(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }
}

/// Output of the price parser: the document's axis plus one flat value
/// vector per kept price metric
///
/// Vectors align 1:1 to `index` (the parser guarantees matching lengths).
/// The index stays in the document's native offsets.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    /// The document's hourly time axis
    pub index: Vec<DateTime<FixedOffset>>,
    /// Metric key (`"<TipoPrecio>_<TerminoCosteHorario>"`) to values
    pub values: BTreeMap<String, Vec<f64>>,
}

impl PriceSeries {
    /// Metric keys in sorted order
    pub fn metrics(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(|k| k.as_str())
    }

    /// Values of one metric, aligned to `index`
    pub fn get(&self, metric: &str) -> Option<&[f64]> {
        self.values.get(metric).map(|v| v.as_slice())
    }
}

/// A parsed archive bundle: human-readable sheet label to decoded sheet
///
/// Built from the spreadsheet's directory sheet; the reserved sentinel
/// entry is never present.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArchiveBundle {
    sheets: BTreeMap<String, Sheet>,
}

impl ArchiveBundle {
    /// Create an empty bundle
    pub fn new() -> Self {
        ArchiveBundle {
            sheets: BTreeMap::new(),
        }
    }

    /// Insert a sheet under its label
    pub fn insert(&mut self, label: String, sheet: Sheet) {
        self.sheets.insert(label, sheet);
    }

    /// Look up a sheet by label
    pub fn get(&self, label: &str) -> Option<&Sheet> {
        self.sheets.get(label)
    }

    /// Whether a label is present
    pub fn contains(&self, label: &str) -> bool {
        self.sheets.contains_key(label)
    }

    /// Labels in sorted order
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.sheets.keys().map(|k| k.as_str())
    }

    /// (label, sheet) pairs in sorted label order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Sheet)> {
        self.sheets.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of sheets
    pub fn len(&self) -> usize {
        self.sheets.len()
    }

    /// Whether the bundle holds no sheets
    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }
}
