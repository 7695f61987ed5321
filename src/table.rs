use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Instant;

use polars::prelude::*;
use rayon::prelude::*;
use tracing::{debug, info, instrument};

use crate::domain::AnalyzerError;

pub const NULL_SYMBOL: &str = "∅";

/// Column category, decided once when the table is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Numeric,
    Text,
    Other,
}

impl ColumnKind {
    fn from_dtype(dtype: &DataType) -> Self {
        match dtype {
            DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64 => ColumnKind::Numeric,
            DataType::String => ColumnKind::Text,
            _ => ColumnKind::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValues {
    Numeric(Vec<Option<f64>>), // NaN is stored as None
    Text(Vec<Option<String>>),
}

#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub dtype: String,
    pub kind: ColumnKind,
    pub values: ColumnValues,
    pub display: Vec<String>,
    pub max_width: usize,
}

impl Column {
    pub fn len(&self) -> usize {
        self.display.len()
    }

    pub fn null_count(&self) -> usize {
        match &self.values {
            ColumnValues::Numeric(v) => v.iter().filter(|x| x.is_none()).count(),
            ColumnValues::Text(v) => v.iter().filter(|x| x.is_none()).count(),
        }
    }

    pub fn non_null_count(&self) -> usize {
        self.len() - self.null_count()
    }

    /// Number of distinct non-missing values.
    pub fn unique_count(&self) -> usize {
        match &self.values {
            ColumnValues::Numeric(v) => v
                .iter()
                .flatten()
                // fold -0.0 into 0.0 so both compare equal
                .map(|x| (x + 0.0).to_bits())
                .collect::<HashSet<u64>>()
                .len(),
            ColumnValues::Text(v) => v.iter().flatten().collect::<HashSet<&String>>().len(),
        }
    }

    pub fn numbers(&self) -> Option<&[Option<f64>]> {
        match &self.values {
            ColumnValues::Numeric(v) => Some(v),
            ColumnValues::Text(_) => None,
        }
    }

    /// Present values of a numeric column, in row order.
    pub fn present_numbers(&self) -> Vec<f64> {
        self.numbers()
            .map(|v| v.iter().flatten().copied().collect())
            .unwrap_or_default()
    }

    /// Frequency of each non-missing value, most frequent first.
    /// Ties keep the order in which values first appear.
    pub fn value_counts(&self) -> Vec<(String, usize)> {
        let cells: Vec<Option<&str>> = match &self.values {
            ColumnValues::Text(v) => v.iter().map(|c| c.as_deref()).collect(),
            ColumnValues::Numeric(_) => self
                .display
                .iter()
                .zip(self.numbers().unwrap_or_default())
                .map(|(d, n)| n.map(|_| d.as_str()))
                .collect(),
        };

        let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
        for (ridx, cell) in cells.into_iter().enumerate() {
            if let Some(value) = cell {
                counts.entry(value).or_insert((0, ridx)).0 += 1;
            }
        }
        let mut sorted: Vec<(&str, (usize, usize))> = counts.into_iter().collect();
        sorted.sort_unstable_by(|(_, (ca, fa)), (_, (cb, fb))| cb.cmp(ca).then(fa.cmp(fb)));
        sorted
            .into_iter()
            .map(|(value, (count, _))| (value.to_string(), count))
            .collect()
    }
}

/// The loaded data. Immutable until replaced by the next successful load.
#[derive(Debug, Clone)]
pub struct Table {
    path: PathBuf,
    name: String,
    columns: Vec<Column>,
    nrows: usize,
    estimated_size: usize,
}

impl Table {
    #[instrument]
    pub fn load(path: &Path) -> Result<Self, AnalyzerError> {
        Table::check_file(path)?;
        let start_time = Instant::now();

        let df = Table::load_csv(path)?.collect()?;
        let table = Table::from_frame(path, &df)?;

        info!(
            "Loaded {} rows, {} columns in {}ms",
            table.nrows(),
            table.ncols(),
            start_time.elapsed().as_millis()
        );
        Ok(table)
    }

    /// Extracts every column of `df`. Each column is converted on its own rayon worker.
    pub fn from_frame(path: &Path, df: &DataFrame) -> Result<Self, AnalyzerError> {
        let names: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|n| n.to_string())
            .collect();
        let columns = names
            .par_iter()
            .map(|name| Table::load_column(df, name))
            .collect::<Result<Vec<Column>, PolarsError>>()?;

        for c in columns.iter() {
            debug!(
                "Column \"{}\": {} ({:?}), max width {}",
                c.name, c.dtype, c.kind, c.max_width
            );
        }

        let name = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("???")
            .to_string();

        Ok(Table {
            path: path.to_path_buf(),
            name,
            columns,
            nrows: df.height(),
            estimated_size: df.estimated_size(),
        })
    }

    fn check_file(path: &Path) -> Result<(), AnalyzerError> {
        let metadata = fs::metadata(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => AnalyzerError::FileNotFound,
            ErrorKind::PermissionDenied => AnalyzerError::PermissionDenied,
            _ => AnalyzerError::IoError(e),
        })?;
        if !metadata.is_file() {
            return Err(AnalyzerError::LoadingFailed("Not a file!".into()));
        }
        Ok(())
    }

    fn load_csv(path: &Path) -> Result<LazyFrame, PolarsError> {
        LazyCsvReader::new(PlPath::Local(path.into()))
            .with_has_header(true)
            .with_infer_schema_length(None)
            .finish()
    }

    fn load_column(df: &DataFrame, name: &str) -> Result<Column, PolarsError> {
        let source = df.column(name)?;
        let dtype = source.dtype().clone();
        let kind = ColumnKind::from_dtype(&dtype);

        let text = source.cast(&DataType::String)?;
        let series = text.str()?;
        let mut cells = Vec::with_capacity(series.len());
        let mut display = Vec::with_capacity(series.len());
        let mut max_width = 0;
        for value in series.into_iter() {
            let shown = match value {
                Some(s) => s.replace("\r\n", " ↵ ").replace('\n', " ↵ "),
                None => NULL_SYMBOL.to_string(),
            };
            max_width = max_width.max(shown.chars().count());
            display.push(shown);
            cells.push(value.map(str::to_string));
        }

        let values = match kind {
            ColumnKind::Numeric => {
                let floats = source.cast(&DataType::Float64)?;
                ColumnValues::Numeric(
                    floats
                        .f64()?
                        .into_iter()
                        .map(|v| v.filter(|x| !x.is_nan()))
                        .collect(),
                )
            }
            ColumnKind::Text | ColumnKind::Other => ColumnValues::Text(cells),
        };

        Ok(Column {
            name: name.to_string(),
            dtype: dtype.to_string(),
            kind,
            values,
            display,
            max_width,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.columns.len()
    }

    /// Approximate in-memory size of the parsed frame in bytes.
    pub fn estimated_size(&self) -> usize {
        self.estimated_size
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn numeric_columns(&self) -> Vec<&Column> {
        self.columns_of(ColumnKind::Numeric)
    }

    pub fn text_columns(&self) -> Vec<&Column> {
        self.columns_of(ColumnKind::Text)
    }

    fn columns_of(&self, kind: ColumnKind) -> Vec<&Column> {
        self.columns.iter().filter(|c| c.kind == kind).collect()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn fixture(name: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("fixtures")
            .join(name)
    }

    pub(crate) fn load_fixture(name: &str) -> Table {
        Table::load(&fixture(name)).expect("fixture should load")
    }

    #[test]
    fn load_reports_shape() {
        let table = load_fixture("example.csv");
        assert_eq!(table.nrows(), 5);
        assert_eq!(table.ncols(), 3);
        assert_eq!(table.name(), "example.csv");
        assert!(table.estimated_size() > 0);
    }

    #[test]
    fn column_kinds_are_inferred() {
        let table = load_fixture("numbers.csv");
        let kinds: Vec<ColumnKind> = table.columns().iter().map(|c| c.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ColumnKind::Numeric,
                ColumnKind::Numeric,
                ColumnKind::Numeric,
                ColumnKind::Other,
                ColumnKind::Text,
            ]
        );
        assert_eq!(table.numeric_columns().len(), 3);
        assert_eq!(table.text_columns().len(), 1);
    }

    #[test]
    fn empty_fields_are_missing() {
        let table = load_fixture("example.csv");
        let a = &table.columns()[0];
        assert_eq!(a.name, "a");
        assert_eq!(a.null_count(), 1);
        assert_eq!(a.non_null_count(), 4);
        assert_eq!(a.unique_count(), 4);
        assert_eq!(a.display[2], NULL_SYMBOL);
        assert_eq!(a.present_numbers(), vec![1.0, 2.0, 4.0, 5.0]);
    }

    #[test]
    fn value_counts_order_by_frequency_then_appearance() {
        let table = load_fixture("text_only.csv");
        let city = &table.columns()[0];
        assert_eq!(
            city.value_counts(),
            vec![
                ("Paris".to_string(), 2),
                ("Berlin".to_string(), 1),
                ("Rome".to_string(), 1),
            ]
        );
    }

    #[test]
    fn missing_file_is_reported() {
        let err = Table::load(&fixture("does_not_exist.csv")).unwrap_err();
        assert!(matches!(err, AnalyzerError::FileNotFound));
    }

    #[test]
    fn directory_is_rejected() {
        let err = Table::load(&fixture("")).unwrap_err();
        assert!(matches!(err, AnalyzerError::LoadingFailed(_)));
    }
}
