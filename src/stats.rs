use std::fmt;

use rayon::prelude::*;
use tracing::{debug, instrument};

use crate::table::{Column, Table};

pub const MAX_CATEGORICAL_COLUMNS: usize = 5;
pub const TOP_VALUES: usize = 5;

pub const SECTION_OVERVIEW: &str = "=== DATASET OVERVIEW ===";
pub const SECTION_COLUMNS: &str = "=== COLUMN INFORMATION ===";
pub const SECTION_NUMERIC: &str = "=== NUMERICAL STATISTICS ===";
pub const SECTION_CORRELATION: &str = "=== CORRELATION MATRIX ===";
pub const SECTION_CATEGORICAL: &str = "=== CATEGORICAL ANALYSIS ===";
pub const SECTION_MISSING: &str = "=== MISSING DATA ===";

const DESCRIBE_ROWS: [&str; 8] = ["count", "mean", "std", "min", "25%", "50%", "75%", "max"];

#[derive(Debug, Clone, PartialEq)]
pub struct NumericSummary {
    pub name: String,
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub q25: f64,
    pub q50: f64,
    pub q75: f64,
    pub max: f64,
}

impl NumericSummary {
    pub fn from_column(column: &Column) -> Self {
        let mut values = column.present_numbers();
        values.sort_by(f64::total_cmp);

        let count = values.len();
        let mean = if count == 0 {
            f64::NAN
        } else {
            values.iter().sum::<f64>() / count as f64
        };
        let std = if count < 2 {
            f64::NAN
        } else {
            let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (count - 1) as f64;
            var.sqrt()
        };

        NumericSummary {
            name: column.name.clone(),
            count,
            mean,
            std,
            min: values.first().copied().unwrap_or(f64::NAN),
            q25: quantile(&values, 0.25),
            q50: quantile(&values, 0.5),
            q75: quantile(&values, 0.75),
            max: values.last().copied().unwrap_or(f64::NAN),
        }
    }

    fn row(&self) -> [f64; 8] {
        [
            self.count as f64,
            self.mean,
            self.std,
            self.min,
            self.q25,
            self.q50,
            self.q75,
            self.max,
        ]
    }
}

/// Quantile of already sorted values using linear interpolation between closest ranks.
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let idx = (sorted.len() - 1) as f64 * q;
    let lower = idx.floor() as usize;
    let upper = idx.ceil() as usize;
    if lower == upper {
        sorted[lower]
    } else {
        let fraction = idx - lower as f64;
        sorted[lower] * (1.0 - fraction) + sorted[upper] * fraction
    }
}

/// Pearson coefficient over the rows where both values are present.
/// Returns NaN when fewer than two pairs exist or either side has zero variance.
pub fn pearson(x: &[Option<f64>], y: &[Option<f64>]) -> f64 {
    let pairs: Vec<(f64, f64)> = x
        .iter()
        .zip(y.iter())
        .filter_map(|(a, b)| Some(((*a)?, (*b)?)))
        .collect();
    if pairs.len() < 2 {
        return f64::NAN;
    }

    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (a, b) in pairs.iter() {
        let dx = a - mean_x;
        let dy = b - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        f64::NAN
    } else {
        (cov / (var_x.sqrt() * var_y.sqrt())).clamp(-1.0, 1.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationMatrix {
    pub names: Vec<String>,
    pub values: Vec<Vec<f64>>,
}

impl CorrelationMatrix {
    pub fn from_columns(columns: &[&Column]) -> Self {
        let n = columns.len();
        let mut values = vec![vec![f64::NAN; n]; n];
        for i in 0..n {
            for j in i..n {
                let r = match (columns[i].numbers(), columns[j].numbers()) {
                    (Some(x), Some(y)) => pearson(x, y),
                    _ => f64::NAN,
                };
                values[i][j] = r;
                values[j][i] = r;
            }
        }
        CorrelationMatrix {
            names: columns.iter().map(|c| c.name.clone()).collect(),
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn render(&self) -> String {
        let rows: Vec<(String, Vec<String>)> = self
            .names
            .iter()
            .zip(self.values.iter())
            .map(|(name, row)| (name.clone(), row.iter().map(|v| format_stat(*v)).collect()))
            .collect();
        format_grid(&self.names, &rows)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnInfo {
    pub name: String,
    pub dtype: String,
    pub non_null: usize,
    pub unique: usize,
    pub nulls: usize,
}

/// All statistics sections derived from one table. Recomputed on every request.
#[derive(Debug, Clone)]
pub struct StatisticsReport {
    pub nrows: usize,
    pub ncols: usize,
    pub memory_bytes: usize,
    pub columns: Vec<ColumnInfo>,
    pub numeric: Vec<NumericSummary>,
    pub correlation: Option<CorrelationMatrix>,
    pub categorical: Vec<(String, Vec<(String, usize)>)>,
}

impl StatisticsReport {
    #[instrument(skip_all, fields(table = table.name()))]
    pub fn compute(table: &Table) -> Self {
        let columns = table
            .columns()
            .par_iter()
            .map(|c| ColumnInfo {
                name: c.name.clone(),
                dtype: c.dtype.clone(),
                non_null: c.non_null_count(),
                unique: c.unique_count(),
                nulls: c.null_count(),
            })
            .collect();

        let numeric_columns = table.numeric_columns();
        let numeric = describe(&numeric_columns);
        let correlation = if numeric_columns.len() > 1 {
            Some(CorrelationMatrix::from_columns(&numeric_columns))
        } else {
            None
        };

        let categorical = table
            .text_columns()
            .into_iter()
            .take(MAX_CATEGORICAL_COLUMNS)
            .map(|c| {
                let mut top = c.value_counts();
                top.truncate(TOP_VALUES);
                (c.name.clone(), top)
            })
            .collect();

        debug!(
            "Computed statistics: {} numeric, correlation: {}",
            numeric_columns.len(),
            correlation.is_some()
        );

        StatisticsReport {
            nrows: table.nrows(),
            ncols: table.ncols(),
            memory_bytes: table.estimated_size(),
            columns,
            numeric,
            correlation,
            categorical,
        }
    }

    /// Columns with at least one missing value.
    pub fn missing(&self) -> Vec<(&str, usize)> {
        self.columns
            .iter()
            .filter(|c| c.nulls > 0)
            .map(|c| (c.name.as_str(), c.nulls))
            .collect()
    }

    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for StatisticsReport {
    fn fmt(&self, out: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(out, "{SECTION_OVERVIEW}")?;
        writeln!(out, "Shape: {}", format_shape(self.nrows, self.ncols))?;
        writeln!(
            out,
            "Memory usage: {:.2} KB\n",
            self.memory_bytes as f64 / 1024.0
        )?;

        writeln!(out, "{SECTION_COLUMNS}")?;
        for c in self.columns.iter() {
            writeln!(out, "{}:", c.name)?;
            writeln!(out, "  Type: {}", c.dtype)?;
            writeln!(out, "  Non-null: {}", c.non_null)?;
            writeln!(out, "  Unique values: {}\n", c.unique)?;
        }

        if !self.numeric.is_empty() {
            writeln!(out, "{SECTION_NUMERIC}")?;
            writeln!(out, "{}\n", describe_table(&self.numeric))?;
        }

        if let Some(corr) = &self.correlation {
            writeln!(out, "{SECTION_CORRELATION}")?;
            writeln!(out, "{}\n", corr.render())?;
        }

        if !self.categorical.is_empty() {
            writeln!(out, "{SECTION_CATEGORICAL}")?;
            for (name, top) in self.categorical.iter() {
                writeln!(out, "\n{name} - Top {TOP_VALUES} values:")?;
                writeln!(out, "{}", format_counts(top))?;
            }
        }

        let missing = self.missing();
        if !missing.is_empty() {
            writeln!(out, "\n{SECTION_MISSING}")?;
            for (name, nulls) in missing {
                writeln!(out, "{name}: {nulls}")?;
            }
        }

        Ok(())
    }
}

pub fn describe(columns: &[&Column]) -> Vec<NumericSummary> {
    columns
        .par_iter()
        .map(|c| NumericSummary::from_column(c))
        .collect()
}

/// Statistics as rows, columns as columns.
pub fn describe_table(summaries: &[NumericSummary]) -> String {
    let header: Vec<String> = summaries.iter().map(|s| s.name.clone()).collect();
    let table: Vec<[f64; 8]> = summaries.iter().map(NumericSummary::row).collect();
    let rows: Vec<(String, Vec<String>)> = DESCRIBE_ROWS
        .iter()
        .enumerate()
        .map(|(ridx, label)| {
            (
                label.to_string(),
                table.iter().map(|r| format_stat(r[ridx])).collect(),
            )
        })
        .collect();
    format_grid(&header, &rows)
}

pub fn format_shape(nrows: usize, ncols: usize) -> String {
    format!("{nrows} rows × {ncols} columns")
}

pub fn format_stat(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else {
        format!("{value:.6}")
    }
}

fn format_counts(counts: &[(String, usize)]) -> String {
    let rows: Vec<(String, Vec<String>)> = counts
        .iter()
        .map(|(value, count)| (value.clone(), vec![count.to_string()]))
        .collect();
    format_grid(&[], &rows)
}

/// Fixed width text table: left aligned row labels, right aligned cells, two spaces between.
pub fn format_grid(header: &[String], rows: &[(String, Vec<String>)]) -> String {
    let label_width = rows
        .iter()
        .map(|(label, _)| label.chars().count())
        .max()
        .unwrap_or(0);
    let ncols = rows
        .iter()
        .map(|(_, cells)| cells.len())
        .max()
        .unwrap_or(0)
        .max(header.len());
    let widths: Vec<usize> = (0..ncols)
        .map(|cidx| {
            let head = header.get(cidx).map(|h| h.chars().count()).unwrap_or(0);
            rows.iter()
                .filter_map(|(_, cells)| cells.get(cidx))
                .map(|c| c.chars().count())
                .max()
                .unwrap_or(0)
                .max(head)
        })
        .collect();

    let mut lines = Vec::with_capacity(rows.len() + 1);
    if !header.is_empty() {
        let mut line = " ".repeat(label_width);
        for (h, &w) in header.iter().zip(widths.iter()) {
            line.push_str(&format!("  {h:>w$}"));
        }
        lines.push(line);
    }
    for (label, cells) in rows.iter() {
        let mut line = format!("{label:<label_width$}");
        for (c, &w) in cells.iter().zip(widths.iter()) {
            line.push_str(&format!("  {c:>w$}"));
        }
        lines.push(line);
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::tests::load_fixture;

    #[test]
    fn quantile_interpolates() {
        let sorted = [1.0, 2.0, 4.0, 5.0];
        assert_eq!(quantile(&sorted, 0.0), 1.0);
        assert_eq!(quantile(&sorted, 0.5), 3.0);
        assert_eq!(quantile(&sorted, 0.25), 1.75);
        assert_eq!(quantile(&sorted, 1.0), 5.0);
        assert!(quantile(&[], 0.5).is_nan());
    }

    #[test]
    fn pearson_skips_incomplete_pairs() {
        let x = [Some(1.0), Some(2.0), None, Some(4.0)];
        let y = [Some(2.0), Some(4.0), Some(100.0), Some(8.0)];
        assert!((pearson(&x, &y) - 1.0).abs() < 1e-12);

        let constant = [Some(3.0), Some(3.0), Some(3.0), Some(3.0)];
        assert!(pearson(&x, &constant).is_nan());
    }

    #[test]
    fn summary_of_column_with_missing_value() {
        let table = load_fixture("example.csv");
        let summary = NumericSummary::from_column(&table.columns()[0]);
        assert_eq!(summary.count, 4);
        assert_eq!(summary.mean, 3.0);
        assert_eq!(summary.min, 1.0);
        assert_eq!(summary.max, 5.0);
        assert!((summary.std - (10.0f64 / 3.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn example_report_sections() {
        let table = load_fixture("example.csv");
        let text = StatisticsReport::compute(&table).render();

        assert!(text.contains("Shape: 5 rows × 3 columns"));
        assert!(text.contains("a:\n  Type: i64\n  Non-null: 4\n"));
        assert!(text.contains(SECTION_NUMERIC));
        assert!(text.contains(SECTION_CORRELATION));
        assert!(text.contains(SECTION_CATEGORICAL));

        let missing = text.split(SECTION_MISSING).nth(1).expect("missing section");
        let lines: Vec<&str> = missing.lines().filter(|l| !l.is_empty()).collect();
        assert_eq!(lines, vec!["a: 1"]);
    }

    #[test]
    fn no_numeric_sections_for_text_table() {
        let table = load_fixture("text_only.csv");
        let text = StatisticsReport::compute(&table).render();
        assert!(!text.contains("NUMERICAL STATISTICS"));
        assert!(!text.contains("CORRELATION MATRIX"));
        assert!(!text.contains(SECTION_MISSING));
        assert!(text.contains("city - Top 5 values:"));
    }

    #[test]
    fn single_numeric_column_has_no_correlation() {
        let table = load_fixture("one_numeric.csv");
        let report = StatisticsReport::compute(&table);
        assert!(report.correlation.is_none());
        let text = report.render();
        assert!(text.contains(SECTION_NUMERIC));
        assert!(!text.contains(SECTION_CORRELATION));
    }

    #[test]
    fn correlation_matrix_is_symmetric_with_unit_diagonal() {
        let table = load_fixture("numbers.csv");
        let corr = StatisticsReport::compute(&table)
            .correlation
            .expect("three numeric columns");
        assert_eq!(corr.len(), 3);
        for i in 0..corr.len() {
            assert!((corr.values[i][i] - 1.0).abs() < 1e-9);
            for j in 0..corr.len() {
                assert_eq!(corr.values[i][j], corr.values[j][i]);
            }
        }
        assert!((corr.values[0][1] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn other_columns_are_not_categorical() {
        let table = load_fixture("numbers.csv");
        let report = StatisticsReport::compute(&table);
        let names: Vec<&str> = report.categorical.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["group"]);
        assert_eq!(report.categorical[0].1[0], ("a".to_string(), 3));
    }

    #[test]
    fn categorical_analysis_is_capped() {
        let table = load_fixture("many_text.csv");
        let report = StatisticsReport::compute(&table);
        let names: Vec<&str> = report.categorical.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["t1", "t2", "t3", "t4", "t5"]);
        for (_, top) in report.categorical.iter() {
            assert_eq!(top.len(), TOP_VALUES);
        }
        assert_eq!(report.categorical[0].1[0], ("a0".to_string(), 2));

        let text = report.render();
        let blocks: Vec<&str> = text.split(" - Top 5 values:\n").skip(1).collect();
        assert_eq!(blocks.len(), MAX_CATEGORICAL_COLUMNS);
        for block in blocks {
            let lines = block.lines().take_while(|l| !l.is_empty()).count();
            assert_eq!(lines, TOP_VALUES);
        }
        assert!(!text.contains("t6 - Top"));
    }

    #[test]
    fn grid_aligns_cells() {
        let grid = format_grid(
            &["x".to_string(), "long".to_string()],
            &[
                ("mean".to_string(), vec!["1".to_string(), "2".to_string()]),
                ("std".to_string(), vec!["10".to_string(), "3".to_string()]),
            ],
        );
        assert_eq!(grid, "       x  long\nmean   1     2\nstd   10     3");
    }
}
