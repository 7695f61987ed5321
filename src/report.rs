use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, instrument};

use crate::domain::AnalyzerError;
use crate::stats::{describe, describe_table, format_shape};
use crate::table::Table;

const BANNER: &str = "CSV DATA ANALYSIS REPORT";
const SUBSECTION_RULE_WIDTH: usize = 20;

/// Plain text report. Depends only on the table, so repeated exports are identical.
///
/// The missing data summary lists every column, including those without nulls, while
/// the interactive statistics view only lists columns that have nulls.
pub fn render_report(table: &Table) -> String {
    Report(table).to_string()
}

struct Report<'a>(&'a Table);

impl fmt::Display for Report<'_> {
    fn fmt(&self, out: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table = self.0;
        let rule = "-".repeat(SUBSECTION_RULE_WIDTH);

        writeln!(out, "{BANNER}")?;
        writeln!(out, "{}\n", "=".repeat(50))?;

        writeln!(
            out,
            "Dataset Shape: {}\n",
            format_shape(table.nrows(), table.ncols())
        )?;

        writeln!(out, "COLUMN SUMMARY:\n{rule}")?;
        for c in table.columns() {
            writeln!(out, "{}: {}, {} nulls", c.name, c.dtype, c.null_count())?;
        }

        let numeric = table.numeric_columns();
        if !numeric.is_empty() {
            writeln!(out, "\nNUMERICAL STATISTICS:\n{rule}")?;
            writeln!(out, "{}\n", describe_table(&describe(&numeric)))?;
        } else {
            writeln!(out)?;
        }

        writeln!(out, "MISSING DATA SUMMARY:\n{rule}")?;
        for c in table.columns() {
            writeln!(out, "{}: {}", c.name, c.null_count())?;
        }
        Ok(())
    }
}

#[instrument(skip(table))]
pub fn export_report(table: &Table, path: &Path) -> Result<(), AnalyzerError> {
    fs::write(path, render_report(table)).map_err(AnalyzerError::ExportFailed)?;
    info!("Report for {} written to {}", table.name(), path.display());
    Ok(())
}

/// Appends `.txt` when the chosen destination has no extension.
pub fn with_default_extension(path: PathBuf) -> PathBuf {
    if path.extension().is_none() {
        path.with_extension("txt")
    } else {
        path
    }
}

/// Suggested destination next to the source file, `<stem>_report.txt`.
pub fn default_report_path(table: &Table) -> PathBuf {
    let stem = table
        .path()
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("data");
    table.path().with_file_name(format!("{stem}_report.txt"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::tests::load_fixture;

    #[test]
    fn report_lists_every_column() {
        let table = load_fixture("example.csv");
        let report = render_report(&table);

        assert!(report.starts_with("CSV DATA ANALYSIS REPORT\n=================================================="));
        assert!(report.contains("Dataset Shape: 5 rows × 3 columns"));
        assert!(report.contains("a: i64, 1 nulls\nb: i64, 0 nulls\nc: str, 0 nulls\n"));
        assert!(report.contains("NUMERICAL STATISTICS:"));

        let missing = report
            .split("MISSING DATA SUMMARY:\n--------------------\n")
            .nth(1)
            .expect("missing summary");
        assert_eq!(missing, "a: 1\nb: 0\nc: 0\n");
    }

    #[test]
    fn text_only_report_has_no_numeric_section() {
        let table = load_fixture("text_only.csv");
        let report = render_report(&table);
        assert!(!report.contains("NUMERICAL STATISTICS"));
        assert!(report.contains("MISSING DATA SUMMARY:"));
    }

    #[test]
    fn repeated_exports_are_identical() {
        let table = load_fixture("numbers.csv");
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first.txt");
        let second = dir.path().join("second.txt");

        export_report(&table, &first).unwrap();
        export_report(&table, &second).unwrap();

        let a = fs::read(&first).unwrap();
        let b = fs::read(&second).unwrap();
        assert!(!a.is_empty());
        assert_eq!(a, b);
    }

    #[test]
    fn unwritable_destination_fails() {
        let table = load_fixture("example.csv");
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("missing").join("report.txt");
        let err = export_report(&table, &target).unwrap_err();
        assert!(matches!(err, AnalyzerError::ExportFailed(_)));
    }

    #[test]
    fn destination_gets_txt_extension() {
        assert_eq!(
            with_default_extension(PathBuf::from("/tmp/report")),
            PathBuf::from("/tmp/report.txt")
        );
        assert_eq!(
            with_default_extension(PathBuf::from("/tmp/report.log")),
            PathBuf::from("/tmp/report.log")
        );
    }

    #[test]
    fn suggested_path_sits_next_to_source() {
        let table = load_fixture("example.csv");
        let path = default_report_path(&table);
        assert_eq!(path.file_name().unwrap(), "example_report.txt");
        assert_eq!(path.parent(), table.path().parent());
    }
}
