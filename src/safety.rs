//! Guards against a report overwriting one of the input databases.

use anyhow::{bail, Result};
use std::path::Path;

/// File extensions that only ever belong to source databases.
const DATABASE_EXTENSIONS: [&str; 4] = ["sqlite", "sqlite3", "db", "db3"];

/// Validates that a report path is safe to overwrite.
///
/// Checks:
/// - The report must be a `.json` file
/// - The report cannot be any of the source database paths
/// - The report cannot carry a database extension
pub fn validate_report_path(report: &Path, source_paths: &[&Path]) -> Result<()> {
    let extension = report
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    if DATABASE_EXTENSIONS.contains(&extension.as_str()) {
        bail!(
            "Safety check failed: report '{}' looks like a database file",
            report.display()
        );
    }

    if extension != "json" {
        bail!(
            "Safety check failed: report '{}' must have a .json extension",
            report.display()
        );
    }

    for source in source_paths {
        if report == *source {
            bail!(
                "Safety check failed: report '{}' cannot be the same as source '{}'",
                report.display(),
                source.display()
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_valid_report() {
        let report = PathBuf::from("/tmp/duplicates.json");
        let catalog = PathBuf::from("/data/catalog.sqlite3");
        assert!(validate_report_path(&report, &[&catalog]).is_ok());
    }

    #[test]
    fn test_database_extension_blocked() {
        let report = PathBuf::from("/tmp/report.SQLITE3");
        let result = validate_report_path(&report, &[]);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("looks like a database"));
    }

    #[test]
    fn test_non_json_blocked() {
        let report = PathBuf::from("/tmp/report.txt");
        assert!(validate_report_path(&report, &[])
            .unwrap_err()
            .to_string()
            .contains(".json"));
    }

    #[test]
    fn test_report_equals_source() {
        let path = PathBuf::from("/data/incoming.json");
        let result = validate_report_path(&path, &[&path]);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("cannot be the same as source"));
    }
}
