use chrono::Local;
use directories::ProjectDirs;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Append-only CSV log of successful scans.
#[derive(Debug, Clone)]
pub struct ScanLog {
    path: PathBuf,
}

impl ScanLog {
    /// Log under the per-user data directory, or `None` when no home
    /// directory can be resolved.
    pub fn new() -> Option<Self> {
        ProjectDirs::from("", "", "scanlight").map(|pd| Self {
            path: pd.data_local_dir().join("scans.csv"),
        })
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record(&self, code: &str, presses: u32) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // If the log doesn't exist yet, we need to emit a header
        let needs_header = !self.path.exists();

        let mut log_file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)?;

        if needs_header {
            writeln!(log_file, "date,code,presses")?;
        }

        writeln!(
            log_file,
            "{},{},{}",
            Local::now().format("%c"),
            csv_field(code),
            presses
        )?;

        Ok(())
    }
}

/// Quotes a field that contains a delimiter, a quote, or a line break,
/// doubling embedded quotes.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn record_writes_header_once() {
        let dir = tempdir().unwrap();
        let log = ScanLog::with_path(dir.path().join("scans.csv"));

        log.record("4006381333931", 1).unwrap();
        log.record("9780201616224", 2).unwrap();

        let contents = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "date,code,presses");
        assert!(lines[1].ends_with(",4006381333931,1"));
        assert!(lines[2].ends_with(",9780201616224,2"));
    }

    #[test]
    fn record_quotes_embedded_delimiters() {
        let dir = tempdir().unwrap();
        let log = ScanLog::with_path(dir.path().join("scans.csv"));

        log.record("40,06\"38", 1).unwrap();

        let contents = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        // The quoted field keeps the row at three columns
        assert!(lines[1].ends_with(",\"40,06\"\"38\",1"));
    }

    #[test]
    fn record_creates_missing_directories() {
        let dir = tempdir().unwrap();
        let log = ScanLog::with_path(dir.path().join("nested").join("scans.csv"));
        log.record("123456", 1).unwrap();
        assert!(log.path().exists());
    }
}
