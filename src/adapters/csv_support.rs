//! Shared plumbing for the append-only CSV stores.

use std::fs::{self, File, OpenOptions};
use std::path::Path;
use std::str::FromStr;

use crate::domain::error::TradeLedgerError;

/// Read-side context used to build `CorruptLedger` errors.
pub struct RowContext<'a> {
    pub source_name: &'a str,
    pub line: u64,
}

impl RowContext<'_> {
    pub fn corrupt(&self, reason: impl Into<String>) -> TradeLedgerError {
        TradeLedgerError::CorruptLedger {
            source_name: self.source_name.to_string(),
            line: self.line,
            reason: reason.into(),
        }
    }

    pub fn field<T>(&self, record: &csv::StringRecord, index: usize, name: &str) -> Result<T, TradeLedgerError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let raw = record
            .get(index)
            .ok_or_else(|| self.corrupt(format!("missing {name} column")))?;
        raw.trim()
            .parse()
            .map_err(|e| self.corrupt(format!("invalid {name} value {raw:?}: {e}")))
    }

    pub fn bool_field(&self, record: &csv::StringRecord, index: usize, name: &str) -> Result<bool, TradeLedgerError> {
        let raw = record
            .get(index)
            .ok_or_else(|| self.corrupt(format!("missing {name} column")))?;
        match raw.trim().to_lowercase().as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Err(self.corrupt(format!("invalid {name} value {raw:?}"))),
        }
    }
}

/// True when the file is absent or empty, i.e. the next append creates it.
pub fn is_fresh(path: &Path) -> Result<bool, TradeLedgerError> {
    match fs::metadata(path) {
        Ok(meta) => Ok(meta.len() == 0),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(true),
        Err(e) => Err(e.into()),
    }
}

/// Opens `path` for reading, or `None` when there is nothing to read yet.
pub fn open_reader(path: &Path) -> Result<Option<csv::Reader<File>>, TradeLedgerError> {
    if is_fresh(path)? {
        return Ok(None);
    }
    let reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|e| storage(path, e))?;
    Ok(Some(reader))
}

/// Verifies the header row; a mismatch means the file is not ours.
pub fn check_header(
    reader: &mut csv::Reader<File>,
    expected: &[&str],
    source_name: &str,
) -> Result<(), TradeLedgerError> {
    let headers = reader.headers().map_err(|e| TradeLedgerError::CorruptLedger {
        source_name: source_name.to_string(),
        line: 1,
        reason: e.to_string(),
    })?;
    let found: Vec<&str> = headers.iter().map(str::trim).collect();
    if found != expected {
        return Err(TradeLedgerError::CorruptLedger {
            source_name: source_name.to_string(),
            line: 1,
            reason: format!("unexpected header {:?}, expected {:?}", found, expected),
        });
    }
    Ok(())
}

/// Maps a row-level read error (e.g. a truncated trailing write with too few
/// fields) to `CorruptLedger`.
pub fn read_error(err: csv::Error, source_name: &str) -> TradeLedgerError {
    let line = err.position().map(|p| p.line()).unwrap_or(0);
    TradeLedgerError::CorruptLedger {
        source_name: source_name.to_string(),
        line,
        reason: err.to_string(),
    }
}

/// Appends `rows` to `path`, writing `header` first if the file is fresh,
/// then flushes and syncs to disk before returning. A file whose last row
/// lacks its line ending is never appended to.
pub fn append_rows(path: &Path, header: &[&str], rows: &[Vec<String>]) -> Result<(), TradeLedgerError> {
    if let Some(line) = unterminated_last_line(path)? {
        return Err(TradeLedgerError::CorruptLedger {
            source_name: path.display().to_string(),
            line,
            reason: "last row has no line ending (partial write), refusing to append".to_string(),
        });
    }
    let fresh = is_fresh(path)?;
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);

    if fresh {
        writer.write_record(header).map_err(|e| storage(path, e))?;
    }
    for row in rows {
        writer.write_record(row).map_err(|e| storage(path, e))?;
    }
    writer.flush()?;
    let file = writer.into_inner().map_err(|e| TradeLedgerError::Storage {
        reason: format!("failed to flush {}: {}", path.display(), e),
    })?;
    file.sync_all()?;
    Ok(())
}

/// Line number of a last row missing its line ending, if any.
fn unterminated_last_line(path: &Path) -> Result<Option<u64>, TradeLedgerError> {
    let content = match fs::read(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if content.is_empty() || content.ends_with(b"\n") {
        return Ok(None);
    }
    Ok(Some(content.split(|b| *b == b'\n').count() as u64))
}

fn storage(path: &Path, err: csv::Error) -> TradeLedgerError {
    TradeLedgerError::Storage {
        reason: format!("{}: {}", path.display(), err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn append_writes_header_once() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rows.csv");
        let header = ["a", "b"];

        append_rows(&path, &header, &[vec!["1".into(), "2".into()]]).unwrap();
        append_rows(&path, &header, &[vec!["3".into(), "4".into()]]).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "a,b\n1,2\n3,4\n");
    }

    #[test]
    fn empty_file_counts_as_fresh() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rows.csv");
        assert!(is_fresh(&path).unwrap());
        fs::write(&path, "").unwrap();
        assert!(is_fresh(&path).unwrap());
        assert!(open_reader(&path).unwrap().is_none());
        fs::write(&path, "a,b\n").unwrap();
        assert!(!is_fresh(&path).unwrap());
    }

    #[test]
    fn header_mismatch_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rows.csv");
        fs::write(&path, "x,y\n1,2\n").unwrap();
        let mut reader = open_reader(&path).unwrap().unwrap();
        let err = check_header(&mut reader, &["a", "b"], "rows.csv").unwrap_err();
        assert!(matches!(err, TradeLedgerError::CorruptLedger { line: 1, .. }));
    }

    #[test]
    fn refuses_to_append_after_partial_row() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rows.csv");
        fs::write(&path, "a,b\n1,2\n3,4").unwrap();

        let err = append_rows(&path, &["a", "b"], &[vec!["5".into(), "6".into()]]).unwrap_err();
        assert!(matches!(err, TradeLedgerError::CorruptLedger { line: 3, .. }));
        assert_eq!(fs::read_to_string(&path).unwrap(), "a,b\n1,2\n3,4");
    }
}
