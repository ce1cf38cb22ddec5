//! Append-only JSON Lines helpers shared by the file-backed stores.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;

use serde_json::Value;

/// Open `path` for appending, creating it and its parent directories.
pub fn open_append(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Write `value` as one line and flush.
pub fn append_line(file: &mut File, value: &Value) -> io::Result<()> {
    let mut line = serde_json::to_string(value)?;
    line.push('\n');
    file.write_all(line.as_bytes())?;
    file.flush()
}

/// Parse every line of `path` with `parse`.
///
/// A missing file reads as empty. Blank lines are skipped; lines that fail
/// to parse are logged and skipped, so one torn write never hides the rest
/// of the log.
pub fn read_lines<T, F>(path: &Path, parse: F) -> io::Result<Vec<T>>
where
    F: Fn(&Value) -> Option<T>,
{
    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err),
    };
    let mut out = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(trimmed).ok().as_ref().and_then(&parse) {
            Some(item) => out.push(item),
            None => tracing::warn!(
                path = %path.display(),
                line = index + 1,
                "skipping unreadable JSONL record"
            ),
        }
    }
    Ok(out)
}

/// Replace `path` with `contents` via a sibling temp file and rename.
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut tmp_name = path.as_os_str().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = Path::new(&tmp_name);
    {
        let mut tmp = File::create(tmp_path)?;
        tmp.write_all(contents)?;
        tmp.sync_all()?;
    }
    fs::rename(tmp_path, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn append_then_read_skips_garbage() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested/dir/log.jsonl");
        let mut file = open_append(&path).unwrap();
        append_line(&mut file, &json!({"n": 1})).unwrap();
        file.write_all(b"{not json\n\n").unwrap();
        append_line(&mut file, &json!({"n": 2})).unwrap();

        let ns = read_lines(&path, |v| v.get("n").and_then(Value::as_u64)).unwrap();
        assert_eq!(ns, vec![1, 2]);
    }

    #[test]
    fn missing_file_reads_empty() {
        let tmp = TempDir::new().unwrap();
        let items = read_lines(&tmp.path().join("absent.jsonl"), |v| Some(v.clone())).unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn write_atomic_replaces_contents() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("report.json");
        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
        assert!(!tmp.path().join("report.json.tmp").exists());
    }
}
