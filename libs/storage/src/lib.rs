//! Append-only blob storage for captured webhook requests.
//!
//! Records are grouped by a sanitized key (usually the destination phone
//! number) and written once, one pretty-printed JSON file per request:
//! `<base>/<sanitized key>/<token>.json`. Files are never rewritten or
//! deleted by this layer.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage key must not be empty")]
    EmptyKey,
    #[error("{0} already exists and is not a directory")]
    NotADirectory(PathBuf),
    #[error("failed to serialize record")]
    Serialize(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Replace every run of characters outside `[A-Za-z0-9_]` with `_`, yielding
/// a string that is safe to use as a directory name.
///
/// ```
/// assert_eq!(smi_storage::sanitize("+1 (555) 123").unwrap(), "_1_555_123");
/// assert!(smi_storage::sanitize("").is_err());
/// ```
pub fn sanitize(input: &str) -> Result<String, StorageError> {
    if input.is_empty() {
        return Err(StorageError::EmptyKey);
    }

    let mut out = String::with_capacity(input.len());
    let mut in_run = false;
    for ch in input.chars() {
        if ch.is_ascii_alphanumeric() || ch == '_' {
            out.push(ch);
            in_run = false;
        } else if !in_run {
            out.push('_');
            in_run = true;
        }
    }
    Ok(out)
}

/// Directory-backed record store: one directory per sanitized key, one
/// immutable JSON file per record.
#[derive(Debug, Clone)]
pub struct FileStorage {
    base_path: PathBuf,
}

impl FileStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Open a store rooted at `base_path`, creating the directory if needed.
    /// The root is canonicalized so every path handed back from [`add`] is
    /// absolute.
    ///
    /// [`add`]: FileStorage::add
    pub fn open(base_path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let base_path = base_path.into();
        ensure_directory(&base_path)?;
        let base_path = base_path.canonicalize()?;
        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Directory holding all records for `key_name`, created on demand.
    /// Concurrent callers racing to create the same directory all succeed.
    pub fn key_path(&self, key_name: &str) -> Result<PathBuf, StorageError> {
        let path = self.base_path.join(sanitize(key_name)?);
        ensure_directory(&path)?;
        Ok(path)
    }

    /// Write `data` as pretty-printed JSON under `key_name`. `key_value` is
    /// taken as-is; callers are responsible for picking collision-resistant
    /// values. Returns the path written.
    pub fn add<T: Serialize>(
        &self,
        key_name: &str,
        key_value: &str,
        data: &T,
    ) -> Result<PathBuf, StorageError> {
        let blob_path = self.key_path(key_name)?.join(format!("{key_value}.json"));
        let blob = serde_json::to_string_pretty(data)?;
        fs::write(&blob_path, blob)?;
        tracing::info!(path = %blob_path.display(), "wrote blob");
        Ok(blob_path)
    }
}

fn ensure_directory(path: &Path) -> Result<(), StorageError> {
    if path.exists() && !path.is_dir() {
        return Err(StorageError::NotADirectory(path.to_path_buf()));
    }
    fs::create_dir_all(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sanitize_collapses_runs_of_illegal_characters() {
        assert_eq!(sanitize("+18482259204").unwrap(), "_18482259204");
        assert_eq!(sanitize("a b--c").unwrap(), "a_b_c");
        assert_eq!(sanitize("already_safe_123").unwrap(), "already_safe_123");
    }

    #[test]
    fn sanitize_output_is_nonempty_and_path_safe() {
        for input in ["+", "!!!", "héllo", "a/b/../c", ".."] {
            let out = sanitize(input).unwrap();
            assert!(!out.is_empty(), "empty output for {input:?}");
            assert!(
                out.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'),
                "unsafe output {out:?} for {input:?}"
            );
        }
    }

    #[test]
    fn sanitize_rejects_empty_input() {
        assert!(matches!(sanitize(""), Err(StorageError::EmptyKey)));
    }

    #[test]
    fn add_round_trips_the_record() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(dir.path()).unwrap();
        let record = json!({
            "method": "POST",
            "url": "http://localhost/sms/in",
            "data": { "Body": "hi" },
        });

        let path = storage.add("+1777", "1700000000", &record).unwrap();
        assert!(path.is_absolute());
        assert!(path.ends_with("_1777/1700000000.json"));

        let raw = fs::read_to_string(&path).unwrap();
        let read_back: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(read_back, record);
    }

    #[test]
    fn add_twice_creates_one_directory_and_two_files() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(dir.path()).unwrap();

        storage.add("+1777", "a", &json!({"n": 1})).unwrap();
        storage.add("+1777", "b", &json!({"n": 2})).unwrap();

        let dirs: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(dirs.len(), 1);
        let files: Vec<_> = fs::read_dir(dir.path().join("_1777")).unwrap().collect();
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn add_fails_when_key_path_is_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::open(dir.path()).unwrap();
        fs::write(dir.path().join("blocked"), b"not a directory").unwrap();

        let err = storage.add("blocked", "x", &json!({})).unwrap_err();
        assert!(matches!(err, StorageError::NotADirectory(_)));
    }

    #[test]
    fn open_fails_when_base_path_is_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("occupied");
        fs::write(&file, b"x").unwrap();
        assert!(matches!(
            FileStorage::open(&file),
            Err(StorageError::NotADirectory(_))
        ));
    }
}
