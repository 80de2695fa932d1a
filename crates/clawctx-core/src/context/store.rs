//! JSON file persistence shared by the index snapshot and the query cache.
//!
//! Reads are parse-or-default: a missing, unreadable, or corrupt file yields
//! `T::default()` so call sites stay linear. Writes go through a sibling temp
//! file and a rename, so readers never see a half-written document.

use std::io::{BufWriter, ErrorKind, Write};
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use super::ContextError;

/// Load a JSON document, substituting the default on any failure.
pub fn load_or_default<T>(path: &Path) -> T
where
    T: DeserializeOwned + Default,
{
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return T::default(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Unreadable state file, starting empty");
            return T::default();
        }
    };

    match serde_json::from_slice(&bytes) {
        Ok(value) => value,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Corrupt state file, starting empty");
            T::default()
        }
    }
}

/// Serialize `value` as pretty JSON and atomically replace `path` with it.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ContextError> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    let tmp = NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file());
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.flush()?;
    }
    tmp.persist(path).map_err(|e| e.error)?;

    debug!(path = %path.display(), "Wrote state file");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_default() {
        let tmp = TempDir::new().unwrap();
        let map: BTreeMap<String, u32> = load_or_default(&tmp.path().join("absent.json"));
        assert!(map.is_empty());
    }

    #[test]
    fn test_corrupt_file_is_default() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("state.json");
        std::fs::write(&path, b"{ not json").unwrap();

        let map: BTreeMap<String, u32> = load_or_default(&path);
        assert!(map.is_empty());
    }

    #[test]
    fn test_wrong_shape_is_default() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("state.json");
        std::fs::write(&path, b"[1, 2, 3]").unwrap();

        let map: BTreeMap<String, u32> = load_or_default(&path);
        assert!(map.is_empty());
    }

    #[test]
    fn test_write_then_load() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("state.json");
        let mut map = BTreeMap::new();
        map.insert("a".to_string(), 1u32);

        write_json(&path, &map).unwrap();
        let loaded: BTreeMap<String, u32> = load_or_default(&path);
        assert_eq!(loaded, map);
    }

    #[test]
    fn test_write_replaces_existing_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("state.json");
        std::fs::write(&path, b"garbage").unwrap();

        write_json(&path, &vec![1u32, 2]).unwrap();
        let loaded: Vec<u32> = load_or_default(&path);
        assert_eq!(loaded, vec![1, 2]);
        // Only the target file remains; the temp file was renamed over it.
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_write_into_missing_dir_fails() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("missing").join("state.json");
        assert!(matches!(write_json(&path, &1u32), Err(ContextError::Io(_))));
    }
}
