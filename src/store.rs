use std::collections::BTreeSet;
use std::fs;
use std::time::SystemTime;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::debug;

use crate::domain::CompoundId;
use crate::error::SpecbookError;

/// Creates `path` as a directory if needed; rejects a non-directory entry.
pub fn ensure_dir(path: &Utf8Path) -> Result<(), SpecbookError> {
    if path.as_std_path().exists() {
        if !path.as_std_path().is_dir() {
            return Err(SpecbookError::NotADirectory(path.to_path_buf()));
        }
        return Ok(());
    }
    fs::create_dir_all(path.as_std_path()).map_err(|err| SpecbookError::Filesystem(err.to_string()))
}

/// Writes `content` through a sibling temp file and renames into place, so a
/// failed write never leaves a partial artifact at `path`.
pub fn write_text_atomic(path: &Utf8Path, content: &str) -> Result<(), SpecbookError> {
    write_bytes_atomic(path, content.as_bytes())
}

pub fn write_bytes_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), SpecbookError> {
    let parent = path
        .parent()
        .ok_or_else(|| SpecbookError::Filesystem("invalid destination path".to_string()))?;
    let temp = tempfile::Builder::new()
        .prefix(".specbook")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| SpecbookError::Filesystem(err.to_string()))?;
    fs::write(temp.path(), content).map_err(|err| SpecbookError::Filesystem(err.to_string()))?;
    temp.persist(path.as_std_path())
        .map_err(|err| SpecbookError::Filesystem(err.to_string()))?;
    Ok(())
}

/// Snapshot of compound IDs already present in a destination directory,
/// taken once at the start of a fetch session.
#[derive(Debug, Clone, Default)]
pub struct LoadedSet {
    ids: BTreeSet<CompoundId>,
}

impl LoadedSet {
    pub fn contains(&self, id: &CompoundId) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Derives the loaded-ID set from `{ID}.{ext}` / `{ID}_{type}_{index}.{ext}`
/// filenames in `dir`. The ID of the most-recently-modified file is removed
/// from the set: an interrupted previous run may have left that file
/// truncated, so it gets re-fetched.
pub fn scan_loaded(dir: &Utf8Path, ext: &str) -> Result<LoadedSet, SpecbookError> {
    let mut ids = BTreeSet::new();
    let mut newest: Option<(SystemTime, Utf8PathBuf, CompoundId)> = None;

    if !dir.as_std_path().exists() {
        return Ok(LoadedSet { ids });
    }

    let entries =
        fs::read_dir(dir.as_std_path()).map_err(|err| SpecbookError::Filesystem(err.to_string()))?;
    for entry in entries {
        let entry = entry.map_err(|err| SpecbookError::Filesystem(err.to_string()))?;
        let path = match Utf8PathBuf::from_path_buf(entry.path()) {
            Ok(path) => path,
            Err(_) => continue,
        };
        if !path.as_std_path().is_file() || path.extension() != Some(ext) {
            continue;
        }
        let Some(stem) = path.file_stem() else {
            continue;
        };
        let id_part = stem.split('_').next().unwrap_or(stem);
        let Ok(id) = id_part.parse::<CompoundId>() else {
            debug!(file = %path, "ignoring file with unrecognized name");
            continue;
        };
        let modified = entry
            .metadata()
            .and_then(|meta| meta.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        let newer = match &newest {
            Some((time, tie_path, _)) => (modified, &path) > (*time, tie_path),
            None => true,
        };
        if newer {
            newest = Some((modified, path.clone(), id.clone()));
        }
        ids.insert(id);
    }

    if let Some((_, path, id)) = newest {
        debug!(file = %path, id = %id, "re-fetching most recent id in case of a partial write");
        ids.remove(&id);
    }
    Ok(LoadedSet { ids })
}

#[cfg(test)]
mod tests {
    use camino::Utf8PathBuf;

    use super::*;

    fn touch(dir: &Utf8Path, name: &str, mtime_offset_secs: u64) {
        let path = dir.join(name);
        std::fs::write(path.as_std_path(), b"data").unwrap();
        let mtime = SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(mtime_offset_secs);
        let file = std::fs::File::options()
            .write(true)
            .open(path.as_std_path())
            .unwrap();
        file.set_modified(mtime).unwrap();
    }

    #[test]
    fn scan_drops_most_recent_id() {
        let temp = tempfile::tempdir().unwrap();
        let dir = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        touch(&dir, "C10_MS_0.jdx", 100);
        touch(&dir, "C10_MS_1.jdx", 101);
        touch(&dir, "C20_MS_0.jdx", 200);
        touch(&dir, "C30_MS_0.jdx", 150);

        let loaded = scan_loaded(&dir, "jdx").unwrap();
        assert_eq!(loaded.len(), 2);
        assert!(loaded.contains(&"C10".parse().unwrap()));
        assert!(loaded.contains(&"C30".parse().unwrap()));
        assert!(!loaded.contains(&"C20".parse().unwrap()));
    }

    #[test]
    fn scan_ignores_foreign_files() {
        let temp = tempfile::tempdir().unwrap();
        let dir = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        touch(&dir, "C10.mol", 100);
        touch(&dir, "C20.mol", 50);
        touch(&dir, "notes.txt", 300);
        touch(&dir, "lowercase.mol", 300);

        let loaded = scan_loaded(&dir, "mol").unwrap();
        assert_eq!(loaded.len(), 1);
        assert!(loaded.contains(&"C20".parse().unwrap()));
    }

    #[test]
    fn scan_missing_dir_is_empty() {
        let loaded = scan_loaded(Utf8Path::new("/nonexistent/raw"), "jdx").unwrap();
        assert!(loaded.is_empty());
    }

    #[test]
    fn atomic_write_replaces_content() {
        let temp = tempfile::tempdir().unwrap();
        let dir = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        let path = dir.join("C10.mol");
        write_text_atomic(&path, "first").unwrap();
        write_text_atomic(&path, "second").unwrap();
        assert_eq!(std::fs::read_to_string(path.as_std_path()).unwrap(), "second");
    }
}
