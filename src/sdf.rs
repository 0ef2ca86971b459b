use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tracing::warn;

use crate::error::SpecbookError;
use crate::output::{ProgressEvent, ProgressSink};
use crate::store::write_text_atomic;

#[derive(Debug, Clone, Serialize)]
pub struct SdfReport {
    pub written: usize,
    pub bad: usize,
    pub output: String,
}

/// Assembles downloaded `.mol` files into one SDF file. Files missing the
/// `M  END` connection-table terminator are counted and reported as bad and
/// left out; this is a format check only, no chemistry is interpreted.
/// Records are concatenated in ascending filename order and separated by
/// `$$$$` as SDF requires.
pub fn write_sdf(
    dir_mol: &Utf8Path,
    path_out: &Utf8Path,
    sink: &dyn ProgressSink,
) -> Result<SdfReport, SpecbookError> {
    if !dir_mol.as_std_path().is_dir() {
        return Err(SpecbookError::NotADirectory(dir_mol.to_path_buf()));
    }

    let mut files: Vec<Utf8PathBuf> = Vec::new();
    let entries = fs::read_dir(dir_mol.as_std_path())
        .map_err(|err| SpecbookError::Filesystem(err.to_string()))?;
    for entry in entries {
        let entry = entry.map_err(|err| SpecbookError::Filesystem(err.to_string()))?;
        let Ok(path) = Utf8PathBuf::from_path_buf(entry.path()) else {
            continue;
        };
        if path.as_std_path().is_file() && path.extension() == Some("mol") {
            files.push(path);
        }
    }
    files.sort();

    let mut text = String::new();
    let mut report = SdfReport {
        written: 0,
        bad: 0,
        output: path_out.to_string(),
    };
    for path in &files {
        let content = fs::read_to_string(path.as_std_path())
            .map_err(|err| SpecbookError::Filesystem(format!("read {path}: {err}")))?;
        if !content.contains("M  END") {
            warn!(file = %path, "mol file has no terminator, excluding");
            sink.event(ProgressEvent {
                message: format!("{path}: bad mol file"),
            });
            report.bad += 1;
            continue;
        }
        text.push_str(&content);
        if !text.ends_with('\n') {
            text.push('\n');
        }
        text.push_str("$$$$\n");
        report.written += 1;
    }

    sink.event(ProgressEvent {
        message: format!("{} bad files detected", report.bad),
    });
    write_text_atomic(path_out, &text)?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use camino::Utf8PathBuf;

    use super::*;
    use crate::output::JsonOutput;

    const GOOD_MOL: &str = "water\n  spec3D\n\n  1  0  0  0  0  0  0  0  0  0999 V2000\n\
                                0.0 0.0 0.0 O 0\nM  END\n";

    #[test]
    fn assembles_good_files_and_counts_bad() {
        let temp = tempfile::tempdir().unwrap();
        let dir = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        std::fs::write(dir.join("C20.mol").as_std_path(), GOOD_MOL).unwrap();
        std::fs::write(dir.join("C10.mol").as_std_path(), GOOD_MOL).unwrap();
        std::fs::write(dir.join("C30.mol").as_std_path(), "truncated\n").unwrap();
        std::fs::write(dir.join("readme.txt").as_std_path(), "not a mol").unwrap();

        let out = dir.join("all.sdf");
        let report = write_sdf(&dir, &out, &JsonOutput).unwrap();
        assert_eq!(report.written, 2);
        assert_eq!(report.bad, 1);

        let content = std::fs::read_to_string(out.as_std_path()).unwrap();
        assert_eq!(content.matches("$$$$").count(), 2);
        assert_eq!(content.matches("M  END").count(), 2);
    }

    #[test]
    fn missing_dir_is_fatal() {
        let err = write_sdf(
            Utf8Path::new("/nonexistent/mol"),
            Utf8Path::new("/tmp/out.sdf"),
            &JsonOutput,
        )
        .unwrap_err();
        assert!(matches!(err, SpecbookError::NotADirectory(_)));
    }
}
