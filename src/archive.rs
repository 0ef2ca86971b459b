use std::collections::BTreeMap;
use std::fs;
use std::io::Read;
use std::str::FromStr;

use camino::Utf8Path;
use tracing::warn;
use zip::ZipArchive;

use crate::domain::{CompoundId, SpectrumFileName};
use crate::error::SpecbookError;
use crate::jdx;
use crate::output::{ProgressEvent, ProgressSink};

/// Primary spectra read out of an archive, as per-compound m/z mappings,
/// plus the count of entries that could not be parsed.
#[derive(Debug, Default)]
pub struct ParsedArchive {
    pub spectra: BTreeMap<CompoundId, BTreeMap<u32, u32>>,
    pub unparseable: usize,
}

/// Reads spectra straight out of a zip archive without extracting to disk.
/// Directory entries and non-primary spectra (`index != 0`) are skipped;
/// entries with an unrecognized name or no peak block are reported one by one
/// and counted, never fabricated as empty spectra.
pub fn read_spectra_archive(
    path: &Utf8Path,
    sink: &dyn ProgressSink,
) -> Result<ParsedArchive, SpecbookError> {
    if !path.as_std_path().exists() {
        return Err(SpecbookError::ArchiveNotFound(path.to_path_buf()));
    }
    let file = fs::File::open(path.as_std_path())
        .map_err(|err| SpecbookError::ArchiveRead(format!("open {path}: {err}")))?;
    let mut archive =
        ZipArchive::new(file).map_err(|err| SpecbookError::ArchiveRead(err.to_string()))?;

    let mut parsed = ParsedArchive::default();
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|err| SpecbookError::ArchiveRead(err.to_string()))?;
        if entry.is_dir() {
            continue;
        }
        let entry_name = entry.name().to_string();
        let stem = entry_stem(&entry_name);
        let name = match SpectrumFileName::from_str(stem) {
            Ok(name) => name,
            Err(err) => {
                skip(sink, &mut parsed, &entry_name, &err.to_string());
                continue;
            }
        };
        if !name.is_primary() {
            continue;
        }

        let mut text = String::new();
        if let Err(err) = entry.read_to_string(&mut text) {
            skip(sink, &mut parsed, &entry_name, &err.to_string());
            continue;
        }
        match jdx::parse_peaks_map(&text, &entry_name) {
            Ok(peaks) => {
                parsed.spectra.insert(name.id, peaks);
            }
            Err(err) => skip(sink, &mut parsed, &entry_name, &err.to_string()),
        }
    }
    Ok(parsed)
}

fn skip(sink: &dyn ProgressSink, parsed: &mut ParsedArchive, entry_name: &str, reason: &str) {
    warn!(entry = entry_name, reason, "skipping archive entry");
    sink.event(ProgressEvent {
        message: format!("{entry_name}: skipped ({reason})"),
    });
    parsed.unparseable += 1;
}

/// Last path component of a zip entry name, minus its extension.
fn entry_stem(entry_name: &str) -> &str {
    let base = entry_name.rsplit('/').next().unwrap_or(entry_name);
    base.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(base)
}
