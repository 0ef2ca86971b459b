use std::collections::BTreeMap;

use camino::Utf8Path;
use serde::Serialize;
use tracing::warn;

use crate::domain::CompoundId;
use crate::error::SpecbookError;
use crate::index::CompoundIndex;
use crate::jdx;
use crate::store::write_bytes_atomic;

/// Self-contained per-compound record for the sparse JSON shape; the peak
/// sequences are co-sorted by ascending m/z.
#[derive(Debug, Clone, Serialize)]
pub struct SpectrumRecord {
    #[serde(rename = "ID")]
    pub id: CompoundId,
    pub name: String,
    pub inchi: String,
    pub mz: Vec<u32>,
    pub intensities: Vec<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessSummary {
    pub parsed: usize,
    pub unparseable: usize,
    pub written: usize,
    pub output: String,
}

/// Left-joins parsed spectra onto compound metadata by ID, ascending. The
/// metadata is authoritative: a spectrum whose compound is absent from the
/// index is dropped with a warning.
pub fn sparse_records(
    spectra: &BTreeMap<CompoundId, BTreeMap<u32, u32>>,
    index: &CompoundIndex,
) -> Vec<SpectrumRecord> {
    let mut records = Vec::new();
    for (id, peaks) in spectra {
        let Some(meta) = index.get(id) else {
            warn!(id = %id, "spectrum has no metadata row, dropping");
            continue;
        };
        let (mz, intensities) =
            jdx::into_series(peaks.iter().map(|(mz, intensity)| (*mz, *intensity)).collect());
        records.push(SpectrumRecord {
            id: id.clone(),
            name: meta.name.clone(),
            inchi: meta.inchi.clone(),
            mz,
            intensities,
        });
    }
    records
}

pub fn write_json(records: &[SpectrumRecord], path: &Utf8Path) -> Result<(), SpecbookError> {
    let content = serde_json::to_vec_pretty(records)
        .map_err(|err| SpecbookError::Filesystem(err.to_string()))?;
    write_bytes_atomic(path, &content)
}

/// Global m/z domain over every parsed spectrum; `None` when no spectrum has
/// any peaks. This is pass 1 of the dense tabularization: the full domain
/// must be known before any row can be emitted.
pub fn mz_domain(spectra: &BTreeMap<CompoundId, BTreeMap<u32, u32>>) -> Option<(u32, u32)> {
    let mut domain: Option<(u32, u32)> = None;
    for peaks in spectra.values() {
        let (Some(first), Some(last)) = (peaks.keys().next(), peaks.keys().next_back()) else {
            continue;
        };
        domain = Some(match domain {
            None => (*first, *last),
            Some((min, max)) => (min.min(*first), max.max(*last)),
        });
    }
    domain
}

/// Pass 2: expands each compound into a zero-filled row over the global
/// `[min, max]` m/z range, joined onto metadata and sorted by ascending ID.
/// Every row has the same column set; absent peaks are 0.
pub fn write_dense_csv(
    spectra: &BTreeMap<CompoundId, BTreeMap<u32, u32>>,
    index: &CompoundIndex,
    path: &Utf8Path,
) -> Result<usize, SpecbookError> {
    let domain = mz_domain(spectra);
    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut header = vec!["ID".to_string(), "name".to_string(), "inchi".to_string()];
    if let Some((min, max)) = domain {
        header.extend((min..=max).map(|mz| mz.to_string()));
    }
    writer
        .write_record(&header)
        .map_err(|err| SpecbookError::Filesystem(err.to_string()))?;

    let mut written = 0usize;
    for (id, peaks) in spectra {
        let Some(meta) = index.get(id) else {
            warn!(id = %id, "spectrum has no metadata row, dropping");
            continue;
        };
        let mut row = vec![id.to_string(), meta.name.clone(), meta.inchi.clone()];
        if let Some((min, max)) = domain {
            row.extend((min..=max).map(|mz| peaks.get(&mz).copied().unwrap_or(0).to_string()));
        }
        writer
            .write_record(&row)
            .map_err(|err| SpecbookError::Filesystem(err.to_string()))?;
        written += 1;
    }

    let content = writer
        .into_inner()
        .map_err(|err| SpecbookError::Filesystem(err.to_string()))?;
    write_bytes_atomic(path, &content)?;
    Ok(written)
}
