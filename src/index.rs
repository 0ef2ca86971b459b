use std::collections::BTreeMap;

use camino::Utf8Path;
use tracing::warn;

use crate::domain::{Attribute, CompoundId, SpectrumType};
use crate::error::SpecbookError;

/// One row of the compound metadata index.
#[derive(Debug, Clone)]
pub struct CompoundMeta {
    pub id: CompoundId,
    pub name: String,
    pub inchi: String,
    pub mol3d_url: Option<String>,
    pub spectra: Vec<SpectrumType>,
}

impl CompoundMeta {
    pub fn has_attribute(&self, attribute: Attribute) -> bool {
        match attribute {
            Attribute::Mol3d => self.mol3d_url.is_some(),
            Attribute::Spectrum(spec) => self.spectra.contains(&spec),
        }
    }
}

/// Compound metadata index loaded from a CSV file with at least the columns
/// `ID`, `name`, `inchi`. Attribute columns (`mol3D`, `cIR`, `cTZ`, `cMS`,
/// `cUV`) are optional; enumerating an attribute whose column is absent is an
/// error so a fetch run never silently sees an empty universe.
#[derive(Debug, Clone)]
pub struct CompoundIndex {
    records: BTreeMap<CompoundId, CompoundMeta>,
    columns: Vec<String>,
}

impl CompoundIndex {
    pub fn load(path: &Utf8Path) -> Result<Self, SpecbookError> {
        if !path.as_std_path().exists() {
            return Err(SpecbookError::IndexNotFound(path.to_path_buf()));
        }
        let mut reader = csv::Reader::from_path(path.as_std_path())
            .map_err(|err| SpecbookError::IndexRead(err.to_string()))?;
        let headers = reader
            .headers()
            .map_err(|err| SpecbookError::IndexRead(err.to_string()))?
            .clone();
        let columns: Vec<String> = headers.iter().map(str::to_string).collect();

        let position = |name: &str| headers.iter().position(|header| header == name);
        let id_col = position("ID").ok_or_else(|| SpecbookError::IndexColumn("ID".into()))?;
        let name_col =
            position("name").ok_or_else(|| SpecbookError::IndexColumn("name".into()))?;
        let inchi_col =
            position("inchi").ok_or_else(|| SpecbookError::IndexColumn("inchi".into()))?;
        let mol3d_col = position("mol3D");
        let spec_cols: Vec<(SpectrumType, usize)> =
            [SpectrumType::Ir, SpectrumType::Thz, SpectrumType::Ms, SpectrumType::Uv]
                .into_iter()
                .filter_map(|spec| position(spec.index_column()).map(|col| (spec, col)))
                .collect();

        let mut records = BTreeMap::new();
        for (row, result) in reader.records().enumerate() {
            let record = result.map_err(|err| SpecbookError::IndexRead(err.to_string()))?;
            let raw_id = record.get(id_col).unwrap_or_default();
            let id: CompoundId = match raw_id.parse() {
                Ok(id) => id,
                Err(_) => {
                    warn!(row = row + 1, id = raw_id, "skipping index row with invalid id");
                    continue;
                }
            };
            let mol3d_url = mol3d_col
                .and_then(|col| record.get(col))
                .map(str::trim)
                .filter(|cell| is_present(cell))
                .map(str::to_string);
            let spectra = spec_cols
                .iter()
                .filter(|(_, col)| record.get(*col).map(is_present).unwrap_or(false))
                .map(|(spec, _)| *spec)
                .collect();
            records.insert(
                id.clone(),
                CompoundMeta {
                    id,
                    name: record.get(name_col).unwrap_or_default().to_string(),
                    inchi: record.get(inchi_col).unwrap_or_default().to_string(),
                    mol3d_url,
                    spectra,
                },
            );
        }

        Ok(Self { records, columns })
    }

    /// All IDs possessing the given attribute, unique and ascending.
    pub fn ids_with_attribute(
        &self,
        attribute: Attribute,
    ) -> Result<Vec<CompoundId>, SpecbookError> {
        let column = attribute.index_column();
        if !self.columns.iter().any(|header| header == column) {
            return Err(SpecbookError::IndexColumn(column.to_string()));
        }
        Ok(self
            .records
            .values()
            .filter(|meta| meta.has_attribute(attribute))
            .map(|meta| meta.id.clone())
            .collect())
    }

    pub fn get(&self, id: &CompoundId) -> Option<&CompoundMeta> {
        self.records.get(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn is_present(cell: &str) -> bool {
    let trimmed = cell.trim();
    !trimmed.is_empty() && trimmed != "0" && !trimmed.eq_ignore_ascii_case("false")
}
