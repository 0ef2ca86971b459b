use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::SpecbookError;

/// Opaque webbook registry key, e.g. `C7732185`. Stable across runs; used as
/// the resume key and the join key between spectra and compound metadata.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CompoundId(String);

impl CompoundId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CompoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CompoundId {
    type Err = SpecbookError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let is_valid = !trimmed.is_empty()
            && trimmed.chars().all(|ch| ch.is_ascii_alphanumeric())
            && trimmed.starts_with(|ch: char| ch.is_ascii_uppercase());
        if !is_valid {
            return Err(SpecbookError::InvalidCompoundId(value.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SpectrumType {
    Ir,
    Thz,
    Ms,
    Uv,
}

impl SpectrumType {
    /// Token used in saved filenames: `{ID}_{token}_{index}.jdx`.
    pub fn token(self) -> &'static str {
        match self {
            SpectrumType::Ir => "IR",
            SpectrumType::Thz => "THz",
            SpectrumType::Ms => "MS",
            SpectrumType::Uv => "UV",
        }
    }

    /// `Type` query parameter understood by the webbook JCAMP endpoint.
    pub fn request_type(self) -> &'static str {
        match self {
            SpectrumType::Ir => "IR",
            SpectrumType::Thz => "THz-IR",
            SpectrumType::Ms => "Mass",
            SpectrumType::Uv => "UVVis",
        }
    }

    /// Column in the compound index marking availability of this spectrum type.
    pub fn index_column(self) -> &'static str {
        match self {
            SpectrumType::Ir => "cIR",
            SpectrumType::Thz => "cTZ",
            SpectrumType::Ms => "cMS",
            SpectrumType::Uv => "cUV",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "IR" => Some(SpectrumType::Ir),
            "THz" => Some(SpectrumType::Thz),
            "MS" => Some(SpectrumType::Ms),
            "UV" => Some(SpectrumType::Uv),
            _ => None,
        }
    }
}

impl fmt::Display for SpectrumType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.token())
    }
}

/// Which compound attribute a fetch run targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribute {
    Mol3d,
    Spectrum(SpectrumType),
}

impl Attribute {
    pub fn index_column(self) -> &'static str {
        match self {
            Attribute::Mol3d => "mol3D",
            Attribute::Spectrum(spec) => spec.index_column(),
        }
    }

    /// Extension of files written for this attribute.
    pub fn extension(self) -> &'static str {
        match self {
            Attribute::Mol3d => "mol",
            Attribute::Spectrum(_) => "jdx",
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attribute::Mol3d => write!(f, "mol3D"),
            Attribute::Spectrum(spec) => write!(f, "{spec}"),
        }
    }
}

/// Parsed `{ID}_{token}_{index}` file stem from a spectra archive or
/// destination directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpectrumFileName {
    pub id: CompoundId,
    pub spec_type: SpectrumType,
    pub index: u32,
}

impl SpectrumFileName {
    /// Index 0 marks the first (primary) spectrum of a compound and type;
    /// only those are tabularized.
    pub fn is_primary(&self) -> bool {
        self.index == 0
    }
}

impl FromStr for SpectrumFileName {
    type Err = SpecbookError;

    fn from_str(stem: &str) -> Result<Self, Self::Err> {
        let mut parts = stem.split('_');
        let (Some(id), Some(token), Some(index), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(SpecbookError::InvalidSpectrumFilename(stem.to_string()));
        };
        let spec_type = SpectrumType::from_token(token)
            .ok_or_else(|| SpecbookError::InvalidSpectrumFilename(stem.to_string()))?;
        let index = index
            .parse::<u32>()
            .map_err(|_| SpecbookError::InvalidSpectrumFilename(stem.to_string()))?;
        Ok(Self {
            id: id.parse()?,
            spec_type,
            index,
        })
    }
}

impl fmt::Display for SpectrumFileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.id, self.spec_type.token(), self.index)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parse_compound_id_valid() {
        let id: CompoundId = " C7732185 ".parse().unwrap();
        assert_eq!(id.as_str(), "C7732185");
    }

    #[test]
    fn parse_compound_id_invalid() {
        let err = "77-32_1".parse::<CompoundId>().unwrap_err();
        assert_matches!(err, SpecbookError::InvalidCompoundId(_));
        assert_matches!(
            "".parse::<CompoundId>(),
            Err(SpecbookError::InvalidCompoundId(_))
        );
    }

    #[test]
    fn parse_spectrum_filename() {
        let name: SpectrumFileName = "C7732185_MS_0".parse().unwrap();
        assert_eq!(name.id.as_str(), "C7732185");
        assert_eq!(name.spec_type, SpectrumType::Ms);
        assert!(name.is_primary());

        let secondary: SpectrumFileName = "C50000_IR_3".parse().unwrap();
        assert!(!secondary.is_primary());
    }

    #[test]
    fn parse_spectrum_filename_invalid() {
        assert_matches!(
            "C7732185_MS".parse::<SpectrumFileName>(),
            Err(SpecbookError::InvalidSpectrumFilename(_))
        );
        assert_matches!(
            "C7732185_XR_0".parse::<SpectrumFileName>(),
            Err(SpecbookError::InvalidSpectrumFilename(_))
        );
        assert_matches!(
            "C7732185_MS_x".parse::<SpectrumFileName>(),
            Err(SpecbookError::InvalidSpectrumFilename(_))
        );
    }

    #[test]
    fn attribute_columns_are_closed_set() {
        assert_eq!(Attribute::Mol3d.index_column(), "mol3D");
        assert_eq!(
            Attribute::Spectrum(SpectrumType::Thz).index_column(),
            "cTZ"
        );
        assert_eq!(Attribute::Spectrum(SpectrumType::Ms).extension(), "jdx");
    }
}
