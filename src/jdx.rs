use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::SpecbookError;

/// A whitespace-separated run of `m/z,intensity` pairs. JDX headers and
/// footers never match it, so the first hit is the peak payload.
static PEAK_BLOCK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+,\d+\s+)+").unwrap());

/// Extracts the `(m/z, intensity)` pairs from the text of one JDX spectrum
/// file, sorted ascending by m/z. Source files are not guaranteed sorted.
pub fn parse_peaks(text: &str, origin: &str) -> Result<Vec<(u32, u32)>, SpecbookError> {
    let block = PEAK_BLOCK
        .find(text)
        .ok_or_else(|| SpecbookError::NoPeakData(origin.to_string()))?;
    let mut peaks = Vec::new();
    for token in block.as_str().split_whitespace() {
        let pair = token
            .split_once(',')
            .and_then(|(mz, intensity)| Some((mz.parse::<u32>().ok()?, intensity.parse::<u32>().ok()?)));
        match pair {
            Some(peak) => peaks.push(peak),
            None => {
                return Err(SpecbookError::MalformedPeakPair {
                    origin: origin.to_string(),
                    pair: token.to_string(),
                });
            }
        }
    }
    peaks.sort_unstable();
    Ok(peaks)
}

/// Mapping form of [`parse_peaks`]: m/z keys are unique by construction in a
/// JDX block, iteration order is ascending m/z.
pub fn parse_peaks_map(text: &str, origin: &str) -> Result<BTreeMap<u32, u32>, SpecbookError> {
    Ok(parse_peaks(text, origin)?.into_iter().collect())
}

/// Splits a sorted peak list into co-sorted m/z and intensity sequences.
pub fn into_series(peaks: Vec<(u32, u32)>) -> (Vec<u32>, Vec<u32>) {
    peaks.into_iter().unzip()
}
