use std::cmp;
use std::thread;
use std::time::Duration;

use camino::Utf8Path;
use serde::Serialize;
use tracing::{info, warn};

use crate::domain::{Attribute, CompoundId, SpectrumType};
use crate::error::SpecbookError;
use crate::index::CompoundIndex;
use crate::output::{ProgressEvent, ProgressSink};
use crate::store::LoadedSet;
use crate::webbook::WebbookClient;

/// What a fetch run downloads; the closed set of per-kind strategies lives in
/// the match inside [`run_fetch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    Mol3d,
    Spectra(SpectrumType),
}

impl FetchKind {
    pub fn attribute(self) -> Attribute {
        match self {
            FetchKind::Mol3d => Attribute::Mol3d,
            FetchKind::Spectra(spec) => Attribute::Spectrum(spec),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub base_delay: Duration,
    pub delay_cap: Duration,
}

impl FetchOptions {
    /// Validates delays at the boundary; both must be non-negative seconds.
    pub fn from_secs(base_delay: f64, delay_cap: f64) -> Result<Self, SpecbookError> {
        if !base_delay.is_finite() || base_delay < 0.0 {
            return Err(SpecbookError::InvalidDelay(base_delay));
        }
        if !delay_cap.is_finite() || delay_cap < 0.0 {
            return Err(SpecbookError::InvalidDelay(delay_cap));
        }
        Ok(Self {
            base_delay: Duration::from_secs_f64(base_delay),
            delay_cap: Duration::from_secs_f64(delay_cap),
        })
    }
}

/// Pause after a fetch that produced `results` files: the minimum delay when
/// nothing came back, otherwise scaled by the work just imposed on the remote
/// server and capped to keep waits bounded.
pub fn pause_for(results: usize, base_delay: Duration, delay_cap: Duration) -> Duration {
    if results == 0 {
        return base_delay;
    }
    let scaled = base_delay.saturating_mul(results.saturating_add(1).min(u32::MAX as usize) as u32);
    cmp::min(delay_cap, scaled)
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedItem {
    pub id: CompoundId,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FetchReport {
    pub requested: usize,
    pub skipped: usize,
    pub fetched: usize,
    pub empty: usize,
    pub failed: Vec<FailedItem>,
}

/// Sequentially fetches every ID not in the loaded snapshot, isolating
/// failures per item: a bad ID is logged and recorded, never aborts the run.
/// Interruption signals are not trapped anywhere, so they terminate the
/// process instead of being swallowed here.
pub fn run_fetch<C: WebbookClient>(
    client: &C,
    kind: FetchKind,
    ids: &[CompoundId],
    loaded: &LoadedSet,
    index: &CompoundIndex,
    destination: &Utf8Path,
    options: &FetchOptions,
    sink: &dyn ProgressSink,
) -> FetchReport {
    let mut report = FetchReport {
        requested: ids.len(),
        ..FetchReport::default()
    };

    for id in ids {
        if loaded.contains(id) {
            report.skipped += 1;
            continue;
        }

        let result = match kind {
            FetchKind::Mol3d => match index.get(id).and_then(|meta| meta.mol3d_url.clone()) {
                // An index row without a usable URL is a zero-result item,
                // not a crash.
                None => Ok(0),
                Some(url) => client.download_mol3d(id, &url, destination),
            },
            FetchKind::Spectra(spec) => client.download_spectra(id, spec, destination),
        };

        let pause = match result {
            Ok(0) => {
                report.empty += 1;
                info!(id = %id, "nothing found");
                sink.event(ProgressEvent {
                    message: format!("{id}: nothing found"),
                });
                options.base_delay
            }
            Ok(saved) => {
                report.fetched += 1;
                sink.event(ProgressEvent {
                    message: format!("{id}: saved {saved} file(s)"),
                });
                pause_for(saved, options.base_delay, options.delay_cap)
            }
            Err(err) => {
                warn!(id = %id, error = %err, "fetch failed, continuing");
                sink.event(ProgressEvent {
                    message: format!("{id}: {err}"),
                });
                report.failed.push(FailedItem {
                    id: id.clone(),
                    reason: err.to_string(),
                });
                options.base_delay
            }
        };
        if !pause.is_zero() {
            thread::sleep(pause);
        }
    }

    report
}
