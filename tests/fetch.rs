use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::SystemTime;

use camino::{Utf8Path, Utf8PathBuf};

use specbook::domain::{CompoundId, SpectrumType};
use specbook::error::SpecbookError;
use specbook::fetch::{FetchKind, FetchOptions, run_fetch};
use specbook::index::CompoundIndex;
use specbook::output::{ProgressEvent, ProgressSink};
use specbook::store::scan_loaded;
use specbook::webbook::WebbookClient;

struct NoopSink;

impl ProgressSink for NoopSink {
    fn event(&self, _event: ProgressEvent) {}
}

/// Saves fixture files like the real client would; configurable per-ID
/// spectrum counts and transport failures.
#[derive(Default)]
struct MockWebbook {
    counts: HashMap<String, usize>,
    fail: HashSet<String>,
    calls: Mutex<Vec<String>>,
}

impl MockWebbook {
    fn with_counts(counts: &[(&str, usize)]) -> Self {
        Self {
            counts: counts
                .iter()
                .map(|(id, count)| (id.to_string(), *count))
                .collect(),
            ..Self::default()
        }
    }

    fn failing(mut self, id: &str) -> Self {
        self.fail.insert(id.to_string());
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl WebbookClient for MockWebbook {
    fn download_mol3d(
        &self,
        id: &CompoundId,
        _url: &str,
        destination_dir: &Utf8Path,
    ) -> Result<usize, SpecbookError> {
        self.calls.lock().unwrap().push(id.to_string());
        if self.fail.contains(id.as_str()) {
            return Err(SpecbookError::WebbookHttp("connection reset".to_string()));
        }
        let count = self.counts.get(id.as_str()).copied().unwrap_or(1).min(1);
        if count > 0 {
            let path = destination_dir.join(format!("{id}.mol"));
            std::fs::write(path.as_std_path(), "mock\nM  END\n").unwrap();
        }
        Ok(count)
    }

    fn download_spectra(
        &self,
        id: &CompoundId,
        spec_type: SpectrumType,
        destination_dir: &Utf8Path,
    ) -> Result<usize, SpecbookError> {
        self.calls.lock().unwrap().push(id.to_string());
        if self.fail.contains(id.as_str()) {
            return Err(SpecbookError::WebbookHttp("connection reset".to_string()));
        }
        let count = self.counts.get(id.as_str()).copied().unwrap_or(1);
        for index in 0..count {
            let path = destination_dir.join(format!("{id}_{}_{index}.jdx", spec_type.token()));
            std::fs::write(path.as_std_path(), "##TITLE=mock\n1,2 \n##END=\n").unwrap();
        }
        Ok(count)
    }
}

fn ids(values: &[&str]) -> Vec<CompoundId> {
    values.iter().map(|value| value.parse().unwrap()).collect()
}

fn temp_dir() -> (tempfile::TempDir, Utf8PathBuf) {
    let temp = tempfile::tempdir().unwrap();
    let dir = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    (temp, dir)
}

fn index_fixture(dir: &Utf8Path, rows: &str) -> CompoundIndex {
    let path = dir.join("compounds.csv");
    std::fs::write(
        path.as_std_path(),
        format!("ID,name,inchi,mol3D,cMS\n{rows}"),
    )
    .unwrap();
    CompoundIndex::load(&path).unwrap()
}

fn no_delay() -> FetchOptions {
    FetchOptions::from_secs(0.0, 0.0).unwrap()
}

#[test]
fn one_bad_id_never_aborts_the_run() {
    let (_temp, dir) = temp_dir();
    let dest = dir.join("raw");
    std::fs::create_dir(dest.as_std_path()).unwrap();
    let index = index_fixture(&dir, "CX,x,ix,,1\nCY,y,iy,,1\nCZ,z,iz,,1\n");

    let client = MockWebbook::with_counts(&[("CX", 1), ("CZ", 2)]).failing("CY");
    let report = run_fetch(
        &client,
        FetchKind::Spectra(SpectrumType::Ms),
        &ids(&["CX", "CY", "CZ"]),
        &scan_loaded(&dest, "jdx").unwrap(),
        &index,
        &dest,
        &no_delay(),
        &NoopSink,
    );

    assert_eq!(report.fetched, 2);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].id.as_str(), "CY");
    assert!(dest.join("CX_MS_0.jdx").as_std_path().exists());
    assert!(dest.join("CZ_MS_0.jdx").as_std_path().exists());
    assert!(dest.join("CZ_MS_1.jdx").as_std_path().exists());
    assert!(!dest.join("CY_MS_0.jdx").as_std_path().exists());
}

#[test]
fn resume_refetches_only_the_most_recent_and_missing_ids() {
    let (_temp, dir) = temp_dir();
    let dest = dir.join("raw");
    std::fs::create_dir(dest.as_std_path()).unwrap();
    let index = index_fixture(&dir, "C10,a,ia,,1\nC20,b,ib,,1\nC30,c,ic,,1\n");

    for (name, secs) in [("C10_MS_0.jdx", 100u64), ("C20_MS_0.jdx", 200)] {
        let path = dest.join(name);
        std::fs::write(path.as_std_path(), "old").unwrap();
        let file = std::fs::File::options()
            .write(true)
            .open(path.as_std_path())
            .unwrap();
        file.set_modified(SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(secs))
            .unwrap();
    }

    let client = MockWebbook::default();
    let report = run_fetch(
        &client,
        FetchKind::Spectra(SpectrumType::Ms),
        &ids(&["C10", "C20", "C30"]),
        &scan_loaded(&dest, "jdx").unwrap(),
        &index,
        &dest,
        &no_delay(),
        &NoopSink,
    );

    // C20 is the most recently loaded file, so it is re-fetched along with
    // the never-loaded C30; C10 is skipped.
    assert_eq!(client.calls(), vec!["C20", "C30"]);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.fetched, 2);
}

#[test]
fn zero_result_items_are_notices_not_failures() {
    let (_temp, dir) = temp_dir();
    let dest = dir.join("mol");
    std::fs::create_dir(dest.as_std_path()).unwrap();
    let index = index_fixture(
        &dir,
        "C1,a,ia,https://x/C1.mol,\nC2,b,ib,https://x/C2.mol,\nC3,c,ic,,\n",
    );

    // C2 answers with an empty body; C3 has no usable URL in the index.
    let client = MockWebbook::with_counts(&[("C2", 0)]);
    let report = run_fetch(
        &client,
        FetchKind::Mol3d,
        &ids(&["C1", "C2", "C3"]),
        &scan_loaded(&dest, "mol").unwrap(),
        &index,
        &dest,
        &no_delay(),
        &NoopSink,
    );

    assert_eq!(report.fetched, 1);
    assert_eq!(report.empty, 2);
    assert!(report.failed.is_empty());
    assert!(dest.join("C1.mol").as_std_path().exists());
    assert!(!dest.join("C2.mol").as_std_path().exists());
}
