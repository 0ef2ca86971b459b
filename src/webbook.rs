use std::thread;
use std::time::Duration;

use camino::Utf8Path;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use tracing::debug;

use crate::domain::{CompoundId, SpectrumType};
use crate::error::SpecbookError;
use crate::store::write_text_atomic;

/// Remote webbook operations used by the fetch loop. One call fetches one
/// compound unit and persists zero or more files under the destination
/// directory, returning how many were saved.
pub trait WebbookClient: Send + Sync {
    /// Saves the compound's 3D MOL-file as `{ID}.mol`. An empty response body
    /// counts as zero results, not as a failure.
    fn download_mol3d(
        &self,
        id: &CompoundId,
        url: &str,
        destination_dir: &Utf8Path,
    ) -> Result<usize, SpecbookError>;

    /// Saves every available spectrum of the given type as
    /// `{ID}_{token}_{index}.jdx`, indexes starting at 0.
    fn download_spectra(
        &self,
        id: &CompoundId,
        spec_type: SpectrumType,
        destination_dir: &Utf8Path,
    ) -> Result<usize, SpecbookError>;
}

#[derive(Clone)]
pub struct WebbookHttpClient {
    client: Client,
    base_url: String,
}

impl WebbookHttpClient {
    pub fn new() -> Result<Self, SpecbookError> {
        Self::with_base_url("https://webbook.nist.gov".to_string())
    }

    pub fn with_base_url(base_url: String) -> Result<Self, SpecbookError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("specbook/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| SpecbookError::Filesystem(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| SpecbookError::WebbookHttp(err.to_string()))?;
        Ok(Self { client, base_url })
    }

    fn jcamp_url(&self, id: &CompoundId, spec_type: SpectrumType, index: usize) -> String {
        format!(
            "{}/cgi/cbook.cgi?JCAMP={}&Index={}&Type={}",
            self.base_url,
            id.as_str(),
            index,
            spec_type.request_type()
        )
    }

    fn send_with_retries<F>(
        &self,
        mut make_req: F,
    ) -> Result<reqwest::blocking::Response, SpecbookError>
    where
        F: FnMut() -> reqwest::blocking::RequestBuilder,
    {
        const MAX_RETRIES: usize = 3;
        const BASE_DELAY_MS: u64 = 200;
        let mut attempt = 0usize;
        loop {
            let response = make_req().send();
            match response {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < MAX_RETRIES && is_retryable_status(status) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < MAX_RETRIES && is_retryable_error(&err) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Err(SpecbookError::WebbookHttp(err.to_string()));
                }
            }
        }
    }

    fn fetch_text(&self, url: &str) -> Result<Option<String>, SpecbookError> {
        let response = self.send_with_retries(|| self.client.get(url))?;
        if response.status().as_u16() == 404 {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "webbook request failed".to_string());
            return Err(SpecbookError::WebbookStatus { status, message });
        }
        let text = response
            .text()
            .map_err(|err| SpecbookError::WebbookHttp(err.to_string()))?;
        Ok(Some(text))
    }
}

impl WebbookClient for WebbookHttpClient {
    fn download_mol3d(
        &self,
        id: &CompoundId,
        url: &str,
        destination_dir: &Utf8Path,
    ) -> Result<usize, SpecbookError> {
        let Some(text) = self.fetch_text(url)? else {
            return Ok(0);
        };
        if text.trim().is_empty() {
            return Ok(0);
        }
        let path = destination_dir.join(format!("{id}.mol"));
        write_text_atomic(&path, &text.replace("\r\n", "\n"))?;
        Ok(1)
    }

    fn download_spectra(
        &self,
        id: &CompoundId,
        spec_type: SpectrumType,
        destination_dir: &Utf8Path,
    ) -> Result<usize, SpecbookError> {
        let mut saved = 0usize;
        loop {
            let url = self.jcamp_url(id, spec_type, saved);
            let Some(text) = self.fetch_text(&url)? else {
                break;
            };
            if !is_jcamp_block(&text) {
                debug!(id = %id, index = saved, "webbook reported no further spectra");
                break;
            }
            let path = destination_dir.join(format!("{id}_{}_{saved}.jdx", spec_type.token()));
            write_text_atomic(&path, &text.replace("\r\n", "\n"))?;
            saved += 1;
        }
        Ok(saved)
    }
}

/// The webbook answers out-of-range spectrum indexes with an HTML notice
/// rather than a 404; a real payload always carries JCAMP label lines.
fn is_jcamp_block(text: &str) -> bool {
    let head = text.trim_start();
    head.starts_with("##TITLE") && !head.contains("Spectrum not found")
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}
