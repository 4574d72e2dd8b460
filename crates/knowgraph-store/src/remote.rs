//! Remote graph store — CRUD against the backend's `/graphs` API.

use std::time::Duration;

use knowgraph_core::{Error, GraphRecord, Result};
use reqwest::{Client, Response, StatusCode, Url};
use tracing::debug;

/// HTTP client for the remote graph API.
#[derive(Clone)]
pub struct RemoteStore {
    client: Client,
    base_url: Url,
}

impl RemoteStore {
    /// Create a store rooted at `base_url` (e.g. `http://localhost:3001/api`).
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("HTTP client: {}", e)))?;
        Self::with_client(client, base_url)
    }

    /// Create a store sharing an existing HTTP client.
    pub fn with_client(client: Client, base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|e| Error::Config(format!("invalid API URL {}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::Config(format!("invalid API URL {}", base_url)));
        }
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `{base}/graphs`
    pub fn collection_url(&self) -> Url {
        self.url(&[])
    }

    fn url(&self, extra: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("graphs").extend(extra);
        }
        url
    }

    // ---------------------------------------------------------------
    // CRUD
    // ---------------------------------------------------------------

    pub async fn list(&self) -> Result<Vec<GraphRecord>> {
        let url = self.collection_url();
        debug!("GET {}", url);
        let response = self.client.get(url).send().await.map_err(transport_error)?;
        let response = check_status(response).await?;
        decode(response).await
    }

    pub async fn get(&self, id: &str) -> Result<GraphRecord> {
        let url = self.url(&[id]);
        debug!("GET {}", url);
        let response = self.client.get(url).send().await.map_err(transport_error)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(Error::NotFound(format!("graph {}", id)));
        }
        let response = check_status(response).await?;
        decode(response).await
    }

    /// POST when the record has no id, PUT to `/graphs/{id}` otherwise.
    pub async fn save(&self, record: &GraphRecord) -> Result<GraphRecord> {
        record.validate()?;

        let request = match record.id.as_deref() {
            Some(id) => {
                let url = self.url(&[id]);
                debug!("PUT {}", url);
                self.client.put(url)
            }
            None => {
                let url = self.collection_url();
                debug!("POST {}", url);
                self.client.post(url)
            }
        };

        let response = request.json(record).send().await.map_err(transport_error)?;
        // A rejected payload is the caller's problem, not an outage.
        if matches!(
            response.status(),
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY
        ) {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::InvalidInput(
                error_message(&body).unwrap_or_else(|| "rejected by server".into()),
            ));
        }
        let response = check_status(response).await?;
        let saved: GraphRecord = decode(response).await?;

        if !saved.is_persisted() {
            return Err(Error::remote("backend returned a graph without an id"));
        }
        Ok(saved)
    }

    /// Delete a graph. Returns true if the backend removed one.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let url = self.url(&[id]);
        debug!("DELETE {}", url);
        let response = self.client.delete(url).send().await.map_err(transport_error)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        check_status(response).await?;
        Ok(true)
    }
}

fn transport_error(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::remote(format!("request timed out: {}", e))
    } else {
        Error::remote(format!("request failed: {}", e))
    }
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = error_message(&body).unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    });
    Err(Error::remote_status(status.as_u16(), message))
}

/// Pull a human-readable message out of an error body.
fn error_message(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(value) => value
            .get("error")
            .or_else(|| value.get("message"))
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .or_else(|| Some(body.to_string())),
        Err(_) => Some(body.to_string()),
    }
}

async fn decode<T: serde::de::DeserializeOwned>(response: Response) -> Result<T> {
    let bytes = response.bytes().await.map_err(transport_error)?;
    serde_json::from_slice(&bytes)
        .map_err(|e| Error::remote(format!("malformed response body: {}", e)))
}
