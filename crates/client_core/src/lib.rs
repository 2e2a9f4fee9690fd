use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{de::DeserializeOwned, Serialize};
use shared::{
    error::ApiError,
    protocol::{
        HistoryEntry, MoveRequest, MoveResult, PromotionFinalizeRequest, SnapshotResponse,
        StatusResponse,
    },
};
use thiserror::Error;
use tracing::debug;
use url::Url;

pub mod controller;
pub mod gesture;
pub mod orientation;
pub mod promotion;
pub mod render;
mod runtime;

pub use orientation::{MemoryOrientationStore, OrientationStore, ORIENTATION_KEY};
pub use runtime::{BoardController, ControllerHandle, ControllerSettings};

/// Faults that never reached a service verdict. A verdict of "rejected" is a
/// [`MoveResult::Failure`], not an error.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{endpoint} request failed: {source}")]
    Transport {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{endpoint} returned HTTP {status}: {message}")]
    Http {
        endpoint: &'static str,
        status: u16,
        message: String,
    },
    #[error("malformed {endpoint} response: {reason}")]
    Malformed {
        endpoint: &'static str,
        reason: String,
    },
}

#[async_trait]
pub trait BoardService: Send + Sync {
    async fn fetch_snapshot(&self) -> Result<SnapshotResponse, ClientError>;
    async fn submit_move(&self, request: &MoveRequest) -> Result<MoveResult, ClientError>;
    async fn finalize_promotion(
        &self,
        request: &PromotionFinalizeRequest,
    ) -> Result<MoveResult, ClientError>;
    async fn reset(&self) -> Result<MoveResult, ClientError>;
    async fn undo(&self) -> Result<MoveResult, ClientError>;
    async fn history(&self) -> Result<Vec<HistoryEntry>, ClientError>;
}

const SNAPSHOT_ENDPOINT: &str = "chessboard";
const MOVE_ENDPOINT: &str = "move";
const RESET_ENDPOINT: &str = "reset";
const UNDO_ENDPOINT: &str = "undo";
const HISTORY_ENDPOINT: &str = "history";
const PROMOTE_ENDPOINT: &str = "promote";

/// JSON-over-HTTP client for the remote game service.
pub struct HttpBoardService {
    http: Client,
    base_url: Url,
}

impl HttpBoardService {
    pub fn new(server_url: &str) -> Result<Self> {
        let mut base_url =
            Url::parse(server_url).with_context(|| format!("invalid server url '{server_url}'"))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            http: Client::new(),
            base_url,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, endpoint: &'static str) -> Result<Url, ClientError> {
        self.base_url
            .join(endpoint)
            .map_err(|err| ClientError::Malformed {
                endpoint,
                reason: format!("cannot build url: {err}"),
            })
    }

    async fn get_json<T: DeserializeOwned>(&self, endpoint: &'static str) -> Result<T, ClientError> {
        let res = self
            .http
            .get(self.endpoint(endpoint)?)
            .send()
            .await
            .map_err(|source| ClientError::Transport { endpoint, source })?;
        let status = res.status();
        let body = read_body(endpoint, res).await?;
        if !status.is_success() {
            return Err(http_error(endpoint, status.as_u16(), &body));
        }
        parse_body(endpoint, &body)
    }

    /// Status-bearing POST. A non-2xx response still counts as a verdict when
    /// its body carries a `status` field.
    async fn post_status<B: Serialize + Sync + ?Sized>(
        &self,
        endpoint: &'static str,
        body: Option<&B>,
    ) -> Result<MoveResult, ClientError> {
        let mut req = self.http.post(self.endpoint(endpoint)?);
        if let Some(body) = body {
            req = req.json(body);
        }
        let res = req
            .send()
            .await
            .map_err(|source| ClientError::Transport { endpoint, source })?;
        let status = res.status();
        let raw = read_body(endpoint, res).await?;

        match serde_json::from_str::<StatusResponse>(&raw) {
            Ok(parsed) => {
                debug!(endpoint, http_status = status.as_u16(), verdict = %parsed.status, "service verdict");
                Ok(parsed.result())
            }
            Err(_) if !status.is_success() => Err(http_error(endpoint, status.as_u16(), &raw)),
            Err(err) => Err(ClientError::Malformed {
                endpoint,
                reason: err.to_string(),
            }),
        }
    }
}

async fn read_body(endpoint: &'static str, res: Response) -> Result<String, ClientError> {
    res.text()
        .await
        .map_err(|source| ClientError::Transport { endpoint, source })
}

fn parse_body<T: DeserializeOwned>(endpoint: &'static str, raw: &str) -> Result<T, ClientError> {
    serde_json::from_str(raw).map_err(|err| ClientError::Malformed {
        endpoint,
        reason: err.to_string(),
    })
}

fn http_error(endpoint: &'static str, status: u16, raw: &str) -> ClientError {
    let message = match serde_json::from_str::<ApiError>(raw) {
        Ok(api) => format!("{:?}: {}", api.code, api.message),
        Err(_) if raw.trim().is_empty() => "empty body".to_string(),
        Err(_) => raw.chars().take(200).collect(),
    };
    ClientError::Http {
        endpoint,
        status,
        message,
    }
}

#[async_trait]
impl BoardService for HttpBoardService {
    async fn fetch_snapshot(&self) -> Result<SnapshotResponse, ClientError> {
        self.get_json(SNAPSHOT_ENDPOINT).await
    }

    async fn submit_move(&self, request: &MoveRequest) -> Result<MoveResult, ClientError> {
        self.post_status(MOVE_ENDPOINT, Some(request)).await
    }

    async fn finalize_promotion(
        &self,
        request: &PromotionFinalizeRequest,
    ) -> Result<MoveResult, ClientError> {
        self.post_status(PROMOTE_ENDPOINT, Some(request)).await
    }

    async fn reset(&self) -> Result<MoveResult, ClientError> {
        self.post_status::<()>(RESET_ENDPOINT, None).await
    }

    async fn undo(&self) -> Result<MoveResult, ClientError> {
        self.post_status::<()>(UNDO_ENDPOINT, None).await
    }

    async fn history(&self) -> Result<Vec<HistoryEntry>, ClientError> {
        self.get_json(HISTORY_ENDPOINT).await
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
