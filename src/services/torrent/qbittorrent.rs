//! qBittorrent Web API client
//!
//! Uses API v2. The session cookie from `/auth/login` lives in reqwest's
//! cookie store. Login happens lazily on first use, and once more if a
//! request comes back 403 because the session expired.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::Form;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{AdapterError, TorrentClient, TorrentState, TransferState};

/// Raw entry of `/api/v2/torrents/info`
#[derive(Debug, Clone, Deserialize)]
struct TorrentInfoResponse {
    hash: String,
    name: String,
    #[serde(default)]
    progress: f64,
    #[serde(default)]
    save_path: String,
    #[serde(default)]
    size: i64,
    #[serde(default)]
    downloaded: i64,
    #[serde(default)]
    uploaded: i64,
    #[serde(default)]
    state: String,
}

/// Map a qBittorrent state label onto [`TorrentState`]
fn map_state(raw: &str) -> TorrentState {
    match raw {
        "downloading" | "metaDL" | "forcedDL" => TorrentState::Downloading,
        "stalledDL" => TorrentState::Stalled,
        "queuedDL" => TorrentState::Queued,
        "checkingDL" => TorrentState::Checking,
        "uploading" | "stalledUP" | "forcedUP" | "queuedUP" | "checkingUP" => {
            TorrentState::Seeding
        }
        "pausedDL" | "pausedUP" | "stoppedDL" | "stoppedUP" => TorrentState::Paused,
        "error" | "missingFiles" => TorrentState::Error,
        _ => TorrentState::Unknown,
    }
}

impl From<TorrentInfoResponse> for TransferState {
    fn from(info: TorrentInfoResponse) -> Self {
        Self {
            id: info.hash,
            name: info.name,
            progress: info.progress,
            save_path: info.save_path,
            size: info.size.max(0) as u64,
            downloaded: info.downloaded.max(0) as u64,
            uploaded: info.uploaded.max(0) as u64,
            state: map_state(&info.state),
            raw_state: info.state,
        }
    }
}

/// Parse the body of `/api/v2/torrents/info`
fn parse_torrent_list(body: &str) -> Result<Vec<TransferState>, AdapterError> {
    let torrents: Vec<TorrentInfoResponse> =
        serde_json::from_str(body).map_err(|e| AdapterError::Decode(e.to_string()))?;
    Ok(torrents.into_iter().map(TransferState::from).collect())
}

pub struct QBittorrentClient {
    client: Client,
    base_url: String,
    username: String,
    password: String,
    logged_in: AtomicBool,
}

impl QBittorrentClient {
    pub fn new(base_url: &str, username: &str, password: &str) -> Result<Self, AdapterError> {
        let client = Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            username: username.to_string(),
            password: password.to_string(),
            logged_in: AtomicBool::new(false),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v2/{}", self.base_url, path)
    }

    async fn ensure_logged_in(&self) -> Result<(), AdapterError> {
        if !self.logged_in.load(Ordering::Acquire) {
            self.login().await?;
        }
        Ok(())
    }

    /// Send an authenticated request, logging in again once on 403.
    /// `build` is called per attempt because multipart bodies can't be reused.
    async fn send<F>(&self, endpoint: &'static str, build: F) -> Result<Response, AdapterError>
    where
        F: Fn() -> RequestBuilder,
    {
        self.ensure_logged_in().await?;

        let mut response = build().send().await?;
        if response.status() == StatusCode::FORBIDDEN {
            debug!(endpoint, "qBittorrent session expired, logging in again");
            self.logged_in.store(false, Ordering::Release);
            self.login().await?;
            response = build().send().await?;
        }

        if !response.status().is_success() {
            return Err(AdapterError::Api {
                endpoint,
                status: response.status(),
            });
        }
        Ok(response)
    }

    async fn list_all(&self) -> Result<Vec<TransferState>, AdapterError> {
        let url = self.url("torrents/info");
        let response = self.send("torrents/info", || self.client.get(&url)).await?;
        let body = response.text().await?;
        parse_torrent_list(&body)
    }
}

#[async_trait]
impl TorrentClient for QBittorrentClient {
    async fn login(&self) -> Result<(), AdapterError> {
        let response = self
            .client
            .post(self.url("auth/login"))
            .form(&[("username", &self.username), ("password", &self.password)])
            .send()
            .await?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "qBittorrent login rejected");
            return Err(AdapterError::Auth);
        }

        let body = response.text().await?;
        if !body.to_lowercase().contains("ok") {
            warn!("qBittorrent login failed, check credentials");
            return Err(AdapterError::Auth);
        }

        self.logged_in.store(true, Ordering::Release);
        info!(url = %self.base_url, "Logged in to qBittorrent");
        Ok(())
    }

    async fn submit(&self, magnet: &str, destination: Option<&str>) -> Result<(), AdapterError> {
        let url = self.url("torrents/add");
        let destination = destination.filter(|d| !d.trim().is_empty());

        self.send("torrents/add", || {
            let mut form = Form::new().text("urls", magnet.to_string());
            if let Some(dest) = destination {
                form = form
                    .text("savepath", dest.to_string())
                    .text("root_folder", "false");
            }
            self.client.post(&url).multipart(form)
        })
        .await?;

        debug!(destination = ?destination, "Torrent submitted to qBittorrent");
        Ok(())
    }

    async fn list_active(&self) -> Result<Vec<TransferState>, AdapterError> {
        Ok(self
            .list_all()
            .await?
            .into_iter()
            .filter(TransferState::is_active)
            .collect())
    }

    async fn get_by_name_or_hash(
        &self,
        term: &str,
    ) -> Result<Option<TransferState>, AdapterError> {
        Ok(self.list_all().await?.into_iter().find(|t| t.matches(term)))
    }

    async fn remove(&self, id: &str, delete_files: bool) -> Result<(), AdapterError> {
        let url = self.url("torrents/delete");
        let delete_files = if delete_files { "true" } else { "false" };

        self.send("torrents/delete", || {
            self.client
                .post(&url)
                .form(&[("hashes", id), ("deleteFiles", delete_files)])
        })
        .await?;

        debug!(hash = %id, delete_files, "Torrent removed from qBittorrent");
        Ok(())
    }
}
