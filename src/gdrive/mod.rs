pub mod client;
pub mod oauth;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::HarvestError;
use crate::harvest::config::DriveConfig;
use crate::harvest::paths::HarvestPaths;
use crate::harvest::util::now_epoch_secs;
use client::DriveClient;
use oauth::{ClientSecrets, StoredToken};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// OAuth credential for Drive: client secrets, the current token, and where
/// refreshed tokens get written back.
pub struct DriveAuth {
    secrets: ClientSecrets,
    token: StoredToken,
    token_path: PathBuf,
}

impl DriveAuth {
    /// Current access token, refreshed first when it is stale.
    pub fn bearer(&mut self, http: &Client) -> Result<String> {
        if !self.token.is_fresh(now_epoch_secs()?) && self.token.refresh_token.is_some() {
            return self.force_refresh(http);
        }
        Ok(self.token.access_token.clone())
    }

    pub fn force_refresh(&mut self, http: &Client) -> Result<String> {
        let refreshed = oauth::refresh_token(http, &self.secrets, &self.token)?;
        oauth::save_token(&self.token_path, &refreshed)?;
        tracing::info!(path = %self.token_path.display(), "refreshed drive token");
        self.token = refreshed;
        Ok(self.token.access_token.clone())
    }
}

pub fn http_client() -> Result<Client> {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .context("failed to build http client")
}

fn authorize_inner(paths: &HarvestPaths, cfg: &DriveConfig, http: &Client, force: bool) -> Result<DriveAuth> {
    let secrets = oauth::load_client_secrets(&paths.drive_credentials_file)?;
    let token_path = paths.drive_token_file.clone();

    let cached = if force { None } else { oauth::load_token(&token_path)? };
    let token = match cached {
        Some(token) if token.is_fresh(now_epoch_secs()?) => token,
        Some(token) if token.refresh_token.is_some() => {
            let refreshed = oauth::refresh_token(http, &secrets, &token)?;
            oauth::save_token(&token_path, &refreshed)?;
            tracing::info!(path = %token_path.display(), "refreshed drive token");
            refreshed
        }
        _ => {
            let token = oauth::interactive_authorize(
                http,
                &secrets,
                cfg.oauth_port,
                Duration::from_secs(cfg.oauth_timeout_secs),
            )?;
            oauth::save_token(&token_path, &token)?;
            tracing::info!(path = %token_path.display(), "stored drive token");
            token
        }
    };

    Ok(DriveAuth {
        secrets,
        token,
        token_path,
    })
}

/// Produce a usable Drive credential: cached token, refreshed token, or a
/// fresh interactive consent, in that order. `force` skips the cache.
pub fn authorize(
    paths: &HarvestPaths,
    cfg: &DriveConfig,
    http: &Client,
    force: bool,
) -> Result<DriveAuth, HarvestError> {
    authorize_inner(paths, cfg, http, force)
        .map_err(|err| HarvestError::Authentication(format!("drive: {err:#}")))
}

pub fn connect(paths: &HarvestPaths, cfg: &DriveConfig) -> Result<DriveClient, HarvestError> {
    let http = http_client().map_err(|err| HarvestError::RemoteStore(format!("{err:#}")))?;
    let auth = authorize(paths, cfg, &http, false)?;
    Ok(DriveClient::new(http, auth))
}
