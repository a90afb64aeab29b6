use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{Cursor, Write};
use std::path::Path;
use std::time::{Duration, Instant};

use crate::harvest::util::now_epoch_secs;

pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive.file";
const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const EXPIRY_SKEW_SECS: u64 = 60;

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

#[derive(Debug, Deserialize)]
struct CredentialsFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

pub fn parse_client_secrets(raw: &str) -> Result<ClientSecrets> {
    let parsed: CredentialsFile =
        serde_json::from_str(raw).context("credentials file is not valid JSON")?;
    parsed
        .installed
        .or(parsed.web)
        .context("credentials file has neither an `installed` nor a `web` client")
}

pub fn load_client_secrets(path: &Path) -> Result<ClientSecrets> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read drive credentials {}", path.display()))?;
    parse_client_secrets(&raw).with_context(|| format!("invalid {}", path.display()))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_at_epoch_secs: Option<u64>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl StoredToken {
    pub fn is_fresh(&self, now_epoch_secs: u64) -> bool {
        match self.expires_at_epoch_secs {
            Some(expires) => now_epoch_secs + EXPIRY_SKEW_SECS < expires,
            None => false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    scope: Option<String>,
}

impl TokenResponse {
    /// Refresh responses omit the refresh token; keep the one we had.
    fn into_stored(self, now_epoch_secs: u64, previous_refresh: Option<String>) -> StoredToken {
        StoredToken {
            access_token: self.access_token,
            refresh_token: self.refresh_token.or(previous_refresh),
            expires_at_epoch_secs: self.expires_in.map(|secs| now_epoch_secs + secs),
            token_type: self.token_type,
            scope: self.scope,
        }
    }
}

pub fn load_token(path: &Path) -> Result<Option<StoredToken>> {
    if !path.exists() {
        return Ok(None);
    }
    let raw =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let token = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(Some(token))
}

pub fn save_token(path: &Path, token: &StoredToken) -> Result<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).with_context(|| format!("failed to create {}", parent.display()))?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent)
        .with_context(|| format!("failed to stage token in {}", parent.display()))?;
    let data = serde_json::to_string_pretty(token)?;
    tmp.write_all(data.as_bytes())?;
    tmp.write_all(b"\n")?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(tmp.path(), fs::Permissions::from_mode(0o600))
            .with_context(|| format!("failed to chmod {}", tmp.path().display()))?;
    }
    tmp.persist(path)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

fn post_token_form(http: &Client, token_uri: &str, form: &[(&str, &str)]) -> Result<TokenResponse> {
    let response = http
        .post(token_uri)
        .form(form)
        .send()
        .with_context(|| format!("token request to {token_uri} failed"))?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        anyhow::bail!("token endpoint answered {status}: {}", body.trim());
    }
    response.json().context("token endpoint returned malformed JSON")
}

pub fn refresh_token(http: &Client, secrets: &ClientSecrets, token: &StoredToken) -> Result<StoredToken> {
    let refresh = token
        .refresh_token
        .as_deref()
        .context("stored token has no refresh token")?;
    let response = post_token_form(
        http,
        &secrets.token_uri,
        &[
            ("client_id", secrets.client_id.as_str()),
            ("client_secret", secrets.client_secret.as_str()),
            ("refresh_token", refresh),
            ("grant_type", "refresh_token"),
        ],
    )?;
    Ok(response.into_stored(now_epoch_secs()?, token.refresh_token.clone()))
}

fn random_urlsafe(len_bytes: usize) -> Result<String> {
    let mut bytes = vec![0u8; len_bytes];
    getrandom::fill(&mut bytes).map_err(|err| anyhow::anyhow!("failed to gather randomness: {err}"))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

pub fn pkce_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

pub fn authorization_url(
    secrets: &ClientSecrets,
    redirect_uri: &str,
    state: &str,
    challenge: &str,
) -> String {
    let params = [
        ("client_id", secrets.client_id.as_str()),
        ("redirect_uri", redirect_uri),
        ("response_type", "code"),
        ("scope", DRIVE_SCOPE),
        ("access_type", "offline"),
        ("prompt", "consent"),
        ("state", state),
        ("code_challenge", challenge),
        ("code_challenge_method", "S256"),
    ];
    let query = params
        .iter()
        .map(|(k, v)| format!("{k}={}", urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");
    format!("{}?{query}", secrets.auth_uri)
}

#[derive(Debug, Default, PartialEq, Eq)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

fn parse_callback_query(url: &str) -> Result<CallbackParams> {
    let mut out = CallbackParams::default();
    let Some(query) = url.split_once('?').map(|(_, q)| q) else {
        return Ok(out);
    };
    for pair in query.split('&') {
        let Some((key, value)) = pair.split_once('=') else {
            continue;
        };
        let value = urlencoding::decode(value)
            .with_context(|| format!("bad percent-encoding in callback parameter `{key}`"))?
            .into_owned();
        match key {
            "code" => out.code = Some(value),
            "state" => out.state = Some(value),
            "error" => out.error = Some(value),
            _ => {}
        }
    }
    Ok(out)
}

fn html_response(body: &str) -> tiny_http::Response<Cursor<Vec<u8>>> {
    let response = tiny_http::Response::from_string(body);
    match tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"text/html; charset=utf-8"[..]) {
        Ok(header) => response.with_header(header),
        Err(()) => response,
    }
}

/// Block until the loopback listener receives the authorization redirect.
/// Requests without a `code`/`error` (favicon and the like) are ignored.
fn wait_for_code(server: &tiny_http::Server, timeout: Duration, expected_state: &str) -> Result<String> {
    let deadline = Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            anyhow::bail!("authorization callback timed out after {}s", timeout.as_secs());
        }
        let Some(request) = server
            .recv_timeout(remaining)
            .context("authorization listener failed")?
        else {
            anyhow::bail!("authorization callback timed out after {}s", timeout.as_secs());
        };

        let params = parse_callback_query(request.url())?;
        if let Some(error) = params.error {
            let _ = request.respond(html_response(
                "<html><body><h1>Authorization failed</h1><p>Check the terminal.</p></body></html>",
            ));
            anyhow::bail!("authorization denied: {error}");
        }
        let Some(code) = params.code else {
            let _ = request.respond(tiny_http::Response::from_string("").with_status_code(204));
            continue;
        };
        if params.state.as_deref() != Some(expected_state) {
            let _ = request.respond(html_response(
                "<html><body><h1>Authorization failed</h1><p>State mismatch.</p></body></html>",
            ));
            anyhow::bail!("authorization callback state mismatch");
        }
        let _ = request.respond(html_response(
            "<html><body><h1>Authorization successful</h1><p>You can close this tab.</p></body></html>",
        ));
        return Ok(code);
    }
}

/// Matches the address the callback listener binds, so a host that resolves
/// `localhost` to `::1` first still reaches it.
pub fn loopback_redirect_uri(port: u16) -> String {
    format!("http://127.0.0.1:{port}")
}

/// Interactive consent: open the browser on Google's consent page and take
/// the code from a one-shot loopback listener.
pub fn interactive_authorize(
    http: &Client,
    secrets: &ClientSecrets,
    port: u16,
    timeout: Duration,
) -> Result<StoredToken> {
    let server = tiny_http::Server::http(("127.0.0.1", port))
        .map_err(|err| anyhow::anyhow!("failed to listen on 127.0.0.1:{port}: {err}"))?;
    let redirect_uri = loopback_redirect_uri(port);
    let state = random_urlsafe(16)?;
    let verifier = random_urlsafe(48)?;
    let url = authorization_url(secrets, &redirect_uri, &state, &pkce_challenge(&verifier));

    tracing::info!("opening the browser for drive authorization");
    eprintln!("Authorize drive access at: {url}");
    if let Err(err) = open::that(&url) {
        tracing::warn!(error = %err, "could not open a browser; open the URL above manually");
    }

    let code = wait_for_code(&server, timeout, &state)?;
    let response = post_token_form(
        http,
        &secrets.token_uri,
        &[
            ("client_id", secrets.client_id.as_str()),
            ("client_secret", secrets.client_secret.as_str()),
            ("code", code.as_str()),
            ("code_verifier", verifier.as_str()),
            ("redirect_uri", redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ],
    )?;
    Ok(response.into_stored(now_epoch_secs()?, None))
}
