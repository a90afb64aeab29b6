use anyhow::Context;
use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use serde_json::json;

use crate::error::HarvestError;
use crate::gdrive::DriveAuth;
use crate::harvest::store::{RemoteStore, UploadReceipt};

const DRIVE_API: &str = "https://www.googleapis.com/drive/v3";
const DRIVE_UPLOAD_API: &str = "https://www.googleapis.com/upload/drive/v3";
const FOLDER_MIME: &str = "application/vnd.google-apps.folder";
const QUERY_PAGE_SIZE: &str = "100";

#[derive(Debug, Deserialize)]
struct FileRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<FileRef>,
}

/// Escape a value for a single-quoted Drive query literal.
pub fn escape_query_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

pub fn folder_query(name: &str, parent_id: &str) -> String {
    format!(
        "name = '{}' and '{}' in parents and mimeType = '{FOLDER_MIME}' and trashed = false",
        escape_query_literal(name),
        escape_query_literal(parent_id),
    )
}

/// `multipart/related` body for a Drive multipart upload: JSON metadata part
/// followed by the media part.
fn multipart_related_body(boundary: &str, metadata: &str, mime_type: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(bytes.len() + metadata.len() + 256);
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{metadata}\r\n--{boundary}\r\nContent-Type: {mime_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

fn new_boundary() -> String {
    let mut seed = [0u8; 12];
    if getrandom::fill(&mut seed).is_err() {
        return "report-harvest-boundary".to_string();
    }
    let hex: String = seed.iter().map(|b| format!("{b:02x}")).collect();
    format!("report-harvest-{hex}")
}

fn store_error(context: &str, err: impl std::fmt::Display) -> HarvestError {
    HarvestError::RemoteStore(format!("{context}: {err}"))
}

/// Google Drive v3 over blocking reqwest.
pub struct DriveClient {
    http: Client,
    auth: DriveAuth,
}

impl DriveClient {
    pub fn new(http: Client, auth: DriveAuth) -> Self {
        Self { http, auth }
    }

    fn send(&mut self, context: &str, build: impl Fn(&Client) -> RequestBuilder) -> Result<Response, HarvestError> {
        let bearer = self
            .auth
            .bearer(&self.http)
            .map_err(|err| store_error("drive credentials", format!("{err:#}")))?;
        let response = build(&self.http)
            .bearer_auth(&bearer)
            .send()
            .map_err(|err| store_error(context, err))?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        // Access token revoked or expired early: refresh once and replay.
        tracing::debug!(context, "drive answered 401; refreshing token");
        let bearer = self
            .auth
            .force_refresh(&self.http)
            .map_err(|err| store_error("drive token refresh", format!("{err:#}")))?;
        build(&self.http)
            .bearer_auth(&bearer)
            .send()
            .map_err(|err| store_error(context, err))
    }
}

fn read_json<T: for<'de> Deserialize<'de>>(context: &str, response: Response) -> Result<T, HarvestError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        return Err(store_error(context, format!("status {status}: {}", body.trim())));
    }
    response
        .json::<T>()
        .context("malformed drive response")
        .map_err(|err| store_error(context, format!("{err:#}")))
}

impl RemoteStore for DriveClient {
    fn find_folders(&mut self, name: &str, parent_id: &str) -> Result<Vec<String>, HarvestError> {
        let url = format!("{DRIVE_API}/files");
        let query = folder_query(name, parent_id);
        let response = self.send("folder query", |http| {
            http.get(&url).query(&[
                ("q", query.as_str()),
                ("fields", "files(id,name)"),
                ("spaces", "drive"),
                ("orderBy", "createdTime"),
                ("pageSize", QUERY_PAGE_SIZE),
            ])
        })?;
        let list: FileList = read_json("folder query", response)?;
        Ok(list.files.into_iter().map(|f| f.id).collect())
    }

    fn create_folder(&mut self, name: &str, parent_id: &str) -> Result<String, HarvestError> {
        let url = format!("{DRIVE_API}/files");
        let metadata = json!({
            "name": name,
            "mimeType": FOLDER_MIME,
            "parents": [parent_id],
        });
        let response = self.send("folder create", |http| {
            http.post(&url).query(&[("fields", "id")]).json(&metadata)
        })?;
        let created: FileRef = read_json("folder create", response)?;
        Ok(created.id)
    }

    fn upload(
        &mut self,
        name: &str,
        mime_type: &str,
        bytes: Vec<u8>,
        parent_id: &str,
    ) -> Result<UploadReceipt, HarvestError> {
        let url = format!("{DRIVE_UPLOAD_API}/files");
        let metadata = json!({ "name": name, "parents": [parent_id] }).to_string();
        let boundary = new_boundary();
        let body = multipart_related_body(&boundary, &metadata, mime_type, &bytes);
        let content_type = format!("multipart/related; boundary={boundary}");
        let response = self.send("upload", |http| {
            http.post(&url)
                .query(&[("uploadType", "multipart"), ("fields", "id")])
                .header(CONTENT_TYPE, content_type.as_str())
                .body(body.clone())
        })?;

        let status = response.status();
        let file_id = if status.is_success() {
            response.json::<FileRef>().ok().map(|f| f.id)
        } else {
            let body = response.text().unwrap_or_default();
            tracing::debug!(status = status.as_u16(), body = %body.trim(), "drive rejected upload");
            None
        };
        Ok(UploadReceipt {
            status: status.as_u16(),
            file_id,
        })
    }
}
