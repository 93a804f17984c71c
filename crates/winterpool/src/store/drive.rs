//! Google Drive v3 backed object store.
//!
//! Thin REST client over the handful of endpoints the pipeline uses.
//! Every request carries `supportsAllDrives` so shared drives work, and
//! every returned object uses the same field projection, so the caller
//! always sees ids, names, MIME types, properties and view links.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

use crate::auth::TokenManager;

use super::error::{Result, StoreError};
use super::object::StoredObject;
use super::ObjectStore;

/// Metadata and listing endpoints.
const API_BASE: &str = "https://www.googleapis.com/drive/v3";

/// Content upload endpoints.
const UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v3";

/// Objects fetched per listing page.
const PAGE_SIZE: usize = 200;

/// Field projection for single-object responses.
const FILE_FIELDS: &str = "id, name, mimeType, appProperties, webViewLink";

/// Field projection for listing responses.
const LIST_FIELDS: &str = "nextPageToken, files(id, name, mimeType, appProperties, webViewLink)";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Generous request timeout; downloads of scanned application PDFs can
/// run to tens of megabytes.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Maximum length for error bodies quoted in messages.
const MAX_ERROR_BODY_LENGTH: usize = 200;

/// One page of a files listing.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    next_page_token: Option<String>,
    #[serde(default)]
    files: Vec<StoredObject>,
}

/// Request-side object metadata. Absent fields stay untouched server
/// side, which is what gives property patches merge semantics.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FileMetadata<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parents: Option<Vec<&'a str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    app_properties: Option<&'a HashMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    copy_requires_writer_permission: Option<bool>,
}

/// Escapes a value for embedding in a files.list query string.
fn escape_query_term(term: &str) -> String {
    term.replace('\\', "\\\\").replace('\'', "\\'")
}

fn truncate_body(body: &str) -> String {
    if body.len() > MAX_ERROR_BODY_LENGTH {
        format!("{}... (truncated)", &body[..MAX_ERROR_BODY_LENGTH])
    } else {
        body.to_string()
    }
}

/// Assembles a multipart/related body: JSON metadata part followed by
/// one media part.
fn related_body(boundary: &str, metadata_json: &str, content_type: &str, content: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(metadata_json.len() + content.len() + 256);
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    body.extend_from_slice(metadata_json.as_bytes());
    body.extend_from_slice(format!("\r\n--{boundary}\r\n").as_bytes());
    body.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

async fn api_error(response: reqwest::Response) -> StoreError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    StoreError::Api {
        status,
        message: truncate_body(&body),
    }
}

async fn decode_json<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    if !response.status().is_success() {
        return Err(api_error(response).await);
    }

    response
        .json::<T>()
        .await
        .map_err(|e| StoreError::Decode(e.to_string()))
}

/// Drive v3 client implementing [`ObjectStore`].
pub struct DriveStore {
    client: Client,
    auth: Arc<TokenManager>,
    api_base: String,
    upload_base: String,
}

impl DriveStore {
    pub fn new(auth: Arc<TokenManager>) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            auth,
            api_base: API_BASE.to_string(),
            upload_base: UPLOAD_BASE.to_string(),
        })
    }

    /// Client with overridden endpoints, for tests that stand in for the
    /// remote API.
    pub fn with_base_urls(
        auth: Arc<TokenManager>,
        api_base: String,
        upload_base: String,
    ) -> Result<Self> {
        let mut store = Self::new(auth)?;
        store.api_base = api_base;
        store.upload_base = upload_base;
        Ok(store)
    }

    async fn bearer(&self) -> Result<SecretString> {
        Ok(self.auth.access_token().await?)
    }

    fn encode_metadata(metadata: &FileMetadata<'_>) -> Result<String> {
        serde_json::to_string(metadata).map_err(|e| StoreError::Encode(e.to_string()))
    }
}

#[async_trait]
impl ObjectStore for DriveStore {
    async fn list_folder(
        &self,
        folder_id: &str,
        mime_type: Option<&str>,
    ) -> Result<Vec<StoredObject>> {
        let mut query = format!(
            "'{}' in parents and trashed = false",
            escape_query_term(folder_id)
        );
        if let Some(mime) = mime_type {
            query.push_str(&format!(" and mimeType = '{}'", escape_query_term(mime)));
        }

        let token = self.bearer().await?;
        let mut files = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut params: Vec<(&str, String)> = vec![
                ("q", query.clone()),
                ("pageSize", PAGE_SIZE.to_string()),
                ("fields", LIST_FIELDS.to_string()),
                ("supportsAllDrives", "true".to_string()),
                ("includeItemsFromAllDrives", "true".to_string()),
            ];
            if let Some(t) = page_token.take() {
                params.push(("pageToken", t));
            }

            let response = self
                .client
                .get(format!("{}/files", self.api_base))
                .bearer_auth(token.expose_secret())
                .query(&params)
                .send()
                .await?;

            let page: FileList = decode_json(response).await?;
            files.extend(page.files);

            match page.next_page_token {
                Some(t) if !t.is_empty() => page_token = Some(t),
                _ => break,
            }
        }

        Ok(files)
    }

    async fn download(&self, id: &str) -> Result<Vec<u8>> {
        let token = self.bearer().await?;

        let response = self
            .client
            .get(format!("{}/files/{}", self.api_base, id))
            .bearer_auth(token.expose_secret())
            .query(&[("alt", "media"), ("supportsAllDrives", "true")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        Ok(response.bytes().await?.to_vec())
    }

    async fn copy_into(
        &self,
        source_id: &str,
        folder_id: &str,
        name: &str,
        properties: HashMap<String, String>,
    ) -> Result<StoredObject> {
        let token = self.bearer().await?;
        let metadata = FileMetadata {
            name: Some(name),
            parents: Some(vec![folder_id]),
            app_properties: Some(&properties),
            copy_requires_writer_permission: Some(true),
        };

        let response = self
            .client
            .post(format!("{}/files/{}/copy", self.api_base, source_id))
            .bearer_auth(token.expose_secret())
            .query(&[("supportsAllDrives", "true"), ("fields", FILE_FIELDS)])
            .json(&metadata)
            .send()
            .await?;

        decode_json(response).await
    }

    async fn upload(
        &self,
        folder_id: &str,
        name: &str,
        mime_type: &str,
        properties: HashMap<String, String>,
        content: Vec<u8>,
        restrict_downloads: bool,
    ) -> Result<StoredObject> {
        let token = self.bearer().await?;
        let metadata = FileMetadata {
            name: Some(name),
            parents: Some(vec![folder_id]),
            app_properties: Some(&properties),
            copy_requires_writer_permission: restrict_downloads.then_some(true),
        };
        let metadata_json = Self::encode_metadata(&metadata)?;

        let boundary = format!("winterpool-{}", Uuid::new_v4().simple());
        let body = related_body(&boundary, &metadata_json, mime_type, &content);

        let response = self
            .client
            .post(format!("{}/files", self.upload_base))
            .bearer_auth(token.expose_secret())
            .query(&[
                ("uploadType", "multipart"),
                ("supportsAllDrives", "true"),
                ("fields", FILE_FIELDS),
            ])
            .header(
                CONTENT_TYPE,
                format!("multipart/related; boundary={boundary}"),
            )
            .body(body)
            .send()
            .await?;

        decode_json(response).await
    }

    async fn update_content(
        &self,
        id: &str,
        name: &str,
        mime_type: &str,
        properties: HashMap<String, String>,
        content: Vec<u8>,
        restrict_downloads: bool,
    ) -> Result<StoredObject> {
        let token = self.bearer().await?;
        let metadata = FileMetadata {
            name: Some(name),
            parents: None,
            app_properties: Some(&properties),
            copy_requires_writer_permission: restrict_downloads.then_some(true),
        };
        let metadata_json = Self::encode_metadata(&metadata)?;

        let boundary = format!("winterpool-{}", Uuid::new_v4().simple());
        let body = related_body(&boundary, &metadata_json, mime_type, &content);

        let response = self
            .client
            .patch(format!("{}/files/{}", self.upload_base, id))
            .bearer_auth(token.expose_secret())
            .query(&[
                ("uploadType", "multipart"),
                ("supportsAllDrives", "true"),
                ("fields", FILE_FIELDS),
            ])
            .header(
                CONTENT_TYPE,
                format!("multipart/related; boundary={boundary}"),
            )
            .body(body)
            .send()
            .await?;

        decode_json(response).await
    }

    async fn patch_properties(
        &self,
        id: &str,
        properties: HashMap<String, String>,
    ) -> Result<StoredObject> {
        let token = self.bearer().await?;
        let metadata = FileMetadata {
            name: None,
            parents: None,
            app_properties: Some(&properties),
            copy_requires_writer_permission: None,
        };

        let response = self
            .client
            .patch(format!("{}/files/{}", self.api_base, id))
            .bearer_auth(token.expose_secret())
            .query(&[("supportsAllDrives", "true"), ("fields", FILE_FIELDS)])
            .json(&metadata)
            .send()
            .await?;

        decode_json(response).await
    }
}
