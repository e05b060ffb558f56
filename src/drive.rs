// Remote storage client: a small blocking HTTP client over the Drive v3
// REST surface. Listing goes through `files.list` queries; uploads use the
// resumable protocol (open a session, PUT sequential chunks) so progress
// can be reported per chunk and large archives survive slow links.

use anyhow::{bail, Context, Result};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_RANGE, LOCATION};
use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

use crate::folders::{FolderRef, FolderSource};

/// Upload chunk size. The protocol wants a multiple of 256 KiB for every
/// chunk except the last.
const CHUNK_SIZE: usize = 8 * 1024 * 1024;

pub struct DriveClient {
    client: Client,
    api_base: String,
    upload_base: String,
    token: String,
    chunk_size: usize,
}

/// One file record from a listing or an upload response.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteFile {
    pub id: String,
    pub name: String,
    #[serde(rename = "modifiedTime", default)]
    pub modified_time: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<RemoteFile>,
    #[serde(rename = "nextPageToken", default)]
    next_page_token: Option<String>,
}

/// Escape a value for interpolation into a `files.list` query literal.
fn quote(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

impl DriveClient {
    pub fn new(api_base: &str, upload_base: &str, token: String) -> Result<Self> {
        // Chunk PUTs are answered with 308 while the session is open; the
        // client must see those directly, not treat them as redirects.
        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("Failed to build HTTP client")?;
        Ok(DriveClient {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            upload_base: upload_base.trim_end_matches('/').to_string(),
            token,
            chunk_size: CHUNK_SIZE,
        })
    }

    #[cfg(test)]
    fn set_chunk_size(&mut self, bytes: usize) {
        self.chunk_size = bytes;
    }

    fn auth_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let val = format!("Bearer {}", self.token);
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&val).unwrap());
        headers
    }

    /// Run a `files.list` query, following page tokens until exhausted.
    fn list(&self, query: &str) -> Result<Vec<RemoteFile>> {
        let url = format!("{}/drive/v3/files", self.api_base);
        let mut all = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut req = self.client.get(&url).headers(self.auth_headers()).query(&[
                ("q", query),
                ("fields", "nextPageToken, files(id, name, modifiedTime)"),
                ("pageSize", "1000"),
            ]);
            if let Some(token) = &page_token {
                req = req.query(&[("pageToken", token.as_str())]);
            }
            let res = req.send().context("Failed to send file list request")?;
            if !res.status().is_success() {
                let status = res.status();
                let txt = res.text().unwrap_or_else(|_| "".into());
                bail!("List failed: {} - {}", status, txt);
            }
            let body: FileList = res.json().context("Parsing file list response")?;
            debug!(count = body.files.len(), "listed remote files");
            all.extend(body.files);
            match body.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        Ok(all)
    }

    /// All non-trashed files in `folder_id` whose name contains `needle`.
    pub fn list_files_containing(&self, folder_id: &str, needle: &str) -> Result<Vec<RemoteFile>> {
        let query = format!(
            "'{}' in parents and trashed=false and name contains '{}'",
            quote(folder_id),
            quote(needle)
        );
        self.list(&query)
    }

    /// Exact-name lookup inside a folder, used to route create-or-update.
    pub fn find_file_by_name(&self, folder_id: &str, name: &str) -> Result<Option<RemoteFile>> {
        let query = format!(
            "'{}' in parents and trashed=false and name='{}'",
            quote(folder_id),
            quote(name)
        );
        Ok(self.list(&query)?.into_iter().next())
    }

    /// Create a new remote file from a local payload.
    pub fn create_file<F>(
        &self,
        name: &str,
        parent_id: &str,
        payload: &Path,
        progress: F,
    ) -> Result<RemoteFile>
    where
        F: FnMut(u64, u64),
    {
        let url = format!("{}/upload/drive/v3/files?uploadType=resumable", self.upload_base);
        let metadata = serde_json::json!({ "name": name, "parents": [parent_id] });
        let session = self.open_session(self.client.post(&url), &metadata)?;
        info!(name, parent_id, "uploading new remote file");
        self.put_chunks(&session, payload, progress)
    }

    /// Replace the payload of an existing remote file in place.
    pub fn update_file<F>(&self, file_id: &str, payload: &Path, progress: F) -> Result<RemoteFile>
    where
        F: FnMut(u64, u64),
    {
        let url = format!(
            "{}/upload/drive/v3/files/{}?uploadType=resumable",
            self.upload_base, file_id
        );
        let session = self.open_session(self.client.patch(&url), &serde_json::json!({}))?;
        info!(file_id, "replacing remote file payload");
        self.put_chunks(&session, payload, progress)
    }

    /// Open a resumable upload session; the session URI comes back in the
    /// Location header.
    fn open_session(&self, req: RequestBuilder, metadata: &serde_json::Value) -> Result<String> {
        let res = req
            .headers(self.auth_headers())
            .header("X-Upload-Content-Type", "application/zip")
            .json(metadata)
            .send()
            .context("Failed to open upload session")?;
        if !res.status().is_success() {
            let status = res.status();
            let txt = res.text().unwrap_or_else(|_| "".into());
            bail!("Upload session rejected: {} - {}", status, txt);
        }
        let session = res
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .context("Upload session response carried no Location header")?;
        Ok(session.to_string())
    }

    /// Send the payload through the session in sequential chunks. A 308
    /// acknowledges a chunk; the terminal response carries the file record.
    fn put_chunks<F>(&self, session: &str, payload: &Path, mut progress: F) -> Result<RemoteFile>
    where
        F: FnMut(u64, u64),
    {
        let mut file = File::open(payload)
            .with_context(|| format!("Failed to open staged upload {}", payload.display()))?;
        let total = file
            .metadata()
            .context("Failed to stat staged upload")?
            .len();
        if total == 0 {
            bail!("Staged upload is empty");
        }
        progress(0, total);

        let mut sent: u64 = 0;
        let mut buf = vec![0u8; self.chunk_size];
        loop {
            let n = read_chunk(&mut file, &mut buf)?;
            if n == 0 {
                bail!("Staged upload truncated at {} of {} bytes", sent, total);
            }
            let end = sent + n as u64;
            let range = format!("bytes {}-{}/{}", sent, end - 1, total);
            let res = self
                .client
                .put(session)
                .headers(self.auth_headers())
                .header(CONTENT_RANGE, range)
                .body(buf[..n].to_vec())
                .send()
                .context("Failed to send upload chunk")?;
            sent = end;

            let status = res.status();
            if status.as_u16() == 308 {
                debug!(sent, total, "chunk acknowledged");
                progress(sent, total);
                continue;
            }
            if status.is_success() {
                progress(sent, total);
                if sent < total {
                    bail!("Upload session closed early at {} of {} bytes", sent, total);
                }
                let record: RemoteFile = res.json().context("Parsing upload response")?;
                info!(id = %record.id, name = %record.name, "upload complete");
                return Ok(record);
            }
            let txt = res.text().unwrap_or_else(|_| "".into());
            bail!("Upload chunk failed: {} - {}", status, txt);
        }
    }
}

/// Fill `buf` from `file`, short only at end of file.
fn read_chunk(file: &mut File, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = file
            .read(&mut buf[filled..])
            .context("Failed to read staged upload")?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

impl FolderSource for DriveClient {
    fn list_child_folders(&self, parent_id: &str) -> Result<Vec<FolderRef>> {
        let query = format!(
            "'{}' in parents and mimeType='application/vnd.google-apps.folder' and trashed=false",
            quote(parent_id)
        );
        let files = self.list(&query)?;
        Ok(files
            .into_iter()
            .map(|f| FolderRef { id: f.id, name: f.name })
            .collect())
    }
}
