// Copyright 2026 The moonshot-rs Project
// SPDX-License-Identifier: Apache-2.0

// Files service
//
// Responsibilities:
// - Multipart upload of file content with a purpose
// - List, get and delete uploaded files
// - Fetch extracted file content as raw bytes

use std::path::Path;

use bytes::{BufMut, Bytes, BytesMut};
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use tokio_util::sync::CancellationToken;

use crate::client::{new_request_id, Client};
use crate::error::{Error, Result};
use crate::types::{File, FileList, FileListParams};

const FILES_PATH: &str = "/files";
const FILES_SEGMENT: &str = "files";

#[derive(Debug, Clone)]
pub struct FilesService {
    client: Client,
    cancel: Option<CancellationToken>,
}

impl FilesService {
    pub(crate) fn new(client: Client) -> Self {
        Self {
            client,
            cancel: None,
        }
    }

    /// Abort in-flight requests when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Upload `content` under `filename`.
    pub async fn upload(
        &self,
        content: impl Into<Bytes>,
        filename: &str,
        purpose: &str,
    ) -> Result<File> {
        let content: Bytes = content.into();
        let form = MultipartForm::new()
            .file("file", filename, &content)
            .text("purpose", purpose);

        let mut req = self.client.request(Method::POST, FILES_PATH, &[])?;
        let content_type = HeaderValue::from_str(&form.content_type()).map_err(|_| {
            crate::config::ConfigError::Validation("invalid multipart boundary".to_string())
        })?;
        req.headers.insert(CONTENT_TYPE, content_type);
        req.body = form.finish();

        tracing::debug!(filename, purpose, bytes = req.body.len(), "uploading file");
        self.client
            .send_json(req, self.cancel.as_ref(), "uploaded file")
            .await
    }

    /// Read a local file and upload it under its base name.
    pub async fn upload_file(&self, path: impl AsRef<Path>, purpose: &str) -> Result<File> {
        let path = path.as_ref();
        let content = tokio::fs::read(path).await.map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.upload(content, &filename, purpose).await
    }

    pub async fn list(&self, params: Option<&FileListParams>) -> Result<FileList> {
        let query = params.map(FileListParams::query).unwrap_or_default();
        let req = self.client.request(Method::GET, FILES_PATH, &query)?;
        self.client
            .send_json(req, self.cancel.as_ref(), "file list")
            .await
    }

    pub async fn get(&self, file_id: &str) -> Result<File> {
        let req = self.client.request_to(Method::GET, &[FILES_SEGMENT, file_id])?;
        self.client.send_json(req, self.cancel.as_ref(), "file").await
    }

    /// Delete a file. Any 2xx status, including 204, is success.
    pub async fn delete(&self, file_id: &str) -> Result<()> {
        let req = self
            .client
            .request_to(Method::DELETE, &[FILES_SEGMENT, file_id])?;
        let request_id = new_request_id();
        self.client
            .send(req, self.cancel.as_ref(), &request_id)
            .await?;
        tracing::debug!(request_id = %request_id, file_id, "file deleted");
        Ok(())
    }

    /// Raw content of a file, with no assumption about its format.
    pub async fn content(&self, file_id: &str) -> Result<Bytes> {
        let req = self
            .client
            .request_to(Method::GET, &[FILES_SEGMENT, file_id, "content"])?;
        let request_id = new_request_id();
        let response = self
            .client
            .send(req, self.cancel.as_ref(), &request_id)
            .await?;
        Ok(response.body.collect().await?)
    }
}

// ---------------------------------------------------------------------------
// Multipart encoding
// ---------------------------------------------------------------------------

/// Minimal `multipart/form-data` writer for the upload endpoint.
struct MultipartForm {
    boundary: String,
    body: BytesMut,
}

impl MultipartForm {
    fn new() -> Self {
        Self {
            boundary: format!("moonshot-{}", uuid::Uuid::new_v4().simple()),
            body: BytesMut::new(),
        }
    }

    fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    fn file(mut self, name: &str, filename: &str, content: &[u8]) -> Self {
        self.put_boundary();
        self.body.put_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n",
                escape_quotes(name),
                escape_quotes(filename)
            )
            .as_bytes(),
        );
        self.body.put_slice(content);
        self.body.put_slice(b"\r\n");
        self
    }

    fn text(mut self, name: &str, value: &str) -> Self {
        self.put_boundary();
        self.body.put_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"\r\n\r\n",
                escape_quotes(name)
            )
            .as_bytes(),
        );
        self.body.put_slice(value.as_bytes());
        self.body.put_slice(b"\r\n");
        self
    }

    fn put_boundary(&mut self) {
        self.body.put_slice(b"--");
        self.body.put_slice(self.boundary.as_bytes());
        self.body.put_slice(b"\r\n");
    }

    fn finish(mut self) -> Bytes {
        self.body.put_slice(b"--");
        self.body.put_slice(self.boundary.as_bytes());
        self.body.put_slice(b"--\r\n");
        self.body.freeze()
    }
}

fn escape_quotes(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace(['\r', '\n'], " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multipart_layout() {
        let form = MultipartForm::new()
            .file("file", "notes.txt", b"hello")
            .text("purpose", "file-extract");
        let boundary = form.boundary.clone();
        assert_eq!(
            form.content_type(),
            format!("multipart/form-data; boundary={boundary}")
        );
        let body = String::from_utf8(form.finish().to_vec()).unwrap();
        let expected = format!(
            "--{b}\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"notes.txt\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n\
             hello\r\n\
             --{b}\r\n\
             Content-Disposition: form-data; name=\"purpose\"\r\n\r\n\
             file-extract\r\n\
             --{b}--\r\n",
            b = boundary
        );
        assert_eq!(body, expected);
    }

    #[test]
    fn filename_quotes_escaped() {
        assert_eq!(escape_quotes(r#"a"b\c"#), r#"a\"b\\c"#);
        assert_eq!(escape_quotes("x\r\ny"), "x  y");
    }

    #[test]
    fn boundaries_are_unique() {
        assert_ne!(MultipartForm::new().boundary, MultipartForm::new().boundary);
    }
}
