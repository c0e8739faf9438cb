//! Attachment content download.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use redmine_sweep_core::{Attachment, AttachmentDownloader, RunContext};
use tokio::io::AsyncWriteExt;

use crate::client::{API_KEY_HEADER, RedmineClient, into_sweep_error, truncate};
use crate::error::ClientError;

impl RedmineClient {
    /// Resolves a content URL; relative URLs are joined onto the base URL.
    fn content_url(&self, attachment: &Attachment) -> String {
        if attachment.content_url.starts_with('/') {
            format!("{}{}", self.base_url, attachment.content_url)
        } else {
            attachment.content_url.clone()
        }
    }

    /// Streams one attachment to `path`, without retrying. The file is
    /// truncated first, so a previous partial attempt is overwritten.
    ///
    /// Downloads authenticate with Basic credentials when configured and fall
    /// back to the API key. No `Content-Type` header is sent.
    ///
    /// # Errors
    /// Returns an error if the request fails, the server answers with a
    /// non-success status, or the file cannot be written.
    pub async fn fetch_to_file(
        &self,
        attachment: &Attachment,
        path: &Path,
        timeout: Duration,
    ) -> Result<u64, ClientError> {
        let mut request = self.http.get(self.content_url(attachment));
        if !timeout.is_zero() {
            request = request.timeout(timeout);
        }
        request = match (&self.credentials, &self.api_key) {
            (Some(creds), _) => request.basic_auth(&creds.username, Some(&creds.password)),
            (None, Some(key)) => request.header(API_KEY_HEADER, key),
            (None, None) => request,
        };

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|_| "could not read error body".to_owned());
            return Err(ClientError::HttpStatus {
                code: status.as_u16(),
                body: truncate(&body, 200).to_owned(),
            });
        }

        let mut file = tokio::fs::File::create(path).await?;
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        Ok(written)
    }
}

async fn remove_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!(path = %path.display(), "removed partial download"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {},
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "could not remove partial download"),
    }
}

#[async_trait]
impl AttachmentDownloader for RedmineClient {
    async fn download_attachment(
        &self,
        attachment: &Attachment,
        directory: &Path,
        filename: &str,
        ctx: &RunContext,
    ) -> bool {
        let target = directory.join(filename);
        let path = target.as_path();
        tracing::debug!(
            attachment_id = attachment.id,
            from = %attachment.filename,
            to = %path.display(),
            "downloading attachment"
        );

        let result = self
            .download_retry
            .run("download attachment", ctx.signal(), move |attempt| {
                self.fetch_to_file(attachment, path, attempt.timeout)
            })
            .await;

        match result {
            Ok(bytes) => {
                tracing::info!(attachment_id = attachment.id, file = filename, bytes, "downloaded attachment");
                true
            },
            Err(e) => {
                remove_partial(path).await;
                let err = into_sweep_error(e);
                tracing::error!(
                    attachment_id = attachment.id,
                    filename = %attachment.filename,
                    error = %err,
                    "attachment download failed"
                );
                false
            },
        }
    }
}
