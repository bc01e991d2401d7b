use std::path::Path;

use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::data::FetchRequest;
use crate::effects::retriever::Retriever;
use crate::error::RetrieveError;

/// How [`download_to`] opens its target file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Start from an empty file.
    Truncate,
    /// Append to whatever the file already holds, creating it if needed.
    Append,
}

/// Retriever for plain HTTP resources.
///
/// Understands two request parameters:
/// - `url`: the resource to GET (required)
/// - `header`: one or more `Name: value` lines sent with the request
pub struct HttpRetriever {
    client: reqwest::Client,
}

impl HttpRetriever {
    /// Create a retriever with default client configuration.
    pub fn new() -> Result<Self, RetrieveError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("nwpfetch/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Retriever for HttpRetriever {
    async fn retrieve(
        &self,
        request: &FetchRequest,
        target: &Path,
        cancel: &CancellationToken,
    ) -> Result<(), RetrieveError> {
        let url = request
            .text("url")
            .ok_or_else(|| RetrieveError::InvalidRequest("missing 'url' parameter".into()))?;

        let mut builder = self.client.get(url);
        for line in request.values("header") {
            let (name, value) = line.split_once(':').ok_or_else(|| {
                RetrieveError::InvalidRequest(format!("malformed header '{line}'"))
            })?;
            builder = builder.header(name.trim(), value.trim());
        }

        let written = download_to(builder, target, WriteMode::Truncate, cancel).await?;
        debug!(url, written, "http body stored");
        Ok(())
    }
}

/// Send `request` and stream the response body into `target`.
///
/// Non-success statuses are errors. The token is checked between chunks;
/// once it fires the function returns [`RetrieveError::Cancelled`] and
/// leaves whatever was written so far for the caller to discard.
///
/// Returns the number of body bytes written.
pub async fn download_to(
    request: reqwest::RequestBuilder,
    target: &Path,
    mode: WriteMode,
    cancel: &CancellationToken,
) -> Result<u64, RetrieveError> {
    let response = request.send().await?.error_for_status()?;

    let mut file = match mode {
        WriteMode::Truncate => tokio::fs::File::create(target).await?,
        WriteMode::Append => {
            tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(target)
                .await?
        }
    };

    let mut stream = response.bytes_stream();
    let mut written = 0u64;

    loop {
        let chunk = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RetrieveError::Cancelled),
            chunk = stream.next() => chunk,
        };
        let Some(chunk) = chunk else { break };
        let bytes = chunk?;
        file.write_all(&bytes).await?;
        written += bytes.len() as u64;
    }

    file.flush().await?;
    file.sync_all().await?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_url_is_invalid() {
        let retriever = HttpRetriever::new().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let err = retriever
            .retrieve(
                &FetchRequest::new(),
                &dir.path().join("out"),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RetrieveError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_malformed_header_is_invalid() {
        let retriever = HttpRetriever::new().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let request = FetchRequest::url("http://127.0.0.1:9/file").list("header", ["no-colon"]);
        let err = retriever
            .retrieve(&request, &dir.path().join("out"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RetrieveError::InvalidRequest(_)));
    }
}
