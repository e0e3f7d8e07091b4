//! HTTP transport backed by reqwest

use crate::config::NetworkConfig;
use crate::downloader::{FetchRequest, Transport};
use crate::error::DownloadError;
use crate::payload::{ImageFormat, ImagePayload};
use async_trait::async_trait;
use log::debug;
use reqwest::{Client, StatusCode, header};

/// Fetches images over HTTP(S), revalidating with `If-None-Match`
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client with the configured timeout and user agent
    pub fn from_config(config: &NetworkConfig) -> Result<Self, DownloadError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| DownloadError::transport(e.to_string()))?;
        Ok(Self::new(client))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, request: &FetchRequest) -> Result<ImagePayload, DownloadError> {
        debug!("Fetching image from `{}`", request.url);

        let mut builder = self.client.get(request.url.clone());
        if let Some(validator) = &request.validator {
            builder = builder.header(header::IF_NONE_MATCH, validator.as_str());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| DownloadError::transport(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_MODIFIED {
            return Err(DownloadError::NotChanged);
        }
        if !(200..400).contains(&status.as_u16()) {
            return Err(DownloadError::bad_status(status.as_u16()));
        }

        let validator = response
            .headers()
            .get(header::ETAG)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let bytes = response
            .bytes()
            .await
            .map_err(|e| DownloadError::transport(e.to_string()))?;

        Ok(ImagePayload {
            bytes,
            validator,
            format: ImageFormat::from_resource(request.url.as_str()),
        })
    }
}
