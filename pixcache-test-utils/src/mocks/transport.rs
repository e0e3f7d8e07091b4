//! Scripted transport for testing the downloader and the cache facade

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use pixcache_core::{DownloadError, FetchRequest, ImageFormat, ImagePayload, Transport};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Transport answering from a table of scripted resources
///
/// Unknown resources answer with status 404. Conditional requests whose
/// validator matches the scripted entity tag answer with
/// [`DownloadError::NotChanged`], as an origin server would.
///
/// # Examples
///
/// ```rust,no_run
/// use pixcache_test_utils::MockTransport;
/// use pixcache_core::{Downloader};
/// use std::sync::Arc;
///
/// # async fn example() {
/// let transport = Arc::new(MockTransport::new());
/// transport.serve("https://img.example.com/a.png", b"png".to_vec(), Some("\"v1\""));
///
/// let downloader = Downloader::new(transport.clone());
/// let payload = downloader.fetch("https://img.example.com/a.png", None).await;
/// assert!(payload.is_ok());
/// assert_eq!(transport.call_count(), 1);
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    behavior: Arc<Mutex<MockBehavior>>,
}

#[derive(Debug, Default)]
struct MockBehavior {
    resources: HashMap<String, MockResource>,
    delay: Duration,
    requests: Vec<FetchRequest>,
}

#[derive(Debug, Clone)]
enum MockResource {
    Image {
        bytes: Bytes,
        etag: Option<String>,
        format: ImageFormat,
    },
    Status(u16),
    Offline,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `bytes` for `url`, tagged with `etag` if given
    pub fn serve(&self, url: &str, bytes: impl Into<Bytes>, etag: Option<&str>) {
        self.script(
            url,
            MockResource::Image {
                bytes: bytes.into(),
                etag: etag.map(str::to_string),
                format: ImageFormat::from_resource(url),
            },
        );
    }

    /// Serve a prepared payload for `url`; its validator becomes the entity tag
    pub fn serve_payload(&self, url: &str, payload: ImagePayload) {
        self.script(
            url,
            MockResource::Image {
                bytes: payload.bytes,
                etag: payload.validator,
                format: payload.format,
            },
        );
    }

    /// Answer `url` with an error status
    pub fn fail_with_status(&self, url: &str, status: u16) {
        self.script(url, MockResource::Status(status));
    }

    /// Make `url` unreachable
    pub fn go_offline(&self, url: &str) {
        self.script(url, MockResource::Offline);
    }

    /// Delay every response, so concurrent callers overlap
    pub fn set_delay(&self, delay: Duration) {
        self.behavior.lock().delay = delay;
    }

    pub fn with_delay(self, delay: Duration) -> Self {
        self.set_delay(delay);
        self
    }

    /// Number of transport calls made so far
    pub fn call_count(&self) -> usize {
        self.behavior.lock().requests.len()
    }

    /// Number of transport calls made for `url`
    pub fn calls_for(&self, url: &str) -> usize {
        self.behavior
            .lock()
            .requests
            .iter()
            .filter(|request| request.url.as_str() == url)
            .count()
    }

    /// Every request received, in order
    pub fn requests(&self) -> Vec<FetchRequest> {
        self.behavior.lock().requests.clone()
    }

    fn script(&self, url: &str, resource: MockResource) {
        self.behavior.lock().resources.insert(url.to_string(), resource);
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn fetch(&self, request: &FetchRequest) -> Result<ImagePayload, DownloadError> {
        let (delay, resource) = {
            let mut behavior = self.behavior.lock();
            behavior.requests.push(request.clone());
            (
                behavior.delay,
                behavior.resources.get(request.url.as_str()).cloned(),
            )
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match resource {
            Some(MockResource::Image {
                bytes,
                etag,
                format,
            }) => {
                if etag.is_some() && request.validator == etag {
                    return Err(DownloadError::NotChanged);
                }
                Ok(ImagePayload {
                    bytes,
                    validator: etag,
                    format,
                })
            }
            Some(MockResource::Status(status)) => Err(DownloadError::bad_status(status)),
            Some(MockResource::Offline) => Err(DownloadError::transport("connection refused")),
            None => Err(DownloadError::bad_status(404)),
        }
    }
}
