//! HTTP implementation of the gallery client.
//!
//! The actual HTTP client is abstracted via a trait to allow different
//! implementations (reqwest, a scripted client in tests, etc.).

use crate::client::RemoteGalleryClient;
use crate::config::{DeviceConfig, RetryConfig};
use inksync_core::{AssetId, Gallery, RemoteAsset, SyncError, SyncResult};
use inksync_protocol::{
    decode_gallery_list, rejection_reason, DeviceInfo, Endpoint, GalleryPage, Method,
    UPLOAD_FIELD,
};
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

/// Body of a device request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBody {
    /// No body.
    Empty,
    /// JSON text.
    Json(String),
    /// Single-part multipart form.
    Multipart {
        /// Form field name.
        field: &'static str,
        /// File name announced for the part.
        filename: String,
        /// MIME type of the part.
        content_type: &'static str,
        /// Part content.
        bytes: Vec<u8>,
    },
}

/// A fully resolved request to the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRequest {
    /// HTTP method.
    pub method: Method,
    /// Absolute URL without query.
    pub url: String,
    /// Query parameters.
    pub query: Vec<(&'static str, String)>,
    /// Request body.
    pub body: RequestBody,
    /// Timeout for the whole exchange.
    pub timeout: Duration,
}

/// A raw device response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Creates a response.
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Returns true for 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Returns true for 5xx.
    pub fn is_server_error(&self) -> bool {
        self.status >= 500
    }
}

/// A request that produced no HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportFailure {
    /// The exchange timed out.
    Timeout(String),
    /// The connection could not be established.
    Connect(String),
    /// Any other transport-level failure.
    Other(String),
}

impl fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportFailure::Timeout(msg) => write!(f, "timed out: {}", msg),
            TransportFailure::Connect(msg) => write!(f, "connection failed: {}", msg),
            TransportFailure::Other(msg) => write!(f, "{}", msg),
        }
    }
}

/// HTTP client abstraction.
///
/// Implement this trait to provide the actual HTTP transport.
pub trait HttpClient: Send + Sync {
    /// Sends one request. Non-2xx statuses are responses, not failures.
    fn send(&self, request: &DeviceRequest) -> Result<HttpResponse, TransportFailure>;
}

/// Gallery client speaking the device's HTTP control API.
pub struct HttpGalleryClient<C: HttpClient> {
    device: DeviceConfig,
    retry: RetryConfig,
    client: C,
    /// Held around every dispatch; the device handles one request at a time.
    dispatch: Mutex<()>,
    last_error: RwLock<Option<String>>,
}

impl<C: HttpClient> HttpGalleryClient<C> {
    /// Creates a new client with the default retry policy.
    pub fn new(device: DeviceConfig, client: C) -> Self {
        Self {
            device,
            retry: RetryConfig::default(),
            client,
            dispatch: Mutex::new(()),
            last_error: RwLock::new(None),
        }
    }

    /// Sets the retry policy.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Returns the device configuration.
    pub fn device(&self) -> &DeviceConfig {
        &self.device
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> String {
        self.device.base_url()
    }

    /// Returns the last error message.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    fn set_error(&self, err: &str) {
        *self.last_error.write() = Some(err.to_string());
    }

    fn clear_error(&self) {
        *self.last_error.write() = None;
    }

    fn build(&self, endpoint: &Endpoint, body: RequestBody, timeout: Duration) -> DeviceRequest {
        DeviceRequest {
            method: endpoint.method(),
            url: format!("{}{}", self.device.base_url(), endpoint.path()),
            query: endpoint.query(),
            body,
            timeout,
        }
    }

    fn dispatch(&self, request: &DeviceRequest) -> Result<HttpResponse, TransportFailure> {
        let _guard = self.dispatch.lock();
        self.client.send(request)
    }

    /// Sends a request under the retry policy and returns the 2xx response.
    fn call(&self, endpoint: Endpoint, body: RequestBody) -> SyncResult<HttpResponse> {
        let request = self.build(&endpoint, body, self.device.timeout);
        // A repeated sleep could hit a device that is already going down.
        let attempts = if endpoint.is_idempotent() {
            self.retry.max_attempts.max(1)
        } else {
            1
        };

        let mut last_error = None;
        for attempt in 0..attempts {
            if attempt > 0 {
                let delay = self.retry.delay_for_attempt(attempt);
                debug!(
                    "Retrying {} {} in {:?} (attempt {}/{})",
                    request.method.as_str(),
                    endpoint.path(),
                    delay,
                    attempt + 1,
                    attempts
                );
                std::thread::sleep(delay);
            }

            let error = match self.dispatch(&request) {
                Ok(response) if response.is_success() => {
                    self.clear_error();
                    return Ok(response);
                }
                Ok(response) => {
                    let reason = rejection_reason(response.status, &response.body);
                    if response.is_server_error() {
                        SyncError::DeviceError {
                            status: response.status,
                            reason,
                        }
                    } else {
                        SyncError::rejected(response.status, reason)
                    }
                }
                Err(failure) => SyncError::unreachable(self.describe(), failure.to_string()),
            };

            warn!(
                "{} {} failed: {}",
                request.method.as_str(),
                endpoint.path(),
                error
            );
            self.set_error(&error.to_string());
            if !error.is_retryable() {
                return Err(error);
            }
            last_error = Some(error);
        }

        Err(last_error
            .unwrap_or_else(|| SyncError::unreachable(self.describe(), "no attempt made")))
    }
}

/// Returns the MIME type announced for an uploaded file.
pub fn content_type_for(filename: &str) -> &'static str {
    let lower = filename.to_ascii_lowercase();
    if lower.ends_with(".png") {
        "image/png"
    } else if lower.ends_with(".bmp") {
        "image/bmp"
    } else {
        "image/jpeg"
    }
}

impl<C: HttpClient> RemoteGalleryClient for HttpGalleryClient<C> {
    fn list_galleries(&self) -> SyncResult<Vec<String>> {
        let response = self.call(Endpoint::GalleryList, RequestBody::Empty)?;
        decode_gallery_list(&response.body).map_err(|e| SyncError::Protocol(e.to_string()))
    }

    fn get_gallery_page(
        &self,
        name: &str,
        offset: u32,
        limit: u32,
    ) -> SyncResult<(Gallery, bool)> {
        let response = self.call(
            Endpoint::Gallery {
                name: name.to_string(),
                offset,
                limit,
            },
            RequestBody::Empty,
        )?;
        let page =
            GalleryPage::decode(&response.body).map_err(|e| SyncError::Protocol(e.to_string()))?;
        let has_more = page.has_more(offset, limit);

        let assets = page
            .data
            .into_iter()
            .map(|entry| {
                let mut asset = RemoteAsset::new(name, entry.name);
                asset.size = entry.size;
                asset.modified = entry.time;
                asset
            })
            .collect();

        Ok((Gallery::with_assets(name, assets), has_more))
    }

    fn page_limit(&self) -> u32 {
        self.device.page_limit
    }

    fn create_gallery(&self, name: &str) -> SyncResult<()> {
        self.call(
            Endpoint::PutGallery {
                name: name.to_string(),
            },
            RequestBody::Json("{}".to_string()),
        )?;
        Ok(())
    }

    fn upload(&self, gallery: &str, bytes: Vec<u8>, filename: &str) -> SyncResult<()> {
        self.call(
            Endpoint::Upload {
                gallery: gallery.to_string(),
                filename: filename.to_string(),
            },
            RequestBody::Multipart {
                field: UPLOAD_FIELD,
                filename: filename.to_string(),
                content_type: content_type_for(filename),
                bytes,
            },
        )?;
        Ok(())
    }

    fn delete_asset(&self, id: &AssetId) -> SyncResult<()> {
        self.call(
            Endpoint::DeleteImage {
                gallery: id.gallery.clone(),
                image: id.filename.clone(),
            },
            RequestBody::Empty,
        )?;
        Ok(())
    }

    fn delete_gallery(&self, name: &str) -> SyncResult<()> {
        self.call(
            Endpoint::DeleteGallery {
                name: name.to_string(),
            },
            RequestBody::Empty,
        )?;
        Ok(())
    }

    fn is_awake(&self, timeout: Duration) -> bool {
        let request = self.build(&Endpoint::State, RequestBody::Empty, timeout);
        match self.dispatch(&request) {
            Ok(response) => response.is_success(),
            Err(failure) => {
                debug!("Awake probe failed: {}", failure);
                false
            }
        }
    }

    fn sleep(&self) -> SyncResult<()> {
        self.call(Endpoint::Sleep, RequestBody::Empty)?;
        Ok(())
    }

    fn device_info(&self) -> SyncResult<DeviceInfo> {
        let response = self.call(Endpoint::DeviceInfo, RequestBody::Empty)?;
        DeviceInfo::decode(&response.body).map_err(|e| SyncError::Protocol(e.to_string()))
    }

    fn describe(&self) -> String {
        if self.device.port == 80 || (self.device.https && self.device.port == 443) {
            self.device.host.clone()
        } else {
            format!("{}:{}", self.device.host, self.device.port)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MAX_GALLERY_PAGES;
    use std::collections::VecDeque;

    /// Replays scripted outcomes and records every request.
    struct ScriptedClient {
        script: Mutex<VecDeque<Result<HttpResponse, TransportFailure>>>,
        requests: Mutex<Vec<DeviceRequest>>,
    }

    impl ScriptedClient {
        fn new(script: Vec<Result<HttpResponse, TransportFailure>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn requests(&self) -> Vec<DeviceRequest> {
            self.requests.lock().clone()
        }
    }

    impl HttpClient for ScriptedClient {
        fn send(&self, request: &DeviceRequest) -> Result<HttpResponse, TransportFailure> {
            self.requests.lock().push(request.clone());
            self.script
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(TransportFailure::Other("script exhausted".into())))
        }
    }

    fn fast_retry() -> RetryConfig {
        RetryConfig::new(3)
            .with_initial_delay(Duration::from_millis(1))
            .with_jitter(false)
    }

    fn client(script: Vec<Result<HttpResponse, TransportFailure>>) -> HttpGalleryClient<ScriptedClient> {
        HttpGalleryClient::new(DeviceConfig::new("frame"), ScriptedClient::new(script))
            .with_retry(fast_retry())
    }

    #[test]
    fn lists_galleries() {
        let client = client(vec![Ok(HttpResponse::new(200, r#"["a",{"name":"b"}]"#))]);
        assert_eq!(client.list_galleries().unwrap(), vec!["a", "b"]);

        let requests = client.client.requests();
        assert_eq!(requests[0].url, "http://frame/gallery/list");
        assert_eq!(requests[0].method, Method::Get);
    }

    #[test]
    fn retries_transport_failures_then_succeeds() {
        let client = client(vec![
            Err(TransportFailure::Connect("refused".into())),
            Err(TransportFailure::Timeout("slow".into())),
            Ok(HttpResponse::new(200, "{}")),
        ]);
        client.create_gallery("g").unwrap();
        assert_eq!(client.client.requests().len(), 3);
        assert!(client.last_error().is_none());
    }

    #[test]
    fn gives_up_as_unreachable() {
        let client = client(vec![
            Err(TransportFailure::Connect("refused".into())),
            Err(TransportFailure::Connect("refused".into())),
            Err(TransportFailure::Connect("refused".into())),
        ]);
        match client.list_galleries() {
            Err(SyncError::DeviceUnreachable { host, reason }) => {
                assert_eq!(host, "frame");
                assert!(reason.contains("refused"));
            }
            other => panic!("expected DeviceUnreachable, got {:?}", other),
        }
    }

    #[test]
    fn server_errors_are_retried() {
        let client = client(vec![
            Ok(HttpResponse::new(503, "busy")),
            Ok(HttpResponse::new(503, "busy")),
            Ok(HttpResponse::new(500, r#"{"msg":"disk"}"#)),
        ]);
        match client.delete_gallery("g") {
            Err(SyncError::DeviceError { status, reason }) => {
                assert_eq!(status, 500);
                assert_eq!(reason, "disk");
            }
            other => panic!("expected DeviceError, got {:?}", other),
        }
        assert_eq!(client.client.requests().len(), 3);
    }

    #[test]
    fn client_errors_are_not_retried() {
        let client = client(vec![Ok(HttpResponse::new(
            400,
            r#"{"msg":"invalid file name"}"#,
        ))]);
        match client.upload("g", vec![1, 2, 3], "bad?.jpg") {
            Err(SyncError::RequestRejected { status, reason }) => {
                assert_eq!(status, 400);
                assert_eq!(reason, "invalid file name");
            }
            other => panic!("expected RequestRejected, got {:?}", other),
        }
        assert_eq!(client.client.requests().len(), 1);
    }

    #[test]
    fn rejection_ends_retries_early() {
        let client = client(vec![
            Ok(HttpResponse::new(503, "busy")),
            Ok(HttpResponse::new(404, r#"{"msg":"gallery not found"}"#)),
            Ok(HttpResponse::new(200, "{}")),
        ]);
        match client.get_gallery_page("g", 0, 10) {
            Err(SyncError::RequestRejected { status, .. }) => assert_eq!(status, 404),
            other => panic!("expected RequestRejected, got {:?}", other),
        }
        assert_eq!(client.client.requests().len(), 2);
        assert!(client.last_error().unwrap().contains("gallery not found"));
    }

    #[test]
    fn upload_request_shape() {
        let client = client(vec![Ok(HttpResponse::new(200, ""))]);
        client.upload("summer", vec![0xff, 0xd8], "a.jpg").unwrap();

        let request = &client.client.requests()[0];
        assert_eq!(request.method, Method::Post);
        assert_eq!(request.url, "http://frame/upload");
        assert!(request.query.contains(&("show_now", "0".to_string())));
        assert!(request.query.contains(&("gallery", "summer".to_string())));
        assert_eq!(
            request.body,
            RequestBody::Multipart {
                field: "image",
                filename: "a.jpg".into(),
                content_type: "image/jpeg",
                bytes: vec![0xff, 0xd8],
            }
        );
    }

    #[test]
    fn gallery_pages_are_followed() {
        let device = DeviceConfig::new("frame").with_page_limit(2);
        let scripted = ScriptedClient::new(vec![
            Ok(HttpResponse::new(
                200,
                r#"{"data":[{"name":"a.jpg","size":1},{"name":"b.jpg","size":2}],"total":3}"#,
            )),
            Ok(HttpResponse::new(
                200,
                r#"{"data":[{"name":"c.jpg","size":3,"time":99}],"total":3}"#,
            )),
        ]);
        let client = HttpGalleryClient::new(device, scripted).with_retry(fast_retry());

        let gallery = client.get_gallery("g").unwrap();
        assert_eq!(gallery.len(), 3);
        assert_eq!(gallery.assets[2].modified, Some(99));
        assert_eq!(gallery.assets[2].gallery(), "g");

        let requests = client.client.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[1].query.contains(&("offset", "2".to_string())));
    }

    #[test]
    fn repeated_page_without_total_stops_paging() {
        let device = DeviceConfig::new("frame").with_page_limit(2);
        let page = r#"{"data":[{"name":"a.jpg","size":1},{"name":"b.jpg","size":2}]}"#;
        let scripted = ScriptedClient::new(
            (0..6).map(|_| Ok(HttpResponse::new(200, page))).collect(),
        );
        let client = HttpGalleryClient::new(device, scripted).with_retry(fast_retry());

        let gallery = client.get_gallery("g").unwrap();
        assert_eq!(gallery.len(), 2);

        let requests = client.client.requests();
        assert_eq!(requests.len(), 2);
        assert!(requests[1].query.contains(&("offset", "2".to_string())));
    }

    #[test]
    fn endless_paging_is_capped() {
        let device = DeviceConfig::new("frame").with_page_limit(1);
        let script = (0..MAX_GALLERY_PAGES + 5)
            .map(|i| {
                Ok(HttpResponse::new(
                    200,
                    format!(r#"{{"data":[{{"name":"{}.jpg","size":1}}]}}"#, i),
                ))
            })
            .collect();
        let client =
            HttpGalleryClient::new(device, ScriptedClient::new(script)).with_retry(fast_retry());

        let gallery = client.get_gallery("g").unwrap();
        assert_eq!(gallery.len(), MAX_GALLERY_PAGES as usize);
        assert_eq!(client.client.requests().len(), MAX_GALLERY_PAGES as usize);
    }

    #[test]
    fn undecodable_payload_is_protocol_error() {
        let client = client(vec![Ok(HttpResponse::new(200, "<html>"))]);
        assert!(matches!(
            client.device_info(),
            Err(SyncError::Protocol(_))
        ));
    }

    #[test]
    fn awake_probe_uses_short_timeout_and_no_retry() {
        let client = client(vec![Err(TransportFailure::Timeout("asleep".into()))]);
        assert!(!client.is_awake(Duration::from_millis(250)));

        let requests = client.client.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].timeout, Duration::from_millis(250));
        assert_eq!(requests[0].url, "http://frame/state");
    }

    #[test]
    fn sleep_is_sent_once() {
        let client = client(vec![Err(TransportFailure::Other("reset".into()))]);
        assert!(client.sleep().is_err());
        assert_eq!(client.client.requests().len(), 1);
    }

    #[test]
    fn content_types() {
        assert_eq!(content_type_for("a.JPG"), "image/jpeg");
        assert_eq!(content_type_for("a.png"), "image/png");
    }
}
