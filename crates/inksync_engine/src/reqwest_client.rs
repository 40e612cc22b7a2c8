//! [`HttpClient`] backed by `reqwest::blocking`.

use crate::http::{DeviceRequest, HttpClient, HttpResponse, RequestBody, TransportFailure};
use inksync_protocol::Method;
use reqwest::blocking::{multipart, Client};

/// Blocking reqwest client.
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    inner: Client,
}

impl ReqwestClient {
    /// Builds a client.
    ///
    /// Per-request timeouts come from each [`DeviceRequest`].
    pub fn new() -> Result<Self, TransportFailure> {
        let inner = Client::builder()
            .user_agent(concat!("inksync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(classify)?;
        Ok(Self { inner })
    }
}

impl HttpClient for ReqwestClient {
    fn send(&self, request: &DeviceRequest) -> Result<HttpResponse, TransportFailure> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Put => reqwest::Method::PUT,
            Method::Post => reqwest::Method::POST,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self
            .inner
            .request(method, &request.url)
            .query(&request.query)
            .timeout(request.timeout);

        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(text) => builder
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(text.clone()),
            RequestBody::Multipart {
                field,
                filename,
                content_type,
                bytes,
            } => {
                let part = multipart::Part::bytes(bytes.clone())
                    .file_name(filename.clone())
                    .mime_str(content_type)
                    .map_err(classify)?;
                builder.multipart(multipart::Form::new().part(*field, part))
            }
        };

        let response = builder.send().map_err(classify)?;
        let status = response.status().as_u16();
        let body = response.bytes().map_err(classify)?;
        Ok(HttpResponse::new(status, body.to_vec()))
    }
}

fn classify(err: reqwest::Error) -> TransportFailure {
    if err.is_timeout() {
        TransportFailure::Timeout(err.to_string())
    } else if err.is_connect() {
        TransportFailure::Connect(err.to_string())
    } else {
        TransportFailure::Other(err.to_string())
    }
}
