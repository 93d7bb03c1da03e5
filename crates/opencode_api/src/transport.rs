use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde_json::Value;

use crate::config::OpencodeConfig;
use crate::error::{parse_error_message, ApiError};
use crate::headers::{build_headers, ACCEPT_EVENT_STREAM, ACCEPT_JSON};
use crate::url::{join_endpoint, normalize_base_url};

/// Authenticated HTTP plumbing shared by every client call.
///
/// Two connection pools are kept: one with the REST read timeout and overall
/// deadline, and one with neither, for the long-lived event stream.
#[derive(Debug, Clone)]
pub struct Transport {
    http: Client,
    stream_http: Client,
    config: OpencodeConfig,
    base_url: String,
}

impl Transport {
    pub fn new(config: OpencodeConfig) -> Result<Self, ApiError> {
        let base_url = normalize_base_url(&config.base_url);
        reqwest::Url::parse(&base_url)
            .map_err(|error| ApiError::InvalidBaseUrl(format!("{base_url}: {error}")))?;

        let mut builder = Client::builder().connect_timeout(config.connect_timeout);
        if let Some(timeout) = config.read_timeout {
            builder = builder.read_timeout(timeout);
        }
        if let Some(deadline) = config.request_deadline() {
            builder = builder.timeout(deadline);
        }
        let http = builder.build().map_err(ApiError::from)?;
        let stream_http = Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(ApiError::from)?;

        Ok(Self {
            http,
            stream_http,
            config,
            base_url,
        })
    }

    pub fn config(&self) -> &OpencodeConfig {
        &self.config
    }

    /// Normalized server origin every path is joined onto.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn header_map(&self, accept: &str) -> Result<HeaderMap, ApiError> {
        let headers = build_headers(&self.config, accept);
        let mut out = HeaderMap::new();
        for (key, value) in headers {
            out.insert(
                HeaderName::from_bytes(key.as_bytes()).map_err(|_| {
                    ApiError::InvalidBaseUrl(format!("invalid header key: {key}"))
                })?,
                HeaderValue::from_str(&value).map_err(|_| {
                    ApiError::InvalidBaseUrl(format!("invalid header value for {key}"))
                })?,
            );
        }
        Ok(out)
    }

    /// Build (without sending) one REST request.
    ///
    /// Body-carrying methods always send JSON; a missing body becomes `{}`.
    pub fn build_request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<RequestBuilder, ApiError> {
        let url = join_endpoint(&self.base_url, path);
        let headers = self.header_map(ACCEPT_JSON)?;
        let sends_body = matches!(method, Method::POST | Method::PUT | Method::PATCH);
        let mut request = self.http.request(method, url).headers(headers);

        let payload = match body {
            Some(body) => Some(serde_json::to_string(body)?),
            None if sends_body => Some("{}".to_owned()),
            None => None,
        };
        if let Some(payload) = payload {
            request = request.header(CONTENT_TYPE, ACCEPT_JSON).body(payload);
        }

        Ok(request)
    }

    /// Perform one request/response cycle and return the raw response text.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<String, ApiError> {
        tracing::debug!(%method, path, "opencode request");
        let response = self.build_request(method.clone(), path, body)?.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let message = parse_error_message(status, &text);
            tracing::debug!(%method, path, status = status.as_u16(), %message, "opencode request failed");
            return Err(ApiError::Http { status, message });
        }

        Ok(text)
    }

    /// Open a streaming GET with no read timeout. Non-2xx answers fail here.
    pub async fn open_stream(&self, path: &str) -> Result<Response, ApiError> {
        let url = join_endpoint(&self.base_url, path);
        let headers = self.header_map(ACCEPT_EVENT_STREAM)?;
        tracing::debug!(path, "opening event stream");

        let response = self.stream_http.get(url).headers(headers).send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ApiError::Http {
                status,
                message: parse_error_message(status, &text),
            });
        }

        Ok(response)
    }
}
