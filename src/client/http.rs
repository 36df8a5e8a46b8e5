//! HTTP implementation of [`RecordService`]
//!
//! Speaks the service's JSON-over-HTTP protocol:
//! - `GET {base}/v1/form.json?app={id}` — form metadata, order-preserving
//! - `GET {base}/v1/records.json?app={id}&query=...&fields[n]=...` — one
//!   page of records
//! - `GET {base}/v1/file.json?fileKey=...` — attachment body
//!
//! Apps inside a guest space use `{base}/guest/{space}/v1/...` instead.
//! Authentication is an API token header or a base64 `login:password`
//! header, with optional HTTP Basic auth layered on top.

use crate::client::{ByteStream, RecordService, wire};
use crate::config::{AuthMethod, ConnectionConfig};
use crate::error::{Error, Result};
use crate::types::{Record, Schema};
use async_trait::async_trait;
use base64::Engine;
use futures::{StreamExt, TryStreamExt};
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::Value;
use std::time::Duration;
use tokio_util::io::StreamReader;
use tracing::debug;
use url::Url;

/// Header carrying the per-app API token
const TOKEN_HEADER: &str = "X-Api-Token";

/// Header carrying base64-encoded `login:password` credentials
const AUTH_HEADER: &str = "X-Authorization";

/// reqwest-backed record-service client
pub struct HttpRecordService {
    http: reqwest::Client,
    base: Url,
    config: ConnectionConfig,
}

impl HttpRecordService {
    /// Build a client from connection settings
    ///
    /// Fails on an unparseable base URL or credentials that cannot be
    /// carried in an HTTP header.
    pub fn new(config: ConnectionConfig) -> Result<Self> {
        let base = Url::parse(&config.base_url)?;

        let mut headers = HeaderMap::new();
        let (name, value) = match &config.auth {
            AuthMethod::Token { token } => (TOKEN_HEADER, token.clone()),
            AuthMethod::Password { login, password } => {
                let encoded = base64::engine::general_purpose::STANDARD
                    .encode(format!("{}:{}", login, password));
                (AUTH_HEADER, encoded)
            }
        };
        let value = HeaderValue::from_str(&value).map_err(|_| Error::Config {
            message: "credentials contain characters not allowed in headers".to_string(),
            key: Some("auth".to_string()),
        })?;
        headers.insert(name, value);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()?;

        Ok(Self { http, base, config })
    }

    fn endpoint(&self, name: &str) -> Result<Url> {
        let path = match self.config.guest_space {
            Some(space) => format!("guest/{}/v1/{}", space, name),
            None => format!("v1/{}", name),
        };
        Ok(self.base.join(&path)?)
    }

    async fn get_json(&self, name: &str, params: &[(String, String)]) -> Result<Value> {
        let url = self.endpoint(name)?;
        debug!(endpoint = name, "requesting {}", url);

        let mut request = self.http.get(url).query(params);
        if let Some(basic) = &self.config.basic_auth {
            request = request.basic_auth(&basic.username, Some(&basic.password));
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            return Err(api_error(status.as_u16(), &body));
        }

        Ok(serde_json::from_slice(&body)?)
    }
}

/// Decode the service's error body (`{"code": ..., "message": ...}`),
/// falling back to the raw text when it is not JSON
fn api_error(status: u16, body: &[u8]) -> Error {
    let parsed: Option<Value> = serde_json::from_slice(body).ok();
    let field = |key: &str| {
        parsed
            .as_ref()
            .and_then(|v| v.get(key))
            .and_then(Value::as_str)
            .map(str::to_string)
    };

    Error::Api {
        status,
        code: field("code").unwrap_or_default(),
        message: field("message")
            .unwrap_or_else(|| String::from_utf8_lossy(body).into_owned()),
    }
}

#[async_trait]
impl RecordService for HttpRecordService {
    async fn field_metadata(&self) -> Result<Schema> {
        let params = vec![("app".to_string(), self.config.app.to_string())];
        let body = self.get_json("form.json", &params).await?;
        wire::parse_schema(&body)
    }

    async fn fetch_page(&self, fields: Option<&[String]>, query: &str) -> Result<Vec<Record>> {
        let mut params = vec![
            ("app".to_string(), self.config.app.to_string()),
            ("query".to_string(), query.to_string()),
        ];
        if let Some(fields) = fields {
            for (i, code) in fields.iter().enumerate() {
                params.push((format!("fields[{}]", i), code.clone()));
            }
        }

        let body = self.get_json("records.json", &params).await?;
        wire::parse_page(&body)
    }

    async fn download(&self, file_key: &str) -> Result<ByteStream> {
        let url = self.endpoint("file.json")?;
        debug!(file_key, "downloading attachment");

        let mut request = self.http.get(url).query(&[("fileKey", file_key)]);
        if let Some(basic) = &self.config.basic_auth {
            request = request.basic_auth(&basic.username, Some(&basic.password));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.bytes().await?;
            return Err(api_error(status.as_u16(), &body));
        }

        let stream = response
            .bytes_stream()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
            .boxed();
        Ok(Box::new(StreamReader::new(stream)))
    }
}
