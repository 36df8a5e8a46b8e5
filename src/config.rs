//! Configuration types for record-export

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Output format for an export run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Flattened CSV (default): one header line, one physical row per
    /// subtable row, CRLF line endings
    #[default]
    Csv,
    /// Streaming JSON: `{"records": [...]}` using each record's native wire
    /// representation, unflattened
    Json,
}

/// Character encoding of the produced export
///
/// The writer always produces UTF-8 internally; any other choice re-encodes
/// the byte stream on the way out.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputEncoding {
    /// UTF-8 passthrough (default)
    #[default]
    #[serde(rename = "utf-8")]
    Utf8,
    /// UTF-16 little-endian, no byte-order mark
    #[serde(rename = "utf-16")]
    Utf16,
    /// UTF-16 big-endian with a leading byte-order mark
    #[serde(rename = "utf-16be-with-signature")]
    Utf16BeWithSignature,
    /// UTF-16 little-endian with a leading byte-order mark
    #[serde(rename = "utf-16le-with-signature")]
    Utf16LeWithSignature,
    /// Shift_JIS
    #[serde(rename = "sjis")]
    Sjis,
    /// EUC-JP
    #[serde(rename = "euc-jp")]
    EucJp,
}

impl OutputEncoding {
    /// The configuration name of this encoding
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputEncoding::Utf8 => "utf-8",
            OutputEncoding::Utf16 => "utf-16",
            OutputEncoding::Utf16BeWithSignature => "utf-16be-with-signature",
            OutputEncoding::Utf16LeWithSignature => "utf-16le-with-signature",
            OutputEncoding::Sjis => "sjis",
            OutputEncoding::EucJp => "euc-jp",
        }
    }
}

impl FromStr for OutputEncoding {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "utf-8" => Ok(OutputEncoding::Utf8),
            "utf-16" => Ok(OutputEncoding::Utf16),
            "utf-16be-with-signature" => Ok(OutputEncoding::Utf16BeWithSignature),
            "utf-16le-with-signature" => Ok(OutputEncoding::Utf16LeWithSignature),
            "sjis" => Ok(OutputEncoding::Sjis),
            "euc-jp" => Ok(OutputEncoding::EucJp),
            other => Err(Error::Config {
                message: format!("unknown character encoding '{}'", other),
                key: Some("encoding".to_string()),
            }),
        }
    }
}

impl std::fmt::Display for OutputEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Export behavior configuration (format, query, column subset, encoding,
/// attachments)
///
/// An immutable value threaded through every pipeline stage; the pipeline
/// never reads configuration from ambient state.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Output format (default: CSV)
    #[serde(default)]
    pub format: ExportFormat,

    /// Query string passed to the record service (default: empty, all
    /// records)
    ///
    /// If the query already contains a `limit N` clause, exactly one page is
    /// fetched and the caller's limit is trusted; otherwise the fetcher
    /// appends its own paging clauses.
    #[serde(default)]
    pub query: String,

    /// Field codes to export (default: None, export every field in the
    /// app's form order)
    ///
    /// Codes that do not resolve against the form metadata are dropped
    /// silently. A code naming a subtable expands to the subtable id column
    /// plus all of its sub-fields.
    #[serde(default)]
    pub fields: Option<Vec<String>>,

    /// Character encoding of the output (default: utf-8)
    #[serde(default)]
    pub encoding: OutputEncoding,

    /// Local directory for attachment downloads (default: None, attachments
    /// are not downloaded and cells show the original file names)
    #[serde(default)]
    pub attachment_dir: Option<PathBuf>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            format: ExportFormat::Csv,
            query: String::new(),
            fields: None,
            encoding: OutputEncoding::Utf8,
            attachment_dir: None,
        }
    }
}

/// Authentication method for the record service
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    /// Per-app API token
    Token {
        /// The API token value
        token: String,
    },
    /// Login name and password
    Password {
        /// Login name
        login: String,
        /// Password
        password: String,
    },
}

/// HTTP Basic authentication credentials, layered on top of [`AuthMethod`]
/// when the service sits behind an extra Basic-auth gate
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BasicAuth {
    /// Basic authentication user name
    pub username: String,
    /// Basic authentication password
    pub password: String,
}

/// Connection settings for the record service
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Base URL of the service, e.g. `https://example.service.com`
    pub base_url: String,

    /// Numeric id of the app whose records are exported
    pub app: u64,

    /// Guest space id, if the app lives inside a guest space (default: None)
    #[serde(default)]
    pub guest_space: Option<u64>,

    /// Authentication method
    pub auth: AuthMethod,

    /// Optional HTTP Basic authentication in front of the service
    #[serde(default)]
    pub basic_auth: Option<BasicAuth>,

    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

impl ConnectionConfig {
    /// Build connection settings from environment variables
    ///
    /// Reads `RECORD_EXPORT_BASE_URL`, `RECORD_EXPORT_API_TOKEN` and
    /// `RECORD_EXPORT_APP`. Returns a [`Error::Config`] naming the missing
    /// or invalid variable.
    pub fn from_env() -> Result<Self> {
        let base_url = require_env("RECORD_EXPORT_BASE_URL")?;
        let token = require_env("RECORD_EXPORT_API_TOKEN")?;
        let app = require_env("RECORD_EXPORT_APP")?;
        let app = app.parse::<u64>().map_err(|_| Error::Config {
            message: format!("RECORD_EXPORT_APP is not a valid app id: '{}'", app),
            key: Some("app".to_string()),
        })?;

        Ok(Self {
            base_url,
            app,
            guest_space: None,
            auth: AuthMethod::Token { token },
            basic_auth: None,
            timeout_secs: default_timeout_secs(),
        })
    }
}

fn require_env(name: &str) -> Result<String> {
    match std::env::var(name) {
        Ok(v) if !v.is_empty() => Ok(v),
        _ => Err(Error::Config {
            message: format!("environment variable {} is not set", name),
            key: Some(name.to_string()),
        }),
    }
}
