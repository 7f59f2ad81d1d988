use serde::Serialize;
use url::Url;

use super::error::StreamError;

/// Application name used when the destination path names none.
pub const DEFAULT_APPLICATION: &str = "live";

/// Stream key used when the destination path is empty.
pub const DEFAULT_STREAM_KEY: &str = "stream";

/// Streaming protocol identifier of a destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    Rtmp,
    Rtmps,
}

impl Scheme {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "rtmp" => Some(Self::Rtmp),
            "rtmps" => Some(Self::Rtmps),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rtmp => "rtmp",
            Self::Rtmps => "rtmps",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Self::Rtmp => 1935,
            Self::Rtmps => 443,
        }
    }
}

/// A parsed `scheme://host[:port]/application/streamKey` address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Destination {
    pub scheme: Scheme,
    pub host: String,
    pub port: u16,
    pub application: String,
    pub stream_key: String,
}

impl Destination {
    /// Parse a destination address.
    ///
    /// Path handling:
    /// - no segments: default application and default stream key
    /// - one segment: default application, segment is the stream key
    /// - two or more: first segment is the application, the rest is the key
    ///
    /// A query string stays attached to the stream key.
    pub fn parse(address: &str) -> Result<Self, StreamError> {
        let address = address.trim();
        if address.is_empty() {
            return Err(StreamError::invalid("destination is required"));
        }

        let url = Url::parse(address)
            .map_err(|e| StreamError::invalid(format!("malformed destination {address:?}: {e}")))?;

        let scheme = Scheme::from_name(url.scheme()).ok_or_else(|| {
            StreamError::invalid(format!("unsupported scheme {:?}", url.scheme()))
        })?;

        let host = match url.host_str() {
            Some(h) if !h.is_empty() => h.to_string(),
            _ => return Err(StreamError::invalid(format!("destination {address:?} has no host"))),
        };

        let port = url.port().unwrap_or_else(|| scheme.default_port());

        let segments: Vec<&str> = url
            .path_segments()
            .map(|s| s.filter(|seg| !seg.is_empty()).collect())
            .unwrap_or_default();

        let (application, mut stream_key) = match segments.as_slice() {
            [] => (DEFAULT_APPLICATION.to_string(), DEFAULT_STREAM_KEY.to_string()),
            [key] => (DEFAULT_APPLICATION.to_string(), (*key).to_string()),
            [app, rest @ ..] => ((*app).to_string(), rest.join("/")),
        };

        if let Some(query) = url.query().filter(|q| !q.is_empty()) {
            stream_key.push('?');
            stream_key.push_str(query);
        }

        Ok(Self {
            scheme,
            host,
            port,
            application,
            stream_key,
        })
    }

    /// The connect URL announced during the handshake (`scheme://host:port/app`).
    pub fn tc_url(&self) -> String {
        format!(
            "{}://{}:{}/{}",
            self.scheme.as_str(),
            self.host,
            self.port,
            self.application
        )
    }
}

impl std::fmt::Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.tc_url(), self.stream_key)
    }
}
