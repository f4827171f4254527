use url::Url;

use super::message::{HttpMessage, StartLine};
use super::{DEFAULT_HTTP_VERSION, HOST};
use crate::SoapError;

/// `<method> <uri> <version>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine {
    pub method: String,
    pub uri: String,
    pub version: String,
}

impl StartLine for RequestLine {
    const BODY_UNTIL_CLOSE: bool = false;

    fn version(&self) -> &str {
        &self.version
    }

    fn set_version(&mut self, version: &str) {
        self.version = version.to_string();
    }

    fn render(&self) -> String {
        format!("{} {} {}", self.method, self.uri, self.version)
    }

    fn parse(line: &str) -> Result<Self, SoapError> {
        let parts: Vec<&str> = line.splitn(3, ' ').collect();
        if parts.len() < 3 {
            return Err(SoapError::InvalidArgument(format!(
                "Illegal request line: {line}"
            )));
        }
        Ok(Self {
            method: parts[0].to_string(),
            uri: parts[1].to_string(),
            version: parts[2].trim().to_string(),
        })
    }
}

pub type HttpRequest = HttpMessage<RequestLine>;

impl HttpMessage<RequestLine> {
    pub fn new(method: &str, uri: &str) -> Self {
        Self::from_start_line(RequestLine {
            method: method.to_string(),
            uri: uri.to_string(),
            version: DEFAULT_HTTP_VERSION.to_string(),
        })
    }

    /// Build a request aimed at `url`, with `Host` set to its authority
    pub fn to_url(method: &str, url: &Url) -> Result<Self, SoapError> {
        let mut request = Self::new(method, "/");
        request.set_url(url, true)?;
        Ok(request)
    }

    pub fn method(&self) -> &str {
        &self.start_line().method
    }

    pub fn set_method(&mut self, method: &str) {
        self.start_line_mut().method = method.to_string();
    }

    pub fn uri(&self) -> &str {
        &self.start_line().uri
    }

    pub fn set_uri(&mut self, uri: &str) {
        self.start_line_mut().uri = uri.to_string();
    }

    /// Point the request at `url`: the request-URI becomes its path and
    /// query, and `Host` is optionally set to `host:port`.
    pub fn set_url(&mut self, url: &Url, with_host_header: bool) -> Result<(), SoapError> {
        if url.scheme() != "http" {
            return Err(SoapError::InvalidArgument(format!(
                "unsupported scheme: {}",
                url.scheme()
            )));
        }
        let host = url
            .host_str()
            .ok_or_else(|| SoapError::InvalidArgument(format!("URL has no host: {url}")))?;
        let port = url.port_or_known_default().unwrap_or(80);

        let mut uri = url.path().to_string();
        if let Some(query) = url.query() {
            uri.push('?');
            uri.push_str(query);
        }
        self.set_uri(&uri);
        if with_host_header {
            self.set_header(HOST, format!("{host}:{port}"));
        }
        Ok(())
    }

    /// `host:port` this request is addressed to, taken from `Host`
    pub fn authority(&self) -> Option<&str> {
        self.header(HOST)
    }
}
