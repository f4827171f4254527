//! HTTP/1.1 message model used by both SOAP invocation and GENA eventing.
//!
//! Messages are plain values: a start line, an ordered case-insensitive
//! header map and an optional body. [`HttpRequest`] and [`HttpResponse`]
//! share the header/body handling through [`HttpMessage`] and differ only in
//! their [`StartLine`] implementation.

mod headers;
mod message;
mod request;
mod response;
mod status;

pub use headers::HttpHeaders;
pub use message::{HttpMessage, StartLine, MAX_BODY_SIZE};
pub use request::{HttpRequest, RequestLine};
pub use response::{HttpResponse, StatusLine};
pub use status::Status;

pub const HTTP_1_0: &str = "HTTP/1.0";
pub const HTTP_1_1: &str = "HTTP/1.1";
pub const DEFAULT_HTTP_VERSION: &str = HTTP_1_1;

pub const GET: &str = "GET";
pub const POST: &str = "POST";
pub const NOTIFY: &str = "NOTIFY";
pub const SUBSCRIBE: &str = "SUBSCRIBE";
pub const UNSUBSCRIBE: &str = "UNSUBSCRIBE";

pub const HOST: &str = "HOST";
pub const CONNECTION: &str = "CONNECTION";
pub const CONTENT_LENGTH: &str = "CONTENT-LENGTH";
pub const CONTENT_TYPE: &str = "CONTENT-TYPE";
pub const TRANSFER_ENCODING: &str = "TRANSFER-ENCODING";
pub const USER_AGENT: &str = "USER-AGENT";
pub const SERVER: &str = "SERVER";
pub const SOAPACTION: &str = "SOAPACTION";
pub const CALLBACK: &str = "CALLBACK";
pub const NT: &str = "NT";
pub const NTS: &str = "NTS";
pub const SID: &str = "SID";
pub const SEQ: &str = "SEQ";
pub const TIMEOUT: &str = "TIMEOUT";

pub const CLOSE: &str = "close";
pub const KEEP_ALIVE: &str = "keep-alive";
pub const CHUNKED: &str = "chunked";
pub const UPNP_EVENT: &str = "upnp:event";
pub const UPNP_PROPCHANGE: &str = "upnp:propchange";

/// `Content-Type` used for SOAP requests and event bodies
pub const CONTENT_TYPE_XML: &str = "text/xml; charset=\"utf-8\"";

/// Product tokens sent as `User-Agent` and `Server`
pub const PRODUCT_TOKENS: &str = concat!(
    "upnp-control/",
    env!("CARGO_PKG_VERSION"),
    " UPnP/1.0"
);
