//! SOAP and GENA client for UPnP control points
//!
//! This crate carries the wire-level half of a control point: an HTTP/1.1
//! message model, a blocking transport with connect and read timeouts, the
//! SOAP 1.1 envelope codec used for action invocation, and the GENA
//! `SUBSCRIBE`/`UNSUBSCRIBE` exchanges used for eventing.

mod envelope;
mod error;
mod fault;
pub mod http;
mod transport;

pub use envelope::{parse_response, SoapEnvelope, SoapResponse, SOAP_ENCODING_STYLE, SOAP_ENVELOPE_NS};
pub use error::SoapError;
pub use fault::{
    UpnpFault, ERROR_CODE_KEY, ERROR_DESCRIPTION_KEY, FAULT_CODE_KEY, FAULT_STRING_KEY,
};
pub use transport::{HttpClient, TransportConfig};

use tracing::{debug, warn};
use url::Url;

use http::{
    HttpRequest, HttpResponse, Status, CALLBACK, CONNECTION, CONTENT_LENGTH, CONTENT_TYPE,
    CONTENT_TYPE_XML, NT, POST, PRODUCT_TOKENS, SID, SOAPACTION, SUBSCRIBE, TIMEOUT, UNSUBSCRIBE,
    UPNP_EVENT, USER_AGENT,
};

/// Timeout assumed when a device grants `infinite` or an unreadable value
pub const DEFAULT_SUBSCRIPTION_TIMEOUT_SECONDS: u32 = 300;

/// Response from a UPnP subscription request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionResponse {
    /// Subscription ID returned by the device
    pub sid: String,
    /// Timeout granted by the device (in seconds)
    pub timeout_seconds: u32,
}

/// A blocking SOAP/GENA client for UPnP devices
#[derive(Debug, Clone)]
pub struct SoapClient {
    http: HttpClient,
    default_timeout_seconds: u32,
}

impl SoapClient {
    /// Create a new SOAP client with default configuration
    pub fn new() -> Self {
        Self::with_config(TransportConfig::default())
    }

    pub fn with_config(config: TransportConfig) -> Self {
        Self {
            http: HttpClient::new(config),
            default_timeout_seconds: DEFAULT_SUBSCRIPTION_TIMEOUT_SECONDS,
        }
    }

    /// Timeout used when a GENA response carries no usable `TIMEOUT`
    pub fn with_default_timeout(mut self, seconds: u32) -> Self {
        self.default_timeout_seconds = seconds;
        self
    }

    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    /// POST `envelope` to `control_url` and parse what comes back.
    ///
    /// A 200 response is parsed as a success envelope; every other status is
    /// parsed as a UPnP fault. Malformed bodies fail at any status.
    pub fn call(&self, control_url: &Url, envelope: &SoapEnvelope) -> Result<SoapResponse, SoapError> {
        let body = envelope.to_xml()?;

        let mut request = HttpRequest::to_url(POST, control_url)?;
        request.set_header(SOAPACTION, envelope.soap_action());
        request.set_header(USER_AGENT, PRODUCT_TOKENS);
        request.set_header(CONNECTION, "close");
        request.set_header(CONTENT_TYPE, CONTENT_TYPE_XML);
        request.set_body(&body, true);

        debug!("invoking {} at {}", envelope.action(), control_url);
        let response = self.http.post(&request)?;
        let xml = response.body().unwrap_or_default();
        parse_response(&xml, envelope.action(), response.status() != Status::Ok)
    }

    /// Subscribe to events at `event_url`, asking the device to deliver
    /// `NOTIFY` requests to `callback_url`.
    pub fn subscribe(
        &self,
        event_url: &Url,
        callback_url: &str,
        timeout_seconds: u32,
    ) -> Result<SubscriptionResponse, SoapError> {
        let mut request = self.gena_request(SUBSCRIBE, event_url)?;
        request.set_header(NT, UPNP_EVENT);
        request.set_header(CALLBACK, format!("<{callback_url}>"));
        request.set_header(TIMEOUT, format!("Second-{timeout_seconds}"));
        request.set_header(CONTENT_LENGTH, "0");

        let response = self.send_gena(&request, "SUBSCRIBE")?;
        let sid = response
            .header(SID)
            .map(str::trim)
            .filter(|sid| !sid.is_empty())
            .ok_or_else(|| SoapError::Parse("Missing SID header in SUBSCRIBE response".to_string()))?
            .to_string();
        let timeout_seconds = parse_timeout(response.header(TIMEOUT), self.default_timeout_seconds)?;

        Ok(SubscriptionResponse {
            sid,
            timeout_seconds,
        })
    }

    /// Renew an existing subscription, returning the granted timeout
    pub fn renew_subscription(
        &self,
        event_url: &Url,
        sid: &str,
        timeout_seconds: u32,
    ) -> Result<u32, SoapError> {
        let mut request = self.gena_request(SUBSCRIBE, event_url)?;
        request.set_header(SID, sid);
        request.set_header(TIMEOUT, format!("Second-{timeout_seconds}"));
        request.set_header(CONTENT_LENGTH, "0");

        let response = self.send_gena(&request, "SUBSCRIBE renewal")?;
        if let Some(returned) = response.header(SID).map(str::trim) {
            if returned != sid {
                return Err(SoapError::Parse(format!(
                    "renewal of {sid} answered with different SID {returned}"
                )));
            }
        }
        parse_timeout(response.header(TIMEOUT), self.default_timeout_seconds)
    }

    /// Cancel a subscription
    pub fn unsubscribe(&self, event_url: &Url, sid: &str) -> Result<(), SoapError> {
        let mut request = self.gena_request(UNSUBSCRIBE, event_url)?;
        request.set_header(SID, sid);
        request.set_header(CONTENT_LENGTH, "0");

        self.send_gena(&request, "UNSUBSCRIBE")?;
        Ok(())
    }

    fn gena_request(&self, method: &str, event_url: &Url) -> Result<HttpRequest, SoapError> {
        let mut request = HttpRequest::to_url(method, event_url)?;
        request.set_header(USER_AGENT, PRODUCT_TOKENS);
        request.set_header(CONNECTION, "close");
        Ok(request)
    }

    fn send_gena(&self, request: &HttpRequest, what: &str) -> Result<HttpResponse, SoapError> {
        debug!("{} {}", what, request.uri());
        let response = self.http.post(request)?;
        if !response.is_success() {
            warn!("{} rejected: HTTP {}", what, response.status_code());
            return Err(SoapError::Transport(format!(
                "{what} failed: HTTP {}",
                response.status_code()
            )));
        }
        Ok(response)
    }
}

impl Default for SoapClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Read a GENA `TIMEOUT` value such as `Second-1800`.
///
/// `infinite`, absent or unreadable values give `default`; zero is rejected.
pub fn parse_timeout(value: Option<&str>, default: u32) -> Result<u32, SoapError> {
    let Some(value) = value else {
        return Ok(default);
    };
    let value = value.trim().to_ascii_lowercase();
    let Some(seconds) = value.strip_prefix("second-") else {
        return Ok(default);
    };
    match seconds.trim().parse::<u32>() {
        Ok(0) => Err(SoapError::Parse(format!("Illegal TIMEOUT value: {value}"))),
        Ok(seconds) => Ok(seconds),
        Err(_) => Ok(default),
    }
}
