use soap_client::{SoapError, UpnpFault};
use thiserror::Error;

/// Errors returned by action invocation and subscription operations
///
/// This is the single failure channel exposed to callers: transport and
/// format problems from the SOAP layer are folded into it, and a device
/// fault is carried whole so callers can inspect its UPnP error code.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Network communication error
    ///
    /// Connection refused, timeouts, truncated responses and GENA requests
    /// the device answered with a non-success status.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Response parsing error
    ///
    /// Malformed XML, a missing `Body` or action response element, or a
    /// fault without a UPnP error code.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// SOAP fault returned by device
    #[error("SOAP fault: {0}")]
    SoapFault(UpnpFault),

    /// The service's base, control or event URL could not be resolved
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Invalid parameter value
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

impl ApiError {
    /// The UPnP error code when this error is a device fault
    pub fn upnp_error_code(&self) -> Option<u32> {
        match self {
            ApiError::SoapFault(fault) => fault.code(),
            _ => None,
        }
    }
}

/// Type alias for results that can return an ApiError
pub type Result<T> = std::result::Result<T, ApiError>;

/// Convert from SoapError to ApiError
impl From<SoapError> for ApiError {
    fn from(error: SoapError) -> Self {
        match error {
            SoapError::Transport(msg) => ApiError::NetworkError(msg),
            SoapError::Parse(msg) => ApiError::ParseError(msg),
            SoapError::Fault(fault) => ApiError::SoapFault(fault),
            SoapError::InvalidArgument(msg) => ApiError::InvalidParameter(msg),
        }
    }
}

impl From<url::ParseError> for ApiError {
    fn from(error: url::ParseError) -> Self {
        ApiError::InvalidUrl(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fault() -> UpnpFault {
        UpnpFault {
            fault_code: "s:Client".to_string(),
            fault_string: "UPnPError".to_string(),
            error_code: "718".to_string(),
            error_description: "Invalid InstanceID".to_string(),
        }
    }

    #[test]
    fn test_soap_error_conversion() {
        let api_error: ApiError = SoapError::Transport("connection timeout".to_string()).into();
        assert!(matches!(api_error, ApiError::NetworkError(_)));

        let api_error: ApiError = SoapError::Parse("invalid XML".to_string()).into();
        assert!(matches!(api_error, ApiError::ParseError(_)));

        let api_error: ApiError = SoapError::InvalidArgument("bad scheme".to_string()).into();
        assert!(matches!(api_error, ApiError::InvalidParameter(_)));

        let api_error: ApiError = SoapError::Fault(fault()).into();
        assert_eq!(api_error.upnp_error_code(), Some(718));
    }

    #[test]
    fn test_error_display() {
        let network_err = ApiError::NetworkError("connection failed".to_string());
        assert_eq!(format!("{}", network_err), "Network error: connection failed");

        let parse_err = ApiError::ParseError("invalid XML".to_string());
        assert_eq!(format!("{}", parse_err), "Parse error: invalid XML");

        let soap_fault = ApiError::SoapFault(fault());
        assert_eq!(
            format!("{}", soap_fault),
            "SOAP fault: s:Client UPnPError (UPnP error 718: Invalid InstanceID)"
        );
    }

    #[test]
    fn test_every_variant_has_a_source() {
        let sources: Vec<ApiError> = vec![
            SoapError::Transport("refused".to_string()).into(),
            SoapError::Parse("bad xml".to_string()).into(),
            SoapError::Fault(fault()).into(),
            url::Url::parse("not a url").unwrap_err().into(),
            SoapError::InvalidArgument("bad scheme".to_string()).into(),
        ];
        for error in sources {
            // adding a variant without a producer fails to compile here
            match error {
                ApiError::NetworkError(_)
                | ApiError::ParseError(_)
                | ApiError::SoapFault(_)
                | ApiError::InvalidUrl(_)
                | ApiError::InvalidParameter(_) => {}
            }
        }
    }

    #[test]
    fn test_url_parse_error_conversion() {
        let err: ApiError = url::Url::parse("not a url").unwrap_err().into();
        assert!(matches!(err, ApiError::InvalidUrl(_)));
        assert!(err.upnp_error_code().is_none());
    }
}
