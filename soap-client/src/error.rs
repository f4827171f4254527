//! Error types for the SOAP client

use thiserror::Error;

use crate::fault::UpnpFault;

/// Errors that can occur during SOAP and GENA communication
#[derive(Debug, Error)]
pub enum SoapError {
    /// Connection refused, timeout, truncated stream or an unexpected GENA status
    #[error("Network/HTTP error: {0}")]
    Transport(String),

    /// Malformed start line, malformed XML or missing required XML structure
    #[error("XML parsing error: {0}")]
    Parse(String),

    /// Well-formed UPnP fault returned by the device
    #[error("SOAP fault: {0}")]
    Fault(UpnpFault),

    /// Rejected at construction time (unknown status code, bad start line)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl From<std::io::Error> for SoapError {
    fn from(error: std::io::Error) -> Self {
        SoapError::Transport(error.to_string())
    }
}
