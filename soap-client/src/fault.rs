use std::collections::HashMap;
use std::fmt;

use xmltree::Element;

use crate::SoapError;

/// Result-map key holding the SOAP `faultcode`
pub const FAULT_CODE_KEY: &str = "faultcode";
/// Result-map key holding the SOAP `faultstring`
pub const FAULT_STRING_KEY: &str = "faultstring";
/// Result-map key holding `UPnPError/errorCode`
pub const ERROR_CODE_KEY: &str = "UPnPError/errorCode";
/// Result-map key holding `UPnPError/errorDescription`
pub const ERROR_DESCRIPTION_KEY: &str = "UPnPError/errorDescription";

/// A well-formed UPnP fault returned by a device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpnpFault {
    pub fault_code: String,
    pub fault_string: String,
    pub error_code: String,
    pub error_description: String,
}

impl UpnpFault {
    /// Numeric UPnP error code, when the device sent a number
    pub fn code(&self) -> Option<u32> {
        self.error_code.trim().parse().ok()
    }

    /// The fault as a result map with the four fixed keys
    pub fn into_result_map(self) -> HashMap<String, String> {
        HashMap::from([
            (FAULT_CODE_KEY.to_string(), self.fault_code),
            (FAULT_STRING_KEY.to_string(), self.fault_string),
            (ERROR_CODE_KEY.to_string(), self.error_code),
            (ERROR_DESCRIPTION_KEY.to_string(), self.error_description),
        ])
    }
}

impl fmt::Display for UpnpFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} (UPnP error {}: {})",
            self.fault_code, self.fault_string, self.error_code, self.error_description
        )
    }
}

/// Read `Fault` out of a SOAP `Body`.
///
/// `faultcode`, `faultstring` and `detail/UPnPError/errorCode` are required;
/// a missing `errorDescription` is read as empty.
pub(crate) fn parse_fault(body: &Element) -> Result<UpnpFault, SoapError> {
    let fault = body
        .get_child("Fault")
        .ok_or_else(|| SoapError::Parse("Missing Fault element".to_string()))?;

    let fault_code = required_text(fault, "faultcode")?;
    let fault_string = required_text(fault, "faultstring")?;

    let upnp_error = fault
        .get_child("detail")
        .and_then(|detail| detail.get_child("UPnPError"))
        .ok_or_else(|| SoapError::Parse("Missing detail/UPnPError element".to_string()))?;
    let error_code = required_text(upnp_error, "errorCode")?;
    let error_description = upnp_error
        .get_child("errorDescription")
        .and_then(|e| e.get_text())
        .map(|t| t.into_owned())
        .unwrap_or_default();

    Ok(UpnpFault {
        fault_code,
        fault_string,
        error_code,
        error_description,
    })
}

fn required_text(parent: &Element, name: &str) -> Result<String, SoapError> {
    parent
        .get_child(name)
        .map(|e| e.get_text().map(|t| t.into_owned()).unwrap_or_default())
        .ok_or_else(|| SoapError::Parse(format!("Missing {name} element")))
}
