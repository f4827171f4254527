//! Renew operation for UPnP event subscriptions

use serde::{Deserialize, Serialize};
use soap_client::SoapClient;

use crate::{Result, ServiceInfo};

/// Extends an existing subscription; no callback is sent
pub struct RenewOperation;

/// Request for Renew operation
#[derive(Debug, Clone, Serialize)]
pub struct RenewRequest {
    /// The subscription ID to renew
    pub sid: String,
    /// Requested renewal timeout in seconds
    pub timeout_seconds: u32,
}

/// Response for Renew operation
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RenewResponse {
    /// The timeout granted by the device (in seconds)
    pub timeout_seconds: u32,
}

impl RenewOperation {
    pub fn execute(
        soap_client: &SoapClient,
        service: &ServiceInfo,
        request: &RenewRequest,
    ) -> Result<RenewResponse> {
        let event_url = service.resolved_event_sub_url()?;
        let timeout_seconds =
            soap_client.renew_subscription(&event_url, &request.sid, request.timeout_seconds)?;

        Ok(RenewResponse { timeout_seconds })
    }
}
