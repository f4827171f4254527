//! Subscribe operation for UPnP event subscriptions

use serde::{Deserialize, Serialize};
use soap_client::SoapClient;

use crate::{Result, ServiceInfo};

/// Creates a new event subscription on a service
pub struct SubscribeOperation;

/// Request for Subscribe operation
#[derive(Debug, Clone, Serialize)]
pub struct SubscribeRequest {
    /// The callback URL where events should be sent
    pub callback_url: String,
    /// Requested subscription timeout in seconds
    pub timeout_seconds: u32,
}

/// Response for Subscribe operation
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SubscribeResponse {
    /// Subscription ID returned by the device
    pub sid: String,
    /// Timeout granted by the device (in seconds), which may differ from the request
    pub timeout_seconds: u32,
}

impl SubscribeOperation {
    /// Send `SUBSCRIBE` with a callback to the service's event URL
    pub fn execute(
        soap_client: &SoapClient,
        service: &ServiceInfo,
        request: &SubscribeRequest,
    ) -> Result<SubscribeResponse> {
        let event_url = service.resolved_event_sub_url()?;
        let response =
            soap_client.subscribe(&event_url, &request.callback_url, request.timeout_seconds)?;

        Ok(SubscribeResponse {
            sid: response.sid,
            timeout_seconds: response.timeout_seconds,
        })
    }
}
