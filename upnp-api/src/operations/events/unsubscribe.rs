//! Unsubscribe operation for UPnP event subscriptions

use serde::Serialize;
use soap_client::SoapClient;

use crate::{Result, ServiceInfo};

pub struct UnsubscribeOperation;

/// Request for Unsubscribe operation
#[derive(Debug, Clone, Serialize)]
pub struct UnsubscribeRequest {
    /// The subscription ID to cancel
    pub sid: String,
}

impl UnsubscribeOperation {
    pub fn execute(
        soap_client: &SoapClient,
        service: &ServiceInfo,
        request: &UnsubscribeRequest,
    ) -> Result<()> {
        let event_url = service.resolved_event_sub_url()?;
        soap_client.unsubscribe(&event_url, &request.sid)?;
        Ok(())
    }
}
