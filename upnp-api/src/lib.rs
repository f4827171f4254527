//! UPnP service metadata and action invocation
//!
//! This crate sits on top of the private `soap-client` crate. It defines the
//! read-only service metadata a description layer hands over
//! ([`ServiceDescription`], [`ActionSpec`], [`ArgumentSpec`]) and the
//! [`UpnpClient`] that turns an action plus caller arguments into a SOAP
//! call and a result map.
//!
//! ```rust,no_run
//! use std::collections::HashMap;
//! use upnp_api::{ArgumentSpec, ServiceDescription, ServiceInfo, StateVariableSpec, UpnpClient};
//!
//! let service = ServiceDescription::new(ServiceInfo {
//!     device_udn: "uuid:renderer".to_string(),
//!     service_type: "urn:schemas-upnp-org:service:RenderingControl:1".to_string(),
//!     service_id: "urn:upnp-org:serviceId:RenderingControl".to_string(),
//!     base_url: Some("http://192.168.1.100:1400/".to_string()),
//!     control_url: "/MediaRenderer/RenderingControl/Control".to_string(),
//!     event_sub_url: "/MediaRenderer/RenderingControl/Event".to_string(),
//! })
//! .with_action(
//!     "GetVolume",
//!     vec![
//!         ArgumentSpec::input("InstanceID", StateVariableSpec::new("A_ARG_TYPE_InstanceID", "ui4").with_default("0")),
//!         ArgumentSpec::input("Channel", StateVariableSpec::new("A_ARG_TYPE_Channel", "string").with_default("Master")),
//!         ArgumentSpec::output("CurrentVolume", StateVariableSpec::new("Volume", "ui2")),
//!     ],
//! );
//!
//! let client = UpnpClient::new();
//! let action = service.find_action("GetVolume").unwrap();
//! let result = client.invoke(action, &HashMap::new(), false)?;
//! println!("volume: {}", result["CurrentVolume"]);
//! # Ok::<(), upnp_api::ApiError>(())
//! ```

pub mod client;
pub mod error;
pub mod operations;
pub mod service;

pub use client::{build_envelope, UpnpClient};
pub use error::{ApiError, Result};
pub use service::{
    ActionSpec, ArgumentSpec, Direction, ServiceDescription, ServiceInfo, StateVariableSpec,
};
pub use soap_client::{
    TransportConfig, UpnpFault, ERROR_CODE_KEY, ERROR_DESCRIPTION_KEY, FAULT_CODE_KEY, FAULT_STRING_KEY,
};
