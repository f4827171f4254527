use std::collections::HashMap;

use soap_client::{SoapClient, SoapEnvelope, SoapResponse, TransportConfig};
use tracing::debug;

use crate::{ActionSpec, ApiError, Result};

/// Invokes UPnP actions against remote services
///
/// Each call is blocking and independent; the client holds no per-call
/// state, so it can be cloned and shared between threads freely.
///
/// # Example
/// ```rust,no_run
/// use std::collections::HashMap;
/// use upnp_api::{ServiceDescription, UpnpClient};
///
/// # fn describe() -> ServiceDescription { unimplemented!() }
/// let service = describe();
/// let client = UpnpClient::new();
/// let action = service.find_action("GetTransportInfo").unwrap();
///
/// let args = HashMap::from([("InstanceID".to_string(), "0".to_string())]);
/// let result = client.invoke(action, &args, false)?;
/// println!("{:?}", result.get("CurrentTransportState"));
/// # Ok::<(), upnp_api::ApiError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct UpnpClient {
    soap_client: SoapClient,
}

impl UpnpClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: TransportConfig) -> Self {
        Self::with_soap_client(SoapClient::with_config(config))
    }

    /// Create a client around an existing SOAP client
    pub fn with_soap_client(soap_client: SoapClient) -> Self {
        Self { soap_client }
    }

    pub fn soap_client(&self) -> &SoapClient {
        &self.soap_client
    }

    /// Invoke `action` with `args`.
    ///
    /// Declared input arguments missing from `args` take their declared
    /// default, or an empty string. A device fault is returned as a map with
    /// the four fault keys when `return_error_as_result` is set, and as
    /// [`ApiError::SoapFault`] otherwise.
    pub fn invoke(
        &self,
        action: &ActionSpec,
        args: &HashMap<String, String>,
        return_error_as_result: bool,
    ) -> Result<HashMap<String, String>> {
        self.invoke_custom(action, args, &[], &[], return_error_as_result)
    }

    /// Like [`invoke`](Self::invoke), additionally declaring namespace
    /// prefixes on the action element and appending undeclared arguments
    /// after the declared ones.
    pub fn invoke_custom(
        &self,
        action: &ActionSpec,
        args: &HashMap<String, String>,
        custom_namespaces: &[(String, String)],
        custom_arguments: &[(String, String)],
        return_error_as_result: bool,
    ) -> Result<HashMap<String, String>> {
        let control_url = action.service.resolved_control_url()?;

        let mut envelope = build_envelope(action, args);
        for (prefix, uri) in custom_namespaces {
            envelope = envelope.namespace(prefix, uri);
        }
        for (name, value) in custom_arguments {
            envelope = envelope.custom_argument(name, value);
        }

        match self.soap_client.call(&control_url, &envelope)? {
            SoapResponse::Success(result) => Ok(result),
            SoapResponse::Fault(fault) if return_error_as_result => {
                debug!("{} returned fault {}, reporting as result", action.name, fault.error_code);
                Ok(fault.into_result_map())
            }
            SoapResponse::Fault(fault) => Err(ApiError::SoapFault(fault)),
        }
    }
}

/// Envelope for `action` with every declared input argument filled from
/// `args`, then the declared default, then the empty string
pub fn build_envelope(action: &ActionSpec, args: &HashMap<String, String>) -> SoapEnvelope {
    action
        .input_arguments()
        .fold(
            SoapEnvelope::new(&action.name, &action.service.service_type),
            |envelope, argument| {
                let value = args
                    .get(&argument.name)
                    .map(String::as_str)
                    .or_else(|| argument.default_value())
                    .unwrap_or("");
                envelope.argument(&argument.name, value)
            },
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ArgumentSpec, ServiceInfo, StateVariableSpec};
    use proptest::prelude::*;
    use std::sync::Arc;
    use xmltree::Element;

    fn service() -> Arc<ServiceInfo> {
        Arc::new(ServiceInfo {
            device_udn: "uuid:device".to_string(),
            service_type: "urn:schemas-upnp-org:service:Test:1".to_string(),
            service_id: "urn:upnp-org:serviceId:Test".to_string(),
            base_url: Some("http://127.0.0.1:1/".to_string()),
            control_url: "/ctl".to_string(),
            event_sub_url: "/evt".to_string(),
        })
    }

    fn arguments_of(xml: &str) -> Vec<(String, String)> {
        let root = Element::parse(xml.as_bytes()).unwrap();
        let action = root
            .get_child("Body")
            .unwrap()
            .children
            .iter()
            .find_map(|n| n.as_element())
            .unwrap();
        action
            .children
            .iter()
            .filter_map(|n| n.as_element())
            .map(|e| (e.name.clone(), e.get_text().map(|t| t.into_owned()).unwrap_or_default()))
            .collect()
    }

    #[test]
    fn test_missing_argument_without_default_is_empty() {
        let action = ActionSpec::new(
            "Action",
            service(),
            vec![
                ArgumentSpec::input("X", StateVariableSpec::new("A_ARG_X", "string")),
                ArgumentSpec::output("Y", StateVariableSpec::new("A_ARG_Y", "string")),
            ],
        );
        let xml = build_envelope(&action, &HashMap::new()).to_xml().unwrap();
        assert!(xml.contains("<X></X>"));
        assert!(!xml.contains("<Y>"));
    }

    #[test]
    fn test_missing_argument_uses_default() {
        let action = ActionSpec::new(
            "Action",
            service(),
            vec![ArgumentSpec::input(
                "X",
                StateVariableSpec::new("A_ARG_X", "string").with_default("Default"),
            )],
        );
        let xml = build_envelope(&action, &HashMap::new()).to_xml().unwrap();
        assert!(xml.contains("<X>Default</X>"));
    }

    #[test]
    fn test_undeclared_supplied_arguments_are_not_sent() {
        let action = ActionSpec::new(
            "Action",
            service(),
            vec![ArgumentSpec::input("X", StateVariableSpec::new("A_ARG_X", "string"))],
        );
        let args = HashMap::from([
            ("X".to_string(), "1".to_string()),
            ("Stray".to_string(), "2".to_string()),
        ]);
        let xml = build_envelope(&action, &args).to_xml().unwrap();
        assert_eq!(arguments_of(&xml), vec![("X".to_string(), "1".to_string())]);
    }

    // whitespace-only text does not survive an XML parse
    const VALUE: &str = "([!-~]([ -~]{0,10}[!-~])?)?";

    proptest! {
        #[test]
        fn every_input_argument_appears_once_in_order(
            declared in prop::collection::btree_map(
                "[A-Z][A-Za-z0-9]{0,8}",
                (prop::option::of(VALUE), prop::option::of(VALUE)),
                0..6,
            )
        ) {
            let arguments: Vec<ArgumentSpec> = declared
                .iter()
                .map(|(name, (default, _))| {
                    let mut variable = StateVariableSpec::new(format!("A_ARG_{name}"), "string");
                    variable.default_value = default.clone();
                    ArgumentSpec::input(name.clone(), variable)
                })
                .collect();
            let supplied: HashMap<String, String> = declared
                .iter()
                .filter_map(|(name, (_, value))| value.clone().map(|v| (name.clone(), v)))
                .collect();
            let action = ActionSpec::new("Action", service(), arguments);

            let xml = build_envelope(&action, &supplied).to_xml().unwrap();
            let sent = arguments_of(&xml);

            prop_assert_eq!(sent.len(), declared.len());
            for ((name, (default, value)), (sent_name, sent_value)) in declared.iter().zip(sent.iter()) {
                prop_assert_eq!(name, sent_name);
                let expected = value.clone().or_else(|| default.clone()).unwrap_or_default();
                prop_assert_eq!(&expected, sent_value);
            }
        }
    }
}
