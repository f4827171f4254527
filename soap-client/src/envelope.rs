//! SOAP 1.1 envelope construction and response parsing

use std::collections::HashMap;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use xmltree::Element;

use crate::fault::{parse_fault, UpnpFault};
use crate::SoapError;

pub const SOAP_ENVELOPE_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
pub const SOAP_ENCODING_STYLE: &str = "http://schemas.xmlsoap.org/soap/encoding/";

/// One action call ready to be serialized.
///
/// Arguments are written in insertion order; custom arguments always follow
/// the declared ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SoapEnvelope {
    action: String,
    service_type: String,
    arguments: Vec<(String, String)>,
    namespaces: Vec<(String, String)>,
    custom_arguments: Vec<(String, String)>,
}

impl SoapEnvelope {
    pub fn new(action: impl Into<String>, service_type: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            service_type: service_type.into(),
            ..Self::default()
        }
    }

    pub fn argument(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.arguments.push((name.into(), value.into()));
        self
    }

    /// Declare `xmlns:<prefix>` on the action element
    pub fn namespace(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        self.namespaces.push((prefix.into(), uri.into()));
        self
    }

    /// Append an undeclared argument; `prefix:name` is allowed
    pub fn custom_argument(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom_arguments.push((name.into(), value.into()));
        self
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn service_type(&self) -> &str {
        &self.service_type
    }

    /// Value for the `SOAPACTION` header, quotes included
    pub fn soap_action(&self) -> String {
        format!("\"{}#{}\"", self.service_type, self.action)
    }

    pub fn to_xml(&self) -> Result<String, SoapError> {
        self.write().map_err(|e| SoapError::Parse(format!("failed to build envelope: {e}")))
    }

    fn write(&self) -> quick_xml::Result<String> {
        let mut writer = Writer::new(Vec::new());
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;

        let envelope = BytesStart::new("s:Envelope").with_attributes([
            ("xmlns:s", SOAP_ENVELOPE_NS),
            ("s:encodingStyle", SOAP_ENCODING_STYLE),
        ]);
        writer.write_event(Event::Start(envelope))?;
        writer.write_event(Event::Start(BytesStart::new("s:Body")))?;

        let action_name = format!("u:{}", self.action);
        let mut action = BytesStart::new(action_name.as_str());
        action.push_attribute(("xmlns:u", self.service_type.as_str()));
        for (prefix, uri) in &self.namespaces {
            let key = format!("xmlns:{prefix}");
            action.push_attribute((key.as_str(), uri.as_str()));
        }
        writer.write_event(Event::Start(action))?;

        for (name, value) in self.arguments.iter().chain(self.custom_arguments.iter()) {
            writer.write_event(Event::Start(BytesStart::new(name.as_str())))?;
            writer.write_event(Event::Text(BytesText::new(value)))?;
            writer.write_event(Event::End(BytesEnd::new(name.as_str())))?;
        }

        writer.write_event(Event::End(BytesEnd::new(action_name.as_str())))?;
        writer.write_event(Event::End(BytesEnd::new("s:Body")))?;
        writer.write_event(Event::End(BytesEnd::new("s:Envelope")))?;

        Ok(String::from_utf8_lossy(&writer.into_inner()).into_owned())
    }
}

/// Outcome of a parsed response envelope: exactly one of result or fault
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SoapResponse {
    Success(HashMap<String, String>),
    Fault(UpnpFault),
}

impl SoapResponse {
    pub fn is_fault(&self) -> bool {
        matches!(self, SoapResponse::Fault(_))
    }
}

/// Parse a response envelope for `action`.
///
/// With `is_error` the body must hold a UPnP fault; otherwise every direct
/// child of `<action>Response` becomes one entry of the result map.
pub fn parse_response(xml: &str, action: &str, is_error: bool) -> Result<SoapResponse, SoapError> {
    let body = parse_body(xml)?;
    if is_error {
        return parse_fault(&body).map(SoapResponse::Fault);
    }

    let response_name = format!("{action}Response");
    let response = body
        .get_child(response_name.as_str())
        .ok_or_else(|| SoapError::Parse(format!("Missing {response_name} element")))?;

    let result = response
        .children
        .iter()
        .filter_map(|node| node.as_element())
        .map(|child| {
            let value = child.get_text().map(|t| t.into_owned()).unwrap_or_default();
            (child.name.clone(), value)
        })
        .collect();
    Ok(SoapResponse::Success(result))
}

/// Parse the document and return its `Body` element
pub(crate) fn parse_body(xml: &str) -> Result<Element, SoapError> {
    if xml.trim().is_empty() {
        return Err(SoapError::Parse("empty response body".to_string()));
    }
    let root = Element::parse(xml.as_bytes()).map_err(|e| SoapError::Parse(e.to_string()))?;
    if root.name != "Envelope" {
        return Err(SoapError::Parse(format!(
            "Expected Envelope root, found {}",
            root.name
        )));
    }
    root.get_child("Body")
        .cloned()
        .ok_or_else(|| SoapError::Parse("Missing SOAP Body".to_string()))
}
