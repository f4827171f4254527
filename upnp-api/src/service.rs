//! Service, action and argument metadata
//!
//! These values are produced by the description layer and treated as
//! read-only here. They serialize with serde so a description cache can
//! store them.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::{ApiError, Result};

/// Addressing information for one UPnP service on one device
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceInfo {
    /// UDN of the device hosting the service
    pub device_udn: String,

    /// The UPnP service type, used as the SOAP body namespace
    pub service_type: String,

    pub service_id: String,

    /// URL the control and event paths are resolved against
    pub base_url: Option<String>,

    /// Control path or absolute URL
    pub control_url: String,

    /// Event subscription path or absolute URL
    pub event_sub_url: String,
}

impl ServiceInfo {
    /// Identity used to keep one subscription per service
    pub fn key(&self) -> String {
        format!("{}::{}", self.device_udn, self.service_id)
    }

    pub fn resolved_control_url(&self) -> Result<Url> {
        self.resolve(&self.control_url)
    }

    pub fn resolved_event_sub_url(&self) -> Result<Url> {
        self.resolve(&self.event_sub_url)
    }

    /// Absolute URLs are used as is; anything else is joined onto `base_url`
    fn resolve(&self, path: &str) -> Result<Url> {
        if let Ok(url) = Url::parse(path) {
            if url.has_host() {
                return Ok(url);
            }
        }
        let base = self
            .base_url
            .as_deref()
            .ok_or_else(|| ApiError::InvalidUrl(format!("no base URL to resolve {path}")))?;
        let base = Url::parse(base)?;
        Ok(base.join(path)?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    In,
    Out,
}

/// Declared state variable backing an argument
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateVariableSpec {
    pub name: String,
    pub data_type: String,
    pub default_value: Option<String>,
}

impl StateVariableSpec {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            default_value: None,
        }
    }

    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgumentSpec {
    pub name: String,
    pub direction: Direction,
    pub related_state_variable: StateVariableSpec,
}

impl ArgumentSpec {
    pub fn input(name: impl Into<String>, variable: StateVariableSpec) -> Self {
        Self {
            name: name.into(),
            direction: Direction::In,
            related_state_variable: variable,
        }
    }

    pub fn output(name: impl Into<String>, variable: StateVariableSpec) -> Self {
        Self {
            name: name.into(),
            direction: Direction::Out,
            related_state_variable: variable,
        }
    }

    pub fn is_input(&self) -> bool {
        self.direction == Direction::In
    }

    pub fn default_value(&self) -> Option<&str> {
        self.related_state_variable.default_value.as_deref()
    }
}

/// One action of a service, with its arguments in declaration order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSpec {
    pub name: String,
    pub service: Arc<ServiceInfo>,
    pub arguments: Vec<ArgumentSpec>,
}

impl ActionSpec {
    pub fn new(name: impl Into<String>, service: Arc<ServiceInfo>, arguments: Vec<ArgumentSpec>) -> Self {
        Self {
            name: name.into(),
            service,
            arguments,
        }
    }

    pub fn input_arguments(&self) -> impl Iterator<Item = &ArgumentSpec> {
        self.arguments.iter().filter(|a| a.is_input())
    }

    pub fn output_arguments(&self) -> impl Iterator<Item = &ArgumentSpec> {
        self.arguments.iter().filter(|a| !a.is_input())
    }

    pub fn find_argument(&self, name: &str) -> Option<&ArgumentSpec> {
        self.arguments.iter().find(|a| a.name == name)
    }
}

/// A resolved service: addressing plus its actions and state variables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDescription {
    pub info: Arc<ServiceInfo>,
    pub actions: Vec<ActionSpec>,
    pub state_variables: Vec<StateVariableSpec>,
}

impl ServiceDescription {
    pub fn new(info: ServiceInfo) -> Self {
        Self {
            info: Arc::new(info),
            actions: Vec::new(),
            state_variables: Vec::new(),
        }
    }

    /// Add an action owned by this service
    pub fn with_action(mut self, name: impl Into<String>, arguments: Vec<ArgumentSpec>) -> Self {
        self.actions
            .push(ActionSpec::new(name, Arc::clone(&self.info), arguments));
        self
    }

    pub fn with_state_variable(mut self, variable: StateVariableSpec) -> Self {
        self.state_variables.push(variable);
        self
    }

    pub fn find_action(&self, name: &str) -> Option<&ActionSpec> {
        self.actions.iter().find(|a| a.name == name)
    }

    pub fn find_state_variable(&self, name: &str) -> Option<&StateVariableSpec> {
        self.state_variables.iter().find(|v| v.name == name)
    }
}
