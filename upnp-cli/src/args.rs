//! Command line arguments and their mapping onto library configuration

use std::net::IpAddr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use upnp_api::{ArgumentSpec, ServiceDescription, ServiceInfo, StateVariableSpec, TransportConfig};
use upnp_event_manager::ManagerConfig;

/// UPnP control point
///
/// Invokes SOAP actions on a UPnP service and subscribes to its events.
/// Service addressing is given on the command line; no discovery is done.
#[derive(Parser, Debug)]
#[command(name = "upnp-cli", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Connect timeout in milliseconds
    #[arg(long, global = true, default_value = "5000")]
    pub connect_timeout_ms: u64,

    /// Read timeout in milliseconds
    #[arg(long, global = true, default_value = "10000")]
    pub read_timeout_ms: u64,

    /// Logging mode: silent, development or debug (overrides UPNP_LOG_MODE)
    #[arg(long, global = true)]
    pub log_mode: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Invoke one action and print its result as JSON
    Invoke(InvokeArgs),
    /// Subscribe to a service and print events until Ctrl+C or --duration
    Subscribe(SubscribeArgs),
}

/// Where the service lives
#[derive(Args, Debug, Clone)]
pub struct ServiceArgs {
    /// Device base URL, e.g. http://192.168.1.100:1400/
    #[arg(short, long)]
    pub base_url: String,

    /// Service type URN, e.g. urn:schemas-upnp-org:service:RenderingControl:1
    #[arg(short = 't', long)]
    pub service_type: String,

    /// Service ID, defaults to one derived from the service type
    #[arg(long)]
    pub service_id: Option<String>,

    /// Control path or URL
    #[arg(short, long, default_value = "")]
    pub control_url: String,

    /// Event subscription path or URL
    #[arg(short, long, default_value = "")]
    pub event_url: String,
}

#[derive(Args, Debug)]
pub struct InvokeArgs {
    #[command(flatten)]
    pub service: ServiceArgs,

    /// Action name
    pub action: String,

    /// Input argument as NAME=VALUE, in declaration order
    #[arg(short, long = "arg", value_name = "NAME=VALUE")]
    pub args: Vec<String>,

    /// Print a UPnP fault as a result instead of failing
    #[arg(long)]
    pub fault_as_result: bool,
}

#[derive(Args, Debug)]
pub struct SubscribeArgs {
    #[command(flatten)]
    pub service: ServiceArgs,

    /// Requested subscription timeout in seconds
    #[arg(short = 's', long, default_value = "1800")]
    pub timeout: u32,

    /// Stop after this many seconds
    #[arg(short, long)]
    pub duration: Option<u64>,

    /// Callback port range start (0 with --port-end 0 picks any port)
    #[arg(long, default_value = "3400")]
    pub port_start: u16,

    /// Callback port range end
    #[arg(long, default_value = "3500")]
    pub port_end: u16,

    /// Address advertised to the device instead of the detected one
    #[arg(long)]
    pub callback_host: Option<IpAddr>,

    /// Let the subscription lapse instead of renewing it
    #[arg(long)]
    pub no_renew: bool,
}

impl Cli {
    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            read_timeout: Duration::from_millis(self.read_timeout_ms),
        }
    }
}

impl ServiceArgs {
    pub fn info(&self) -> ServiceInfo {
        let service_id = self
            .service_id
            .clone()
            .unwrap_or_else(|| derive_service_id(&self.service_type));
        ServiceInfo {
            device_udn: format!("uuid:{}", self.base_url),
            service_type: self.service_type.clone(),
            service_id,
            base_url: Some(self.base_url.clone()),
            control_url: self.control_url.clone(),
            event_sub_url: self.event_url.clone(),
        }
    }
}

impl InvokeArgs {
    /// Parsed `NAME=VALUE` pairs, in order
    pub fn arguments(&self) -> Result<Vec<(String, String)>> {
        self.args.iter().map(|arg| parse_pair(arg)).collect()
    }

    /// A description declaring one input argument per `--arg`
    pub fn description(&self) -> Result<ServiceDescription> {
        if self.service.control_url.is_empty() {
            bail!("--control-url is required to invoke an action");
        }
        let inputs = self
            .arguments()?
            .into_iter()
            .map(|(name, _)| {
                let variable = StateVariableSpec::new(format!("A_ARG_TYPE_{name}"), "string");
                ArgumentSpec::input(name, variable)
            })
            .collect();
        Ok(ServiceDescription::new(self.service.info()).with_action(&self.action, inputs))
    }
}

impl SubscribeArgs {
    pub fn validate(&self) -> Result<()> {
        if self.service.event_url.is_empty() {
            bail!("--event-url is required to subscribe");
        }
        if self.port_start > self.port_end {
            bail!(
                "Invalid port range: start ({}) > end ({})",
                self.port_start,
                self.port_end
            );
        }
        if self.timeout == 0 {
            bail!("Subscription timeout must be positive");
        }
        Ok(())
    }

    pub fn manager_config(&self, transport: TransportConfig) -> ManagerConfig {
        let config = ManagerConfig::default()
            .with_callback_port_range(self.port_start, self.port_end)
            .with_transport(transport);
        match self.callback_host {
            Some(host) => config.with_callback_host(host),
            None => config,
        }
    }
}

fn parse_pair(arg: &str) -> Result<(String, String)> {
    let (name, value) = arg
        .split_once('=')
        .with_context(|| format!("argument {arg:?} is not NAME=VALUE"))?;
    if name.is_empty() {
        bail!("argument {arg:?} has an empty name");
    }
    Ok((name.to_string(), value.to_string()))
}

/// `urn:schemas-upnp-org:service:AVTransport:1` gives
/// `urn:upnp-org:serviceId:AVTransport`
fn derive_service_id(service_type: &str) -> String {
    let name = service_type
        .rsplit(':')
        .nth(1)
        .filter(|name| !name.is_empty())
        .unwrap_or(service_type);
    format!("urn:upnp-org:serviceId:{name}")
}
