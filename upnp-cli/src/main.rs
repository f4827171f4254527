use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use crossbeam::channel::{after, bounded, never, select};
use tracing::{info, warn};
use upnp_api::{ServiceDescription, UpnpClient};
use upnp_event_manager::{
    init_logging, init_logging_from_env, LoggingMode, ManagerConfig, SubscribeManager,
};

mod args;

use args::{Cli, Command, InvokeArgs, SubscribeArgs};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_mode.as_deref())?;

    let transport = cli.transport();
    match cli.command {
        Command::Invoke(args) => run_invoke(args, UpnpClient::with_config(transport)),
        Command::Subscribe(args) => {
            let config = args.manager_config(transport);
            run_subscribe(args, config)
        }
    }
}

fn init_tracing(mode: Option<&str>) -> Result<()> {
    match mode.map(str::to_ascii_lowercase).as_deref() {
        None => init_logging_from_env(),
        Some("silent") => init_logging(LoggingMode::Silent),
        Some("development") => init_logging(LoggingMode::Development),
        Some("debug") => init_logging(LoggingMode::Debug),
        Some(other) => anyhow::bail!(
            "Invalid log mode '{}'. Valid modes: silent, development, debug",
            other
        ),
    }
    .context("Failed to initialize logging")
}

fn run_invoke(args: InvokeArgs, client: UpnpClient) -> Result<()> {
    let description = args.description()?;
    let values: HashMap<String, String> = args.arguments()?.into_iter().collect();
    let action = description
        .find_action(&args.action)
        .context("action missing from its own description")?;

    let result = client
        .invoke(action, &values, args.fault_as_result)
        .with_context(|| format!("Failed to invoke {}", args.action))?;

    let json = serde_json::to_string_pretty(&result).context("Failed to render result")?;
    println!("{json}");
    Ok(())
}

fn run_subscribe(args: SubscribeArgs, config: ManagerConfig) -> Result<()> {
    args.validate()?;
    let service = Arc::new(ServiceDescription::new(args.service.info()));

    let manager = SubscribeManager::new(
        config,
        |service: &ServiceDescription, seq: u64, variable: &str, value: &str| {
            println!("[{}] #{} {} = {}", service.info.service_id, seq, variable, value);
        },
    );
    manager.start().context("Failed to start subscription manager")?;
    info!("callback listener on port {}", manager.get_event_port());

    let sid = manager
        .register(&service, args.timeout, !args.no_renew)
        .context("Failed to subscribe")?;
    println!("subscribed as {sid}, press Ctrl+C to stop");

    let (stop_tx, stop_rx) = bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = stop_tx.try_send(());
    })
    .context("Failed to install Ctrl+C handler")?;

    let deadline = args
        .duration
        .map(|secs| after(Duration::from_secs(secs)))
        .unwrap_or_else(never);
    select! {
        recv(stop_rx) -> _ => info!("interrupted"),
        recv(deadline) -> _ => info!("duration elapsed"),
    }

    if let Err(e) = manager.unregister(&service) {
        warn!("unsubscribe failed: {}", e);
    }
    manager.terminate();
    Ok(())
}
