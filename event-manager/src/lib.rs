//! # UPnP Event Manager
//!
//! Keeps GENA event subscriptions alive and delivers their notifications.
//!
//! ## Overview
//!
//! A [`SubscribeManager`] owns four things:
//!
//! - a [`SubscriptionStore`] holding one [`Subscription`] per service,
//!   indexed by subscription ID and by service
//! - a callback listener (from `callback-server`) whose port is advertised
//!   in every `SUBSCRIBE`
//! - a renewal worker that drops expired subscriptions and renews the ones
//!   marked keep-renew before they lapse
//! - a dispatcher thread that hands each changed variable to a
//!   [`NotifyEventListener`]
//!
//! ## Lifecycle
//!
//! 1. `initialize()` starts the renewal worker and dispatcher
//! 2. `start()` binds the callback listener (initializing first if needed)
//! 3. `register`, `renew`, `set_keep_renew` and `unregister` manage
//!    subscriptions while running
//! 4. `stop()` releases the listener and workers but keeps the records
//! 5. `terminate()` additionally cancels every subscription on its device
//!    and clears the store
//!
//! Applications can install a `tracing` subscriber with
//! [`logging::init_logging`].

pub mod config;
pub mod error;
pub mod listener;
pub mod logging;
pub mod manager;
pub mod store;
pub mod worker;

pub use config::ManagerConfig;
pub use error::{ManagerError, Result};
pub use listener::NotifyEventListener;
pub use logging::{init_logging, init_logging_from_env, LoggingMode};
pub use manager::SubscribeManager;
pub use store::{Subscription, SubscriptionStore};
pub use worker::RenewalOutcome;
