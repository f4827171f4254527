//! Generic UPnP callback server for receiving event notifications.
//!
//! This crate provides a small blocking HTTP listener for GENA `NOTIFY`
//! requests. It knows nothing about devices or services: it validates the
//! request, parses the `e:propertyset` body and hands the result to an
//! [`EventRouter`], which forwards it over a channel.
//!
//! # Overview
//!
//! - [`CallbackServer`]: binds a port from a range and accepts connections on
//!   a background thread and serves them from a small fixed pool, answering
//!   `503` when the pool and its backlog are full.
//! - [`EventRouter`]: asks the owner whether a subscription ID is known and
//!   forwards accepted events to a `crossbeam` channel.
//! - [`NotificationPayload`]: subscription ID, event key, parsed properties
//!   and the raw body.
//!
//! Responses follow GENA: `405` for methods other than `NOTIFY`, `400` for
//! missing or wrong `NT`/`NTS`, `412` for a missing or unknown `SID` or an
//! event without properties, `200` otherwise.

mod notify;
pub mod router;
mod server;

pub use notify::{handle_request, parse_property_set, validate_upnp_headers};
pub use router::{EventRouter, NotificationPayload};
pub use server::{local_ip_for, CallbackServer, ServerError, CONNECTION_BACKLOG, MAX_CONNECTIONS};
