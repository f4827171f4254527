//! GENA event subscription operations
//!
//! These use the HTTP `SUBSCRIBE`/`UNSUBSCRIBE` verbs against a service's
//! event subscription URL rather than SOAP.

pub mod events;
