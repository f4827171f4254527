//! Receiver side of event notifications

use upnp_api::ServiceDescription;

/// Receives state variable changes from subscribed services.
///
/// Called on the manager's dispatcher thread, once per variable of each
/// accepted `NOTIFY`, in document order. A slow listener delays later
/// events but never the callback listener itself.
///
/// Closures taking `(service, seq, variable, value)` implement this trait:
///
/// ```
/// use upnp_event_manager::NotifyEventListener;
///
/// fn takes_listener(_: impl NotifyEventListener) {}
///
/// takes_listener(|service: &upnp_api::ServiceDescription, seq: u64, variable: &str, value: &str| {
///     println!("{} #{}: {} = {}", service.info.service_id, seq, variable, value);
/// });
/// ```
pub trait NotifyEventListener: Send + Sync {
    fn on_notify_event(&self, service: &ServiceDescription, seq: u64, variable: &str, value: &str);
}

impl<F> NotifyEventListener for F
where
    F: Fn(&ServiceDescription, u64, &str, &str) + Send + Sync,
{
    fn on_notify_event(&self, service: &ServiceDescription, seq: u64, variable: &str, value: &str) {
        self(service, seq, variable, value)
    }
}
