//! Event routing for HTTP callback notifications.
//!
//! The `EventRouter` decides whether an incoming subscription ID is known
//! and forwards accepted notifications to a channel, so the listener never
//! waits on whoever consumes them.

use std::fmt;
use std::sync::Arc;

use crossbeam::channel::Sender;
use tracing::debug;

/// A parsed UPnP event notification received via HTTP callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationPayload {
    /// The subscription ID from the UPnP SID header
    pub subscription_id: String,
    /// Event key from the SEQ header (0 when absent)
    pub seq: u64,
    /// Changed state variables in document order
    pub properties: Vec<(String, String)>,
    /// The raw XML event body
    pub event_xml: String,
}

type Lookup = dyn Fn(&str) -> bool + Send + Sync;

/// Routes events from HTTP callbacks to a channel.
///
/// Whether a subscription ID is known is answered by the lookup given at
/// construction, typically backed by the owner's subscription table.
#[derive(Clone)]
pub struct EventRouter {
    is_known: Arc<Lookup>,
    event_sender: Sender<NotificationPayload>,
}

impl EventRouter {
    /// Create a new event router.
    ///
    /// # Example
    ///
    /// ```
    /// use crossbeam::channel::unbounded;
    /// use callback_server::router::{EventRouter, NotificationPayload};
    ///
    /// let (tx, rx) = unbounded::<NotificationPayload>();
    /// let router = EventRouter::new(tx, |sid| sid == "uuid:subscription-123");
    /// ```
    pub fn new<F>(event_sender: Sender<NotificationPayload>, is_known: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        Self {
            is_known: Arc::new(is_known),
            event_sender,
        }
    }

    pub fn is_known(&self, subscription_id: &str) -> bool {
        (self.is_known)(subscription_id)
    }

    /// Route an incoming event to the channel.
    ///
    /// Returns `false`, dropping the event, when the subscription ID is not
    /// known.
    ///
    /// ```
    /// # use crossbeam::channel::unbounded;
    /// # use callback_server::router::{EventRouter, NotificationPayload};
    /// # let (tx, rx) = unbounded::<NotificationPayload>();
    /// # let router = EventRouter::new(tx, |sid| sid == "uuid:subscription-123");
    /// let routed = router.route_event(NotificationPayload {
    ///     subscription_id: "uuid:subscription-123".to_string(),
    ///     seq: 0,
    ///     properties: vec![("Volume".to_string(), "20".to_string())],
    ///     event_xml: String::new(),
    /// });
    /// assert!(routed);
    /// assert_eq!(rx.recv().unwrap().properties[0].1, "20");
    /// ```
    pub fn route_event(&self, payload: NotificationPayload) -> bool {
        if !self.is_known(&payload.subscription_id) {
            return false;
        }
        debug!(
            "routing event {} seq {} ({} properties)",
            payload.subscription_id,
            payload.seq,
            payload.properties.len()
        );
        // a dropped receiver only means nobody is listening any more
        let _ = self.event_sender.send(payload);
        true
    }
}

impl fmt::Debug for EventRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventRouter").finish_non_exhaustive()
    }
}
