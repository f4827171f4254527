//! In-memory table of active GENA subscriptions
//!
//! Records are indexed both by subscription ID (for routing `NOTIFY`
//! callbacks) and by service key (for register/renew/unregister). One mutex
//! guards both indexes so they never disagree.
//!
//! ```text
//! SubscriptionStore
//! ├── by_sid: HashMap<Sid, Subscription>
//! └── by_service: HashMap<ServiceKey, Sid>
//! ```
//!
//! Every method that looks at expiry takes `now` explicitly, so the renewal
//! worker and tests decide what time it is.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use upnp_api::ServiceDescription;

// ============================================================================
// Subscription
// ============================================================================

/// One active subscription
#[derive(Debug, Clone)]
pub struct Subscription {
    /// Server-assigned subscription ID
    pub sid: String,

    /// The subscribed service; the store never keeps it alive
    pub service: Weak<ServiceDescription>,

    /// [`ServiceInfo::key`](upnp_api::ServiceInfo::key) of the service
    pub service_key: String,

    /// Timeout granted by the device
    pub timeout: Duration,

    /// Renew before expiry for as long as the record exists
    pub keep_renew: bool,

    /// Registration or last renewal time plus `timeout`
    pub expires_at: Instant,
}

impl Subscription {
    pub fn new(
        sid: impl Into<String>,
        service: &Arc<ServiceDescription>,
        timeout: Duration,
        keep_renew: bool,
        now: Instant,
    ) -> Self {
        Self {
            sid: sid.into(),
            service: Arc::downgrade(service),
            service_key: service.info.key(),
            timeout,
            keep_renew,
            expires_at: now + timeout,
        }
    }

    /// The owning service, if it is still alive
    pub fn service(&self) -> Option<Arc<ServiceDescription>> {
        self.service.upgrade()
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        self.expires_at <= now
    }

    /// Whether expiry falls within `window` of `now`
    pub fn expires_within(&self, now: Instant, window: Duration) -> bool {
        self.expires_at <= now + window
    }

    /// Time left before expiry, zero once expired
    pub fn remaining(&self, now: Instant) -> Duration {
        self.expires_at.saturating_duration_since(now)
    }
}

// ============================================================================
// SubscriptionStore
// ============================================================================

#[derive(Debug, Default)]
struct Tables {
    by_sid: HashMap<String, Subscription>,
    by_service: HashMap<String, String>,
}

impl Tables {
    fn remove_sid(&mut self, sid: &str) -> Option<Subscription> {
        let removed = self.by_sid.remove(sid)?;
        if self.by_service.get(&removed.service_key).map(String::as_str) == Some(sid) {
            self.by_service.remove(&removed.service_key);
        }
        Some(removed)
    }
}

/// Thread-safe subscription table
#[derive(Debug, Default)]
pub struct SubscriptionStore {
    tables: Mutex<Tables>,
}

impl SubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `subscription`, replacing any record for the same service or SID.
    ///
    /// Returns the replaced record of the service.
    pub fn insert(&self, subscription: Subscription) -> Option<Subscription> {
        let mut tables = self.tables.lock();
        let replaced = tables
            .by_service
            .get(&subscription.service_key)
            .cloned()
            .and_then(|sid| tables.remove_sid(&sid));
        tables.remove_sid(&subscription.sid);

        tables
            .by_service
            .insert(subscription.service_key.clone(), subscription.sid.clone());
        tables.by_sid.insert(subscription.sid.clone(), subscription);
        replaced
    }

    /// Snapshot of the record held for a service
    pub fn get_by_service(&self, service_key: &str) -> Option<Subscription> {
        let tables = self.tables.lock();
        let sid = tables.by_service.get(service_key)?;
        tables.by_sid.get(sid).cloned()
    }

    pub fn get_by_sid(&self, sid: &str) -> Option<Subscription> {
        self.tables.lock().by_sid.get(sid).cloned()
    }

    pub fn contains_sid(&self, sid: &str) -> bool {
        self.tables.lock().by_sid.contains_key(sid)
    }

    /// The live service owning `sid`
    pub fn service_for(&self, sid: &str) -> Option<Arc<ServiceDescription>> {
        self.tables.lock().by_sid.get(sid)?.service()
    }

    /// Move expiry to `now + timeout` after a successful renewal.
    ///
    /// Only applies while `sid` is still the service's subscription, so a
    /// renewal racing a re-register or unregister changes nothing.
    pub fn refresh(&self, service_key: &str, sid: &str, timeout: Duration, now: Instant) -> bool {
        let mut tables = self.tables.lock();
        if tables.by_service.get(service_key).map(String::as_str) != Some(sid) {
            return false;
        }
        match tables.by_sid.get_mut(sid) {
            Some(subscription) => {
                subscription.timeout = timeout;
                subscription.expires_at = now + timeout;
                true
            }
            None => false,
        }
    }

    /// Flip the keep-renew flag without touching expiry
    pub fn set_keep_renew(&self, service_key: &str, keep_renew: bool) -> bool {
        let mut tables = self.tables.lock();
        let Some(sid) = tables.by_service.get(service_key).cloned() else {
            return false;
        };
        match tables.by_sid.get_mut(&sid) {
            Some(subscription) => {
                subscription.keep_renew = keep_renew;
                true
            }
            None => false,
        }
    }

    pub fn remove_by_service(&self, service_key: &str) -> Option<Subscription> {
        let mut tables = self.tables.lock();
        let sid = tables.by_service.get(service_key).cloned()?;
        tables.remove_sid(&sid)
    }

    /// Drop every record that has expired at `now`
    pub fn remove_expired(&self, now: Instant) -> Vec<Subscription> {
        let mut tables = self.tables.lock();
        let expired: Vec<String> = tables
            .by_sid
            .values()
            .filter(|s| s.is_expired(now))
            .map(|s| s.sid.clone())
            .collect();
        expired
            .iter()
            .filter_map(|sid| tables.remove_sid(sid))
            .collect()
    }

    /// Keep-renew records that expire within `window` of `now`, soonest
    /// expiry first
    pub fn due_for_renewal(&self, now: Instant, window: Duration) -> Vec<Subscription> {
        let mut due: Vec<Subscription> = self
            .tables
            .lock()
            .by_sid
            .values()
            .filter(|s| s.keep_renew && s.expires_within(now, window))
            .cloned()
            .collect();
        due.sort_by_key(|s| s.expires_at);
        due
    }

    /// Remove and return every record
    pub fn drain(&self) -> Vec<Subscription> {
        let mut tables = self.tables.lock();
        tables.by_service.clear();
        tables.by_sid.drain().map(|(_, s)| s).collect()
    }

    pub fn len(&self) -> usize {
        self.tables.lock().by_sid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use upnp_api::ServiceInfo;

    fn service(id: &str) -> Arc<ServiceDescription> {
        Arc::new(ServiceDescription::new(ServiceInfo {
            device_udn: "uuid:device".to_string(),
            service_type: "urn:schemas-upnp-org:service:AVTransport:1".to_string(),
            service_id: id.to_string(),
            base_url: Some("http://192.168.1.100:1400/".to_string()),
            control_url: "/control".to_string(),
            event_sub_url: "/event".to_string(),
        }))
    }

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn test_insert_and_lookup() {
        let store = SubscriptionStore::new();
        let svc = service("urn:upnp-org:serviceId:AVTransport");
        let now = Instant::now();

        assert!(store.insert(Subscription::new("uuid:sub-1", &svc, secs(1800), true, now)).is_none());

        assert_eq!(store.len(), 1);
        assert!(store.contains_sid("uuid:sub-1"));
        let record = store.get_by_service(&svc.info.key()).unwrap();
        assert_eq!(record.sid, "uuid:sub-1");
        assert_eq!(record.expires_at, now + secs(1800));
        assert!(Arc::ptr_eq(&store.service_for("uuid:sub-1").unwrap(), &svc));
    }

    #[test]
    fn test_second_insert_for_service_replaces() {
        let store = SubscriptionStore::new();
        let svc = service("urn:upnp-org:serviceId:AVTransport");
        let now = Instant::now();

        store.insert(Subscription::new("uuid:old", &svc, secs(300), true, now));
        let replaced = store.insert(Subscription::new("uuid:new", &svc, secs(300), false, now));

        assert_eq!(replaced.unwrap().sid, "uuid:old");
        assert_eq!(store.len(), 1);
        assert!(!store.contains_sid("uuid:old"));
        assert_eq!(store.get_by_service(&svc.info.key()).unwrap().sid, "uuid:new");
    }

    #[test]
    fn test_weak_service_reference() {
        let store = SubscriptionStore::new();
        let svc = service("urn:upnp-org:serviceId:AVTransport");
        store.insert(Subscription::new("uuid:sub-1", &svc, secs(300), true, Instant::now()));

        drop(svc);
        assert!(store.contains_sid("uuid:sub-1"));
        assert!(store.service_for("uuid:sub-1").is_none());
    }

    #[test]
    fn test_refresh_requires_current_sid() {
        let store = SubscriptionStore::new();
        let svc = service("urn:upnp-org:serviceId:AVTransport");
        let key = svc.info.key();
        let t0 = Instant::now();
        store.insert(Subscription::new("uuid:sub-1", &svc, secs(1800), true, t0));

        let t1 = t0 + secs(1700);
        assert!(!store.refresh(&key, "uuid:stale", secs(1800), t1));
        assert_eq!(store.get_by_sid("uuid:sub-1").unwrap().expires_at, t0 + secs(1800));

        assert!(store.refresh(&key, "uuid:sub-1", secs(1800), t1));
        assert_eq!(store.get_by_sid("uuid:sub-1").unwrap().expires_at, t1 + secs(1800));
    }

    #[test]
    fn test_set_keep_renew_keeps_expiry() {
        let store = SubscriptionStore::new();
        let svc = service("urn:upnp-org:serviceId:AVTransport");
        let now = Instant::now();
        store.insert(Subscription::new("uuid:sub-1", &svc, secs(60), true, now));

        assert!(store.set_keep_renew(&svc.info.key(), false));
        let record = store.get_by_sid("uuid:sub-1").unwrap();
        assert!(!record.keep_renew);
        assert_eq!(record.expires_at, now + secs(60));

        assert!(!store.set_keep_renew("uuid:device::unknown", true));
    }

    #[test]
    fn test_due_for_renewal_and_expiry() {
        let store = SubscriptionStore::new();
        let a = service("urn:upnp-org:serviceId:A");
        let b = service("urn:upnp-org:serviceId:B");
        let c = service("urn:upnp-org:serviceId:C");
        let t0 = Instant::now();
        store.insert(Subscription::new("uuid:a", &a, secs(30), true, t0));
        store.insert(Subscription::new("uuid:b", &b, secs(30), false, t0));
        store.insert(Subscription::new("uuid:c", &c, secs(600), true, t0));

        let due = store.due_for_renewal(t0 + secs(25), secs(10));
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].sid, "uuid:a");

        let mut expired: Vec<String> = store
            .remove_expired(t0 + secs(30))
            .into_iter()
            .map(|s| s.sid)
            .collect();
        expired.sort();
        assert_eq!(expired, vec!["uuid:a", "uuid:b"]);
        assert_eq!(store.len(), 1);
        assert!(store.get_by_service(&a.info.key()).is_none());
    }

    #[test]
    fn test_due_for_renewal_soonest_first() {
        let store = SubscriptionStore::new();
        let a = service("urn:upnp-org:serviceId:A");
        let b = service("urn:upnp-org:serviceId:B");
        let c = service("urn:upnp-org:serviceId:C");
        let t0 = Instant::now();
        store.insert(Subscription::new("uuid:late", &a, secs(20), true, t0));
        store.insert(Subscription::new("uuid:soon", &b, secs(5), true, t0));
        store.insert(Subscription::new("uuid:mid", &c, secs(12), true, t0));

        let sids: Vec<String> = store
            .due_for_renewal(t0, secs(30))
            .into_iter()
            .map(|s| s.sid)
            .collect();
        assert_eq!(sids, vec!["uuid:soon", "uuid:mid", "uuid:late"]);
    }

    #[test]
    fn test_remove_and_drain() {
        let store = SubscriptionStore::new();
        let a = service("urn:upnp-org:serviceId:A");
        let b = service("urn:upnp-org:serviceId:B");
        let now = Instant::now();
        store.insert(Subscription::new("uuid:a", &a, secs(30), true, now));
        store.insert(Subscription::new("uuid:b", &b, secs(30), true, now));

        assert_eq!(store.remove_by_service(&a.info.key()).unwrap().sid, "uuid:a");
        assert!(store.remove_by_service(&a.info.key()).is_none());

        assert_eq!(store.drain().len(), 1);
        assert!(store.is_empty());
        assert!(store.get_by_service(&b.info.key()).is_none());
    }

    #[test]
    fn test_remaining() {
        let svc = service("urn:upnp-org:serviceId:A");
        let now = Instant::now();
        let sub = Subscription::new("uuid:a", &svc, secs(30), true, now);
        assert_eq!(sub.remaining(now + secs(10)), secs(20));
        assert_eq!(sub.remaining(now + secs(40)), Duration::ZERO);
    }
}
