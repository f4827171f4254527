//! Background threads of the subscription manager
//!
//! The renewal worker wakes on a fixed tick, drops expired subscriptions and
//! renews keep-renew subscriptions that would expire before the next tick.
//! Each renewal of a pass runs on its own scoped thread, so a silent device
//! only delays its own subscription.
//! The dispatcher drains accepted notifications from the callback listener
//! and hands each variable to the [`NotifyEventListener`].
//!
//! Both threads stop when the shutdown sender is dropped.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use callback_server::NotificationPayload;
use crossbeam::channel::{select, tick, Receiver, TryRecvError};
use soap_client::SoapClient;
use tracing::{debug, info, warn};
use upnp_api::operations::events::{RenewOperation, RenewRequest};
use upnp_api::ServiceInfo;

use crate::error::{ManagerError, Result};
use crate::listener::NotifyEventListener;
use crate::store::{Subscription, SubscriptionStore};

/// What one renewal pass did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenewalOutcome {
    pub renewed: usize,
    pub failed: usize,
    pub expired: usize,
}

/// Start the renewal thread.
///
/// Every `interval` it renews what expires within `window`; the window
/// should cover the interval plus the time one renewal may take.
pub(crate) fn spawn_renewal_worker(
    store: Arc<SubscriptionStore>,
    client: SoapClient,
    interval: Duration,
    window: Duration,
    shutdown_rx: Receiver<()>,
) -> Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("upnp-renewal".to_string())
        .spawn(move || {
            info!("renewal worker started, checking every {:?}", interval);
            let ticker = tick(interval);
            loop {
                select! {
                    recv(ticker) -> _ => {
                        let now = Instant::now();
                        let outcome = run_renewal_check(&store, &client, window, now, &shutdown_rx);
                        if outcome != RenewalOutcome::default() {
                            debug!("renewal pass: {:?}", outcome);
                        }
                    }
                    recv(shutdown_rx) -> _ => break,
                }
            }
            info!("renewal worker stopped");
        })
        .map_err(|source| ManagerError::WorkerSpawn {
            name: "renewal",
            source,
        })
}

/// One pass over the store at time `now`.
///
/// Expired records are dropped without contacting the device. Keep-renew
/// records expiring within `window` are renewed concurrently, soonest
/// expiry first, and the pass returns once every renewal has finished. A
/// failure is logged and leaves that record as it was. No new renewal is
/// started once shutdown is requested.
pub fn run_renewal_check(
    store: &SubscriptionStore,
    client: &SoapClient,
    window: Duration,
    now: Instant,
    shutdown_rx: &Receiver<()>,
) -> RenewalOutcome {
    let mut outcome = RenewalOutcome::default();

    for expired in store.remove_expired(now) {
        info!("subscription {} for {} expired", expired.sid, expired.service_key);
        outcome.expired += 1;
    }

    let due = store.due_for_renewal(now, window);
    let results = thread::scope(|scope| {
        let mut pending = Vec::with_capacity(due.len());
        let mut results = Vec::with_capacity(due.len());
        for subscription in due {
            if shutdown_requested(shutdown_rx) {
                debug!("shutdown requested, abandoning renewal pass");
                break;
            }
            let sid = subscription.sid.clone();
            let spawned = thread::Builder::new()
                .name("upnp-renew".to_string())
                .spawn_scoped(scope, move || renew_due(store, client, subscription));
            match spawned {
                Ok(handle) => pending.push(handle),
                Err(e) => {
                    warn!("cannot spawn renewal of {}: {}", sid, e);
                    results.push(RenewalResult::Failed);
                }
            }
        }
        results.extend(
            pending
                .into_iter()
                .map(|handle| handle.join().unwrap_or(RenewalResult::Failed)),
        );
        results
    });

    for result in results {
        match result {
            RenewalResult::Renewed => outcome.renewed += 1,
            RenewalResult::Failed => outcome.failed += 1,
            RenewalResult::Gone => outcome.expired += 1,
        }
    }
    outcome
}

enum RenewalResult {
    Renewed,
    Failed,
    Gone,
}

fn renew_due(
    store: &SubscriptionStore,
    client: &SoapClient,
    subscription: Subscription,
) -> RenewalResult {
    let Some(service) = subscription.service() else {
        debug!("service of {} is gone, dropping it", subscription.sid);
        store.remove_by_service(&subscription.service_key);
        return RenewalResult::Gone;
    };
    let timeout_seconds = duration_to_seconds(subscription.timeout);
    match renew_subscription(store, client, &service.info, &subscription, timeout_seconds) {
        Ok(granted) => {
            debug!("renewed {} for {}s", subscription.sid, granted);
            RenewalResult::Renewed
        }
        Err(e) => {
            warn!(
                "failed to renew {} for {}: {}",
                subscription.sid, subscription.service_key, e
            );
            RenewalResult::Failed
        }
    }
}

/// Send a renewal for `subscription` to `service` and move its expiry on
/// success
pub(crate) fn renew_subscription(
    store: &SubscriptionStore,
    client: &SoapClient,
    service: &ServiceInfo,
    subscription: &Subscription,
    timeout_seconds: u32,
) -> Result<u32> {
    let response = RenewOperation::execute(
        client,
        service,
        &RenewRequest {
            sid: subscription.sid.clone(),
            timeout_seconds,
        },
    )?;
    store.refresh(
        &subscription.service_key,
        &subscription.sid,
        Duration::from_secs(u64::from(response.timeout_seconds)),
        Instant::now(),
    );
    Ok(response.timeout_seconds)
}

pub(crate) fn spawn_dispatcher(
    store: Arc<SubscriptionStore>,
    listener: Arc<dyn NotifyEventListener>,
    events: Receiver<NotificationPayload>,
    shutdown_rx: Receiver<()>,
) -> Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("upnp-dispatch".to_string())
        .spawn(move || {
            loop {
                select! {
                    recv(events) -> payload => match payload {
                        Ok(payload) => {
                            dispatch(&store, listener.as_ref(), &payload);
                        }
                        Err(_) => break,
                    },
                    recv(shutdown_rx) -> _ => break,
                }
            }
            debug!("event dispatcher stopped");
        })
        .map_err(|source| ManagerError::WorkerSpawn {
            name: "dispatcher",
            source,
        })
}

/// Deliver every property of `payload` to `listener`.
///
/// Returns `false` when the subscription is gone or its service dropped.
pub fn dispatch(
    store: &SubscriptionStore,
    listener: &dyn NotifyEventListener,
    payload: &NotificationPayload,
) -> bool {
    let Some(service) = store.service_for(&payload.subscription_id) else {
        debug!(
            "dropping event {} for unknown subscription {}",
            payload.seq, payload.subscription_id
        );
        return false;
    };
    for (variable, value) in &payload.properties {
        listener.on_notify_event(&service, payload.seq, variable, value);
    }
    true
}

fn shutdown_requested(shutdown_rx: &Receiver<()>) -> bool {
    !matches!(shutdown_rx.try_recv(), Err(TryRecvError::Empty))
}

pub(crate) fn duration_to_seconds(duration: Duration) -> u32 {
    u32::try_from(duration.as_secs()).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam::channel::{bounded, unbounded};
    use parking_lot::Mutex;
    use upnp_api::ServiceDescription;

    fn service(base_url: &str) -> Arc<ServiceDescription> {
        named_service("urn:upnp-org:serviceId:RenderingControl", base_url)
    }

    fn named_service(service_id: &str, base_url: &str) -> Arc<ServiceDescription> {
        Arc::new(ServiceDescription::new(ServiceInfo {
            device_udn: "uuid:device".to_string(),
            service_type: "urn:schemas-upnp-org:service:RenderingControl:1".to_string(),
            service_id: service_id.to_string(),
            base_url: Some(base_url.to_string()),
            control_url: "/control".to_string(),
            event_sub_url: "/event".to_string(),
        }))
    }

    fn payload(sid: &str) -> NotificationPayload {
        NotificationPayload {
            subscription_id: sid.to_string(),
            seq: 4,
            properties: vec![
                ("Volume".to_string(), "30".to_string()),
                ("Mute".to_string(), "0".to_string()),
            ],
            event_xml: String::new(),
        }
    }

    #[test]
    fn test_dispatch_calls_listener_per_property() {
        let store = SubscriptionStore::new();
        let svc = service("http://127.0.0.1:1/");
        store.insert(Subscription::new("uuid:sub", &svc, Duration::from_secs(60), true, Instant::now()));

        let seen = Mutex::new(Vec::new());
        let listener = |_: &ServiceDescription, seq: u64, variable: &str, value: &str| {
            seen.lock().push((seq, variable.to_string(), value.to_string()));
        };

        assert!(dispatch(&store, &listener, &payload("uuid:sub")));
        assert_eq!(
            *seen.lock(),
            vec![
                (4, "Volume".to_string(), "30".to_string()),
                (4, "Mute".to_string(), "0".to_string()),
            ]
        );
    }

    #[test]
    fn test_dispatch_unknown_subscription() {
        let store = SubscriptionStore::new();
        let listener = |_: &ServiceDescription, _: u64, _: &str, _: &str| {
            panic!("listener must not be called");
        };
        assert!(!dispatch(&store, &listener, &payload("uuid:missing")));
    }

    #[test]
    fn test_renewal_check_expires_without_network() {
        let store = SubscriptionStore::new();
        // nothing listens on port 1, a network call would fail
        let svc = service("http://127.0.0.1:1/");
        let t0 = Instant::now();
        store.insert(Subscription::new("uuid:sub", &svc, Duration::from_secs(30), true, t0));

        let (_tx, rx) = bounded::<()>(0);
        let outcome = run_renewal_check(
            &store,
            &SoapClient::new(),
            Duration::from_secs(10),
            t0 + Duration::from_secs(31),
            &rx,
        );

        assert_eq!(
            outcome,
            RenewalOutcome {
                renewed: 0,
                failed: 0,
                expired: 1
            }
        );
        assert!(store.is_empty());
    }

    #[test]
    fn test_renewal_failure_leaves_record() {
        let store = SubscriptionStore::new();
        let addr = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap();
        let svc = service(&format!("http://{addr}/"));
        let t0 = Instant::now();
        store.insert(Subscription::new("uuid:sub", &svc, Duration::from_secs(30), true, t0));

        let (_tx, rx) = bounded::<()>(0);
        let outcome = run_renewal_check(
            &store,
            &SoapClient::new(),
            Duration::from_secs(10),
            t0 + Duration::from_secs(25),
            &rx,
        );

        assert_eq!(outcome.failed, 1);
        assert_eq!(store.get_by_sid("uuid:sub").unwrap().expires_at, t0 + Duration::from_secs(30));
    }

    #[test]
    fn test_renewal_skips_non_keep_renew() {
        let store = SubscriptionStore::new();
        let svc = service("http://127.0.0.1:1/");
        let t0 = Instant::now();
        store.insert(Subscription::new("uuid:sub", &svc, Duration::from_secs(30), false, t0));

        let (_tx, rx) = bounded::<()>(0);
        let outcome = run_renewal_check(
            &store,
            &SoapClient::new(),
            Duration::from_secs(10),
            t0 + Duration::from_secs(25),
            &rx,
        );
        assert_eq!(outcome, RenewalOutcome::default());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_renewal_stops_on_shutdown() {
        let store = SubscriptionStore::new();
        let svc = service("http://127.0.0.1:1/");
        let t0 = Instant::now();
        store.insert(Subscription::new("uuid:sub", &svc, Duration::from_secs(30), true, t0));

        let (tx, rx) = unbounded::<()>();
        drop(tx);
        let outcome = run_renewal_check(
            &store,
            &SoapClient::new(),
            Duration::from_secs(10),
            t0 + Duration::from_secs(25),
            &rx,
        );
        assert_eq!(outcome, RenewalOutcome::default());
    }

    #[test]
    fn test_renewal_drops_record_of_dropped_service() {
        let store = SubscriptionStore::new();
        let svc = service("http://127.0.0.1:1/");
        let t0 = Instant::now();
        store.insert(Subscription::new("uuid:sub", &svc, Duration::from_secs(30), true, t0));
        drop(svc);

        let (_tx, rx) = bounded::<()>(0);
        let outcome = run_renewal_check(
            &store,
            &SoapClient::new(),
            Duration::from_secs(10),
            t0 + Duration::from_secs(25),
            &rx,
        );
        assert_eq!(outcome.expired, 1);
        assert!(store.is_empty());
    }

    #[test]
    fn test_silent_devices_do_not_delay_live_renewal() {
        use std::io::{BufRead, BufReader, Write};
        use soap_client::TransportConfig;

        // accepted by the kernel but never answered
        let silent: Vec<std::net::TcpListener> = (0..3)
            .map(|_| std::net::TcpListener::bind("127.0.0.1:0").unwrap())
            .collect();

        let live = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let live_addr = live.local_addr().unwrap();
        let answered = std::thread::spawn(move || {
            let (stream, _) = live.accept().unwrap();
            let arrived = Instant::now();
            let mut reader = BufReader::new(&stream);
            let mut line = String::new();
            while reader.read_line(&mut line).unwrap() > 0 && line != "\r\n" {
                line.clear();
            }
            (&stream)
                .write_all(b"HTTP/1.1 200 OK\r\nSID: uuid:live\r\nTIMEOUT: Second-60\r\nContent-Length: 0\r\n\r\n")
                .unwrap();
            arrived
        });

        let store = SubscriptionStore::new();
        let t0 = Instant::now();
        let mut services = Vec::new();
        for (i, listener) in silent.iter().enumerate() {
            let svc = named_service(
                &format!("urn:upnp-org:serviceId:Silent{i}"),
                &format!("http://{}/", listener.local_addr().unwrap()),
            );
            store.insert(Subscription::new(format!("uuid:silent-{i}"), &svc, Duration::from_millis(500), true, t0));
            services.push(svc);
        }
        let live_svc = named_service("urn:upnp-org:serviceId:Live", &format!("http://{live_addr}/"));
        store.insert(Subscription::new("uuid:live", &live_svc, Duration::from_millis(800), true, t0));

        let client = SoapClient::with_config(TransportConfig {
            connect_timeout: Duration::from_secs(1),
            read_timeout: Duration::from_secs(1),
        });
        let (_tx, rx) = bounded::<()>(0);
        let outcome = run_renewal_check(&store, &client, Duration::from_secs(10), t0, &rx);

        let arrived = answered.join().unwrap();
        assert!(arrived < t0 + Duration::from_millis(800), "renewal reached the device after expiry");
        assert_eq!(
            outcome,
            RenewalOutcome {
                renewed: 1,
                failed: 3,
                expired: 0
            }
        );
        assert!(store.get_by_sid("uuid:live").unwrap().expires_at > t0 + Duration::from_secs(50));
    }

    #[test]
    fn test_duration_to_seconds_saturates() {
        assert_eq!(duration_to_seconds(Duration::from_secs(1800)), 1800);
        assert_eq!(duration_to_seconds(Duration::from_secs(u64::MAX)), u32::MAX);
    }
}
