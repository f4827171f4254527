//! GENA subscription manager
//!
//! Owns the subscription store, the callback listener that receives
//! `NOTIFY` requests, the renewal worker and the event dispatcher. All
//! methods are blocking and safe to call from any thread.

use std::net::IpAddr;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use callback_server::{local_ip_for, CallbackServer, EventRouter, NotificationPayload};
use crossbeam::channel::{bounded, unbounded, Receiver, Sender};
use parking_lot::Mutex;
use soap_client::SoapClient;
use tracing::{debug, info, warn};
use upnp_api::operations::events::{
    SubscribeOperation, SubscribeRequest, UnsubscribeOperation, UnsubscribeRequest,
};
use upnp_api::{ServiceDescription, ServiceInfo};

use crate::config::ManagerConfig;
use crate::error::{ManagerError, Result};
use crate::listener::NotifyEventListener;
use crate::store::{Subscription, SubscriptionStore};
use crate::worker::{renew_subscription, spawn_dispatcher, spawn_renewal_worker};

struct Workers {
    // dropping the sender stops both threads
    shutdown_tx: Sender<()>,
    renewal: JoinHandle<()>,
    dispatcher: JoinHandle<()>,
}

/// Registers, renews and cancels event subscriptions and delivers their
/// notifications.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use upnp_api::{ServiceDescription, ServiceInfo};
/// use upnp_event_manager::{ManagerConfig, SubscribeManager};
///
/// let manager = SubscribeManager::new(
///     ManagerConfig::default(),
///     |service: &ServiceDescription, seq: u64, variable: &str, value: &str| {
///         println!("{} #{} {} = {}", service.info.service_id, seq, variable, value);
///     },
/// );
/// manager.start()?;
///
/// let service = Arc::new(ServiceDescription::new(ServiceInfo {
///     device_udn: "uuid:renderer".to_string(),
///     service_type: "urn:schemas-upnp-org:service:RenderingControl:1".to_string(),
///     service_id: "urn:upnp-org:serviceId:RenderingControl".to_string(),
///     base_url: Some("http://192.168.1.100:1400/".to_string()),
///     control_url: "/MediaRenderer/RenderingControl/Control".to_string(),
///     event_sub_url: "/MediaRenderer/RenderingControl/Event".to_string(),
/// }));
/// manager.register(&service, 1800, true)?;
///
/// // ... events arrive on the dispatcher thread ...
///
/// manager.terminate();
/// # Ok::<(), upnp_event_manager::ManagerError>(())
/// ```
pub struct SubscribeManager {
    config: ManagerConfig,
    client: SoapClient,
    store: Arc<SubscriptionStore>,
    listener: Arc<dyn NotifyEventListener>,
    event_tx: Sender<NotificationPayload>,
    event_rx: Receiver<NotificationPayload>,
    server: Mutex<Option<CallbackServer>>,
    workers: Mutex<Option<Workers>>,
}

impl SubscribeManager {
    pub fn new(config: ManagerConfig, listener: impl NotifyEventListener + 'static) -> Self {
        let client = SoapClient::with_config(config.transport)
            .with_default_timeout(config.default_timeout_seconds);
        let (event_tx, event_rx) = unbounded();

        Self {
            config,
            client,
            store: Arc::new(SubscriptionStore::new()),
            listener: Arc::new(listener),
            event_tx,
            event_rx,
            server: Mutex::new(None),
            workers: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Read access to the subscription table
    pub fn store(&self) -> &SubscriptionStore {
        &self.store
    }

    /// Start the renewal worker and the event dispatcher.
    ///
    /// Does nothing when they are already running.
    pub fn initialize(&self) -> Result<()> {
        let mut workers = self.workers.lock();
        if workers.is_some() {
            return Ok(());
        }

        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);
        let renewal = spawn_renewal_worker(
            Arc::clone(&self.store),
            self.client.clone(),
            self.config.renewal_check_interval,
            self.config.renewal_window(),
            shutdown_rx.clone(),
        )?;
        let dispatcher = match spawn_dispatcher(
            Arc::clone(&self.store),
            Arc::clone(&self.listener),
            self.event_rx.clone(),
            shutdown_rx,
        ) {
            Ok(handle) => handle,
            Err(e) => {
                drop(shutdown_tx);
                let _ = renewal.join();
                return Err(e);
            }
        };

        *workers = Some(Workers {
            shutdown_tx,
            renewal,
            dispatcher,
        });
        Ok(())
    }

    /// Bind the callback listener, initializing the workers first if needed
    pub fn start(&self) -> Result<()> {
        self.initialize()?;

        let mut server = self.server.lock();
        if server.is_some() {
            return Ok(());
        }

        let store = Arc::clone(&self.store);
        let router = EventRouter::new(self.event_tx.clone(), move |sid| store.contains_sid(sid));
        let bound = CallbackServer::bind(
            self.config.callback_port_range,
            self.config.listener_read_timeout,
            router,
        )?;
        info!("subscription manager listening on port {}", bound.port());
        *server = Some(bound);
        Ok(())
    }

    /// Stop the listener and the workers; subscriptions stay in the store.
    ///
    /// Returns once the threads have exited, which may take as long as an
    /// in-flight renewal request.
    pub fn stop(&self) {
        let server = self.server.lock().take();
        if let Some(mut server) = server {
            server.shutdown();
        }
        let workers = self.workers.lock().take();
        if let Some(workers) = workers {
            drop(workers.shutdown_tx);
            let _ = workers.renewal.join();
            let _ = workers.dispatcher.join();
            info!("subscription manager stopped");
        }
    }

    /// Stop, then cancel every subscription on its device and clear the
    /// store. Cancellation failures are logged and ignored.
    pub fn terminate(&self) {
        self.stop();
        for subscription in self.store.drain() {
            let Some(service) = subscription.service() else {
                debug!("service of {} is gone, not unsubscribing", subscription.sid);
                continue;
            };
            if let Err(e) = self.send_unsubscribe(&service.info, &subscription.sid) {
                warn!(
                    "failed to unsubscribe {} for {}: {}",
                    subscription.sid, subscription.service_key, e
                );
            }
        }
    }

    /// Port of the callback listener, 0 when not started
    pub fn get_event_port(&self) -> u16 {
        self.server.lock().as_ref().map_or(0, CallbackServer::port)
    }

    pub fn is_running(&self) -> bool {
        self.server.lock().as_ref().is_some_and(CallbackServer::is_running)
    }

    /// Subscribe to `service`'s events and store the subscription.
    ///
    /// Any earlier subscription held for the service is replaced and
    /// cancelled on the device, best effort. The stored expiry uses the
    /// timeout granted by the device. On failure the store is left
    /// unchanged. Returns the new subscription ID.
    pub fn register(
        &self,
        service: &Arc<ServiceDescription>,
        timeout_seconds: u32,
        keep_renew: bool,
    ) -> Result<String> {
        let callback_url = self.callback_url(&service.info)?;
        let response = SubscribeOperation::execute(
            &self.client,
            &service.info,
            &SubscribeRequest {
                callback_url,
                timeout_seconds,
            },
        )?;
        info!(
            "subscribed to {} as {} for {}s",
            service.info.service_id, response.sid, response.timeout_seconds
        );

        let subscription = Subscription::new(
            response.sid.clone(),
            service,
            Duration::from_secs(u64::from(response.timeout_seconds)),
            keep_renew,
            Instant::now(),
        );
        if let Some(replaced) = self.store.insert(subscription) {
            debug!("replaced subscription {} for {}", replaced.sid, replaced.service_key);
            if replaced.sid != response.sid {
                if let Err(e) = self.send_unsubscribe(&service.info, &replaced.sid) {
                    warn!("failed to cancel replaced subscription {}: {}", replaced.sid, e);
                }
            }
        }
        Ok(response.sid)
    }

    /// Renew the subscription held for `service`, returning the granted
    /// timeout. On failure the record keeps its previous expiry.
    pub fn renew(&self, service: &ServiceDescription, timeout_seconds: u32) -> Result<u32> {
        let key = service.info.key();
        let subscription = self
            .store
            .get_by_service(&key)
            .ok_or(ManagerError::NotSubscribed(key))?;
        renew_subscription(&self.store, &self.client, &service.info, &subscription, timeout_seconds)
    }

    /// Change whether the renewal worker keeps `service` subscribed.
    ///
    /// Returns `false` when the service holds no subscription.
    pub fn set_keep_renew(&self, service: &ServiceDescription, keep_renew: bool) -> bool {
        self.store.set_keep_renew(&service.info.key(), keep_renew)
    }

    /// Cancel the subscription held for `service`.
    ///
    /// The record is removed before the device is contacted, so it is gone
    /// even when the returned error reports a failed `UNSUBSCRIBE`.
    pub fn unregister(&self, service: &ServiceDescription) -> Result<()> {
        let Some(subscription) = self.store.remove_by_service(&service.info.key()) else {
            return Ok(());
        };
        self.send_unsubscribe(&service.info, &subscription.sid)?;
        info!("unsubscribed {} from {}", subscription.sid, service.info.service_id);
        Ok(())
    }

    /// The service owning `subscription_id`, if known and still alive
    pub fn get_subscribe_service(&self, subscription_id: &str) -> Option<Arc<ServiceDescription>> {
        self.store.service_for(subscription_id)
    }

    /// The subscription ID currently held for `service`
    pub fn subscription_id(&self, service: &ServiceDescription) -> Option<String> {
        self.store
            .get_by_service(&service.info.key())
            .map(|s| s.sid)
    }

    fn send_unsubscribe(&self, service: &ServiceInfo, sid: &str) -> Result<()> {
        UnsubscribeOperation::execute(
            &self.client,
            service,
            &UnsubscribeRequest {
                sid: sid.to_string(),
            },
        )?;
        Ok(())
    }

    /// `http://host:port/` of the listener as reachable from `service`'s device
    fn callback_url(&self, service: &ServiceInfo) -> Result<String> {
        let host = match self.config.callback_host {
            Some(host) => host,
            None => route_to(service)?,
        };
        self.server
            .lock()
            .as_ref()
            .map(|server| server.callback_url(host))
            .ok_or(ManagerError::NotStarted)
    }
}

impl Drop for SubscribeManager {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Local address of the interface that routes to the device hosting `service`
fn route_to(service: &ServiceInfo) -> Result<IpAddr> {
    let event_url = service.resolved_event_sub_url()?;
    let no_route = || ManagerError::NoCallbackAddress(event_url.to_string());
    event_url
        .socket_addrs(|| Some(80))
        .map_err(|_| no_route())?
        .into_iter()
        .find_map(|addr| local_ip_for(addr.ip()))
        .ok_or_else(no_route)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet_listener() -> impl NotifyEventListener {
        |_: &ServiceDescription, _: u64, _: &str, _: &str| {}
    }

    fn service() -> Arc<ServiceDescription> {
        Arc::new(ServiceDescription::new(ServiceInfo {
            device_udn: "uuid:device".to_string(),
            service_type: "urn:schemas-upnp-org:service:AVTransport:1".to_string(),
            service_id: "urn:upnp-org:serviceId:AVTransport".to_string(),
            base_url: Some("http://127.0.0.1:1400/".to_string()),
            control_url: "/control".to_string(),
            event_sub_url: "/event".to_string(),
        }))
    }

    fn config() -> ManagerConfig {
        ManagerConfig::default()
            .with_callback_port_range(0, 0)
            .with_renewal_check_interval(Duration::from_millis(50))
    }

    #[test]
    fn test_event_port_follows_lifecycle() {
        let manager = SubscribeManager::new(config(), quiet_listener());
        assert_eq!(manager.get_event_port(), 0);

        manager.start().unwrap();
        assert_ne!(manager.get_event_port(), 0);
        assert!(manager.is_running());

        manager.stop();
        assert_eq!(manager.get_event_port(), 0);
        assert!(!manager.is_running());
    }

    #[test]
    fn test_start_is_idempotent() {
        let manager = SubscribeManager::new(config(), quiet_listener());
        manager.start().unwrap();
        let port = manager.get_event_port();
        manager.start().unwrap();
        assert_eq!(manager.get_event_port(), port);
    }

    #[test]
    fn test_register_requires_listener() {
        let manager = SubscribeManager::new(
            config().with_callback_host(IpAddr::from([127, 0, 0, 1])),
            quiet_listener(),
        );
        manager.initialize().unwrap();

        let err = manager.register(&service(), 300, true).unwrap_err();
        assert!(matches!(err, ManagerError::NotStarted));
        assert!(manager.store().is_empty());
    }

    #[test]
    fn test_stop_keeps_records() {
        let manager = SubscribeManager::new(config(), quiet_listener());
        let svc = service();
        manager.store().insert(Subscription::new(
            "uuid:sub",
            &svc,
            Duration::from_secs(1800),
            true,
            Instant::now(),
        ));

        manager.start().unwrap();
        manager.stop();
        assert_eq!(manager.subscription_id(&svc).as_deref(), Some("uuid:sub"));
        assert!(Arc::ptr_eq(&manager.get_subscribe_service("uuid:sub").unwrap(), &svc));
    }

    #[test]
    fn test_renew_unknown_service() {
        let manager = SubscribeManager::new(config(), quiet_listener());
        let err = manager.renew(&service(), 300).unwrap_err();
        assert!(matches!(err, ManagerError::NotSubscribed(_)));
    }

    #[test]
    fn test_unregister_unknown_service_is_noop() {
        let manager = SubscribeManager::new(config(), quiet_listener());
        assert!(manager.unregister(&service()).is_ok());
        assert!(!manager.set_keep_renew(&service(), false));
    }

    #[test]
    fn test_route_to_loopback_device() {
        let ip = route_to(&service().info).unwrap();
        assert_eq!(ip, IpAddr::from([127, 0, 0, 1]));
    }
}
