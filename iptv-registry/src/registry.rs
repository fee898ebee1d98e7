//! The subscription registry.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::entry::{normalize_device_id, DeviceEntry, Endpoint, EndpointStatus, Transition};
use crate::error::{RegistryError, RegistryResult};
use crate::event::RegistryEvent;

const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Thread-safe store of server URL → device entries.
///
/// Servers are kept in URL order and devices in insertion order, so every
/// listing is stable between calls. A `(server_url, device_id)` pair appears at
/// most once. Device ids are compared in their
/// [normalized](crate::normalize_device_id) form.
pub struct SubscriptionRegistry {
    /// Single writer lock over the whole map
    servers: Mutex<BTreeMap<String, Vec<DeviceEntry>>>,

    /// Change notifications; sending never blocks and is dropped without receivers
    events: broadcast::Sender<RegistryEvent>,
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionRegistry")
            .field("endpoints", &self.len())
            .finish()
    }
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::with_event_capacity(DEFAULT_EVENT_CAPACITY)
    }

    /// Create a registry whose event channel buffers `capacity` events per
    /// receiver before slow receivers start lagging.
    pub fn with_event_capacity(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        Self {
            servers: Mutex::new(BTreeMap::new()),
            events,
        }
    }

    /// Receive every change applied after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: RegistryEvent) {
        // Err only means nobody is listening.
        let _ = self.events.send(event);
    }

    /// Insert a pair as active with a zero failure count.
    ///
    /// Returns `true` if the pair is new, `false` if it was already present (in
    /// which case nothing changes).
    pub fn upsert(&self, server_url: &str, device_id: &str) -> bool {
        let device_id = normalize_device_id(device_id);
        let device_id = device_id.as_str();
        let mut servers = self.servers.lock();
        let devices = servers.entry(server_url.to_string()).or_default();

        if devices.iter().any(|entry| entry.device_id() == device_id) {
            return false;
        }

        devices.push(DeviceEntry::new(device_id.to_string()));
        debug!(server_url, device_id, "Registered endpoint");
        self.emit(RegistryEvent::Added(Endpoint::new(server_url, device_id)));
        true
    }

    /// Record the outcome of a check.
    ///
    /// A success resets the failure counter and reactivates the entry; a
    /// failure increments the counter and deactivates the entry once it reaches
    /// [`FAILURE_THRESHOLD`](crate::FAILURE_THRESHOLD).
    pub fn mark_result(&self, server_url: &str, device_id: &str, ok: bool) -> RegistryResult<Transition> {
        let device_id = normalize_device_id(device_id);
        let device_id = device_id.as_str();
        let mut servers = self.servers.lock();
        let entry = servers
            .get_mut(server_url)
            .and_then(|devices| devices.iter_mut().find(|entry| entry.device_id() == device_id))
            .ok_or_else(|| RegistryError::EndpointNotFound {
                server_url: server_url.to_string(),
                device_id: device_id.to_string(),
            })?;

        let transition = if ok {
            entry.record_success()
        } else {
            entry.record_failure()
        };

        match transition {
            Transition::Deactivated => {
                let consecutive_failures = entry.consecutive_failures();
                warn!(server_url, device_id, consecutive_failures, "Endpoint deactivated");
                self.emit(RegistryEvent::Deactivated {
                    endpoint: Endpoint::new(server_url, device_id),
                    consecutive_failures,
                });
            }
            Transition::Reactivated => {
                info!(server_url, device_id, "Endpoint reactivated");
                self.emit(RegistryEvent::Reactivated(Endpoint::new(server_url, device_id)));
            }
            Transition::Unchanged => {}
        }

        Ok(transition)
    }

    /// Manually set the state of every entry with this device id.
    ///
    /// The failure counter is left alone. Returns how many entries were set.
    pub fn toggle(&self, device_id: &str, active: bool) -> RegistryResult<usize> {
        let device_id = normalize_device_id(device_id);
        let device_id = device_id.as_str();
        let mut servers = self.servers.lock();
        let mut toggled = 0;

        for (server_url, devices) in servers.iter_mut() {
            for entry in devices.iter_mut().filter(|entry| entry.device_id() == device_id) {
                entry.set_active(active);
                toggled += 1;
                debug!(server_url = %server_url, device_id, active, "Endpoint toggled");
                self.emit(RegistryEvent::Toggled {
                    endpoint: Endpoint::new(server_url.as_str(), device_id),
                    active,
                });
            }
        }

        if toggled == 0 {
            return Err(RegistryError::DeviceNotFound(device_id.to_string()));
        }
        Ok(toggled)
    }

    /// Remove a pair, returning its final state.
    pub fn remove(&self, server_url: &str, device_id: &str) -> RegistryResult<DeviceEntry> {
        let device_id = normalize_device_id(device_id);
        let device_id = device_id.as_str();
        let mut servers = self.servers.lock();
        let not_found = || RegistryError::EndpointNotFound {
            server_url: server_url.to_string(),
            device_id: device_id.to_string(),
        };

        let devices = servers.get_mut(server_url).ok_or_else(not_found)?;
        let index = devices
            .iter()
            .position(|entry| entry.device_id() == device_id)
            .ok_or_else(not_found)?;

        let removed = devices.remove(index);
        if devices.is_empty() {
            servers.remove(server_url);
        }

        debug!(server_url, device_id, "Removed endpoint");
        self.emit(RegistryEvent::Removed(Endpoint::new(server_url, device_id)));
        Ok(removed)
    }

    /// Every active pair, for playback.
    pub fn list_active(&self) -> Vec<Endpoint> {
        let servers = self.servers.lock();
        servers
            .iter()
            .flat_map(|(server_url, devices)| {
                devices
                    .iter()
                    .filter(|entry| entry.is_active())
                    .map(move |entry| Endpoint::new(server_url.as_str(), entry.device_id()))
            })
            .collect()
    }

    /// Every known pair, active or not.
    pub fn endpoints(&self) -> Vec<Endpoint> {
        let servers = self.servers.lock();
        servers
            .iter()
            .flat_map(|(server_url, devices)| {
                devices
                    .iter()
                    .map(move |entry| Endpoint::new(server_url.as_str(), entry.device_id()))
            })
            .collect()
    }

    /// Point-in-time copy of every entry.
    pub fn snapshot(&self) -> Vec<EndpointStatus> {
        let servers = self.servers.lock();
        servers
            .iter()
            .flat_map(|(server_url, devices)| devices.iter().map(move |entry| entry.status(server_url)))
            .collect()
    }

    /// Snapshot rows whose server URL or device id contains `query`, ignoring case.
    pub fn filter(&self, query: &str) -> Vec<EndpointStatus> {
        let query = query.to_lowercase();
        self.snapshot()
            .into_iter()
            .filter(|status| {
                status.server_url.to_lowercase().contains(&query)
                    || status.device_id.to_lowercase().contains(&query)
            })
            .collect()
    }

    pub fn get(&self, server_url: &str, device_id: &str) -> Option<DeviceEntry> {
        let device_id = normalize_device_id(device_id);
        let device_id = device_id.as_str();
        let servers = self.servers.lock();
        servers
            .get(server_url)?
            .iter()
            .find(|entry| entry.device_id() == device_id)
            .cloned()
    }

    pub fn contains(&self, server_url: &str, device_id: &str) -> bool {
        self.get(server_url, device_id).is_some()
    }

    /// Number of pairs.
    pub fn len(&self) -> usize {
        self.servers.lock().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FAILURE_THRESHOLD;
    use proptest::prelude::*;
    use rstest::rstest;
    use std::sync::Arc;

    const SERVER: &str = "http://svc.example/c";
    const DEVICE: &str = "00:1A:79:70:E2:97";

    #[test]
    fn test_upsert_is_idempotent() {
        let registry = SubscriptionRegistry::new();

        assert!(registry.upsert(SERVER, DEVICE));
        assert!(!registry.upsert(SERVER, DEVICE));
        assert_eq!(registry.len(), 1);

        let entry = registry.get(SERVER, DEVICE).unwrap();
        assert!(entry.is_active());
        assert_eq!(entry.consecutive_failures(), 0);
    }

    #[rstest]
    #[case::lower("00:1a:79:70:e2:97")]
    #[case::mixed("00:1a:79:70:E2:97")]
    #[case::padded(" 00:1A:79:70:E2:97 ")]
    fn test_device_id_case_is_ignored(#[case] spelling: &str) {
        let registry = SubscriptionRegistry::new();
        registry.upsert(SERVER, spelling);

        assert!(!registry.upsert(SERVER, DEVICE));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.snapshot()[0].device_id, DEVICE);
        assert!(registry.contains(SERVER, spelling));

        assert_eq!(registry.mark_result(SERVER, spelling, false), Ok(Transition::Unchanged));
        assert_eq!(registry.toggle(spelling, false), Ok(1));
        assert_eq!(registry.get(SERVER, DEVICE).unwrap().consecutive_failures(), 1);

        registry.remove(SERVER, spelling).unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_upsert_does_not_reset_existing_state() {
        let registry = SubscriptionRegistry::new();
        registry.upsert(SERVER, DEVICE);
        registry.mark_result(SERVER, DEVICE, false).unwrap();

        assert!(!registry.upsert(SERVER, DEVICE));
        assert_eq!(registry.get(SERVER, DEVICE).unwrap().consecutive_failures(), 1);
    }

    #[test]
    fn test_same_device_under_two_servers() {
        let registry = SubscriptionRegistry::new();
        assert!(registry.upsert("http://a.example/c", DEVICE));
        assert!(registry.upsert("http://b.example/c", DEVICE));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_mark_result_unknown_endpoint() {
        let registry = SubscriptionRegistry::new();
        let result = registry.mark_result(SERVER, DEVICE, true);
        assert!(matches!(result, Err(RegistryError::EndpointNotFound { .. })));
    }

    #[test]
    fn test_threshold_deactivation_and_recovery() {
        let registry = SubscriptionRegistry::new();
        registry.upsert(SERVER, DEVICE);

        for _ in 0..FAILURE_THRESHOLD - 1 {
            assert_eq!(registry.mark_result(SERVER, DEVICE, false), Ok(Transition::Unchanged));
        }
        assert_eq!(registry.list_active().len(), 1);

        assert_eq!(registry.mark_result(SERVER, DEVICE, false), Ok(Transition::Deactivated));
        assert!(registry.list_active().is_empty());
        assert_eq!(registry.endpoints().len(), 1);

        assert_eq!(registry.mark_result(SERVER, DEVICE, true), Ok(Transition::Reactivated));
        let entry = registry.get(SERVER, DEVICE).unwrap();
        assert!(entry.is_active());
        assert_eq!(entry.consecutive_failures(), 0);
    }

    #[test]
    fn test_toggle_is_orthogonal_to_counter() {
        let registry = SubscriptionRegistry::new();
        registry.upsert(SERVER, DEVICE);
        registry.mark_result(SERVER, DEVICE, false).unwrap();

        assert_eq!(registry.toggle(DEVICE, false), Ok(1));
        let entry = registry.get(SERVER, DEVICE).unwrap();
        assert!(!entry.is_active());
        assert_eq!(entry.consecutive_failures(), 1);

        assert_eq!(registry.toggle(DEVICE, true), Ok(1));
        assert_eq!(registry.get(SERVER, DEVICE).unwrap().consecutive_failures(), 1);
    }

    #[test]
    fn test_toggle_applies_to_every_server() {
        let registry = SubscriptionRegistry::new();
        registry.upsert("http://a.example/c", DEVICE);
        registry.upsert("http://b.example/c", DEVICE);
        registry.upsert("http://b.example/c", "00:1A:79:00:00:01");

        assert_eq!(registry.toggle(DEVICE, false), Ok(2));
        assert_eq!(registry.list_active(), vec![Endpoint::new("http://b.example/c", "00:1A:79:00:00:01")]);
    }

    #[test]
    fn test_toggle_unknown_device() {
        let registry = SubscriptionRegistry::new();
        assert_eq!(
            registry.toggle(DEVICE, true),
            Err(RegistryError::DeviceNotFound(DEVICE.to_string()))
        );
    }

    #[test]
    fn test_remove() {
        let registry = SubscriptionRegistry::new();
        registry.upsert(SERVER, DEVICE);
        registry.upsert(SERVER, "00:1A:79:00:00:01");

        let removed = registry.remove(SERVER, DEVICE).unwrap();
        assert_eq!(removed.device_id(), DEVICE);
        assert_eq!(registry.len(), 1);

        registry.remove(SERVER, "00:1A:79:00:00:01").unwrap();
        assert!(registry.is_empty());

        assert!(matches!(
            registry.remove(SERVER, DEVICE),
            Err(RegistryError::EndpointNotFound { .. })
        ));
    }

    #[test]
    fn test_snapshot_order_is_stable() {
        let registry = SubscriptionRegistry::new();
        registry.upsert("http://b.example/c", "00:00:00:00:00:02");
        registry.upsert("http://a.example/c", "00:00:00:00:00:09");
        registry.upsert("http://b.example/c", "00:00:00:00:00:01");

        let rows: Vec<_> = registry
            .snapshot()
            .into_iter()
            .map(|status| (status.server_url, status.device_id))
            .collect();

        assert_eq!(
            rows,
            vec![
                ("http://a.example/c".to_string(), "00:00:00:00:00:09".to_string()),
                ("http://b.example/c".to_string(), "00:00:00:00:00:02".to_string()),
                ("http://b.example/c".to_string(), "00:00:00:00:00:01".to_string()),
            ]
        );
        assert_eq!(registry.snapshot(), registry.snapshot());
    }

    #[test]
    fn test_filter() {
        let registry = SubscriptionRegistry::new();
        registry.upsert("http://alpha.example/c", "00:1A:79:00:00:01");
        registry.upsert("http://beta.example/c", "00:1A:79:AB:00:02");

        assert_eq!(registry.filter("ALPHA").len(), 1);
        assert_eq!(registry.filter("ab:00").len(), 1);
        assert_eq!(registry.filter("00:1a:79").len(), 2);
        assert!(registry.filter("gamma").is_empty());
    }

    #[tokio::test]
    async fn test_events_are_broadcast() {
        let registry = SubscriptionRegistry::new();
        let mut events = registry.subscribe();

        registry.upsert(SERVER, DEVICE);
        for _ in 0..FAILURE_THRESHOLD {
            registry.mark_result(SERVER, DEVICE, false).unwrap();
        }
        registry.mark_result(SERVER, DEVICE, true).unwrap();
        registry.toggle(DEVICE, false).unwrap();
        registry.remove(SERVER, DEVICE).unwrap();

        let endpoint = Endpoint::new(SERVER, DEVICE);
        assert_eq!(events.recv().await.unwrap(), RegistryEvent::Added(endpoint.clone()));
        assert_eq!(
            events.recv().await.unwrap(),
            RegistryEvent::Deactivated {
                endpoint: endpoint.clone(),
                consecutive_failures: FAILURE_THRESHOLD,
            }
        );
        assert_eq!(events.recv().await.unwrap(), RegistryEvent::Reactivated(endpoint.clone()));
        assert_eq!(
            events.recv().await.unwrap(),
            RegistryEvent::Toggled {
                endpoint: endpoint.clone(),
                active: false,
            }
        );
        assert_eq!(events.recv().await.unwrap(), RegistryEvent::Removed(endpoint));
    }

    #[test]
    fn test_concurrent_upserts_keep_one_entry() {
        let registry = Arc::new(SubscriptionRegistry::new());

        let inserted: usize = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let registry = Arc::clone(&registry);
                    scope.spawn(move || registry.upsert(SERVER, DEVICE))
                })
                .collect();
            handles.into_iter().map(|h| usize::from(h.join().unwrap())).sum()
        });

        assert_eq!(inserted, 1);
        assert_eq!(registry.len(), 1);
    }

    proptest! {
        #[test]
        fn active_iff_threshold_reached_without_success(results in proptest::collection::vec(any::<bool>(), 0..40)) {
            let registry = SubscriptionRegistry::new();
            registry.upsert(SERVER, DEVICE);

            let mut run = 0u32;
            for ok in results {
                registry.mark_result(SERVER, DEVICE, ok).unwrap();
                run = if ok { 0 } else { run + 1 };

                let entry = registry.get(SERVER, DEVICE).unwrap();
                prop_assert_eq!(entry.consecutive_failures(), run);
                prop_assert_eq!(entry.is_active(), run < FAILURE_THRESHOLD);
            }
        }
    }
}
