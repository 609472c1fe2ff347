//! Registry of external media services (cast targets, companion devices)
//! kept informed of local playback.

use crate::error::{PlaybackError, Result};
use bridge_traits::external::ExternalMediaService;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Change notification delivered to registry listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryChange {
    Registered(String),
    Unregistered(String),
}

type ChangeListener = Arc<dyn Fn(&RegistryChange) + Send + Sync>;

/// Counts reported by [`ExternalServiceRegistry::statistics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStatistics {
    pub registered: usize,
    pub connected: usize,
    pub with_playback_control: usize,
    pub with_seek: usize,
}

#[derive(Default)]
pub struct ExternalServiceRegistry {
    services: RwLock<HashMap<String, Arc<dyn ExternalMediaService>>>,
    listeners: Mutex<Vec<ChangeListener>>,
}

impl ExternalServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `service` under its id, replacing and disconnecting any
    /// service previously registered under the same id.
    pub fn register(&self, service: Arc<dyn ExternalMediaService>) -> Result<()> {
        let id = service.service_id();
        if id.trim().is_empty() {
            return Err(PlaybackError::Config(
                "external service id must not be empty".to_string(),
            ));
        }

        let previous = self
            .services
            .write()
            .insert(id.clone(), Arc::clone(&service));
        if let Some(previous) = previous {
            debug!(service_id = %id, "Replacing external service");
            previous.on_disconnect();
        }
        service.on_connect();
        info!(service_id = %id, "External service registered");
        self.notify(&RegistryChange::Registered(id));
        Ok(())
    }

    pub fn unregister(&self, service_id: &str) -> bool {
        let removed = self.services.write().remove(service_id);
        match removed {
            Some(service) => {
                service.on_disconnect();
                info!(service_id, "External service unregistered");
                self.notify(&RegistryChange::Unregistered(service_id.to_string()));
                true
            }
            None => false,
        }
    }

    pub fn get(&self, service_id: &str) -> Option<Arc<dyn ExternalMediaService>> {
        self.services.read().get(service_id).cloned()
    }

    pub fn has_connected_services(&self) -> bool {
        self.services.read().values().any(|s| s.is_connected())
    }

    pub fn connected_count(&self) -> usize {
        self.services
            .read()
            .values()
            .filter(|s| s.is_connected())
            .count()
    }

    pub fn len(&self) -> usize {
        self.services.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.read().is_empty()
    }

    /// Unregisters every service.
    pub fn clear_all(&self) {
        let drained: Vec<(String, Arc<dyn ExternalMediaService>)> =
            self.services.write().drain().collect();
        for (id, service) in drained {
            service.on_disconnect();
            self.notify(&RegistryChange::Unregistered(id));
        }
    }

    pub fn statistics(&self) -> RegistryStatistics {
        let services = self.services.read();
        services
            .values()
            .fold(RegistryStatistics::default(), |mut stats, service| {
                let capabilities = service.capabilities();
                stats.registered += 1;
                stats.connected += usize::from(service.is_connected());
                stats.with_playback_control += usize::from(capabilities.playback_control);
                stats.with_seek += usize::from(capabilities.seek);
                stats
            })
    }

    pub fn add_listener<F>(&self, listener: F)
    where
        F: Fn(&RegistryChange) + Send + Sync + 'static,
    {
        self.listeners.lock().push(Arc::new(listener));
    }

    fn notify(&self, change: &RegistryChange) {
        let listeners: Vec<ChangeListener> = self.listeners.lock().iter().cloned().collect();
        for listener in listeners {
            listener(change);
        }
    }

    fn connected(&self) -> Vec<Arc<dyn ExternalMediaService>> {
        self.services
            .read()
            .values()
            .filter(|s| s.is_connected())
            .cloned()
            .collect()
    }

    pub fn notify_playback_state(&self, is_playing: bool, position_ms: u64, rate: f32) {
        for service in self.connected() {
            service.on_playback_state_changed(is_playing, position_ms, rate);
        }
    }

    pub fn notify_item_changed(&self, source_id: Option<&str>) {
        for service in self.connected() {
            service.on_item_changed(source_id);
        }
    }

    pub fn notify_seek_completed(&self, position_ms: u64) {
        for service in self.connected() {
            service.on_seek_completed(position_ms);
        }
    }

    pub fn notify_volume_changed(&self, volume: f32) {
        for service in self.connected() {
            service.on_volume_changed(volume);
        }
    }
}

impl fmt::Debug for ExternalServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<String> = self.services.read().keys().cloned().collect();
        ids.sort();
        f.debug_struct("ExternalServiceRegistry")
            .field("services", &ids)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::external::ExternalCapabilities;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct Cast {
        id: &'static str,
        connected: AtomicBool,
        disconnects: AtomicUsize,
        states: Mutex<Vec<(bool, u64)>>,
    }

    impl Cast {
        fn new(id: &'static str, connected: bool) -> Arc<Self> {
            Arc::new(Self {
                id,
                connected: AtomicBool::new(connected),
                disconnects: AtomicUsize::new(0),
                states: Mutex::new(Vec::new()),
            })
        }
    }

    impl ExternalMediaService for Cast {
        fn service_id(&self) -> String {
            self.id.to_string()
        }

        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }

        fn capabilities(&self) -> ExternalCapabilities {
            ExternalCapabilities {
                playback_control: true,
                seek: true,
                ..Default::default()
            }
        }

        fn on_disconnect(&self) {
            self.disconnects.fetch_add(1, Ordering::SeqCst);
        }

        fn on_playback_state_changed(&self, is_playing: bool, position_ms: u64, _rate: f32) {
            self.states.lock().push((is_playing, position_ms));
        }
    }

    #[test]
    fn test_register_replaces_same_id() {
        let registry = ExternalServiceRegistry::new();
        let first = Cast::new("tv", true);
        let second = Cast::new("tv", true);

        registry.register(first.clone()).unwrap();
        registry.register(second.clone()).unwrap();

        assert_eq!(registry.len(), 1);
        assert_eq!(first.disconnects.load(Ordering::SeqCst), 1);
        assert_eq!(second.disconnects.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_empty_id_is_rejected() {
        let registry = ExternalServiceRegistry::new();
        assert!(registry.register(Cast::new(" ", true)).is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_notifications_reach_connected_services_only() {
        let registry = ExternalServiceRegistry::new();
        let online = Cast::new("online", true);
        let offline = Cast::new("offline", false);
        registry.register(online.clone()).unwrap();
        registry.register(offline.clone()).unwrap();

        registry.notify_playback_state(true, 1_500, 1.0);

        assert_eq!(*online.states.lock(), vec![(true, 1_500)]);
        assert!(offline.states.lock().is_empty());
        assert_eq!(registry.connected_count(), 1);

        let stats = registry.statistics();
        assert_eq!(stats.registered, 2);
        assert_eq!(stats.connected, 1);
        assert_eq!(stats.with_seek, 2);
    }

    #[test]
    fn test_listeners_and_clear_all() {
        let registry = ExternalServiceRegistry::new();
        let changes = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&changes);
        registry.add_listener(move |change| sink.lock().push(change.clone()));

        let cast = Cast::new("speaker", true);
        registry.register(cast.clone()).unwrap();
        registry.clear_all();

        assert!(!registry.has_connected_services());
        assert_eq!(cast.disconnects.load(Ordering::SeqCst), 1);
        assert_eq!(
            *changes.lock(),
            vec![
                RegistryChange::Registered("speaker".to_string()),
                RegistryChange::Unregistered("speaker".to_string()),
            ]
        );
        assert!(!registry.unregister("speaker"));
    }
}
