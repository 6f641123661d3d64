//! Channels and the registry-per-channel table.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Semaphore;
use tracing::info;

use crate::registry::{MicroserviceRegistry, RegistrySettings};

/// A logical transport listener, such as one port.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelId(Arc<str>);

impl ChannelId {
    /// Create a channel ID.
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    /// The channel name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChannelId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ChannelId {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

/// One [`MicroserviceRegistry`] per channel.
///
/// Registries are created on first use and dropped when their channel is
/// removed. Dispatchers already holding a registry keep it until they
/// finish.
#[derive(Debug)]
pub struct ChannelRegistries {
    registries: DashMap<ChannelId, Arc<MicroserviceRegistry>>,
    settings: RegistrySettings,
    limiter: Option<Arc<Semaphore>>,
}

impl ChannelRegistries {
    /// Creates an empty table.
    pub fn new(settings: RegistrySettings) -> Self {
        Self {
            registries: DashMap::new(),
            settings,
            limiter: None,
        }
    }

    /// Creates an empty table whose registries share `limiter` for
    /// WebSocket callbacks.
    pub fn with_limiter(settings: RegistrySettings, limiter: Arc<Semaphore>) -> Self {
        Self {
            registries: DashMap::new(),
            settings,
            limiter: Some(limiter),
        }
    }

    /// Returns the registry for `channel`, creating it if needed.
    pub fn get_or_create(&self, channel: &ChannelId) -> Arc<MicroserviceRegistry> {
        if let Some(registry) = self.registries.get(channel) {
            return Arc::clone(&registry);
        }

        let registry = self
            .registries
            .entry(channel.clone())
            .or_insert_with(|| {
                info!(channel = %channel, "Channel registry created");
                Arc::new(match &self.limiter {
                    Some(limiter) => MicroserviceRegistry::with_limiter(
                        channel.clone(),
                        &self.settings,
                        Arc::clone(limiter),
                    ),
                    None => MicroserviceRegistry::new(channel.clone(), &self.settings),
                })
            });
        Arc::clone(&registry)
    }

    /// Returns the registry for `channel`, if it exists.
    pub fn get(&self, channel: &ChannelId) -> Option<Arc<MicroserviceRegistry>> {
        self.registries.get(channel).map(|r| Arc::clone(&r))
    }

    /// Tears down a channel.
    ///
    /// Open WebSocket sessions are forgotten when the settings ask for it;
    /// otherwise they run until they close.
    pub fn remove(&self, channel: &ChannelId) -> Option<Arc<MicroserviceRegistry>> {
        let (_, registry) = self.registries.remove(channel)?;
        let disconnected = if self.settings.disconnect_on_remove {
            registry.ws().disconnect_all()
        } else {
            0
        };
        info!(channel = %channel, disconnected, "Channel registry removed");
        Some(registry)
    }

    /// The channels that currently have a registry.
    pub fn channels(&self) -> Vec<ChannelId> {
        self.registries.iter().map(|e| e.key().clone()).collect()
    }

    /// Number of channels.
    pub fn len(&self) -> usize {
        self.registries.len()
    }

    /// Returns true if no channel has a registry.
    pub fn is_empty(&self) -> bool {
        self.registries.is_empty()
    }

    /// The settings new registries are created with.
    pub fn settings(&self) -> &RegistrySettings {
        &self.settings
    }
}

impl Default for ChannelRegistries {
    fn default() -> Self {
        Self::new(RegistrySettings::default())
    }
}
