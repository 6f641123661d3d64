//! Bootstrap from configuration.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::info;

use hermes_config::{ConfigLoader, HermesConfig};
use hermes_telemetry::{init_logging, init_metrics, MetricsConfig};

use crate::channel::{ChannelId, ChannelRegistries};
use crate::error::{HermesError, HermesResult};
use crate::processor::MessageProcessor;
use crate::registry::{MicroserviceRegistry, RegistrySettings};

/// A configured dispatch core: channel registries plus the processor that
/// feeds them.
///
/// # Example
///
/// ```
/// use hermes::Hermes;
/// use hermes_config::HermesConfig;
///
/// let hermes = Hermes::new(HermesConfig::default()).unwrap();
/// let registry = hermes.channel(&"default".into());
/// assert_eq!(registry.channel().as_str(), "default");
/// assert_eq!(hermes.processor().available_permits(), 64);
/// ```
#[derive(Debug, Clone)]
pub struct Hermes {
    config: HermesConfig,
    channels: Arc<ChannelRegistries>,
    processor: MessageProcessor,
}

impl Hermes {
    /// Builds the core from a validated configuration.
    pub fn new(config: HermesConfig) -> HermesResult<Self> {
        config.validate()?;
        let settings = RegistrySettings::from_config(&config)?;
        let limiter = Arc::new(Semaphore::new(config.dispatcher.max_in_flight));
        let channels = Arc::new(ChannelRegistries::with_limiter(settings, Arc::clone(&limiter)));
        let processor = MessageProcessor::new(Arc::clone(&channels), limiter);

        Ok(Self {
            config,
            channels,
            processor,
        })
    }

    /// Loads defaults, an optional `hermes.toml` and `HERMES__*`
    /// environment overrides, then builds the core.
    pub fn from_env() -> HermesResult<Self> {
        let config = ConfigLoader::new()
            .with_defaults()
            .with_optional_file("hermes.toml")?
            .with_env_prefix("HERMES")
            .load()?;
        Self::new(config)
    }

    /// Installs the global log subscriber and metrics recorder.
    ///
    /// Call once per process.
    pub fn init_telemetry(&self) -> HermesResult<()> {
        init_logging(&self.config.logging.to_log_config())?;
        init_metrics(&MetricsConfig::default())?;
        info!(
            max_in_flight = self.config.dispatcher.max_in_flight,
            "Hermes telemetry initialized"
        );
        Ok(())
    }

    /// The configuration the core was built from.
    pub fn config(&self) -> &HermesConfig {
        &self.config
    }

    /// The registry for `channel`, created if needed.
    pub fn channel(&self, channel: &ChannelId) -> Arc<MicroserviceRegistry> {
        self.channels.get_or_create(channel)
    }

    /// Tears down `channel`.
    ///
    /// Fails if the channel has no registry.
    pub fn remove_channel(&self, channel: &ChannelId) -> HermesResult<Arc<MicroserviceRegistry>> {
        self.channels
            .remove(channel)
            .ok_or_else(|| HermesError::channel_not_found(channel.clone()))
    }

    /// The channel table.
    pub fn channels(&self) -> &Arc<ChannelRegistries> {
        &self.channels
    }

    /// The processor the transport submits messages to.
    pub fn processor(&self) -> &MessageProcessor {
        &self.processor
    }
}
