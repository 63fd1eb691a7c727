//! DriverBuilder - ReconciliationDriver の構築とワイヤリング
//!
//! # 設計
//! - 必須: EventStore, DeliveryProvider
//! - 省略時の既定: SystemClock, DefaultSelector, PlainResendComposer
//! - build() 時に検証（Fail-fast）

use std::sync::Arc;

use super::driver::{PassSettings, ReconciliationDriver};
use super::executor::ResendExecutor;
use super::poller::ActivityPoller;
use super::selector::{DefaultSelector, RetrySelector};
use crate::config::Config;
use crate::impls::{BounceReasonComposer, PlainResendComposer};
use crate::ports::{Clock, DeliveryProvider, EventStore, MessageComposer, SystemClock};

/// DriverBuilder は ReconciliationDriver を構築
///
/// # 使用例
/// ```ignore
/// let driver = DriverBuilder::from_config(&config)
///     .store(Arc::new(store))
///     .provider(Arc::new(client))
///     .build()?;
/// ```
pub struct DriverBuilder {
    store: Option<Arc<dyn EventStore>>,
    provider: Option<Arc<dyn DeliveryProvider>>,
    composer: Option<Arc<dyn MessageComposer>>,
    clock: Option<Arc<dyn Clock>>,
    selector: Option<Arc<dyn RetrySelector>>,
    settings: PassSettings,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Missing collaborators: {0:?}. These must be set before build().")]
    MissingCollaborators(Vec<&'static str>),

    #[error("max_attempts must be at least 1")]
    InvalidPolicy,

    #[error("pass deadline must be non-zero")]
    InvalidDeadline,
}

impl DriverBuilder {
    pub fn new() -> Self {
        Self {
            store: None,
            provider: None,
            composer: None,
            clock: None,
            selector: None,
            settings: PassSettings::default(),
        }
    }

    /// `config` から設定と composer を決める
    pub fn from_config(config: &Config) -> Self {
        let composer: Arc<dyn MessageComposer> = if config.enrich {
            Arc::new(BounceReasonComposer::new(config.notify_target.clone()))
        } else {
            Arc::new(PlainResendComposer::new(config.notify_target.clone()))
        };
        Self::new()
            .settings(PassSettings::from_config(config))
            .composer(composer)
    }

    pub fn store(mut self, store: Arc<dyn EventStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn provider(mut self, provider: Arc<dyn DeliveryProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn composer(mut self, composer: Arc<dyn MessageComposer>) -> Self {
        self.composer = Some(composer);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn selector(mut self, selector: Arc<dyn RetrySelector>) -> Self {
        self.selector = Some(selector);
        self
    }

    pub fn settings(mut self, settings: PassSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.settings.dry_run = dry_run;
        self
    }

    /// # 検証
    /// - store / provider が設定されているか
    /// - max_attempts >= 1, pass deadline > 0
    pub fn build(self) -> Result<ReconciliationDriver, BuildError> {
        let mut missing = Vec::new();
        if self.store.is_none() {
            missing.push("store");
        }
        if self.provider.is_none() {
            missing.push("provider");
        }
        let (Some(store), Some(provider)) = (self.store, self.provider) else {
            return Err(BuildError::MissingCollaborators(missing));
        };
        if self.settings.policy.max_attempts == 0 {
            return Err(BuildError::InvalidPolicy);
        }
        if self.settings.pass_deadline.is_zero() {
            return Err(BuildError::InvalidDeadline);
        }

        let composer = self
            .composer
            .unwrap_or_else(|| Arc::new(PlainResendComposer::default()));
        Ok(ReconciliationDriver {
            store,
            poller: ActivityPoller::new(provider.clone()),
            selector: self.selector.unwrap_or_else(|| Arc::new(DefaultSelector)),
            executor: ResendExecutor::new(provider, composer),
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            settings: self.settings,
        })
    }
}

impl Default for DriverBuilder {
    fn default() -> Self {
        Self::new()
    }
}
