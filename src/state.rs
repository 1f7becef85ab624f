use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::engine::ranking::{NearestNeighborRanker, ProximityRanker};
use crate::models::move_request::UrgencyWindows;
use crate::notify::audit::{AuditSink, StoreAuditSink};
use crate::notify::push::{LogPushNotifier, PushNotifier};
use crate::notify::realtime::RealtimeHub;
use crate::observability::metrics::Metrics;
use crate::store::Store;

#[derive(Debug, Clone, Copy)]
pub struct EngineSettings {
    /// Upper bound on one proximity-ranking call made while a transaction
    /// holds the store.
    pub ranking_timeout: Duration,
    pub urgency: UrgencyWindows,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            ranking_timeout: Duration::from_millis(2000),
            urgency: UrgencyWindows::default(),
        }
    }
}

impl From<&Config> for EngineSettings {
    fn from(config: &Config) -> Self {
        Self {
            ranking_timeout: Duration::from_millis(config.ranking_timeout_ms),
            urgency: UrgencyWindows {
                urgent: chrono::Duration::hours(config.urgent_window_hours),
                soon: chrono::Duration::hours(config.soon_window_hours),
            },
        }
    }
}

pub struct AppState {
    pub store: Store,
    pub ranker: Arc<dyn ProximityRanker>,
    pub hub: RealtimeHub,
    pub push: Arc<dyn PushNotifier>,
    pub audit: Arc<dyn AuditSink>,
    pub metrics: Metrics,
    pub settings: EngineSettings,
}

impl AppState {
    pub fn new(event_buffer_size: usize, settings: EngineSettings) -> Self {
        let store = Store::new();

        Self {
            audit: Arc::new(StoreAuditSink::new(store.clone())),
            store,
            ranker: Arc::new(NearestNeighborRanker),
            hub: RealtimeHub::new(event_buffer_size),
            push: Arc::new(LogPushNotifier),
            metrics: Metrics::new(),
            settings,
        }
    }

    pub fn with_ranker(mut self, ranker: Arc<dyn ProximityRanker>) -> Self {
        self.ranker = ranker;
        self
    }

    pub fn with_push_notifier(mut self, push: Arc<dyn PushNotifier>) -> Self {
        self.push = push;
        self
    }

    pub fn with_audit_sink(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }
}
