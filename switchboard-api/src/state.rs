//! Shared application state for Axum routers.

use std::sync::Arc;
use std::time::Instant;

use switchboard_events::{EventHub, EventLog, RingEventLog};
use switchboard_platform::PlatformGateway;
use switchboard_storage::{HoldTimerStore, InMemoryHoldTimerStore};

use crate::auth::AuthConfig;
use crate::config::{AppConfig, PlatformConfig, WebhookConfig};
use crate::error::ApiResult;
use crate::services::{
    ConferenceReconciler, HoldService, IntegrationClient, PresenceService, RecordingService,
    TaskLifecycle, TransferService, WebhookRouter,
};

/// Application-wide state shared across all routes.
///
/// Every service is cheap to clone; they share the platform gateway, the
/// event hub and the hold store.
#[derive(Clone)]
pub struct AppState {
    pub platform: Arc<dyn PlatformGateway>,
    pub events: EventHub,
    pub hold_store: Arc<dyn HoldTimerStore>,

    pub lifecycle: TaskLifecycle,
    pub transfers: TransferService,
    pub holds: HoldService,
    pub recordings: RecordingService,
    pub presence: PresenceService,
    pub router: WebhookRouter,
    pub integrations: IntegrationClient,

    pub auth_config: Arc<AuthConfig>,
    pub platform_config: Arc<PlatformConfig>,
    pub webhook_config: Arc<WebhookConfig>,
    pub start_time: Instant,
}

impl AppState {
    /// Wire the services over in-memory event log and hold store.
    pub fn new(platform: Arc<dyn PlatformGateway>, config: &AppConfig) -> ApiResult<Self> {
        let log: Arc<dyn EventLog> = Arc::new(RingEventLog::new(config.api.event_log_capacity));
        let holds: Arc<dyn HoldTimerStore> = Arc::new(InMemoryHoldTimerStore::new());
        Self::with_stores(platform, log, holds, config)
    }

    /// Wire the services over caller-supplied stores.
    pub fn with_stores(
        platform: Arc<dyn PlatformGateway>,
        event_log: Arc<dyn EventLog>,
        hold_store: Arc<dyn HoldTimerStore>,
        config: &AppConfig,
    ) -> ApiResult<Self> {
        let events = EventHub::new(event_log, config.api.event_channel_capacity);
        let integrations = IntegrationClient::new(config.integrations.clone())?;
        let platform_config = &config.platform;

        let reconciler = ConferenceReconciler::new(platform.clone(), config.reconcile)
            .with_hold_music(platform_config.hold_music_url.clone());

        let lifecycle = TaskLifecycle::new(
            platform.clone(),
            events.clone(),
            hold_store.clone(),
            integrations.clone(),
            platform_config.chat_workflow_sid.clone(),
        );
        let presence = PresenceService::new(platform.clone(), events.clone());
        let transfers = TransferService::new(
            platform.clone(),
            reconciler.clone(),
            events.clone(),
            platform_config.caller_id.clone(),
        );
        let holds = HoldService::new(
            platform.clone(),
            reconciler,
            hold_store.clone(),
            events.clone(),
            platform_config.hold_music_url.clone(),
        );
        let recordings = RecordingService::new(platform.clone());
        let router = WebhookRouter::new(
            platform.clone(),
            lifecycle.clone(),
            presence.clone(),
            hold_store.clone(),
            events.clone(),
            config.webhook.max_message_length,
        )
        .with_assignment(
            platform_config.caller_id.clone(),
            platform_config.post_work_activity_sid.clone(),
        );

        Ok(Self {
            platform,
            events,
            hold_store,
            lifecycle,
            transfers,
            holds,
            recordings,
            presence,
            router,
            integrations,
            auth_config: Arc::new(config.auth.clone()),
            platform_config: Arc::new(config.platform.clone()),
            webhook_config: Arc::new(config.webhook.clone()),
            start_time: Instant::now(),
        })
    }
}

// Use macro to reduce boilerplate for FromRef implementations
crate::impl_from_ref!(Arc<dyn PlatformGateway>, platform);
crate::impl_from_ref!(EventHub, events);
crate::impl_from_ref!(TaskLifecycle, lifecycle);
crate::impl_from_ref!(TransferService, transfers);
crate::impl_from_ref!(HoldService, holds);
crate::impl_from_ref!(RecordingService, recordings);
crate::impl_from_ref!(PresenceService, presence);
crate::impl_from_ref!(WebhookRouter, router);
crate::impl_from_ref!(IntegrationClient, integrations);
crate::impl_from_ref!(Arc<AuthConfig>, auth_config);
crate::impl_from_ref!(Arc<PlatformConfig>, platform_config);
crate::impl_from_ref!(Instant, start_time);
