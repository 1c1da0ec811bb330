//! Recording Service
//!
//! Every command acts on the call's latest recording: in-progress first,
//! then paused, then the most recent of any status.

use std::sync::Arc;

use switchboard_core::{
    select_latest_recording, DeskError, DeskResult, Recording, RecordingAction,
};
use switchboard_platform::PlatformGateway;

use crate::types::{RecordingResponse, RecordingStatusResponse};

/// Status reported for a call with no recording resource.
pub const RECORDING_INACTIVE: &str = "inactive";

fn require_call_sid(call_sid: &str) -> DeskResult<&str> {
    let call_sid = call_sid.trim();
    if call_sid.is_empty() {
        Err(DeskError::validation("callSid", "is required"))
    } else {
        Ok(call_sid)
    }
}

#[derive(Clone)]
pub struct RecordingService {
    platform: Arc<dyn PlatformGateway>,
}

impl RecordingService {
    pub fn new(platform: Arc<dyn PlatformGateway>) -> Self {
        Self { platform }
    }

    async fn latest(&self, call_sid: &str) -> DeskResult<Option<Recording>> {
        let recordings = self.platform.list_recordings(call_sid).await?;
        Ok(select_latest_recording(&recordings).cloned())
    }

    /// Start recording unless an in-progress or paused recording exists,
    /// in which case that one is returned with `created: false`.
    pub async fn start(&self, call_sid: &str) -> DeskResult<RecordingResponse> {
        let call_sid = require_call_sid(call_sid)?;

        if let Some(active) = self.latest(call_sid).await?.filter(|r| r.status.is_active()) {
            tracing::debug!(call_sid, recording_sid = %active.sid, "Recording already active");
            return Ok(RecordingResponse {
                ok: true,
                recording_sid: active.sid,
                status: active.status.as_str().to_string(),
                created: Some(false),
            });
        }

        let recording = self.platform.start_recording(call_sid).await?;
        tracing::info!(call_sid, recording_sid = %recording.sid, "Recording started");
        Ok(RecordingResponse {
            ok: true,
            recording_sid: recording.sid,
            status: recording.status.as_str().to_string(),
            created: Some(true),
        })
    }

    /// Pause, resume or stop the latest recording.
    ///
    /// # Errors
    /// `RecordingNotFound` when the call has no recording at all.
    pub async fn apply(&self, call_sid: &str, action: RecordingAction) -> DeskResult<RecordingResponse> {
        let call_sid = require_call_sid(call_sid)?;

        let recording = self
            .latest(call_sid)
            .await?
            .ok_or_else(|| DeskError::RecordingNotFound {
                call_sid: call_sid.to_string(),
            })?;

        let updated = self
            .platform
            .update_recording(call_sid, &recording.sid, action.target_status())
            .await?;
        tracing::info!(
            call_sid,
            recording_sid = %updated.sid,
            action = action.as_str(),
            "Recording updated"
        );

        Ok(RecordingResponse {
            ok: true,
            recording_sid: updated.sid,
            status: updated.status.as_str().to_string(),
            created: None,
        })
    }

    /// `inactive` with no recording, otherwise the platform's own status.
    pub async fn status(&self, call_sid: &str) -> DeskResult<RecordingStatusResponse> {
        let call_sid = require_call_sid(call_sid)?;

        Ok(match self.latest(call_sid).await? {
            Some(recording) => RecordingStatusResponse {
                status: recording.status.as_str().to_string(),
                recording_sid: Some(recording.sid),
            },
            None => RecordingStatusResponse {
                status: RECORDING_INACTIVE.to_string(),
                recording_sid: None,
            },
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use switchboard_core::RecordingStatus;
    use switchboard_platform::InMemoryPlatform;

    fn service() -> (Arc<InMemoryPlatform>, RecordingService) {
        let platform = Arc::new(InMemoryPlatform::new());
        (platform.clone(), RecordingService::new(platform))
    }

    #[tokio::test]
    async fn test_commands_without_recording_are_not_found() {
        let (_, service) = service();
        for action in [RecordingAction::Pause, RecordingAction::Resume, RecordingAction::Stop] {
            let err = service.apply("CA1", action).await.err();
            assert_eq!(
                err,
                Some(DeskError::RecordingNotFound {
                    call_sid: "CA1".to_string()
                })
            );
        }
    }

    #[tokio::test]
    async fn test_start_does_not_duplicate_active_recording() -> DeskResult<()> {
        let (platform, service) = service();

        let first = service.start("CA1").await?;
        assert_eq!(first.created, Some(true));
        let second = service.start("CA1").await?;
        assert_eq!(second.created, Some(false));
        assert_eq!(second.recording_sid, first.recording_sid);
        assert_eq!(platform.recording_starts().await, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_paused_recording_counts_as_active() -> DeskResult<()> {
        let (platform, service) = service();
        let started = service.start("CA1").await?;
        let paused = service.apply("CA1", RecordingAction::Pause).await?;
        assert_eq!(paused.status, RecordingStatus::PAUSED);

        let again = service.start("CA1").await?;
        assert_eq!(again.recording_sid, started.recording_sid);
        assert_eq!(platform.recording_starts().await, 1);

        let resumed = service.apply("CA1", RecordingAction::Resume).await?;
        assert_eq!(resumed.status, RecordingStatus::IN_PROGRESS);
        Ok(())
    }

    #[tokio::test]
    async fn test_status_passes_platform_value_through() -> DeskResult<()> {
        let (platform, service) = service();
        assert_eq!(service.status("CA1").await?.status, RECORDING_INACTIVE);

        platform
            .add_recording(Recording {
                sid: "RE1".to_string(),
                call_sid: "CA1".to_string(),
                status: RecordingStatus::new("absent"),
                date_created: None,
            })
            .await;
        let status = service.status("CA1").await?;
        assert_eq!(status.status, "absent");
        assert_eq!(status.recording_sid.as_deref(), Some("RE1"));
        Ok(())
    }

    #[tokio::test]
    async fn test_stop_then_start_creates_new_recording() -> DeskResult<()> {
        let (platform, service) = service();
        let first = service.start("CA1").await?;
        service.apply("CA1", RecordingAction::Stop).await?;

        let second = service.start("CA1").await?;
        assert_ne!(second.recording_sid, first.recording_sid);
        assert_eq!(platform.recording_starts().await, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_call_sid_is_rejected() {
        let (_, service) = service();
        assert!(matches!(
            service.status("  ").await,
            Err(DeskError::Validation { .. })
        ));
    }
}
