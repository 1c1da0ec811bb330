//! REST implementation of [`PlatformGateway`].

mod wire;

pub use wire::parse_timestamp;

use crate::gateway::{ClaimOutcome, CreateCall, NewTask, PlatformGateway, TaskUpdate};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::time::Duration;
use switchboard_core::{
    Activity, Call, Conference, ConferenceStatus, Conversation, ConversationAttributes,
    DeskError, DeskResult, Participant, Recording, Reservation, Task, Worker,
};
use tracing::{debug, warn};
use wire::*;

pub const DEFAULT_API_BASE_URL: &str = "https://api.twilio.com";
pub const DEFAULT_TASKROUTER_BASE_URL: &str = "https://taskrouter.twilio.com";
pub const DEFAULT_CONVERSATIONS_BASE_URL: &str = "https://conversations.twilio.com";

const PAGE_SIZE: &str = "200";

/// Upper bound on pages followed for one list, against a looping cursor.
const MAX_PAGES: usize = 50;

/// Connection settings for [`RestGateway`].
#[derive(Clone)]
pub struct RestGatewayConfig {
    pub account_sid: String,
    pub auth_token: SecretString,
    pub workspace_sid: String,
    /// Scope conversation calls to a chat service when set.
    pub chat_service_sid: Option<String>,
    pub api_base_url: String,
    pub taskrouter_base_url: String,
    pub conversations_base_url: String,
    pub timeout: Duration,
}

impl RestGatewayConfig {
    pub fn new(
        account_sid: impl Into<String>,
        auth_token: SecretString,
        workspace_sid: impl Into<String>,
    ) -> Self {
        Self {
            account_sid: account_sid.into(),
            auth_token,
            workspace_sid: workspace_sid.into(),
            chat_service_sid: None,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            taskrouter_base_url: DEFAULT_TASKROUTER_BASE_URL.to_string(),
            conversations_base_url: DEFAULT_CONVERSATIONS_BASE_URL.to_string(),
            timeout: Duration::from_secs(10),
        }
    }

    /// Point every resource family at one base URL (mock servers).
    pub fn with_base_url(mut self, base: &str) -> Self {
        let base = base.trim_end_matches('/').to_string();
        self.api_base_url = base.clone();
        self.taskrouter_base_url = base.clone();
        self.conversations_base_url = base;
        self
    }
}

impl std::fmt::Debug for RestGatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestGatewayConfig")
            .field("account_sid", &self.account_sid)
            .field("auth_token", &"[REDACTED]")
            .field("workspace_sid", &self.workspace_sid)
            .field("chat_service_sid", &self.chat_service_sid)
            .field("api_base_url", &self.api_base_url)
            .field("taskrouter_base_url", &self.taskrouter_base_url)
            .field("conversations_base_url", &self.conversations_base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Gateway backed by the platform's REST API.
pub struct RestGateway {
    client: Client,
    config: RestGatewayConfig,
}

impl RestGateway {
    pub fn new(config: RestGatewayConfig) -> DeskResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| DeskError::internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    fn api_url(&self, path: &str) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/{}",
            self.config.api_base_url, self.config.account_sid, path
        )
    }

    fn taskrouter_url(&self, path: &str) -> String {
        format!(
            "{}/v1/Workspaces/{}/{}",
            self.config.taskrouter_base_url, self.config.workspace_sid, path
        )
    }

    fn conversation_url(&self, conversation_sid: &str) -> String {
        match &self.config.chat_service_sid {
            Some(service) => format!(
                "{}/v1/Services/{}/Conversations/{}",
                self.config.conversations_base_url, service, conversation_sid
            ),
            None => format!(
                "{}/v1/Conversations/{}",
                self.config.conversations_base_url, conversation_sid
            ),
        }
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.basic_auth(
            &self.config.account_sid,
            Some(self.config.auth_token.expose_secret()),
        )
    }

    /// Send and map transport failures and non-2xx statuses.
    async fn send(
        &self,
        builder: RequestBuilder,
        resource: &'static str,
        sid: &str,
    ) -> DeskResult<Response> {
        let response = self
            .authed(builder)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(DeskError::not_found(resource, sid));
        }

        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .ok()
            .and_then(|body| match (body.code, body.message) {
                (Some(code), Some(message)) => Some(format!("{} ({})", message, code)),
                (None, Some(message)) => Some(message),
                _ => None,
            })
            .unwrap_or(text);
        warn!(resource, sid, status = status.as_u16(), message = %message, "Platform rejected request");
        Err(DeskError::Upstream {
            status: status.as_u16(),
            message,
        })
    }

    async fn get<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
        resource: &'static str,
        sid: &str,
    ) -> DeskResult<T> {
        debug!(url, "GET platform resource");
        let response = self.send(self.client.get(url).query(query), resource, sid).await?;
        decode(response).await
    }

    async fn post<T: DeserializeOwned>(
        &self,
        url: &str,
        form: &[(&str, String)],
        resource: &'static str,
        sid: &str,
    ) -> DeskResult<T> {
        debug!(url, "POST platform resource");
        let response = self.send(self.client.post(url).form(form), resource, sid).await?;
        decode(response).await
    }

    /// Settle a claim from the conversation's current attributes.
    async fn read_back_claim(&self, conversation_sid: &str, task_sid: &str) -> DeskResult<ClaimOutcome> {
        let current = self.fetch_conversation(conversation_sid).await?;
        match current.linked_task_sid() {
            Some(existing) if existing == task_sid => Ok(ClaimOutcome::Claimed),
            Some(existing) => Ok(ClaimOutcome::AlreadyClaimed {
                task_sid: existing.to_string(),
            }),
            None => Err(DeskError::Conflict {
                resource: "Conversation",
                sid: conversation_sid.to_string(),
                reason: "attributes changed concurrently".to_string(),
            }),
        }
    }

    /// Read every page of a reservation list, following `meta.next_page_url`.
    async fn list_reservations(
        &self,
        url: &str,
        resource: &'static str,
        sid: &str,
    ) -> DeskResult<Vec<Reservation>> {
        let mut page: ReservationPage = self.get(url, &[("PageSize", PAGE_SIZE)], resource, sid).await?;
        let mut reservations: Vec<Reservation> =
            page.reservations.drain(..).map(Reservation::from).collect();

        let mut followed = 0;
        while let Some(next) = page.meta.next_page_url.take().filter(|u| !u.is_empty()) {
            if followed == MAX_PAGES {
                warn!(resource, sid, pages = followed, "Reservation list truncated");
                break;
            }
            followed += 1;
            page = self.get(&next, &[], resource, sid).await?;
            reservations.extend(page.reservations.drain(..).map(Reservation::from));
        }
        Ok(reservations)
    }
}

impl std::fmt::Debug for RestGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestGateway")
            .field("config", &self.config)
            .finish()
    }
}

fn map_transport_error(e: reqwest::Error) -> DeskError {
    if e.is_builder() {
        DeskError::internal(format!("Invalid platform request: {}", e))
    } else {
        DeskError::UpstreamUnreachable {
            reason: e.to_string(),
        }
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> DeskResult<T> {
    let status = response.status().as_u16();
    response.json::<T>().await.map_err(|e| DeskError::Upstream {
        status,
        message: format!("Unreadable platform response: {}", e),
    })
}

#[async_trait]
impl PlatformGateway for RestGateway {
    async fn fetch_call(&self, call_sid: &str) -> DeskResult<Call> {
        let url = self.api_url(&format!("Calls/{}.json", call_sid));
        let call: CallResource = self.get(&url, &[], "Call", call_sid).await?;
        Ok(call.into())
    }

    async fn redirect_call(&self, call_sid: &str, twiml: &str) -> DeskResult<()> {
        let url = self.api_url(&format!("Calls/{}.json", call_sid));
        let _: CallResource = self
            .post(&url, &[("Twiml", twiml.to_string())], "Call", call_sid)
            .await?;
        Ok(())
    }

    async fn hangup_call(&self, call_sid: &str) -> DeskResult<()> {
        let url = self.api_url(&format!("Calls/{}.json", call_sid));
        let _: CallResource = self
            .post(&url, &[("Status", "completed".to_string())], "Call", call_sid)
            .await?;
        Ok(())
    }

    async fn create_call(&self, params: CreateCall) -> DeskResult<Call> {
        let url = self.api_url("Calls.json");
        let form = [
            ("To", params.to.clone()),
            ("From", params.from),
            ("Twiml", params.twiml),
        ];
        let call: CallResource = self.post(&url, &form, "Call", &params.to).await?;
        Ok(call.into())
    }

    async fn list_conferences(
        &self,
        friendly_name: &str,
        status: Option<ConferenceStatus>,
    ) -> DeskResult<Vec<Conference>> {
        let url = self.api_url("Conferences.json");
        let mut query = vec![("FriendlyName", friendly_name), ("PageSize", PAGE_SIZE)];
        if let Some(status) = &status {
            query.push(("Status", status.as_str()));
        }
        let page: ConferencePage = self.get(&url, &query, "Conference", friendly_name).await?;
        Ok(page.conferences.into_iter().map(Conference::from).collect())
    }

    async fn fetch_conference(&self, conference_sid: &str) -> DeskResult<Conference> {
        let url = self.api_url(&format!("Conferences/{}.json", conference_sid));
        let conference: ConferenceResource =
            self.get(&url, &[], "Conference", conference_sid).await?;
        Ok(conference.into())
    }

    async fn list_participants(&self, conference_sid: &str) -> DeskResult<Vec<Participant>> {
        let url = self.api_url(&format!("Conferences/{}/Participants.json", conference_sid));
        let page: ParticipantPage = self
            .get(&url, &[("PageSize", PAGE_SIZE)], "Conference", conference_sid)
            .await?;
        Ok(page.participants.into_iter().map(Participant::from).collect())
    }

    async fn fetch_participant(
        &self,
        conference_sid: &str,
        call_sid: &str,
    ) -> DeskResult<Participant> {
        let url = self.api_url(&format!(
            "Conferences/{}/Participants/{}.json",
            conference_sid, call_sid
        ));
        let participant: ParticipantResource =
            self.get(&url, &[], "Participant", call_sid).await?;
        Ok(participant.into())
    }

    async fn update_participant_hold(
        &self,
        conference_sid: &str,
        call_sid: &str,
        hold: bool,
        hold_url: Option<&str>,
    ) -> DeskResult<Participant> {
        let url = self.api_url(&format!(
            "Conferences/{}/Participants/{}.json",
            conference_sid, call_sid
        ));
        let mut form = vec![("Hold", hold.to_string())];
        if let (true, Some(hold_url)) = (hold, hold_url) {
            form.push(("HoldUrl", hold_url.to_string()));
            form.push(("HoldMethod", "GET".to_string()));
        }
        let participant: ParticipantResource =
            self.post(&url, &form, "Participant", call_sid).await?;
        Ok(participant.into())
    }

    async fn list_recordings(&self, call_sid: &str) -> DeskResult<Vec<Recording>> {
        let url = self.api_url(&format!("Calls/{}/Recordings.json", call_sid));
        let page: RecordingPage = self
            .get(&url, &[("PageSize", PAGE_SIZE)], "Call", call_sid)
            .await?;
        Ok(page.recordings.into_iter().map(Recording::from).collect())
    }

    async fn start_recording(&self, call_sid: &str) -> DeskResult<Recording> {
        let url = self.api_url(&format!("Calls/{}/Recordings.json", call_sid));
        let form = [("RecordingChannels", "dual".to_string())];
        let recording: RecordingResource = self.post(&url, &form, "Call", call_sid).await?;
        Ok(recording.into())
    }

    async fn update_recording(
        &self,
        call_sid: &str,
        recording_sid: &str,
        status: &str,
    ) -> DeskResult<Recording> {
        let url = self.api_url(&format!(
            "Calls/{}/Recordings/{}.json",
            call_sid, recording_sid
        ));
        let recording: RecordingResource = self
            .post(&url, &[("Status", status.to_string())], "Recording", recording_sid)
            .await?;
        Ok(recording.into())
    }

    async fn fetch_task(&self, task_sid: &str) -> DeskResult<Task> {
        let url = self.taskrouter_url(&format!("Tasks/{}", task_sid));
        let task: TaskResource = self.get(&url, &[], "Task", task_sid).await?;
        Ok(task.into())
    }

    async fn update_task(&self, task_sid: &str, update: TaskUpdate) -> DeskResult<Task> {
        let url = self.taskrouter_url(&format!("Tasks/{}", task_sid));
        let mut form = Vec::new();
        if let Some(status) = update.assignment_status {
            form.push(("AssignmentStatus", status.as_str().to_string()));
        }
        if let Some(reason) = update.reason {
            form.push(("Reason", reason));
        }
        if let Some(attributes) = update.attributes {
            form.push(("Attributes", attributes.to_value().to_string()));
        }
        let task: TaskResource = self.post(&url, &form, "Task", task_sid).await?;
        Ok(task.into())
    }

    async fn create_task(&self, task: NewTask) -> DeskResult<Task> {
        let url = self.taskrouter_url("Tasks");
        let mut form = vec![("Attributes", task.attributes.to_value().to_string())];
        if let Some(workflow_sid) = task.workflow_sid {
            form.push(("WorkflowSid", workflow_sid));
        }
        if let Some(channel) = task.task_channel {
            form.push(("TaskChannel", channel));
        }
        let task: TaskResource = self.post(&url, &form, "Task", "new").await?;
        Ok(task.into())
    }

    async fn list_worker_reservations(&self, worker_sid: &str) -> DeskResult<Vec<Reservation>> {
        let url = self.taskrouter_url(&format!("Workers/{}/Reservations", worker_sid));
        self.list_reservations(&url, "Worker", worker_sid).await
    }

    async fn list_task_reservations(&self, task_sid: &str) -> DeskResult<Vec<Reservation>> {
        let url = self.taskrouter_url(&format!("Tasks/{}/Reservations", task_sid));
        self.list_reservations(&url, "Task", task_sid).await
    }

    async fn fetch_worker(&self, worker_sid: &str) -> DeskResult<Worker> {
        let url = self.taskrouter_url(&format!("Workers/{}", worker_sid));
        let worker: WorkerResource = self.get(&url, &[], "Worker", worker_sid).await?;
        Ok(worker.into())
    }

    async fn list_workers(&self) -> DeskResult<Vec<Worker>> {
        let url = self.taskrouter_url("Workers");
        let page: WorkerPage = self
            .get(&url, &[("PageSize", PAGE_SIZE)], "Workspace", &self.config.workspace_sid)
            .await?;
        Ok(page.workers.into_iter().map(Worker::from).collect())
    }

    async fn list_activities(&self) -> DeskResult<Vec<Activity>> {
        let url = self.taskrouter_url("Activities");
        let page: ActivityPage = self
            .get(&url, &[("PageSize", PAGE_SIZE)], "Workspace", &self.config.workspace_sid)
            .await?;
        Ok(page.activities.into_iter().map(Activity::from).collect())
    }

    async fn update_worker_activity(
        &self,
        worker_sid: &str,
        activity_sid: &str,
    ) -> DeskResult<Worker> {
        let url = self.taskrouter_url(&format!("Workers/{}", worker_sid));
        let worker: WorkerResource = self
            .post(&url, &[("ActivitySid", activity_sid.to_string())], "Worker", worker_sid)
            .await?;
        Ok(worker.into())
    }

    async fn fetch_conversation(&self, conversation_sid: &str) -> DeskResult<Conversation> {
        let url = self.conversation_url(conversation_sid);
        let conversation: ConversationResource =
            self.get(&url, &[], "Conversation", conversation_sid).await?;
        Ok(conversation.into())
    }

    /// Conditional update keyed on the conversation's ETag. A 412 means
    /// another writer changed the attributes first.
    async fn claim_conversation_task(
        &self,
        conversation_sid: &str,
        task_sid: &str,
    ) -> DeskResult<ClaimOutcome> {
        let url = self.conversation_url(conversation_sid);
        let response = self
            .send(self.client.get(&url), "Conversation", conversation_sid)
            .await?;
        let etag = response
            .headers()
            .get(reqwest::header::ETAG)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let current: Conversation = decode::<ConversationResource>(response).await?.into();

        if let Some(existing) = current.linked_task_sid() {
            return Ok(if existing == task_sid {
                ClaimOutcome::Claimed
            } else {
                ClaimOutcome::AlreadyClaimed {
                    task_sid: existing.to_string(),
                }
            });
        }

        let attributes = ConversationAttributes {
            task_sid: Some(task_sid.to_string()),
            extra: current.attributes.extra.clone(),
        };
        let mut request = self
            .client
            .post(&url)
            .form(&[("Attributes", attributes.to_raw())]);
        match &etag {
            Some(etag) => request = request.header(reqwest::header::IF_MATCH, etag),
            None => warn!(conversation_sid, task_sid, "Conversation has no ETag, claim will be verified by re-read"),
        }

        match self.send(request, "Conversation", conversation_sid).await {
            Ok(_) if etag.is_some() => Ok(ClaimOutcome::Claimed),
            // Unconditional write: the last writer wins, so read back who that was.
            Ok(_) => self.read_back_claim(conversation_sid, task_sid).await,
            Err(DeskError::Upstream { status: 412, .. }) => {
                self.read_back_claim(conversation_sid, task_sid).await
            }
            Err(e) => Err(e),
        }
    }

    async fn close_conversation(&self, conversation_sid: &str) -> DeskResult<Conversation> {
        let url = self.conversation_url(conversation_sid);
        let conversation: ConversationResource = self
            .post(&url, &[("State", "closed".to_string())], "Conversation", conversation_sid)
            .await?;
        Ok(conversation.into())
    }

    async fn merge_message_attributes(
        &self,
        conversation_sid: &str,
        message_sid: &str,
        patch: Map<String, Value>,
    ) -> DeskResult<()> {
        let url = format!("{}/Messages/{}", self.conversation_url(conversation_sid), message_sid);
        let message: MessageResource = self.get(&url, &[], "Message", message_sid).await?;
        let mut attributes = message.attribute_map();
        attributes.extend(patch);

        let _: MessageResource = self
            .post(
                &url,
                &[("Attributes", Value::Object(attributes).to_string())],
                "Message",
                message_sid,
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use switchboard_core::{AssignmentStatus, CallStatus};
    use wiremock::matchers::{body_string_contains, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn gateway(server: &MockServer) -> DeskResult<RestGateway> {
        let config = RestGatewayConfig::new("AC1", SecretString::new("token".into()), "WS1")
            .with_base_url(&server.uri());
        RestGateway::new(config)
    }

    #[tokio::test]
    async fn test_fetch_call_decodes_status() -> DeskResult<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/2010-04-01/Accounts/AC1/Calls/CA1.json"))
            .and(header("authorization", "Basic QUMxOnRva2Vu"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "sid": "CA1",
                "status": "in-progress",
                "from": "+15550001111"
            })))
            .mount(&server)
            .await;

        let call = gateway(&server)?.fetch_call("CA1").await?;
        assert_eq!(call.status, CallStatus::InProgress);
        assert_eq!(call.from.as_deref(), Some("+15550001111"));
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_resource_is_not_found() -> DeskResult<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/Workspaces/WS1/Tasks/WT404"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "code": 20404,
                "message": "The requested resource was not found"
            })))
            .mount(&server)
            .await;

        let err = gateway(&server)?.fetch_task("WT404").await;
        assert_eq!(err, Err(DeskError::not_found("Task", "WT404")));
        Ok(())
    }

    #[tokio::test]
    async fn test_rejection_carries_platform_message() -> DeskResult<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/2010-04-01/Accounts/AC1/Calls/CA1.json"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "code": 21220,
                "message": "Call is not in-progress. Cannot redirect."
            })))
            .mount(&server)
            .await;

        let err = gateway(&server)?.redirect_call("CA1", "<Response/>").await;
        match err {
            Err(DeskError::Upstream { status, message }) => {
                assert_eq!(status, 400);
                assert!(message.contains("21220"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_update_task_sends_form_fields() -> DeskResult<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/Workspaces/WS1/Tasks/WT1"))
            .and(body_string_contains("AssignmentStatus=wrapping"))
            .and(body_string_contains("Reason=done"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "sid": "WT1",
                "assignment_status": "wrapping",
                "attributes": "{}"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let task = gateway(&server)?
            .update_task(
                "WT1",
                TaskUpdate::status(AssignmentStatus::Wrapping).with_reason(Some("done".to_string())),
            )
            .await?;
        assert_eq!(task.assignment_status, AssignmentStatus::Wrapping);
        Ok(())
    }

    #[tokio::test]
    async fn test_list_conferences_filters_by_name_and_status() -> DeskResult<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/2010-04-01/Accounts/AC1/Conferences.json"))
            .and(query_param("FriendlyName", "WT1"))
            .and(query_param("Status", "in-progress"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "conferences": [{
                    "sid": "CF1",
                    "friendly_name": "WT1",
                    "status": "in-progress",
                    "date_created": "Tue, 02 Jan 2024 10:00:00 +0000"
                }]
            })))
            .mount(&server)
            .await;

        let conferences = gateway(&server)?
            .list_conferences("WT1", Some(ConferenceStatus::InProgress))
            .await?;
        assert_eq!(conferences.len(), 1);
        assert!(conferences[0].date_created.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn test_claim_lost_on_precondition_failure() -> DeskResult<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/Conversations/CH1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("ETag", "\"v1\"")
                    .set_body_json(json!({"sid": "CH1", "state": "active", "attributes": "{}"})),
            )
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/Conversations/CH1"))
            .and(header("if-match", "\"v1\""))
            .respond_with(ResponseTemplate::new(412))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/Conversations/CH1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "sid": "CH1",
                "state": "active",
                "attributes": "{\"taskSid\":\"WT-winner\"}"
            })))
            .mount(&server)
            .await;

        let outcome = gateway(&server)?.claim_conversation_task("CH1", "WT-mine").await?;
        assert_eq!(
            outcome,
            ClaimOutcome::AlreadyClaimed {
                task_sid: "WT-winner".to_string()
            }
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_claim_without_etag_reads_back_winner() -> DeskResult<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/Conversations/CH1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"sid": "CH1", "state": "active", "attributes": "{}"})),
            )
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/Conversations/CH1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"sid": "CH1", "state": "active", "attributes": "{}"})),
            )
            .expect(1)
            .mount(&server)
            .await;
        // A concurrent unconditional write landed after ours.
        Mock::given(method("GET"))
            .and(path("/v1/Conversations/CH1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "sid": "CH1",
                "state": "active",
                "attributes": "{\"taskSid\":\"WT-other\"}"
            })))
            .mount(&server)
            .await;

        let outcome = gateway(&server)?.claim_conversation_task("CH1", "WT-mine").await?;
        assert_eq!(
            outcome,
            ClaimOutcome::AlreadyClaimed {
                task_sid: "WT-other".to_string()
            }
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_reservation_list_follows_next_page() -> DeskResult<()> {
        let server = MockServer::start().await;
        let next = format!(
            "{}/v1/Workspaces/WS1/Workers/WK1/Reservations?PageSize=200&PageToken=PT2",
            server.uri()
        );
        Mock::given(method("GET"))
            .and(path("/v1/Workspaces/WS1/Workers/WK1/Reservations"))
            .and(query_param("PageToken", "PT2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "reservations": [
                    {"sid": "WR3", "task_sid": "WT3", "worker_sid": "WK1", "reservation_status": "accepted"}
                ],
                "meta": {"next_page_url": null}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/Workspaces/WS1/Workers/WK1/Reservations"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "reservations": [
                    {"sid": "WR1", "task_sid": "WT1", "worker_sid": "WK1", "reservation_status": "accepted"},
                    {"sid": "WR2", "task_sid": "WT2", "worker_sid": "WK1", "reservation_status": "completed"}
                ],
                "meta": {"next_page_url": next}
            })))
            .mount(&server)
            .await;

        let reservations = gateway(&server)?.list_worker_reservations("WK1").await?;
        let sids: Vec<&str> = reservations.iter().map(|r| r.sid.as_str()).collect();
        assert_eq!(sids, vec!["WR1", "WR2", "WR3"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_merge_message_attributes_keeps_existing_keys() -> DeskResult<()> {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/Conversations/CH1/Messages/IM1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "sid": "IM1",
                "attributes": "{\"channel\":\"sms\"}"
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/Conversations/CH1/Messages/IM1"))
            .and(body_string_contains("channel"))
            .and(body_string_contains("deliveryStatus"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"sid": "IM1"})))
            .expect(1)
            .mount(&server)
            .await;

        let mut patch = Map::new();
        patch.insert("deliveryStatus".to_string(), Value::String("read".to_string()));
        gateway(&server)?
            .merge_message_attributes("CH1", "IM1", patch)
            .await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_unreachable_platform() -> DeskResult<()> {
        let config = RestGatewayConfig::new("AC1", SecretString::new("token".into()), "WS1")
            .with_base_url("http://127.0.0.1:1");
        let err = RestGateway::new(config)?.fetch_call("CA1").await;
        assert!(matches!(err, Err(DeskError::UpstreamUnreachable { .. })));
        Ok(())
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = RestGatewayConfig::new("AC1", SecretString::new("super-secret".into()), "WS1");
        let debug = format!("{:?}", config);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
