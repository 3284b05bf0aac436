// Shared fakes for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use groupdesk::api::ApiClient;
use groupdesk::auth::{BrowserSurface, CredentialStore, NavigationEvent};
use groupdesk::{
    ClientError, Credential, Group, GroupId, Member, Message, MessageContent, Session, User,
};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use url::Url;

pub fn group(id: &str) -> Group {
    Group {
        id: GroupId::from(id),
        name: format!("group {}", id),
        image_url: None,
        members: vec![],
    }
}

/// Gate that holds a call until released, and signals when the call arrives
#[derive(Default)]
pub struct Gate {
    pub entered: Notify,
    pub release: Notify,
}

/// In-memory remote API with per-group messages and optional gates
#[derive(Default)]
pub struct FakeApi {
    groups: Vec<Group>,
    valid_token: Option<String>,
    failing_details: Vec<String>,
    calls: Mutex<Vec<String>>,
    detail_gates: HashMap<String, Arc<Gate>>,
    message_gates: HashMap<String, Arc<Gate>>,
}

impl FakeApi {
    pub fn new(groups: Vec<Group>) -> Self {
        Self {
            groups,
            ..Default::default()
        }
    }

    pub fn accepting(mut self, token: &str) -> Self {
        self.valid_token = Some(token.to_string());
        self
    }

    pub fn failing_detail(mut self, id: &str) -> Self {
        self.failing_details.push(id.to_string());
        self
    }

    pub fn gate_detail(&mut self, id: &str) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        self.detail_gates.insert(id.to_string(), Arc::clone(&gate));
        gate
    }

    pub fn gate_messages(&mut self, id: &str) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        self.message_gates.insert(id.to_string(), Arc::clone(&gate));
        gate
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == call).count()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn find(&self, id: &GroupId) -> Result<Group, ClientError> {
        self.groups
            .iter()
            .find(|g| &g.id == id)
            .cloned()
            .ok_or_else(|| ClientError::UnexpectedResponse(format!("no group {}", id)))
    }
}

async fn pass(gate: Option<&Arc<Gate>>) {
    if let Some(gate) = gate {
        gate.entered.notify_one();
        gate.release.notified().await;
    }
}

#[async_trait]
impl ApiClient for FakeApi {
    async fn list_groups(&self, _session: &Session) -> Result<Vec<Group>, ClientError> {
        self.record("list_groups".into());
        Ok(self.groups.clone())
    }

    async fn get_group(&self, _session: &Session, id: &GroupId) -> Result<Group, ClientError> {
        self.record(format!("get_group:{}", id));
        pass(self.detail_gates.get(id.as_str())).await;
        if self.failing_details.iter().any(|f| f == id.as_str()) {
            return Err(ClientError::transient("503 Service Unavailable"));
        }
        self.find(id)
    }

    async fn list_members(
        &self,
        _session: &Session,
        id: &GroupId,
    ) -> Result<Vec<Member>, ClientError> {
        self.record(format!("list_members:{}", id));
        Ok(vec![Member {
            user_id: format!("owner-{}", id),
            nickname: format!("owner of {}", id),
        }])
    }

    async fn list_messages(
        &self,
        _session: &Session,
        id: &GroupId,
    ) -> Result<Vec<Message>, ClientError> {
        self.record(format!("list_messages:{}", id));
        pass(self.message_gates.get(id.as_str())).await;
        Ok(vec![
            Message {
                id: format!("{}-2", id),
                sender_name: "Bo".into(),
                content: MessageContent::Attachment,
                like_count: 1,
            },
            Message {
                id: format!("{}-1", id),
                sender_name: "Ana".into(),
                content: MessageContent::Text(format!("hello {}", id)),
                like_count: 0,
            },
        ])
    }

    async fn post_message(
        &self,
        _session: &Session,
        id: &GroupId,
        text: &str,
    ) -> Result<bool, ClientError> {
        self.record(format!("post_message:{}:{}", id, text));
        Ok(true)
    }

    async fn current_user(&self, session: &Session) -> Result<User, ClientError> {
        self.record("current_user".into());
        match &self.valid_token {
            Some(token) if token == session.access_token() => Ok(User {
                id: "42".into(),
                name: "Ana".into(),
            }),
            _ => Err(ClientError::rejected("401 Unauthorized")),
        }
    }
}

/// Credential store counting saves
#[derive(Default)]
pub struct RecordingStore {
    stored: Mutex<Option<Credential>>,
    saves: Mutex<Vec<String>>,
}

impl RecordingStore {
    pub fn with(token: &str) -> Self {
        Self {
            stored: Mutex::new(Some(Credential::new(token))),
            saves: Mutex::new(Vec::new()),
        }
    }

    pub fn saves(&self) -> Vec<String> {
        self.saves.lock().unwrap().clone()
    }
}

impl CredentialStore for RecordingStore {
    fn load(&self) -> Result<Option<Credential>, ClientError> {
        Ok(self.stored.lock().unwrap().clone())
    }

    fn save(&self, credential: &Credential) -> Result<(), ClientError> {
        self.saves.lock().unwrap().push(credential.expose().to_string());
        *self.stored.lock().unwrap() = Some(credential.clone());
        Ok(())
    }
}

/// Browser surface replaying a fixed list of navigations
pub struct ScriptedSurface {
    events: VecDeque<NavigationEvent>,
    pub loads: Vec<String>,
    pub closed: bool,
}

impl ScriptedSurface {
    pub fn new(events: Vec<NavigationEvent>) -> Self {
        Self {
            events: events.into(),
            loads: Vec::new(),
            closed: false,
        }
    }
}

#[async_trait]
impl BrowserSurface for ScriptedSurface {
    async fn load_url(&mut self, url: &Url) -> Result<(), ClientError> {
        self.loads.push(url.to_string());
        Ok(())
    }

    async fn next_event(&mut self) -> Option<NavigationEvent> {
        self.events.pop_front()
    }

    async fn close(&mut self) {
        self.closed = true;
    }
}
