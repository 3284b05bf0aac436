use crate::api::ApiClient;
use crate::error::ClientError;
use crate::session::Session;
use crate::types::{Group, GroupId, Member, Message, MessageContent, User};
use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const TOKEN_HEADER: &str = "X-Access-Token";

/// GroupMe v3 REST adapter
///
/// Thin mapping from the wire envelope to domain types. Only the first page
/// of each listing is fetched.
pub struct GroupMeClient {
    client: reqwest::Client,
    base_url: String,
}

impl GroupMeClient {
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .user_agent(concat!("groupdesk/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &crate::config::Config) -> Result<Self> {
        Self::new(config.api.base_url.clone(), config.timeouts.fetch())
    }

    async fn get<T: DeserializeOwned>(
        &self,
        session: &Session,
        path: &str,
    ) -> Result<T, ClientError> {
        let res = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .header(TOKEN_HEADER, session.access_token())
            .send()
            .await?;

        unwrap_envelope(path, res).await
    }

    async fn fetch_group(&self, session: &Session, id: &GroupId) -> Result<WireGroup, ClientError> {
        self.get(session, &format!("/groups/{}", id)).await
    }
}

// GroupMe API types
#[derive(Deserialize)]
struct Envelope<T> {
    response: Option<T>,
}

#[derive(Deserialize)]
struct WireGroup {
    id: String,
    name: String,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    members: Vec<WireMember>,
}

#[derive(Deserialize)]
struct WireMember {
    user_id: String,
    nickname: String,
}

#[derive(Deserialize)]
struct WireMessages {
    #[serde(default)]
    messages: Vec<WireMessage>,
}

#[derive(Deserialize)]
struct WireMessage {
    id: String,
    name: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    favorited_by: Vec<String>,
}

#[derive(Deserialize)]
struct WireUser {
    id: String,
    name: String,
}

#[derive(Serialize)]
struct PostMessageRequest<'a> {
    message: OutgoingMessage<'a>,
}

#[derive(Serialize)]
struct OutgoingMessage<'a> {
    source_guid: String,
    text: &'a str,
}

impl From<WireMember> for Member {
    fn from(m: WireMember) -> Self {
        Member {
            user_id: m.user_id,
            nickname: m.nickname,
        }
    }
}

impl From<WireGroup> for Group {
    fn from(g: WireGroup) -> Self {
        Group {
            id: GroupId(g.id),
            name: g.name,
            image_url: g.image_url,
            members: g.members.into_iter().map(Member::from).collect(),
        }
    }
}

impl From<WireMessage> for Message {
    fn from(m: WireMessage) -> Self {
        Message {
            id: m.id,
            sender_name: m.name,
            content: MessageContent::from_optional_text(m.text),
            like_count: m.favorited_by.len(),
        }
    }
}

fn status_error(path: &str, status: StatusCode) -> ClientError {
    match status.as_u16() {
        401 | 403 => ClientError::rejected(format!("{} returned {}", path, status)),
        500..=599 => ClientError::transient(format!("{} returned {}", path, status)),
        _ => ClientError::UnexpectedResponse(format!("{} returned {}", path, status)),
    }
}

async fn unwrap_envelope<T: DeserializeOwned>(path: &str, res: Response) -> Result<T, ClientError> {
    let status = res.status();
    if !status.is_success() {
        return Err(status_error(path, status));
    }

    let envelope: Envelope<T> = res.json().await?;
    envelope
        .response
        .ok_or_else(|| {
            ClientError::UnexpectedResponse(format!("{} returned an empty envelope", path))
        })
}

#[async_trait]
impl ApiClient for GroupMeClient {
    async fn list_groups(&self, session: &Session) -> Result<Vec<Group>, ClientError> {
        let groups: Vec<WireGroup> = self.get(session, "/groups").await?;
        debug!(count = groups.len(), "listed groups");
        Ok(groups.into_iter().map(Group::from).collect())
    }

    async fn get_group(&self, session: &Session, id: &GroupId) -> Result<Group, ClientError> {
        Ok(self.fetch_group(session, id).await?.into())
    }

    async fn list_members(
        &self,
        session: &Session,
        id: &GroupId,
    ) -> Result<Vec<Member>, ClientError> {
        // Membership ships inside the group payload
        let group = self.fetch_group(session, id).await?;
        Ok(group.members.into_iter().map(Member::from).collect())
    }

    async fn list_messages(
        &self,
        session: &Session,
        id: &GroupId,
    ) -> Result<Vec<Message>, ClientError> {
        let path = format!("/groups/{}/messages", id);
        let res = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .header(TOKEN_HEADER, session.access_token())
            .send()
            .await?;

        // 304 means the group has no messages yet
        if res.status() == StatusCode::NOT_MODIFIED {
            return Ok(Vec::new());
        }

        let page: WireMessages = unwrap_envelope(&path, res).await?;
        Ok(page.messages.into_iter().map(Message::from).collect())
    }

    async fn post_message(
        &self,
        session: &Session,
        id: &GroupId,
        text: &str,
    ) -> Result<bool, ClientError> {
        let body = PostMessageRequest {
            message: OutgoingMessage {
                source_guid: uuid::Uuid::new_v4().to_string(),
                text,
            },
        };

        let path = format!("/groups/{}/messages", id);
        let res = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .header(TOKEN_HEADER, session.access_token())
            .json(&body)
            .send()
            .await?;

        let status = res.status();
        match status.as_u16() {
            200..=299 => Ok(true),
            401 | 403 | 500..=599 => Err(status_error(&path, status)),
            _ => {
                debug!(group = %id, status = %status, "message not accepted");
                Ok(false)
            }
        }
    }

    async fn current_user(&self, session: &Session) -> Result<User, ClientError> {
        let user: WireUser = self.get(session, "/users/me").await?;
        Ok(User {
            id: user.id,
            name: user.name,
        })
    }
}
