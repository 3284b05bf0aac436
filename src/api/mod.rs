pub mod groupme;

use crate::error::ClientError;
use crate::session::Session;
use crate::types::{Group, GroupId, Member, Message, User};
use async_trait::async_trait;

pub use groupme::GroupMeClient;

/// Remote group/message API
///
/// Implementations own HTTP, auth header injection and pagination. Every
/// call carries the `Session` whose credential authorizes it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ApiClient: Send + Sync {
    /// Groups the current user belongs to
    async fn list_groups(&self, session: &Session) -> Result<Vec<Group>, ClientError>;

    /// Group metadata
    async fn get_group(&self, session: &Session, id: &GroupId) -> Result<Group, ClientError>;

    /// Group membership, in the order the remote API reports it
    async fn list_members(&self, session: &Session, id: &GroupId)
    -> Result<Vec<Member>, ClientError>;

    /// Most recent messages, newest first
    async fn list_messages(
        &self,
        session: &Session,
        id: &GroupId,
    ) -> Result<Vec<Message>, ClientError>;

    /// Post a text message; `Ok(false)` when the remote API declined it
    async fn post_message(
        &self,
        session: &Session,
        id: &GroupId,
        text: &str,
    ) -> Result<bool, ClientError>;

    /// "Who am I", used to validate a credential
    async fn current_user(&self, session: &Session) -> Result<User, ClientError>;
}
