pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod refresh;
pub mod session;
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use error::ClientError;
pub use refresh::{RefreshCoordinator, RefreshOutcome, ViewState};
pub use session::Session;
pub use types::{Credential, Group, GroupId, Member, Message, MessageContent, User};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
