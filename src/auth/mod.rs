// Session acquisition: credential storage, validation and implicit-grant login

pub mod browser;
pub mod implicit_grant;
pub mod keyring;
pub mod monitor;
pub mod store;
pub mod token_manager;
pub mod validator;

pub use browser::{BrowserSurface, NavigationEvent, TerminalSurface};
pub use implicit_grant::{FlowAction, FlowState, ImplicitGrantFlow};
pub use keyring::KeyringStore;
pub use monitor::{SessionMonitor, SessionStatus};
pub use store::{CredentialStore, FileStore, MemoryStore};
pub use token_manager::TokenManager;
pub use validator::SessionValidator;

use std::sync::Arc;

use crate::config::{Config, CredentialBackend};

/// Credential store selected by configuration
pub fn credential_store(config: &Config) -> anyhow::Result<Arc<dyn CredentialStore>> {
    let creds = &config.credentials;
    let store: Arc<dyn CredentialStore> = match creds.backend {
        CredentialBackend::Keyring => {
            Arc::new(KeyringStore::new(&creds.keyring_service, &creds.key))
        }
        CredentialBackend::File => {
            Arc::new(FileStore::new(config.credential_file_path()?, &creds.key))
        }
        CredentialBackend::Memory => Arc::new(MemoryStore::new()),
    };
    Ok(store)
}
