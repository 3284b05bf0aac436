/// Session establishment: stored credential first, implicit-grant login otherwise
use std::sync::Arc;
use tracing::{info, warn};

use super::browser::BrowserSurface;
use super::implicit_grant::ImplicitGrantFlow;
use super::store::CredentialStore;
use super::validator::SessionValidator;
use crate::error::ClientError;
use crate::session::Session;
use crate::types::Credential;

pub struct TokenManager {
    store: Arc<dyn CredentialStore>,
    validator: SessionValidator,
}

impl TokenManager {
    pub fn new(store: Arc<dyn CredentialStore>, validator: SessionValidator) -> Self {
        Self { store, validator }
    }

    /// Stored credential, treating an unreadable store as empty
    pub fn stored_credential(&self) -> Option<Credential> {
        match self.store.load() {
            Ok(credential) => credential,
            Err(e) => {
                warn!("Could not read stored credential: {}", e);
                None
            }
        }
    }

    /// Session from the stored credential, without any login
    pub async fn stored_session(&self) -> Result<Session, ClientError> {
        let Some(credential) = self.stored_credential() else {
            info!("No stored credential, login required");
            return Err(ClientError::AuthRequired);
        };

        if self.validator.is_valid(&credential).await {
            info!("Reusing stored credential");
            Ok(Session::new(credential))
        } else {
            info!("Stored credential rejected, login required");
            Err(ClientError::AuthRequired)
        }
    }

    /// Reuse the stored credential if the remote API still accepts it,
    /// otherwise run the login flow and persist the new token
    pub async fn establish_session(
        &self,
        flow: &mut ImplicitGrantFlow,
        surface: &mut dyn BrowserSurface,
    ) -> Result<Session, ClientError> {
        match self.stored_session().await {
            Err(ClientError::AuthRequired) => {}
            other => return other,
        }

        let credential = flow.run(surface).await?;

        // The token is good for this run even if it cannot be persisted
        if let Err(e) = self.store.save(&credential) {
            warn!("Failed to persist credential: {}", e);
        }

        Ok(Session::new(credential))
    }
}
