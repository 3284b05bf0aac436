use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::api::ApiClient;
use crate::session::Session;
use crate::types::Credential;

/// Confirms a stored credential still works before it is trusted
///
/// Every failure (rejection, timeout, transport error) answers `false`: the
/// caller only decides between reusing the credential and logging in again.
#[derive(Clone)]
pub struct SessionValidator {
    api: Arc<dyn ApiClient>,
    timeout: Duration,
}

impl SessionValidator {
    pub fn new(api: Arc<dyn ApiClient>, timeout: Duration) -> Self {
        Self { api, timeout }
    }

    pub async fn is_valid(&self, credential: &Credential) -> bool {
        if credential.is_empty() {
            return false;
        }

        let probe = Session::new(credential.clone());
        match tokio::time::timeout(self.timeout, self.api.current_user(&probe)).await {
            Ok(Ok(user)) => {
                debug!(user_id = %user.id, "stored credential accepted");
                true
            }
            Ok(Err(e)) => {
                debug!(error = %e, "stored credential not usable");
                false
            }
            Err(_) => {
                warn!(timeout_secs = self.timeout.as_secs(), "identity probe timed out");
                false
            }
        }
    }
}
