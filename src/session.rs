/// Explicit session value handed to every component that issues remote calls
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::types::Credential;

#[derive(Debug, Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

#[derive(Debug)]
struct SessionInner {
    credential: Credential,
    established_at: DateTime<Utc>,
}

impl Session {
    pub fn new(credential: Credential) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                credential,
                established_at: Utc::now(),
            }),
        }
    }

    pub fn credential(&self) -> &Credential {
        &self.inner.credential
    }

    /// Token value for the outgoing request header
    pub fn access_token(&self) -> &str {
        self.inner.credential.expose()
    }

    pub fn established_at(&self) -> DateTime<Utc> {
        self.inner.established_at
    }

    /// Time since the session was established
    pub fn age(&self) -> chrono::Duration {
        Utc::now() - self.inner.established_at
    }
}
