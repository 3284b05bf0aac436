/// Implicit-grant token capture driven by browser navigation events
///
/// The flow loads the provider's authorization page and watches where the
/// browser goes. Intermediate pages (the provider's own login form) are left
/// alone. The first navigation whose origin matches the registered callback
/// and whose path starts with the callback path is inspected for an
/// `access_token` query parameter; a callback without one sends the browser
/// back to the authorization page.
use tracing::{debug, info, warn};
use url::Url;

use super::browser::{BrowserSurface, NavigationEvent};
use crate::error::ClientError;
use crate::types::Credential;

const TOKEN_PARAM: &str = "access_token";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    AwaitingRedirect,
    TokenFound,
    Abandoned,
}

/// What the driver should do after a navigation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowAction {
    /// Let the browser keep navigating
    Continue,
    /// Callback arrived without a token; load this URL again
    Reload(Url),
    /// Token captured; close the surface
    Complete(Credential),
}

pub struct ImplicitGrantFlow {
    authorize_url: Url,
    callback: Option<Url>,
    state: FlowState,
}

impl ImplicitGrantFlow {
    pub fn new(authorize_url: Url, callback_prefix: &str) -> Self {
        let callback = match Url::parse(callback_prefix) {
            Ok(url) => Some(url),
            Err(e) => {
                warn!("Callback prefix is not a URL, no navigation will match: {}", e);
                None
            }
        };

        Self {
            authorize_url,
            callback,
            state: FlowState::AwaitingRedirect,
        }
    }

    pub fn from_config(config: &crate::config::AuthConfig) -> anyhow::Result<Self> {
        Ok(Self::new(config.authorize_url()?, &config.callback_url))
    }

    pub fn state(&self) -> FlowState {
        self.state
    }

    pub fn authorize_url(&self) -> &Url {
        &self.authorize_url
    }

    /// Feed one navigation destination into the state machine
    pub fn on_navigation(&mut self, destination: &str) -> FlowAction {
        if self.state != FlowState::AwaitingRedirect {
            return FlowAction::Continue;
        }

        let Ok(destination) = Url::parse(destination) else {
            return FlowAction::Continue;
        };
        if !self.is_callback(&destination) {
            return FlowAction::Continue;
        }

        match extract_token(&destination) {
            Some(credential) => {
                self.state = FlowState::TokenFound;
                FlowAction::Complete(credential)
            }
            None => {
                debug!("Callback reached without an access token, restarting authorization");
                FlowAction::Reload(self.authorize_url.clone())
            }
        }
    }

    /// Same scheme, host and port as the callback, path under the callback path
    fn is_callback(&self, destination: &Url) -> bool {
        let Some(callback) = &self.callback else {
            return false;
        };

        destination.scheme() == callback.scheme()
            && destination.host_str() == callback.host_str()
            && destination.port_or_known_default() == callback.port_or_known_default()
            && destination.path().starts_with(callback.path())
    }

    /// The user closed the surface
    pub fn on_closed(&mut self) {
        if self.state == FlowState::AwaitingRedirect {
            self.state = FlowState::Abandoned;
        }
    }

    /// Drive the flow to completion against a browser surface
    pub async fn run(
        &mut self,
        surface: &mut dyn BrowserSurface,
    ) -> Result<Credential, ClientError> {
        info!("Starting implicit-grant login");
        surface.load_url(&self.authorize_url).await?;

        while let Some(event) = surface.next_event().await {
            match event {
                NavigationEvent::Navigated(destination) => match self.on_navigation(&destination) {
                    FlowAction::Continue => {}
                    FlowAction::Reload(url) => surface.load_url(&url).await?,
                    FlowAction::Complete(credential) => {
                        surface.close().await;
                        info!("Access token captured");
                        return Ok(credential);
                    }
                },
                NavigationEvent::Closed => break,
            }
        }

        self.on_closed();
        warn!("Login surface closed before access was granted");
        Err(ClientError::AuthCancelled)
    }
}

/// Non-empty `access_token` from the URL's query string
fn extract_token(destination: &Url) -> Option<Credential> {
    destination
        .query_pairs()
        .find(|(key, _)| key == TOKEN_PARAM)
        .map(|(_, value)| Credential::new(value.into_owned()))
        .filter(|credential| !credential.is_empty())
}
