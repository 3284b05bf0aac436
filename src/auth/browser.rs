/// Browser surface abstraction used by the implicit-grant flow
use async_trait::async_trait;
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use url::Url;

use crate::error::ClientError;

/// Something the surface reports back to the flow
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationEvent {
    /// The surface finished navigating to this destination
    Navigated(String),
    /// The user closed the surface
    Closed,
}

/// Minimal embedded-browser capability: load, observe, close
#[async_trait]
pub trait BrowserSurface: Send {
    async fn load_url(&mut self, url: &Url) -> Result<(), ClientError>;

    /// Next navigation event; `None` once the surface is gone
    async fn next_event(&mut self) -> Option<NavigationEvent>;

    async fn close(&mut self);
}

/// Terminal stand-in for an embedded web view
///
/// Opens the authorization page in the system browser and treats each line
/// the user pastes as the address the browser landed on. An empty line or
/// end of input closes the surface.
pub struct TerminalSurface<R> {
    lines: Lines<R>,
    open_browser: bool,
}

impl<R: AsyncBufRead + Unpin + Send> TerminalSurface<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            open_browser: true,
        }
    }

    /// Print the URL only, without launching the system browser
    pub fn without_browser(mut self) -> Self {
        self.open_browser = false;
        self
    }

    pub fn into_inner(self) -> R {
        self.lines.into_inner()
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> BrowserSurface for TerminalSurface<R> {
    async fn load_url(&mut self, url: &Url) -> Result<(), ClientError> {
        let instructions = format!(
            "\n🔐 GroupMe login\n{}\n\n   {}\n\nSteps:\n  \
             1. Log in with your GroupMe account\n  \
             2. After authorizing, copy the address the browser was sent to\n  \
             3. Paste it here (empty line cancels)\n",
            "━".repeat(52),
            url
        );
        {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{}", instructions)
                .and_then(|_| stdout.flush())
                .map_err(|e| ClientError::Browser(format!("cannot show login page: {}", e)))?;
        }

        if self.open_browser {
            if let Err(e) = opener::open(url.as_str()) {
                tracing::warn!("Could not open system browser: {}", e);
            }
        }

        Ok(())
    }

    async fn next_event(&mut self) -> Option<NavigationEvent> {
        match self.lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    Some(NavigationEvent::Closed)
                } else {
                    Some(NavigationEvent::Navigated(line.to_string()))
                }
            }
            Ok(None) => Some(NavigationEvent::Closed),
            Err(e) => {
                tracing::warn!("Failed to read from terminal: {}", e);
                None
            }
        }
    }

    async fn close(&mut self) {
        println!("✅ Login complete\n");
    }
}
