/// Selection-driven refresh cascade
///
/// Every `run` is tagged with a generation when it is called. Results are
/// written to the views only while that generation is still the newest, and
/// starting a run cancels the fetches of the one before it. A group refresh
/// lands all at once (detail, members, messages, compose target) or not at
/// all, so the views never mix two selections.
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::ApiClient;
use crate::error::ClientError;
use crate::session::Session;
use crate::types::{Group, GroupId, Message};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RosterView {
    pub groups: Vec<Group>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetailView {
    /// Selected group with its current membership
    pub group: Option<Group>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageView {
    pub group_id: Option<GroupId>,
    /// Oldest first
    pub messages: Vec<Message>,
    pub error: Option<String>,
}

/// Everything the panels render
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewState {
    pub roster: RosterView,
    pub detail: DetailView,
    pub messages: MessageView,
    /// Group that `send` posts to
    pub compose_target: Option<GroupId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Applied,
    /// A newer run started before this one finished; nothing was written
    Superseded,
}

#[derive(Clone, Copy)]
enum Pane {
    Roster,
    Detail,
    Messages,
}

struct InFlight {
    cancel: CancellationToken,
    selection: Option<Group>,
}

struct Inner {
    api: Arc<dyn ApiClient>,
    session: Session,
    fetch_timeout: Duration,
    latest: AtomicU64,
    in_flight: Mutex<InFlight>,
    views: RwLock<ViewState>,
}

#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<Inner>,
}

impl RefreshCoordinator {
    pub fn new(api: Arc<dyn ApiClient>, session: Session, fetch_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                api,
                session,
                fetch_timeout,
                latest: AtomicU64::new(0),
                in_flight: Mutex::new(InFlight {
                    cancel: CancellationToken::new(),
                    selection: None,
                }),
                views: RwLock::new(ViewState::default()),
            }),
        }
    }

    /// Start a refresh for `selection`
    ///
    /// The generation is assigned here, before the returned future is first
    /// polled, so the call order decides which run wins.
    pub fn run(
        &self,
        selection: Option<Group>,
    ) -> impl Future<Output = Result<RefreshOutcome, ClientError>> + Send + 'static {
        let (generation, cancel) = self.inner.begin(selection.clone());
        let inner = Arc::clone(&self.inner);
        async move { inner.refresh(generation, cancel, selection).await }
    }

    /// Re-run the cascade for whatever is currently selected
    pub fn refresh_current(
        &self,
    ) -> impl Future<Output = Result<RefreshOutcome, ClientError>> + Send + 'static {
        let selection = self.current_selection();
        self.run(selection)
    }

    /// Group most recently passed to `run`
    pub fn current_selection(&self) -> Option<Group> {
        self.inner.in_flight().selection.clone()
    }

    pub async fn snapshot(&self) -> ViewState {
        self.inner.views.read().await.clone()
    }

    /// Post `text` to the group the composer is bound to
    ///
    /// Blank text is not sent and yields `Ok(false)`.
    pub async fn send(&self, text: &str) -> Result<bool, ClientError> {
        if text.trim().is_empty() {
            return Ok(false);
        }

        let target = self
            .inner
            .views
            .read()
            .await
            .compose_target
            .clone()
            .ok_or(ClientError::NoGroupSelected)?;

        let inner = &self.inner;
        let sent = tokio::time::timeout(
            inner.fetch_timeout,
            inner.api.post_message(&inner.session, &target, text),
        )
        .await
        .map_err(|_| ClientError::timeout("post_message", inner.fetch_timeout))??;

        debug!(group = %target, sent, "message posted");
        Ok(sent)
    }
}

impl Inner {
    fn begin(&self, selection: Option<Group>) -> (u64, CancellationToken) {
        // Generation and token are swapped together so two callers cannot
        // cancel each other's runs out of order
        let mut in_flight = self.in_flight();

        in_flight.cancel.cancel();

        let generation = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        let cancel = CancellationToken::new();
        in_flight.cancel = cancel.clone();
        in_flight.selection = selection;

        (generation, cancel)
    }

    /// InFlight only holds plain values, so a poisoned lock is still usable
    fn in_flight(&self) -> MutexGuard<'_, InFlight> {
        match self.in_flight.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn is_latest(&self, generation: u64) -> bool {
        self.latest.load(Ordering::SeqCst) == generation
    }

    async fn refresh(
        &self,
        generation: u64,
        cancel: CancellationToken,
        selection: Option<Group>,
    ) -> Result<RefreshOutcome, ClientError> {
        match selection {
            None => {
                debug!(generation, "refreshing group roster");
                self.refresh_roster(generation, &cancel).await
            }
            Some(group) => {
                debug!(generation, group = %group.id, "refreshing group");
                self.refresh_group(generation, &cancel, &group.id).await
            }
        }
    }

    async fn refresh_roster(
        &self,
        generation: u64,
        cancel: &CancellationToken,
    ) -> Result<RefreshOutcome, ClientError> {
        let groups = match self
            .fetch(cancel, "list_groups", self.api.list_groups(&self.session))
            .await
        {
            Ok(Some(groups)) => groups,
            Ok(None) => return Ok(self.superseded(generation)),
            Err(e) => return self.fail(generation, Pane::Roster, e).await,
        };

        let mut views = self.views.write().await;
        if !self.is_latest(generation) {
            return Ok(self.superseded(generation));
        }

        views.roster = RosterView {
            groups,
            error: None,
        };
        views.detail = DetailView::default();
        views.messages = MessageView::default();
        views.compose_target = None;

        Ok(RefreshOutcome::Applied)
    }

    async fn refresh_group(
        &self,
        generation: u64,
        cancel: &CancellationToken,
        id: &GroupId,
    ) -> Result<RefreshOutcome, ClientError> {
        let mut detail = match self
            .fetch(cancel, "get_group", self.api.get_group(&self.session, id))
            .await
        {
            Ok(Some(group)) => group,
            Ok(None) => return Ok(self.superseded(generation)),
            Err(e) => return self.fail(generation, Pane::Detail, e).await,
        };

        detail.members = match self
            .fetch(cancel, "list_members", self.api.list_members(&self.session, id))
            .await
        {
            Ok(Some(members)) => members,
            Ok(None) => return Ok(self.superseded(generation)),
            Err(e) => return self.fail(generation, Pane::Detail, e).await,
        };

        let mut messages = match self
            .fetch(cancel, "list_messages", self.api.list_messages(&self.session, id))
            .await
        {
            Ok(Some(messages)) => messages,
            Ok(None) => return Ok(self.superseded(generation)),
            Err(e) => return self.fail(generation, Pane::Messages, e).await,
        };
        // Remote order is newest first
        messages.reverse();

        let mut views = self.views.write().await;
        if !self.is_latest(generation) {
            return Ok(self.superseded(generation));
        }

        views.detail = DetailView {
            group: Some(detail),
            error: None,
        };
        views.messages = MessageView {
            group_id: Some(id.clone()),
            messages,
            error: None,
        };
        views.compose_target = Some(id.clone());

        Ok(RefreshOutcome::Applied)
    }

    /// Await one remote call under the fetch timeout; `Ok(None)` when cancelled
    async fn fetch<T>(
        &self,
        cancel: &CancellationToken,
        operation: &str,
        call: impl Future<Output = Result<T, ClientError>>,
    ) -> Result<Option<T>, ClientError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Ok(None),
            result = tokio::time::timeout(self.fetch_timeout, call) => match result {
                Ok(result) => result.map(Some),
                Err(_) => Err(ClientError::timeout(operation, self.fetch_timeout)),
            },
        }
    }

    /// Record `err` on the affected pane, keeping its previous contents
    async fn fail(
        &self,
        generation: u64,
        pane: Pane,
        err: ClientError,
    ) -> Result<RefreshOutcome, ClientError> {
        let mut views = self.views.write().await;
        if !self.is_latest(generation) {
            return Ok(self.superseded(generation));
        }

        warn!(generation, error = %err, "refresh failed");
        let message = Some(err.to_string());
        match pane {
            Pane::Roster => views.roster.error = message,
            Pane::Detail => views.detail.error = message,
            Pane::Messages => views.messages.error = message,
        }

        Err(err)
    }

    fn superseded(&self, generation: u64) -> RefreshOutcome {
        debug!(
            generation,
            latest = self.latest.load(Ordering::SeqCst),
            "discarding superseded refresh"
        );
        RefreshOutcome::Superseded
    }
}
