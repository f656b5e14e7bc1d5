//! Paging controller
//!
//! Turns individual [`PagingSource::load`] calls into one growing, observable
//! item list. A controller owns at most one session at a time; switching the
//! filter starts a fresh session with its own page cache.
//!
//! Every load result is tagged with the `(SessionId, generation)` it was issued
//! for and is dropped on arrival if the session has moved on since. The session
//! lock is a `parking_lot` mutex that is never held across an `.await`; events
//! are broadcast while it is held, which keeps replay plus subscription atomic
//! for new streams.

use std::collections::BTreeMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

use futures::future;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::fetcher::{ItemFilter, RemoteItemFetcher, ServerContext};
use super::source::PagingSource;
use super::types::{
    CombinedLoadStates, LoadState, Page, PageKey, PageRequest, PageResult, PagingEvent,
    PagingState, SessionId, VisibleRange,
};
use crate::config::PagingConfig;
use crate::models::DisplayItem;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Called with the visible range and the loaded item count on every visibility update
pub type VisibleRangeHook = Arc<dyn Fn(VisibleRange, usize) + Send + Sync>;

/// Point-in-time copy of the active session
#[derive(Debug, Clone, Default)]
pub struct PagingSnapshot {
    pub session: Option<SessionId>,
    pub filter: Option<ItemFilter>,
    /// Loaded items in key order; empty after a failed refresh
    pub items: Vec<DisplayItem>,
    pub load_states: CombinedLoadStates,
    /// The last loaded page was empty
    pub end_reached: bool,
}

/// Events of one session
///
/// Starts with a replay of the pages already loaded, then follows live
/// updates. Ends once the session is replaced or closed, or when the
/// controller is dropped.
/// A consumer that falls too far behind skips events and should resync from
/// [`PagingController::snapshot`].
pub struct PagingStream {
    session: SessionId,
    inner: BoxStream<'static, PagingEvent>,
}

impl PagingStream {
    #[must_use]
    pub const fn session(&self) -> SessionId {
        self.session
    }
}

impl Stream for PagingStream {
    type Item = PagingEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

/// Drives paging sessions over one fetcher. Cheap to clone; clones share state.
///
/// Methods that start loads spawn onto the current Tokio runtime.
#[derive(Clone)]
pub struct PagingController {
    inner: Arc<Inner>,
}

struct Inner {
    fetcher: Arc<dyn RemoteItemFetcher>,
    context: Arc<ServerContext>,
    config: PagingConfig,
    session: Mutex<Option<Session>>,
    next_session_id: AtomicU64,
    /// `None` marks the end of a session
    events: broadcast::Sender<(SessionId, Option<PagingEvent>)>,
    load_states: watch::Sender<CombinedLoadStates>,
    visible_range_hook: Mutex<Option<VisibleRangeHook>>,
}

struct Session {
    id: SessionId,
    source: PagingSource,
    generation: u64,
    cancel: CancellationToken,
    pages: BTreeMap<PageKey, Arc<Page>>,
    states: CombinedLoadStates,
    anchor: Option<usize>,
    last_visible: Option<VisibleRange>,
    /// Last key a refresh loads up to; reused by a retry
    refresh_target: PageKey,
    append_in_flight: Option<PageKey>,
    failed_append: Option<PageKey>,
}

impl Session {
    fn new(id: SessionId, source: PagingSource) -> Self {
        Self {
            id,
            source,
            generation: 0,
            cancel: CancellationToken::new(),
            pages: BTreeMap::new(),
            states: CombinedLoadStates::default(),
            anchor: None,
            last_visible: None,
            refresh_target: 0,
            append_in_flight: None,
            failed_append: None,
        }
    }

    fn item_count(&self) -> usize {
        self.pages.values().map(|page| page.len()).sum()
    }

    fn items(&self) -> Vec<DisplayItem> {
        self.pages
            .values()
            .flat_map(|page| page.data.iter().cloned())
            .collect()
    }

    fn paging_state(&self, page_size: u32) -> PagingState {
        PagingState {
            pages: self.pages.values().cloned().collect(),
            anchor_position: self.anchor,
            page_size,
        }
    }

    fn end_reached(&self) -> bool {
        self.states.refresh == LoadState::NotLoading
            && self
                .pages
                .last_key_value()
                .is_some_and(|(_, page)| page.next_key.is_none())
    }

    fn is_current(&self, job: &LoadJob) -> bool {
        self.id == job.session && self.generation == job.generation
    }
}

enum JobKind {
    /// Load keys `0..=target` in order
    Refresh { target: PageKey },
    Append { key: PageKey },
}

struct LoadJob {
    session: SessionId,
    generation: u64,
    source: PagingSource,
    cancel: CancellationToken,
    kind: JobKind,
}

impl PagingController {
    pub fn new(
        fetcher: Arc<dyn RemoteItemFetcher>,
        context: Arc<ServerContext>,
        config: PagingConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (load_states, _) = watch::channel(CombinedLoadStates::default());

        Self {
            inner: Arc::new(Inner {
                fetcher,
                context,
                config,
                session: Mutex::new(None),
                next_session_id: AtomicU64::new(0),
                events,
                load_states,
                visible_range_hook: Mutex::new(None),
            }),
        }
    }

    pub fn set_visible_range_hook(&self, hook: impl Fn(VisibleRange, usize) + Send + Sync + 'static) {
        *self.inner.visible_range_hook.lock() = Some(Arc::new(hook));
    }

    /// Observe `filter`, starting a session for it unless it is already active
    pub fn stream(&self, filter: ItemFilter) -> PagingStream {
        let session = self.set_filter(filter);
        self.subscribe(session)
    }

    /// Make `filter` the active session. The same filter keeps the current
    /// session; a different one cancels it and starts the initial load.
    pub fn set_filter(&self, filter: ItemFilter) -> SessionId {
        let mut guard = self.inner.session.lock();

        if let Some(current) = guard.as_ref() {
            if current.source.filter() == &filter {
                return current.id;
            }
        }

        if let Some(old) = guard.take() {
            old.cancel.cancel();
            self.inner.end_session(old.id);
            info!(session = %old.id, filter = %old.source.filter(), "Paging session replaced");
        }

        let id = SessionId(self.inner.next_session_id.fetch_add(1, Ordering::Relaxed) + 1);
        let source = PagingSource::new(
            Arc::clone(&self.inner.fetcher),
            filter,
            Arc::clone(&self.inner.context),
        );
        info!(session = %id, filter = %source.filter(), "Paging session started");

        let mut session = Session::new(id, source);
        let job = self.inner.begin_refresh(&mut session, 0);
        *guard = Some(session);
        drop(guard);

        self.inner.spawn(job);
        id
    }

    /// Stream of an existing session; ends at once if `session` is not active
    pub fn subscribe(&self, session: SessionId) -> PagingStream {
        let guard = self.inner.session.lock();

        let replay: Vec<PagingEvent> = match guard.as_ref() {
            Some(active) if active.id == session => {
                let mut replay: Vec<PagingEvent> = active
                    .pages
                    .iter()
                    .map(|(key, page)| PagingEvent::PageLoaded {
                        key: *key,
                        page: Arc::clone(page),
                    })
                    .collect();
                replay.push(PagingEvent::LoadStateChanged(active.states.clone()));
                replay
            }
            _ => {
                return PagingStream {
                    session,
                    inner: stream::empty().boxed(),
                };
            }
        };
        let receiver = self.inner.events.subscribe();
        drop(guard);

        let live = BroadcastStream::new(receiver)
            .filter_map(|event| {
                future::ready(match event {
                    Ok(event) => Some(event),
                    Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                        warn!(skipped, "Paging stream lagged behind");
                        None
                    }
                })
            })
            .take_while(move |(id, event)| {
                future::ready(*id < session || (*id == session && event.is_some()))
            })
            .filter_map(move |(id, event)| future::ready(event.filter(|_| id == session)));

        PagingStream {
            session,
            inner: stream::iter(replay).chain(live).boxed(),
        }
    }

    /// Reload the active session around its anchor. Returns `false` without a session.
    pub fn refresh(&self) -> bool {
        let mut guard = self.inner.session.lock();
        let Some(session) = guard.as_mut() else {
            return false;
        };

        let target = if session.pages.is_empty() {
            session.refresh_target
        } else {
            let state = session.paging_state(self.inner.config.page_size);
            session.source.get_refresh_key(&state).unwrap_or(0)
        };
        debug!(session = %session.id, target, "Refreshing");

        let job = self.inner.begin_refresh(session, target);
        drop(guard);

        self.inner.spawn(job);
        true
    }

    /// Report what is on screen. Returns `true` when this started a page load.
    pub fn on_visible_range(&self, range: VisibleRange) -> bool {
        let hook = self.inner.visible_range_hook.lock().clone();

        let mut guard = self.inner.session.lock();
        let Some(session) = guard.as_mut() else {
            return false;
        };
        session.anchor = Some(range.first);
        session.last_visible = Some(range);
        let loaded = session.item_count();
        let job = self.inner.prepare_prefetch(session);
        drop(guard);

        if let Some(hook) = hook {
            hook(range, loaded);
        }

        match job {
            Some(job) => {
                self.inner.spawn(job);
                true
            }
            None => false,
        }
    }

    /// Re-issue the failed direction with the same key. Returns `false` when
    /// nothing is in an error state.
    pub fn retry(&self) -> bool {
        let mut guard = self.inner.session.lock();
        let Some(session) = guard.as_mut() else {
            return false;
        };

        let job = if matches!(session.states.refresh, LoadState::Error(_)) {
            let target = session.refresh_target;
            Some(self.inner.begin_refresh(session, target))
        } else if let Some(key) = session
            .failed_append
            .filter(|_| matches!(session.states.append, LoadState::Error(_)))
        {
            Some(self.inner.begin_append(session, key))
        } else {
            None
        };
        drop(guard);

        match job {
            Some(job) => {
                self.inner.spawn(job);
                true
            }
            None => false,
        }
    }

    /// Drop the active session and cancel its loads; its streams end
    pub fn close(&self) {
        let mut guard = self.inner.session.lock();
        if let Some(session) = guard.take() {
            session.cancel.cancel();
            self.inner.end_session(session.id);
            debug!(session = %session.id, "Paging session closed");
        }
        self.inner.load_states.send_replace(CombinedLoadStates::default());
    }

    #[must_use]
    pub fn snapshot(&self) -> PagingSnapshot {
        let guard = self.inner.session.lock();
        guard.as_ref().map_or_else(PagingSnapshot::default, |session| PagingSnapshot {
            session: Some(session.id),
            filter: Some(session.source.filter().clone()),
            items: session.items(),
            load_states: session.states.clone(),
            end_reached: session.end_reached(),
        })
    }

    /// Load states of whichever session is active
    #[must_use]
    pub fn load_states(&self) -> watch::Receiver<CombinedLoadStates> {
        self.inner.load_states.subscribe()
    }

    #[must_use]
    pub fn paging_state(&self) -> PagingState {
        let guard = self.inner.session.lock();
        guard.as_ref().map_or_else(PagingState::default, |session| {
            session.paging_state(self.inner.config.page_size)
        })
    }

    /// Key a refresh would reload up to
    #[must_use]
    pub fn refresh_key(&self) -> Option<PageKey> {
        let guard = self.inner.session.lock();
        let session = guard.as_ref()?;
        session
            .source
            .get_refresh_key(&session.paging_state(self.inner.config.page_size))
    }

    #[must_use]
    pub fn current_session(&self) -> Option<SessionId> {
        self.inner.session.lock().as_ref().map(|session| session.id)
    }
}

impl Inner {
    fn emit(&self, session: SessionId, event: PagingEvent) {
        // No subscribers is fine; snapshot and the watch channel still hold the state
        let _ = self.events.send((session, Some(event)));
    }

    fn end_session(&self, session: SessionId) {
        let _ = self.events.send((session, None));
    }

    fn publish_states(&self, session: &Session) {
        self.load_states.send_replace(session.states.clone());
        self.emit(session.id, PagingEvent::LoadStateChanged(session.states.clone()));
    }

    fn job(session: &Session, kind: JobKind) -> LoadJob {
        LoadJob {
            session: session.id,
            generation: session.generation,
            source: session.source.clone(),
            cancel: session.cancel.clone(),
            kind,
        }
    }

    /// Reset the session's pages and mark the refresh direction loading
    fn begin_refresh(&self, session: &mut Session, target: PageKey) -> LoadJob {
        session.cancel.cancel();
        session.cancel = CancellationToken::new();
        session.generation += 1;
        session.refresh_target = target;
        session.append_in_flight = None;
        session.failed_append = None;
        session.states = CombinedLoadStates {
            refresh: LoadState::Loading,
            append: LoadState::NotLoading,
        };

        if !session.pages.is_empty() {
            session.pages.clear();
            self.emit(session.id, PagingEvent::Invalidated);
        }
        self.publish_states(session);

        Self::job(session, JobKind::Refresh { target })
    }

    fn begin_append(&self, session: &mut Session, key: PageKey) -> LoadJob {
        session.append_in_flight = Some(key);
        session.failed_append = None;
        session.states.append = LoadState::Loading;
        self.publish_states(session);

        Self::job(session, JobKind::Append { key })
    }

    /// Next-page load if the visible range is close enough to the end
    fn prepare_prefetch(&self, session: &mut Session) -> Option<LoadJob> {
        let range = session.last_visible?;
        if session.states.refresh != LoadState::NotLoading
            || session.append_in_flight.is_some()
            || matches!(session.states.append, LoadState::Error(_))
        {
            return None;
        }

        let (_, last_page) = session.pages.last_key_value()?;
        let next_key = last_page.next_key?;
        let loaded = session.item_count();
        if range.last.saturating_add(self.config.prefetch_distance) < loaded {
            return None;
        }

        debug!(session = %session.id, key = next_key, visible_last = range.last, loaded, "Prefetching");
        Some(self.begin_append(session, next_key))
    }

    fn spawn(self: &Arc<Self>, job: LoadJob) {
        let weak = Arc::downgrade(self);
        let load_size = self.config.page_size;
        tokio::spawn(run_job(weak, job, load_size));
    }

    /// Apply one refresh page; returns whether the refresh continues
    fn apply_refresh_page(
        self: &Arc<Self>,
        job: &LoadJob,
        key: PageKey,
        target: PageKey,
        result: PageResult,
    ) -> bool {
        let mut guard = self.session.lock();
        let Some(session) = guard.as_mut().filter(|session| session.is_current(job)) else {
            debug!(session = %job.session, key, "Discarding stale refresh result");
            return false;
        };

        match result {
            PageResult::Page(page) => {
                let page = Arc::new(page);
                let done = key >= target || page.next_key.is_none();
                session.pages.insert(key, Arc::clone(&page));
                self.emit(session.id, PagingEvent::PageLoaded { key, page });

                if !done {
                    return true;
                }

                session.states.refresh = LoadState::NotLoading;
                self.publish_states(session);
                let next = self.prepare_prefetch(session);
                drop(guard);

                if let Some(next) = next {
                    self.spawn(next);
                }
                false
            }
            PageResult::Error(e) => {
                warn!(session = %session.id, key, error = %e, "Refresh failed");
                if !session.pages.is_empty() {
                    session.pages.clear();
                    self.emit(session.id, PagingEvent::Invalidated);
                }
                session.states.refresh = LoadState::Error(e);
                self.publish_states(session);
                false
            }
        }
    }

    fn apply_append(self: &Arc<Self>, job: &LoadJob, key: PageKey, result: PageResult) {
        let mut guard = self.session.lock();
        let Some(session) = guard
            .as_mut()
            .filter(|session| session.is_current(job) && session.append_in_flight == Some(key))
        else {
            debug!(session = %job.session, key, "Discarding stale append result");
            return;
        };
        session.append_in_flight = None;

        let next = match result {
            PageResult::Page(page) => {
                let page = Arc::new(page);
                session.pages.insert(key, Arc::clone(&page));
                self.emit(session.id, PagingEvent::PageLoaded { key, page });
                session.states.append = LoadState::NotLoading;
                self.publish_states(session);
                self.prepare_prefetch(session)
            }
            PageResult::Error(e) => {
                warn!(session = %session.id, key, error = %e, "Append failed");
                session.failed_append = Some(key);
                session.states.append = LoadState::Error(e);
                self.publish_states(session);
                None
            }
        };
        drop(guard);

        if let Some(next) = next {
            self.spawn(next);
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(session) = self.session.get_mut().take() {
            session.cancel.cancel();
        }
    }
}

async fn run_job(controller: Weak<Inner>, job: LoadJob, load_size: u32) {
    match job.kind {
        JobKind::Refresh { target } => {
            for key in 0..=target {
                let request = if key == 0 {
                    PageRequest::initial(load_size)
                } else {
                    PageRequest::at(key, load_size)
                };
                let Some(result) = load_unless_cancelled(&job, request).await else {
                    return;
                };
                let Some(inner) = controller.upgrade() else {
                    return;
                };
                if !inner.apply_refresh_page(&job, key, target, result) {
                    return;
                }
            }
        }
        JobKind::Append { key } => {
            let Some(result) = load_unless_cancelled(&job, PageRequest::at(key, load_size)).await
            else {
                return;
            };
            if let Some(inner) = controller.upgrade() {
                inner.apply_append(&job, key, result);
            }
        }
    }
}

async fn load_unless_cancelled(job: &LoadJob, request: PageRequest) -> Option<PageResult> {
    tokio::select! {
        () = job.cancel.cancelled() => {
            debug!(session = %job.session, key = ?request.key, "Load cancelled");
            None
        }
        result = job.source.load(request) => Some(result),
    }
}
