//! The two periodic tasks behind a running session.
//!
//! The fetch task asks the service what is playing and is the only writer of
//! the authoritative track fields. The progress task moves the displayed
//! position forward between fetches and never touches the network. Both run
//! until the session's cancellation token fires; results that arrive after
//! that are dropped.

use crate::api::PlaybackFetch;
use crate::events::{ProgressPayload, TrackPayload, UiEvent};
use crate::playback::state::{interpolate, TrackState};
use crate::playback::transition::{classify, PendingSkip, SkipDirection, Transition};
use crate::session::{SessionCore, SessionPhase, SessionState};
use crate::store::Credential;
use crate::token::{is_expiring_soon, redact};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Handles and counters of the running poll loop.
pub struct PollSession {
    pub is_active: bool,
    pub consecutive_error_count: u32,
    cancel: CancellationToken,
    refetch: Arc<Notify>,
    fetch_task: Option<JoinHandle<()>>,
    progress_task: Option<JoinHandle<()>>,
}

impl Default for PollSession {
    fn default() -> Self {
        Self {
            is_active: false,
            consecutive_error_count: 0,
            cancel: CancellationToken::new(),
            refetch: Arc::new(Notify::new()),
            fetch_task: None,
            progress_task: None,
        }
    }
}

/// Shortest time a user skip waits to be seen in a fetch before it is
/// forgotten.
const MIN_PENDING_SKIP_TTL: Duration = Duration::from_secs(5);

/// How long a pending skip stays valid: long enough to span two regular
/// fetches.
pub(crate) fn pending_skip_ttl(poll_interval: Duration) -> Duration {
    MIN_PENDING_SKIP_TTL.max(poll_interval.saturating_mul(2))
}

/// What is on screen right now.
#[derive(Debug, Default)]
pub struct PlaybackView {
    pub track: Option<TrackState>,
    /// Locally interpolated position, reset to server truth on every fetch.
    pub position_ms: i64,
    pub last_tick: Option<Instant>,
    pub pending_skip: Option<PendingSkip>,
    pub pending_skip_deadline: Option<Instant>,
}

impl PlaybackView {
    /// Remember a skip sent while `from_id` was on screen. Ignored when the
    /// screen has already moved on, since the fetch that moved it was
    /// classified without the skip.
    pub(crate) fn arm_skip(
        &mut self,
        direction: SkipDirection,
        from_id: &str,
        now: Instant,
        ttl: Duration,
    ) -> bool {
        if self.track.as_ref().map(|t| t.id.as_str()) != Some(from_id) {
            log::debug!("Track changed before {:?} was accepted, not marking it", direction);
            return false;
        }
        self.pending_skip = Some(PendingSkip::new(direction, from_id));
        self.pending_skip_deadline = Some(now + ttl);
        true
    }

    fn expire_pending_skip(&mut self, now: Instant) {
        if self.pending_skip_deadline.is_some_and(|deadline| now >= deadline) {
            log::debug!("Skip never showed up in a fetch, dropping it");
            self.pending_skip = None;
            self.pending_skip_deadline = None;
        }
    }

    fn apply_track(&mut self, track: TrackState) -> UiEvent {
        self.expire_pending_skip(Instant::now());
        let previous = self
            .track
            .as_ref()
            .map(|prev| prev.with_position(self.position_ms));
        let transition = classify(previous.as_ref(), &track, &mut self.pending_skip);
        if self.pending_skip.is_none() {
            self.pending_skip_deadline = None;
        }
        if transition.is_track_change() {
            log::info!(
                "Now playing: {} - {} ({:?})",
                track.artist_line(),
                track.title,
                transition
            );
        }

        self.position_ms = track.position_ms;
        self.last_tick = Some(Instant::now());
        let event = match transition {
            Transition::NoChange => {
                UiEvent::Progress(ProgressPayload::new(track.position_ms, track.duration_ms))
            }
            _ => UiEvent::Track(TrackPayload::new(&track, transition)),
        };
        self.track = Some(track);
        event
    }

    fn clear_track(&mut self) {
        self.track = None;
        self.position_ms = 0;
        self.last_tick = None;
    }

    /// Advance the displayed position by the wall time since the last tick.
    fn tick(&mut self, now: Instant) -> Option<ProgressPayload> {
        let (is_playing, duration_ms) = match &self.track {
            Some(track) => (track.is_playing, track.duration_ms),
            None => return None,
        };
        let last = self.last_tick.replace(now);
        if !is_playing || duration_ms == 0 {
            return None;
        }
        let elapsed_ms = last
            .map(|last| now.saturating_duration_since(last).as_millis() as i64)
            .unwrap_or(0);
        self.position_ms = interpolate(self.position_ms, elapsed_ms, duration_ms);
        Some(ProgressPayload::new(self.position_ms, duration_ms))
    }
}

/// Start both tasks, replacing any previous pair.
pub(crate) fn start(core: &Arc<SessionCore>, state: &mut SessionState) {
    stop(&mut state.poll);
    state.view = PlaybackView::default();

    let cancel = CancellationToken::new();
    let refetch = Arc::new(Notify::new());
    state.poll.cancel = cancel.clone();
    state.poll.refetch = Arc::clone(&refetch);
    state.poll.consecutive_error_count = 0;
    state.poll.is_active = true;

    state.poll.fetch_task = Some(tokio::spawn(run_fetch_loop(
        Arc::clone(core),
        cancel.clone(),
        refetch,
    )));
    state.poll.progress_task = Some(tokio::spawn(run_progress_loop(Arc::clone(core), cancel)));
    log::info!(
        "Polling started (fetch every {}ms, progress every {}ms)",
        core.config.poll_interval_ms,
        core.config.progress_interval_ms
    );
}

/// Cancel both tasks. Safe to call any number of times.
pub(crate) fn stop(poll: &mut PollSession) {
    if !poll.is_active && poll.fetch_task.is_none() && poll.progress_task.is_none() {
        return;
    }
    poll.cancel.cancel();
    if let Some(task) = poll.fetch_task.take() {
        task.abort();
    }
    if let Some(task) = poll.progress_task.take() {
        task.abort();
    }
    poll.is_active = false;
    log::info!("Polling stopped");
}

/// Ask for one fetch outside the regular cadence after `delay`.
pub(crate) fn schedule_refetch(poll: &PollSession, delay: Duration) {
    if !poll.is_active {
        return;
    }
    let cancel = poll.cancel.clone();
    let refetch = Arc::clone(&poll.refetch);
    tokio::spawn(async move {
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = tokio::time::sleep(delay) => refetch.notify_one(),
        }
    });
}

async fn run_fetch_loop(core: Arc<SessionCore>, cancel: CancellationToken, refetch: Arc<Notify>) {
    let mut ticker = tokio::time::interval(core.config.poll_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        // The first tick completes immediately, giving the initial fetch.
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
            _ = refetch.notified() => {}
        }
        fetch_tick(&core, &cancel).await;
    }
}

async fn run_progress_loop(core: Arc<SessionCore>, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(core.config.progress_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        let mut state = core.state.lock().await;
        if cancel.is_cancelled() {
            break;
        }
        if let Some(progress) = state.view.tick(Instant::now()) {
            core.sink.emit(UiEvent::Progress(progress));
        }
    }
}

/// One fetch, including the single refresh-and-retry on a rejected token.
async fn fetch_tick(core: &Arc<SessionCore>, cancel: &CancellationToken) {
    let credential = match core.tokens.current() {
        Ok(Some(credential)) => credential,
        Ok(None) => {
            terminal_failure(core, cancel, "credential disappeared").await;
            return;
        }
        Err(e) => {
            log::error!("Failed to read credential: {}", e);
            terminal_failure(core, cancel, "credential unreadable").await;
            return;
        }
    };

    let credential = if credential.refresh_token.is_some()
        && is_expiring_soon(&credential, core.tokens.now_ms(), core.config.expiry_margin_ms)
    {
        log::info!("Access token about to expire, refreshing ahead of time");
        match refresh_in_session(core, cancel).await {
            Some(fresh) => fresh,
            None => return,
        }
    } else {
        credential
    };

    let mut result = core.player.currently_playing(&credential.access_token).await;

    if matches!(result, Ok(PlaybackFetch::Unauthorized)) {
        log::warn!(
            "Access token {} rejected, trying one refresh",
            redact(&credential.access_token)
        );
        let Some(fresh) = refresh_in_session(core, cancel).await else {
            return;
        };
        result = core.player.currently_playing(&fresh.access_token).await;
    }

    let mut guard = core.state.lock().await;
    if cancel.is_cancelled() {
        log::debug!("Discarding fetch result after stop");
        return;
    }
    let state = &mut *guard;

    match result {
        Ok(PlaybackFetch::Playing(track)) => {
            state.poll.consecutive_error_count = 0;
            let event = state.view.apply_track(track);
            core.sink.emit(event);
        }
        Ok(PlaybackFetch::Nothing) => {
            state.poll.consecutive_error_count = 0;
            state.view.clear_track();
            core.sink.emit(UiEvent::NothingPlaying);
        }
        Ok(PlaybackFetch::Unauthorized) => {
            log::error!("Token still rejected after refresh");
            core.force_sign_out(state, None);
        }
        Err(e) => {
            state.poll.consecutive_error_count += 1;
            log::warn!(
                "Error fetching currently playing ({}/{}): {}",
                state.poll.consecutive_error_count,
                core.config.max_consecutive_errors,
                e
            );
            if state.poll.consecutive_error_count >= core.config.max_consecutive_errors {
                state.poll.consecutive_error_count = 0;
                log::error!("Too many consecutive fetch errors, signing out");
                core.force_sign_out(state, None);
            }
        }
    }
}

/// Refresh while polling. Only this fetch waits for it; the progress task
/// keeps ticking. Returns `None` once the session has been torn down.
async fn refresh_in_session(core: &Arc<SessionCore>, cancel: &CancellationToken) -> Option<Credential> {
    {
        let mut state = core.state.lock().await;
        if cancel.is_cancelled() {
            return None;
        }
        core.set_phase(&mut state, SessionPhase::Reauthenticating);
    }

    let refreshed = core.tokens.refresh().await;

    let mut state = core.state.lock().await;
    if cancel.is_cancelled() {
        return None;
    }
    match refreshed {
        Ok(credential) => {
            core.set_phase(&mut state, SessionPhase::Active);
            Some(credential)
        }
        Err(e) => {
            log::error!("Could not renew session: {}", e);
            core.force_sign_out(&mut state, None);
            None
        }
    }
}

async fn terminal_failure(core: &Arc<SessionCore>, cancel: &CancellationToken, reason: &str) {
    let mut state = core.state.lock().await;
    if cancel.is_cancelled() {
        return;
    }
    log::error!("Session lost: {}", reason);
    core.force_sign_out(&mut state, None);
}
