use crate::playback::state::{format_time, progress_fraction, TrackState};
use crate::playback::transition::{Animation, Transition};
use crate::session::SessionPhase;
use serde::Serialize;
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressPayload {
    pub position_ms: i64,
    pub duration_ms: i64,
    pub position_fraction: f64,
    pub elapsed_label: String,
}

impl ProgressPayload {
    pub fn new(position_ms: i64, duration_ms: i64) -> Self {
        Self {
            position_ms,
            duration_ms,
            position_fraction: progress_fraction(position_ms, duration_ms),
            elapsed_label: format_time(position_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackPayload {
    pub track_id: String,
    pub title: String,
    pub artist: String,
    pub artwork_url: Option<String>,
    pub artwork_alt: Option<String>,
    pub duration_label: String,
    pub is_playing: bool,
    pub transition: Transition,
    pub animation: Animation,
    pub progress: ProgressPayload,
}

impl TrackPayload {
    pub fn new(track: &TrackState, transition: Transition) -> Self {
        Self {
            track_id: track.id.clone(),
            title: track.title.clone(),
            artist: track.artist_line(),
            artwork_url: track.album_art_url.clone(),
            artwork_alt: track.album_name.as_ref().map(|name| format!("{} cover", name)),
            duration_label: format_time(track.duration_ms),
            is_playing: track.is_playing,
            transition,
            animation: transition.animation(),
            progress: ProgressPayload::new(track.position_ms, track.duration_ms),
        }
    }
}

/// Render instructions for whatever surface draws the widget.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum UiEvent {
    PhaseChanged { phase: SessionPhase },
    /// Replace the visible address, dropping a single-use callback query.
    LocationCleaned { url: String },
    /// Must block until acknowledged, e.g. a denied authorization.
    Notice { message: String },
    Track(TrackPayload),
    NothingPlaying,
    Progress(ProgressPayload),
}

impl UiEvent {
    /// One line of terminal output, or `None` for events with nothing to show.
    pub fn render(&self) -> Option<String> {
        match self {
            UiEvent::PhaseChanged { phase } => Some(format!("[{:?}]", phase)),
            UiEvent::LocationCleaned { .. } => None,
            UiEvent::Notice { message } => Some(format!("! {}", message)),
            UiEvent::Track(track) => Some(format!(
                "{} {} - {} [{}]{}",
                if track.is_playing { ">" } else { "||" },
                track.artist,
                track.title,
                track.duration_label,
                track
                    .artwork_url
                    .as_ref()
                    .map(|url| format!(" {}", url))
                    .unwrap_or_default()
            )),
            UiEvent::NothingPlaying => Some("Nothing playing".into()),
            UiEvent::Progress(progress) => Some(format!(
                "{} {:>3}%",
                progress.elapsed_label,
                (progress.position_fraction * 100.0).round() as i64
            )),
        }
    }
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: UiEvent);
}

impl EventSink for mpsc::UnboundedSender<UiEvent> {
    fn emit(&self, event: UiEvent) {
        if self.send(event).is_err() {
            log::debug!("UI event dropped, receiver gone");
        }
    }
}
