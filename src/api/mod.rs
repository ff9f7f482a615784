pub mod auth;
pub mod client;
pub mod models;

use crate::error::AppResult;
use crate::playback::state::TrackState;
use async_trait::async_trait;
use models::TokenResponse;

/// Result of one call to the currently-playing endpoint.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackFetch {
    Playing(TrackState),
    /// 204, any other non-success status, or a body without an item.
    Nothing,
    /// 401/403: the access token is no longer accepted.
    Unauthorized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportCommand {
    Next,
    Previous,
    Play,
    Pause,
}

impl TransportCommand {
    pub fn name(&self) -> &'static str {
        match self {
            TransportCommand::Next => "next",
            TransportCommand::Previous => "previous",
            TransportCommand::Play => "play",
            TransportCommand::Pause => "pause",
        }
    }
}

/// The identity provider's token endpoint.
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    async fn exchange_code(&self, code: &str, code_verifier: &str) -> AppResult<TokenResponse>;
    async fn refresh(&self, refresh_token: &str) -> AppResult<TokenResponse>;
}

/// The streaming service's player endpoints. `Err` means no response
/// arrived at all (connect failure, timeout, unreadable body).
#[async_trait]
pub trait PlayerEndpoint: Send + Sync {
    async fn currently_playing(&self, access_token: &str) -> AppResult<PlaybackFetch>;
    async fn transport(&self, access_token: &str, command: TransportCommand) -> AppResult<()>;
}
