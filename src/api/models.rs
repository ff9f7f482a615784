use crate::playback::state::TrackState;
use serde::Deserialize;

// Auth types
#[derive(Debug, Default, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

impl TokenResponse {
    pub const DEFAULT_EXPIRES_IN: u64 = 3600;

    pub fn expires_in_or_default(&self) -> u64 {
        self.expires_in.unwrap_or(Self::DEFAULT_EXPIRES_IN)
    }

    /// Most specific human readable reason the provider gave, if any.
    pub fn failure_reason(&self) -> Option<String> {
        self.error_description
            .clone()
            .or_else(|| self.error.clone())
    }
}

// Player types
#[derive(Debug, Clone, Deserialize)]
pub struct CurrentlyPlaying {
    #[serde(default)]
    pub item: Option<PlayingItem>,
    #[serde(default)]
    pub progress_ms: Option<i64>,
    #[serde(default)]
    pub is_playing: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlayingItem {
    /// Local files come back without an id.
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub uri: Option<String>,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<ArtistRef>,
    #[serde(default)]
    pub album: Option<AlbumRef>,
    #[serde(default)]
    pub duration_ms: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArtistRef {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlbumRef {
    pub name: String,
    #[serde(default)]
    pub images: Vec<ImageRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageRef {
    pub url: String,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

impl CurrentlyPlaying {
    /// Build the track snapshot for this response, `None` when nothing
    /// playable is reported.
    pub fn into_track_state(self, observed_at_ms: i64) -> Option<TrackState> {
        let item = self.item?;
        let id = item
            .id
            .or(item.uri)
            .unwrap_or_else(|| format!("local:{}", item.name));
        let (album_name, album_art_url) = match item.album {
            // Spotify orders images largest first; the widget shows the first.
            Some(album) => (
                Some(album.name),
                album.images.into_iter().next().map(|img| img.url),
            ),
            None => (None, None),
        };

        Some(TrackState::new(
            id,
            item.name,
            item.artists.into_iter().map(|a| a.name).collect(),
            album_name,
            album_art_url,
            item.duration_ms,
            self.progress_ms.unwrap_or(0),
            self.is_playing,
            observed_at_ms,
        ))
    }
}
