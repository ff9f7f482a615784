use serde::Serialize;

/// Snapshot of what the service reported on one successful poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackState {
    pub id: String,
    pub title: String,
    pub artists: Vec<String>,
    pub album_name: Option<String>,
    pub album_art_url: Option<String>,
    pub duration_ms: i64,
    /// Always within `[0, duration_ms]`.
    pub position_ms: i64,
    pub is_playing: bool,
    pub observed_at_ms: i64,
}

impl TrackState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: String,
        title: String,
        artists: Vec<String>,
        album_name: Option<String>,
        album_art_url: Option<String>,
        duration_ms: i64,
        position_ms: i64,
        is_playing: bool,
        observed_at_ms: i64,
    ) -> Self {
        let duration_ms = duration_ms.max(0);
        Self {
            id,
            title,
            artists,
            album_name,
            album_art_url,
            duration_ms,
            position_ms: position_ms.clamp(0, duration_ms),
            is_playing,
            observed_at_ms,
        }
    }

    pub fn artist_line(&self) -> String {
        self.artists.join(", ")
    }

    pub fn remaining_ms(&self) -> i64 {
        self.duration_ms - self.position_ms
    }

    pub fn with_position(&self, position_ms: i64) -> Self {
        Self {
            position_ms: position_ms.clamp(0, self.duration_ms),
            ..self.clone()
        }
    }
}

/// Advance `position_ms` by `elapsed_ms`, never leaving `[0, duration_ms]`.
pub fn interpolate(position_ms: i64, elapsed_ms: i64, duration_ms: i64) -> i64 {
    let duration_ms = duration_ms.max(0);
    position_ms.saturating_add(elapsed_ms).clamp(0, duration_ms)
}

pub fn progress_fraction(position_ms: i64, duration_ms: i64) -> f64 {
    if duration_ms <= 0 {
        return 0.0;
    }
    position_ms as f64 / duration_ms as f64
}

/// `m:ss`, minutes are not wrapped into hours.
pub fn format_time(ms: i64) -> String {
    let total_seconds = ms.max(0) / 1000;
    format!("{}:{:02}", total_seconds / 60, total_seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(position_ms: i64, duration_ms: i64) -> TrackState {
        TrackState::new(
            "id".into(),
            "title".into(),
            vec!["A".into(), "B".into()],
            None,
            None,
            duration_ms,
            position_ms,
            true,
            0,
        )
    }

    #[test]
    fn construction_clamps_reported_position() {
        assert_eq!(track(250_000, 200_000).position_ms, 200_000);
        assert_eq!(track(-5, 200_000).position_ms, 0);
        assert_eq!(track(10, -1).duration_ms, 0);
    }

    #[test]
    fn interpolation_stays_in_bounds() {
        let duration = 10_000;
        let mut position = 9_000;
        for elapsed in [100, 250, 0, 700, 5_000, i64::MAX, -20_000, i64::MIN] {
            position = interpolate(position, elapsed, duration);
            assert!((0..=duration).contains(&position), "{}", position);
        }
        assert_eq!(interpolate(9_950, 100, 10_000), 10_000);
        assert_eq!(interpolate(1_000, 100, 10_000), 1_100);
    }

    #[test]
    fn formats_elapsed_labels() {
        assert_eq!(format_time(0), "0:00");
        assert_eq!(format_time(59_999), "0:59");
        assert_eq!(format_time(61_000), "1:01");
        assert_eq!(format_time(3_725_000), "62:05");
    }

    #[test]
    fn artist_line_joins_with_commas() {
        assert_eq!(track(0, 1).artist_line(), "A, B");
    }

    #[test]
    fn fraction_handles_zero_duration() {
        assert_eq!(progress_fraction(10, 0), 0.0);
        assert_eq!(progress_fraction(50, 200), 0.25);
    }
}
