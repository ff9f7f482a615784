//! Guessing why the track on screen changed.
//!
//! The service only reports the current state, so a change of track has to
//! be explained after the fact: the user pressed skip here, the previous song
//! ran out, or someone skipped on another device. The answer only picks an
//! animation; it never alters the stored track state.

use crate::playback::state::TrackState;
use serde::Serialize;

/// Remaining time below which a playing track is assumed to have ended.
pub const NATURAL_END_WINDOW_MS: i64 = 3_000;
/// A new track reported this close to its start looks like a forward skip.
pub const FRESH_START_WINDOW_MS: i64 = 5_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SkipDirection {
    Next,
    Previous,
}

/// A skip the user issued from this app, not yet seen in a fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSkip {
    pub direction: SkipDirection,
    /// Track on screen when the command was sent.
    pub from_id: String,
}

impl PendingSkip {
    pub fn new(direction: SkipDirection, from_id: impl Into<String>) -> Self {
        Self {
            direction,
            from_id: from_id.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Transition {
    /// First track seen, nothing to compare with.
    Initial,
    NoChange,
    /// Play/pause toggled somewhere else.
    ExternalPlayStateChange,
    UserNext,
    UserPrevious,
    NaturalNext,
    ExternalNext,
    ExternalPrevious,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Animation {
    None,
    FadeIn,
    SlideForward,
    SlideBackward,
    PulsePlayControl,
}

impl Transition {
    pub fn animation(self) -> Animation {
        match self {
            Transition::Initial => Animation::FadeIn,
            Transition::NoChange => Animation::None,
            Transition::ExternalPlayStateChange => Animation::PulsePlayControl,
            Transition::UserNext | Transition::NaturalNext | Transition::ExternalNext => {
                Animation::SlideForward
            }
            Transition::UserPrevious | Transition::ExternalPrevious => Animation::SlideBackward,
        }
    }

    pub fn is_track_change(self) -> bool {
        !matches!(
            self,
            Transition::NoChange | Transition::ExternalPlayStateChange
        )
    }
}

/// Classify `current` against the previously shown snapshot. Any track change
/// clears `pending_skip`; it only explains the change when it was issued from
/// the previous track.
pub fn classify(
    previous: Option<&TrackState>,
    current: &TrackState,
    pending_skip: &mut Option<PendingSkip>,
) -> Transition {
    let Some(previous) = previous else {
        return Transition::Initial;
    };

    if previous.id == current.id {
        if previous.is_playing != current.is_playing {
            return Transition::ExternalPlayStateChange;
        }
        return Transition::NoChange;
    }

    if let Some(skip) = pending_skip.take().filter(|s| s.from_id == previous.id) {
        return match skip.direction {
            SkipDirection::Next => Transition::UserNext,
            SkipDirection::Previous => Transition::UserPrevious,
        };
    }

    if previous.is_playing && previous.remaining_ms() < NATURAL_END_WINDOW_MS {
        Transition::NaturalNext
    } else if current.position_ms < FRESH_START_WINDOW_MS {
        Transition::ExternalNext
    } else {
        Transition::ExternalPrevious
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(id: &str, duration_ms: i64, position_ms: i64, is_playing: bool) -> TrackState {
        TrackState::new(
            id.into(),
            format!("Track {}", id),
            vec!["Artist".into()],
            None,
            None,
            duration_ms,
            position_ms,
            is_playing,
            0,
        )
    }

    #[test]
    fn track_ending_naturally() {
        let previous = track("A", 200_000, 198_500, true);
        let current = track("B", 180_000, 500, true);
        let mut pending = None;
        assert_eq!(
            classify(Some(&previous), &current, &mut pending),
            Transition::NaturalNext
        );
    }

    #[test]
    fn skip_forward_elsewhere() {
        let previous = track("A", 200_000, 50_000, true);
        let current = track("B", 180_000, 200, true);
        let mut pending = None;
        assert_eq!(
            classify(Some(&previous), &current, &mut pending),
            Transition::ExternalNext
        );
    }

    #[test]
    fn jump_into_middle_of_other_track() {
        let previous = track("A", 200_000, 50_000, true);
        let current = track("B", 180_000, 60_000, true);
        let mut pending = None;
        assert_eq!(
            classify(Some(&previous), &current, &mut pending),
            Transition::ExternalPrevious
        );
    }

    #[test]
    fn paused_track_near_end_is_not_natural() {
        let previous = track("A", 200_000, 198_500, false);
        let current = track("B", 180_000, 500, true);
        let mut pending = None;
        assert_eq!(
            classify(Some(&previous), &current, &mut pending),
            Transition::ExternalNext
        );
    }

    #[test]
    fn pending_user_skip_wins_and_is_consumed() {
        let previous = track("A", 200_000, 198_500, true);
        let current = track("B", 180_000, 500, true);
        let mut pending = Some(PendingSkip::new(SkipDirection::Previous, "A"));
        assert_eq!(
            classify(Some(&previous), &current, &mut pending),
            Transition::UserPrevious
        );
        assert_eq!(pending, None);
    }

    #[test]
    fn pending_skip_survives_until_track_changes() {
        let previous = track("A", 200_000, 10_000, true);
        let same = track("A", 200_000, 11_000, true);
        let mut pending = Some(PendingSkip::new(SkipDirection::Next, "A"));
        assert_eq!(
            classify(Some(&previous), &same, &mut pending),
            Transition::NoChange
        );
        assert_eq!(pending, Some(PendingSkip::new(SkipDirection::Next, "A")));

        let next = track("B", 200_000, 0, true);
        assert_eq!(
            classify(Some(&same), &next, &mut pending),
            Transition::UserNext
        );
        assert_eq!(pending, None);
    }

    #[test]
    fn skip_from_another_track_does_not_explain_change() {
        let previous = track("B", 200_000, 199_000, true);
        let current = track("C", 200_000, 300, true);
        let mut pending = Some(PendingSkip::new(SkipDirection::Previous, "A"));
        assert_eq!(
            classify(Some(&previous), &current, &mut pending),
            Transition::NaturalNext
        );
        assert_eq!(pending, None);
    }

    #[test]
    fn play_state_toggle_on_same_track() {
        let previous = track("A", 200_000, 10_000, true);
        let current = track("A", 200_000, 10_500, false);
        let mut pending = Some(PendingSkip::new(SkipDirection::Next, "A"));
        let transition = classify(Some(&previous), &current, &mut pending);
        assert_eq!(transition, Transition::ExternalPlayStateChange);
        assert_eq!(transition.animation(), Animation::PulsePlayControl);
        assert!(!transition.is_track_change());
        assert_eq!(pending, Some(PendingSkip::new(SkipDirection::Next, "A")));
    }

    #[test]
    fn first_track_has_no_comparison() {
        let current = track("A", 200_000, 10_000, true);
        let mut pending = Some(PendingSkip::new(SkipDirection::Next, "A"));
        assert_eq!(classify(None, &current, &mut pending), Transition::Initial);
        assert_eq!(pending, Some(PendingSkip::new(SkipDirection::Next, "A")));
    }

    #[test]
    fn boundaries_are_strict() {
        let previous = track("A", 200_000, 197_000, true);
        let current = track("B", 180_000, 5_000, true);
        let mut pending = None;
        // Exactly 3000 ms left is not "under 3000"; exactly 5000 ms in is not "under 5000".
        assert_eq!(
            classify(Some(&previous), &current, &mut pending),
            Transition::ExternalPrevious
        );
    }
}
