/// The state an underlying playback widget can report.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// The widget has not finished initializing. Instructions arriving in
    /// this state are queued and retried rather than dropped.
    #[default]
    Unready,
    /// Ready, but nothing has started playing yet.
    Unstarted,
    Playing,
    Paused,
    Buffering,
    Ended,
}

impl PlaybackState {
    pub fn is_ready(&self) -> bool {
        !matches!(self, Self::Unready)
    }
}

/// The opaque video playback widget, specified only at its boundary.
/// The synchronizer issues commands through this and never assumes
/// anything about what is behind it.
pub trait VideoPlayer {
    fn load(&self, video_id: &str, start_offset: f32);
    fn play(&self);
    fn pause(&self);
    fn seek_to(&self, time: f32);
    fn current_time(&self) -> f32;
    fn duration(&self) -> f32;
    fn state(&self) -> PlaybackState;
}

/// Errors the playback widget can report. These surface as a dismissible
/// notice and never tear down the room or the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerError {
    InvalidVideoId,
    PlayerFailure,
    NotFoundOrPrivate,
    NotEmbeddable,
}

impl PlayerError {
    pub fn notice(&self) -> &'static str {
        match self {
            Self::InvalidVideoId => "Invalid video ID",
            Self::PlayerFailure => "The video player ran into a problem",
            Self::NotFoundOrPrivate => "Video not found or private",
            Self::NotEmbeddable => "Video not allowed in embedded players",
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_only_unready_blocks_instructions() {
        assert!(!PlaybackState::Unready.is_ready());

        for state in [
            PlaybackState::Unstarted,
            PlaybackState::Playing,
            PlaybackState::Paused,
            PlaybackState::Buffering,
            PlaybackState::Ended,
        ] {
            assert!(state.is_ready(), "{state:?} accepts instructions");
        }
    }

    #[test]
    fn test_every_player_error_has_a_notice() {
        let errors = [
            PlayerError::InvalidVideoId,
            PlayerError::PlayerFailure,
            PlayerError::NotFoundOrPrivate,
            PlayerError::NotEmbeddable,
        ];

        for error in errors {
            assert!(!error.notice().is_empty());
        }
    }
}
