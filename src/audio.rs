/// Cue played when a photo matches.
pub const CUE_POSITIVE: &str = "positive";
/// Cue played when the loop moves on.
pub const CUE_NEUTRAL: &str = "neutral";

/// Plays short audio clips by id. Fire-and-forget: failures stay inside the player.
pub trait CuePlayer: Send + Sync {
    fn play_cue(&self, id: &str);
}

/// Writes cues to the log instead of a speaker.
pub struct LogCuePlayer;

impl CuePlayer for LogCuePlayer {
    fn play_cue(&self, id: &str) {
        log::info!("Cue: {}", id);
    }
}
