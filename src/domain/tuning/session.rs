use serde::Deserialize;

/// Session lifecycle and presentation knobs.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct SessionTuning {
    pub countdown_seconds: u32,
    pub max_participants: usize,
    /// Fraction of the remaining distance a remote participant closes per frame.
    pub remote_lerp: f32,
}

impl Default for SessionTuning {
    fn default() -> Self {
        Self {
            countdown_seconds: 5,
            max_participants: 4,
            remote_lerp: 0.15,
        }
    }
}
