use serde::Deserialize;

/// Play-field geometry and world rules.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct WorldTuning {
    pub width: f32,
    pub height: f32,

    /// Largest simulated step; longer frame gaps are discarded.
    pub max_step_ms: u64,

    /// Team score change when a hostile crosses the bottom edge.
    pub breach_penalty: i64,
}

impl Default for WorldTuning {
    fn default() -> Self {
        Self {
            width: 1200.0,
            height: 800.0,
            max_step_ms: 100,
            breach_penalty: -10,
        }
    }
}
