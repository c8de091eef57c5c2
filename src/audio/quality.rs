use serde::{Deserialize, Serialize};

/// Named capture quality preset. Exactly one profile is active per session,
/// fixed at session start; pause/resume never alters it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QualityProfile {
    Low,
    Medium,
    High,
}

impl QualityProfile {
    /// Parse a settings value, case-insensitively. Unknown names fall back
    /// to `Low`, the default quality of the overlay.
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "medium" => Self::Medium,
            "high" => Self::High,
            _ => Self::Low,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }

    /// Sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        match self {
            Self::Low => 16_000,
            Self::Medium => 22_050,
            Self::High => 44_100,
        }
    }

    /// Channel count (1 = mono, 2 = stereo).
    pub fn channels(&self) -> u16 {
        match self {
            Self::Low | Self::Medium => 1,
            Self::High => 2,
        }
    }

    /// Encoder bit rate in bits per second.
    pub fn bit_rate(&self) -> u32 {
        match self {
            Self::Low => 128_000,
            Self::Medium => 192_000,
            Self::High => 256_000,
        }
    }
}

impl Default for QualityProfile {
    fn default() -> Self {
        Self::Low
    }
}
