use serde::{Deserialize, Serialize};

/// Voices the stock configuration knows about.
pub const KNOWN_VOICES: &[&str] = &[
    "es-MX-JorgeNeural",
    "es-MX-DaliaNeural",
    "es-ES-ElviraNeural",
    "es-ES-AlvaroNeural",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voice(pub String);

impl Voice {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn is_known(&self) -> bool {
        KNOWN_VOICES.contains(&self.0.as_str())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsConfig {
    /// Simulated speaking rate used when no audio is produced.
    #[serde(default = "default_ms_per_char")]
    pub ms_per_char: u64,
    /// Lower bound for a simulated utterance.
    #[serde(default = "default_min_ms")]
    pub min_ms: u64,
}

fn default_ms_per_char() -> u64 {
    80
}

fn default_min_ms() -> u64 {
    300
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            ms_per_char: default_ms_per_char(),
            min_ms: default_min_ms(),
        }
    }
}
