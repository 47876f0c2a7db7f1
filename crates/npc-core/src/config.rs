//! Typed runtime configuration, persisted as JSON.

use crate::{Mode, NpcError, Result};
use device_link::DeviceCommand;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NpcConfig {
    pub initial_mode: Mode,
    /// Where content collaborators keep their JSON snapshots. `None` keeps
    /// everything in memory.
    pub data_dir: Option<PathBuf>,
    pub queue: QueueConfig,
    pub debounce: DebounceConfig,
    pub speech: SpeechConfig,
    pub chat: ChatConfig,
    pub gifts: GiftConfig,
    pub device: DeviceConfig,
    pub llm: LlmConfig,
}

impl Default for NpcConfig {
    fn default() -> Self {
        Self {
            initial_mode: Mode::OpenChat,
            data_dir: None,
            queue: QueueConfig::default(),
            debounce: DebounceConfig::default(),
            speech: SpeechConfig::default(),
            chat: ChatConfig::default(),
            gifts: GiftConfig::default(),
            device: DeviceConfig::default(),
            llm: LlmConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { capacity: 100 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DebounceConfig {
    /// Quiet period after a wake before the queue is drained.
    pub settle_ms: u64,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self { settle_ms: 300 }
    }
}

impl DebounceConfig {
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

/// Voice and device cues for one output channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub voice: String,
    pub talk_cue: DeviceCommand,
    pub stop_cue: DeviceCommand,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    pub poll_interval_ms: u64,
    /// Simulated speaking rate when no synthesizer is available.
    pub ms_per_char: u64,
    pub min_utterance_ms: u64,
    pub primary: ChannelConfig,
    pub gift: ChannelConfig,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            ms_per_char: 80,
            min_utterance_ms: 300,
            primary: ChannelConfig {
                voice: "es-MX-JorgeNeural".to_string(),
                talk_cue: DeviceCommand::Talk,
                stop_cue: DeviceCommand::Stop,
            },
            gift: ChannelConfig {
                voice: "es-ES-AlvaroNeural".to_string(),
                talk_cue: DeviceCommand::Gift,
                stop_cue: DeviceCommand::GiftStop,
            },
        }
    }
}

impl SpeechConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn tts_config(&self) -> voice_out::TtsConfig {
        voice_out::TtsConfig {
            ms_per_char: self.ms_per_char,
            min_ms: self.min_utterance_ms,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Batches up to this size get one reply per author.
    pub small_batch_max: usize,
    /// Batches up to this size are grouped by intent; larger ones get a
    /// generic aggregate reply.
    pub medium_batch_max: usize,
    /// Times the same question is answered before the anti-spam reply.
    pub repetition_threshold: u32,
    pub llm_timeout_ms: u64,
    /// Authors named in a large-batch reply.
    pub author_sample: usize,
    pub max_tokens: Option<u32>,
    pub persona: String,
    pub stopwords: Vec<String>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            small_batch_max: 5,
            medium_batch_max: 15,
            repetition_threshold: 3,
            llm_timeout_ms: 8000,
            author_sample: 3,
            max_tokens: Some(100),
            persona: "Eres Poncho, un payaso sarcastico en un live. Responde con humor mordaz, \
                      maximo dos oraciones, sin emojis. Solo los regalos reales del sistema \
                      son donaciones; burlate de quien diga que dono en un comentario."
                .to_string(),
            stopwords: [
                "el", "la", "los", "las", "de", "que", "es", "por", "como", "un", "una", "y",
                "a", "the", "is", "are", "you", "to",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

impl ChatConfig {
    pub fn llm_timeout(&self) -> Duration {
        Duration::from_millis(self.llm_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GiftConfig {
    pub enabled: bool,
    /// Idle window after which the gift streak resets.
    pub streak_timeout_ms: u64,
    /// Celebrate every time the streak reaches a multiple of this.
    pub celebrate_every: u32,
    /// Gifts with a quantity above this trigger the combo cue.
    pub combo_quantity: u32,
}

impl Default for GiftConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            streak_timeout_ms: 10_000,
            celebrate_every: 5,
            combo_quantity: 3,
        }
    }
}

impl GiftConfig {
    pub fn streak_timeout(&self) -> Duration {
        Duration::from_millis(self.streak_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Serial port of the controller board; `None` with `auto_detect` scans the ports.
    pub port: Option<String>,
    pub auto_detect: bool,
    pub baud_rate: u32,
    /// Boards reboot when the port opens; wait this long before commanding.
    pub settle_ms: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            port: None,
            auto_detect: true,
            baud_rate: 9600,
            settle_ms: 2000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub endpoint: String,
    pub model: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
        }
    }
}

impl NpcConfig {
    /// Load from `path`, writing the defaults there first if it does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            let contents = fs::read_to_string(path)?;
            let config: Self = serde_json::from_str(&contents)?;
            config.validate()?;
            Ok(config)
        } else {
            let config = Self::default();
            config.save(path)?;
            Ok(config)
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(NpcError::InvalidConfig(msg.to_string()));
        if self.queue.capacity == 0 {
            return invalid("queue.capacity must be > 0");
        }
        if self.speech.poll_interval_ms == 0 {
            return invalid("speech.poll_interval_ms must be > 0");
        }
        if self.chat.small_batch_max == 0 || self.chat.small_batch_max >= self.chat.medium_batch_max
        {
            return invalid("chat.small_batch_max must be > 0 and < chat.medium_batch_max");
        }
        if self.chat.llm_timeout_ms == 0 {
            return invalid("chat.llm_timeout_ms must be > 0");
        }
        if self.chat.author_sample == 0 {
            return invalid("chat.author_sample must be > 0");
        }
        if self.gifts.celebrate_every == 0 {
            return invalid("gifts.celebrate_every must be > 0");
        }
        if self.gifts.streak_timeout_ms == 0 {
            return invalid("gifts.streak_timeout_ms must be > 0");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(NpcConfig::default().validate().is_ok());
    }

    #[test]
    fn test_missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("npc.json");
        let cfg = NpcConfig::load(&path).unwrap();
        assert!(path.exists());
        assert_eq!(cfg.queue.capacity, 100);
        assert_eq!(cfg.speech.gift.talk_cue, DeviceCommand::Gift);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("npc.json");
        fs::write(&path, r#"{"initial_mode":"joke","chat":{"repetition_threshold":2}}"#).unwrap();
        let cfg = NpcConfig::load(&path).unwrap();
        assert_eq!(cfg.initial_mode, Mode::Joke);
        assert_eq!(cfg.chat.repetition_threshold, 2);
        assert_eq!(cfg.chat.medium_batch_max, 15);
    }

    #[test]
    fn test_invalid_tiers_rejected() {
        let mut cfg = NpcConfig::default();
        cfg.chat.small_batch_max = 20;
        assert!(matches!(cfg.validate(), Err(NpcError::InvalidConfig(_))));
    }
}
