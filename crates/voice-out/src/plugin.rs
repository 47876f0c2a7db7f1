#[cfg(feature = "mock")]
use crate::MockTts;
use crate::{CommandTts, SilentTts, TtsConfig, TtsEngine};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TtsBackendKind {
    Silent,
    Mock,
    Command,
}

impl std::str::FromStr for TtsBackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "silent" => Ok(Self::Silent),
            "mock" => Ok(Self::Mock),
            "command" => Ok(Self::Command),
            other => Err(format!("unknown tts backend: {other}")),
        }
    }
}

/// `command` is `(program, args)`; required for [`TtsBackendKind::Command`].
pub fn new_tts_backend(
    kind: TtsBackendKind,
    cfg: TtsConfig,
    command: Option<(String, Vec<String>)>,
) -> Result<Arc<dyn TtsEngine>, String> {
    match kind {
        TtsBackendKind::Silent => Ok(Arc::new(SilentTts::new(cfg))),
        TtsBackendKind::Mock => {
            #[cfg(feature = "mock")]
            {
                Ok(Arc::new(MockTts::new(std::time::Duration::from_millis(
                    cfg.min_ms,
                ))))
            }
            #[cfg(not(feature = "mock"))]
            {
                Err("mock feature not enabled".into())
            }
        }
        TtsBackendKind::Command => {
            let (program, args) = command.ok_or("command backend needs a program")?;
            Ok(Arc::new(CommandTts::new(program, args)))
        }
    }
}
