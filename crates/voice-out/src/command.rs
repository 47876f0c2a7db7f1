use crate::{Playback, Result, SpeechError, TtsEngine, Voice};
use std::process::{Child, Command, Stdio};
use tracing::{debug, warn};

/// Runs an external synthesizer (e.g. `edge-playback`, `espeak-ng`) per
/// utterance. `{text}` and `{voice}` in the argument list are substituted.
pub struct CommandTts {
    program: String,
    args: Vec<String>,
}

impl CommandTts {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    fn render_args(&self, text: &str, voice: &Voice) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.replace("{text}", text).replace("{voice}", voice.as_str()))
            .collect()
    }
}

impl TtsEngine for CommandTts {
    fn synthesize(&self, text: &str, voice: &Voice) -> Result<Box<dyn Playback>> {
        let args = self.render_args(text, voice);
        debug!("spawning {} {:?}", self.program, args);
        let child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| SpeechError::Unavailable(format!("{}: {e}", self.program)))?;
        Ok(Box::new(ChildPlayback { child, done: false }))
    }

    fn name(&self) -> &str {
        &self.program
    }
}

struct ChildPlayback {
    child: Child,
    done: bool,
}

impl Playback for ChildPlayback {
    fn is_finished(&mut self) -> bool {
        if self.done {
            return true;
        }
        match self.child.try_wait() {
            Ok(Some(status)) => {
                if !status.success() {
                    warn!("synthesizer exited with {}", status);
                }
                self.done = true;
            }
            Ok(None) => {}
            Err(e) => {
                warn!("synthesizer wait failed: {}", e);
                self.done = true;
            }
        }
        self.done
    }

    fn stop(&mut self) {
        if self.done {
            return;
        }
        let _ = self.child.kill();
        let _ = self.child.wait();
        self.done = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders_are_substituted() {
        let tts = CommandTts::new(
            "say",
            vec!["--voice".into(), "{voice}".into(), "{text}".into()],
        );
        let args = tts.render_args("hola", &Voice::new("es-MX-JorgeNeural"));
        assert_eq!(args, vec!["--voice", "es-MX-JorgeNeural", "hola"]);
    }

    #[test]
    fn test_missing_program_is_unavailable() {
        let tts = CommandTts::new("definitely-not-a-real-tts-binary", vec![]);
        let res = tts.synthesize("hola", &Voice::new("x"));
        assert!(matches!(res, Err(SpeechError::Unavailable(_))));
    }
}
