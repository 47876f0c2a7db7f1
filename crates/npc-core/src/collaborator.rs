//! Seams for the content generators driven by the router and the gift path.

use crate::{Event, GiftInfo};
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::warn;

/// Content generator for one mode.
///
/// Implementations keep their own state behind interior locking; the core
/// calls them from the debounce thread and from mode changes.
pub trait ContentSource: Send + Sync {
    fn name(&self) -> &str;

    /// Utterance spoken when the mode becomes active.
    fn intro(&self) -> anyhow::Result<Option<String>> {
        Ok(None)
    }

    /// Answer a non-empty batch, in arrival order.
    fn respond(&self, batch: &[Event]) -> anyhow::Result<String>;

    /// Line used when there is nothing to answer.
    fn idle(&self) -> String;
}

/// Generates the gift channel's lines.
pub trait GiftAcknowledger: Send + Sync {
    fn acknowledge(&self, user: &str, gift: &GiftInfo, streak: u32) -> anyhow::Result<String>;

    fn combo(&self, gifts: &[(String, GiftInfo)], streak: u32) -> anyhow::Result<String> {
        let _ = streak;
        Ok(format!(
            "¡COMBO DE {} REGALOS! ¡Ustedes sí saben cómo hacer feliz a un robot!",
            gifts.len()
        ))
    }

    fn celebrate(&self, streak: u32) -> anyhow::Result<String> {
        Ok(format!(
            "¡¡¡RACHA DE {streak} REGALOS!!! ¡¡¡LA GENEROSIDAD ESTÁ IMPARABLE!!!"
        ))
    }

    /// Notice text for a streak that timed out, if any.
    fn streak_ended(&self, streak: u32) -> Option<String> {
        Some(format!(
            "Racha terminada. ¡{streak} regalos seguidos! ¿Quién empieza la siguiente?"
        ))
    }
}

/// Minimal acknowledger used when no content crate supplies one.
#[derive(Debug, Default, Clone, Copy)]
pub struct BasicThanks;

impl GiftAcknowledger for BasicThanks {
    fn acknowledge(&self, user: &str, gift: &GiftInfo, _streak: u32) -> anyhow::Result<String> {
        Ok(format!("¡Gracias {user} por {gift}!"))
    }
}

/// Run a collaborator call, turning errors and panics into `None`.
pub(crate) fn guarded<T>(what: &str, f: impl FnOnce() -> anyhow::Result<T>) -> Option<T> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Some(value),
        Ok(Err(e)) => {
            warn!("{what} failed: {e:#}");
            None
        }
        Err(_) => {
            warn!("{what} panicked");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guarded_converts_failures() {
        assert_eq!(guarded("ok", || Ok(3)), Some(3));
        assert_eq!(guarded::<u32>("err", || anyhow::bail!("boom")), None);
        #[allow(clippy::panic)]
        let panicked = guarded::<u32>("panic", || panic!("boom"));
        assert_eq!(panicked, None);
    }

    #[test]
    fn test_basic_thanks_mentions_user_and_gift() {
        let text = BasicThanks
            .acknowledge("ana", &GiftInfo::parse("Rosa x3"), 1)
            .unwrap();
        assert!(text.contains("ana"));
        assert!(text.contains("Rosa x3"));
    }
}
