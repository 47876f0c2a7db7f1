use crate::NpcError;
use core::fmt;
use core::str::FromStr;
use device_link::DeviceCommand;
use serde::{Deserialize, Serialize};

/// Response behaviour governing how batches are answered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    OpenChat,
    Joke,
    Fortune,
    Riddle,
    Threat,
    Song,
    PublicDiscussion,
    Interview,
}

impl Mode {
    pub const ALL: [Mode; 8] = [
        Mode::OpenChat,
        Mode::Joke,
        Mode::Fortune,
        Mode::Riddle,
        Mode::Threat,
        Mode::Song,
        Mode::PublicDiscussion,
        Mode::Interview,
    ];

    /// Operator-facing number, 1-based.
    pub fn number(self) -> u8 {
        match self {
            Mode::OpenChat => 1,
            Mode::Joke => 2,
            Mode::Fortune => 3,
            Mode::Riddle => 4,
            Mode::Threat => 5,
            Mode::Song => 6,
            Mode::PublicDiscussion => 7,
            Mode::Interview => 8,
        }
    }

    pub fn from_number(n: u8) -> Option<Mode> {
        Mode::ALL.iter().copied().find(|m| m.number() == n)
    }

    pub fn key(self) -> &'static str {
        match self {
            Mode::OpenChat => "open_chat",
            Mode::Joke => "joke",
            Mode::Fortune => "fortune",
            Mode::Riddle => "riddle",
            Mode::Threat => "threat",
            Mode::Song => "song",
            Mode::PublicDiscussion => "public_discussion",
            Mode::Interview => "interview",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Mode::OpenChat => "Chat",
            Mode::Joke => "Chistes",
            Mode::Fortune => "Clarividente",
            Mode::Riddle => "Acertijos",
            Mode::Threat => "Terrorífico",
            Mode::Song => "Cantante",
            Mode::PublicDiscussion => "Conversación con Público",
            Mode::Interview => "Conversación con Invitado",
        }
    }

    /// Animation played on the device when this mode becomes active.
    pub fn entry_cue(self) -> Option<DeviceCommand> {
        match self {
            Mode::Joke | Mode::Song => Some(DeviceCommand::Happy),
            Mode::Fortune => Some(DeviceCommand::Blink),
            Mode::Threat => Some(DeviceCommand::Angry),
            _ => None,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.display_name(), self.number())
    }
}

impl FromStr for Mode {
    type Err = NpcError;

    /// Accepts the mode number or its snake_case key.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(n) = s.parse::<u8>() {
            return Mode::from_number(n).ok_or_else(|| NpcError::UnknownMode(s.to_string()));
        }
        let lower = s.to_ascii_lowercase().replace('-', "_");
        Mode::ALL
            .iter()
            .copied()
            .find(|m| m.key() == lower)
            .ok_or_else(|| NpcError::UnknownMode(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbers_are_unique_and_roundtrip() {
        for m in Mode::ALL {
            assert_eq!(Mode::from_number(m.number()), Some(m));
            assert_eq!(m.key().parse::<Mode>().unwrap(), m);
        }
        assert_eq!(Mode::from_number(0), None);
        assert_eq!(Mode::from_number(9), None);
    }

    #[test]
    fn test_parse_number_and_name() {
        assert_eq!("2".parse::<Mode>().unwrap(), Mode::Joke);
        assert_eq!("Public-Discussion".parse::<Mode>().unwrap(), Mode::PublicDiscussion);
        assert!(matches!("karaoke".parse::<Mode>(), Err(NpcError::UnknownMode(_))));
    }

    #[test]
    fn test_entry_cues() {
        assert_eq!(Mode::Threat.entry_cue(), Some(DeviceCommand::Angry));
        assert_eq!(Mode::OpenChat.entry_cue(), None);
    }
}
