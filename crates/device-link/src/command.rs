use core::fmt;
use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::TransportError;

/// Commands understood by the controller firmware.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DeviceCommand {
    Talk,
    Stop,
    Thinking,
    Reset,
    Happy,
    Sad,
    Angry,
    Blink,
    Gift,
    GiftStop,
    GiftCombo,
    GiftCelebration,
    Test,
    TestDual,
    /// Anything else the firmware may accept; must be a single non-empty token.
    Custom(String),
}

impl DeviceCommand {
    pub fn as_str(&self) -> &str {
        match self {
            DeviceCommand::Talk => "TALK",
            DeviceCommand::Stop => "STOP",
            DeviceCommand::Thinking => "THINKING",
            DeviceCommand::Reset => "RESET",
            DeviceCommand::Happy => "HAPPY",
            DeviceCommand::Sad => "SAD",
            DeviceCommand::Angry => "ANGRY",
            DeviceCommand::Blink => "BLINK",
            DeviceCommand::Gift => "GIFT",
            DeviceCommand::GiftStop => "GIFT_STOP",
            DeviceCommand::GiftCombo => "GIFT_COMBO",
            DeviceCommand::GiftCelebration => "GIFT_CELEBRATION",
            DeviceCommand::Test => "TEST",
            DeviceCommand::TestDual => "TEST_DUAL",
            DeviceCommand::Custom(raw) => raw,
        }
    }

    /// Line as written to the wire, newline terminated.
    pub fn to_line(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.as_str().len() + 1);
        out.extend_from_slice(self.as_str().as_bytes());
        out.push(b'\n');
        out
    }
}

impl fmt::Display for DeviceCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceCommand {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim().to_ascii_uppercase();
        let cmd = match token.as_str() {
            "TALK" => DeviceCommand::Talk,
            "STOP" => DeviceCommand::Stop,
            "THINKING" => DeviceCommand::Thinking,
            "RESET" => DeviceCommand::Reset,
            "HAPPY" => DeviceCommand::Happy,
            "SAD" => DeviceCommand::Sad,
            "ANGRY" => DeviceCommand::Angry,
            "BLINK" => DeviceCommand::Blink,
            "GIFT" => DeviceCommand::Gift,
            "GIFT_STOP" => DeviceCommand::GiftStop,
            "GIFT_COMBO" => DeviceCommand::GiftCombo,
            "GIFT_CELEBRATION" => DeviceCommand::GiftCelebration,
            "TEST" => DeviceCommand::Test,
            "TEST_DUAL" => DeviceCommand::TestDual,
            "" => return Err(TransportError::InvalidCommand("empty".to_string())),
            other if other.contains(char::is_whitespace) => {
                return Err(TransportError::InvalidCommand(other.to_string()))
            }
            other => DeviceCommand::Custom(other.to_string()),
        };
        Ok(cmd)
    }
}

impl TryFrom<String> for DeviceCommand {
    type Error = TransportError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DeviceCommand> for String {
    fn from(value: DeviceCommand) -> Self {
        value.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_commands_parse() {
        assert_eq!("talk".parse::<DeviceCommand>().unwrap(), DeviceCommand::Talk);
        assert_eq!(
            "GIFT_COMBO".parse::<DeviceCommand>().unwrap(),
            DeviceCommand::GiftCombo
        );
        assert_eq!(DeviceCommand::GiftCelebration.as_str(), "GIFT_CELEBRATION");
    }

    #[test]
    fn test_custom_and_invalid_commands() {
        assert_eq!(
            "wave".parse::<DeviceCommand>().unwrap(),
            DeviceCommand::Custom("WAVE".to_string())
        );
        assert!("".parse::<DeviceCommand>().is_err());
        assert!("two words".parse::<DeviceCommand>().is_err());
    }

    #[test]
    fn test_wire_line_is_newline_terminated() {
        assert_eq!(DeviceCommand::Thinking.to_line(), b"THINKING\n".to_vec());
    }
}
