use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    Comment,
    Spoken,
    Gift,
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EventCategory::Comment => "comment",
            EventCategory::Spoken => "spoken",
            EventCategory::Gift => "gift",
        })
    }
}

/// One inbound occurrence. Immutable once built.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    id: Uuid,
    source_id: String,
    text: String,
    category: EventCategory,
    #[serde(with = "time::serde::rfc3339")]
    received_at: OffsetDateTime,
}

impl Event {
    pub fn new(source_id: impl Into<String>, text: impl Into<String>, category: EventCategory) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_id: source_id.into(),
            text: text.into(),
            category,
            received_at: OffsetDateTime::now_utc(),
        }
    }

    pub fn comment(source_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(source_id, text, EventCategory::Comment)
    }

    pub fn spoken(source_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(source_id, text, EventCategory::Spoken)
    }

    pub fn gift(source_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(source_id, text, EventCategory::Gift)
    }

    /// Same event with its text replaced; used by the queue's normalization.
    pub(crate) fn with_text(mut self, text: String) -> Self {
        self.text = text;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn category(&self) -> EventCategory {
        self.category
    }

    pub fn is_gift(&self) -> bool {
        self.category == EventCategory::Gift
    }

    pub fn received_at(&self) -> OffsetDateTime {
        self.received_at
    }
}

/// Gift payload parsed from `"<name> x<count>"`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GiftInfo {
    pub name: String,
    pub quantity: u32,
}

impl GiftInfo {
    pub fn parse(text: &str) -> Self {
        let trimmed = text.trim();
        if let Some((name, count)) = trimmed.rsplit_once(|c: char| c == 'x' || c == 'X') {
            let name = name.trim();
            if let (false, Ok(quantity)) = (name.is_empty(), count.trim().parse::<u32>()) {
                return Self {
                    name: name.to_string(),
                    quantity: quantity.max(1),
                };
            }
        }
        Self {
            name: if trimmed.is_empty() { "regalo".to_string() } else { trimmed.to_string() },
            quantity: 1,
        }
    }
}

impl fmt::Display for GiftInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.quantity > 1 {
            write!(f, "{} x{}", self.name, self.quantity)
        } else {
            f.write_str(&self.name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gift_parse_with_count() {
        let g = GiftInfo::parse("Rosa x5");
        assert_eq!(g.name, "Rosa");
        assert_eq!(g.quantity, 5);
        assert_eq!(g.to_string(), "Rosa x5");
    }

    #[test]
    fn test_gift_parse_plain_name() {
        assert_eq!(GiftInfo::parse("Galaxy").quantity, 1);
        // a trailing "x" in the name is not a count
        let g = GiftInfo::parse("Box");
        assert_eq!(g.name, "Box");
        assert_eq!(g.quantity, 1);
        assert_eq!(GiftInfo::parse("  ").name, "regalo");
    }

    #[test]
    fn test_event_json_roundtrip_keeps_identity() {
        let e = Event::gift("ana", "Rosa x2");
        let json = serde_json::to_string(&e).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id(), e.id());
        assert!(back.is_gift());
    }
}
