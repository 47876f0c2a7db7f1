//! Line protocol read from stdin, one command per line.

use npc_core::{Event, Mode};

pub const HELP: &str = "\
commands:
  comment <user> <text>         chat comment
  spoken <user> <text>          transcribed speech
  gift <user> <gift>            single gift, e.g. `gift ana Rosa x3`
  combo <user>:<gift>, ...      gift combo
  mode <number|key>             switch mode
  guest <name> [kind]           start an interview with a guest
  status | metrics | gift-stats
  force | clear | reset-streak | gifts on|off
  help | quit";

#[derive(Debug, PartialEq)]
pub enum Command {
    Submit(Event),
    Combo(Vec<Event>),
    Mode(Mode),
    Guest { name: String, kind: Option<String> },
    Status,
    Metrics,
    GiftStats,
    Force,
    Clear,
    ResetStreak,
    Gifts(bool),
    Help,
    Quit,
}

/// Parse one input line. `Ok(None)` for blank lines and `#` comments.
pub fn parse_line(line: &str) -> Result<Option<Command>, String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let (verb, rest) = split_word(line);
    let command = match verb.to_ascii_lowercase().as_str() {
        "comment" | "c" => Command::Submit(user_text(rest, Event::comment)?),
        "spoken" | "s" => Command::Submit(user_text(rest, Event::spoken)?),
        "gift" | "g" => Command::Submit(user_text(rest, Event::gift)?),
        "combo" => Command::Combo(parse_combo(rest)?),
        "mode" | "m" => Command::Mode(rest.parse().map_err(|e| format!("{e}"))?),
        "guest" => {
            let (name, kind) = split_word(rest);
            if name.is_empty() {
                return Err("usage: guest <name> [kind]".into());
            }
            Command::Guest {
                name: name.to_string(),
                kind: (!kind.is_empty()).then(|| kind.to_string()),
            }
        }
        "status" => Command::Status,
        "metrics" => Command::Metrics,
        "gift-stats" => Command::GiftStats,
        "force" => Command::Force,
        "clear" => Command::Clear,
        "reset-streak" => Command::ResetStreak,
        "gifts" => match rest.to_ascii_lowercase().as_str() {
            "on" => Command::Gifts(true),
            "off" => Command::Gifts(false),
            _ => return Err("usage: gifts on|off".into()),
        },
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(format!("unknown command: {other} (try `help`)")),
    };
    Ok(Some(command))
}

/// Console line for a mode switch. Arguments follow the observer order.
pub fn describe_transition(new: Mode, old: Mode) -> String {
    format!("mode {old} -> {new}")
}

fn split_word(s: &str) -> (&str, &str) {
    let s = s.trim();
    match s.split_once(char::is_whitespace) {
        Some((head, tail)) => (head, tail.trim()),
        None => (s, ""),
    }
}

fn user_text(rest: &str, make: fn(String, String) -> Event) -> Result<Event, String> {
    let (user, text) = split_word(rest);
    if user.is_empty() || text.is_empty() {
        return Err("usage: <verb> <user> <text>".into());
    }
    Ok(make(user.to_string(), text.to_string()))
}

fn parse_combo(rest: &str) -> Result<Vec<Event>, String> {
    let events = rest
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| match part.split_once(':') {
            Some((user, gift)) if !user.trim().is_empty() && !gift.trim().is_empty() => {
                Ok(Event::gift(user.trim(), gift.trim()))
            }
            _ => Err(format!("bad combo entry `{part}`, expected user:gift")),
        })
        .collect::<Result<Vec<_>, _>>()?;
    if events.is_empty() {
        return Err("usage: combo <user>:<gift>, ...".into());
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use npc_core::EventCategory;

    fn submitted(line: &str) -> Event {
        match parse_line(line) {
            Ok(Some(Command::Submit(event))) => event,
            other => panic!("expected submit, got {other:?}"),
        }
    }

    #[test]
    fn test_comment_keeps_full_text() {
        let event = submitted("comment ana  hola poncho, ¿cómo estás?");
        assert_eq!(event.source_id(), "ana");
        assert_eq!(event.text(), "hola poncho, ¿cómo estás?");
        assert_eq!(event.category(), EventCategory::Comment);
    }

    #[test]
    fn test_gift_and_spoken_categories() {
        assert_eq!(submitted("gift beto Rosa x3").category(), EventCategory::Gift);
        assert_eq!(submitted("s host bienvenido").category(), EventCategory::Spoken);
    }

    #[test]
    fn test_combo_entries() {
        match parse_line("combo ana:Rosa, beto:León x2") {
            Ok(Some(Command::Combo(events))) => {
                assert_eq!(events.len(), 2);
                assert_eq!(events[1].source_id(), "beto");
                assert_eq!(events[1].text(), "León x2");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(parse_line("combo ana").is_err());
        assert!(parse_line("combo").is_err());
    }

    #[test]
    fn test_mode_by_number_and_key() {
        assert_eq!(parse_line("mode 4").unwrap(), Some(Command::Mode(Mode::Riddle)));
        assert_eq!(parse_line("mode joke").unwrap(), Some(Command::Mode(Mode::Joke)));
        assert!(parse_line("mode 42").is_err());
    }

    #[test]
    fn test_control_commands() {
        assert_eq!(parse_line("gifts off").unwrap(), Some(Command::Gifts(false)));
        assert!(parse_line("gifts maybe").is_err());
        assert_eq!(parse_line("QUIT").unwrap(), Some(Command::Quit));
        assert_eq!(
            parse_line("guest lucia comica").unwrap(),
            Some(Command::Guest {
                name: "lucia".into(),
                kind: Some("comica".into())
            })
        );
    }

    #[test]
    fn test_transition_reads_old_to_new() {
        let line = describe_transition(Mode::Joke, Mode::OpenChat);
        assert_eq!(line, format!("mode {} -> {}", Mode::OpenChat, Mode::Joke));
    }

    #[test]
    fn test_blank_and_invalid_lines() {
        assert_eq!(parse_line("   ").unwrap(), None);
        assert_eq!(parse_line("# note").unwrap(), None);
        assert!(parse_line("comment ana").is_err());
        assert!(parse_line("dance").is_err());
    }
}
