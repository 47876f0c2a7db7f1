//! Text normalization shared by the queue, the chat policy and content
//! collaborators.

use rand::seq::SliceRandom;
use rand::Rng;
use regex::Regex;
use std::sync::OnceLock;

/// Events longer than this are truncated on ingestion.
pub const MAX_EVENT_CHARS: usize = 500;

const FAKE_DONATION_KEYWORDS: &[&str] = &[
    "dono", "doné", "donate", "regalo", "te mando", "envío", "envio", "dinero", "pesos",
    "dolares", "dólares", "coins", "monedas", "tip", "propina", "gift", "present", "te doy",
    "aquí tienes",
];

fn pictographs() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"[\x{1F000}-\x{1FAFF}\x{2600}-\x{27BF}\x{2B00}-\x{2BFF}\x{E0020}-\x{E007F}\x{FE0F}\x{200D}\x{20E3}\x{3030}\x{231A}\x{231B}\x{23CF}\x{23E9}-\x{23FA}]+",
        )
        .ok()
    })
    .as_ref()
}

fn punctuation() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\p{L}\p{N}\s]+").ok()).as_ref()
}

/// Strip emoji and control characters, collapse whitespace, trim.
pub fn clean_text(text: &str) -> String {
    let stripped = match pictographs() {
        Some(re) => re.replace_all(text, " "),
        None => text.into(),
    };
    stripped
        .split(|c: char| c.is_whitespace() || c.is_control())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Cut `text` to at most `max_chars` characters, ending with `...` when cut.
pub fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(3);
    let mut out: String = text.chars().take(keep).collect();
    out.push_str("...");
    out
}

/// Case-insensitive substring match against any keyword.
pub fn contains_keyword(text: &str, keywords: &[&str]) -> bool {
    if text.is_empty() {
        return false;
    }
    let lower = text.to_lowercase();
    keywords.iter().any(|k| lower.contains(&k.to_lowercase()))
}

/// Whole-word match of any phrase, ignoring case and punctuation.
pub fn contains_phrase(text: &str, phrases: &[&str]) -> bool {
    let bare = |s: &str| -> String {
        let lower = s.to_lowercase();
        let stripped = match punctuation() {
            Some(re) => re.replace_all(&lower, " ").into_owned(),
            None => lower,
        };
        format!(" {} ", stripped.split_whitespace().collect::<Vec<_>>().join(" "))
    };
    let haystack = bare(text);
    phrases.iter().any(|p| {
        let needle = bare(p);
        !needle.trim().is_empty() && haystack.contains(&needle)
    })
}

/// A comment that claims to have donated. Only gift events are real gifts.
pub fn is_fake_donation(text: &str) -> bool {
    contains_keyword(text, FAKE_DONATION_KEYWORDS)
}

/// Lowercase, drop punctuation and stopwords, sort the remaining words.
pub fn normalize_question(text: &str, stopwords: &[String]) -> String {
    let lower = clean_text(text).to_lowercase();
    let bare = match punctuation() {
        Some(re) => re.replace_all(&lower, " "),
        None => lower.as_str().into(),
    };
    let mut words: Vec<&str> = bare
        .split_whitespace()
        .filter(|w| !stopwords.iter().any(|s| s == w))
        .collect();
    words.sort_unstable();
    words.join(" ")
}

/// Stable key for repetition tracking: FNV-1a over the normalized question.
pub fn question_key(text: &str, stopwords: &[String]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    normalize_question(text, stopwords)
        .bytes()
        .fold(OFFSET, |hash, b| (hash ^ u64::from(b)).wrapping_mul(PRIME))
}

/// Remarks triggered by the shape of a username.
pub fn name_remarks(username: &str) -> Vec<&'static str> {
    const SPECIAL: &[(&str, &str)] = &[
        ("admin", "Ser admin no te salva de mi sarcasmo."),
        ("user", "¡Qué original! ¿También tu contraseña es 'password'?"),
        ("guest", "Invitado... como el que no invitan a las fiestas."),
        ("test", "¿Eres un test? Porque has fallado en mi corazón."),
        ("null", "Tu nombre es 'null' como tu personalidad."),
        ("bot", "¿Bot? Al menos yo admito que soy artificial."),
        ("anonymous", "Anónimo... como el que dejó esa mancha en mi cara."),
        ("troll", "¿Troll? ¡Yo soy el monstruo bajo tu puente!"),
        ("gamer", "Los gamers no pueden pausar la vida real."),
        ("streamer", "Tu stream será mi escenario de terror."),
    ];

    let mut remarks = Vec::new();
    let len = username.chars().count();
    if len > 15 {
        remarks.push("Tu nombre es tan largo que me da pereza escribirlo completo.");
    } else if len > 0 && len < 4 {
        remarks.push("Tu nombre es tan corto como tu paciencia.");
    }
    if username.chars().any(|c| c.is_ascii_digit()) {
        remarks.push("Los números en tu nombre revelan falta de creatividad.");
    }
    let lower = username.to_lowercase();
    if let Some((_, remark)) = SPECIAL.iter().find(|(name, _)| lower.contains(name)) {
        remarks.push(remark);
    }
    remarks
}

/// Append one random name remark to `base`, if the name earns any.
pub fn personalize_by_name<R: Rng + ?Sized>(username: &str, base: &str, rng: &mut R) -> String {
    match name_remarks(username).choose(rng) {
        Some(remark) => format!("{base} {remark}"),
        None => base.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stops() -> Vec<String> {
        ["el", "la", "de", "que", "es", "por", "como", "cómo"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn test_clean_text_strips_emoji_and_whitespace() {
        assert_eq!(clean_text("  hola 😀😀   Poncho 🎉 "), "hola Poncho");
        assert_eq!(clean_text("🔥🔥🔥"), "");
        assert_eq!(clean_text("¿Cómo estás, niño?"), "¿Cómo estás, niño?");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("corto", 10), "corto");
        assert_eq!(truncate("abcdefghij", 6), "abc...");
    }

    #[test]
    fn test_contains_phrase_respects_word_boundaries() {
        assert!(contains_phrase("Hola, ¿cómo estás?", &["cómo estás"]));
        assert!(contains_phrase("HEY poncho", &["hey"]));
        assert!(!contains_phrase("chicharrón", &["hi"]));
        assert!(!contains_phrase("algo", &[""]));
    }

    #[test]
    fn test_fake_donation() {
        assert!(is_fake_donation("Te mando 100 PESOS"));
        assert!(!is_fake_donation("hola poncho"));
    }

    #[test]
    fn test_question_key_ignores_order_case_and_stopwords() {
        let a = question_key("¿Cómo estás Poncho?", &stops());
        let b = question_key("poncho estás", &stops());
        let c = question_key("estás POncho!!", &stops());
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_ne!(a, question_key("qué haces poncho", &stops()));
    }

    #[test]
    fn test_name_remarks() {
        assert!(name_remarks("Ana").len() == 1);
        assert!(name_remarks("gamer123").len() == 2);
        assert!(name_remarks("Roberto").is_empty());
        let mut rng = rand::thread_rng();
        assert_eq!(personalize_by_name("Roberto", "Hola.", &mut rng), "Hola.");
    }
}
