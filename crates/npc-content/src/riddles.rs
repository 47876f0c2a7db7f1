//! Riddle mode: one active riddle at a time, graded answers, hints on
//! request and a persisted winners table.

use crate::pick::pick;
use crate::snapshot::Snapshot;
use npc_core::text::{contains_keyword, personalize_by_name};
use npc_core::{ContentSource, Event};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use tracing::debug;

const HINT_WORDS: &[&str] = &["pista", "ayuda", "hint"];
const RANKING_WORDS: &[&str] = &["ranking", "puntuacion", "puntuación"];
const NEW_WORDS: &[&str] = &["nuevo acertijo", "otro acertijo", "siguiente"];
const IGNORED_WORDS: &[&str] = &["el", "la", "los", "las", "un", "una", "es", "soy"];

/// Answers at least this similar to an accepted one count as correct.
const ACCEPT_SIMILARITY: f64 = 0.8;
/// Misses by one user before the answer is revealed.
const REVEAL_AFTER: u32 = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Riddle {
    pub question: String,
    pub answers: Vec<String>,
    pub hints: Vec<String>,
    pub difficulty: String,
    pub category: String,
}

impl Riddle {
    fn new(question: &str, answers: &[&str], hints: &[&str], difficulty: &str, category: &str) -> Self {
        Self {
            question: question.to_string(),
            answers: answers.iter().map(|s| s.to_string()).collect(),
            hints: hints.iter().map(|s| s.to_string()).collect(),
            difficulty: difficulty.to_string(),
            category: category.to_string(),
        }
    }

    pub fn accepts(&self, answer: &str) -> bool {
        let given = normalize_answer(answer);
        if given.is_empty() {
            return false;
        }
        self.answers.iter().map(|a| normalize_answer(a)).any(|expected| {
            given == expected || similarity(&given, &expected) > ACCEPT_SIMILARITY
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiddleData {
    pub riddles: Vec<Riddle>,
    pub winners: BTreeMap<String, u32>,
    pub posed: u64,
    pub solved: u64,
    pub attempts: u64,
}

impl Default for RiddleData {
    fn default() -> Self {
        Self {
            riddles: vec![
                Riddle::new(
                    "Tengo agujas pero no sé coser, tengo números pero no sé leer. ¿Qué soy?",
                    &["reloj"],
                    &["Me llevas en la muñeca.", "Hago tic tac."],
                    "facil",
                    "objetos",
                ),
                Riddle::new(
                    "Cuanto más le quitas, más grande se hace. ¿Qué es?",
                    &["agujero", "hoyo"],
                    &["Lo puedes cavar.", "Aparece en tus calcetines viejos."],
                    "medio",
                    "logica",
                ),
                Riddle::new(
                    "Vuela sin alas, llora sin ojos. ¿Qué es?",
                    &["nube"],
                    &["Vive en el cielo.", "Trae la lluvia."],
                    "medio",
                    "naturaleza",
                ),
                Riddle::new(
                    "Blanca por dentro, verde por fuera. Si quieres que te lo diga, espera.",
                    &["pera"],
                    &["Es una fruta.", "La respuesta está escondida en el acertijo."],
                    "facil",
                    "frutas",
                ),
                Riddle::new(
                    "Oro parece, plata no es. ¿Qué es?",
                    &["plátano", "platano"],
                    &["Es una fruta amarilla.", "A los monos les encanta."],
                    "facil",
                    "frutas",
                ),
                Riddle::new(
                    "Tiene dientes y no come, tiene cabeza y no es hombre. ¿Qué es?",
                    &["ajo"],
                    &["Se usa en la cocina.", "Espanta vampiros."],
                    "medio",
                    "cocina",
                ),
                Riddle::new(
                    "Todos me pisan pero yo no piso a nadie. ¿Qué soy?",
                    &["calle", "camino", "suelo"],
                    &["Tiene nombre y número.", "Los coches pasan por encima."],
                    "dificil",
                    "lugares",
                ),
                Riddle::new(
                    "Mientras más seca, más moja. ¿Qué es?",
                    &["toalla"],
                    &["La usas después de bañarte.", "Es de tela."],
                    "medio",
                    "objetos",
                ),
            ],
            winners: BTreeMap::new(),
            posed: 0,
            solved: 0,
            attempts: 0,
        }
    }
}

#[derive(Debug)]
struct Round {
    riddle: Riddle,
    hints_given: usize,
    misses: HashMap<String, u32>,
}

impl Round {
    fn next_hint(&mut self) -> Option<String> {
        if self.riddle.hints.is_empty() {
            return None;
        }
        let hint = self.riddle.hints[self.hints_given % self.riddle.hints.len()].clone();
        self.hints_given += 1;
        Some(hint)
    }
}

/// Outcome of grading one answer against the active riddle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Correct(String),
    Wrong(String),
    /// The user ran out of attempts and the answer was given away.
    Revealed(String),
    NoRiddle,
}

pub struct RiddleGame {
    data: Snapshot<RiddleData>,
    // Lock order: round, then data.
    round: Mutex<Option<Round>>,
}

impl RiddleGame {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            data: Snapshot::at(path),
            round: Mutex::new(None),
        }
    }

    pub fn with_data(data: RiddleData) -> Self {
        Self {
            data: Snapshot::in_memory(data),
            round: Mutex::new(None),
        }
    }

    pub fn active_question(&self) -> Option<String> {
        self.round.lock().as_ref().map(|r| r.riddle.question.clone())
    }

    /// Start a new round, replacing any active riddle.
    pub fn pose(&self) -> String {
        let mut round = self.round.lock();
        let current = round.as_ref().map(|r| r.riddle.question.clone());
        let picked = self.data.update(|d| {
            let fresh: Vec<&Riddle> = d
                .riddles
                .iter()
                .filter(|r| Some(&r.question) != current.as_ref())
                .collect();
            let picked = pick(&fresh).map(|r| (*r).clone()).or_else(|| pick(&d.riddles).cloned());
            if picked.is_some() {
                d.posed += 1;
            }
            picked
        });
        match picked {
            Some(riddle) => {
                let text = format!("Acertijo: {}", riddle.question);
                *round = Some(Round {
                    riddle,
                    hints_given: 0,
                    misses: HashMap::new(),
                });
                text
            }
            None => {
                *round = None;
                "¡Me quedé sin acertijos! Mi cerebro de payaso está vacío.".to_string()
            }
        }
    }

    pub fn hint(&self) -> String {
        let hint = {
            let mut round = self.round.lock();
            match round.as_mut() {
                Some(r) => r.next_hint(),
                None => None,
            }
        };
        match hint {
            Some(hint) => format!("Pista: {hint}"),
            None if self.active_question().is_none() => self.pose(),
            None => "No hay pistas para este. ¡Usa el cerebro!".to_string(),
        }
    }

    pub fn ranking(&self) -> String {
        let mut winners: Vec<(String, u32)> =
            self.data.read(|d| d.winners.iter().map(|(k, v)| (k.clone(), *v)).collect());
        if winners.is_empty() {
            return "Nadie ha resuelto un acertijo todavía. ¡Qué público tan brillante!".to_string();
        }
        winners.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        let entries: Vec<String> = winners
            .iter()
            .take(5)
            .enumerate()
            .map(|(i, (user, wins))| format!("{}. {user} con {wins}", i + 1))
            .collect();
        format!("Ranking de acertijos: {}.", entries.join(", "))
    }

    pub fn score(&self, user: &str) -> u32 {
        self.data.read(|d| d.winners.get(user).copied().unwrap_or(0))
    }

    /// Grade `answer` from `user` against the active riddle.
    pub fn check(&self, user: &str, answer: &str) -> Verdict {
        let mut round = self.round.lock();
        let Some(active) = round.as_mut() else {
            return Verdict::NoRiddle;
        };

        if active.riddle.accepts(answer) {
            let wins = self.data.update(|d| {
                d.attempts += 1;
                d.solved += 1;
                let wins = d.winners.entry(user.to_string()).or_insert(0);
                *wins += 1;
                *wins
            });
            *round = None;
            debug!("riddle solved by {user}");
            let line = format!(
                "¡Correcto, {user}! Por fin usaste eso que tienes entre las orejas. Llevas {wins} acertijos correctos."
            );
            return Verdict::Correct(personalize_by_name(user, &line, &mut rand::thread_rng()));
        }

        self.data.update(|d| d.attempts += 1);
        let misses = {
            let count = active.misses.entry(user.to_string()).or_insert(0);
            *count += 1;
            *count
        };
        if misses >= REVEAL_AFTER {
            let answer = active.riddle.answers.first().cloned().unwrap_or_default();
            *round = None;
            return Verdict::Revealed(format!(
                "Me rindo contigo, {user}. La respuesta era: {answer}. ¡Siguiente víctima!"
            ));
        }
        let taunt = match misses {
            1 => format!("Incorrecto, {user}. Piénsalo otra vez."),
            2 => format!("Nop, {user}. Esa tampoco es."),
            n => format!("¿En serio, {user}? Ya vas {n} intentos."),
        };
        let line = match (misses >= 2).then(|| active.next_hint()).flatten() {
            Some(hint) => format!("{taunt} Pista: {hint}"),
            None => taunt,
        };
        Verdict::Wrong(line)
    }

    pub fn stats(&self) -> (u64, u64, u64) {
        self.data.read(|d| (d.posed, d.solved, d.attempts))
    }
}

impl ContentSource for RiddleGame {
    fn name(&self) -> &str {
        "riddles"
    }

    fn intro(&self) -> anyhow::Result<Option<String>> {
        Ok(Some(self.pose()))
    }

    fn respond(&self, batch: &[Event]) -> anyhow::Result<String> {
        if self.active_question().is_none() {
            return Ok(self.pose());
        }
        let mut last_miss = None;
        for event in batch {
            let text = event.text();
            if contains_keyword(text, NEW_WORDS) {
                return Ok(self.pose());
            }
            if contains_keyword(text, HINT_WORDS) {
                return Ok(self.hint());
            }
            if contains_keyword(text, RANKING_WORDS) {
                return Ok(self.ranking());
            }
            match self.check(event.source_id(), text) {
                Verdict::Correct(line) | Verdict::Revealed(line) => return Ok(line),
                Verdict::Wrong(line) => last_miss = Some(line),
                Verdict::NoRiddle => {}
            }
        }
        match last_miss {
            Some(line) if batch.len() == 1 => Ok(line),
            _ => Ok(self.hint()),
        }
    }

    fn idle(&self) -> String {
        match self.active_question() {
            Some(question) => format!("¿Nadie? Sigo esperando: {question}"),
            None => "¿Quieren un acertijo? Escriban 'otro acertijo'.".to_string(),
        }
    }
}

/// Lowercase, drop punctuation and filler words.
fn normalize_answer(answer: &str) -> String {
    let lower: String = answer
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    let words: Vec<&str> = lower.split_whitespace().collect();
    let kept: Vec<&str> = words
        .iter()
        .copied()
        .filter(|w| !IGNORED_WORDS.contains(w))
        .collect();
    if kept.is_empty() {
        words.join(" ")
    } else {
        kept.join(" ")
    }
}

/// 1.0 for equal strings, falling towards 0.0 with edit distance.
fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let longest = a.len().max(b.len());
    if longest == 0 {
        return 0.0;
    }
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut cur = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        cur[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            cur[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(cur[j] + 1);
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    1.0 - prev[b.len()] as f64 / longest as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clock_only() -> RiddleGame {
        RiddleGame::with_data(RiddleData {
            riddles: vec![RiddleData::default().riddles[0].clone()],
            ..RiddleData::default()
        })
    }

    #[test]
    fn test_answer_normalization_and_similarity() {
        assert_eq!(normalize_answer("¡Es un RELOJ!"), "reloj");
        assert_eq!(normalize_answer("el"), "el");
        assert!(similarity("reloj", "relog") > ACCEPT_SIMILARITY);
        assert!(similarity("reloj", "perro") < ACCEPT_SIMILARITY);
        assert_eq!(similarity("", ""), 0.0);
    }

    #[test]
    fn test_correct_answer_scores_and_ends_round() {
        let game = clock_only();
        game.pose();
        match game.check("ana", "es un reloj") {
            Verdict::Correct(line) => assert!(line.contains("ana")),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(game.score("ana"), 1);
        assert!(game.active_question().is_none());
        assert_eq!(game.check("ana", "reloj"), Verdict::NoRiddle);
    }

    #[test]
    fn test_misses_escalate_then_reveal() {
        let game = clock_only();
        game.pose();
        let first = game.check("beto", "una silla");
        assert!(matches!(&first, Verdict::Wrong(l) if !l.contains("Pista")));
        let second = game.check("beto", "una mesa");
        assert!(matches!(&second, Verdict::Wrong(l) if l.contains("Pista")));
        game.check("beto", "x");
        game.check("beto", "y");
        match game.check("beto", "z") {
            Verdict::Revealed(line) => assert!(line.contains("reloj")),
            other => panic!("unexpected {other:?}"),
        }
        assert!(game.active_question().is_none());
    }

    #[test]
    fn test_batch_first_correct_answer_wins() {
        let game = clock_only();
        game.pose();
        let batch = [
            Event::comment("a", "una piedra"),
            Event::comment("b", "reloj"),
            Event::comment("c", "reloj"),
        ];
        let text = game.respond(&batch).unwrap();
        assert!(text.contains("Correcto, b"));
        assert_eq!(game.score("b"), 1);
        assert_eq!(game.score("c"), 0);
    }

    #[test]
    fn test_batch_hint_request_and_no_riddle() {
        let game = clock_only();
        let posed = game.respond(&[Event::comment("a", "hola")]).unwrap();
        assert!(posed.starts_with("Acertijo:"));

        let hint = game.respond(&[Event::comment("a", "dame una pista")]).unwrap();
        assert!(hint.starts_with("Pista:"));
    }

    #[test]
    fn test_ranking_orders_by_wins() {
        let game = clock_only();
        for user in ["ana", "beto", "ana"] {
            game.pose();
            game.check(user, "reloj");
        }
        assert_eq!(game.ranking(), "Ranking de acertijos: 1. ana con 2, 2. beto con 1.");
    }

    #[test]
    fn test_scores_survive_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("riddles.json");
        {
            let game = RiddleGame::new(Some(path.clone()));
            game.pose();
            while game.active_question().is_some() {
                let answer = RiddleData::default()
                    .riddles
                    .into_iter()
                    .find(|r| Some(&r.question) == game.active_question().as_ref())
                    .map(|r| r.answers[0].clone())
                    .unwrap();
                game.check("ana", &answer);
            }
        }
        let game = RiddleGame::new(Some(path));
        assert_eq!(game.score("ana"), 1);
    }
}
