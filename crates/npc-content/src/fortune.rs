//! Fortune-teller mode.

use crate::pick::{fill, line, pick, strings};
use crate::snapshot::Snapshot;
use npc_core::text::{contains_keyword, personalize_by_name};
use npc_core::{ContentSource, Event};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

const PREDICTION_WORDS: &[&str] = &[
    "futuro", "destino", "predice", "prediccion", "predicción", "que pasara", "qué pasará",
    "clarividente", "adivina", "horoscopo", "horóscopo", "suerte", "amor",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub kind: String,
    pub text: String,
    pub probability: String,
}

impl Prediction {
    fn new(kind: &str, text: &str, probability: &str) -> Self {
        Self {
            kind: kind.to_string(),
            text: text.to_string(),
            probability: probability.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FortuneData {
    pub openers: Vec<String>,
    pub predictions: Vec<Prediction>,
    /// Mystic replies to ordinary comments; `{user}` is substituted.
    pub replies: Vec<String>,
    /// A user keeps the first prediction they were given.
    pub personal: BTreeMap<String, Prediction>,
    pub given: u64,
}

impl Default for FortuneData {
    fn default() -> Self {
        Self {
            openers: strings(&[
                "Las cartas me susurran...",
                "Mi bola de cristal se nubla...",
                "Los espíritus del circo me dicen...",
                "Las estrellas revelan...",
                "Mi tercer ojo de payaso ve...",
                "Los vientos del destino murmuran...",
            ]),
            predictions: vec![
                Prediction::new(
                    "amor",
                    "Veo romance en tu futuro... pero también veo que necesitas una ducha.",
                    "73%",
                ),
                Prediction::new(
                    "dinero",
                    "El dinero llegará a ti... cuando dejes de ser tan tacaño conmigo.",
                    "42%",
                ),
                Prediction::new(
                    "salud",
                    "Tu salud mejorará... si sueltas el celular y sales a caminar.",
                    "67%",
                ),
                Prediction::new(
                    "trabajo",
                    "Un cambio laboral se aproxima... ojalá sea para mejor.",
                    "55%",
                ),
                Prediction::new(
                    "viaje",
                    "Viajarás pronto... aunque sea solo al supermercado.",
                    "89%",
                ),
                Prediction::new(
                    "secreto",
                    "Alguien te oculta algo... probablemente que piensa que estás loco.",
                    "85%",
                ),
                Prediction::new("sorpresa", "Una sorpresa te espera... y no será barata.", "74%"),
            ],
            replies: strings(&[
                "{user}, las cartas dicen que ese comentario revela tu alma vacía...",
                "Mi bola de cristal se empañó al leer tu mensaje, {user}...",
                "Los espíritus me dicen que {user} necesita más sabiduría...",
                "{user}, el cosmos predice que dirás algo inteligente... algún día...",
                "Mi tercer ojo ve que {user} debería pensarlo dos veces antes de escribir...",
            ]),
            personal: BTreeMap::new(),
            given: 0,
        }
    }
}

pub struct FortuneTeller {
    data: Snapshot<FortuneData>,
}

impl FortuneTeller {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            data: Snapshot::at(path),
        }
    }

    pub fn with_data(data: FortuneData) -> Self {
        Self {
            data: Snapshot::in_memory(data),
        }
    }

    /// Prediction for `user`, remembered across calls.
    pub fn predict_for(&self, user: &str) -> String {
        let key = user.to_lowercase();
        let reading = self.data.update(|d| {
            let prediction = match d.personal.get(&key) {
                Some(stored) => stored.clone(),
                None => {
                    let fresh = pick(&d.predictions)?.clone();
                    let personalized = Prediction {
                        text: personalize_by_name(user, &fresh.text, &mut rand::thread_rng()),
                        ..fresh
                    };
                    d.personal.insert(key.clone(), personalized.clone());
                    personalized
                }
            };
            d.given += 1;
            Some(format!(
                "{} {} (Probabilidad: {})",
                line(&d.openers, "Las cartas dicen..."),
                prediction.text,
                prediction.probability
            ))
        });
        reading.unwrap_or_else(|| "Mi bola de cristal está rota. No puedo ver tu futuro.".to_string())
    }

    pub fn generic(&self) -> String {
        let reading = self.data.update(|d| {
            let prediction = pick(&d.predictions)?.clone();
            d.given += 1;
            Some(format!(
                "{} {} (Probabilidad: {})",
                line(&d.openers, "Las cartas dicen..."),
                prediction.text,
                prediction.probability
            ))
        });
        reading.unwrap_or_else(|| "Mi don profético está bloqueado. Intenta más tarde.".to_string())
    }

    /// Mystic answer to an ordinary comment.
    pub fn reply_to(&self, user: &str, comment: &str) -> String {
        if contains_keyword(comment, &["hola", "saludos"]) {
            return format!("{user}, ya sabía que ibas a saludar. Mi don es impresionante.");
        }
        if contains_keyword(comment, &["como estas", "cómo estás", "que tal", "qué tal"]) {
            return format!("{user}, estoy como las cartas predicen: molesto y sarcástico.");
        }
        if contains_keyword(comment, &["gracioso", "funny"]) {
            return format!("{user}, preveo que tu sentido del humor mejorará... en otra vida.");
        }
        let template = self
            .data
            .read(|d| line(&d.replies, "{user}, los espíritus guardan silencio...").to_string());
        personalize_by_name(user, &fill(&template, user), &mut rand::thread_rng())
    }

    pub fn given(&self) -> u64 {
        self.data.read(|d| d.given)
    }
}

impl ContentSource for FortuneTeller {
    fn name(&self) -> &str {
        "fortune"
    }

    fn intro(&self) -> anyhow::Result<Option<String>> {
        Ok(Some(self.generic()))
    }

    fn respond(&self, batch: &[Event]) -> anyhow::Result<String> {
        if let Some(asker) = batch
            .iter()
            .rev()
            .find(|e| contains_keyword(e.text(), PREDICTION_WORDS))
        {
            return Ok(self.predict_for(asker.source_id()));
        }
        match batch.last() {
            Some(last) => Ok(self.reply_to(last.source_id(), last.text())),
            None => Ok(self.generic()),
        }
    }

    fn idle(&self) -> String {
        "Los espíritus están callados... pregúntenme por su futuro.".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn teller() -> FortuneTeller {
        FortuneTeller::with_data(FortuneData::default())
    }

    #[test]
    fn test_prediction_sticks_to_user() {
        let fortune = teller();
        let first = fortune.predict_for("Marta");
        let second = fortune.predict_for("marta");
        let stored = fortune.data.read(|d| d.personal["marta"].text.clone());
        assert!(first.contains(&stored));
        assert!(second.contains(&stored));
        assert_eq!(fortune.given(), 2);
    }

    #[test]
    fn test_latest_asker_gets_the_prediction() {
        let fortune = teller();
        let batch = [
            Event::comment("uno", "¿cuál es mi futuro?"),
            Event::comment("dos", "hola"),
            Event::comment("tres", "adivina mi suerte"),
        ];
        fortune.respond(&batch).unwrap();
        let stored = fortune.data.read(|d| d.personal.keys().cloned().collect::<Vec<_>>());
        assert_eq!(stored, vec!["tres".to_string()]);
    }

    #[test]
    fn test_plain_batch_answers_last_author() {
        let fortune = teller();
        let batch = [Event::comment("uno", "qué aburrido"), Event::comment("pepe", "hola")];
        let text = fortune.respond(&batch).unwrap();
        assert!(text.starts_with("pepe, ya sabía"));
    }

    #[test]
    fn test_empty_tables_fall_back() {
        let fortune = FortuneTeller::with_data(FortuneData {
            openers: Vec::new(),
            predictions: Vec::new(),
            replies: Vec::new(),
            personal: BTreeMap::new(),
            given: 0,
        });
        assert!(fortune.generic().contains("bloqueado"));
        assert!(fortune.predict_for("ana").contains("rota"));
        assert_eq!(fortune.given(), 0);
    }
}
