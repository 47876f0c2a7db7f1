//! Joke mode: rated jokes, picked with a bias towards the best ones.

use crate::pick::{line, pick_weighted, strings};
use crate::snapshot::Snapshot;
use npc_core::text::{clean_text, contains_keyword, personalize_by_name};
use npc_core::{ContentSource, Event};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const REQUEST_WORDS: &[&str] = &["chiste", "joke", "gracioso", "divertido"];
const NO_JOKES: &str = "¡No tengo chistes! ¡Mi humor está más seco que mi personalidad!";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Joke {
    pub setup: String,
    pub punchline: String,
    pub category: String,
    /// 1 to 5; doubles as the pick weight.
    pub rating: u8,
}

impl Joke {
    fn new(setup: &str, punchline: &str, category: &str, rating: u8) -> Self {
        Self {
            setup: setup.to_string(),
            punchline: punchline.to_string(),
            category: category.to_string(),
            rating,
        }
    }

    pub fn text(&self) -> String {
        clean_text(&format!("{} {}", self.setup, self.punchline))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JokeData {
    pub jokes: Vec<Joke>,
    pub comebacks: Vec<String>,
    pub told: u64,
}

impl Default for JokeData {
    fn default() -> Self {
        Self {
            jokes: vec![
                Joke::new(
                    "¿Por qué el payaso nunca usa reloj?",
                    "Porque siempre llega a tiempo para hacer el ridículo.",
                    "payaso",
                    3,
                ),
                Joke::new(
                    "¿Qué le dijo un globo a otro globo?",
                    "Cuidado con el alfiler, que andas muy inflado.",
                    "clasico",
                    3,
                ),
                Joke::new(
                    "Me dijeron que mi nariz roja era falsa.",
                    "Lo único falso aquí es tu sentido del humor.",
                    "sarcasmo",
                    4,
                ),
                Joke::new(
                    "¿Cómo se despiden los químicos?",
                    "Ácido un placer.",
                    "clasico",
                    4,
                ),
                Joke::new(
                    "Fui al médico porque me dolía ser tan gracioso.",
                    "Me dijo que no me preocupara, que eso no me va a pasar nunca.",
                    "sarcasmo",
                    5,
                ),
                Joke::new("¿Qué hace una abeja en el gimnasio?", "¡Zum-ba!", "clasico", 3),
                Joke::new(
                    "Mi psicólogo me dijo que escribiera cartas a la gente que odio y luego las quemara.",
                    "Ya lo hice, pero ahora no sé qué hacer con las cartas.",
                    "sarcasmo",
                    5,
                ),
                Joke::new(
                    "Le pedí un aumento al dueño del circo.",
                    "Me subió al trapecio.",
                    "payaso",
                    4,
                ),
                Joke::new(
                    "¿Sabes por qué el mar es salado?",
                    "Porque los payasos lloramos mucho en la playa.",
                    "payaso",
                    4,
                ),
                Joke::new(
                    "Mi vida amorosa es como mis zapatos.",
                    "Enorme, ridícula y nadie quiere acercarse.",
                    "sarcasmo",
                    5,
                ),
                Joke::new(
                    "Dicen que la risa es la mejor medicina.",
                    "Por eso ningún médico me receta.",
                    "payaso",
                    4,
                ),
                Joke::new(
                    "¿Qué le dijo el cero al ocho?",
                    "Bonito cinturón.",
                    "clasico",
                    3,
                ),
            ],
            comebacks: strings(&[
                "¿Eso era un chiste? Porque no me reí.",
                "Si quieres algo gracioso, mírate al espejo.",
                "Mis chistes son como la vida: sin sentido y deprimentes.",
                "¿Te reíste? Perfecto, mi trabajo aquí está hecho.",
                "Pídeme un chiste y verás lo que es sufrir.",
            ]),
            told: 0,
        }
    }
}

pub struct JokeBook {
    data: Snapshot<JokeData>,
}

impl JokeBook {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            data: Snapshot::at(path),
        }
    }

    pub fn with_data(data: JokeData) -> Self {
        Self {
            data: Snapshot::in_memory(data),
        }
    }

    /// Tell a joke, optionally restricted to one category.
    pub fn tell(&self, category: Option<&str>) -> String {
        self.data.update(|d| {
            let picked = match category {
                Some(cat) => {
                    let matching: Vec<&Joke> =
                        d.jokes.iter().filter(|j| j.category.eq_ignore_ascii_case(cat)).collect();
                    pick_weighted(&matching, |j| u32::from(j.rating)).map(|j| j.text())
                }
                None => pick_weighted(&d.jokes, |j| u32::from(j.rating)).map(Joke::text),
            };
            match picked {
                Some(text) => {
                    d.told += 1;
                    text
                }
                None => NO_JOKES.to_string(),
            }
        })
    }

    pub fn add(&self, joke: Joke) {
        self.data.update(|d| d.jokes.push(joke));
    }

    /// Highest rated first.
    pub fn best(&self, limit: usize) -> Vec<Joke> {
        self.data.read(|d| {
            let mut jokes = d.jokes.clone();
            jokes.sort_by(|a, b| b.rating.cmp(&a.rating));
            jokes.truncate(limit);
            jokes
        })
    }

    pub fn told(&self) -> u64 {
        self.data.read(|d| d.told)
    }

    fn category_in(&self, text: &str) -> Option<String> {
        let lower = text.to_lowercase();
        self.data.read(|d| {
            d.jokes
                .iter()
                .map(|j| j.category.to_lowercase())
                .find(|c| lower.contains(c.as_str()))
        })
    }
}

impl ContentSource for JokeBook {
    fn name(&self) -> &str {
        "jokes"
    }

    fn intro(&self) -> anyhow::Result<Option<String>> {
        Ok(Some(self.tell(None)))
    }

    fn respond(&self, batch: &[Event]) -> anyhow::Result<String> {
        let request = batch
            .iter()
            .rev()
            .find(|e| contains_keyword(e.text(), REQUEST_WORDS));
        let Some(event) = request else {
            return Ok(self.tell(None));
        };
        let category = self.category_in(event.text());
        let joke = self.tell(category.as_deref());
        Ok(personalize_by_name(
            event.source_id(),
            &joke,
            &mut rand::thread_rng(),
        ))
    }

    fn idle(&self) -> String {
        self.data
            .read(|d| line(&d.comebacks, "Mi humor está de vacaciones.").to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book() -> JokeBook {
        JokeBook::with_data(JokeData::default())
    }

    #[test]
    fn test_intro_tells_a_known_joke() {
        let jokes = book();
        let text = jokes.intro().unwrap().unwrap();
        let known = JokeData::default().jokes;
        assert!(known.iter().any(|j| text.starts_with(&j.setup)));
        assert_eq!(jokes.told(), 1);
    }

    #[test]
    fn test_category_request_stays_in_category() {
        let jokes = book();
        let batch = [Event::comment("luis", "cuéntame un chiste de payaso")];
        let payaso: Vec<String> = JokeData::default()
            .jokes
            .into_iter()
            .filter(|j| j.category == "payaso")
            .map(|j| j.setup)
            .collect();
        for _ in 0..10 {
            let text = jokes.respond(&batch).unwrap();
            assert!(payaso.iter().any(|s| text.starts_with(s)), "{text}");
        }
    }

    #[test]
    fn test_empty_book_has_a_line() {
        let jokes = JokeBook::with_data(JokeData {
            jokes: Vec::new(),
            comebacks: Vec::new(),
            told: 0,
        });
        assert_eq!(jokes.tell(None), NO_JOKES);
        assert_eq!(jokes.told(), 0);
        assert!(!jokes.idle().is_empty());
    }

    #[test]
    fn test_best_sorts_by_rating() {
        let jokes = book();
        jokes.add(Joke::new("a", "b", "custom", 5));
        let best = jokes.best(3);
        assert_eq!(best.len(), 3);
        assert!(best.iter().all(|j| j.rating == 5));
    }
}
