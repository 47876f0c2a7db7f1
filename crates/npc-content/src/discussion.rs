//! Public discussion mode: a topic is opened on entry and audience
//! questions are answered from the topic's keyword tables.

use crate::pick::{fill, line, pick, strings};
use crate::snapshot::Snapshot;
use npc_core::text::{contains_keyword, contains_phrase, personalize_by_name};
use npc_core::{ContentSource, Event};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

const QUESTION_WORDS: &[&str] = &[
    "qué", "cómo", "cuál", "cuándo", "dónde", "por qué", "quién", "what", "how", "which", "when",
    "where", "why", "who",
];

/// Lines used when a question mentions any of `keywords`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordLines {
    pub keywords: Vec<String>,
    pub lines: Vec<String>,
}

impl KeywordLines {
    fn new(keywords: &[&str], lines: &[&str]) -> Self {
        Self {
            keywords: strings(keywords),
            lines: strings(lines),
        }
    }

    fn matches(&self, text: &str) -> bool {
        let keywords: Vec<&str> = self.keywords.iter().map(String::as_str).collect();
        contains_keyword(text, &keywords)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub title: String,
    pub description: String,
    pub answers: Vec<KeywordLines>,
    pub fallback: Vec<String>,
}

impl Topic {
    fn answer(&self, question: &str) -> String {
        let lines = self
            .answers
            .iter()
            .find(|a| a.matches(question))
            .map_or(self.fallback.as_slice(), |a| a.lines.as_slice());
        line(lines, "Buena pregunta, pero mi cerebro de payaso está más confundido que de costumbre.")
            .to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscussionData {
    pub topics: Vec<Topic>,
    pub greetings: Vec<String>,
    pub farewells: Vec<String>,
    pub quiet: Vec<String>,
    pub banned_words: Vec<String>,
    pub moderation: Vec<String>,
    pub conversations: u64,
    pub questions_answered: u64,
    /// Comments per participant across all conversations.
    pub participants: BTreeMap<String, u32>,
}

impl Default for DiscussionData {
    fn default() -> Self {
        Self {
            topics: vec![
                Topic {
                    title: "Vida de Payaso".to_string(),
                    description: "Hablemos sobre la vida en el circo.".to_string(),
                    answers: vec![
                        KeywordLines::new(
                            &["difícil", "dificil", "duro", "problema"],
                            &[
                                "Lo más difícil es fingir que disfruto haciendo reír a gente como tú.",
                                "El reto más grande es no llorar bajo el maquillaje.",
                            ],
                        ),
                        KeywordLines::new(
                            &["siempre", "quisiste", "soñabas"],
                            &[
                                "¿Querer ser payaso? Más bien la vida me convirtió en uno sin preguntarme.",
                                "Mi vocación llegó cuando descubrí que ya tenía la cara para ello.",
                            ],
                        ),
                    ],
                    fallback: strings(&[
                        "Ser payaso es como ser terapeuta, pero con peor sueldo y mejor maquillaje.",
                        "El circo es mi hogar, aunque más bien parece un manicomio ambulante.",
                    ]),
                },
                Topic {
                    title: "Consejos de la Vida".to_string(),
                    description: "Consejos sarcásticos para sobrevivir.".to_string(),
                    answers: vec![
                        KeywordLines::new(
                            &["feliz", "felicidad", "alegría"],
                            &[
                                "Para ser feliz: baja tus expectativas hasta el suelo, luego bájalas más.",
                                "Mi consejo: encuentra a alguien más despistado que tú y siéntete mejor.",
                            ],
                        ),
                        KeywordLines::new(
                            &["problemas", "superar"],
                            &[
                                "Los problemas son como el maquillaje: siempre se ven peor de cerca.",
                                "Si no puedes resolver un problema, búrlate de él.",
                            ],
                        ),
                    ],
                    fallback: strings(&[
                        "Mi filosofía: si vas a fracasar, al menos hazlo con estilo.",
                        "La vida es como un chiste malo: no tiene sentido, pero alguien se ríe.",
                    ]),
                },
                Topic {
                    title: "Preguntas Personales".to_string(),
                    description: "El público pregunta lo que quiera.".to_string(),
                    answers: vec![
                        KeywordLines::new(
                            &["comida", "comer", "favorita"],
                            &[
                                "Mi dieta consiste en decepción y algodón de azúcar.",
                                "Como de todo, especialmente las críticas. Son muy nutritivas.",
                            ],
                        ),
                        KeywordLines::new(
                            &["familia", "esposa", "hijos"],
                            &[
                                "Tengo familia, pero prefieren fingir que no me conocen en público.",
                                "Mis únicos parientes son los otros payasos, y eso ya dice mucho.",
                            ],
                        ),
                    ],
                    fallback: strings(&[
                        "Mi vida privada es tan emocionante como ver pintura secarse.",
                        "Prefiero no hablar de mi vida personal, ya es bastante trágica en público.",
                    ]),
                },
            ],
            greetings: strings(&[
                "¡Hola a todos! Bienvenidos a mi charla, donde la sabiduría es opcional y el sarcasmo garantizado.",
                "¡Saludos, querido público! Prepárense para opiniones que no pidieron.",
            ]),
            farewells: strings(&[
                "¡Hasta aquí la charla! Espero haber arruinado su día de manera entretenida.",
                "¡Nos vemos! La vida es como mi maquillaje, se ve mejor de lejos.",
            ]),
            quiet: strings(&[
                "¿Nadie tiene preguntas? Un público tan callado como inteligente.",
                "El silencio es oro, pero sus preguntas serían... bueno, tal vez plata.",
            ]),
            banned_words: strings(&["spam", "publicidad", "enlace", "http"]),
            moderation: strings(&[
                "¡Oye! Este es un espacio de conversación, no de spam.",
                "Nada de enlaces raros. Solo conversación civilizada... más o menos.",
            ]),
            conversations: 0,
            questions_answered: 0,
            participants: BTreeMap::new(),
        }
    }
}

#[derive(Debug)]
struct Session {
    topic: Topic,
    questions: u32,
    participants: HashSet<String>,
}

pub struct PublicDiscussion {
    data: Snapshot<DiscussionData>,
    // Lock order: session, then data.
    session: Mutex<Option<Session>>,
}

impl PublicDiscussion {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            data: Snapshot::at(path),
            session: Mutex::new(None),
        }
    }

    pub fn with_data(data: DiscussionData) -> Self {
        Self {
            data: Snapshot::in_memory(data),
            session: Mutex::new(None),
        }
    }

    pub fn topic(&self) -> Option<String> {
        self.session.lock().as_ref().map(|s| s.topic.title.clone())
    }

    /// Open a conversation on `wanted` (matched against titles) or a random
    /// topic, replacing any open one.
    pub fn start(&self, wanted: Option<&str>) -> String {
        let mut session = self.session.lock();
        let opened = self.data.update(|d| {
            let topic = match wanted {
                Some(w) => {
                    let w = w.to_lowercase();
                    d.topics.iter().find(|t| t.title.to_lowercase().contains(&w))
                }
                None => pick(&d.topics),
            }
            .cloned();
            if topic.is_some() {
                d.conversations += 1;
            }
            topic.map(|t| (t, line(&d.greetings, "¡Hola a todos!").to_string()))
        });
        let Some((topic, greeting)) = opened else {
            let titles = self
                .data
                .read(|d| d.topics.iter().map(|t| t.title.clone()).collect::<Vec<_>>());
            return match wanted {
                Some(w) if !titles.is_empty() => {
                    format!("No encontré el tema '{w}'. Temas disponibles: {}.", titles.join(", "))
                }
                _ => "No tengo temas de conversación disponibles.".to_string(),
            };
        };
        let text = format!(
            "{greeting} Conversación abierta: {}. {} ¡Hagan sus preguntas!",
            topic.title, topic.description
        );
        *session = Some(Session {
            topic,
            questions: 0,
            participants: HashSet::new(),
        });
        text
    }

    /// Close the open conversation with a short summary.
    pub fn finish(&self) -> String {
        let Some(session) = self.session.lock().take() else {
            return "No hay conversación activa que finalizar.".to_string();
        };
        let farewell = self
            .data
            .read(|d| line(&d.farewells, "¡Hasta luego!").to_string());
        format!(
            "{farewell} Hablamos de {}: {} preguntas y {} participantes.",
            session.topic.title,
            session.questions,
            session.participants.len()
        )
    }

    fn is_banned(&self, text: &str) -> bool {
        self.data.read(|d| {
            let words: Vec<&str> = d.banned_words.iter().map(String::as_str).collect();
            contains_keyword(text, &words)
        })
    }

    fn answer_question(&self, user: &str, question: &str) -> String {
        let answer = self.session.lock().as_mut().map(|active| {
            active.questions += 1;
            active.topic.answer(question)
        });
        let Some(answer) = answer else {
            return self.start(None);
        };
        self.data.update(|d| d.questions_answered += 1);
        let answer = personalize_by_name(user, &answer, &mut rand::thread_rng());
        format!("Pregunta de {user}: {question} {answer}")
    }

    fn remark(&self, user: &str, comment: &str) -> String {
        let lines: &[&str] = if contains_keyword(comment, &["aburrido", "malo", "no me gusta"]) {
            &[
                "¿Aburrido, {user}? ¡Perfecto! Así sé que estoy siendo auténtico.",
                "Lo siento {user}, no todos pueden apreciar el arte de la mediocridad.",
            ]
        } else if contains_keyword(comment, &["gracioso", "divertido", "me gusta"]) {
            &[
                "Gracias {user}, aunque no sé si creer en tu buen gusto.",
                "{user}, tu aprobación significa mucho... bueno, no tanto, pero algo.",
            ]
        } else if contains_keyword(comment, &["hola", "saludos", "buenas"]) {
            &[
                "¡Hola {user}! Bienvenido a mi charla, donde la lógica viene a morir.",
                "Saludos {user}, espero que estés preparado para la decepción.",
            ]
        } else {
            &[
                "Interesante comentario, {user}. Casi tan profundo como un charco.",
                "{user}, tu aporte es... bueno, es un aporte.",
            ]
        };
        pick(lines).map(|t| fill(t, user)).unwrap_or_default()
    }
}

fn is_question(text: &str) -> bool {
    text.contains('?') || contains_phrase(text, QUESTION_WORDS)
}

impl ContentSource for PublicDiscussion {
    fn name(&self) -> &str {
        "public_discussion"
    }

    fn intro(&self) -> anyhow::Result<Option<String>> {
        Ok(Some(self.start(None)))
    }

    fn respond(&self, batch: &[Event]) -> anyhow::Result<String> {
        if self.topic().is_none() {
            return Ok(self.start(None));
        }
        let allowed: Vec<&Event> = batch.iter().filter(|e| !self.is_banned(e.text())).collect();
        if allowed.is_empty() {
            return Ok(self
                .data
                .read(|d| line(&d.moderation, "¡Oye! Más respeto.").to_string()));
        }

        {
            let mut session = self.session.lock();
            if let Some(active) = session.as_mut() {
                for event in &allowed {
                    active.participants.insert(event.source_id().to_string());
                }
            }
            self.data.update(|d| {
                for event in &allowed {
                    *d.participants.entry(event.source_id().to_string()).or_insert(0) += 1;
                }
            });
        }

        if let Some(question) = allowed.iter().rev().find(|e| is_question(e.text())) {
            return Ok(self.answer_question(question.source_id(), question.text()));
        }
        match allowed.last() {
            Some(last) => Ok(self.remark(last.source_id(), last.text())),
            None => Ok(self.idle()),
        }
    }

    fn idle(&self) -> String {
        self.data
            .read(|d| line(&d.quiet, "¿Nadie tiene preguntas?").to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn discussion() -> PublicDiscussion {
        PublicDiscussion::with_data(DiscussionData::default())
    }

    #[test]
    fn test_start_named_topic_and_unknown_topic() {
        let talk = discussion();
        let text = talk.start(Some("consejos"));
        assert!(text.contains("Consejos de la Vida"));
        assert_eq!(talk.topic().as_deref(), Some("Consejos de la Vida"));

        let missing = talk.start(Some("astronomía"));
        assert!(missing.contains("Temas disponibles"));
        assert_eq!(talk.topic().as_deref(), Some("Consejos de la Vida"));
    }

    #[test]
    fn test_question_gets_topic_answer() {
        let talk = discussion();
        talk.start(Some("consejos"));
        let batch = [
            Event::comment("ana", "me encanta"),
            Event::comment("leo", "¿cómo ser feliz?"),
        ];
        let text = talk.respond(&batch).unwrap();
        assert!(text.starts_with("Pregunta de leo"));
        assert!(text.contains("expectativas") || text.contains("despistado"), "{text}");
    }

    #[test]
    fn test_negative_comment_is_not_read_as_praise() {
        let talk = discussion();
        talk.start(None);
        let text = talk.respond(&[Event::comment("leo", "no me gusta esto")]).unwrap();
        assert!(text.contains("Aburrido") || text.contains("mediocridad"), "{text}");
    }

    #[test]
    fn test_spam_only_batch_is_moderated() {
        let talk = discussion();
        talk.start(None);
        let text = talk
            .respond(&[Event::comment("bot", "visita mi enlace http://x")])
            .unwrap();
        assert!(DiscussionData::default().moderation.contains(&text));
    }

    #[test]
    fn test_finish_summarizes_session() {
        let talk = discussion();
        talk.start(Some("vida"));
        talk.respond(&[Event::comment("a", "¿es difícil?"), Event::comment("b", "hola")])
            .unwrap();
        let summary = talk.finish();
        assert!(summary.contains("1 preguntas y 2 participantes"), "{summary}");
        assert!(talk.topic().is_none());
        assert!(talk.finish().contains("No hay"));
    }
}
