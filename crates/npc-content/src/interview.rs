//! Guest interview mode. Spoken events are the guest talking; when the
//! guest is quiet the NPC asks one of the interview's questions.

use crate::discussion::KeywordLines;
use crate::pick::{fill, line, pick, strings};
use crate::snapshot::Snapshot;
use npc_core::text::clean_text;
use npc_core::{ContentSource, Event, EventCategory};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::path::PathBuf;

const HISTORY_LIMIT: usize = 50;
/// Guest utterances shorter than this are treated as noise.
const MIN_UTTERANCE_CHARS: usize = 3;
pub const DEFAULT_GUEST: &str = "invitado";

/// One interview format. `{user}` in lines is the guest's name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterviewKind {
    pub name: String,
    pub description: String,
    pub questions: Vec<String>,
    pub answers: Vec<KeywordLines>,
    pub fallback: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InterviewData {
    pub kinds: Vec<InterviewKind>,
    pub welcomes: Vec<String>,
    pub farewells: Vec<String>,
    pub interviews: u64,
    pub phrases_heard: u64,
    /// Interviews per guest.
    pub guests: BTreeMap<String, u32>,
}

impl Default for InterviewData {
    fn default() -> Self {
        Self {
            kinds: vec![
                InterviewKind {
                    name: "Entrevista Casual".to_string(),
                    description: "Conversación relajada y divertida.".to_string(),
                    questions: strings(&[
                        "¿cómo estás hoy?",
                        "¿qué tal tu experiencia aquí?",
                        "¿tienes alguna historia graciosa que contar?",
                    ]),
                    answers: vec![
                        KeywordLines {
                            keywords: strings(&["hola", "buenas", "hey"]),
                            lines: strings(&[
                                "¡Hola {user}! Bienvenido a mi show, donde la lógica viene a morir.",
                                "¡Hey {user}! Prepárate para preguntas que no sabías que existían.",
                            ]),
                        },
                        KeywordLines {
                            keywords: strings(&["mal", "cansado", "terrible", "horrible"]),
                            lines: strings(&[
                                "¿Mal día, {user}? Perfecto, así encajas con mi vida.",
                                "Tranquilo {user}, todos tenemos días malos... yo los tengo todos.",
                            ]),
                        },
                        KeywordLines {
                            keywords: strings(&["bien", "genial", "perfecto", "excelente"]),
                            lines: strings(&[
                                "¡Perfecto {user}! Me alegra, porque yo voy a arruinar tu día.",
                                "Excelente {user}, así me gusta, con energía para esta aventura.",
                            ]),
                        },
                    ],
                    fallback: strings(&[
                        "Interesante {user}, cuéntame más sobre eso.",
                        "Ya veo {user}, ¿y cómo te sientes al respecto?",
                        "Fascinante {user}, aunque no estoy seguro de qué significa.",
                    ]),
                },
                InterviewKind {
                    name: "Entrevista Personal".to_string(),
                    description: "Preguntas sobre la vida del invitado.".to_string(),
                    questions: strings(&[
                        "háblanos un poco sobre ti.",
                        "¿cuál es tu mayor pasión?",
                        "¿qué consejo le darías a la audiencia?",
                    ]),
                    answers: vec![
                        KeywordLines {
                            keywords: strings(&["familia", "padre", "madre", "hermano", "hijo"]),
                            lines: strings(&[
                                "¡Qué bonito, {user}! Mi familia también es especial... especialmente rara.",
                                "Familia... {user}, esa palabra me trae recuerdos dolorosos y cómicos.",
                            ]),
                        },
                        KeywordLines {
                            keywords: strings(&["trabajo", "carrera", "profesión", "empleo"]),
                            lines: strings(&[
                                "Tu trabajo suena mejor que el mío, {user}. Yo hago reír por dinero y fallo en ambas.",
                                "Interesante carrera, {user}. Yo elegí ser payaso, claramente no decido bien.",
                            ]),
                        },
                        KeywordLines {
                            keywords: strings(&["sueño", "meta", "objetivo", "ambición"]),
                            lines: strings(&[
                                "¡Qué ambicioso, {user}! Yo también tuve sueños... luego me desperté.",
                                "Me gusta tu actitud, {user}. Sigue soñando mientras puedas.",
                            ]),
                        },
                    ],
                    fallback: strings(&[
                        "Eso es muy personal, {user}. Gracias por compartirlo conmigo.",
                        "Aprecio tu honestidad, {user}. No todos son tan abiertos.",
                    ]),
                },
                InterviewKind {
                    name: "Entrevista Cómica".to_string(),
                    description: "Humor y entretenimiento.".to_string(),
                    questions: strings(&[
                        "¿cuál es tu chiste favorito?",
                        "¿qué piensas de los payasos?",
                        "¿has tenido alguna experiencia embarazosa?",
                    ]),
                    answers: vec![
                        KeywordLines {
                            keywords: strings(&["chiste", "gracioso", "divertido", "humor"]),
                            lines: strings(&[
                                "Los chistes son geniales, {user}. Tengo miles... todos malos.",
                                "El humor es subjetivo, {user}, pero el mío es objetivamente malo.",
                            ]),
                        },
                        KeywordLines {
                            keywords: strings(&["payaso", "circo", "espectáculo"]),
                            lines: strings(&[
                                "¡Hablando de payasos, {user}! Soy experto en la materia... lamentablemente.",
                                "El circo, {user}, mi dulce hogar... bueno, más bien agridulce.",
                            ]),
                        },
                    ],
                    fallback: strings(&[
                        "Ja, ja, ja... {user}, fingir que es gracioso es parte de mi trabajo.",
                        "Interesante, {user}. ¿Tienes más material como ese?",
                    ]),
                },
            ],
            welcomes: strings(&[
                "¡Bienvenido a mi show! Prepárate para sarcasmo y preguntas incómodas.",
                "¡Hola! Te advierto que soy un payaso, así que esta entrevista puede ser un desastre.",
            ]),
            farewells: strings(&[
                "¡Gracias por venir! Ha sido... bueno, ha sido algo.",
                "¡Hasta la próxima! Gracias por aguantar mis preguntas raras.",
            ]),
            interviews: 0,
            phrases_heard: 0,
            guests: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    Guest,
    Host,
}

#[derive(Debug)]
struct Session {
    guest: String,
    kind: InterviewKind,
    history: VecDeque<(Speaker, String)>,
}

impl Session {
    fn record(&mut self, speaker: Speaker, text: &str) {
        if self.history.len() == HISTORY_LIMIT {
            self.history.pop_front();
        }
        self.history.push_back((speaker, text.to_string()));
    }
}

pub struct GuestInterview {
    data: Snapshot<InterviewData>,
    default_guest: Mutex<String>,
    // Lock order: session, then data.
    session: Mutex<Option<Session>>,
}

impl GuestInterview {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self::from_snapshot(Snapshot::at(path))
    }

    pub fn with_data(data: InterviewData) -> Self {
        Self::from_snapshot(Snapshot::in_memory(data))
    }

    fn from_snapshot(data: Snapshot<InterviewData>) -> Self {
        Self {
            data,
            default_guest: Mutex::new(DEFAULT_GUEST.to_string()),
            session: Mutex::new(None),
        }
    }

    /// Guest name used when the mode opens an interview by itself.
    pub fn set_default_guest(&self, name: &str) {
        *self.default_guest.lock() = name.to_string();
    }

    pub fn guest(&self) -> Option<String> {
        self.session.lock().as_ref().map(|s| s.guest.clone())
    }

    /// Open an interview with `guest`, replacing any open one.
    pub fn start(&self, guest: &str, kind: Option<&str>) -> String {
        let mut session = self.session.lock();
        let opened = self.data.update(|d| {
            let picked = match kind {
                Some(k) => {
                    let k = k.to_lowercase();
                    d.kinds
                        .iter()
                        .find(|t| t.name.to_lowercase().contains(&k))
                        .or_else(|| pick(&d.kinds))
                }
                None => pick(&d.kinds),
            }
            .cloned()?;
            d.interviews += 1;
            *d.guests.entry(guest.to_string()).or_insert(0) += 1;
            Some((picked, line(&d.welcomes, "¡Bienvenido!").to_string()))
        });
        let Some((kind, welcome)) = opened else {
            return "No hay tipos de entrevista disponibles.".to_string();
        };
        let text = format!(
            "{welcome} Hoy conversamos con {guest}. {}: {}",
            kind.name, kind.description
        );
        *session = Some(Session {
            guest: guest.to_string(),
            kind,
            history: VecDeque::new(),
        });
        text
    }

    /// Ask the guest one of the interview's questions.
    pub fn ask(&self) -> String {
        let mut session = self.session.lock();
        let Some(active) = session.as_mut() else {
            return "No hay entrevista activa.".to_string();
        };
        let question = line(&active.kind.questions, "¿qué tal tu día?").to_string();
        let text = format!("{}, {question}", active.guest);
        active.record(Speaker::Host, &text);
        text
    }

    /// React to something the guest said; `None` for noise or no interview.
    pub fn hear(&self, said: &str) -> Option<String> {
        let said = clean_text(said);
        if said.chars().count() < MIN_UTTERANCE_CHARS {
            return None;
        }
        let reply = {
            let mut session = self.session.lock();
            let active = session.as_mut()?;
            active.record(Speaker::Guest, &said);
            let lines = active
                .kind
                .answers
                .iter()
                .find(|a| a.keywords.iter().any(|k| said.to_lowercase().contains(&k.to_lowercase())))
                .map_or(active.kind.fallback.as_slice(), |a| a.lines.as_slice());
            let reply = fill(line(lines, "Ya veo, {user}."), &active.guest);
            active.record(Speaker::Host, &reply);
            reply
        };
        self.data.update(|d| d.phrases_heard += 1);
        Some(reply)
    }

    pub fn finish(&self) -> String {
        let Some(session) = self.session.lock().take() else {
            return "No hay entrevista activa que finalizar.".to_string();
        };
        let farewell = self
            .data
            .read(|d| line(&d.farewells, "¡Hasta luego!").to_string());
        let heard = session
            .history
            .iter()
            .filter(|(speaker, _)| *speaker == Speaker::Guest)
            .count();
        format!("{farewell} {} habló {heard} veces conmigo.", session.guest)
    }

    /// Most recent exchanges, oldest first.
    pub fn history(&self, last: usize) -> Vec<(Speaker, String)> {
        self.session
            .lock()
            .as_ref()
            .map(|s| {
                let skip = s.history.len().saturating_sub(last);
                s.history.iter().skip(skip).cloned().collect()
            })
            .unwrap_or_default()
    }

    fn ensure_started(&self) -> Option<String> {
        if self.guest().is_some() {
            return None;
        }
        let guest = self.default_guest.lock().clone();
        Some(self.start(&guest, None))
    }
}

impl ContentSource for GuestInterview {
    fn name(&self) -> &str {
        "guest_interview"
    }

    fn intro(&self) -> anyhow::Result<Option<String>> {
        let guest = self.default_guest.lock().clone();
        Ok(Some(self.start(&guest, None)))
    }

    fn respond(&self, batch: &[Event]) -> anyhow::Result<String> {
        if let Some(opening) = self.ensure_started() {
            return Ok(opening);
        }
        let reply = batch
            .iter()
            .rev()
            .filter(|e| e.category() == EventCategory::Spoken)
            .find_map(|e| self.hear(e.text()));
        Ok(reply.unwrap_or_else(|| self.ask()))
    }

    fn idle(&self) -> String {
        self.ask()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interview() -> GuestInterview {
        GuestInterview::with_data(InterviewData::default())
    }

    #[test]
    fn test_start_picks_requested_kind() {
        let show = interview();
        let text = show.start("Lucía", Some("cómica"));
        assert!(text.contains("Lucía"));
        assert!(text.contains("Entrevista Cómica"));
        assert_eq!(show.guest().as_deref(), Some("Lucía"));
        assert_eq!(show.data.read(|d| d.guests.get("Lucía").copied()), Some(1));
    }

    #[test]
    fn test_guest_speech_gets_keyword_reply() {
        let show = interview();
        show.start("Lucía", Some("cómica"));
        let batch = [
            Event::comment("viewer", "jaja"),
            Event::spoken("mic", "me encanta el circo"),
        ];
        let text = show.respond(&batch).unwrap();
        assert!(text.contains("Lucía"));
        assert!(text.contains("payasos") || text.contains("circo"), "{text}");
        assert_eq!(show.history(10).len(), 2);
    }

    #[test]
    fn test_noise_and_comments_only_lead_to_a_question() {
        let show = interview();
        show.start("Lucía", Some("personal"));
        assert!(show.hear("eh").is_none());
        let text = show.respond(&[Event::comment("viewer", "hola")]).unwrap();
        assert!(text.starts_with("Lucía, "));
    }

    #[test]
    fn test_respond_without_session_opens_with_default_guest() {
        let show = interview();
        show.set_default_guest("Pedro");
        let text = show.respond(&[Event::spoken("mic", "hola a todos")]).unwrap();
        assert!(text.contains("Pedro"));
        assert_eq!(show.guest().as_deref(), Some("Pedro"));
    }

    #[test]
    fn test_finish_counts_guest_turns() {
        let show = interview();
        show.start("Lucía", Some("casual"));
        show.hear("hola poncho");
        show.hear("estoy bien");
        assert!(show.finish().contains("Lucía habló 2 veces"));
        assert!(show.guest().is_none());
    }
}
