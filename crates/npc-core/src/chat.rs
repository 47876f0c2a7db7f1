//! Open-chat policy: per-author replies for small batches, grouped replies
//! for medium ones and one aggregate line for bursts.

use crate::collaborator::ContentSource;
use crate::config::ChatConfig;
use crate::text::{clean_text, contains_phrase, is_fake_donation, personalize_by_name, question_key};
use crate::{Event, EventCategory};
use chat_model::{ChatModel, ChatRequest};
use parking_lot::Mutex;
use rand::seq::SliceRandom;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use tracing::{debug, warn};

struct QuestionFamily {
    triggers: &'static [&'static str],
    variations: &'static [&'static str],
}

const FAMILIES: &[QuestionFamily] = &[
    QuestionFamily {
        triggers: &["como estas", "cómo estás", "como estás", "que tal", "qué tal", "how are you"],
        variations: &[
            "¿Cómo estoy? Como un payaso en un funeral: fuera de lugar pero entreteniendo.",
            "Estoy como siempre: fingiendo que todo está bien mientras por dentro grito.",
            "Mi estado emocional es como mi maquillaje: una máscara colorida sobre el vacío.",
            "¿Yo? Estoy viviendo el sueño... de otra persona, porque el mío se volvió pesadilla.",
            "Como un globo desinflado: aún floto, pero ya no tengo la misma gracia.",
        ],
    },
    QuestionFamily {
        triggers: &["que haces", "qué haces", "what are you doing"],
        variations: &[
            "¿Qué hago? Fingir que soy gracioso mientras mi vida se desmorona lentamente.",
            "Lo mismo de siempre: hacer reír a otros mientras lloro por dentro.",
            "Actualmente estoy cuestionando mis decisiones de vida... todas fueron malas.",
            "Trabajo en mi nueva comedia: 'Cómo arruinar tu vida en 10 pasos fáciles'.",
            "Practico mi sonrisa falsa. Ya llevo 47 años y aún no la perfecciono.",
        ],
    },
    QuestionFamily {
        triggers: &["gracioso", "funny", "divertido"],
        variations: &[
            "¿Gracioso? Soy tan gracioso como un accidente de tráfico: todos miran, nadie disfruta.",
            "Mi humor es como el vino barato: parece buena idea hasta que lo pruebas.",
            "Gracioso es una palabra muy generosa. Prefiero 'tragicómico'.",
            "Si soy gracioso, mi vida es una comedia... de las que te hacen llorar.",
            "Mi humor es tan negro que absorbe la luz de las sonrisas ajenas.",
        ],
    },
    QuestionFamily {
        triggers: &["malo", "bad", "terrible"],
        variations: &[
            "¿Malo? Nah, soy pésimo. Lo malo al menos tiene potencial de mejorar.",
            "No soy malo, soy un artista incomprendido... muy, muy incomprendido.",
            "Malo es quedarse corto. Soy un desastre con patas y maquillaje.",
            "Al menos reconoces mi talento para la mediocridad. Eso ya es algo.",
            "Malo implica que hay algo bueno con qué comparar. En mi caso no existe.",
        ],
    },
    QuestionFamily {
        triggers: &["hola", "hi", "hey", "saludos"],
        variations: &[
            "Hola... otra víctima se acerca a mi espectáculo de horror.",
            "¡Saludos! Bienvenido a mi crisis existencial en tiempo real.",
            "Hola, espero que tengas mejores planes de vida que yo.",
            "¡Hey! Otro espectador para mi tragedia personal.",
            "Saludos, querida audiencia de mi descenso a la locura.",
        ],
    },
];

const ANTI_SPAM: &[&str] = &[
    "¿En serio vas a repetir lo mismo? Mi creatividad para insultarte también tiene límites.",
    "Ya preguntaste eso. ¿Tu memoria es tan mala como tu sentido del humor?",
    "Repetir la misma pregunta no va a cambiar que sigues siendo aburrido.",
    "¿Esta es tu estrategia? ¿Aburrir al payaso hasta la muerte? Está funcionando.",
    "Si vas a ser molesto, al menos sé original en tu molestia.",
];

const FALLBACKS: &[&str] = &[
    "Mi cerebro de payaso se sobrecargó con tantos comentarios brillantes.",
    "Wow, tanta sabiduría junta que no sé por dónde empezar a burlarme.",
    "El chat está más activo que mi carrera... y eso no es decir mucho.",
    "Tantos mensajes, tan poco tiempo para insultarlos a todos individualmente.",
    "Mi sarcasmo no da abasto para tanta 'profundidad' intelectual.",
];

const BURST_LINES: &[&str] = &[
    "¡{count} comentarios! ¿Esto es un chat o una invasión? Mi sarcasmo no da para tantos.",
    "Wow, {count} mensajes. El chat está más activo que mi vida amorosa.",
    "¡{count} comentarios! Si pusieran esa energía en algo útil... nah, mejor sigan aquí.",
    "{count} mensajes a la vez. Mi cerebro de payaso se sobrecargó de tanta 'brillantez'.",
    "¡{count} comentarios! ¿Es mi cumpleaños o qué? Porque esto se siente como un castigo.",
];

const IDLE_LINES: &[&str] = &[
    "El chat está más muerto que mi carrera de comediante. ¿Nadie va a decir nada?",
    "Qué silencio... hasta los grillos se aburrieron de ustedes.",
    "Escriban algo, que me estoy oxidando de tanto esperar.",
];

const QUESTION_MARKERS: &[&str] = &["qué", "cómo", "cuál", "cuándo", "dónde", "por qué", "quién"];
const COMPLIMENTS: &[&str] = &["gracioso", "genial", "me gusta", "te quiero", "crack"];
const COMPLAINTS: &[&str] = &["malo", "aburrido", "no me gusta", "feo"];
const GREETINGS: &[&str] = &["hola", "hi", "hey", "saludos", "buenas"];

/// Repetition history is forgotten once it tracks this many questions.
pub const MAX_TRACKED_QUESTIONS: usize = 2048;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChatStats {
    pub llm_calls: u64,
    pub timeouts: u64,
    pub failures: u64,
    pub anti_spam: u64,
    pub canned: u64,
}

/// Content source for open chat.
pub struct ChatPolicy {
    cfg: ChatConfig,
    model: Option<Arc<dyn ChatModel>>,
    /// Replies given per (author, normalized question).
    repetitions: Mutex<HashMap<(String, u64), u32>>,
    llm_calls: AtomicU64,
    timeouts: AtomicU64,
    failures: AtomicU64,
    anti_spam: AtomicU64,
    canned: AtomicU64,
}

impl ChatPolicy {
    pub fn new(cfg: ChatConfig, model: Option<Arc<dyn ChatModel>>) -> Self {
        Self {
            cfg,
            model,
            repetitions: Mutex::new(HashMap::new()),
            llm_calls: AtomicU64::new(0),
            timeouts: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            anti_spam: AtomicU64::new(0),
            canned: AtomicU64::new(0),
        }
    }

    pub fn stats(&self) -> ChatStats {
        ChatStats {
            llm_calls: self.llm_calls.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            anti_spam: self.anti_spam.load(Ordering::Relaxed),
            canned: self.canned.load(Ordering::Relaxed),
        }
    }

    /// Forget repetition history; returns how many questions were tracked.
    pub fn clear_repetitions(&self) -> usize {
        let mut reps = self.repetitions.lock();
        let n = reps.len();
        reps.clear();
        n
    }

    pub fn tracked_questions(&self) -> usize {
        self.repetitions.lock().len()
    }

    fn reply_small(&self, batch: &[Event]) -> String {
        batch
            .iter()
            .map(|event| format!("{}: {}", event.source_id(), self.reply_one(event)))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    fn reply_one(&self, event: &Event) -> String {
        let author = event.source_id();
        let key = (author.to_string(), question_key(event.text(), &self.cfg.stopwords));
        let seen = self.repetitions.lock().get(&key).copied().unwrap_or(0);
        let mut rng = rand::thread_rng();

        if seen >= self.cfg.repetition_threshold {
            self.anti_spam.fetch_add(1, Ordering::Relaxed);
            debug!("{author} repeated a question {seen} times");
            let line = ANTI_SPAM.choose(&mut rng).copied().unwrap_or("Ya preguntaste eso.");
            return personalize_by_name(author, line, &mut rng);
        }

        let reply = match canned_variation(event.text(), seen) {
            Some(line) => {
                self.canned.fetch_add(1, Ordering::Relaxed);
                personalize_by_name(author, line, &mut rng)
            }
            None => match self.ask_model(&individual_prompt(event)) {
                Some(text) => text,
                None => {
                    let line = FALLBACKS.choose(&mut rng).copied().unwrap_or("Mi cerebro se descompuso.");
                    personalize_by_name(author, line, &mut rng)
                }
            },
        };
        let mut reps = self.repetitions.lock();
        if reps.len() >= MAX_TRACKED_QUESTIONS && !reps.contains_key(&key) {
            debug!("forgetting {} tracked questions", reps.len());
            reps.clear();
        }
        *reps.entry(key).or_insert(0) += 1;
        reply
    }

    fn reply_grouped(&self, batch: &[Event]) -> String {
        let mut questions = Vec::new();
        let mut compliments = 0usize;
        let mut complaints = 0usize;
        let mut greeters: Vec<&str> = Vec::new();
        let mut others = 0usize;

        for event in batch {
            let text = event.text();
            if is_question(text) {
                questions.push(event);
            } else if contains_phrase(text, COMPLIMENTS) {
                compliments += 1;
            } else if contains_phrase(text, COMPLAINTS) {
                complaints += 1;
            } else if contains_phrase(text, GREETINGS) {
                if !greeters.contains(&event.source_id()) {
                    greeters.push(event.source_id());
                }
            } else {
                others += 1;
            }
        }

        let mut parts = Vec::new();
        if !greeters.is_empty() {
            let names: Vec<&str> = greeters.iter().take(3).copied().collect();
            parts.push(format!("¡Hola {}! Más víctimas para mi espectáculo.", names.join(", ")));
        }
        if compliments > 0 {
            parts.push(format!("{compliments} personas me halagan... claramente tienen mal gusto."));
        }
        if complaints > 0 {
            parts.push(format!("{complaints} personas me critican... al fin alguien con criterio."));
        }
        match questions.as_slice() {
            [] => {}
            [only] => {
                let author = only.source_id();
                match self.ask_model(&individual_prompt(only)) {
                    Some(answer) => parts.push(format!("{author} pregunta: {answer}")),
                    None => parts.push(format!(
                        "{author}, tu pregunta es tan profunda que necesito tiempo para procesarla."
                    )),
                }
            }
            many => parts.push(format!(
                "{} preguntas... ¿esto es un interrogatorio? Mi abogado dice que no responda.",
                many.len()
            )),
        }
        if others > 0 {
            parts.push(
                "El resto de comentarios son tan profundos que los haré marco para mi pared."
                    .to_string(),
            );
        }

        if parts.is_empty() {
            "El chat está tan activo que no sé si reír o llorar... mejor ambos.".to_string()
        } else {
            parts.join(" ")
        }
    }

    fn reply_burst(&self, batch: &[Event]) -> String {
        let mut rng = rand::thread_rng();
        let mut authors: Vec<&str> = Vec::new();
        for event in batch {
            if !authors.contains(&event.source_id()) {
                authors.push(event.source_id());
            }
        }
        let sample: Vec<&str> = authors
            .choose_multiple(&mut rng, self.cfg.author_sample)
            .copied()
            .collect();
        let line = BURST_LINES
            .choose(&mut rng)
            .copied()
            .unwrap_or("¡{count} comentarios!")
            .replace("{count}", &batch.len().to_string());
        format!(
            "{line}\n\nSaludos especiales a {} por contribuir al caos.",
            sample.join(", ")
        )
    }

    /// One completion with a hard deadline. A worker that misses it is left
    /// to finish on its own; its answer is discarded.
    fn ask_model(&self, prompt: &str) -> Option<String> {
        let model = Arc::clone(self.model.as_ref()?);
        let request = ChatRequest::single(&self.cfg.persona, prompt, self.cfg.max_tokens);
        self.llm_calls.fetch_add(1, Ordering::Relaxed);

        let (tx, rx) = mpsc::channel();
        let spawned = thread::Builder::new()
            .name("chat-completion".to_string())
            .spawn(move || {
                let _ = tx.send(model.complete(&request));
            });
        if let Err(e) = spawned {
            self.failures.fetch_add(1, Ordering::Relaxed);
            warn!("could not start completion worker: {e}");
            return None;
        }

        match rx.recv_timeout(self.cfg.llm_timeout()) {
            Ok(Ok(text)) => {
                let text = clean_text(&text);
                (!text.is_empty()).then_some(text)
            }
            Ok(Err(e)) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                warn!("chat completion failed: {e}");
                None
            }
            Err(RecvTimeoutError::Timeout) => {
                self.timeouts.fetch_add(1, Ordering::Relaxed);
                warn!("chat completion timed out after {:?}", self.cfg.llm_timeout());
                None
            }
            Err(RecvTimeoutError::Disconnected) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                warn!("chat completion worker exited without a reply");
                None
            }
        }
    }
}

impl ContentSource for ChatPolicy {
    fn name(&self) -> &str {
        "open-chat"
    }

    fn respond(&self, batch: &[Event]) -> anyhow::Result<String> {
        let reply = if batch.len() <= self.cfg.small_batch_max {
            self.reply_small(batch)
        } else if batch.len() <= self.cfg.medium_batch_max {
            self.reply_grouped(batch)
        } else {
            self.reply_burst(batch)
        };
        Ok(reply)
    }

    fn idle(&self) -> String {
        IDLE_LINES
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or("¿Hola? ¿Hay alguien?")
            .to_string()
    }
}

fn canned_variation(text: &str, seen: u32) -> Option<&'static str> {
    let family = FAMILIES.iter().find(|f| contains_phrase(text, f.triggers))?;
    family
        .variations
        .get(seen as usize % family.variations.len())
        .copied()
}

fn is_question(text: &str) -> bool {
    text.contains('?') || contains_phrase(text, QUESTION_MARKERS)
}

fn individual_prompt(event: &Event) -> String {
    let verb = match event.category() {
        EventCategory::Spoken => "te dijo en voz alta",
        _ => "comentó",
    };
    let mut prompt = format!(
        "Responde como Poncho el payaso sarcástico a {}, que {verb}: '{}'",
        event.source_id(),
        event.text()
    );
    if is_fake_donation(event.text()) {
        prompt.push_str(
            " (Dice que donó, pero no es un regalo real del sistema: búrlate de su donación falsa.)",
        );
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use chat_model::MockChatModel;
    use std::time::{Duration, Instant};

    fn policy(model: Option<MockChatModel>) -> ChatPolicy {
        ChatPolicy::new(
            ChatConfig::default(),
            model.map(|m| Arc::new(m) as Arc<dyn ChatModel>),
        )
    }

    fn comments(n: usize) -> Vec<Event> {
        (0..n)
            .map(|i| Event::comment(format!("user{i}"), format!("comentario numero {i}")))
            .collect()
    }

    #[test]
    fn test_small_batch_answers_each_author() {
        let p = policy(Some(MockChatModel::new("respuesta ingeniosa")));
        let reply = p.respond(&comments(3)).unwrap();
        assert_eq!(reply.matches("respuesta ingeniosa").count(), 3);
        for i in 0..3 {
            assert!(reply.contains(&format!("user{i}:")));
        }
        assert_eq!(p.stats().llm_calls, 3);
    }

    #[test]
    fn test_repetition_history_is_bounded() {
        let p = policy(None);
        for i in 0..MAX_TRACKED_QUESTIONS {
            p.reply_one(&Event::comment(format!("user{i}"), "¿cuánto mides?"));
        }
        assert_eq!(p.tracked_questions(), MAX_TRACKED_QUESTIONS);
        p.reply_one(&Event::comment("user0", "¿cuánto mides?"));
        assert_eq!(p.tracked_questions(), MAX_TRACKED_QUESTIONS);
        p.reply_one(&Event::comment("recien_llegado", "¿cuánto mides?"));
        assert_eq!(p.tracked_questions(), 1);
    }

    #[test]
    fn test_common_question_uses_rotating_variations() {
        let p = policy(None);
        let first = p.respond(&[Event::comment("Roberto", "hola, ¿qué tal?")]).unwrap();
        let second = p.respond(&[Event::comment("Roberto", "¿qué tal? hola")]).unwrap();
        assert_ne!(first, second);
        assert_eq!(p.stats().canned, 2);
        assert_eq!(p.stats().llm_calls, 0);
    }

    #[test]
    fn test_fourth_repeat_gets_anti_spam() {
        let model = MockChatModel::new("respuesta fresca");
        let requests = model.requests();
        let p = policy(Some(model));
        for _ in 0..3 {
            let reply = p
                .respond(&[Event::comment("Roberto", "¿Eres un robot de verdad?")])
                .unwrap();
            assert!(reply.contains("respuesta fresca"));
        }
        let fourth = p
            .respond(&[Event::comment("Roberto", "de verdad eres un robot?")])
            .unwrap();
        assert!(!fourth.contains("respuesta fresca"));
        assert!(ANTI_SPAM.iter().any(|line| fourth.contains(line)));
        assert_eq!(requests.lock().len(), 3);
        assert_eq!(p.stats().anti_spam, 1);
    }

    #[test]
    fn test_repetition_is_tracked_per_author() {
        let p = policy(Some(MockChatModel::new("ok")));
        for i in 0..4 {
            let reply = p
                .respond(&[Event::comment(format!("fan{i}"), "¿Tienes novia?")])
                .unwrap();
            assert!(reply.ends_with("ok"));
        }
        assert_eq!(p.stats().anti_spam, 0);
    }

    #[test]
    fn test_medium_batch_is_one_grouped_reply() {
        let model = MockChatModel::new("porque sí");
        let requests = model.requests();
        let p = policy(Some(model));
        let mut batch = vec![
            Event::comment("ana", "hola"),
            Event::comment("beto", "hola poncho"),
            Event::comment("carla", "eres genial"),
            Event::comment("dani", "que aburrido"),
            Event::comment("eli", "¿por qué eres payaso?"),
        ];
        batch.extend(comments(3));
        let reply = p.respond(&batch).unwrap();
        assert!(reply.contains("¡Hola ana, beto!"));
        assert!(reply.contains("1 personas me halagan"));
        assert!(reply.contains("1 personas me critican"));
        assert!(reply.contains("eli pregunta: porque sí"));
        assert!(reply.contains("El resto de comentarios"));
        assert_eq!(requests.lock().len(), 1);
    }

    #[test]
    fn test_burst_names_at_most_sample_authors() {
        let model = MockChatModel::new("nunca");
        let requests = model.requests();
        let p = policy(Some(model));
        let batch = comments(20);
        let reply = p.respond(&batch).unwrap();
        assert!(reply.contains("20"));
        let named = (0..20)
            .filter(|i| {
                // exact author tokens; user1 must not match user10..user19
                reply
                    .split(|c: char| !c.is_alphanumeric())
                    .any(|w| w == format!("user{i}"))
            })
            .count();
        assert_eq!(named, 3);
        assert!(requests.lock().is_empty());
    }

    #[test]
    fn test_slow_model_times_out_to_fallback() {
        let mut cfg = ChatConfig::default();
        cfg.llm_timeout_ms = 50;
        let model = MockChatModel::new("demasiado tarde").with_delay(Duration::from_millis(500));
        let p = ChatPolicy::new(cfg, Some(Arc::new(model)));
        let start = Instant::now();
        let reply = p.respond(&[Event::comment("ana", "cuéntame algo")]).unwrap();
        assert!(start.elapsed() < Duration::from_millis(400));
        assert!(!reply.contains("demasiado tarde"));
        assert_eq!(p.stats().timeouts, 1);
    }

    #[test]
    fn test_fake_donation_is_flagged_in_prompt() {
        let model = MockChatModel::new("ja");
        let requests = model.requests();
        let p = policy(Some(model));
        p.respond(&[Event::comment("ana", "te mando 1000 pesos")]).unwrap();
        let prompt = requests.lock()[0].last_user().unwrap_or_default().to_string();
        assert!(prompt.contains("donación falsa"));
    }
}
