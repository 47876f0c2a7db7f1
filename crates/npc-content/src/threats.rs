//! Spooky mode: playful threats that escalate with how often a viewer
//! keeps talking.

use crate::pick::{fill, line, pick, strings};
use crate::snapshot::Snapshot;
use npc_core::text::{contains_keyword, contains_phrase, personalize_by_name};
use npc_core::{ContentSource, Event};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Encounters answered with subtle threats before switching to direct ones.
const SUBTLE_UNTIL: u32 = 2;
/// Encounters before the threat starts counting the viewer's messages.
const DIRECT_UNTIL: u32 = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThreatData {
    pub subtle: Vec<String>,
    pub direct: Vec<String>,
    pub openers: Vec<String>,
    /// Encounters per viewer.
    pub scared: BTreeMap<String, u32>,
    pub sent: u64,
}

impl Default for ThreatData {
    fn default() -> Self {
        Self {
            subtle: strings(&[
                "Ya sé dónde vives... en tu casa, obviamente.",
                "Conozco todos tus secretos... como que comes pizza fría en el desayuno.",
                "Te estoy observando... a través de esta pantalla, como todos.",
                "Pronto vendré por ti... cuando termine este directo.",
                "Nunca estarás a salvo... de mis chistes malos.",
                "Tu tiempo se acaba... como la batería de tu teléfono.",
                "Los payasos nunca olvidan... sobre todo las caras de los que no comparten.",
            ]),
            direct: strings(&[
                "¡Te encontraré y te haré ver todos mis videos!",
                "¡Mi venganza será terrible... como mis chistes!",
                "¡Vendré de madrugada a tocar tu timbre hasta que despiertes!",
                "¡Mis globos de payaso flotarán hacia tu ventana!",
                "¡Mi risa siniestra resonará en tu cabeza toda la noche!",
                "¡Mis zapatos gigantes harán ruido bajo tu cama!",
            ]),
            openers: strings(&[
                "Desde las profundidades del circo abandonado...",
                "Con mi sonrisa congelada en la eternidad...",
                "En la oscuridad de mi alma payasa...",
                "Desde mi trono de pesadillas...",
                "En el silencio de la carpa vacía...",
            ]),
            scared: BTreeMap::new(),
            sent: 0,
        }
    }
}

pub struct ThreatBook {
    data: Snapshot<ThreatData>,
}

impl ThreatBook {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            data: Snapshot::at(path),
        }
    }

    pub fn with_data(data: ThreatData) -> Self {
        Self {
            data: Snapshot::in_memory(data),
        }
    }

    pub fn random(&self) -> String {
        self.data.update(|d| {
            let all: Vec<&String> = d.subtle.iter().chain(d.direct.iter()).collect();
            let Some(threat) = pick(&all).map(|t| t.to_string()) else {
                return "¡No tengo amenazas! Pero tu existencia ya es bastante aterradora.".to_string();
            };
            d.sent += 1;
            format!("{} {threat}", line(&d.openers, "Desde el vacío de mi existencia..."))
        })
    }

    /// Threat tuned to how many times `user` has been frightened already.
    pub fn personal(&self, user: &str) -> String {
        let (opener, threat) = self.data.update(|d| {
            let level = {
                let level = d.scared.entry(user.to_string()).or_insert(0);
                *level += 1;
                *level
            };
            d.sent += 1;
            let threat = if level <= SUBTLE_UNTIL {
                line(&d.subtle, "Te estoy observando...").to_string()
            } else if level <= DIRECT_UNTIL {
                line(&d.direct, "¡Ya verás!").to_string()
            } else {
                obsession(user, level)
            };
            (
                line(&d.openers, "Desde el vacío de mi existencia...").to_string(),
                threat,
            )
        });
        let threat = personalize_by_name(user, &threat, &mut rand::thread_rng());
        format!("{opener} {user}, {threat}")
    }

    /// Reply to one comment in character.
    pub fn answer(&self, user: &str, comment: &str) -> String {
        let canned: Option<&[&str]> = if contains_keyword(comment, &["miedo", "susto", "terror", "asusta"]) {
            Some(&[
                "¿Miedo, {user}? ¡Esto apenas empieza!",
                "El miedo es solo el principio, {user}...",
                "¿Te asusto, {user}? ¡Misión cumplida!",
            ])
        } else if contains_phrase(comment, &["no me asustas", "no da miedo", "no"]) {
            Some(&[
                "¿No te asusto, {user}? ¡Ya veremos!",
                "Valientes palabras, {user}... por ahora.",
                "¿Seguro, {user}? La noche es joven...",
            ])
        } else if contains_keyword(comment, &["hola", "saludos"]) {
            Some(&["Hola {user}... bienvenido a tu pesadilla favorita."])
        } else if contains_keyword(comment, &["ayuda", "help", "socorro"]) {
            Some(&["No hay ayuda para ti, {user}... solo yo."])
        } else if contains_keyword(comment, &["lindo", "tierno", "cute"]) {
            Some(&["¿Lindo, {user}? ¡Soy adorablemente terrorífico!"])
        } else {
            None
        };
        match canned.and_then(|lines| pick(lines)) {
            Some(template) => fill(template, user),
            None => self.personal(user),
        }
    }

    pub fn encounters(&self, user: &str) -> u32 {
        self.data.read(|d| d.scared.get(user).copied().unwrap_or(0))
    }
}

fn obsession(user: &str, level: u32) -> String {
    let lines = [
        format!("ya llevas {level} encuentros conmigo... ¡eso es obsesión!"),
        format!("después de {level} mensajes ya eres parte de mi circo del terror."),
        format!("¡{level} comentarios! Ya eres mi víctima oficial, {user}."),
    ];
    pick(&lines).cloned().unwrap_or_default()
}

impl ContentSource for ThreatBook {
    fn name(&self) -> &str {
        "threats"
    }

    fn intro(&self) -> anyhow::Result<Option<String>> {
        Ok(Some(self.random()))
    }

    fn respond(&self, batch: &[Event]) -> anyhow::Result<String> {
        match batch.last() {
            Some(last) => Ok(self.answer(last.source_id(), last.text())),
            None => Ok(self.random()),
        }
    }

    fn idle(&self) -> String {
        "Silencio... justo como me gusta antes de atacar.".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book() -> ThreatBook {
        ThreatBook::with_data(ThreatData::default())
    }

    #[test]
    fn test_threat_level_escalates() {
        let threats = book();
        let defaults = ThreatData::default();
        for _ in 0..SUBTLE_UNTIL {
            let text = threats.personal("raul");
            assert!(defaults.subtle.iter().any(|t| text.contains(t.as_str())), "{text}");
        }
        for _ in SUBTLE_UNTIL..DIRECT_UNTIL {
            let text = threats.personal("raul");
            assert!(defaults.direct.iter().any(|t| text.contains(t.as_str())), "{text}");
        }
        let text = threats.personal("raul");
        assert!(text.contains(&(DIRECT_UNTIL + 1).to_string()), "{text}");
        assert_eq!(threats.encounters("raul"), DIRECT_UNTIL + 1);
    }

    #[test]
    fn test_batch_answers_last_comment() {
        let threats = book();
        let batch = [
            Event::comment("uno", "hola"),
            Event::comment("dos", "me da miedo"),
        ];
        let text = threats.respond(&batch).unwrap();
        assert!(text.contains("dos"));
        assert!(!text.contains("uno"));
        assert_eq!(threats.encounters("dos"), 0);
    }

    #[test]
    fn test_denial_is_a_whole_word() {
        let threats = book();
        let text = threats.answer("ana", "no");
        assert!(text.contains("ana"));
        // "noche" must not read as a denial.
        threats.answer("ana", "buenas noches");
        assert_eq!(threats.encounters("ana"), 1);
    }

    #[test]
    fn test_random_threat_counts() {
        let threats = book();
        assert!(!threats.random().is_empty());
        assert_eq!(threats.data.read(|d| d.sent), 1);
    }
}
