//! Gift channel lines: tiered thanks, streak milestones, combos and the
//! persisted donor statistics.

use crate::pick::{line, pick, strings};
use crate::snapshot::Snapshot;
use npc_core::text::clean_text;
use npc_core::{GiftAcknowledger, GiftInfo};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

const SPECIAL_WORDS: &[&str] = &["rosa", "rose", "león", "leon", "lion", "universo", "galaxy"];
const BIG_WORDS: &[&str] = &["dragón", "dragon", "corona", "castillo", "diamante", "oro"];
const SMALL_WORDS: &[&str] = &["corazón", "corazon", "estrella", "flor", "like", "pulgar"];
/// Quantities above this make a gift big regardless of its name.
const BIG_QUANTITY: u32 = 5;
/// Combo thanks name at most this many donors.
const NAMED_DONORS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GiftTier {
    Special,
    Big,
    Small,
    General,
}

impl GiftTier {
    pub fn of(gift: &GiftInfo) -> Self {
        let name = gift.name.to_lowercase();
        let named = |words: &[&str]| words.iter().any(|w| name.contains(w));
        if named(SPECIAL_WORDS) {
            GiftTier::Special
        } else if gift.quantity > BIG_QUANTITY || named(BIG_WORDS) {
            GiftTier::Big
        } else if gift.quantity == 1 || named(SMALL_WORDS) {
            GiftTier::Small
        } else {
            GiftTier::General
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThanksLines {
    pub general: Vec<String>,
    pub small: Vec<String>,
    pub big: Vec<String>,
    pub special: Vec<String>,
}

impl ThanksLines {
    fn for_tier(&self, tier: GiftTier) -> &[String] {
        let lines = match tier {
            GiftTier::Special => &self.special,
            GiftTier::Big => &self.big,
            GiftTier::Small => &self.small,
            GiftTier::General => &self.general,
        };
        if lines.is_empty() {
            &self.general
        } else {
            lines
        }
    }
}

impl Default for ThanksLines {
    fn default() -> Self {
        Self {
            general: strings(&[
                "¡INCREÍBLE! ¡Muchísimas gracias por este regalo! ¡Eres fantástico!",
                "¡WOW! ¡No puedo creer lo generoso que eres!",
                "¡ESPECTACULAR! ¡Este regalo me llena de alegría!",
                "¡FANTÁSTICO! ¡Gracias de todo corazón! ¡Eres una persona increíble!",
            ]),
            small: strings(&[
                "¡Qué detalle tan hermoso! ¡Los regalos pequeños tienen el corazón más grande!",
                "¡Me encanta! ¡No importa el tamaño, importa el cariño!",
                "¡Adorable! ¡Con regalos como este el mundo es más bonito!",
            ]),
            big: strings(&[
                "¡¡¡INCREÍBLE!!! ¡¡¡NO PUEDO CREER TANTA GENEROSIDAD!!!",
                "¡¡¡WOW WOW WOW!!! ¡¡¡Este regalo me tiene saltando de emoción!!!",
                "¡¡¡SÚPER MEGA GENIAL!!! ¡¡¡Eres la persona más generosa del mundo!!!",
            ]),
            special: strings(&[
                "¡REGALO ÚNICO! ¡Tu detalle me llena el corazón!",
                "¡REGALO MÁGICO! ¡Tu energía positiva me contagia!",
            ]),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GiftTotals {
    /// Gift events acknowledged.
    pub received: u64,
    /// Sum of quantities.
    pub items: u64,
    pub best_streak: u32,
    pub by_gift: BTreeMap<String, u64>,
    pub donors: BTreeMap<String, u64>,
}

impl GiftTotals {
    fn record(&mut self, user: &str, gift: &GiftInfo) {
        let user = clean_text(user);
        let name = clean_text(&gift.name);
        let quantity = u64::from(gift.quantity.max(1));
        self.received += 1;
        self.items += quantity;
        *self.by_gift.entry(name).or_insert(0) += quantity;
        *self.donors.entry(user).or_insert(0) += quantity;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GiftData {
    pub thanks: ThanksLines,
    pub blessings: Vec<String>,
    /// Extra line when the streak reaches exactly this count.
    pub streak_lines: BTreeMap<u32, String>,
    pub combo_reactions: Vec<String>,
    pub group_blessings: Vec<String>,
    pub totals: GiftTotals,
}

impl Default for GiftData {
    fn default() -> Self {
        Self {
            thanks: ThanksLines::default(),
            blessings: strings(&[
                "¡Que tengas salud, amor y prosperidad!",
                "¡Que se cumplan todos tus deseos más bonitos!",
                "¡Que la felicidad te acompañe siempre!",
                "¡Que la vida te devuelva toda tu generosidad multiplicada!",
                "¡Que cada día sea mejor que el anterior!",
            ]),
            streak_lines: [
                (2, "¡DOS REGALOS! ¡La generosidad se está contagiando!"),
                (3, "¡TRES REGALOS SEGUIDOS! ¡Este chat está lleno de corazones hermosos!"),
                (5, "¡CINCO REGALOS! ¡Ustedes son increíbles!"),
                (10, "¡¡¡DIEZ REGALOS!!! ¡¡¡No puedo creer tanta generosidad!!!"),
                (15, "¡¡¡QUINCE REGALOS!!! ¡¡¡ESTE ES EL MEJOR DÍA DE MI VIDA!!!"),
            ]
            .into_iter()
            .map(|(n, s)| (n, s.to_string()))
            .collect(),
            combo_reactions: strings(&[
                "¡COMBO DE BONDAD! ¡Mi corazón va a explotar de felicidad!",
                "¡LLUVIA DE REGALOS! ¡No sé a quién agradecer primero!",
                "¡AVALANCHA DE AMOR! ¡Tantos regalos que no puedo parar de sonreír!",
            ]),
            group_blessings: strings(&[
                "¡Que la vida les devuelva toda esta generosidad multiplicada!",
                "¡Que tengan el día más hermoso y lleno de bendiciones!",
            ]),
            totals: GiftTotals::default(),
        }
    }
}

pub struct GiftThanks {
    data: Snapshot<GiftData>,
}

impl GiftThanks {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            data: Snapshot::at(path),
        }
    }

    pub fn with_data(data: GiftData) -> Self {
        Self {
            data: Snapshot::in_memory(data),
        }
    }

    pub fn totals(&self) -> GiftTotals {
        self.data.read(|d| d.totals.clone())
    }

    pub fn top_donors(&self, limit: usize) -> Vec<(String, u64)> {
        self.data.read(|d| top(&d.totals.donors, limit))
    }

    pub fn top_gifts(&self, limit: usize) -> Vec<(String, u64)> {
        self.data.read(|d| top(&d.totals.by_gift, limit))
    }

    /// One-paragraph report of the persisted statistics.
    pub fn summary(&self) -> String {
        let totals = self.totals();
        let mut out = format!(
            "Regalos recibidos: {} ({} en total). Mejor racha: {}.",
            totals.received, totals.items, totals.best_streak
        );
        let donors = self.top_donors(5);
        if !donors.is_empty() {
            let names: Vec<String> = donors.iter().map(|(u, n)| format!("{u} ({n})")).collect();
            out.push_str(&format!(" Más generosos: {}.", names.join(", ")));
        }
        let gifts = self.top_gifts(5);
        if !gifts.is_empty() {
            let names: Vec<String> = gifts.iter().map(|(g, n)| format!("{g} ({n})")).collect();
            out.push_str(&format!(" Más populares: {}.", names.join(", ")));
        }
        out
    }
}

fn top(counts: &BTreeMap<String, u64>, limit: usize) -> Vec<(String, u64)> {
    let mut entries: Vec<(String, u64)> = counts.iter().map(|(k, v)| (k.clone(), *v)).collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    entries.truncate(limit);
    entries
}

impl GiftAcknowledger for GiftThanks {
    fn acknowledge(&self, user: &str, gift: &GiftInfo, streak: u32) -> anyhow::Result<String> {
        let tier = GiftTier::of(gift);
        Ok(self.data.update(|d| {
            d.totals.record(user, gift);
            d.totals.best_streak = d.totals.best_streak.max(streak);

            let base = line(d.thanks.for_tier(tier), "¡Gracias por tu regalo!");
            let mut text = format!("¡{}! {base}", clean_text(user).to_uppercase());
            if gift.quantity > 1 {
                text.push_str(&format!(
                    " ¡Y no solo uno, sino {} {}! ¡Increíble!",
                    gift.quantity, gift.name
                ));
            } else {
                text.push_str(&format!(" ¡Tu {} me hace tan feliz!", gift.name));
            }
            if let Some(blessing) = pick(&d.blessings) {
                text.push(' ');
                text.push_str(blessing);
            }
            if let Some(milestone) = d.streak_lines.get(&streak) {
                text.push(' ');
                text.push_str(milestone);
            }
            text
        }))
    }

    fn combo(&self, gifts: &[(String, GiftInfo)], streak: u32) -> anyhow::Result<String> {
        if gifts.is_empty() {
            return Ok("¡Error procesando regalos! ¡Pero igual los amo a todos!".to_string());
        }
        Ok(self.data.update(|d| {
            for (user, gift) in gifts {
                d.totals.record(user, gift);
            }
            d.totals.best_streak = d.totals.best_streak.max(streak);

            let mut donors: Vec<&str> = Vec::new();
            for (user, _) in gifts {
                if !donors.contains(&user.as_str()) {
                    donors.push(user);
                }
            }
            let reaction = line(&d.combo_reactions, "¡COMBO DE REGALOS!");
            let group = match donors.as_slice() {
                [only] => format!(
                    "¡{}! ¡{} regalos de ti! ¡Eres increíblemente generoso!",
                    only.to_uppercase(),
                    gifts.len()
                ),
                many => {
                    let mut named = many
                        .iter()
                        .take(NAMED_DONORS)
                        .copied()
                        .collect::<Vec<_>>()
                        .join(", ");
                    if many.len() > NAMED_DONORS {
                        named.push_str(&format!(" y {} personas más", many.len() - NAMED_DONORS));
                    }
                    format!("¡Gracias {named} por {} regalos maravillosos!", gifts.len())
                }
            };
            let blessing = line(&d.group_blessings, "¡Los quiero a todos!");
            format!("{reaction} {group} {blessing}")
        }))
    }

    fn celebrate(&self, streak: u32) -> anyhow::Result<String> {
        let best = self.data.update(|d| {
            d.totals.best_streak = d.totals.best_streak.max(streak);
            d.totals.best_streak
        });
        Ok(format!(
            "¡¡¡RACHA DE {streak} REGALOS!!! ¡¡¡LA GENEROSIDAD ESTÁ IMPARABLE!!! Récord: {best}."
        ))
    }

    fn streak_ended(&self, streak: u32) -> Option<String> {
        (streak > 0).then(|| {
            format!("Racha terminada en {streak} regalos. ¡Fue increíble mientras duró!")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thanks() -> GiftThanks {
        GiftThanks::with_data(GiftData::default())
    }

    #[test]
    fn test_tiers() {
        assert_eq!(GiftTier::of(&GiftInfo::parse("Rosa")), GiftTier::Special);
        assert_eq!(GiftTier::of(&GiftInfo::parse("Galleta x10")), GiftTier::Big);
        assert_eq!(GiftTier::of(&GiftInfo::parse("Corona x2")), GiftTier::Big);
        assert_eq!(GiftTier::of(&GiftInfo::parse("Galleta")), GiftTier::Small);
        assert_eq!(GiftTier::of(&GiftInfo::parse("Estrella x3")), GiftTier::Small);
        assert_eq!(GiftTier::of(&GiftInfo::parse("Galleta x3")), GiftTier::General);
    }

    #[test]
    fn test_acknowledge_names_user_quantity_and_milestone() {
        let gifts = thanks();
        let text = gifts
            .acknowledge("ana", &GiftInfo::parse("Galleta x3"), 3)
            .unwrap();
        assert!(text.starts_with("¡ANA!"));
        assert!(text.contains("sino 3 Galleta"));
        assert!(text.contains("TRES REGALOS SEGUIDOS"));

        let single = gifts.acknowledge("ana", &GiftInfo::parse("Rosa"), 4).unwrap();
        assert!(single.contains("Tu Rosa"));
        assert!(!single.contains("SEGUIDOS"));
    }

    #[test]
    fn test_totals_and_rankings() {
        let gifts = thanks();
        gifts.acknowledge("ana", &GiftInfo::parse("Rosa x2"), 1).unwrap();
        gifts.acknowledge("beto", &GiftInfo::parse("Rosa"), 2).unwrap();
        gifts.acknowledge("ana", &GiftInfo::parse("León"), 3).unwrap();

        let totals = gifts.totals();
        assert_eq!(totals.received, 3);
        assert_eq!(totals.items, 4);
        assert_eq!(totals.best_streak, 3);
        assert_eq!(gifts.top_donors(1), vec![("ana".to_string(), 3)]);
        assert_eq!(gifts.top_gifts(1), vec![("Rosa".to_string(), 3)]);
        assert!(gifts.summary().contains("ana (3)"));
    }

    #[test]
    fn test_combo_names_donors() {
        let gifts = thanks();
        let solo = vec![
            ("ana".to_string(), GiftInfo::parse("Rosa")),
            ("ana".to_string(), GiftInfo::parse("León")),
        ];
        assert!(gifts.combo(&solo, 2).unwrap().contains("¡ANA! ¡2 regalos de ti!"));

        let crowd: Vec<(String, GiftInfo)> = ["a", "b", "c", "d", "e"]
            .iter()
            .map(|u| (u.to_string(), GiftInfo::parse("Flor")))
            .collect();
        let text = gifts.combo(&crowd, 7).unwrap();
        assert!(text.contains("¡Gracias a, b, c y 2 personas más por 5 regalos"), "{text}");
        assert_eq!(gifts.totals().received, 7);
        assert_eq!(gifts.totals().best_streak, 7);
    }

    #[test]
    fn test_streak_end_and_persistence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gifts.json");
        let gifts = GiftThanks::new(Some(path.clone()));
        assert!(gifts.streak_ended(0).is_none());
        assert!(gifts.streak_ended(4).unwrap().contains("4 regalos"));
        gifts.acknowledge("ana", &GiftInfo::parse("Rosa"), 1).unwrap();

        let reopened = GiftThanks::new(Some(path));
        assert_eq!(reopened.totals().received, 1);
    }
}
