//! Singer mode. Songs are announced and a verse is recited; there is no
//! audio playback.

use crate::pick::{line, pick, strings};
use crate::snapshot::Snapshot;
use npc_core::text::contains_keyword;
use npc_core::{ContentSource, Event};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

const REQUEST_WORDS: &[&str] = &[
    "canta", "canción", "cancion", "música", "musica", "toca", "interpreta", "tema", "play",
    "reproduce",
];
const NO_SONGS: &str = "¡No tengo canciones! Agrega algunas a mi repertorio.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Song {
    pub title: String,
    pub verse: String,
}

impl Song {
    fn new(title: &str, verse: &str) -> Self {
        Self {
            title: title.to_string(),
            verse: verse.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SongData {
    pub songs: Vec<Song>,
    pub banter: Vec<String>,
    pub plays: BTreeMap<String, u32>,
}

impl Default for SongData {
    fn default() -> Self {
        Self {
            songs: vec![
                Song::new(
                    "La Balada del Payaso Triste",
                    "Me pinto la sonrisa cada amanecer, y nadie ve las lágrimas que empiezan a caer.",
                ),
                Song::new(
                    "Globos en la Tormenta",
                    "Vuelan mis globos, vuelan sin parar, igual que tus ganas de seguir en este chat.",
                ),
                Song::new(
                    "Zapatos Gigantes",
                    "Con mis zapatos gigantes camino hacia ti, tropiezo tres veces y me río de mí.",
                ),
                Song::new(
                    "Nariz Roja de Neón",
                    "Mi nariz brilla en la oscuridad, es lo único en mi vida que tiene claridad.",
                ),
                Song::new(
                    "Cumbia del Circo Vacío",
                    "Baila, baila, que la carpa está vacía, baila conmigo hasta que llegue el día.",
                ),
            ],
            banter: strings(&[
                "¿Quieren una canción? ¡Mi voz es como un ángel caído!",
                "Mi repertorio es tan bueno que hasta los sordos lo evitan.",
                "¿Te gusta mi música o prefieres sufrir en silencio?",
                "Pidan una canción y les regalo un dolor de oídos.",
            ]),
            plays: BTreeMap::new(),
        }
    }
}

pub struct Songbook {
    data: Snapshot<SongData>,
}

impl Songbook {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            data: Snapshot::at(path),
        }
    }

    pub fn with_data(data: SongData) -> Self {
        Self {
            data: Snapshot::in_memory(data),
        }
    }

    /// Announce `title` if it is in the repertoire, or a random song.
    pub fn perform(&self, title: Option<&str>) -> String {
        self.data.update(|d| {
            let song = title
                .and_then(|t| d.songs.iter().find(|s| s.title.eq_ignore_ascii_case(t)))
                .or_else(|| pick(&d.songs))
                .cloned();
            match song {
                Some(song) => {
                    *d.plays.entry(song.title.clone()).or_insert(0) += 1;
                    format!("Ahora cantando: {}. {}", song.title, song.verse)
                }
                None => NO_SONGS.to_string(),
            }
        })
    }

    /// Answer a comment that asks for music; `None` if it does not.
    pub fn handle_request(&self, comment: &str) -> Option<String> {
        if !contains_keyword(comment, REQUEST_WORDS) {
            return None;
        }
        let title = self.find_title(comment);
        Some(self.perform(title.as_deref()))
    }

    pub fn has_songs(&self) -> bool {
        self.data.read(|d| !d.songs.is_empty())
    }

    pub fn plays(&self, title: &str) -> u32 {
        self.data.read(|d| d.plays.get(title).copied().unwrap_or(0))
    }

    /// Title mentioned in `comment`: the whole title, or any word of it longer
    /// than three letters.
    fn find_title(&self, comment: &str) -> Option<String> {
        let lower = comment.to_lowercase();
        self.data.read(|d| {
            let whole = d
                .songs
                .iter()
                .find(|s| lower.contains(&s.title.to_lowercase()));
            let partial = || {
                d.songs.iter().find(|s| {
                    s.title
                        .to_lowercase()
                        .split_whitespace()
                        .any(|w| w.chars().count() > 3 && lower.contains(w))
                })
            };
            whole.or_else(partial).map(|s| s.title.clone())
        })
    }
}

impl ContentSource for Songbook {
    fn name(&self) -> &str {
        "songs"
    }

    fn intro(&self) -> anyhow::Result<Option<String>> {
        if !self.has_songs() {
            return Ok(Some(NO_SONGS.to_string()));
        }
        Ok(Some(self.perform(None)))
    }

    fn respond(&self, batch: &[Event]) -> anyhow::Result<String> {
        Ok(batch
            .iter()
            .find_map(|e| self.handle_request(e.text()))
            .unwrap_or_else(|| self.idle()))
    }

    fn idle(&self) -> String {
        self.data
            .read(|d| line(&d.banter, "La la la... ¿alguien pidió silencio?").to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book() -> Songbook {
        Songbook::with_data(SongData::default())
    }

    #[test]
    fn test_request_by_partial_title() {
        let songs = book();
        let text = songs.handle_request("canta la de los zapatos").unwrap();
        assert!(text.starts_with("Ahora cantando: Zapatos Gigantes"));
        assert_eq!(songs.plays("Zapatos Gigantes"), 1);
    }

    #[test]
    fn test_non_request_is_ignored() {
        let songs = book();
        assert!(songs.handle_request("hola poncho").is_none());
        let text = songs.respond(&[Event::comment("a", "hola poncho")]).unwrap();
        assert!(SongData::default().banter.contains(&text));
    }

    #[test]
    fn test_empty_repertoire_says_so() {
        let songs = Songbook::with_data(SongData {
            songs: Vec::new(),
            ..SongData::default()
        });
        assert_eq!(songs.intro().unwrap().as_deref(), Some(NO_SONGS));
        assert_eq!(songs.handle_request("canta algo").as_deref(), Some(NO_SONGS));
    }
}
