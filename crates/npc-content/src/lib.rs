//! npc-content: the stock content sources for every mode, plus the gift
//! channel's acknowledger.
//!
//! Each source keeps its tables and counters in a JSON [`Snapshot`] under
//! the configured data directory, or in memory when there is none.

mod pick;

mod snapshot;
pub use snapshot::Snapshot;

mod jokes;
pub use jokes::{Joke, JokeBook, JokeData};

mod riddles;
pub use riddles::{Riddle, RiddleData, RiddleGame, Verdict};

mod fortune;
pub use fortune::{FortuneData, FortuneTeller, Prediction};

mod threats;
pub use threats::{ThreatBook, ThreatData};

mod songs;
pub use songs::{Song, SongData, Songbook};

mod discussion;
pub use discussion::{DiscussionData, KeywordLines, PublicDiscussion, Topic};

mod interview;
pub use interview::{GuestInterview, InterviewData, InterviewKind, Speaker, DEFAULT_GUEST};

mod gifts;
pub use gifts::{GiftData, GiftThanks, GiftTier, GiftTotals, ThanksLines};

use npc_core::{ContentSource, GiftAcknowledger, Mode};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Every stock source, kept typed so callers can reach mode-specific
/// operations after registering them with the router.
pub struct ContentLibrary {
    pub jokes: Arc<JokeBook>,
    pub riddles: Arc<RiddleGame>,
    pub fortune: Arc<FortuneTeller>,
    pub threats: Arc<ThreatBook>,
    pub songs: Arc<Songbook>,
    pub discussion: Arc<PublicDiscussion>,
    pub interview: Arc<GuestInterview>,
    pub gifts: Arc<GiftThanks>,
}

impl ContentLibrary {
    /// Open every source, persisting to `data_dir` when given.
    pub fn open(data_dir: Option<&Path>) -> Self {
        let file = |name: &str| -> Option<PathBuf> { data_dir.map(|dir| dir.join(name)) };
        if let Some(dir) = data_dir {
            info!("content snapshots in {}", dir.display());
        }
        Self {
            jokes: Arc::new(JokeBook::new(file("jokes.json"))),
            riddles: Arc::new(RiddleGame::new(file("riddles.json"))),
            fortune: Arc::new(FortuneTeller::new(file("fortune.json"))),
            threats: Arc::new(ThreatBook::new(file("threats.json"))),
            songs: Arc::new(Songbook::new(file("songs.json"))),
            discussion: Arc::new(PublicDiscussion::new(file("discussion.json"))),
            interview: Arc::new(GuestInterview::new(file("interview.json"))),
            gifts: Arc::new(GiftThanks::new(file("gifts.json"))),
        }
    }

    /// Sources for every mode except open chat, which the core answers.
    pub fn sources(&self) -> Vec<(Mode, Arc<dyn ContentSource>)> {
        vec![
            (Mode::Joke, self.jokes.clone() as Arc<dyn ContentSource>),
            (Mode::Fortune, self.fortune.clone()),
            (Mode::Riddle, self.riddles.clone()),
            (Mode::Threat, self.threats.clone()),
            (Mode::Song, self.songs.clone()),
            (Mode::PublicDiscussion, self.discussion.clone()),
            (Mode::Interview, self.interview.clone()),
        ]
    }

    pub fn acknowledger(&self) -> Arc<dyn GiftAcknowledger> {
        self.gifts.clone()
    }
}
