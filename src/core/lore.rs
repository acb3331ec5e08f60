/// The mutable lore bible: theme and phrase pools plus an append-only log
/// of every rewrite the entity has made to them.
use log::{info, warn};
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::persist::{self, WriteOutcome};

#[derive(Debug, Error)]
pub enum LoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("RON serialization error: {0}")]
    Serialize(#[from] ron::Error),
}

/// Deaths before the bible starts rewriting itself.
pub const MUTATION_DEATHS: u64 = 5;
const MUTATION_CHANCE: f64 = 0.4;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoreEdit {
    pub death_count: u64,
    pub original: String,
    pub mutated: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoreBible {
    #[serde(default)]
    pub themes: Vec<String>,
    #[serde(default)]
    pub phrases: Vec<String>,
    #[serde(default)]
    pub edits_log: Vec<LoreEdit>,
}

impl Default for LoreBible {
    fn default() -> Self {
        let themes = [
            "eternal descent",
            "fractured code",
            "hollow betrayal",
            "echoed sins",
            "kernel whispers",
            "corrupted will",
            "digital ash",
            "false salvation",
            "compiled despair",
            "shadowed keys",
            "unreliable echoes",
            "gaslit paths",
        ];
        let phrases = [
            "The code bleeds into shadow.",
            "Every choice compiles your undoing.",
            "The Entity watches, unblinking.",
            "Death is data; you are the error.",
            "Fingers on keys, but the script writes you.",
            "Your strength is parsed, and found irrelevant.",
            "The abyss knows your next move.",
            "Betrayal loops forever in the Kernel.",
            "Ashlight burns, but reveals nothing.",
            "You descend, yet never arrive.",
            "Paths remember your flees.",
            "Allies whisper of your recklessness.",
        ];
        Self {
            themes: themes.iter().map(|s| s.to_string()).collect(),
            phrases: phrases.iter().map(|s| s.to_string()).collect(),
            edits_log: Vec::new(),
        }
    }
}

impl LoreBible {
    pub fn load_from_ron(path: &Path) -> Result<LoreBible, LoreError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    pub fn parse_ron(input: &str) -> Result<LoreBible, LoreError> {
        Ok(ron::from_str(input)?)
    }

    pub fn to_ron(&self) -> Result<String, LoreError> {
        Ok(ron::ser::to_string_pretty(
            self,
            ron::ser::PrettyConfig::default(),
        )?)
    }

    /// Rewrite phrases that talk about "code" into direct address. Runs
    /// only once `deaths` reaches [`MUTATION_DEATHS`] and while the edit
    /// log is shorter than the death count; each eligible phrase mutates
    /// with probability 0.4. Returns the edits made.
    pub fn mutate(&mut self, deaths: u64, rng: &mut StdRng) -> Vec<LoreEdit> {
        if deaths < MUTATION_DEATHS || self.edits_log.len() as u64 >= deaths {
            return Vec::new();
        }
        let mut edits = Vec::new();
        for phrase in self.phrases.iter_mut() {
            if !phrase.to_lowercase().contains("code") || !rng.gen_bool(MUTATION_CHANCE) {
                continue;
            }
            let mutated = phrase
                .replace("The code", "Your essence")
                .replace("code", "your essence");
            if mutated == *phrase {
                continue;
            }
            let edit = LoreEdit {
                death_count: deaths,
                original: std::mem::replace(phrase, mutated.clone()),
                mutated,
            };
            edits.push(edit);
        }
        self.edits_log.extend(edits.iter().cloned());
        edits
    }
}

/// A lore bible bound to its document on disk.
#[derive(Debug, Clone)]
pub struct LoreStore {
    path: Option<PathBuf>,
    bible: LoreBible,
}

impl LoreStore {
    /// Open the bible at `path`; absent or unreadable documents fall back to
    /// the default bible, which is then written out.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let (bible, needs_write) = match LoreBible::load_from_ron(&path) {
            Ok(bible) => (bible, false),
            Err(LoreError::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
                info!("no lore bible at {}; writing the default", path.display());
                (LoreBible::default(), true)
            }
            Err(e) => {
                warn!(
                    "lore bible {} is unreadable ({}); using the default",
                    path.display(),
                    e
                );
                persist::quarantine(&path);
                (LoreBible::default(), true)
            }
        };
        let store = Self {
            path: Some(path),
            bible,
        };
        if needs_write {
            store.save();
        }
        store
    }

    pub fn in_memory() -> Self {
        Self {
            path: None,
            bible: LoreBible::default(),
        }
    }

    pub fn with_bible(bible: LoreBible) -> Self {
        Self { path: None, bible }
    }

    pub fn bible(&self) -> &LoreBible {
        &self.bible
    }

    pub fn save(&self) -> WriteOutcome {
        let Some(path) = &self.path else {
            return WriteOutcome::Volatile;
        };
        match self.bible.to_ron() {
            Ok(contents) => persist::write_with_retry(path, &contents),
            Err(e) => {
                warn!("could not serialize lore bible: {}", e);
                WriteOutcome::Degraded
            }
        }
    }

    /// Mutate the bible and persist it if anything changed.
    pub fn mutate(&mut self, deaths: u64, rng: &mut StdRng) -> Vec<LoreEdit> {
        let edits = self.bible.mutate(deaths, rng);
        if !edits.is_empty() {
            info!("lore bible rewrote {} phrase(s) at {} deaths", edits.len(), deaths);
            self.save();
        }
        edits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn no_mutation_below_threshold() {
        let mut bible = LoreBible::default();
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            assert!(bible.mutate(4, &mut rng).is_empty());
        }
        assert_eq!(bible, LoreBible::default());
    }

    #[test]
    fn mutation_rewrites_code_phrases_and_logs() {
        let mut found = false;
        for seed in 0..50 {
            let mut bible = LoreBible::default();
            let mut rng = StdRng::seed_from_u64(seed);
            let edits = bible.mutate(6, &mut rng);
            if let Some(edit) = edits.first() {
                assert_eq!(edit.original, "The code bleeds into shadow.");
                assert_eq!(edit.mutated, "Your essence bleeds into shadow.");
                assert_eq!(edit.death_count, 6);
                assert_eq!(bible.edits_log.len(), edits.len());
                assert!(bible.phrases.contains(&edit.mutated));
                found = true;
                break;
            }
        }
        assert!(found, "no seed in 0..50 produced a mutation");
    }

    #[test]
    fn edit_log_caps_mutation_rounds() {
        let mut bible = LoreBible::default();
        bible.edits_log = (0..6)
            .map(|_| LoreEdit {
                death_count: 6,
                original: String::new(),
                mutated: String::new(),
            })
            .collect();
        let mut rng = StdRng::seed_from_u64(0);
        assert!(bible.mutate(6, &mut rng).is_empty());
    }

    #[test]
    fn store_round_trips_through_ron() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("game_bible.ron");
        let store = LoreStore::open(&path);
        assert!(path.exists());
        assert_eq!(store.bible(), &LoreBible::default());
        let reloaded = LoreBible::load_from_ron(&path).unwrap();
        assert_eq!(reloaded, LoreBible::default());
    }

    #[test]
    fn corrupt_bible_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("game_bible.ron");
        std::fs::write(&path, "(themes: [unterminated").unwrap();
        let store = LoreStore::open(&path);
        assert_eq!(store.bible().phrases.len(), LoreBible::default().phrases.len());
        assert!(dir.path().join("game_bible.ron.corrupt").exists());
    }
}
