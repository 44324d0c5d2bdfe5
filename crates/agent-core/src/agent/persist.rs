use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{error, info, warn};

use super::events::Event;
use super::knowledge::Knowledge;

/// Load/save of an agent's "brain" keyed by game id.
///
/// Neither operation fails from the caller's point of view: a brain that can't be read is
/// an empty brain, and a brain that can't be written is logged and dropped. In-memory state
/// stays authoritative for the rest of the session.
pub trait BrainStore: Send + Sync {
    fn load(&self, game_id: &str) -> Knowledge;
    fn save(&self, game_id: &str, knowledge: &Knowledge, raw_events: &[Event]);
}

impl<T: BrainStore + ?Sized> BrainStore for Arc<T> {
    fn load(&self, game_id: &str) -> Knowledge {
        (**self).load(game_id)
    }

    fn save(&self, game_id: &str, knowledge: &Knowledge, raw_events: &[Event]) {
        (**self).save(game_id, knowledge, raw_events)
    }
}

/// On-disk layout of one brain file.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
pub struct BrainFile {
    #[serde(default)]
    pub knowledge: Option<Knowledge>,
    /// Kept for offline inspection; never loaded back into a live session.
    #[serde(default)]
    pub raw_memory_events: Vec<Event>,
}

/// Stores `brain_<game_id>_<hash>.json` files under one directory.
#[derive(Debug, Clone)]
pub struct FileBrainStore {
    dir: PathBuf,
}

impl FileBrainStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The sanitised id keeps file names readable; the hash of the raw id keeps ids that
    /// sanitise to the same text apart.
    pub fn path_for(&self, game_id: &str) -> PathBuf {
        self.dir.join(format!(
            "brain_{}_{}.json",
            sanitize_game_id(game_id),
            id_hash(game_id)
        ))
    }

    pub fn read_brain(&self, game_id: &str) -> anyhow::Result<Option<BrainFile>> {
        let path = self.path_for(game_id);
        if !path.is_file() {
            return Ok(None);
        }
        let text = fs::read_to_string(&path)
            .with_context(|| format!("read brain file {}", path.display()))?;
        let brain = serde_json::from_str(&text)
            .with_context(|| format!("parse brain file {}", path.display()))?;
        Ok(Some(brain))
    }

    pub fn write_brain(&self, game_id: &str, brain: &BrainFile) -> anyhow::Result<PathBuf> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("create brain dir {}", self.dir.display()))?;
        let path = self.path_for(game_id);
        // Write-then-rename so a crash mid-write leaves the previous brain intact.
        let tmp = path.with_extension("json.tmp");
        let data = serde_json::to_vec_pretty(brain).context("encode brain")?;
        fs::write(&tmp, data).with_context(|| format!("write {}", tmp.display()))?;
        fs::rename(&tmp, &path)
            .with_context(|| format!("rename {} -> {}", tmp.display(), path.display()))?;
        Ok(path)
    }
}

impl BrainStore for FileBrainStore {
    fn load(&self, game_id: &str) -> Knowledge {
        match self.read_brain(game_id) {
            Ok(Some(BrainFile {
                knowledge: Some(knowledge),
                ..
            })) => {
                info!(game_id, "previous brain found, loading past experiences");
                knowledge
            }
            Ok(_) => {
                info!(game_id, "no previous brain, starting with a blank page");
                Knowledge::default()
            }
            Err(err) => {
                warn!(game_id, "brain unreadable, starting blank: {err:#}");
                Knowledge::default()
            }
        }
    }

    fn save(&self, game_id: &str, knowledge: &Knowledge, raw_events: &[Event]) {
        let brain = BrainFile {
            knowledge: Some(knowledge.clone()),
            raw_memory_events: raw_events.to_vec(),
        };
        match self.write_brain(game_id, &brain) {
            Ok(path) => info!(game_id, path = %path.display(), "brain saved"),
            Err(err) => error!(game_id, "failed to save brain: {err:#}"),
        }
    }
}

fn sanitize_game_id(game_id: &str) -> String {
    let cleaned: String = game_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "unnamed".to_string()
    } else {
        cleaned
    }
}

fn id_hash(game_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(game_id.as_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..4])
}
