// Persistent selection state: the four category choices plus the
// generation seed. Loading never fails; anything unreadable falls back
// to defaults. Saves go through the temp-then-rename ritual so a power
// cut never leaves a half-written state file.

use alloc::string::{String, ToString};

use crate::error::StorageError;
use crate::json;
use crate::storage::{self, Storage};

/// The four selection categories, one per face button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    A,
    B,
    X,
    Y,
}

pub const CATEGORIES: [Category; 4] = [Category::A, Category::B, Category::X, Category::Y];

impl Category {
    pub const fn key(self) -> &'static str {
        match self {
            Category::A => "A",
            Category::B => "B",
            Category::X => "X",
            Category::Y => "Y",
        }
    }

    pub const fn index(self) -> usize {
        match self {
            Category::A => 0,
            Category::B => 1,
            Category::X => 2,
            Category::Y => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectionState {
    pub selections: [Option<String>; 4],
    pub seed: u32,
}

impl SelectionState {
    pub fn selection(&self, cat: Category) -> Option<&str> {
        self.selections[cat.index()].as_deref()
    }

    pub fn set_selection(&mut self, cat: Category, value: String) {
        self.selections[cat.index()] = Some(value);
    }

    /// Load from `STATE.JSN`; a missing file, unreadable JSON or wrong
    /// schema all yield the default state.
    pub fn load(storage: &mut dyn Storage) -> Self {
        let data = match storage.read(storage::STATE_FILE) {
            Ok(Some(d)) => d,
            Ok(None) => return Self::default(),
            Err(e) => {
                log::warn!("state load failed: {}", e);
                return Self::default();
            }
        };
        match Self::from_json(&data) {
            Some(state) => state,
            None => {
                log::warn!("state file unreadable, using defaults");
                Self::default()
            }
        }
    }

    /// Serialize and atomically replace `STATE.JSN`.
    pub fn save(&self, storage: &mut dyn Storage) -> Result<(), StorageError> {
        let doc = self.to_json();
        storage::atomic_write(storage, storage::STATE_FILE, storage::STATE_TMP, doc.as_bytes())
    }

    pub fn to_json(&self) -> String {
        let mut out = String::from("{\"current_selection\": {");
        for (i, cat) in CATEGORIES.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            json::escape_into(&mut out, cat.key());
            out.push_str(": ");
            match self.selection(*cat) {
                Some(v) => json::escape_into(&mut out, v),
                None => out.push_str("null"),
            }
        }
        out.push_str("}, \"current_seed\": ");
        out.push_str(&self.seed.to_string());
        out.push('}');
        out
    }

    pub fn from_json(data: &[u8]) -> Option<Self> {
        let doc = json::parse(data).ok()?;
        let sel = doc.get("current_selection")?;
        let seed = doc.get("current_seed")?.as_u32()?;

        let mut selections: [Option<String>; 4] = Default::default();
        for cat in CATEGORIES {
            match sel.get(cat.key()) {
                Some(v) if v.is_null() => {}
                Some(v) => selections[cat.index()] = Some(v.as_str()?.to_string()),
                None => {}
            }
        }
        Some(Self { selections, seed })
    }
}
