//! Instruction metadata table and signature lookup.
//!
//! The table is read once from JSON (the bundled `data/instructions.json` or
//! a user supplied file) and shared read-only afterwards.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

/// The metadata asset shipped with the server.
pub const BUNDLED_INSTRUCTIONS: &str = include_str!("../data/instructions.json");

#[derive(Debug, Error)]
pub enum TableError {
    #[error("could not read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid instruction table: {0}")]
    Json(#[from] serde_json::Error),
}

/// Cycle count, either plain or a description such as `"3 taken / 2 untaken"`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Cycles {
    Count(u32),
    Text(String),
}

impl fmt::Display for Cycles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cycles::Count(count) => write!(f, "{}", count),
            Cycles::Text(text) => f.write_str(text),
        }
    }
}

/// Effect on each CPU flag. Absent or empty means unaffected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FlagEffects {
    #[serde(default)]
    pub z: Option<String>,
    #[serde(default)]
    pub n: Option<String>,
    #[serde(default)]
    pub h: Option<String>,
    #[serde(default)]
    pub c: Option<String>,
}

impl FlagEffects {
    /// `(flag letter, effect)` for every flag the instruction touches.
    pub fn affected(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [("Z", &self.z), ("N", &self.n), ("H", &self.h), ("C", &self.c)]
            .into_iter()
            .filter_map(|(flag, effect)| match effect.as_deref() {
                Some(effect) if !effect.is_empty() => Some((flag, effect)),
                _ => None,
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InstructionRecord {
    /// Canonical signature, e.g. `ld r8, n8`.
    pub name: String,
    pub description: String,
    pub cycles: Cycles,
    pub bytes: u32,
    #[serde(default)]
    pub flags: FlagEffects,
}

impl InstructionRecord {
    /// Hover documentation. Lines end in a markdown hard break.
    pub fn to_markdown(&self) -> String {
        let mut lines = vec![
            format!("`{}`", self.name),
            self.description.clone(),
            String::new(),
            format!("**Cycles:** {} **Bytes:** {}", self.cycles, self.bytes),
        ];
        let flag_lines: Vec<String> = self
            .flags
            .affected()
            .map(|(flag, effect)| format!("\\- {}: {}", flag, effect))
            .collect();
        if !flag_lines.is_empty() {
            lines.push("**Flags:**".to_string());
            lines.extend(flag_lines);
        }
        lines.join("  \\\n")
    }
}

#[derive(Deserialize)]
struct InstructionFile {
    instructions: Vec<InstructionRecord>,
}

/// Result of looking up a list of candidate signatures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<'a> {
    Found(&'a InstructionRecord),
    /// Nothing matched; every signature that was tried, in order.
    NotFound(Vec<String>),
}

/// Signature to record mapping, immutable once built.
#[derive(Debug, Clone, Default)]
pub struct InstructionTable {
    records: HashMap<String, InstructionRecord>,
}

impl InstructionTable {
    /// Builds the table from records. A later duplicate signature replaces
    /// an earlier one.
    pub fn from_records(records: impl IntoIterator<Item = InstructionRecord>) -> Self {
        let mut map = HashMap::new();
        for record in records {
            map.insert(record.name.clone(), record);
        }
        Self { records: map }
    }

    pub fn from_json(json: &str) -> Result<Self, TableError> {
        let file: InstructionFile = serde_json::from_str(json)?;
        Ok(Self::from_records(file.instructions))
    }

    pub fn load(path: &Path) -> Result<Self, TableError> {
        let json = fs::read_to_string(path).map_err(|source| TableError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn bundled() -> Result<Self, TableError> {
        Self::from_json(BUNDLED_INSTRUCTIONS)
    }

    pub fn get(&self, signature: &str) -> Option<&InstructionRecord> {
        self.records.get(signature)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &InstructionRecord> {
        self.records.values()
    }

    /// Distinct mnemonics, sorted.
    pub fn mnemonics(&self) -> Vec<&str> {
        let mut mnemonics: Vec<&str> = self
            .records
            .keys()
            .filter_map(|name| name.split_whitespace().next())
            .collect();
        mnemonics.sort_unstable();
        mnemonics.dedup();
        mnemonics
    }

    /// Every record whose signature starts with `mnemonic`, sorted by signature.
    pub fn forms(&self, mnemonic: &str) -> Vec<&InstructionRecord> {
        let mut forms: Vec<&InstructionRecord> = self
            .records
            .values()
            .filter(|record| record.name.split_whitespace().next() == Some(mnemonic))
            .collect();
        forms.sort_by(|a, b| a.name.cmp(&b.name));
        forms
    }

    /// First candidate with an exact match wins.
    pub fn lookup<S: AsRef<str>>(&self, candidates: &[S]) -> Lookup<'_> {
        candidates
            .iter()
            .find_map(|candidate| self.get(candidate.as_ref()))
            .map(Lookup::Found)
            .unwrap_or_else(|| {
                Lookup::NotFound(candidates.iter().map(|c| c.as_ref().to_string()).collect())
            })
    }
}

/// Hover shown when none of `tried` is in the table.
pub fn not_found_markdown(token: &str, tried: &[String]) -> String {
    let mut lines = vec![
        format!("*No information found for `{}`.*", token),
        "Tried searching for:".to_string(),
    ];
    lines.extend(tried.iter().map(|signature| format!("- `{}`", signature)));
    lines.join("  \n")
}
