//! Raga scale data and the note alphabet derived from it.

use crate::error::ResponderError;
use serde::{Deserialize, Serialize};

/// A raga as reported by the raga-info responder.
///
/// Only the scale is modelled structurally; janya ragas and composition
/// notes stay opaque text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Raga {
    pub name: String,

    /// Ascending scale.
    #[serde(default)]
    pub arohanam: Vec<String>,

    /// Descending scale.
    #[serde(default)]
    pub avarohanam: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub janya: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Raga {
    pub fn new(
        name: impl Into<String>,
        arohanam: Vec<String>,
        avarohanam: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            arohanam,
            avarohanam,
            janya: Vec::new(),
            notes: None,
        }
    }

    /// Both scale directions are present.
    pub fn is_complete(&self) -> bool {
        !self.arohanam.is_empty() && !self.avarohanam.is_empty()
    }

    pub fn alphabet(&self) -> Result<NoteAlphabet, ResponderError> {
        NoteAlphabet::extract(&self.arohanam, &self.avarohanam)
    }
}

/// Deduplicated swaras of a raga in first-seen order.
///
/// Never empty: construction goes through [`NoteAlphabet::extract`] or
/// [`NoteAlphabet::from_symbols`], both of which reject empty input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NoteAlphabet(Vec<String>);

impl NoteAlphabet {
    /// Concatenate arohanam then avarohanam and drop repeats, keeping the
    /// first occurrence. Symbols compare by exact string equality.
    pub fn extract(arohanam: &[String], avarohanam: &[String]) -> Result<Self, ResponderError> {
        if arohanam.is_empty() || avarohanam.is_empty() {
            return Err(ResponderError::IncompleteRagaData);
        }
        Self::from_symbols(arohanam.iter().chain(avarohanam).cloned())
    }

    /// Build an alphabet from arbitrary symbols, deduplicating in order.
    pub fn from_symbols<I>(symbols: I) -> Result<Self, ResponderError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut out: Vec<String> = Vec::new();
        for symbol in symbols {
            if !out.contains(&symbol) {
                out.push(symbol);
            }
        }
        if out.is_empty() {
            return Err(ResponderError::EmptyAlphabet);
        }
        Ok(Self(out))
    }

    pub fn symbols(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.0.iter().any(|s| s == symbol)
    }
}
