//! Swara pattern synthesis.
//!
//! Each pattern is drawn from freshly shuffled copies of the note alphabet.
//! When the alphabet is at least as long as the pattern a single shuffled
//! copy is cut short, so no swara repeats. Shorter alphabets are expanded one
//! independently shuffled cycle at a time, then cut to length.

use carnaticguru_core::error::ResponderError;
use carnaticguru_core::raga::NoteAlphabet;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Requested length → generated pattern, iterated in ascending length.
pub type PatternSet = BTreeMap<usize, Vec<String>>;

pub const DEFAULT_LENGTHS: [usize; 4] = [5, 6, 7, 8];

pub struct PatternSynthesizer {
    rng: Mutex<StdRng>,
}

impl PatternSynthesizer {
    /// Non-reproducible output seeded from the operating system.
    pub fn from_os_rng() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Reproducible output for fixtures and `patterns.seed`.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// One pattern per requested length. Duplicate lengths collapse.
    pub fn generate(
        &self,
        alphabet: &NoteAlphabet,
        lengths: &[usize],
    ) -> Result<PatternSet, ResponderError> {
        if alphabet.is_empty() {
            return Err(ResponderError::EmptyAlphabet);
        }
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(lengths
            .iter()
            .map(|&len| (len, pattern(&mut rng, alphabet.symbols(), len)))
            .collect())
    }
}

impl Default for PatternSynthesizer {
    fn default() -> Self {
        Self::from_os_rng()
    }
}

fn pattern(rng: &mut StdRng, symbols: &[String], len: usize) -> Vec<String> {
    let mut out = Vec::with_capacity(len + symbols.len());
    while out.len() < len {
        let mut cycle = symbols.to_vec();
        cycle.shuffle(rng);
        out.extend(cycle);
    }
    out.truncate(len);
    out
}

/// `"<length>-swars: <pattern>"`, one line per length, ascending.
pub fn format_patterns(patterns: &PatternSet) -> String {
    patterns
        .iter()
        .map(|(len, notes)| format!("{len}-swars: {}", notes.join(" ")))
        .collect::<Vec<_>>()
        .join("\n")
}
