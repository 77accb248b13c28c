//! Level selection parsing.
//!
//! A selection is a comma-separated list of indices (`2`) and inclusive
//! ranges (`0-3`). Out-of-range parts are clipped away silently; malformed
//! tokens are the only error.

use std::fmt;
use std::num::IntErrorKind;

use crate::error::SelectionError;

/// Strictly increasing, deduplicated level indices, all below the level
/// count they were resolved against.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LevelSelection(Vec<usize>);

impl LevelSelection {
    /// Every level in `[0, max_levels)`.
    pub fn all(max_levels: usize) -> Self {
        Self((0..max_levels).collect())
    }

    pub fn indices(&self) -> &[usize] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.iter().copied()
    }

    pub fn into_vec(self) -> Vec<usize> {
        self.0
    }
}

impl fmt::Display for LevelSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(usize::to_string).collect();
        write!(f, "[{}]", parts.join(", "))
    }
}

/// Parse one index. Digits too large for `usize` saturate, since such a level
/// is out of range and gets clipped like any other.
fn parse_index(text: &str, token: &str) -> Result<usize, SelectionError> {
    match text.trim().parse::<usize>() {
        Ok(index) => Ok(index),
        Err(e) if *e.kind() == IntErrorKind::PosOverflow => Ok(usize::MAX),
        Err(_) => Err(SelectionError::InvalidToken {
            token: token.to_string(),
        }),
    }
}

/// Parse a selection against `max_levels` available levels.
///
/// - `n` selects level `n` if `n < max_levels`.
/// - `a-b` selects `a ..= min(b, max_levels - 1)`; nothing if `a` is past
///   the end or `b < a`.
///
/// Empty tokens, negative numbers and anything else that is not an index or
/// a two-ended range fail with [`SelectionError::InvalidToken`].
pub fn parse_level_selection(spec: &str, max_levels: usize) -> Result<LevelSelection, SelectionError> {
    let mut selected = vec![false; max_levels];

    for raw in spec.split(',') {
        let token = raw.trim();
        if token.is_empty() {
            return Err(SelectionError::InvalidToken {
                token: token.to_string(),
            });
        }

        match token.split_once('-') {
            Some((start, end)) => {
                let start = parse_index(start, token)?;
                let end = parse_index(end, token)?;
                if max_levels == 0 || start >= max_levels || end < start {
                    continue;
                }
                selected[start..=end.min(max_levels - 1)].fill(true);
            }
            None => {
                let level = parse_index(token, token)?;
                if level < max_levels {
                    selected[level] = true;
                }
            }
        }
    }

    Ok(LevelSelection(
        selected
            .into_iter()
            .enumerate()
            .filter_map(|(level, on)| on.then_some(level))
            .collect(),
    ))
}

/// Resolve an optional selection; absent or blank means every level.
pub fn resolve_level_selection(
    spec: Option<&str>,
    max_levels: usize,
) -> Result<LevelSelection, SelectionError> {
    match spec {
        Some(spec) if !spec.trim().is_empty() => parse_level_selection(spec, max_levels),
        _ => Ok(LevelSelection::all(max_levels)),
    }
}
