//! "Did you mean" lookups for unresolved symbols.

use super::{SymbolKey, SymbolKind, Symbols};

/// Largest edit distance still offered as a near-name suggestion.
pub const MAX_SUGGESTION_DISTANCE: usize = 4;

/// Levenshtein distance between two names, compared by character.
pub(crate) fn edit_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != *cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b.len()]
}

impl Symbols {
    /// Finds a known symbol the caller of `key` probably meant.
    ///
    /// A symbol with the same name and another arity wins over a near name.
    /// Near names must have the same arity and be within
    /// [`MAX_SUGGESTION_DISTANCE`] edits.
    pub fn suggest(&self, key: &SymbolKey) -> Option<&SymbolKey> {
        let is_candidate = |symbol: &&super::Symbol| symbol.kind() != SymbolKind::Unknown;

        let other_arity = self
            .iter()
            .filter(is_candidate)
            .filter(|symbol| symbol.name() == key.name && symbol.arity() != key.arity)
            .min_by_key(|symbol| (symbol.arity().abs_diff(key.arity), symbol.arity()));
        if let Some(symbol) = other_arity {
            return Some(symbol.key());
        }

        let length = key.name.chars().count();
        self.iter()
            .filter(is_candidate)
            .filter(|symbol| symbol.arity() == key.arity && symbol.name() != key.name)
            .filter(|symbol| {
                symbol.name().chars().count().abs_diff(length) <= MAX_SUGGESTION_DISTANCE
            })
            .map(|symbol| (edit_distance(&key.name, symbol.name()), symbol))
            .filter(|(distance, _)| *distance <= MAX_SUGGESTION_DISTANCE)
            .min_by(|(da, a), (db, b)| da.cmp(db).then_with(|| a.key().cmp(b.key())))
            .map(|(_, symbol)| symbol.key())
    }
}
