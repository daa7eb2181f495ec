use std::collections::HashSet;
use std::fmt::Display;

pub const COLLISION_SUFFIX: char = '_';
const SEPARATOR_REPLACEMENT: &str = "___";

/// Hands out identifiers that are unique for the lifetime of one export run.
///
/// Identifiers double as file names, so candidates are reduced to a single
/// path segment before they are registered. The first caller to claim a name
/// gets it unsuffixed; later callers get the name with `_` appended until it
/// no longer collides.
#[derive(Debug, Clone, Default)]
pub struct SlugAllocator {
    allocated: HashSet<String>,
}

impl SlugAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self, candidate: Option<&str>, fallback_id: impl Display) -> String {
        let mut slug = match candidate.map(to_file_segment) {
            Some(value) if !value.is_empty() => value,
            _ => to_file_segment(&fallback_id.to_string()),
        };
        while self.allocated.contains(&slug) {
            slug.push(COLLISION_SUFFIX);
        }
        self.allocated.insert(slug.clone());
        slug
    }

    #[cfg(test)]
    pub(crate) fn is_allocated(&self, slug: &str) -> bool {
        self.allocated.contains(slug)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.allocated.len()
    }
}

/// Path separators become `___` and leading dots are dropped, so the result
/// can never name a parent, hidden or nested file.
pub fn to_file_segment(value: &str) -> String {
    value
        .replace(['/', '\\'], SEPARATOR_REPLACEMENT)
        .trim_start_matches('.')
        .to_string()
}
