use anyhow::Result;

use crate::error::ExportError;

pub const DELIMITER: &str = "---";
const SEPARATOR: &str = ": ";

/// Ordered key/value block found at the top of a content string.
///
/// Keys keep the position of their first appearance; inserting an existing
/// key replaces its value in place. A value of `None` marks a key-only line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrontMatter {
    entries: Vec<(String, Option<String>)>,
}

impl FrontMatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Option<String>) {
        let key = key.into();
        if let Some(slot) = self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            slot.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    /// Value stored for `key`, or `None` when the key is missing or key-only.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .and_then(|(_, value)| value.as_deref())
    }

    #[cfg(test)]
    pub(crate) fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(existing, _)| existing == key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_deref()))
    }

    /// Copy without key-only entries.
    #[cfg(test)]
    pub(crate) fn defined(&self) -> Self {
        Self {
            entries: self
                .entries
                .iter()
                .filter(|(_, value)| value.is_some())
                .cloned()
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub front_matter: FrontMatter,
    pub body: String,
}

/// Split `content` into its leading `---` block and the body that follows.
///
/// Content whose first line is not exactly the delimiter has no block: the
/// mapping is empty and the body is the input unchanged.
pub fn decode(content: &str) -> Result<Decoded> {
    let mut lines = content.split('\n');
    if lines.next() != Some(DELIMITER) {
        return Ok(Decoded {
            front_matter: FrontMatter::new(),
            body: content.to_string(),
        });
    }

    let mut front_matter = FrontMatter::new();
    let mut scanned = 0usize;
    loop {
        let Some(line) = lines.next() else {
            return Err(ExportError::MalformedFrontMatter {
                line_count: scanned,
            }
            .into());
        };
        if line == DELIMITER {
            break;
        }
        scanned += 1;
        match line.split_once(SEPARATOR) {
            Some((key, value)) => front_matter.insert(key, Some(value.to_string())),
            None => front_matter.insert(line, None),
        }
    }

    Ok(Decoded {
        front_matter,
        body: lines.collect::<Vec<_>>().join("\n"),
    })
}

/// Render `front_matter` as a delimited block ready to be followed by a body.
/// Key-only entries are skipped.
pub fn encode(front_matter: &FrontMatter) -> String {
    let mut out = String::with_capacity(16 + front_matter.len() * 24);
    out.push_str(DELIMITER);
    out.push('\n');
    for (key, value) in front_matter.iter() {
        let Some(value) = value else {
            continue;
        };
        out.push_str(key);
        out.push_str(SEPARATOR);
        out.push_str(value);
        out.push('\n');
    }
    out.push_str(DELIMITER);
    out.push('\n');
    out
}
