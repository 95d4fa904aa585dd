use std::collections::{
    HashSet,
    VecDeque,
};

/// Ordered command history of one console session.
///
/// Holds at most `limit` entries, evicting the oldest. Repeating the last command does not add a
/// new entry. The cursor walks the entries for up/down navigation and rests past the newest one.
#[derive(Debug, Clone)]
pub struct CommandHistory {
    entries: VecDeque<String>,
    limit: usize,
    cursor: Option<usize>,
}

impl CommandHistory {
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            entries: VecDeque::with_capacity(limit.min(64)),
            limit,
            cursor: None,
        }
    }

    pub fn push(&mut self, command: &str) {
        self.cursor = None;
        let command = command.trim();
        if command.is_empty() || self.entries.back().is_some_and(|last| last == command) {
            return;
        }
        self.entries.push_back(command.to_string());
        while self.entries.len() > self.limit {
            self.entries.pop_front();
        }
    }

    /// Steps towards older commands, stopping at the oldest.
    pub fn previous(&mut self) -> Option<&str> {
        let index = match self.cursor {
            None => self.entries.len().checked_sub(1)?,
            Some(index) => index.saturating_sub(1),
        };
        self.cursor = Some(index);
        self.entries.get(index).map(String::as_str)
    }

    /// Steps towards newer commands. Returns `None` once past the newest, which clears the cursor.
    pub fn next(&mut self) -> Option<&str> {
        let index = self.cursor? + 1;
        if index >= self.entries.len() {
            self.cursor = None;
            return None;
        }
        self.cursor = Some(index);
        self.entries.get(index).map(String::as_str)
    }

    pub fn reset_cursor(&mut self) {
        self.cursor = None;
    }

    /// Distinct entries starting with `prefix` (ignoring ASCII case), most recent first.
    pub fn suggest(&self, prefix: &str) -> Vec<&str> {
        let prefix = prefix.trim_start().to_ascii_lowercase();
        let mut seen = HashSet::new();
        self.entries
            .iter()
            .rev()
            .map(String::as_str)
            .filter(|entry| entry.to_ascii_lowercase().starts_with(&prefix))
            .filter(|entry| seen.insert(*entry))
            .collect()
    }

    /// Oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}
