use std::collections::HashSet;

pub const DEFAULT_MAX_SELECTED: usize = 4;

/// Bounded, insertion-ordered set of selected feature ids.
///
/// When a toggle would push the set past `max`, the oldest entry is evicted
/// before the new id is appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    ids: Vec<String>,
    max: usize,
}

impl Default for Selection {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SELECTED)
    }
}

impl Selection {
    pub fn new(max: usize) -> Self {
        Self {
            ids: Vec::new(),
            max: max.max(1),
        }
    }

    pub fn max(&self) -> usize {
        self.max
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.iter().any(|s| s == id)
    }

    /// Position of `id` in selection order.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.ids.iter().position(|s| s == id)
    }

    /// Select `id` if unselected, deselect it otherwise.
    pub fn toggle(&mut self, id: &str) -> &[String] {
        if let Some(pos) = self.position(id) {
            self.ids.remove(pos);
        } else {
            if self.ids.len() >= self.max {
                let overflow = self.ids.len() + 1 - self.max;
                self.ids.drain(..overflow);
            }
            self.ids.push(id.to_string());
        }
        &self.ids
    }

    /// Replace the selection with the ids of `ids` accepted by `is_valid`,
    /// in the given order, skipping duplicates. Input longer than `max`
    /// keeps its last `max` entries, as if each had been toggled in turn.
    pub fn set_selected<S, F>(&mut self, ids: &[S], is_valid: F) -> &[String]
    where
        S: AsRef<str>,
        F: Fn(&str) -> bool,
    {
        let mut seen = HashSet::new();
        let mut next: Vec<String> = ids
            .iter()
            .map(|s| s.as_ref())
            .filter(|&id| is_valid(id) && seen.insert(id))
            .map(str::to_string)
            .collect();
        if next.len() > self.max {
            next.drain(..next.len() - self.max);
        }
        self.ids = next;
        &self.ids
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }
}
