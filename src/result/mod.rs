//! Result containers for traversal output.
//!
//! Three [`Appender`] variants with different dedup behaviour, plus
//! [`Results`], the per-class accumulator a traversal writes into.

use std::collections::{HashMap, HashSet};

use crate::reference::Reference;
use crate::signal::{Appender, Class, Object};
use crate::unique;

/// Append-only list of objects. Preserves insertion order, no dedup.
#[derive(Debug, Clone, Default)]
pub struct ListResult(Vec<Object>);

impl ListResult {
    pub fn new() -> Self {
        ListResult(Vec::new())
    }

    pub fn list(&self) -> &[Object] {
        &self.0
    }

    pub fn into_list(self) -> Vec<Object> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Appender for ListResult {
    fn append(&mut self, obj: Object) {
        self.0.push(obj);
    }
}

/// Class-scoped result. Validates class membership on append in debug
/// builds; preserves insertion order, no dedup.
#[derive(Debug, Clone)]
pub struct ClassResult {
    class: Class,
    list: Vec<Object>,
}

impl ClassResult {
    pub fn new(class: Class) -> Self {
        ClassResult {
            class,
            list: Vec::new(),
        }
    }

    pub fn class(&self) -> &Class {
        &self.class
    }

    pub fn list(&self) -> &[Object] {
        &self.list
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }
}

impl Appender for ClassResult {
    fn append(&mut self, obj: Object) {
        debug_assert!(
            self.class.contains(&obj),
            "object does not belong to class {}: {obj}",
            self.class
        );
        self.list.push(obj);
    }
}

/// Class-scoped result deduplicated by object identity.
///
/// Objects whose class reports no identity (`Class::id` returns `None`)
/// are always appended.
#[derive(Debug, Clone)]
pub struct SetResult {
    class: Class,
    list: Vec<Object>,
    seen: HashSet<String>,
}

impl SetResult {
    pub fn new(class: Class) -> Self {
        SetResult {
            class,
            list: Vec::new(),
            seen: HashSet::new(),
        }
    }

    pub fn class(&self) -> &Class {
        &self.class
    }

    pub fn list(&self) -> &[Object] {
        &self.list
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }
}

impl Appender for SetResult {
    fn append(&mut self, obj: Object) {
        match self.class.id(&obj) {
            Some(id) => {
                if self.seen.insert(id.to_string()) {
                    self.list.push(obj);
                }
            }
            None => self.list.push(obj),
        }
    }
}

/// One class entry in [`Results`]: the deduplicated references produced for
/// the class and the objects materialised from them.
#[derive(Debug)]
pub struct ResultEntry {
    pub class: Class,
    pub references: unique::List<Reference>,
    pub objects: ListResult,
}

impl ResultEntry {
    fn new(class: Class) -> Self {
        ResultEntry {
            class,
            references: unique::List::new(),
            objects: ListResult::new(),
        }
    }
}

/// Insertion-ordered mapping from class to its accumulated results.
///
/// Lookup creates an empty entry on miss, so traversal code never branches
/// on presence.
#[derive(Debug, Default)]
pub struct Results {
    entries: Vec<ResultEntry>,
    index: HashMap<Class, usize>,
}

impl Results {
    pub fn new() -> Self {
        Results::default()
    }

    /// Entry for `class`, created empty on first use.
    pub fn get(&mut self, class: &Class) -> &mut ResultEntry {
        if let Some(&i) = self.index.get(class) {
            return &mut self.entries[i];
        }
        let i = self.entries.len();
        self.entries.push(ResultEntry::new(class.clone()));
        self.index.insert(class.clone(), i);
        &mut self.entries[i]
    }

    /// Entry for `class` if one exists, without creating it.
    pub fn find(&self, class: &Class) -> Option<&ResultEntry> {
        self.index.get(class).map(|&i| &self.entries[i])
    }

    pub fn entries(&self) -> &[ResultEntry] {
        &self.entries
    }

    /// The most recently created entry.
    pub fn last_mut(&mut self) -> Option<&mut ResultEntry> {
        self.entries.last_mut()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::mock::{mock_class, mock_object};
    use serde_json::json;

    #[test]
    fn test_list_result_keeps_order_and_duplicates() {
        let mut r = ListResult::new();
        r.append(json!("a"));
        r.append(json!("b"));
        r.append(json!("a"));
        assert_eq!(r.list(), &[json!("a"), json!("b"), json!("a")]);
    }

    #[test]
    fn test_set_result_dedups_by_id() {
        // Mock object identity is the whole object.
        let mut r = SetResult::new(mock_class("d/c"));
        r.append(mock_object("d/c:x"));
        r.append(mock_object("d/c:y"));
        r.append(mock_object("d/c:x"));
        assert_eq!(r.len(), 2);
        assert_eq!(r.list()[0], mock_object("d/c:x"));
        assert_eq!(r.list()[1], mock_object("d/c:y"));
    }

    #[test]
    fn test_class_result_appends_in_order() {
        let mut r = ClassResult::new(mock_class("d/c"));
        r.append(mock_object("d/c:1"));
        r.append(mock_object("d/c:2"));
        assert_eq!(r.len(), 2);
        assert_eq!(r.class().full_name(), "d/c");
    }

    #[test]
    fn test_results_creates_entry_on_miss() {
        let mut results = Results::new();
        assert!(results.find(&mock_class("d/c")).is_none());
        results.get(&mock_class("d/c"));
        assert_eq!(results.len(), 1);
        assert!(results.find(&mock_class("d/c")).is_some());
    }

    #[test]
    fn test_results_insertion_order_and_last() {
        let mut results = Results::new();
        results.get(&mock_class("d/b"));
        results.get(&mock_class("d/a"));
        results.get(&mock_class("d/b")); // existing, does not move
        let names: Vec<String> = results
            .entries()
            .iter()
            .map(|e| e.class.full_name())
            .collect();
        assert_eq!(names, vec!["d/b", "d/a"]);
        assert_eq!(results.last_mut().unwrap().class.full_name(), "d/a");
    }
}
