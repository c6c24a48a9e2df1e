//! Interning of transition labels.

use std::fmt::{Display, Formatter};

/// Dense identifier of an interned transition label.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Label(u32);

impl Label {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl Display for Label {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Maps label strings to dense ids, assigned in first-seen order.
///
/// Label alphabets are small in practice, so lookup is a linear scan.
#[derive(Debug, Default, Clone)]
pub struct LabelTable {
    names: Vec<String>,
}

impl LabelTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the id of `name`, assigning the next id if it was not seen before.
    pub fn intern(&mut self, name: &str) -> Label {
        if let Some(i) = self.names.iter().position(|n| n == name) {
            return Label(i as u32);
        }
        self.names.push(name.to_string());
        Label((self.names.len() - 1) as u32)
    }

    /// Looks up `name` without interning it.
    pub fn get(&self, name: &str) -> Option<Label> {
        self.names.iter().position(|n| n == name).map(|i| Label(i as u32))
    }

    /// Returns the name of an interned label.
    pub fn resolve(&self, label: Label) -> Option<&str> {
        self.names.get(label.index()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
