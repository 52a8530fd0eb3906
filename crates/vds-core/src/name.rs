use std::fmt;

use serde::{Deserialize, Serialize};

/// Name of a simulator object, written `class.element` (e.g. `load.lv_1144`).
///
/// The simulator treats names case-insensitively; [`ObjectName::key`] gives
/// the normalized form used for lookups, while `element` keeps the spelling
/// it was created with so diagnostics and output columns stay recognizable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectName {
    pub class: String,
    pub element: String,
}

impl ObjectName {
    pub fn new(class: impl Into<String>, element: impl Into<String>) -> Self {
        Self {
            class: class.into().to_lowercase(),
            element: element.into(),
        }
    }

    pub fn load(element: impl Into<String>) -> Self {
        Self::new("load", element)
    }

    pub fn transformer(element: impl Into<String>) -> Self {
        Self::new("transformer", element)
    }

    pub fn loadshape(element: impl Into<String>) -> Self {
        Self::new("loadshape", element)
    }

    /// Parse `class.element`. A bare element is rejected.
    pub fn parse(full: &str) -> Option<Self> {
        let (class, element) = full.trim().split_once('.')?;
        if class.is_empty() || element.is_empty() {
            return None;
        }
        Some(Self::new(class, element))
    }

    /// Full object name, as the simulator addresses it.
    pub fn object(&self) -> String {
        format!("{}.{}", self.class, self.element)
    }

    /// Case-folded element name for lookups.
    pub fn key(&self) -> String {
        normalize(&self.element)
    }
}

impl fmt::Display for ObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.class, self.element)
    }
}

/// Case-fold an element name the way the simulator compares names.
pub fn normalize(element: &str) -> String {
    element.trim().to_lowercase()
}
