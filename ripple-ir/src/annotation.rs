//! Annotations attached to modules, ports, and declarations.
//!
//! Annotations arrive as JSON objects keyed by a `class` string. The class
//! strings are wire format; passes match on them bit-exactly and consume the
//! annotations they recognize.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    /// The fully qualified class name of this annotation.
    pub class: String,
    /// Any additional payload fields the class defines.
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl Annotation {
    pub fn new<S: Into<String>>(class: S) -> Self {
        Self {
            class: class.into(),
            fields: serde_json::Map::new(),
        }
    }

    pub fn is_class(&self, class: &str) -> bool {
        self.class == class
    }
}
