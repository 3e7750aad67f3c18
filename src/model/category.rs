use serde::{Deserialize, Serialize};

/// A user-defined label. Categories are shared — no item owns one
/// exclusively, and deleting a category must not delete items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    /// Display color name (interpreted by the UI layer)
    #[serde(default)]
    pub color: Option<String>,
}

impl Category {
    pub fn new(id: String, name: String) -> Self {
        Category {
            id,
            name,
            color: None,
        }
    }
}
