//! Engine configuration.

use serde::{Deserialize, Serialize};

/// Base class every iTop CMDB class ultimately derives from.
pub const DEFAULT_ROOT_CLASS: &str = "cmdbAbstractObject";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Parent id that terminates ancestor resolution. Compared by exact id;
    /// the class itself need not be present in the document.
    pub root_class: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            root_class: DEFAULT_ROOT_CLASS.to_string(),
        }
    }
}

impl EngineConfig {
    pub fn with_root_class(mut self, root_class: impl Into<String>) -> Self {
        self.root_class = root_class.into();
        self
    }

    pub fn is_root(&self, class: &str) -> bool {
        self.root_class == class
    }
}
