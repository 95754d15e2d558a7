use std::fmt;
use std::path::PathBuf;

/// What is wrong with a field (or class) that resolution depended on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Malformation {
    /// An expected child element (e.g. `target_attcode`) is absent or empty.
    MissingChild(&'static str),
    /// `extkey_attcode` names a field the schema does not declare.
    UnknownKeyField(String),
    /// A class reference (`target_class`, `linked_class`) names no class in
    /// the document.
    UnknownClass {
        attribute: &'static str,
        class: String,
    },
    /// The declared parent is neither the root class nor a class in the
    /// document.
    UnknownParent(String),
}

impl fmt::Display for Malformation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Malformation::MissingChild(name) => write!(f, "missing `{name}`"),
            Malformation::UnknownKeyField(key) => {
                write!(f, "key field `{key}` is not declared on the schema")
            }
            Malformation::UnknownClass { attribute, class } => {
                write!(f, "`{attribute}` refers to unknown class `{class}`")
            }
            Malformation::UnknownParent(parent) => write!(f, "unknown parent class `{parent}`"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("unknown schema `{schema}`")]
    UnknownSchema { schema: String },

    /// `field` is `None` when the problem is on the class itself (its parent).
    #[error(
        "malformed document: schema `{schema}`{}: {problem}",
        .field.as_ref().map(|f| format!(", field `{f}`")).unwrap_or_default()
    )]
    MalformedDocument {
        schema: String,
        field: Option<String>,
        problem: Malformation,
    },

    #[error("inheritance cycle at `{schema}`: {}", .chain.join(" -> "))]
    InheritanceCycle { schema: String, chain: Vec<String> },
}

impl ResolveError {
    pub(crate) fn malformed(schema: &str, field: &str, problem: Malformation) -> Self {
        ResolveError::MalformedDocument {
            schema: schema.to_string(),
            field: Some(field.to_string()),
            problem,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("XML error at byte {position}: {source}")]
    Xml {
        position: usize,
        #[source]
        source: quick_xml::Error,
    },
    #[error("document ended with {open} unclosed element(s)")]
    UnbalancedDocument { open: usize },
}
