use html::{DomError, NodeKey};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HighlightError {
    #[error("query term '{term}' cannot be compiled: {source}")]
    InvalidTerm {
        term: String,
        #[source]
        source: regex::Error,
    },
    /// Replacing one text node failed. Non-fatal: the pass skips the node.
    #[error("failed to replace text node {node:?}: {source}")]
    DomReplaceFailure {
        node: NodeKey,
        #[source]
        source: DomError,
    },
    #[error("failed to restore container {container:?}: {source}")]
    Restore {
        container: NodeKey,
        #[source]
        source: DomError,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid highlight config: {0}")]
    Parse(#[from] toml::de::Error),
}
