use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("invalid preset '{name}': {reason}")]
    InvalidPreset { name: String, reason: String },
}
