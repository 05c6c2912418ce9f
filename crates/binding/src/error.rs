use crate::controller::Role;
use core_types::TargetId;
use html::{DomError, NodeKey};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BindingError {
    #[error("`{operation}` requires the {expected:?} role")]
    WrongRole {
        expected: Role,
        operation: &'static str,
    },
    #[error("controller is not attached")]
    NotAttached,
    #[error("unknown target {0:?}")]
    UnknownTarget(TargetId),
    #[error("{0:?} is already the root of a target")]
    DuplicateTarget(NodeKey),
    #[error("host document is borrowed elsewhere")]
    HostBusy,
    #[error("target root {0:?} is not a live element")]
    InvalidRoot(NodeKey),
    #[error(transparent)]
    Dom(#[from] DomError),
}
