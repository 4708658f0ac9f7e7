//! Command rejection reasons.

use brokersim_types::{BrokerId, Connection, MetadataMode, NodeId};
use thiserror::Error;

/// Why a command was rejected.
///
/// Rejections never leave the engine in a partially-applied state: the
/// cluster is exactly as it was before the command.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommandError {
    /// Command not legal in the current session status, or an invalid link.
    #[error("Illegal transition: {0}")]
    IllegalTransition(String),

    /// The active metadata layer cannot authorize the change.
    #[error("Metadata layer unavailable in {mode} mode")]
    MetadataUnavailable { mode: MetadataMode },

    /// The connection already exists.
    #[error("Connection {0} already exists")]
    DuplicateConnection(Connection),

    /// No node with this id.
    #[error("Unknown node: {0}")]
    UnknownNode(NodeId),

    /// Broker id outside the fixed pool.
    #[error("Unknown broker: {0}")]
    UnknownBroker(BrokerId),

    /// Field value out of range or not applicable to the node.
    #[error("Invalid update: {0}")]
    InvalidUpdate(String),
}

impl CommandError {
    pub fn illegal(reason: impl Into<String>) -> Self {
        CommandError::IllegalTransition(reason.into())
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        CommandError::InvalidUpdate(reason.into())
    }
}
