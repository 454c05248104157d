use crate::di::Key;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ContainerError>;

/// Errors raised while binding or resolving providers.
///
/// Every variant except [`ContainerError::Receiver`] describes a wiring
/// defect: a binding that is missing, malformed or cyclic.
#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("container: no concrete found for: {0}")]
    NotFound(Key),

    #[error(
        "container: resolver function signature is invalid - it must return abstract, or abstract and error ({key})"
    )]
    InvalidResolver { key: Key },

    #[error(
        "container: resolver function signature is invalid - depends on abstract it returns: {chain}"
    )]
    SelfDependency { key: Key, chain: String },

    #[error("container: circular dependency detected while resolving {key}: {chain}")]
    CircularDependency { key: Key, chain: String },

    #[error("container: {0} is already bound")]
    AlreadyBound(Key),

    #[error("container: encountered error while making concrete for: {key}. Error encountered: {source}")]
    Construction {
        key: Key,
        #[source]
        source: anyhow::Error,
    },

    #[error("container: cannot make {field} field: {source}")]
    Field {
        field: &'static str,
        #[source]
        source: Box<ContainerError>,
    },

    #[error("container: failed to downcast concrete for: {0}")]
    DowncastFailed(Key),

    /// The function handed to `call` ran and returned an error of its own.
    #[error(transparent)]
    Receiver(anyhow::Error),
}

impl ContainerError {
    /// Wrap a resolution failure with the name of the struct field being injected.
    pub fn field(field: &'static str, source: ContainerError) -> Self {
        Self::Field {
            field,
            source: Box::new(source),
        }
    }

    /// The key the error is about, if any.
    pub fn key(&self) -> Option<&Key> {
        match self {
            Self::NotFound(key)
            | Self::InvalidResolver { key }
            | Self::SelfDependency { key, .. }
            | Self::CircularDependency { key, .. }
            | Self::AlreadyBound(key)
            | Self::Construction { key, .. }
            | Self::DowncastFailed(key) => Some(key),
            Self::Field { source, .. } => source.key(),
            Self::Receiver(_) => None,
        }
    }
}
