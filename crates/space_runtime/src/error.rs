//! Error types for the space runtime.

use std::borrow::Cow;

use space_component::{ComponentError, EntityId, TypeKey};

use crate::system::SystemId;

/// Errors raised by the managers, the dispatcher, and the [`Space`](crate::Space).
///
/// Every failure falls into one of two kinds that callers usually care
/// about: a lookup of something absent ([`SpaceError::is_lookup`]) or an
/// insertion of something already present ([`SpaceError::is_duplicate`]).
/// Failed lookups and duplicate insertions never leave a partial change
/// behind.
#[derive(Debug, thiserror::Error)]
pub enum SpaceError {
    #[error(transparent)]
    Component(#[from] ComponentError),

    #[error("entity {0} is already registered")]
    DuplicateEntity(EntityId),

    #[error("entity {0} not found")]
    EntityNotFound(EntityId),

    #[error("state {0} is already present")]
    DuplicateStateType(TypeKey),

    #[error("state {0} not found")]
    StateNotFound(TypeKey),

    #[error("system {0} is already installed")]
    DuplicateSystem(SystemId),

    #[error("system {0} is not installed")]
    SystemNotFound(SystemId),

    /// A binding declared event keys for an event type that has no key
    /// function.
    #[error("system {system} binds keyed handlers for {event}, which has no key function")]
    MissingKeyFunction { system: SystemId, event: TypeKey },

    /// An `on_added` or `on_removed` hook returned an error.
    #[error("{hook} hook of system {system} failed")]
    Hook {
        system: SystemId,
        hook: &'static str,
        #[source]
        source: anyhow::Error,
    },

    /// A bound callback returned an error while an event was processed.
    #[error("handler `{handler}` of system {system} failed while processing {event}")]
    Handler {
        system: SystemId,
        handler: Cow<'static, str>,
        event: TypeKey,
        #[source]
        source: anyhow::Error,
    },
}

impl SpaceError {
    /// Returns `true` for failures caused by an absent entity, component,
    /// state, or system.
    #[must_use]
    pub fn is_lookup(&self) -> bool {
        match self {
            Self::Component(err) => err.is_lookup(),
            Self::EntityNotFound(_) | Self::StateNotFound(_) | Self::SystemNotFound(_) => true,
            _ => false,
        }
    }

    /// Returns `true` for failures caused by inserting something already
    /// present.
    #[must_use]
    pub fn is_duplicate(&self) -> bool {
        match self {
            Self::Component(err) => err.is_duplicate(),
            Self::DuplicateEntity(_) | Self::DuplicateStateType(_) | Self::DuplicateSystem(_) => true,
            _ => false,
        }
    }

    /// Recovers a `SpaceError` that a host callback propagated with `?`,
    /// or wraps any other failure with `wrap`.
    pub(crate) fn from_callback(
        source: anyhow::Error,
        wrap: impl FnOnce(anyhow::Error) -> Self,
    ) -> Self {
        match source.downcast::<SpaceError>() {
            Ok(err) => err,
            Err(source) => wrap(source),
        }
    }
}
