//! Dispatch and lifecycle errors raised by the application context.

use thiserror::Error;

/// Application context error.
///
/// These are **resolution boundary** errors: the context does not recover from
/// them. Callers (or a transport collaborator) decide how to surface them.
///
/// ## Error Categories
///
/// - **ProcessorNotFound**: the command type has no bound processor (or the context is stopped)
/// - **ViewNotFound**: no view factory matched or the factory produced nothing
/// - **ProcessorInitialization**: constructing or initializing a processor failed
/// - **ConfigConflict**: two processors declare the same command under strict bindings
/// - **CommandMismatch**: an erased binding did not produce the declared types (internal)
/// - **ContextDropped**: a processor used its context reference after the context was dropped
#[derive(Debug, Error)]
pub enum ContextError {
    #[error("processor not found for command \"{command}\"")]
    ProcessorNotFound { command: &'static str },

    #[error("view \"{view}\" not found")]
    ViewNotFound { view: String },

    #[error("error instantiating processor \"{processor}\": {source:#}")]
    ProcessorInitialization {
        processor: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("command \"{command}\" is declared by both \"{first}\" and \"{second}\"")]
    ConfigConflict {
        command: &'static str,
        first: &'static str,
        second: &'static str,
    },

    #[error("processor \"{processor}\" did not handle command \"{command}\" as declared")]
    CommandMismatch {
        processor: &'static str,
        command: &'static str,
    },

    #[error("application context is no longer available")]
    ContextDropped,
}

impl ContextError {
    pub fn processor_not_found(command: &'static str) -> Self {
        Self::ProcessorNotFound { command }
    }

    pub fn view_not_found(view: impl Into<String>) -> Self {
        Self::ViewNotFound { view: view.into() }
    }

    pub fn initialization(processor: &'static str, source: anyhow::Error) -> Self {
        Self::ProcessorInitialization { processor, source }
    }

    pub fn command_mismatch(processor: &'static str, command: &'static str) -> Self {
        Self::CommandMismatch { processor, command }
    }
}
