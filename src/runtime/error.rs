//! Error types for the Marionette runtime
//!
//! Domain errors use thiserror and each family gets its own result alias.
//! `RuntimeError` covers what the orchestrator itself rejects.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level runtime error
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Storage-related errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Lookup misses against the action/event/controller tables
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// No action is bound to the keyword
    #[error("unknown action '{0}'")]
    UnknownAction(String),

    /// No known event is bound to the name
    #[error("unknown event '{0}'")]
    UnknownEvent(String),

    /// No controller is bound to the name
    #[error("unknown controller '{0}'")]
    UnknownController(String),

    /// The event exposes no field with this name
    #[error("event '{event}' has no field '{field}'")]
    UnknownField {
        /// Event name
        event: String,
        /// Field name
        field: String,
    },

    /// The field exists but has no setter
    #[error("field '{field}' of event '{event}' is read-only")]
    ReadOnlyField {
        /// Event name
        event: String,
        /// Field name
        field: String,
    },

    /// The host event object is not of the type the descriptor expects
    #[error("expected a {expected} instance, got {found}")]
    EventTypeMismatch {
        /// Host event type the descriptor binds
        expected: &'static str,
        /// Type of the event that was passed in
        found: &'static str,
    },
}

/// Convenience result alias for registry operations
pub type RegistryResult<T> = std::result::Result<T, RegistryError>;

/// Failures while turning a script fragment into an action node
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    /// The fragment contained no keyword
    #[error("empty statement")]
    Empty,

    /// The keyword is not bound in the action table
    #[error(transparent)]
    Unknown(#[from] RegistryError),

    /// A required argument was missing
    #[error("'{keyword}' expects {expected}")]
    MissingArgument {
        /// Action keyword
        keyword: String,
        /// Description of the expected argument
        expected: &'static str,
    },

    /// An argument was present but malformed
    #[error("'{keyword}': invalid argument '{found}' ({reason})")]
    InvalidArgument {
        /// Action keyword
        keyword: String,
        /// Offending token
        found: String,
        /// Why it was rejected
        reason: String,
    },

    /// A quoted string was never closed
    #[error("unterminated string literal")]
    UnterminatedString,

    /// A `{ ... }` block was never closed
    #[error("unterminated block")]
    UnterminatedBlock,

    /// Trailing tokens after a complete statement
    #[error("'{keyword}': unexpected trailing input '{found}'")]
    Trailing {
        /// Action keyword
        keyword: String,
        /// First unconsumed token
        found: String,
    },
}

/// Convenience result alias for action parsing
pub type ParseResult<T> = std::result::Result<T, ParseError>;

/// Failures decoding compact delimited values
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// A present field was not a valid number of the expected type
    #[error("field {index} ('{text}') is not a valid {expected}")]
    InvalidNumber {
        /// Zero-based field index
        index: usize,
        /// Raw field text
        text: String,
        /// Expected numeric type
        expected: &'static str,
    },

    /// The world name of a location was empty or absent
    #[error("location is missing a world name")]
    MissingWorld,

    /// More fields than the value shape accepts
    #[error("expected at most {max} fields, found {found}")]
    TooManyFields {
        /// Maximum accepted field count
        max: usize,
        /// Fields present
        found: usize,
    },
}

/// Convenience result alias for codec operations
pub type CodecResult<T> = std::result::Result<T, CodecError>;

/// Actor lifecycle errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActorError {
    /// The actor factory refused to construct an instance
    #[error("failed to construct actor '{kind}': {detail}")]
    Construction {
        /// Requested entity kind
        kind: String,
        /// Factory detail
        detail: String,
    },

    /// Another live instance already carries this unique id
    #[error("unique id {0} is already live")]
    DuplicateUniqueId(String),

    /// The manager has been shut down and accepts no new actors
    #[error("actor manager is shut down")]
    ShutDown,

    /// An instance's teardown failed
    #[error("teardown of actor {unique_id} failed: {detail}")]
    Teardown {
        /// Unique id of the instance
        unique_id: String,
        /// Failure detail
        detail: String,
    },
}

/// Convenience result alias for actor operations
pub type ActorResult<T> = std::result::Result<T, ActorError>;

/// Storage-specific errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// Storage has not been initialised
    #[error("Storage not initialised: {0}")]
    NotInitialised(PathBuf),

    /// A script file could not be decoded
    #[error("Malformed script {path}: {detail}")]
    MalformedScript {
        /// Script file path
        path: PathBuf,
        /// Error details
        detail: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Convenience result alias for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Migration errors, scoped to one strategy
#[derive(Debug, Error)]
pub enum MigrationError {
    /// The source system could not be read
    #[error("{dependency}: source unavailable: {detail}")]
    SourceUnavailable {
        /// Source system name
        dependency: String,
        /// Failure detail
        detail: String,
    },

    /// A source record could not be converted
    #[error("{dependency}: record '{record}' is invalid: {detail}")]
    InvalidRecord {
        /// Source system name
        dependency: String,
        /// Record identifier
        record: String,
        /// Failure detail
        detail: String,
    },

    /// The strategy panicked
    #[error("{dependency}: migration panicked")]
    Panicked {
        /// Source system name
        dependency: String,
    },

    /// Materialising a migrated actor failed
    #[error("{dependency}: {source}")]
    Actor {
        /// Source system name
        dependency: String,
        /// Underlying actor error
        #[source]
        source: ActorError,
    },
}

/// Convenience result alias for migration operations
pub type MigrationResult<T> = std::result::Result<T, MigrationError>;
