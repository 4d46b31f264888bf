//! Error types.
//!
//! Failures are split by phase:
//!
//! - [`ParseError`]: why a single parser rejected its input.
//! - [`CommandError`]: why one `execute` call did not complete. Recoverable,
//!   never touches shared state.
//! - [`RegistrationError`]: why a command could not be inserted into the tree.
//!   Raised only while registering, and meant to abort startup.

use std::fmt;

/// Boxed error used for handler failures and opaque parser causes.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result of a single parser invocation.
pub type ParseResult<T> = Result<T, ParseError>;

// ============================================================================
// Parse Errors
// ============================================================================

/// Reason a parser rejected its input.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("no input was provided")]
    NoInputProvided,

    #[error("'{input}' is not a valid {expected}")]
    InvalidValue { input: String, expected: String },

    #[error("'{input}' is not in the range {min} to {max}")]
    OutOfRange {
        input: String,
        min: String,
        max: String,
    },

    #[error("unterminated quoted string: {input}")]
    UnterminatedQuote { input: String },

    #[error("'{input}' is not one of: {}", choices.join(", "))]
    UnknownChoice { input: String, choices: Vec<String> },

    #[error("{message} (at position {position})")]
    Grammar { message: String, position: usize },

    #[error("{0}")]
    Custom(String),

    #[error(transparent)]
    Other(BoxError),
}

impl ParseError {
    /// Convenience constructor for a free-form failure.
    pub fn custom(message: impl Into<String>) -> Self {
        ParseError::Custom(message.into())
    }

    /// Wrap an arbitrary error, e.g. from a remote lookup.
    pub fn other(error: impl Into<BoxError>) -> Self {
        ParseError::Other(error.into())
    }

    pub fn invalid(input: impl Into<String>, expected: impl Into<String>) -> Self {
        ParseError::InvalidValue {
            input: input.into(),
            expected: expected.into(),
        }
    }
}

// ============================================================================
// Command Errors
// ============================================================================

/// Discriminant of [`CommandError`], used to key exception handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    NoSuchCommand,
    ArgumentParse,
    NoPermission,
    InvalidSyntax,
    Handler,
    Cancelled,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::NoSuchCommand => "no-such-command",
            FailureKind::ArgumentParse => "argument-parse",
            FailureKind::NoPermission => "no-permission",
            FailureKind::InvalidSyntax => "invalid-syntax",
            FailureKind::Handler => "handler",
            FailureKind::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Failure of a single `execute` call.
///
/// Everything except [`CommandError::Handler`] is produced while resolving the
/// input against the tree, before any handler runs.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// No child of the deepest reached node accepts the next token.
    #[error("unknown command '{input}'{}", format_path(path))]
    NoSuchCommand { input: String, path: Vec<String> },

    /// A required argument failed to parse.
    #[error("invalid value for argument '{component}': {source}")]
    ArgumentParse {
        component: String,
        #[source]
        source: ParseError,
    },

    /// The sender fails the permission of the node at `path`.
    #[error("no permission to use '{}' (requires {permission})", path.join(" "))]
    NoPermission { path: Vec<String>, permission: String },

    /// Input ended before an executable node was reached.
    #[error("invalid syntax, expected: {syntax}")]
    InvalidSyntax { syntax: String },

    /// The handler itself returned an error or panicked.
    #[error("command handler failed: {0}")]
    Handler(#[source] BoxError),

    #[error("command execution was cancelled")]
    Cancelled,
}

impl CommandError {
    pub fn kind(&self) -> FailureKind {
        match self {
            CommandError::NoSuchCommand { .. } => FailureKind::NoSuchCommand,
            CommandError::ArgumentParse { .. } => FailureKind::ArgumentParse,
            CommandError::NoPermission { .. } => FailureKind::NoPermission,
            CommandError::InvalidSyntax { .. } => FailureKind::InvalidSyntax,
            CommandError::Handler(_) => FailureKind::Handler,
            CommandError::Cancelled => FailureKind::Cancelled,
        }
    }
}

fn format_path(path: &[String]) -> String {
    if path.is_empty() {
        String::new()
    } else {
        format!(" after '{}'", path.join(" "))
    }
}

// ============================================================================
// Registration Errors
// ============================================================================

/// Command could not be inserted into the tree.
///
/// The tree is left exactly as it was before the failed call.
#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error("ambiguous command at '{path}': {reason}")]
    Ambiguous { path: String, reason: String },

    #[error("variable-arity argument '{component}' must be the last argument at its position")]
    VariableArityNotLast { component: String },

    #[error("required component '{component}' follows an optional argument")]
    RequiredAfterOptional { component: String },

    #[error("component name '{name}' is used twice in the same command")]
    DuplicateComponent { name: String },

    #[error("default value for '{component}' does not have the parser's value type {expected}")]
    DefaultTypeMismatch { component: String, expected: String },

    #[error("command '{command}' has no handler")]
    MissingHandler { command: String },

    #[error("registration is locked")]
    Locked,
}

// ============================================================================
// Context / Coordinator Errors
// ============================================================================

/// Typed access to a [`CommandContext`](crate::CommandContext) failed.
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("no value bound for '{name}'")]
    Missing { name: String },

    #[error("value bound for '{name}' is not a {expected}")]
    TypeMismatch { name: String, expected: &'static str },
}

#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    #[error("threaded execution requires a tokio runtime")]
    NoRuntime(#[source] tokio::runtime::TryCurrentError),
}
