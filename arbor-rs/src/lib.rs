//! # arbor: command trees for chat, console and game servers
//!
//! Commands are chains of literals and typed arguments. Registering them
//! builds one shared tree; raw input is matched against it token by token,
//! with each argument parsed by its own (possibly async) parser, permissions
//! checked along the way and the winning handler run on a pluggable executor.
//! The same walk completes partial input for tab completion.
//!
//! ## Core Principles
//!
//! - **Typed arguments**: parsers produce real values, handlers read them back
//!   by name with type checking
//! - **Async where it matters**: a parser may suspend on a remote lookup
//!   without blocking other resolutions
//! - **Fail before the handler**: unknown commands, bad arguments and missing
//!   permissions are reported without running any handler
//! - **Read-mostly tree**: registration is copy-on-write, traffic never locks
//!
//! ## Quick Start
//!
//! ```rust
//! use arbor::{Command, CommandContext, CommandManager, IntegerParser, StringParser};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> anyhow::Result<()> {
//! struct Player {
//!     name: String,
//! }
//!
//! let manager = CommandManager::<Player>::new();
//! manager.register(
//!     Command::builder("give")
//!         .required("item", StringParser::single())
//!         .optional("amount", IntegerParser::new().with_min(1))
//!         .handler(|ctx: CommandContext<Player>| async move {
//!             let item = ctx.require::<String>("item")?;
//!             let amount = ctx.get_or::<i64>("amount", 1);
//!             println!("{} gets {amount} x {item}", ctx.sender().name);
//!             Ok(())
//!         })
//!         .build()?,
//! )?;
//!
//! let steve = Player { name: "steve".into() };
//! manager.execute(steve, "give stone 5").await?;
//!
//! let alex = Player { name: "alex".into() };
//! let completions = manager.suggest(alex, "gi").await.texts();
//! assert_eq!(completions, vec!["give"]);
//! # Ok(())
//! # }
//! ```

extern crate self as arbor;

pub mod command;
pub mod component;
pub mod context;
pub mod deferred;
pub mod error;
pub mod exception;
pub mod execution;
pub mod input;
pub mod manager;
pub mod parser;
pub mod permission;
pub mod suggestion;
pub mod tracing_support;
mod tree;

// Re-export the derive macro. It lives in the macro namespace, the trait of
// the same name in the type namespace.
pub use arbor_rs_macros::Choice;

// Re-export tracing itself so hosts log through the same version.
pub use tracing;

#[cfg(feature = "subscriber")]
pub use tracing_support::{init_subscriber, init_subscriber_with_config, TracingConfig, TracingFormat};

// ============================================================================
// Core Types
// ============================================================================

pub use command::{Command, CommandBuilder, CommandHandler, CommandMeta, HandlerResult};
pub use component::{ArgumentComponent, CommandComponent, ComponentKind, DefaultValue};
pub use context::{CommandContext, ContextKey};
pub use deferred::Deferred;
pub use error::{
    BoxError, CommandError, ContextError, CoordinatorError, FailureKind, ParseError, ParseResult,
    RegistrationError,
};
pub use exception::ExceptionController;
pub use execution::{CancelHandle, CommandResult, ExecutionCoordinator, ExecutionHandle};
pub use input::CommandInput;
pub use manager::{CommandManager, CommandManagerBuilder, ManagerConfig};
pub use permission::{AllowAll, DenyAll, Permission, PermissionChecker};
pub use suggestion::{
    FutureSuggestions, StaticSuggestions, Suggestion, SuggestionFuture, SuggestionProvider,
    Suggestions,
};

// ============================================================================
// Parsers
// ============================================================================

pub use parser::{
    ArgumentParser, BooleanParser, Choice, ChoiceParser, DoubleParser, GrammarError,
    GrammarParser, GrammarProvider, IntegerParser, NumberParser, ParseFuture, ParserDescriptor,
    ParserExt, ParserOutput, ParserRegistry, PairParser, StringMode, StringParser,
};
