//! The command manager: the entry point hosts talk to.
//!
//! A [`CommandManager`] owns the command tree, the parser registry, the
//! permission checker, the execution coordinator and the exception chain.
//! Commands are registered during startup, then `execute` and `suggest`
//! serve traffic from any number of tasks.

use crate::command::Command;
use crate::context::CommandContext;
use crate::error::{CommandError, RegistrationError};
use crate::exception::ExceptionController;
use crate::execution::{CommandResult, ExecutionCoordinator, ExecutionHandle, Reporter};
use crate::input::CommandInput;
use crate::parser::{ParserDescriptor, ParserRegistry};
use crate::permission::{DenyAll, PermissionChecker};
use crate::suggestion::{self, Suggestions};
use crate::tree::CommandTree;
use futures::future::FutureExt;
use serde::Deserialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// Tunables a host may load from its own configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Permit `register` after [`CommandManager::lock_registration`].
    pub allow_unsafe_registration: bool,

    /// Prefix filtering of suggestions ignores ASCII case.
    pub case_insensitive_suggestions: bool,

    /// Upper bound on the number of suggestions returned.
    pub max_suggestions: Option<usize>,
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`CommandManager`].
pub struct CommandManagerBuilder<S> {
    coordinator: ExecutionCoordinator,
    checker: Option<Arc<dyn PermissionChecker<S>>>,
    parsers: Option<ParserRegistry<S>>,
    config: ManagerConfig,
}

impl<S: Send + Sync + 'static> CommandManagerBuilder<S> {
    pub fn new() -> Self {
        Self {
            coordinator: ExecutionCoordinator::inline(),
            checker: None,
            parsers: None,
            config: ManagerConfig::default(),
        }
    }

    /// Set the execution policy. Defaults to inline.
    pub fn coordinator(mut self, coordinator: ExecutionCoordinator) -> Self {
        self.coordinator = coordinator;
        self
    }

    /// Set how named permissions are resolved. Defaults to [`DenyAll`].
    pub fn permission_checker(mut self, checker: impl PermissionChecker<S> + 'static) -> Self {
        self.checker = Some(Arc::new(checker));
        self
    }

    /// Replace the standard parser registry.
    pub fn parser_registry(mut self, parsers: ParserRegistry<S>) -> Self {
        self.parsers = Some(parsers);
        self
    }

    pub fn config(mut self, config: ManagerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> CommandManager<S> {
        tracing::debug!(
            policy = self.coordinator.policy_name(),
            "building command manager"
        );
        CommandManager {
            tree: RwLock::new(Arc::new(CommandTree::new())),
            locked: AtomicBool::new(false),
            coordinator: self.coordinator,
            checker: self.checker.unwrap_or_else(|| Arc::new(DenyAll)),
            parsers: self.parsers.unwrap_or_else(ParserRegistry::standard),
            exceptions: Arc::new(ExceptionController::new()),
            config: self.config,
        }
    }
}

impl<S: Send + Sync + 'static> Default for CommandManagerBuilder<S> {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Manager
// ============================================================================

/// Registers commands, runs them and completes partial input.
///
/// # Example
///
/// ```
/// use arbor::{Command, CommandContext, CommandManager, IntegerParser, StringParser};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let manager = CommandManager::<String>::new();
/// manager
///     .register(
///         Command::builder("give")
///             .required("item", StringParser::single())
///             .required("amount", IntegerParser::new())
///             .handler(|ctx: CommandContext<String>| async move {
///                 let amount = *ctx.require::<i64>("amount")?;
///                 println!("{} receives {amount}", ctx.sender());
///                 Ok(())
///             })
///             .build()
///             .unwrap(),
///     )
///     .unwrap();
///
/// let result = manager.execute("steve".to_string(), "give stone 5").await.unwrap();
/// assert_eq!(result.context.get::<i64>("amount"), Some(&5));
/// # }
/// ```
pub struct CommandManager<S> {
    tree: RwLock<Arc<CommandTree<S>>>,
    locked: AtomicBool,
    coordinator: ExecutionCoordinator,
    checker: Arc<dyn PermissionChecker<S>>,
    parsers: ParserRegistry<S>,
    exceptions: Arc<ExceptionController<S>>,
    config: ManagerConfig,
}

impl<S: Send + Sync + 'static> CommandManager<S> {
    /// Manager with inline execution, [`DenyAll`] and the standard parsers.
    pub fn new() -> Self {
        CommandManagerBuilder::new().build()
    }

    pub fn builder() -> CommandManagerBuilder<S> {
        CommandManagerBuilder::new()
    }

    /// Insert `command` into the tree.
    ///
    /// Either the whole command is inserted or, on error, the tree is left
    /// untouched. Executions already in flight keep the tree they started with.
    pub fn register(&self, command: Command<S>) -> Result<(), RegistrationError> {
        let name = command.name().to_string();
        if self.locked.load(Ordering::Acquire) && !self.config.allow_unsafe_registration {
            tracing::warn!(command = %name, "registration rejected: registration is locked");
            return Err(RegistrationError::Locked);
        }

        let command = Arc::new(command);
        let mut tree = self.tree.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = CommandTree::clone(&tree);
        if let Err(err) = next.insert(Arc::clone(&command)) {
            tracing::warn!(command = %name, error = %err, "registration rejected");
            return Err(err);
        }
        *tree = Arc::new(next);

        tracing::info!(command = %name, syntax = %command.syntax(), "Command registered");
        Ok(())
    }

    /// Enter the serving phase; see [`ManagerConfig::allow_unsafe_registration`].
    pub fn lock_registration(&self) {
        if !self.locked.swap(true, Ordering::AcqRel) {
            tracing::info!("Command registration locked");
        }
    }

    pub fn is_registration_locked(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }

    /// Resolve `input` and run the matching handler under the configured
    /// coordinator.
    ///
    /// Failures are passed to the exception chain once and then returned
    /// through the handle.
    pub fn execute(
        &self,
        sender: impl Into<Arc<S>>,
        input: &str,
    ) -> ExecutionHandle<CommandResult<S>> {
        let sender = sender.into();
        let raw = input.to_string();
        let tree = self.snapshot();
        let checker = Arc::clone(&self.checker);

        let resolve = {
            let sender = Arc::clone(&sender);
            async move {
                let mut context = CommandContext::new(sender, &raw);
                let mut input = CommandInput::new(&raw);
                match tree.resolve(&mut context, &mut input, checker.as_ref()).await {
                    Ok(command) => {
                        tracing::debug!(command = %command.name(), input = %raw, "command resolved");
                        Ok(CommandResult { context, command })
                    }
                    Err(err) => {
                        tracing::debug!(input = %raw, kind = ?err.kind(), "command resolution failed");
                        Err(err)
                    }
                }
            }
        };

        let exceptions = Arc::clone(&self.exceptions);
        let report: Reporter = Arc::new(move |err: &CommandError| {
            exceptions.handle(&sender, err);
        });
        self.coordinator.schedule(resolve.boxed(), report)
    }

    /// Complete the last token of `input`.
    pub async fn suggest(&self, sender: impl Into<Arc<S>>, input: &str) -> Suggestions {
        let tree = self.snapshot();
        let mut context = CommandContext::new(sender.into(), input);
        let mut cursor = CommandInput::new(input);
        let set = tree
            .suggest(&mut context, &mut cursor, self.checker.as_ref())
            .await;

        let suggestions = suggestion::process(
            set.candidates,
            &set.partial,
            self.config.case_insensitive_suggestions,
            self.config.max_suggestions,
        );
        tracing::debug!(input = %input, count = suggestions.len(), "suggestions computed");
        Suggestions::new(suggestions)
    }

    /// Every registered command, in registration order per tree level.
    pub fn commands(&self) -> Vec<Arc<Command<S>>> {
        self.snapshot().commands()
    }

    pub fn exception_controller(&self) -> &ExceptionController<S> {
        &self.exceptions
    }

    pub fn parser_registry(&self) -> &ParserRegistry<S> {
        &self.parsers
    }

    /// Registered default parser for `T`.
    pub fn parser<T: 'static>(&self) -> Option<ParserDescriptor<S>> {
        self.parsers.parser::<T>()
    }

    pub fn coordinator(&self) -> &ExecutionCoordinator {
        &self.coordinator
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    fn snapshot(&self) -> Arc<CommandTree<S>> {
        Arc::clone(&self.tree.read().unwrap_or_else(PoisonError::into_inner))
    }
}

impl<S: Send + Sync + 'static> Default for CommandManager<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> fmt::Debug for CommandManager<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandManager")
            .field("locked", &self.locked.load(Ordering::Relaxed))
            .field("coordinator", &self.coordinator)
            .field("parsers", &self.parsers)
            .field("exceptions", &self.exceptions)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
