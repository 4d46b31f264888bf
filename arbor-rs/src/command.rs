//! Commands, handlers and the command builder.

use crate::component::{CommandComponent, DefaultValue};
use crate::context::CommandContext;
use crate::error::{BoxError, RegistrationError};
use crate::parser::{ArgumentParser, ParserDescriptor};
use crate::permission::Permission;
use futures::future::BoxFuture;
use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// What a handler returns.
pub type HandlerResult = Result<(), BoxError>;

/// Business logic invoked with a fully resolved context.
///
/// Implemented for async closures `Fn(CommandContext<S>) -> impl Future<Output
/// = HandlerResult>`.
pub trait CommandHandler<S>: Send + Sync + 'static {
    fn handle(&self, context: CommandContext<S>) -> BoxFuture<'static, HandlerResult>;
}

impl<S, F, Fut> CommandHandler<S> for F
where
    F: Fn(CommandContext<S>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn handle(&self, context: CommandContext<S>) -> BoxFuture<'static, HandlerResult> {
        Box::pin(self(context))
    }
}

/// Description and free-form tags attached to a command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandMeta {
    pub description: Option<String>,
    pub tags: Vec<String>,
}

/// An executable command: a component chain plus its handler.
///
/// Immutable once built. The first component is always a literal holding the
/// command's root name and aliases.
pub struct Command<S> {
    components: Vec<CommandComponent<S>>,
    handler: Arc<dyn CommandHandler<S>>,
    permission: Permission<S>,
    meta: CommandMeta,
}

impl<S> Command<S> {
    pub fn builder(name: impl Into<String>) -> CommandBuilder<S> {
        CommandBuilder::new(name)
    }

    /// Root literal name.
    pub fn name(&self) -> &str {
        self.components
            .first()
            .map(CommandComponent::name)
            .unwrap_or_default()
    }

    pub fn components(&self) -> &[CommandComponent<S>] {
        &self.components
    }

    pub fn permission(&self) -> &Permission<S> {
        &self.permission
    }

    pub fn meta(&self) -> &CommandMeta {
        &self.meta
    }

    pub fn description(&self) -> Option<&str> {
        self.meta.description.as_deref()
    }

    /// Rendering such as `give <item> [amount]`.
    pub fn syntax(&self) -> String {
        self.components
            .iter()
            .map(CommandComponent::syntax)
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub(crate) fn handler(&self) -> &Arc<dyn CommandHandler<S>> {
        &self.handler
    }
}

impl<S> fmt::Debug for Command<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("syntax", &self.syntax())
            .field("permission", &self.permission)
            .field("meta", &self.meta)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Accumulates components for one command; [`build`](Self::build) validates
/// them and produces the immutable [`Command`].
///
/// The builder is `Clone`, so a shared prefix can be set up once and extended
/// into sibling commands.
///
/// ```
/// use arbor::{Command, CommandContext, IntegerParser, StringParser};
///
/// let give = Command::<()>::builder("give")
///     .required("item", StringParser::single())
///     .optional("amount", IntegerParser::new())
///     .description("Give an item")
///     .handler(|_ctx: CommandContext<()>| async { Ok(()) })
///     .build()
///     .unwrap();
///
/// assert_eq!(give.syntax(), "give <item> [amount]");
/// ```
pub struct CommandBuilder<S> {
    name: String,
    aliases: Vec<String>,
    components: Vec<CommandComponent<S>>,
    permission: Permission<S>,
    meta: CommandMeta,
    handler: Option<Arc<dyn CommandHandler<S>>>,
}

impl<S> CommandBuilder<S> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
            components: Vec::new(),
            permission: Permission::Empty,
            meta: CommandMeta::default(),
            handler: None,
        }
    }

    /// Alternative root name.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn literal(self, name: impl Into<String>) -> Self {
        self.component(CommandComponent::literal(name))
    }

    pub fn literal_with_aliases<I, A>(self, name: impl Into<String>, aliases: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        self.component(CommandComponent::literal_with_aliases(name, aliases))
    }

    pub fn required(self, name: impl Into<String>, parser: impl ArgumentParser<S>) -> Self {
        self.component(CommandComponent::required(name, parser))
    }

    pub fn required_with(self, name: impl Into<String>, parser: ParserDescriptor<S>) -> Self {
        self.component(CommandComponent::required_with(name, parser))
    }

    pub fn optional(self, name: impl Into<String>, parser: impl ArgumentParser<S>) -> Self {
        self.component(CommandComponent::optional(name, parser))
    }

    pub fn optional_with_default(
        self,
        name: impl Into<String>,
        parser: impl ArgumentParser<S>,
        default: DefaultValue<S>,
    ) -> Self {
        self.component(CommandComponent::optional_with_default(name, parser, default))
    }

    pub fn component(mut self, component: CommandComponent<S>) -> Self {
        self.components.push(component);
        self
    }

    /// Combined with any permission already set using AND.
    pub fn permission(mut self, permission: impl Into<Permission<S>>) -> Self {
        self.permission = std::mem::take(&mut self.permission).and(permission.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.meta.description = Some(description.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.meta.tags.push(tag.into());
        self
    }

    pub fn handler<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(CommandContext<S>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Use an existing [`CommandHandler`], e.g. one shared between commands.
    pub fn handler_arc(mut self, handler: Arc<dyn CommandHandler<S>>) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn build(self) -> Result<Command<S>, RegistrationError> {
        let handler = self.handler.ok_or_else(|| RegistrationError::MissingHandler {
            command: self.name.clone(),
        })?;

        let mut components = Vec::with_capacity(self.components.len() + 1);
        components.push(CommandComponent::literal_with_aliases(
            self.name,
            self.aliases,
        ));
        components.extend(self.components);
        validate(&components)?;

        Ok(Command {
            components,
            handler,
            permission: self.permission,
            meta: self.meta,
        })
    }
}

impl<S> Clone for CommandBuilder<S> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            aliases: self.aliases.clone(),
            components: self.components.clone(),
            permission: self.permission.clone(),
            meta: self.meta.clone(),
            handler: self.handler.clone(),
        }
    }
}

fn validate<S>(components: &[CommandComponent<S>]) -> Result<(), RegistrationError> {
    let mut names = HashSet::new();
    let mut seen_optional = false;
    let last = components.len().saturating_sub(1);

    for (index, component) in components.iter().enumerate() {
        if !names.insert(component.name()) {
            return Err(RegistrationError::DuplicateComponent {
                name: component.name().to_string(),
            });
        }
        if seen_optional && !component.is_optional() {
            return Err(RegistrationError::RequiredAfterOptional {
                component: component.name().to_string(),
            });
        }
        seen_optional |= component.is_optional();

        if component.is_variable_arity() && index != last {
            return Err(RegistrationError::VariableArityNotLast {
                component: component.name().to_string(),
            });
        }

        let Some(argument) = component.as_argument() else {
            continue;
        };
        let expected = argument.parser().value_type();
        if let Some((actual, _)) = argument.default_value().and_then(|d| d.value_type()) {
            if actual != expected {
                return Err(RegistrationError::DefaultTypeMismatch {
                    component: component.name().to_string(),
                    expected: argument.parser().value_type_name().to_string(),
                });
            }
        }
    }
    Ok(())
}
