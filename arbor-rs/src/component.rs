//! Declarative descriptors for the nodes of a command.

use crate::context::{CommandContext, ErasedValue};
use crate::error::{ParseError, ParseResult};
use crate::input::CommandInput;
use crate::parser::{ArgumentParser, ParserDescriptor};
use crate::suggestion::SuggestionProvider;
use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::sync::Arc;

/// One element of a command: a literal keyword or a named argument.
pub struct CommandComponent<S> {
    name: String,
    kind: ComponentKind<S>,
    description: Option<String>,
}

pub enum ComponentKind<S> {
    Literal { aliases: Vec<String> },
    Argument(ArgumentComponent<S>),
}

pub struct ArgumentComponent<S> {
    parser: ParserDescriptor<S>,
    optional: bool,
    default: Option<DefaultValue<S>>,
    suggestions: Option<Arc<dyn SuggestionProvider<S>>>,
}

impl<S> CommandComponent<S> {
    pub fn literal(name: impl Into<String>) -> Self {
        Self::literal_with_aliases(name, Vec::<String>::new())
    }

    pub fn literal_with_aliases<I, A>(name: impl Into<String>, aliases: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        Self {
            name: name.into(),
            kind: ComponentKind::Literal {
                aliases: aliases.into_iter().map(Into::into).collect(),
            },
            description: None,
        }
    }

    pub fn required(name: impl Into<String>, parser: impl ArgumentParser<S>) -> Self {
        Self::argument(name, ParserDescriptor::of(parser), false, None)
    }

    /// Required argument backed by an already erased parser, e.g. one taken
    /// from a [`ParserRegistry`](crate::ParserRegistry).
    pub fn required_with(name: impl Into<String>, parser: ParserDescriptor<S>) -> Self {
        Self::argument(name, parser, false, None)
    }

    /// Optional argument. Left unbound when omitted.
    pub fn optional(name: impl Into<String>, parser: impl ArgumentParser<S>) -> Self {
        Self::argument(name, ParserDescriptor::of(parser), true, None)
    }

    pub fn optional_with(name: impl Into<String>, parser: ParserDescriptor<S>) -> Self {
        Self::argument(name, parser, true, None)
    }

    /// Optional argument bound to `default` when omitted.
    pub fn optional_with_default(
        name: impl Into<String>,
        parser: impl ArgumentParser<S>,
        default: DefaultValue<S>,
    ) -> Self {
        Self::argument(name, ParserDescriptor::of(parser), true, Some(default))
    }

    fn argument(
        name: impl Into<String>,
        parser: ParserDescriptor<S>,
        optional: bool,
        default: Option<DefaultValue<S>>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: ComponentKind::Argument(ArgumentComponent {
                parser,
                optional,
                default,
                suggestions: None,
            }),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Replace the parser's own suggestions. No effect on literals.
    pub fn with_suggestions(mut self, provider: impl SuggestionProvider<S>) -> Self {
        if let ComponentKind::Argument(argument) = &mut self.kind {
            argument.suggestions = Some(Arc::new(provider));
        }
        self
    }

    /// Like [`with_suggestions`](Self::with_suggestions), for a shared
    /// provider such as one looked up in a
    /// [`ParserRegistry`](crate::ParserRegistry).
    pub fn with_suggestions_arc(mut self, provider: Arc<dyn SuggestionProvider<S>>) -> Self {
        if let ComponentKind::Argument(argument) = &mut self.kind {
            argument.suggestions = Some(provider);
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &ComponentKind<S> {
        &self.kind
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn is_literal(&self) -> bool {
        matches!(self.kind, ComponentKind::Literal { .. })
    }

    pub fn as_argument(&self) -> Option<&ArgumentComponent<S>> {
        match &self.kind {
            ComponentKind::Argument(argument) => Some(argument),
            ComponentKind::Literal { .. } => None,
        }
    }

    pub fn aliases(&self) -> &[String] {
        match &self.kind {
            ComponentKind::Literal { aliases } => aliases,
            ComponentKind::Argument(_) => &[],
        }
    }

    pub fn is_optional(&self) -> bool {
        self.as_argument().is_some_and(|a| a.optional)
    }

    pub fn is_variable_arity(&self) -> bool {
        self.as_argument()
            .is_some_and(|a| a.parser.is_variable_arity())
    }

    /// Exact, case-sensitive match against the name or an alias.
    pub fn matches_literal(&self, token: &str) -> bool {
        self.is_literal() && (self.name == token || self.aliases().iter().any(|a| a == token))
    }

    /// Name and aliases of a literal. Empty for arguments.
    pub(crate) fn literal_names(&self) -> impl Iterator<Item = &str> {
        let names: Vec<&str> = if self.is_literal() {
            std::iter::once(self.name.as_str())
                .chain(self.aliases().iter().map(String::as_str))
                .collect()
        } else {
            Vec::new()
        };
        names.into_iter()
    }

    /// `name`, `<name>` or `[name]`.
    pub fn syntax(&self) -> String {
        match &self.kind {
            ComponentKind::Literal { .. } => self.name.clone(),
            ComponentKind::Argument(a) if a.optional => format!("[{}]", self.name),
            ComponentKind::Argument(_) => format!("<{}>", self.name),
        }
    }
}

impl<S> ArgumentComponent<S> {
    pub fn parser(&self) -> &ParserDescriptor<S> {
        &self.parser
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub fn default_value(&self) -> Option<&DefaultValue<S>> {
        self.default.as_ref()
    }

    pub(crate) fn suggestion_override(&self) -> Option<&Arc<dyn SuggestionProvider<S>>> {
        self.suggestions.as_ref()
    }
}

impl<S> Clone for CommandComponent<S> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            kind: match &self.kind {
                ComponentKind::Literal { aliases } => ComponentKind::Literal {
                    aliases: aliases.clone(),
                },
                ComponentKind::Argument(a) => ComponentKind::Argument(ArgumentComponent {
                    parser: a.parser.clone(),
                    optional: a.optional,
                    default: a.default.clone(),
                    suggestions: a.suggestions.clone(),
                }),
            },
            description: self.description.clone(),
        }
    }
}

impl<S> fmt::Debug for CommandComponent<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = f.debug_struct("CommandComponent");
        out.field("name", &self.name);
        match &self.kind {
            ComponentKind::Literal { aliases } => out.field("aliases", aliases),
            ComponentKind::Argument(a) => out
                .field("parser", &a.parser)
                .field("optional", &a.optional)
                .field("default", &a.default),
        };
        out.finish()
    }
}

// ============================================================================
// Default Values
// ============================================================================

/// Value bound to an optional argument that is absent from the input.
pub struct DefaultValue<S> {
    source: DefaultSource<S>,
}

type Supplier<S> = Arc<dyn Fn(&CommandContext<S>) -> ErasedValue + Send + Sync>;

enum DefaultSource<S> {
    Constant {
        value: ErasedValue,
        value_type: TypeId,
        type_name: &'static str,
    },
    Parsed(String),
    Dynamic {
        supplier: Supplier<S>,
        value_type: TypeId,
        type_name: &'static str,
    },
}

impl<S> DefaultValue<S> {
    /// A fixed value, shared by every invocation.
    pub fn constant<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            source: DefaultSource::Constant {
                value: Arc::new(value),
                value_type: TypeId::of::<T>(),
                type_name: type_name::<T>(),
            },
        }
    }

    /// Text fed through the argument's own parser, as if the caller typed it.
    pub fn parsed(text: impl Into<String>) -> Self {
        Self {
            source: DefaultSource::Parsed(text.into()),
        }
    }

    /// Computed from the context each time the argument is omitted.
    pub fn dynamic<T, F>(supplier: F) -> Self
    where
        S: 'static,
        T: Any + Send + Sync,
        F: Fn(&CommandContext<S>) -> T + Send + Sync + 'static,
    {
        Self {
            source: DefaultSource::Dynamic {
                supplier: Arc::new(move |ctx: &CommandContext<S>| {
                    Arc::new(supplier(ctx)) as ErasedValue
                }),
                value_type: TypeId::of::<T>(),
                type_name: type_name::<T>(),
            },
        }
    }

    /// Static type of the value, unknown for parsed defaults.
    pub(crate) fn value_type(&self) -> Option<(TypeId, &'static str)> {
        match &self.source {
            DefaultSource::Constant {
                value_type,
                type_name,
                ..
            }
            | DefaultSource::Dynamic {
                value_type,
                type_name,
                ..
            } => Some((*value_type, *type_name)),
            DefaultSource::Parsed(_) => None,
        }
    }

    pub(crate) async fn resolve(
        &self,
        parser: &ParserDescriptor<S>,
        context: &mut CommandContext<S>,
    ) -> ParseResult<ErasedValue> {
        match &self.source {
            DefaultSource::Constant { value, .. } => Ok(Arc::clone(value)),
            DefaultSource::Dynamic { supplier, .. } => Ok(supplier(&*context)),
            DefaultSource::Parsed(text) => {
                let mut input = CommandInput::new(text.as_str());
                let value = parser.parse(context, &mut input).await?;
                if !input.is_empty() {
                    return Err(ParseError::invalid(
                        text.as_str(),
                        format!("a single value, '{}' left over", input.remaining_input().trim()),
                    ));
                }
                Ok(value)
            }
        }
    }
}

impl<S> Clone for DefaultValue<S> {
    fn clone(&self) -> Self {
        let source = match &self.source {
            DefaultSource::Constant {
                value,
                value_type,
                type_name,
            } => DefaultSource::Constant {
                value: Arc::clone(value),
                value_type: *value_type,
                type_name: *type_name,
            },
            DefaultSource::Parsed(text) => DefaultSource::Parsed(text.clone()),
            DefaultSource::Dynamic {
                supplier,
                value_type,
                type_name,
            } => DefaultSource::Dynamic {
                supplier: Arc::clone(supplier),
                value_type: *value_type,
                type_name: *type_name,
            },
        };
        Self { source }
    }
}

impl<S> fmt::Debug for DefaultValue<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            DefaultSource::Constant { type_name, .. } => {
                f.debug_tuple("Constant").field(type_name).finish()
            }
            DefaultSource::Parsed(text) => f.debug_tuple("Parsed").field(text).finish(),
            DefaultSource::Dynamic { type_name, .. } => {
                f.debug_tuple("Dynamic").field(type_name).finish()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{IntegerParser, StringParser};

    #[test]
    fn test_syntax_rendering() {
        let literal = CommandComponent::<()>::literal("give");
        let required = CommandComponent::<()>::required("item", StringParser::single());
        let optional = CommandComponent::<()>::optional("amount", IntegerParser::new());
        assert_eq!(literal.syntax(), "give");
        assert_eq!(required.syntax(), "<item>");
        assert_eq!(optional.syntax(), "[amount]");
    }

    #[test]
    fn test_literal_matching_is_exact() {
        let literal = CommandComponent::<()>::literal_with_aliases("teleport", ["tp"]);
        assert!(literal.matches_literal("teleport"));
        assert!(literal.matches_literal("tp"));
        assert!(!literal.matches_literal("TP"));
        assert_eq!(literal.literal_names().collect::<Vec<_>>(), vec!["teleport", "tp"]);

        let argument = CommandComponent::<()>::required("tp", StringParser::single());
        assert!(!argument.matches_literal("tp"));
        assert_eq!(argument.literal_names().count(), 0);
    }

    #[tokio::test]
    async fn test_default_sources() {
        let parser = ParserDescriptor::of(IntegerParser::new());
        let mut ctx = CommandContext::new(Arc::new(()), "give stone");

        let constant = DefaultValue::<()>::constant(1i64);
        let value = constant.resolve(&parser, &mut ctx).await.unwrap();
        assert_eq!(value.downcast_ref::<i64>(), Some(&1));
        assert_eq!(constant.value_type().map(|(id, _)| id), Some(TypeId::of::<i64>()));

        let parsed = DefaultValue::<()>::parsed("64");
        let value = parsed.resolve(&parser, &mut ctx).await.unwrap();
        assert_eq!(value.downcast_ref::<i64>(), Some(&64));
        assert!(parsed.value_type().is_none());

        let dynamic = DefaultValue::<()>::dynamic(|ctx: &CommandContext<()>| {
            ctx.raw_input().len() as i64
        });
        let value = dynamic.resolve(&parser, &mut ctx).await.unwrap();
        assert_eq!(value.downcast_ref::<i64>(), Some(&10));
    }

    #[tokio::test]
    async fn test_bad_parsed_default_fails() {
        let parser = ParserDescriptor::of(IntegerParser::new());
        let mut ctx = CommandContext::new(Arc::new(()), "");
        let parsed = DefaultValue::<()>::parsed("many");
        assert!(parsed.resolve(&parser, &mut ctx).await.is_err());
    }

    #[tokio::test]
    async fn test_parsed_default_rejects_leftover_text() {
        let parser = ParserDescriptor::of(IntegerParser::new());
        let mut ctx = CommandContext::new(Arc::new(()), "");

        let err = DefaultValue::<()>::parsed("5 extra")
            .resolve(&parser, &mut ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, ParseError::InvalidValue { ref input, .. } if input == "5 extra"));

        let padded = DefaultValue::<()>::parsed("5 ");
        let value = padded.resolve(&parser, &mut ctx).await.unwrap();
        assert_eq!(value.downcast_ref::<i64>(), Some(&5));
    }
}
