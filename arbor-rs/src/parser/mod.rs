//! Argument parsers and parser composition.
//!
//! An [`ArgumentParser`] consumes a prefix of the remaining [`CommandInput`]
//! and produces a typed value, or fails without consuming anything. Parsers
//! compose through [`ParserExt`]:
//!
//! - [`map`](ParserExt::map) transforms a successful value synchronously.
//! - [`flat_map_async`](ParserExt::flat_map_async) continues a successful
//!   parse with an asynchronous lookup that may itself fail.
//!
//! The tree stores parsers type-erased behind a [`ParserDescriptor`], so
//! siblings with different value types live side by side.

mod boolean;
mod choice;
mod grammar;
mod number;
mod pair;
mod registry;
mod string;

pub use boolean::BooleanParser;
pub use choice::{Choice, ChoiceParser};
pub use grammar::{GrammarError, GrammarParser, GrammarProvider};
pub use number::{DoubleParser, IntegerParser, NumberParser, Numeric};
pub use pair::PairParser;
pub use registry::ParserRegistry;
pub use string::{StringMode, StringParser};

use crate::context::{CommandContext, ErasedValue};
use crate::deferred::Deferred;
use crate::error::ParseResult;
use crate::input::CommandInput;
use crate::suggestion::SuggestionFuture;
use std::any::{type_name, TypeId};
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

/// Result of one parser invocation, possibly still pending.
pub type ParseFuture<'a, T> = Deferred<'a, ParseResult<T>>;

// ============================================================================
// Parser Traits
// ============================================================================

/// Value type produced by a parser.
///
/// Split from [`ArgumentParser`] so the value type does not depend on the
/// sender type.
pub trait ParserOutput {
    type Value: Send + Sync + 'static;
}

/// Consumes part of the input and produces a typed value.
///
/// Implementations must return a failure rather than loop on malformed input,
/// and must leave the input cursor where they found it when they fail.
///
/// # Example
///
/// ```
/// use arbor::{ArgumentParser, CommandContext, CommandInput, ParseError, ParseFuture, ParserOutput};
///
/// struct Even;
///
/// impl ParserOutput for Even {
///     type Value = u32;
/// }
///
/// impl<S> ArgumentParser<S> for Even {
///     fn parse<'a>(
///         &'a self,
///         _context: &'a mut CommandContext<S>,
///         input: &'a mut CommandInput,
///     ) -> ParseFuture<'a, u32> {
///         let token = input.peek_string();
///         let result = match token.parse::<u32>() {
///             Ok(n) if n % 2 == 0 => Ok(n),
///             _ => Err(ParseError::invalid(token, "even number")),
///         };
///         if result.is_ok() {
///             input.read_string();
///         }
///         result.into()
///     }
/// }
/// ```
pub trait ArgumentParser<S>: ParserOutput + Send + Sync + 'static {
    fn parse<'a>(
        &'a self,
        context: &'a mut CommandContext<S>,
        input: &'a mut CommandInput,
    ) -> ParseFuture<'a, Self::Value>;

    /// Candidates for the token at the start of `input`.
    fn suggestions<'a>(
        &'a self,
        _context: &'a CommandContext<S>,
        _input: &'a CommandInput,
    ) -> SuggestionFuture<'a> {
        Deferred::Ready(Vec::new())
    }

    /// Whether this parser consumes all remaining input.
    fn is_variable_arity(&self) -> bool {
        false
    }
}

/// Composition operators, available on every parser.
pub trait ParserExt: ParserOutput + Sized {
    /// Transform the parsed value. Failures pass through unchanged.
    fn map<U, F>(self, mapper: F) -> MappedParser<Self, F>
    where
        F: Fn(Self::Value) -> U + Send + Sync + 'static,
        U: Send + Sync + 'static,
    {
        MappedParser {
            inner: self,
            mapper,
        }
    }

    /// Continue a successful parse with an asynchronous step.
    ///
    /// `continuation` is not invoked when the inner parser fails. The returned
    /// future must be `'static`; clone what it needs from the context.
    fn flat_map_async<S, U, F, Fut>(self, continuation: F) -> FlatMappedParser<Self, F, Fut>
    where
        F: Fn(&CommandContext<S>, Self::Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ParseResult<U>> + Send + 'static,
        U: Send + Sync + 'static,
    {
        FlatMappedParser {
            inner: self,
            continuation,
            _future: PhantomData,
        }
    }
}

impl<P: ParserOutput> ParserExt for P {}

// ============================================================================
// Combinators
// ============================================================================

/// Parser returned by [`ParserExt::map`].
#[derive(Clone)]
pub struct MappedParser<P, F> {
    inner: P,
    mapper: F,
}

impl<P, F, U> ParserOutput for MappedParser<P, F>
where
    P: ParserOutput,
    F: Fn(P::Value) -> U,
    U: Send + Sync + 'static,
{
    type Value = U;
}

impl<S, P, F, U> ArgumentParser<S> for MappedParser<P, F>
where
    P: ArgumentParser<S>,
    F: Fn(P::Value) -> U + Send + Sync + 'static,
    U: Send + Sync + 'static,
{
    fn parse<'a>(
        &'a self,
        context: &'a mut CommandContext<S>,
        input: &'a mut CommandInput,
    ) -> ParseFuture<'a, U> {
        self.inner
            .parse(context, input)
            .map(move |result| result.map(&self.mapper))
    }

    fn suggestions<'a>(
        &'a self,
        context: &'a CommandContext<S>,
        input: &'a CommandInput,
    ) -> SuggestionFuture<'a> {
        self.inner.suggestions(context, input)
    }

    fn is_variable_arity(&self) -> bool {
        self.inner.is_variable_arity()
    }
}

/// Parser returned by [`ParserExt::flat_map_async`].
pub struct FlatMappedParser<P, F, Fut> {
    inner: P,
    continuation: F,
    _future: PhantomData<fn() -> Fut>,
}

impl<P, F, Fut, U> ParserOutput for FlatMappedParser<P, F, Fut>
where
    Fut: Future<Output = ParseResult<U>>,
    U: Send + Sync + 'static,
{
    type Value = U;
}

impl<S, P, F, Fut, U> ArgumentParser<S> for FlatMappedParser<P, F, Fut>
where
    S: Send + Sync + 'static,
    P: ArgumentParser<S>,
    F: Fn(&CommandContext<S>, P::Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ParseResult<U>> + Send + 'static,
    U: Send + Sync + 'static,
{
    fn parse<'a>(
        &'a self,
        context: &'a mut CommandContext<S>,
        input: &'a mut CommandInput,
    ) -> ParseFuture<'a, U> {
        let start = input.cursor();
        Deferred::pending(async move {
            let value = self.inner.parse(context, input).await?;
            let result = (self.continuation)(&*context, value).await;
            if result.is_err() {
                input.restore(start);
            }
            result
        })
    }

    fn suggestions<'a>(
        &'a self,
        context: &'a CommandContext<S>,
        input: &'a CommandInput,
    ) -> SuggestionFuture<'a> {
        self.inner.suggestions(context, input)
    }

    fn is_variable_arity(&self) -> bool {
        self.inner.is_variable_arity()
    }
}

// ============================================================================
// Type Erasure
// ============================================================================

/// Object-safe view of an [`ArgumentParser`] with its value boxed.
trait ErasedParser<S>: Send + Sync {
    fn parse_erased<'a>(
        &'a self,
        context: &'a mut CommandContext<S>,
        input: &'a mut CommandInput,
    ) -> ParseFuture<'a, ErasedValue>;

    fn suggestions_erased<'a>(
        &'a self,
        context: &'a CommandContext<S>,
        input: &'a CommandInput,
    ) -> SuggestionFuture<'a>;

    fn value_type(&self) -> TypeId;

    fn value_type_name(&self) -> &'static str;

    fn variable_arity(&self) -> bool;
}

impl<S, P: ArgumentParser<S>> ErasedParser<S> for P {
    fn parse_erased<'a>(
        &'a self,
        context: &'a mut CommandContext<S>,
        input: &'a mut CommandInput,
    ) -> ParseFuture<'a, ErasedValue> {
        self.parse(context, input)
            .map(|result| result.map(|value| Arc::new(value) as ErasedValue))
    }

    fn suggestions_erased<'a>(
        &'a self,
        context: &'a CommandContext<S>,
        input: &'a CommandInput,
    ) -> SuggestionFuture<'a> {
        self.suggestions(context, input)
    }

    fn value_type(&self) -> TypeId {
        TypeId::of::<P::Value>()
    }

    fn value_type_name(&self) -> &'static str {
        type_name::<P::Value>()
    }

    fn variable_arity(&self) -> bool {
        self.is_variable_arity()
    }
}

/// Type-erased, shareable handle to a parser.
pub struct ParserDescriptor<S> {
    inner: Arc<dyn ErasedParser<S>>,
}

impl<S> ParserDescriptor<S> {
    pub fn of<P: ArgumentParser<S>>(parser: P) -> Self {
        Self {
            inner: Arc::new(parser),
        }
    }

    /// `TypeId` of the value the parser produces.
    pub fn value_type(&self) -> TypeId {
        self.inner.value_type()
    }

    pub fn value_type_name(&self) -> &'static str {
        self.inner.value_type_name()
    }

    pub fn is_variable_arity(&self) -> bool {
        self.inner.variable_arity()
    }

    /// Parse and roll the cursor back on failure, whatever the parser did.
    pub(crate) async fn parse(
        &self,
        context: &mut CommandContext<S>,
        input: &mut CommandInput,
    ) -> ParseResult<ErasedValue> {
        let start = input.cursor();
        let result = self.inner.parse_erased(context, input).await;
        if result.is_err() {
            input.restore(start);
        }
        result
    }

    pub(crate) fn suggestions<'a>(
        &'a self,
        context: &'a CommandContext<S>,
        input: &'a CommandInput,
    ) -> SuggestionFuture<'a> {
        self.inner.suggestions_erased(context, input)
    }
}

impl<S> Clone for ParserDescriptor<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S> fmt::Debug for ParserDescriptor<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParserDescriptor")
            .field("value", &self.value_type_name())
            .field("variable_arity", &self.is_variable_arity())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParseError;

    fn context() -> CommandContext<()> {
        CommandContext::new(Arc::new(()), "")
    }

    #[tokio::test]
    async fn test_map_transforms_success() {
        let parser = IntegerParser::new().map(|n| n * 10);
        let mut ctx = context();
        let mut input = CommandInput::new("4 rest");
        let value = parser.parse(&mut ctx, &mut input).await.unwrap();
        assert_eq!(value, 40);
        assert_eq!(input.remaining_input(), " rest");
    }

    #[tokio::test]
    async fn test_map_passes_failure_through() {
        let parser = IntegerParser::new().map(|n| n * 10);
        let mut ctx = context();
        let mut input = CommandInput::new("four");
        let err = parser.parse(&mut ctx, &mut input).await.unwrap_err();
        assert!(matches!(err, ParseError::InvalidValue { .. }));
        assert_eq!(input.cursor(), 0);
    }

    #[tokio::test]
    async fn test_flat_map_async_suspends_and_rolls_back() {
        let parser = StringParser::single().flat_map_async(
            |_ctx: &CommandContext<()>, name: String| async move {
                tokio::task::yield_now().await;
                if name == "known" {
                    Ok(name.len())
                } else {
                    Err(ParseError::custom(format!("unknown entry {name}")))
                }
            },
        );

        let mut ctx = context();
        let mut input = CommandInput::new("known");
        let deferred = parser.parse(&mut ctx, &mut input);
        assert!(!deferred.is_ready());
        assert_eq!(deferred.await.unwrap(), 5);

        let mut input = CommandInput::new("missing tail");
        assert!(parser.parse(&mut ctx, &mut input).await.is_err());
        assert_eq!(input.cursor(), 0);
    }

    #[tokio::test]
    async fn test_flat_map_async_skips_continuation_on_failure() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let parser = IntegerParser::new().flat_map_async(
            move |_ctx: &CommandContext<()>, n: i64| {
                counter.fetch_add(1, Ordering::SeqCst);
                async move { Ok(n) }
            },
        );

        let mut ctx = context();
        let mut input = CommandInput::new("nope");
        assert!(parser.parse(&mut ctx, &mut input).await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_descriptor_erases_value_type() {
        let descriptor: ParserDescriptor<()> = ParserDescriptor::of(IntegerParser::new());
        assert_eq!(descriptor.value_type(), TypeId::of::<i64>());
        assert!(!descriptor.is_variable_arity());

        let mut ctx = context();
        let mut input = CommandInput::new("12");
        let value = descriptor.parse(&mut ctx, &mut input).await.unwrap();
        assert_eq!(value.downcast_ref::<i64>(), Some(&12));
    }

    #[test]
    fn test_variable_arity_survives_map() {
        let descriptor: ParserDescriptor<()> =
            ParserDescriptor::of(StringParser::greedy().map(|s| s.to_uppercase()));
        assert!(descriptor.is_variable_arity());
        assert_eq!(descriptor.value_type(), TypeId::of::<String>());
    }
}
