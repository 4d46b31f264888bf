//! Wrapper for externally defined grammars.
//!
//! A [`GrammarProvider`] is an opaque parser owned by some other system (a
//! host platform's own argument grammar, for example). [`GrammarParser`]
//! forwards the remaining input to it and adapts its result to the tree's
//! parser contract. Converting the provider's output into a domain type is
//! left to a [`map`](super::ParserExt::map) or
//! [`flat_map_async`](super::ParserExt::flat_map_async) composed afterwards.

use super::{ArgumentParser, ParseFuture, ParserOutput};
use crate::context::CommandContext;
use crate::deferred::Deferred;
use crate::error::ParseError;
use crate::input::CommandInput;
use crate::suggestion::{Suggestion, SuggestionFuture};

/// Failure reported by a [`GrammarProvider`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct GrammarError {
    pub message: String,
    /// Byte offset into the text handed to the provider.
    pub position: usize,
}

impl GrammarError {
    pub fn new(message: impl Into<String>, position: usize) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }
}

pub trait GrammarProvider: Send + Sync + 'static {
    type Output: Send + Sync + 'static;

    /// Parse a prefix of `input`, returning the value and the number of
    /// bytes consumed.
    fn parse(&self, input: &str) -> Result<(Self::Output, usize), GrammarError>;

    fn suggestions(&self, _input: &str) -> Vec<String> {
        Vec::new()
    }
}

pub struct GrammarParser<G> {
    grammar: G,
}

impl<G: GrammarProvider> GrammarParser<G> {
    pub fn new(grammar: G) -> Self {
        Self { grammar }
    }

    pub fn grammar(&self) -> &G {
        &self.grammar
    }
}

impl<G: GrammarProvider> ParserOutput for GrammarParser<G> {
    type Value = G::Output;
}

impl<S, G: GrammarProvider> ArgumentParser<S> for GrammarParser<G> {
    fn parse<'a>(
        &'a self,
        _context: &'a mut CommandContext<S>,
        input: &'a mut CommandInput,
    ) -> ParseFuture<'a, G::Output> {
        if input.is_empty() {
            return Err(ParseError::NoInputProvided).into();
        }
        let origin = input.cursor();
        input.skip_whitespace();
        let offset = input.cursor();
        match self.grammar.parse(input.remaining_input()) {
            Ok((value, consumed)) => {
                input.advance(consumed);
                Ok(value).into()
            }
            Err(err) => {
                input.restore(origin);
                Err(ParseError::Grammar {
                    message: err.message,
                    position: offset + err.position,
                })
                .into()
            }
        }
    }

    fn suggestions<'a>(
        &'a self,
        _context: &'a CommandContext<S>,
        input: &'a CommandInput,
    ) -> SuggestionFuture<'a> {
        let partial = input.remaining_input().trim_start();
        Deferred::Ready(
            self.grammar
                .suggestions(partial)
                .into_iter()
                .map(Suggestion::simple)
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ParserExt;
    use std::sync::Arc;

    /// Accepts `key=value` with lowercase ascii keys.
    struct KeyValue;

    impl GrammarProvider for KeyValue {
        type Output = (String, String);

        fn parse(&self, input: &str) -> Result<(Self::Output, usize), GrammarError> {
            let token = input.split_whitespace().next().unwrap_or("");
            let (key, value) = token
                .split_once('=')
                .ok_or_else(|| GrammarError::new("expected '='", token.len()))?;
            if let Some(bad) = key.find(|c: char| !c.is_ascii_lowercase()) {
                return Err(GrammarError::new("invalid key character", bad));
            }
            Ok(((key.to_string(), value.to_string()), token.len()))
        }

        fn suggestions(&self, _input: &str) -> Vec<String> {
            vec!["mode=".to_string(), "level=".to_string()]
        }
    }

    #[tokio::test]
    async fn test_success_consumes_what_provider_consumed() {
        let parser = GrammarParser::new(KeyValue).map(|(k, v)| format!("{k}:{v}"));
        let mut ctx = CommandContext::new(Arc::new(()), "");
        let mut input = CommandInput::new("mode=fast rest");
        assert_eq!(parser.parse(&mut ctx, &mut input).await.unwrap(), "mode:fast");
        assert_eq!(input.remaining_input(), " rest");
    }

    #[tokio::test]
    async fn test_failure_reports_absolute_position() {
        let parser = GrammarParser::new(KeyValue);
        let mut ctx = CommandContext::new(Arc::new(()), "");
        let mut input = CommandInput::new("set  moDe=fast");
        input.read_string();
        let err = parser.parse(&mut ctx, &mut input).await.unwrap_err();
        match err {
            ParseError::Grammar { message, position } => {
                assert_eq!(message, "invalid key character");
                assert_eq!(position, 7);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(input.cursor(), 3);
    }
}
