use super::{ArgumentParser, ParseFuture, ParserOutput};
use crate::context::CommandContext;
use crate::deferred::Deferred;
use crate::error::ParseError;
use crate::input::CommandInput;
use crate::suggestion::{Suggestion, SuggestionFuture};

/// A closed set of named values, usually a fieldless enum.
///
/// Derive it with `#[derive(Choice)]`. Variant names are lowercased unless
/// overridden with `#[choice(name = "...")]`:
///
/// ```
/// use arbor::Choice;
///
/// #[derive(Debug, Clone, PartialEq, Choice)]
/// enum Mode {
///     Survival,
///     #[choice(name = "spectate")]
///     Spectator,
/// }
///
/// let names: Vec<&str> = Mode::choices().into_iter().map(|(name, _)| name).collect();
/// assert_eq!(names, vec!["survival", "spectate"]);
/// ```
pub trait Choice: Clone + Send + Sync + 'static {
    fn choices() -> Vec<(&'static str, Self)>;
}

/// Parses one token into a [`Choice`] value, ignoring ASCII case.
pub struct ChoiceParser<E> {
    choices: Vec<(&'static str, E)>,
}

impl<E: Choice> ChoiceParser<E> {
    pub fn new() -> Self {
        Self {
            choices: E::choices(),
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.choices.iter().map(|(name, _)| *name)
    }

    fn lookup(&self, token: &str) -> Option<&E> {
        self.choices
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(token))
            .map(|(_, value)| value)
    }
}

impl<E: Choice> Default for ChoiceParser<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Clone> Clone for ChoiceParser<E> {
    fn clone(&self) -> Self {
        Self {
            choices: self.choices.clone(),
        }
    }
}

impl<E: Choice> ParserOutput for ChoiceParser<E> {
    type Value = E;
}

impl<S, E: Choice> ArgumentParser<S> for ChoiceParser<E> {
    fn parse<'a>(
        &'a self,
        _context: &'a mut CommandContext<S>,
        input: &'a mut CommandInput,
    ) -> ParseFuture<'a, E> {
        if input.is_empty() {
            return Err(ParseError::NoInputProvided).into();
        }
        let token = input.peek_string();
        match self.lookup(token) {
            Some(value) => {
                let value = value.clone();
                input.read_string();
                Ok(value).into()
            }
            None => Err(ParseError::UnknownChoice {
                input: token.to_string(),
                choices: self.names().map(str::to_string).collect(),
            })
            .into(),
        }
    }

    fn suggestions<'a>(
        &'a self,
        _context: &'a CommandContext<S>,
        _input: &'a CommandInput,
    ) -> SuggestionFuture<'a> {
        Deferred::Ready(
            self.names()
                .map(|name| Suggestion::simple(name).case_insensitive())
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq)]
    enum Color {
        Red,
        Green,
    }

    impl Choice for Color {
        fn choices() -> Vec<(&'static str, Self)> {
            vec![("red", Color::Red), ("green", Color::Green)]
        }
    }

    #[tokio::test]
    async fn test_case_insensitive_match() {
        let parser = ChoiceParser::<Color>::new();
        let mut ctx = CommandContext::new(Arc::new(()), "GREEN");
        let mut input = CommandInput::new("GREEN");
        assert_eq!(parser.parse(&mut ctx, &mut input).await.unwrap(), Color::Green);
        assert!(input.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_choice_lists_names() {
        let parser = ChoiceParser::<Color>::new();
        let mut ctx = CommandContext::new(Arc::new(()), "blue");
        let mut input = CommandInput::new("blue");
        match parser.parse(&mut ctx, &mut input).await {
            Err(ParseError::UnknownChoice { input, choices }) => {
                assert_eq!(input, "blue");
                assert_eq!(choices, vec!["red", "green"]);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
