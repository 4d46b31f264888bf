use super::{ArgumentParser, ParseFuture, ParserOutput};
use crate::context::CommandContext;
use crate::deferred::Deferred;
use crate::error::ParseError;
use crate::input::CommandInput;
use crate::suggestion::{Suggestion, SuggestionFuture};

const STRICT_TRUE: &[&str] = &["true"];
const STRICT_FALSE: &[&str] = &["false"];
const LIBERAL_TRUE: &[&str] = &["true", "yes", "on"];
const LIBERAL_FALSE: &[&str] = &["false", "no", "off"];

/// Parses `true`/`false`, or also `yes/no/on/off` when liberal.
/// Matching ignores ASCII case.
#[derive(Debug, Clone, Copy, Default)]
pub struct BooleanParser {
    liberal: bool,
}

impl BooleanParser {
    pub fn strict() -> Self {
        Self { liberal: false }
    }

    pub fn liberal() -> Self {
        Self { liberal: true }
    }

    fn words(&self) -> (&'static [&'static str], &'static [&'static str]) {
        if self.liberal {
            (LIBERAL_TRUE, LIBERAL_FALSE)
        } else {
            (STRICT_TRUE, STRICT_FALSE)
        }
    }
}

impl ParserOutput for BooleanParser {
    type Value = bool;
}

impl<S> ArgumentParser<S> for BooleanParser {
    fn parse<'a>(
        &'a self,
        _context: &'a mut CommandContext<S>,
        input: &'a mut CommandInput,
    ) -> ParseFuture<'a, bool> {
        if input.is_empty() {
            return Err(ParseError::NoInputProvided).into();
        }
        let token = input.peek_string();
        let (truthy, falsy) = self.words();
        let matches = |words: &[&str]| words.iter().any(|w| w.eq_ignore_ascii_case(token));
        let result = if matches(truthy) {
            Ok(true)
        } else if matches(falsy) {
            Ok(false)
        } else {
            Err(ParseError::invalid(token, "boolean"))
        };
        if result.is_ok() {
            input.read_string();
        }
        result.into()
    }

    fn suggestions<'a>(
        &'a self,
        _context: &'a CommandContext<S>,
        _input: &'a CommandInput,
    ) -> SuggestionFuture<'a> {
        let (truthy, falsy) = self.words();
        Deferred::Ready(
            truthy
                .iter()
                .chain(falsy)
                .map(|w| Suggestion::simple(*w).case_insensitive())
                .collect(),
        )
    }
}
