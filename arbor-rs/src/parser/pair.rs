use super::{ArgumentParser, ParseFuture, ParserOutput};
use crate::context::CommandContext;
use crate::deferred::Deferred;
use crate::input::CommandInput;
use crate::suggestion::SuggestionFuture;

/// Two parsers applied in sequence, producing a tuple.
///
/// Compose with [`map`](super::ParserExt::map) to build a domain value from
/// both halves, e.g. a coordinate from two numbers. If the second half fails
/// the first half's input is given back as well.
#[derive(Debug, Clone)]
pub struct PairParser<A, B> {
    first: A,
    second: B,
}

impl<A, B> PairParser<A, B> {
    pub fn new(first: A, second: B) -> Self {
        Self { first, second }
    }
}

impl<A: ParserOutput, B: ParserOutput> ParserOutput for PairParser<A, B> {
    type Value = (A::Value, B::Value);
}

impl<S, A, B> ArgumentParser<S> for PairParser<A, B>
where
    S: Send + Sync + 'static,
    A: ArgumentParser<S>,
    B: ArgumentParser<S>,
{
    fn parse<'a>(
        &'a self,
        context: &'a mut CommandContext<S>,
        input: &'a mut CommandInput,
    ) -> ParseFuture<'a, (A::Value, B::Value)> {
        Deferred::pending(async move {
            let start = input.cursor();
            let first = match self.first.parse(context, input).await {
                Ok(value) => value,
                Err(err) => {
                    input.restore(start);
                    return Err(err);
                }
            };
            match self.second.parse(context, input).await {
                Ok(second) => Ok((first, second)),
                Err(err) => {
                    input.restore(start);
                    Err(err)
                }
            }
        })
    }

    /// Suggests for whichever half the input has reached.
    fn suggestions<'a>(
        &'a self,
        context: &'a CommandContext<S>,
        input: &'a CommandInput,
    ) -> SuggestionFuture<'a> {
        if input.is_last_token() {
            self.first.suggestions(context, input)
        } else {
            let mut rest = input.clone();
            rest.read_string();
            rest.skip_whitespace();
            Deferred::pending(async move { self.second.suggestions(context, &rest).await })
        }
    }

    fn is_variable_arity(&self) -> bool {
        self.second.is_variable_arity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParseError;
    use crate::parser::{BooleanParser, IntegerParser, ParserExt, StringParser};
    use std::sync::Arc;

    #[derive(Debug, PartialEq)]
    struct Point {
        x: i64,
        y: i64,
    }

    fn point() -> impl ArgumentParser<(), Value = Point> {
        PairParser::new(IntegerParser::new(), IntegerParser::new()).map(|(x, y)| Point { x, y })
    }

    #[tokio::test]
    async fn test_pair_maps_to_domain_value() {
        let mut ctx = CommandContext::new(Arc::new(()), "3 -4");
        let mut input = CommandInput::new("3 -4");
        let value = point().parse(&mut ctx, &mut input).await.unwrap();
        assert_eq!(value, Point { x: 3, y: -4 });
    }

    #[tokio::test]
    async fn test_second_failure_rolls_back_first() {
        let mut ctx = CommandContext::new(Arc::new(()), "3 up");
        let mut input = CommandInput::new("3 up");
        let err = point().parse(&mut ctx, &mut input).await.unwrap_err();
        assert!(matches!(err, ParseError::InvalidValue { .. }));
        assert_eq!(input.cursor(), 0);
    }

    #[tokio::test]
    async fn test_suggests_second_half_after_first_token() {
        let parser = PairParser::new(StringParser::single(), BooleanParser::strict());
        let ctx = CommandContext::new(Arc::new(()), "");
        let input = CommandInput::new("name t");
        let out = parser.suggestions(&ctx, &input).await;
        assert!(out.iter().any(|s| s.text == "true"));
    }
}
