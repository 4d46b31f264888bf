use super::{ArgumentParser, ParseFuture, ParserOutput};
use crate::context::CommandContext;
use crate::error::ParseError;
use crate::input::CommandInput;

/// How much input a [`StringParser`] takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StringMode {
    /// One whitespace-delimited token.
    #[default]
    Single,
    /// One token, or a span wrapped in `"` or `'` with backslash escapes.
    Quoted,
    /// Everything that is left. Must be the last argument.
    Greedy,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StringParser {
    mode: StringMode,
}

impl StringParser {
    pub fn new(mode: StringMode) -> Self {
        Self { mode }
    }

    pub fn single() -> Self {
        Self::new(StringMode::Single)
    }

    pub fn quoted() -> Self {
        Self::new(StringMode::Quoted)
    }

    pub fn greedy() -> Self {
        Self::new(StringMode::Greedy)
    }

    pub fn mode(&self) -> StringMode {
        self.mode
    }
}

impl ParserOutput for StringParser {
    type Value = String;
}

impl<S> ArgumentParser<S> for StringParser {
    fn parse<'a>(
        &'a self,
        _context: &'a mut CommandContext<S>,
        input: &'a mut CommandInput,
    ) -> ParseFuture<'a, String> {
        if input.is_empty() {
            return Err(ParseError::NoInputProvided).into();
        }
        let result = match self.mode {
            StringMode::Single => Ok(input.read_string()),
            StringMode::Greedy => Ok(input.read_remaining()),
            StringMode::Quoted => read_quoted(input),
        };
        result.into()
    }

    fn is_variable_arity(&self) -> bool {
        self.mode == StringMode::Greedy
    }
}

fn read_quoted(input: &mut CommandInput) -> Result<String, ParseError> {
    let origin = input.cursor();
    input.skip_whitespace();
    let quote = match input.peek() {
        Some(ch @ ('"' | '\'')) => ch,
        _ => return Ok(input.read_string()),
    };

    let start = input.cursor();
    input.read();
    let mut value = String::new();
    let mut escaped = false;
    while let Some(ch) = input.read() {
        match ch {
            _ if escaped => {
                value.push(ch);
                escaped = false;
            }
            '\\' => escaped = true,
            _ if ch == quote => return Ok(value),
            _ => value.push(ch),
        }
    }

    let unterminated = input.input()[start..].to_string();
    input.restore(origin);
    Err(ParseError::UnterminatedQuote {
        input: unterminated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    async fn parse(parser: StringParser, raw: &str) -> (Result<String, ParseError>, CommandInput) {
        let mut ctx = CommandContext::new(Arc::new(()), raw);
        let mut input = CommandInput::new(raw);
        let result = parser.parse(&mut ctx, &mut input).await;
        (result, input)
    }

    #[tokio::test]
    async fn test_single_reads_one_token() {
        let (result, input) = parse(StringParser::single(), "stone 5").await;
        assert_eq!(result.unwrap(), "stone");
        assert_eq!(input.remaining_input(), " 5");
    }

    #[tokio::test]
    async fn test_greedy_reads_everything() {
        let (result, input) = parse(StringParser::greedy(), "hello big  world").await;
        assert_eq!(result.unwrap(), "hello big  world");
        assert!(input.is_empty());
    }

    #[tokio::test]
    async fn test_quoted_handles_quotes_and_escapes() {
        let (result, input) = parse(StringParser::quoted(), r#""hello \"big\" world" tail"#).await;
        assert_eq!(result.unwrap(), r#"hello "big" world"#);
        assert_eq!(input.remaining_input(), " tail");

        let (result, _) = parse(StringParser::quoted(), "'single quoted' x").await;
        assert_eq!(result.unwrap(), "single quoted");

        let (result, _) = parse(StringParser::quoted(), "plain x").await;
        assert_eq!(result.unwrap(), "plain");
    }

    #[tokio::test]
    async fn test_unterminated_quote_consumes_nothing() {
        let (result, input) = parse(StringParser::quoted(), "\"never closed").await;
        assert!(matches!(result, Err(ParseError::UnterminatedQuote { .. })));
        assert_eq!(input.cursor(), 0);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let (result, _) = parse(StringParser::single(), "   ").await;
        assert!(matches!(result, Err(ParseError::NoInputProvided)));
    }

    #[test]
    fn test_only_greedy_is_variable_arity() {
        assert!(ArgumentParser::<()>::is_variable_arity(&StringParser::greedy()));
        assert!(!ArgumentParser::<()>::is_variable_arity(&StringParser::quoted()));
    }
}
