use super::{ArgumentParser, ParseFuture, ParserOutput};
use crate::context::CommandContext;
use crate::deferred::Deferred;
use crate::error::ParseError;
use crate::input::CommandInput;
use crate::suggestion::{Suggestion, SuggestionFuture};
use std::fmt;
use std::str::FromStr;

/// Primitive number types usable with [`NumberParser`].
pub trait Numeric:
    Copy + PartialOrd + fmt::Display + fmt::Debug + FromStr + Send + Sync + 'static
{
    /// Name used in error messages.
    const NAME: &'static str;
    const MIN: Self;
    const MAX: Self;
    /// Integers get digit-continuation suggestions, floats get none.
    const INTEGRAL: bool;
}

macro_rules! impl_numeric {
    ($($ty:ty => $name:literal, $integral:literal;)*) => {
        $(
            impl Numeric for $ty {
                const NAME: &'static str = $name;
                const MIN: Self = <$ty>::MIN;
                const MAX: Self = <$ty>::MAX;
                const INTEGRAL: bool = $integral;
            }
        )*
    };
}

impl_numeric! {
    i8 => "byte", true;
    i16 => "short", true;
    i32 => "integer", true;
    i64 => "integer", true;
    i128 => "integer", true;
    isize => "integer", true;
    u8 => "unsigned byte", true;
    u16 => "unsigned integer", true;
    u32 => "unsigned integer", true;
    u64 => "unsigned integer", true;
    u128 => "unsigned integer", true;
    usize => "unsigned integer", true;
    f32 => "number", false;
    f64 => "number", false;
}

/// Parses one token as a number within an inclusive range.
#[derive(Debug, Clone, Copy)]
pub struct NumberParser<T> {
    min: T,
    max: T,
}

pub type IntegerParser = NumberParser<i64>;
pub type DoubleParser = NumberParser<f64>;

impl<T: Numeric> NumberParser<T> {
    /// Accepts the full range of `T`.
    pub fn new() -> Self {
        Self {
            min: T::MIN,
            max: T::MAX,
        }
    }

    pub fn range(min: T, max: T) -> Self {
        Self { min, max }
    }

    pub fn with_min(mut self, min: T) -> Self {
        self.min = min;
        self
    }

    pub fn with_max(mut self, max: T) -> Self {
        self.max = max;
        self
    }

    pub fn min(&self) -> T {
        self.min
    }

    pub fn max(&self) -> T {
        self.max
    }

    fn in_range(&self, value: T) -> bool {
        // Written this way so NaN falls out of range.
        value >= self.min && value <= self.max
    }

    fn check(&self, token: &str) -> Result<T, ParseError> {
        let value = token
            .parse::<T>()
            .map_err(|_| ParseError::invalid(token, T::NAME))?;
        if self.in_range(value) {
            Ok(value)
        } else {
            Err(ParseError::OutOfRange {
                input: token.to_string(),
                min: self.min.to_string(),
                max: self.max.to_string(),
            })
        }
    }

    fn digit_suggestions(&self, partial: &str) -> Vec<Suggestion> {
        let mut out = Vec::new();
        if !partial.is_empty() && self.check(partial).is_ok() {
            out.push(Suggestion::simple(partial));
        }
        for digit in 0..=9u8 {
            if digit == 0 && partial == "-" {
                continue;
            }
            let candidate = format!("{partial}{digit}");
            if self.check(&candidate).is_ok() {
                out.push(Suggestion::simple(candidate));
            }
        }
        out
    }
}

impl<T: Numeric> Default for NumberParser<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Numeric> ParserOutput for NumberParser<T> {
    type Value = T;
}

impl<S, T: Numeric> ArgumentParser<S> for NumberParser<T> {
    fn parse<'a>(
        &'a self,
        _context: &'a mut CommandContext<S>,
        input: &'a mut CommandInput,
    ) -> ParseFuture<'a, T> {
        if input.is_empty() {
            return Err(ParseError::NoInputProvided).into();
        }
        let result = self.check(input.peek_string());
        if result.is_ok() {
            input.read_string();
        }
        result.into()
    }

    fn suggestions<'a>(
        &'a self,
        _context: &'a CommandContext<S>,
        input: &'a CommandInput,
    ) -> SuggestionFuture<'a> {
        if !T::INTEGRAL {
            return Deferred::Ready(Vec::new());
        }
        Deferred::Ready(self.digit_suggestions(input.peek_string()))
    }
}
