//! Cursor-addressable view over raw command input.

/// Raw command input with a forward-only cursor.
///
/// Parsers either read whitespace-delimited tokens (`read_string`) or take the
/// raw suffix (`read_remaining`). The cursor is a byte offset that always sits
/// on a char boundary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandInput {
    input: String,
    cursor: usize,
}

impl CommandInput {
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            cursor: 0,
        }
    }

    /// Full raw input, including consumed text.
    pub fn input(&self) -> &str {
        &self.input
    }

    /// Byte offset of the next unconsumed character.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Unconsumed raw suffix.
    pub fn remaining_input(&self) -> &str {
        &self.input[self.cursor..]
    }

    pub fn remaining_length(&self) -> usize {
        self.input.len() - self.cursor
    }

    /// True when nothing but whitespace is left.
    pub fn is_empty(&self) -> bool {
        self.remaining_input().trim_start().is_empty()
    }

    /// Number of whitespace-delimited tokens left.
    pub fn remaining_tokens(&self) -> usize {
        self.remaining_input().split_whitespace().count()
    }

    pub fn peek(&self) -> Option<char> {
        self.remaining_input().chars().next()
    }

    pub fn read(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.cursor += ch.len_utf8();
        Some(ch)
    }

    pub fn skip_whitespace(&mut self) -> &mut Self {
        let remaining = self.remaining_input();
        self.cursor += remaining.len() - remaining.trim_start().len();
        self
    }

    /// Next token, without consuming it. Leading whitespace is ignored.
    pub fn peek_string(&self) -> &str {
        let remaining = self.remaining_input().trim_start();
        let end = remaining
            .find(char::is_whitespace)
            .unwrap_or(remaining.len());
        &remaining[..end]
    }

    /// Consume the next token. Trailing whitespace is left in place.
    pub fn read_string(&mut self) -> String {
        self.skip_whitespace();
        let token = self.peek_string().to_string();
        self.cursor += token.len();
        token
    }

    /// Consume everything that is left, trimmed of surrounding whitespace.
    pub fn read_remaining(&mut self) -> String {
        let remaining = self.remaining_input().trim().to_string();
        self.cursor = self.input.len();
        remaining
    }

    /// Advance the cursor by `bytes`, clamped to the input length and to the
    /// previous char boundary.
    pub fn advance(&mut self, bytes: usize) {
        let mut target = (self.cursor + bytes).min(self.input.len());
        while !self.input.is_char_boundary(target) {
            target -= 1;
        }
        self.cursor = target.max(self.cursor);
    }

    /// The token currently being typed: empty when the input ends in
    /// whitespace, otherwise the last remaining token.
    pub fn last_remaining_token(&self) -> &str {
        let remaining = self.remaining_input();
        if remaining.is_empty() || remaining.ends_with(char::is_whitespace) {
            return "";
        }
        let start = remaining
            .rfind(char::is_whitespace)
            .map(|idx| idx + 1)
            .unwrap_or(0);
        &remaining[start..]
    }

    /// True when the remaining input (after leading whitespace) is a single,
    /// possibly empty, token that is still being typed.
    pub fn is_last_token(&self) -> bool {
        !self
            .remaining_input()
            .trim_start()
            .contains(char::is_whitespace)
    }

    /// Rewind to a cursor previously read from this input. Used to undo a
    /// failed parse.
    pub(crate) fn restore(&mut self, cursor: usize) {
        debug_assert!(cursor <= self.input.len());
        self.cursor = cursor;
    }
}

impl From<&str> for CommandInput {
    fn from(value: &str) -> Self {
        CommandInput::new(value)
    }
}

impl From<String> for CommandInput {
    fn from(value: String) -> Self {
        CommandInput::new(value)
    }
}
