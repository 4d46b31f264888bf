//! Completion candidates and the providers that produce them.

use crate::context::CommandContext;
use crate::deferred::Deferred;
use crate::input::CommandInput;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::ops::Range;
use std::sync::Arc;

/// Suggestions produced for one argument or node.
pub type SuggestionFuture<'a> = Deferred<'a, Vec<Suggestion>>;

/// A single completion candidate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    /// Text to insert.
    pub text: String,

    /// Optional help text shown next to the candidate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tooltip: Option<String>,

    /// Byte range of the raw input this candidate replaces.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replace: Option<Range<usize>>,

    /// Prefix filtering ignores ASCII case for this candidate, whatever the
    /// manager is configured with. Set by parsers that accept any case.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub ignore_case: bool,
}

impl Suggestion {
    pub fn simple(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tooltip: None,
            replace: None,
            ignore_case: false,
        }
    }

    pub fn with_tooltip(mut self, tooltip: impl Into<String>) -> Self {
        self.tooltip = Some(tooltip.into());
        self
    }

    pub fn with_replace(mut self, range: Range<usize>) -> Self {
        self.replace = Some(range);
        self
    }

    pub fn case_insensitive(mut self) -> Self {
        self.ignore_case = true;
        self
    }

    /// Whether this candidate can complete `partial`.
    pub fn matches(&self, partial: &str, ignore_case: bool) -> bool {
        if ignore_case || self.ignore_case {
            self.text
                .get(..partial.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(partial))
        } else {
            self.text.starts_with(partial)
        }
    }
}

impl From<&str> for Suggestion {
    fn from(value: &str) -> Self {
        Suggestion::simple(value)
    }
}

impl From<String> for Suggestion {
    fn from(value: String) -> Self {
        Suggestion::simple(value)
    }
}

/// Produces candidates for the remaining input of one argument.
///
/// Implemented for plain closures `Fn(&CommandContext<S>, &CommandInput) ->
/// Vec<Suggestion>`. Wrap an async closure in [`FutureSuggestions`] when the
/// candidates come from a lookup.
pub trait SuggestionProvider<S>: Send + Sync + 'static {
    fn suggestions<'a>(
        &'a self,
        context: &'a CommandContext<S>,
        input: &'a CommandInput,
    ) -> SuggestionFuture<'a>;
}

impl<S, F> SuggestionProvider<S> for F
where
    F: Fn(&CommandContext<S>, &CommandInput) -> Vec<Suggestion> + Send + Sync + 'static,
{
    fn suggestions<'a>(
        &'a self,
        context: &'a CommandContext<S>,
        input: &'a CommandInput,
    ) -> SuggestionFuture<'a> {
        Deferred::Ready(self(context, input))
    }
}

/// Fixed list of candidates.
#[derive(Clone, Debug)]
pub struct StaticSuggestions {
    candidates: Arc<[Suggestion]>,
}

impl StaticSuggestions {
    pub fn new<I, T>(candidates: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Suggestion>,
    {
        Self {
            candidates: candidates.into_iter().map(Into::into).collect(),
        }
    }
}

impl<S: 'static> SuggestionProvider<S> for StaticSuggestions {
    fn suggestions<'a>(
        &'a self,
        _context: &'a CommandContext<S>,
        _input: &'a CommandInput,
    ) -> SuggestionFuture<'a> {
        Deferred::Ready(self.candidates.to_vec())
    }
}

/// Adapts an async lookup into a [`SuggestionProvider`].
///
/// The closure receives the context and the text being completed and returns
/// a `'static` future, so it must clone whatever it needs from the context.
pub struct FutureSuggestions<F> {
    lookup: F,
}

impl<F> FutureSuggestions<F> {
    pub fn new(lookup: F) -> Self {
        Self { lookup }
    }
}

impl<S, F, Fut> SuggestionProvider<S> for FutureSuggestions<F>
where
    S: 'static,
    F: Fn(&CommandContext<S>, String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Vec<Suggestion>> + Send + 'static,
{
    fn suggestions<'a>(
        &'a self,
        context: &'a CommandContext<S>,
        input: &'a CommandInput,
    ) -> SuggestionFuture<'a> {
        let partial = input.remaining_input().trim_start().to_string();
        Deferred::pending((self.lookup)(context, partial))
    }
}

/// One-shot sequence of suggestions for a single request.
#[derive(Debug)]
pub struct Suggestions {
    inner: std::vec::IntoIter<Suggestion>,
}

impl Suggestions {
    pub(crate) fn new(suggestions: Vec<Suggestion>) -> Self {
        Self {
            inner: suggestions.into_iter(),
        }
    }

    /// Texts of the remaining candidates.
    pub fn texts(self) -> Vec<String> {
        self.map(|s| s.text).collect()
    }
}

impl Iterator for Suggestions {
    type Item = Suggestion;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for Suggestions {}

/// Keep candidates matching `partial`, drop duplicate texts, then truncate.
pub(crate) fn process(
    candidates: Vec<Suggestion>,
    partial: &str,
    ignore_case: bool,
    limit: Option<usize>,
) -> Vec<Suggestion> {
    let mut seen = std::collections::HashSet::new();
    candidates
        .into_iter()
        .filter(|s| s.matches(partial, ignore_case))
        .filter(|s| seen.insert(s.text.clone()))
        .take(limit.unwrap_or(usize::MAX))
        .collect()
}
