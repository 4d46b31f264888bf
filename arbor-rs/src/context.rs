//! Per-invocation command context.

use crate::error::ContextError;
use std::any::{type_name, Any};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Type-erased argument or side-channel value.
pub(crate) type ErasedValue = Arc<dyn Any + Send + Sync>;

/// Typed key into the context side channel.
///
/// ```
/// use arbor::ContextKey;
///
/// const WORLD: ContextKey<String> = ContextKey::new("world");
/// assert_eq!(WORLD.name(), "world");
/// ```
pub struct ContextKey<T> {
    name: &'static str,
    _type: PhantomData<fn() -> T>,
}

impl<T> ContextKey<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _type: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for ContextKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ContextKey<T> {}

impl<T> fmt::Debug for ContextKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ContextKey").field(&self.name).finish()
    }
}

/// State of one resolution attempt.
///
/// Created fresh for every `execute`/`suggest` call and dropped when that call
/// completes. Holds the sender, the parsed argument values keyed by component
/// name, and a side channel that parsers use to hand data to later parsers.
pub struct CommandContext<S> {
    sender: Arc<S>,
    raw_input: Arc<str>,
    arguments: HashMap<String, ErasedValue>,
    extras: HashMap<&'static str, ErasedValue>,
}

impl<S> CommandContext<S> {
    pub fn new(sender: Arc<S>, raw_input: &str) -> Self {
        Self {
            sender,
            raw_input: Arc::from(raw_input),
            arguments: HashMap::new(),
            extras: HashMap::new(),
        }
    }

    pub fn sender(&self) -> &S {
        &self.sender
    }

    pub(crate) fn sender_arc(&self) -> &Arc<S> {
        &self.sender
    }

    /// Input the resolution started from.
    pub fn raw_input(&self) -> &str {
        &self.raw_input
    }

    /// Parsed value of the argument `name`, if bound and of type `T`.
    pub fn get<T: Any>(&self, name: &str) -> Option<&T> {
        let value: &(dyn Any + Send + Sync) = &**self.arguments.get(name)?;
        value.downcast_ref::<T>()
    }

    /// Like [`get`](Self::get), but reports why the value is unavailable.
    pub fn require<T: Any>(&self, name: &str) -> Result<&T, ContextError> {
        let value: &(dyn Any + Send + Sync) =
            &**self
                .arguments
                .get(name)
                .ok_or_else(|| ContextError::Missing {
                    name: name.to_string(),
                })?;
        value
            .downcast_ref::<T>()
            .ok_or_else(|| ContextError::TypeMismatch {
                name: name.to_string(),
                expected: type_name::<T>(),
            })
    }

    /// Parsed value, or `default` when the argument was not bound.
    pub fn get_or<T: Any + Clone>(&self, name: &str, default: T) -> T {
        self.get::<T>(name).cloned().unwrap_or(default)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.arguments.contains_key(name)
    }

    /// Names of all bound arguments, in no particular order.
    pub fn argument_names(&self) -> impl Iterator<Item = &str> {
        self.arguments.keys().map(String::as_str)
    }

    pub fn argument_count(&self) -> usize {
        self.arguments.len()
    }

    /// Stash a value for later parsers or the handler.
    pub fn store<T: Any + Send + Sync>(&mut self, key: &ContextKey<T>, value: T) {
        self.extras.insert(key.name, Arc::new(value));
    }

    pub fn retrieve<T: Any>(&self, key: &ContextKey<T>) -> Option<&T> {
        let value: &(dyn Any + Send + Sync) = &**self.extras.get(key.name)?;
        value.downcast_ref::<T>()
    }

    pub(crate) fn bind(&mut self, name: &str, value: ErasedValue) {
        self.arguments.insert(name.to_string(), value);
    }
}

// Manual impl: cloning must not require `S: Clone`.
impl<S> Clone for CommandContext<S> {
    fn clone(&self) -> Self {
        Self {
            sender: Arc::clone(&self.sender),
            raw_input: Arc::clone(&self.raw_input),
            arguments: self.arguments.clone(),
            extras: self.extras.clone(),
        }
    }
}

impl<S> fmt::Debug for CommandContext<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.argument_names().collect();
        names.sort_unstable();
        f.debug_struct("CommandContext")
            .field("raw_input", &self.raw_input)
            .field("arguments", &names)
            .finish_non_exhaustive()
    }
}
