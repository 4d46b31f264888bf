//! Values that are either available now or after an asynchronous lookup.

use futures::future::{self, BoxFuture, Either, FutureExt};
use std::future::{Future, IntoFuture};

/// A value that is ready immediately or produced by a boxed future.
///
/// Synchronous parsers and suggestion providers return `Ready` and never
/// allocate. `Pending` is reserved for results that need a suspension point,
/// such as a remote registry lookup.
pub enum Deferred<'a, T> {
    Ready(T),
    Pending(BoxFuture<'a, T>),
}

impl<'a, T: Send + 'a> Deferred<'a, T> {
    pub fn ready(value: T) -> Self {
        Deferred::Ready(value)
    }

    pub fn pending(future: impl Future<Output = T> + Send + 'a) -> Self {
        Deferred::Pending(future.boxed())
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Deferred::Ready(_))
    }

    /// Transform the value once it is available.
    pub fn map<U, F>(self, f: F) -> Deferred<'a, U>
    where
        F: FnOnce(T) -> U + Send + 'a,
        U: Send + 'a,
    {
        match self {
            Deferred::Ready(value) => Deferred::Ready(f(value)),
            Deferred::Pending(fut) => Deferred::Pending(fut.map(f).boxed()),
        }
    }

    /// The value, if no suspension is needed to produce it.
    pub fn into_ready(self) -> Option<T> {
        match self {
            Deferred::Ready(value) => Some(value),
            Deferred::Pending(_) => None,
        }
    }
}

impl<'a, T> IntoFuture for Deferred<'a, T> {
    type Output = T;
    type IntoFuture = Either<future::Ready<T>, BoxFuture<'a, T>>;

    fn into_future(self) -> Self::IntoFuture {
        match self {
            Deferred::Ready(value) => Either::Left(future::ready(value)),
            Deferred::Pending(fut) => Either::Right(fut),
        }
    }
}

impl<T> From<T> for Deferred<'_, T> {
    fn from(value: T) -> Self {
        Deferred::Ready(value)
    }
}
