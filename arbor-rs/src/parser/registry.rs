use super::{
    ArgumentParser, BooleanParser, NumberParser, Numeric, ParserDescriptor, StringParser,
};
use crate::suggestion::SuggestionProvider;
use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

type Factory<S> = Arc<dyn Fn() -> ParserDescriptor<S> + Send + Sync>;

/// Parsers and suggestion providers looked up by value type or by name.
///
/// Each lookup calls the registered factory, so parsers that carry state get
/// a fresh instance per component.
pub struct ParserRegistry<S> {
    by_type: HashMap<TypeId, (&'static str, Factory<S>)>,
    by_name: HashMap<String, Factory<S>>,
    suggestions: HashMap<String, Arc<dyn SuggestionProvider<S>>>,
}

impl<S: 'static> ParserRegistry<S> {
    /// Empty registry.
    pub fn new() -> Self {
        Self {
            by_type: HashMap::new(),
            by_name: HashMap::new(),
            suggestions: HashMap::new(),
        }
    }

    /// Registry with parsers for `String`, `bool` and every primitive number.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(StringParser::single);
        registry.register(BooleanParser::strict);
        registry.register_number::<i8>();
        registry.register_number::<i16>();
        registry.register_number::<i32>();
        registry.register_number::<i64>();
        registry.register_number::<i128>();
        registry.register_number::<isize>();
        registry.register_number::<u8>();
        registry.register_number::<u16>();
        registry.register_number::<u32>();
        registry.register_number::<u64>();
        registry.register_number::<u128>();
        registry.register_number::<usize>();
        registry.register_number::<f32>();
        registry.register_number::<f64>();
        registry
    }

    fn register_number<T: Numeric>(&mut self) {
        self.register(NumberParser::<T>::new);
    }

    /// Register the default parser for the factory's value type. Replaces any
    /// earlier registration for that type.
    pub fn register<P, F>(&mut self, factory: F) -> &mut Self
    where
        P: ArgumentParser<S>,
        F: Fn() -> P + Send + Sync + 'static,
    {
        let factory: Factory<S> = Arc::new(move || ParserDescriptor::of(factory()));
        self.by_type.insert(
            TypeId::of::<P::Value>(),
            (type_name::<P::Value>(), factory),
        );
        self
    }

    /// Register a parser under a name, independent of its value type.
    pub fn register_named<P, F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        P: ArgumentParser<S>,
        F: Fn() -> P + Send + Sync + 'static,
    {
        let factory: Factory<S> = Arc::new(move || ParserDescriptor::of(factory()));
        self.by_name.insert(name.into(), factory);
        self
    }

    pub fn register_suggestions(
        &mut self,
        name: impl Into<String>,
        provider: impl SuggestionProvider<S>,
    ) -> &mut Self {
        self.suggestions.insert(name.into(), Arc::new(provider));
        self
    }

    /// Default parser for values of type `T`.
    pub fn parser<T: 'static>(&self) -> Option<ParserDescriptor<S>> {
        self.by_type
            .get(&TypeId::of::<T>())
            .map(|(_, factory)| factory())
    }

    pub fn named_parser(&self, name: &str) -> Option<ParserDescriptor<S>> {
        self.by_name.get(name).map(|factory| factory())
    }

    pub fn suggestion_provider(&self, name: &str) -> Option<Arc<dyn SuggestionProvider<S>>> {
        self.suggestions.get(name).cloned()
    }

    pub fn contains_type<T: 'static>(&self) -> bool {
        self.by_type.contains_key(&TypeId::of::<T>())
    }
}

impl<S: 'static> Default for ParserRegistry<S> {
    fn default() -> Self {
        Self::standard()
    }
}

impl<S> fmt::Debug for ParserRegistry<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<&str> = self.by_type.values().map(|(name, _)| *name).collect();
        types.sort_unstable();
        let mut names: Vec<&str> = self.by_name.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("ParserRegistry")
            .field("types", &types)
            .field("names", &names)
            .field("suggestion_providers", &self.suggestions.len())
            .finish()
    }
}
