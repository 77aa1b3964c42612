//! Method Tables
//!
//! A target surface (the client or its batch builder) exposes its commands as
//! named entries in a [`MethodTable`]. A command is registered twice, under
//! its lowercase and uppercase names, and both entries share one function.
//! That alias pair is what discovery keys on.
//!
//! The function shapes are:
//!
//! | Alias | Shape | Used by |
//! |---|---|---|
//! | [`CallbackFn`] | `(&R, args, completion)` | client commands, batch `exec` |
//! | [`BuilderFn`] | `(&mut R, args)` | batch command steps |
//! | [`FactoryFn`] | `(&R, args) -> B` | the client's `multi` |
//! | [`PromiseFn`] | `(&R, args) -> CommandFuture` | produced by `qualify` |

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::adapter::CommandFuture;
use crate::error::CommandError;

/// The completion handler a callback method must invoke at most once.
pub type Completion = Box<dyn FnOnce(Result<Value, CommandError>) + Send + 'static>;

/// A callback-terminated method.
pub type CallbackFn<R> = dyn Fn(&R, Vec<Value>, Completion) + Send + Sync;

/// A synchronous builder step. The adapted surface handles chaining.
pub type BuilderFn<R> = dyn Fn(&mut R, Vec<Value>) + Send + Sync;

/// A synchronous method producing a new value, such as a batch.
pub type FactoryFn<R, B> = dyn Fn(&R, Vec<Value>) -> B + Send + Sync;

/// A future-returning method.
pub type PromiseFn<R> = dyn Fn(&R, Vec<Value>) -> CommandFuture + Send + Sync;

/// Declared parameter count of a method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arity {
    /// Exactly this many arguments.
    Fixed(usize),
    /// Any number of arguments.
    Variadic,
}

impl Arity {
    /// Returns true for methods declared to take no arguments at all.
    pub fn is_nullary(&self) -> bool {
        matches!(self, Arity::Fixed(0))
    }

    /// Returns true if a method with arity `found` can serve a declaration of `self`.
    pub fn accepts(&self, found: Arity) -> bool {
        match (self, found) {
            (Arity::Fixed(expected), Arity::Fixed(actual)) => *expected == actual,
            _ => true,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Fixed(n) => write!(f, "{}", n),
            Arity::Variadic => write!(f, "any number of"),
        }
    }
}

/// A named function with its declared arity.
pub struct Method<F: ?Sized> {
    arity: Arity,
    func: Arc<F>,
}

impl<F: ?Sized> Method<F> {
    pub fn new(arity: Arity, func: Arc<F>) -> Self {
        Self { arity, func }
    }

    pub fn arity(&self) -> Arity {
        self.arity
    }

    pub fn func(&self) -> &Arc<F> {
        &self.func
    }

    /// Returns true if both entries point at the very same function.
    pub fn same_function(&self, other: &Method<F>) -> bool {
        Arc::ptr_eq(&self.func, &other.func)
    }
}

impl<F: ?Sized> Clone for Method<F> {
    fn clone(&self) -> Self {
        Self {
            arity: self.arity,
            func: Arc::clone(&self.func),
        }
    }
}

impl<F: ?Sized> fmt::Debug for Method<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method").field("arity", &self.arity).finish()
    }
}

/// A name → method table for one surface.
pub struct MethodTable<F: ?Sized> {
    methods: HashMap<String, Method<F>>,
}

impl<F: ?Sized> MethodTable<F> {
    pub fn new() -> Self {
        Self {
            methods: HashMap::new(),
        }
    }

    /// Defines a command under its lowercase name and its uppercase alias.
    pub fn define(&mut self, name: &str, arity: Arity, func: Arc<F>) {
        let method = Method::new(arity, func);
        self.methods.insert(name.to_uppercase(), method.clone());
        self.methods.insert(name.to_lowercase(), method);
    }

    /// Inserts a method under exactly one name, returning whatever it replaced.
    pub fn insert(&mut self, name: impl Into<String>, method: Method<F>) -> Option<Method<F>> {
        self.methods.insert(name.into(), method)
    }

    pub fn get(&self, name: &str) -> Option<&Method<F>> {
        self.methods.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// Returns all registered names, aliases included, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.methods.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// Copies every entry of `other` into this table, overwriting on collision.
    pub fn extend(&mut self, other: MethodTable<F>) {
        self.methods.extend(other.methods);
    }
}

impl<F: ?Sized> Default for MethodTable<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: ?Sized> Clone for MethodTable<F> {
    fn clone(&self) -> Self {
        Self {
            methods: self.methods.clone(),
        }
    }
}

impl<F: ?Sized> fmt::Debug for MethodTable<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodTable")
            .field("names", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter;

    fn noop() -> Arc<BuilderFn<Counter>> {
        Arc::new(|_: &mut Counter, _: Vec<Value>| {})
    }

    #[test]
    fn test_define_registers_alias_pair() {
        let mut table: MethodTable<BuilderFn<Counter>> = MethodTable::new();
        table.define("get", Arity::Variadic, noop());

        let lower = table.get("get").unwrap();
        let upper = table.get("GET").unwrap();
        assert!(lower.same_function(upper));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_separately_defined_functions_are_distinct() {
        let mut table: MethodTable<BuilderFn<Counter>> = MethodTable::new();
        table.insert("get", Method::new(Arity::Variadic, noop()));
        table.insert("GET", Method::new(Arity::Variadic, noop()));

        let lower = table.get("get").unwrap();
        let upper = table.get("GET").unwrap();
        assert!(!lower.same_function(upper));
    }

    #[test]
    fn test_insert_returns_replaced_method() {
        let mut table: MethodTable<BuilderFn<Counter>> = MethodTable::new();
        assert!(table
            .insert("getQ", Method::new(Arity::Variadic, noop()))
            .is_none());
        assert!(table
            .insert("getQ", Method::new(Arity::Fixed(1), noop()))
            .is_some());
        assert_eq!(table.get("getQ").unwrap().arity(), Arity::Fixed(1));
    }

    #[test]
    fn test_names_are_sorted() {
        let mut table: MethodTable<BuilderFn<Counter>> = MethodTable::new();
        table.define("set", Arity::Variadic, noop());
        table.define("get", Arity::Variadic, noop());
        assert_eq!(table.names(), vec!["GET", "SET", "get", "set"]);
    }

    #[test]
    fn test_clone_shares_functions() {
        let mut table: MethodTable<BuilderFn<Counter>> = MethodTable::new();
        table.define("get", Arity::Variadic, noop());
        let copy = table.clone();
        assert!(copy.get("get").unwrap().same_function(table.get("get").unwrap()));
    }

    #[test]
    fn test_arity_accepts() {
        assert!(Arity::Variadic.accepts(Arity::Fixed(3)));
        assert!(Arity::Fixed(2).accepts(Arity::Variadic));
        assert!(Arity::Fixed(2).accepts(Arity::Fixed(2)));
        assert!(!Arity::Fixed(2).accepts(Arity::Fixed(1)));
        assert!(Arity::Fixed(0).is_nullary());
        assert!(!Arity::Variadic.is_nullary());
    }
}
