//! Symbolic field identifiers
//!
//! A [`Symbol`] names a record field, a table alias or a select output. It
//! is cheap to clone and can be declared as a `const` item, which is what
//! the `linqc` translator emits for every `@name` it rewrites.

use crate::value::Value;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Positional alias of the `from` table when none is given
pub const FROM_ALIAS: Symbol = Symbol::from_static("_1");

/// Positional alias of the joined table when none is given
pub const JOIN_ALIAS: Symbol = Symbol::from_static("_2");

/// Symbolic field identifier
#[derive(Clone)]
pub struct Symbol(Repr);

#[derive(Clone)]
enum Repr {
    Static(&'static str),
    Shared(Arc<str>),
}

impl Symbol {
    /// Create a symbol from a static name, usable in `const` items
    pub const fn from_static(name: &'static str) -> Self {
        Self(Repr::Static(name))
    }

    /// Create a symbol from a runtime name
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Repr::Shared(Arc::from(name.as_ref())))
    }

    /// Symbol name
    pub fn as_str(&self) -> &str {
        match &self.0 {
            Repr::Static(name) => name,
            Repr::Shared(name) => name,
        }
    }

    /// Read the member this symbol names on `target`
    pub fn member_access<'r, T>(&self, target: &'r T) -> Option<&'r Value>
    where
        T: SymbolAccess + ?Sized,
    {
        target.member(self)
    }

    /// Call the method this symbol names on `target`
    pub fn method_call<A, T>(&self, target: &T, args: A) -> T::Output
    where
        T: SymbolCall<A> + ?Sized,
    {
        target.call_method(self, args)
    }
}

/// Member lookup by symbol
pub trait SymbolAccess {
    /// Value stored under `symbol`, if any
    fn member(&self, symbol: &Symbol) -> Option<&Value>;
}

/// Method dispatch by symbol
///
/// `A` is the argument tuple produced by the translator for `obj@name(args)`.
pub trait SymbolCall<A> {
    /// Result of the call
    type Output;

    /// Invoke the method named `symbol` with `args`
    fn call_method(&self, symbol: &Symbol, args: A) -> Self::Output;
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for Symbol {}

impl PartialEq<str> for Symbol {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for Symbol {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_str().hash(state);
    }
}

impl PartialOrd for Symbol {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Symbol {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.as_str())
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl From<&str> for Symbol {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Symbol {
    fn from(name: String) -> Self {
        Self(Repr::Shared(Arc::from(name)))
    }
}

impl From<&Symbol> for Symbol {
    fn from(symbol: &Symbol) -> Self {
        symbol.clone()
    }
}

impl Serialize for Symbol {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Symbol {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Symbol::from)
    }
}
