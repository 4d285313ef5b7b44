//! Read-only state inspection.
//!
//! Queries never change emulation state, so a debugger can poll any device
//! between bus cycles.

use std::fmt;

/// A dynamically-typed answer to a state query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Bool(bool),
    U8(u8),
    U16(u16),
    U32(u32),
    /// A symbolic state such as a rendering phase or a slot mapping.
    Name(String),
    List(Vec<Value>),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{v}"),
            Value::U8(v) => write!(f, "${v:02X}"),
            Value::U16(v) => write!(f, "${v:04X}"),
            Value::U32(v) => write!(f, "{v}"),
            Value::Name(v) => f.write_str(v),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<u8> for Value {
    fn from(v: u8) -> Self {
        Value::U8(v)
    }
}

impl From<u16> for Value {
    fn from(v: u16) -> Self {
        Value::U16(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::U32(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Name(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Name(v)
    }
}

/// A component whose state can be inspected by dotted path, for example
/// `paging.enabled` or `screen.border`.
pub trait Observable {
    /// Answer a query, or `None` if the path is not recognised.
    fn query(&self, path: &str) -> Option<Value>;

    /// Every path [`query`](Observable::query) understands.
    fn query_paths(&self) -> &'static [&'static str];
}
