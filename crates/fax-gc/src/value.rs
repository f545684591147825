use crate::object::{GcRef, ObjKind};
use std::fmt;

/// A Lox value. Kept as a plain tagged enum rather than NaN-boxed: spec
/// allows either representation, and the tagged union is the variant every
/// non-boxed build of clox itself falls back to (see `value.h`'s `#else`
/// branch), so it is the one that needs no `unsafe` bit-twiddling to get
/// right.
#[derive(Clone, Copy, Debug)]
pub enum Value {
    Nil,
    Bool(bool),
    Number(f64),
    Obj(GcRef),
}

impl Value {
    pub fn is_falsey(&self) -> bool {
        matches!(self, Value::Nil) || matches!(self, Value::Bool(false))
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Number(_))
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Value::Obj(r) if matches!(r.kind(), ObjKind::Str(_)))
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_obj(&self) -> Option<GcRef> {
        match self {
            Value::Obj(r) => Some(*r),
            _ => None,
        }
    }
}

/// Matches clox's `valuesEqual`: same-typed scalars compare by value,
/// objects compare by heap identity (which is sound because strings are
/// interned, so two equal strings are always the same allocation).
impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Obj(a), Value::Obj(b)) => a.same_object(b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::Obj(r) => write!(f, "{}", r.kind()),
        }
    }
}

/// clox prints doubles with C's `%g`, which drops a trailing `.0` that
/// Rust's `Display` keeps. `{}` already omits it for integral floats, so
/// this only exists to centralize the formatting choice in one place.
fn format_number(n: f64) -> String {
    if n.is_infinite() {
        return if n > 0.0 { "inf".to_string() } else { "-inf".to_string() };
    }
    if n.is_nan() {
        return "nan".to_string();
    }
    format!("{n}")
}
