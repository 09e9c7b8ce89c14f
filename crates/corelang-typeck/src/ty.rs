//! Type representation for the core inference engine.
//!
//! Defines the monomorphic type algebra (`MonoTy`), struct-type flavors
//! (`StructTy`, `Row`), and polymorphic type schemes (`PolyTy`). These
//! form the foundation of Hindley-Milner inference extended with a
//! structural row type for not-yet-resolved struct attribute access.

use std::fmt;

use serde::Serialize;

/// A type variable, identified by a `u32` index that is unique for the
/// lifetime of a single [`crate::context::Context`].
///
/// Unlike a union-find-backed type variable, a `TyVar` here is just an
/// index into a [`crate::subst::Subst`] map -- it carries no identity
/// beyond its number, and binding it never mutates anything in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TyVar(pub u32);

impl fmt::Display for TyVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "?{}", self.0)
    }
}

/// An ordered attribute list plus an open tail variable.
///
/// A row is "closed" once its tail variable has been unified with a
/// concrete [`StructTy::NamedStruct`] (sealing it); until then it is
/// "open" and more attributes may be merged into it. Attribute order is
/// insertion order and is preserved so error messages are stable, but
/// order never affects equality of rows for unification purposes --
/// lookups are by name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Row {
    pub attrs: Vec<(String, MonoTy)>,
    pub tail: TyVar,
}

impl Row {
    pub fn new(tail: TyVar) -> Self {
        Row { attrs: Vec::new(), tail }
    }

    pub fn singleton(name: impl Into<String>, ty: MonoTy, tail: TyVar) -> Self {
        Row { attrs: vec![(name.into(), ty)], tail }
    }

    pub fn get(&self, name: &str) -> Option<&MonoTy> {
        self.attrs.iter().find(|(n, _)| n == name).map(|(_, t)| t)
    }

    /// Insert `(name, ty)`, returning the prior binding if `name` was
    /// already present (the caller must unify it with `ty`) rather than
    /// silently overwriting it.
    pub fn insert(&mut self, name: impl Into<String>, ty: MonoTy) -> Option<MonoTy> {
        let name = name.into();
        if let Some(slot) = self.attrs.iter_mut().find(|(n, _)| *n == name) {
            Some(std::mem::replace(&mut slot.1, ty))
        } else {
            self.attrs.push((name, ty));
            None
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.attrs.iter().map(|(n, _)| n.as_str())
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (name, ty)) in self.attrs.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name}: {ty}")?;
        }
        if !self.attrs.is_empty() {
            write!(f, " | ")?;
        }
        write!(f, "{}}}", self.tail)
    }
}

/// The two flavors a struct-shaped type can take.
///
/// `NamedStruct` is a fully resolved, nominal struct type -- the bearer
/// is known to be exactly the struct `name` declares. `PartialStruct` is
/// a not-yet-resolved record shape discovered purely from the attributes
/// the program has accessed on it so far; it is resolved to a
/// `NamedStruct` (or left as an anonymous record, see 4.3/AttributeAccess
/// in the spec) by structural matching.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum StructTy {
    NamedStruct(String),
    PartialStruct(Row),
}

impl fmt::Display for StructTy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StructTy::NamedStruct(name) => write!(f, "{name}"),
            StructTy::PartialStruct(row) => write!(f, "{row}"),
        }
    }
}

/// A monomorphic type -- a type without quantified variables.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum MonoTy {
    /// An inference variable, to be resolved by unification.
    Var(TyVar),
    /// A named constructor, nullary or applied: `u32`, `bool`, `Ptr<T>`.
    Const(String, Vec<MonoTy>),
    /// A function type `Fn(params...) -> ret`.
    Fn(Vec<MonoTy>, Box<MonoTy>),
    /// A fixed-arity tuple.
    Tuple(Vec<MonoTy>),
    /// A fixed-length array (length is syntactic, not inferred).
    Array(Box<MonoTy>, u64),
    /// A struct-shaped type, named or partial.
    Struct(StructTy),
}

impl MonoTy {
    pub fn unit() -> MonoTy {
        MonoTy::Const("unit".into(), Vec::new())
    }

    pub fn bool_ty() -> MonoTy {
        MonoTy::Const("bool".into(), Vec::new())
    }

    pub fn u32_ty() -> MonoTy {
        MonoTy::Const("u32".into(), Vec::new())
    }

    pub fn u8_ty() -> MonoTy {
        MonoTy::Const("u8".into(), Vec::new())
    }

    pub fn char_ty() -> MonoTy {
        MonoTy::Const("char".into(), Vec::new())
    }

    pub fn string_ty() -> MonoTy {
        MonoTy::Const("string".into(), Vec::new())
    }

    pub fn ptr(inner: MonoTy) -> MonoTy {
        MonoTy::Const("Ptr".into(), vec![inner])
    }

    pub fn named_struct(name: impl Into<String>) -> MonoTy {
        MonoTy::Struct(StructTy::NamedStruct(name.into()))
    }

    pub fn partial_struct(row: Row) -> MonoTy {
        MonoTy::Struct(StructTy::PartialStruct(row))
    }

    /// Every `TyVar` referenced anywhere inside this type, in order of
    /// first appearance (not deduplicated -- callers dedupe if needed).
    pub fn free_vars(&self, out: &mut Vec<TyVar>) {
        match self {
            MonoTy::Var(v) => out.push(*v),
            MonoTy::Const(_, params) => {
                for p in params {
                    p.free_vars(out);
                }
            }
            MonoTy::Fn(params, ret) => {
                for p in params {
                    p.free_vars(out);
                }
                ret.free_vars(out);
            }
            MonoTy::Tuple(elems) => {
                for e in elems {
                    e.free_vars(out);
                }
            }
            MonoTy::Array(elem, _) => elem.free_vars(out),
            MonoTy::Struct(StructTy::NamedStruct(_)) => {}
            MonoTy::Struct(StructTy::PartialStruct(row)) => {
                for (_, t) in &row.attrs {
                    t.free_vars(out);
                }
                out.push(row.tail);
            }
        }
    }
}

impl fmt::Display for MonoTy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonoTy::Var(v) => write!(f, "{v}"),
            MonoTy::Const(name, params) => {
                write!(f, "{name}")?;
                if !params.is_empty() {
                    write!(f, "<")?;
                    for (i, p) in params.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{p}")?;
                    }
                    write!(f, ">")?;
                }
                Ok(())
            }
            MonoTy::Fn(params, ret) => {
                write!(f, "fn(")?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{p}")?;
                }
                write!(f, ") -> {ret}")
            }
            MonoTy::Tuple(elems) => {
                write!(f, "(")?;
                for (i, e) in elems.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{e}")?;
                }
                write!(f, ")")
            }
            MonoTy::Array(elem, len) => write!(f, "[{elem}; {len}]"),
            MonoTy::Struct(s) => write!(f, "{s}"),
        }
    }
}

/// A polymorphic type scheme: a monotype with a set of universally
/// quantified variables, e.g. `forall a. a -> a`.
#[derive(Debug, Clone, Serialize)]
pub struct PolyTy {
    pub quantified: Vec<TyVar>,
    pub body: MonoTy,
}

impl PolyTy {
    pub fn mono(body: MonoTy) -> Self {
        PolyTy { quantified: Vec::new(), body }
    }
}

impl fmt::Display for PolyTy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.quantified.is_empty() {
            write!(f, "forall ")?;
            for (i, v) in self.quantified.iter().enumerate() {
                if i > 0 {
                    write!(f, " ")?;
                }
                write!(f, "{v}")?;
            }
            write!(f, ". ")?;
        }
        write!(f, "{}", self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_insert_and_get() {
        let mut row = Row::new(TyVar(0));
        assert!(row.insert("x", MonoTy::u32_ty()).is_none());
        assert_eq!(row.get("x"), Some(&MonoTy::u32_ty()));
        let prior = row.insert("x", MonoTy::bool_ty());
        assert_eq!(prior, Some(MonoTy::u32_ty()));
        assert_eq!(row.get("x"), Some(&MonoTy::bool_ty()));
    }

    #[test]
    fn free_vars_collects_row_tail() {
        let row = Row::singleton("x", MonoTy::Var(TyVar(1)), TyVar(2));
        let ty = MonoTy::partial_struct(row);
        let mut vars = Vec::new();
        ty.free_vars(&mut vars);
        assert_eq!(vars, vec![TyVar(1), TyVar(2)]);
    }

    #[test]
    fn display_fn_type() {
        let ty = MonoTy::Fn(vec![MonoTy::u32_ty(), MonoTy::bool_ty()], Box::new(MonoTy::u32_ty()));
        assert_eq!(ty.to_string(), "fn(u32, bool) -> u32");
    }
}
