//! Substitutions: finite maps from type-variable index to monotype.
//!
//! Unlike a union-find-backed unifier, `unify` here returns a brand new
//! [`Subst`] rather than mutating shared state. Callers are responsible
//! for composing substitutions from children into the substitution they
//! pass to later siblings -- see `infer.rs`, which follows this
//! discipline at every expression variant.

use rustc_hash::FxHashMap;

use crate::env::Env;
use crate::ty::{MonoTy, PolyTy, Row, StructTy, TyVar};

/// A finite map `u32 -> MonoTy`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Subst(FxHashMap<u32, MonoTy>);

impl Subst {
    pub fn empty() -> Self {
        Subst(FxHashMap::default())
    }

    pub fn singleton(var: TyVar, ty: MonoTy) -> Self {
        let mut map = FxHashMap::default();
        map.insert(var.0, ty);
        Subst(map)
    }

    pub fn get(&self, var: TyVar) -> Option<&MonoTy> {
        self.0.get(&var.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, var: TyVar) -> bool {
        self.0.contains_key(&var.0)
    }

    /// `apply(self, ty)` -- substitute every `TyVar` in `ty` that this
    /// substitution binds, recursing into the result in case the bound
    /// type itself still mentions a variable this substitution binds
    /// (chains are resolved to a fixed point).
    ///
    /// For a `PartialStruct` row, both the tail variable and every bound
    /// attribute value are rewritten; if the tail resolves to another
    /// `PartialStruct`, the two rows are merged so the result stays flat
    /// (a row whose tail is itself a row is not a valid representation).
    pub fn apply(&self, ty: &MonoTy) -> MonoTy {
        match ty {
            MonoTy::Var(v) => match self.0.get(&v.0) {
                Some(replacement) => self.apply(replacement),
                None => ty.clone(),
            },
            MonoTy::Const(name, params) => {
                MonoTy::Const(name.clone(), params.iter().map(|p| self.apply(p)).collect())
            }
            MonoTy::Fn(params, ret) => MonoTy::Fn(
                params.iter().map(|p| self.apply(p)).collect(),
                Box::new(self.apply(ret)),
            ),
            MonoTy::Tuple(elems) => MonoTy::Tuple(elems.iter().map(|e| self.apply(e)).collect()),
            MonoTy::Array(elem, len) => MonoTy::Array(Box::new(self.apply(elem)), *len),
            MonoTy::Struct(StructTy::NamedStruct(name)) => {
                MonoTy::Struct(StructTy::NamedStruct(name.clone()))
            }
            MonoTy::Struct(StructTy::PartialStruct(row)) => self.apply_row(row),
        }
    }

    fn apply_row(&self, row: &Row) -> MonoTy {
        let mut attrs: Vec<(String, MonoTy)> =
            row.attrs.iter().map(|(k, v)| (k.clone(), self.apply(v))).collect();

        match self.0.get(&row.tail.0) {
            None => MonoTy::Struct(StructTy::PartialStruct(Row { attrs, tail: row.tail })),
            Some(MonoTy::Var(new_tail)) => {
                MonoTy::Struct(StructTy::PartialStruct(Row { attrs, tail: *new_tail }))
            }
            Some(MonoTy::Struct(StructTy::NamedStruct(name))) => {
                // The row has sealed onto a named struct; attribute values
                // carried on the (now superfluous) row are dropped -- the
                // named struct's own declared field types are authoritative.
                let _ = &mut attrs;
                MonoTy::Struct(StructTy::NamedStruct(name.clone()))
            }
            Some(MonoTy::Struct(StructTy::PartialStruct(other))) => {
                let other = self.apply_row(other);
                let MonoTy::Struct(StructTy::PartialStruct(other)) = other else {
                    unreachable!("apply_row always returns a struct-shaped MonoTy")
                };
                let merged = merge_rows_keep_first(Row { attrs, tail: row.tail }, other);
                MonoTy::Struct(StructTy::PartialStruct(merged))
            }
            Some(_) => {
                // A row's tail was unified directly with a non-struct type.
                // This can only happen if unification already rejected the
                // program; preserve the row as-is rather than panicking.
                MonoTy::Struct(StructTy::PartialStruct(Row { attrs, tail: row.tail }))
            }
        }
    }

    /// `compose(sigma2, sigma1)` such that
    /// `compose(sigma2, sigma1)(x) = sigma2(sigma1(x))` for every `x`.
    ///
    /// This is child-then-parent composition: `sigma1` is the substitution
    /// produced by a child expression, `sigma2` the one produced after it
    /// (by a later sibling, or by the unification that ties the child's
    /// result back into the parent). The result is `sigma1`'s domain with
    /// `sigma2` applied to its range, augmented with every binding in
    /// `sigma2` whose variable `sigma1` didn't already bind.
    pub fn compose(sigma2: &Subst, sigma1: &Subst) -> Subst {
        let mut out: FxHashMap<u32, MonoTy> = FxHashMap::default();
        for (k, v) in &sigma1.0 {
            out.insert(*k, sigma2.apply(v));
        }
        for (k, v) in &sigma2.0 {
            out.entry(*k).or_insert_with(|| v.clone());
        }
        Subst(out)
    }

    /// Apply this substitution to the body of every scheme in `env`,
    /// keeping each scheme's quantifier list intact (a substitution
    /// produced during inference never binds a variable that a still-live
    /// scheme has already quantified over -- those are fresh on every
    /// instantiation).
    pub fn apply_to_env(&self, env: &Env) -> Env {
        env.map_schemes(|scheme| PolyTy {
            quantified: scheme.quantified.clone(),
            body: self.apply(&scheme.body),
        })
    }
}

/// Merge two rows that both still have an open (unbound) tail, keeping
/// the first row's binding on shared keys (the caller is responsible for
/// having already unified shared-key values before calling this -- see
/// `unify::unify_partial_partial`).
fn merge_rows_keep_first(mut a: Row, b: Row) -> Row {
    for (name, ty) in b.attrs {
        if a.get(&name).is_none() {
            a.attrs.push((name, ty));
        }
    }
    a
}
