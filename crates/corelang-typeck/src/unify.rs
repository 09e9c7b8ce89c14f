//! Unification: the core `MonoTy x MonoTy -> Subst` relation, plus
//! structural struct matching (4.4).
//!
//! Unification never knows about source spans -- it is pure type algebra.
//! Callers (`infer.rs`) attach the span of the expression that triggered
//! a given unification when turning a [`UnifyError`] into a
//! [`crate::error::TypeError`].

use crate::context::{AnyMember, Context};
use crate::subst::Subst;
use crate::ty::{MonoTy, PolyTy, Row, StructTy, TyVar};

/// An algebraic unification failure, not yet attributed to a span.
#[derive(Debug, Clone)]
pub enum UnifyError {
    Mismatch { expected: MonoTy, found: MonoTy },
    RecursiveType { var: TyVar, ty: MonoTy },
    NoSuchAttribute { struct_name: String, attr: String },
    UndeclaredStruct { name: String },
}

/// The outcome of structural struct matching (4.4): searching the struct
/// table for declarations consistent with a partial row.
#[derive(Debug, Clone)]
pub enum StructMatch {
    NoMatch,
    OneMatch(String),
    MultipleMatches(Vec<String>),
}

fn occurs_in(var: TyVar, ty: &MonoTy) -> bool {
    let mut vars = Vec::new();
    ty.free_vars(&mut vars);
    vars.contains(&var)
}

/// Unify a sequence of type pairs left to right, applying each
/// intermediate substitution to the remaining pairs before unifying them
/// and composing the results. Used for argument lists, tuple elements,
/// and constructor type parameters.
fn unify_seq(
    ctx: &mut Context,
    pairs: impl IntoIterator<Item = (MonoTy, MonoTy)>,
) -> Result<Subst, UnifyError> {
    let mut subst = Subst::empty();
    for (a, b) in pairs {
        let a = subst.apply(&a);
        let b = subst.apply(&b);
        let s = ctx.unify(a, b)?;
        subst = Subst::compose(&s, &subst);
    }
    Ok(subst)
}

impl Context {
    /// `unify(t1, t2)`: the single most load-bearing operation in the
    /// engine. Never introduces a fresh type variable; every case either
    /// binds an existing one or recurses structurally.
    pub fn unify(&mut self, a: MonoTy, b: MonoTy) -> Result<Subst, UnifyError> {
        match (a, b) {
            (MonoTy::Var(i), MonoTy::Var(j)) if i == j => Ok(Subst::empty()),
            (MonoTy::Var(i), t) | (t, MonoTy::Var(i)) => {
                if occurs_in(i, &t) {
                    return Err(UnifyError::RecursiveType { var: i, ty: t });
                }
                Ok(Subst::singleton(i, t))
            }
            (MonoTy::Const(n1, p1), MonoTy::Const(n2, p2)) => {
                if n1 != n2 || p1.len() != p2.len() {
                    return Err(UnifyError::Mismatch {
                        expected: MonoTy::Const(n1, p1),
                        found: MonoTy::Const(n2, p2),
                    });
                }
                unify_seq(self, p1.into_iter().zip(p2))
            }
            (MonoTy::Fn(p1, r1), MonoTy::Fn(p2, r2)) => {
                if p1.len() != p2.len() {
                    return Err(UnifyError::Mismatch {
                        expected: MonoTy::Fn(p1, r1),
                        found: MonoTy::Fn(p2, r2),
                    });
                }
                let mut pairs: Vec<(MonoTy, MonoTy)> = p1.into_iter().zip(p2).collect();
                pairs.push((*r1, *r2));
                unify_seq(self, pairs)
            }
            (MonoTy::Tuple(e1), MonoTy::Tuple(e2)) => {
                if e1.len() != e2.len() {
                    return Err(UnifyError::Mismatch {
                        expected: MonoTy::Tuple(e1),
                        found: MonoTy::Tuple(e2),
                    });
                }
                unify_seq(self, e1.into_iter().zip(e2))
            }
            (MonoTy::Array(e1, l1), MonoTy::Array(e2, l2)) => {
                if l1 != l2 {
                    return Err(UnifyError::Mismatch {
                        expected: MonoTy::Array(e1, l1),
                        found: MonoTy::Array(e2, l2),
                    });
                }
                self.unify(*e1, *e2)
            }
            (MonoTy::Struct(StructTy::NamedStruct(a)), MonoTy::Struct(StructTy::NamedStruct(b))) => {
                if a == b {
                    Ok(Subst::empty())
                } else {
                    Err(UnifyError::Mismatch {
                        expected: MonoTy::named_struct(a),
                        found: MonoTy::named_struct(b),
                    })
                }
            }
            (MonoTy::Struct(StructTy::NamedStruct(name)), MonoTy::Struct(StructTy::PartialStruct(row)))
            | (MonoTy::Struct(StructTy::PartialStruct(row)), MonoTy::Struct(StructTy::NamedStruct(name))) => {
                self.unify_named_partial(name, row)
            }
            (MonoTy::Struct(StructTy::PartialStruct(r1)), MonoTy::Struct(StructTy::PartialStruct(r2))) => {
                self.unify_partial_partial(r1, r2)
            }
            (a, b) => Err(UnifyError::Mismatch { expected: a, found: b }),
        }
    }

    /// Seal a `PartialStruct` row onto a concrete struct name: every row
    /// binding must correspond to either a declared attribute (field or
    /// method) or a static function -- the two namespaces are searched
    /// together via [`crate::context::StructDecl::lookup_any`], matching
    /// the shared row machinery used when a struct name is projected
    /// (`Struct.func`) as well as when an instance attribute is read.
    fn unify_named_partial(&mut self, name: String, row: Row) -> Result<Subst, UnifyError> {
        let decl = self
            .structs
            .lookup(&name)
            .cloned()
            .ok_or_else(|| UnifyError::UndeclaredStruct { name: name.clone() })?;

        let mut subst = Subst::empty();
        for (attr, value) in &row.attrs {
            let scheme: PolyTy = match decl.lookup_any(attr) {
                Some(AnyMember::Attribute(a)) => a.ty.clone(),
                Some(AnyMember::Static(s)) => s.clone(),
                None => {
                    return Err(UnifyError::NoSuchAttribute {
                        struct_name: name.clone(),
                        attr: attr.clone(),
                    })
                }
            };
            let declared = self.instantiate(&scheme);
            let value = subst.apply(value);
            let s = self.unify(declared, value)?;
            subst = Subst::compose(&s, &subst);
        }
        let seal = Subst::singleton(row.tail, MonoTy::named_struct(name));
        Ok(Subst::compose(&seal, &subst))
    }

    /// Merge two open rows: unify the types bound to every shared
    /// attribute, then bind the first row's tail to a new row carrying
    /// the union of both rows' attributes and the second row's tail left
    /// open for further extension.
    fn unify_partial_partial(&mut self, r1: Row, r2: Row) -> Result<Subst, UnifyError> {
        let mut subst = Subst::empty();
        for (name, v1) in &r1.attrs {
            if let Some(v2) = r2.get(name) {
                let v1 = subst.apply(v1);
                let v2 = subst.apply(v2);
                let s = self.unify(v1, v2)?;
                subst = Subst::compose(&s, &subst);
            }
        }

        if r1.tail == r2.tail {
            return Ok(subst);
        }

        let mut merged_attrs: Vec<(String, MonoTy)> =
            r1.attrs.iter().map(|(k, v)| (k.clone(), subst.apply(v))).collect();
        for (name, ty) in &r2.attrs {
            if r1.get(name).is_none() {
                merged_attrs.push((name.clone(), subst.apply(ty)));
            }
        }
        let merged = Row { attrs: merged_attrs, tail: r2.tail };
        let merged_ty = MonoTy::partial_struct(merged);
        if occurs_in(r1.tail, &merged_ty) {
            return Err(UnifyError::RecursiveType { var: r1.tail, ty: merged_ty });
        }
        let seal = Subst::singleton(r1.tail, merged_ty);
        Ok(Subst::compose(&seal, &subst))
    }

    /// Structural struct matching (4.4): find every registered struct
    /// whose declared fields are a superset of `row`'s attributes, each
    /// unifiable with the corresponding declared type. Candidate checks
    /// run against a scratch context so a rejected candidate can never
    /// leak bindings into the ambient substitution the caller is building.
    pub fn match_struct(&mut self, row: &Row) -> StructMatch {
        let names: Vec<String> = self.structs.iter().map(|d| d.name.clone()).collect();
        let mut candidates = Vec::new();
        for name in names {
            if self.row_matches_struct(row, &name) {
                candidates.push(name);
            }
        }
        match candidates.len() {
            0 => StructMatch::NoMatch,
            1 => StructMatch::OneMatch(candidates.into_iter().next().unwrap()),
            _ => StructMatch::MultipleMatches(candidates),
        }
    }

    fn row_matches_struct(&mut self, row: &Row, name: &str) -> bool {
        let decl = match self.structs.lookup(name) {
            Some(d) => d.clone(),
            None => return false,
        };
        let mut scratch = Subst::empty();
        for (attr, value) in &row.attrs {
            let scheme = match decl.attribute(attr) {
                Some(a) => a.ty.clone(),
                None => return false,
            };
            let declared = self.instantiate(&scheme);
            let value = scratch.apply(value);
            match self.unify(declared, value) {
                Ok(s) => scratch = Subst::compose(&s, &scratch),
                Err(_) => return false,
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Attribute, StructDecl};

    #[test]
    fn unify_identical_vars_is_noop() {
        let mut ctx = Context::new();
        let v = ctx.fresh_var();
        let s = ctx.unify(MonoTy::Var(v), MonoTy::Var(v)).unwrap();
        assert!(s.is_empty());
    }

    #[test]
    fn unify_var_with_concrete_binds_it() {
        let mut ctx = Context::new();
        let v = ctx.fresh_var();
        let s = ctx.unify(MonoTy::Var(v), MonoTy::u32_ty()).unwrap();
        assert_eq!(s.apply(&MonoTy::Var(v)), MonoTy::u32_ty());
    }

    #[test]
    fn unify_occurs_check_rejects_recursive_type() {
        let mut ctx = Context::new();
        let v = ctx.fresh_var();
        let recursive = MonoTy::Array(Box::new(MonoTy::Var(v)), 3);
        let err = ctx.unify(MonoTy::Var(v), recursive).unwrap_err();
        assert!(matches!(err, UnifyError::RecursiveType { .. }));
    }

    #[test]
    fn unify_const_name_mismatch_errors() {
        let mut ctx = Context::new();
        let err = ctx.unify(MonoTy::u32_ty(), MonoTy::bool_ty()).unwrap_err();
        assert!(matches!(err, UnifyError::Mismatch { .. }));
    }

    #[test]
    fn unify_fn_types_pairwise() {
        let mut ctx = Context::new();
        let v = ctx.fresh_var();
        let f1 = MonoTy::Fn(vec![MonoTy::Var(v)], Box::new(MonoTy::u32_ty()));
        let f2 = MonoTy::Fn(vec![MonoTy::bool_ty()], Box::new(MonoTy::u32_ty()));
        let s = ctx.unify(f1, f2).unwrap();
        assert_eq!(s.apply(&MonoTy::Var(v)), MonoTy::bool_ty());
    }

    fn point_decl() -> StructDecl {
        let mut decl = StructDecl::new("Point");
        decl.attributes.push(Attribute {
            name: "x".into(),
            ty: PolyTy::mono(MonoTy::u32_ty()),
            method: None,
        });
        decl.attributes.push(Attribute {
            name: "y".into(),
            ty: PolyTy::mono(MonoTy::u32_ty()),
            method: None,
        });
        decl
    }

    #[test]
    fn unify_named_partial_seals_row() {
        let mut ctx = Context::new();
        ctx.structs.register(point_decl());
        let tail = ctx.fresh_var();
        let row = Row::singleton("x", MonoTy::u32_ty(), tail);
        let s = ctx.unify(MonoTy::named_struct("Point"), MonoTy::partial_struct(row)).unwrap();
        assert_eq!(s.apply(&MonoTy::Var(tail)), MonoTy::named_struct("Point"));
    }

    #[test]
    fn unify_named_partial_rejects_unknown_attribute() {
        let mut ctx = Context::new();
        ctx.structs.register(point_decl());
        let tail = ctx.fresh_var();
        let row = Row::singleton("z", MonoTy::u32_ty(), tail);
        let err = ctx.unify(MonoTy::named_struct("Point"), MonoTy::partial_struct(row)).unwrap_err();
        assert!(matches!(err, UnifyError::NoSuchAttribute { .. }));
    }

    #[test]
    fn unify_partial_partial_merges_rows() {
        let mut ctx = Context::new();
        let tail1 = ctx.fresh_var();
        let tail2 = ctx.fresh_var();
        let r1 = Row::singleton("x", MonoTy::u32_ty(), tail1);
        let r2 = Row::singleton("y", MonoTy::bool_ty(), tail2);
        let s = ctx.unify(MonoTy::partial_struct(r1), MonoTy::partial_struct(r2)).unwrap();
        match s.apply(&MonoTy::Var(tail1)) {
            MonoTy::Struct(StructTy::PartialStruct(row)) => {
                assert_eq!(row.get("x"), Some(&MonoTy::u32_ty()));
                assert_eq!(row.get("y"), Some(&MonoTy::bool_ty()));
            }
            other => panic!("expected merged partial struct, got {other:?}"),
        }
    }

    #[test]
    fn match_struct_distinguishes_zero_one_many() {
        let mut ctx = Context::new();
        ctx.structs.register(point_decl());
        let mut other = StructDecl::new("Size");
        other.attributes.push(Attribute {
            name: "x".into(),
            ty: PolyTy::mono(MonoTy::u32_ty()),
            method: None,
        });
        ctx.structs.register(other);

        let tail = ctx.fresh_var();
        let ambiguous = Row::singleton("x", MonoTy::u32_ty(), tail);
        assert!(matches!(ctx.match_struct(&ambiguous), StructMatch::MultipleMatches(_)));

        let tail2 = ctx.fresh_var();
        let unique = Row::singleton("y", MonoTy::u32_ty(), tail2);
        assert!(matches!(ctx.match_struct(&unique), StructMatch::OneMatch(n) if n == "Point"));

        let tail3 = ctx.fresh_var();
        let none = Row::singleton("q", MonoTy::u32_ty(), tail3);
        assert!(matches!(ctx.match_struct(&none), StructMatch::NoMatch));
    }
}
