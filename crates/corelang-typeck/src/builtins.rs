//! Built-in operator type schemes.
//!
//! Operators are not looked up in the environment by name -- there is no
//! surface syntax left to shadow them by the time a program reaches this
//! crate -- so they are resolved directly from [`UnaryOp`]/[`BinOp`]
//! rather than routed through [`crate::env::Env`]. Polymorphic schemes
//! (equality, dereference) use a fixed sentinel `TyVar` reserved for
//! scheme construction; it is never seen by [`crate::context::Context`]'s
//! own fresh-variable counter, so there is no risk of collision --
//! [`crate::context::Context::instantiate`] only ever remaps a scheme's
//! own quantifier list.

use crate::ast::{BinOp, UnaryOp};
use crate::ty::{MonoTy, PolyTy, TyVar};

const EQ_VAR: TyVar = TyVar(u32::MAX);
const DEREF_VAR: TyVar = TyVar(u32::MAX - 1);

/// `(op, operand) -> result`, as a scheme to instantiate per use.
pub fn unary_op_scheme(op: UnaryOp) -> PolyTy {
    match op {
        UnaryOp::Neg => PolyTy::mono(MonoTy::Fn(vec![MonoTy::u32_ty()], Box::new(MonoTy::u32_ty()))),
        UnaryOp::Not => PolyTy::mono(MonoTy::Fn(vec![MonoTy::bool_ty()], Box::new(MonoTy::bool_ty()))),
        UnaryOp::Deref => {
            let a = MonoTy::Var(DEREF_VAR);
            PolyTy { quantified: vec![DEREF_VAR], body: MonoTy::Fn(vec![MonoTy::ptr(a.clone())], Box::new(a)) }
        }
    }
}

/// `(op, lhs, rhs) -> result`, as a scheme to instantiate per use.
///
/// `Eq`/`Neq` are polymorphic over `(a, a) -> bool`; arithmetic and shifts
/// are monomorphic over `u32`; logical operators are monomorphic over
/// `bool`.
pub fn bin_op_scheme(op: BinOp) -> PolyTy {
    match op {
        BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Shl | BinOp::Shr => {
            PolyTy::mono(MonoTy::Fn(vec![MonoTy::u32_ty(), MonoTy::u32_ty()], Box::new(MonoTy::u32_ty())))
        }
        BinOp::And | BinOp::Or => {
            PolyTy::mono(MonoTy::Fn(vec![MonoTy::bool_ty(), MonoTy::bool_ty()], Box::new(MonoTy::bool_ty())))
        }
        BinOp::Eq | BinOp::Neq => {
            let a = MonoTy::Var(EQ_VAR);
            PolyTy {
                quantified: vec![EQ_VAR],
                body: MonoTy::Fn(vec![a.clone(), a], Box::new(MonoTy::bool_ty())),
            }
        }
    }
}
