//! Type errors, with exact `Display` output.
//!
//! The strings produced by `Display` here are user-visible and part of
//! the contract: callers (tests, the REPL, an LSP) match on them, so
//! wording and punctuation must stay exactly as written. `diagnostics`
//! builds richer, span-annotated reports on top of these, but never
//! changes the contractual message itself.

use std::fmt;

use serde::Serialize;

use corelang_common::Span;

use crate::ty::{MonoTy, TyVar};

/// A type error encountered during inference.
#[derive(Debug, Clone, Serialize)]
pub enum TypeError {
    /// A variable was referenced that is bound in neither the environment
    /// nor the struct table.
    UnboundVariable { name: String, span: Span },
    /// Unifying a type variable with a type that contains it (infinite type).
    RecursiveType { var: TyVar, ty: MonoTy, span: Span },
    /// Two types that should be equal are not.
    Mismatch { expected: MonoTy, found: MonoTy, span: Span },
    /// A struct literal is missing a required (non-method) attribute.
    MissingAttribute { struct_name: String, attr: String, span: Span },
    /// A struct literal supplies an attribute the struct doesn't declare.
    ExtraneousAttribute { struct_name: String, attr: String, span: Span },
    /// An attribute access named an attribute the (named) struct lacks.
    NoSuchAttribute { struct_name: String, attr: String, span: Span },
    /// A struct literal or `impl` block names a struct that was never
    /// registered.
    UndeclaredStruct { name: String, span: Span },
    /// Structural matching (4.4) found zero registered structs consistent
    /// with an attribute-access row.
    NoStructMatch { partial: MonoTy, span: Span },
    /// `return` appeared outside of any function body.
    ReturnOutsideFunction { span: Span },
    /// An `impl` block named a type that was never registered as a struct.
    UnknownImplType { name: String, span: Span },
    /// An extern function's sealed signature still has free type
    /// variables after unification with its use sites, or conflicts with
    /// its declared type.
    ExternSignatureMismatch { name: String, span: Span },
    /// The attribute-access re-check loop (4.3/AttributeAccess step 5)
    /// exceeded [`crate::context::Limits::max_recheck_iterations`]. This
    /// indicates the structural-change guard itself is broken, not that
    /// the user's program is ill-typed -- it is never expected to fire.
    RecheckLimitExceeded { attr: String, span: Span },
}

impl TypeError {
    /// Attribute a pure [`crate::unify::UnifyError`] to the span of the
    /// expression whose inference triggered it.
    pub fn from_unify(err: crate::unify::UnifyError, span: Span) -> TypeError {
        use crate::unify::UnifyError;
        match err {
            UnifyError::Mismatch { expected, found } => TypeError::Mismatch { expected, found, span },
            UnifyError::RecursiveType { var, ty } => TypeError::RecursiveType { var, ty, span },
            UnifyError::NoSuchAttribute { struct_name, attr } => {
                TypeError::NoSuchAttribute { struct_name, attr, span }
            }
            UnifyError::UndeclaredStruct { name } => TypeError::UndeclaredStruct { name, span },
        }
    }

    pub fn span(&self) -> Span {
        match self {
            TypeError::UnboundVariable { span, .. }
            | TypeError::RecursiveType { span, .. }
            | TypeError::Mismatch { span, .. }
            | TypeError::MissingAttribute { span, .. }
            | TypeError::ExtraneousAttribute { span, .. }
            | TypeError::NoSuchAttribute { span, .. }
            | TypeError::UndeclaredStruct { span, .. }
            | TypeError::NoStructMatch { span, .. }
            | TypeError::ReturnOutsideFunction { span }
            | TypeError::UnknownImplType { span, .. }
            | TypeError::ExternSignatureMismatch { span, .. }
            | TypeError::RecheckLimitExceeded { span, .. } => *span,
        }
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeError::UnboundVariable { name, .. } => write!(f, "unbound variable: \"{name}\""),
            TypeError::RecursiveType { .. } => write!(f, "recursive type"),
            TypeError::Mismatch { expected, found, .. } => {
                write!(f, "type mismatch: expected {expected}, got {found}")
            }
            TypeError::MissingAttribute { struct_name, attr, .. } => {
                write!(f, "missing attribute \"{attr}\" for struct \"{struct_name}\"")
            }
            TypeError::ExtraneousAttribute { struct_name, attr, .. } => {
                write!(f, "extraneous attribute \"{attr}\" for struct \"{struct_name}\"")
            }
            TypeError::NoSuchAttribute { struct_name, attr, .. } => {
                write!(f, "attribute \"{attr}\" does not exist on struct \"{struct_name}\"")
            }
            TypeError::UndeclaredStruct { name, .. } => write!(f, "undeclared struct \"{name}\""),
            TypeError::NoStructMatch { partial, .. } => {
                write!(f, "no struct declaration matches type {partial}")
            }
            TypeError::ReturnOutsideFunction { .. } => {
                write!(f, "'return' used outside of a function")
            }
            TypeError::UnknownImplType { name, .. } => {
                write!(f, "cannot implement for unknown type \"{name}\"")
            }
            TypeError::ExternSignatureMismatch { name, .. } => {
                write!(f, "extern signature mismatch for \"{name}\"")
            }
            TypeError::RecheckLimitExceeded { attr, .. } => {
                write!(f, "internal error: attribute re-check limit exceeded for \"{attr}\"")
            }
        }
    }
}

impl std::error::Error for TypeError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn span() -> Span {
        Span::new(0, 1)
    }

    #[test]
    fn unbound_variable_message() {
        let err = TypeError::UnboundVariable { name: "foo".into(), span: span() };
        assert_eq!(err.to_string(), "unbound variable: \"foo\"");
    }

    #[test]
    fn mismatch_message_mirrors_constructor_printing() {
        let err = TypeError::Mismatch {
            expected: MonoTy::u32_ty(),
            found: MonoTy::bool_ty(),
            span: span(),
        };
        assert_eq!(err.to_string(), "type mismatch: expected u32, got bool");
    }

    #[test]
    fn return_outside_function_message() {
        let err = TypeError::ReturnOutsideFunction { span: span() };
        assert_eq!(err.to_string(), "'return' used outside of a function");
    }

    #[test]
    fn missing_and_extraneous_attribute_messages() {
        let missing = TypeError::MissingAttribute {
            struct_name: "Point".into(),
            attr: "y".into(),
            span: span(),
        };
        assert_eq!(missing.to_string(), "missing attribute \"y\" for struct \"Point\"");

        let extraneous = TypeError::ExtraneousAttribute {
            struct_name: "Point".into(),
            attr: "z".into(),
            span: span(),
        };
        assert_eq!(extraneous.to_string(), "extraneous attribute \"z\" for struct \"Point\"");
    }
}
