//! Hindley-Milner type inference for the core language.
//!
//! This crate implements type checking and inference over an
//! already-desugared Core AST: let-polymorphism, recursive function
//! bindings, struct declarations with `impl` methods and static
//! functions, extern function signatures, and structural attribute
//! access resolved against the struct table.
//!
//! # Architecture
//!
//! - [`ty`]: Core type representation (`MonoTy`, `TyVar`, `Row`, `PolyTy`)
//! - [`subst`]: Explicit substitutions and their composition algebra
//! - [`unify`]: The unification relation, plus structural struct matching
//! - [`env`]: The typing environment and generalization
//! - [`context`]: Fresh-variable allocation, the struct table, the
//!   function-return stack
//! - [`ast`]: The Core AST this crate consumes
//! - [`builtins`]: Operator type schemes
//! - [`error`]: Type errors, with exact `Display` output
//! - [`infer`]: The inference judgments and declaration registration
//! - [`diagnostics`]: Ariadne-based rendering of [`error::TypeError`]

pub mod ast;
pub mod builtins;
pub mod context;
pub mod diagnostics;
pub mod env;
pub mod error;
pub mod infer;
pub mod subst;
pub mod ty;
pub mod unify;

pub use context::{Context, Limits};
pub use env::Env;
pub use error::TypeError;
pub use infer::{infer_program, resolve_node_types};
pub use subst::Subst;
pub use ty::{MonoTy, PolyTy, TyVar};
