//! Shared infrastructure for the corelang front-end.
//!
//! Currently just source spans and line-index lookup. Kept as its own
//! crate (rather than folded into `corelang-typeck`) so that future
//! front-end phases -- a lexer, a parser -- can depend on the same span
//! representation without depending on the type checker.

pub mod span;

pub use span::{LineIndex, Span};
