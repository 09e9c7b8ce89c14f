//! The Core AST -- the sole input to this crate.
//!
//! Everything upstream of this (tokenizer, parser, surface-to-core
//! desugaring) is out of scope; by the time a [`Decl`] reaches this
//! crate, every syntactic `let x = fn args -> body` has already been
//! rewritten into [`ExprKind::LetRec`], every identifier has a stable
//! name, and every expression node has a fresh [`TyVar`] `tau` slot.
//!
//! Per the design note on mutable type slots: nodes do not hold a
//! mutable type cell. A node's inferred type is recovered after the
//! fact by applying the final substitution to its `tau`, keyed by
//! [`NodeId`] -- see [`crate::infer::resolve_node_types`].

use corelang_common::Span;

use crate::context::Context;
use crate::ty::{MonoTy, TyVar};

/// Identifies an expression node for post-inference type resolution.
/// Assigned once, at construction time, and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

/// A name reference: an identifier occurrence, either a binder (in a
/// parameter list, `let`, or `letRec`) or a use (`Var`). `tau` is this
/// occurrence's own type slot, unified with whatever type the binding
/// resolves to.
#[derive(Debug, Clone)]
pub struct NameRef {
    pub name: String,
    pub tau: TyVar,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
    Deref,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Shl,
    Shr,
    Eq,
    Neq,
    And,
    Or,
}

#[derive(Debug, Clone)]
pub enum ConstValue {
    Unit,
    Bool(bool),
    U8(u8),
    U32(u32),
    Char(char),
    Str(String),
}

#[derive(Debug, Clone)]
pub enum ArrayInit {
    List(Vec<Expr>),
    Repeat { value: Box<Expr>, len: u64 },
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub id: NodeId,
    pub tau: TyVar,
    pub span: Span,
    pub kind: ExprKind,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Const(ConstValue),
    Var(NameRef),
    Assignment { lhs: Box<Expr>, rhs: Box<Expr> },
    UnaryOp { op: UnaryOp, operand: Box<Expr> },
    BinOp { op: BinOp, lhs: Box<Expr>, rhs: Box<Expr> },
    Block { stmts: Vec<Expr>, last: Option<Box<Expr>> },
    LetIn { binder: NameRef, value: Box<Expr>, body: Box<Expr> },
    LetRec { binder: NameRef, params: Vec<NameRef>, func_body: Box<Expr>, rest: Box<Expr> },
    Func { params: Vec<NameRef>, body: Box<Expr> },
    App { callee: Box<Expr>, args: Vec<Expr> },
    If { cond: Box<Expr>, then_branch: Box<Expr>, else_branch: Box<Expr> },
    While { cond: Box<Expr>, body: Box<Expr> },
    Return(Option<Box<Expr>>),
    TypeAssertion { expr: Box<Expr>, original: MonoTy, asserted: MonoTy },
    Tuple(Vec<Expr>),
    Struct { name: String, attrs: Vec<(String, Expr)> },
    Array(ArrayInit),
    AttributeAccess { base: Box<Expr>, attr: String },
}

/// Top-level declaration variants (4.5/4.6).
#[derive(Debug, Clone)]
pub enum Decl {
    FuncDecl(FuncDecl),
    ExternFuncDecl(ExternFuncDecl),
    GlobalDecl(GlobalDecl),
    StructDecl(StructDeclAst),
    ImplDecl(ImplDecl),
}

#[derive(Debug, Clone)]
pub struct FuncDecl {
    pub name: NameRef,
    pub params: Vec<NameRef>,
    pub body: Expr,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ExternFuncDecl {
    pub name: NameRef,
    pub param_tys: Vec<MonoTy>,
    pub ret_ty: MonoTy,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct GlobalDecl {
    pub name: NameRef,
    pub init: Expr,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct StructFieldAst {
    pub name: String,
    pub ty: MonoTy,
}

#[derive(Debug, Clone)]
pub struct StructDeclAst {
    pub name: String,
    pub fields: Vec<StructFieldAst>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ImplFunc {
    pub name: String,
    /// Whether a `self` parameter, if `params[0]` is named `"self"`,
    /// was declared to mutate the receiver. Surface mutability syntax is
    /// out of scope for this crate, so by the time an `ImplFunc` reaches
    /// it this has already been decided upstream (4.5/ImplDecl).
    pub self_mutable: bool,
    pub params: Vec<NameRef>,
    pub body: Expr,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct ImplDecl {
    pub type_name: String,
    pub funcs: Vec<ImplFunc>,
    pub span: Span,
}

/// Convenience constructor used by tests and by any host that builds a
/// Core AST directly rather than through a parser+desugarer pipeline.
/// Every method allocates a fresh `tau` from the given [`Context`] and a
/// fresh [`NodeId`], matching the "all `tau` slots initialized to fresh
/// variables" input contract (6/"Input to the core").
pub struct AstBuilder<'a> {
    ctx: &'a mut Context,
    next_id: u32,
}

impl<'a> AstBuilder<'a> {
    pub fn new(ctx: &'a mut Context) -> Self {
        AstBuilder { ctx, next_id: 0 }
    }

    fn node_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn name(&mut self, name: impl Into<String>, span: Span) -> NameRef {
        NameRef { name: name.into(), tau: self.ctx.fresh_var(), span }
    }

    fn expr(&mut self, span: Span, kind: ExprKind) -> Expr {
        Expr { id: self.node_id(), tau: self.ctx.fresh_var(), span, kind }
    }

    pub fn unit(&mut self, span: Span) -> Expr {
        self.expr(span, ExprKind::Const(ConstValue::Unit))
    }

    pub fn bool_lit(&mut self, v: bool, span: Span) -> Expr {
        self.expr(span, ExprKind::Const(ConstValue::Bool(v)))
    }

    pub fn u32_lit(&mut self, v: u32, span: Span) -> Expr {
        self.expr(span, ExprKind::Const(ConstValue::U32(v)))
    }

    pub fn str_lit(&mut self, v: impl Into<String>, span: Span) -> Expr {
        self.expr(span, ExprKind::Const(ConstValue::Str(v.into())))
    }

    pub fn var(&mut self, name: impl Into<String>, span: Span) -> Expr {
        let name_ref = self.name(name, span);
        self.expr(span, ExprKind::Var(name_ref))
    }

    pub fn assign(&mut self, lhs: Expr, rhs: Expr, span: Span) -> Expr {
        self.expr(span, ExprKind::Assignment { lhs: Box::new(lhs), rhs: Box::new(rhs) })
    }

    pub fn unary(&mut self, op: UnaryOp, operand: Expr, span: Span) -> Expr {
        self.expr(span, ExprKind::UnaryOp { op, operand: Box::new(operand) })
    }

    pub fn binop(&mut self, op: BinOp, lhs: Expr, rhs: Expr, span: Span) -> Expr {
        self.expr(span, ExprKind::BinOp { op, lhs: Box::new(lhs), rhs: Box::new(rhs) })
    }

    pub fn block(&mut self, stmts: Vec<Expr>, last: Option<Expr>, span: Span) -> Expr {
        self.expr(span, ExprKind::Block { stmts, last: last.map(Box::new) })
    }

    pub fn let_in(&mut self, binder: NameRef, value: Expr, body: Expr, span: Span) -> Expr {
        self.expr(span, ExprKind::LetIn { binder, value: Box::new(value), body: Box::new(body) })
    }

    pub fn let_rec(
        &mut self,
        binder: NameRef,
        params: Vec<NameRef>,
        func_body: Expr,
        rest: Expr,
        span: Span,
    ) -> Expr {
        self.expr(
            span,
            ExprKind::LetRec {
                binder,
                params,
                func_body: Box::new(func_body),
                rest: Box::new(rest),
            },
        )
    }

    pub fn func(&mut self, params: Vec<NameRef>, body: Expr, span: Span) -> Expr {
        self.expr(span, ExprKind::Func { params, body: Box::new(body) })
    }

    pub fn app(&mut self, callee: Expr, args: Vec<Expr>, span: Span) -> Expr {
        self.expr(span, ExprKind::App { callee: Box::new(callee), args })
    }

    pub fn if_expr(&mut self, cond: Expr, then_branch: Expr, else_branch: Expr, span: Span) -> Expr {
        self.expr(
            span,
            ExprKind::If {
                cond: Box::new(cond),
                then_branch: Box::new(then_branch),
                else_branch: Box::new(else_branch),
            },
        )
    }

    pub fn while_expr(&mut self, cond: Expr, body: Expr, span: Span) -> Expr {
        self.expr(span, ExprKind::While { cond: Box::new(cond), body: Box::new(body) })
    }

    pub fn return_expr(&mut self, value: Option<Expr>, span: Span) -> Expr {
        self.expr(span, ExprKind::Return(value.map(Box::new)))
    }

    pub fn type_assertion(&mut self, expr: Expr, original: MonoTy, asserted: MonoTy, span: Span) -> Expr {
        self.expr(span, ExprKind::TypeAssertion { expr: Box::new(expr), original, asserted })
    }

    pub fn tuple(&mut self, elems: Vec<Expr>, span: Span) -> Expr {
        self.expr(span, ExprKind::Tuple(elems))
    }

    pub fn struct_lit(&mut self, name: impl Into<String>, attrs: Vec<(String, Expr)>, span: Span) -> Expr {
        self.expr(span, ExprKind::Struct { name: name.into(), attrs })
    }

    pub fn array(&mut self, elems: Vec<Expr>, span: Span) -> Expr {
        self.expr(span, ExprKind::Array(ArrayInit::List(elems)))
    }

    pub fn array_repeat(&mut self, value: Expr, len: u64, span: Span) -> Expr {
        self.expr(span, ExprKind::Array(ArrayInit::Repeat { value: Box::new(value), len }))
    }

    pub fn attr_access(&mut self, base: Expr, attr: impl Into<String>, span: Span) -> Expr {
        self.expr(span, ExprKind::AttributeAccess { base: Box::new(base), attr: attr.into() })
    }

    pub fn impl_func(
        &mut self,
        name: impl Into<String>,
        self_mutable: bool,
        params: Vec<NameRef>,
        body: Expr,
        span: Span,
    ) -> ImplFunc {
        ImplFunc { name: name.into(), self_mutable, params, body, span }
    }
}
