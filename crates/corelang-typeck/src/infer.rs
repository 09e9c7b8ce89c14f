//! The inference core: `infer`/`inferWith` over every expression variant,
//! declaration registration, and the top-level entry point.
//!
//! Every function here returns a [`Subst`] (or a pair threading an
//! [`Env`] alongside it) rather than mutating shared state -- composition
//! discipline is the caller's responsibility throughout, matching
//! `subst.rs`'s contract.

use std::collections::HashSet;

use rustc_hash::FxHashMap;

use corelang_common::Span;

use crate::ast::{
    ArrayInit, BinOp, ConstValue, Decl, Expr, ExprKind, ExternFuncDecl, FuncDecl, GlobalDecl,
    ImplDecl, NameRef, NodeId, UnaryOp,
};
use crate::builtins;
use crate::context::{AnyMember, Attribute, Context, StructDecl};
use crate::env::{generalize, Env};
use crate::error::TypeError;
use crate::subst::Subst;
use crate::ty::{MonoTy, PolyTy, Row, StructTy};
use crate::unify::StructMatch;

fn const_ty(c: &ConstValue) -> MonoTy {
    match c {
        ConstValue::Unit => MonoTy::unit(),
        ConstValue::Bool(_) => MonoTy::bool_ty(),
        ConstValue::U8(_) => MonoTy::u8_ty(),
        ConstValue::U32(_) => MonoTy::u32_ty(),
        ConstValue::Char(_) => MonoTy::char_ty(),
        ConstValue::Str(_) => MonoTy::string_ty(),
    }
}

/// `infer(Gamma, e) -> sigma`: `apply(sigma, tauOf(e))` is `e`'s inferred
/// type under `apply(sigma, Gamma)`.
pub fn infer(ctx: &mut Context, env: &Env, expr: &Expr) -> Result<Subst, TypeError> {
    match &expr.kind {
        ExprKind::Const(c) => {
            let declared = ctx.instantiate(&PolyTy::mono(const_ty(c)));
            ctx.unify(MonoTy::Var(expr.tau), declared).map_err(|e| TypeError::from_unify(e, expr.span))
        }

        ExprKind::Var(name_ref) => infer_var(ctx, env, expr, name_ref),

        ExprKind::Assignment { lhs, rhs } => {
            let s1 = infer(ctx, env, rhs)?;
            let env1 = s1.apply_to_env(env);
            let rhs_ty = s1.apply(&MonoTy::Var(rhs.tau));
            // Open question (a): the LHS is inferred with an expected
            // type equal to the RHS's post-substitution type, rather
            // than inferred independently and then unified.
            let s2 = infer_with(ctx, &env1, lhs, &rhs_ty)?;
            let subst = Subst::compose(&s2, &s1);
            let seal = ctx
                .unify(subst.apply(&MonoTy::Var(expr.tau)), MonoTy::unit())
                .map_err(|e| TypeError::from_unify(e, expr.span))?;
            Ok(Subst::compose(&seal, &subst))
        }

        ExprKind::UnaryOp { op, operand } => {
            let s1 = infer(ctx, env, operand)?;
            let op_ty = ctx.instantiate(&builtins::unary_op_scheme(*op));
            let MonoTy::Fn(params, ret) = op_ty else {
                unreachable!("unary_op_scheme always produces a Fn type")
            };
            let operand_ty = s1.apply(&MonoTy::Var(operand.tau));
            let s2 = ctx
                .unify(operand_ty, params.into_iter().next().unwrap())
                .map_err(|e| TypeError::from_unify(e, operand.span))?;
            let subst = Subst::compose(&s2, &s1);
            let seal = ctx
                .unify(subst.apply(&MonoTy::Var(expr.tau)), subst.apply(&ret))
                .map_err(|e| TypeError::from_unify(e, expr.span))?;
            Ok(Subst::compose(&seal, &subst))
        }

        ExprKind::BinOp { op, lhs, rhs } => infer_binop(ctx, env, expr, *op, lhs, rhs),

        ExprKind::Block { stmts, last } => infer_block(ctx, env, expr, stmts, last.as_deref()),

        ExprKind::LetIn { binder, value, body } => infer_let_in(ctx, env, expr, binder, value, body),

        ExprKind::LetRec { binder, params, func_body, rest } => {
            infer_let_rec(ctx, env, expr, binder, params, func_body, rest)
        }

        ExprKind::Func { params, body } => {
            let pairs: Vec<(&NameRef, MonoTy)> =
                params.iter().map(|p| (p, MonoTy::Var(p.tau))).collect();
            let (subst, param_tys, body_ty) = infer_function_core(ctx, env, &pairs, body)?;
            let fn_ty = MonoTy::Fn(param_tys, Box::new(body_ty));
            let seal = ctx
                .unify(subst.apply(&MonoTy::Var(expr.tau)), fn_ty)
                .map_err(|e| TypeError::from_unify(e, expr.span))?;
            Ok(Subst::compose(&seal, &subst))
        }

        ExprKind::App { callee, args } => infer_app(ctx, env, expr, callee, args),

        ExprKind::If { cond, then_branch, else_branch } => {
            let s1 = infer_with(ctx, env, cond, &MonoTy::bool_ty())?;
            let env1 = s1.apply_to_env(env);
            let expected_then = s1.apply(&MonoTy::Var(expr.tau));
            let s2 = infer_with(ctx, &env1, then_branch, &expected_then)?;
            let subst = Subst::compose(&s2, &s1);
            let env2 = subst.apply_to_env(env);
            let expected_else = subst.apply(&MonoTy::Var(expr.tau));
            let s3 = infer_with(ctx, &env2, else_branch, &expected_else)?;
            Ok(Subst::compose(&s3, &subst))
        }

        ExprKind::While { cond, body } => {
            let s1 = infer_with(ctx, env, cond, &MonoTy::bool_ty())?;
            let env1 = s1.apply_to_env(env);
            let s2 = infer(ctx, &env1, body)?;
            let subst = Subst::compose(&s2, &s1);
            let seal = ctx
                .unify(subst.apply(&MonoTy::Var(expr.tau)), MonoTy::unit())
                .map_err(|e| TypeError::from_unify(e, expr.span))?;
            Ok(Subst::compose(&seal, &subst))
        }

        ExprKind::Return(value) => infer_return(ctx, env, expr, value.as_deref()),

        ExprKind::TypeAssertion { expr: inner, original, asserted } => {
            let s1 = infer_with(ctx, env, inner, original)?;
            let seal = ctx
                .unify(s1.apply(&MonoTy::Var(expr.tau)), s1.apply(asserted))
                .map_err(|e| TypeError::from_unify(e, expr.span))?;
            Ok(Subst::compose(&seal, &s1))
        }

        ExprKind::Tuple(elems) => {
            let (subst, elem_tys) = infer_seq(ctx, env, elems)?;
            let seal = ctx
                .unify(subst.apply(&MonoTy::Var(expr.tau)), MonoTy::Tuple(elem_tys))
                .map_err(|e| TypeError::from_unify(e, expr.span))?;
            Ok(Subst::compose(&seal, &subst))
        }

        ExprKind::Struct { name, attrs } => infer_struct_literal(ctx, env, expr, name, attrs),

        ExprKind::Array(init) => infer_array(ctx, env, expr, init),

        ExprKind::AttributeAccess { base, attr } => {
            infer_attribute_access(ctx, env, expr, base, attr, 0)
        }
    }
}

/// `inferWith(Gamma, e, tau) -> sigma`: `infer` followed by unifying the
/// (substituted) result against an expected type.
pub fn infer_with(ctx: &mut Context, env: &Env, expr: &Expr, expected: &MonoTy) -> Result<Subst, TypeError> {
    let s1 = infer(ctx, env, expr)?;
    let actual = s1.apply(&MonoTy::Var(expr.tau));
    let expected = s1.apply(expected);
    let s2 = ctx.unify(actual, expected).map_err(|e| TypeError::from_unify(e, expr.span))?;
    Ok(Subst::compose(&s2, &s1))
}

fn infer_var(ctx: &mut Context, env: &Env, expr: &Expr, name_ref: &NameRef) -> Result<Subst, TypeError> {
    if let Some(scheme) = env.lookup(&name_ref.name) {
        let scheme = scheme.clone();
        let instance = ctx.instantiate(&scheme);
        let s1 = ctx
            .unify(MonoTy::Var(expr.tau), instance.clone())
            .map_err(|e| TypeError::from_unify(e, expr.span))?;
        let s2 = ctx
            .unify(s1.apply(&MonoTy::Var(name_ref.tau)), s1.apply(&instance))
            .map_err(|e| TypeError::from_unify(e, name_ref.span))?;
        return Ok(Subst::compose(&s2, &s1));
    }

    if let Some(decl) = ctx.structs.lookup(&name_ref.name).cloned() {
        let tail = ctx.fresh_var();
        let mut row = Row::new(tail);
        for (static_name, scheme) in &decl.static_funcs {
            let ty = ctx.instantiate(scheme);
            row.insert(static_name.clone(), ty);
        }
        let partial = MonoTy::partial_struct(row);
        let s1 = ctx
            .unify(MonoTy::Var(expr.tau), partial.clone())
            .map_err(|e| TypeError::from_unify(e, expr.span))?;
        let s2 = ctx
            .unify(s1.apply(&MonoTy::Var(name_ref.tau)), s1.apply(&partial))
            .map_err(|e| TypeError::from_unify(e, name_ref.span))?;
        return Ok(Subst::compose(&s2, &s1));
    }

    Err(TypeError::UnboundVariable { name: name_ref.name.clone(), span: name_ref.span })
}

fn infer_binop(
    ctx: &mut Context,
    env: &Env,
    expr: &Expr,
    op: BinOp,
    lhs: &Expr,
    rhs: &Expr,
) -> Result<Subst, TypeError> {
    let s1 = infer(ctx, env, lhs)?;
    let env1 = s1.apply_to_env(env);
    let s2 = infer(ctx, &env1, rhs)?;
    let subst = Subst::compose(&s2, &s1);

    let op_ty = ctx.instantiate(&builtins::bin_op_scheme(op));
    let MonoTy::Fn(params, ret) = op_ty else { unreachable!("bin_op_scheme always produces a Fn type") };
    let [p_lhs, p_rhs] = <[MonoTy; 2]>::try_from(params).ok().expect("binary operator scheme has two params");

    let lhs_ty = subst.apply(&MonoTy::Var(lhs.tau));
    let rhs_ty = subst.apply(&MonoTy::Var(rhs.tau));
    let s3 = ctx.unify(lhs_ty, p_lhs).map_err(|e| TypeError::from_unify(e, lhs.span))?;
    let subst = Subst::compose(&s3, &subst);
    let rhs_ty = subst.apply(&rhs_ty);
    let s4 = ctx.unify(rhs_ty, subst.apply(&p_rhs)).map_err(|e| TypeError::from_unify(e, rhs.span))?;
    let subst = Subst::compose(&s4, &subst);

    let seal = ctx
        .unify(subst.apply(&MonoTy::Var(expr.tau)), subst.apply(&ret))
        .map_err(|e| TypeError::from_unify(e, expr.span))?;
    Ok(Subst::compose(&seal, &subst))
}

fn infer_block(
    ctx: &mut Context,
    env: &Env,
    expr: &Expr,
    stmts: &[Expr],
    last: Option<&Expr>,
) -> Result<Subst, TypeError> {
    let mut subst = Subst::empty();
    for stmt in stmts {
        let cur_env = subst.apply_to_env(env);
        let s = infer(ctx, &cur_env, stmt)?;
        subst = Subst::compose(&s, &subst);
    }
    match last {
        Some(tail) => {
            let cur_env = subst.apply_to_env(env);
            let s = infer(ctx, &cur_env, tail)?;
            subst = Subst::compose(&s, &subst);
            let seal = ctx
                .unify(subst.apply(&MonoTy::Var(expr.tau)), subst.apply(&MonoTy::Var(tail.tau)))
                .map_err(|e| TypeError::from_unify(e, expr.span))?;
            Ok(Subst::compose(&seal, &subst))
        }
        None => {
            let seal = ctx
                .unify(subst.apply(&MonoTy::Var(expr.tau)), MonoTy::unit())
                .map_err(|e| TypeError::from_unify(e, expr.span))?;
            Ok(Subst::compose(&seal, &subst))
        }
    }
}

fn infer_let_in(
    ctx: &mut Context,
    env: &Env,
    expr: &Expr,
    binder: &NameRef,
    value: &Expr,
    body: &Expr,
) -> Result<Subst, TypeError> {
    let s1 = infer(ctx, env, value)?;
    let env1 = s1.apply_to_env(env);
    let value_ty = s1.apply(&MonoTy::Var(value.tau));
    let scheme = generalize(&env1, &value_ty);

    let mut env2 = env1;
    env2.insert(binder.name.clone(), scheme);
    let s2 = infer_with(ctx, &env2, body, &MonoTy::Var(expr.tau))?;
    let mut subst = Subst::compose(&s2, &s1);

    let binder_ty = subst.apply(&value_ty);
    let seal = ctx
        .unify(subst.apply(&MonoTy::Var(binder.tau)), binder_ty)
        .map_err(|e| TypeError::from_unify(e, binder.span))?;
    subst = Subst::compose(&seal, &subst);
    Ok(subst)
}

fn infer_let_rec(
    ctx: &mut Context,
    env: &Env,
    expr: &Expr,
    binder: &NameRef,
    params: &[NameRef],
    func_body: &Expr,
    rest: &Expr,
) -> Result<Subst, TypeError> {
    let mut rec_env = env.clone();
    rec_env.insert(binder.name.clone(), PolyTy::mono(MonoTy::Var(binder.tau)));
    let pairs: Vec<(&NameRef, MonoTy)> = params.iter().map(|p| (p, MonoTy::Var(p.tau))).collect();
    let (subst, param_tys, body_ty) = infer_function_core(ctx, &rec_env, &pairs, func_body)?;

    let f_ty = MonoTy::Fn(param_tys, Box::new(body_ty));
    let seal = ctx
        .unify(subst.apply(&MonoTy::Var(binder.tau)), f_ty.clone())
        .map_err(|e| TypeError::from_unify(e, binder.span))?;
    let subst = Subst::compose(&seal, &subst);

    let outer_env = subst.apply_to_env(env);
    let scheme = generalize(&outer_env, &subst.apply(&f_ty));
    let mut env2 = outer_env;
    env2.insert(binder.name.clone(), scheme);

    let s2 = infer_with(ctx, &env2, rest, &MonoTy::Var(expr.tau))?;
    Ok(Subst::compose(&s2, &subst))
}

fn infer_app(ctx: &mut Context, env: &Env, expr: &Expr, callee: &Expr, args: &[Expr]) -> Result<Subst, TypeError> {
    let wanted = MonoTy::Fn(args.iter().map(|a| MonoTy::Var(a.tau)).collect(), Box::new(MonoTy::Var(expr.tau)));
    let mut subst = infer_with(ctx, env, callee, &wanted)?;
    for arg in args {
        let cur_env = subst.apply_to_env(env);
        let expected = subst.apply(&MonoTy::Var(arg.tau));
        let s = infer_with(ctx, &cur_env, arg, &expected)?;
        subst = Subst::compose(&s, &subst);
    }
    Ok(subst)
}

fn infer_return(ctx: &mut Context, env: &Env, expr: &Expr, value: Option<&Expr>) -> Result<Subst, TypeError> {
    let expected = ctx
        .current_return_type()
        .cloned()
        .ok_or(TypeError::ReturnOutsideFunction { span: expr.span })?;
    let subst = match value {
        Some(v) => infer_with(ctx, env, v, &expected)?,
        None => ctx.unify(expected, MonoTy::unit()).map_err(|e| TypeError::from_unify(e, expr.span))?,
    };
    let seal = ctx
        .unify(subst.apply(&MonoTy::Var(expr.tau)), MonoTy::unit())
        .map_err(|e| TypeError::from_unify(e, expr.span))?;
    Ok(Subst::compose(&seal, &subst))
}

fn infer_seq(ctx: &mut Context, env: &Env, exprs: &[Expr]) -> Result<(Subst, Vec<MonoTy>), TypeError> {
    let mut subst = Subst::empty();
    for e in exprs {
        let cur_env = subst.apply_to_env(env);
        let s = infer(ctx, &cur_env, e)?;
        subst = Subst::compose(&s, &subst);
    }
    let tys = exprs.iter().map(|e| subst.apply(&MonoTy::Var(e.tau))).collect();
    Ok((subst, tys))
}

fn infer_struct_literal(
    ctx: &mut Context,
    env: &Env,
    expr: &Expr,
    name: &str,
    attrs: &[(String, Expr)],
) -> Result<Subst, TypeError> {
    let decl = ctx
        .structs
        .lookup(name)
        .cloned()
        .ok_or_else(|| TypeError::UndeclaredStruct { name: name.to_string(), span: expr.span })?;

    let mut subst = Subst::empty();
    let mut provided = HashSet::new();
    for (attr_name, value) in attrs {
        provided.insert(attr_name.as_str());
        let field = decl.fields().find(|a| a.name == *attr_name).ok_or_else(|| {
            TypeError::ExtraneousAttribute {
                struct_name: name.to_string(),
                attr: attr_name.clone(),
                span: value.span,
            }
        })?;
        let declared = ctx.instantiate(&field.ty.clone());
        let cur_env = subst.apply_to_env(env);
        let expected = subst.apply(&declared);
        let s = infer_with(ctx, &cur_env, value, &expected)?;
        subst = Subst::compose(&s, &subst);
    }

    for field in decl.fields() {
        if !provided.contains(field.name.as_str()) {
            return Err(TypeError::MissingAttribute {
                struct_name: name.to_string(),
                attr: field.name.clone(),
                span: expr.span,
            });
        }
    }

    let seal = ctx
        .unify(subst.apply(&MonoTy::Var(expr.tau)), MonoTy::named_struct(name))
        .map_err(|e| TypeError::from_unify(e, expr.span))?;
    Ok(Subst::compose(&seal, &subst))
}

fn infer_array(ctx: &mut Context, env: &Env, expr: &Expr, init: &ArrayInit) -> Result<Subst, TypeError> {
    let alpha = ctx.fresh_ty();
    match init {
        ArrayInit::List(elems) => {
            let mut subst = Subst::empty();
            for el in elems {
                let cur_env = subst.apply_to_env(env);
                let expected = subst.apply(&alpha);
                let s = infer_with(ctx, &cur_env, el, &expected)?;
                subst = Subst::compose(&s, &subst);
            }
            let elem_ty = subst.apply(&alpha);
            let seal = ctx
                .unify(subst.apply(&MonoTy::Var(expr.tau)), MonoTy::Array(Box::new(elem_ty), elems.len() as u64))
                .map_err(|e| TypeError::from_unify(e, expr.span))?;
            Ok(Subst::compose(&seal, &subst))
        }
        ArrayInit::Repeat { value, len } => {
            let s1 = infer_with(ctx, env, value, &alpha)?;
            let elem_ty = s1.apply(&alpha);
            let seal = ctx
                .unify(s1.apply(&MonoTy::Var(expr.tau)), MonoTy::Array(Box::new(elem_ty), *len))
                .map_err(|e| TypeError::from_unify(e, expr.span))?;
            Ok(Subst::compose(&seal, &s1))
        }
    }
}

/// The most intricate judgment (4.3/AttributeAccess): resolve `base.attr`
/// against a named struct, an already-extended partial row, or -- most
/// commonly -- by extending the row and consulting structural matching,
/// re-checking at most once (guarded by a structural change, backstopped
/// by `depth` against `Limits::max_recheck_iterations`).
fn infer_attribute_access(
    ctx: &mut Context,
    env: &Env,
    expr: &Expr,
    base: &Expr,
    attr: &str,
    depth: u32,
) -> Result<Subst, TypeError> {
    if depth > ctx.limits.max_recheck_iterations {
        return Err(TypeError::RecheckLimitExceeded { attr: attr.to_string(), span: expr.span });
    }

    let s1 = infer(ctx, env, base)?;
    let lhs_ty = s1.apply(&MonoTy::Var(base.tau));

    if let MonoTy::Struct(StructTy::NamedStruct(struct_name)) = &lhs_ty {
        let decl = ctx
            .structs
            .lookup(struct_name)
            .cloned()
            .ok_or_else(|| TypeError::UndeclaredStruct { name: struct_name.clone(), span: expr.span })?;
        let member_scheme = match decl.lookup_any(attr) {
            Some(AnyMember::Attribute(a)) => a.ty.clone(),
            Some(AnyMember::Static(s)) => s.clone(),
            None => {
                return Err(TypeError::NoSuchAttribute {
                    struct_name: struct_name.clone(),
                    attr: attr.to_string(),
                    span: expr.span,
                })
            }
        };
        let instantiated = ctx.instantiate(&member_scheme);
        let s2 = ctx
            .unify(s1.apply(&MonoTy::Var(expr.tau)), instantiated)
            .map_err(|e| TypeError::from_unify(e, expr.span))?;
        return Ok(Subst::compose(&s2, &s1));
    }

    if let MonoTy::Struct(StructTy::PartialStruct(row)) = &lhs_ty {
        if let Some(bound) = row.get(attr) {
            let s2 = ctx
                .unify(s1.apply(&MonoTy::Var(expr.tau)), bound.clone())
                .map_err(|e| TypeError::from_unify(e, expr.span))?;
            return Ok(Subst::compose(&s2, &s1));
        }
    }

    let (tail, mut base_attrs) = match &lhs_ty {
        MonoTy::Struct(StructTy::PartialStruct(row)) => (row.tail, row.attrs.clone()),
        MonoTy::Var(v) => (*v, Vec::new()),
        other => return Err(TypeError::NoStructMatch { partial: other.clone(), span: expr.span }),
    };
    base_attrs.push((attr.to_string(), MonoTy::Var(expr.tau)));
    let extended_row = Row { attrs: base_attrs, tail };

    let re_check = |ctx: &mut Context, sealed_ty: MonoTy, s1: &Subst| -> Result<Subst, TypeError> {
        let s2 = ctx.unify(lhs_ty.clone(), sealed_ty).map_err(|e| TypeError::from_unify(e, expr.span))?;
        let subst = Subst::compose(&s2, s1);
        let new_lhs = subst.apply(&MonoTy::Var(base.tau));
        if new_lhs != lhs_ty {
            let env2 = subst.apply_to_env(env);
            let s3 = infer_attribute_access(ctx, &env2, expr, base, attr, depth + 1)?;
            Ok(Subst::compose(&s3, &subst))
        } else {
            Ok(subst)
        }
    };

    match ctx.match_struct(&extended_row) {
        StructMatch::OneMatch(struct_name) => re_check(ctx, MonoTy::named_struct(struct_name), &s1),
        StructMatch::MultipleMatches(_) => re_check(ctx, MonoTy::partial_struct(extended_row), &s1),
        StructMatch::NoMatch => match &lhs_ty {
            MonoTy::Var(_) => {
                let s2 = ctx
                    .unify(lhs_ty.clone(), MonoTy::partial_struct(extended_row))
                    .map_err(|e| TypeError::from_unify(e, expr.span))?;
                Ok(Subst::compose(&s2, &s1))
            }
            _ => Err(TypeError::NoStructMatch { partial: lhs_ty.clone(), span: expr.span }),
        },
    }
}

/// Shared core of every function-shaped inference (top-level `fn`
/// declarations, `Func` expressions, `LetRec` bodies, and `impl`
/// methods/statics): bind each parameter monomorphically to the type
/// given (ordinarily a fresh `Var(p.tau)`, but `NamedStruct(T)` for a
/// method's `self`), push the return-type stack, infer the body, pop,
/// then seal each parameter's own `tau` slot to its final type.
fn infer_function_core(
    ctx: &mut Context,
    env: &Env,
    params: &[(&NameRef, MonoTy)],
    body: &Expr,
) -> Result<(Subst, Vec<MonoTy>, MonoTy), TypeError> {
    let mut fn_env = env.clone();
    for (p, ty) in params {
        fn_env.insert(p.name.clone(), PolyTy::mono(ty.clone()));
    }

    ctx.push_return_type(MonoTy::Var(body.tau));
    let mut subst = match infer(ctx, &fn_env, body) {
        Ok(s) => {
            ctx.pop_return_type();
            s
        }
        Err(e) => return Err(e),
    };

    for (p, ty) in params {
        let seal = ctx
            .unify(subst.apply(&MonoTy::Var(p.tau)), subst.apply(ty))
            .map_err(|e| TypeError::from_unify(e, p.span))?;
        subst = Subst::compose(&seal, &subst);
    }

    let param_tys = params.iter().map(|(p, _)| subst.apply(&MonoTy::Var(p.tau))).collect();
    let body_ty = subst.apply(&MonoTy::Var(body.tau));
    Ok((subst, param_tys, body_ty))
}

/// `registerDecl(Gamma, d) -> (Gamma', sigma)` for a function-shaped
/// declaration: infer it under monomorphic parameter bindings, then
/// generalize and bind `name` to the resulting scheme. Returns the
/// scheme too, since `impl` registration needs it for the struct table
/// as well as the environment.
fn register_function_decl(
    ctx: &mut Context,
    env: &Env,
    name: &NameRef,
    params: &[(&NameRef, MonoTy)],
    body: &Expr,
    span: Span,
) -> Result<(Env, Subst, PolyTy), TypeError> {
    // Bound monomorphically for the duration of the body, exactly like
    // `LetRec`'s binder -- a top-level (or impl) function can always call
    // itself recursively.
    let mut rec_env = env.clone();
    rec_env.insert(name.name.clone(), PolyTy::mono(MonoTy::Var(name.tau)));

    let (subst, param_tys, body_ty) = infer_function_core(ctx, &rec_env, params, body)?;
    let fn_ty = MonoTy::Fn(param_tys, Box::new(body_ty));
    let seal = ctx.unify(subst.apply(&MonoTy::Var(name.tau)), fn_ty.clone()).map_err(|e| TypeError::from_unify(e, span))?;
    let subst = Subst::compose(&seal, &subst);

    let final_env = subst.apply_to_env(env);
    let scheme = generalize(&final_env, &subst.apply(&fn_ty));
    let mut out_env = final_env;
    out_env.insert(name.name.clone(), scheme.clone());
    Ok((out_env, subst, scheme))
}

fn register_func_decl(ctx: &mut Context, env: &Env, decl: &FuncDecl) -> Result<(Env, Subst), TypeError> {
    let pairs: Vec<(&NameRef, MonoTy)> = decl.params.iter().map(|p| (p, MonoTy::Var(p.tau))).collect();
    let (env, subst, _) = register_function_decl(ctx, env, &decl.name, &pairs, &decl.body, decl.span)?;
    Ok((env, subst))
}

fn register_extern_decl(ctx: &mut Context, env: &Env, decl: &ExternFuncDecl) -> Result<(Env, Subst), TypeError> {
    let declared_fn = MonoTy::Fn(decl.param_tys.clone(), Box::new(decl.ret_ty.clone()));
    let mut free = Vec::new();
    declared_fn.free_vars(&mut free);
    if !free.is_empty() {
        return Err(TypeError::ExternSignatureMismatch { name: decl.name.name.clone(), span: decl.span });
    }
    let s = ctx
        .unify(MonoTy::Var(decl.name.tau), declared_fn.clone())
        .map_err(|e| TypeError::from_unify(e, decl.span))?;
    let mut out_env = s.apply_to_env(env);
    out_env.insert(decl.name.name.clone(), PolyTy::mono(declared_fn));
    Ok((out_env, s))
}

fn register_global_decl(ctx: &mut Context, env: &Env, decl: &GlobalDecl) -> Result<(Env, Subst), TypeError> {
    let s = infer_with(ctx, env, &decl.init, &MonoTy::Var(decl.name.tau))?;
    let ty = s.apply(&MonoTy::Var(decl.name.tau));
    let mut out_env = s.apply_to_env(env);
    out_env.insert(decl.name.name.clone(), PolyTy::mono(ty));
    Ok((out_env, s))
}

fn register_impl_decl(ctx: &mut Context, env: &Env, decl: &ImplDecl) -> Result<(Env, Subst), TypeError> {
    if !ctx.structs.contains(&decl.type_name) {
        return Err(TypeError::UnknownImplType { name: decl.type_name.clone(), span: decl.span });
    }

    let mut cur_env = env.clone();
    let mut subst = Subst::empty();

    for f in &decl.funcs {
        let codegen_name = format!("{}_{}", decl.type_name, f.name);
        let is_method = f.params.first().map(|p| p.name == "self").unwrap_or(false);

        let mut params = f.params.clone();
        let self_param = if is_method { Some(params.remove(0)) } else { None };

        let mut pairs: Vec<(&NameRef, MonoTy)> = Vec::with_capacity(params.len() + 1);
        if let Some(self_ref) = &self_param {
            pairs.push((self_ref, MonoTy::named_struct(decl.type_name.clone())));
        }
        pairs.extend(params.iter().map(|p| (p, MonoTy::Var(p.tau))));

        let fn_name = NameRef { name: codegen_name.clone(), tau: ctx.fresh_var(), span: f.span };
        let (new_env, s, scheme) =
            register_function_decl(ctx, &cur_env, &fn_name, &pairs, &f.body, f.span)?;
        cur_env = new_env;
        subst = Subst::compose(&s, &subst);

        // Reachable only via the struct from here on.
        cur_env.remove(&codegen_name);

        let struct_decl: &mut StructDecl =
            ctx.structs.lookup_mut(&decl.type_name).expect("checked above");
        if self_param.is_some() {
            struct_decl.attributes.push(Attribute {
                name: f.name.clone(),
                ty: scheme,
                method: Some(crate::context::MethodInfo {
                    func_name: codegen_name.clone(),
                    self_mutable: f.self_mutable,
                }),
            });
        } else {
            struct_decl.static_funcs.push((f.name.clone(), scheme));
        }
    }

    Ok((cur_env, subst))
}

fn register_decl(ctx: &mut Context, env: &Env, decl: &Decl) -> Result<(Env, Subst), TypeError> {
    match decl {
        Decl::FuncDecl(d) => register_func_decl(ctx, env, d),
        Decl::ExternFuncDecl(d) => register_extern_decl(ctx, env, d),
        Decl::GlobalDecl(d) => register_global_decl(ctx, env, d),
        Decl::StructDecl(_) => Ok((env.clone(), Subst::empty())),
        Decl::ImplDecl(d) => register_impl_decl(ctx, env, d),
    }
}

/// `infer(program)`: the single public entry point. Resets the
/// function-return stack, pre-registers every struct declaration (so
/// structs are visible regardless of declaration order), then folds
/// `registerDecl` left to right.
pub fn infer_program(ctx: &mut Context, decls: &[Decl]) -> Result<(Env, Subst), TypeError> {
    ctx.reset_return_stack();

    for decl in decls {
        if let Decl::StructDecl(s) = decl {
            let mut sd = StructDecl::new(s.name.clone());
            for field in &s.fields {
                sd.attributes.push(Attribute {
                    name: field.name.clone(),
                    ty: PolyTy::mono(field.ty.clone()),
                    method: None,
                });
            }
            ctx.structs.register(sd);
        }
    }

    let mut env = Env::new();
    let mut subst = Subst::empty();
    for decl in decls {
        let (new_env, s) = register_decl(ctx, &env, decl)?;
        env = new_env;
        subst = Subst::compose(&s, &subst);
    }
    Ok((env, subst))
}

/// Recover every expression node's final, substituted type, keyed by
/// [`NodeId`] -- the out-of-band counterpart to the source's mutable
/// type-slot pattern (see the design note on `ast.rs`).
pub fn resolve_node_types(subst: &Subst, decls: &[Decl]) -> FxHashMap<NodeId, MonoTy> {
    let mut out = FxHashMap::default();
    for decl in decls {
        match decl {
            Decl::FuncDecl(f) => collect_expr_types(subst, &f.body, &mut out),
            Decl::ExternFuncDecl(_) => {}
            Decl::GlobalDecl(g) => collect_expr_types(subst, &g.init, &mut out),
            Decl::StructDecl(_) => {}
            Decl::ImplDecl(i) => {
                for f in &i.funcs {
                    collect_expr_types(subst, &f.body, &mut out);
                }
            }
        }
    }
    out
}

fn collect_expr_types(subst: &Subst, expr: &Expr, out: &mut FxHashMap<NodeId, MonoTy>) {
    out.insert(expr.id, subst.apply(&MonoTy::Var(expr.tau)));
    match &expr.kind {
        ExprKind::Const(_) | ExprKind::Var(_) | ExprKind::Return(None) => {}
        ExprKind::Assignment { lhs, rhs } | ExprKind::BinOp { lhs, rhs, .. } => {
            collect_expr_types(subst, lhs, out);
            collect_expr_types(subst, rhs, out);
        }
        ExprKind::UnaryOp { operand, .. } => collect_expr_types(subst, operand, out),
        ExprKind::Block { stmts, last } => {
            for s in stmts {
                collect_expr_types(subst, s, out);
            }
            if let Some(l) = last {
                collect_expr_types(subst, l, out);
            }
        }
        ExprKind::LetIn { value, body, .. } => {
            collect_expr_types(subst, value, out);
            collect_expr_types(subst, body, out);
        }
        ExprKind::LetRec { func_body, rest, .. } => {
            collect_expr_types(subst, func_body, out);
            collect_expr_types(subst, rest, out);
        }
        ExprKind::Func { body, .. } => collect_expr_types(subst, body, out),
        ExprKind::App { callee, args } => {
            collect_expr_types(subst, callee, out);
            for a in args {
                collect_expr_types(subst, a, out);
            }
        }
        ExprKind::If { cond, then_branch, else_branch } => {
            collect_expr_types(subst, cond, out);
            collect_expr_types(subst, then_branch, out);
            collect_expr_types(subst, else_branch, out);
        }
        ExprKind::While { cond, body } => {
            collect_expr_types(subst, cond, out);
            collect_expr_types(subst, body, out);
        }
        ExprKind::Return(Some(v)) => collect_expr_types(subst, v, out),
        ExprKind::TypeAssertion { expr: inner, .. } => collect_expr_types(subst, inner, out),
        ExprKind::Tuple(elems) => {
            for e in elems {
                collect_expr_types(subst, e, out);
            }
        }
        ExprKind::Struct { attrs, .. } => {
            for (_, v) in attrs {
                collect_expr_types(subst, v, out);
            }
        }
        ExprKind::Array(ArrayInit::List(elems)) => {
            for e in elems {
                collect_expr_types(subst, e, out);
            }
        }
        ExprKind::Array(ArrayInit::Repeat { value, .. }) => collect_expr_types(subst, value, out),
        ExprKind::AttributeAccess { base, .. } => collect_expr_types(subst, base, out),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::AstBuilder;
    use corelang_common::Span;

    fn sp() -> Span {
        Span::new(0, 1)
    }

    #[test]
    fn identity_function_generalizes_and_applies_at_two_types() {
        let mut ctx = Context::new();
        let mut b = AstBuilder::new(&mut ctx);

        let func_body = b.var("x", sp());
        let rest_true = b.bool_lit(true, sp());
        let rest_one = b.u32_lit(1, sp());

        let id_ref_true = b.var("id", sp());
        let id_app_true = b.app(id_ref_true, vec![rest_true], sp());
        let id_ref_one = b.var("id", sp());
        let id_app_one = b.app(id_ref_one, vec![rest_one], sp());
        let tuple = b.tuple(vec![id_app_true, id_app_one], sp());

        let let_expr = b.let_rec(
            b.name("id", sp()),
            vec![b.name("x", sp())],
            func_body,
            tuple,
            sp(),
        );

        let env = Env::new();
        let subst = infer(&mut ctx, &env, &let_expr).expect("program should type-check");
        match subst.apply(&MonoTy::Var(let_expr.tau)) {
            MonoTy::Tuple(elems) => {
                assert_eq!(elems[0], MonoTy::bool_ty());
                assert_eq!(elems[1], MonoTy::u32_ty());
            }
            other => panic!("expected tuple type, got {other:?}"),
        }
    }

    #[test]
    fn return_outside_function_fails() {
        let mut ctx = Context::new();
        let mut b = AstBuilder::new(&mut ctx);
        let ret = b.return_expr(None, sp());
        let env = Env::new();
        let err = infer(&mut ctx, &env, &ret).unwrap_err();
        assert!(matches!(err, TypeError::ReturnOutsideFunction { .. }));
    }

    #[test]
    fn array_literal_element_mismatch_fails() {
        let mut ctx = Context::new();
        let mut b = AstBuilder::new(&mut ctx);
        let elems = vec![b.u32_lit(1, sp()), b.bool_lit(true, sp())];
        let arr = b.array(elems, sp());
        let env = Env::new();
        let err = infer(&mut ctx, &env, &arr).unwrap_err();
        assert!(matches!(err, TypeError::Mismatch { .. }));
    }

    #[test]
    fn struct_literal_and_attribute_access() {
        let mut ctx = Context::new();
        let mut decl = StructDecl::new("Point");
        decl.attributes.push(Attribute { name: "x".into(), ty: PolyTy::mono(MonoTy::u32_ty()), method: None });
        decl.attributes.push(Attribute { name: "y".into(), ty: PolyTy::mono(MonoTy::u32_ty()), method: None });
        ctx.structs.register(decl);

        let mut b = AstBuilder::new(&mut ctx);
        let x_val = b.u32_lit(1, sp());
        let y_val = b.u32_lit(2, sp());
        let literal = b.struct_lit("Point", vec![("x".into(), x_val), ("y".into(), y_val)], sp());
        let access = b.attr_access(literal, "x", sp());

        let env = Env::new();
        let subst = infer(&mut ctx, &env, &access).expect("should type-check");
        assert_eq!(subst.apply(&MonoTy::Var(access.tau)), MonoTy::u32_ty());
    }

    #[test]
    fn missing_struct_attribute_fails() {
        let mut ctx = Context::new();
        let mut decl = StructDecl::new("Point");
        decl.attributes.push(Attribute { name: "x".into(), ty: PolyTy::mono(MonoTy::u32_ty()), method: None });
        ctx.structs.register(decl);

        let mut b = AstBuilder::new(&mut ctx);
        let literal = b.struct_lit("Point", vec![], sp());
        let env = Env::new();
        let err = infer(&mut ctx, &env, &literal).unwrap_err();
        assert!(matches!(err, TypeError::MissingAttribute { .. }));
    }
}
