//! Integration tests for let-polymorphism and recursive function
//! inference over hand-built Core AST programs.

use corelang_common::Span;
use corelang_typeck::ast::{AstBuilder, Decl, FuncDecl, GlobalDecl};
use corelang_typeck::context::Context;
use corelang_typeck::ty::MonoTy;
use corelang_typeck::{infer_program, resolve_node_types};

fn sp() -> Span {
    Span::new(0, 1)
}

/// `fn id(x) { x }` followed by `let result = (id(true), id(1))`: `id`
/// must generalize so it applies at two distinct concrete types.
#[test]
fn identity_function_applies_polymorphically() {
    let mut ctx = Context::new();
    let mut b = AstBuilder::new(&mut ctx);

    let id_name = b.name("id", sp());
    let id_param = b.name("x", sp());
    let id_body = b.var("x", sp());
    let id_decl = Decl::FuncDecl(FuncDecl {
        name: id_name,
        params: vec![id_param],
        body: id_body,
        span: sp(),
    });

    let arg_true = b.bool_lit(true, sp());
    let call_true_callee = b.var("id", sp());
    let call_true = b.app(call_true_callee, vec![arg_true], sp());
    let arg_one = b.u32_lit(1, sp());
    let call_one_callee = b.var("id", sp());
    let call_one = b.app(call_one_callee, vec![arg_one], sp());
    let tuple = b.tuple(vec![call_true, call_one], sp());
    let tuple_id = tuple.id;
    let tuple_tau = tuple.tau;

    let result_name = b.name("result", sp());
    let result_decl = Decl::GlobalDecl(GlobalDecl { name: result_name, init: tuple, span: sp() });

    let decls = vec![id_decl, result_decl];
    let (_env, subst) = infer_program(&mut ctx, &decls).expect("program should type-check");

    match subst.apply(&MonoTy::Var(tuple_tau)) {
        MonoTy::Tuple(elems) => {
            assert_eq!(elems[0], MonoTy::bool_ty());
            assert_eq!(elems[1], MonoTy::u32_ty());
        }
        other => panic!("expected tuple type, got {other:?}"),
    }

    let types = resolve_node_types(&subst, &decls);
    assert_eq!(types.get(&tuple_id), Some(&MonoTy::Tuple(vec![MonoTy::bool_ty(), MonoTy::u32_ty()])));
}

/// Recursive factorial, called at `u32`: `fn fact(n) { if n == 0 { 1 } else { n * fact(n - 1) } }`.
#[test]
fn recursive_function_type_checks() {
    let mut ctx = Context::new();
    let mut b = AstBuilder::new(&mut ctx);

    let n_ref_cond = b.var("n", sp());
    let zero = b.u32_lit(0, sp());
    let cond = b.binop(corelang_typeck::ast::BinOp::Eq, n_ref_cond, zero, sp());

    let one = b.u32_lit(1, sp());

    let n_ref_mul = b.var("n", sp());
    let n_ref_arg = b.var("n", sp());
    let one_again = b.u32_lit(1, sp());
    let n_minus_one = b.binop(corelang_typeck::ast::BinOp::Sub, n_ref_arg, one_again, sp());
    let fact_ref = b.var("fact", sp());
    let rec_call = b.app(fact_ref, vec![n_minus_one], sp());
    let else_branch = b.binop(corelang_typeck::ast::BinOp::Mul, n_ref_mul, rec_call, sp());

    let if_expr = b.if_expr(cond, one, else_branch, sp());

    let fact_decl = Decl::FuncDecl(FuncDecl {
        name: b.name("fact", sp()),
        params: vec![b.name("n", sp())],
        body: if_expr,
        span: sp(),
    });

    let call_arg = b.u32_lit(5, sp());
    let call_callee = b.var("fact", sp());
    let call = b.app(call_callee, vec![call_arg], sp());
    let call_tau = call.tau;
    let result_decl = Decl::GlobalDecl(GlobalDecl { name: b.name("result", sp()), init: call, span: sp() });

    let decls = vec![fact_decl, result_decl];
    let (_env, subst) = infer_program(&mut ctx, &decls).expect("factorial should type-check");
    assert_eq!(subst.apply(&MonoTy::Var(call_tau)), MonoTy::u32_ty());
}

/// A recursive call with an argument of the wrong type is still a type
/// error, even though `fact` itself is only used recursively.
#[test]
fn recursive_function_rejects_argument_mismatch() {
    let mut ctx = Context::new();
    let mut b = AstBuilder::new(&mut ctx);

    let bad_arg = b.bool_lit(true, sp());
    let fact_ref = b.var("fact", sp());
    let rec_call = b.app(fact_ref, vec![bad_arg], sp());

    let fact_decl = Decl::FuncDecl(FuncDecl {
        name: b.name("fact", sp()),
        params: vec![b.name("n", sp())],
        body: rec_call,
        span: sp(),
    });

    let decls = vec![fact_decl];
    let result = infer_program(&mut ctx, &decls);
    assert!(result.is_err());
}
