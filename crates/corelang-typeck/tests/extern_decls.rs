//! Integration tests for extern function declarations.

use corelang_common::Span;
use corelang_typeck::ast::{AstBuilder, Decl, ExternFuncDecl, GlobalDecl};
use corelang_typeck::context::Context;
use corelang_typeck::error::TypeError;
use corelang_typeck::ty::MonoTy;
use corelang_typeck::infer_program;

fn sp() -> Span {
    Span::new(0, 1)
}

/// `extern fn puts(s: string) -> u32` called with a string literal.
#[test]
fn extern_function_call_type_checks() {
    let mut ctx = Context::new();
    let mut b = AstBuilder::new(&mut ctx);

    let puts_name = b.name("puts", sp());
    let extern_decl = Decl::ExternFuncDecl(ExternFuncDecl {
        name: puts_name,
        param_tys: vec![MonoTy::string_ty()],
        ret_ty: MonoTy::u32_ty(),
        span: sp(),
    });

    let arg = b.str_lit("hello", sp());
    let callee = b.var("puts", sp());
    let call = b.app(callee, vec![arg], sp());
    let call_tau = call.tau;

    let decls = vec![extern_decl, Decl::GlobalDecl(GlobalDecl { name: b.name("r", sp()), init: call, span: sp() })];
    let (_env, subst) = infer_program(&mut ctx, &decls).expect("extern call should type-check");
    assert_eq!(subst.apply(&MonoTy::Var(call_tau)), MonoTy::u32_ty());
}

/// Calling an extern function with the wrong argument type is a mismatch.
#[test]
fn extern_function_call_rejects_wrong_argument_type() {
    let mut ctx = Context::new();
    let mut b = AstBuilder::new(&mut ctx);

    let extern_decl = Decl::ExternFuncDecl(ExternFuncDecl {
        name: b.name("puts", sp()),
        param_tys: vec![MonoTy::string_ty()],
        ret_ty: MonoTy::u32_ty(),
        span: sp(),
    });

    let arg = b.u32_lit(1, sp());
    let callee = b.var("puts", sp());
    let call = b.app(callee, vec![arg], sp());

    let decls = vec![extern_decl, Decl::GlobalDecl(GlobalDecl { name: b.name("r", sp()), init: call, span: sp() })];
    let err = infer_program(&mut ctx, &decls).unwrap_err();
    assert!(matches!(err, TypeError::Mismatch { .. }));
}
