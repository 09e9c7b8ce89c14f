//! End-to-end diagnostics tests: build a program, let it fail to
//! type-check, and render the resulting error through `diagnostics`.
//!
//! These assert on substrings of the rendered report rather than a
//! snapshot file, since there is no pre-existing baseline to compare
//! against here.

use corelang_common::Span;
use corelang_typeck::ast::{AstBuilder, Decl, GlobalDecl, StructDeclAst, StructFieldAst};
use corelang_typeck::context::Context;
use corelang_typeck::diagnostics::{render_diagnostic, render_all, DiagnosticOptions};
use corelang_typeck::ty::MonoTy;
use corelang_typeck::infer_program;

fn sp() -> Span {
    Span::new(0, 1)
}

#[test]
fn unbound_variable_renders_with_code_and_message() {
    let mut ctx = Context::new();
    let mut b = AstBuilder::new(&mut ctx);

    let expr = b.var("mystery", sp());
    let decls = vec![Decl::GlobalDecl(GlobalDecl { name: b.name("r", sp()), init: expr, span: sp() })];
    let err = infer_program(&mut ctx, &decls).unwrap_err();

    let rendered = render_diagnostic(&err, "mystery", "program.core", &DiagnosticOptions::default());
    assert!(rendered.contains("E0001"));
    assert!(rendered.contains("unbound variable: \"mystery\""));
}

#[test]
fn missing_attribute_renders_struct_and_field_names() {
    let mut ctx = Context::new();
    let mut b = AstBuilder::new(&mut ctx);

    let point_decl = Decl::StructDecl(StructDeclAst {
        name: "Point".into(),
        fields: vec![
            StructFieldAst { name: "x".into(), ty: MonoTy::u32_ty() },
            StructFieldAst { name: "y".into(), ty: MonoTy::u32_ty() },
        ],
        span: sp(),
    });
    let literal = b.struct_lit("Point", vec![("x".into(), b.u32_lit(1, sp()))], sp());
    let decls = vec![point_decl, Decl::GlobalDecl(GlobalDecl { name: b.name("p", sp()), init: literal, span: sp() })];
    let err = infer_program(&mut ctx, &decls).unwrap_err();

    let source = "Point { x: 1 }";
    let rendered = render_diagnostic(&err, source, "program.core", &DiagnosticOptions::default());
    assert!(rendered.contains("E0004"));
    assert!(rendered.contains("missing attribute \"y\" for struct \"Point\""));
}

#[test]
fn rendering_with_color_disabled_is_stable_across_calls() {
    let mut ctx = Context::new();
    let mut b = AstBuilder::new(&mut ctx);

    let lhs = b.bool_lit(true, sp());
    let rhs = b.u32_lit(1, sp());
    let sum = b.binop(corelang_typeck::ast::BinOp::Add, lhs, rhs, sp());
    let decls = vec![Decl::GlobalDecl(GlobalDecl { name: b.name("r", sp()), init: sum, span: sp() })];
    let err = infer_program(&mut ctx, &decls).unwrap_err();

    let source = "true + 1";
    let options = DiagnosticOptions { color: false };
    let first = render_diagnostic(&err, source, "program.core", &options);
    let second = render_diagnostic(&err, source, "program.core", &options);
    assert_eq!(first, second);
    assert!(!first.contains("\u{1b}["), "colorless rendering must not contain ANSI escapes");
}

#[test]
fn render_all_renders_every_error_in_order() {
    let mut ctx = Context::new();
    let mut b = AstBuilder::new(&mut ctx);

    let first = b.var("a", sp());
    let second = b.var("b", sp());

    let errs = vec![
        infer_program(&mut ctx, &[Decl::GlobalDecl(GlobalDecl { name: b.name("r1", sp()), init: first, span: sp() })])
            .unwrap_err(),
        infer_program(&mut ctx, &[Decl::GlobalDecl(GlobalDecl { name: b.name("r2", sp()), init: second, span: sp() })])
            .unwrap_err(),
    ];

    let rendered = render_all(&errs, "a b", "program.core", &DiagnosticOptions::default());
    assert_eq!(rendered.len(), 2);
    assert!(rendered[0].contains("unbound variable: \"a\""));
    assert!(rendered[1].contains("unbound variable: \"b\""));
}
