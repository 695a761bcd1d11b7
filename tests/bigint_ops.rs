use gobuild::ast::{Callee, Expr, Stmt, TypeExpr};
use gobuild::num::bigint::BigInt;
use gobuild::num::rational::BigRational;
use gobuild::{BasicKind, BinaryOp, CodeBuilder, Config, Const, Pos, Ty, UnaryOp};

/// Builds a package with the three distinguished big named types
/// injected, each carrying the operator method set of the marker-prefix
/// convention.
fn builder_with_bigs() -> (CodeBuilder, Ty, Ty) {
    let mut cb = CodeBuilder::new("github.com/x/foo", "foo", Config::default());
    let struct_ty = cb.type_store().struct_of(vec![]);
    let bigint_sym = cb.intern("bigint");
    let bigrat_sym = cb.intern("bigrat");
    let bigflt_sym = cb.intern("bigfloat");
    let bigint = cb.type_store().named(None, bigint_sym, Some(struct_ty));
    let bigrat = cb.type_store().named(None, bigrat_sym, Some(struct_ty));
    let bigflt = cb.type_store().named(None, bigflt_sym, Some(struct_ty));
    for (ty, name) in [(bigint, "bigint"), (bigrat, "bigrat")] {
        add_operator_methods(&mut cb, ty, name);
    }
    cb.set_untyped_big(bigint, bigrat, bigflt);
    (cb, bigint, bigrat)
}

fn add_operator_methods(cb: &mut CodeBuilder, ty: Ty, _name: &str) {
    let bool_ty = cb.type_store().basic(BasicKind::Bool);
    for op in [
        BinaryOp::Add,
        BinaryOp::Sub,
        BinaryOp::Mul,
        BinaryOp::Quo,
        BinaryOp::Lsh,
        BinaryOp::Rsh,
    ] {
        let recv = cb.new_param(Pos::NONE, "a", ty);
        let arg = cb.new_param(Pos::NONE, "b", ty);
        let res = cb.new_param(Pos::NONE, "", ty);
        let sig = cb.type_store().signature(Some(recv), vec![arg], vec![res], false);
        let sym = cb.intern(&format!("Gop_{}", op.method_suffix()));
        cb.type_store().add_method(ty, sym, sig);
    }
    for op in [BinaryOp::Lt, BinaryOp::Eq] {
        let recv = cb.new_param(Pos::NONE, "a", ty);
        let arg = cb.new_param(Pos::NONE, "b", ty);
        let res = cb.new_param(Pos::NONE, "", bool_ty);
        let sig = cb.type_store().signature(Some(recv), vec![arg], vec![res], false);
        let sym = cb.intern(&format!("Gop_{}", op.method_suffix()));
        cb.type_store().add_method(ty, sym, sig);
    }
    // Unary negation.
    let recv = cb.new_param(Pos::NONE, "a", ty);
    let res = cb.new_param(Pos::NONE, "", ty);
    let sig = cb.type_store().signature(Some(recv), vec![], vec![res], false);
    let sym = cb.intern(&format!("Gop_{}", UnaryOp::Neg.method_suffix()));
    cb.type_store().add_method(ty, sym, sig);
}

#[test]
fn named_operator_resolves_to_method_call() {
    // var a bigint; a + 2  ==>  a.Gop_Add(bigint(2))
    let (mut cb, bigint, _) = builder_with_bigs();
    let f = cb.new_func(None, "f", vec![], vec![], false).unwrap();
    cb.body_start(f).new_var(bigint, &["a"]);
    let a_obj = cb.lookup("a").unwrap();
    cb.val(a_obj).val(2).binary_op(BinaryOp::Add);

    let top = cb.get(-1).clone();
    assert_eq!(top.typ, Some(bigint));
    let arena = cb.arena();
    let (fun, args) = match arena.exprs[top.expr_id().unwrap()] {
        Expr::Call { fun, args, .. } => (fun, args),
        e => panic!("expected method call, got {e:?}"),
    };
    match fun {
        Callee::Expr(sel) => match arena.exprs[sel] {
            Expr::Selector { x, sel } => {
                assert!(matches!(arena.exprs[x], Expr::Ident(s) if cb.interner().resolve(s) == "a"));
                assert_eq!(cb.interner().resolve(sel), "Gop_Add");
            }
            e => panic!("expected selector, got {e:?}"),
        },
        c => panic!("expected expression callee, got {c:?}"),
    }
    // The untyped constant argument is wrapped in a bigint conversion.
    let args = arena.exprs_list(args);
    assert_eq!(args.len(), 1);
    match arena.exprs[args[0]] {
        Expr::Call { fun: Callee::Type(te), .. } => match arena.type_exprs[te] {
            TypeExpr::Name { name, .. } => assert_eq!(cb.interner().resolve(name), "bigint"),
            t => panic!("expected named type callee, got {t:?}"),
        },
        e => panic!("expected conversion of the constant, got {e:?}"),
    }

    cb.end_stmt().end();
}

#[test]
fn operator_resolution_prefers_primary_operand() {
    // bigrat + bigint-constant resolves on bigrat (the primary operand),
    // converting the constant argument up.
    let (mut cb, _, bigrat) = builder_with_bigs();
    let f = cb.new_func(None, "f", vec![], vec![], false).unwrap();
    cb.body_start(f).new_var(bigrat, &["r"]);
    let r = cb.lookup("r").unwrap();
    cb.val(r);
    cb.untyped_bigint(BigInt::from(3));
    cb.binary_op(BinaryOp::Add);
    assert_eq!(cb.get(-1).typ, Some(bigrat));
    cb.end_stmt().end();
}

#[test]
fn untyped_bigint_emits_new_int_and_imports_math_big() {
    let (mut cb, bigint, _) = builder_with_bigs();
    let f = cb.new_func(None, "f", vec![], vec![], false).unwrap();
    cb.body_start(f);
    cb.untyped_bigint(BigInt::from(5));

    let top = cb.get(-1).clone();
    assert_eq!(top.typ, Some(bigint));
    assert_eq!(top.cval, Some(Const::Big(BigInt::from(5))));
    let arena = cb.arena();
    match arena.exprs[top.expr_id().unwrap()] {
        Expr::Call { fun: Callee::Expr(sel), .. } => match arena.exprs[sel] {
            Expr::Selector { x, sel } => {
                assert!(matches!(arena.exprs[x], Expr::Ident(s) if cb.interner().resolve(s) == "big"));
                assert_eq!(cb.interner().resolve(sel), "NewInt");
            }
            e => panic!("expected big.NewInt, got {e:?}"),
        },
        e => panic!("expected call, got {e:?}"),
    }
    cb.end_stmt().end();

    // math/big is imported exactly once and marked used.
    let decls = cb.file_decls(false);
    let arena = cb.arena();
    let mut import_paths = Vec::new();
    for &d in &decls {
        if let gobuild::ast::Decl::Gen {
            kind: gobuild::ast::GenDeclKind::Import,
            specs,
        } = arena.decls[d]
        {
            for &s in arena.specs_list(specs) {
                if let gobuild::ast::Spec::Import { path, .. } = arena.specs[s] {
                    import_paths.push(cb.interner().resolve(path).to_string());
                }
            }
        }
    }
    assert_eq!(import_paths, ["math/big"]);
}

#[test]
fn huge_bigint_lowers_to_decoding_closure() {
    let (mut cb, _, _) = builder_with_bigs();
    let f = cb.new_func(None, "f", vec![], vec![], false).unwrap();
    cb.body_start(f);
    let huge = BigInt::parse_bytes(b"123456789012345678901234567890", 10).unwrap();
    cb.untyped_bigint(huge.clone());
    assert_eq!(cb.get(-1).cval, Some(Const::Big(huge)));
    let arena = cb.arena();
    let top = cb.get(-1).expr_id().unwrap();
    // Immediately-invoked func literal.
    match arena.exprs[top] {
        Expr::Call { fun: Callee::Expr(inner), args, .. } => {
            assert!(args.is_empty());
            match arena.exprs[inner] {
                Expr::FuncLit { body, .. } => {
                    let stmts = arena.stmts_list(body.stmts);
                    assert_eq!(stmts.len(), 2);
                    assert!(matches!(arena.stmts[stmts[0]], Stmt::Assign { .. }));
                    assert!(matches!(arena.stmts[stmts[1]], Stmt::Return { .. }));
                }
                e => panic!("expected func literal, got {e:?}"),
            }
        }
        e => panic!("expected immediately-invoked closure, got {e:?}"),
    }
    cb.end_stmt().end();
}

#[test]
fn big_constants_fold_through_method_path() {
    let (mut cb, bigint, _) = builder_with_bigs();
    let f = cb.new_func(None, "f", vec![], vec![], false).unwrap();
    cb.body_start(f);
    cb.untyped_bigint(BigInt::from(1) << 80usize);
    cb.val(2).binary_op(BinaryOp::Mul);
    assert_eq!(cb.get(-1).typ, Some(bigint));
    assert_eq!(
        cb.get(-1).cval,
        Some(Const::Big(BigInt::from(2) << 80usize))
    );
    cb.end_stmt().end();
}

#[test]
fn untyped_bigrat_small_uses_new_rat() {
    let (mut cb, _, bigrat) = builder_with_bigs();
    let f = cb.new_func(None, "f", vec![], vec![], false).unwrap();
    cb.body_start(f);
    let half = BigRational::new(BigInt::from(1), BigInt::from(2));
    cb.untyped_bigrat(half.clone());
    let top = cb.get(-1).clone();
    assert_eq!(top.typ, Some(bigrat));
    assert_eq!(top.cval, Some(Const::Rat(half)));
    let arena = cb.arena();
    match arena.exprs[top.expr_id().unwrap()] {
        Expr::Call { fun: Callee::Expr(sel), args, .. } => {
            assert_eq!(arena.exprs_list(args).len(), 2);
            match arena.exprs[sel] {
                Expr::Selector { sel, .. } => {
                    assert_eq!(cb.interner().resolve(sel), "NewRat")
                }
                e => panic!("expected big.NewRat, got {e:?}"),
            }
        }
        e => panic!("expected call, got {e:?}"),
    }
    cb.end_stmt().end();
}

#[test]
fn unary_recv_consults_named_method_first() {
    // A named type defining Gop_Recv overloads `<-x`; the builtin
    // channel semantics apply only when no method matches.
    let (mut cb, bigint, _) = builder_with_bigs();
    let recv = cb.new_param(Pos::NONE, "a", bigint);
    let res = cb.new_param(Pos::NONE, "", bigint);
    let sig = cb.type_store().signature(Some(recv), vec![], vec![res], false);
    let sym = cb.intern("Gop_Recv");
    cb.type_store().add_method(bigint, sym, sig);

    let f = cb.new_func(None, "f", vec![], vec![], false).unwrap();
    cb.body_start(f).new_var(bigint, &["a"]);
    let a_obj = cb.lookup("a").unwrap();
    cb.val(a_obj).unary_op(UnaryOp::Recv, false);
    assert_eq!(cb.get(-1).typ, Some(bigint));
    let arena = cb.arena();
    match arena.exprs[cb.get(-1).expr_id().unwrap()] {
        Expr::Call { fun: Callee::Expr(sel), .. } => match arena.exprs[sel] {
            Expr::Selector { sel, .. } => assert_eq!(cb.interner().resolve(sel), "Gop_Recv"),
            e => panic!("expected selector, got {e:?}"),
        },
        e => panic!("expected method call, got {e:?}"),
    }
    cb.end_stmt().end();
}

#[test]
fn unary_neg_on_named_uses_method() {
    let (mut cb, bigint, _) = builder_with_bigs();
    let f = cb.new_func(None, "f", vec![], vec![], false).unwrap();
    cb.body_start(f).new_var(bigint, &["a"]);
    let a_obj = cb.lookup("a").unwrap();
    cb.val(a_obj).unary_op(UnaryOp::Neg, false);
    assert_eq!(cb.get(-1).typ, Some(bigint));
    let arena = cb.arena();
    match arena.exprs[cb.get(-1).expr_id().unwrap()] {
        Expr::Call { fun: Callee::Expr(sel), .. } => match arena.exprs[sel] {
            Expr::Selector { sel, .. } => assert_eq!(cb.interner().resolve(sel), "Gop_Neg"),
            e => panic!("expected selector, got {e:?}"),
        },
        e => panic!("expected method call, got {e:?}"),
    }
    cb.end_stmt().end();
}
