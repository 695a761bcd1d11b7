use gobuild::ast::{Decl, Expr, LitKind, Stmt};
use gobuild::{BasicKind, BinaryOp, CodeBuilder, Config, Const, Pos, UnaryOp};

fn builder() -> CodeBuilder {
    CodeBuilder::new("github.com/x/foo", "foo", Config::default())
}

fn int_result(cb: &mut CodeBuilder) -> gobuild::Obj {
    let int = cb.type_store().basic(BasicKind::Int);
    cb.new_param(Pos::NONE, "", int)
}

#[test]
fn return_constant_folds_to_literal() {
    // package foo; func f() int { return 1 + 2 }
    let mut cb = builder();
    let r = int_result(&mut cb);
    let f = cb.new_func(None, "f", vec![], vec![r], false).unwrap();
    cb.body_start(f)
        .val(1)
        .val(2)
        .binary_op(BinaryOp::Add)
        .return_(1)
        .end();

    let decls = cb.file_decls(false);
    assert_eq!(decls.len(), 1, "no import lines expected");

    let a = cb.arena();
    let fd = match a.decls[decls[0]] {
        Decl::Func(fd) => fd,
        d => panic!("expected func decl, got {d:?}"),
    };
    let func = a.func_decls[fd];
    let body = func.body.expect("func body");
    let stmts = a.stmts_list(body.stmts);
    assert_eq!(stmts.len(), 1);
    let results = match a.stmts[stmts[0]] {
        Stmt::Return { results } => results,
        s => panic!("expected return, got {s:?}"),
    };
    let exprs = a.exprs_list(results);
    assert_eq!(exprs.len(), 1);
    match a.exprs[exprs[0]] {
        Expr::BasicLit {
            kind: LitKind::Int,
            value,
        } => assert_eq!(cb.interner().resolve(value), "3"),
        e => panic!("expected folded literal, got {e:?}"),
    }
}

#[test]
fn arithmetic_folding_on_untyped_ints() {
    let cases: &[(i64, i64, BinaryOp, i64)] = &[
        (6, 3, BinaryOp::Quo, 2),
        (7, 3, BinaryOp::Rem, 1),
        (5, 2, BinaryOp::Mul, 10),
        (5, 2, BinaryOp::Sub, 3),
        (1, 6, BinaryOp::Lsh, 64),
        (0xF0, 0x0F, BinaryOp::Or, 0xFF),
        (0xF0, 4, BinaryOp::Rsh, 0x0F),
    ];
    for &(a, b, op, want) in cases {
        let mut cb = builder();
        cb.val(a).val(b).binary_op(op);
        assert_eq!(
            cb.get(-1).cval,
            Some(Const::Int(want)),
            "{a} {op:?} {b}"
        );
    }
}

#[test]
fn comparison_yields_untyped_bool() {
    let mut cb = builder();
    cb.val(1).val(2).binary_op(BinaryOp::Lt);
    let top = cb.get(-1).clone();
    assert_eq!(top.cval, Some(Const::Bool(true)));
    assert_eq!(cb.ty_str(top.typ.unwrap()), "untyped bool");
}

#[test]
fn string_concat_folds() {
    let mut cb = builder();
    cb.val("go").val("build").binary_op(BinaryOp::Add);
    let top = cb.get(-1).clone();
    assert_eq!(top.cval, Some(Const::Str("gobuild".into())));
    assert_eq!(cb.ty_str(top.typ.unwrap()), "untyped string");
}

#[test]
fn untyped_promotion_int_plus_float() {
    let mut cb = builder();
    cb.val(1).val(2.5).binary_op(BinaryOp::Add);
    let top = cb.get(-1).clone();
    assert_eq!(top.cval, Some(Const::Float(3.5)));
    assert_eq!(cb.ty_str(top.typ.unwrap()), "untyped float");
}

#[test]
fn mixed_untyped_and_typed_takes_typed_side() {
    let mut cb = builder();
    let int = cb.type_store().basic(BasicKind::Int);
    let f = cb.new_func(None, "g", vec![], vec![], false).unwrap();
    cb.body_start(f).new_var(int, &["x"]);
    let x = cb.lookup("x").unwrap();
    cb.val(x).val(1).binary_op(BinaryOp::Add);
    let top_ty = cb.get(-1).typ.unwrap();
    assert_eq!(cb.ty_str(top_ty), "int");
    cb.end_stmt().end();
}

#[test]
fn unary_neg_folds() {
    let mut cb = builder();
    cb.val(5).unary_op(UnaryOp::Neg, false);
    assert_eq!(cb.get(-1).cval, Some(Const::Int(-5)));
}

#[test]
fn compare_nil_on_slice() {
    let mut cb = builder();
    let int = cb.type_store().basic(BasicKind::Int);
    let slice = cb.type_store().slice_of(int);
    let f = cb.new_func(None, "h", vec![], vec![], false).unwrap();
    cb.body_start(f).new_var(slice, &["s"]);
    let s = cb.lookup("s").unwrap();
    cb.val(s).compare_nil(BinaryOp::Eq);
    assert_eq!(cb.ty_str(cb.get(-1).typ.unwrap()), "untyped bool");
    cb.end_stmt().end();
}

#[test]
fn overflow_widens_to_big() {
    let mut cb = builder();
    cb.val(i64::MAX).val(1).binary_op(BinaryOp::Add);
    match cb.get(-1).cval.clone().unwrap() {
        Const::Big(v) => {
            assert_eq!(v.to_string(), "9223372036854775808");
        }
        c => panic!("expected big constant, got {c:?}"),
    }
}

#[test]
fn len_of_constant_string() {
    let mut cb = builder();
    let len_obj = cb.lookup("len").unwrap();
    cb.val(len_obj).val("hello").call(1);
    let top = cb.get(-1).clone();
    assert_eq!(top.cval, Some(Const::Int(5)));
    assert_eq!(cb.ty_str(top.typ.unwrap()), "int");
}

#[test]
fn auto_property_len_on_slice_member() {
    let mut cb = builder();
    let int = cb.type_store().basic(BasicKind::Int);
    let slice = cb.type_store().slice_of(int);
    let f = cb.new_func(None, "h", vec![], vec![], false).unwrap();
    cb.body_start(f).new_var(slice, &["xs"]);
    let xs = cb.lookup("xs").unwrap();
    cb.val(xs);
    let kind = cb
        .member("len", gobuild::MemberFlag::AutoProperty, None)
        .unwrap();
    assert_eq!(kind, gobuild::MemberKind::AutoProperty);
    assert_eq!(cb.ty_str(cb.get(-1).typ.unwrap()), "int");
    cb.end_stmt().end();
}
