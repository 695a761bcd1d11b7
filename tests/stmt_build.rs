use std::cell::RefCell;
use std::rc::Rc;

use gobuild::ast::{BranchTok, Clause, Decl, Stmt};
use gobuild::{BasicKind, BinaryOp, ChanDir, CodeBuilder, Config, Pos, UnaryOp};

fn builder() -> CodeBuilder {
    CodeBuilder::new("github.com/x/foo", "foo", Config::default())
}

/// Builder whose diagnostics are collected instead of panicking.
fn collecting_builder() -> (CodeBuilder, Rc<RefCell<Vec<String>>>) {
    let errs: Rc<RefCell<Vec<String>>> = Rc::default();
    let sink = errs.clone();
    let cb = CodeBuilder::new(
        "github.com/x/foo",
        "foo",
        Config {
            handle_err: Some(Box::new(move |e| sink.borrow_mut().push(e.msg.clone()))),
            ..Config::default()
        },
    );
    (cb, errs)
}

fn func_body(cb: &mut CodeBuilder, name: &str) -> gobuild::FuncRef {
    let f = cb.new_func(None, name, vec![], vec![], false).unwrap();
    cb.body_start(f);
    f
}

fn only_func_stmts(cb: &mut CodeBuilder) -> Vec<gobuild::StmtId> {
    let decls = cb.file_decls(false);
    let a = cb.arena();
    for &d in &decls {
        if let Decl::Func(fd) = a.decls[d] {
            let body = a.func_decls[fd].body.unwrap();
            return a.stmts_list(body.stmts).to_vec();
        }
    }
    panic!("no function declaration found");
}

#[test]
fn var_decl_then_assignment_in_order() {
    let mut cb = builder();
    let int = cb.type_store().basic(BasicKind::Int);
    func_body(&mut cb, "f");
    cb.new_var(int, &["n"]);
    let n = cb.lookup("n").unwrap();
    cb.var_ref(Some(n)).val(5).assign(1, None).end();

    let stmts = only_func_stmts(&mut cb);
    assert_eq!(stmts.len(), 2);
    let a = cb.arena();
    assert!(matches!(a.stmts[stmts[0]], Stmt::Decl(_)));
    assert!(matches!(a.stmts[stmts[1]], Stmt::Assign { .. }));
}

#[test]
fn if_else_assembles() {
    let mut cb = builder();
    func_body(&mut cb, "f");
    cb.if_().val(true).then();
    cb.val(1).val(1).binary_op(BinaryOp::Eq).end_stmt();
    cb.else_();
    cb.val(2).val(2).binary_op(BinaryOp::Eq).end_stmt();
    cb.end().end();

    let stmts = only_func_stmts(&mut cb);
    assert_eq!(stmts.len(), 1);
    let a = cb.arena();
    match a.stmts[stmts[0]] {
        Stmt::If {
            init, else_: Some(e), ..
        } => {
            assert!(init.is_none());
            assert!(matches!(a.stmts[e], Stmt::Block(_)));
        }
        s => panic!("expected if with else, got {s:?}"),
    }
}

#[test]
fn if_with_init_statement() {
    let mut cb = builder();
    func_body(&mut cb, "f");
    cb.if_();
    cb.define_var_start(Pos::NONE, &["x"]).val(1).end_init(1);
    let x = cb.lookup("x").unwrap();
    cb.val(x).val(0).binary_op(BinaryOp::Gt).then();
    cb.val(x).end_stmt();
    cb.end().end();

    let stmts = only_func_stmts(&mut cb);
    let a = cb.arena();
    match a.stmts[stmts[0]] {
        Stmt::If { init: Some(i), .. } => {
            assert!(matches!(a.stmts[i], Stmt::Assign { .. }));
        }
        s => panic!("expected if with init, got {s:?}"),
    }
}

#[test]
fn for_loop_with_post() {
    let mut cb = builder();
    func_body(&mut cb, "f");
    cb.for_();
    cb.define_var_start(Pos::NONE, &["i"]).val(0).end_init(1);
    let i = cb.lookup("i").unwrap();
    cb.val(i).val(10).binary_op(BinaryOp::Lt).then();
    cb.val(i).end_stmt();
    cb.post();
    cb.var_ref(Some(i)).inc_dec(gobuild::IncDecOp::Inc);
    cb.end().end();

    let stmts = only_func_stmts(&mut cb);
    let a = cb.arena();
    match a.stmts[stmts[0]] {
        Stmt::For {
            init: Some(_),
            cond: Some(_),
            post: Some(p),
            body,
        } => {
            assert!(matches!(a.stmts[p], Stmt::IncDec { .. }));
            assert_eq!(a.stmts_list(body.stmts).len(), 1);
        }
        s => panic!("expected full for clause, got {s:?}"),
    }
}

#[test]
fn infinite_for_loop() {
    let mut cb = builder();
    func_body(&mut cb, "f");
    cb.for_().none().then();
    cb.break_(None);
    cb.end().end();

    let stmts = only_func_stmts(&mut cb);
    let a = cb.arena();
    match a.stmts[stmts[0]] {
        Stmt::For {
            init: None,
            cond: None,
            post: None,
            body,
        } => {
            let body = a.stmts_list(body.stmts);
            assert!(matches!(
                a.stmts[body[0]],
                Stmt::Branch {
                    tok: BranchTok::Break,
                    label: None
                }
            ));
        }
        s => panic!("expected infinite for, got {s:?}"),
    }
}

#[test]
fn for_range_over_map_with_two_names() {
    let mut cb = builder();
    let string = cb.type_store().basic(BasicKind::String);
    let int = cb.type_store().basic(BasicKind::Int);
    let map = cb.type_store().map_of(string, int);
    func_body(&mut cb, "f");
    cb.new_var(map, &["m"]);
    let m = cb.lookup("m").unwrap();
    cb.for_range(&["k", "v"]).val(m).range_assign_then(Pos::NONE);

    // The loop variables are bound to the map's key/element types.
    let k = cb.lookup("k").unwrap();
    let v = cb.lookup("v").unwrap();
    let kt = cb.scope_tree().obj(k).ty;
    let vt = cb.scope_tree().obj(v).ty;
    assert_eq!(cb.ty_str(kt), "string");
    assert_eq!(cb.ty_str(vt), "int");

    cb.end().end();
    let stmts = only_func_stmts(&mut cb);
    let a = cb.arena();
    match a.stmts[stmts[1]] {
        Stmt::Range {
            key: Some(_),
            value: Some(_),
            define: true,
            ..
        } => {}
        s => panic!("expected range statement, got {s:?}"),
    }
}

#[test]
fn for_range_with_one_name_ignores_value() {
    let mut cb = builder();
    let string = cb.type_store().basic(BasicKind::String);
    let int = cb.type_store().basic(BasicKind::Int);
    let map = cb.type_store().map_of(string, int);
    func_body(&mut cb, "f");
    cb.new_var(map, &["m"]);
    let m = cb.lookup("m").unwrap();
    cb.for_range(&["k"]).val(m).range_assign_then(Pos::NONE);
    cb.end().end();

    let stmts = only_func_stmts(&mut cb);
    let a = cb.arena();
    match a.stmts[stmts[1]] {
        Stmt::Range {
            key: Some(_),
            value: None,
            define: true,
            ..
        } => {}
        s => panic!("expected single-variable range, got {s:?}"),
    }
}

#[test]
fn switch_with_cases_and_fallthrough() {
    let mut cb = builder();
    let int = cb.type_store().basic(BasicKind::Int);
    func_body(&mut cb, "f");
    cb.new_var(int, &["x"]);
    let x = cb.lookup("x").unwrap();
    cb.switch().val(x).then();
    cb.val(1).val(2).case(2);
    cb.fallthrough_();
    cb.end();
    cb.case(0);
    cb.val(x).end_stmt();
    cb.end();
    cb.end().end();

    let stmts = only_func_stmts(&mut cb);
    let a = cb.arena();
    match a.stmts[stmts[1]] {
        Stmt::Switch { tag: Some(_), clauses, .. } => {
            let clauses = a.clauses_list(clauses);
            assert_eq!(clauses.len(), 2);
            match a.clauses[clauses[0]] {
                Clause::Case { cases, body } => {
                    assert_eq!(a.exprs_list(cases).len(), 2);
                    let body = a.stmts_list(body);
                    assert!(matches!(
                        a.stmts[*body.last().unwrap()],
                        Stmt::Branch {
                            tok: BranchTok::Fallthrough,
                            ..
                        }
                    ));
                }
                c => panic!("expected case clause, got {c:?}"),
            }
            match a.clauses[clauses[1]] {
                Clause::Case { cases, .. } => assert!(cases.is_empty()),
                c => panic!("expected default clause, got {c:?}"),
            }
        }
        s => panic!("expected switch, got {s:?}"),
    }
}

#[test]
fn type_switch_rebinds_name_per_case() {
    let mut cb = builder();
    let any = cb.type_store().interface_of(vec![], true);
    let int = cb.type_store().basic(BasicKind::Int);
    func_body(&mut cb, "f");
    cb.new_var(any, &["v"]);
    let v = cb.lookup("v").unwrap();
    cb.type_switch("y").val(v).type_assert_then();
    cb.typ(int).type_case(1);
    let y = cb.lookup("y").unwrap();
    let yt = cb.scope_tree().obj(y).ty;
    assert_eq!(cb.ty_str(yt), "int");
    cb.end();
    cb.type_case(0);
    let y2 = cb.lookup("y").unwrap();
    let yt2 = cb.scope_tree().obj(y2).ty;
    assert_eq!(cb.ty_str(yt2), "interface{}");
    cb.end();
    cb.end().end();

    let stmts = only_func_stmts(&mut cb);
    let a = cb.arena();
    match a.stmts[stmts[1]] {
        Stmt::TypeSwitch { guard, clauses, .. } => {
            assert!(matches!(a.stmts[guard], Stmt::Assign { .. }));
            assert_eq!(a.clauses_list(clauses).len(), 2);
        }
        s => panic!("expected type switch, got {s:?}"),
    }
}

#[test]
fn select_with_comm_and_default() {
    let mut cb = builder();
    let int = cb.type_store().basic(BasicKind::Int);
    let ch_ty = cb.type_store().chan_of(ChanDir::Both, int);
    func_body(&mut cb, "f");
    cb.new_var(ch_ty, &["ch"]);
    let ch = cb.lookup("ch").unwrap();
    cb.select_();
    cb.val(ch).unary_op(UnaryOp::Recv, false).end_stmt();
    cb.comm_case(1);
    cb.end();
    cb.comm_case(0);
    cb.end();
    cb.end().end();

    let stmts = only_func_stmts(&mut cb);
    let a = cb.arena();
    match a.stmts[stmts[1]] {
        Stmt::Select { clauses } => {
            let clauses = a.clauses_list(clauses);
            assert_eq!(clauses.len(), 2);
            assert!(matches!(a.clauses[clauses[0]], Clause::Comm { comm: Some(_), .. }));
            assert!(matches!(a.clauses[clauses[1]], Clause::Comm { comm: None, .. }));
        }
        s => panic!("expected select, got {s:?}"),
    }
}

#[test]
fn send_statement() {
    let mut cb = builder();
    let int = cb.type_store().basic(BasicKind::Int);
    let ch_ty = cb.type_store().chan_of(ChanDir::Both, int);
    func_body(&mut cb, "f");
    cb.new_var(ch_ty, &["ch"]);
    let ch = cb.lookup("ch").unwrap();
    cb.val(ch).val(5).send();
    cb.end();

    let stmts = only_func_stmts(&mut cb);
    let a = cb.arena();
    assert!(matches!(a.stmts[stmts[1]], Stmt::Send { .. }));
}

#[test]
fn defer_and_go_require_calls() {
    let mut cb = builder();
    func_body(&mut cb, "f");
    let g = cb.new_func(None, "g", vec![], vec![], false).unwrap();
    let g_obj = cb.func_obj(g).unwrap();
    cb.val(g_obj).call(0).defer_();
    cb.val(g_obj).call(0).go_();
    cb.end();

    let stmts = only_func_stmts(&mut cb);
    let a = cb.arena();
    assert!(matches!(a.stmts[stmts[0]], Stmt::Defer { .. }));
    assert!(matches!(a.stmts[stmts[1]], Stmt::Go { .. }));
}

#[test]
fn unused_label_is_reported() {
    let (mut cb, errs) = collecting_builder();
    func_body(&mut cb, "f");
    cb.new_label(Pos(7), "L").unwrap();
    cb.end();
    assert_eq!(errs.borrow().as_slice(), ["label L defined and not used"]);
}

#[test]
fn duplicate_label_is_reported() {
    let (mut cb, errs) = collecting_builder();
    func_body(&mut cb, "f");
    let l = cb.new_label(Pos(1), "L").unwrap();
    assert!(cb.new_label(Pos(9), "L").is_none());
    cb.goto_(l);
    cb.end();
    let msgs = errs.borrow();
    assert_eq!(msgs.len(), 1);
    assert!(msgs[0].starts_with("label L already defined at"), "{msgs:?}");
}

#[test]
fn used_label_passes_and_attaches_forward() {
    let mut cb = builder();
    func_body(&mut cb, "f");
    let l = cb.new_label(Pos::NONE, "loop").unwrap();
    cb.label(l);
    cb.val(1).val(1).binary_op(BinaryOp::Eq).end_stmt();
    cb.goto_(l);
    cb.end();

    let stmts = only_func_stmts(&mut cb);
    let a = cb.arena();
    match a.stmts[stmts[0]] {
        Stmt::Labeled { label, stmt } => {
            assert_eq!(cb.interner().resolve(label), "loop");
            assert!(matches!(a.stmts[stmt], Stmt::Expr(_)));
        }
        s => panic!("label must attach to the next statement, got {s:?}"),
    }
}

#[test]
fn commit_stmt_rehomes_statement() {
    let mut cb = builder();
    func_body(&mut cb, "f");
    cb.val(1).end_stmt();
    cb.val(2).end_stmt();
    cb.val(3).end_stmt();
    cb.commit_stmt(0);
    cb.end();

    let stmts = only_func_stmts(&mut cb);
    let a = cb.arena();
    let texts: Vec<&str> = stmts
        .iter()
        .map(|&s| match a.stmts[s] {
            Stmt::Expr(e) => match a.exprs[e] {
                gobuild::Expr::BasicLit { value, .. } => cb.interner().resolve(value),
                _ => panic!("expected literal"),
            },
            _ => panic!("expected expression statement"),
        })
        .collect();
    assert_eq!(texts, ["2", "3", "1"]);
}

#[test]
fn define_var_mismatch_reports_count() {
    let mut cb = builder();
    func_body(&mut cb, "f");
    cb.define_var_start(Pos::NONE, &["x", "y"]).val(1);
    let err = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        cb.end_init(1);
    }))
    .unwrap_err();
    let err = err.downcast::<gobuild::CodeError>().unwrap();
    assert_eq!(err.msg, "assignment mismatch: 2 variables but 1 values");
}
