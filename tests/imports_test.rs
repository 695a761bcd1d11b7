use gobuild::ast::{Decl, Expr, GenDeclKind, Spec};
use gobuild::{BasicKind, CodeBuilder, Config, ObjKind};

fn builder() -> CodeBuilder {
    CodeBuilder::new("github.com/x/foo", "foo", Config::default())
}

fn import_specs(cb: &mut CodeBuilder, testing: bool) -> Vec<(Option<String>, String)> {
    let decls = cb.file_decls(testing);
    let a = cb.arena();
    let mut out = Vec::new();
    for &d in &decls {
        if let Decl::Gen {
            kind: GenDeclKind::Import,
            specs,
        } = a.decls[d]
        {
            for &s in a.specs_list(specs) {
                if let Spec::Import { name, path } = a.specs[s] {
                    out.push((
                        name.map(|n| cb.interner().resolve(n).to_string()),
                        cb.interner().resolve(path).to_string(),
                    ));
                }
            }
        }
    }
    out
}

#[test]
fn unused_import_is_dropped() {
    let mut cb = builder();
    cb.declare_pkg("fmt", "fmt");
    cb.import_("fmt");
    assert!(import_specs(&mut cb, false).is_empty());
}

#[test]
fn force_used_import_survives_as_blank() {
    let mut cb = builder();
    cb.declare_pkg("unsafe/side", "side");
    let p = cb.import_("unsafe/side");
    cb.force_use(p);
    assert_eq!(
        import_specs(&mut cb, false),
        vec![(Some("_".to_string()), "unsafe/side".to_string())]
    );
}

#[test]
fn referenced_import_is_marked_used() {
    let mut cb = builder();
    let int = cb.type_store().basic(BasicKind::Int);
    let p = cb.declare_pkg("fmt", "fmt");
    cb.import_("fmt");
    let obj = cb.declare_pkg_member(p, "MaxWidth", int, ObjKind::Var);

    let f = cb.new_func(None, "f", vec![], vec![], false).unwrap();
    cb.body_start(f).val(obj).end_stmt().end();

    assert_eq!(
        import_specs(&mut cb, false),
        vec![(Some("fmt".to_string()), "fmt".to_string())]
    );
}

#[test]
fn colliding_import_names_are_renamed_with_refs_rewritten() {
    let mut cb = builder();
    let int = cb.type_store().basic(BasicKind::Int);
    let pa = cb.declare_pkg("a/v1", "v1");
    let pb = cb.declare_pkg("b/v1", "v1");
    cb.import_("a/v1");
    cb.import_("b/v1");
    let xa = cb.declare_pkg_member(pa, "X", int, ObjKind::Var);
    let xb = cb.declare_pkg_member(pb, "Y", int, ObjKind::Var);

    let f = cb.new_func(None, "f", vec![], vec![], false).unwrap();
    cb.body_start(f)
        .val(xa)
        .end_stmt()
        .val(xb)
        .end_stmt()
        .end();

    let specs = import_specs(&mut cb, false);
    assert_eq!(specs.len(), 2);
    assert_eq!(specs[0], (Some("v1".to_string()), "a/v1".to_string()));
    assert_eq!(specs[1].1, "b/v1");
    let renamed = specs[1].0.clone().unwrap();
    assert_ne!(renamed, "v1", "second import must be renamed");

    // Every qualifier referencing b/v1 now uses the renamed identifier.
    let a = cb.arena();
    let mut seen_renamed = false;
    for i in 0..a.exprs.len() {
        let id = gobuild::ExprId::from_raw(i as u32);
        if let Expr::Selector { x, sel } = a.exprs[id] {
            if cb.interner().resolve(sel) == "Y" {
                match a.exprs[x] {
                    Expr::Ident(q) => {
                        assert_eq!(cb.interner().resolve(q), renamed);
                        seen_renamed = true;
                    }
                    e => panic!("expected identifier qualifier, got {e:?}"),
                }
            }
        }
    }
    assert!(seen_renamed, "reference to b/v1 member not found");
}

#[test]
fn removed_exprs_forces_full_walk() {
    let mut cb = builder();
    let int = cb.type_store().basic(BasicKind::Int);
    let pa = cb.declare_pkg("alpha", "alpha");
    let pb = cb.declare_pkg("beta", "beta");
    cb.import_("alpha");
    cb.import_("beta");
    let xa = cb.declare_pkg_member(pa, "A", int, ObjKind::Var);
    let xb = cb.declare_pkg_member(pb, "B", int, ObjKind::Var);

    let f = cb.new_func(None, "f", vec![], vec![], false).unwrap();
    cb.body_start(f).val(xa).end_stmt();
    // Reference beta, then drop the expression before it reaches a
    // statement: its ref-list entry is now stale.
    cb.val(xb).reset_stmt();
    cb.end();
    cb.mark_exprs_removed();

    assert_eq!(
        import_specs(&mut cb, false),
        vec![(Some("alpha".to_string()), "alpha".to_string())]
    );
}

#[test]
fn testing_file_bucket_is_separate() {
    let mut cb = builder();
    assert!(!cb.has_testing_file());
    cb.set_in_testing_file(true);
    assert!(cb.in_testing_file());
    let f = cb.new_func(None, "TestFoo", vec![], vec![], false).unwrap();
    cb.body_start(f).end();
    assert!(cb.has_testing_file());
    cb.set_in_testing_file(false);
    assert!(cb.file_decls(false).is_empty());
    assert_eq!(cb.file_decls(true).len(), 1);
}

#[test]
fn import_is_idempotent_per_file() {
    let mut cb = builder();
    let int = cb.type_store().basic(BasicKind::Int);
    let p = cb.declare_pkg("fmt", "fmt");
    cb.import_("fmt");
    cb.import_("fmt");
    let obj = cb.declare_pkg_member(p, "N", int, ObjKind::Var);
    let f = cb.new_func(None, "f", vec![], vec![], false).unwrap();
    cb.body_start(f).val(obj).end_stmt().end();
    assert_eq!(import_specs(&mut cb, false).len(), 1);
}
