use std::cell::Cell;
use std::rc::Rc;

use gobuild::ast::{Spec, TypeExpr};
use gobuild::{BasicKind, CodeBuilder, Config, Pos, TypeKind};

fn builder() -> CodeBuilder {
    CodeBuilder::new("github.com/x/foo", "foo", Config::default())
}

#[test]
fn auto_var_binds_on_first_assignment_and_patches_spec() {
    let mut cb = builder();
    let f = cb.new_func(None, "f", vec![], vec![], false).unwrap();
    cb.body_start(f);
    let v = cb.new_auto_var(Pos::NONE, "t");
    cb.var_ref(Some(v)).val(42).assign(1, None);

    // The variable's placeholder now resolves to the default type of the
    // assigned value, and the emitted spec was patched in place.
    let vt = cb.scope_tree().obj(v).ty;
    assert_eq!(cb.ty_str(vt), "int");
    let a = cb.arena();
    let mut patched = false;
    for i in 0..a.specs.len() {
        let id = gobuild::ast::SpecId::from_raw(i as u32);
        if let Spec::Value { typ: Some(te), .. } = a.specs[id] {
            if let TypeExpr::Name { name, .. } = a.type_exprs[te] {
                patched |= cb.interner().resolve(name) == "int";
            }
        }
    }
    assert!(patched, "value spec type slot was not patched");
    cb.end();
}

#[test]
fn unbound_map_binds_through_index_assignment() {
    let mut cb = builder();
    let f = cb.new_func(None, "f", vec![], vec![], false).unwrap();
    cb.body_start(f);
    let m = cb.new_auto_var(Pos::NONE, "m");
    cb.var_ref(Some(m)).val("k").index_ref(1).val(7).assign(1, None);

    let mt = cb.scope_tree().obj(m).ty;
    assert_eq!(cb.ty_str(mt), "map[string]int");
    cb.end();
}

#[test]
fn redeclaring_auto_var_panics() {
    let mut cb = builder();
    let f = cb.new_func(None, "f", vec![], vec![], false).unwrap();
    cb.body_start(f);
    cb.new_auto_var(Pos(3), "t");
    let err = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        cb.new_auto_var(Pos(9), "t");
    }))
    .unwrap_err();
    let err = err.downcast::<gobuild::CodeError>().unwrap();
    assert!(err.msg.starts_with("t redeclared in this block"), "{}", err.msg);
}

#[test]
fn lazy_underlying_loads_once() {
    let count = Rc::new(Cell::new(0u32));
    let seen = count.clone();
    let mut cb = CodeBuilder::new(
        "github.com/x/foo",
        "foo",
        Config {
            load_named: Some(Box::new(move |cb, ty| {
                seen.set(seen.get() + 1);
                let int = cb.type_store().basic(BasicKind::Int);
                cb.type_store().set_underlying(ty, int);
            })),
            ..Config::default()
        },
    );
    let sym = cb.intern("Celsius");
    let named = cb.type_store().named(None, sym, None);

    // Two structural uses; the loader runs exactly once and both reads
    // observe the same underlying.
    cb.zero_lit(named);
    cb.zero_lit(named);
    assert_eq!(count.get(), 1);
    let u = match cb.type_store().kind(named) {
        TypeKind::Named {
            underlying: Some(u),
            ..
        } => *u,
        _ => panic!("expected loaded named type"),
    };
    assert_eq!(cb.ty_str(u), "int");
    cb.internal_stack().set_len(0);
}

#[test]
fn new_type_and_init_type_round_trip() {
    let mut cb = builder();
    let decl = cb.new_type("Celsius", Pos::NONE);
    let float64 = cb.type_store().basic(BasicKind::Float64);
    let named = cb.init_type(decl, float64);
    assert_eq!(cb.ty_str(named), "Celsius");

    // The type spec now carries the concrete underlying type.
    let a = cb.arena();
    let mut ok = false;
    for i in 0..a.specs.len() {
        let id = gobuild::ast::SpecId::from_raw(i as u32);
        if let Spec::Type { name, typ, alias } = a.specs[id] {
            if cb.interner().resolve(name) == "Celsius" {
                assert!(!alias);
                ok = matches!(a.type_exprs[typ], TypeExpr::Name { .. });
            }
        }
    }
    assert!(ok, "type spec not found or not patched");
}

#[test]
fn alias_type_resolves_to_target() {
    let mut cb = builder();
    let int = cb.type_store().basic(BasicKind::Int);
    let aliased = cb.alias_type("MyInt", int, Pos::NONE);
    assert_eq!(aliased, int);
    let obj = cb.lookup("MyInt").unwrap();
    let ty = cb.scope_tree().obj(obj).ty;
    assert_eq!(ty, int);
}

#[test]
fn method_set_walks_embedded_fields() {
    let mut cb = builder();
    let int = cb.type_store().basic(BasicKind::Int);
    let base_name = cb.intern("Base");
    let n_sym = cb.intern("N");
    let base_struct = cb.type_store().struct_of(vec![gobuild::StructField {
        name: n_sym,
        ty: int,
        embedded: false,
        tag: None,
    }]);
    let base = cb.type_store().named(None, base_name, Some(base_struct));
    let outer = cb.type_store().struct_of(vec![gobuild::StructField {
        name: base_name,
        ty: base,
        embedded: true,
        tag: None,
    }]);

    let f = cb.new_func(None, "f", vec![], vec![], false).unwrap();
    cb.body_start(f).new_var(outer, &["o"]);
    let o = cb.lookup("o").unwrap();
    cb.val(o).member_val("N");
    assert_eq!(cb.ty_str(cb.get(-1).typ.unwrap()), "int");
    cb.end_stmt().end();
}

#[test]
fn member_on_type_value_prepends_receiver() {
    let mut cb = builder();
    let int = cb.type_store().basic(BasicKind::Int);
    let t_sym = cb.intern("T");
    let strct = cb.type_store().struct_of(vec![]);
    let named = cb.type_store().named(None, t_sym, Some(strct));
    let recv = cb.new_param(Pos::NONE, "t", named);
    let res = cb.new_param(Pos::NONE, "", int);
    let sig = cb.type_store().signature(Some(recv), vec![], vec![res], false);
    let m_sym = cb.intern("Value");
    cb.type_store().add_method(named, m_sym, sig);

    cb.typ(named);
    let kind = cb.member("Value", gobuild::MemberFlag::Val, None).unwrap();
    assert_eq!(kind, gobuild::MemberKind::Method);
    assert_eq!(cb.ty_str(cb.get(-1).typ.unwrap()), "func(T) int");
    cb.internal_stack().set_len(0);
}
