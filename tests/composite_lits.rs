use gobuild::ast::{Expr, Span};
use gobuild::error::{NodeInterpreter, Position};
use gobuild::{BasicKind, CodeBuilder, CodeError, Config, StructField, Ty};

/// Interpreter echoing back slices of a fixed source line, so error
/// messages carry the offending text.
struct SrcText(&'static str);

impl NodeInterpreter for SrcText {
    fn load_expr(&self, src: Span) -> (String, Position) {
        let text = self
            .0
            .get(src.start as usize..src.end as usize)
            .unwrap_or("")
            .to_string();
        (
            text,
            Position {
                filename: "main.xgo".to_string(),
                line: 1,
                column: src.start + 1,
            },
        )
    }

    fn caller(&self, src: Span) -> String {
        self.load_expr(src).0
    }
}

fn builder_with_src(src: &'static str) -> CodeBuilder {
    CodeBuilder::new(
        "github.com/x/foo",
        "foo",
        Config {
            node_interp: Some(Box::new(SrcText(src))),
            ..Config::default()
        },
    )
}

fn builder() -> CodeBuilder {
    CodeBuilder::new("github.com/x/foo", "foo", Config::default())
}

fn expect_code_error(f: impl FnOnce()) -> CodeError {
    let got = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f)).unwrap_err();
    *got.downcast::<CodeError>().expect("expected a CodeError panic")
}

fn point_type(cb: &mut CodeBuilder) -> Ty {
    let int = cb.type_store().basic(BasicKind::Int);
    let x = cb.intern("X");
    let y = cb.intern("Y");
    cb.type_store().struct_of(vec![
        StructField {
            name: x,
            ty: int,
            embedded: false,
            tag: None,
        },
        StructField {
            name: y,
            ty: int,
            embedded: false,
            tag: None,
        },
    ])
}

#[test]
fn empty_map_lit_defaults_to_string_any() {
    let mut cb = builder();
    cb.map_lit(None, 0);
    let ty = cb.get(-1).typ.unwrap();
    assert_eq!(cb.ty_str(ty), "map[string]interface{}");
}

#[test]
fn map_lit_infers_element_types() {
    let mut cb = builder();
    cb.val("a").val(1).val("b").val(2).map_lit(None, 4);
    let ty = cb.get(-1).typ.unwrap();
    assert_eq!(cb.ty_str(ty), "map[string]int");
}

#[test]
fn slice_lit_infers_mixed_to_any() {
    let mut cb = builder();
    cb.val(1).val("x").slice_lit(None, 2, false);
    let ty = cb.get(-1).typ.unwrap();
    assert_eq!(cb.ty_str(ty), "[]interface{}");
}

#[test]
fn array_lit_infers_length_from_literal() {
    let mut cb = builder();
    let int = cb.type_store().basic(BasicKind::Int);
    let arr = cb.type_store().array_of(int, -1);
    cb.val(1).val(2).val(3).array_lit(arr, 3, false);
    let ty = cb.get(-1).typ.unwrap();
    assert_eq!(cb.ty_str(ty), "[3]int");
}

#[test]
fn array_lit_key_val_defaults_length_to_max_key_plus_one() {
    let mut cb = builder();
    let int = cb.type_store().basic(BasicKind::Int);
    let arr = cb.type_store().array_of(int, -1);
    cb.val(5).val(1).array_lit(arr, 2, true);
    let ty = cb.get(-1).typ.unwrap();
    assert_eq!(cb.ty_str(ty), "[6]int");
}

#[test]
fn array_lit_rejects_excess_positional_elements() {
    let mut cb = builder();
    let int = cb.type_store().basic(BasicKind::Int);
    let arr = cb.type_store().array_of(int, 3);
    cb.val(1).val(2).val(3).val(4);
    let err = expect_code_error(|| {
        cb.array_lit(arr, 4, false);
    });
    assert_eq!(err.msg, "array index 3 out of bounds [0:3]");
}

#[test]
fn array_lit_rejects_out_of_range_constant_key() {
    let mut cb = builder();
    let int = cb.type_store().basic(BasicKind::Int);
    let arr = cb.type_store().array_of(int, 3);
    cb.none().val(1).none().val(2).val(7).val(3);
    let err = expect_code_error(|| {
        cb.array_lit(arr, 6, true);
    });
    assert!(err.msg.contains("out of bounds [0:3]"), "{}", err.msg);
}

#[test]
fn struct_lit_positional_requires_exact_arity() {
    let mut cb = builder_with_src("Point{1}");
    let pt = point_type(&mut cb);
    cb.val_src(1, Some(Span::new(6, 7)));
    let err = expect_code_error(|| {
        cb.struct_lit(pt, 1, false);
    });
    assert!(err.msg.starts_with("too few values in"), "{}", err.msg);
}

#[test]
fn struct_lit_field_type_mismatch_names_the_field() {
    let mut cb = builder_with_src(r#"Point{X: "a"}"#);
    let pt = point_type(&mut cb);
    cb.val("X").val_src("a", Some(Span::new(9, 12)));
    let err = expect_code_error(|| {
        cb.struct_lit(pt, 2, true);
    });
    assert_eq!(
        err.msg,
        "cannot use \"a\" (type untyped string) as type int in value of field X"
    );
}

#[test]
fn struct_lit_key_val_emits_named_elements() {
    let mut cb = builder();
    let pt = point_type(&mut cb);
    cb.val("Y").val(4).struct_lit(pt, 2, true);
    let top = cb.get(-1).clone();
    let a = cb.arena();
    match a.exprs[top.expr_id().unwrap()] {
        Expr::CompositeLit { elts, .. } => {
            let elts = a.exprs_list(elts);
            assert_eq!(elts.len(), 1);
            match a.exprs[elts[0]] {
                Expr::KeyValue { key, .. } => {
                    assert!(
                        matches!(a.exprs[key], Expr::Ident(s) if cb.interner().resolve(s) == "Y")
                    );
                }
                e => panic!("expected keyed element, got {e:?}"),
            }
        }
        e => panic!("expected composite literal, got {e:?}"),
    }
}

#[test]
fn slice3_of_string_is_rejected() {
    let mut cb = builder_with_src("s[1:2:3]");
    let f = cb.new_func(None, "f", vec![], vec![], false).unwrap();
    let string = cb.type_store().basic(BasicKind::String);
    cb.body_start(f).new_var(string, &["s"]);
    let s = cb.lookup("s").unwrap();
    cb.val(s).val(1).val(2).val(3);
    let err = expect_code_error(|| {
        cb.slice_expr_src(true, Some(Span::new(0, 8)));
    });
    assert_eq!(err.msg, "invalid operation: s[1:2:3] (3-index slice of string)");
}

#[test]
fn index_ref_into_string_is_rejected() {
    let mut cb = builder_with_src("s[0]");
    let f = cb.new_func(None, "f", vec![], vec![], false).unwrap();
    let string = cb.type_store().basic(BasicKind::String);
    cb.body_start(f).new_var(string, &["s"]);
    let s = cb.lookup("s").unwrap();
    cb.val(s).val(0);
    let err = expect_code_error(|| {
        cb.index_ref_src(1, Some(Span::new(0, 4)));
    });
    assert_eq!(err.msg, "cannot assign to s[0] (strings are immutable)");
}

#[test]
fn index_into_string_yields_byte() {
    let mut cb = builder();
    let f = cb.new_func(None, "f", vec![], vec![], false).unwrap();
    let string = cb.type_store().basic(BasicKind::String);
    cb.body_start(f).new_var(string, &["s"]);
    let s = cb.lookup("s").unwrap();
    cb.val(s).val(0).index(1, false);
    assert_eq!(cb.ty_str(cb.get(-1).typ.unwrap()), "uint8");
    cb.end_stmt().end();
}

#[test]
fn two_value_index_requires_map() {
    let mut cb = builder();
    let f = cb.new_func(None, "f", vec![], vec![], false).unwrap();
    let int = cb.type_store().basic(BasicKind::Int);
    let slice = cb.type_store().slice_of(int);
    cb.body_start(f).new_var(slice, &["xs"]);
    let xs = cb.lookup("xs").unwrap();
    cb.val(xs).val(0);
    let err = expect_code_error(|| {
        cb.index(1, true);
    });
    assert_eq!(err.msg, "assignment mismatch: 2 variables but 1 values");
}

#[test]
fn two_value_index_on_map_yields_tuple() {
    let mut cb = builder();
    let f = cb.new_func(None, "f", vec![], vec![], false).unwrap();
    let int = cb.type_store().basic(BasicKind::Int);
    let string = cb.type_store().basic(BasicKind::String);
    let map = cb.type_store().map_of(string, int);
    cb.body_start(f).new_var(map, &["m"]);
    let m = cb.lookup("m").unwrap();
    cb.val(m).val("k").index(1, true);
    assert_eq!(cb.ty_str(cb.get(-1).typ.unwrap()), "(int, bool)");
    cb.reset_stmt().end();
}

#[test]
fn zero_lit_matrix() {
    let mut cb = builder();
    let int = cb.type_store().basic(BasicKind::Int);
    let string = cb.type_store().basic(BasicKind::String);
    let boolean = cb.type_store().basic(BasicKind::Bool);
    let slice = cb.type_store().slice_of(int);
    let pt = point_type(&mut cb);

    cb.zero_lit(boolean);
    assert_eq!(cb.get(-1).cval, Some(gobuild::Const::Bool(false)));
    cb.zero_lit(string);
    assert_eq!(cb.get(-1).cval, Some(gobuild::Const::Str(String::new())));
    cb.zero_lit(int);
    assert_eq!(cb.get(-1).cval, Some(gobuild::Const::Int(0)));
    cb.zero_lit(slice);
    let a = cb.arena();
    assert!(
        matches!(a.exprs[cb.get(-1).expr_id().unwrap()], Expr::Ident(s) if cb.interner().resolve(s) == "nil")
    );
    cb.zero_lit(pt);
    let a = cb.arena();
    assert!(matches!(
        a.exprs[cb.get(-1).expr_id().unwrap()],
        Expr::CompositeLit { .. }
    ));
    cb.internal_stack().set_len(0);
}
