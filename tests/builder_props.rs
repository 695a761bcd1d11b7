use gobuild::num::bigint::BigInt;
use gobuild::{BasicKind, BinaryOp, CodeBuilder, Config, Const};
use proptest::prelude::*;

fn builder() -> CodeBuilder {
    CodeBuilder::new("github.com/x/foo", "foo", Config::default())
}

fn cval_as_big(c: &Const) -> BigInt {
    match c {
        Const::Int(v) => BigInt::from(*v),
        Const::Big(b) => b.clone(),
        c => panic!("expected integer constant, got {c:?}"),
    }
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 512,
        .. ProptestConfig::default()
    })]

    /// Folding over untyped integer constants always agrees with
    /// arbitrary-precision arithmetic, and the result type is the untyped
    /// promotion join (int here).
    #[test]
    fn binary_fold_matches_bigint(a in any::<i64>(), b in any::<i64>(), op_idx in 0usize..3) {
        let ops = [BinaryOp::Add, BinaryOp::Sub, BinaryOp::Mul];
        let op = ops[op_idx];
        let mut cb = builder();
        cb.val(a).val(b).binary_op(op);
        let got = cval_as_big(cb.get(-1).cval.as_ref().expect("constant folded"));
        let (ba, bb) = (BigInt::from(a), BigInt::from(b));
        let want = match op {
            BinaryOp::Add => ba + bb,
            BinaryOp::Sub => ba - bb,
            BinaryOp::Mul => ba * bb,
            _ => unreachable!(),
        };
        prop_assert_eq!(got, want);
        prop_assert_eq!(cb.ty_str(cb.get(-1).typ.unwrap()), "untyped int");
    }

    /// Every expression instruction consumes its arity and pushes exactly
    /// one operand: a chain of N pushes and N-1 folds nets one element.
    #[test]
    fn stack_arity_is_balanced(values in prop::collection::vec(any::<i32>(), 1..24)) {
        let mut cb = builder();
        for &v in &values {
            cb.val(v);
        }
        for _ in 1..values.len() {
            cb.binary_op(BinaryOp::Add);
        }
        prop_assert_eq!(cb.internal_stack().len(), 1);
        let sum: i64 = values.iter().map(|&v| v as i64).sum();
        prop_assert_eq!(cb.get(-1).cval.clone(), Some(Const::Int(sum)));
    }

    /// Closing a block always restores the operand stack to the base
    /// length recorded at open.
    #[test]
    fn block_close_restores_stack_base(n in 1usize..8) {
        let mut cb = builder();
        let f = cb.new_func(None, "f", vec![], vec![], false).unwrap();
        cb.body_start(f);
        let base = cb.internal_stack().len();
        cb.block();
        for i in 0..n {
            cb.val(i as i32).end_stmt();
        }
        cb.end();
        prop_assert_eq!(cb.internal_stack().len(), base);
        cb.end();
    }

    /// Comparisons over integer constants fold to the boolean truth.
    #[test]
    fn comparison_fold_is_exact(a in any::<i64>(), b in any::<i64>()) {
        let mut cb = builder();
        cb.val(a).val(b).binary_op(BinaryOp::Le);
        prop_assert_eq!(cb.get(-1).cval.clone(), Some(Const::Bool(a <= b)));
    }

    /// Interned composites are shared: the same element type always
    /// yields the same slice type id.
    #[test]
    fn composite_types_are_interned(k in 0usize..4) {
        let kinds = [BasicKind::Int, BasicKind::String, BasicKind::Bool, BasicKind::Float64];
        let mut cb = builder();
        let elem = cb.type_store().basic(kinds[k]);
        let s1 = cb.type_store().slice_of(elem);
        let s2 = cb.type_store().slice_of(elem);
        prop_assert_eq!(s1, s2);
        let m1 = cb.type_store().map_of(elem, s1);
        let m2 = cb.type_store().map_of(elem, s2);
        prop_assert_eq!(m1, m2);
    }
}
