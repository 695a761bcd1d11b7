//! The universe scope and the synthetic builtin package.
//!
//! The builtin package holds one object per operator instruction, named by
//! the configurable marker prefix plus the operator's method suffix
//! (`Gop_Add`, `Gop_Lsh`, `Gop_AddAssign`, ...). Operator resolution that
//! does not hit a method on a named type falls back to these objects. The
//! universe scope (the builtin package's parent) carries the predeclared
//! type names, `true`/`false`/`nil`, and the intrinsic functions.

use crate::ast::{AssignOp, BinaryOp, IncDecOp, Interner, Pos, UnaryOp};
use crate::constant::Const;
use crate::scope::{Obj, ObjData, ObjKind, ScopeId, ScopeTree};
use crate::typesys::{BasicKind, Method, TypeKind, TypeStore, Ty};

/// A builtin instruction: an operator or intrinsic resolved by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Instr {
    Binary(BinaryOp),
    Unary(UnaryOp),
    IncDec(IncDecOp),
    OpAssign(AssignOp),
    New,
    Make,
    Len,
    Cap,
    Append,
    Copy,
    Delete,
    Panic,
}

/// Handles produced by universe construction.
pub struct Universe {
    pub scope: ScopeId,
    /// The predeclared `error` interface type.
    pub ty_error: Ty,
    /// `interface{}` (the empty, complete interface).
    pub any: Ty,
}

const BASIC_NAMES: &[(&str, BasicKind)] = &[
    ("bool", BasicKind::Bool),
    ("int", BasicKind::Int),
    ("int8", BasicKind::Int8),
    ("int16", BasicKind::Int16),
    ("int32", BasicKind::Int32),
    ("int64", BasicKind::Int64),
    ("uint", BasicKind::Uint),
    ("uint8", BasicKind::Uint8),
    ("uint16", BasicKind::Uint16),
    ("uint32", BasicKind::Uint32),
    ("uint64", BasicKind::Uint64),
    ("uintptr", BasicKind::Uintptr),
    ("float32", BasicKind::Float32),
    ("float64", BasicKind::Float64),
    ("complex64", BasicKind::Complex64),
    ("complex128", BasicKind::Complex128),
    ("string", BasicKind::String),
    // Aliases share the id of their target kind.
    ("byte", BasicKind::Uint8),
    ("rune", BasicKind::Int32),
];

/// Builds the universe scope: predeclared types, constants, and intrinsic
/// functions.
pub fn new_universe(it: &mut Interner, types: &mut TypeStore, scopes: &mut ScopeTree) -> Universe {
    let scope = scopes.new_scope(None, "universe");

    for &(name, kind) in BASIC_NAMES {
        let sym = it.intern(name);
        let ty = types.basic(kind);
        let obj = scopes.new_obj(ObjData {
            name: sym,
            ty,
            pos: Pos::NONE,
            pkg: None,
            kind: ObjKind::TypeName,
        });
        scopes.insert(scope, obj);
    }

    // error: interface { Error() string }
    let err_sym = it.intern("error");
    let string_ty = types.basic(BasicKind::String);
    let err_result = scopes.new_obj(ObjData {
        name: it.intern(""),
        ty: string_ty,
        pos: Pos::NONE,
        pkg: None,
        kind: ObjKind::Var,
    });
    let err_sig = types.signature(None, vec![], vec![err_result], false);
    let err_iface = types.interface_of(
        vec![Method {
            name: it.intern("Error"),
            sig: err_sig,
        }],
        true,
    );
    let ty_error = types.named(None, err_sym, Some(err_iface));
    let err_obj = scopes.new_obj(ObjData {
        name: err_sym,
        ty: ty_error,
        pos: Pos::NONE,
        pkg: None,
        kind: ObjKind::TypeName,
    });
    scopes.insert(scope, err_obj);

    let any = types.interface_of(vec![], true);

    let untyped_bool = types.basic(BasicKind::UntypedBool);
    for (name, value) in [("true", true), ("false", false)] {
        let obj = scopes.new_obj(ObjData {
            name: it.intern(name),
            ty: untyped_bool,
            pos: Pos::NONE,
            pkg: None,
            kind: ObjKind::Const(Some(Const::Bool(value))),
        });
        scopes.insert(scope, obj);
    }

    let nil_ty = types.basic(BasicKind::UntypedNil);
    let nil_obj = scopes.new_obj(ObjData {
        name: it.intern("nil"),
        ty: nil_ty,
        pos: Pos::NONE,
        pkg: None,
        kind: ObjKind::Var,
    });
    scopes.insert(scope, nil_obj);

    for (name, instr) in [
        ("new", Instr::New),
        ("make", Instr::Make),
        ("len", Instr::Len),
        ("cap", Instr::Cap),
        ("append", Instr::Append),
        ("copy", Instr::Copy),
        ("delete", Instr::Delete),
        ("panic", Instr::Panic),
    ] {
        let ty = types.instr(instr);
        let obj = scopes.new_obj(ObjData {
            name: it.intern(name),
            ty,
            pos: Pos::NONE,
            pkg: None,
            kind: ObjKind::Builtin(instr),
        });
        scopes.insert(scope, obj);
    }

    Universe {
        scope,
        ty_error,
        any,
    }
}

const BINARY_OPS: &[BinaryOp] = &[
    BinaryOp::Add,
    BinaryOp::Sub,
    BinaryOp::Mul,
    BinaryOp::Quo,
    BinaryOp::Rem,
    BinaryOp::And,
    BinaryOp::Or,
    BinaryOp::Xor,
    BinaryOp::AndNot,
    BinaryOp::Lsh,
    BinaryOp::Rsh,
    BinaryOp::LAnd,
    BinaryOp::LOr,
    BinaryOp::Lt,
    BinaryOp::Le,
    BinaryOp::Gt,
    BinaryOp::Ge,
    BinaryOp::Eq,
    BinaryOp::Ne,
];

const UNARY_OPS: &[UnaryOp] = &[
    UnaryOp::Pos,
    UnaryOp::Neg,
    UnaryOp::Not,
    UnaryOp::LNot,
    UnaryOp::Recv,
    UnaryOp::Addr,
];

const ASSIGN_OPS: &[AssignOp] = &[
    AssignOp::AddAssign,
    AssignOp::SubAssign,
    AssignOp::MulAssign,
    AssignOp::QuoAssign,
    AssignOp::RemAssign,
    AssignOp::AndAssign,
    AssignOp::OrAssign,
    AssignOp::XorAssign,
    AssignOp::AndNotAssign,
    AssignOp::LshAssign,
    AssignOp::RshAssign,
];

/// Builds the builtin package scope as a child of the universe, populating
/// one instruction object per operator name.
pub fn new_builtin(
    it: &mut Interner,
    types: &mut TypeStore,
    scopes: &mut ScopeTree,
    universe: ScopeId,
    prefix: &str,
) -> ScopeId {
    let scope = scopes.new_scope(Some(universe), "builtin");
    let mut declare = |it: &mut Interner, types: &mut TypeStore, scopes: &mut ScopeTree, suffix: &str, instr: Instr| {
        let name = it.intern(&format!("{prefix}{suffix}"));
        let ty = types.instr(instr);
        let obj = scopes.new_obj(ObjData {
            name,
            ty,
            pos: Pos::NONE,
            pkg: None,
            kind: ObjKind::Builtin(instr),
        });
        scopes.insert(scope, obj);
    };

    for &op in BINARY_OPS {
        declare(it, types, scopes, op.method_suffix(), Instr::Binary(op));
    }
    for &op in UNARY_OPS {
        declare(it, types, scopes, op.method_suffix(), Instr::Unary(op));
    }
    for &op in ASSIGN_OPS {
        declare(it, types, scopes, op.method_suffix(), Instr::OpAssign(op));
    }
    declare(it, types, scopes, IncDecOp::Inc.method_suffix(), Instr::IncDec(IncDecOp::Inc));
    declare(it, types, scopes, IncDecOp::Dec.method_suffix(), Instr::IncDec(IncDecOp::Dec));

    scope
}

/// Pseudo-method on a builtin type: `x.len` resolves to `len(x)`.
#[derive(Debug, Clone, Copy)]
pub struct BtiMethod {
    pub name: &'static str,
    pub instr: Instr,
}

const LEN_ONLY: &[BtiMethod] = &[BtiMethod {
    name: "Len",
    instr: Instr::Len,
}];

const LEN_CAP: &[BtiMethod] = &[
    BtiMethod {
        name: "Len",
        instr: Instr::Len,
    },
    BtiMethod {
        name: "Cap",
        instr: Instr::Cap,
    },
];

/// Built-in-type-info table consulted by member resolution for operands
/// whose type is basic, slice, map, array, or channel.
pub fn bti_methods(types: &TypeStore, ty: Ty) -> &'static [BtiMethod] {
    match types.kind(ty) {
        TypeKind::Basic(k) if k.is_string() => LEN_ONLY,
        TypeKind::Slice { .. } | TypeKind::Array { .. } | TypeKind::Chan { .. } => LEN_CAP,
        TypeKind::Map { .. } => LEN_ONLY,
        _ => &[],
    }
}
