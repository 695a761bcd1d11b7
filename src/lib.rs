//! Programmatic constructor for typed Go ASTs.
//!
//! Front-ends of source-to-source compilers feed a linear instruction
//! stream ("push this value", "call with N arguments", "start a
//! for-range loop") and receive a fully elaborated, type-checked AST
//! together with the package-level symbol table. Name resolution, operator
//! and overload resolution (via the `Gop_`-prefixed method-name
//! convention), untyped-constant promotion and folding, and import
//! accounting all happen at construction time.
//!
//! A builder instance is strictly single-threaded: the operand stack, the
//! current block context, the file buckets, and the name-allocation
//! counter are shared mutable state with no locking. No instruction
//! suspends; each executes to completion before returning.

pub mod assign;
pub mod ast;
pub mod builder;
pub mod builtin;
pub mod constant;
pub mod decl;
pub mod error;
pub mod imports;
pub mod package;
pub mod scope;
pub mod stack;
pub mod stmt;
pub mod typesys;
pub mod walk;

pub use assign::InstrFlags;
pub use ast::{
    AssignOp, AssignTok, AstArena, BinaryOp, BranchTok, ChanDir, Expr, ExprId, IncDecOp,
    Interner, LitKind, Pos, Span, Stmt, StmtId, Symbol, TypeExpr, TypeExprId, UnaryOp,
};
pub use builder::{CodeBuilder, Config, LoadNamedFn, LoadPkgsFn, MemberFlag, MemberKind, Nil};
pub use constant::Const;
pub use decl::{FuncRef, TypeDecl};
pub use error::{CodeError, LoadError, NodeInterp, NodeInterpreter, Position};
pub use scope::{Obj, ObjKind, ScopeId};
pub use stack::{Element, Stack};
pub use stmt::LabelRef;
pub use typesys::{BasicKind, Method, StructField, Ty, TypeKind, TypeStore};

/// Re-exported for drivers supplying big constants.
pub use num;

use std::sync::atomic::{AtomicBool, Ordering};

// =============================================================================
// Debug channel
// =============================================================================

pub const DBG_FLAG_INSTRUCTION: u32 = 1 << 0;
pub const DBG_FLAG_IMPORT: u32 = 1 << 1;
pub const DBG_FLAG_MATCH: u32 = 1 << 2;
pub const DBG_FLAG_COMMENTS: u32 = 1 << 3;
pub const DBG_FLAG_WRITE_FILE: u32 = 1 << 4;
pub const DBG_FLAG_SET_DEBUG: u32 = 1 << 5;
pub const DBG_FLAG_PERSIST_CACHE: u32 = 1 << 6;
pub const DBG_FLAG_ALL: u32 = DBG_FLAG_INSTRUCTION
    | DBG_FLAG_IMPORT
    | DBG_FLAG_MATCH
    | DBG_FLAG_COMMENTS
    | DBG_FLAG_WRITE_FILE
    | DBG_FLAG_SET_DEBUG
    | DBG_FLAG_PERSIST_CACHE;

static DEBUG_INSTR: AtomicBool = AtomicBool::new(false);
static DEBUG_IMPORT: AtomicBool = AtomicBool::new(false);
static DEBUG_MATCH: AtomicBool = AtomicBool::new(false);
static DEBUG_COMMENTS: AtomicBool = AtomicBool::new(false);
static DEBUG_WRITE_FILE: AtomicBool = AtomicBool::new(false);
static DEBUG_PERSIST_CACHE: AtomicBool = AtomicBool::new(false);

/// Routes diagnostic tracing (over the `log` facade) per subsystem.
pub fn set_debug(flags: u32) {
    DEBUG_INSTR.store(flags & DBG_FLAG_INSTRUCTION != 0, Ordering::Relaxed);
    DEBUG_IMPORT.store(flags & DBG_FLAG_IMPORT != 0, Ordering::Relaxed);
    DEBUG_MATCH.store(flags & DBG_FLAG_MATCH != 0, Ordering::Relaxed);
    DEBUG_COMMENTS.store(flags & DBG_FLAG_COMMENTS != 0, Ordering::Relaxed);
    DEBUG_WRITE_FILE.store(flags & DBG_FLAG_WRITE_FILE != 0, Ordering::Relaxed);
    DEBUG_PERSIST_CACHE.store(flags & DBG_FLAG_PERSIST_CACHE != 0, Ordering::Relaxed);
    if flags & DBG_FLAG_SET_DEBUG != 0 {
        log::info!(
            target: "gobuild",
            "set_debug: import={}, match={}, instr={}",
            DEBUG_IMPORT.load(Ordering::Relaxed),
            DEBUG_MATCH.load(Ordering::Relaxed),
            DEBUG_INSTR.load(Ordering::Relaxed)
        );
    }
}

#[inline]
pub(crate) fn debug_instr() -> bool {
    DEBUG_INSTR.load(Ordering::Relaxed)
}

#[inline]
pub(crate) fn debug_match() -> bool {
    DEBUG_MATCH.load(Ordering::Relaxed)
}

#[inline]
pub(crate) fn debug_comments() -> bool {
    DEBUG_COMMENTS.load(Ordering::Relaxed)
}
