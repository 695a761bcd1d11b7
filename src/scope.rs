//! Lexical scope tree and language objects.
//!
//! Scopes form a tree with parent links; each maps an interned name to one
//! object. Insertion is first-wins: inserting a duplicate returns the
//! previous occupant so the caller can raise a "redeclared" diagnostic.
//! Objects live in a flat arena and may outlive the scope that introduced
//! them via references from the produced AST.

use std::collections::HashMap;

use crate::ast::{Pos, Symbol};
use crate::builtin::Instr;
use crate::constant::Const;
use crate::typesys::Ty;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct ScopeId(u32);

impl ScopeId {
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Object handle: variable, constant, type name, function, builtin
/// instruction, or package name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Obj(u32);

impl Obj {
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ObjKind {
    Var,
    /// Compile-time constant; the value may be absent for non-constant
    /// expressions bound to a const name during error recovery.
    Const(Option<Const>),
    TypeName,
    Func,
    Builtin(Instr),
    /// Import binding; payload is the package path.
    PkgName(Symbol),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjData {
    pub name: Symbol,
    pub ty: Ty,
    pub pos: Pos,
    /// Path of the package this object belongs to; `None` for objects of
    /// the package under construction, the universe, and the builtin
    /// package.
    pub pkg: Option<Symbol>,
    pub kind: ObjKind,
}

#[derive(Debug)]
struct ScopeData {
    parent: Option<ScopeId>,
    names: HashMap<Symbol, Obj>,
    #[allow(dead_code)]
    desc: &'static str,
}

#[derive(Debug, Default)]
pub struct ScopeTree {
    scopes: Vec<ScopeData>,
    objs: Vec<ObjData>,
}

impl ScopeTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_scope(&mut self, parent: Option<ScopeId>, desc: &'static str) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(ScopeData {
            parent,
            names: HashMap::new(),
            desc,
        });
        id
    }

    #[inline]
    pub fn parent(&self, scope: ScopeId) -> Option<ScopeId> {
        self.scopes[scope.0 as usize].parent
    }

    pub fn new_obj(&mut self, data: ObjData) -> Obj {
        let id = Obj(self.objs.len() as u32);
        self.objs.push(data);
        id
    }

    #[inline]
    pub fn obj(&self, obj: Obj) -> &ObjData {
        &self.objs[obj.0 as usize]
    }

    #[inline]
    pub fn obj_mut(&mut self, obj: Obj) -> &mut ObjData {
        &mut self.objs[obj.0 as usize]
    }

    /// Inserts `obj` under its own name. Returns the previous occupant on
    /// duplicate, leaving the scope unchanged.
    pub fn insert(&mut self, scope: ScopeId, obj: Obj) -> Option<Obj> {
        let name = self.objs[obj.0 as usize].name;
        let data = &mut self.scopes[scope.0 as usize];
        if let Some(&prev) = data.names.get(&name) {
            return Some(prev);
        }
        data.names.insert(name, obj);
        None
    }

    /// Looks up a name in this scope only.
    #[inline]
    pub fn lookup_local(&self, scope: ScopeId, name: Symbol) -> Option<Obj> {
        self.scopes[scope.0 as usize].names.get(&name).copied()
    }

    /// Looks up a name, walking parent scopes.
    pub fn lookup(&self, scope: ScopeId, name: Symbol) -> Option<Obj> {
        let mut cur = Some(scope);
        while let Some(s) = cur {
            if let Some(obj) = self.lookup_local(s, name) {
                return Some(obj);
            }
            cur = self.parent(s);
        }
        None
    }
}
