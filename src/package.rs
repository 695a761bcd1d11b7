//! Package-level state: file buckets, dependency registry, synthetic name
//! allocation, and the distinguished untyped big-number types.

use std::collections::HashMap;

use crate::ast::Symbol;
use crate::imports::File;
use crate::scope::ScopeId;
use crate::typesys::Ty;

/// An imported dependency, shared by both file buckets.
#[derive(Debug)]
pub struct DepPkg {
    /// Declared package name; rewritten on import collision.
    pub name: Symbol,
    /// Scope holding the package's exported members.
    pub scope: ScopeId,
    /// Set once the load collaborator has populated the scope.
    pub loaded: bool,
}

/// The package under construction.
pub struct Package {
    pub path: String,
    pub name: String,
    /// Operator marker prefix (`Gop_` by default): the stable contract
    /// between user libraries and the operator resolver.
    pub prefix: String,
    pub(crate) auto_prefix: String,
    pub(crate) auto_idx: u32,
    /// Regular and testing file buckets.
    pub(crate) files: [File; 2],
    pub(crate) testing: bool,
    pub(crate) deps: HashMap<Symbol, DepPkg>,
    pub(crate) universe: ScopeId,
    pub(crate) builtin: ScopeId,
    /// The package's own top-level scope.
    pub(crate) types_scope: ScopeId,
    /// Distinguished named types for untyped big constants, injected by
    /// the driver.
    pub(crate) ut_big_int: Option<Ty>,
    pub(crate) ut_big_rat: Option<Ty>,
    pub(crate) ut_big_flt: Option<Ty>,
    pub(crate) ty_error: Ty,
    pub(crate) any: Ty,
}

impl Package {
    /// Allocates a fresh synthetic identifier (`_autoGop_1`, ...).
    pub(crate) fn auto_name(&mut self) -> String {
        self.auto_idx += 1;
        format!("{}{}", self.auto_prefix, self.auto_idx)
    }

    #[inline]
    pub(crate) fn file_mut(&mut self) -> &mut File {
        &mut self.files[self.testing as usize]
    }

    #[inline]
    pub(crate) fn file(&self) -> &File {
        &self.files[self.testing as usize]
    }
}
