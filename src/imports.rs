//! Per-file import tables and use-marking.
//!
//! Each file bucket tracks its imports as `PkgRef`s. References to an
//! imported package's members collect the qualifier `Expr::Ident` nodes,
//! so that (a) finalization can mark exactly the used imports, and (b) a
//! collision rename can rewrite every reference in place. When the driver
//! has removed expressions from the tree, the collected reference lists
//! can no longer be trusted and finalization degrades to a full AST walk.

use std::collections::{HashMap, HashSet};

use crate::ast::{
    AstArena, Decl, DeclId, Expr, ExprId, GenDeclKind, Spec, Symbol, Span, TypeExpr,
};
use crate::builder::CodeBuilder;
use crate::error::CodeError;
use crate::package::DepPkg;
use crate::scope::{Obj, ObjData, ObjKind, ScopeId};
use crate::typesys::Ty;
use crate::walk::{Visitor, Walk};

/// One imported package as seen by one file.
#[derive(Debug, Default)]
pub struct PkgRef {
    /// Qualifier identifiers referencing this package, for use-marking
    /// and collision renames.
    pub name_refs: Vec<ExprId>,
    pub is_used: bool,
    /// Blank imports survive finalization even when unused.
    pub is_force_used: bool,
    pub in_testing_file: bool,
}

/// A file bucket: ordered declarations plus its import table.
#[derive(Debug, Default)]
pub struct File {
    pub decls: Vec<DeclId>,
    pub imports: HashMap<Symbol, PkgRef>,
    /// All import paths in first-seen order.
    pub all_paths: Vec<Symbol>,
    /// Paths whose load is still pending.
    pub delay_paths: Vec<Symbol>,
    pub(crate) big: Option<Symbol>,
    /// Set when the driver removed expressions; forces the full-walk
    /// recomputation of the used set.
    pub removed_exprs: bool,
}

impl File {
    pub(crate) fn import_pkg(&mut self, path: Symbol, testing: bool) -> &mut PkgRef {
        let known = self.imports.contains_key(&path);
        if !known {
            self.imports.insert(
                path,
                PkgRef {
                    in_testing_file: testing,
                    ..PkgRef::default()
                },
            );
        }
        if !known || !self.all_paths.contains(&path) {
            self.all_paths.push(path);
            self.delay_paths.push(path);
        }
        self.imports.get_mut(&path).unwrap()
    }
}

/// Allocator that renames colliding import names (`v1` → `_autoGop_v1`).
#[derive(Debug, Default)]
pub struct AutoNames {
    used: HashSet<String>,
    auto_prefix: String,
}

impl AutoNames {
    pub fn new(auto_prefix: &str) -> Self {
        Self {
            used: HashSet::new(),
            auto_prefix: auto_prefix.to_string(),
        }
    }

    /// Returns a unique name for `name` and whether it was renamed.
    pub fn require_name(&mut self, name: &str) -> (String, bool) {
        if self.used.insert(name.to_string()) {
            return (name.to_string(), false);
        }
        let mut candidate = format!("{}{}", self.auto_prefix, name);
        let mut i = 1;
        while !self.used.insert(candidate.clone()) {
            i += 1;
            candidate = format!("{}{}{}", self.auto_prefix, name, i);
        }
        (candidate, true)
    }
}

/// Visitor that recomputes the used-import set from the whole tree.
struct UseMarker<'a> {
    /// Declared import name → paths bearing that name.
    names: &'a HashMap<Symbol, Vec<Symbol>>,
    used: HashSet<Symbol>,
}

impl<'a, 'ast> Visitor<'ast> for UseMarker<'a> {
    fn visit_expr(&mut self, a: &'ast AstArena, id: ExprId) {
        if let Expr::Selector { x, .. } = a.exprs[id] {
            if let Expr::Ident(sym) = a.exprs[x] {
                if let Some(paths) = self.names.get(&sym) {
                    self.used.extend(paths.iter().copied());
                    return;
                }
            }
        }
        a.exprs[id].walk(a, self);
    }

    fn visit_type_expr(&mut self, a: &'ast AstArena, id: crate::ast::TypeExprId) {
        if let TypeExpr::Name { pkg: Some(p), .. } = a.type_exprs[id] {
            if let Expr::Ident(sym) = a.exprs[p] {
                if let Some(paths) = self.names.get(&sym) {
                    self.used.extend(paths.iter().copied());
                    return;
                }
            }
        }
        a.type_exprs[id].walk(a, self);
    }
}

impl CodeBuilder {
    /// Imports a package into the current file. Idempotent per file.
    pub fn import_(&mut self, path: &str) -> Symbol {
        let sym = self.interner.intern(path);
        self.ensure_dep(sym);
        let testing = self.pkg.testing;
        self.pkg.file_mut().import_pkg(sym, testing);
        log::debug!(target: "gobuild::import", "import {path}");
        sym
    }

    /// Marks an import as force-used: it is emitted as a blank import even
    /// when nothing references it.
    pub fn force_use(&mut self, path: Symbol) {
        let testing = self.pkg.testing;
        self.pkg.file_mut().import_pkg(path, testing).is_force_used = true;
    }

    /// The current file's `math/big` import, created on first use.
    pub(crate) fn big_pkg(&mut self) -> Symbol {
        if let Some(p) = self.pkg.file().big {
            return p;
        }
        let p = self.import_("math/big");
        self.pkg.file_mut().big = Some(p);
        p
    }

    fn ensure_dep(&mut self, path: Symbol) {
        if self.pkg.deps.contains_key(&path) {
            return;
        }
        let default_name = {
            let p = self.interner.resolve(path);
            p.rsplit('/').next().unwrap_or(p).to_string()
        };
        let name = self.interner.intern(&default_name);
        let scope = self.scopes.new_scope(Some(self.pkg.universe), "package");
        self.pkg.deps.insert(
            path,
            DepPkg {
                name,
                scope,
                loaded: false,
            },
        );
    }

    /// Registers (or re-registers) a dependency package with a known name,
    /// marking it loaded. Load collaborators and tests populate members
    /// with `declare_pkg_member`.
    pub fn declare_pkg(&mut self, path: &str, name: &str) -> Symbol {
        let path_sym = self.interner.intern(path);
        self.ensure_dep(path_sym);
        let name_sym = self.interner.intern(name);
        let dep = self.pkg.deps.get_mut(&path_sym).unwrap();
        dep.name = name_sym;
        dep.loaded = true;
        path_sym
    }

    /// Declares one exported member of a dependency package.
    pub fn declare_pkg_member(&mut self, path: Symbol, name: &str, ty: Ty, kind: ObjKind) -> Obj {
        self.ensure_dep(path);
        let name_sym = self.interner.intern(name);
        let scope = self.pkg.deps[&path].scope;
        let obj = self.scopes.new_obj(ObjData {
            name: name_sym,
            ty,
            pos: crate::ast::Pos::NONE,
            pkg: Some(path),
            kind,
        });
        self.scopes.insert(scope, obj);
        obj
    }

    /// Scope holding a dependency's exported members.
    pub fn dep_scope(&self, path: Symbol) -> Option<ScopeId> {
        self.pkg.deps.get(&path).map(|d| d.scope)
    }

    /// Resolves a member of an imported package, loading pending imports
    /// first.
    pub fn pkg_member(&mut self, path: Symbol, name: &str) -> Result<Obj, CodeError> {
        self.end_import();
        let name_sym = self.interner.intern(name);
        let dep = match self.pkg.deps.get(&path) {
            Some(d) => d,
            None => {
                let msg = format!("package {} not imported", self.interner.resolve(path));
                return Err(self.code_error(None, msg));
            }
        };
        match self.scopes.lookup_local(dep.scope, name_sym) {
            Some(obj) => Ok(obj),
            None => {
                let msg = format!("undefined: {}.{}", self.interner.resolve(path), name);
                Err(self.code_error(None, msg))
            }
        }
    }

    /// Invokes the load collaborator over the pending import paths.
    ///
    /// A loader reporting errors is fatal: construction cannot proceed
    /// without type information.
    pub(crate) fn end_import(&mut self) {
        let pending: Vec<Symbol> = std::mem::take(&mut self.pkg.file_mut().delay_paths)
            .into_iter()
            .filter(|p| !self.pkg.deps.get(p).map(|d| d.loaded).unwrap_or(false))
            .collect();
        if pending.is_empty() {
            return;
        }
        let paths: Vec<String> = pending
            .iter()
            .map(|&p| self.interner.resolve(p).to_string())
            .collect();
        log::debug!(target: "gobuild::import", "load packages {paths:?}");
        if let Some(mut loader) = self.load_pkgs.take() {
            let errs = loader(self, &paths);
            self.load_pkgs = Some(loader);
            if errs > 0 {
                panic!("total {errs} errors");
            }
        }
        for p in pending {
            if let Some(dep) = self.pkg.deps.get_mut(&p) {
                dep.loaded = true;
            }
        }
    }

    /// Notes that expressions were removed from the tree, invalidating the
    /// collected reference lists.
    pub fn mark_exprs_removed(&mut self) {
        self.pkg.file_mut().removed_exprs = true;
    }

    /// Records a qualifier identifier as a reference to `path` in the
    /// current file.
    pub(crate) fn record_pkg_ref(&mut self, path: Symbol, ident: ExprId) {
        let testing = self.pkg.testing;
        let fref = self.pkg.file_mut().import_pkg(path, testing);
        fref.name_refs.push(ident);
    }

    fn mark_used(&mut self, testing: bool) {
        let file = &self.pkg.files[testing as usize];
        if file.removed_exprs {
            let mut names: HashMap<Symbol, Vec<Symbol>> = HashMap::new();
            for &path in file.imports.keys() {
                if let Some(dep) = self.pkg.deps.get(&path) {
                    names.entry(dep.name).or_default().push(path);
                }
            }
            let mut marker = UseMarker {
                names: &names,
                used: HashSet::new(),
            };
            for &decl in &file.decls {
                marker.visit_decl(&self.ast, decl);
            }
            let used = marker.used;
            let file = &mut self.pkg.files[testing as usize];
            for (path, pref) in file.imports.iter_mut() {
                if used.contains(path) {
                    pref.is_used = true;
                }
            }
            return;
        }
        let file = &mut self.pkg.files[testing as usize];
        for pref in file.imports.values_mut() {
            if !pref.name_refs.is_empty() {
                pref.is_used = true;
            }
        }
    }

    /// Finalizes one file bucket: marks used imports, drops unused ones
    /// (keeping force-used as blank imports), renames collisions, and
    /// returns the declaration list with the import declaration in front.
    pub fn file_decls(&mut self, testing: bool) -> Vec<DeclId> {
        self.mark_used(testing);

        let all_paths = self.pkg.files[testing as usize].all_paths.clone();
        if all_paths.is_empty() {
            return self.pkg.files[testing as usize].decls.clone();
        }

        let mut names = AutoNames::new(&self.pkg.auto_prefix.clone());
        let underscore = self.interner.intern("_");
        let mut specs = Vec::new();
        for path in all_paths {
            let (is_used, is_force_used) = {
                let pref = &self.pkg.files[testing as usize].imports[&path];
                (pref.is_used, pref.is_force_used)
            };
            if !is_used {
                if is_force_used {
                    let spec = self.ast.specs.alloc(
                        Spec::Import {
                            name: Some(underscore),
                            path,
                        },
                        Span::default(),
                    );
                    specs.push(spec);
                }
                continue;
            }
            let declared = self.pkg.deps[&path].name;
            let (name, renamed) = names.require_name(self.interner.resolve(declared));
            let name_sym = self.interner.intern(&name);
            if renamed {
                log::debug!(target: "gobuild::import", "rename import {} -> {}", self.interner.resolve(declared), name);
                self.pkg.deps.get_mut(&path).unwrap().name = name_sym;
                let refs = self.pkg.files[testing as usize].imports[&path]
                    .name_refs
                    .clone();
                for id in refs {
                    self.ast.exprs[id] = Expr::Ident(name_sym);
                }
            }
            let spec = self.ast.specs.alloc(
                Spec::Import {
                    name: Some(name_sym),
                    path,
                },
                Span::default(),
            );
            specs.push(spec);
        }

        let decls = self.pkg.files[testing as usize].decls.clone();
        if specs.is_empty() {
            return decls;
        }
        let spec_list = self.ast.list_specs(specs);
        let import_decl = self.ast.decls.alloc(
            Decl::Gen {
                kind: GenDeclKind::Import,
                specs: spec_list,
            },
            Span::default(),
        );
        let mut out = Vec::with_capacity(decls.len() + 1);
        out.push(import_decl);
        out.extend(decls);
        out
    }

    /// Switches between the regular and testing file buckets.
    pub fn set_in_testing_file(&mut self, testing: bool) -> bool {
        std::mem::replace(&mut self.pkg.testing, testing)
    }

    pub fn in_testing_file(&self) -> bool {
        self.pkg.testing
    }

    pub fn has_testing_file(&self) -> bool {
        !self.pkg.files[1].decls.is_empty()
    }
}
