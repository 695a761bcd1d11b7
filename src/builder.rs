//! The code builder: a fluent, reverse-Polish instruction surface that
//! elaborates and type-checks a Go AST while it is being constructed.
//!
//! Expression-producing instructions consume a fixed arity from the operand
//! stack and push exactly one result; statement-producing instructions
//! append to the current block context. Construction-time duties that a
//! conventional compiler splits between parser, resolver, and checker all
//! happen here, at the instruction boundary.

use std::collections::HashMap;

use num::bigint::BigInt;
use num::rational::BigRational;
use num::traits::ToPrimitive;

use crate::ast::{
    AstArena, AstVal, Callee, CommentGroup, Expr, ExprId, Field, Interner, LitKind, Pos, Span,
    Symbol, TypeExpr, TypeExprId,
};
use crate::builtin::{self, bti_methods};
use crate::constant::Const;
use crate::decl::{FuncData, FuncRef, VarDeclState};
use crate::error::{CodeError, NodeInterp, NodeInterpreter, Position};
use crate::package::Package;
use crate::scope::{Obj, ObjData, ObjKind, ScopeId, ScopeTree};
use crate::stack::{Element, Stack};
use crate::stmt::{BlockCtx, BlockKind, LabelInfo};
use crate::typesys::{BasicKind, StructField, TypeKind, TypeStore, Ty};

/// Lazy loader for a named type's underlying and method set. Must be
/// idempotent and synchronous.
pub type LoadNamedFn = Box<dyn FnMut(&mut CodeBuilder, Ty)>;

/// Loader for imported packages; returns the number of errors. A non-zero
/// count is fatal to construction.
pub type LoadPkgsFn = Box<dyn FnMut(&mut CodeBuilder, &[String]) -> usize>;

/// Builder configuration. Every collaborator is optional; the defaults
/// are: panic on error, no position information, no lazy loading.
#[derive(Default)]
pub struct Config {
    /// Operator marker prefix; defaults to `Gop_`.
    pub prefix: Option<String>,
    /// Recoverable-diagnostic sink. When unset, diagnostics panic and the
    /// driver may recover at block boundaries.
    pub handle_err: Option<Box<dyn FnMut(&CodeError)>>,
    pub node_interp: Option<Box<dyn NodeInterpreter>>,
    pub load_named: Option<LoadNamedFn>,
    pub load_pkgs: Option<LoadPkgsFn>,
}

const DEFAULT_PREFIX: &str = "Gop_";

/// The builder. One instance constructs one package and is strictly
/// single-threaded; see the crate docs for the resource model.
pub struct CodeBuilder {
    pub(crate) interner: Interner,
    pub(crate) ast: AstArena,
    pub(crate) types: TypeStore,
    pub(crate) scopes: ScopeTree,
    pub(crate) pkg: Package,
    pub(crate) stk: Stack,
    pub(crate) blocks: Vec<BlockCtx>,
    pub(crate) funcs: Vec<FuncData>,
    pub(crate) cur_fn: Option<FuncRef>,
    pub(crate) labels: HashMap<Symbol, LabelInfo>,
    pub(crate) var_decls: Vec<VarDeclState>,
    pub(crate) param_insts: HashMap<(FuncRef, Obj), Obj>,
    pub(crate) ending_labels: HashMap<FuncRef, Symbol>,
    pub(crate) comments: Option<CommentGroup>,
    pub(crate) comment_once: bool,
    pub(crate) interp: Box<dyn NodeInterpreter>,
    pub(crate) handle_err_fn: Option<Box<dyn FnMut(&CodeError)>>,
    pub(crate) load_named: Option<LoadNamedFn>,
    pub(crate) load_pkgs: Option<LoadPkgsFn>,
}

impl CodeBuilder {
    /// Creates a builder for the package at `pkg_path` named `name`.
    pub fn new(pkg_path: &str, name: &str, config: Config) -> Self {
        let mut interner = Interner::new();
        let mut types = TypeStore::new();
        let mut scopes = ScopeTree::new();

        let universe = builtin::new_universe(&mut interner, &mut types, &mut scopes);
        let prefix = config.prefix.unwrap_or_else(|| DEFAULT_PREFIX.to_string());
        let builtin_scope =
            builtin::new_builtin(&mut interner, &mut types, &mut scopes, universe.scope, &prefix);
        let types_scope = scopes.new_scope(Some(universe.scope), "package");

        let pkg = Package {
            path: pkg_path.to_string(),
            name: name.to_string(),
            auto_prefix: format!("_auto{prefix}"),
            prefix,
            auto_idx: 0,
            files: Default::default(),
            testing: false,
            deps: HashMap::new(),
            universe: universe.scope,
            builtin: builtin_scope,
            types_scope,
            ut_big_int: None,
            ut_big_rat: None,
            ut_big_flt: None,
            ty_error: universe.ty_error,
            any: universe.any,
        };

        let mut blocks = Vec::new();
        blocks.push(BlockCtx::new(BlockKind::TopLevel, types_scope, 0));

        CodeBuilder {
            interner,
            ast: AstArena::new(),
            types,
            scopes,
            pkg,
            stk: Stack::new(),
            blocks,
            funcs: Vec::new(),
            cur_fn: None,
            labels: HashMap::new(),
            var_decls: Vec::new(),
            param_insts: HashMap::new(),
            ending_labels: HashMap::new(),
            comments: None,
            comment_once: false,
            interp: config.node_interp.unwrap_or_else(|| Box::new(NodeInterp)),
            handle_err_fn: config.handle_err,
            load_named: config.load_named,
            load_pkgs: config.load_pkgs,
        }
    }

    /// Injects the distinguished named types for untyped big constants.
    pub fn set_untyped_big(&mut self, bigint: Ty, bigrat: Ty, bigfloat: Ty) {
        self.pkg.ut_big_int = Some(bigint);
        self.pkg.ut_big_rat = Some(bigrat);
        self.pkg.ut_big_flt = Some(bigfloat);
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn pkg(&self) -> &Package {
        &self.pkg
    }

    pub fn interner(&self) -> &Interner {
        &self.interner
    }

    pub fn intern(&mut self, s: &str) -> Symbol {
        self.interner.intern(s)
    }

    pub fn arena(&self) -> &AstArena {
        &self.ast
    }

    pub fn type_store(&mut self) -> &mut TypeStore {
        &mut self.types
    }

    pub fn scope_tree(&mut self) -> &mut ScopeTree {
        &mut self.scopes
    }

    /// Current scope.
    pub fn scope(&self) -> ScopeId {
        self.cur().scope
    }

    /// Current function; `None` at package level.
    pub fn current_func(&self) -> Option<FuncRef> {
        self.cur_fn
    }

    /// Applies a driver closure to the builder; for introspection.
    pub fn debug(&mut self, f: impl FnOnce(&mut Self)) -> &mut Self {
        f(self);
        self
    }

    /// Stack operand at `idx` (negative counts from the top).
    pub fn get(&self, idx: isize) -> &Element {
        self.stk.get(idx)
    }

    /// Internal stack access; for collaborating drivers only.
    pub fn internal_stack(&mut self) -> &mut Stack {
        &mut self.stk
    }

    #[inline]
    pub(crate) fn cur(&self) -> &BlockCtx {
        self.blocks.last().expect("no current block")
    }

    #[inline]
    pub(crate) fn cur_mut(&mut self) -> &mut BlockCtx {
        self.blocks.last_mut().expect("no current block")
    }

    pub(crate) fn new_var_obj(&mut self, pos: Pos, name: Symbol, ty: Ty) -> Obj {
        self.scopes.new_obj(ObjData {
            name,
            ty,
            pos,
            pkg: None,
            kind: ObjKind::Var,
        })
    }

    /// Creates an anonymous or named parameter object (for signatures).
    pub fn new_param(&mut self, pos: Pos, name: &str, ty: Ty) -> Obj {
        let sym = self.interner.intern(name);
        self.new_var_obj(pos, sym, ty)
    }

    // -------------------------------------------------------------------------
    // Diagnostics
    // -------------------------------------------------------------------------

    pub(crate) fn code_error(&self, pos: Option<Position>, msg: String) -> CodeError {
        CodeError {
            msg,
            pos,
            scope: self.scope(),
            func: self.cur_fn,
        }
    }

    pub(crate) fn position(&self, pos: Pos) -> Position {
        self.interp.position(pos)
    }

    pub(crate) fn load_expr(&self, src: Option<Span>) -> (String, Position) {
        match src {
            Some(span) => self.interp.load_expr(span),
            None => (String::new(), Position::default()),
        }
    }

    pub(crate) fn caller_desc(&self, src: Option<Span>) -> String {
        match src {
            Some(span) => self.interp.caller(span),
            None => String::new(),
        }
    }

    pub(crate) fn error_at(&self, src: Option<Span>, msg: String) -> CodeError {
        let (_, pos) = self.load_expr(src);
        self.code_error(Some(pos), msg)
    }

    pub(crate) fn error_at_pos(&self, pos: Pos, msg: String) -> CodeError {
        self.code_error(Some(self.position(pos)), msg)
    }

    /// Fail-fast path for errors that indicate a driver bug.
    pub(crate) fn panic_code_error(&self, src: Option<Span>, msg: String) -> ! {
        std::panic::panic_any(self.error_at(src, msg))
    }

    /// Routes a diagnostic through the driver's handler; panics when no
    /// handler is configured. Construction continues best-effort after a
    /// handled diagnostic.
    pub(crate) fn report_err(&mut self, err: CodeError) {
        if let Some(mut handler) = self.handle_err_fn.take() {
            handler(&err);
            self.handle_err_fn = Some(handler);
        } else {
            std::panic::panic_any(err);
        }
    }

    // -------------------------------------------------------------------------
    // Lazy loading
    // -------------------------------------------------------------------------

    /// Resolves the structural type behind `ty`, invoking the lazy loader
    /// for named types on first use.
    ///
    /// # Panics
    /// Panics when the loader leaves the named type unresolved (reading an
    /// unresolved underlying is an invariant violation).
    pub(crate) fn underlying(&mut self, ty: Ty) -> Ty {
        if let Some(u) = self.types.underlying_raw(ty) {
            return u;
        }
        if let Some(mut f) = self.load_named.take() {
            f(self, ty);
            self.load_named = Some(f);
        }
        match self.types.underlying_raw(ty) {
            Some(u) => u,
            None => panic!("underlying of {} is not resolved", self.ty_str(ty)),
        }
    }

    /// Triggers the loader when a named type's method set may be
    /// incomplete (methods arrive by the same callback as the underlying).
    pub(crate) fn ensure_loaded(&mut self, ty: Ty) {
        let t = self.types.indirect(ty);
        let needs_load = match self.types.kind(t) {
            TypeKind::Named {
                underlying, methods, ..
            } => underlying.is_none() || methods.is_empty(),
            _ => false,
        };
        if needs_load {
            if crate::debug_match() {
                log::debug!(target: "gobuild::match", "ensure loaded {}", self.ty_str(t));
            }
            if let Some(mut f) = self.load_named.take() {
                f(self, t);
                self.load_named = Some(f);
            }
        }
    }

    /// Renders a type the way diagnostics spell it.
    pub fn ty_str(&self, ty: Ty) -> String {
        self.types.display(ty, &self.scopes, &self.interner)
    }

    /// Looks up a name from the current scope outwards.
    pub fn lookup(&mut self, name: &str) -> Option<Obj> {
        let sym = self.interner.intern(name);
        self.scopes.lookup(self.scope(), sym)
    }

    // -------------------------------------------------------------------------
    // Type rendering
    // -------------------------------------------------------------------------

    /// Lowers a builder type to a generated type expression.
    pub(crate) fn to_type(&mut self, ty: Ty) -> TypeExprId {
        let kind = self.types.kind(ty).clone();
        match kind {
            TypeKind::Basic(k) => {
                if k == BasicKind::UntypedNil {
                    panic!("cannot render untyped nil as a type");
                }
                let name = self.interner.intern(k.default_kind().name());
                self.alloc_type(TypeExpr::Name { pkg: None, name })
            }
            TypeKind::Named { pkg, name, .. } => {
                let qual = match pkg {
                    Some(path) if self.interner.resolve(path) != self.pkg.path => {
                        let dep_name = match self.pkg.deps.get(&path) {
                            Some(d) => d.name,
                            None => {
                                self.import_(&self.interner.resolve(path).to_string());
                                self.pkg.deps[&path].name
                            }
                        };
                        let id = self.ast.ident(dep_name);
                        self.record_pkg_ref(path, id);
                        Some(id)
                    }
                    _ => None,
                };
                self.alloc_type(TypeExpr::Name { pkg: qual, name })
            }
            TypeKind::Pointer { elem } => {
                let e = self.to_type(elem);
                self.alloc_type(TypeExpr::Pointer { elem: e })
            }
            TypeKind::Slice { elem } => {
                let e = self.to_type(elem);
                self.alloc_type(TypeExpr::Slice { elem: e })
            }
            TypeKind::Array { elem, len } => {
                let e = self.to_type(elem);
                let len_expr = if len < 0 {
                    None
                } else {
                    Some(self.int_lit(len))
                };
                self.alloc_type(TypeExpr::Array {
                    len: len_expr,
                    elem: e,
                })
            }
            TypeKind::Map { key, elem } => {
                let k = self.to_type(key);
                let v = self.to_type(elem);
                self.alloc_type(TypeExpr::Map { key: k, value: v })
            }
            TypeKind::Chan { dir, elem } => {
                let e = self.to_type(elem);
                self.alloc_type(TypeExpr::Chan { dir, elem: e })
            }
            TypeKind::Struct { fields } => {
                let mut ids = Vec::with_capacity(fields.len());
                for f in &fields {
                    let typ = self.to_type(f.ty);
                    let names = if f.embedded {
                        self.ast.list_idents([])
                    } else {
                        self.ast.list_idents([f.name])
                    };
                    let tag = f.tag.as_deref().map(|t| self.interner.intern(t));
                    let id = self.ast.fields.alloc(
                        Field {
                            names,
                            typ,
                            tag,
                            embedded: f.embedded,
                        },
                        Span::default(),
                    );
                    ids.push(id);
                }
                let fields = self.ast.list_fields(ids);
                self.alloc_type(TypeExpr::Struct { fields })
            }
            TypeKind::Interface { methods, .. } => {
                let mut ids = Vec::with_capacity(methods.len());
                for m in &methods {
                    let typ = self.to_type(m.sig);
                    let names = self.ast.list_idents([m.name]);
                    let id = self.ast.fields.alloc(
                        Field {
                            names,
                            typ,
                            tag: None,
                            embedded: false,
                        },
                        Span::default(),
                    );
                    ids.push(id);
                }
                let methods = self.ast.list_fields(ids);
                self.alloc_type(TypeExpr::Interface { methods })
            }
            TypeKind::Signature {
                params,
                results,
                variadic,
                ..
            } => {
                let params = self.param_fields(&params);
                let results = self.param_fields(&results);
                self.alloc_type(TypeExpr::Func {
                    params,
                    results,
                    variadic,
                })
            }
            TypeKind::Ref { elem } => self.to_type(elem),
            TypeKind::TypeOf { ty } => self.to_type(ty),
            TypeKind::Unbound { bound, .. } => match bound {
                Some(t) => self.to_type(t),
                None => panic!("can't use unbound type"),
            },
            TypeKind::UnboundMapElem { .. } => panic!("can't use unbound map element type"),
            TypeKind::Tuple { .. } => panic!("tuple types are not nameable"),
            TypeKind::Instr(_) | TypeKind::BtiSelf { .. } => {
                panic!("internal type cannot be rendered")
            }
        }
    }

    fn param_fields(&mut self, objs: &[Obj]) -> crate::ast::ListRef<crate::ast::FieldId> {
        let mut ids = Vec::with_capacity(objs.len());
        for &o in objs {
            let data = self.scopes.obj(o).clone();
            let typ = self.to_type(data.ty);
            let names = if self.interner.resolve(data.name).is_empty() {
                self.ast.list_idents([])
            } else {
                self.ast.list_idents([data.name])
            };
            let id = self.ast.fields.alloc(
                Field {
                    names,
                    typ,
                    tag: None,
                    embedded: false,
                },
                Span::default(),
            );
            ids.push(id);
        }
        self.ast.list_fields(ids)
    }

    #[inline]
    pub(crate) fn alloc_type(&mut self, t: TypeExpr) -> TypeExprId {
        self.ast.type_exprs.alloc(t, Span::default())
    }

    #[inline]
    pub(crate) fn alloc_expr(&mut self, e: Expr) -> ExprId {
        self.ast.exprs.alloc(e, Span::default())
    }

    pub(crate) fn int_lit(&mut self, v: i64) -> ExprId {
        let sym = self.interner.intern(&v.to_string());
        self.alloc_expr(Expr::BasicLit {
            kind: LitKind::Int,
            value: sym,
        })
    }

    /// Renders a folded constant back to a literal node, when one exists.
    pub(crate) fn const_lit_expr(&mut self, c: &Const) -> Option<ExprId> {
        match c {
            Const::Int(v) => Some(self.int_lit(*v)),
            Const::Bool(v) => {
                let sym = self.interner.intern(if *v { "true" } else { "false" });
                Some(self.ast.ident(sym))
            }
            Const::Str(s) => {
                let sym = self.interner.intern(&format!("{s:?}"));
                Some(self.alloc_expr(Expr::BasicLit {
                    kind: LitKind::Str,
                    value: sym,
                }))
            }
            Const::Float(f) => {
                let mut text = format!("{f}");
                if !text.contains(['.', 'e', 'E']) {
                    text.push_str(".0");
                }
                let sym = self.interner.intern(&text);
                Some(self.alloc_expr(Expr::BasicLit {
                    kind: LitKind::Float,
                    value: sym,
                }))
            }
            _ => None,
        }
    }

    /// Generated reference to an object: a plain identifier for local
    /// objects, a recorded `pkg.Name` selector for imported ones.
    pub(crate) fn obj_expr(&mut self, obj: Obj) -> ExprId {
        let data = self.scopes.obj(obj).clone();
        match data.pkg {
            Some(path) => {
                let dep_name = self.pkg.deps[&path].name;
                let qual = self.ast.ident(dep_name);
                self.record_pkg_ref(path, qual);
                self.alloc_expr(Expr::Selector {
                    x: qual,
                    sel: data.name,
                })
            }
            None => self.ast.ident(data.name),
        }
    }

    // -------------------------------------------------------------------------
    // Operand producers
    // -------------------------------------------------------------------------

    /// Pushes a value: a literal, an object reference, or `Nil`.
    pub fn val<V: IntoVal>(&mut self, v: V) -> &mut Self {
        self.val_src(v, None)
    }

    pub fn val_src<V: IntoVal>(&mut self, v: V, src: Option<Span>) -> &mut Self {
        let mut elem = v.into_element(self);
        elem.src = src;
        if crate::debug_instr() {
            let t = elem.typ.map(|t| self.ty_str(t)).unwrap_or_default();
            log::debug!(target: "gobuild::instr", "Val {t}");
        }
        self.stk.push(elem);
        self
    }

    /// Pushes the placeholder "none" operand (e.g. an absent switch tag).
    pub fn none(&mut self) -> &mut Self {
        if crate::debug_instr() {
            log::debug!(target: "gobuild::instr", "None");
        }
        self.stk.push(Element::default());
        self
    }

    /// Pushes a first-class type value.
    pub fn typ(&mut self, ty: Ty) -> &mut Self {
        self.typ_src(ty, None)
    }

    pub fn typ_src(&mut self, ty: Ty, src: Option<Span>) -> &mut Self {
        if crate::debug_instr() {
            log::debug!(target: "gobuild::instr", "Typ {}", self.ty_str(ty));
        }
        let te = self.to_type(ty);
        let tt = self.types.type_of(ty);
        self.stk.push(Element {
            val: Some(AstVal::Type(te)),
            typ: Some(tt),
            cval: None,
            src,
        });
        self
    }

    /// Pushes the zero value of `ty`.
    pub fn zero_lit(&mut self, ty: Ty) -> &mut Self {
        if crate::debug_instr() {
            log::debug!(target: "gobuild::instr", "ZeroLit {}", self.ty_str(ty));
        }
        self.do_zero_lit(ty)
    }

    pub(crate) fn do_zero_lit(&mut self, ty: Ty) -> &mut Self {
        let typ0 = ty;
        let mut cur = ty;
        loop {
            match self.types.kind(cur).clone() {
                TypeKind::Basic(k) => {
                    return match k {
                        BasicKind::Bool | BasicKind::UntypedBool => self.val(false),
                        BasicKind::String | BasicKind::UntypedString => self.val(""),
                        BasicKind::UnsafePointer | BasicKind::UntypedNil => self.val(Nil),
                        _ => self.val(0i64),
                    };
                }
                TypeKind::Interface { .. }
                | TypeKind::Map { .. }
                | TypeKind::Slice { .. }
                | TypeKind::Pointer { .. }
                | TypeKind::Chan { .. }
                | TypeKind::Signature { .. } => return self.val(Nil),
                TypeKind::Named { .. } => {
                    cur = self.underlying(cur);
                    continue;
                }
                TypeKind::Unbound { bound, .. } => match bound {
                    Some(b) => {
                        let te = self.to_type(b);
                        let elts = self.ast.list_exprs([]);
                        let id = self.alloc_expr(Expr::CompositeLit {
                            typ: Some(te),
                            elts,
                        });
                        self.stk.push(Element::expr(id, b));
                        return self;
                    }
                    None => {
                        let elts = self.ast.list_exprs([]);
                        let id = self.alloc_expr(Expr::CompositeLit { typ: None, elts });
                        if let TypeKind::Unbound { slots, .. } = self.types.kind_mut(typ0) {
                            slots.push(crate::typesys::TypeSlot::CompositeLit(id));
                        }
                        self.stk.push(Element::expr(id, typ0));
                        return self;
                    }
                },
                _ => {
                    let te = self.to_type(cur);
                    let elts = self.ast.list_exprs([]);
                    let id = self.alloc_expr(Expr::CompositeLit {
                        typ: Some(te),
                        elts,
                    });
                    self.stk.push(Element::expr(id, typ0));
                    return self;
                }
            }
        }
    }

    /// Pushes an untyped big-integer constant. Small values lower to
    /// `big.NewInt(v)`; larger ones to an immediately-invoked closure
    /// decoding a string.
    pub fn untyped_bigint(&mut self, v: BigInt) -> &mut Self {
        self.untyped_bigint_src(v, None)
    }

    pub fn untyped_bigint_src(&mut self, v: BigInt, src: Option<Span>) -> &mut Self {
        let ty = self
            .pkg
            .ut_big_int
            .expect("untyped bigint type not injected");
        let expr = self.bigint_expr(&v);
        self.stk.push(Element {
            val: Some(AstVal::Expr(expr)),
            typ: Some(ty),
            cval: Some(Const::Big(v)),
            src,
        });
        self
    }

    fn big_member(&mut self, name: &str) -> ExprId {
        let path = self.big_pkg();
        let dep_name = self.pkg.deps[&path].name;
        let qual = self.ast.ident(dep_name);
        self.record_pkg_ref(path, qual);
        let sel = self.interner.intern(name);
        self.alloc_expr(Expr::Selector { x: qual, sel })
    }

    fn big_type_name(&mut self, name: &str) -> TypeExprId {
        let path = self.big_pkg();
        let dep_name = self.pkg.deps[&path].name;
        let qual = self.ast.ident(dep_name);
        self.record_pkg_ref(path, qual);
        let sym = self.interner.intern(name);
        self.alloc_type(TypeExpr::Name {
            pkg: Some(qual),
            name: sym,
        })
    }

    fn bigint_expr(&mut self, v: &BigInt) -> ExprId {
        if let Some(small) = v.to_i64() {
            // big.NewInt(v)
            let new_int = self.big_member("NewInt");
            let lit = self.int_lit(small);
            let args = self.ast.list_exprs([lit]);
            return self.alloc_expr(Expr::Call {
                fun: Callee::Expr(new_int),
                type_arg: None,
                args,
                ellipsis: false,
            });
        }
        // func() *big.Int { v, _ := new(big.Int).SetString("…", 10); return v }()
        let int_ty = self.big_type_name("Int");
        let new_sym = self.interner.intern("new");
        let new_ident = self.ast.ident(new_sym);
        let new_call = self.alloc_expr(Expr::Call {
            fun: Callee::Expr(new_ident),
            type_arg: Some(int_ty),
            args: crate::ast::ListRef::EMPTY,
            ellipsis: false,
        });
        let set_string = self.interner.intern("SetString");
        let sel = self.alloc_expr(Expr::Selector {
            x: new_call,
            sel: set_string,
        });
        let text = self.interner.intern(&format!("{:?}", v.to_string()));
        let str_lit = self.alloc_expr(Expr::BasicLit {
            kind: LitKind::Str,
            value: text,
        });
        let ten = self.int_lit(10);
        let args = self.ast.list_exprs([str_lit, ten]);
        let set_call = self.alloc_expr(Expr::Call {
            fun: Callee::Expr(sel),
            type_arg: None,
            args,
            ellipsis: false,
        });

        let v_sym = self.interner.intern("v");
        let us_sym = self.interner.intern("_");
        let v_id = self.ast.ident(v_sym);
        let us_id = self.ast.ident(us_sym);
        let lhs = self.ast.list_exprs([v_id, us_id]);
        let rhs = self.ast.list_exprs([set_call]);
        let define = self.ast.stmts.alloc(
            crate::ast::Stmt::Assign {
                lhs,
                op: crate::ast::AssignTok::Define,
                rhs,
            },
            Span::default(),
        );
        let v_ret = self.ast.ident(v_sym);
        let results = self.ast.list_exprs([v_ret]);
        let ret = self
            .ast
            .stmts
            .alloc(crate::ast::Stmt::Return { results }, Span::default());
        let body = crate::ast::Block {
            stmts: self.ast.list_stmts([define, ret]),
        };

        let res_int_ty = self.big_type_name("Int");
        let res_ptr = self.alloc_type(TypeExpr::Pointer { elem: res_int_ty });
        let res_names = self.ast.list_idents([]);
        let res_field = self.ast.fields.alloc(
            Field {
                names: res_names,
                typ: res_ptr,
                tag: None,
                embedded: false,
            },
            Span::default(),
        );
        let results = self.ast.list_fields([res_field]);
        let fn_ty = self.alloc_type(TypeExpr::Func {
            params: crate::ast::ListRef::EMPTY,
            results,
            variadic: false,
        });
        let fn_lit = self.alloc_expr(Expr::FuncLit {
            typ: fn_ty,
            body,
        });
        self.alloc_expr(Expr::Call {
            fun: Callee::Expr(fn_lit),
            type_arg: None,
            args: crate::ast::ListRef::EMPTY,
            ellipsis: false,
        })
    }

    /// Pushes an untyped big-rational constant.
    pub fn untyped_bigrat(&mut self, v: BigRational) -> &mut Self {
        self.untyped_bigrat_src(v, None)
    }

    pub fn untyped_bigrat_src(&mut self, v: BigRational, src: Option<Span>) -> &mut Self {
        let ty = self
            .pkg
            .ut_big_rat
            .expect("untyped bigrat type not injected");
        let a = v.numer().clone();
        let b = v.denom().clone();
        let expr = if let (Some(na), Some(nb)) = (a.to_i64(), b.to_i64()) {
            // big.NewRat(a, b)
            let new_rat = self.big_member("NewRat");
            let la = self.int_lit(na);
            let lb = self.int_lit(nb);
            let args = self.ast.list_exprs([la, lb]);
            self.alloc_expr(Expr::Call {
                fun: Callee::Expr(new_rat),
                type_arg: None,
                args,
                ellipsis: false,
            })
        } else {
            // new(big.Rat).SetFrac(a, b)
            let rat_ty = self.big_type_name("Rat");
            let new_sym = self.interner.intern("new");
            let new_ident = self.ast.ident(new_sym);
            let new_call = self.alloc_expr(Expr::Call {
                fun: Callee::Expr(new_ident),
                type_arg: Some(rat_ty),
                args: crate::ast::ListRef::EMPTY,
                ellipsis: false,
            });
            let set_frac = self.interner.intern("SetFrac");
            let sel = self.alloc_expr(Expr::Selector {
                x: new_call,
                sel: set_frac,
            });
            let ea = self.bigint_expr(&a);
            let eb = self.bigint_expr(&b);
            let args = self.ast.list_exprs([ea, eb]);
            self.alloc_expr(Expr::Call {
                fun: Callee::Expr(sel),
                type_arg: None,
                args,
                ellipsis: false,
            })
        };
        self.stk.push(Element {
            val: Some(AstVal::Expr(expr)),
            typ: Some(ty),
            cval: Some(Const::Rat(v)),
            src,
        });
        self
    }

    /// Pushes an assignable reference to a variable; `None` pushes the
    /// blank identifier `_`.
    pub fn var_ref(&mut self, obj: Option<Obj>) -> &mut Self {
        self.do_var_ref(obj, None, true)
    }

    pub fn var_ref_src(&mut self, obj: Option<Obj>, src: Option<Span>) -> &mut Self {
        self.do_var_ref(obj, src, true)
    }

    pub(crate) fn do_var_ref(
        &mut self,
        obj: Option<Obj>,
        src: Option<Span>,
        allow_debug: bool,
    ) -> &mut Self {
        match obj {
            None => {
                if allow_debug && crate::debug_instr() {
                    log::debug!(target: "gobuild::instr", "VarRef _");
                }
                let us = self.interner.intern("_");
                let id = self.ast.ident(us);
                self.stk.push(Element {
                    val: Some(AstVal::Expr(id)),
                    typ: None,
                    cval: None,
                    src,
                });
            }
            Some(mut v) => {
                if !matches!(self.scopes.obj(v).kind, ObjKind::Var) {
                    let (code, pos) = self.load_expr(src);
                    std::panic::panic_any(
                        self.code_error(Some(pos), format!("{code} is not a variable")),
                    );
                }
                if allow_debug && crate::debug_instr() {
                    let name = self.interner.resolve(self.scopes.obj(v).name).to_string();
                    log::debug!(target: "gobuild::instr", "VarRef {name}");
                }
                v = self.subst_param(v);
                let ty = self.scopes.obj(v).ty;
                let expr = self.obj_expr(v);
                let rt = self.types.ref_of(ty);
                self.stk.push(Element {
                    val: Some(AstVal::Expr(expr)),
                    typ: Some(rt),
                    cval: None,
                    src,
                });
            }
        }
        self
    }

    /// Replaces an inline-closure parameter with its argument variable.
    pub(crate) fn subst_param(&mut self, v: Obj) -> Obj {
        if let Some(f) = self.cur_fn {
            if self.funcs[f.raw() as usize].is_inline() {
                if let Some(&arg) = self.param_insts.get(&(f, v)) {
                    return arg;
                }
            }
        }
        v
    }

    // -------------------------------------------------------------------------
    // Comments channel
    // -------------------------------------------------------------------------

    /// Returns the comments pending for the next statement.
    pub fn comments(&self) -> Option<&CommentGroup> {
        self.comments.as_ref()
    }

    pub fn backup_comments(&self) -> (Option<CommentGroup>, bool) {
        (self.comments.clone(), self.comment_once)
    }

    /// Attaches `comments` to the next emitted statement; with `once`, the
    /// group is cleared after one statement.
    pub fn set_comments(&mut self, comments: Option<CommentGroup>, once: bool) -> &mut Self {
        if crate::debug_comments() {
            if let Some(c) = &comments {
                for (i, line) in c.lines.iter().enumerate() {
                    log::debug!(target: "gobuild::comments", "set comments {i} {line}");
                }
            }
        }
        self.comments = comments;
        self.comment_once = once;
        self
    }

    // -------------------------------------------------------------------------
    // Expression transformers
    // -------------------------------------------------------------------------

    /// `*x` over a pointer value or a type value (`*T`).
    pub fn star(&mut self) -> &mut Self {
        self.star_src(None)
    }

    pub fn star_src(&mut self, src: Option<Span>) -> &mut Self {
        if crate::debug_instr() {
            log::debug!(target: "gobuild::instr", "Star");
        }
        let arg = self.stk.get(-1).clone();
        let arg_ty = arg.typ.unwrap_or_else(|| {
            self.panic_code_error(arg.src, "invalid indirect of untyped operand".to_string())
        });
        let mut cur = arg_ty;
        loop {
            match self.types.kind(cur).clone() {
                TypeKind::TypeOf { ty } => {
                    let pt = self.types.pointer_to(ty);
                    let te = self.to_type(pt);
                    let tt = self.types.type_of(pt);
                    self.stk.ret(
                        1,
                        Element {
                            val: Some(AstVal::Type(te)),
                            typ: Some(tt),
                            cval: None,
                            src,
                        },
                    );
                    return self;
                }
                TypeKind::Pointer { elem } => {
                    let x = arg.expr_id().expect("star of non-expression");
                    let id = self.alloc_expr(Expr::Star { x });
                    self.stk.ret(
                        1,
                        Element {
                            val: Some(AstVal::Expr(id)),
                            typ: Some(elem),
                            cval: None,
                            src,
                        },
                    );
                    return self;
                }
                TypeKind::Named { .. } => {
                    cur = self.underlying(cur);
                }
                _ => {
                    let (code, pos) = self.load_expr(arg.src);
                    let t = self.ty_str(arg_ty);
                    std::panic::panic_any(self.code_error(
                        Some(pos),
                        format!("invalid indirect of {code} (type {t})"),
                    ));
                }
            }
        }
    }

    /// Dereference yielding a value.
    pub fn elem(&mut self) -> &mut Self {
        self.elem_with(None, false)
    }

    pub fn elem_src(&mut self, src: Option<Span>) -> &mut Self {
        self.elem_with(src, false)
    }

    /// Dereference yielding an assignable reference.
    pub fn elem_ref(&mut self) -> &mut Self {
        self.elem_with(None, true)
    }

    pub fn elem_ref_src(&mut self, src: Option<Span>) -> &mut Self {
        self.elem_with(src, true)
    }

    fn elem_with(&mut self, src: Option<Span>, as_ref: bool) -> &mut Self {
        if crate::debug_instr() {
            log::debug!(target: "gobuild::instr", "{}", if as_ref { "ElemRef" } else { "Elem" });
        }
        let arg = self.stk.get(-1).clone();
        let elem = match arg.typ.map(|t| self.types.kind(t).clone()) {
            Some(TypeKind::Pointer { elem }) => elem,
            _ => {
                let (code, pos) = self.load_expr(arg.src);
                let t = arg.typ.map(|t| self.ty_str(t)).unwrap_or_default();
                std::panic::panic_any(
                    self.code_error(Some(pos), format!("invalid indirect of {code} (type {t})")),
                );
            }
        };
        let x = arg.expr_id().expect("elem of non-expression");
        let id = self.alloc_expr(Expr::Star { x });
        let ty = if as_ref {
            self.types.ref_of(elem)
        } else {
            elem
        };
        self.stk.ret(
            1,
            Element {
                val: Some(AstVal::Expr(id)),
                typ: Some(ty),
                cval: None,
                src,
            },
        );
        self
    }

    // -------------------------------------------------------------------------
    // Member resolution
    // -------------------------------------------------------------------------

    /// `x.name` as a value; panics on failure.
    pub fn member_val(&mut self, name: &str) -> &mut Self {
        if let Err(err) = self.member(name, MemberFlag::Val, None) {
            std::panic::panic_any(err);
        }
        self
    }

    /// `x.name` as an assignable reference; panics on failure.
    pub fn member_ref(&mut self, name: &str) -> &mut Self {
        if let Err(err) = self.member(name, MemberFlag::Ref, None) {
            std::panic::panic_any(err);
        }
        self
    }

    /// Resolves member `name` on the top operand according to `flag`.
    pub fn member(
        &mut self,
        name: &str,
        flag: MemberFlag,
        src: Option<Span>,
    ) -> Result<MemberKind, CodeError> {
        let arg = self.stk.get(-1).clone();
        if crate::debug_instr() {
            let t = arg.typ.map(|t| self.ty_str(t)).unwrap_or_default();
            log::debug!(target: "gobuild::instr", "Member {name} {flag:?} // {t}");
        }
        let name_sym = self.interner.intern(name);
        let arg_ty = match arg.typ {
            Some(t) => self.types.deref_ref(t),
            None => {
                return Err(self.error_at(src, format!("invalid member access .{name}")));
            }
        };

        if flag == MemberFlag::Ref {
            if let Some(kind) = self.ref_member(arg_ty, name_sym, &arg) {
                return Ok(kind);
            }
            let (code, pos) = self.load_expr(src);
            let t = self.ty_str(arg_ty);
            return Err(self.code_error(
                Some(pos),
                format!("{code} undefined (type {t} has no field or method {name})"),
            ));
        }

        let (at, is_type) = match self.types.kind(arg_ty) {
            TypeKind::TypeOf { ty } => (*ty, true),
            _ => (arg_ty, false),
        };
        let eff_flag = if is_type && flag == MemberFlag::AutoProperty {
            MemberFlag::Val
        } else {
            flag
        };
        let alias = alias_name_of(name, eff_flag).map(|a| self.interner.intern(&a));

        let kind = self.find_member(at, name_sym, alias, eff_flag, &arg, src);
        if is_type {
            if let Some(MemberKind::Method) = kind {
                // Accessing a method through the type yields a function
                // value whose signature prepends the receiver.
                let e = self.stk.get(-1).clone();
                if let Some(sig) = e.typ {
                    if let TypeKind::Signature {
                        params,
                        results,
                        variadic,
                        ..
                    } = self.types.kind(sig).clone()
                    {
                        let recv = self.new_param(Pos::NONE, "", at);
                        let mut all = vec![recv];
                        all.extend(params);
                        let sig2 = self.types.signature(None, all, results, variadic);
                        let top = self.stk.len() as isize - 1;
                        self.stk.get_mut(top).typ = Some(sig2);
                        return Ok(MemberKind::Method);
                    }
                }
            }
            let (code, pos) = self.load_expr(src);
            let t = self.ty_str(at);
            return Err(self.code_error(
                Some(pos),
                format!("{code} undefined (type {t} has no method {name})"),
            ));
        }
        match kind {
            Some(k) => Ok(k),
            None => {
                let (code, pos) = self.load_expr(src);
                let t = self.ty_str(arg_ty);
                Err(self.code_error(
                    Some(pos),
                    format!("{code} undefined (type {t} has no field or method {name})"),
                ))
            }
        }
    }

    fn ref_member(&mut self, typ: Ty, name: Symbol, arg: &Element) -> Option<MemberKind> {
        let t = self.types.indirect(typ);
        let struc = match self.types.kind(t).clone() {
            TypeKind::Named { .. } => {
                let u = self.underlying(t);
                match self.types.kind(u).clone() {
                    TypeKind::Struct { fields } => fields,
                    _ => return None,
                }
            }
            TypeKind::Struct { fields } => fields,
            _ => return None,
        };
        let ft = self.struct_field_type(&struc, name)?;
        let x = arg.expr_id()?;
        let id = self.alloc_expr(Expr::Selector { x, sel: name });
        let rt = self.types.ref_of(ft);
        self.stk.ret(1, Element::expr(id, rt));
        Some(MemberKind::Field)
    }

    fn struct_field_type(&mut self, fields: &[StructField], name: Symbol) -> Option<Ty> {
        for f in fields {
            if f.name == name {
                return Some(f.ty);
            }
            if f.embedded {
                let ft = self.types.indirect(f.ty);
                if matches!(self.types.kind(ft), TypeKind::Named { .. }) {
                    let u = self.underlying(ft);
                    if let TypeKind::Struct { fields } = self.types.kind(u).clone() {
                        if let Some(t) = self.struct_field_type(&fields, name) {
                            return Some(t);
                        }
                    }
                }
            }
        }
        None
    }

    fn find_member(
        &mut self,
        typ: Ty,
        name: Symbol,
        alias: Option<Symbol>,
        flag: MemberFlag,
        arg: &Element,
        src: Option<Span>,
    ) -> Option<MemberKind> {
        let mut cur = typ;
        loop {
            match self.types.kind(cur).clone() {
                TypeKind::Pointer { elem } => {
                    match self.types.kind(elem).clone() {
                        TypeKind::Named { .. } => {
                            let u = self.underlying(elem);
                            self.ensure_loaded(elem);
                            if let Some(k) = self.method_member(elem, name, alias, flag, arg, src) {
                                return Some(k);
                            }
                            if let TypeKind::Struct { fields } = self.types.kind(u).clone() {
                                if let Some(k) =
                                    self.field_member(&fields, name, alias, flag, arg, src)
                                {
                                    return Some(k);
                                }
                            }
                        }
                        TypeKind::Struct { fields } => {
                            if let Some(k) = self.field_member(&fields, name, alias, flag, arg, src)
                            {
                                return Some(k);
                            }
                        }
                        _ => {}
                    }
                    return None;
                }
                TypeKind::Named { .. } => {
                    self.ensure_loaded(cur);
                    if let Some(k) = self.method_member(cur, name, alias, flag, arg, src) {
                        return Some(k);
                    }
                    cur = self.underlying(cur);
                }
                TypeKind::Struct { fields } => {
                    return self.field_member(&fields, name, alias, flag, arg, src);
                }
                TypeKind::Interface { .. } => {
                    self.types.complete_interface(cur);
                    return self.method_member(cur, name, alias, flag, arg, src);
                }
                TypeKind::Basic(_)
                | TypeKind::Slice { .. }
                | TypeKind::Map { .. }
                | TypeKind::Array { .. }
                | TypeKind::Chan { .. } => {
                    return self.bti_member(cur, name, alias, flag, arg, src);
                }
                _ => return None,
            }
        }
    }

    fn method_member(
        &mut self,
        on: Ty,
        name: Symbol,
        alias: Option<Symbol>,
        flag: MemberFlag,
        arg: &Element,
        src: Option<Span>,
    ) -> Option<MemberKind> {
        let methods = self.types.named_methods(on).to_vec();
        for m in methods {
            let matched_alias = alias == Some(m.name);
            if m.name == name || matched_alias {
                let autoprop = flag == MemberFlag::AutoProperty && matched_alias;
                if autoprop && !self.method_has_auto_property(m.sig) {
                    return None;
                }
                let id = match arg.val {
                    Some(AstVal::Expr(x)) => self.alloc_expr(Expr::Selector { x, sel: m.name }),
                    // Accessing via a type value yields a method expression.
                    Some(AstVal::Type(te)) => self.alloc_expr(Expr::MethodExpr {
                        recv: te,
                        name: m.name,
                    }),
                    None => return None,
                };
                let sig = self.method_type_of(m.sig);
                self.stk.ret(
                    1,
                    Element {
                        val: Some(AstVal::Expr(id)),
                        typ: Some(sig),
                        cval: None,
                        src,
                    },
                );
                if autoprop {
                    self.call(0);
                    return Some(MemberKind::AutoProperty);
                }
                return Some(MemberKind::Method);
            }
        }
        None
    }

    fn method_has_auto_property(&self, sig: Ty) -> bool {
        match self.types.kind(sig) {
            TypeKind::Signature { params, .. } => params.is_empty(),
            _ => false,
        }
    }

    /// A method value's type: the signature without its receiver.
    fn method_type_of(&mut self, sig: Ty) -> Ty {
        match self.types.kind(sig).clone() {
            TypeKind::Signature {
                recv: Some(_),
                params,
                results,
                variadic,
            } => self.types.signature(None, params, results, variadic),
            _ => sig,
        }
    }

    fn field_member(
        &mut self,
        fields: &[StructField],
        name: Symbol,
        alias: Option<Symbol>,
        flag: MemberFlag,
        arg: &Element,
        src: Option<Span>,
    ) -> Option<MemberKind> {
        for f in fields {
            if f.name == name {
                let x = arg.expr_id()?;
                let id = self.alloc_expr(Expr::Selector { x, sel: name });
                self.stk.ret(
                    1,
                    Element {
                        val: Some(AstVal::Expr(id)),
                        typ: Some(f.ty),
                        cval: None,
                        src,
                    },
                );
                return Some(MemberKind::Field);
            }
            if f.embedded {
                if let Some(k) = self.find_member(f.ty, name, alias, flag, arg, src) {
                    return Some(k);
                }
            }
        }
        None
    }

    fn bti_member(
        &mut self,
        on: Ty,
        name: Symbol,
        alias: Option<Symbol>,
        flag: MemberFlag,
        _arg: &Element,
        src: Option<Span>,
    ) -> Option<MemberKind> {
        for m in bti_methods(&self.types, on) {
            let m_sym = self.interner.intern(m.name);
            let matched_alias = alias == Some(m_sym);
            if m_sym == name || matched_alias {
                let autoprop = flag == MemberFlag::AutoProperty && matched_alias;
                let this = self.stk.pop();
                let fn_name = self.interner.intern(match m.instr {
                    crate::builtin::Instr::Len => "len",
                    crate::builtin::Instr::Cap => "cap",
                    _ => unreachable!("unexpected bti instruction"),
                });
                let fn_id = self.ast.ident(fn_name);
                let fn_ty = self.types.instr(m.instr);
                self.stk.push(Element {
                    val: Some(AstVal::Expr(fn_id)),
                    typ: Some(fn_ty),
                    cval: None,
                    src,
                });
                let marked = self.types.bti_self(this.typ.unwrap_or(on));
                self.stk.push(Element {
                    typ: Some(marked),
                    ..this
                });
                if autoprop {
                    self.call(0);
                    return Some(MemberKind::AutoProperty);
                }
                return Some(MemberKind::Method);
            }
        }
        None
    }

    // -------------------------------------------------------------------------
    // Index / slice / type assert
    // -------------------------------------------------------------------------

    /// `a[i]`; with `two_value`, `elem, ok = m[key]` over a map.
    pub fn index(&mut self, nidx: usize, two_value: bool) -> &mut Self {
        self.index_src(nidx, two_value, None)
    }

    pub fn index_src(&mut self, nidx: usize, two_value: bool, src: Option<Span>) -> &mut Self {
        if crate::debug_instr() {
            log::debug!(target: "gobuild::instr", "Index {nidx} {two_value}");
        }
        if nidx != 1 {
            panic!("Index doesn't support a[i, j...] yet");
        }
        let args: Vec<Element> = self.stk.get_args(2).to_vec();
        let x_ty = args[0].typ.expect("index of untyped operand");
        let (kv, allow_two) = self.idx_val_types(x_ty, false, src);
        self.check_index_key(&args[1], kv[0], src);
        let ty_ret = if two_value {
            if !allow_two {
                let (_, pos) = self.load_expr(src);
                std::panic::panic_any(self.code_error(
                    Some(pos),
                    "assignment mismatch: 2 variables but 1 values".to_string(),
                ));
            }
            let b = self.types.basic(BasicKind::Bool);
            self.types.tuple(vec![kv[1], b])
        } else {
            kv[1]
        };
        let x = args[0].expr_id().expect("index of non-expression");
        let index = args[1].expr_id().expect("index key is not an expression");
        let id = self.alloc_expr(Expr::Index { x, index });
        self.stk.ret(
            2,
            Element {
                val: Some(AstVal::Expr(id)),
                typ: Some(ty_ret),
                cval: None,
                src,
            },
        );
        self
    }

    /// `a[i]` as an assignable reference.
    pub fn index_ref(&mut self, nidx: usize) -> &mut Self {
        self.index_ref_src(nidx, None)
    }

    pub fn index_ref_src(&mut self, nidx: usize, src: Option<Span>) -> &mut Self {
        if crate::debug_instr() {
            log::debug!(target: "gobuild::instr", "IndexRef {nidx}");
        }
        if nidx != 1 {
            panic!("IndexRef doesn't support a[i, j...] = val yet");
        }
        let args: Vec<Element> = self.stk.get_args(2).to_vec();
        let x_ty = args[0].typ.expect("index of untyped operand");
        let x_ty = self.types.deref_ref(x_ty);
        let x = args[0].expr_id().expect("index of non-expression");
        let index = args[1].expr_id().expect("index key is not an expression");
        let id = self.alloc_expr(Expr::Index { x, index });
        let ty = if matches!(self.types.kind(x_ty), TypeKind::Unbound { .. }) {
            let key_ty = args[1].typ.expect("map key is untyped");
            let me = self.types.unbound_map_elem(key_ty, x_ty);
            self.types.ref_of(me)
        } else {
            let (kv, _) = self.idx_val_types(x_ty, true, src);
            self.check_index_key(&args[1], kv[0], src);
            self.types.ref_of(kv[1])
        };
        self.stk.ret(
            2,
            Element {
                val: Some(AstVal::Expr(id)),
                typ: Some(ty),
                cval: None,
                src,
            },
        );
        self
    }

    /// Index key must be assignable to the collection's key type.
    fn check_index_key(&mut self, key: &Element, want: Ty, src: Option<Span>) {
        if let Some(kt) = key.typ {
            if !self.assignable_to(kt, want, key.cval.as_ref()) {
                let (code, pos) = self.load_expr(key.src.or(src));
                let kts = self.ty_str(kt);
                let ws = self.ty_str(want);
                let err = self.code_error(
                    Some(pos),
                    format!("cannot use {code} (type {kts}) as type {ws} in index"),
                );
                self.report_err(err);
            }
        }
    }

    fn idx_val_types(&mut self, typ: Ty, as_ref: bool, src: Option<Span>) -> ([Ty; 2], bool) {
        let int = self.types.basic(BasicKind::Int);
        let mut cur = typ;
        loop {
            match self.types.kind(cur).clone() {
                TypeKind::Slice { elem } => return ([int, elem], false),
                TypeKind::Map { key, elem } => return ([key, elem], true),
                TypeKind::Array { elem, .. } => return ([int, elem], false),
                TypeKind::Pointer { elem } => {
                    let mut e = elem;
                    if matches!(self.types.kind(e), TypeKind::Named { .. }) {
                        e = self.underlying(e);
                    }
                    if let TypeKind::Array { elem, .. } = self.types.kind(e).clone() {
                        return ([int, elem], false);
                    }
                    break;
                }
                TypeKind::Basic(k) if k.is_string() => {
                    if as_ref {
                        let (code, pos) = self.load_expr(src);
                        std::panic::panic_any(self.code_error(
                            Some(pos),
                            format!("cannot assign to {code} (strings are immutable)"),
                        ));
                    }
                    let byte = self.types.basic(BasicKind::Uint8);
                    return ([int, byte], false);
                }
                TypeKind::Named { .. } => {
                    cur = self.underlying(cur);
                }
                _ => break,
            }
        }
        let (code, pos) = self.load_expr(src);
        let t = self.ty_str(typ);
        std::panic::panic_any(self.code_error(
            Some(pos),
            format!("invalid operation: {code} (type {t} does not support indexing)"),
        ))
    }

    /// `a[i:j]` (3 operands) or `a[i:j:k]` (4 operands with `slice3`).
    pub fn slice_expr(&mut self, slice3: bool) -> &mut Self {
        self.slice_expr_src(slice3, None)
    }

    pub fn slice_expr_src(&mut self, slice3: bool, src: Option<Span>) -> &mut Self {
        if crate::debug_instr() {
            log::debug!(target: "gobuild::instr", "Slice {slice3}");
        }
        let n = if slice3 { 4 } else { 3 };
        let args: Vec<Element> = self.stk.get_args(n).to_vec();
        let x = &args[0];
        let x_ty = x.typ.expect("slice of untyped operand");
        let mut ty = x_ty;
        match self.types.kind(x_ty).clone() {
            TypeKind::Slice { .. } => {}
            TypeKind::Basic(k) => {
                if k.is_string() {
                    if slice3 {
                        let (code, pos) = self.load_expr(src);
                        std::panic::panic_any(self.code_error(
                            Some(pos),
                            format!("invalid operation: {code} (3-index slice of string)"),
                        ));
                    }
                } else {
                    let (code, pos) = self.load_expr(x.src);
                    let t = self.ty_str(x_ty);
                    std::panic::panic_any(
                        self.code_error(Some(pos), format!("cannot slice {code} (type {t})")),
                    );
                }
            }
            TypeKind::Array { elem, .. } => {
                ty = self.types.slice_of(elem);
            }
            TypeKind::Pointer { elem } => match self.types.kind(elem).clone() {
                TypeKind::Array { elem, .. } => {
                    ty = self.types.slice_of(elem);
                }
                _ => {
                    let (code, pos) = self.load_expr(x.src);
                    let t = self.ty_str(x_ty);
                    std::panic::panic_any(
                        self.code_error(Some(pos), format!("cannot slice {code} (type {t})")),
                    );
                }
            },
            _ => {
                let (code, pos) = self.load_expr(x.src);
                let t = self.ty_str(x_ty);
                std::panic::panic_any(
                    self.code_error(Some(pos), format!("cannot slice {code} (type {t})")),
                );
            }
        }
        // Bound operands must be integers (or the "none" placeholder).
        let int = self.types.basic(BasicKind::Int);
        for bound in &args[1..] {
            if let Some(bt) = bound.typ {
                if !self.assignable_to(bt, int, bound.cval.as_ref()) {
                    let (code, pos) = self.load_expr(bound.src.or(src));
                    let bts = self.ty_str(bt);
                    let err = self.code_error(
                        Some(pos),
                        format!("invalid slice index {code} (type {bts})"),
                    );
                    self.report_err(err);
                }
            }
        }
        let xe = x.expr_id().expect("slice of non-expression");
        let low = args[1].expr_id();
        let high = args[2].expr_id();
        let max = if slice3 { args[3].expr_id() } else { None };
        let id = self.alloc_expr(Expr::Slice {
            x: xe,
            low,
            high,
            max,
            slice3,
        });
        self.stk.ret(
            n,
            Element {
                val: Some(AstVal::Expr(id)),
                typ: Some(ty),
                cval: None,
                src,
            },
        );
        self
    }

    /// `x.(T)`; with `two_value`, `v, ok := x.(T)`.
    pub fn type_assert(&mut self, typ: Ty, two_value: bool) -> &mut Self {
        self.type_assert_src(typ, two_value, None)
    }

    pub fn type_assert_src(&mut self, typ: Ty, two_value: bool, src: Option<Span>) -> &mut Self {
        if crate::debug_instr() {
            log::debug!(target: "gobuild::instr", "TypeAssert {} {two_value}", self.ty_str(typ));
        }
        let arg = self.stk.get(-1).clone();
        let arg_ty = arg.typ.expect("type assertion on untyped operand");
        let iface = match self.interface_of(arg_ty) {
            Some(i) => i,
            None => {
                let (text, pos) = self.load_expr(src);
                let t = self.ty_str(arg_ty);
                std::panic::panic_any(self.code_error(
                    Some(pos),
                    format!("invalid type assertion: {text} (non-interface type {t} on left)"),
                ));
            }
        };
        if let Some(missing) = self.missing_method(typ, iface) {
            let pos = self.load_expr(src).1;
            let ts = self.ty_str(typ);
            let at = self.ty_str(arg_ty);
            let name = self.interner.resolve(missing).to_string();
            std::panic::panic_any(self.code_error(
                Some(pos),
                format!(
                    "impossible type assertion:\n\t{ts} does not implement {at} (missing {name} method)"
                ),
            ));
        }
        let te = self.to_type(typ);
        let x = arg.expr_id().expect("type assertion on non-expression");
        let id = self.alloc_expr(Expr::TypeAssert { x, typ: Some(te) });
        let ty_ret = if two_value {
            let b = self.types.basic(BasicKind::Bool);
            self.types.tuple(vec![typ, b])
        } else {
            typ
        };
        self.stk.ret(
            1,
            Element {
                val: Some(AstVal::Expr(id)),
                typ: Some(ty_ret),
                cval: None,
                src,
            },
        );
        self
    }

    pub(crate) fn interface_of(&mut self, typ: Ty) -> Option<Ty> {
        let mut cur = typ;
        loop {
            match self.types.kind(cur) {
                TypeKind::Interface { .. } => return Some(cur),
                TypeKind::Named { .. } => {
                    cur = self.underlying(cur);
                }
                _ => return None,
            }
        }
    }

    /// First interface method `typ` fails to provide, if any. Only checked
    /// for concrete (non-interface) assertion targets.
    fn missing_method(&mut self, typ: Ty, iface: Ty) -> Option<Symbol> {
        self.ensure_loaded(typ);
        if self.interface_of(typ).is_some() {
            return None;
        }
        let methods = match self.types.kind(iface) {
            TypeKind::Interface { methods, .. } => methods.clone(),
            _ => return None,
        };
        let target = self.types.indirect(typ);
        for m in methods {
            if self.types.lookup_method(target, m.name).is_none() {
                return Some(m.name);
            }
        }
        None
    }

    // -------------------------------------------------------------------------
    // Composite literals
    // -------------------------------------------------------------------------

    fn to_int_val(&mut self, v: &Element, msg: &str) -> i64 {
        if let Some(c) = &v.cval {
            if let Some(n) = c.to_i64() {
                return n;
            }
        }
        let (code, pos) = self.load_expr(v.src);
        std::panic::panic_any(self.code_error(Some(pos), format!("cannot use {code} as {msg}")))
    }

    /// Computes the bound array length of key-value elements, failing on
    /// constant-known out-of-range keys.
    fn to_bound_array_len(&mut self, args: &[Element], arity: usize, limit: i64) -> i64 {
        let mut n: i64 = -1;
        let mut max: i64 = -1;
        let mut i = 0;
        while i < arity {
            if args[i].val.is_some() {
                n = self.to_int_val(&args[i], "index which must be non-negative integer constant");
            } else {
                n += 1;
            }
            if limit >= 0 && n >= limit {
                if args[i].src.is_none() {
                    let (_, pos) = self.load_expr(args[i + 1].src);
                    std::panic::panic_any(self.code_error(
                        Some(pos),
                        format!("array index {n} out of bounds [0:{limit}]"),
                    ));
                }
                let (src, pos) = self.load_expr(args[i].src);
                std::panic::panic_any(self.code_error(
                    Some(pos),
                    format!("array index {src} (value {n}) out of bounds [0:{limit}]"),
                ));
            }
            if max < n {
                max = n;
            }
            i += 2;
        }
        max + 1
    }

    fn index_elem_expr(&mut self, args: &[Element], i: usize) -> ExprId {
        let value = args[i + 1]
            .expr_id()
            .expect("composite literal value is not an expression");
        match args[i].val {
            None => value,
            Some(_) => {
                self.to_int_val(&args[i], "index which must be non-negative integer constant");
                let key = args[i].expr_id().unwrap();
                self.alloc_expr(Expr::KeyValue { key, value })
            }
        }
    }

    /// `map[K]V{...}` from `arity` key-value operand pairs. With `typ` of
    /// `None`, key and value types are inferred (defaulting to
    /// `map[string]interface{}` when empty).
    pub fn map_lit(&mut self, typ: Option<Ty>, arity: usize) -> &mut Self {
        if crate::debug_instr() {
            log::debug!(target: "gobuild::instr", "MapLit {arity}");
        }
        let mut t = None;
        let mut out_ty = typ;
        if let Some(ty) = typ {
            let u = match self.types.kind(ty) {
                TypeKind::Named { .. } => self.underlying(ty),
                _ => ty,
            };
            match self.types.kind(u) {
                TypeKind::Map { .. } => t = Some(u),
                _ => panic!("MapLit: typ isn't a map type - {}", self.ty_str(ty)),
            }
        }
        if arity == 0 {
            let ty = match out_ty {
                Some(ty) => ty,
                None => {
                    let s = self.types.basic(BasicKind::String);
                    let any = self.pkg.any;
                    self.types.map_of(s, any)
                }
            };
            let te = self.to_type(ty);
            let elts = self.ast.list_exprs([]);
            let id = self.alloc_expr(Expr::CompositeLit {
                typ: Some(te),
                elts,
            });
            self.stk.push(Element::expr(id, ty));
            return self;
        }
        if arity % 2 != 0 {
            panic!("MapLit: invalid arity, can't be odd - {arity}");
        }
        let args: Vec<Element> = self.stk.get_args(arity).to_vec();
        let (key, val, check) = match t {
            Some(map) => match self.types.kind(map).clone() {
                TypeKind::Map { key, elem } => (key, elem, true),
                _ => unreachable!(),
            },
            None => {
                let key = self.bound_element_type(&args, 0, arity, 2);
                let val = self.bound_element_type(&args, 1, arity, 2);
                let dk = self.default_ty(key);
                let dv = self.default_ty(val);
                let m = self.types.map_of(dk, dv);
                out_ty = Some(m);
                (dk, dv, false)
            }
        };
        let mut elts = Vec::with_capacity(arity / 2);
        let mut i = 0;
        while i < arity {
            if check {
                if !self.assignable_to_elem(&args[i], key) {
                    let (src, pos) = self.load_expr(args[i].src);
                    let at = args[i].typ.map(|t| self.ty_str(t)).unwrap_or_default();
                    let ks = self.ty_str(key);
                    std::panic::panic_any(self.code_error(
                        Some(pos),
                        format!("cannot use {src} (type {at}) as type {ks} in map key"),
                    ));
                }
                if !self.assignable_to_elem(&args[i + 1], val) {
                    let (src, pos) = self.load_expr(args[i + 1].src);
                    let at = args[i + 1].typ.map(|t| self.ty_str(t)).unwrap_or_default();
                    let vs = self.ty_str(val);
                    std::panic::panic_any(self.code_error(
                        Some(pos),
                        format!("cannot use {src} (type {at}) as type {vs} in map value"),
                    ));
                }
            }
            let k = args[i].expr_id().expect("map key is not an expression");
            let v = args[i + 1]
                .expr_id()
                .expect("map value is not an expression");
            elts.push(self.alloc_expr(Expr::KeyValue { key: k, value: v }));
            i += 2;
        }
        let ty = out_ty.unwrap();
        let te = self.to_type(ty);
        let elts = self.ast.list_exprs(elts);
        let id = self.alloc_expr(Expr::CompositeLit {
            typ: Some(te),
            elts,
        });
        self.stk.ret(arity, Element::expr(id, ty));
        self
    }

    /// `[]T{...}`; `key_val` switches to indexed elements (`{2: x}`).
    pub fn slice_lit(&mut self, typ: Option<Ty>, arity: usize, key_val: bool) -> &mut Self {
        if crate::debug_instr() {
            log::debug!(target: "gobuild::instr", "SliceLit {arity} {key_val}");
        }
        let mut out_ty = typ;
        let mut t = None;
        if let Some(ty) = typ {
            let u = match self.types.kind(ty) {
                TypeKind::Named { .. } => self.underlying(ty),
                _ => ty,
            };
            match self.types.kind(u) {
                TypeKind::Slice { .. } => t = Some(u),
                _ => panic!("SliceLit: typ isn't a slice type - {}", self.ty_str(ty)),
            }
        }
        let elts;
        if key_val {
            if arity % 2 != 0 {
                panic!("SliceLit: invalid arity, can't be odd in keyVal mode - {arity}");
            }
            let args: Vec<Element> = self.stk.get_args(arity).to_vec();
            let val = match self.types.kind(t.expect("SliceLit: keyVal mode requires a type")) {
                TypeKind::Slice { elem } => *elem,
                _ => unreachable!(),
            };
            let mut out = Vec::with_capacity(arity / 2);
            let mut i = 0;
            while i < arity {
                if !self.assignable_conv_elem(arity, i + 1, val) {
                    let args: Vec<Element> = self.stk.get_args(arity).to_vec();
                    let (src, pos) = self.load_expr(args[i + 1].src);
                    let at = args[i + 1].typ.map(|t| self.ty_str(t)).unwrap_or_default();
                    let vs = self.ty_str(val);
                    std::panic::panic_any(self.code_error(
                        Some(pos),
                        format!("cannot use {src} (type {at}) as type {vs} in slice literal"),
                    ));
                }
                let args: Vec<Element> = self.stk.get_args(arity).to_vec();
                out.push(self.index_elem_expr(&args, i));
                i += 2;
            }
            elts = out;
        } else {
            if arity == 0 {
                let ty = match out_ty {
                    Some(ty) => ty,
                    None => {
                        let any = self.pkg.any;
                        self.types.slice_of(any)
                    }
                };
                let te = self.to_type(ty);
                let elts = self.ast.list_exprs([]);
                let id = self.alloc_expr(Expr::CompositeLit {
                    typ: Some(te),
                    elts,
                });
                self.stk.push(Element::expr(id, ty));
                return self;
            }
            let args: Vec<Element> = self.stk.get_args(arity).to_vec();
            let (val, check) = match t {
                Some(st) => match self.types.kind(st).clone() {
                    TypeKind::Slice { elem } => (elem, true),
                    _ => unreachable!(),
                },
                None => {
                    let v = self.bound_element_type(&args, 0, arity, 1);
                    let dv = self.default_ty(v);
                    out_ty = Some(self.types.slice_of(dv));
                    (dv, false)
                }
            };
            let mut out = Vec::with_capacity(arity);
            for i in 0..arity {
                if check && !self.assignable_conv_elem(arity, i, val) {
                    let args: Vec<Element> = self.stk.get_args(arity).to_vec();
                    let (src, pos) = self.load_expr(args[i].src);
                    let at = args[i].typ.map(|t| self.ty_str(t)).unwrap_or_default();
                    let vs = self.ty_str(val);
                    std::panic::panic_any(self.code_error(
                        Some(pos),
                        format!("cannot use {src} (type {at}) as type {vs} in slice literal"),
                    ));
                }
                let args: Vec<Element> = self.stk.get_args(arity).to_vec();
                out.push(args[i].expr_id().expect("slice element is not an expression"));
            }
            elts = out;
        }
        let ty = out_ty.unwrap();
        let te = self.to_type(ty);
        let elts = self.ast.list_exprs(elts);
        let id = self.alloc_expr(Expr::CompositeLit {
            typ: Some(te),
            elts,
        });
        self.stk.ret(arity, Element::expr(id, ty));
        self
    }

    /// `[N]T{...}`; array length `-1` is inferred from the literal.
    pub fn array_lit(&mut self, typ: Ty, arity: usize, key_val: bool) -> &mut Self {
        if crate::debug_instr() {
            log::debug!(target: "gobuild::instr", "ArrayLit {arity} {key_val}");
        }
        let u = match self.types.kind(typ) {
            TypeKind::Named { .. } => self.underlying(typ),
            _ => typ,
        };
        let (elem, len) = match self.types.kind(u).clone() {
            TypeKind::Array { elem, len } => (elem, len),
            _ => panic!("ArrayLit: typ isn't a array type - {}", self.ty_str(typ)),
        };
        let mut out_ty = typ;
        let elts;
        if key_val {
            if arity % 2 != 0 {
                panic!("ArrayLit: invalid arity, can't be odd in keyVal mode - {arity}");
            }
            let args: Vec<Element> = self.stk.get_args(arity).to_vec();
            let max = self.to_bound_array_len(&args, arity, len);
            if len < 0 {
                out_ty = self.types.array_of(elem, max);
            }
            let mut out = Vec::with_capacity(arity / 2);
            let mut i = 0;
            while i < arity {
                if !self.assignable_to_elem(&args[i + 1], elem) {
                    let (src, pos) = self.load_expr(args[i + 1].src);
                    let at = args[i + 1].typ.map(|t| self.ty_str(t)).unwrap_or_default();
                    let es = self.ty_str(elem);
                    std::panic::panic_any(self.code_error(
                        Some(pos),
                        format!("cannot use {src} (type {at}) as type {es} in array literal"),
                    ));
                }
                out.push(self.index_elem_expr(&args, i));
                i += 2;
            }
            elts = out;
        } else {
            let args: Vec<Element> = self.stk.get_args(arity).to_vec();
            if len < 0 {
                out_ty = self.types.array_of(elem, arity as i64);
            } else if (len as usize) < arity {
                let (_, pos) = self.load_expr(args[len as usize].src);
                std::panic::panic_any(self.code_error(
                    Some(pos),
                    format!("array index {len} out of bounds [0:{len}]"),
                ));
            }
            let mut out = Vec::with_capacity(arity);
            for arg in &args {
                if !self.assignable_to_elem(arg, elem) {
                    let (src, pos) = self.load_expr(arg.src);
                    let at = arg.typ.map(|t| self.ty_str(t)).unwrap_or_default();
                    let es = self.ty_str(elem);
                    std::panic::panic_any(self.code_error(
                        Some(pos),
                        format!("cannot use {src} (type {at}) as type {es} in array literal"),
                    ));
                }
                out.push(arg.expr_id().expect("array element is not an expression"));
            }
            elts = out;
        }
        let te = self.to_type(out_ty);
        let elts = self.ast.list_exprs(elts);
        let id = self.alloc_expr(Expr::CompositeLit {
            typ: Some(te),
            elts,
        });
        self.stk.ret(arity, Element::expr(id, out_ty));
        self
    }

    /// `T{...}` over a struct type. Positional mode requires arity equal
    /// to the field count; key-value mode resolves keys (field names or
    /// constant indices) and emits `Name: value` elements.
    pub fn struct_lit(&mut self, typ: Ty, arity: usize, key_val: bool) -> &mut Self {
        if crate::debug_instr() {
            log::debug!(target: "gobuild::instr", "StructLit {arity} {key_val}");
        }
        let u = match self.types.kind(typ) {
            TypeKind::Named { .. } => self.underlying(typ),
            _ => typ,
        };
        let fields = match self.types.kind(u).clone() {
            TypeKind::Struct { fields } => fields,
            _ => panic!("StructLit: typ isn't a struct type - {}", self.ty_str(typ)),
        };
        let n = fields.len();
        let args: Vec<Element> = self.stk.get_args(arity).to_vec();
        let mut elts = Vec::new();
        if key_val {
            if arity % 2 != 0 {
                panic!("StructLit: invalid arity, can't be odd in keyVal mode - {arity}");
            }
            let mut i = 0;
            while i < arity {
                let field = match &args[i].cval {
                    Some(Const::Str(name)) => {
                        let sym = self.interner.intern(name);
                        match fields.iter().find(|f| f.name == sym) {
                            Some(f) => f.clone(),
                            None => {
                                let (_, pos) = self.load_expr(args[i].src);
                                let ts = self.ty_str(typ);
                                std::panic::panic_any(self.code_error(
                                    Some(pos),
                                    format!("unknown field {name} in {ts}"),
                                ));
                            }
                        }
                    }
                    _ => {
                        let idx = self.to_int_val(
                            &args[i],
                            "field which must be non-negative integer constant",
                        );
                        if idx < 0 || idx as usize >= n {
                            panic!("invalid struct field index");
                        }
                        fields[idx as usize].clone()
                    }
                };
                if !self.assignable_to_elem(&args[i + 1], field.ty) {
                    let (src, pos) = self.load_expr(args[i + 1].src);
                    let at = args[i + 1].typ.map(|t| self.ty_str(t)).unwrap_or_default();
                    let fts = self.ty_str(field.ty);
                    let fname = self.interner.resolve(field.name).to_string();
                    std::panic::panic_any(self.code_error(
                        Some(pos),
                        format!(
                            "cannot use {src} (type {at}) as type {fts} in value of field {fname}"
                        ),
                    ));
                }
                let key = self.ast.ident(field.name);
                let value = args[i + 1]
                    .expr_id()
                    .expect("struct field value is not an expression");
                elts.push(self.alloc_expr(Expr::KeyValue { key, value }));
                i += 2;
            }
        } else if arity != n {
            if arity != 0 {
                let few_or_many = if arity > n { "many" } else { "few" };
                let (_, pos) = self.load_expr(args[arity - 1].src);
                let ts = self.ty_str(typ);
                std::panic::panic_any(self.code_error(
                    Some(pos),
                    format!("too {few_or_many} values in {ts}{{...}}"),
                ));
            }
        } else {
            for (i, arg) in args.iter().enumerate() {
                let fld = &fields[i];
                if !self.assignable_to_elem(arg, fld.ty) {
                    let (src, pos) = self.load_expr(arg.src);
                    let at = arg.typ.map(|t| self.ty_str(t)).unwrap_or_default();
                    let fts = self.ty_str(fld.ty);
                    let fname = self.interner.resolve(fld.name).to_string();
                    std::panic::panic_any(self.code_error(
                        Some(pos),
                        format!(
                            "cannot use {src} (type {at}) as type {fts} in value of field {fname}"
                        ),
                    ));
                }
                elts.push(arg.expr_id().expect("struct value is not an expression"));
            }
        }
        let te = self.to_type(typ);
        let elts = self.ast.list_exprs(elts);
        let id = self.alloc_expr(Expr::CompositeLit {
            typ: Some(te),
            elts,
        });
        self.stk.ret(arity, Element::expr(id, typ));
        self
    }

    /// Least upper bound of every `step`-th operand starting at `from`:
    /// their common type, or `interface{}` when they disagree.
    fn bound_element_type(&mut self, args: &[Element], from: usize, to: usize, step: usize) -> Ty {
        let mut ret: Option<Ty> = None;
        let mut i = from;
        while i < to {
            if let Some(t) = args[i].typ {
                let t = self.default_ty(t);
                match ret {
                    None => ret = Some(t),
                    Some(prev) if prev != t => return self.pkg.any,
                    _ => {}
                }
            }
            i += step;
        }
        ret.unwrap_or(self.pkg.any)
    }
}

fn alias_name_of(name: &str, flag: MemberFlag) -> Option<String> {
    if flag != MemberFlag::Val && flag != MemberFlag::Ref && !name.is_empty() {
        let c = name.as_bytes()[0];
        if c.is_ascii_lowercase() {
            let mut s = String::with_capacity(name.len());
            s.push(c.to_ascii_uppercase() as char);
            s.push_str(&name[1..]);
            return Some(s);
        }
    }
    None
}

/// Member resolution modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberFlag {
    /// The member as an expression.
    Val,
    /// Lowercase names also try the capitalized alias.
    MethodAlias,
    /// Alias match of a parameterless method invokes it immediately.
    AutoProperty,
    /// Field as an assignable reference.
    Ref,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    Method,
    AutoProperty,
    Field,
}

/// Values accepted by `val`.
pub trait IntoVal {
    fn into_element(self, cb: &mut CodeBuilder) -> Element;
}

/// The `nil` literal.
pub struct Nil;

impl IntoVal for Nil {
    fn into_element(self, cb: &mut CodeBuilder) -> Element {
        let sym = cb.interner.intern("nil");
        let id = cb.ast.ident(sym);
        let ty = cb.types.basic(BasicKind::UntypedNil);
        Element::expr(id, ty)
    }
}

macro_rules! impl_into_val_int {
    ($($t:ty),*) => {
        $(
            impl IntoVal for $t {
                fn into_element(self, cb: &mut CodeBuilder) -> Element {
                    let v = self as i64;
                    let id = cb.int_lit(v);
                    let ty = cb.types.basic(BasicKind::UntypedInt);
                    let mut e = Element::expr(id, ty);
                    e.cval = Some(Const::Int(v));
                    e
                }
            }
        )*
    };
}

impl_into_val_int!(i32, i64, u32, usize);

impl IntoVal for bool {
    fn into_element(self, cb: &mut CodeBuilder) -> Element {
        let sym = cb.interner.intern(if self { "true" } else { "false" });
        let id = cb.ast.ident(sym);
        let ty = cb.types.basic(BasicKind::UntypedBool);
        let mut e = Element::expr(id, ty);
        e.cval = Some(Const::Bool(self));
        e
    }
}

impl IntoVal for f64 {
    fn into_element(self, cb: &mut CodeBuilder) -> Element {
        let mut text = format!("{self}");
        if !text.contains(['.', 'e', 'E']) {
            text.push_str(".0");
        }
        let sym = cb.interner.intern(&text);
        let id = cb.alloc_expr(Expr::BasicLit {
            kind: LitKind::Float,
            value: sym,
        });
        let ty = cb.types.basic(BasicKind::UntypedFloat);
        let mut e = Element::expr(id, ty);
        e.cval = Some(Const::Float(self));
        e
    }
}

impl IntoVal for char {
    fn into_element(self, cb: &mut CodeBuilder) -> Element {
        let sym = cb.interner.intern(&format!("{self:?}"));
        let id = cb.alloc_expr(Expr::BasicLit {
            kind: LitKind::Rune,
            value: sym,
        });
        let ty = cb.types.basic(BasicKind::UntypedRune);
        let mut e = Element::expr(id, ty);
        e.cval = Some(Const::Int(self as i64));
        e
    }
}

impl IntoVal for &str {
    fn into_element(self, cb: &mut CodeBuilder) -> Element {
        let sym = cb.interner.intern(&format!("{self:?}"));
        let id = cb.alloc_expr(Expr::BasicLit {
            kind: LitKind::Str,
            value: sym,
        });
        let ty = cb.types.basic(BasicKind::UntypedString);
        let mut e = Element::expr(id, ty);
        e.cval = Some(Const::Str(self.to_string()));
        e
    }
}

impl IntoVal for String {
    fn into_element(self, cb: &mut CodeBuilder) -> Element {
        self.as_str().into_element(cb)
    }
}

impl IntoVal for Obj {
    fn into_element(self, cb: &mut CodeBuilder) -> Element {
        let obj = cb.subst_param(self);
        let data = cb.scopes.obj(obj).clone();
        match data.kind {
            ObjKind::Var | ObjKind::Func => {
                let id = cb.obj_expr(obj);
                Element::expr(id, data.ty)
            }
            ObjKind::Const(cval) => {
                let id = cb.obj_expr(obj);
                let mut e = Element::expr(id, data.ty);
                e.cval = cval;
                e
            }
            ObjKind::TypeName => {
                let te = cb.to_type(data.ty);
                let tt = cb.types.type_of(data.ty);
                Element {
                    val: Some(AstVal::Type(te)),
                    typ: Some(tt),
                    cval: None,
                    src: None,
                }
            }
            ObjKind::Builtin(_) => {
                let id = cb.ast.ident(data.name);
                Element::expr(id, data.ty)
            }
            ObjKind::PkgName(_) => panic!("cannot push a package name as a value"),
        }
    }
}
