//! Functions, closures, inline closures, and value/type declarations.

use crate::ast::{
    AssignTok, Block, Decl, Expr, Field, FuncDecl, GenDeclKind, Pos, Span, Spec, SpecId, Stmt,
    Symbol, TypeExpr,
};
use crate::builder::CodeBuilder;
use crate::error::CodeError;
use crate::scope::{Obj, ObjData, ObjKind};
use crate::stack::Element;
use crate::stmt::{BlockCtx, BlockKind, LabelRef};
use crate::typesys::{TypeKind, TypeSlot, Ty};

/// Handle to a function under construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct FuncRef(u32);

impl FuncRef {
    #[inline]
    pub(crate) const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub(crate) const fn raw(self) -> u32 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FuncKind {
    Ordinary,
    Closure,
    /// Inline closure remembering the call arity it will splice over.
    Inline { arity: usize },
}

pub(crate) struct FuncData {
    pub name: Option<Symbol>,
    pub sig: Ty,
    pub kind: FuncKind,
    pub obj: Option<Obj>,
    /// Enclosing function at body start (used by inline closures).
    pub outer: Option<FuncRef>,
}

impl FuncData {
    #[inline]
    pub fn is_inline(&self) -> bool {
        matches!(self.kind, FuncKind::Inline { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DeclTok {
    Var,
    Const,
    Define,
}

/// In-flight value declaration awaiting its initializer.
pub(crate) struct VarDeclState {
    pub tok: DeclTok,
    pub names: Vec<Symbol>,
    pub pos: Pos,
    pub typ: Option<Ty>,
    pub spec: Option<SpecId>,
    pub base: usize,
}

/// A named type whose underlying is supplied later (recursive types).
#[derive(Debug, Clone, Copy)]
pub struct TypeDecl {
    pub named: Ty,
    spec: SpecId,
}

impl CodeBuilder {
    // -------------------------------------------------------------------------
    // Functions
    // -------------------------------------------------------------------------

    /// Declares a function or method. A method (with `recv`) registers
    /// itself on the receiver's named type instead of the package scope.
    pub fn new_func(
        &mut self,
        recv: Option<Obj>,
        name: &str,
        params: Vec<Obj>,
        results: Vec<Obj>,
        variadic: bool,
    ) -> Result<FuncRef, CodeError> {
        let sig = self.types.signature(recv, params, results, variadic);
        self.new_func_with(Pos::NONE, name, sig)
    }

    pub fn new_func_with(&mut self, pos: Pos, name: &str, sig: Ty) -> Result<FuncRef, CodeError> {
        if crate::debug_instr() {
            log::debug!(target: "gobuild::instr", "NewFunc {name}");
        }
        let sym = self.interner.intern(name);
        let recv = match self.types.kind(sig) {
            TypeKind::Signature { recv, .. } => *recv,
            _ => panic!("new_func_with: not a signature"),
        };
        let f = FuncRef(self.funcs.len() as u32);
        let obj = match recv {
            Some(r) => {
                let rt = self.scopes.obj(r).ty;
                let named = self.types.indirect(rt);
                if !matches!(self.types.kind(named), TypeKind::Named { .. }) {
                    return Err(self.error_at_pos(
                        pos,
                        format!("invalid receiver type {}", self.ty_str(rt)),
                    ));
                }
                self.types.add_method(named, sym, sig);
                None
            }
            None => {
                let obj = self.scopes.new_obj(ObjData {
                    name: sym,
                    ty: sig,
                    pos,
                    pkg: None,
                    kind: ObjKind::Func,
                });
                let scope = self.pkg.types_scope;
                if name != "_" {
                    if let Some(old) = self.scopes.insert(scope, obj) {
                        let old_pos = self.position(self.scopes.obj(old).pos);
                        return Err(self.error_at_pos(
                            pos,
                            format!(
                                "{name} redeclared in this block\n\tprevious declaration at {old_pos}"
                            ),
                        ));
                    }
                }
                Some(obj)
            }
        };
        self.funcs.push(FuncData {
            name: Some(sym),
            sig,
            kind: FuncKind::Ordinary,
            obj,
            outer: None,
        });
        Ok(f)
    }

    /// Creates an anonymous function (closure); `end()` of its body
    /// pushes the function literal onto the stack.
    pub fn new_closure(
        &mut self,
        params: Vec<Obj>,
        results: Vec<Obj>,
        variadic: bool,
    ) -> FuncRef {
        let sig = self.types.signature(None, params, results, variadic);
        self.new_closure_with(sig)
    }

    pub fn new_closure_with(&mut self, sig: Ty) -> FuncRef {
        if crate::debug_instr() {
            if let TypeKind::Signature { params, .. } = self.types.kind(sig).clone() {
                for p in params {
                    let pt = self.scopes.obj(p).ty;
                    if matches!(self.types.kind(pt), TypeKind::Unbound { .. }) {
                        panic!("can't use unbound type in func parameters");
                    }
                }
            }
        }
        let f = FuncRef(self.funcs.len() as u32);
        self.funcs.push(FuncData {
            name: None,
            sig,
            kind: FuncKind::Closure,
            obj: None,
            outer: None,
        });
        f
    }

    pub(crate) fn func_sig(&self, f: FuncRef) -> Ty {
        self.funcs[f.raw() as usize].sig
    }

    pub fn func_obj(&self, f: FuncRef) -> Option<Obj> {
        self.funcs[f.raw() as usize].obj
    }

    /// Opens the function body; parameters, results, and the receiver
    /// enter the body scope (anonymous ones are skipped).
    pub fn body_start(&mut self, f: FuncRef) -> &mut Self {
        let sig = self.func_sig(f);
        let scope = self.scopes.new_scope(Some(self.scope()), "func body");
        let base = self.stk.len();
        let old_fn = self.cur_fn.replace(f);
        let old_labels = std::mem::take(&mut self.labels);
        self.funcs[f.raw() as usize].outer = old_fn;
        self.blocks.push(BlockCtx::new(
            BlockKind::FuncBody {
                func: f,
                old_fn,
                old_labels,
            },
            scope,
            base,
        ));
        let (recv, params, results) = match self.types.kind(sig) {
            TypeKind::Signature {
                recv,
                params,
                results,
                ..
            } => (*recv, params.clone(), results.clone()),
            _ => panic!("function signature expected"),
        };
        for obj in params.into_iter().chain(results).chain(recv) {
            let name = self.scopes.obj(obj).name;
            if !self.interner.resolve(name).is_empty() && self.interner.resolve(name) != "_" {
                self.scopes.insert(scope, obj);
            }
        }
        self
    }

    pub(crate) fn end_func_body(&mut self) {
        // An inline closure's ending label attaches to a trailing empty
        // statement, the jump target for its rewritten returns.
        if let BlockKind::FuncBody { func, .. } = self.cur().kind {
            if self.funcs[func.raw() as usize].is_inline() {
                if let Some(&sym) = self.ending_labels.get(&func) {
                    self.cur_mut().label = Some(sym);
                }
            }
        }
        // Unused labels are reported before the context unwinds.
        let unused: Vec<(Symbol, Pos)> = self
            .labels
            .iter()
            .filter(|(_, info)| !info.used)
            .map(|(&sym, info)| (sym, info.pos))
            .collect();
        for (sym, pos) in unused {
            let name = self.interner.resolve(sym).to_string();
            let err = self.error_at_pos(pos, format!("label {name} defined and not used"));
            self.report_err(err);
        }

        let ctx = self.pop_block();
        let (f, old_fn, old_labels) = match ctx.kind {
            BlockKind::FuncBody {
                func,
                old_fn,
                old_labels,
            } => (func, old_fn, old_labels),
            _ => unreachable!(),
        };
        self.cur_fn = old_fn;
        self.labels = old_labels;

        let sig = self.func_sig(f);
        match self.funcs[f.raw() as usize].kind {
            FuncKind::Ordinary => {
                let body = Block {
                    stmts: self.ast.list_stmts(ctx.stmts),
                };
                let name = self.funcs[f.raw() as usize].name.expect("unnamed func decl");
                let recv_field = match self.types.kind(sig) {
                    TypeKind::Signature { recv: Some(r), .. } => {
                        let r = *r;
                        let data = self.scopes.obj(r).clone();
                        let typ = self.to_type(data.ty);
                        let names = if self.interner.resolve(data.name).is_empty() {
                            self.ast.list_idents([])
                        } else {
                            self.ast.list_idents([data.name])
                        };
                        Some(self.ast.fields.alloc(
                            Field {
                                names,
                                typ,
                                tag: None,
                                embedded: false,
                            },
                            Span::default(),
                        ))
                    }
                    _ => None,
                };
                let typ = self.to_type(sig);
                let fd = self.ast.func_decls.alloc(
                    FuncDecl {
                        name,
                        recv: recv_field,
                        typ,
                        body: Some(body),
                    },
                    Span::default(),
                );
                let decl = self.ast.decls.alloc(Decl::Func(fd), Span::default());
                self.pkg.file_mut().decls.push(decl);
            }
            FuncKind::Closure => {
                let body = Block {
                    stmts: self.ast.list_stmts(ctx.stmts),
                };
                let typ = self.to_type(sig);
                let id = self.alloc_expr(Expr::FuncLit { typ, body });
                self.stk.push(Element::expr(id, sig));
            }
            FuncKind::Inline { arity } => {
                self.inline_closure_end(f, arity, ctx.stmts);
            }
        }
    }

    // -------------------------------------------------------------------------
    // Inline closures
    // -------------------------------------------------------------------------

    pub(crate) fn ending_label(&mut self, f: FuncRef) -> LabelRef {
        if let Some(&sym) = self.ending_labels.get(&f) {
            return LabelRef(sym);
        }
        let name = self.pkg.auto_name();
        let l = self
            .new_label(Pos::NONE, &name)
            .expect("ending label collision");
        self.ending_labels.insert(f, l.0);
        l
    }

    /// Starts an inline closure call: the closure's body will splice into
    /// the caller as a labeled block, with every `return` rewritten to
    /// result assignments plus a jump to the ending label.
    pub fn call_inline_closure_start(
        &mut self,
        sig: Ty,
        arity: usize,
        ellipsis: bool,
    ) -> &mut Self {
        if crate::debug_instr() {
            log::debug!(target: "gobuild::instr", "CallInlineClosureStart {arity} {ellipsis}");
        }
        let closure = FuncRef(self.funcs.len() as u32);
        self.funcs.push(FuncData {
            name: None,
            sig,
            kind: FuncKind::Inline { arity },
            obj: None,
            outer: None,
        });
        let (params, results, variadic) = match self.types.kind(sig) {
            TypeKind::Signature {
                params,
                results,
                variadic,
                ..
            } => (params.clone(), results.clone(), *variadic),
            _ => panic!("function signature expected"),
        };
        // Synthetic result variables live in the caller's scope.
        for &r in &results {
            self.emit_inst_var(closure, r, false);
        }
        self.body_start(closure);
        // The call arguments below the base are consumed into synthetic
        // parameter variables; the block closes at the shrunken length.
        {
            let b = self.cur().base;
            self.cur_mut().base = b - arity;
        }
        let args: Vec<Element> = self.stk.get_args(arity).to_vec();
        let flags = crate::assign::InstrFlags {
            ellipsis,
            two_value: false,
        };
        if let Err(err) = self.match_func_type(sig, &args, flags, None) {
            std::panic::panic_any(err);
        }
        let n1 = params.len().wrapping_sub(1);
        if variadic && !ellipsis {
            let last_ty = self.scopes.obj(params[n1]).ty;
            self.slice_lit(Some(last_ty), arity - n1, false);
        }
        for i in (0..params.len()).rev() {
            self.emit_inst_var(closure, params[i], true);
        }
        self
    }

    /// Declares one synthetic variable standing in for a closure
    /// parameter or result.
    fn emit_inst_var(&mut self, closure: FuncRef, param: Obj, with_init: bool) {
        let name = self.pkg.auto_name();
        let ty = self.scopes.obj(param).ty;
        if with_init {
            self.new_var_start(ty, &[name.as_str()]);
            self.end_init(1);
        } else {
            self.new_var(ty, &[name.as_str()]);
        }
        let sym = self.interner.intern(&name);
        let inst = self
            .scopes
            .lookup(self.scope(), sym)
            .expect("synthetic variable missing");
        self.param_insts.insert((closure, param), inst);
    }

    fn inline_closure_end(&mut self, f: FuncRef, _arity: usize, stmts: Vec<crate::ast::StmtId>) {
        let block = Block {
            stmts: self.ast.list_stmts(stmts),
        };
        let id = self.ast.stmts.alloc(Stmt::Block(block), Span::default());
        self.emit_stmt_id(id);
        let sig = self.func_sig(f);
        let (params, results) = match self.types.kind(sig) {
            TypeKind::Signature {
                params, results, ..
            } => (params.clone(), results.clone()),
            _ => panic!("function signature expected"),
        };
        // Push the synthetic result variables as the call's values, then
        // clean the instantiation environment.
        for &r in &results {
            let inst = self
                .param_insts
                .remove(&(f, r))
                .expect("inline closure result variable missing");
            self.val(inst);
        }
        for &p in &params {
            self.param_insts.remove(&(f, p));
        }
        self.ending_labels.remove(&f);
    }

    // -------------------------------------------------------------------------
    // Value declarations
    // -------------------------------------------------------------------------

    fn at_top_level(&self) -> bool {
        matches!(self.cur().kind, BlockKind::TopLevel)
    }

    fn new_value_decl(
        &mut self,
        tok: DeclTok,
        pos: Pos,
        typ: Option<Ty>,
        names: &[&str],
    ) -> VarDeclState {
        let syms: Vec<Symbol> = names.iter().map(|n| self.interner.intern(n)).collect();
        let spec = match tok {
            DeclTok::Define => None,
            _ => {
                let name_ids: Vec<_> = syms.iter().map(|&s| self.ast.ident(s)).collect();
                let names_list = self.ast.list_exprs(name_ids);
                let typ_expr = typ.map(|t| self.to_type(t));
                let spec = self.ast.specs.alloc(
                    Spec::Value {
                        names: names_list,
                        typ: typ_expr,
                        values: crate::ast::ListRef::EMPTY,
                    },
                    Span::default(),
                );
                let specs = self.ast.list_specs([spec]);
                let kind = if tok == DeclTok::Const {
                    GenDeclKind::Const
                } else {
                    GenDeclKind::Var
                };
                let decl = self.ast.decls.alloc(Decl::Gen { kind, specs }, Span::default());
                if self.at_top_level() {
                    self.pkg.file_mut().decls.push(decl);
                } else {
                    let id = self.ast.stmts.alloc(Stmt::Decl(decl), Span::default());
                    self.emit_stmt_id(id);
                }
                Some(spec)
            }
        };
        // Typed vars become visible immediately; define/const bind at
        // EndInit.
        if tok == DeclTok::Var {
            if let Some(t) = typ {
                for (i, &sym) in syms.iter().enumerate() {
                    if names[i] == "_" {
                        continue;
                    }
                    let obj = self.new_var_obj(pos, sym, t);
                    let scope = self.scope();
                    if let Some(old) = self.scopes.insert(scope, obj) {
                        let old_pos = self.position(self.scopes.obj(old).pos);
                        std::panic::panic_any(self.error_at_pos(
                            pos,
                            format!(
                                "{} redeclared in this block\n\tprevious declaration at {old_pos}",
                                names[i]
                            ),
                        ));
                    }
                }
            }
        }
        VarDeclState {
            tok,
            names: syms,
            pos,
            typ,
            spec,
            base: self.stk.len(),
        }
    }

    /// `var names T` without an initializer.
    pub fn new_var(&mut self, typ: Ty, names: &[&str]) -> &mut Self {
        if crate::debug_instr() {
            log::debug!(target: "gobuild::instr", "NewVar {names:?}");
        }
        self.new_value_decl(DeclTok::Var, Pos::NONE, Some(typ), names);
        self
    }

    /// `var names T = ...`; the initializer follows, ended by `end_init`.
    pub fn new_var_start(&mut self, typ: Ty, names: &[&str]) -> &mut Self {
        if crate::debug_instr() {
            log::debug!(target: "gobuild::instr", "NewVarStart {names:?}");
        }
        let state = self.new_value_decl(DeclTok::Var, Pos::NONE, Some(typ), names);
        self.var_decls.push(state);
        self
    }

    /// `const names [T] = ...`.
    pub fn new_const_start(&mut self, typ: Option<Ty>, names: &[&str]) -> &mut Self {
        if crate::debug_instr() {
            log::debug!(target: "gobuild::instr", "NewConstStart {names:?}");
        }
        let state = self.new_value_decl(DeclTok::Const, Pos::NONE, typ, names);
        self.var_decls.push(state);
        self
    }

    /// `names := ...`.
    pub fn define_var_start(&mut self, pos: Pos, names: &[&str]) -> &mut Self {
        if crate::debug_instr() {
            log::debug!(target: "gobuild::instr", "DefineVarStart {names:?}");
        }
        let state = self.new_value_decl(DeclTok::Define, pos, None, names);
        self.var_decls.push(state);
        self
    }

    /// Declares a variable whose type is filled in at its first typed
    /// use; returns the variable object.
    pub fn new_auto_var(&mut self, pos: Pos, name: &str) -> Obj {
        if crate::debug_instr() {
            log::debug!(target: "gobuild::instr", "NewAutoVar {name}");
        }
        let sym = self.interner.intern(name);
        let name_id = self.ast.ident(sym);
        let names_list = self.ast.list_exprs([name_id]);
        let spec = self.ast.specs.alloc(
            Spec::Value {
                names: names_list,
                typ: None,
                values: crate::ast::ListRef::EMPTY,
            },
            Span::default(),
        );
        let specs = self.ast.list_specs([spec]);
        let decl = self.ast.decls.alloc(
            Decl::Gen {
                kind: GenDeclKind::Var,
                specs,
            },
            Span::default(),
        );
        let id = self.ast.stmts.alloc(Stmt::Decl(decl), Span::default());
        self.emit_stmt_id(id);
        let ty = self.types.unbound();
        if let TypeKind::Unbound { slots, .. } = self.types.kind_mut(ty) {
            slots.push(TypeSlot::ValueSpec(spec));
        }
        let obj = self.new_var_obj(pos, sym, ty);
        let scope = self.scope();
        if let Some(old) = self.scopes.insert(scope, obj) {
            let old_pos = self.position(self.scopes.obj(old).pos);
            std::panic::panic_any(self.error_at_pos(
                pos,
                format!("{name} redeclared in this block\n\tprevious declaration at {old_pos}"),
            ));
        }
        obj
    }

    /// Completes a value declaration with the top `n` operands as
    /// initializers.
    pub fn end_init(&mut self, n: usize) -> &mut Self {
        if crate::debug_instr() {
            log::debug!(target: "gobuild::instr", "EndInit {n}");
        }
        let state = self.var_decls.pop().expect("EndInit without a pending declaration");
        let args: Vec<Element> = self.stk.get_args(n).to_vec();
        let nvars = state.names.len();

        // One call yielding a tuple spreads over all names.
        let tuple_items = if n == 1 {
            args[0].typ.and_then(|t| match self.types.kind(t) {
                TypeKind::Tuple { items } => Some(items.clone()),
                _ => None,
            })
        } else {
            None
        };
        let value_tys: Vec<Option<Ty>> = match &tuple_items {
            Some(items) => {
                if items.len() != nvars {
                    let pos = self.position(state.pos);
                    let caller = self.caller_desc(args[0].src);
                    std::panic::panic_any(self.code_error(
                        Some(pos),
                        format!(
                            "assignment mismatch: {nvars} variables but {caller} returns {} values",
                            items.len()
                        ),
                    ));
                }
                items.iter().map(|&t| Some(t)).collect()
            }
            None => {
                if n != nvars {
                    let pos = self.position(state.pos);
                    std::panic::panic_any(self.code_error(
                        Some(pos),
                        format!("assignment mismatch: {nvars} variables but {n} values"),
                    ));
                }
                args.iter().map(|a| a.typ).collect()
            }
        };

        let mut value_exprs = Vec::with_capacity(n);
        match state.tok {
            DeclTok::Var => {
                let target = state.typ.expect("var declaration without type");
                match &tuple_items {
                    Some(items) => {
                        for &item in items {
                            if !self.assignable_to(item, target, None) {
                                let (code, pos) = self.load_expr(args[0].src);
                                let at = self.ty_str(item);
                                let ts = self.ty_str(target);
                                let err = self.code_error(
                                    Some(pos),
                                    format!(
                                        "cannot use {code} (type {at}) as type {ts} in assignment"
                                    ),
                                );
                                self.report_err(err);
                            }
                        }
                        value_exprs
                            .push(args[0].expr_id().expect("initializer is not an expression"));
                    }
                    None => {
                        for arg in &args {
                            let conv = self.conv_elem(arg.clone(), target);
                            if !self.assignable_to_elem(&conv, target) {
                                let (code, pos) = self.load_expr(arg.src);
                                let at = arg.typ.map(|t| self.ty_str(t)).unwrap_or_default();
                                let ts = self.ty_str(target);
                                let err = self.code_error(
                                    Some(pos),
                                    format!(
                                        "cannot use {code} (type {at}) as type {ts} in assignment"
                                    ),
                                );
                                self.report_err(err);
                            }
                            value_exprs
                                .push(conv.expr_id().expect("initializer is not an expression"));
                        }
                    }
                }
            }
            DeclTok::Const => {
                if tuple_items.is_some() {
                    panic!("const initializer cannot be a multi-value call");
                }
                for (i, &sym) in state.names.iter().enumerate() {
                    let arg = &args[i];
                    let cval = match &arg.cval {
                        Some(c) => Some(c.clone()),
                        None => {
                            let (code, pos) = self.load_expr(arg.src);
                            let err = self.code_error(
                                Some(pos),
                                format!("const initializer {code} is not a constant"),
                            );
                            self.report_err(err);
                            None
                        }
                    };
                    if let (Some(t), Some(vt)) = (state.typ, arg.typ) {
                        if !self.assignable_to(vt, t, arg.cval.as_ref()) {
                            let (code, pos) = self.load_expr(arg.src);
                            let vts = self.ty_str(vt);
                            let ts = self.ty_str(t);
                            let err = self.code_error(
                                Some(pos),
                                format!("cannot use {code} (type {vts}) as type {ts} in assignment"),
                            );
                            self.report_err(err);
                        }
                    }
                    let ty = match state.typ {
                        Some(t) => t,
                        None => value_tys[i].expect("constant without a type"),
                    };
                    if self.interner.resolve(sym) != "_" {
                        let obj = self.scopes.new_obj(ObjData {
                            name: sym,
                            ty,
                            pos: state.pos,
                            pkg: None,
                            kind: ObjKind::Const(cval),
                        });
                        let scope = self.scope();
                        if let Some(old) = self.scopes.insert(scope, obj) {
                            let old_pos = self.position(self.scopes.obj(old).pos);
                            let name = self.interner.resolve(sym).to_string();
                            std::panic::panic_any(self.error_at_pos(
                                state.pos,
                                format!(
                                    "{name} redeclared in this block\n\tprevious declaration at {old_pos}"
                                ),
                            ));
                        }
                    }
                }
                for arg in &args {
                    value_exprs.push(arg.expr_id().expect("initializer is not an expression"));
                }
            }
            DeclTok::Define => {
                for (i, &sym) in state.names.iter().enumerate() {
                    if self.interner.resolve(sym) == "_" {
                        continue;
                    }
                    let vt = value_tys[i].unwrap_or_else(|| {
                        self.panic_code_error(
                            None,
                            "cannot infer type from untyped value".to_string(),
                        )
                    });
                    let ty = self.default_ty(vt);
                    let obj = self.new_var_obj(state.pos, sym, ty);
                    let scope = self.scope();
                    if let Some(old) = self.scopes.insert(scope, obj) {
                        let old_pos = self.position(self.scopes.obj(old).pos);
                        let name = self.interner.resolve(sym).to_string();
                        std::panic::panic_any(self.error_at_pos(
                            state.pos,
                            format!(
                                "{name} redeclared in this block\n\tprevious declaration at {old_pos}"
                            ),
                        ));
                    }
                }
                for arg in &args {
                    value_exprs.push(arg.expr_id().expect("initializer is not an expression"));
                }
            }
        }

        match state.spec {
            Some(spec) => {
                let values = self.ast.list_exprs(value_exprs);
                if let Spec::Value { values: v, .. } = &mut self.ast.specs[spec] {
                    *v = values;
                }
            }
            None => {
                // Short variable declaration.
                let name_ids: Vec<_> = state
                    .names
                    .iter()
                    .map(|&s| self.ast.ident(s))
                    .collect();
                let lhs = self.ast.list_exprs(name_ids);
                let rhs = self.ast.list_exprs(value_exprs);
                let id = self.ast.stmts.alloc(
                    Stmt::Assign {
                        lhs,
                        op: AssignTok::Define,
                        rhs,
                    },
                    Span::default(),
                );
                self.emit_stmt_id(id);
            }
        }
        self.stk.pop_n(n);
        self
    }

    /// Drops any initializer operands pushed since `*Start`, keeping the
    /// declaration pending.
    pub fn reset_init(&mut self) -> &mut Self {
        if crate::debug_instr() {
            log::debug!(target: "gobuild::instr", "ResetInit");
        }
        let base = self
            .var_decls
            .last()
            .expect("ResetInit without a pending declaration")
            .base;
        self.stk.set_len(base);
        self
    }

    // -------------------------------------------------------------------------
    // Type declarations
    // -------------------------------------------------------------------------

    /// Declares a named type whose underlying is supplied later via
    /// `init_type` (allows recursive types).
    pub fn new_type(&mut self, name: &str, pos: Pos) -> TypeDecl {
        if crate::debug_instr() {
            log::debug!(target: "gobuild::instr", "NewType {name}");
        }
        self.do_new_type(name, pos, None, false).0
    }

    /// Declares `name` as an alias for `typ`.
    pub fn alias_type(&mut self, name: &str, typ: Ty, pos: Pos) -> Ty {
        if crate::debug_instr() {
            log::debug!(target: "gobuild::instr", "AliasType {name}");
        }
        self.do_new_type(name, pos, Some(typ), true).1
    }

    fn do_new_type(
        &mut self,
        name: &str,
        pos: Pos,
        typ: Option<Ty>,
        alias: bool,
    ) -> (TypeDecl, Ty) {
        let sym = self.interner.intern(name);
        let (obj_ty, named) = match typ {
            Some(t) if alias => (t, t),
            _ => {
                let named = self.types.named(None, sym, typ);
                (named, named)
            }
        };
        let typ_expr = match typ {
            Some(t) => self.to_type(t),
            None => self.alloc_type(TypeExpr::Infer),
        };
        let spec = self.ast.specs.alloc(
            Spec::Type {
                name: sym,
                alias,
                typ: typ_expr,
            },
            Span::default(),
        );
        let specs = self.ast.list_specs([spec]);
        let decl = self.ast.decls.alloc(
            Decl::Gen {
                kind: GenDeclKind::Type,
                specs,
            },
            Span::default(),
        );
        if self.at_top_level() {
            self.pkg.file_mut().decls.push(decl);
        } else {
            let id = self.ast.stmts.alloc(Stmt::Decl(decl), Span::default());
            self.emit_stmt_id(id);
        }
        let obj = self.scopes.new_obj(ObjData {
            name: sym,
            ty: obj_ty,
            pos,
            pkg: None,
            kind: ObjKind::TypeName,
        });
        let scope = self.scope();
        if let Some(old) = self.scopes.insert(scope, obj) {
            let old_pos = self.position(self.scopes.obj(old).pos);
            std::panic::panic_any(self.error_at_pos(
                pos,
                format!("{name} redeclared in this block\n\tprevious declaration at {old_pos}"),
            ));
        }
        (TypeDecl { named, spec }, named)
    }

    /// Completes a `new_type` declaration with its underlying type.
    pub fn init_type(&mut self, decl: TypeDecl, underlying: Ty) -> Ty {
        self.types.set_underlying(decl.named, underlying);
        let te = self.to_type(underlying);
        if let Spec::Type { typ, .. } = &mut self.ast.specs[decl.spec] {
            *typ = te;
        }
        decl.named
    }
}
