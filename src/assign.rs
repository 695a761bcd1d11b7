//! Assignability, conversions, function-call matching, and the operator
//! resolver.
//!
//! Operator resolution order is fixed: a method on the primary operand's
//! named type (one pointer auto-deref allowed), then (for a constant
//! primary against a named secondary) a promoting conversion onto the
//! secondary's method, then the builtin instruction of the same name, then
//! the structural `==`/`!=` fallback. Resolution is deterministic.

use crate::ast::{
    AssignOp, AssignTok, AstVal, BinaryOp, Callee, ChanDir, Expr, ExprId, IncDecOp, Span, Stmt,
    UnaryOp,
};
use crate::builder::CodeBuilder;
use crate::constant::{self, Const};
use crate::error::CodeError;
use crate::scope::Obj;
use crate::stack::Element;
use crate::typesys::{BasicKind, TypeKind, TypeSlot, Ty};
use crate::builtin::Instr;

/// Flags modifying a call or operator instruction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InstrFlags {
    pub ellipsis: bool,
    pub two_value: bool,
}

impl CodeBuilder {
    // -------------------------------------------------------------------------
    // Type relations
    // -------------------------------------------------------------------------

    /// The type an untyped operand assumes without further context.
    pub(crate) fn default_ty(&mut self, ty: Ty) -> Ty {
        match self.types.kind(ty) {
            TypeKind::Basic(k) if k.is_untyped() => {
                let k = *k;
                if k == BasicKind::UntypedNil {
                    ty
                } else {
                    self.types.basic(k.default_kind())
                }
            }
            _ => ty,
        }
    }

    /// Structural identity, used only below the top level.
    pub(crate) fn similar(&mut self, a: Ty, b: Ty) -> bool {
        if a == b {
            return true;
        }
        match (self.types.kind(a).clone(), self.types.kind(b).clone()) {
            (TypeKind::Basic(x), TypeKind::Basic(y)) => x == y,
            (
                TypeKind::Slice { elem: ea },
                TypeKind::Slice { elem: eb },
            ) => self.similar(ea, eb),
            (
                TypeKind::Array { elem: ea, len: la },
                TypeKind::Array { elem: eb, len: lb },
            ) => la == lb && self.similar(ea, eb),
            (
                TypeKind::Map { key: ka, elem: ea },
                TypeKind::Map { key: kb, elem: eb },
            ) => self.similar(ka, kb) && self.similar(ea, eb),
            (
                TypeKind::Chan { dir: da, elem: ea },
                TypeKind::Chan { dir: db, elem: eb },
            ) => da == db && self.similar(ea, eb),
            (
                TypeKind::Pointer { elem: ea },
                TypeKind::Pointer { elem: eb },
            ) => self.similar(ea, eb),
            (
                TypeKind::Struct { fields: fa },
                TypeKind::Struct { fields: fb },
            ) => {
                fa.len() == fb.len()
                    && fa.iter().zip(fb.iter()).all(|(x, y)| {
                        x.name == y.name && x.embedded == y.embedded && x.tag == y.tag
                    })
                    && fa
                        .iter()
                        .zip(fb.iter())
                        .collect::<Vec<_>>()
                        .iter()
                        .all(|(x, y)| self.similar(x.ty, y.ty))
            }
            (
                TypeKind::Signature {
                    params: pa,
                    results: ra,
                    variadic: va,
                    ..
                },
                TypeKind::Signature {
                    params: pb,
                    results: rb,
                    variadic: vb,
                    ..
                },
            ) => {
                va == vb
                    && pa.len() == pb.len()
                    && ra.len() == rb.len()
                    && self.obj_types_similar(&pa, &pb)
                    && self.obj_types_similar(&ra, &rb)
            }
            (
                TypeKind::Interface { methods: ma, .. },
                TypeKind::Interface { methods: mb, .. },
            ) => {
                ma.len() == mb.len()
                    && ma
                        .iter()
                        .zip(mb.iter())
                        .collect::<Vec<_>>()
                        .iter()
                        .all(|(x, y)| x.name == y.name && self.similar(x.sig, y.sig))
            }
            _ => false,
        }
    }

    fn obj_types_similar(&mut self, a: &[Obj], b: &[Obj]) -> bool {
        for (&x, &y) in a.iter().zip(b.iter()) {
            let tx = self.scopes.obj(x).ty;
            let ty = self.scopes.obj(y).ty;
            if !self.similar(tx, ty) {
                return false;
            }
        }
        true
    }

    fn is_nilable(&mut self, ty: Ty) -> bool {
        let u = match self.types.underlying_raw(ty) {
            Some(u) => u,
            None => self.underlying(ty),
        };
        matches!(
            self.types.kind(u),
            TypeKind::Pointer { .. }
                | TypeKind::Slice { .. }
                | TypeKind::Map { .. }
                | TypeKind::Chan { .. }
                | TypeKind::Signature { .. }
                | TypeKind::Interface { .. }
                | TypeKind::Basic(BasicKind::UnsafePointer)
        )
    }

    /// Whether `from`'s method set covers `iface`'s.
    fn satisfies(&mut self, from: Ty, iface: Ty) -> bool {
        let methods = match self.types.kind(iface) {
            TypeKind::Interface { methods, .. } => methods.clone(),
            _ => return false,
        };
        if methods.is_empty() {
            return true;
        }
        self.ensure_loaded(from);
        let target = self.types.indirect(from);
        let own: Vec<_> = match self.interface_of(target) {
            Some(i) => self.types.named_methods(i).to_vec(),
            None => self.types.named_methods(target).to_vec(),
        };
        // Name-level satisfaction; signature shapes are the loader's
        // responsibility.
        methods.iter().all(|m| own.iter().any(|o| o.name == m.name))
    }

    /// Go assignability, with the untyped-constant and big-number
    /// extensions.
    pub(crate) fn assignable_to(&mut self, from: Ty, to: Ty, cval: Option<&Const>) -> bool {
        let from = self.types.deref_ref(from);
        if from == to {
            return true;
        }
        // nil
        if self.types.is_nil(from) {
            return self.is_nilable(to);
        }
        // any interface target
        if let Some(iface) = self.interface_of_shallow(to) {
            return self.satisfies(from, iface);
        }
        // untyped source
        if let TypeKind::Basic(fk) = self.types.kind(from).clone() {
            if fk.is_untyped() {
                if Some(to) == self.pkg.ut_big_int {
                    return cval.map(|c| c.is_integer()).unwrap_or(fk.is_integer());
                }
                if Some(to) == self.pkg.ut_big_rat {
                    return fk.is_numeric();
                }
                let tu = self.underlying(to);
                if let TypeKind::Basic(tk) = self.types.kind(tu).clone() {
                    if let Some(c) = cval {
                        return c.representable(tk);
                    }
                    return untyped_compatible(fk, tk);
                }
                return false;
            }
        }
        // bidirectional channel to directed channel
        if let (
            TypeKind::Chan {
                dir: ChanDir::Both,
                elem: ea,
            },
            TypeKind::Chan { dir: _, elem: eb },
        ) = (self.types.kind(from).clone(), self.types.kind(to).clone())
        {
            return self.similar(ea, eb);
        }
        // identical underlying, at most one side named
        let fn_named = matches!(self.types.kind(from), TypeKind::Named { .. });
        let to_named = matches!(self.types.kind(to), TypeKind::Named { .. });
        if fn_named && to_named {
            return false;
        }
        let fu = self.underlying(from);
        let tu = self.underlying(to);
        self.similar(fu, tu)
    }

    fn interface_of_shallow(&mut self, ty: Ty) -> Option<Ty> {
        let u = match self.types.underlying_raw(ty) {
            Some(u) => u,
            None => self.underlying(ty),
        };
        match self.types.kind(u) {
            TypeKind::Interface { .. } => Some(u),
            _ => None,
        }
    }

    pub(crate) fn assignable_to_elem(&mut self, e: &Element, to: Ty) -> bool {
        match e.typ {
            Some(t) => self.assignable_to(t, to, e.cval.as_ref()),
            None => false,
        }
    }

    /// Assignability with conversion: when the target is a distinguished
    /// big named type and the operand is an untyped constant, the operand
    /// is rewritten in place to `bigname(value)`.
    pub(crate) fn assignable_conv_elem(&mut self, arity: usize, i: usize, to: Ty) -> bool {
        let idx = self.stk.len() as isize - arity as isize + i as isize;
        let e = self.stk.get(idx).clone();
        if self.try_big_conv(&e, to).map(|new| {
            *self.stk.get_mut(idx) = new;
        }).is_some()
        {
            return true;
        }
        self.assignable_to_elem(&e, to)
    }

    /// Applies the untyped-constant → big-named conversion to a detached
    /// element, returning the rewritten element.
    pub(crate) fn conv_elem(&mut self, e: Element, to: Ty) -> Element {
        match self.try_big_conv(&e, to) {
            Some(new) => new,
            None => e,
        }
    }

    fn try_big_conv(&mut self, e: &Element, to: Ty) -> Option<Element> {
        let is_big_int = Some(to) == self.pkg.ut_big_int;
        let is_big_rat = Some(to) == self.pkg.ut_big_rat;
        if !is_big_int && !is_big_rat {
            return None;
        }
        let et = e.typ?;
        if et == to {
            return None;
        }
        let src_ok = match self.types.basic_kind(et) {
            Some(k) => k.is_untyped() && k.is_numeric(),
            // An untyped bigint constant still converts up to bigrat.
            None => is_big_rat && Some(et) == self.pkg.ut_big_int,
        };
        if !src_ok {
            return None;
        }
        let c = e.cval.as_ref()?;
        let cval = if is_big_int {
            Const::Big(c.to_bigint()?)
        } else {
            Const::Rat(c.to_bigrat()?)
        };
        let te = self.to_type(to);
        let x = e.expr_id()?;
        let args = self.ast.list_exprs([x]);
        let id = self.alloc_expr(Expr::Call {
            fun: Callee::Type(te),
            type_arg: None,
            args,
            ellipsis: false,
        });
        Some(Element {
            val: Some(AstVal::Expr(id)),
            typ: Some(to),
            cval: Some(cval),
            src: e.src,
        })
    }

    /// Structural comparability of two operands (the `==`/`!=` fallback).
    pub(crate) fn comparable(&mut self, a: &Element, b: &Element) -> bool {
        let (ta, tb) = match (a.typ, b.typ) {
            (Some(x), Some(y)) => (x, y),
            _ => return false,
        };
        if self.types.is_nil(ta) {
            return self.is_nilable(tb);
        }
        if self.types.is_nil(tb) {
            return self.is_nilable(ta);
        }
        self.assignable_to(ta, tb, a.cval.as_ref()) || self.assignable_to(tb, ta, b.cval.as_ref())
    }

    /// Join on the untyped promotion ladder, extended with the big types.
    pub(crate) fn untyped_join(&mut self, a: Ty, b: Ty) -> Option<Ty> {
        if a == b {
            return Some(a);
        }
        let big_int = self.pkg.ut_big_int;
        let big_rat = self.pkg.ut_big_rat;
        if Some(a) == big_rat || Some(b) == big_rat {
            return big_rat;
        }
        if Some(a) == big_int || Some(b) == big_int {
            let other = if Some(a) == big_int { b } else { a };
            return match self.types.basic_kind(other) {
                Some(k) if k.is_integer() => big_int,
                Some(k) if k.is_numeric() => big_rat,
                _ => None,
            };
        }
        let ka = self.types.basic_kind(a)?;
        let kb = self.types.basic_kind(b)?;
        let ra = ka.untyped_rank()?;
        let rb = kb.untyped_rank()?;
        Some(if ra >= rb { a } else { b })
    }

    // -------------------------------------------------------------------------
    // Calls
    // -------------------------------------------------------------------------

    /// `f(args...)`; the callee sits below the `n` arguments.
    pub fn call(&mut self, n: usize) -> &mut Self {
        self.call_with(n, false, None)
    }

    pub fn call_with(&mut self, mut n: usize, ellipsis: bool, src: Option<Span>) -> &mut Self {
        // A pseudo-method receiver marker shifts the callee by one.
        let recv_marked = {
            let fn_pos = -(n as isize + 1);
            matches!(
                self.stk.get(fn_pos).typ.map(|t| self.types.kind(t).clone()),
                Some(TypeKind::BtiSelf { .. })
            )
        };
        if recv_marked {
            let fn_pos = -(n as isize + 1);
            let orig = match self.types.kind(self.stk.get(fn_pos).typ.unwrap()) {
                TypeKind::BtiSelf { ty } => *ty,
                _ => unreachable!(),
            };
            self.stk.get_mut(fn_pos).typ = Some(orig);
            n += 1;
        }
        if crate::debug_instr() {
            log::debug!(target: "gobuild::instr", "Call {n} {ellipsis}");
        }
        let flags = InstrFlags {
            ellipsis,
            two_value: false,
        };
        let mut fn_elem = self.stk.get(-(n as isize + 1)).clone();
        fn_elem.src = src.or(fn_elem.src);
        let args: Vec<Element> = self.stk.get_args(n).to_vec();
        match self.to_func_call(fn_elem, args, flags) {
            Ok(mut ret) => {
                ret.src = src.or(ret.src);
                self.stk.ret(n + 1, ret);
            }
            Err(err) => std::panic::panic_any(err),
        }
        self
    }

    /// Elaborates a call of `fn_elem` over detached `args`.
    pub(crate) fn to_func_call(
        &mut self,
        fn_elem: Element,
        args: Vec<Element>,
        flags: InstrFlags,
    ) -> Result<Element, CodeError> {
        let fn_ty = match fn_elem.typ {
            Some(t) => self.types.deref_ref(t),
            None => {
                return Err(self.error_at(fn_elem.src, "call of untyped operand".to_string()));
            }
        };
        match self.types.kind(fn_ty).clone() {
            TypeKind::TypeOf { ty } => self.conversion(ty, fn_elem, args),
            TypeKind::Instr(instr) => self.instr_call(instr, fn_elem, args, flags),
            TypeKind::Signature { .. } => self.sig_call(fn_ty, fn_elem, args, flags),
            TypeKind::Named { .. } => {
                let u = self.underlying(fn_ty);
                if matches!(self.types.kind(u), TypeKind::Signature { .. }) {
                    self.sig_call(u, fn_elem, args, flags)
                } else {
                    let t = self.ty_str(fn_ty);
                    Err(self.error_at(
                        fn_elem.src,
                        format!("cannot call non-function (type {t})"),
                    ))
                }
            }
            _ => {
                let t = self.ty_str(fn_ty);
                Err(self.error_at(fn_elem.src, format!("cannot call non-function (type {t})")))
            }
        }
    }

    /// Checks `args` against `sig` without building a call node.
    pub(crate) fn match_func_type(
        &mut self,
        sig: Ty,
        args: &[Element],
        flags: InstrFlags,
        caller: Option<Span>,
    ) -> Result<Vec<Element>, CodeError> {
        let (params, variadic) = match self.types.kind(sig).clone() {
            TypeKind::Signature {
                params, variadic, ..
            } => (params, variadic),
            _ => panic!("match_func_type: not a signature"),
        };
        let want: Vec<Ty> = params.iter().map(|&o| self.scopes.obj(o).ty).collect();
        let n1 = want.len();
        let desc = self.caller_desc(caller);
        let desc = if desc.is_empty() {
            "function".to_string()
        } else {
            desc
        };
        if variadic && !flags.ellipsis {
            if args.len() + 1 < n1 {
                return Err(
                    self.error_at(caller, format!("not enough arguments in call to {desc}"))
                );
            }
        } else if args.len() < n1 {
            return Err(self.error_at(caller, format!("not enough arguments in call to {desc}")));
        } else if args.len() > n1 {
            return Err(self.error_at(caller, format!("too many arguments in call to {desc}")));
        }
        let mut out = Vec::with_capacity(args.len());
        for (i, arg) in args.iter().enumerate() {
            let target = if variadic && !flags.ellipsis && i + 1 >= n1 {
                match self.types.kind(want[n1 - 1]).clone() {
                    TypeKind::Slice { elem } => elem,
                    _ => want[n1 - 1],
                }
            } else if variadic && flags.ellipsis && i + 1 == n1 {
                want[i]
            } else {
                want[i]
            };
            let converted = self.conv_elem(arg.clone(), target);
            if !self.assignable_to_elem(&converted, target) {
                let (code, pos) = self.load_expr(arg.src);
                let at = arg.typ.map(|t| self.ty_str(t)).unwrap_or_default();
                let ts = self.ty_str(target);
                return Err(self.code_error(
                    Some(pos),
                    format!("cannot use {code} (type {at}) as type {ts} in argument to {desc}"),
                ));
            }
            out.push(converted);
        }
        Ok(out)
    }

    fn sig_call(
        &mut self,
        sig: Ty,
        fn_elem: Element,
        mut args: Vec<Element>,
        flags: InstrFlags,
    ) -> Result<Element, CodeError> {
        // A method value's receiver is already folded into the selector.
        if let TypeKind::Signature { recv: Some(_), .. } = self.types.kind(sig) {
            if !args.is_empty() {
                args.remove(0);
            }
        }
        let args = self.match_func_type(sig, &args, flags, fn_elem.src)?;
        let arg_ids: Vec<ExprId> = args
            .iter()
            .map(|a| a.expr_id().expect("call argument is not an expression"))
            .collect();
        let fun = match fn_elem.val {
            Some(AstVal::Expr(id)) => Callee::Expr(id),
            Some(AstVal::Type(id)) => Callee::Type(id),
            None => return Err(self.error_at(fn_elem.src, "call of empty operand".to_string())),
        };
        let arg_list = self.ast.list_exprs(arg_ids);
        let id = self.alloc_expr(Expr::Call {
            fun,
            type_arg: None,
            args: arg_list,
            ellipsis: flags.ellipsis,
        });
        let ty = self.types.results_type(sig, &self.scopes);
        Ok(Element {
            val: Some(AstVal::Expr(id)),
            typ: Some(ty),
            cval: None,
            src: fn_elem.src,
        })
    }

    fn conversion(
        &mut self,
        target: Ty,
        fn_elem: Element,
        args: Vec<Element>,
    ) -> Result<Element, CodeError> {
        if args.len() != 1 {
            return Err(self.error_at(
                fn_elem.src,
                format!(
                    "conversion to {} needs exactly one argument",
                    self.ty_str(target)
                ),
            ));
        }
        let arg = &args[0];
        let cval = match (&arg.cval, self.underlying(target)) {
            (Some(c), u) => match self.types.kind(u) {
                TypeKind::Basic(k) if c.representable(*k) => Some(c.clone()),
                _ => None,
            },
            _ => None,
        };
        let te = match fn_elem.val {
            Some(AstVal::Type(id)) => id,
            _ => self.to_type(target),
        };
        let x = arg
            .expr_id()
            .ok_or_else(|| self.error_at(arg.src, "conversion of non-expression".to_string()))?;
        let arg_list = self.ast.list_exprs([x]);
        let id = self.alloc_expr(Expr::Call {
            fun: Callee::Type(te),
            type_arg: None,
            args: arg_list,
            ellipsis: false,
        });
        Ok(Element {
            val: Some(AstVal::Expr(id)),
            typ: Some(target),
            cval,
            src: fn_elem.src,
        })
    }

    // -------------------------------------------------------------------------
    // Builtin instructions
    // -------------------------------------------------------------------------

    fn instr_call(
        &mut self,
        instr: Instr,
        fn_elem: Element,
        args: Vec<Element>,
        flags: InstrFlags,
    ) -> Result<Element, CodeError> {
        match instr {
            Instr::Binary(op) => {
                if args.len() != 2 {
                    panic!("binary operator expects 2 operands");
                }
                self.resolve_binary_instr(op, &args[0], &args[1], fn_elem.src)
            }
            Instr::Unary(op) => {
                if args.len() != 1 {
                    panic!("unary operator expects 1 operand");
                }
                self.resolve_unary_instr(op, &args[0], flags, fn_elem.src)
            }
            Instr::New => {
                let ty = self.type_value_of(&args, 0)?;
                let te = self.to_type(ty);
                let new_sym = self.interner.intern("new");
                let fun = self.ast.ident(new_sym);
                let id = self.alloc_expr(Expr::Call {
                    fun: Callee::Expr(fun),
                    type_arg: Some(te),
                    args: crate::ast::ListRef::EMPTY,
                    ellipsis: false,
                });
                let pt = self.types.pointer_to(ty);
                Ok(Element {
                    val: Some(AstVal::Expr(id)),
                    typ: Some(pt),
                    cval: None,
                    src: fn_elem.src,
                })
            }
            Instr::Make => {
                let ty = self.type_value_of(&args, 0)?;
                let u = self.underlying(ty);
                if !matches!(
                    self.types.kind(u),
                    TypeKind::Slice { .. } | TypeKind::Map { .. } | TypeKind::Chan { .. }
                ) {
                    let t = self.ty_str(ty);
                    return Err(self.error_at(fn_elem.src, format!("cannot make type {t}")));
                }
                let te = self.to_type(ty);
                let int = self.types.basic(BasicKind::Int);
                let mut ids = Vec::new();
                for a in &args[1..] {
                    if !self.assignable_to_elem(a, int) {
                        let (code, pos) = self.load_expr(a.src);
                        return Err(self.code_error(
                            Some(pos),
                            format!("non-integer size argument {code} in make"),
                        ));
                    }
                    ids.push(a.expr_id().expect("make size is not an expression"));
                }
                let make_sym = self.interner.intern("make");
                let fun = self.ast.ident(make_sym);
                let arg_list = self.ast.list_exprs(ids);
                let id = self.alloc_expr(Expr::Call {
                    fun: Callee::Expr(fun),
                    type_arg: Some(te),
                    args: arg_list,
                    ellipsis: false,
                });
                Ok(Element {
                    val: Some(AstVal::Expr(id)),
                    typ: Some(ty),
                    cval: None,
                    src: fn_elem.src,
                })
            }
            Instr::Len | Instr::Cap => {
                if args.len() != 1 {
                    panic!("len/cap expects 1 operand");
                }
                let arg = &args[0];
                let at = arg.typ.expect("len/cap of untyped operand");
                let u = self.underlying(at);
                let ok = match self.types.kind(u) {
                    TypeKind::Basic(k) if k.is_string() => instr == Instr::Len,
                    TypeKind::Slice { .. } | TypeKind::Array { .. } | TypeKind::Chan { .. } => true,
                    TypeKind::Map { .. } => instr == Instr::Len,
                    _ => false,
                };
                if !ok {
                    let (code, pos) = self.load_expr(arg.src);
                    let name = if instr == Instr::Len { "len" } else { "cap" };
                    let t = self.ty_str(at);
                    return Err(self.code_error(
                        Some(pos),
                        format!("invalid argument {code} (type {t}) for {name}"),
                    ));
                }
                let cval = match (instr, &arg.cval, self.types.kind(u).clone()) {
                    (Instr::Len, Some(Const::Str(s)), _) => Some(Const::Int(s.len() as i64)),
                    (_, _, TypeKind::Array { len, .. }) if len >= 0 => Some(Const::Int(len)),
                    _ => None,
                };
                let name = self
                    .interner
                    .intern(if instr == Instr::Len { "len" } else { "cap" });
                let fun = self.ast.ident(name);
                let x = arg.expr_id().expect("len/cap of non-expression");
                let arg_list = self.ast.list_exprs([x]);
                let id = self.alloc_expr(Expr::Call {
                    fun: Callee::Expr(fun),
                    type_arg: None,
                    args: arg_list,
                    ellipsis: false,
                });
                let int = self.types.basic(BasicKind::Int);
                Ok(Element {
                    val: Some(AstVal::Expr(id)),
                    typ: Some(int),
                    cval,
                    src: fn_elem.src,
                })
            }
            Instr::Append => {
                if args.is_empty() {
                    return Err(
                        self.error_at(fn_elem.src, "missing arguments to append".to_string())
                    );
                }
                let st = args[0].typ.expect("append of untyped operand");
                let u = self.underlying(st);
                let elem = match self.types.kind(u) {
                    TypeKind::Slice { elem } => *elem,
                    _ => {
                        let (code, pos) = self.load_expr(args[0].src);
                        let t = self.ty_str(st);
                        return Err(self.code_error(
                            Some(pos),
                            format!("first argument to append must be slice; have {code} (type {t})"),
                        ));
                    }
                };
                if !flags.ellipsis {
                    for a in &args[1..] {
                        if !self.assignable_to_elem(a, elem) {
                            let (code, pos) = self.load_expr(a.src);
                            let at = a.typ.map(|t| self.ty_str(t)).unwrap_or_default();
                            let es = self.ty_str(elem);
                            return Err(self.code_error(
                                Some(pos),
                                format!("cannot use {code} (type {at}) as type {es} in append"),
                            ));
                        }
                    }
                }
                self.plain_builtin_call("append", args, st, flags, fn_elem.src)
            }
            Instr::Copy => {
                if args.len() != 2 {
                    panic!("copy expects 2 operands");
                }
                let int = self.types.basic(BasicKind::Int);
                self.plain_builtin_call("copy", args, int, flags, fn_elem.src)
            }
            Instr::Delete => {
                if args.len() != 2 {
                    panic!("delete expects 2 operands");
                }
                let mt = args[0].typ.expect("delete of untyped operand");
                let u = self.underlying(mt);
                let key = match self.types.kind(u) {
                    TypeKind::Map { key, .. } => *key,
                    _ => {
                        let t = self.ty_str(mt);
                        return Err(self.error_at(
                            args[0].src,
                            format!("first argument to delete must be map; have type {t}"),
                        ));
                    }
                };
                if !self.assignable_to_elem(&args[1], key) {
                    let (code, pos) = self.load_expr(args[1].src);
                    let at = args[1].typ.map(|t| self.ty_str(t)).unwrap_or_default();
                    let ks = self.ty_str(key);
                    return Err(self.code_error(
                        Some(pos),
                        format!("cannot use {code} (type {at}) as type {ks} in delete"),
                    ));
                }
                let void = self.types.tuple(vec![]);
                self.plain_builtin_call("delete", args, void, flags, fn_elem.src)
            }
            Instr::Panic => {
                if args.len() != 1 {
                    panic!("panic expects 1 operand");
                }
                let void = self.types.tuple(vec![]);
                self.plain_builtin_call("panic", args, void, flags, fn_elem.src)
            }
            Instr::IncDec(_) | Instr::OpAssign(_) => {
                panic!("operator instruction is not callable as a function")
            }
        }
    }

    fn plain_builtin_call(
        &mut self,
        name: &str,
        args: Vec<Element>,
        result: Ty,
        flags: InstrFlags,
        src: Option<Span>,
    ) -> Result<Element, CodeError> {
        let sym = self.interner.intern(name);
        let fun = self.ast.ident(sym);
        let ids: Vec<ExprId> = args
            .iter()
            .map(|a| a.expr_id().expect("builtin argument is not an expression"))
            .collect();
        let arg_list = self.ast.list_exprs(ids);
        let id = self.alloc_expr(Expr::Call {
            fun: Callee::Expr(fun),
            type_arg: None,
            args: arg_list,
            ellipsis: flags.ellipsis,
        });
        Ok(Element {
            val: Some(AstVal::Expr(id)),
            typ: Some(result),
            cval: None,
            src,
        })
    }

    fn type_value_of(&mut self, args: &[Element], i: usize) -> Result<Ty, CodeError> {
        match args.get(i).and_then(|a| a.typ) {
            Some(t) => match self.types.kind(t) {
                TypeKind::TypeOf { ty } => Ok(*ty),
                _ => Err(self.error_at(
                    args[i].src,
                    "argument must be a type".to_string(),
                )),
            },
            None => Err(self.error_at(None, "argument must be a type".to_string())),
        }
    }

    // -------------------------------------------------------------------------
    // Operators
    // -------------------------------------------------------------------------

    /// Binary operator over the top two operands.
    pub fn binary_op(&mut self, op: BinaryOp) -> &mut Self {
        self.binary_op_src(op, None)
    }

    pub fn binary_op_src(&mut self, op: BinaryOp, src: Option<Span>) -> &mut Self {
        if crate::debug_instr() {
            log::debug!(target: "gobuild::instr", "BinaryOp {op:?}");
        }
        let args: Vec<Element> = self.stk.get_args(2).to_vec();
        match self.call_op_binary(op, &args[0], &args[1], src) {
            Ok(mut ret) => {
                ret.src = src;
                self.stk.ret(2, ret);
            }
            Err(_) => {
                let (code, pos) = self.load_expr(src);
                let ta = args[0].typ.map(|t| self.ty_str(t)).unwrap_or_default();
                let tb = args[1].typ.map(|t| self.ty_str(t)).unwrap_or_default();
                std::panic::panic_any(self.code_error(
                    Some(pos),
                    format!("invalid operation: {code} (mismatched types {ta} and {tb})"),
                ));
            }
        }
        self
    }

    /// `x op nil` (or `nil op x`).
    pub fn compare_nil(&mut self, op: BinaryOp) -> &mut Self {
        self.val(crate::builder::Nil).binary_op(op)
    }

    /// Unary operator over the top operand. `two_value` enables the
    /// `v, ok := <-ch` form of receive.
    pub fn unary_op(&mut self, op: UnaryOp, two_value: bool) -> &mut Self {
        self.unary_op_src(op, two_value, None)
    }

    pub fn unary_op_src(&mut self, op: UnaryOp, two_value: bool, src: Option<Span>) -> &mut Self {
        if crate::debug_instr() {
            log::debug!(target: "gobuild::instr", "UnaryOp {op:?} {two_value}");
        }
        let flags = InstrFlags {
            ellipsis: false,
            two_value,
        };
        let arg = self.stk.get(-1).clone();
        match self.call_op_unary(op, &arg, flags, src) {
            Ok(mut ret) => {
                ret.src = src;
                self.stk.ret(1, ret);
            }
            Err(err) => std::panic::panic_any(err),
        }
        self
    }

    fn named_op_target(&mut self, ty: Ty) -> Option<Ty> {
        let mut cur = self.types.deref_ref(ty);
        loop {
            match self.types.kind(cur) {
                TypeKind::Named { .. } => return Some(cur),
                TypeKind::Pointer { elem } => cur = *elem,
                _ => return None,
            }
        }
    }

    fn op_method_name(&mut self, suffix: &str) -> crate::ast::Symbol {
        let prefix = self.pkg.prefix.clone();
        self.interner.intern(&format!("{prefix}{suffix}"))
    }

    fn call_op_binary(
        &mut self,
        op: BinaryOp,
        a: &Element,
        b: &Element,
        src: Option<Span>,
    ) -> Result<Element, CodeError> {
        let name = self.op_method_name(op.method_suffix());

        // 1. Method on the primary operand's named type.
        if let Some(named) = a.typ.and_then(|t| self.named_op_target(t)) {
            self.ensure_loaded(named);
            if let Some(m) = self.types.lookup_method(named, name) {
                return self.op_method_call(m.sig, name, a.clone(), vec![b.clone()], op, src);
            }
        }
        // 2. Constant primary against a named secondary: promote and use
        //    the secondary's method.
        if let Some(named) = b.typ.and_then(|t| self.named_op_target(t)) {
            self.ensure_loaded(named);
            if a.cval.is_some() && self.types.is_untyped(a.typ.unwrap()) {
                if let Some(m) = self.types.lookup_method(named, name) {
                    let conv = self.conv_elem(a.clone(), named);
                    if conv.typ == Some(named) {
                        return self.op_method_call(m.sig, name, conv, vec![b.clone()], op, src);
                    }
                }
            }
        }
        // 3. Builtin instruction.
        let builtin_obj = self.scopes.lookup(self.pkg.builtin, name);
        if builtin_obj.is_some() {
            if let Ok(ret) = self.resolve_binary_instr(op, a, b, src) {
                return Ok(ret);
            }
        }
        // 4. Structural comparability fallback for == and !=.
        if (op == BinaryOp::Eq || op == BinaryOp::Ne) && self.comparable(a, b) {
            let x = a.expr_id().expect("comparison of non-expression");
            let y = b.expr_id().expect("comparison of non-expression");
            let id = self.alloc_expr(Expr::Binary { x, op, y });
            let cval = match (&a.cval, &b.cval) {
                (Some(ca), Some(cb)) => constant::binary_op(op, ca, cb),
                _ => None,
            };
            let ub = self.types.basic(BasicKind::UntypedBool);
            return Ok(Element {
                val: Some(AstVal::Expr(id)),
                typ: Some(ub),
                cval,
                src,
            });
        }
        Err(self.error_at(src, "mismatched types".to_string()))
    }

    fn op_method_call(
        &mut self,
        sig: Ty,
        name: crate::ast::Symbol,
        recv: Element,
        args: Vec<Element>,
        op: BinaryOp,
        src: Option<Span>,
    ) -> Result<Element, CodeError> {
        let x = recv.expr_id().expect("operator receiver is not an expression");
        let sel = self.alloc_expr(Expr::Selector { x, sel: name });
        let fn_elem = Element {
            val: Some(AstVal::Expr(sel)),
            typ: Some(sig),
            cval: None,
            src,
        };
        let mut full = vec![recv.clone()];
        full.extend(args.iter().cloned());
        let mut ret = self.sig_call(sig, fn_elem, full, InstrFlags::default())?;
        // Constants propagate through the method path as well.
        if let (Some(ca), Some(cb)) = (&recv.cval, args.first().and_then(|a| a.cval.as_ref())) {
            ret.cval = constant::binary_op(op, ca, cb);
        }
        Ok(ret)
    }

    fn call_op_unary(
        &mut self,
        op: UnaryOp,
        a: &Element,
        flags: InstrFlags,
        src: Option<Span>,
    ) -> Result<Element, CodeError> {
        let name = self.op_method_name(op.method_suffix());
        if let Some(named) = a.typ.and_then(|t| self.named_op_target(t)) {
            self.ensure_loaded(named);
            if let Some(m) = self.types.lookup_method(named, name) {
                let x = a.expr_id().expect("operator receiver is not an expression");
                let sel = self.alloc_expr(Expr::Selector { x, sel: name });
                let fn_elem = Element {
                    val: Some(AstVal::Expr(sel)),
                    typ: Some(m.sig),
                    cval: None,
                    src,
                };
                let mut ret =
                    self.sig_call(m.sig, fn_elem, vec![a.clone()], InstrFlags::default())?;
                if let Some(c) = &a.cval {
                    ret.cval = constant::unary_op(op, c);
                }
                return Ok(ret);
            }
        }
        self.resolve_unary_instr(op, a, flags, src)
    }

    fn resolve_binary_instr(
        &mut self,
        op: BinaryOp,
        a: &Element,
        b: &Element,
        src: Option<Span>,
    ) -> Result<Element, CodeError> {
        use BinaryOp::*;
        let (ta, tb) = match (a.typ, b.typ) {
            (Some(x), Some(y)) => (x, y),
            _ => return Err(self.error_at(src, "operator over empty operand".to_string())),
        };
        let ua = self.underlying(ta);
        let ub = self.underlying(tb);
        let ka = self.types.basic_kind(ua);
        let kb = self.types.basic_kind(ub);

        let result_ty: Ty = match op {
            Lsh | Rsh => {
                let kb_ok = kb.map(|k| k.is_integer()).unwrap_or(false);
                if !ka.map(|k| k.is_integer()).unwrap_or(false) || !kb_ok {
                    return Err(self.error_at(src, "invalid shift".to_string()));
                }
                ta
            }
            LAnd | LOr => {
                if !ka.map(|k| k.is_bool()).unwrap_or(false)
                    || !kb.map(|k| k.is_bool()).unwrap_or(false)
                {
                    return Err(self.error_at(src, "operator requires bool operands".to_string()));
                }
                if !self.types.is_untyped(ta) {
                    ta
                } else if !self.types.is_untyped(tb) {
                    tb
                } else {
                    self.types.basic(BasicKind::UntypedBool)
                }
            }
            Lt | Le | Gt | Ge => {
                let ordered = |k: Option<BasicKind>| {
                    k.map(|k| k.is_integer() || k.is_float() || k.is_string())
                        .unwrap_or(false)
                };
                if !ordered(ka) || !ordered(kb) || !self.comparable(a, b) {
                    return Err(self.error_at(src, "mismatched types".to_string()));
                }
                self.types.basic(BasicKind::UntypedBool)
            }
            Eq | Ne => {
                if !self.comparable(a, b) {
                    return Err(self.error_at(src, "mismatched types".to_string()));
                }
                self.types.basic(BasicKind::UntypedBool)
            }
            _ => {
                // Arithmetic and bitwise operators.
                let (ka, kb) = match (ka, kb) {
                    (Some(x), Some(y)) => (x, y),
                    _ => return Err(self.error_at(src, "mismatched types".to_string())),
                };
                let arith_ok = |k: BasicKind| match op {
                    Add => k.is_numeric() || k.is_string(),
                    Sub | Mul | Quo => k.is_numeric(),
                    Rem | And | Or | Xor | AndNot => k.is_integer(),
                    _ => false,
                };
                if !arith_ok(ka) || !arith_ok(kb) {
                    return Err(self.error_at(src, "mismatched types".to_string()));
                }
                let a_untyped = self.types.is_untyped(ta);
                let b_untyped = self.types.is_untyped(tb);
                match (a_untyped, b_untyped) {
                    (true, true) => {
                        if ka.is_string() && kb.is_string() {
                            self.types.basic(BasicKind::UntypedString)
                        } else {
                            match self.untyped_join(ta, tb) {
                                Some(t) => t,
                                None => {
                                    return Err(
                                        self.error_at(src, "mismatched types".to_string())
                                    )
                                }
                            }
                        }
                    }
                    (true, false) => {
                        if !self.assignable_to_elem(a, tb) {
                            return Err(self.error_at(src, "mismatched types".to_string()));
                        }
                        tb
                    }
                    (false, true) => {
                        if !self.assignable_to_elem(b, ta) {
                            return Err(self.error_at(src, "mismatched types".to_string()));
                        }
                        ta
                    }
                    (false, false) => {
                        if ta != tb && !self.similar(ta, tb) {
                            return Err(self.error_at(src, "mismatched types".to_string()));
                        }
                        ta
                    }
                }
            }
        };

        let cval = match (&a.cval, &b.cval) {
            (Some(ca), Some(cb)) => constant::binary_op(op, ca, cb),
            _ => None,
        };
        // Two untyped constants fold to a single literal in the tree.
        let both_untyped = self.types.is_untyped(ta) && self.types.is_untyped(tb);
        let id = match (&cval, both_untyped && !op.is_comparison()) {
            (Some(c), true) => match self.const_lit_expr(&c.clone()) {
                Some(lit) => lit,
                None => {
                    let x = a.expr_id().expect("operand is not an expression");
                    let y = b.expr_id().expect("operand is not an expression");
                    self.alloc_expr(Expr::Binary { x, op, y })
                }
            },
            _ => {
                let x = a.expr_id().expect("operand is not an expression");
                let y = b.expr_id().expect("operand is not an expression");
                self.alloc_expr(Expr::Binary { x, op, y })
            }
        };
        Ok(Element {
            val: Some(AstVal::Expr(id)),
            typ: Some(result_ty),
            cval,
            src,
        })
    }

    fn resolve_unary_instr(
        &mut self,
        op: UnaryOp,
        a: &Element,
        flags: InstrFlags,
        src: Option<Span>,
    ) -> Result<Element, CodeError> {
        let ta = match a.typ {
            Some(t) => t,
            None => return Err(self.error_at(src, "operator over empty operand".to_string())),
        };
        match op {
            UnaryOp::Addr => {
                // The operand must denote a storage location (or be a
                // composite literal, which is addressable in Go).
                let inner = match self.types.kind(ta) {
                    TypeKind::Ref { elem } => *elem,
                    _ => {
                        let is_lit = matches!(
                            a.expr_id().map(|id| self.ast.exprs[id]),
                            Some(Expr::CompositeLit { .. })
                        );
                        if !is_lit {
                            let (code, pos) = self.load_expr(a.src);
                            return Err(self.code_error(
                                Some(pos),
                                format!("cannot take the address of {code}"),
                            ));
                        }
                        ta
                    }
                };
                let x = a.expr_id().expect("operand is not an expression");
                let id = self.alloc_expr(Expr::Unary {
                    op: UnaryOp::Addr,
                    x,
                });
                let pt = self.types.pointer_to(inner);
                Ok(Element {
                    val: Some(AstVal::Expr(id)),
                    typ: Some(pt),
                    cval: None,
                    src,
                })
            }
            UnaryOp::Recv => {
                let u = self.underlying(ta);
                let elem = match self.types.kind(u) {
                    TypeKind::Chan { dir, elem } if *dir != ChanDir::Send => *elem,
                    _ => {
                        let (code, pos) = self.load_expr(a.src);
                        let t = self.ty_str(ta);
                        return Err(self.code_error(
                            Some(pos),
                            format!("invalid operation: {code} (receive from non-channel type {t})"),
                        ));
                    }
                };
                let x = a.expr_id().expect("operand is not an expression");
                let id = self.alloc_expr(Expr::Unary {
                    op: UnaryOp::Recv,
                    x,
                });
                let ty = if flags.two_value {
                    let b = self.types.basic(BasicKind::Bool);
                    self.types.tuple(vec![elem, b])
                } else {
                    elem
                };
                Ok(Element {
                    val: Some(AstVal::Expr(id)),
                    typ: Some(ty),
                    cval: None,
                    src,
                })
            }
            _ => {
                let u = self.underlying(ta);
                let k = self.types.basic_kind(u);
                let ok = match op {
                    UnaryOp::Pos | UnaryOp::Neg => k.map(|k| k.is_numeric()).unwrap_or(false),
                    UnaryOp::Not => k.map(|k| k.is_integer()).unwrap_or(false),
                    UnaryOp::LNot => k.map(|k| k.is_bool()).unwrap_or(false),
                    _ => unreachable!(),
                };
                if !ok {
                    let (code, pos) = self.load_expr(a.src);
                    let t = self.ty_str(ta);
                    return Err(self.code_error(
                        Some(pos),
                        format!(
                            "invalid operation: operator {} not defined on {code} (type {t})",
                            op.token()
                        ),
                    ));
                }
                let x = a.expr_id().expect("operand is not an expression");
                let id = self.alloc_expr(Expr::Unary { op, x });
                let cval = a.cval.as_ref().and_then(|c| constant::unary_op(op, c));
                Ok(Element {
                    val: Some(AstVal::Expr(id)),
                    typ: Some(ta),
                    cval,
                    src,
                })
            }
        }
    }

    // -------------------------------------------------------------------------
    // Assignment
    // -------------------------------------------------------------------------

    /// `x++` / `x--` over an assignable reference.
    pub fn inc_dec(&mut self, op: IncDecOp) -> &mut Self {
        if crate::debug_instr() {
            log::debug!(target: "gobuild::instr", "IncDec {op:?}");
        }
        let arg = self.stk.get(-1).clone();
        let ty = arg.typ.expect("inc/dec of untyped operand");
        let elem = match self.types.kind(ty) {
            TypeKind::Ref { elem } => *elem,
            _ => panic!("inc/dec operand is not assignable"),
        };
        let u = self.underlying(elem);
        if !self
            .types
            .basic_kind(u)
            .map(|k| k.is_numeric())
            .unwrap_or(false)
        {
            let (code, pos) = self.load_expr(arg.src);
            let t = self.ty_str(elem);
            let err = self.code_error(
                Some(pos),
                format!("invalid operation: {code} (type {t}) does not support ++/--"),
            );
            self.report_err(err);
        }
        let x = arg.expr_id().expect("inc/dec of non-expression");
        let id = self.ast.stmts.alloc(Stmt::IncDec { x, op }, Span::default());
        self.stk.pop();
        self.emit_stmt_id(id);
        self
    }

    /// `x op= y`; resolves to an operator method on a named type when one
    /// exists, and to the plain op-assign statement otherwise.
    pub fn assign_op(&mut self, op: AssignOp) -> &mut Self {
        if crate::debug_instr() {
            log::debug!(target: "gobuild::instr", "AssignOp {op:?}");
        }
        let args: Vec<Element> = self.stk.get_args(2).to_vec();
        let name = self.op_method_name(op.method_suffix());
        let lhs_ty = args[0].typ.expect("assign-op to untyped operand");
        let lhs_elem_ty = match self.types.kind(lhs_ty) {
            TypeKind::Ref { elem } => *elem,
            _ => panic!("assign-op target is not assignable"),
        };
        if let Some(named) = self.named_op_target(lhs_elem_ty) {
            self.ensure_loaded(named);
            if let Some(m) = self.types.lookup_method(named, name) {
                let x = args[0].expr_id().expect("assign-op target is not an expression");
                let sel = self.alloc_expr(Expr::Selector { x, sel: name });
                let fn_elem = Element {
                    val: Some(AstVal::Expr(sel)),
                    typ: Some(m.sig),
                    cval: None,
                    src: args[0].src,
                };
                match self.sig_call(m.sig, fn_elem, args.clone(), InstrFlags::default()) {
                    Ok(ret) => {
                        match ret.typ.map(|t| self.types.kind(t).clone()) {
                            Some(TypeKind::Tuple { items }) if items.is_empty() => {}
                            _ => panic!("operator method {} should return no results",
                                self.interner.resolve(name)),
                        }
                        let id = self
                            .ast
                            .stmts
                            .alloc(Stmt::Expr(ret.expr_id().unwrap()), Span::default());
                        self.stk.pop_n(2);
                        self.emit_stmt_id(id);
                        return self;
                    }
                    Err(err) => std::panic::panic_any(err),
                }
            }
        }
        // Builtin path: type-check as the corresponding binary op.
        let bop = op.binary_op();
        let lhs_val = Element {
            typ: Some(lhs_elem_ty),
            ..args[0].clone()
        };
        if self.resolve_binary_instr(bop, &lhs_val, &args[1], args[1].src).is_err() {
            let (code, pos) = self.load_expr(args[1].src);
            let ta = self.ty_str(lhs_elem_ty);
            let tb = args[1].typ.map(|t| self.ty_str(t)).unwrap_or_default();
            std::panic::panic_any(self.code_error(
                Some(pos),
                format!("invalid operation: {code} (mismatched types {ta} and {tb})"),
            ));
        }
        let lhs = args[0].expr_id().expect("assign-op target is not an expression");
        let rhs = args[1].expr_id().expect("assign-op value is not an expression");
        let lhs_list = self.ast.list_exprs([lhs]);
        let rhs_list = self.ast.list_exprs([rhs]);
        let id = self.ast.stmts.alloc(
            Stmt::Assign {
                lhs: lhs_list,
                op: AssignTok::Op(op),
                rhs: rhs_list,
            },
            Span::default(),
        );
        self.stk.pop_n(2);
        self.emit_stmt_id(id);
        self
    }

    /// `lhs... = rhs...`; `rhs` defaults to `lhs`.
    pub fn assign(&mut self, lhs: usize, rhs: Option<usize>) -> &mut Self {
        let v = rhs.unwrap_or(lhs);
        if crate::debug_instr() {
            log::debug!(target: "gobuild::instr", "Assign {lhs} {v}");
        }
        self.do_assign_with(lhs, v, None)
    }

    pub fn assign_with(&mut self, lhs: usize, rhs: usize, src: Option<Span>) -> &mut Self {
        if crate::debug_instr() {
            log::debug!(target: "gobuild::instr", "Assign {lhs} {rhs}");
        }
        self.do_assign_with(lhs, rhs, src)
    }

    pub(crate) fn do_assign_with(&mut self, lhs: usize, rhs: usize, src: Option<Span>) -> &mut Self {
        let args: Vec<Element> = self.stk.get_args(lhs + rhs).to_vec();
        let mut lhs_ids = Vec::with_capacity(lhs);
        let mut rhs_ids = Vec::with_capacity(rhs);

        let tuple_items = if rhs == 1 {
            args[lhs].typ.and_then(|t| match self.types.kind(t) {
                TypeKind::Tuple { items } => Some(items.clone()),
                _ => None,
            })
        } else {
            None
        };

        if let Some(items) = tuple_items {
            if lhs != items.len() {
                let pos = self.load_expr(src).1;
                let caller = self.caller_desc(args[lhs].src);
                std::panic::panic_any(self.code_error(
                    Some(pos),
                    format!(
                        "assignment mismatch: {lhs} variables but {caller} returns {} values",
                        items.len()
                    ),
                ));
            }
            for i in 0..lhs {
                let val = Element {
                    val: None,
                    typ: Some(items[i]),
                    cval: None,
                    src: None,
                };
                self.check_assign_type(&args[i], &val);
                lhs_ids.push(args[i].expr_id().expect("assign target is not an expression"));
            }
            rhs_ids.push(args[lhs].expr_id().expect("assign value is not an expression"));
        } else if lhs == rhs {
            for i in 0..lhs {
                self.check_assign_type(&args[i], &args[lhs + i]);
                lhs_ids.push(args[i].expr_id().expect("assign target is not an expression"));
                rhs_ids.push(
                    args[lhs + i]
                        .expr_id()
                        .expect("assign value is not an expression"),
                );
            }
        } else {
            let pos = self.load_expr(src).1;
            std::panic::panic_any(self.code_error(
                Some(pos),
                format!("assignment mismatch: {lhs} variables but {rhs} values"),
            ));
        }

        let lhs_list = self.ast.list_exprs(lhs_ids);
        let rhs_list = self.ast.list_exprs(rhs_ids);
        let id = self.ast.stmts.alloc(
            Stmt::Assign {
                lhs: lhs_list,
                op: AssignTok::Assign,
                rhs: rhs_list,
            },
            Span::default(),
        );
        self.stk.pop_n(lhs + rhs);
        self.emit_stmt_id(id);
        self
    }

    /// Validates one assignment target against one value, binding unbound
    /// placeholder types on first use.
    pub(crate) fn check_assign_type(&mut self, target: &Element, val: &Element) {
        let lhs_ty = match target.typ {
            Some(t) => t,
            None => return, // underscore
        };
        match self.types.kind(lhs_ty).clone() {
            TypeKind::Ref { elem } => match self.types.kind(elem).clone() {
                TypeKind::Unbound { bound, .. } => match bound {
                    Some(b) => self.check_value_assign(b, val),
                    None => {
                        let vt = val.typ.expect("cannot infer type from empty value");
                        let t = self.default_ty(vt);
                        self.bind_unbound(elem, t);
                    }
                },
                TypeKind::UnboundMapElem { key, map } => {
                    let vt = val.typ.expect("cannot infer type from empty value");
                    let dk = self.default_ty(key);
                    let dv = self.default_ty(vt);
                    let mt = self.types.map_of(dk, dv);
                    self.bind_unbound(map, mt);
                }
                _ => self.check_value_assign(elem, val),
            },
            _ => {
                let (code, pos) = self.load_expr(target.src);
                let err = self.code_error(Some(pos), format!("cannot assign to {code}"));
                self.report_err(err);
            }
        }
    }

    fn check_value_assign(&mut self, to: Ty, val: &Element) {
        if let Some(vt) = val.typ {
            if !self.assignable_to(vt, to, val.cval.as_ref()) {
                let (code, pos) = self.load_expr(val.src);
                let vts = self.ty_str(vt);
                let ts = self.ty_str(to);
                let err = self.code_error(
                    Some(pos),
                    format!("cannot use {code} (type {vts}) as type {ts} in assignment"),
                );
                self.report_err(err);
            }
        }
    }

    /// Binds an unbound placeholder and patches every AST slot it
    /// promised.
    pub(crate) fn bind_unbound(&mut self, unbound: Ty, to: Ty) {
        let slots = match self.types.kind_mut(unbound) {
            TypeKind::Unbound { bound, slots } => {
                assert!(bound.is_none(), "unbound type bound twice");
                *bound = Some(to);
                std::mem::take(slots)
            }
            _ => panic!("bind_unbound: not an unbound type"),
        };
        for slot in slots {
            let te = self.to_type(to);
            match slot {
                TypeSlot::ValueSpec(spec) => {
                    if let crate::ast::Spec::Value { typ, .. } = &mut self.ast.specs[spec] {
                        *typ = Some(te);
                    }
                }
                TypeSlot::CompositeLit(expr) => {
                    if let Expr::CompositeLit { typ, .. } = &mut self.ast.exprs[expr] {
                        *typ = Some(te);
                    }
                }
            }
        }
    }
}

fn untyped_compatible(from: BasicKind, to: BasicKind) -> bool {
    match from {
        BasicKind::UntypedBool => to.is_bool(),
        BasicKind::UntypedString => to.is_string(),
        BasicKind::UntypedInt | BasicKind::UntypedRune => to.is_numeric(),
        BasicKind::UntypedFloat => to.is_float() || to.is_complex(),
        BasicKind::UntypedComplex => to.is_complex(),
        _ => false,
    }
}
