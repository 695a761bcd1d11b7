//! Block contexts and control-flow assembly.
//!
//! The builder keeps a stack of in-flight block contexts. Opening a
//! control-flow construct pushes a context (with its own child scope and
//! the operand-stack base length); sub-instructions (`then`, `else_`,
//! `case`, `post`, `range_assign_then`, `type_assert_then`, `comm_case`,
//! `fallthrough_`) are legal only on the matching context and fail fast
//! otherwise; `end` pops the context, assembles the statement, and appends
//! it to the parent. On every close, the operand stack must be back at the
//! recorded base length.

use std::collections::HashMap;

use crate::ast::{
    AssignTok, AstArena, AstVal, Block, BranchTok, Clause, ClauseId, Expr, ExprId, Pos, Span,
    Stmt, StmtId, Symbol, TypeCaseElem,
};
use crate::builder::CodeBuilder;
use crate::decl::FuncRef;
use crate::stack::Element;
use crate::typesys::{BasicKind, TypeKind, Ty};

pub(crate) const FLOW_BREAK: u8 = 1 << 0;
pub(crate) const FLOW_CONTINUE: u8 = 1 << 1;
pub(crate) const FLOW_RETURN: u8 = 1 << 2;
pub(crate) const FLOW_GOTO: u8 = 1 << 3;
pub(crate) const FLOW_WITH_LABEL: u8 = 1 << 4;

/// Hook invoked with the assembled body of a control-flow statement; the
/// extension point for later body-rewriting passes.
pub type BodyHandler = Box<dyn FnMut(&mut AstArena, Block, i32)>;

/// A label defined in the enclosing function body.
#[derive(Debug, Clone, Copy)]
pub struct LabelInfo {
    pub pos: Pos,
    pub used: bool,
}

/// Handle to a declared label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelRef(pub(crate) Symbol);

pub(crate) struct BlockCtx {
    pub kind: BlockKind,
    pub scope: crate::scope::ScopeId,
    pub base: usize,
    pub stmts: Vec<StmtId>,
    pub label: Option<Symbol>,
    pub flows: u8,
    pub body_handler: Option<BodyHandler>,
}

impl BlockCtx {
    pub fn new(kind: BlockKind, scope: crate::scope::ScopeId, base: usize) -> Self {
        Self {
            kind,
            scope,
            base,
            stmts: Vec::new(),
            label: None,
            flows: 0,
            body_handler: None,
        }
    }
}

pub(crate) enum BlockKind {
    TopLevel,
    FuncBody {
        func: FuncRef,
        old_fn: Option<FuncRef>,
        old_labels: HashMap<Symbol, LabelInfo>,
    },
    Block,
    If {
        init: Option<StmtId>,
        cond: Option<ExprId>,
        then_stmts: Option<Vec<StmtId>>,
    },
    For {
        init: Option<StmtId>,
        cond: Option<ExprId>,
        body: Option<Vec<StmtId>>,
    },
    ForRange {
        names: Vec<String>,
        key: Option<ExprId>,
        value: Option<ExprId>,
        define: bool,
        x: Option<ExprId>,
    },
    Switch {
        init: Option<StmtId>,
        tag: Option<Element>,
        clauses: Vec<ClauseId>,
    },
    Case {
        items: Vec<ExprId>,
    },
    TypeSwitch {
        name: Option<Symbol>,
        x: Option<Element>,
        clauses: Vec<ClauseId>,
    },
    TypeCase {
        items: Vec<TypeCaseElem>,
    },
    Select {
        clauses: Vec<ClauseId>,
    },
    CommCase {
        comm: Option<StmtId>,
    },
}

impl BlockKind {
    fn describe(&self) -> &'static str {
        match self {
            BlockKind::TopLevel => "package",
            BlockKind::FuncBody { .. } => "func body",
            BlockKind::Block => "block statement",
            BlockKind::If { .. } => "if statement",
            BlockKind::For { .. } => "for statement",
            BlockKind::ForRange { .. } => "for range statement",
            BlockKind::Switch { .. } => "switch statement",
            BlockKind::Case { .. } => "case statement",
            BlockKind::TypeSwitch { .. } => "type switch statement",
            BlockKind::TypeCase { .. } => "type case statement",
            BlockKind::Select { .. } => "select statement",
            BlockKind::CommCase { .. } => "comm case statement",
        }
    }
}

impl CodeBuilder {
    // -------------------------------------------------------------------------
    // Statement emission
    // -------------------------------------------------------------------------

    pub(crate) fn emit_stmt_id(&mut self, stmt: StmtId) {
        let mut stmt = stmt;
        if let Some(comments) = self.comments.clone() {
            self.ast.stmt_comments.insert(stmt, comments);
            if self.comment_once {
                self.comments = None;
            }
        }
        if let Some(label) = self.cur_mut().label.take() {
            stmt = self
                .ast
                .stmts
                .alloc(Stmt::Labeled { label, stmt }, Span::default());
        }
        self.cur_mut().stmts.push(stmt);
    }

    /// Emits `stmt` and returns its index for a later `commit_stmt`.
    pub fn start_stmt_at(&mut self, stmt: StmtId) -> usize {
        let idx = self.cur().stmts.len();
        self.emit_stmt_id(stmt);
        idx
    }

    /// Moves statement `idx` to be the most recent in its block.
    pub fn commit_stmt(&mut self, idx: usize) {
        let stmts = &mut self.cur_mut().stmts;
        let n = stmts.len();
        if n > 0 && n - 1 > idx {
            let stmt = stmts.remove(idx);
            stmts.push(stmt);
        }
    }

    pub(crate) fn pop_stmt(&mut self) -> StmtId {
        self.cur_mut().stmts.pop().expect("no statement to pop")
    }

    pub(crate) fn take_stmts(&mut self) -> Vec<StmtId> {
        std::mem::take(&mut self.cur_mut().stmts)
    }

    /// Opens a child block context.
    pub(crate) fn start_block(&mut self, kind: BlockKind) {
        let scope = self.scopes.new_scope(Some(self.scope()), kind.describe());
        let base = self.stk.len();
        self.blocks.push(BlockCtx::new(kind, scope, base));
    }

    /// Closes the current context, checking the stack invariant.
    pub(crate) fn pop_block(&mut self) -> BlockCtx {
        if self.cur().label.is_some() {
            let empty = self.ast.stmts.alloc(Stmt::Empty, Span::default());
            self.emit_stmt_id(empty);
        }
        let ctx = self.blocks.pop().expect("no block to end");
        assert!(
            self.stk.len() >= ctx.base,
            "operand stack shrank below block base"
        );
        self.stk.set_len(ctx.base);
        ctx
    }

    fn block_of(&mut self, stmts: Vec<StmtId>) -> Block {
        Block {
            stmts: self.ast.list_stmts(stmts),
        }
    }

    fn run_body_handler(&mut self, handler: Option<BodyHandler>, body: Block, kind: i32) {
        if let Some(mut h) = handler {
            h(&mut self.ast, body, kind);
        }
    }

    /// Installs a hook receiving the assembled body of the current
    /// control-flow statement.
    pub fn set_body_handler(&mut self, handler: BodyHandler) -> &mut Self {
        self.cur_mut().body_handler = Some(handler);
        self
    }

    // -------------------------------------------------------------------------
    // Simple statements
    // -------------------------------------------------------------------------

    /// Ends the current statement: one leftover operand becomes an
    /// expression statement; more than one is a driver error.
    pub fn end_stmt(&mut self) -> &mut Self {
        let n = self.stk.len() - self.cur().base;
        if n > 0 {
            if n != 1 {
                panic!("syntax error: unexpected newline, expecting := or = or comma");
            }
            let e = self.stk.pop();
            let x = match e.val {
                Some(AstVal::Expr(id)) => id,
                _ => panic!("statement operand is not an expression"),
            };
            let id = self.ast.stmts.alloc(Stmt::Expr(x), Span::default());
            self.emit_stmt_id(id);
        }
        self
    }

    /// Drops any operands accumulated for the current statement.
    pub fn reset_stmt(&mut self) -> &mut Self {
        if crate::debug_instr() {
            log::debug!(target: "gobuild::instr", "ResetStmt");
        }
        let base = self.cur().base;
        self.stk.set_len(base);
        self
    }

    /// `chan <- value`.
    pub fn send(&mut self) -> &mut Self {
        if crate::debug_instr() {
            log::debug!(target: "gobuild::instr", "Send");
        }
        let val = self.stk.pop();
        let ch = self.stk.pop();
        // Both operand types are checked eagerly.
        if let Some(ct) = ch.typ {
            let u = self.underlying(ct);
            match self.types.kind(u).clone() {
                TypeKind::Chan { dir, elem } if dir != crate::ast::ChanDir::Recv => {
                    if !self.assignable_to_elem(&val, elem) {
                        let (code, pos) = self.load_expr(val.src);
                        let vt = val.typ.map(|t| self.ty_str(t)).unwrap_or_default();
                        let es = self.ty_str(elem);
                        let err = self.code_error(
                            Some(pos),
                            format!("cannot use {code} (type {vt}) as type {es} in send"),
                        );
                        self.report_err(err);
                    }
                }
                _ => {
                    let (code, pos) = self.load_expr(ch.src);
                    let ts = self.ty_str(ct);
                    let err = self.code_error(
                        Some(pos),
                        format!("invalid operation: {code} (send to non-channel type {ts})"),
                    );
                    self.report_err(err);
                }
            }
        }
        let chan = ch.expr_id().expect("send channel is not an expression");
        let value = val.expr_id().expect("send value is not an expression");
        let id = self.ast.stmts.alloc(Stmt::Send { chan, value }, Span::default());
        self.emit_stmt_id(id);
        self
    }

    /// `defer f(...)`.
    pub fn defer_(&mut self) -> &mut Self {
        if crate::debug_instr() {
            log::debug!(target: "gobuild::instr", "Defer");
        }
        let arg = self.stk.pop();
        let call = match arg.expr_id().map(|id| (id, self.ast.exprs[id])) {
            Some((id, Expr::Call { .. })) => id,
            _ => panic!("please use defer callExpr()"),
        };
        let id = self.ast.stmts.alloc(Stmt::Defer { call }, Span::default());
        self.emit_stmt_id(id);
        self
    }

    /// `go f(...)`.
    pub fn go_(&mut self) -> &mut Self {
        if crate::debug_instr() {
            log::debug!(target: "gobuild::instr", "Go");
        }
        let arg = self.stk.pop();
        let call = match arg.expr_id().map(|id| (id, self.ast.exprs[id])) {
            Some((id, Expr::Call { .. })) => id,
            _ => panic!("please use go callExpr()"),
        };
        let id = self.ast.stmts.alloc(Stmt::Go { call }, Span::default());
        self.emit_stmt_id(id);
        self
    }

    // -------------------------------------------------------------------------
    // Labels and branches
    // -------------------------------------------------------------------------

    /// Declares a label in the current function body. A duplicate is a
    /// recoverable diagnostic and returns `None`.
    pub fn new_label(&mut self, pos: Pos, name: &str) -> Option<LabelRef> {
        if self.cur_fn.is_none() {
            std::panic::panic_any(self.error_at_pos(
                pos,
                "syntax error: non-declaration statement outside function body".to_string(),
            ));
        }
        let sym = self.interner.intern(name);
        if let Some(old) = self.labels.get(&sym) {
            let old_pos = self.position(old.pos);
            let err =
                self.error_at_pos(pos, format!("label {name} already defined at {old_pos}"));
            self.report_err(err);
            return None;
        }
        self.labels.insert(sym, LabelInfo { pos, used: false });
        Some(LabelRef(sym))
    }

    pub fn lookup_label(&self, name: &str) -> Option<LabelRef> {
        // Lookup without interning: an unknown name stays unknown.
        self.labels
            .keys()
            .find(|&&sym| self.interner.resolve(sym) == name)
            .map(|&sym| LabelRef(sym))
    }

    /// Attaches a label to the *next* statement.
    pub fn label(&mut self, l: LabelRef) -> &mut Self {
        if crate::debug_instr() {
            log::debug!(target: "gobuild::instr", "Label {}", self.interner.resolve(l.0));
        }
        self.cur_mut().label = Some(l.0);
        self
    }

    pub fn goto_(&mut self, l: LabelRef) -> &mut Self {
        if crate::debug_instr() {
            log::debug!(target: "gobuild::instr", "Goto {}", self.interner.resolve(l.0));
        }
        if let Some(info) = self.labels.get_mut(&l.0) {
            info.used = true;
        }
        self.cur_mut().flows |= FLOW_GOTO;
        let id = self.ast.stmts.alloc(
            Stmt::Branch {
                tok: BranchTok::Goto,
                label: Some(l.0),
            },
            Span::default(),
        );
        self.emit_stmt_id(id);
        self
    }

    fn label_flow(&mut self, flow: u8, l: Option<LabelRef>) -> Option<Symbol> {
        match l {
            Some(l) => {
                if let Some(info) = self.labels.get_mut(&l.0) {
                    info.used = true;
                }
                self.cur_mut().flows |= flow | FLOW_WITH_LABEL;
                Some(l.0)
            }
            None => {
                self.cur_mut().flows |= flow;
                None
            }
        }
    }

    pub fn break_(&mut self, l: Option<LabelRef>) -> &mut Self {
        let label = self.label_flow(FLOW_BREAK, l);
        if crate::debug_instr() {
            log::debug!(target: "gobuild::instr", "Break");
        }
        let id = self.ast.stmts.alloc(
            Stmt::Branch {
                tok: BranchTok::Break,
                label,
            },
            Span::default(),
        );
        self.emit_stmt_id(id);
        self
    }

    pub fn continue_(&mut self, l: Option<LabelRef>) -> &mut Self {
        let label = self.label_flow(FLOW_CONTINUE, l);
        if crate::debug_instr() {
            log::debug!(target: "gobuild::instr", "Continue");
        }
        let id = self.ast.stmts.alloc(
            Stmt::Branch {
                tok: BranchTok::Continue,
                label,
            },
            Span::default(),
        );
        self.emit_stmt_id(id);
        self
    }

    /// Valid only directly inside a `case` of an expression switch.
    pub fn fallthrough_(&mut self) -> &mut Self {
        if crate::debug_instr() {
            log::debug!(target: "gobuild::instr", "Fallthrough");
        }
        match self.cur().kind {
            BlockKind::Case { .. } => {
                let id = self.ast.stmts.alloc(
                    Stmt::Branch {
                        tok: BranchTok::Fallthrough,
                        label: None,
                    },
                    Span::default(),
                );
                self.emit_stmt_id(id);
                self
            }
            _ => panic!("please use fallthrough in case statement"),
        }
    }

    // -------------------------------------------------------------------------
    // Return
    // -------------------------------------------------------------------------

    pub(crate) fn return_results(&mut self, n: usize) {
        let mut rets = Vec::with_capacity(n);
        if n > 0 {
            for e in self.stk.get_args(n) {
                rets.push(e.expr_id().expect("return value is not an expression"));
            }
            self.stk.pop_n(n);
        }
        let results = self.ast.list_exprs(rets);
        let id = self.ast.stmts.alloc(Stmt::Return { results }, Span::default());
        self.emit_stmt_id(id);
    }

    fn check_func_results(&mut self, n: usize, results: &[crate::scope::Obj], src: Option<Span>) {
        let want: Vec<Ty> = results.iter().map(|&o| self.scopes.obj(o).ty).collect();
        if n == 1 && want.len() > 1 {
            let arg = self.stk.get(-1).clone();
            if let Some(TypeKind::Tuple { items }) =
                arg.typ.map(|t| self.types.kind(t).clone())
            {
                if items.len() == want.len() {
                    for (have, &w) in items.iter().zip(want.iter()) {
                        if !self.assignable_to(*have, w, None) {
                            let (code, pos) = self.load_expr(arg.src);
                            let hs = self.ty_str(*have);
                            let ws = self.ty_str(w);
                            let err = self.code_error(
                                Some(pos),
                                format!(
                                    "cannot use {code} (type {hs}) as type {ws} in return statement"
                                ),
                            );
                            self.report_err(err);
                        }
                    }
                    return;
                }
            }
        }
        if n != want.len() {
            let msg = if n < want.len() {
                "not enough arguments to return"
            } else {
                "too many arguments to return"
            };
            let pos = self.load_expr(src).1;
            std::panic::panic_any(self.code_error(Some(pos), msg.to_string()));
        }
        let args: Vec<Element> = self.stk.get_args(n).to_vec();
        for (arg, &w) in args.iter().zip(want.iter()) {
            if !self.assignable_to_elem(arg, w) {
                let (code, pos) = self.load_expr(arg.src);
                let at = arg.typ.map(|t| self.ty_str(t)).unwrap_or_default();
                let ws = self.ty_str(w);
                let err = self.code_error(
                    Some(pos),
                    format!("cannot use {code} (type {at}) as type {ws} in return statement"),
                );
                self.report_err(err);
            }
        }
    }

    /// `return x, y, ...` over the top `n` operands. Inside an inline
    /// closure, returns rewrite to result assignments plus a jump to the
    /// ending label.
    pub fn return_(&mut self, n: usize) -> &mut Self {
        self.return_src(n, None)
    }

    pub fn return_src(&mut self, n: usize, src: Option<Span>) -> &mut Self {
        if crate::debug_instr() {
            log::debug!(target: "gobuild::instr", "Return {n}");
        }
        let f = self.cur_fn.expect("return outside function body");
        let sig = self.funcs[f.raw() as usize].sig;
        let results = match self.types.kind(sig) {
            TypeKind::Signature { results, .. } => results.clone(),
            _ => panic!("function signature expected"),
        };
        self.check_func_results(n, &results, src);
        if self.funcs[f.raw() as usize].is_inline() {
            for i in (0..n).rev() {
                let param = results[i];
                let inst = *self
                    .param_insts
                    .get(&(f, param))
                    .expect("inline closure result variable missing");
                let elem = self.stk.pop();
                self.do_var_ref(Some(inst), None, false);
                self.stk.push(elem);
                self.do_assign_with(1, 1, None);
            }
            let ending = self.ending_label(f);
            self.goto_(ending);
        } else {
            self.cur_mut().flows |= FLOW_RETURN;
            self.return_results(n);
        }
        self
    }

    /// `return ..., err` when the function's last result is `error`:
    /// zero-fills the leading results. With `outer`, applies to the
    /// enclosing function of an inline closure.
    pub fn return_err(&mut self, outer: bool) -> &mut Self {
        if crate::debug_instr() {
            log::debug!(target: "gobuild::instr", "ReturnErr {outer}");
        }
        let mut f = self.cur_fn.expect("return outside function body");
        if outer {
            if !self.funcs[f.raw() as usize].is_inline() {
                panic!("only support ReturnOuterErr in an inline call");
            }
            f = self.funcs[f.raw() as usize]
                .outer
                .expect("inline closure has no enclosing function");
        }
        let sig = self.funcs[f.raw() as usize].sig;
        let results = match self.types.kind(sig) {
            TypeKind::Signature { results, .. } => results.clone(),
            _ => panic!("function signature expected"),
        };
        let n = results.len();
        if n > 0 {
            let last_ty = self.scopes.obj(results[n - 1]).ty;
            if last_ty == self.pkg.ty_error {
                let err = self.stk.pop();
                for &r in &results[..n - 1] {
                    let ty = self.scopes.obj(r).ty;
                    self.do_zero_lit(ty);
                }
                self.stk.push(err);
                self.return_results(n);
                self.cur_mut().flows |= FLOW_RETURN;
                return self;
            }
        }
        panic!("TODO: last result type isn't an error");
    }

    // -------------------------------------------------------------------------
    // Block / if
    // -------------------------------------------------------------------------

    /// Opens a plain block statement.
    pub fn block(&mut self) -> &mut Self {
        if crate::debug_instr() {
            log::debug!(target: "gobuild::instr", "Block");
        }
        self.start_block(BlockKind::Block);
        self
    }

    /// Opens an `if` statement.
    pub fn if_(&mut self) -> &mut Self {
        if crate::debug_instr() {
            log::debug!(target: "gobuild::instr", "If");
        }
        self.start_block(BlockKind::If {
            init: None,
            cond: None,
            then_stmts: None,
        });
        self
    }

    /// Ends the header of an `if`, `switch`, or `for`: consumes the
    /// condition/tag operand and captures any init statement.
    pub fn then(&mut self) -> &mut Self {
        if crate::debug_instr() {
            log::debug!(target: "gobuild::instr", "Then");
        }
        if self.stk.len() == self.cur().base {
            panic!("use None() for empty expr");
        }
        let cond = self.stk.pop();
        let init = self.capture_init();
        enum Header {
            If,
            For,
            Switch,
        }
        let header = match self.cur().kind {
            BlockKind::If { .. } => Header::If,
            BlockKind::For { .. } => Header::For,
            BlockKind::Switch { .. } => Header::Switch,
            _ => panic!("use if..then or switch..then please"),
        };
        match header {
            Header::If => {
                let e = self.expect_bool_cond(&cond);
                if let BlockKind::If { init: i, cond: c, .. } = &mut self.cur_mut().kind {
                    *i = init;
                    *c = Some(e);
                }
            }
            Header::For => {
                let e = if cond.val.is_some() {
                    Some(self.expect_bool_cond(&cond))
                } else {
                    None
                };
                if let BlockKind::For { init: i, cond: c, .. } = &mut self.cur_mut().kind {
                    *i = init;
                    *c = e;
                }
            }
            Header::Switch => {
                if let BlockKind::Switch { init: i, tag, .. } = &mut self.cur_mut().kind {
                    *i = init;
                    if cond.val.is_some() {
                        *tag = Some(cond);
                    }
                }
            }
        }
        self
    }

    fn expect_bool_cond(&mut self, cond: &Element) -> ExprId {
        if let Some(t) = cond.typ {
            let u = self.underlying(t);
            let is_bool = self
                .types
                .basic_kind(u)
                .map(|k| k.is_bool())
                .unwrap_or(false);
            if !is_bool {
                let (code, pos) = self.load_expr(cond.src);
                let ts = self.ty_str(t);
                let err = self.code_error(
                    Some(pos),
                    format!("non-boolean condition {code} (type {ts})"),
                );
                self.report_err(err);
            }
        }
        cond.expr_id().expect("condition is not an expression")
    }

    /// Captures statements emitted before `then()` as the header's init
    /// statement.
    fn capture_init(&mut self) -> Option<StmtId> {
        let stmts = self.take_stmts();
        match stmts.len() {
            0 => None,
            1 => Some(stmts[0]),
            _ => panic!("too many init statements before Then()"),
        }
    }

    /// Switches an `if` context from the then-branch to the else-branch.
    pub fn else_(&mut self) -> &mut Self {
        if crate::debug_instr() {
            log::debug!(target: "gobuild::instr", "Else");
        }
        let stmts = self.take_stmts();
        match &mut self.cur_mut().kind {
            BlockKind::If { then_stmts, .. } => {
                if then_stmts.is_some() {
                    panic!("use if..else please");
                }
                *then_stmts = Some(stmts);
                self
            }
            _ => panic!("use if..else please"),
        }
    }

    // -------------------------------------------------------------------------
    // For / for-range
    // -------------------------------------------------------------------------

    /// Opens a `for` statement.
    pub fn for_(&mut self) -> &mut Self {
        if crate::debug_instr() {
            log::debug!(target: "gobuild::instr", "For");
        }
        self.start_block(BlockKind::For {
            init: None,
            cond: None,
            body: None,
        });
        self
    }

    /// Switches a `for` context into post-statement mode: statements
    /// emitted after this call form the loop's post statement.
    pub fn post(&mut self) -> &mut Self {
        if crate::debug_instr() {
            log::debug!(target: "gobuild::instr", "Post");
        }
        let stmts = self.take_stmts();
        match &mut self.cur_mut().kind {
            BlockKind::For { body, .. } => {
                if body.is_some() {
                    panic!("please use Post() in for statement");
                }
                *body = Some(stmts);
                self
            }
            _ => panic!("please use Post() in for statement"),
        }
    }

    /// Opens a `for range` statement over `names` (0, 1, or 2 loop
    /// variables); with no names, the driver pushes assignment targets
    /// before the collection instead.
    pub fn for_range(&mut self, names: &[&str]) -> &mut Self {
        if crate::debug_instr() {
            log::debug!(target: "gobuild::instr", "ForRange {names:?}");
        }
        self.start_block(BlockKind::ForRange {
            names: names.iter().map(|s| s.to_string()).collect(),
            key: None,
            value: None,
            define: false,
            x: None,
        });
        self
    }

    /// Key/element types of ranging over `t`; the bool is whether a
    /// second loop variable is allowed.
    fn range_kv(&mut self, t: Ty, src: Option<Span>) -> (Ty, Option<Ty>) {
        let u = self.underlying(t);
        let int = self.types.basic(BasicKind::Int);
        match self.types.kind(u).clone() {
            TypeKind::Slice { elem } => (int, Some(elem)),
            TypeKind::Array { elem, .. } => (int, Some(elem)),
            TypeKind::Pointer { elem } => {
                let eu = self.underlying(elem);
                match self.types.kind(eu).clone() {
                    TypeKind::Array { elem, .. } => (int, Some(elem)),
                    _ => {
                        let (code, pos) = self.load_expr(src);
                        let ts = self.ty_str(t);
                        std::panic::panic_any(self.code_error(
                            Some(pos),
                            format!("cannot range over {code} (type {ts})"),
                        ));
                    }
                }
            }
            TypeKind::Map { key, elem } => (key, Some(elem)),
            TypeKind::Chan { dir, elem } => {
                if dir == crate::ast::ChanDir::Send {
                    let (code, pos) = self.load_expr(src);
                    std::panic::panic_any(self.code_error(
                        Some(pos),
                        format!("invalid operation: range {code} (receive from send-only channel)"),
                    ));
                }
                (elem, None)
            }
            TypeKind::Basic(k) if k.is_string() => {
                let rune = self.types.basic(BasicKind::Int32);
                (int, Some(rune))
            }
            _ => {
                let (code, pos) = self.load_expr(src);
                let ts = self.ty_str(t);
                std::panic::panic_any(
                    self.code_error(Some(pos), format!("cannot range over {code} (type {ts})")),
                );
            }
        }
    }

    /// Consumes the collection operand (and, with no names, the
    /// assignment targets under it) and enters the loop body.
    pub fn range_assign_then(&mut self, pos: Pos) -> &mut Self {
        if crate::debug_instr() {
            log::debug!(target: "gobuild::instr", "RangeAssignThen");
        }
        let names = match &self.cur().kind {
            BlockKind::ForRange { names, .. } => names.clone(),
            _ => panic!("please use RangeAssignThen() in for range statement"),
        };
        if !names.is_empty() {
            let x = self.stk.pop();
            let xt = x.typ.map(|t| self.types.deref_ref(t)).unwrap_or_else(|| {
                self.panic_code_error(x.src, "cannot range over untyped operand".to_string())
            });
            let (kt, vt) = self.range_kv(xt, x.src);
            if names.len() > 2 || (names.len() == 2 && vt.is_none()) {
                std::panic::panic_any(self.error_at_pos(
                    pos,
                    format!("range clause permits at most {} iteration variables",
                        if vt.is_none() { 1 } else { 2 }),
                ));
            }
            let mut exprs: Vec<Option<ExprId>> = Vec::new();
            let tys = [Some(kt), vt];
            for (i, name) in names.iter().enumerate() {
                let sym = self.interner.intern(name);
                let id = self.ast.ident(sym);
                exprs.push(Some(id));
                if name != "_" {
                    let ty = tys[i].expect("range variable without a type");
                    let obj = self.new_var_obj(pos, sym, ty);
                    let scope = self.scope();
                    if let Some(old) = self.scopes.insert(scope, obj) {
                        let old_pos = self.position(self.scopes.obj(old).pos);
                        std::panic::panic_any(self.error_at_pos(
                            pos,
                            format!(
                                "{name} redeclared in this block\n\tprevious declaration at {old_pos}"
                            ),
                        ));
                    }
                }
            }
            let x_id = x.expr_id().expect("range collection is not an expression");
            match &mut self.cur_mut().kind {
                BlockKind::ForRange {
                    key,
                    value,
                    define,
                    x,
                    ..
                } => {
                    *key = exprs.first().cloned().flatten();
                    *value = exprs.get(1).cloned().flatten();
                    *define = true;
                    *x = Some(x_id);
                }
                _ => unreachable!(),
            }
        } else {
            // Expression mode: [keyRef [valueRef]] collection on the stack.
            let n = self.stk.len() - self.cur().base;
            if n < 1 || n > 3 {
                panic!("please use RangeAssignThen() in for range statement");
            }
            let x = self.stk.pop();
            let xt = x.typ.map(|t| self.types.deref_ref(t)).unwrap_or_else(|| {
                self.panic_code_error(x.src, "cannot range over untyped operand".to_string())
            });
            let (kt, vt) = self.range_kv(xt, x.src);
            let mut refs: Vec<Element> = Vec::new();
            for _ in 0..n - 1 {
                refs.push(self.stk.pop());
            }
            refs.reverse();
            let want = [Some(kt), vt];
            for (i, r) in refs.iter().enumerate() {
                if let Some(w) = want.get(i).cloned().flatten() {
                    let val = Element {
                        val: None,
                        typ: Some(w),
                        cval: None,
                        src: None,
                    };
                    self.check_assign_type(r, &val);
                }
            }
            let x_id = x.expr_id().expect("range collection is not an expression");
            match &mut self.cur_mut().kind {
                BlockKind::ForRange {
                    key,
                    value,
                    define,
                    x,
                    ..
                } => {
                    *key = refs.first().and_then(|e| e.expr_id());
                    *value = refs.get(1).and_then(|e| e.expr_id());
                    *define = false;
                    *x = Some(x_id);
                }
                _ => unreachable!(),
            }
        }
        self
    }

    // -------------------------------------------------------------------------
    // Switch / type switch / select
    // -------------------------------------------------------------------------

    /// Opens a `switch` statement.
    pub fn switch(&mut self) -> &mut Self {
        if crate::debug_instr() {
            log::debug!(target: "gobuild::instr", "Switch");
        }
        self.start_block(BlockKind::Switch {
            init: None,
            tag: None,
            clauses: Vec::new(),
        });
        self
    }

    /// Opens a case clause over the top `n` operands; `n == 0` is the
    /// default clause.
    pub fn case(&mut self, n: usize) -> &mut Self {
        if crate::debug_instr() {
            log::debug!(target: "gobuild::instr", "Case {n}");
        }
        let tag = match &self.cur().kind {
            BlockKind::Switch { tag, .. } => tag.clone(),
            _ => panic!("use switch..case please"),
        };
        let args: Vec<Element> = self.stk.get_args(n).to_vec();
        let mut items = Vec::with_capacity(n);
        for arg in &args {
            match &tag {
                Some(t) => {
                    if !self.comparable(arg, t) {
                        let (code, pos) = self.load_expr(arg.src);
                        let at = arg.typ.map(|t| self.ty_str(t)).unwrap_or_default();
                        let ts = t.typ.map(|t| self.ty_str(t)).unwrap_or_default();
                        let err = self.code_error(
                            Some(pos),
                            format!("invalid case {code} (type {at}) in switch on type {ts}"),
                        );
                        self.report_err(err);
                    }
                }
                None => {
                    let is_bool = arg
                        .typ
                        .map(|t| {
                            let u = self.underlying(t);
                            self.types
                                .basic_kind(u)
                                .map(|k| k.is_bool())
                                .unwrap_or(false)
                        })
                        .unwrap_or(false);
                    if !is_bool {
                        let (code, pos) = self.load_expr(arg.src);
                        let err = self.code_error(
                            Some(pos),
                            format!("invalid case {code} in switch (mismatched types)"),
                        );
                        self.report_err(err);
                    }
                }
            }
            items.push(arg.expr_id().expect("case item is not an expression"));
        }
        self.stk.pop_n(n);
        self.start_block(BlockKind::Case { items });
        self
    }

    /// Opens a `switch x.(type)` statement binding `name` (empty for
    /// none) in each case.
    pub fn type_switch(&mut self, name: &str) -> &mut Self {
        if crate::debug_instr() {
            log::debug!(target: "gobuild::instr", "TypeSwitch {name}");
        }
        let name = if name.is_empty() {
            None
        } else {
            Some(self.interner.intern(name))
        };
        self.start_block(BlockKind::TypeSwitch {
            name,
            x: None,
            clauses: Vec::new(),
        });
        self
    }

    /// Consumes the asserted operand of a type switch.
    pub fn type_assert_then(&mut self) -> &mut Self {
        if crate::debug_instr() {
            log::debug!(target: "gobuild::instr", "TypeAssertThen");
        }
        if !matches!(self.cur().kind, BlockKind::TypeSwitch { .. }) {
            panic!("use typeSwitch..typeAssertThen please");
        }
        let arg = self.stk.pop();
        let at = arg.typ.expect("type switch on untyped operand");
        if self.interface_of(at).is_none() {
            let (code, pos) = self.load_expr(arg.src);
            let ts = self.ty_str(at);
            std::panic::panic_any(self.code_error(
                Some(pos),
                format!("invalid type assertion: {code} (non-interface type {ts} on left)"),
            ));
        }
        match &mut self.cur_mut().kind {
            BlockKind::TypeSwitch { x, .. } => *x = Some(arg),
            _ => unreachable!(),
        }
        self
    }

    /// Opens a type-case clause over the top `n` type operands; `n == 0`
    /// is the default clause. The asserted name (if any) is re-bound in
    /// the clause's scope to the case type.
    pub fn type_case(&mut self, n: usize) -> &mut Self {
        if crate::debug_instr() {
            log::debug!(target: "gobuild::instr", "TypeCase {n}");
        }
        let (name, x) = match &self.cur().kind {
            BlockKind::TypeSwitch { name, x, .. } => (*name, x.clone()),
            _ => panic!("use switch x.(type) .. case please"),
        };
        let x = x.expect("TypeAssertThen must come before TypeCase");
        let args: Vec<Element> = self.stk.get_args(n).to_vec();
        let mut items = Vec::with_capacity(n);
        let mut single: Option<Ty> = None;
        for arg in &args {
            match arg.typ.map(|t| self.types.kind(t).clone()) {
                Some(TypeKind::TypeOf { ty }) => {
                    let te = match arg.val {
                        Some(AstVal::Type(id)) => id,
                        _ => self.to_type(ty),
                    };
                    items.push(TypeCaseElem::Type(te));
                    single = Some(ty);
                }
                Some(TypeKind::Basic(BasicKind::UntypedNil)) => {
                    items.push(TypeCaseElem::Nil);
                    single = None;
                }
                _ => panic!("TypeCase expects type operands"),
            }
        }
        self.stk.pop_n(n);
        self.start_block(BlockKind::TypeCase { items });
        if let Some(name) = name {
            let bind_ty = if n == 1 {
                single.unwrap_or_else(|| x.typ.unwrap())
            } else {
                x.typ.unwrap()
            };
            let obj = self.new_var_obj(Pos::NONE, name, bind_ty);
            let scope = self.scope();
            self.scopes.insert(scope, obj);
        }
        self
    }

    /// Opens a `select` statement.
    pub fn select_(&mut self) -> &mut Self {
        if crate::debug_instr() {
            log::debug!(target: "gobuild::instr", "Select");
        }
        self.start_block(BlockKind::Select {
            clauses: Vec::new(),
        });
        self
    }

    /// Opens a communication clause: the last emitted statement becomes
    /// the clause's comm statement (`n == 0` opens the default clause).
    pub fn comm_case(&mut self, n: usize) -> &mut Self {
        if crate::debug_instr() {
            log::debug!(target: "gobuild::instr", "CommCase {n}");
        }
        if n > 1 {
            panic!("TODO: multi commStmt in select..case?");
        }
        if !matches!(self.cur().kind, BlockKind::Select { .. }) {
            panic!("use select..case please");
        }
        let comm = if n == 1 {
            let stmt = self.pop_stmt();
            // The comm statement must be a send or a receive form.
            let ok = match self.ast.stmts[stmt] {
                Stmt::Send { .. } => true,
                Stmt::Expr(e) => {
                    matches!(self.ast.exprs[e], Expr::Unary { op: crate::ast::UnaryOp::Recv, .. })
                }
                Stmt::Assign { rhs, .. } => {
                    let rhs = self.ast.exprs_list(rhs).to_vec();
                    rhs.len() == 1
                        && matches!(
                            self.ast.exprs[rhs[0]],
                            Expr::Unary { op: crate::ast::UnaryOp::Recv, .. }
                        )
                }
                _ => false,
            };
            if !ok {
                let err = self.code_error(
                    None,
                    "select case must be receive, send or assign recv statement".to_string(),
                );
                self.report_err(err);
            }
            Some(stmt)
        } else {
            None
        };
        self.start_block(BlockKind::CommCase { comm });
        self
    }

    // -------------------------------------------------------------------------
    // End
    // -------------------------------------------------------------------------

    /// Closes the current block context, assembling its statement.
    pub fn end(&mut self) -> &mut Self {
        if crate::debug_instr() {
            log::debug!(target: "gobuild::instr", "End // {}", self.cur().kind.describe());
            if self.stk.len() > self.cur().base {
                panic!("forget to call EndStmt()?");
            }
        }
        match self.cur().kind {
            BlockKind::TopLevel => panic!("End() without an open block"),
            BlockKind::FuncBody { .. } => self.end_func_body(),
            BlockKind::Block => self.end_plain_block(),
            BlockKind::If { .. } => self.end_if(),
            BlockKind::For { .. } => self.end_for(),
            BlockKind::ForRange { .. } => self.end_for_range(),
            BlockKind::Switch { .. } => self.end_switch(),
            BlockKind::Case { .. } => self.end_case(),
            BlockKind::TypeSwitch { .. } => self.end_type_switch(),
            BlockKind::TypeCase { .. } => self.end_type_case(),
            BlockKind::Select { .. } => self.end_select(),
            BlockKind::CommCase { .. } => self.end_comm_case(),
        }
        self
    }

    fn propagate_flows(&mut self, flows: u8, mask: u8) {
        self.cur_mut().flows |= flows & mask;
    }

    fn end_plain_block(&mut self) {
        let ctx = self.pop_block();
        let block = self.block_of(ctx.stmts);
        self.run_body_handler(ctx.body_handler, block, 0);
        let id = self.ast.stmts.alloc(Stmt::Block(block), Span::default());
        self.propagate_flows(ctx.flows, !0);
        self.emit_stmt_id(id);
    }

    fn end_if(&mut self) {
        let ctx = self.pop_block();
        let (init, cond, then_stmts) = match ctx.kind {
            BlockKind::If {
                init,
                cond,
                then_stmts,
            } => (init, cond, then_stmts),
            _ => unreachable!(),
        };
        let cond = cond.expect("if statement without condition (missing Then()?)");
        let (then_vec, else_vec) = match then_stmts {
            Some(t) => (t, Some(ctx.stmts)),
            None => (ctx.stmts, None),
        };
        let then = self.block_of(then_vec);
        self.run_body_handler(ctx.body_handler, then, 0);
        let else_ = else_vec.and_then(|stmts| match stmts.len() {
            0 => None,
            1 if matches!(self.ast.stmts[stmts[0]], Stmt::If { .. }) => Some(stmts[0]),
            _ => {
                let b = self.block_of(stmts);
                Some(self.ast.stmts.alloc(Stmt::Block(b), Span::default()))
            }
        });
        let id = self.ast.stmts.alloc(
            Stmt::If {
                init,
                cond,
                then,
                else_,
            },
            Span::default(),
        );
        self.propagate_flows(ctx.flows, !0);
        self.emit_stmt_id(id);
    }

    fn end_for(&mut self) {
        let ctx = self.pop_block();
        let (init, cond, body) = match ctx.kind {
            BlockKind::For { init, cond, body } => (init, cond, body),
            _ => unreachable!(),
        };
        let (body_vec, post) = match body {
            Some(b) => {
                let post = match ctx.stmts.len() {
                    0 => None,
                    1 => Some(ctx.stmts[0]),
                    _ => panic!("too many post statements in for"),
                };
                (b, post)
            }
            None => (ctx.stmts, None),
        };
        let body = self.block_of(body_vec);
        self.run_body_handler(ctx.body_handler, body, 0);
        let id = self.ast.stmts.alloc(
            Stmt::For {
                init,
                cond,
                post,
                body,
            },
            Span::default(),
        );
        // A loop absorbs plain break/continue.
        self.propagate_flows(ctx.flows, FLOW_RETURN | FLOW_GOTO | FLOW_WITH_LABEL);
        self.emit_stmt_id(id);
    }

    fn end_for_range(&mut self) {
        let ctx = self.pop_block();
        let (key, value, define, x) = match ctx.kind {
            BlockKind::ForRange {
                key,
                value,
                define,
                x,
                ..
            } => (key, value, define, x),
            _ => unreachable!(),
        };
        let x = x.expect("for range statement without RangeAssignThen()");
        let body = self.block_of(ctx.stmts);
        self.run_body_handler(ctx.body_handler, body, 0);
        let id = self.ast.stmts.alloc(
            Stmt::Range {
                key,
                value,
                define,
                x,
                body,
            },
            Span::default(),
        );
        self.propagate_flows(ctx.flows, FLOW_RETURN | FLOW_GOTO | FLOW_WITH_LABEL);
        self.emit_stmt_id(id);
    }

    fn end_switch(&mut self) {
        let ctx = self.pop_block();
        let (init, tag, clauses) = match ctx.kind {
            BlockKind::Switch { init, tag, clauses } => (init, tag, clauses),
            _ => unreachable!(),
        };
        let tag = tag.and_then(|e| e.expr_id());
        let clause_list = self.ast.list_clauses(clauses);
        let id = self.ast.stmts.alloc(
            Stmt::Switch {
                init,
                tag,
                clauses: clause_list,
            },
            Span::default(),
        );
        self.propagate_flows(ctx.flows, FLOW_RETURN | FLOW_GOTO | FLOW_WITH_LABEL);
        self.emit_stmt_id(id);
    }

    fn end_case(&mut self) {
        let ctx = self.pop_block();
        let items = match ctx.kind {
            BlockKind::Case { items } => items,
            _ => unreachable!(),
        };
        let cases = self.ast.list_exprs(items);
        let body = self.ast.list_stmts(ctx.stmts);
        let clause = self.ast.clauses.alloc(Clause::Case { cases, body }, Span::default());
        match &mut self.cur_mut().kind {
            BlockKind::Switch { clauses, .. } => clauses.push(clause),
            _ => panic!("case must close inside a switch statement"),
        }
        self.propagate_flows(ctx.flows, !0);
    }

    fn end_type_switch(&mut self) {
        let ctx = self.pop_block();
        let (name, x, clauses) = match ctx.kind {
            BlockKind::TypeSwitch { name, x, clauses } => (name, x, clauses),
            _ => unreachable!(),
        };
        let x = x.expect("type switch without TypeAssertThen()");
        let x_id = x.expr_id().expect("type switch operand is not an expression");
        let assert = self.alloc_expr(Expr::TypeAssert {
            x: x_id,
            typ: None,
        });
        let guard = match name {
            Some(name) => {
                let lhs_id = self.ast.ident(name);
                let lhs = self.ast.list_exprs([lhs_id]);
                let rhs = self.ast.list_exprs([assert]);
                self.ast.stmts.alloc(
                    Stmt::Assign {
                        lhs,
                        op: AssignTok::Define,
                        rhs,
                    },
                    Span::default(),
                )
            }
            None => self.ast.stmts.alloc(Stmt::Expr(assert), Span::default()),
        };
        let clause_list = self.ast.list_clauses(clauses);
        let id = self.ast.stmts.alloc(
            Stmt::TypeSwitch {
                init: None,
                guard,
                clauses: clause_list,
            },
            Span::default(),
        );
        self.propagate_flows(ctx.flows, FLOW_RETURN | FLOW_GOTO | FLOW_WITH_LABEL);
        self.emit_stmt_id(id);
    }

    fn end_type_case(&mut self) {
        let ctx = self.pop_block();
        let items = match ctx.kind {
            BlockKind::TypeCase { items } => items,
            _ => unreachable!(),
        };
        let types = self.ast.list_type_cases(items);
        let body = self.ast.list_stmts(ctx.stmts);
        let clause = self
            .ast
            .clauses
            .alloc(Clause::TypeCase { types, body }, Span::default());
        match &mut self.cur_mut().kind {
            BlockKind::TypeSwitch { clauses, .. } => clauses.push(clause),
            _ => panic!("type case must close inside a type switch statement"),
        }
        self.propagate_flows(ctx.flows, !0);
    }

    fn end_select(&mut self) {
        let ctx = self.pop_block();
        let clauses = match ctx.kind {
            BlockKind::Select { clauses } => clauses,
            _ => unreachable!(),
        };
        let clause_list = self.ast.list_clauses(clauses);
        let id = self.ast.stmts.alloc(
            Stmt::Select {
                clauses: clause_list,
            },
            Span::default(),
        );
        self.propagate_flows(ctx.flows, FLOW_RETURN | FLOW_GOTO | FLOW_WITH_LABEL);
        self.emit_stmt_id(id);
    }

    fn end_comm_case(&mut self) {
        let ctx = self.pop_block();
        let comm = match ctx.kind {
            BlockKind::CommCase { comm } => comm,
            _ => unreachable!(),
        };
        let body = self.ast.list_stmts(ctx.stmts);
        let clause = self.ast.clauses.alloc(Clause::Comm { comm, body }, Span::default());
        match &mut self.cur_mut().kind {
            BlockKind::Select { clauses, .. } => clauses.push(clause),
            _ => panic!("comm case must close inside a select statement"),
        }
        self.propagate_flows(ctx.flows, !0);
    }
}
