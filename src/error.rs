//! Diagnostics and collaborator error contracts.

use thiserror::Error;

use crate::ast::Pos;
use crate::decl::FuncRef;
use crate::scope::ScopeId;

/// Resolved source position, produced by the driver's `NodeInterpreter`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Position {
    pub filename: String,
    pub line: u32,
    pub column: u32,
}

impl Position {
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.line > 0
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.filename.is_empty() {
            if self.column > 0 {
                write!(f, "{}:{}", self.line, self.column)
            } else {
                write!(f, "{}", self.line)
            }
        } else if self.column > 0 {
            write!(f, "{}:{}:{}", self.filename, self.line, self.column)
        } else {
            write!(f, "{}:{}", self.filename, self.line)
        }
    }
}

/// A type or semantic error detected during construction.
///
/// Carries the active scope and function so a driver can report context.
/// Routed through `Config::handle_err` when set; surfaced by panic
/// otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeError {
    pub msg: String,
    pub pos: Option<Position>,
    pub scope: ScopeId,
    pub func: Option<FuncRef>,
}

impl std::error::Error for CodeError {}

impl std::fmt::Display for CodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.pos {
            Some(pos) if pos.is_valid() => write!(f, "{}: {}", pos, self.msg),
            _ => write!(f, "{}", self.msg),
        }
    }
}

/// Errors surfaced by the package-loading collaborator. The core only wraps
/// and forwards these; it never produces them itself.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The driver's context was cancelled during a load.
    #[error("cancelled")]
    Cancelled,

    /// The build-system query tool failed.
    #[error("exec `{cmd}` failed: {stderr}")]
    ExecCmd { cmd: String, stderr: String },
}

/// Reports position of a `Pos` and source text of a span-tagged node.
///
/// Only the driver knows the original program, so position reporting is
/// delegated through this trait.
pub trait NodeInterpreter {
    /// Resolves a byte offset to a file position.
    fn position(&self, _pos: Pos) -> Position {
        Position::default()
    }

    /// Loads the source text of a node and returns it with its position.
    fn load_expr(&self, _src: crate::ast::Span) -> (String, Position) {
        (String::new(), Position::default())
    }

    /// Describes the callee of a call node for diagnostics.
    fn caller(&self, _src: crate::ast::Span) -> String {
        "the function call".to_string()
    }
}

/// Default interpreter: no position information.
#[derive(Debug, Default, Clone, Copy)]
pub struct NodeInterp;

impl NodeInterpreter for NodeInterp {}
