//! The builder's type universe.
//!
//! Types are interned in a `TypeStore` and addressed by a compact `Ty` id.
//! Identity is id equality: basics and element-composites (slices, maps,
//! pointers, channels, arrays) are hash-consed, so structurally-equal
//! composites of identical components share one id, while named types,
//! structs, interfaces, and signatures get a fresh id per definition.
//! Assignability (see `assign.rs`) uses structural comparison only below
//! the top level.
//!
//! A named type's underlying may stay unresolved until first structural
//! use; the builder then invokes the driver's `load_named` callback and
//! reads it again. The slot is set at most once.

use std::collections::HashMap;

use crate::ast::{ChanDir, ExprId, Interner, SpecId, Symbol};
use crate::builtin::Instr;
use crate::scope::{Obj, ScopeTree};

// =============================================================================
// Ids
// =============================================================================

/// Compact type id. Identity of types follows id identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Ty(u32);

impl Ty {
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

// =============================================================================
// Kinds
// =============================================================================

/// Basic kinds, typed and untyped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BasicKind {
    Bool,
    Int,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Uintptr,
    Float32,
    Float64,
    Complex64,
    Complex128,
    String,
    UnsafePointer,

    UntypedBool,
    UntypedInt,
    UntypedRune,
    UntypedFloat,
    UntypedComplex,
    UntypedString,
    UntypedNil,
}

impl BasicKind {
    pub const fn name(self) -> &'static str {
        match self {
            BasicKind::Bool => "bool",
            BasicKind::Int => "int",
            BasicKind::Int8 => "int8",
            BasicKind::Int16 => "int16",
            BasicKind::Int32 => "int32",
            BasicKind::Int64 => "int64",
            BasicKind::Uint => "uint",
            BasicKind::Uint8 => "uint8",
            BasicKind::Uint16 => "uint16",
            BasicKind::Uint32 => "uint32",
            BasicKind::Uint64 => "uint64",
            BasicKind::Uintptr => "uintptr",
            BasicKind::Float32 => "float32",
            BasicKind::Float64 => "float64",
            BasicKind::Complex64 => "complex64",
            BasicKind::Complex128 => "complex128",
            BasicKind::String => "string",
            BasicKind::UnsafePointer => "unsafe.Pointer",
            BasicKind::UntypedBool => "untyped bool",
            BasicKind::UntypedInt => "untyped int",
            BasicKind::UntypedRune => "untyped rune",
            BasicKind::UntypedFloat => "untyped float",
            BasicKind::UntypedComplex => "untyped complex",
            BasicKind::UntypedString => "untyped string",
            BasicKind::UntypedNil => "untyped nil",
        }
    }

    #[inline]
    pub const fn is_untyped(self) -> bool {
        matches!(
            self,
            BasicKind::UntypedBool
                | BasicKind::UntypedInt
                | BasicKind::UntypedRune
                | BasicKind::UntypedFloat
                | BasicKind::UntypedComplex
                | BasicKind::UntypedString
                | BasicKind::UntypedNil
        )
    }

    #[inline]
    pub const fn is_integer(self) -> bool {
        matches!(
            self,
            BasicKind::Int
                | BasicKind::Int8
                | BasicKind::Int16
                | BasicKind::Int32
                | BasicKind::Int64
                | BasicKind::Uint
                | BasicKind::Uint8
                | BasicKind::Uint16
                | BasicKind::Uint32
                | BasicKind::Uint64
                | BasicKind::Uintptr
                | BasicKind::UntypedInt
                | BasicKind::UntypedRune
        )
    }

    #[inline]
    pub const fn is_unsigned(self) -> bool {
        matches!(
            self,
            BasicKind::Uint
                | BasicKind::Uint8
                | BasicKind::Uint16
                | BasicKind::Uint32
                | BasicKind::Uint64
                | BasicKind::Uintptr
        )
    }

    #[inline]
    pub const fn is_float(self) -> bool {
        matches!(
            self,
            BasicKind::Float32 | BasicKind::Float64 | BasicKind::UntypedFloat
        )
    }

    #[inline]
    pub const fn is_complex(self) -> bool {
        matches!(
            self,
            BasicKind::Complex64 | BasicKind::Complex128 | BasicKind::UntypedComplex
        )
    }

    #[inline]
    pub const fn is_numeric(self) -> bool {
        self.is_integer() || self.is_float() || self.is_complex()
    }

    #[inline]
    pub const fn is_string(self) -> bool {
        matches!(self, BasicKind::String | BasicKind::UntypedString)
    }

    #[inline]
    pub const fn is_bool(self) -> bool {
        matches!(self, BasicKind::Bool | BasicKind::UntypedBool)
    }

    /// The default typed kind an untyped constant assumes without context.
    pub const fn default_kind(self) -> BasicKind {
        match self {
            BasicKind::UntypedBool => BasicKind::Bool,
            BasicKind::UntypedInt => BasicKind::Int,
            BasicKind::UntypedRune => BasicKind::Int32,
            BasicKind::UntypedFloat => BasicKind::Float64,
            BasicKind::UntypedComplex => BasicKind::Complex128,
            BasicKind::UntypedString => BasicKind::String,
            k => k,
        }
    }

    /// Rank in the untyped numeric promotion ladder
    /// (int → rune → float → complex); `None` for non-numeric kinds.
    pub const fn untyped_rank(self) -> Option<u8> {
        match self {
            BasicKind::UntypedInt => Some(0),
            BasicKind::UntypedRune => Some(1),
            BasicKind::UntypedFloat => Some(2),
            BasicKind::UntypedComplex => Some(3),
            _ => None,
        }
    }
}

/// Method on a named type or interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Method {
    pub name: Symbol,
    /// Always a `TypeKind::Signature`.
    pub sig: Ty,
}

/// Struct field metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructField {
    pub name: Symbol,
    pub ty: Ty,
    pub embedded: bool,
    pub tag: Option<String>,
}

/// AST slots promised by an unbound placeholder type, patched when the
/// concrete type becomes known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeSlot {
    /// The `typ` field of a value spec.
    ValueSpec(SpecId),
    /// The `typ` field of a composite literal expression.
    CompositeLit(ExprId),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeKind {
    Basic(BasicKind),

    /// `len < 0` means "inferred from literal".
    Array { elem: Ty, len: i64 },

    Slice { elem: Ty },

    Map { key: Ty, elem: Ty },

    Chan { dir: ChanDir, elem: Ty },

    Pointer { elem: Ty },

    Struct { fields: Vec<StructField> },

    /// `complete` is set once the method set is final.
    Interface { methods: Vec<Method>, complete: bool },

    /// Parameters and results are variable objects, mirroring the way
    /// scopes receive them on function-body open.
    Signature {
        recv: Option<Obj>,
        params: Vec<Obj>,
        results: Vec<Obj>,
        variadic: bool,
    },

    /// User-defined type; `underlying` resolves lazily through the
    /// driver's loader and is set at most once.
    Named {
        pkg: Option<Symbol>,
        name: Symbol,
        underlying: Option<Ty>,
        methods: Vec<Method>,
    },

    /// Multi-value result type; never nameable.
    Tuple { items: Vec<Ty> },

    /// Internal L-value wrapper: "this operand denotes a storage location
    /// of `elem`". Never escapes into a final AST node.
    Ref { elem: Ty },

    /// First-class type value pushed by `typ()`.
    TypeOf { ty: Ty },

    /// Placeholder filled in at the first typed use.
    Unbound {
        bound: Option<Ty>,
        slots: Vec<TypeSlot>,
    },

    /// Index expression on an unbound map; resolved when assigned.
    UnboundMapElem { key: Ty, map: Ty },

    /// Builtin instruction posing as a callable (operator and intrinsic
    /// objects in the builtin package).
    Instr(Instr),

    /// Marker on a receiver operand re-pushed by pseudo-method member
    /// resolution; `call` unwraps it and shifts the callee by one.
    BtiSelf { ty: Ty },
}

// =============================================================================
// Store
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum InternKey {
    Basic(BasicKind),
    Slice(Ty),
    Map(Ty, Ty),
    Chan(ChanDir, Ty),
    Pointer(Ty),
    Array(Ty, i64),
    Ref(Ty),
    TypeOf(Ty),
}

/// Arena + intern table for all types of one builder instance.
#[derive(Debug, Default)]
pub struct TypeStore {
    kinds: Vec<TypeKind>,
    interned: HashMap<InternKey, Ty>,
}

impl TypeStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    fn alloc(&mut self, kind: TypeKind) -> Ty {
        let ty = Ty(self.kinds.len() as u32);
        self.kinds.push(kind);
        ty
    }

    #[inline]
    fn intern(&mut self, key: InternKey, kind: TypeKind) -> Ty {
        if let Some(&ty) = self.interned.get(&key) {
            return ty;
        }
        let ty = self.alloc(kind);
        self.interned.insert(key, ty);
        ty
    }

    #[inline]
    pub fn kind(&self, ty: Ty) -> &TypeKind {
        &self.kinds[ty.0 as usize]
    }

    #[inline]
    pub fn kind_mut(&mut self, ty: Ty) -> &mut TypeKind {
        &mut self.kinds[ty.0 as usize]
    }

    // Constructors

    #[inline]
    pub fn basic(&mut self, k: BasicKind) -> Ty {
        self.intern(InternKey::Basic(k), TypeKind::Basic(k))
    }

    #[inline]
    pub fn slice_of(&mut self, elem: Ty) -> Ty {
        self.intern(InternKey::Slice(elem), TypeKind::Slice { elem })
    }

    #[inline]
    pub fn map_of(&mut self, key: Ty, elem: Ty) -> Ty {
        self.intern(InternKey::Map(key, elem), TypeKind::Map { key, elem })
    }

    #[inline]
    pub fn chan_of(&mut self, dir: ChanDir, elem: Ty) -> Ty {
        self.intern(InternKey::Chan(dir, elem), TypeKind::Chan { dir, elem })
    }

    #[inline]
    pub fn pointer_to(&mut self, elem: Ty) -> Ty {
        self.intern(InternKey::Pointer(elem), TypeKind::Pointer { elem })
    }

    #[inline]
    pub fn array_of(&mut self, elem: Ty, len: i64) -> Ty {
        self.intern(InternKey::Array(elem, len), TypeKind::Array { elem, len })
    }

    #[inline]
    pub fn ref_of(&mut self, elem: Ty) -> Ty {
        self.intern(InternKey::Ref(elem), TypeKind::Ref { elem })
    }

    #[inline]
    pub fn type_of(&mut self, ty: Ty) -> Ty {
        self.intern(InternKey::TypeOf(ty), TypeKind::TypeOf { ty })
    }

    pub fn struct_of(&mut self, fields: Vec<StructField>) -> Ty {
        self.alloc(TypeKind::Struct { fields })
    }

    pub fn interface_of(&mut self, methods: Vec<Method>, complete: bool) -> Ty {
        self.alloc(TypeKind::Interface { methods, complete })
    }

    pub fn signature(
        &mut self,
        recv: Option<Obj>,
        params: Vec<Obj>,
        results: Vec<Obj>,
        variadic: bool,
    ) -> Ty {
        self.alloc(TypeKind::Signature {
            recv,
            params,
            results,
            variadic,
        })
    }

    pub fn named(&mut self, pkg: Option<Symbol>, name: Symbol, underlying: Option<Ty>) -> Ty {
        self.alloc(TypeKind::Named {
            pkg,
            name,
            underlying,
            methods: Vec::new(),
        })
    }

    pub fn tuple(&mut self, items: Vec<Ty>) -> Ty {
        self.alloc(TypeKind::Tuple { items })
    }

    pub fn unbound(&mut self) -> Ty {
        self.alloc(TypeKind::Unbound {
            bound: None,
            slots: Vec::new(),
        })
    }

    pub fn unbound_map_elem(&mut self, key: Ty, map: Ty) -> Ty {
        self.alloc(TypeKind::UnboundMapElem { key, map })
    }

    pub fn instr(&mut self, instr: Instr) -> Ty {
        self.alloc(TypeKind::Instr(instr))
    }

    pub fn bti_self(&mut self, ty: Ty) -> Ty {
        self.alloc(TypeKind::BtiSelf { ty })
    }

    // Named type mutation

    /// Sets a named type's underlying. The slot is write-once; a second
    /// call with a different value is a driver bug.
    pub fn set_underlying(&mut self, named: Ty, underlying: Ty) {
        match self.kind_mut(named) {
            TypeKind::Named {
                underlying: slot, ..
            } => {
                if let Some(prev) = *slot {
                    assert_eq!(prev, underlying, "named type loaded twice with different underlying");
                    return;
                }
                *slot = Some(underlying);
            }
            _ => panic!("set_underlying: not a named type"),
        }
    }

    pub fn add_method(&mut self, ty: Ty, name: Symbol, sig: Ty) {
        match self.kind_mut(ty) {
            TypeKind::Named { methods, .. } => methods.push(Method { name, sig }),
            TypeKind::Interface { methods, .. } => methods.push(Method { name, sig }),
            _ => panic!("add_method: not a named or interface type"),
        }
    }

    pub fn complete_interface(&mut self, ty: Ty) {
        if let TypeKind::Interface { complete, .. } = self.kind_mut(ty) {
            *complete = true;
        }
    }

    // Queries

    #[inline]
    pub fn basic_kind(&self, ty: Ty) -> Option<BasicKind> {
        match self.kind(ty) {
            TypeKind::Basic(k) => Some(*k),
            _ => None,
        }
    }

    #[inline]
    pub fn is_untyped(&self, ty: Ty) -> bool {
        matches!(self.kind(ty), TypeKind::Basic(k) if k.is_untyped())
    }

    #[inline]
    pub fn is_nil(&self, ty: Ty) -> bool {
        matches!(self.kind(ty), TypeKind::Basic(BasicKind::UntypedNil))
    }

    /// Strips one `Ref` wrapper, if present.
    #[inline]
    pub fn deref_ref(&self, ty: Ty) -> Ty {
        match self.kind(ty) {
            TypeKind::Ref { elem } => *elem,
            _ => ty,
        }
    }

    /// One-step auto-deref of a pointer type.
    #[inline]
    pub fn indirect(&self, ty: Ty) -> Ty {
        match self.kind(ty) {
            TypeKind::Pointer { elem } => *elem,
            _ => ty,
        }
    }

    /// Structural type without triggering the lazy loader. Returns `None`
    /// for a named type that has not been loaded yet.
    pub fn underlying_raw(&self, ty: Ty) -> Option<Ty> {
        match self.kind(ty) {
            TypeKind::Named { underlying, .. } => *underlying,
            _ => Some(ty),
        }
    }

    pub fn named_methods(&self, ty: Ty) -> &[Method] {
        match self.kind(ty) {
            TypeKind::Named { methods, .. } => methods,
            TypeKind::Interface { methods, .. } => methods,
            _ => &[],
        }
    }

    pub fn lookup_method(&self, ty: Ty, name: Symbol) -> Option<Method> {
        self.named_methods(ty).iter().copied().find(|m| m.name == name)
    }

    /// Result type of calling a signature: `Tuple` for zero or several
    /// results, the single result type otherwise.
    pub fn results_type(&mut self, sig: Ty, scopes: &ScopeTree) -> Ty {
        let results: Vec<Ty> = match self.kind(sig) {
            TypeKind::Signature { results, .. } => {
                results.iter().map(|&o| scopes.obj(o).ty).collect()
            }
            _ => panic!("results_type: not a signature"),
        };
        match results.len() {
            1 => results[0],
            _ => self.tuple(results),
        }
    }

    // Display

    /// Renders a type the way Go diagnostics spell it.
    pub fn display(&self, ty: Ty, scopes: &ScopeTree, it: &Interner) -> String {
        match self.kind(ty) {
            TypeKind::Basic(k) => k.name().to_string(),
            TypeKind::Array { elem, len } => {
                if *len < 0 {
                    format!("[...]{}", self.display(*elem, scopes, it))
                } else {
                    format!("[{}]{}", len, self.display(*elem, scopes, it))
                }
            }
            TypeKind::Slice { elem } => format!("[]{}", self.display(*elem, scopes, it)),
            TypeKind::Map { key, elem } => format!(
                "map[{}]{}",
                self.display(*key, scopes, it),
                self.display(*elem, scopes, it)
            ),
            TypeKind::Chan { dir, elem } => match dir {
                ChanDir::Both => format!("chan {}", self.display(*elem, scopes, it)),
                ChanDir::Send => format!("chan<- {}", self.display(*elem, scopes, it)),
                ChanDir::Recv => format!("<-chan {}", self.display(*elem, scopes, it)),
            },
            TypeKind::Pointer { elem } => format!("*{}", self.display(*elem, scopes, it)),
            TypeKind::Struct { fields } => {
                let mut s = String::from("struct{");
                for (i, f) in fields.iter().enumerate() {
                    if i > 0 {
                        s.push_str("; ");
                    }
                    if !f.embedded {
                        s.push_str(it.resolve(f.name));
                        s.push(' ');
                    }
                    s.push_str(&self.display(f.ty, scopes, it));
                }
                s.push('}');
                s
            }
            TypeKind::Interface { methods, .. } => {
                if methods.is_empty() {
                    "interface{}".to_string()
                } else {
                    let mut s = String::from("interface{");
                    for (i, m) in methods.iter().enumerate() {
                        if i > 0 {
                            s.push_str("; ");
                        }
                        s.push_str(it.resolve(m.name));
                        s.push_str(self.display(m.sig, scopes, it).trim_start_matches("func"));
                    }
                    s.push('}');
                    s
                }
            }
            TypeKind::Signature {
                params,
                results,
                variadic,
                ..
            } => {
                let mut s = String::from("func(");
                for (i, &p) in params.iter().enumerate() {
                    if i > 0 {
                        s.push_str(", ");
                    }
                    if *variadic && i + 1 == params.len() {
                        s.push_str("...");
                        let pt = scopes.obj(p).ty;
                        if let TypeKind::Slice { elem } = self.kind(pt) {
                            s.push_str(&self.display(*elem, scopes, it));
                            continue;
                        }
                    }
                    s.push_str(&self.display(scopes.obj(p).ty, scopes, it));
                }
                s.push(')');
                match results.len() {
                    0 => {}
                    1 => {
                        s.push(' ');
                        s.push_str(&self.display(scopes.obj(results[0]).ty, scopes, it));
                    }
                    _ => {
                        s.push_str(" (");
                        for (i, &r) in results.iter().enumerate() {
                            if i > 0 {
                                s.push_str(", ");
                            }
                            s.push_str(&self.display(scopes.obj(r).ty, scopes, it));
                        }
                        s.push(')');
                    }
                }
                s
            }
            TypeKind::Named { pkg, name, .. } => match pkg {
                Some(p) => format!("{}.{}", it.resolve(*p), it.resolve(*name)),
                None => it.resolve(*name).to_string(),
            },
            TypeKind::Tuple { items } => {
                let mut s = String::from("(");
                for (i, &t) in items.iter().enumerate() {
                    if i > 0 {
                        s.push_str(", ");
                    }
                    s.push_str(&self.display(t, scopes, it));
                }
                s.push(')');
                s
            }
            TypeKind::Ref { elem } => self.display(*elem, scopes, it),
            TypeKind::TypeOf { ty } => format!("type {}", self.display(*ty, scopes, it)),
            TypeKind::Unbound { bound, .. } => match bound {
                Some(t) => self.display(*t, scopes, it),
                None => "<unbound>".to_string(),
            },
            TypeKind::UnboundMapElem { .. } => "<unbound map element>".to_string(),
            TypeKind::Instr(instr) => format!("<builtin {:?}>", instr),
            TypeKind::BtiSelf { ty } => self.display(*ty, scopes, it),
        }
    }
}
