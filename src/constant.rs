//! Compile-time constant values.
//!
//! Constants never touch host fixed-width arithmetic beyond the `i64` fast
//! path: everything wider goes through `num`'s arbitrary-precision integers
//! and rationals. Operations return `None` when an operand combination is
//! not foldable; the caller then simply leaves the result's `cval` unset.

use num::bigint::BigInt;
use num::complex::Complex64;
use num::rational::BigRational;
use num::traits::{Signed, ToPrimitive, Zero};

use crate::ast::{BinaryOp, UnaryOp};
use crate::typesys::BasicKind;

/// A compile-time constant in the arbitrary-precision model.
#[derive(Debug, Clone, PartialEq)]
pub enum Const {
    Bool(bool),
    Str(String),
    /// Small-integer fast path.
    Int(i64),
    Big(BigInt),
    Rat(BigRational),
    Float(f64),
    Complex(Complex64),
}

/// Numeric tower rank used to promote operand pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Rank {
    Int,
    Big,
    Rat,
    Float,
    Complex,
}

impl Const {
    pub fn is_integer(&self) -> bool {
        match self {
            Const::Int(_) | Const::Big(_) => true,
            Const::Rat(r) => r.is_integer(),
            Const::Float(f) => f.fract() == 0.0,
            _ => false,
        }
    }

    pub fn to_i64(&self) -> Option<i64> {
        match self {
            Const::Int(v) => Some(*v),
            Const::Big(b) => b.to_i64(),
            Const::Rat(r) if r.is_integer() => r.to_integer().to_i64(),
            Const::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    /// Exact big-integer form. Fails for non-integer rationals: the
    /// bigrat → bigint conversion is only defined on integers.
    pub fn to_bigint(&self) -> Option<BigInt> {
        match self {
            Const::Int(v) => Some(BigInt::from(*v)),
            Const::Big(b) => Some(b.clone()),
            Const::Rat(r) if r.is_integer() => Some(r.to_integer()),
            _ => None,
        }
    }

    /// Exact rational form. Floats rationalize exactly (binary floats are
    /// rationals); complex values have no rational form.
    pub fn to_bigrat(&self) -> Option<BigRational> {
        match self {
            Const::Int(v) => Some(BigRational::from_integer(BigInt::from(*v))),
            Const::Big(b) => Some(BigRational::from_integer(b.clone())),
            Const::Rat(r) => Some(r.clone()),
            Const::Float(f) => BigRational::from_float(*f),
            _ => None,
        }
    }

    pub fn to_f64(&self) -> Option<f64> {
        match self {
            Const::Int(v) => Some(*v as f64),
            Const::Big(b) => b.to_f64(),
            Const::Rat(r) => r.to_f64(),
            Const::Float(f) => Some(*f),
            _ => None,
        }
    }

    fn rank(&self) -> Option<Rank> {
        match self {
            Const::Int(_) => Some(Rank::Int),
            Const::Big(_) => Some(Rank::Big),
            Const::Rat(_) => Some(Rank::Rat),
            Const::Float(_) => Some(Rank::Float),
            Const::Complex(_) => Some(Rank::Complex),
            _ => None,
        }
    }

    /// Whether the constant is representable in the given basic kind
    /// (assignability of untyped constants).
    pub fn representable(&self, kind: BasicKind) -> bool {
        match self {
            Const::Bool(_) => kind.is_bool(),
            Const::Str(_) => kind.is_string(),
            Const::Complex(_) => kind.is_complex(),
            Const::Float(_) | Const::Rat(_) => {
                if kind.is_complex() || kind.is_float() {
                    true
                } else if kind.is_integer() {
                    self.is_integer() && self.int_fits(kind)
                } else {
                    false
                }
            }
            Const::Int(_) | Const::Big(_) => {
                if kind.is_complex() || kind.is_float() {
                    true
                } else if kind.is_integer() {
                    self.int_fits(kind)
                } else {
                    false
                }
            }
        }
    }

    fn int_fits(&self, kind: BasicKind) -> bool {
        let v = match self.to_bigint() {
            Some(v) => v,
            None => return false,
        };
        let bits: usize = match kind {
            BasicKind::Int8 | BasicKind::Uint8 => 8,
            BasicKind::Int16 | BasicKind::Uint16 => 16,
            BasicKind::Int32 | BasicKind::Uint32 | BasicKind::UntypedRune => 32,
            _ => 64,
        };
        if kind.is_unsigned() {
            !v.is_negative() && v.bits() <= bits as u64
        } else {
            // Two's complement range check.
            let min = -(BigInt::from(1) << (bits - 1));
            let max = (BigInt::from(1) << (bits - 1)) - 1;
            v >= min && v <= max
        }
    }
}

fn promote(a: &Const, b: &Const) -> Option<(Const, Const, Rank)> {
    let ra = a.rank()?;
    let rb = b.rank()?;
    let r = ra.max(rb);
    let lift = |c: &Const| -> Option<Const> {
        Some(match r {
            Rank::Int => c.clone(),
            Rank::Big => Const::Big(c.to_bigint()?),
            Rank::Rat => Const::Rat(c.to_bigrat()?),
            Rank::Float => Const::Float(c.to_f64()?),
            Rank::Complex => match c {
                Const::Complex(z) => Const::Complex(*z),
                other => Const::Complex(Complex64::new(other.to_f64()?, 0.0)),
            },
        })
    };
    Some((lift(a)?, lift(b)?, r))
}

/// Folds a binary operation over two constants.
pub fn binary_op(op: BinaryOp, a: &Const, b: &Const) -> Option<Const> {
    use BinaryOp::*;
    match op {
        LAnd | LOr => {
            let (Const::Bool(x), Const::Bool(y)) = (a, b) else {
                return None;
            };
            return Some(Const::Bool(if op == LAnd { *x && *y } else { *x || *y }));
        }
        Lsh | Rsh => return shift(op, a, b),
        _ => {}
    }

    if let (Const::Str(x), Const::Str(y)) = (a, b) {
        return match op {
            Add => Some(Const::Str(format!("{x}{y}"))),
            Eq => Some(Const::Bool(x == y)),
            Ne => Some(Const::Bool(x != y)),
            Lt => Some(Const::Bool(x < y)),
            Le => Some(Const::Bool(x <= y)),
            Gt => Some(Const::Bool(x > y)),
            Ge => Some(Const::Bool(x >= y)),
            _ => None,
        };
    }

    if let (Const::Bool(x), Const::Bool(y)) = (a, b) {
        return match op {
            Eq => Some(Const::Bool(x == y)),
            Ne => Some(Const::Bool(x != y)),
            _ => None,
        };
    }

    let (pa, pb, rank) = promote(a, b)?;
    if op.is_comparison() {
        return compare(op, &pa, &pb, rank);
    }
    match rank {
        Rank::Int => int_op(op, &pa, &pb),
        Rank::Big => big_op(op, &pa, &pb),
        Rank::Rat => rat_op(op, &pa, &pb),
        Rank::Float => float_op(op, &pa, &pb),
        Rank::Complex => complex_op(op, &pa, &pb),
    }
}

/// Folds a unary operation over one constant.
pub fn unary_op(op: UnaryOp, a: &Const) -> Option<Const> {
    match (op, a) {
        (UnaryOp::Pos, c) if c.rank().is_some() => Some(c.clone()),
        (UnaryOp::Neg, Const::Int(v)) => match v.checked_neg() {
            Some(n) => Some(Const::Int(n)),
            None => Some(Const::Big(-BigInt::from(*v))),
        },
        (UnaryOp::Neg, Const::Big(b)) => Some(Const::Big(-b)),
        (UnaryOp::Neg, Const::Rat(r)) => Some(Const::Rat(-r)),
        (UnaryOp::Neg, Const::Float(f)) => Some(Const::Float(-f)),
        (UnaryOp::Neg, Const::Complex(z)) => Some(Const::Complex(-z)),
        (UnaryOp::Not, Const::Int(v)) => Some(Const::Int(!v)),
        (UnaryOp::Not, Const::Big(b)) => Some(Const::Big(!b.clone())),
        (UnaryOp::LNot, Const::Bool(v)) => Some(Const::Bool(!v)),
        _ => None,
    }
}

fn shift(op: BinaryOp, a: &Const, b: &Const) -> Option<Const> {
    let n = b.to_i64()?;
    if n < 0 || n > 1 << 20 {
        return None;
    }
    let n = n as usize;
    let v = a.to_bigint()?;
    let r = match op {
        BinaryOp::Lsh => v << n,
        BinaryOp::Rsh => v >> n,
        _ => unreachable!(),
    };
    Some(norm_big(r))
}

/// Shrinks a big integer back to the `i64` fast path when it fits.
fn norm_big(v: BigInt) -> Const {
    match v.to_i64() {
        Some(small) => Const::Int(small),
        None => Const::Big(v),
    }
}

fn int_op(op: BinaryOp, a: &Const, b: &Const) -> Option<Const> {
    use BinaryOp::*;
    let (Const::Int(x), Const::Int(y)) = (a, b) else {
        return None;
    };
    let (x, y) = (*x, *y);
    let wide = |r: Option<i64>, f: fn(BigInt, BigInt) -> BigInt| match r {
        Some(v) => Const::Int(v),
        None => norm_big(f(BigInt::from(x), BigInt::from(y))),
    };
    Some(match op {
        Add => wide(x.checked_add(y), |a, b| a + b),
        Sub => wide(x.checked_sub(y), |a, b| a - b),
        Mul => wide(x.checked_mul(y), |a, b| a * b),
        Quo => {
            if y == 0 {
                return None;
            }
            Const::Int(x / y)
        }
        Rem => {
            if y == 0 {
                return None;
            }
            Const::Int(x % y)
        }
        And => Const::Int(x & y),
        Or => Const::Int(x | y),
        Xor => Const::Int(x ^ y),
        AndNot => Const::Int(x & !y),
        _ => return None,
    })
}

fn big_op(op: BinaryOp, a: &Const, b: &Const) -> Option<Const> {
    use BinaryOp::*;
    let x = a.to_bigint()?;
    let y = b.to_bigint()?;
    Some(match op {
        Add => norm_big(x + y),
        Sub => norm_big(x - y),
        Mul => norm_big(x * y),
        Quo => {
            if y.is_zero() {
                return None;
            }
            norm_big(x / y)
        }
        Rem => {
            if y.is_zero() {
                return None;
            }
            norm_big(x % y)
        }
        And => norm_big(x & y),
        Or => norm_big(x | y),
        Xor => norm_big(x ^ y),
        AndNot => norm_big(x & !y),
        _ => return None,
    })
}

fn rat_op(op: BinaryOp, a: &Const, b: &Const) -> Option<Const> {
    use BinaryOp::*;
    let x = a.to_bigrat()?;
    let y = b.to_bigrat()?;
    Some(Const::Rat(match op {
        Add => x + y,
        Sub => x - y,
        Mul => x * y,
        Quo => {
            if y.is_zero() {
                return None;
            }
            x / y
        }
        _ => return None,
    }))
}

fn float_op(op: BinaryOp, a: &Const, b: &Const) -> Option<Const> {
    use BinaryOp::*;
    let x = a.to_f64()?;
    let y = b.to_f64()?;
    Some(Const::Float(match op {
        Add => x + y,
        Sub => x - y,
        Mul => x * y,
        Quo => {
            if y == 0.0 {
                return None;
            }
            x / y
        }
        _ => return None,
    }))
}

fn complex_op(op: BinaryOp, a: &Const, b: &Const) -> Option<Const> {
    use BinaryOp::*;
    let as_z = |c: &Const| -> Option<Complex64> {
        match c {
            Const::Complex(z) => Some(*z),
            other => Some(Complex64::new(other.to_f64()?, 0.0)),
        }
    };
    let x = as_z(a)?;
    let y = as_z(b)?;
    Some(Const::Complex(match op {
        Add => x + y,
        Sub => x - y,
        Mul => x * y,
        Quo => x / y,
        _ => return None,
    }))
}

fn compare(op: BinaryOp, a: &Const, b: &Const, rank: Rank) -> Option<Const> {
    use std::cmp::Ordering;
    let ord = match rank {
        Rank::Int => {
            let (Const::Int(x), Const::Int(y)) = (a, b) else {
                return None;
            };
            x.cmp(y)
        }
        Rank::Big => a.to_bigint()?.cmp(&b.to_bigint()?),
        Rank::Rat => a.to_bigrat()?.cmp(&b.to_bigrat()?),
        Rank::Float => a.to_f64()?.partial_cmp(&b.to_f64()?)?,
        Rank::Complex => {
            let eq = match (a, b) {
                (Const::Complex(x), Const::Complex(y)) => x == y,
                _ => return None,
            };
            return match op {
                BinaryOp::Eq => Some(Const::Bool(eq)),
                BinaryOp::Ne => Some(Const::Bool(!eq)),
                _ => None,
            };
        }
    };
    Some(Const::Bool(match op {
        BinaryOp::Lt => ord == Ordering::Less,
        BinaryOp::Le => ord != Ordering::Greater,
        BinaryOp::Gt => ord == Ordering::Greater,
        BinaryOp::Ge => ord != Ordering::Less,
        BinaryOp::Eq => ord == Ordering::Equal,
        BinaryOp::Ne => ord != Ordering::Equal,
        _ => return None,
    }))
}
