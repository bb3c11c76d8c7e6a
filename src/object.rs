//! Tagged-object model and per-type dispatch.
//!
//! Every heap object is a LEB128 type id followed by a type-specific
//! payload. The id is drawn from the closed [`Id`] enumeration; dispatch is
//! a match on the id, which is the only polymorphic surface in the engine.

use crate::command;
use crate::complex;
use crate::leb128;
use crate::list;
use crate::number;
use crate::renderer::Renderer;
use crate::runtime::Runtime;
use crate::text;
use crate::Result;

/// Reference to an object: a byte offset into the arena.
///
/// Stack slots, return-stack slots and safe pointers all hold this
/// representation; the collector rewrites them when objects move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjRef(pub u32);

impl ObjRef {
    pub const NULL: ObjRef = ObjRef(u32::MAX);

    pub fn is_null(self) -> bool {
        self.0 == u32::MAX
    }

    pub fn addr(self) -> usize {
        self.0 as usize
    }

    pub(crate) fn at(addr: usize) -> ObjRef {
        ObjRef(addr as u32)
    }
}

/// The closed set of type ids.
///
/// Data objects come first; every built-in command is its own id with an
/// empty payload. Discriminants are the wire encoding and must not be
/// reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Id {
    Integer = 0,
    NegInteger,
    BinInteger,
    OctInteger,
    DecInteger,
    HexInteger,
    Bignum,
    NegBignum,
    Fraction,
    NegFraction,
    Decimal,
    Rectangular,
    Polar,
    Text,
    Symbol,
    List,
    Program,
    Block,

    // Stack commands
    Dup,
    Drop,
    Swap,
    Over,
    Rot,
    Depth,
    ClearStack,

    // Arithmetic commands
    Add,
    Sub,
    Mul,
    Div,
    Neg,
    Inv,
    Sqrt,
    Sin,
    Cos,
    Tan,

    // Control and globals
    Eval,
    Sto,
    Rcl,
    Purge,

    // Mode commands
    Std,
    Fix,
    Sci,
    Eng,
    Deg,
    Rad,
    Grad,
    LowerCase,
    UpperCase,
    Capitalized,
    LongForm,
    DecimalDot,
    DecimalComma,
    TrailingDecimal,
    NoTrailingDecimal,
    Precision,
    StandardExponent,
    FancyExponent,
    ClassicExponent,
    Bin,
    Oct,
    Dec,
    Hex,
    Base,
    StoreWordSize,
    RecallWordSize,
}

pub const NUM_IDS: u32 = Id::RecallWordSize as u32 + 1;

impl Id {
    pub fn from_u32(value: u32) -> Option<Id> {
        if value < NUM_IDS {
            // Discriminants are sequential from zero, so any value below
            // NUM_IDS names a variant.
            Some(unsafe { std::mem::transmute::<u8, Id>(value as u8) })
        } else {
            None
        }
    }

    pub fn is_command(self) -> bool {
        self as u32 >= Id::Dup as u32
    }

    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            Id::Integer
                | Id::NegInteger
                | Id::BinInteger
                | Id::OctInteger
                | Id::DecInteger
                | Id::HexInteger
                | Id::Bignum
                | Id::NegBignum
                | Id::Fraction
                | Id::NegFraction
                | Id::Decimal
        )
    }

    pub fn is_based(self) -> bool {
        matches!(
            self,
            Id::BinInteger | Id::OctInteger | Id::DecInteger | Id::HexInteger
        )
    }
}

/// Read the type id of the object at `o`.
pub fn id_of(rt: &Runtime, o: ObjRef) -> Id {
    let (value, _) = leb128::read(rt.mem_from(o.addr())).unwrap_or((0, 1));
    Id::from_u32(value as u32).unwrap_or(Id::Integer)
}

/// Address of the payload, immediately after the id.
pub fn payload(rt: &Runtime, o: ObjRef) -> usize {
    let (_, idlen) = leb128::read(rt.mem_from(o.addr())).unwrap_or((0, 1));
    o.addr() + idlen
}

/// Total encoded size of the object at `o`, id included.
///
/// The collector relies on this being exact for every well-formed object:
/// `skip(o) = o + size(o)` is how the heap is walked.
pub fn size(rt: &Runtime, o: ObjRef) -> usize {
    let addr = o.addr();
    let (value, idlen) = leb128::read(rt.mem_from(addr)).unwrap_or((0, 1));
    let id = match Id::from_u32(value as u32) {
        Some(id) => id,
        None => return idlen,
    };
    let body = addr + idlen;
    match id {
        Id::Integer
        | Id::NegInteger
        | Id::BinInteger
        | Id::OctInteger
        | Id::DecInteger
        | Id::HexInteger => {
            let (_, n) = leb128::read(rt.mem_from(body)).unwrap_or((0, 1));
            idlen + n
        }
        Id::Bignum | Id::NegBignum => {
            let (count, n) = leb128::read(rt.mem_from(body)).unwrap_or((0, 1));
            idlen + n + count as usize
        }
        Id::Fraction | Id::NegFraction => {
            let (_, n1) = leb128::read(rt.mem_from(body)).unwrap_or((0, 1));
            let (_, n2) = leb128::read(rt.mem_from(body + n1)).unwrap_or((0, 1));
            idlen + n1 + n2
        }
        Id::Decimal => idlen + number::DECIMAL_PAYLOAD,
        Id::Rectangular | Id::Polar => {
            let x = ObjRef::at(body);
            let xs = size(rt, x);
            let ys = size(rt, ObjRef::at(body + xs));
            idlen + xs + ys
        }
        Id::Text | Id::Symbol => {
            let (count, n) = leb128::read(rt.mem_from(body)).unwrap_or((0, 1));
            idlen + n + count as usize
        }
        Id::List | Id::Program | Id::Block => {
            let (count, n) = leb128::read(rt.mem_from(body)).unwrap_or((0, 1));
            idlen + n + count as usize
        }
        _ => idlen, // commands carry no payload
    }
}

/// Address immediately after the object at `o`.
pub fn skip(rt: &Runtime, o: ObjRef) -> ObjRef {
    ObjRef::at(o.addr() + size(rt, o))
}

fn eval_trace_enabled() -> bool {
    std::env::var("RPL_EVAL_TRACE").is_ok()
}

/// Produce the object's effect on the stack.
///
/// Passive data pushes itself; blocks execute; commands run their action.
pub fn evaluate(rt: &mut Runtime, o: ObjRef) -> Result<()> {
    let id = id_of(rt, o);
    if eval_trace_enabled() {
        eprintln!("[eval] {:?} at {:#x}", id, o.0);
    }
    match id {
        Id::Block => list::run(rt, o),
        _ if id.is_command() => command::run(rt, id),
        _ => rt.push(o),
    }
}

/// Like [`evaluate`], but containers iterate instead of pushing.
pub fn execute(rt: &mut Runtime, o: ObjRef) -> Result<()> {
    match id_of(rt, o) {
        Id::Program | Id::Block => list::run(rt, o),
        _ => evaluate(rt, o),
    }
}

/// Append the textual form of `o` to the renderer.
pub fn render(rt: &Runtime, o: ObjRef, r: &mut Renderer) {
    crate::renderer::render_object(rt, o, r);
}

/// Semantic equality: numeric values compare numerically, composites
/// compare child by child, everything else compares by encoding.
pub fn equal(rt: &Runtime, a: ObjRef, b: ObjRef) -> bool {
    let (ia, ib) = (id_of(rt, a), id_of(rt, b));
    let (sa, sb) = (size(rt, a), size(rt, b));
    if rt.slice(a.addr(), sa) == rt.slice(b.addr(), sb) {
        return ia == ib;
    }
    if ia.is_numeric() && ib.is_numeric() {
        return number::eq_numeric(rt, a, b);
    }
    if ia != ib {
        return false;
    }
    match ia {
        Id::Rectangular | Id::Polar => {
            let (ax, ay) = complex::parts(rt, a);
            let (bx, by) = complex::parts(rt, b);
            equal(rt, ax, bx) && equal(rt, ay, by)
        }
        Id::List | Id::Program | Id::Block => {
            let ca = list::children(rt, a);
            let cb = list::children(rt, b);
            ca.len() == cb.len()
                && ca.iter().zip(cb.iter()).all(|(&x, &y)| equal(rt, x, y))
        }
        Id::Text => text::text_value(rt, a) == text::text_value(rt, b),
        Id::Symbol => text::symbol_value(rt, a) == text::symbol_value(rt, b),
        _ => false,
    }
}

/// Read the stack argument at `level`, requiring the given id.
///
/// This is the typed-argument helper the commands use: a mismatch reports
/// nothing and returns `None` so the caller can choose the error.
pub fn typed_arg(rt: &Runtime, level: usize, want: Id) -> Option<ObjRef> {
    let o = rt.peek(level)?;
    (id_of(rt, o) == want).then_some(o)
}
