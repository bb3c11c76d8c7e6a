//! Complex numbers, rectangular (`x;y`) and polar (`x∡y`).
//!
//! The payload is the two numeric parts packed inline, so a complex moves
//! as one byte range like every other composite.

use crate::object::{self, Id, ObjRef};
use crate::runtime::Runtime;
use crate::Result;

pub const ANGLE_MARK: char = '∡';
pub const I_MARK: char = 'ⅈ';

pub fn make(rt: &mut Runtime, id: Id, x: ObjRef, y: ObjRef) -> Result<ObjRef> {
    debug_assert!(matches!(id, Id::Rectangular | Id::Polar));
    let xs = object::size(rt, x);
    let ys = object::size(rt, y);
    let mut payload = Vec::with_capacity(xs + ys);
    payload.extend_from_slice(rt.slice(x.addr(), xs));
    payload.extend_from_slice(rt.slice(y.addr(), ys));
    rt.allocate(id, &payload)
}

/// The two parts, in payload order.
pub fn parts(rt: &Runtime, o: ObjRef) -> (ObjRef, ObjRef) {
    let body = object::payload(rt, o);
    let x = ObjRef::at(body);
    let y = object::skip(rt, x);
    (x, y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::number;

    #[test]
    fn parts_are_recovered_in_order() {
        let mut rt = Runtime::new(1024);
        let x = number::make_integer(&mut rt, 3).unwrap();
        let y = number::make_integer(&mut rt, -4).unwrap();
        let z = make(&mut rt, Id::Rectangular, x, y).unwrap();
        let (re, im) = parts(&rt, z);
        assert_eq!(number::int_value(&rt, re), Some(3));
        assert_eq!(number::int_value(&rt, im), Some(-4));
        assert_eq!(object::size(&rt, z), object::skip(&rt, z).addr() - z.addr());
    }
}
