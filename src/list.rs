//! Sequence objects: lists, programs and blocks.
//!
//! All three share one payload layout, a byte length followed by the child
//! objects packed inline. They differ only in dispatch: lists always push,
//! programs push on evaluate and iterate on execute, blocks iterate even
//! on evaluate.

use crate::leb128;
use crate::object::{self, Id, ObjRef};
use crate::runtime::Runtime;
use crate::{CoreError, Result};

pub fn make_sequence(rt: &mut Runtime, id: Id, children: &[ObjRef]) -> Result<ObjRef> {
    debug_assert!(matches!(id, Id::List | Id::Program | Id::Block));
    let mut body = Vec::new();
    for &child in children {
        let size = object::size(rt, child);
        body.extend_from_slice(rt.slice(child.addr(), size));
    }
    let mut payload = Vec::with_capacity(body.len() + 2);
    leb128::write(&mut payload, body.len() as u128);
    payload.extend_from_slice(&body);
    rt.allocate(id, &payload)
}

/// Absolute bounds of the packed children.
pub fn payload_bounds(rt: &Runtime, o: ObjRef) -> (usize, usize) {
    let body = object::payload(rt, o);
    let (len, n) = leb128::read(rt.mem_from(body)).unwrap_or((0, 1));
    (body + n, body + n + len as usize)
}

/// References to the children, in order. The references point into the
/// parent's payload; the collector treats such interior references as
/// keeping the whole parent alive.
pub fn children(rt: &Runtime, o: ObjRef) -> Vec<ObjRef> {
    let (mut at, end) = payload_bounds(rt, o);
    let mut out = Vec::new();
    while at < end {
        out.push(ObjRef::at(at));
        at = object::skip(rt, ObjRef::at(at)).addr();
    }
    out
}

/// Concatenate two sequences of the same kind.
pub fn concat(rt: &mut Runtime, a: ObjRef, b: ObjRef) -> Result<ObjRef> {
    let id = object::id_of(rt, a);
    let (astart, aend) = payload_bounds(rt, a);
    let (bstart, bend) = payload_bounds(rt, b);
    let mut body = Vec::with_capacity(aend - astart + bend - bstart);
    body.extend_from_slice(rt.slice(astart, aend - astart));
    body.extend_from_slice(rt.slice(bstart, bend - bstart));
    let mut payload = Vec::with_capacity(body.len() + 2);
    leb128::write(&mut payload, body.len() as u128);
    payload.extend_from_slice(&body);
    rt.allocate(id, &payload)
}

/// Execute the children in order.
///
/// The sequence becomes the current code object for the duration, which
/// both roots it for the collector and lets children be addressed by
/// offsets that stay valid across compaction. The interruption source is
/// polled before every child; a pending EXIT unwinds with *interrupted*
/// and leaves the results so far on the stack.
pub fn run(rt: &mut Runtime, o: ObjRef) -> Result<()> {
    let (start, end) = payload_bounds(rt, o);
    let mut rel = start - o.addr();
    let rel_end = end - o.addr();
    rt.call(o)?;
    while rel < rel_end {
        if rt.interrupted() {
            rt.ret().ok();
            return Err(rt.report(CoreError::Interrupted));
        }
        let child = ObjRef::at(rt.code().addr() + rel);
        let size = object::size(rt, child);
        if let Err(err) = object::evaluate(rt, child) {
            rt.ret().ok();
            return Err(err);
        }
        rel += size;
    }
    rt.ret()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::number;

    #[test]
    fn sequences_pack_children_inline() {
        let mut rt = Runtime::new(4096);
        let a = number::make_integer(&mut rt, 1).unwrap();
        let b = number::make_integer(&mut rt, 2).unwrap();
        let list = make_sequence(&mut rt, Id::List, &[a, b]).unwrap();
        let kids = children(&rt, list);
        assert_eq!(kids.len(), 2);
        assert_eq!(number::int_value(&rt, kids[0]), Some(1));
        assert_eq!(number::int_value(&rt, kids[1]), Some(2));
        // Children sit inside the parent's byte range.
        let end = object::skip(&rt, list).addr();
        assert!(kids.iter().all(|k| k.addr() > list.addr() && k.addr() < end));
    }

    #[test]
    fn program_run_pushes_children() {
        let mut rt = Runtime::new(4096);
        let a = number::make_integer(&mut rt, 10).unwrap();
        let b = number::make_integer(&mut rt, 20).unwrap();
        let prog = make_sequence(&mut rt, Id::Program, &[a, b]).unwrap();
        run(&mut rt, prog).unwrap();
        assert_eq!(rt.depth(), 2);
        let top = rt.pop().unwrap();
        assert_eq!(number::int_value(&rt, top), Some(20));
        assert!(rt.code().is_null());
        assert_eq!(rt.return_depth(), 0);
    }

    #[test]
    fn concat_preserves_child_order() {
        let mut rt = Runtime::new(4096);
        let a = number::make_integer(&mut rt, 1).unwrap();
        let one = make_sequence(&mut rt, Id::List, &[a]).unwrap();
        let b = number::make_integer(&mut rt, 2).unwrap();
        let two = make_sequence(&mut rt, Id::List, &[b]).unwrap();
        let joined = concat(&mut rt, one, two).unwrap();
        let kids = children(&rt, joined);
        assert_eq!(kids.len(), 2);
        assert_eq!(number::int_value(&rt, kids[0]), Some(1));
        assert_eq!(number::int_value(&rt, kids[1]), Some(2));
    }
}
