//! Text and symbol objects.
//!
//! Text payloads store their length plus one and end with a NUL so
//! C-style consumers can read them in place; symbols store the bare
//! identifier bytes.

use crate::leb128;
use crate::object::{self, Id, ObjRef};
use crate::runtime::Runtime;
use crate::Result;

pub fn make_text(rt: &mut Runtime, s: &str) -> Result<ObjRef> {
    let mut payload = Vec::with_capacity(s.len() + 2);
    leb128::write(&mut payload, (s.len() + 1) as u128);
    payload.extend_from_slice(s.as_bytes());
    payload.push(0);
    rt.allocate(Id::Text, &payload)
}

pub fn text_value(rt: &Runtime, o: ObjRef) -> Option<&str> {
    if object::id_of(rt, o) != Id::Text {
        return None;
    }
    let body = object::payload(rt, o);
    let (stored, n) = leb128::read(rt.mem_from(body))?;
    let len = (stored as usize).checked_sub(1)?;
    std::str::from_utf8(rt.slice(body + n, len)).ok()
}

pub fn make_symbol(rt: &mut Runtime, name: &str) -> Result<ObjRef> {
    let mut payload = Vec::with_capacity(name.len() + 1);
    leb128::write(&mut payload, name.len() as u128);
    payload.extend_from_slice(name.as_bytes());
    rt.allocate(Id::Symbol, &payload)
}

pub fn symbol_value(rt: &Runtime, o: ObjRef) -> Option<&str> {
    if object::id_of(rt, o) != Id::Symbol {
        return None;
    }
    let body = object::payload(rt, o);
    let (len, n) = leb128::read(rt.mem_from(body))?;
    std::str::from_utf8(rt.slice(body + n, len as usize)).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_stores_nul_terminated() {
        let mut rt = Runtime::new(1024);
        let t = make_text(&mut rt, "Hello World").unwrap();
        assert_eq!(text_value(&rt, t), Some("Hello World"));
        let end = object::skip(&rt, t).addr();
        assert_eq!(rt.slice(end - 1, 1), &[0]);
    }

    #[test]
    fn symbols_keep_their_name() {
        let mut rt = Runtime::new(1024);
        let s = make_symbol(&mut rt, "ABC123Z").unwrap();
        assert_eq!(symbol_value(&rt, s), Some("ABC123Z"));
        assert_eq!(text_value(&rt, s), None);
    }
}
