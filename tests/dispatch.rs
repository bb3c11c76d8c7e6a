//! Dispatch totality: every type id sizes, renders and evaluates.

use rust_decimal::Decimal;

use rpl48_core::{
    command, complex, list, number, object, render_to_string, Id, ObjRef, Runtime,
};

/// One representative object per data id.
fn representatives(rt: &mut Runtime) -> Vec<ObjRef> {
    let mut out = Vec::new();
    out.push(number::make_integer(rt, 42).unwrap());
    out.push(number::make_integer(rt, -42).unwrap());
    out.push(number::make_based(rt, Id::BinInteger, 0b1010).unwrap());
    out.push(number::make_based(rt, Id::OctInteger, 0o777).unwrap());
    out.push(number::make_based(rt, Id::DecInteger, 999).unwrap());
    out.push(number::make_based(rt, Id::HexInteger, 0xBEEF).unwrap());
    let mag = number::big_from_digits("123456789012345678901234567890");
    out.push(number::make_bignum(rt, false, &mag).unwrap());
    out.push(number::make_bignum(rt, true, &mag).unwrap());
    out.push(number::make_fraction(rt, false, 1, 3).unwrap());
    out.push(number::make_fraction(rt, true, 2, 5).unwrap());
    out.push(number::make_decimal(rt, Decimal::new(315, 2)).unwrap());
    let x = number::make_integer(rt, 3).unwrap();
    let y = number::make_integer(rt, 4).unwrap();
    out.push(complex::make(rt, Id::Rectangular, x, y).unwrap());
    let x = number::make_integer(rt, 1).unwrap();
    let y = number::make_integer(rt, 90).unwrap();
    out.push(complex::make(rt, Id::Polar, x, y).unwrap());
    out.push(rpl48_core::text::make_text(rt, "hello").unwrap());
    out.push(rpl48_core::text::make_symbol(rt, "NAME").unwrap());
    let one = number::make_integer(rt, 1).unwrap();
    out.push(list::make_sequence(rt, Id::List, &[one]).unwrap());
    let two = number::make_integer(rt, 2).unwrap();
    out.push(list::make_sequence(rt, Id::Program, &[two]).unwrap());
    let three = number::make_integer(rt, 3).unwrap();
    out.push(list::make_sequence(rt, Id::Block, &[three]).unwrap());
    out
}

#[test]
fn size_equals_skip_distance_for_every_id() {
    let mut rt = Runtime::new(16384);
    let mut objects = representatives(&mut rt);
    for value in 0..object::NUM_IDS {
        let id = Id::from_u32(value).unwrap();
        if id.is_command() {
            objects.push(command::make(&mut rt, id).unwrap());
        }
    }
    for o in objects {
        let size = object::size(&rt, o);
        assert!(size > 0);
        assert_eq!(size, object::skip(&rt, o).addr() - o.addr());
        assert!(!render_to_string(&rt, o).is_empty());
    }
}

#[test]
fn passive_data_pushes_itself() {
    let mut rt = Runtime::new(16384);
    let objects = representatives(&mut rt);
    for o in objects {
        let id = object::id_of(&rt, o);
        let depth = rt.depth();
        object::evaluate(&mut rt, o).unwrap();
        match id {
            // A block executes on evaluate: its single child is pushed.
            Id::Block => {
                assert_eq!(rt.depth(), depth + 1);
                assert_ne!(rt.peek(0), Some(o));
            }
            _ => {
                assert_eq!(rt.depth(), depth + 1);
                assert_eq!(rt.peek(0), Some(o));
            }
        }
    }
}

#[test]
fn block_executes_where_program_pushes() {
    let mut rt = Runtime::new(8192);
    let program = rpl48_core::parse(&mut rt, "1 2 +").unwrap();
    let children = list::children(&rt, program);
    let block = list::make_sequence(&mut rt, Id::Block, &children).unwrap();

    object::evaluate(&mut rt, program).unwrap();
    assert_eq!(rt.peek(0), Some(program));
    rt.pop().unwrap();

    object::evaluate(&mut rt, block).unwrap();
    assert_eq!(rt.depth(), 1);
    assert_eq!(render_to_string(&rt, rt.peek(0).unwrap()), "3");

    // Blocks render bare, without delimiters.
    assert_eq!(render_to_string(&rt, block), "1 2 +");
}

#[test]
fn commands_round_trip_through_every_name_format() {
    let mut rt = Runtime::new(16384);
    for info in command::COMMANDS {
        for name in [
            info.name.to_string(),
            info.name.to_uppercase(),
            info.long.to_string(),
            info.long.to_lowercase(),
        ] {
            assert_eq!(
                command::lookup(&name),
                Some(info.id),
                "lookup failed for {name:?}"
            );
        }
    }
}
