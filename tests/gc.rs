//! Collector soundness seen through the public interface.

use rpl48_core::{
    number, object, render_to_string, run_line, text, Runtime,
};

#[test]
fn collection_preserves_values_types_and_order() {
    let mut rt = Runtime::new(16384);
    // Interleave live objects (pushed) with dead ones of several types.
    for i in 0..20i128 {
        let o = match i % 4 {
            0 => number::make_integer(&mut rt, i * 1000).unwrap(),
            1 => text::make_text(&mut rt, &format!("t{i}")).unwrap(),
            2 => number::make_fraction(&mut rt, false, i as u64 + 1, 7).unwrap(),
            _ => text::make_symbol(&mut rt, &format!("S{i}")).unwrap(),
        };
        if i % 2 == 0 {
            rt.push(o).unwrap();
        }
    }
    let before: Vec<String> = (0..rt.depth())
        .map(|lvl| render_to_string(&rt, rt.peek(lvl).unwrap()))
        .collect();
    let recycled = rt.gc();
    assert!(recycled > 0);
    let after: Vec<String> = (0..rt.depth())
        .map(|lvl| render_to_string(&rt, rt.peek(lvl).unwrap()))
        .collect();
    assert_eq!(before, after);

    // Heap order matches push order (bottom of stack was allocated first).
    let mut addrs: Vec<usize> = (0..rt.depth())
        .map(|lvl| rt.peek(lvl).unwrap().addr())
        .collect();
    addrs.reverse();
    assert!(addrs.windows(2).all(|w| w[0] < w[1]));

    // Compaction is exact: the temporaries hold the live bytes only.
    let live: usize = (0..rt.depth())
        .map(|lvl| object::size(&rt, rt.peek(lvl).unwrap()))
        .sum();
    assert_eq!(rt.temporaries_size(), live);
}

#[test]
fn second_collection_finds_nothing() {
    let mut rt = Runtime::new(8192);
    for i in 0..10 {
        let o = number::make_integer(&mut rt, i).unwrap();
        if i % 2 == 0 {
            rt.push(o).unwrap();
        }
    }
    assert!(rt.gc() > 0);
    assert_eq!(rt.gc(), 0);
}

#[test]
fn parser_keeps_partial_composites_alive_across_collections() {
    let mut rt = Runtime::new(1024);
    // Garbage several times larger than what a collection must clear.
    for _ in 0..60 {
        number::make_integer(&mut rt, 123_456_789).unwrap();
    }
    run_line(&mut rt, "{ 11 22 { 33 44 } \"text\" }").unwrap();
    let top = rt.peek(0).unwrap();
    assert_eq!(
        render_to_string(&rt, top),
        "{ 11 22 { 33 44 } \"text\" }"
    );
}

#[test]
fn interior_references_keep_the_whole_composite_alive() {
    let mut rt = Runtime::new(8192);
    run_line(&mut rt, "« 7 8 »").unwrap();
    run_line(&mut rt, "eval").unwrap();
    // The two results reference children embedded in the program object.
    assert_eq!(rt.depth(), 2);
    rt.gc();
    assert_eq!(render_to_string(&rt, rt.peek(0).unwrap()), "8");
    assert_eq!(render_to_string(&rt, rt.peek(1).unwrap()), "7");
}

#[test]
fn globals_survive_collection_untouched() {
    let mut rt = Runtime::new(4096);
    run_line(&mut rt, "123 'G' sto").unwrap();
    for _ in 0..20 {
        number::make_integer(&mut rt, 55555).unwrap();
    }
    rt.gc();
    run_line(&mut rt, "'G' rcl").unwrap();
    assert_eq!(render_to_string(&rt, rt.peek(0).unwrap()), "123");
}

#[test]
fn collection_during_arithmetic_chain() {
    // Arena small enough that the chain cannot complete without
    // reclaiming intermediate results.
    let mut rt = Runtime::new(512);
    let mut line = String::from("1");
    for _ in 0..30 {
        line.push_str(" 1 +");
    }
    run_line(&mut rt, &line).unwrap();
    assert_eq!(render_to_string(&rt, rt.peek(0).unwrap()), "31");
}
