//! Trial parser: surface text to heap objects.
//!
//! Parsing tries each applicable form at the cursor in a fixed order
//! (based literals, delimited forms, complex, numbers, then names); the
//! first form that accepts wins and anything else is a syntax error. The
//! cursor is a byte position into UTF-8 input so multi-byte delimiters
//! (`«`, `»`, `∡`, `⁳`) work like any other character.

use rust_decimal::Decimal;
use std::str::FromStr;

use crate::command;
use crate::complex;
use crate::number::{self, Value};
use crate::object::{Id, ObjRef};
use crate::runtime::Runtime;
use crate::settings::Settings;
use crate::text;
use crate::{list, CoreError, Result};

const SUPERSCRIPT_DIGITS: &str = "⁰¹²³⁴⁵⁶⁷⁸⁹";
const SUPERSCRIPT_MINUS: char = '⁻';

pub struct Parser<'a> {
    src: &'a str,
    pos: usize,
    decimal_mark: char,
    exponent_mark: char,
    default_base: u8,
}

impl<'a> Parser<'a> {
    pub fn new(settings: &Settings, src: &'a str) -> Self {
        Parser {
            src,
            pos: 0,
            decimal_mark: settings.decimal_mark,
            exponent_mark: settings.exponent_mark,
            default_base: settings.base,
        }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        self.rest().chars().nth(1)
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
        }
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.advance();
        }
    }

    /// Scan a real literal without allocating: integer, bignum or decimal.
    /// Restores the cursor and returns `None` when nothing numeric starts
    /// here.
    fn scan_real(&mut self) -> Option<Value> {
        let save = self.pos;
        let mut neg = false;
        match self.peek() {
            Some('-') => {
                neg = true;
                self.advance();
            }
            Some('+') => self.advance(),
            _ => {}
        }
        let mut int_digits = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                int_digits.push(c);
                self.advance();
            } else {
                break;
            }
        }
        let mut frac_digits: Option<String> = None;
        if self.peek() == Some(self.decimal_mark) || self.peek() == Some('.') {
            self.advance();
            let mut frac = String::new();
            while let Some(c) = self.peek() {
                if c.is_ascii_digit() {
                    frac.push(c);
                    self.advance();
                } else {
                    break;
                }
            }
            frac_digits = Some(frac);
        }
        if int_digits.is_empty() && frac_digits.as_ref().map_or(true, |f| f.is_empty()) {
            self.pos = save;
            return None;
        }
        let exponent = self.scan_exponent();
        if frac_digits.is_none() && exponent.is_none() {
            // Pure integer digits.
            return Some(match int_digits.parse::<u64>() {
                Ok(v) if neg => Value::Int(-(v as i128)),
                Ok(v) => Value::Int(v as i128),
                Err(_) => Value::Big(neg, number::big_from_digits(&int_digits)),
            });
        }
        let mut mantissa = if int_digits.is_empty() {
            "0".to_string()
        } else {
            int_digits
        };
        if let Some(frac) = frac_digits.filter(|f| !f.is_empty()) {
            mantissa.push('.');
            mantissa.push_str(&frac);
        }
        let parsed = match exponent {
            Some(exp) => Decimal::from_scientific(&format!("{mantissa}e{exp}")),
            None => Decimal::from_str(&mantissa),
        };
        match parsed {
            Ok(d) => Some(Value::Dec(if neg { -d } else { d })),
            Err(_) => {
                self.pos = save;
                None
            }
        }
    }

    /// Exponent part: `e`/`E`/the exponent mark followed by plain or
    /// superscript digits, or bare superscript digits right after the
    /// mantissa.
    fn scan_exponent(&mut self) -> Option<i32> {
        let save = self.pos;
        if matches!(self.peek(), Some(c) if c == 'e' || c == 'E' || c == self.exponent_mark)
        {
            self.advance();
            if let Some(v) = self.scan_plain_exponent() {
                return Some(v);
            }
            if let Some(v) = self.scan_superscript_exponent() {
                return Some(v);
            }
            self.pos = save;
            return None;
        }
        self.scan_superscript_exponent()
    }

    fn scan_plain_exponent(&mut self) -> Option<i32> {
        let save = self.pos;
        let mut neg = false;
        match self.peek() {
            Some('-') => {
                neg = true;
                self.advance();
            }
            Some('+') => self.advance(),
            _ => {}
        }
        let mut digits = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                digits.push(c);
                self.advance();
            } else {
                break;
            }
        }
        match digits.parse::<i32>() {
            Ok(v) => Some(if neg { -v } else { v }),
            Err(_) => {
                self.pos = save;
                None
            }
        }
    }

    fn scan_superscript_exponent(&mut self) -> Option<i32> {
        let save = self.pos;
        let mut neg = false;
        if self.peek() == Some(SUPERSCRIPT_MINUS) {
            neg = true;
            self.advance();
        }
        let mut value: i32 = 0;
        let mut any = false;
        while let Some(c) = self.peek() {
            match SUPERSCRIPT_DIGITS.chars().position(|d| d == c) {
                Some(digit) => {
                    value = value.saturating_mul(10).saturating_add(digit as i32);
                    any = true;
                    self.advance();
                }
                None => break,
            }
        }
        if any {
            Some(if neg { -value } else { value })
        } else {
            self.pos = save;
            None
        }
    }
}

/// Parse a full textual program, with or without outer `« »` delimiters.
pub fn parse(rt: &mut Runtime, source: &str) -> Result<ObjRef> {
    let settings = rt.settings.clone();
    let mut p = Parser::new(&settings, source);
    p.skip_ws();
    let program = if p.peek() == Some('«') {
        p.advance();
        parse_items(rt, &mut p, Id::Program, Some('»'))?
    } else {
        parse_items(rt, &mut p, Id::Program, None)?
    };
    p.skip_ws();
    if p.pos != p.src.len() {
        return Err(rt.report(CoreError::Syntax(p.pos)));
    }
    Ok(program)
}

/// Parse objects until `close` (or end of input) and pack them into a
/// sequence. Each child is held by a safe pointer while its siblings
/// allocate, so a collection in the middle cannot lose or stale them.
fn parse_items(
    rt: &mut Runtime,
    p: &mut Parser,
    id: Id,
    close: Option<char>,
) -> Result<ObjRef> {
    let mut guards = Vec::new();
    let outcome = loop {
        p.skip_ws();
        match (close, p.peek()) {
            (Some(c), Some(found)) if c == found => {
                p.advance();
                break Ok(());
            }
            (Some(_), None) => break Err(CoreError::Syntax(p.pos)),
            (None, None) => break Ok(()),
            _ => {}
        }
        match parse_object(rt, p) {
            Ok(child) => guards.push(rt.protect(child)),
            Err(err) => break Err(err),
        }
    };
    let result = match outcome {
        Ok(()) => {
            let children: Vec<ObjRef> =
                guards.iter().map(|&g| rt.protected(g)).collect();
            list::make_sequence(rt, id, &children)
        }
        Err(err) => Err(rt.report(err)),
    };
    for guard in guards.into_iter().rev() {
        rt.release(guard);
    }
    result
}

/// Parse one object at the cursor.
fn parse_object(rt: &mut Runtime, p: &mut Parser) -> Result<ObjRef> {
    p.skip_ws();
    match p.peek() {
        None => Err(rt.report(CoreError::Syntax(p.pos))),
        Some('"') => parse_text(rt, p),
        Some('{') => {
            p.advance();
            parse_items(rt, p, Id::List, Some('}'))
        }
        Some('«') => {
            p.advance();
            parse_items(rt, p, Id::Program, Some('»'))
        }
        Some('\'') => parse_quoted_symbol(rt, p),
        Some('#') => parse_based(rt, p),
        _ => {
            if let Some(obj) = parse_complex(rt, p)? {
                return Ok(obj);
            }
            if let Some(value) = p.scan_real() {
                // `n/d` with nothing in between is a fraction literal;
                // a spaced `/` stays the division command.
                if matches!(value, Value::Int(_))
                    && p.peek() == Some('/')
                    && p.peek_second().is_some_and(|c| c.is_ascii_digit())
                {
                    return parse_fraction(rt, p, &value);
                }
                return number::encode(rt, &value);
            }
            parse_name(rt, p)
        }
    }
}

fn parse_text(rt: &mut Runtime, p: &mut Parser) -> Result<ObjRef> {
    p.advance(); // opening quote
    let body = p.rest();
    match body.find('"') {
        Some(end) => {
            let content = &body[..end];
            p.pos += end + 1;
            text::make_text(rt, content)
        }
        None => Err(rt.report(CoreError::Syntax(p.pos))),
    }
}

fn parse_quoted_symbol(rt: &mut Runtime, p: &mut Parser) -> Result<ObjRef> {
    p.advance(); // opening quote
    let body = p.rest();
    match body.find('\'') {
        Some(end) if end > 0 => {
            let name = &body[..end];
            if !symbol_like(name) {
                return Err(rt.report(CoreError::Syntax(p.pos)));
            }
            p.pos += end + 1;
            text::make_symbol(rt, name)
        }
        _ => Err(rt.report(CoreError::Syntax(p.pos))),
    }
}

fn symbol_like(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(char::is_alphabetic)
        && name.chars().all(|c| c.is_alphanumeric() || c == '_')
}

fn parse_based(rt: &mut Runtime, p: &mut Parser) -> Result<ObjRef> {
    p.advance(); // '#'
    let mut run = String::new();
    while let Some(c) = p.peek() {
        if c.is_ascii_alphanumeric() {
            run.push(c);
            p.advance();
        } else {
            break;
        }
    }
    if run.is_empty() {
        return Err(rt.report(CoreError::Syntax(p.pos)));
    }
    let (digits, base, id) = match run.chars().last() {
        Some('b' | 'B') => (&run[..run.len() - 1], 2, Id::BinInteger),
        Some('o' | 'O') => (&run[..run.len() - 1], 8, Id::OctInteger),
        Some('d' | 'D') => (&run[..run.len() - 1], 10, Id::DecInteger),
        Some('h' | 'H') => (&run[..run.len() - 1], 16, Id::HexInteger),
        _ => (
            run.as_str(),
            p.default_base as u32,
            match p.default_base {
                2 => Id::BinInteger,
                8 => Id::OctInteger,
                10 => Id::DecInteger,
                _ => Id::HexInteger,
            },
        ),
    };
    if digits.is_empty() {
        return Err(rt.report(CoreError::Syntax(p.pos)));
    }
    match u64::from_str_radix(digits, base) {
        Ok(value) => number::make_based(rt, id, value),
        Err(_) => Err(rt.report(CoreError::Syntax(p.pos))),
    }
}

fn parse_fraction(rt: &mut Runtime, p: &mut Parser, numerator: &Value) -> Result<ObjRef> {
    let Value::Int(num) = numerator else {
        return Err(rt.report(CoreError::Syntax(p.pos)));
    };
    p.advance(); // '/'
    match p.scan_real() {
        Some(Value::Int(den)) if den > 0 => {
            number::make_fraction(rt, *num < 0, num.unsigned_abs() as u64, den as u64)
        }
        _ => Err(rt.report(CoreError::Syntax(p.pos))),
    }
}

fn flip(value: Value) -> Value {
    match value {
        Value::Int(v) => Value::Int(-v),
        Value::Big(neg, mag) => Value::Big(!neg, mag),
        Value::Frac(neg, n, d) => Value::Frac(!neg, n, d),
        Value::Dec(d) => Value::Dec(-d),
        other => other,
    }
}

/// Complex literal: `X;Y`, `X∡Y`, `X+ⅈY` or `X-ⅈY`. Runs before the plain
/// number trial so the first part is not consumed on its own.
fn parse_complex(rt: &mut Runtime, p: &mut Parser) -> Result<Option<ObjRef>> {
    let save = p.pos;
    let Some(x) = p.scan_real() else {
        return Ok(None);
    };
    let (id, y_negated) = match p.peek() {
        Some(';') => {
            p.advance();
            (Id::Rectangular, false)
        }
        Some(c) if c == complex::ANGLE_MARK => {
            p.advance();
            (Id::Polar, false)
        }
        Some(sign @ ('+' | '-')) if p.peek_second() == Some(complex::I_MARK) => {
            p.advance();
            p.advance();
            (Id::Rectangular, sign == '-')
        }
        _ => {
            p.pos = save;
            return Ok(None);
        }
    };
    let Some(y) = p.scan_real() else {
        return Err(rt.report(CoreError::Syntax(p.pos)));
    };
    let y = if y_negated { flip(y) } else { y };
    let xo = number::encode(rt, &x)?;
    let guard = rt.protect(xo);
    let result = match number::encode(rt, &y) {
        Ok(yo) => {
            let xo = rt.protected(guard);
            complex::make(rt, id, xo, yo)
        }
        Err(err) => Err(err),
    };
    rt.release(guard);
    result.map(Some)
}

/// Identifier or operator: a known command name yields the command
/// object, anything else identifier-shaped yields a symbol.
fn parse_name(rt: &mut Runtime, p: &mut Parser) -> Result<ObjRef> {
    let c = match p.peek() {
        Some(c) => c,
        None => return Err(rt.report(CoreError::Syntax(p.pos))),
    };
    if c.is_alphabetic() {
        let mut name = String::new();
        while let Some(c) = p.peek() {
            if c.is_alphanumeric() || c == '_' {
                name.push(c);
                p.advance();
            } else {
                break;
            }
        }
        return match command::lookup(&name) {
            Some(id) => command::make(rt, id),
            None => text::make_symbol(rt, &name),
        };
    }
    if matches!(c, '+' | '-' | '*' | '/' | '×' | '·' | '÷') {
        p.advance();
        if let Some(id) = command::lookup(&c.to_string()) {
            return command::make(rt, id);
        }
    }
    Err(rt.report(CoreError::Syntax(p.pos)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object;
    use crate::runtime::Runtime;

    fn parse_one(rt: &mut Runtime, source: &str) -> ObjRef {
        let program = parse(rt, source).unwrap();
        let children = list::children(rt, program);
        assert_eq!(children.len(), 1, "expected one object from {source:?}");
        children[0]
    }

    #[test]
    fn integers_and_signs() {
        let mut rt = Runtime::new(8192);
        let o = parse_one(&mut rt, "1");
        assert_eq!(number::int_value(&rt, o), Some(1));
        let o = parse_one(&mut rt, "-1");
        assert_eq!(number::int_value(&rt, o), Some(-1));
        let o = parse_one(&mut rt, "18446744073709551615");
        assert_eq!(number::int_value(&rt, o), Some(u64::MAX as i128));
    }

    #[test]
    fn oversized_literal_is_a_bignum() {
        let mut rt = Runtime::new(8192);
        let o = parse_one(&mut rt, "18446744073709551616");
        assert_eq!(object::id_of(&rt, o), Id::Bignum);
    }

    #[test]
    fn based_literals() {
        let mut rt = Runtime::new(8192);
        let o = parse_one(&mut rt, "#10010101b");
        assert_eq!(
            number::based_value(&rt, o),
            Some((Id::BinInteger, 0b10010101))
        );
        let o = parse_one(&mut rt, "#1234ABCDh");
        assert_eq!(
            number::based_value(&rt, o),
            Some((Id::HexInteger, 0x1234_ABCD))
        );
        // No suffix: the settings base decides.
        let o = parse_one(&mut rt, "#FF");
        assert_eq!(number::based_value(&rt, o), Some((Id::HexInteger, 0xFF)));
        assert!(parse(&mut rt, "#").is_err());
    }

    #[test]
    fn decimal_literals() {
        let mut rt = Runtime::new(8192);
        let o = parse_one(&mut rt, "1.5");
        assert_eq!(
            number::decimal_value(&rt, o),
            Some(Decimal::from_str("1.5").unwrap())
        );
        let o = parse_one(&mut rt, "2.5e3");
        assert_eq!(number::decimal_value(&rt, o), Some(Decimal::from(2500)));
        let o = parse_one(&mut rt, "1.");
        assert_eq!(number::decimal_value(&rt, o), Some(Decimal::from(1)));
        // Superscript exponent, as the fancy renderer emits.
        let o = parse_one(&mut rt, "1.5⁳⁻²");
        assert_eq!(
            number::decimal_value(&rt, o),
            Some(Decimal::from_str("0.015").unwrap())
        );
    }

    #[test]
    fn text_list_program_symbol() {
        let mut rt = Runtime::new(8192);
        let o = parse_one(&mut rt, "\"Hello World\"");
        assert_eq!(text::text_value(&rt, o), Some("Hello World"));

        let o = parse_one(&mut rt, "{ A 1 3 }");
        assert_eq!(object::id_of(&rt, o), Id::List);
        let kids = list::children(&rt, o);
        assert_eq!(kids.len(), 3);
        assert_eq!(text::symbol_value(&rt, kids[0]), Some("A"));

        let o = parse_one(&mut rt, "« 1 + sin »");
        assert_eq!(object::id_of(&rt, o), Id::Program);
        let kids = list::children(&rt, o);
        assert_eq!(object::id_of(&rt, kids[1]), Id::Add);
        assert_eq!(object::id_of(&rt, kids[2]), Id::Sin);

        let o = parse_one(&mut rt, "'ABC123Z'");
        assert_eq!(text::symbol_value(&rt, o), Some("ABC123Z"));
    }

    #[test]
    fn adjacent_slash_is_a_fraction_spaced_slash_is_division() {
        let mut rt = Runtime::new(8192);
        let o = parse_one(&mut rt, "1/3");
        assert_eq!(object::id_of(&rt, o), Id::Fraction);
        let o = parse_one(&mut rt, "-22/7");
        assert_eq!(object::id_of(&rt, o), Id::NegFraction);
        // Reducible literals collapse like computed fractions do.
        let o = parse_one(&mut rt, "6/3");
        assert_eq!(number::int_value(&rt, o), Some(2));
        assert!(parse(&mut rt, "1/0").is_err());
        rt.clear_error();

        let program = parse(&mut rt, "1 3 /").unwrap();
        let kids = list::children(&rt, program);
        assert_eq!(kids.len(), 3);
        assert_eq!(object::id_of(&rt, kids[2]), Id::Div);
    }

    #[test]
    fn command_names_are_case_insensitive() {
        let mut rt = Runtime::new(8192);
        for name in ["dup", "DUP", "Duplicate", "dUpLiCaTe"] {
            let o = parse_one(&mut rt, name);
            assert_eq!(object::id_of(&rt, o), Id::Dup, "{name}");
        }
        // Unknown identifiers fall through to symbols.
        let o = parse_one(&mut rt, "frobnicate");
        assert_eq!(object::id_of(&rt, o), Id::Symbol);
    }

    #[test]
    fn complex_literals() {
        let mut rt = Runtime::new(8192);
        let o = parse_one(&mut rt, "3;4");
        assert_eq!(object::id_of(&rt, o), Id::Rectangular);
        let (x, y) = complex::parts(&rt, o);
        assert_eq!(number::int_value(&rt, x), Some(3));
        assert_eq!(number::int_value(&rt, y), Some(4));

        let o = parse_one(&mut rt, "1∡90");
        assert_eq!(object::id_of(&rt, o), Id::Polar);

        let o = parse_one(&mut rt, "3-ⅈ4");
        let (_, y) = complex::parts(&rt, o);
        assert_eq!(number::int_value(&rt, y), Some(-4));
    }

    #[test]
    fn errors_are_reported_with_position() {
        let mut rt = Runtime::new(8192);
        assert!(matches!(
            parse(&mut rt, "{ 1 2"),
            Err(CoreError::Syntax(_))
        ));
        assert!(rt.error().is_some());
        rt.clear_error();
        assert!(parse(&mut rt, "\"unterminated").is_err());
        rt.clear_error();
        assert!(parse(&mut rt, "1 } 2").is_err());
    }

    #[test]
    fn outer_delimiters_are_optional() {
        let mut rt = Runtime::new(8192);
        let bare = parse(&mut rt, "1 2 +").unwrap();
        let wrapped = parse(&mut rt, "« 1 2 + »").unwrap();
        assert!(object::equal(&rt, bare, wrapped));
    }
}
