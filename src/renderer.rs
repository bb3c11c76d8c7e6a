//! Settings-aware textual rendering.
//!
//! Rendering is deterministic: the same object and settings always give
//! the same text, and re-parsing a rendered object yields a semantically
//! equal object.

use rust_decimal::Decimal;

use crate::command;
use crate::complex;
use crate::list;
use crate::number::{self, Value};
use crate::object::{self, Id, ObjRef};
use crate::runtime::Runtime;
use crate::settings::{DisplayMode, Settings};
use crate::text;

const SUPERSCRIPT_DIGITS: [char; 10] =
    ['⁰', '¹', '²', '³', '⁴', '⁵', '⁶', '⁷', '⁸', '⁹'];

/// A growable text sink carrying the formatting settings.
pub struct Renderer {
    out: String,
    settings: Settings,
}

impl Renderer {
    pub fn new(settings: &Settings) -> Self {
        Renderer {
            out: String::new(),
            settings: settings.clone(),
        }
    }

    pub fn put(&mut self, s: &str) {
        self.out.push_str(s);
    }

    pub fn put_char(&mut self, c: char) {
        self.out.push(c);
    }

    pub fn text(&self) -> &str {
        &self.out
    }

    pub fn finish(self) -> String {
        self.out
    }
}

/// Render `o` with the runtime's current settings.
pub fn render_to_string(rt: &Runtime, o: ObjRef) -> String {
    let mut r = Renderer::new(&rt.settings);
    render_object(rt, o, &mut r);
    r.finish()
}

pub fn render_object(rt: &Runtime, o: ObjRef, r: &mut Renderer) {
    let id = object::id_of(rt, o);
    match id {
        Id::Integer | Id::NegInteger => {
            if let Some(v) = number::int_value(rt, o) {
                r.put(&v.to_string());
            }
        }
        Id::BinInteger | Id::OctInteger | Id::DecInteger | Id::HexInteger => {
            if let Some((id, v)) = number::based_value(rt, o) {
                r.put_char('#');
                let (digits, suffix) = match id {
                    Id::BinInteger => (format!("{v:b}"), 'b'),
                    Id::OctInteger => (format!("{v:o}"), 'o'),
                    Id::DecInteger => (format!("{v}"), 'd'),
                    _ => (format!("{v:X}"), 'h'),
                };
                r.put(&digits);
                r.put_char(suffix);
            }
        }
        Id::Bignum | Id::NegBignum => {
            if let Some(Value::Big(neg, mag)) = number::decode(rt, o) {
                r.put(&number::big_to_string(neg, &mag));
            }
        }
        Id::Fraction | Id::NegFraction => {
            if let Some(Value::Frac(neg, num, den)) = number::decode(rt, o) {
                if neg {
                    r.put_char('-');
                }
                r.put(&format!("{num}/{den}"));
            }
        }
        Id::Decimal => {
            if let Some(d) = number::decimal_value(rt, o) {
                let s = render_decimal(d, &r.settings);
                r.put(&s);
            }
        }
        Id::Rectangular => {
            let (x, y) = complex::parts(rt, o);
            render_object(rt, x, r);
            r.put_char(';');
            render_object(rt, y, r);
        }
        Id::Polar => {
            let (x, y) = complex::parts(rt, o);
            render_object(rt, x, r);
            r.put_char(complex::ANGLE_MARK);
            render_object(rt, y, r);
        }
        Id::Text => {
            r.put_char('"');
            r.put(text::text_value(rt, o).unwrap_or(""));
            r.put_char('"');
        }
        Id::Symbol => {
            r.put(text::symbol_value(rt, o).unwrap_or(""));
        }
        Id::List => render_sequence(rt, o, r, Some(('{', '}'))),
        Id::Program => render_sequence(rt, o, r, Some(('«', '»'))),
        Id::Block => render_sequence(rt, o, r, None),
        _ => {
            let fmt = r.settings.command_fmt;
            r.put(&command::name_for(id, fmt));
        }
    }
}

fn render_sequence(
    rt: &Runtime,
    o: ObjRef,
    r: &mut Renderer,
    delimiters: Option<(char, char)>,
) {
    let children = list::children(rt, o);
    if let Some((open, _)) = delimiters {
        r.put_char(open);
    }
    for (i, &child) in children.iter().enumerate() {
        if i > 0 || delimiters.is_some() {
            r.put_char(' ');
        }
        render_object(rt, child, r);
    }
    if let Some((_, close)) = delimiters {
        r.put_char(' ');
        r.put_char(close);
    }
}

// ----------------------------------------------------------------------
// Decimal formatting
// ----------------------------------------------------------------------

fn exponent10(d: &Decimal) -> i32 {
    if d.is_zero() {
        return 0;
    }
    let normalized = d.normalize();
    let digits = normalized.mantissa().unsigned_abs().to_string().len() as i32;
    digits - 1 - normalized.scale() as i32
}

fn render_decimal(d: Decimal, s: &Settings) -> String {
    match s.display_mode {
        DisplayMode::Normal => {
            let exp10 = exponent10(&d);
            if exp10.abs() > s.standard_exp as i32 {
                sci_string(d, s, false)
            } else {
                plain_string(d, s)
            }
        }
        DisplayMode::Fix => fix_string(d, s),
        DisplayMode::Sci => sci_string(d, s, false),
        DisplayMode::Eng => sci_string(d, s, true),
    }
}

fn mark_decimal(out: String, mark: char) -> String {
    if mark == '.' {
        out
    } else {
        out.replace('.', &mark.to_string())
    }
}

fn plain_string(d: Decimal, s: &Settings) -> String {
    let mut out = d.normalize().to_string();
    if !out.contains('.') && s.show_decimal {
        out.push('.');
    }
    mark_decimal(out, s.decimal_mark)
}

fn fix_string(d: Decimal, s: &Settings) -> String {
    let wanted = s.displayed as usize;
    let mut out = d.round_dp(s.displayed as u32).to_string();
    let frac_len = match out.find('.') {
        Some(i) => out.len() - i - 1,
        None => {
            if wanted > 0 || s.show_decimal {
                out.push('.');
            }
            0
        }
    };
    for _ in frac_len..wanted {
        out.push('0');
    }
    mark_decimal(out, s.decimal_mark)
}

fn sci_string(d: Decimal, s: &Settings, engineering: bool) -> String {
    if d.is_zero() {
        return plain_string(d, s);
    }
    let neg = d.is_sign_negative();
    let sig = (s.displayed.max(1)) as u32;
    let magnitude = d.abs();
    let rounded = magnitude.round_sf(sig).unwrap_or(magnitude).normalize();
    let digits = rounded.mantissa().unsigned_abs().to_string();
    let mut exp10 = digits.len() as i32 - 1 - rounded.scale() as i32;
    let mut int_len = 1usize;
    if engineering {
        let shift = exp10.rem_euclid(3);
        int_len = shift as usize + 1;
        exp10 -= shift;
    }
    // Trailing zeros in the mantissa are not significant.
    let mut digits = digits.trim_end_matches('0').to_string();
    if digits.is_empty() {
        digits.push('0');
    }
    while digits.len() < int_len {
        digits.push('0');
    }
    let (ip, fp) = digits.split_at(int_len);
    let mut out = String::new();
    if neg {
        out.push('-');
    }
    out.push_str(ip);
    out.push(s.decimal_mark);
    out.push_str(fp);
    out.push(s.exponent_mark);
    if s.fancy_exponent {
        out.push_str(&superscript(exp10));
    } else {
        out.push_str(&exp10.to_string());
    }
    out
}

fn superscript(value: i32) -> String {
    let mut out = String::new();
    if value < 0 {
        out.push('⁻');
    }
    for c in value.unsigned_abs().to_string().chars() {
        let digit = c.to_digit(10).unwrap_or(0) as usize;
        out.push(SUPERSCRIPT_DIGITS[digit]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::Runtime;
    use crate::settings::CommandFormat;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s)
            .or_else(|_| Decimal::from_scientific(s))
            .unwrap()
    }

    #[test]
    fn integers_and_fractions() {
        let mut rt = Runtime::new(4096);
        let o = number::make_integer(&mut rt, -42).unwrap();
        assert_eq!(render_to_string(&rt, o), "-42");
        let o = number::make_fraction(&mut rt, false, 1, 3).unwrap();
        assert_eq!(render_to_string(&rt, o), "1/3");
        let o = number::make_fraction(&mut rt, true, 22, 7).unwrap();
        assert_eq!(render_to_string(&rt, o), "-22/7");
    }

    #[test]
    fn based_integers_keep_their_base() {
        let mut rt = Runtime::new(4096);
        let o = number::make_based(&mut rt, Id::BinInteger, 0b10010101).unwrap();
        assert_eq!(render_to_string(&rt, o), "#10010101b");
        let o = number::make_based(&mut rt, Id::HexInteger, 0x1234ABCD).unwrap();
        assert_eq!(render_to_string(&rt, o), "#1234ABCDh");
    }

    #[test]
    fn normal_mode_decimals() {
        let s = Settings::default();
        assert_eq!(render_decimal(dec("1.5"), &s), "1.5");
        assert_eq!(render_decimal(dec("1"), &s), "1.");
        assert_eq!(render_decimal(dec("0"), &s), "0.");
        // Past the standard exponent the display flips to scientific.
        assert_eq!(render_decimal(dec("1e10"), &s), "1.⁳¹⁰");
    }

    #[test]
    fn fix_mode_pads_digits() {
        let mut s = Settings::default();
        s.display_mode = DisplayMode::Fix;
        s.displayed = 2;
        assert_eq!(render_decimal(dec("1.5"), &s), "1.50");
        assert_eq!(render_decimal(dec("1.005"), &s), "1.00"); // banker's rounding
        assert_eq!(render_decimal(dec("3"), &s), "3.00");
    }

    #[test]
    fn sci_and_eng_modes() {
        let mut s = Settings::default();
        s.display_mode = DisplayMode::Sci;
        s.fancy_exponent = false;
        s.displayed = 3;
        assert_eq!(render_decimal(dec("1536"), &s), "1.54⁳3");
        assert_eq!(render_decimal(dec("-0.00015"), &s), "-1.5⁳-4");
        s.display_mode = DisplayMode::Eng;
        assert_eq!(render_decimal(dec("1536"), &s), "1.54⁳3");
        assert_eq!(render_decimal(dec("15360"), &s), "15.4⁳3");
    }

    #[test]
    fn decimal_comma_applies() {
        let mut s = Settings::default();
        s.decimal_mark = ',';
        assert_eq!(render_decimal(dec("1.5"), &s), "1,5");
    }

    #[test]
    fn command_format_setting_controls_names() {
        let mut rt = Runtime::new(4096);
        let o = command::make(&mut rt, Id::Dup).unwrap();
        assert_eq!(render_to_string(&rt, o), "Duplicate");
        rt.settings.command_fmt = CommandFormat::Uppercase;
        assert_eq!(render_to_string(&rt, o), "DUP");
        rt.settings.command_fmt = CommandFormat::Capitalized;
        assert_eq!(render_to_string(&rt, o), "Dup");
        rt.settings.command_fmt = CommandFormat::Lowercase;
        assert_eq!(render_to_string(&rt, o), "dup");
    }

    #[test]
    fn sequences_render_with_delimiters() {
        let mut rt = Runtime::new(4096);
        let program = crate::parser::parse(&mut rt, "« 1 + sin »").unwrap();
        assert_eq!(render_to_string(&rt, program), "« 1 + sin »");
        let list = crate::parser::parse(&mut rt, "{ A 1 3 }").unwrap();
        let inner = list::children(&rt, list)[0];
        assert_eq!(render_to_string(&rt, inner), "{ A 1 3 }");
    }
}
