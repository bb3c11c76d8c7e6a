//! Built-in commands.
//!
//! Every command is its own type id with an empty payload. The static
//! table below is the single source for parsing (short or long name,
//! case-insensitive) and rendering (per the command-format setting). The
//! actions read typed arguments from the stack, push their result and
//! report through the error channel on failure.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::list;
use crate::number::{self, ArithOp, TrigOp, Value};
use crate::object::{self, Id, ObjRef};
use crate::runtime::Runtime;
use crate::settings::{
    AngleMode, CommandFormat, DisplayMode, Settings, MAX_PRECISION, STD_DISPLAYED,
};
use crate::text;
use crate::{CoreError, Result};

pub struct CommandInfo {
    pub id: Id,
    pub name: &'static str,
    pub long: &'static str,
}

pub static COMMANDS: &[CommandInfo] = &[
    CommandInfo { id: Id::Dup, name: "dup", long: "Duplicate" },
    CommandInfo { id: Id::Drop, name: "drop", long: "Drop" },
    CommandInfo { id: Id::Swap, name: "swap", long: "Swap" },
    CommandInfo { id: Id::Over, name: "over", long: "Over" },
    CommandInfo { id: Id::Rot, name: "rot", long: "Rotate" },
    CommandInfo { id: Id::Depth, name: "depth", long: "Depth" },
    CommandInfo { id: Id::ClearStack, name: "clear", long: "ClearStack" },
    CommandInfo { id: Id::Add, name: "+", long: "+" },
    CommandInfo { id: Id::Sub, name: "-", long: "-" },
    CommandInfo { id: Id::Mul, name: "*", long: "*" },
    CommandInfo { id: Id::Div, name: "/", long: "/" },
    CommandInfo { id: Id::Neg, name: "neg", long: "Negate" },
    CommandInfo { id: Id::Inv, name: "inv", long: "Invert" },
    CommandInfo { id: Id::Sqrt, name: "sqrt", long: "sqrt" },
    CommandInfo { id: Id::Sin, name: "sin", long: "sin" },
    CommandInfo { id: Id::Cos, name: "cos", long: "cos" },
    CommandInfo { id: Id::Tan, name: "tan", long: "tan" },
    CommandInfo { id: Id::Eval, name: "eval", long: "Evaluate" },
    CommandInfo { id: Id::Sto, name: "sto", long: "Store" },
    CommandInfo { id: Id::Rcl, name: "rcl", long: "Recall" },
    CommandInfo { id: Id::Purge, name: "purge", long: "Purge" },
    CommandInfo { id: Id::Std, name: "std", long: "StandardDisplay" },
    CommandInfo { id: Id::Fix, name: "fix", long: "FixedDisplay" },
    CommandInfo { id: Id::Sci, name: "sci", long: "ScientificDisplay" },
    CommandInfo { id: Id::Eng, name: "eng", long: "EngineeringDisplay" },
    CommandInfo { id: Id::Deg, name: "deg", long: "Degrees" },
    CommandInfo { id: Id::Rad, name: "rad", long: "Radians" },
    CommandInfo { id: Id::Grad, name: "grad", long: "Grads" },
    CommandInfo { id: Id::LowerCase, name: "lowercase", long: "LowerCase" },
    CommandInfo { id: Id::UpperCase, name: "uppercase", long: "UpperCase" },
    CommandInfo { id: Id::Capitalized, name: "capitalized", long: "Capitalized" },
    CommandInfo { id: Id::LongForm, name: "longform", long: "LongForm" },
    CommandInfo { id: Id::DecimalDot, name: "decimaldot", long: "DecimalDot" },
    CommandInfo { id: Id::DecimalComma, name: "decimalcomma", long: "DecimalComma" },
    CommandInfo { id: Id::TrailingDecimal, name: "trailingdecimal", long: "TrailingDecimal" },
    CommandInfo { id: Id::NoTrailingDecimal, name: "notrailingdecimal", long: "NoTrailingDecimal" },
    CommandInfo { id: Id::Precision, name: "prec", long: "Precision" },
    CommandInfo { id: Id::StandardExponent, name: "stdexp", long: "StandardExponent" },
    CommandInfo { id: Id::FancyExponent, name: "fancyexp", long: "FancyExponent" },
    CommandInfo { id: Id::ClassicExponent, name: "classicexp", long: "ClassicExponent" },
    CommandInfo { id: Id::Bin, name: "bin", long: "Binary" },
    CommandInfo { id: Id::Oct, name: "oct", long: "Octal" },
    CommandInfo { id: Id::Dec, name: "dec", long: "Decimal" },
    CommandInfo { id: Id::Hex, name: "hex", long: "Hexadecimal" },
    CommandInfo { id: Id::Base, name: "base", long: "Base" },
    CommandInfo { id: Id::StoreWordSize, name: "stws", long: "WordSize" },
    CommandInfo { id: Id::RecallWordSize, name: "rcws", long: "RecallWordSize" },
];

static BY_NAME: Lazy<HashMap<String, Id>> = Lazy::new(|| {
    let mut map = HashMap::new();
    for info in COMMANDS {
        map.insert(info.name.to_lowercase(), info.id);
        map.insert(info.long.to_lowercase(), info.id);
    }
    // Unicode operator spellings.
    map.insert("×".to_string(), Id::Mul);
    map.insert("·".to_string(), Id::Mul);
    map.insert("÷".to_string(), Id::Div);
    map
});

/// Case-insensitive lookup by short or long name.
pub fn lookup(name: &str) -> Option<Id> {
    BY_NAME.get(&name.to_lowercase()).copied()
}

pub fn info(id: Id) -> Option<&'static CommandInfo> {
    COMMANDS.iter().find(|info| info.id == id)
}

/// Displayed name of a command under the given format setting.
pub fn name_for(id: Id, fmt: CommandFormat) -> String {
    let Some(info) = info(id) else {
        return String::new();
    };
    match fmt {
        CommandFormat::Lowercase => info.name.to_lowercase(),
        CommandFormat::Uppercase => info.name.to_uppercase(),
        CommandFormat::Capitalized => {
            let mut chars = info.name.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        }
        CommandFormat::LongForm => info.long.to_string(),
    }
}

pub fn make(rt: &mut Runtime, id: Id) -> Result<ObjRef> {
    debug_assert!(id.is_command());
    rt.allocate(id, &[])
}

// ----------------------------------------------------------------------
// Actions
// ----------------------------------------------------------------------

/// Run the action of the command `id`.
pub fn run(rt: &mut Runtime, id: Id) -> Result<()> {
    match id {
        Id::Dup => {
            let o = rt.top()?;
            rt.push(o)
        }
        Id::Drop => rt.pop().map(|_| ()),
        Id::Swap => {
            let a = rt.stack(0)?;
            let b = rt.stack(1)?;
            rt.set_stack(0, b)?;
            rt.set_stack(1, a)
        }
        Id::Over => {
            let o = rt.stack(1)?;
            rt.push(o)
        }
        Id::Rot => {
            let third = rt.stack(2)?;
            let second = rt.stack(1)?;
            let top = rt.stack(0)?;
            rt.set_stack(0, third)?;
            rt.set_stack(1, top)?;
            rt.set_stack(2, second)
        }
        Id::Depth => {
            let depth = rt.depth() as i128;
            let o = number::make_integer(rt, depth)?;
            rt.push(o)
        }
        Id::ClearStack => {
            rt.clear_stack();
            Ok(())
        }

        Id::Add => arith(rt, ArithOp::Add),
        Id::Sub => arith(rt, ArithOp::Sub),
        Id::Mul => arith(rt, ArithOp::Mul),
        Id::Div => arith(rt, ArithOp::Div),
        Id::Neg => unary(rt, |v, settings| Ok(number::negate(v, settings))),
        Id::Inv => unary(rt, number::invert),
        Id::Sqrt => unary(rt, number::sqrt),
        Id::Sin => unary(rt, |v, s| number::trig(TrigOp::Sin, v, s)),
        Id::Cos => unary(rt, |v, s| number::trig(TrigOp::Cos, v, s)),
        Id::Tan => unary(rt, |v, s| number::trig(TrigOp::Tan, v, s)),

        Id::Eval => {
            let o = rt.pop()?;
            // A name evaluates to its stored value.
            if let Some(name) = text::symbol_value(rt, o).map(str::to_string) {
                let value = rt.recall_global(&name)?;
                return object::execute(rt, value);
            }
            object::execute(rt, o)
        }
        Id::Sto => {
            let name = symbol_arg(rt, 0)?;
            let value = rt.stack(1)?;
            rt.store_global(&name, value)?;
            rt.pop()?;
            rt.pop()?;
            Ok(())
        }
        Id::Rcl => {
            let name = symbol_arg(rt, 0)?;
            let value = rt.recall_global(&name)?;
            rt.pop()?;
            rt.push(value)
        }
        Id::Purge => {
            let name = symbol_arg(rt, 0)?;
            if !rt.purge_global(&name) {
                return Err(rt.report(CoreError::UndefinedName(name)));
            }
            rt.pop()?;
            Ok(())
        }

        Id::Std => {
            rt.settings.display_mode = DisplayMode::Normal;
            rt.settings.displayed = STD_DISPLAYED;
            Ok(())
        }
        Id::Fix => display_with_digits(rt, DisplayMode::Fix),
        Id::Sci => display_with_digits(rt, DisplayMode::Sci),
        Id::Eng => display_with_digits(rt, DisplayMode::Eng),
        Id::Deg => set_angle(rt, AngleMode::Degrees),
        Id::Rad => set_angle(rt, AngleMode::Radians),
        Id::Grad => set_angle(rt, AngleMode::Grads),
        Id::LowerCase => set_command_fmt(rt, CommandFormat::Lowercase),
        Id::UpperCase => set_command_fmt(rt, CommandFormat::Uppercase),
        Id::Capitalized => set_command_fmt(rt, CommandFormat::Capitalized),
        Id::LongForm => set_command_fmt(rt, CommandFormat::LongForm),
        Id::DecimalDot => {
            rt.settings.decimal_mark = '.';
            Ok(())
        }
        Id::DecimalComma => {
            rt.settings.decimal_mark = ',';
            Ok(())
        }
        Id::TrailingDecimal => {
            rt.settings.show_decimal = true;
            Ok(())
        }
        Id::NoTrailingDecimal => {
            rt.settings.show_decimal = false;
            Ok(())
        }
        Id::Precision => {
            let v = int_setting(rt, 1, MAX_PRECISION as i128)?;
            rt.settings.precision = v as u16;
            Ok(())
        }
        Id::StandardExponent => {
            let v = int_setting(rt, 0, 99)?;
            rt.settings.standard_exp = v as u16;
            Ok(())
        }
        Id::FancyExponent => {
            rt.settings.fancy_exponent = true;
            Ok(())
        }
        Id::ClassicExponent => {
            rt.settings.fancy_exponent = false;
            Ok(())
        }
        Id::Bin => set_base(rt, 2),
        Id::Oct => set_base(rt, 8),
        Id::Dec => set_base(rt, 10),
        Id::Hex => set_base(rt, 16),
        Id::Base => {
            let o = rt.stack(0)?;
            let Some(v) = number::int_arg(rt, o) else {
                return Err(rt.report(CoreError::BadArgumentType));
            };
            if !matches!(v, 2 | 8 | 10 | 16) {
                return Err(rt.report(CoreError::BadArgumentValue));
            }
            rt.pop()?;
            rt.settings.base = v as u8;
            Ok(())
        }
        Id::StoreWordSize => {
            let v = int_setting(rt, 1, 64)?;
            rt.settings.wordsize = v as u16;
            Ok(())
        }
        Id::RecallWordSize => {
            let wordsize = rt.settings.wordsize as i128;
            let o = number::make_integer(rt, wordsize)?;
            rt.push(o)
        }

        _ => Err(rt.report(CoreError::BadArgumentType)),
    }
}

fn arith(rt: &mut Runtime, op: ArithOp) -> Result<()> {
    let y = rt.stack(0)?;
    let x = rt.stack(1)?;
    let (ix, iy) = (object::id_of(rt, x), object::id_of(rt, y));
    if op == ArithOp::Add && ix == Id::Text && iy == Id::Text {
        let joined = format!(
            "{}{}",
            text::text_value(rt, x).unwrap_or(""),
            text::text_value(rt, y).unwrap_or("")
        );
        let o = text::make_text(rt, &joined)?;
        rt.pop()?;
        rt.pop()?;
        return rt.push(o);
    }
    if op == ArithOp::Add && ix == Id::List && iy == Id::List {
        let o = list::concat(rt, x, y)?;
        rt.pop()?;
        rt.pop()?;
        return rt.push(o);
    }
    let (Some(va), Some(vb)) = (number::decode(rt, x), number::decode(rt, y)) else {
        return Err(rt.report(CoreError::BadArgumentType));
    };
    let settings = rt.settings.clone();
    let value = match number::binary(op, &va, &vb, &settings) {
        Ok(value) => value,
        Err(err) => return Err(rt.report(err)),
    };
    // Arguments stay on the stack while the result allocates, so a
    // collection here cannot reclaim them.
    let o = number::encode(rt, &value)?;
    rt.pop()?;
    rt.pop()?;
    rt.push(o)
}

fn unary(
    rt: &mut Runtime,
    f: impl Fn(&Value, &Settings) -> std::result::Result<Value, CoreError>,
) -> Result<()> {
    let x = rt.stack(0)?;
    let Some(v) = number::decode(rt, x) else {
        return Err(rt.report(CoreError::BadArgumentType));
    };
    let settings = rt.settings.clone();
    let value = match f(&v, &settings) {
        Ok(value) => value,
        Err(err) => return Err(rt.report(err)),
    };
    let o = number::encode(rt, &value)?;
    rt.pop()?;
    rt.push(o)
}

fn symbol_arg(rt: &mut Runtime, level: usize) -> Result<String> {
    rt.stack(level)?; // depth errors report as such
    match object::typed_arg(rt, level, Id::Symbol) {
        Some(o) => Ok(text::symbol_value(rt, o).unwrap_or("").to_string()),
        None => Err(rt.report(CoreError::BadArgumentType)),
    }
}

fn int_setting(rt: &mut Runtime, min: i128, max: i128) -> Result<i128> {
    let o = rt.stack(0)?;
    let Some(v) = number::int_arg(rt, o) else {
        return Err(rt.report(CoreError::BadArgumentType));
    };
    if v < min || v > max {
        return Err(rt.report(CoreError::BadArgumentValue));
    }
    rt.pop()?;
    Ok(v)
}

fn display_with_digits(rt: &mut Runtime, mode: DisplayMode) -> Result<()> {
    let v = int_setting(rt, 0, 34)?;
    rt.settings.display_mode = mode;
    rt.settings.displayed = v as u16;
    Ok(())
}

fn set_angle(rt: &mut Runtime, mode: AngleMode) -> Result<()> {
    rt.settings.angle_mode = mode;
    Ok(())
}

fn set_command_fmt(rt: &mut Runtime, fmt: CommandFormat) -> Result<()> {
    rt.settings.command_fmt = fmt;
    Ok(())
}

fn set_base(rt: &mut Runtime, base: u8) -> Result<()> {
    rt.settings.base = base;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_command_id_has_a_name() {
        for value in 0..object::NUM_IDS {
            let id = Id::from_u32(value).unwrap();
            if id.is_command() {
                let info = info(id).unwrap_or_else(|| panic!("no name for {id:?}"));
                assert_eq!(lookup(info.name), Some(id));
                assert_eq!(lookup(&info.long.to_uppercase()), Some(id));
            }
        }
    }

    #[test]
    fn stack_commands_shuffle_slots() {
        let mut rt = Runtime::new(4096);
        for v in [1, 2, 3] {
            let o = number::make_integer(&mut rt, v).unwrap();
            rt.push(o).unwrap();
        }
        run(&mut rt, Id::Rot).unwrap(); // 1 2 3 -> 2 3 1
        let top = rt.stack(0).unwrap();
        assert_eq!(number::int_value(&rt, top), Some(1));
        run(&mut rt, Id::Swap).unwrap(); // 2 3 1 -> 2 1 3
        let top = rt.stack(0).unwrap();
        assert_eq!(number::int_value(&rt, top), Some(3));
        run(&mut rt, Id::Dup).unwrap();
        assert_eq!(rt.depth(), 4);
        run(&mut rt, Id::Depth).unwrap();
        let top = rt.stack(0).unwrap();
        assert_eq!(number::int_value(&rt, top), Some(4));
    }

    #[test]
    fn arithmetic_reports_type_errors() {
        let mut rt = Runtime::new(4096);
        let t = text::make_text(&mut rt, "x").unwrap();
        let n = number::make_integer(&mut rt, 1).unwrap();
        rt.push(t).unwrap();
        rt.push(n).unwrap();
        assert!(matches!(
            run(&mut rt, Id::Add),
            Err(CoreError::BadArgumentType)
        ));
        // Arguments stay on the stack after a failed command.
        assert_eq!(rt.depth(), 2);
        assert!(rt.error().is_some());
    }

    #[test]
    fn text_addition_concatenates() {
        let mut rt = Runtime::new(4096);
        let a = text::make_text(&mut rt, "Hello ").unwrap();
        let b = text::make_text(&mut rt, "World").unwrap();
        rt.push(a).unwrap();
        rt.push(b).unwrap();
        run(&mut rt, Id::Add).unwrap();
        let top = rt.stack(0).unwrap();
        assert_eq!(text::text_value(&rt, top), Some("Hello World"));
    }

    #[test]
    fn mode_commands_take_arguments() {
        let mut rt = Runtime::new(4096);
        let o = number::make_integer(&mut rt, 5).unwrap();
        rt.push(o).unwrap();
        run(&mut rt, Id::Fix).unwrap();
        assert_eq!(rt.settings.display_mode, DisplayMode::Fix);
        assert_eq!(rt.settings.displayed, 5);
        assert_eq!(rt.depth(), 0);

        let o = number::make_integer(&mut rt, 3).unwrap();
        rt.push(o).unwrap();
        assert!(matches!(
            run(&mut rt, Id::Base),
            Err(CoreError::BadArgumentValue)
        ));
        rt.clear_error();
        run(&mut rt, Id::Hex).unwrap();
        assert_eq!(rt.settings.base, 16);
    }

    #[test]
    fn store_and_recall_roundtrip() {
        let mut rt = Runtime::new(4096);
        let v = number::make_integer(&mut rt, 99).unwrap();
        rt.push(v).unwrap();
        let name = text::make_symbol(&mut rt, "X").unwrap();
        rt.push(name).unwrap();
        run(&mut rt, Id::Sto).unwrap();
        assert_eq!(rt.depth(), 0);

        let name = text::make_symbol(&mut rt, "X").unwrap();
        rt.push(name).unwrap();
        run(&mut rt, Id::Rcl).unwrap();
        let top = rt.stack(0).unwrap();
        assert_eq!(number::int_value(&rt, top), Some(99));
    }
}
