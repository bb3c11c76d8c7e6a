//! Process-wide formatting and numeric settings.
//!
//! The record is read by the renderer and by the mode commands. It
//! serializes as tolerant JSON so a partially-written settings file still
//! loads with defaults for the missing fields.

use serde::{Deserialize, Serialize};

/// Default number of digits shown in `Normal` display mode.
pub const STD_DISPLAYED: u16 = 20;

/// Digits carried by the decimal backend.
pub const MAX_PRECISION: u16 = 28;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DisplayMode {
    #[default]
    Normal,
    Fix,
    Sci,
    Eng,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AngleMode {
    #[default]
    Degrees,
    Radians,
    Grads,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum CommandFormat {
    Lowercase,
    Uppercase,
    Capitalized,
    #[default]
    LongForm,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Internal decimal precision, in digits.
    pub precision: u16,
    /// Display mode for decimal numbers.
    pub display_mode: DisplayMode,
    /// Number of digits shown.
    pub displayed: u16,
    /// Character used as the fractional separator (`.` or `,`).
    pub decimal_mark: char,
    /// Character introducing a scientific exponent.
    pub exponent_mark: char,
    /// Exponent magnitude above which `Normal` switches to scientific.
    pub standard_exp: u16,
    /// Interpretation of trigonometric arguments.
    pub angle_mode: AngleMode,
    /// Default base for `#…` literals without a suffix letter.
    pub base: u8,
    /// Bit width for based-integer arithmetic.
    pub wordsize: u16,
    /// Preferred rendering of command names.
    pub command_fmt: CommandFormat,
    /// Show a trailing decimal mark on integral decimals.
    pub show_decimal: bool,
    /// Render exponents with superscript glyphs.
    pub fancy_exponent: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            precision: MAX_PRECISION,
            display_mode: DisplayMode::Normal,
            displayed: STD_DISPLAYED,
            decimal_mark: '.',
            exponent_mark: '⁳',
            standard_exp: 9,
            angle_mode: AngleMode::Degrees,
            base: 16,
            wordsize: 64,
            command_fmt: CommandFormat::LongForm,
            show_decimal: true,
            fancy_exponent: true,
        }
    }
}
