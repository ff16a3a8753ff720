//! Label text for measurement overlays.

use constants::units::DEFAULT_LENGTH_UNIT;
use serde::{Deserialize, Serialize};

/// Unit suffix applied to every rendered quantity of a chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LengthUnit {
    pub code: String,
}

impl Default for LengthUnit {
    fn default() -> Self {
        Self::new(DEFAULT_LENGTH_UNIT)
    }
}

impl LengthUnit {
    pub fn new(code: impl Into<String>) -> Self {
        Self { code: code.into() }
    }
}

/// Fixed-precision decimal with `,` grouping in the integer part.
pub fn format_number(value: f32, decimals: usize) -> String {
    let fixed = format!("{value:.decimals$}");
    let (sign, unsigned) = match fixed.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", fixed.as_str()),
    };
    let (integer, fraction) = match unsigned.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (unsigned, None),
    };

    let mut grouped = String::with_capacity(integer.len() + integer.len() / 3);
    for (i, digit) in integer.chars().enumerate() {
        if i > 0 && (integer.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    match fraction {
        Some(f) => format!("{sign}{grouped}.{f}"),
        None => format!("{sign}{grouped}"),
    }
}

pub fn format_length(value: f32, unit: &LengthUnit) -> String {
    format!("{} {}", format_number(value, 2), unit.code)
}

pub fn format_area(value: f32, unit: &LengthUnit) -> String {
    format!("{} {}\u{00B2}", format_number(value, 1), unit.code)
}

/// `radians` rendered in degrees.
pub fn format_angle(radians: f32) -> String {
    format!("{}\u{00B0}", format_number(radians.to_degrees(), 1))
}
