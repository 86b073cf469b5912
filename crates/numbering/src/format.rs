//! Display labels for issued numbers
//!
//! A label is assembled as `[subject] [prefix] #[number] [suffix]`, skipping
//! any part that is absent or empty. The number itself is rendered in one of
//! three styles:
//!
//! - `simple`: plain decimal (`7`)
//! - `padded`: zero-padded to a minimum width, 3 by default (`007`)
//! - `roman`: subtractive roman numerals (`VII`), up to `MAX_ROMAN`
//!
//! Labels are rendered once when a number is issued and stored with the
//! assignment record, so changing the configured style only affects numbers
//! issued afterwards.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const DEFAULT_PADDING: usize = 3;
pub const DEFAULT_PREFIX: &str = "Test";
/// Largest value with a standard roman numeral (MMMCMXCIX)
pub const MAX_ROMAN: i64 = 3999;

const ROMAN_NUMERALS: [(i64, &str); 13] = [
    (1000, "M"),
    (900, "CM"),
    (500, "D"),
    (400, "CD"),
    (100, "C"),
    (90, "XC"),
    (50, "L"),
    (40, "XL"),
    (10, "X"),
    (9, "IX"),
    (5, "V"),
    (4, "IV"),
    (1, "I"),
];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("cannot format non-positive number {0}")]
    NonPositive(i64),
    #[error("{value} is too large for roman numerals (max {max})")]
    TooLarge { value: i64, max: i64 },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NumberStyle {
    #[default]
    Simple,
    Padded,
    Roman,
}

impl fmt::Display for NumberStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NumberStyle::Simple => "simple",
            NumberStyle::Padded => "padded",
            NumberStyle::Roman => "roman",
        };
        f.write_str(name)
    }
}

impl FromStr for NumberStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "simple" => Ok(NumberStyle::Simple),
            "padded" => Ok(NumberStyle::Padded),
            "roman" => Ok(NumberStyle::Roman),
            other => Err(format!(
                "unknown number style '{}', expected simple, padded or roman",
                other
            )),
        }
    }
}

/// Everything needed to turn an issued number into a label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayFormat {
    #[serde(default)]
    pub style: NumberStyle,
    /// Minimum digits for `padded`, ignored by the other styles
    #[serde(default)]
    pub padding: Option<usize>,
    #[serde(default)]
    pub subject_name: Option<String>,
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub suffix: Option<String>,
}

impl Default for DisplayFormat {
    fn default() -> Self {
        Self {
            style: NumberStyle::Simple,
            padding: None,
            subject_name: None,
            prefix: Some(DEFAULT_PREFIX.to_string()),
            suffix: None,
        }
    }
}

impl DisplayFormat {
    pub fn with_style(mut self, style: NumberStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_subject(mut self, subject_name: Option<String>) -> Self {
        self.subject_name = subject_name;
        self
    }

    /// Render `value` as a full label
    pub fn label(&self, value: i64) -> Result<String, FormatError> {
        let number = format_number(value, self.style, self.padding)?;

        let mut parts: Vec<String> = Vec::with_capacity(4);
        if let Some(subject) = non_empty(&self.subject_name) {
            parts.push(subject.to_string());
        }
        if let Some(prefix) = non_empty(&self.prefix) {
            parts.push(prefix.to_string());
        }
        parts.push(format!("#{}", number));
        if let Some(suffix) = non_empty(&self.suffix) {
            parts.push(suffix.to_string());
        }

        Ok(parts.join(" "))
    }
}

fn non_empty(part: &Option<String>) -> Option<&str> {
    part.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Render the bare number in the requested style
pub fn format_number(value: i64, style: NumberStyle, padding: Option<usize>) -> Result<String, FormatError> {
    if value < 1 {
        return Err(FormatError::NonPositive(value));
    }

    let rendered = match style {
        NumberStyle::Simple => value.to_string(),
        NumberStyle::Padded => {
            let width = padding.unwrap_or(DEFAULT_PADDING);
            format!("{:0width$}", value, width = width)
        }
        NumberStyle::Roman => to_roman(value)?,
    };

    Ok(rendered)
}

/// Greedy largest-first roman numeral conversion
pub fn to_roman(value: i64) -> Result<String, FormatError> {
    if value < 1 {
        return Err(FormatError::NonPositive(value));
    }
    if value > MAX_ROMAN {
        return Err(FormatError::TooLarge { value, max: MAX_ROMAN });
    }

    let mut remaining = value;
    let mut out = String::new();
    for (weight, numeral) in ROMAN_NUMERALS {
        while remaining >= weight {
            out.push_str(numeral);
            remaining -= weight;
        }
    }
    Ok(out)
}
