//! Integer literals as they appear in a game configuration.
//!
//! Addresses and checksums in `roms.json` are usually written as strings, so
//! that they can be given in hexadecimal. A literal can be formatted as
//! decimal or hexadecimal, with the following syntaxes:
//! - Decimal: `0`, `34816`, etc.
//! - Hexadecimal: `$8800` (classic style), `0x8800` (C-style);
//!   case-insensitive.
//!
//! Underscores may be interspersed throughout the digits, except as the first
//! character, to separate groups: `$88_00`. Plain JSON numbers are accepted
//! too.

use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use serde::Serialize;

lazy_static! {
  static ref LITERAL: Regex =
    Regex::new(r"(?i)^(?:(?P<prefix>0x|\$)(?P<hex>[0-9a-f][0-9a-f_]*)|(?P<dec>[0-9][0-9_]*))$")
      .unwrap();
}

/// A digit style: decimal or hex.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum DigitStyle {
  /// Decimal style: `123`.
  Dec,
  /// Hex style: `$dead` or `0xdead`.
  Hex,
}

impl DigitStyle {
  /// Returns this style's associated radix.
  pub fn radix(self) -> u32 {
    match self {
      Self::Dec => 10,
      Self::Hex => 16,
    }
  }
}

/// An integer literal from the configuration, before range checking.
#[derive(Clone, PartialEq, Eq, Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Literal {
  /// A bare JSON number.
  Num(u64),
  /// A string holding a decimal or hexadecimal literal.
  Str(String),
}

impl Literal {
  /// Parses this literal into a `u32`, if it is well-formed and in range.
  pub fn to_u32(&self) -> Option<u32> {
    match self {
      Self::Num(n) if *n <= u32::MAX as u64 => Some(*n as u32),
      Self::Num(_) => None,
      Self::Str(s) => parse(s).map(|(n, _)| n),
    }
  }

  /// Parses this literal into a 16-bit word, failing if it doesn't fit.
  pub fn to_word(&self) -> Option<u16> {
    self.to_u32().and_then(|n| if n <= 0xffff { Some(n as u16) } else { None })
  }
}

impl fmt::Display for Literal {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      Self::Num(n) => write!(f, "{}", n),
      Self::Str(s) => write!(f, "\"{}\"", s),
    }
  }
}

/// Parses a literal string, returning its value and the style it was written
/// in.
///
/// Surrounding whitespace is ignored.
pub fn parse(s: &str) -> Option<(u32, DigitStyle)> {
  let caps = LITERAL.captures(s.trim())?;
  let (digits, style) = match caps.name("hex") {
    Some(hex) => (hex.as_str(), DigitStyle::Hex),
    None => (caps.name("dec")?.as_str(), DigitStyle::Dec),
  };
  let digits = digits.replace('_', "");
  u32::from_str_radix(&digits, style.radix())
    .ok()
    .map(|n| (n, style))
}

/// Formats a 16-bit word the way the data table spells addresses.
pub fn hex_word(n: u16) -> String {
  format!("0x{:04x}", n)
}
