//! The type registry: game kinds, and the concrete file types they expand to.
//!
//! Every game in the configuration has a [`GameType`], naming the machine it
//! targets, its size, and the compressor it was packed with. A game is made of
//! one or two files; each file gets a [`FileType`], which is what the firmware
//! actually sees, as a one-byte type code.
//!
//! [`GameType`]: enum.GameType.html
//! [`FileType`]: enum.FileType.html

use std::fmt;

use serde::Serialize;

/// The in-memory size of the images that have a fixed size.
pub const FIXED_FOOTPRINT: u16 = 16384;

macro_rules! game_types {
  ($($(#[$meta:meta])* $variant:ident = $name:tt,)*) => {
    /// A kind of game, as named by the `type` field of the configuration.
    #[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
    pub enum GameType {
      $($(#[$meta])* $variant,)*
    }

    impl GameType {
      /// Every game type, in registry order.
      pub const ALL: &'static [GameType] = &[$(Self::$variant,)*];

      /// Parses a configuration type name into a `GameType`.
      ///
      /// ```
      /// # use cartpack::types::GameType;
      /// assert_eq!(GameType::from_name("cas.8"), Some(GameType::Cas8));
      /// assert_eq!(GameType::from_name("cas.9"), None);
      /// ```
      pub fn from_name(s: &str) -> Option<Self> {
        match s {
          $($name => Some(Self::$variant),)*
          _ => None,
        }
      }

      /// Returns this type's configuration name.
      pub fn name(self) -> &'static str {
        match self {
          $(Self::$variant => $name,)*
        }
      }
    }
  }
}

game_types! {
  /// A 16K cassette image, ZX0 compressed.
  Cas16Zx0 = "cas.16.zx0",
  /// A 32K ROM image, ZX0 compressed.
  Rom32Zx0 = "rom.32.zx0",
  /// An uncompressed 16K cassette image.
  Cas16 = "cas.16",
  /// An uncompressed 8K cassette image.
  Cas8 = "cas.8",
  /// A 32K MSX ROM, as two Pletter compressed halves.
  Msx32Pletter = "msx.32.pletter",
  /// A 32K MSX ROM, as two ZX0 compressed halves.
  Msx32Zx0 = "msx.32.zx0",
  /// A 16K MSX ROM, ZX0 compressed.
  Msx16Zx0 = "msx.16.zx0",
  /// A 48K ROM, ZX0 compressed either in one piece or as a 32K and a 16K
  /// half.
  Rom48Zx0 = "rom.48.zx0",
  /// A variable length cassette image, ZX0 compressed.
  CasLenZx0 = "cas.len.zx0",
}

/// The number of files a game type must be given as.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum FileCount {
  /// Exactly one file, given as `file`.
  One,
  /// Exactly two files, given as `files`.
  Two,
  /// Either a single `file`, or two `files`.
  OneOrTwo,
}

impl GameType {
  /// Returns how many files a game of this type is made of.
  pub fn file_count(self) -> FileCount {
    match self {
      Self::Msx32Pletter | Self::Msx32Zx0 => FileCount::Two,
      Self::Rom48Zx0 => FileCount::OneOrTwo,
      _ => FileCount::One,
    }
  }

  /// Returns whether a game of this type must declare its in-memory length.
  pub fn needs_length(self) -> bool {
    self == Self::CasLenZx0
  }

  /// Returns whether this is an MSX ROM, whose entry point is fixed by the
  /// ROM header rather than by the configuration.
  pub fn is_msx(self) -> bool {
    match self {
      Self::Msx32Pletter | Self::Msx32Zx0 | Self::Msx16Zx0 => true,
      _ => false,
    }
  }
}

impl fmt::Display for GameType {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    f.write_str(self.name())
  }
}

/// How much memory a compressed image decompresses into, for the purposes of
/// in-place decompression.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Footprint {
  /// The image is not decompressed in place; no margin is needed.
  None,
  /// The image always decompresses into exactly this many bytes.
  Fixed(u16),
  /// The image decompresses into its declared `length`.
  Declared,
}

/// A table of file types: variant, name, code, default load and jump
/// addresses, and footprint.
macro_rules! file_types {
  ($($(#[$meta:meta])* $variant:ident = $code:literal, $name:tt {
    load: $load:expr,
    jump: $jump:expr,
    footprint: $footprint:expr,
  })*) => {
    /// A concrete file type, as seen by the firmware.
    #[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize)]
    pub enum FileType {
      $($(#[$meta])* #[serde(rename = $name)] $variant,)*
    }

    impl FileType {
      /// Every file type, in registry order.
      pub const ALL: &'static [FileType] = &[$(Self::$variant,)*];

      /// Returns the one-byte code the firmware knows this type by.
      pub fn code(self) -> u8 {
        match self {
          $(Self::$variant => $code,)*
        }
      }

      /// Returns the dotted name of this type, like `msx.32.zx0.1`.
      pub fn name(self) -> &'static str {
        match self {
          $(Self::$variant => $name,)*
        }
      }

      /// Returns the address this type is loaded at, unless the configuration
      /// says otherwise.
      pub fn default_load(self) -> Option<u16> {
        match self {
          $(Self::$variant => $load,)*
        }
      }

      /// Returns the address execution starts at, unless the configuration
      /// says otherwise. `None` means the file is not independently
      /// executable.
      pub fn default_jump(self) -> Option<u16> {
        match self {
          $(Self::$variant => $jump,)*
        }
      }

      /// Returns this type's decompression footprint.
      pub fn footprint(self) -> Footprint {
        match self {
          $(Self::$variant => $footprint,)*
        }
      }
    }

    #[test]
    fn unique_codes() {
      let mut set = std::collections::HashSet::new();
      for code in &[$($code,)*] {
        assert!(set.insert(*code), "duplicate type code: {:#x}", code);
      }
    }
  }
}

file_types! {
  /// A 16K cassette image, ZX0 compressed.
  Cas16Zx0 = 0x00, "cas.16.zx0" {
    load: Some(0x8800),
    jump: Some(0x8800),
    footprint: Footprint::None,
  }
  /// A 32K ROM image, ZX0 compressed.
  Rom32Zx0 = 0x01, "rom.32.zx0" {
    load: Some(0x0000),
    jump: Some(0x0000),
    footprint: Footprint::None,
  }
  /// An uncompressed 16K cassette image.
  Cas16 = 0x02, "cas.16" {
    load: Some(0x8800),
    jump: Some(0x8800),
    footprint: Footprint::None,
  }
  /// An uncompressed 8K cassette image.
  Cas8 = 0x03, "cas.8" {
    load: Some(0x8800),
    jump: Some(0x8800),
    footprint: Footprint::None,
  }
  /// The first half of a Pletter compressed 32K MSX ROM.
  Msx32Pletter1 = 0x04, "msx.32.pletter.1" {
    load: Some(0x8800),
    jump: None,
    footprint: Footprint::Fixed(FIXED_FOOTPRINT),
  }
  /// The second half of a Pletter compressed 32K MSX ROM.
  Msx32Pletter2 = 0x05, "msx.32.pletter.2" {
    load: Some(0x8800),
    jump: None,
    footprint: Footprint::Fixed(FIXED_FOOTPRINT),
  }
  /// The first half of a ZX0 compressed 32K MSX ROM.
  Msx32Zx01 = 0x06, "msx.32.zx0.1" {
    load: Some(0x8800),
    jump: None,
    footprint: Footprint::Fixed(FIXED_FOOTPRINT),
  }
  /// The second half of a ZX0 compressed 32K MSX ROM.
  Msx32Zx02 = 0x07, "msx.32.zx0.2" {
    load: Some(0x8800),
    jump: None,
    footprint: Footprint::Fixed(FIXED_FOOTPRINT),
  }
  /// A ZX0 compressed 16K MSX ROM.
  Msx16Zx0 = 0x08, "msx.16.zx0" {
    load: Some(0x8800),
    jump: None,
    footprint: Footprint::Fixed(FIXED_FOOTPRINT),
  }
  /// The first, 32K, half of a ZX0 compressed 48K ROM.
  Rom48Zx01 = 0x09, "rom.48.zx0.1" {
    load: Some(0x0000),
    jump: None,
    footprint: Footprint::None,
  }
  /// The second, 16K, half of a ZX0 compressed 48K ROM.
  Rom48Zx02 = 0x0a, "rom.48.zx0.2" {
    load: Some(0x8000),
    jump: Some(0x0000),
    footprint: Footprint::Fixed(FIXED_FOOTPRINT),
  }
  /// A ZX0 compressed 48K ROM in a single piece.
  Rom48Zx0 = 0x0b, "rom.48.zx0" {
    load: Some(0x0000),
    jump: Some(0x0000),
    footprint: Footprint::None,
  }
  /// A variable length cassette image, ZX0 compressed.
  CasLenZx0 = 0x0c, "cas.len.zx0" {
    load: None,
    jump: None,
    footprint: Footprint::Declared,
  }
}

/// Indicates that a game type has no file type for a given file position.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct UnknownType {
  /// The game's type.
  pub game: GameType,
  /// The position of the file within the game.
  pub index: usize,
  /// How many files the game has.
  pub count: usize,
}

impl fmt::Display for UnknownType {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    if self.count > 1 {
      write!(f, "no type mapping for {}.{}", self.game, self.index + 1)
    } else {
      write!(f, "no type mapping for {}", self.game)
    }
  }
}

impl FileType {
  /// Resolves the type of file number `index` of a game of type `game` that
  /// is made of `count` files.
  ///
  /// ```
  /// # use cartpack::types::*;
  /// assert_eq!(
  ///   FileType::resolve(GameType::Rom48Zx0, 1, 2),
  ///   Ok(FileType::Rom48Zx02),
  /// );
  /// assert!(FileType::resolve(GameType::Cas8, 0, 2).is_err());
  /// ```
  pub fn resolve(
    game: GameType,
    index: usize,
    count: usize,
  ) -> Result<Self, UnknownType> {
    use crate::types::GameType as G;
    let ty = match (game, count, index) {
      (G::Cas16Zx0, 1, 0) => Self::Cas16Zx0,
      (G::Rom32Zx0, 1, 0) => Self::Rom32Zx0,
      (G::Cas16, 1, 0) => Self::Cas16,
      (G::Cas8, 1, 0) => Self::Cas8,
      (G::Msx32Pletter, 2, 0) => Self::Msx32Pletter1,
      (G::Msx32Pletter, 2, 1) => Self::Msx32Pletter2,
      (G::Msx32Zx0, 2, 0) => Self::Msx32Zx01,
      (G::Msx32Zx0, 2, 1) => Self::Msx32Zx02,
      (G::Msx16Zx0, 1, 0) => Self::Msx16Zx0,
      (G::Rom48Zx0, 1, 0) => Self::Rom48Zx0,
      (G::Rom48Zx0, 2, 0) => Self::Rom48Zx01,
      (G::Rom48Zx0, 2, 1) => Self::Rom48Zx02,
      (G::CasLenZx0, 1, 0) => Self::CasLenZx0,
      _ => return Err(UnknownType { game, index, count }),
    };
    Ok(ty)
  }
}

impl fmt::Display for FileType {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    f.write_str(self.name())
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn names_round_trip() {
    for &ty in GameType::ALL {
      assert_eq!(GameType::from_name(ty.name()), Some(ty));
    }
  }

  #[test]
  fn every_file_type_is_reachable() {
    let mut seen = Vec::new();
    for &game in GameType::ALL {
      for count in 1..=2 {
        for index in 0..count {
          if let Ok(ty) = FileType::resolve(game, index, count) {
            seen.push(ty);
          }
        }
      }
    }
    for ty in FileType::ALL {
      assert!(seen.contains(ty), "{} is unreachable", ty);
    }
  }

  #[test]
  fn halves_are_suffixed() {
    let ty = FileType::resolve(GameType::Msx32Zx0, 0, 2).unwrap();
    assert_eq!(ty.name(), "msx.32.zx0.1");
    assert_eq!(ty.code(), 0x06);
    let ty = FileType::resolve(GameType::Msx32Pletter, 1, 2).unwrap();
    assert_eq!(ty.name(), "msx.32.pletter.2");
    assert_eq!(ty.code(), 0x05);
  }

  #[test]
  fn unknown_combinations() {
    let err = FileType::resolve(GameType::Msx32Zx0, 0, 1).unwrap_err();
    assert_eq!(err.to_string(), "no type mapping for msx.32.zx0");
    let err = FileType::resolve(GameType::Cas16, 1, 2).unwrap_err();
    assert_eq!(err.to_string(), "no type mapping for cas.16.2");
    assert!(FileType::resolve(GameType::Rom48Zx0, 2, 3).is_err());
  }

  #[test]
  fn defaults() {
    assert_eq!(FileType::Rom48Zx02.default_load(), Some(0x8000));
    assert_eq!(FileType::Rom48Zx02.default_jump(), Some(0x0000));
    assert_eq!(FileType::Rom48Zx01.default_jump(), None);
    assert_eq!(FileType::Msx16Zx0.default_jump(), None);
    assert_eq!(FileType::Cas8.default_jump(), Some(0x8800));
    assert_eq!(FileType::CasLenZx0.default_load(), None);
  }

  #[test]
  fn footprints() {
    for &ty in FileType::ALL {
      let expected = if ty.name().starts_with("msx") || ty == FileType::Rom48Zx02
      {
        Footprint::Fixed(16384)
      } else if ty == FileType::CasLenZx0 {
        Footprint::Declared
      } else {
        Footprint::None
      };
      assert_eq!(ty.footprint(), expected, "{}", ty);
    }
  }
}
