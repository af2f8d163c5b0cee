//! Loading and validating the game configuration.
//!
//! The configuration is a JSON (or JSON5) array of game definitions, usually
//! found at `roms/roms.json`:
//! ```text
//! [
//!   { name: "Frogger", type: "cas.16.zx0", file: "frogger.zx0" },
//!   { name: "Galaxian", type: "msx.32.zx0", files: ["gal.1.zx0", "gal.2.zx0"] },
//!   { name: "Robot", type: "cas.len.zx0", file: "robot.zx0", load: "0x8800",
//!     jump: "0x9000", length: "0x3000", crc16: "0x1d0f" },
//! ]
//! ```
//!
//! [`load()`] parses the raw definitions and [`validate()`] turns them into
//! typed [`GameDefinition`]s, collecting every problem it finds along the way.
//!
//! [`load()`]: fn.load.html
//! [`validate()`]: fn.validate.html
//! [`GameDefinition`]: struct.GameDefinition.html

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;

use crate::error;
use crate::int::Literal;
use crate::types::FileCount;
use crate::types::FileType;
use crate::types::GameType;

/// A game definition exactly as it appears in the configuration file.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawGame {
  /// The display name.
  #[serde(default)]
  pub name: Option<String>,
  /// The game type's name.
  #[serde(default, rename = "type")]
  pub ty: Option<String>,
  /// The image file, for single-file games.
  #[serde(default)]
  pub file: Option<String>,
  /// The image files, for two-file games.
  #[serde(default)]
  pub files: Option<Vec<String>>,
  /// A load address override.
  #[serde(default)]
  pub load: Option<Literal>,
  /// An entry address override.
  #[serde(default)]
  pub jump: Option<Literal>,
  /// The decompressed length, for variable length images.
  #[serde(default)]
  pub length: Option<Literal>,
  /// The CRC-16 of the uncompressed image.
  #[serde(default)]
  pub crc16: Option<Literal>,
}

/// A validated game definition.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct GameDefinition {
  /// The display name; unique within a configuration.
  pub name: String,
  /// The game's type.
  pub ty: GameType,
  /// The game's image files, relative to the ROM directory; one or two.
  pub files: Vec<PathBuf>,
  /// A load address override.
  pub load: Option<u16>,
  /// An entry address override.
  pub jump: Option<u16>,
  /// The decompressed length, for variable length images.
  pub length: Option<u16>,
  /// The CRC-16 of the uncompressed image.
  pub checksum: Option<u16>,
}

impl GameDefinition {
  /// Resolves the concrete type of each of this game's files.
  pub fn file_types(
    &self,
  ) -> impl Iterator<Item = Result<FileType, crate::types::UnknownType>> + '_
  {
    let count = self.files.len();
    (0..count).map(move |i| FileType::resolve(self.ty, i, count))
  }
}

/// The reason a configuration was rejected.
#[derive(Debug)]
pub enum ErrorType {
  /// The configuration file couldn't be read.
  Io(io::Error),
  /// The configuration file isn't a well-formed array of objects.
  Parse(json5::Error),
  /// A game has no `name`.
  MissingName,
  /// A game's name can't be shown by the menu.
  BadName,
  /// Two games share a name.
  DuplicateName,
  /// A game's `type` is missing or isn't one we know.
  BadType(Option<String>),
  /// A required field is missing.
  MissingField(&'static str),
  /// A game was given the wrong number of files for its type.
  WrongFileCount {
    /// The game's type.
    ty: GameType,
    /// How many files were given.
    found: usize,
  },
  /// A numeric field couldn't be parsed, or doesn't fit in 16 bits.
  BadLiteral {
    /// The offending field.
    field: &'static str,
    /// Its value.
    value: Literal,
  },
  /// A `jump` was given for a type whose entry point is fixed.
  JumpReserved(GameType),
  /// A file type has no default load address, and none was given.
  NoDefaultLoad(FileType),
}

/// An error produced while loading or validating a configuration.
#[derive(Debug)]
pub struct Error {
  /// The type of error.
  pub inner: ErrorType,
  /// The configuration file.
  pub path: PathBuf,
  /// The index of the offending game, if the error is about a single game.
  pub index: Option<usize>,
  /// The offending game's name, if it has one.
  pub name: Option<String>,
}

impl fmt::Display for Error {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match &self.inner {
      ErrorType::Io(e) => write!(f, "couldn't read configuration: {}", e),
      ErrorType::Parse(e) => write!(f, "malformed configuration: {}", e),
      ErrorType::MissingName => write!(f, "missing required field 'name'"),
      ErrorType::BadName => write!(
        f,
        "name must be printable ASCII and may not contain '\"'"
      ),
      ErrorType::DuplicateName => write!(f, "duplicate game name"),
      ErrorType::BadType(ty) => {
        match ty {
          Some(ty) => write!(f, "invalid type \"{}\"", ty)?,
          None => write!(f, "missing type")?,
        }
        write!(f, "; 'type' must be one of: ")?;
        for (i, ty) in GameType::ALL.iter().enumerate() {
          if i != 0 {
            write!(f, ", ")?;
          }
          write!(f, "{}", ty)?;
        }
        Ok(())
      }
      ErrorType::MissingField(field) => {
        write!(f, "missing required field '{}'", field)
      }
      ErrorType::WrongFileCount { ty, found } => match ty.file_count() {
        FileCount::One => {
          write!(f, "type {} takes a single 'file', got {}", ty, found)
        }
        _ => write!(f, "type {} should have 2 files, got {}", ty, found),
      },
      ErrorType::BadLiteral { field, value } => {
        write!(f, "bad value {} for '{}'", value, field)
      }
      ErrorType::JumpReserved(ty) => {
        write!(f, "'jump' can't be set for type {}", ty)
      }
      ErrorType::NoDefaultLoad(ty) => {
        write!(f, "type {} has no default load address; set 'load'", ty)
      }
    }
  }
}

impl error::Error for Error {
  fn cause(&self) -> error::Cause<'_> {
    match self.index {
      Some(index) => error::Cause::Game {
        index,
        name: self.name.as_deref(),
      },
      None => error::Cause::File(&self.path),
    }
  }

  fn action(&self) -> Option<error::Action> {
    Some(error::Action::Validating)
  }
}

/// Loads the raw game definitions from the file at `path`.
pub fn load(path: &Path) -> Result<Vec<RawGame>, Error> {
  let whole = |inner| Error {
    inner,
    path: path.to_path_buf(),
    index: None,
    name: None,
  };
  let text = fs::read_to_string(path).map_err(|e| whole(ErrorType::Io(e)))?;
  parse(&text).map_err(|e| whole(ErrorType::Parse(e)))
}

/// Parses the raw game definitions out of configuration text.
pub fn parse(text: &str) -> Result<Vec<RawGame>, json5::Error> {
  json5::from_str(text)
}

/// Validates raw game definitions, which were loaded from `path`.
///
/// Returns the typed games, in configuration order, or every error that was
/// found.
pub fn validate(
  path: &Path,
  raw: &[RawGame],
) -> Result<Vec<GameDefinition>, error::Errors<Error>> {
  let mut errors = error::Errors::new();
  let mut games = Vec::with_capacity(raw.len());
  let mut names = HashSet::new();

  for (index, game) in raw.iter().enumerate() {
    let mut fail = |inner| {
      errors.push(Error {
        inner,
        path: path.to_path_buf(),
        index: Some(index),
        name: game.name.clone(),
      })
    };

    let name = match &game.name {
      Some(name) => name,
      None => {
        fail(ErrorType::MissingName);
        continue;
      }
    };
    if !name.bytes().all(|b| (0x20..0x7f).contains(&b) && b != b'"') {
      fail(ErrorType::BadName);
    }
    if !names.insert(name.as_str()) {
      fail(ErrorType::DuplicateName);
    }

    let ty = match game.ty.as_deref().and_then(GameType::from_name) {
      Some(ty) => ty,
      None => {
        fail(ErrorType::BadType(game.ty.clone()));
        continue;
      }
    };

    let files = match (ty.file_count(), &game.file, &game.files) {
      (FileCount::Two, _, None) => {
        fail(ErrorType::MissingField("files"));
        continue;
      }
      (FileCount::One, None, _) => {
        fail(ErrorType::MissingField("file"));
        continue;
      }
      (FileCount::OneOrTwo, None, None) => {
        fail(ErrorType::MissingField("file' or 'files"));
        continue;
      }
      (FileCount::Two, _, Some(files)) | (FileCount::OneOrTwo, _, Some(files)) => {
        if files.len() != 2 {
          fail(ErrorType::WrongFileCount {
            ty,
            found: files.len(),
          });
          continue;
        }
        files.iter().map(PathBuf::from).collect::<Vec<_>>()
      }
      (_, Some(file), _) => vec![PathBuf::from(file)],
    };

    let mut word = |field, value: &Option<Literal>| match value {
      Some(lit) => match lit.to_word() {
        Some(n) => Some(n),
        None => {
          fail(ErrorType::BadLiteral {
            field,
            value: lit.clone(),
          });
          None
        }
      },
      None => None,
    };
    let load = word("load", &game.load);
    let jump = word("jump", &game.jump);
    let length = word("length", &game.length);
    let checksum = word("crc16", &game.crc16);

    if ty.needs_length() && game.length.is_none() {
      fail(ErrorType::MissingField("length"));
    }
    if ty.is_msx() && game.jump.is_some() {
      fail(ErrorType::JumpReserved(ty));
    }

    let game = GameDefinition {
      name: name.clone(),
      ty,
      files,
      load,
      jump,
      length,
      checksum,
    };
    if game.load.is_none() {
      for file_ty in game.file_types().filter_map(Result::ok) {
        if file_ty.default_load().is_none() {
          fail(ErrorType::NoDefaultLoad(file_ty));
        }
      }
    }
    games.push(game);
  }

  errors.into_result(games)
}
