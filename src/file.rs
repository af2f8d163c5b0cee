//! The file enumerator, which expands games into the files they are made of.
//!
//! Each [`GameDefinition`] turns into one or two [`FileEntry`]s, in order.
//! Every entry carries everything the firmware needs to know about a file
//! except where it ends up in the ROM, which is the allocator's job.
//!
//! [`GameDefinition`]: ../config/struct.GameDefinition.html
//! [`FileEntry`]: struct.FileEntry.html

use std::fmt;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use crate::config::GameDefinition;
use crate::error;
use crate::types::FileType;
use crate::types::UnknownType;

/// A single physical file belonging to a game, along with its contents.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct FileEntry {
  name: PathBuf,
  game: usize,
  game_name: String,
  ty: FileType,
  data: Vec<u8>,
  load: u16,
  jump: Option<u16>,
  length: Option<u16>,
  checksum: u16,
}

impl FileEntry {
  /// Creates a new `FileEntry` of type `ty` with the given contents, using the
  /// type's default addresses.
  ///
  /// Returns `None` if the type has no default load address.
  pub fn new(
    name: impl Into<PathBuf>,
    game_name: impl Into<String>,
    ty: FileType,
    data: Vec<u8>,
  ) -> Option<Self> {
    Some(FileEntry {
      name: name.into(),
      game: 0,
      game_name: game_name.into(),
      ty,
      data,
      load: ty.default_load()?,
      jump: ty.default_jump(),
      length: None,
      checksum: 0,
    })
  }

  /// Returns the file name, relative to the ROM directory.
  pub fn file_name(&self) -> &Path {
    &self.name
  }

  /// Returns the index of the owning game in the configuration.
  pub fn game(&self) -> usize {
    self.game
  }

  /// Returns the owning game's display name.
  pub fn game_name(&self) -> &str {
    &self.game_name
  }

  /// Returns this file's type.
  pub fn ty(&self) -> FileType {
    self.ty
  }

  /// Returns the contents of this file.
  pub fn data(&self) -> &[u8] {
    &self.data
  }

  /// Returns the size of this file, in bytes.
  pub fn size(&self) -> usize {
    self.data.len()
  }

  /// Returns the address the firmware loads this file to.
  pub fn load(&self) -> u16 {
    self.load
  }

  /// Returns the address execution starts at, if this file is executable.
  pub fn jump(&self) -> Option<u16> {
    self.jump
  }

  /// Returns the declared decompressed length, for variable length images.
  pub fn length(&self) -> Option<u16> {
    self.length
  }

  /// Returns the CRC-16 of the uncompressed image; zero if none was given.
  pub fn checksum(&self) -> u16 {
    self.checksum
  }

  /// Sets the load address.
  pub fn with_load(mut self, load: u16) -> Self {
    self.load = load;
    self
  }

  /// Sets the index of the owning game.
  pub fn with_game(mut self, game: usize) -> Self {
    self.game = game;
    self
  }
}

/// The reason a game's files couldn't be enumerated.
#[derive(Debug)]
pub enum ErrorType {
  /// The game's type has no mapping for one of its files.
  UnknownType(UnknownType),
  /// The file's type has no default load address, and none was given.
  NoLoad(FileType),
  /// The file couldn't be read.
  Io(io::Error),
}

/// An error produced while enumerating a game's files.
#[derive(Debug)]
pub struct Error {
  /// The type of error.
  pub inner: ErrorType,
  /// The file the error is about.
  pub file: PathBuf,
}

impl fmt::Display for Error {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match &self.inner {
      ErrorType::UnknownType(e) => write!(f, "{}", e),
      ErrorType::NoLoad(ty) => {
        write!(f, "no load address for file of type {}", ty)
      }
      ErrorType::Io(e) => write!(f, "failed to read file: {}", e),
    }
  }
}

impl error::Error for Error {
  fn cause(&self) -> error::Cause<'_> {
    error::Cause::File(&self.file)
  }

  fn action(&self) -> Option<error::Action> {
    Some(error::Action::Reading)
  }
}

/// Expands `games` into their files, in order.
///
/// `read` is used to fetch the contents of each file, given its name as it
/// appears in the configuration.
pub fn enumerate(
  games: &[GameDefinition],
  mut read: impl FnMut(&Path) -> io::Result<Vec<u8>>,
) -> Result<Vec<FileEntry>, error::Errors<Error>> {
  let mut errors = error::Errors::new();
  let mut files = Vec::new();

  for (index, game) in games.iter().enumerate() {
    for (path, ty) in game.files.iter().zip(game.file_types()) {
      let fail = |inner| Error {
        inner,
        file: path.clone(),
      };

      let ty = match ty {
        Ok(ty) => ty,
        Err(e) => {
          errors.push(fail(ErrorType::UnknownType(e)));
          continue;
        }
      };
      let load = match game.load.or_else(|| ty.default_load()) {
        Some(load) => load,
        None => {
          errors.push(fail(ErrorType::NoLoad(ty)));
          continue;
        }
      };
      let data = match read(path.as_path()) {
        Ok(data) => data,
        Err(e) => {
          errors.push(fail(ErrorType::Io(e)));
          continue;
        }
      };

      files.push(FileEntry {
        name: path.clone(),
        game: index,
        game_name: game.name.clone(),
        ty,
        data,
        load,
        jump: game.jump.or_else(|| ty.default_jump()),
        length: game.length,
        checksum: game.checksum.unwrap_or(0),
      });
    }
  }

  errors.into_result(files)
}
