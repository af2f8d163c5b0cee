//! The build pipeline, from validated games to cartridge artifacts.
//!
//! A build runs in four stages, each of which may fail:
//! 1. Enumeration, which expands games into files and reads their images.
//! 2. Allocation, which lays the files out into sectors.
//! 3. Sector building, which copies the files into sector images.
//! 4. Table generation, which describes the layout to the firmware.
//!
//! Nothing is written to disk until every stage has succeeded.

use std::fmt;
use std::fs;
use std::io;
use std::io::Write as _;
use std::path::Path;
use std::path::PathBuf;

use log::info;
use serde::Serialize;

use crate::alloc;
use crate::alloc::Allocation;
use crate::alloc::Geometry;
use crate::alloc::Placement;
use crate::config::GameDefinition;
use crate::error;
use crate::file;
use crate::file::FileEntry;
use crate::rom;
use crate::rom::Sector;
use crate::table;
use crate::table::Table;
use crate::types::FileType;

/// The name of the generated data table.
pub const TABLE_FILE: &str = "gamedata.asm";

/// An error produced by any stage of a build.
#[derive(Debug)]
pub enum Error {
  /// One or more files couldn't be enumerated.
  Read(error::Errors<file::Error>),
  /// The files couldn't be laid out.
  Allocate(alloc::Error),
  /// The sector images couldn't be built or written.
  Sectors(rom::Error),
  /// The data table couldn't be generated.
  Table(table::Error),
  /// An artifact other than a sector couldn't be written.
  Io {
    /// The file being written.
    path: PathBuf,
    /// The underlying error.
    error: io::Error,
  },
}

impl Error {
  /// Dumps this error to `stderr` and exits the process with `code`.
  pub fn dump_and_die(self, code: i32) {
    match self {
      Self::Read(errors) => errors.dump_and_die(code),
      Self::Allocate(e) => error::Errors::from(e).dump_and_die(code),
      Self::Sectors(e) => error::Errors::from(e).dump_and_die(code),
      Self::Table(e) => error::Errors::from(e).dump_and_die(code),
      Self::Io { path, error } => {
        eprintln!("error: couldn't write {}: {}", path.display(), error);
        std::process::exit(code)
      }
    }
  }
}

impl fmt::Display for Error {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      Self::Read(errors) => {
        write!(f, "{} files couldn't be read", errors.len())
      }
      Self::Allocate(e) => write!(f, "{}", e),
      Self::Sectors(e) => write!(f, "{}", e),
      Self::Table(e) => write!(f, "{}", e),
      Self::Io { path, error } => {
        write!(f, "couldn't write {}: {}", path.display(), error)
      }
    }
  }
}

impl From<error::Errors<file::Error>> for Error {
  fn from(e: error::Errors<file::Error>) -> Self {
    Self::Read(e)
  }
}

impl From<alloc::Error> for Error {
  fn from(e: alloc::Error) -> Self {
    Self::Allocate(e)
  }
}

impl From<rom::Error> for Error {
  fn from(e: rom::Error) -> Self {
    Self::Sectors(e)
  }
}

impl From<table::Error> for Error {
  fn from(e: table::Error) -> Self {
    Self::Table(e)
  }
}

/// The in-memory result of a successful build.
#[derive(Debug)]
pub struct Build {
  geometry: Geometry,
  files: Vec<FileEntry>,
  allocation: Allocation,
  sectors: Vec<Sector>,
  table: Table,
}

/// Runs every stage of a build over `games`.
///
/// `read` fetches the contents of each file, given its name as it appears in
/// the configuration. If `check_crc` is set, the table carries a checksum for
/// every file.
pub fn run(
  games: &[GameDefinition],
  geometry: &Geometry,
  check_crc: bool,
  read: impl FnMut(&Path) -> io::Result<Vec<u8>>,
) -> Result<Build, Error> {
  info!(
    "{} sectors, {} byte loader, games start at {}",
    geometry.sector_count(),
    geometry.loader_size(),
    geometry.data_start(0)
  );

  let files = file::enumerate(games, read)?;
  let allocation = alloc::allocate(geometry, &files)?;
  let sectors = rom::build_sectors(geometry, &allocation, &files)?;
  let table = Table::build(&files, &allocation, check_crc)?;

  Ok(Build {
    geometry: *geometry,
    files,
    allocation,
    sectors,
    table,
  })
}

impl Build {
  /// Returns every file, in configuration order.
  pub fn files(&self) -> &[FileEntry] {
    &self.files
  }

  /// Returns the layout the files were given.
  pub fn allocation(&self) -> &Allocation {
    &self.allocation
  }

  /// Returns every sector image, including empty ones.
  pub fn sectors(&self) -> &[Sector] {
    &self.sectors
  }

  /// Returns the data table.
  pub fn table(&self) -> &Table {
    &self.table
  }

  /// Writes the sector images and the data table into `dir`, which must
  /// exist.
  pub fn write(&self, dir: &Path) -> Result<(), Error> {
    rom::write_sectors(dir, &self.sectors)?;

    let path = dir.join(TABLE_FILE);
    let io_error = |error| Error::Io {
      path: path.clone(),
      error,
    };
    let mut out = io::BufWriter::new(fs::File::create(&path).map_err(io_error)?);
    self.table.write_asm(&mut out).map_err(io_error)?;
    out.flush().map_err(io_error)?;
    info!("created {}", path.display());
    Ok(())
  }

  /// Returns a serializable summary of where everything went.
  pub fn report(&self) -> Report<'_> {
    Report {
      geometry: &self.geometry,
      files: self
        .files
        .iter()
        .zip(&self.allocation.placements)
        .map(|(file, placement)| FileReport {
          file: file.file_name(),
          game: file.game_name(),
          ty: file.ty(),
          size: file.size(),
          placement,
        })
        .collect(),
      sectors_used: self.allocation.last_sector + 1,
      bytes_used: self.allocation.bytes_used,
      bytes_free: self.allocation.bytes_free,
    }
  }

  /// Dumps the non-empty rows of every sector to `w`.
  pub fn dump(&self, mut w: impl io::Write) -> io::Result<()> {
    for sector in self.sectors.iter().filter(|s| !s.is_empty()) {
      sector.dump(&mut w)?;
    }
    Ok(())
  }
}

/// A summary of a build's layout, meant to be serialized.
#[derive(Serialize, Debug)]
pub struct Report<'a> {
  /// The cartridge's shape.
  pub geometry: &'a Geometry,
  /// Where each file went, in configuration order.
  pub files: Vec<FileReport<'a>>,
  /// The number of sectors holding any data.
  pub sectors_used: usize,
  /// The total number of bytes of game data.
  pub bytes_used: usize,
  /// The number of bytes still free.
  pub bytes_free: usize,
}

/// The placement of a single file.
#[derive(Serialize, Debug)]
pub struct FileReport<'a> {
  /// The file's name, relative to the ROM directory.
  pub file: &'a Path,
  /// The owning game's name.
  pub game: &'a str,
  /// The file's type.
  #[serde(rename = "type")]
  pub ty: FileType,
  /// The file's size.
  pub size: usize,
  /// Where it went.
  #[serde(flatten)]
  pub placement: &'a Placement,
}

impl Report<'_> {
  /// Renders this report as JSON5.
  pub fn to_json5(&self) -> Result<String, json5::Error> {
    json5::to_string(self)
  }
}
