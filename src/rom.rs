//! Types and functions for producing cartridge sector images.
//!
//! The cartridge image is built out of 16K sectors, each written to its own
//! file. Game data is copied into the data region of each sector exactly as
//! the allocator laid it out; everything else (the reserved regions, any
//! trailing free space, and sectors no game reached) is zero.

use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use log::info;

use crate::alloc::Allocation;
use crate::alloc::Geometry;
use crate::alloc::SECTOR_SIZE;
use crate::error;
use crate::file::FileEntry;

/// A single sector image.
#[derive(Clone, PartialEq, Eq)]
pub struct Sector {
  index: usize,
  bytes: Box<[u8]>,
}

impl Sector {
  /// Creates a new sector filled with zeroes.
  pub fn new(index: usize) -> Self {
    Self {
      index,
      bytes: vec![0; SECTOR_SIZE].into_boxed_slice(),
    }
  }

  /// Returns the index of this sector within the cartridge.
  pub fn index(&self) -> usize {
    self.index
  }

  /// Returns the contents of this sector.
  pub fn bytes(&self) -> &[u8] {
    &self.bytes
  }

  /// Returns the name of the file this sector is written to.
  pub fn file_name(&self) -> String {
    format!("data_sector{}.bin", self.index)
  }

  /// Returns true if this sector is entirely zero.
  pub fn is_empty(&self) -> bool {
    self.bytes.iter().all(|&b| b == 0)
  }

  /// Dumps the (interesting) contents of this sector to the given `Write`.
  pub fn dump(&self, mut w: impl io::Write) -> io::Result<()> {
    let mut ascii_str = String::new();
    let iter = self
      .bytes
      .chunks(32)
      .enumerate()
      .filter(|(_, c)| c.iter().any(|&byte| byte != 0));
    for (addr, chunk) in iter {
      write!(w, "{:02x}:{:04x}:", self.index, addr * 32)?;

      ascii_str.clear();
      for &byte in chunk {
        write!(w, " {:02x}", byte)?;

        if 0x20 <= byte && byte <= 0x7e {
          ascii_str.push(byte as char);
        } else {
          ascii_str.push('.');
        }
      }
      writeln!(w, "  |{}|", ascii_str)?;
    }
    Ok(())
  }
}

impl fmt::Debug for Sector {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    f.debug_struct("Sector")
      .field("index", &self.index)
      .field("empty", &self.is_empty())
      .finish()
  }
}

/// An error produced while building or writing sectors.
#[derive(Debug)]
pub enum Error {
  /// Indicates that a part was found for a sector other than the current or
  /// the next one. This means the allocation is inconsistent.
  OutOfSequence {
    /// The sector that was expected.
    expected: usize,
    /// The sector that was found.
    found: usize,
  },
  /// Indicates that a part doesn't fit within its sector's data region, or
  /// within its file.
  PartOutOfBounds {
    /// The sector the part was for.
    sector: usize,
  },
  /// Indicates that a sector image couldn't be written.
  Io {
    /// The file being written.
    path: PathBuf,
    /// The underlying error.
    error: io::Error,
  },
}

impl fmt::Display for Error {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      Self::OutOfSequence { expected, found } => write!(
        f,
        "internal error: expected a part for sector {}, found sector {}",
        expected, found
      ),
      Self::PartOutOfBounds { sector } => {
        write!(f, "internal error: part out of bounds in sector {}", sector)
      }
      Self::Io { error, .. } => write!(f, "couldn't write sector: {}", error),
    }
  }
}

impl error::Error for Error {
  fn cause(&self) -> error::Cause<'_> {
    match self {
      Self::Io { path, .. } => error::Cause::File(path),
      _ => error::Cause::Build,
    }
  }

  fn action(&self) -> Option<error::Action> {
    Some(error::Action::Writing)
  }
}

/// Builds every sector image of the cartridge from an allocation.
///
/// Returns exactly `geometry.sector_count()` sectors.
pub fn build_sectors(
  geometry: &Geometry,
  allocation: &Allocation,
  files: &[FileEntry],
) -> Result<Vec<Sector>, Error> {
  let mut sectors: Vec<Sector> = Vec::with_capacity(geometry.sector_count());
  let mut cursor = 0;

  for part in &allocation.parts {
    let expected = sectors.len();
    match sectors.last() {
      Some(sector) if sector.index == part.sector => {}
      _ if part.sector == expected && expected < geometry.sector_count() => {
        cursor = geometry.data_start(part.sector);
        sectors.push(Sector::new(part.sector));
      }
      _ => {
        return Err(Error::OutOfSequence {
          expected,
          found: part.sector,
        })
      }
    }
    let current = sectors.len() - 1;

    let data = files
      .get(part.file)
      .and_then(|f| f.data().get(part.offset..part.offset + part.len));
    let region_end =
      geometry.data_start(part.sector) + geometry.capacity(part.sector);
    let end = cursor + part.len;
    let data = match data {
      Some(data) if part.index == cursor && end <= region_end => data,
      _ => return Err(Error::PartOutOfBounds { sector: part.sector }),
    };
    sectors[current].bytes[cursor..end].copy_from_slice(data);
    cursor = end;
  }

  while sectors.len() < geometry.sector_count() {
    sectors.push(Sector::new(sectors.len()));
  }
  Ok(sectors)
}

/// Writes each sector to its own file in `dir`.
pub fn write_sectors(dir: &Path, sectors: &[Sector]) -> Result<(), Error> {
  for sector in sectors {
    let path = dir.join(sector.file_name());
    fs::write(&path, sector.bytes()).map_err(|error| Error::Io {
      path: path.clone(),
      error,
    })?;
    info!("created {}, size {} bytes", path.display(), sector.bytes().len());
  }
  Ok(())
}

#[cfg(test)]
mod test {
  use super::*;

  use crate::alloc;
  use crate::alloc::FilePart;
  use crate::types::FileType;

  fn files(sizes: &[usize]) -> Vec<FileEntry> {
    sizes
      .iter()
      .enumerate()
      .map(|(i, &size)| {
        let data = (0..size).map(|b| (b % 251 + 1 + i) as u8).collect();
        FileEntry::new(format!("f{}", i), "G", FileType::Cas8, data).unwrap()
      })
      .collect()
  }

  #[test]
  fn every_sector_is_written() {
    let g = Geometry::new(16, 1023, 512).unwrap();
    let files = files(&[14000, 20000, 300]);
    let alloc = alloc::allocate(&g, &files).unwrap();
    let sectors = build_sectors(&g, &alloc, &files).unwrap();

    assert_eq!(sectors.len(), 16);
    for (i, sector) in sectors.iter().enumerate() {
      assert_eq!(sector.index(), i);
      assert_eq!(sector.bytes().len(), SECTOR_SIZE);
    }
    assert!(sectors[3..].iter().all(Sector::is_empty));
    assert_eq!(sectors[2].file_name(), "data_sector2.bin");

    // The data regions, concatenated, are the files followed by zeroes.
    let mut regions = Vec::new();
    for sector in &sectors {
      let start = g.data_start(sector.index());
      regions.extend_from_slice(&sector.bytes()[start..start + g.capacity(sector.index())]);
    }
    let mut expected = Vec::new();
    for file in &files {
      expected.extend_from_slice(file.data());
    }
    expected.resize(g.total_capacity(), 0);
    assert_eq!(regions, expected);

    // Reserved regions stay zero.
    assert!(sectors[0].bytes()[..512].iter().all(|&b| b == 0));
    assert!(sectors[1].bytes()[..1023].iter().all(|&b| b == 0));
    assert_eq!(sectors[1].bytes()[SECTOR_SIZE - 1], 0);
  }

  #[test]
  fn no_files_means_empty_sectors() {
    let g = Geometry::new(4, 1023, 512).unwrap();
    let alloc = alloc::allocate(&g, &[]).unwrap();
    let sectors = build_sectors(&g, &alloc, &[]).unwrap();
    assert_eq!(sectors.len(), 4);
    assert!(sectors.iter().all(Sector::is_empty));
  }

  #[test]
  fn skipped_sector_is_an_error() {
    let g = Geometry::new(4, 1023, 512).unwrap();
    let files = files(&[10, 10]);
    let mut alloc = alloc::allocate(&g, &files).unwrap();
    alloc.parts[1] = FilePart {
      sector: 2,
      index: 1023,
      ..alloc.parts[1]
    };
    match build_sectors(&g, &alloc, &files) {
      Err(Error::OutOfSequence { expected: 1, found: 2 }) => {}
      other => panic!("unexpected result: {:?}", other),
    }
  }

  #[test]
  fn mismatched_part_is_an_error() {
    let g = Geometry::new(4, 1023, 512).unwrap();
    let files = files(&[10]);
    let mut alloc = alloc::allocate(&g, &files).unwrap();
    alloc.parts[0].len = 11;
    match build_sectors(&g, &alloc, &files) {
      Err(Error::PartOutOfBounds { sector: 0 }) => {}
      other => panic!("unexpected result: {:?}", other),
    }
  }

  #[test]
  fn dump_skips_empty_rows() {
    let mut sector = Sector::new(1);
    sector.bytes[0x40..0x45].copy_from_slice(b"HELLO");
    let mut out = Vec::new();
    sector.dump(&mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert_eq!(text.lines().count(), 1);
    assert!(text.starts_with("01:0040: 48 45 4c 4c 4f 00"));
    let ascii = format!("|HELLO{}|", ".".repeat(27));
    assert!(text.trim_end().ends_with(&ascii));
  }

  #[test]
  fn sectors_are_written_to_disk() {
    let dir = std::env::temp_dir().join(format!("cartpack-rom-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    let sectors = vec![Sector::new(0), Sector::new(1)];
    write_sectors(&dir, &sectors).unwrap();
    for name in &["data_sector0.bin", "data_sector1.bin"] {
      let bytes = fs::read(dir.join(name)).unwrap();
      assert_eq!(bytes.len(), SECTOR_SIZE);
    }
    fs::remove_dir_all(&dir).unwrap();
  }
}
