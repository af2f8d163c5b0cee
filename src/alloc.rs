//! The sector allocator, which decides where every byte of every file goes.
//!
//! The cartridge is a sequence of 16K *sectors*. Each sector starts with a
//! region reserved for the loader, and sector 0 additionally reserves room
//! for the menu and the game start index:
//! ```text
//!            0        game_start           16383-loader         16383
//! sector 0:  | menu   | data ...           | reserved            |
//!            0        loader                                     16383
//! sector n:  | loader | data ...                                 | reserved |
//! ```
//!
//! Files are packed greedily, in configuration order: a file that doesn't fit
//! into what's left of the current sector is split, and continues at the
//! start of the next sector's data region. The firmware only knows how to
//! stitch a file back together from three segments, so no file may touch
//! more than three sectors.

use std::fmt;
use std::path::Path;
use std::path::PathBuf;

use log::debug;
use log::info;
use serde::Serialize;

use crate::error;
use crate::file::FileEntry;

/// The size of a single sector.
pub const SECTOR_SIZE: usize = 16384;

/// The maximum number of sectors a single file may be split across.
pub const MAX_SEGMENTS: usize = 3;

/// A supported cartridge size.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum RomSize {
  /// A 256 KiB cartridge, with 16 sectors.
  K256,
  /// A 1 MiB cartridge, with 64 sectors.
  K1024,
}

impl RomSize {
  /// Returns the `RomSize` for a size in KiB, if it's a supported one.
  pub fn from_kib(kib: u32) -> Option<Self> {
    match kib {
      256 => Some(Self::K256),
      1024 => Some(Self::K1024),
      _ => None,
    }
  }

  /// Returns this size in KiB.
  pub fn kib(self) -> u32 {
    match self {
      Self::K256 => 256,
      Self::K1024 => 1024,
    }
  }

  /// Returns how many sectors a cartridge of this size has.
  pub fn sector_count(self) -> usize {
    self.kib() as usize * 1024 / SECTOR_SIZE
  }
}

impl std::str::FromStr for RomSize {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, String> {
    s.parse()
      .ok()
      .and_then(Self::from_kib)
      .ok_or_else(|| format!("unsupported ROM size {}; use 256 or 1024", s))
  }
}

/// The shape of a cartridge: how many sectors it has, and which parts of each
/// sector are available to game data.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize)]
pub struct Geometry {
  sector_count: usize,
  loader_size: usize,
  game_start: usize,
}

impl Geometry {
  /// Creates a new `Geometry`.
  ///
  /// `loader_size` bytes are reserved at the start of every sector after the
  /// first, and game data in sector 0 starts at `game_start`.
  pub fn new(
    sector_count: usize,
    loader_size: usize,
    game_start: usize,
  ) -> Result<Self, Error> {
    let geometry = Self {
      sector_count,
      loader_size,
      game_start,
    };
    let reserved = game_start.saturating_add(loader_size).saturating_add(1);
    if sector_count == 0 || reserved >= SECTOR_SIZE {
      return Err(Error::BadGeometry(geometry));
    }
    Ok(geometry)
  }

  /// Creates the `Geometry` of a cartridge of the given size.
  pub fn for_rom(
    size: RomSize,
    loader_size: usize,
    game_start: usize,
  ) -> Result<Self, Error> {
    Self::new(size.sector_count(), loader_size, game_start)
  }

  /// Returns the number of sectors.
  pub fn sector_count(&self) -> usize {
    self.sector_count
  }

  /// Returns the number of bytes reserved for the loader.
  pub fn loader_size(&self) -> usize {
    self.loader_size
  }

  /// Returns the offset game data starts at within `sector`.
  pub fn data_start(&self, sector: usize) -> usize {
    if sector == 0 {
      self.game_start
    } else {
      self.loader_size
    }
  }

  /// Returns the number of bytes of game data `sector` can hold.
  pub fn capacity(&self, sector: usize) -> usize {
    if sector == 0 {
      SECTOR_SIZE - self.game_start - self.loader_size - 1
    } else {
      SECTOR_SIZE - self.loader_size - 1
    }
  }

  /// Returns the number of bytes of game data the whole cartridge can hold.
  pub fn total_capacity(&self) -> usize {
    self.capacity(0) + self.capacity(1) * (self.sector_count - 1)
  }
}

/// A contiguous piece of a file, assigned to a single sector.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize)]
pub struct FilePart {
  /// The index of the file this part belongs to.
  pub file: usize,
  /// The sector this part lives in.
  pub sector: usize,
  /// The offset of this part within the sector.
  pub index: usize,
  /// The offset of this part within the file.
  pub offset: usize,
  /// The length of this part.
  pub len: usize,
}

/// Where a single file ended up.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize)]
pub struct Placement {
  /// The sector the file starts in.
  pub start_sector: usize,
  /// The offset the file starts at within its first sector.
  pub start_index: usize,
  /// The number of bytes in each sector the file touches; unused segments are
  /// zero.
  pub segments: [usize; MAX_SEGMENTS],
}

impl Placement {
  /// Returns the number of segments actually in use.
  pub fn segment_count(&self) -> usize {
    self.segments.iter().rposition(|&n| n != 0).map_or(1, |i| i + 1)
  }
}

/// The result of allocating space for a list of files.
#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
pub struct Allocation {
  /// The placement of each file, in input order.
  pub placements: Vec<Placement>,
  /// Every file part, in the order they were produced.
  pub parts: Vec<FilePart>,
  /// The index of the last sector anything was written to.
  pub last_sector: usize,
  /// The total number of bytes used.
  pub bytes_used: usize,
  /// The number of bytes still free in the whole cartridge.
  pub bytes_free: usize,
}

impl Allocation {
  /// Returns an iterator over the parts of file number `file`, in order.
  pub fn parts_of(&self, file: usize) -> impl Iterator<Item = &FilePart> {
    self.parts.iter().filter(move |p| p.file == file)
  }
}

/// An error produced during allocation.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Error {
  /// Indicates that the reserved regions leave no room for data.
  BadGeometry(Geometry),
  /// Indicates that a file would need more than `MAX_SEGMENTS` sectors.
  TooLarge {
    /// The offending file.
    file: PathBuf,
    /// Its size.
    size: usize,
  },
  /// Indicates that the files do not fit on the cartridge.
  DoesNotFit {
    /// How many bytes need to be freed up.
    overflow: usize,
  },
}

impl fmt::Display for Error {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      Self::BadGeometry(g) => write!(
        f,
        "no room for game data with a {} byte loader and games starting at {}",
        g.loader_size, g.game_start
      ),
      Self::TooLarge { file, size } => write!(
        f,
        "file {} (size {}) is too large, and can't fit in {} sectors",
        file.display(),
        size,
        MAX_SEGMENTS
      ),
      Self::DoesNotFit { overflow } => write!(
        f,
        "the games do not fit on the ROM, please free up {} bytes",
        overflow
      ),
    }
  }
}

impl error::Error for Error {
  fn cause(&self) -> error::Cause<'_> {
    match self {
      Self::TooLarge { file, .. } => error::Cause::File(file),
      _ => error::Cause::Build,
    }
  }

  fn action(&self) -> Option<error::Action> {
    Some(error::Action::Allocating)
  }
}

/// Lays out `files` into the sectors described by `geometry`.
pub fn allocate(
  geometry: &Geometry,
  files: &[FileEntry],
) -> Result<Allocation, Error> {
  let mut allocator = Allocator::new(*geometry);
  for (i, file) in files.iter().enumerate() {
    allocator.place(i, file.file_name(), file.size())?;
  }
  allocator.finish()
}

/// The running state of the allocator.
///
/// The allocator only ever moves forward: once it advances past a sector, it
/// never writes to it again.
struct Allocator {
  geometry: Geometry,

  /// The sector currently being filled.
  sector: usize,
  /// The offset within `sector` the next part will be written at.
  index: usize,
  /// The number of bytes left in `sector`.
  free: usize,
  /// The total number of bytes written so far.
  used: usize,

  placements: Vec<Placement>,
  parts: Vec<FilePart>,
}

impl Allocator {
  fn new(geometry: Geometry) -> Self {
    Self {
      geometry,
      sector: 0,
      index: geometry.data_start(0),
      free: geometry.capacity(0),
      used: 0,
      placements: Vec::new(),
      parts: Vec::new(),
    }
  }

  /// Moves on to the start of the next sector's data region.
  fn advance(&mut self) {
    self.sector += 1;
    self.index = self.geometry.data_start(self.sector);
    self.free = self.geometry.capacity(self.sector);
  }

  /// Places file number `file`, which is `size` bytes long.
  fn place(&mut self, file: usize, name: &Path, size: usize) -> Result<(), Error> {
    info!("file {} (size {})", name.display(), size);

    let mut placement = Placement {
      start_sector: self.sector,
      start_index: self.index,
      segments: [0; MAX_SEGMENTS],
    };
    let mut offset = 0;
    let mut depth = 0;
    loop {
      if depth == MAX_SEGMENTS {
        return Err(Error::TooLarge {
          file: name.to_path_buf(),
          size,
        });
      }

      let len = (size - offset).min(self.free);
      self.parts.push(FilePart {
        file,
        sector: self.sector,
        index: self.index,
        offset,
        len,
      });
      placement.segments[depth] = len;
      self.free -= len;
      self.index += len;
      self.used += len;
      offset += len;

      let left = size - offset;
      if left == 0 {
        debug!(
          " - part {} at sector {}, index {}: {} bytes - file completed ({} bytes left in sector)",
          depth, self.sector, self.index - len, len, self.free
        );
        break;
      }

      debug!(
        " - part {} at sector {}, index {}: {} bytes, {} bytes of file left ({} bytes left in sector)",
        depth, self.sector, self.index - len, len, left, self.free
      );
      self.advance();
      depth += 1;
    }

    self.placements.push(placement);
    Ok(())
  }

  fn finish(self) -> Result<Allocation, Error> {
    let capacity = self.geometry.total_capacity();
    if self.used > capacity {
      return Err(Error::DoesNotFit {
        overflow: self.used - capacity,
      });
    }

    let allocation = Allocation {
      placements: self.placements,
      parts: self.parts,
      last_sector: self.sector,
      bytes_used: self.used,
      bytes_free: capacity - self.used,
    };
    info!(
      "{} sectors used out of {}",
      allocation.last_sector + 1,
      self.geometry.sector_count
    );
    info!(
      "the games use {} bytes, the ROM has still {} bytes free",
      allocation.bytes_used, allocation.bytes_free
    );
    Ok(allocation)
  }
}

#[cfg(test)]
mod test {
  use super::*;

  use crate::types::FileType;

  /// Loader of 1023 bytes, games starting at 512: sector 0 holds 14848 bytes,
  /// every other sector 15360.
  fn geometry(sectors: usize) -> Geometry {
    Geometry::new(sectors, 1023, 512).unwrap()
  }

  fn files(sizes: &[usize]) -> Vec<FileEntry> {
    sizes
      .iter()
      .enumerate()
      .map(|(i, &size)| {
        let data = (0..size).map(|b| (b * 7 + i) as u8).collect();
        FileEntry::new(format!("f{}.bin", i), format!("Game {}", i), FileType::Cas16, data)
          .unwrap()
      })
      .collect()
  }

  #[test]
  fn capacities() {
    let g = geometry(16);
    assert_eq!(g.capacity(0), 14848);
    assert_eq!(g.capacity(1), 15360);
    assert_eq!(g.capacity(15), 15360);
    assert_eq!(g.data_start(0), 512);
    assert_eq!(g.data_start(3), 1023);
    assert_eq!(g.total_capacity(), 14848 + 15 * 15360);
  }

  #[test]
  fn rom_sizes() {
    assert_eq!(RomSize::K256.sector_count(), 16);
    assert_eq!(RomSize::K1024.sector_count(), 64);
    assert_eq!("1024".parse::<RomSize>(), Ok(RomSize::K1024));
    assert!("512".parse::<RomSize>().is_err());
    assert!("lots".parse::<RomSize>().is_err());
  }

  #[test]
  fn bad_geometry() {
    assert!(Geometry::new(16, 16000, 383).is_err());
    assert!(Geometry::new(0, 1023, 512).is_err());
    assert!(Geometry::new(16, 16000, 382).is_ok());
  }

  #[test]
  fn files_share_a_sector() {
    let files = files(&[1000, 2000]);
    let alloc = allocate(&geometry(16), &files).unwrap();
    assert_eq!(
      alloc.placements,
      vec![
        Placement {
          start_sector: 0,
          start_index: 512,
          segments: [1000, 0, 0],
        },
        Placement {
          start_sector: 0,
          start_index: 1512,
          segments: [2000, 0, 0],
        },
      ]
    );
    assert_eq!(alloc.last_sector, 0);
    assert_eq!(alloc.bytes_used, 3000);
    assert_eq!(alloc.bytes_free, geometry(16).total_capacity() - 3000);
  }

  #[test]
  fn files_split_across_sectors() {
    let files = files(&[14000, 20000]);
    let alloc = allocate(&geometry(16), &files).unwrap();
    assert_eq!(alloc.placements[1].start_sector, 0);
    assert_eq!(alloc.placements[1].start_index, 512 + 14000);
    assert_eq!(alloc.placements[1].segments, [848, 15360, 3792]);
    assert_eq!(alloc.placements[1].segment_count(), 3);
    assert_eq!(alloc.last_sector, 2);

    let parts = alloc.parts_of(1).copied().collect::<Vec<_>>();
    assert_eq!(
      parts,
      vec![
        FilePart { file: 1, sector: 0, index: 14512, offset: 0, len: 848 },
        FilePart { file: 1, sector: 1, index: 1023, offset: 848, len: 15360 },
        FilePart { file: 1, sector: 2, index: 1023, offset: 16208, len: 3792 },
      ]
    );
  }

  #[test]
  fn parts_reconstruct_files() {
    let files = files(&[5000, 17000, 30000, 1, 0, 12345]);
    let alloc = allocate(&geometry(16), &files).unwrap();
    for (i, file) in files.iter().enumerate() {
      let mut rebuilt = Vec::new();
      let mut expected_offset = 0;
      for part in alloc.parts_of(i) {
        assert_eq!(part.offset, expected_offset);
        expected_offset += part.len;
        rebuilt.extend_from_slice(&file.data()[part.offset..part.offset + part.len]);
      }
      assert_eq!(rebuilt, file.data());
      let segments: usize = alloc.placements[i].segments.iter().sum();
      assert_eq!(segments, file.size());
    }
  }

  #[test]
  fn sectors_only_move_forward() {
    let files = files(&[9000, 9000, 9000, 9000, 9000]);
    let alloc = allocate(&geometry(16), &files).unwrap();
    for pair in alloc.parts.windows(2) {
      assert!(pair[0].sector <= pair[1].sector);
      if pair[0].sector == pair[1].sector {
        assert_eq!(pair[0].index + pair[0].len, pair[1].index);
      }
    }
  }

  #[test]
  fn exactly_full_sector_leaves_an_empty_segment() {
    let files = files(&[14848, 100]);
    let alloc = allocate(&geometry(16), &files).unwrap();
    assert_eq!(alloc.placements[0].segments, [14848, 0, 0]);
    assert_eq!(
      alloc.placements[1],
      Placement {
        start_sector: 0,
        start_index: 15360,
        segments: [0, 100, 0],
      }
    );
    let parts = alloc.parts_of(1).copied().collect::<Vec<_>>();
    assert_eq!(
      parts,
      vec![
        FilePart { file: 1, sector: 0, index: 15360, offset: 0, len: 0 },
        FilePart { file: 1, sector: 1, index: 1023, offset: 0, len: 100 },
      ]
    );
  }

  #[test]
  fn empty_segment_counts_toward_the_limit() {
    let files = files(&[14848, 15360 * 3]);
    assert_eq!(
      allocate(&geometry(16), &files),
      Err(Error::TooLarge {
        file: PathBuf::from("f1.bin"),
        size: 15360 * 3,
      })
    );

    let files = self::files(&[14848, 15360 * 2]);
    let alloc = allocate(&geometry(16), &files).unwrap();
    assert_eq!(alloc.placements[1].segments, [0, 15360, 15360]);
  }

  #[test]
  fn four_segments_is_too_large() {
    // 14848 + 15360 * 2 fits in three sectors; one more byte doesn't.
    let ok = files(&[14848 + 15360 * 2]);
    assert!(allocate(&geometry(16), &ok).is_ok());

    let big = files(&[14848 + 15360 * 2 + 1]);
    assert_eq!(
      allocate(&geometry(16), &big),
      Err(Error::TooLarge {
        file: PathBuf::from("f0.bin"),
        size: 14848 + 15360 * 2 + 1,
      })
    );
  }

  #[test]
  fn overflow_is_reported_exactly() {
    let g = geometry(2);
    let files = files(&[14848, 15360, 42]);
    assert_eq!(allocate(&g, &files), Err(Error::DoesNotFit { overflow: 42 }));
    assert_eq!(
      Error::DoesNotFit { overflow: 42 }.to_string(),
      "the games do not fit on the ROM, please free up 42 bytes"
    );

    let files = files_exact();
    let alloc = allocate(&g, &files).unwrap();
    assert_eq!(alloc.bytes_free, 0);
    assert_eq!(alloc.last_sector, 1);
  }

  fn files_exact() -> Vec<FileEntry> {
    files(&[10000, 4848 + 15360])
  }
}
