//! The game data table the firmware reads at boot.
//!
//! The table has three parts:
//! - An index of every game, sorted by name, pointing at the descriptor of
//!   the game's first file.
//! - A descriptor per file, telling the firmware where the file's segments
//!   are and how to load and run it.
//! - The menu: the number of pages, a (count, pointer) pair per page, and a
//!   table of null-terminated, shortened names per page.
//!
//! The table is emitted as assembler source, to be assembled together with
//! the loader.

use std::borrow::Cow;
use std::fmt;
use std::io;
use std::path::PathBuf;

use log::warn;

use crate::alloc::Allocation;
use crate::alloc::Placement;
use crate::alloc::MAX_SEGMENTS;
use crate::error;
use crate::file::FileEntry;
use crate::int::hex_word;
use crate::types::FileType;
use crate::types::Footprint;

/// The number of games on a single menu page.
pub const GAMES_PER_PAGE: usize = 36;

/// The number of characters the menu has room for in a game name.
pub const NAME_BUDGET: usize = 17;

/// Extra room left between a decompressed image and its compressed tail. This
/// must be at least the decompressor's lookahead.
pub const DECOMPRESSION_MARGIN: u16 = 10;

/// Shortens a game name to fit on the menu.
///
/// Whole words are kept for as long as they fit, together with a trailing
/// period. The first word that doesn't fit is abbreviated to its initial; the
/// first word of the name is always kept in full.
///
/// ```
/// # use cartpack::table::shorten_name;
/// assert_eq!(shorten_name("Frogger"), "Frogger");
/// assert_eq!(shorten_name("The Quick Brown Fox"), "The Quick Brown F.");
/// ```
pub fn shorten_name(name: &str) -> Cow<'_, str> {
  if name.chars().count() <= NAME_BUDGET {
    return Cow::Borrowed(name);
  }

  let mut words = name.split(' ');
  let mut short = words.next().unwrap_or_default().to_string();
  let mut len = short.chars().count();
  for word in words {
    let word_len = word.chars().count();
    if len + 1 + word_len + 1 > NAME_BUDGET {
      short.push(' ');
      short.extend(word.chars().next());
      short.push('.');
      return Cow::Owned(short);
    }
    short.push(' ');
    short.push_str(word);
    len += 1 + word_len;
  }
  short.push('.');
  Cow::Owned(short)
}

/// The position of a game on the menu.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Slot {
  /// The page, starting at 1.
  pub page: usize,
  /// The slot within the page, starting at 0.
  pub slot: usize,
}

impl Slot {
  /// Returns the menu position of the game at `index` in the sorted index.
  pub fn of(index: usize) -> Self {
    Self {
      page: index / GAMES_PER_PAGE + 1,
      slot: index % GAMES_PER_PAGE,
    }
  }

  /// Returns the key the menu shows for this slot: `A` to `Z`, then `0`
  /// onwards.
  pub fn letter(self) -> char {
    if self.slot < 26 {
      (b'A' + self.slot as u8) as char
    } else {
      (self.slot as u8 - 26 + b'0') as char
    }
  }
}

impl fmt::Display for Slot {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "page {}, game {}", self.page, self.letter())
  }
}

/// Computes the lowest address a compressed image may sit at while it is
/// decompressed to `load`, without being overwritten before it is read.
///
/// `footprint` is the size of the decompressed image. All arithmetic is done
/// on 16-bit words, wrapping around.
pub fn safe_margin(load: u16, footprint: u16, size: usize) -> u16 {
  load
    .wrapping_add(footprint)
    .wrapping_sub(size as u16)
    .wrapping_add(DECOMPRESSION_MARGIN)
}

/// Everything the firmware needs to know about one file.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Descriptor {
  /// The file's type.
  pub ty: FileType,
  /// The sector the file starts in.
  pub start_sector: u8,
  /// The address to load the file to.
  pub load: u16,
  /// The address to start execution at; zero if the file isn't executable.
  pub jump: u16,
  /// Where to keep the compressed image during in-place decompression; zero
  /// if not applicable.
  pub margin: u16,
  /// The offset of the file within its first sector.
  pub start_index: u16,
  /// The size of each segment; zero if unused.
  pub segments: [u16; MAX_SEGMENTS],
  /// The CRC-16 of the uncompressed image, if the build checks them.
  pub checksum: Option<u16>,
}

impl Descriptor {
  /// Creates the descriptor of `file`, which was placed at `placement`.
  pub fn new(
    file: &FileEntry,
    placement: &Placement,
    check_crc: bool,
  ) -> Result<Self, Error> {
    let margin = match file.ty().footprint() {
      Footprint::None => 0,
      Footprint::Fixed(n) => safe_margin(file.load(), n, file.size()),
      Footprint::Declared => match file.length() {
        Some(n) => safe_margin(file.load(), n, file.size()),
        None => {
          return Err(Error::MissingLength {
            file: file.file_name().to_path_buf(),
          })
        }
      },
    };

    let mut segments = [0; MAX_SEGMENTS];
    for (word, &len) in segments.iter_mut().zip(&placement.segments) {
      *word = len as u16;
    }

    Ok(Self {
      ty: file.ty(),
      start_sector: placement.start_sector as u8,
      load: file.load(),
      jump: file.jump().unwrap_or(0),
      margin,
      start_index: placement.start_index as u16,
      segments,
      checksum: if check_crc { Some(file.checksum()) } else { None },
    })
  }

  /// Encodes this descriptor the way the firmware reads it: bytes, then
  /// little-endian words, in declaration order.
  pub fn to_bytes(&self) -> Vec<u8> {
    let mut bytes = vec![self.ty.code(), self.start_sector];
    let words = [self.load, self.jump, self.margin, self.start_index]
      .iter()
      .chain(&self.segments)
      .chain(&self.checksum)
      .copied()
      .collect::<Vec<u16>>();
    for word in words {
      bytes.extend_from_slice(&word.to_le_bytes());
    }
    bytes
  }
}

/// An error produced while generating the table.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Error {
  /// Indicates that a variable length image has no declared length.
  MissingLength {
    /// The offending file.
    file: PathBuf,
  },
}

impl fmt::Display for Error {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      Self::MissingLength { .. } => {
        write!(f, "variable length image has no 'length'")
      }
    }
  }
}

impl error::Error for Error {
  fn cause(&self) -> error::Cause<'_> {
    match self {
      Self::MissingLength { file } => error::Cause::File(file),
    }
  }

  fn action(&self) -> Option<error::Action> {
    Some(error::Action::Writing)
  }
}

/// A game in the sorted index.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct IndexEntry {
  /// The game's display name.
  pub name: String,
  /// The index of the game's first file.
  pub first_file: usize,
}

impl IndexEntry {
  /// Returns the label of the game's first descriptor.
  pub fn label(&self) -> String {
    label(self.first_file)
  }
}

fn label(file: usize) -> String {
  format!("Game{}Data", file + 1)
}

/// A page of the menu.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Page {
  /// The page number, starting at 1.
  pub number: usize,
  /// The number of games on this page.
  pub count: usize,
}

/// The complete game data table.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Table {
  descriptors: Vec<(Descriptor, String)>,
  index: Vec<IndexEntry>,
}

impl Table {
  /// Builds the table for `files`, laid out as in `allocation`.
  ///
  /// If `check_crc` is set, every descriptor carries its file's checksum.
  pub fn build(
    files: &[FileEntry],
    allocation: &Allocation,
    check_crc: bool,
  ) -> Result<Self, Error> {
    let mut descriptors = Vec::with_capacity(files.len());
    let mut index = Vec::<IndexEntry>::new();

    for (i, (file, placement)) in
      files.iter().zip(&allocation.placements).enumerate()
    {
      if check_crc && file.checksum() == 0 {
        warn!("no checksum given for {}", file.file_name().display());
      }
      descriptors.push((
        Descriptor::new(file, placement, check_crc)?,
        file.game_name().to_string(),
      ));

      let is_first = match files[..i].last() {
        Some(prev) => prev.game() != file.game(),
        None => true,
      };
      if is_first {
        index.push(IndexEntry {
          name: file.game_name().to_string(),
          first_file: i,
        });
      }
    }
    index.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(Self { descriptors, index })
  }

  /// Returns the descriptors, in file order.
  pub fn descriptors(&self) -> impl Iterator<Item = &Descriptor> {
    self.descriptors.iter().map(|(d, _)| d)
  }

  /// Returns the games, sorted by name.
  pub fn index(&self) -> &[IndexEntry] {
    &self.index
  }

  /// Returns the number of menu pages.
  pub fn page_count(&self) -> usize {
    (self.index.len() + GAMES_PER_PAGE - 1) / GAMES_PER_PAGE
  }

  /// Returns an iterator over the menu pages.
  pub fn pages(&self) -> impl Iterator<Item = Page> + '_ {
    (0..self.page_count()).map(move |i| Page {
      number: i + 1,
      count: (self.index.len() - i * GAMES_PER_PAGE).min(GAMES_PER_PAGE),
    })
  }

  /// Writes this table as assembler source to `w`.
  pub fn write_asm(&self, mut w: impl io::Write) -> io::Result<()> {
    for (i, game) in self.index.iter().enumerate() {
      writeln!(
        w,
        "    dw {} ; {} {} \"{}\"",
        game.label(),
        i,
        Slot::of(i),
        game.name
      )?;
    }
    writeln!(w, "")?;

    for (i, (d, game_name)) in self.descriptors.iter().enumerate() {
      writeln!(w, "{}: ; \"{}\"", label(i), game_name)?;
      writeln!(w, "    db 0x{:02x} ; Type: {}", d.ty.code(), d.ty)?;
      writeln!(
        w,
        "    db {} ; Start of the game data is located in this sector",
        d.start_sector
      )?;
      writeln!(w, "    dw {} ; Load address", hex_word(d.load))?;
      if d.ty.default_jump().is_some() || d.jump != 0 {
        writeln!(w, "    dw {} ; Jump address", hex_word(d.jump))?;
      } else {
        writeln!(
          w,
          "    dw 0x0000 ; Jump address is not used in this file type"
        )?;
      }
      if d.ty.footprint() == Footprint::None {
        writeln!(
          w,
          "    dw 0x0000 ; Compressed data location is not used in this file type"
        )?;
      } else {
        writeln!(
          w,
          "    dw {} ; Lowest address the compressed image can reside at without being overwritten",
          hex_word(d.margin)
        )?;
      }
      writeln!(w, "    dw {} ; Start address in the 16 kB sector", d.start_index)?;
      writeln!(
        w,
        "    dw {} ; Size of the game data in first sector",
        d.segments[0]
      )?;
      writeln!(
        w,
        "    dw {} ; Size of the game data in second sector, if any",
        d.segments[1]
      )?;
      writeln!(
        w,
        "    dw {} ; Size of the game data in third sector, if any",
        d.segments[2]
      )?;
      if let Some(checksum) = d.checksum {
        writeln!(
          w,
          "    dw {} ; CRC16 checksum of the uncompressed image",
          hex_word(checksum)
        )?;
      }
      writeln!(w, "")?;
    }

    writeln!(w, "GamePages: db {}", self.page_count())?;
    writeln!(w, "GamePageData:")?;
    for page in self.pages() {
      writeln!(w, "    db {}", page.count)?;
      writeln!(w, "    dw GameNames{}", page.number)?;
    }

    for (i, game) in self.index.iter().enumerate() {
      let slot = Slot::of(i);
      if slot.slot == 0 {
        writeln!(w, "")?;
        writeln!(w, "GameNames{}:", slot.page)?;
      }
      writeln!(
        w,
        "    db \"{}\", 0 ; {}",
        shorten_name(&game.name),
        game.label()
      )?;
    }
    Ok(())
  }
}

#[cfg(test)]
mod test {
  use super::*;

  use std::path::Path;

  use crate::alloc;
  use crate::alloc::Geometry;
  use crate::types::GameType;

  macro_rules! assert_short {
    ($name:literal => $short:literal) => {
      assert_eq!(shorten_name($name), $short);
    };
  }

  #[test]
  fn name_shortening() {
    assert_short!("Frogger" => "Frogger");
    assert_short!("Abcdefghijklmnopq" => "Abcdefghijklmnopq");
    assert_short!("The Quick Brown Fox" => "The Quick Brown F.");
    assert_short!("Pitfall II Lost Caverns" => "Pitfall II Lost C.");
    assert_short!("Montezumas Revenge" => "Montezumas R.");
    assert_short!("Supercalifragilisticexpialidocious" => "Supercalifragilisticexpialidocious.");
    assert_short!("Extraordinarily Long" => "Extraordinarily L.");
  }

  #[test]
  fn slot_letters() {
    let letters = (0..GAMES_PER_PAGE)
      .map(|i| Slot::of(i).letter())
      .collect::<String>();
    assert_eq!(letters, "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789");
    assert_eq!(Slot::of(36), Slot { page: 2, slot: 0 });
    assert_eq!(Slot::of(75).to_string(), "page 3, game D");
  }

  #[test]
  fn margins() {
    assert_eq!(safe_margin(0x8800, 16384, 4000), 0xb86a);
    assert_eq!(
      safe_margin(0x8800, 16384, 4000),
      (0x8800u32 + 16384 - 4000 + 10) as u16
    );
    assert_eq!(safe_margin(0x8800, 0x3000, 5000), 0xa482);
    assert_eq!(safe_margin(0xf000, 16384, 100), 0x2fa6);

    let high = file("m", "M", FileType::Msx16Zx0, 100).with_load(0xf000);
    let d = Descriptor::new(&high, &placement(0, 512, [100, 0, 0]), false)
      .unwrap();
    assert_eq!(d.margin, 0x2fa6);
  }

  fn file(name: &str, game: &str, ty: FileType, size: usize) -> FileEntry {
    FileEntry::new(name, game, ty, vec![1; size]).unwrap()
  }

  fn placement(sector: usize, index: usize, segments: [usize; 3]) -> Placement {
    Placement {
      start_sector: sector,
      start_index: index,
      segments,
    }
  }

  #[test]
  fn descriptors() {
    let f = file("a", "A", FileType::Msx16Zx0, 4000);
    let d = Descriptor::new(&f, &placement(2, 1023, [848, 3152, 0]), false)
      .unwrap();
    assert_eq!(d.margin, 0xb86a);
    assert_eq!(d.jump, 0);
    assert_eq!(
      d.to_bytes(),
      vec![
        0x08, 2, // type, sector
        0x00, 0x88, // load
        0x00, 0x00, // jump
        0x6a, 0xb8, // margin
        0xff, 0x03, // start index
        0x50, 0x03, 0x50, 0x0c, 0x00, 0x00, // segments
      ]
    );

    let with_crc =
      Descriptor::new(&f, &placement(2, 1023, [4000, 0, 0]), true).unwrap();
    assert_eq!(with_crc.to_bytes().len(), 18);
    assert_eq!(with_crc.checksum, Some(0));

    let cas = file("b", "B", FileType::Cas16, 4000);
    let d = Descriptor::new(&cas, &placement(0, 512, [4000, 0, 0]), false)
      .unwrap();
    assert_eq!(d.margin, 0);
    assert_eq!(d.jump, 0x8800);

    let var = variable("c", Some(0x8800), None);
    assert_eq!(
      Descriptor::new(&var, &placement(0, 512, [5000, 0, 0]), false),
      Err(Error::MissingLength {
        file: PathBuf::from("c")
      })
    );
  }

  fn variable(name: &str, load: Option<u16>, length: Option<u16>) -> FileEntry {
    let game = crate::config::GameDefinition {
      name: name.to_uppercase(),
      ty: GameType::CasLenZx0,
      files: vec![PathBuf::from(name)],
      load,
      jump: None,
      length,
      checksum: None,
    };
    let mut files =
      crate::file::enumerate(&[game], |_: &Path| Ok(vec![1; 5000])).unwrap();
    files.remove(0)
  }

  #[test]
  fn variable_length_margin() {
    let var = FileEntry::new("c", "C", FileType::Rom32Zx0, vec![1; 5000])
      .unwrap();
    let d = Descriptor::new(&var, &placement(0, 512, [5000, 0, 0]), false)
      .unwrap();
    assert_eq!(d.margin, 0);

    let var = variable("c", Some(0x8800), Some(0x3000));
    let d = Descriptor::new(&var, &placement(0, 512, [5000, 0, 0]), false)
      .unwrap();
    assert_eq!(d.margin, 0xa482);
  }

  fn table(names: &[&str]) -> Table {
    let files = names
      .iter()
      .map(|name| file(name, name, FileType::Cas8, 10))
      .enumerate()
      .map(|(i, f)| f.with_game(i))
      .collect::<Vec<_>>();
    let g = Geometry::new(64, 1023, 512).unwrap();
    let alloc = alloc::allocate(&g, &files).unwrap();
    Table::build(&files, &alloc, false).unwrap()
  }

  #[test]
  fn pagination() {
    for &(n, pages) in &[(0, 0), (1, 1), (36, 1), (37, 2), (72, 2), (73, 3)] {
      let names = (0..n).map(|i| format!("Game {:03}", i)).collect::<Vec<_>>();
      let names = names.iter().map(String::as_str).collect::<Vec<_>>();
      let table = table(&names);
      assert_eq!(table.page_count(), pages, "{} games", n);

      let counts = table.pages().map(|p| p.count).collect::<Vec<_>>();
      assert_eq!(counts.iter().sum::<usize>(), n);
      assert!(counts.iter().all(|&c| c > 0 && c <= GAMES_PER_PAGE));
    }
  }

  #[test]
  fn names_split_across_pages() {
    let names = (0..37).map(|i| format!("Game {:03}", i)).collect::<Vec<_>>();
    let names = names.iter().map(String::as_str).collect::<Vec<_>>();
    let table = table(&names);

    let mut out = Vec::new();
    table.write_asm(&mut out).unwrap();
    let text = String::from_utf8(out).unwrap();

    assert!(text.contains(
      "GamePages: db 2\n\
       GamePageData:\n    \
       db 36\n    \
       dw GameNames1\n    \
       db 1\n    \
       dw GameNames2\n"
    ));
    assert!(text.contains(
      "    dw Game37Data ; 36 page 2, game A \"Game 036\"\n"
    ));

    let first = text.split("GameNames1:\n").nth(1).unwrap();
    let first = first.split("\n\nGameNames2:").next().unwrap();
    assert_eq!(first.lines().count(), 36);
    assert!(first.ends_with("    db \"Game 035\", 0 ; Game36Data"));

    let second = text.split("\nGameNames2:\n").nth(1).unwrap();
    assert_eq!(second, "    db \"Game 036\", 0 ; Game37Data\n");
  }

  #[test]
  fn index_is_sorted() {
    let table = table(&["Zaxxon", "Frogger", "Galaxian"]);
    let sorted = table
      .index()
      .iter()
      .map(|e| (e.name.as_str(), e.first_file))
      .collect::<Vec<_>>();
    assert_eq!(sorted, vec![("Frogger", 1), ("Galaxian", 2), ("Zaxxon", 0)]);
  }

  #[test]
  fn asm_output() {
    let files = vec![
      file("zax.1", "Zaxxon", FileType::Rom48Zx01, 20000),
      file("zax.2", "Zaxxon", FileType::Rom48Zx02, 9000),
      file("the.fox", "The Quick Brown Fox", FileType::Cas8, 100).with_game(1),
    ];
    let g = Geometry::new(16, 1023, 512).unwrap();
    let alloc = alloc::allocate(&g, &files).unwrap();
    let table = Table::build(&files, &alloc, true).unwrap();

    let mut out = Vec::new();
    table.write_asm(&mut out).unwrap();
    let text = String::from_utf8(out).unwrap();

    let expected = r#"    dw Game3Data ; 0 page 1, game A "The Quick Brown Fox"
    dw Game1Data ; 1 page 1, game B "Zaxxon"

Game1Data: ; "Zaxxon"
    db 0x09 ; Type: rom.48.zx0.1
    db 0 ; Start of the game data is located in this sector
    dw 0x0000 ; Load address
    dw 0x0000 ; Jump address is not used in this file type
    dw 0x0000 ; Compressed data location is not used in this file type
    dw 512 ; Start address in the 16 kB sector
    dw 14848 ; Size of the game data in first sector
    dw 5152 ; Size of the game data in second sector, if any
    dw 0 ; Size of the game data in third sector, if any
    dw 0x0000 ; CRC16 checksum of the uncompressed image

Game2Data: ; "Zaxxon"
    db 0x0a ; Type: rom.48.zx0.2
    db 1 ; Start of the game data is located in this sector
    dw 0x8000 ; Load address
    dw 0x0000 ; Jump address
    dw 0x9ce2 ; Lowest address the compressed image can reside at without being overwritten
    dw 6175 ; Start address in the 16 kB sector
    dw 9000 ; Size of the game data in first sector
    dw 0 ; Size of the game data in second sector, if any
    dw 0 ; Size of the game data in third sector, if any
    dw 0x0000 ; CRC16 checksum of the uncompressed image

Game3Data: ; "The Quick Brown Fox"
    db 0x03 ; Type: cas.8
    db 1 ; Start of the game data is located in this sector
    dw 0x8800 ; Load address
    dw 0x8800 ; Jump address
    dw 0x0000 ; Compressed data location is not used in this file type
    dw 15175 ; Start address in the 16 kB sector
    dw 100 ; Size of the game data in first sector
    dw 0 ; Size of the game data in second sector, if any
    dw 0 ; Size of the game data in third sector, if any
    dw 0x0000 ; CRC16 checksum of the uncompressed image

GamePages: db 1
GamePageData:
    db 2
    dw GameNames1

GameNames1:
    db "The Quick Brown F.", 0 ; Game3Data
    db "Zaxxon", 0 ; Game1Data
"#;
    assert_eq!(text, expected);
  }
}
