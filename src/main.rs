//! cartpack, a sector packer and game table generator for flash cartridges.

#![deny(missing_docs)]
#![deny(unsafe_code)]

use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use log::Level;
use log::LevelFilter;
use log::Metadata;
use log::Record;
use structopt::StructOpt;

use cartpack::alloc::Geometry;
use cartpack::alloc::RomSize;
use cartpack::build;
use cartpack::config;
use cartpack::config::GameDefinition;
use cartpack::crc;
use cartpack::error;
use cartpack::int;

#[derive(StructOpt, Debug)]
#[structopt(
  name = "cartpack",
  about = "Packs games into flash cartridge sectors and generates the menu's data table."
)]
struct Opts {
  /// Logs more detail; may be repeated.
  #[structopt(short, long, parse(from_occurrences), global = true)]
  verbose: u8,
  /// Only logs warnings and errors.
  #[structopt(short, long, global = true)]
  quiet: bool,

  #[structopt(subcommand)]
  command: Command,
}

#[derive(StructOpt, Debug)]
enum Command {
  /// Lays out every game and writes the sector images and data table.
  Build {
    /// The cartridge size in KiB: 256 or 1024.
    rom_size: RomSize,
    /// The number of bytes reserved for the loader in every sector.
    #[structopt(parse(try_from_str = parse_size))]
    loader_size: usize,
    /// The offset game data starts at in sector 0.
    #[structopt(parse(try_from_str = parse_size))]
    game_start: usize,
    /// Includes a CRC-16 in every descriptor.
    #[structopt(long)]
    check_crc: bool,
    #[structopt(flatten)]
    input: Input,
    /// The directory to write artifacts to; created if missing.
    #[structopt(long, default_value = ".", parse(from_os_str))]
    out: PathBuf,
    /// Writes a JSON5 report of the layout to this file.
    #[structopt(long, parse(from_os_str))]
    layout: Option<PathBuf>,
    /// Prints a hex dump of every non-empty sector.
    #[structopt(long)]
    dump: bool,
  },
  /// Checks the game configuration without building anything.
  Validate {
    #[structopt(flatten)]
    input: Input,
  },
  /// Prints the CRC-16 of a file, for use as a `crc16` value.
  Crc16 {
    /// The file to checksum.
    #[structopt(parse(from_os_str))]
    file: PathBuf,
  },
}

#[derive(StructOpt, Debug)]
struct Input {
  /// The directory game images are read from.
  #[structopt(long, default_value = "roms", parse(from_os_str))]
  roms: PathBuf,
  /// The game configuration; `roms.json` in the ROM directory by default.
  #[structopt(long, parse(from_os_str))]
  config: Option<PathBuf>,
}

impl Input {
  fn config_path(&self) -> PathBuf {
    match &self.config {
      Some(path) => path.clone(),
      None => self.roms.join("roms.json"),
    }
  }

  fn load(&self) -> Result<Vec<GameDefinition>, error::Errors<config::Error>> {
    let path = self.config_path();
    let raw = config::load(&path)?;
    config::validate(&path, &raw)
  }
}

fn parse_size(s: &str) -> Result<usize, String> {
  int::parse(s)
    .map(|(n, _)| n as usize)
    .ok_or_else(|| format!("invalid size {}", s))
}

/// Logs to `stderr`; `info` messages are printed bare.
struct Stderr;

impl log::Log for Stderr {
  fn enabled(&self, metadata: &Metadata) -> bool {
    metadata.level() <= log::max_level()
  }

  fn log(&self, record: &Record) {
    if !self.enabled(record.metadata()) {
      return;
    }
    match record.level() {
      Level::Info => eprintln!("{}", record.args()),
      Level::Error => eprintln!("error: {}", record.args()),
      Level::Warn => eprintln!("warning: {}", record.args()),
      Level::Debug | Level::Trace => eprintln!("{}", record.args()),
    }
  }

  fn flush(&self) {}
}

fn die(message: impl fmt::Display) -> ! {
  eprintln!("error: {}", message);
  std::process::exit(1)
}

fn main() {
  let opts = Opts::from_args();

  let level = match (opts.quiet, opts.verbose) {
    (true, _) => LevelFilter::Warn,
    (false, 0) => LevelFilter::Info,
    (false, 1) => LevelFilter::Debug,
    (false, _) => LevelFilter::Trace,
  };
  if log::set_boxed_logger(Box::new(Stderr)).is_ok() {
    log::set_max_level(level);
  }

  match opts.command {
    Command::Build {
      rom_size,
      loader_size,
      game_start,
      check_crc,
      input,
      out,
      layout,
      dump,
    } => {
      let geometry =
        match Geometry::for_rom(rom_size, loader_size, game_start) {
          Ok(geometry) => geometry,
          Err(e) => die(e),
        };
      let games = match input.load() {
        Ok(games) => games,
        Err(errors) => {
          errors.dump_and_die(1);
          return;
        }
      };

      let roms = &input.roms;
      let build = match build::run(&games, &geometry, check_crc, |p: &Path| {
        fs::read(roms.join(p))
      }) {
        Ok(build) => build,
        Err(e) => {
          e.dump_and_die(1);
          return;
        }
      };

      if let Err(e) = fs::create_dir_all(&out) {
        die(format_args!("couldn't create {}: {}", out.display(), e));
      }
      if let Err(e) = build.write(&out) {
        e.dump_and_die(1);
        return;
      }

      if let Some(path) = layout {
        let text = match build.report().to_json5() {
          Ok(text) => text,
          Err(e) => die(e),
        };
        if let Err(e) = fs::write(&path, text) {
          die(format_args!("couldn't write {}: {}", path.display(), e));
        }
        log::info!("created {}", path.display());
      }

      if dump {
        let stdout = io::stdout();
        if let Err(e) = build.dump(stdout.lock()) {
          die(e);
        }
      }
    }
    Command::Validate { input } => match input.load() {
      Ok(games) => println!(
        "{}: {} games, configuration is valid",
        input.config_path().display(),
        games.len()
      ),
      Err(errors) => errors.dump_and_die(1),
    },
    Command::Crc16 { file } => match fs::read(&file) {
      Ok(data) => {
        println!("CRC16 Checksum: {}", int::hex_word(crc::crc16(&data)))
      }
      Err(e) => die(format_args!("couldn't read {}: {}", file.display(), e)),
    },
  }
}
