//! Error printing facilities.
//!
//! These functions are used to simplify the display of the various errors a
//! build can run into. The [`Error`] trait describes how a Rust error type can
//! be converted into a simple diagnostic.
//!
//! [`Error`]: trait.Error.html

use std::fmt;
use std::io;
use std::path::Path;

/// An error which can be described as a diagnostic.
///
/// Types that implement `Error` must also implement [`std::fmt::Display`]. For
/// the user-displayed error to look right, this implementation should only be
/// one line long.
///
/// [`std::fmt::Display`]: https://doc.rust-lang.org/std/fmt/trait.Display.html
pub trait Error: fmt::Debug + fmt::Display {
  /// Returns a `Cause` describing the input that resulted in the error.
  fn cause(&self) -> Cause<'_>;
  /// Returns an action this error is associated with, if any at all.
  fn action(&self) -> Option<Action>;
}

/// A collection of errors that may built up over the course of an action.
///
/// The type parameter `E` should be a type implementing [`Error`].
///
/// [`Error`]: trait.Error.html
#[derive(Debug)]
pub struct Errors<E>(Vec<E>);

impl<E> Errors<E> {
  /// Creates an empty `Errors`.
  pub fn new() -> Self {
    Errors(Vec::new())
  }

  /// Returns true if this `Errors` hasn't had any errors added yet.
  pub fn is_ok(&self) -> bool {
    self.0.is_empty()
  }

  /// Returns the number of errors collected so far.
  pub fn len(&self) -> usize {
    self.0.len()
  }

  /// Adds a new error to this `Errors`.
  pub fn push(&mut self, error: E) {
    self.0.push(error);
  }

  /// Returns an iterator over the collected errors.
  pub fn iter(&self) -> impl Iterator<Item = &E> {
    self.0.iter()
  }

  /// Converts this collection into a `Result`, yielding `value` if no errors
  /// were collected.
  pub fn into_result<T>(self, value: T) -> Result<T, Self> {
    if self.is_ok() {
      Ok(value)
    } else {
      Err(self)
    }
  }
}

impl<E> From<E> for Errors<E> {
  fn from(error: E) -> Self {
    Errors(vec![error])
  }
}

impl<E: Error> Errors<E> {
  /// Dumps this collection of errors as user-displayable text into `sink`.
  ///
  /// Returns `Ok(true)` if anything was written.
  pub fn dump_to(&self, mut sink: impl io::Write) -> io::Result<bool> {
    if self.0.is_empty() {
      return Ok(false);
    }

    for (i, error) in self.0.iter().enumerate() {
      writeln!(sink, "error: {}", error)?;
      let (prefix, place) = match error.action() {
        Some(action) => ("while", Some(action.describe())),
        None => ("at", None),
      };
      let action = place.map(|a| format!("{} ", a)).unwrap_or_default();
      match error.cause() {
        Cause::File(path) => {
          writeln!(sink, "  {} {}{}", prefix, action, path.display())?;
        }
        Cause::Game { index, name } => match name {
          Some(name) => writeln!(
            sink,
            "  {} {}game {} (\"{}\")",
            prefix, action, index, name
          )?,
          None => writeln!(sink, "  {} {}game {}", prefix, action, index)?,
        },
        Cause::Build => {
          if let Some(action) = place {
            writeln!(sink, "  while {}", action)?;
          }
        }
      }

      if i != self.0.len() - 1 {
        writeln!(sink, "")?;
      }
    }

    Ok(true)
  }

  /// Calls `dump_to()` on `stderr`, exiting the process with the given
  /// `exit_code` if any errors are present.
  pub fn dump_and_die(self, code: i32) {
    // Writing to stderr is fairly unlikely to fail, so panicking is a fine
    // response here.
    if self.dump_to(io::stderr()).unwrap() {
      eprintln!("");
      eprintln!("error: there were {} errors", self.0.len());
      std::process::exit(code)
    }
  }
}

/// The place where an error occured, to varrying degrees of specificity.
pub enum Cause<'a> {
  /// A file, such as the configuration or a game image.
  File(&'a Path),
  /// A game definition within the configuration, by position.
  Game {
    /// The index of the game in the configuration.
    index: usize,
    /// The game's name, if it had one.
    name: Option<&'a str>,
  },
  /// The build as a whole, for errors no single input can be blamed for.
  Build,
}

/// An action that a build performs, which an error may be associated with.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Action {
  /// Reading and checking the game configuration.
  Validating,
  /// Expanding games into files and reading their images.
  Reading,
  /// Laying files out into sectors.
  Allocating,
  /// Writing sector images and the data table.
  Writing,
}

impl Action {
  fn describe(self) -> &'static str {
    match self {
      Self::Validating => "validating",
      Self::Reading => "reading",
      Self::Allocating => "allocating",
      Self::Writing => "writing",
    }
  }
}
