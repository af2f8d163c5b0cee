//! cartpack, a sector packer and game table generator for flash cartridges.
//!
//! A build takes a list of games, lays their images out into the 16K sectors
//! of a cartridge, and produces one image per sector along with an assembler
//! data table the cartridge's menu firmware boots from.

#![deny(missing_docs)]
#![deny(unused)]
#![deny(warnings)]
#![deny(unsafe_code)]

pub mod alloc;
pub mod build;
pub mod config;
pub mod crc;
pub mod error;
pub mod file;
pub mod int;
pub mod rom;
pub mod table;
pub mod types;
