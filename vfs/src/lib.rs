#![no_std]

extern crate alloc;

mod dirent;
mod error;
mod stat;

pub use self::{dirent::DirEntry, error::Error, stat::Stat};

pub type Result<T, E = Error> = core::result::Result<T, E>;
