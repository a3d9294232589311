#![warn(rust_2018_idioms)]

//! Decode embedded bitmap strikes (`EBLC`/`EBDT` table pairs) and rebuild
//! them as standalone per-pixel-size font objects.
//!
//! The host font container hands over raw table bytes and its best
//! character mapping through [`tables::HostFont`];
//! [`strike::dump_strikes`] decodes every strike the font stores and
//! assembles one [`strike::FontStrike`] per pixel size, ready to be
//! serialized by an [`emit::StrikeSink`].

/// Reading of binary data.
pub mod binary;
pub mod bitmap;
pub mod emit;
pub mod error;
pub mod size;
pub mod strike;
pub mod tables;
pub mod tag;
