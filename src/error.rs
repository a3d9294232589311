//! Error types

use crate::binary::read::ReadEof;
use crate::tag::DisplayTag;
use std::fmt;

/// Errors that originate when parsing binary data
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum ParseError {
    BadEof,
    BadValue,
    BadVersion,
    BadOffset,
    BadIndex,
    MissingValue,
    MissingTable(u32),
    NotImplemented,
}

impl From<ReadEof> for ParseError {
    fn from(_error: ReadEof) -> Self {
        ParseError::BadEof
    }
}

impl From<std::num::TryFromIntError> for ParseError {
    fn from(_error: std::num::TryFromIntError) -> Self {
        ParseError::BadValue
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::BadEof => write!(f, "end of data reached unexpectedly"),
            ParseError::BadValue => write!(f, "invalid value"),
            ParseError::BadVersion => write!(f, "unexpected data version"),
            ParseError::BadOffset => write!(f, "invalid data offset"),
            ParseError::BadIndex => write!(f, "invalid data index"),
            ParseError::MissingValue => write!(f, "an expected data value was missing"),
            ParseError::MissingTable(tag) => {
                write!(f, "font is missing '{}' table", DisplayTag(*tag))
            }
            ParseError::NotImplemented => write!(f, "feature not implemented"),
        }
    }
}

impl std::error::Error for ParseError {}

/// Error returned when decoding a bitmap strike fails
///
/// Except for `UnimplementedBitmapFormat`, which only skips the affected
/// glyph, each of these aborts the strike it occurred in. Sibling strikes are
/// unaffected.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum StrikeError {
    /// Strike is not a square, 1-bit monochrome strike.
    UnsupportedStrikeFormat {
        ppem_x: u8,
        ppem_y: u8,
        bit_depth: u8,
    },
    /// A glyph record did not match the shape its storage format requires.
    MalformedBitmapRecord { glyph_id: u16 },
    /// Two index sub-tables claim the same glyph identifier.
    DuplicateGlyphIdentifier(u16),
    /// A composite glyph references a glyph the strike does not store.
    UnresolvedComponentReference { glyph_id: u16, component: u16 },
    /// A composite glyph references itself, directly or transitively.
    CompositeCycleDetected(u16),
    /// A recognized but intentionally unsupported storage format.
    UnimplementedBitmapFormat(u16),
    Parse(ParseError),
}

impl From<ParseError> for StrikeError {
    fn from(error: ParseError) -> Self {
        StrikeError::Parse(error)
    }
}

impl From<ReadEof> for StrikeError {
    fn from(_error: ReadEof) -> Self {
        StrikeError::Parse(ParseError::BadEof)
    }
}

impl From<std::num::TryFromIntError> for StrikeError {
    fn from(_error: std::num::TryFromIntError) -> Self {
        StrikeError::Parse(ParseError::BadValue)
    }
}

impl fmt::Display for StrikeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrikeError::UnsupportedStrikeFormat {
                ppem_x,
                ppem_y,
                bit_depth,
            } => write!(
                f,
                "unsupported strike format: {}x{} pixels at bit depth {}",
                ppem_x, ppem_y, bit_depth
            ),
            StrikeError::MalformedBitmapRecord { glyph_id } => {
                write!(f, "malformed bitmap record for glyph {}", glyph_id)
            }
            StrikeError::DuplicateGlyphIdentifier(glyph_id) => {
                write!(f, "duplicate glyph identifier {}", glyph_id)
            }
            StrikeError::UnresolvedComponentReference {
                glyph_id,
                component,
            } => write!(
                f,
                "composite glyph {} references unresolved component {}",
                glyph_id, component
            ),
            StrikeError::CompositeCycleDetected(glyph_id) => {
                write!(f, "cycle detected in composite glyph {}", glyph_id)
            }
            StrikeError::UnimplementedBitmapFormat(format) => {
                write!(f, "bitmap image format {} is not implemented", format)
            }
            StrikeError::Parse(err) => write!(f, "parse error: {}", err),
        }
    }
}

impl std::error::Error for StrikeError {}
