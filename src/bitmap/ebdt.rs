#![deny(missing_docs)]

//! Bitmap strikes in `EBLC`/`EBDT` table pairs.

use std::convert::TryFrom;

use bitflags::bitflags;
use bitreader::{BitReader, BitReaderError};
use log::warn;

use super::{BitDepth, MonoBitmap, NormalizedMetrics, OriginOffset};
use crate::binary::read::{
    CheckIndex, ReadArray, ReadBinary, ReadBinaryDep, ReadCtxt, ReadFixedSizeDep, ReadFrom,
    ReadScope,
};
use crate::binary::{U16Be, U32Be, I8, U8};
use crate::error::{ParseError, StrikeError};
use crate::size;

bitflags! {
    /// Bitmap flags of a strike.
    ///
    /// Indicate the direction small glyph metrics apply to.
    ///
    /// <https://docs.microsoft.com/en-us/typography/opentype/spec/eblc#bitmapflags>
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StrikeFlags: u8 {
        /// Small glyph metrics are horizontal.
        const HORIZONTAL_METRICS = 0x01;
        /// Small glyph metrics are vertical.
        const VERTICAL_METRICS = 0x02;
    }
}

/// `EBLC` — Embedded Bitmap Location Table
///
/// The directory of bitmap strikes stored by a font, one entry per pixel
/// size.
pub struct EblcTable<'a> {
    /// Major version of this table, 2.
    pub major_version: u16,
    /// Minor version of this table.
    pub minor_version: u16,
    /// The strikes available for this font.
    pub strikes: Vec<BitmapSize<'a>>,
}

/// A description of a strike of bitmap data.
pub struct BitmapSize<'a> {
    /// Bitmap information.
    pub info: BitmapInfo,
    /// Index sub-table records.
    index_sub_table_records: ReadArray<'a, IndexSubTableRecord>,
    /// Index sub-tables, one for each record.
    index_sub_tables: Vec<IndexSubTable<'a>>,
}

#[allow(missing_docs)]
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SbitLineMetrics {
    pub ascender: i8,
    pub descender: i8,
    pub width_max: u8,
    pub caret_slope_numerator: i8,
    pub caret_slope_denominator: i8,
    pub caret_offset: i8,
    pub min_origin_sb: i8,
    pub min_advance_sb: i8,
    pub max_before_bl: i8,
    pub min_after_bl: i8,
    pub pad1: i8,
    pub pad2: i8,
}

/// Subset of `BitmapSize` that includes common fields.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct BitmapInfo {
    /// Line metrics for text rendered horizontally.
    pub hori: SbitLineMetrics,
    /// Line metrics for text rendered vertically.
    pub vert: SbitLineMetrics,
    /// Lowest glyph index for this size.
    pub start_glyph_index: u16,
    /// Highest glyph index for this size.
    pub end_glyph_index: u16,
    /// Horizontal pixels per em.
    pub ppem_x: u8,
    /// Vertical pixels per em.
    pub ppem_y: u8,
    /// Bit depth.
    pub bit_depth: BitDepth,
    /// Vertical or horizontal.
    pub flags: StrikeFlags,
}

/// Sub table record of `BitmapSize` describing a range of glyphs and the
/// location of the sub table.
struct IndexSubTableRecord {
    /// First glyph ID of this range.
    pub first_glyph_index: u16,
    /// Last glyph ID of this range (inclusive).
    pub last_glyph_index: u16,
    // Add to indexSubTableArrayOffset to get offset from beginning of EBLC.
    additional_offset_to_index_sub_table: u32,
}

/// An index sub table of a `BitmapSize` describing the image format and
/// location in `EBDT` of the glyphs it covers.
enum IndexSubTable<'a> {
    /// IndexSubTable1: variable-metrics glyphs with 4-byte offsets.
    Format1 {
        /// Format of EBDT image data.
        image_format: ImageFormat,
        /// Offset to image data in EBDT table.
        image_data_offset: u32,
        /// Offsets into `EBDT` for bitmap data.
        ///
        /// The actual offset for a glyph is `image_data_offset` + the value
        /// read from this array.
        offsets: ReadArray<'a, U32Be>,
    },
    /// IndexSubTable2: all glyphs have identical metrics.
    Format2 {
        /// Format of EBDT image data.
        image_format: ImageFormat,
        /// Offset to image data in EBDT table.
        image_data_offset: u32,
        /// The size of the data for each bitmap.
        image_size: u32,
        /// Metrics for all glyphs in this range.
        big_metrics: BigGlyphMetrics,
    },
    /// IndexSubTable3: variable-metrics glyphs with 2-byte offsets.
    Format3 {
        /// Format of EBDT image data.
        image_format: ImageFormat,
        /// Offset to image data in EBDT table.
        image_data_offset: u32,
        /// Offsets into `EBDT` for bitmap data.
        offsets: ReadArray<'a, U16Be>,
    },
    /// IndexSubTable4: variable-metrics glyphs with sparse glyph codes.
    Format4 {
        /// Format of EBDT image data.
        image_format: ImageFormat,
        /// Offset to image data in EBDT table.
        image_data_offset: u32,
        /// Array of ranges, with a sentinel entry at the end.
        glyph_array: ReadArray<'a, GlyphOffsetPair>,
    },
    /// IndexSubTable5: constant-metrics glyphs with sparse glyph codes.
    Format5 {
        /// Format of EBDT image data.
        image_format: ImageFormat,
        /// Offset to image data in EBDT table.
        image_data_offset: u32,
        /// All glyphs have the same data size.
        image_size: u32,
        /// All glyphs have the same metrics.
        big_metrics: BigGlyphMetrics,
        /// One per glyph, sorted by glyph ID.
        glyph_id_array: ReadArray<'a, U16Be>,
    },
    /// An index sub table whose image format this crate does not decode.
    ///
    /// Its glyphs are skipped rather than failing the whole strike.
    Unsupported {
        /// Format of EBDT image data.
        image_format: u16,
    },
}

/// Image formats of `EBDT` glyph records.
///
/// A closed enumeration; the record decoder matches on it exhaustively.
#[allow(missing_docs)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ImageFormat {
    Format1,
    Format2,
    Format5,
    Format6,
    Format7,
    Format8,
    Format9,
}

#[allow(missing_docs)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SmallGlyphMetrics {
    pub height: u8,
    pub width: u8,
    pub bearing_x: i8,
    pub bearing_y: i8,
    pub advance: u8,
}

#[allow(missing_docs)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BigGlyphMetrics {
    pub height: u8,
    pub width: u8,
    pub hori_bearing_x: i8,
    pub hori_bearing_y: i8,
    pub hori_advance: u8,
    pub vert_bearing_x: i8,
    pub vert_bearing_y: i8,
    pub vert_advance: u8,
}

/// The two metrics record shapes stored alongside glyph bitmap data.
#[derive(Debug, Copy, Clone)]
pub enum GlyphMetrics {
    /// Compact single-axis metrics.
    Small(SmallGlyphMetrics),
    /// Full metrics carrying both axes.
    Big(BigGlyphMetrics),
}

/// The direction of small glyph metrics when present.
#[derive(Debug, Copy, Clone)]
pub enum MetricsDirection {
    /// Small metrics describe the horizontal axis.
    Horizontal,
    /// Small metrics describe the vertical axis.
    Vertical,
    /// The strike does not declare a direction.
    Unknown,
}

/// Record indicating the offset in `EBDT` for a specific glyph id.
struct GlyphOffsetPair {
    /// Glyph ID of glyph present.
    pub glyph_id: u16,
    /// Location in EBDT.
    pub offset: u16,
}

/// `EBDT` — Embedded Bitmap Data Table
pub struct EbdtTable<'a> {
    /// Major version of this table, 2.
    pub major_version: u16,
    /// Minor version of this table.
    pub minor_version: u16,
    /// The raw data of the whole `EBDT` table.
    data: ReadScope<'a>,
}

/// A raw glyph record read from `EBDT`.
///
/// Direct-bitmap variants carry packed bitmap data; the composite variants
/// carry a component list and no bitmap of their own.
pub enum GlyphRecord<'a> {
    /// Format 1: small metrics, byte-aligned data.
    Format1 {
        /// Metrics information for the glyph.
        small_metrics: SmallGlyphMetrics,
        /// Byte-aligned bitmap data.
        data: &'a [u8],
    },
    /// Format 2: small metrics, bit-aligned data.
    Format2 {
        /// Metrics information for the glyph.
        small_metrics: SmallGlyphMetrics,
        /// Bit-aligned bitmap data.
        data: &'a [u8],
    },
    // Format3 (obsolete, not in OpenType spec)
    // Format4 (not supported by OpenType, Apple specific)
    /// Format 5: metrics in EBLC, bit-aligned image data only.
    Format5 {
        /// Metrics information for the glyph, from the index sub table.
        big_metrics: BigGlyphMetrics,
        /// Bit-aligned bitmap data.
        data: &'a [u8],
    },
    /// Format 6: big metrics, byte-aligned data.
    Format6 {
        /// Metrics information for the glyph.
        big_metrics: BigGlyphMetrics,
        /// Byte-aligned bitmap data.
        data: &'a [u8],
    },
    /// Format 7: big metrics, bit-aligned data.
    Format7 {
        /// Metrics information for the glyph.
        big_metrics: BigGlyphMetrics,
        /// Bit-aligned bitmap data.
        data: &'a [u8],
    },
    /// Format 8: small metrics, component data.
    Format8 {
        /// Metrics information for the glyph.
        small_metrics: SmallGlyphMetrics,
        /// Array of EbdtComponent records.
        components: ReadArray<'a, EbdtComponent>,
    },
    /// Format 9: big metrics, component data.
    Format9 {
        /// Metrics information for the glyph.
        big_metrics: BigGlyphMetrics,
        /// Array of EbdtComponent records.
        components: ReadArray<'a, EbdtComponent>,
    },
}

/// The EbdtComponent record is used in glyph bitmap data formats 8 and 9.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct EbdtComponent {
    /// Component glyph ID
    pub glyph_id: u16,
    /// Position of component left
    pub x_offset: i8,
    /// Position of component top
    pub y_offset: i8,
}

impl<'a> ReadBinary<'a> for EblcTable<'a> {
    type HostType = Self;

    fn read(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let table = ctxt.scope();

        let major_version = ctxt.read_u16be()?;
        // Version 2 is EBLC. 3 (CBLC) is backward compatible but adds colour
        // formats and bit depths that are rejected at the strike level.
        ctxt.check_version(major_version >= 2 && major_version <= 3)?;
        let minor_version = ctxt.read_u16be()?;
        let num_sizes = ctxt.read_u32be()?;
        let strikes = ctxt
            .read_array_dep::<BitmapSize<'_>>(usize::try_from(num_sizes)?, table)?
            .iter_res()
            .collect::<Result<Vec<_>, _>>()?;

        Ok(EblcTable {
            major_version,
            minor_version,
            strikes,
        })
    }
}

impl<'a> ReadBinary<'a> for EbdtTable<'a> {
    type HostType = Self;

    fn read(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        // The locators in the EBLC table are relative to the start of the
        // EBDT table, so hold on to a scope at the start of the table.
        let data = ctxt.scope();
        let major_version = ctxt.read_u16be()?;
        ctxt.check_version(major_version >= 2 && major_version <= 3)?;
        let minor_version = ctxt.read_u16be()?;
        Ok(EbdtTable {
            major_version,
            minor_version,
            data,
        })
    }
}

impl<'a> EbdtTable<'a> {
    /// Read the glyph record stored at `offset`.
    ///
    /// `metrics` supplies the shared metrics of the owning index sub table,
    /// required by image format 5.
    pub fn glyph_record(
        &self,
        format: ImageFormat,
        offset: usize,
        length: usize,
        metrics: Option<BigGlyphMetrics>,
    ) -> Result<GlyphRecord<'a>, ParseError> {
        let mut ctxt = self.data.offset_length(offset, length)?.ctxt();
        ctxt.read_dep::<ImageFormat>((format, metrics))
    }
}

impl<'a> BitmapSize<'a> {
    /// Every glyph this strike stores, in index sub-table order.
    ///
    /// Glyph identifiers with zero-length data ranges are absent from the
    /// strike and omitted. Decoding a present record that does not match its
    /// declared storage format fails with
    /// [`StrikeError::MalformedBitmapRecord`].
    pub fn glyph_records(
        &self,
        ebdt: &EbdtTable<'a>,
    ) -> Result<Vec<(u16, GlyphRecord<'a>)>, StrikeError> {
        let mut records = Vec::new();
        for (index, sub_table) in self.index_sub_tables.iter().enumerate() {
            let range = self.index_sub_table_records.get_item(index);
            sub_table.append_records(&range, ebdt, &mut records)?;
        }
        Ok(records)
    }
}

impl<'a> IndexSubTable<'a> {
    fn append_records(
        &self,
        range: &IndexSubTableRecord,
        ebdt: &EbdtTable<'a>,
        records: &mut Vec<(u16, GlyphRecord<'a>)>,
    ) -> Result<(), StrikeError> {
        match self {
            IndexSubTable::Format1 {
                image_format,
                image_data_offset,
                offsets,
            } => {
                let image_data_offset = usize::try_from(*image_data_offset)?;
                for (i, glyph_id) in
                    (range.first_glyph_index..=range.last_glyph_index).enumerate()
                {
                    offsets.check_index(i + 1)?;
                    let start = usize::try_from(offsets.get_item(i))?;
                    let end = usize::try_from(offsets.get_item(i + 1))?;
                    let length = end.checked_sub(start).ok_or(ParseError::BadOffset)?;
                    if length == 0 {
                        // A missing glyph is represented by an offset
                        // followed by the same offset for the next glyph.
                        continue;
                    }
                    let record = ebdt
                        .glyph_record(*image_format, image_data_offset + start, length, None)
                        .map_err(|_| StrikeError::MalformedBitmapRecord { glyph_id })?;
                    records.push((glyph_id, record));
                }
            }
            IndexSubTable::Format2 {
                image_format,
                image_data_offset,
                image_size,
                big_metrics,
            } => {
                let image_data_offset = usize::try_from(*image_data_offset)?;
                let image_size = usize::try_from(*image_size)?;
                for (i, glyph_id) in
                    (range.first_glyph_index..=range.last_glyph_index).enumerate()
                {
                    let record = ebdt
                        .glyph_record(
                            *image_format,
                            image_data_offset + i * image_size,
                            image_size,
                            Some(*big_metrics),
                        )
                        .map_err(|_| StrikeError::MalformedBitmapRecord { glyph_id })?;
                    records.push((glyph_id, record));
                }
            }
            IndexSubTable::Format3 {
                image_format,
                image_data_offset,
                offsets,
            } => {
                let image_data_offset = usize::try_from(*image_data_offset)?;
                for (i, glyph_id) in
                    (range.first_glyph_index..=range.last_glyph_index).enumerate()
                {
                    offsets.check_index(i + 1)?;
                    let start = usize::from(offsets.get_item(i));
                    let end = usize::from(offsets.get_item(i + 1));
                    let length = end.checked_sub(start).ok_or(ParseError::BadOffset)?;
                    if length == 0 {
                        continue;
                    }
                    let record = ebdt
                        .glyph_record(*image_format, image_data_offset + start, length, None)
                        .map_err(|_| StrikeError::MalformedBitmapRecord { glyph_id })?;
                    records.push((glyph_id, record));
                }
            }
            IndexSubTable::Format4 {
                image_format,
                image_data_offset,
                glyph_array,
            } => {
                let image_data_offset = usize::try_from(*image_data_offset)?;
                // The final entry is a sentinel that only bounds the size of
                // the preceding glyph.
                for i in 1..glyph_array.len() {
                    let pair = glyph_array.get_item(i - 1);
                    let next = glyph_array.get_item(i);
                    let length = usize::from(
                        next.offset
                            .checked_sub(pair.offset)
                            .ok_or(ParseError::BadOffset)?,
                    );
                    if length == 0 {
                        continue;
                    }
                    let record = ebdt
                        .glyph_record(
                            *image_format,
                            image_data_offset + usize::from(pair.offset),
                            length,
                            None,
                        )
                        .map_err(|_| StrikeError::MalformedBitmapRecord {
                            glyph_id: pair.glyph_id,
                        })?;
                    records.push((pair.glyph_id, record));
                }
            }
            IndexSubTable::Format5 {
                image_format,
                image_data_offset,
                image_size,
                big_metrics,
                glyph_id_array,
            } => {
                let image_data_offset = usize::try_from(*image_data_offset)?;
                let image_size = usize::try_from(*image_size)?;
                for (i, glyph_id) in glyph_id_array.iter().enumerate() {
                    let record = ebdt
                        .glyph_record(
                            *image_format,
                            image_data_offset + i * image_size,
                            image_size,
                            Some(*big_metrics),
                        )
                        .map_err(|_| StrikeError::MalformedBitmapRecord { glyph_id })?;
                    records.push((glyph_id, record));
                }
            }
            IndexSubTable::Unsupported { image_format } => {
                warn!(
                    "skipping glyphs {}..={}: image format {} is not implemented",
                    range.first_glyph_index, range.last_glyph_index, image_format
                );
            }
        }
        Ok(())
    }
}

impl BitmapInfo {
    /// The direction that applies to small glyph metrics in this strike.
    pub fn metrics_direction(&self) -> MetricsDirection {
        if self.flags.contains(StrikeFlags::HORIZONTAL_METRICS) {
            MetricsDirection::Horizontal
        } else if self.flags.contains(StrikeFlags::VERTICAL_METRICS) {
            MetricsDirection::Vertical
        } else {
            MetricsDirection::Unknown
        }
    }

    /// Ensure this strike is a square, 1-bit monochrome strike.
    pub fn check_monochrome(&self) -> Result<(), StrikeError> {
        if self.ppem_x != self.ppem_y || self.bit_depth != BitDepth::One {
            return Err(StrikeError::UnsupportedStrikeFormat {
                ppem_x: self.ppem_x,
                ppem_y: self.ppem_y,
                bit_depth: self.bit_depth as u8,
            });
        }
        Ok(())
    }
}

impl ImageFormat {
    /// The format number of this image format.
    pub fn code(self) -> u16 {
        match self {
            ImageFormat::Format1 => 1,
            ImageFormat::Format2 => 2,
            ImageFormat::Format5 => 5,
            ImageFormat::Format6 => 6,
            ImageFormat::Format7 => 7,
            ImageFormat::Format8 => 8,
            ImageFormat::Format9 => 9,
        }
    }
}

impl TryFrom<u16> for ImageFormat {
    type Error = ParseError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(ImageFormat::Format1),
            2 => Ok(ImageFormat::Format2),
            5 => Ok(ImageFormat::Format5),
            6 => Ok(ImageFormat::Format6),
            7 => Ok(ImageFormat::Format7),
            8 => Ok(ImageFormat::Format8),
            9 => Ok(ImageFormat::Format9),
            // Obsolete or colour formats that this crate does not decode.
            3 | 4 | 17 | 18 | 19 => Err(ParseError::NotImplemented),
            _ => Err(ParseError::BadValue),
        }
    }
}

impl<'a> ReadBinaryDep<'a> for ImageFormat {
    type Args = (ImageFormat, Option<BigGlyphMetrics>);
    type HostType = GlyphRecord<'a>;

    fn read_dep(
        ctxt: &mut ReadCtxt<'a>,
        (format, metrics): Self::Args,
    ) -> Result<Self::HostType, ParseError> {
        match format {
            ImageFormat::Format1 => {
                let small_metrics = ctxt.read::<SmallGlyphMetrics>()?;
                let data = ctxt.scope().data();

                Ok(GlyphRecord::Format1 {
                    small_metrics,
                    data,
                })
            }
            ImageFormat::Format2 => {
                let small_metrics = ctxt.read::<SmallGlyphMetrics>()?;
                let data = ctxt.scope().data();

                Ok(GlyphRecord::Format2 {
                    small_metrics,
                    data,
                })
            }
            ImageFormat::Format5 => Ok(GlyphRecord::Format5 {
                big_metrics: metrics.ok_or(ParseError::MissingValue)?,
                data: ctxt.scope().data(),
            }),
            ImageFormat::Format6 => {
                let big_metrics = ctxt.read::<BigGlyphMetrics>()?;
                let data = ctxt.scope().data();

                Ok(GlyphRecord::Format6 { big_metrics, data })
            }
            ImageFormat::Format7 => {
                let big_metrics = ctxt.read::<BigGlyphMetrics>()?;
                let data = ctxt.scope().data();

                Ok(GlyphRecord::Format7 { big_metrics, data })
            }
            ImageFormat::Format8 => {
                let small_metrics = ctxt.read::<SmallGlyphMetrics>()?;
                let _pad = ctxt.read_u8()?;
                let num_components = usize::from(ctxt.read_u16be()?);
                let components = ctxt.read_array::<EbdtComponent>(num_components)?;

                Ok(GlyphRecord::Format8 {
                    small_metrics,
                    components,
                })
            }
            ImageFormat::Format9 => {
                let big_metrics = ctxt.read::<BigGlyphMetrics>()?;
                let num_components = usize::from(ctxt.read_u16be()?);
                let components = ctxt.read_array::<EbdtComponent>(num_components)?;

                Ok(GlyphRecord::Format9 {
                    big_metrics,
                    components,
                })
            }
        }
    }
}

impl<'a> GlyphRecord<'a> {
    /// The image format this record was stored in.
    pub fn image_format(&self) -> ImageFormat {
        match self {
            GlyphRecord::Format1 { .. } => ImageFormat::Format1,
            GlyphRecord::Format2 { .. } => ImageFormat::Format2,
            GlyphRecord::Format5 { .. } => ImageFormat::Format5,
            GlyphRecord::Format6 { .. } => ImageFormat::Format6,
            GlyphRecord::Format7 { .. } => ImageFormat::Format7,
            GlyphRecord::Format8 { .. } => ImageFormat::Format8,
            GlyphRecord::Format9 { .. } => ImageFormat::Format9,
        }
    }

    /// The metrics stored with (or shared into) this record.
    pub fn metrics(&self) -> GlyphMetrics {
        match self {
            GlyphRecord::Format1 { small_metrics, .. }
            | GlyphRecord::Format2 { small_metrics, .. }
            | GlyphRecord::Format8 { small_metrics, .. } => GlyphMetrics::Small(*small_metrics),
            GlyphRecord::Format5 { big_metrics, .. }
            | GlyphRecord::Format6 { big_metrics, .. }
            | GlyphRecord::Format7 { big_metrics, .. }
            | GlyphRecord::Format9 { big_metrics, .. } => GlyphMetrics::Big(*big_metrics),
        }
    }

    /// Returns `true` for component-reference records (formats 8 and 9).
    pub fn is_composite(&self) -> bool {
        matches!(
            self,
            GlyphRecord::Format8 { .. } | GlyphRecord::Format9 { .. }
        )
    }

    /// The component list of a composite record.
    pub fn components(&self) -> Option<ReadArray<'a, EbdtComponent>> {
        match self {
            GlyphRecord::Format8 { components, .. } | GlyphRecord::Format9 { components, .. } => {
                Some(components.clone())
            }
            _ => None,
        }
    }

    /// Decode the packed bitmap data of a direct-bitmap record.
    ///
    /// Composite records carry no bitmap and fail with
    /// `ParseError::BadValue`.
    pub fn decode_bitmap(&self, bit_depth: BitDepth) -> Result<MonoBitmap, ParseError> {
        match self {
            GlyphRecord::Format1 {
                small_metrics,
                data,
            } => expand_byte_aligned_data(bit_depth, small_metrics.width, small_metrics.height, data),
            GlyphRecord::Format6 { big_metrics, data } => {
                expand_byte_aligned_data(bit_depth, big_metrics.width, big_metrics.height, data)
            }
            GlyphRecord::Format2 {
                small_metrics,
                data,
            } => {
                let unpacked = unpack_bit_aligned_data(
                    bit_depth,
                    small_metrics.width,
                    small_metrics.height,
                    data,
                )
                .map_err(parse_error_from_bitreader_error)?;
                expand_byte_aligned_data(
                    bit_depth,
                    small_metrics.width,
                    small_metrics.height,
                    &unpacked,
                )
            }
            GlyphRecord::Format5 { big_metrics, data }
            | GlyphRecord::Format7 { big_metrics, data } => {
                let unpacked =
                    unpack_bit_aligned_data(bit_depth, big_metrics.width, big_metrics.height, data)
                        .map_err(parse_error_from_bitreader_error)?;
                expand_byte_aligned_data(bit_depth, big_metrics.width, big_metrics.height, &unpacked)
            }
            GlyphRecord::Format8 { .. } | GlyphRecord::Format9 { .. } => Err(ParseError::BadValue),
        }
    }
}

impl GlyphMetrics {
    /// The width of the glyph bitmap in pixels.
    pub fn width(&self) -> u8 {
        match self {
            GlyphMetrics::Small(small) => small.width,
            GlyphMetrics::Big(big) => big.width,
        }
    }

    /// The height of the glyph bitmap in pixels.
    pub fn height(&self) -> u8 {
        match self {
            GlyphMetrics::Small(small) => small.height,
            GlyphMetrics::Big(big) => big.height,
        }
    }

    /// Produce metrics in the single output convention.
    ///
    /// Small metrics only describe the axis given by `direction`; the other
    /// axis is zeroed. The horizontal origin is converted from the stored
    /// offset to the top of the image to an offset to its bottom.
    pub fn normalize(&self, direction: MetricsDirection) -> NormalizedMetrics {
        match self {
            GlyphMetrics::Small(small) => {
                let zero = OriginOffset { x: 0, y: 0 };
                match direction {
                    MetricsDirection::Horizontal | MetricsDirection::Unknown => {
                        NormalizedMetrics {
                            width: small.width,
                            height: small.height,
                            hori_origin: OriginOffset {
                                x: i16::from(small.bearing_x),
                                y: i16::from(small.bearing_y) - i16::from(small.height),
                            },
                            hori_advance: small.advance,
                            vert_origin: zero,
                            vert_advance: 0,
                        }
                    }
                    MetricsDirection::Vertical => NormalizedMetrics {
                        width: small.width,
                        height: small.height,
                        hori_origin: zero,
                        hori_advance: 0,
                        vert_origin: OriginOffset {
                            x: i16::from(small.bearing_x),
                            y: i16::from(small.bearing_y),
                        },
                        vert_advance: small.advance,
                    },
                }
            }
            GlyphMetrics::Big(big) => NormalizedMetrics {
                width: big.width,
                height: big.height,
                hori_origin: OriginOffset {
                    x: i16::from(big.hori_bearing_x),
                    y: i16::from(big.hori_bearing_y) - i16::from(big.height),
                },
                hori_advance: big.hori_advance,
                vert_origin: OriginOffset {
                    x: i16::from(big.vert_bearing_x),
                    y: i16::from(big.vert_bearing_y),
                },
                vert_advance: big.vert_advance,
            },
        }
    }
}

impl<'a> ReadBinaryDep<'a> for BitmapSize<'a> {
    type Args = ReadScope<'a>;
    type HostType = Self;

    fn read_dep(ctxt: &mut ReadCtxt<'a>, eblc_scope: Self::Args) -> Result<Self, ParseError> {
        let index_sub_table_array_offset = usize::try_from(ctxt.read_u32be()?)?;
        let _index_tables_size = ctxt.read_u32be()?;
        let number_of_index_sub_tables = ctxt.read_u32be()?;
        let _color_ref = ctxt.read_u32be()?; // Not used; set to 0.
        let hori = ctxt.read::<SbitLineMetrics>()?;
        let vert = ctxt.read::<SbitLineMetrics>()?;
        let start_glyph_index = ctxt.read_u16be()?;
        let end_glyph_index = ctxt.read_u16be()?;
        let ppem_x = ctxt.read_u8()?;
        let ppem_y = ctxt.read_u8()?;
        let bit_depth = BitDepth::try_from(ctxt.read_u8()?)?;
        let flags = StrikeFlags::from_bits_retain(ctxt.read_u8()?);

        // Read the index sub tables
        let index_sub_table_records: ReadArray<'_, IndexSubTableRecord> = eblc_scope
            .offset(index_sub_table_array_offset)
            .ctxt()
            .read_array::<IndexSubTableRecord>(usize::try_from(number_of_index_sub_tables)?)?;
        let mut index_sub_tables = Vec::with_capacity(usize::try_from(number_of_index_sub_tables)?);
        for index_sub_table_record in index_sub_table_records.iter() {
            let offset = index_sub_table_array_offset
                .checked_add(usize::try_from(
                    index_sub_table_record.additional_offset_to_index_sub_table,
                )?)
                .ok_or(ParseError::BadOffset)?;
            let index_sub_table = eblc_scope.offset(offset).ctxt().read_dep::<IndexSubTable<'_>>((
                index_sub_table_record.first_glyph_index,
                index_sub_table_record.last_glyph_index,
            ))?;
            index_sub_tables.push(index_sub_table);
        }

        Ok(BitmapSize {
            info: BitmapInfo {
                hori,
                vert,
                start_glyph_index,
                end_glyph_index,
                ppem_x,
                ppem_y,
                bit_depth,
                flags,
            },
            index_sub_table_records,
            index_sub_tables,
        })
    }
}

impl<'a> ReadFixedSizeDep<'a> for BitmapSize<'a> {
    fn size(_: Self::Args) -> usize {
        // Offset32         indexSubTableArrayOffset
        // uint32           indexTablesSize
        // uint32           numberofIndexSubTables
        // uint32           colorRef
        (4 * size::U32)
        // SbitLineMetrics  hori
        // SbitLineMetrics  vert
        + (2 * SbitLineMetrics::size(()))
        // uint16           startGlyphIndex
        // uint16           endGlyphIndex
        + (2 * size::U16)
        // uint8            ppemX
        // uint8            ppemY
        // uint8            bitDepth
        // int8             flags
        + 4
    }
}

impl<'a> ReadBinary<'a> for SbitLineMetrics {
    type HostType = Self;

    fn read(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let ascender = ctxt.read_i8()?;
        let descender = ctxt.read_i8()?;
        let width_max = ctxt.read_u8()?;
        let caret_slope_numerator = ctxt.read_i8()?;
        let caret_slope_denominator = ctxt.read_i8()?;
        let caret_offset = ctxt.read_i8()?;
        let min_origin_sb = ctxt.read_i8()?;
        let min_advance_sb = ctxt.read_i8()?;
        let max_before_bl = ctxt.read_i8()?;
        let min_after_bl = ctxt.read_i8()?;
        let pad1 = ctxt.read_i8()?;
        let pad2 = ctxt.read_i8()?;

        Ok(SbitLineMetrics {
            ascender,
            descender,
            width_max,
            caret_slope_numerator,
            caret_slope_denominator,
            caret_offset,
            min_origin_sb,
            min_advance_sb,
            max_before_bl,
            min_after_bl,
            pad1,
            pad2,
        })
    }
}

impl<'a> ReadFixedSizeDep<'a> for SbitLineMetrics {
    fn size(_: Self::Args) -> usize {
        // 12 fields, all 1 byte
        12
    }
}

impl<'a> ReadFrom<'a> for IndexSubTableRecord {
    type ReadType = (U16Be, U16Be, U32Be);

    fn from(
        (first_glyph_index, last_glyph_index, additional_offset_to_index_sub_table): (
            u16,
            u16,
            u32,
        ),
    ) -> Self {
        IndexSubTableRecord {
            first_glyph_index,
            last_glyph_index,
            additional_offset_to_index_sub_table,
        }
    }
}

impl<'a> ReadBinaryDep<'a> for IndexSubTable<'a> {
    type Args = (u16, u16);
    type HostType = Self;

    fn read_dep(
        ctxt: &mut ReadCtxt<'a>,
        (first_glyph_index, last_glyph_index): (u16, u16),
    ) -> Result<Self, ParseError> {
        ctxt.check(first_glyph_index <= last_glyph_index)?;
        let index_format = ctxt.read_u16be()?;
        let image_format_code = ctxt.read_u16be()?;
        let image_data_offset = ctxt.read_u32be()?;
        let image_format = match ImageFormat::try_from(image_format_code) {
            Ok(image_format) => image_format,
            Err(ParseError::NotImplemented) => {
                return Ok(IndexSubTable::Unsupported {
                    image_format: image_format_code,
                })
            }
            Err(err) => return Err(err),
        };

        match index_format {
            1 => {
                // +1 for last_glyph_index being inclusive,
                // +1 for there being an extra record at the end
                let offsets = ctxt.read_array::<U32Be>(
                    usize::from(last_glyph_index - first_glyph_index) + 2,
                )?;
                Ok(IndexSubTable::Format1 {
                    image_format,
                    image_data_offset,
                    offsets,
                })
            }
            2 => {
                let image_size = ctxt.read_u32be()?;
                let big_metrics = ctxt.read::<BigGlyphMetrics>()?;
                Ok(IndexSubTable::Format2 {
                    image_format,
                    image_data_offset,
                    image_size,
                    big_metrics,
                })
            }
            3 => {
                let offsets = ctxt.read_array::<U16Be>(
                    usize::from(last_glyph_index - first_glyph_index) + 2,
                )?;
                Ok(IndexSubTable::Format3 {
                    image_format,
                    image_data_offset,
                    offsets,
                })
            }
            4 => {
                let num_glyphs = ctxt.read_u32be()?;
                let glyph_array =
                    ctxt.read_array::<GlyphOffsetPair>(usize::try_from(num_glyphs)? + 1)?;
                Ok(IndexSubTable::Format4 {
                    image_format,
                    image_data_offset,
                    glyph_array,
                })
            }
            5 => {
                let image_size = ctxt.read_u32be()?;
                let big_metrics = ctxt.read::<BigGlyphMetrics>()?;
                let num_glyphs = ctxt.read_u32be()?;
                let glyph_id_array = ctxt.read_array::<U16Be>(usize::try_from(num_glyphs)?)?;
                Ok(IndexSubTable::Format5 {
                    image_format,
                    image_data_offset,
                    image_size,
                    big_metrics,
                    glyph_id_array,
                })
            }
            _ => Err(ParseError::BadValue),
        }
    }
}

impl<'a> ReadFrom<'a> for SmallGlyphMetrics {
    type ReadType = ((U8, U8), (I8, I8, U8));

    fn from(((height, width), (bearing_x, bearing_y, advance)): ((u8, u8), (i8, i8, u8))) -> Self {
        SmallGlyphMetrics {
            height,
            width,
            bearing_x,
            bearing_y,
            advance,
        }
    }
}

impl<'a> ReadBinary<'a> for BigGlyphMetrics {
    type HostType = Self;

    fn read(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let height = ctxt.read_u8()?;
        let width = ctxt.read_u8()?;
        let hori_bearing_x = ctxt.read_i8()?;
        let hori_bearing_y = ctxt.read_i8()?;
        let hori_advance = ctxt.read_u8()?;
        let vert_bearing_x = ctxt.read_i8()?;
        let vert_bearing_y = ctxt.read_i8()?;
        let vert_advance = ctxt.read_u8()?;

        Ok(BigGlyphMetrics {
            height,
            width,
            hori_bearing_x,
            hori_bearing_y,
            hori_advance,
            vert_bearing_x,
            vert_bearing_y,
            vert_advance,
        })
    }
}

impl<'a> ReadFixedSizeDep<'a> for BigGlyphMetrics {
    fn size(_: Self::Args) -> usize {
        // 8 fields, all 1 byte
        8
    }
}

impl<'a> ReadFrom<'a> for GlyphOffsetPair {
    type ReadType = (U16Be, U16Be);

    fn from((glyph_id, offset): (u16, u16)) -> Self {
        GlyphOffsetPair { glyph_id, offset }
    }
}

impl<'a> ReadFrom<'a> for EbdtComponent {
    type ReadType = (U16Be, I8, I8);

    fn from((glyph_id, x_offset, y_offset): (u16, i8, i8)) -> Self {
        EbdtComponent {
            glyph_id,
            x_offset,
            y_offset,
        }
    }
}

/// Expand packed rows where each row starts on a byte boundary.
fn expand_byte_aligned_data(
    bit_depth: BitDepth,
    width: u8,
    height: u8,
    data: &[u8],
) -> Result<MonoBitmap, ParseError> {
    // Only monochrome strikes are decoded; the strike-level check rejects
    // other depths before any glyph is read.
    if bit_depth != BitDepth::One {
        return Err(ParseError::NotImplemented);
    }
    let width = usize::from(width);
    let height = usize::from(height);
    let bytes_per_row = (width + 7) >> 3;
    if data.len() < height * bytes_per_row {
        return Err(ParseError::BadEof);
    }

    let mut bitmap = MonoBitmap::new(width, height);
    for y in 0..height {
        let row = &data[y * bytes_per_row..(y + 1) * bytes_per_row];
        for x in 0..width {
            if (row[x >> 3] >> (7 - (x & 7))) & 1 != 0 {
                bitmap.set(x, y, 1);
            }
        }
    }
    Ok(bitmap)
}

/// Re-pack a continuous bit stream into rows that start on byte boundaries.
fn unpack_bit_aligned_data(
    bit_depth: BitDepth,
    width: u8,
    height: u8,
    data: &[u8],
) -> Result<Vec<u8>, BitReaderError> {
    let bits_per_row = bit_depth as usize * usize::from(width);
    let whole_bytes_per_row = bits_per_row >> 3;
    let remaining_bits = (bits_per_row & 7) as u8;
    let bytes_per_row = whole_bytes_per_row + if remaining_bits != 0 { 1 } else { 0 };

    let mut offset = 0;
    let mut image_data = vec![0u8; usize::from(height) * bytes_per_row];
    let mut reader = BitReader::new(data);
    for _ in 0..height {
        // Read whole bytes, then the remainder
        for byte in image_data[offset..(offset + whole_bytes_per_row)].iter_mut() {
            *byte = reader.read_u8(8)?;
        }
        offset += whole_bytes_per_row;
        if remaining_bits != 0 {
            let byte = reader.read_u8(remaining_bits)?;
            image_data[offset] = byte << (8 - remaining_bits);
            offset += 1;
        }
    }

    Ok(image_data)
}

fn parse_error_from_bitreader_error(err: BitReaderError) -> ParseError {
    match err {
        BitReaderError::NotEnoughData { .. } => ParseError::BadEof,
        BitReaderError::TooManyBitsForType { .. } => {
            // This should only happen as a result of programmer error as we
            // only call bitreader with values <= 8.
            unreachable!("{}", err)
        }
    }
}

#[cfg(test)]
mod tests {
    use byteorder::{BigEndian, WriteBytesExt};

    use super::*;

    fn write_sbit_line_metrics(data: &mut Vec<u8>, ascender: i8, descender: i8) {
        data.write_i8(ascender).unwrap();
        data.write_i8(descender).unwrap();
        data.extend_from_slice(&[0; 10]);
    }

    fn write_small_metrics(
        data: &mut Vec<u8>,
        height: u8,
        width: u8,
        bearing_x: i8,
        bearing_y: i8,
        advance: u8,
    ) {
        data.write_u8(height).unwrap();
        data.write_u8(width).unwrap();
        data.write_i8(bearing_x).unwrap();
        data.write_i8(bearing_y).unwrap();
        data.write_u8(advance).unwrap();
    }

    fn test_ebdt() -> Vec<u8> {
        let mut ebdt = Vec::new();
        ebdt.write_u16::<BigEndian>(2).unwrap(); // majorVersion
        ebdt.write_u16::<BigEndian>(0).unwrap(); // minorVersion
        // glyph 1, format 1, at offset 4: 5x2 byte-aligned bitmap
        write_small_metrics(&mut ebdt, 2, 5, 0, 2, 6);
        ebdt.push(0b1011_0000);
        ebdt.push(0b0110_0000);
        ebdt
    }

    fn test_eblc() -> Vec<u8> {
        let mut eblc = Vec::new();
        eblc.write_u16::<BigEndian>(2).unwrap(); // majorVersion
        eblc.write_u16::<BigEndian>(0).unwrap(); // minorVersion
        eblc.write_u32::<BigEndian>(1).unwrap(); // numSizes
        // BitmapSize
        eblc.write_u32::<BigEndian>(56).unwrap(); // indexSubTableArrayOffset
        eblc.write_u32::<BigEndian>(28).unwrap(); // indexTablesSize
        eblc.write_u32::<BigEndian>(1).unwrap(); // numberOfIndexSubTables
        eblc.write_u32::<BigEndian>(0).unwrap(); // colorRef
        write_sbit_line_metrics(&mut eblc, 7, 1);
        write_sbit_line_metrics(&mut eblc, 4, -4);
        eblc.write_u16::<BigEndian>(1).unwrap(); // startGlyphIndex
        eblc.write_u16::<BigEndian>(2).unwrap(); // endGlyphIndex
        eblc.push(8); // ppemX
        eblc.push(8); // ppemY
        eblc.push(1); // bitDepth
        eblc.push(1); // flags: horizontal
        // IndexSubTableArray
        eblc.write_u16::<BigEndian>(1).unwrap(); // firstGlyphIndex
        eblc.write_u16::<BigEndian>(2).unwrap(); // lastGlyphIndex
        eblc.write_u32::<BigEndian>(8).unwrap(); // additionalOffsetToIndexSubtable
        // IndexSubTable format 1
        eblc.write_u16::<BigEndian>(1).unwrap(); // indexFormat
        eblc.write_u16::<BigEndian>(1).unwrap(); // imageFormat
        eblc.write_u32::<BigEndian>(4).unwrap(); // imageDataOffset
        // glyph 2 shares its offset with the end sentinel: absent
        eblc.write_u32::<BigEndian>(0).unwrap();
        eblc.write_u32::<BigEndian>(7).unwrap();
        eblc.write_u32::<BigEndian>(7).unwrap();
        eblc
    }

    #[test]
    fn test_expand_row() {
        let bitmap = expand_byte_aligned_data(BitDepth::One, 5, 1, &[0b1011_0000]).unwrap();
        assert_eq!(bitmap.row(0), &[1, 0, 1, 1, 0]);
    }

    #[test]
    fn test_expand_byte_aligned() {
        let data = &[0b1011_0000, 0b0110_0000];
        let bitmap = expand_byte_aligned_data(BitDepth::One, 5, 2, data).unwrap();
        assert_eq!(bitmap.row(0), &[1, 0, 1, 1, 0]);
        assert_eq!(bitmap.row(1), &[0, 1, 1, 0, 0]);
    }

    #[test]
    fn test_expand_too_short() {
        let res = expand_byte_aligned_data(BitDepth::One, 5, 2, &[0b1011_0000]);
        assert_eq!(res, Err(ParseError::BadEof));
    }

    #[test]
    fn test_unpack_bit_aligned_data() {
        let data = &[0b1011_0011, 0b0100_0000];
        let expected = &[0b1011_0000, 0b0110_1000];
        let actual = unpack_bit_aligned_data(BitDepth::One, 5, 2, data).unwrap();
        assert_eq!(&actual, expected);
    }

    #[test]
    fn test_image_format_from_u16() {
        assert_eq!(ImageFormat::try_from(1), Ok(ImageFormat::Format1));
        assert_eq!(ImageFormat::try_from(9), Ok(ImageFormat::Format9));
        assert_eq!(ImageFormat::try_from(3), Err(ParseError::NotImplemented));
        assert_eq!(ImageFormat::try_from(17), Err(ParseError::NotImplemented));
        assert_eq!(ImageFormat::try_from(42), Err(ParseError::BadValue));
    }

    #[test]
    fn test_parse_eblc() {
        let data = test_eblc();
        let eblc = ReadScope::new(&data).read::<EblcTable<'_>>().unwrap();
        assert_eq!(eblc.strikes.len(), 1);

        let info = &eblc.strikes[0].info;
        assert_eq!((info.ppem_x, info.ppem_y), (8, 8));
        assert_eq!(info.bit_depth, BitDepth::One);
        assert!(info.flags.contains(StrikeFlags::HORIZONTAL_METRICS));
        assert_eq!(info.hori.descender, 1);
    }

    #[test]
    fn test_glyph_records() {
        let eblc_data = test_eblc();
        let ebdt_data = test_ebdt();
        let eblc = ReadScope::new(&eblc_data).read::<EblcTable<'_>>().unwrap();
        let ebdt = ReadScope::new(&ebdt_data).read::<EbdtTable<'_>>().unwrap();

        let records = eblc.strikes[0].glyph_records(&ebdt).unwrap();
        // glyph 2 has a zero-length range and is absent
        assert_eq!(records.len(), 1);
        let (glyph_id, record) = &records[0];
        assert_eq!(*glyph_id, 1);
        assert_eq!(record.image_format(), ImageFormat::Format1);
        assert_eq!(record.metrics().width(), 5);

        let bitmap = record.decode_bitmap(BitDepth::One).unwrap();
        assert_eq!(bitmap.row(0), &[1, 0, 1, 1, 0]);
        assert_eq!(bitmap.row(1), &[0, 1, 1, 0, 0]);
    }

    #[test]
    fn test_format5_requires_shared_metrics() {
        let ebdt_data = test_ebdt();
        let ebdt = ReadScope::new(&ebdt_data).read::<EbdtTable<'_>>().unwrap();
        let res = ebdt.glyph_record(ImageFormat::Format5, 4, 2, None);
        assert!(matches!(res, Err(ParseError::MissingValue)));
    }

    #[test]
    fn test_normalize_small_horizontal_matches_big() {
        let small = GlyphMetrics::Small(SmallGlyphMetrics {
            height: 5,
            width: 4,
            bearing_x: 1,
            bearing_y: 6,
            advance: 7,
        });
        let big = GlyphMetrics::Big(BigGlyphMetrics {
            height: 5,
            width: 4,
            hori_bearing_x: 1,
            hori_bearing_y: 6,
            hori_advance: 7,
            vert_bearing_x: 0,
            vert_bearing_y: 0,
            vert_advance: 0,
        });

        let from_small = small.normalize(MetricsDirection::Horizontal);
        let from_big = big.normalize(MetricsDirection::Horizontal);
        assert_eq!(from_small, from_big);
        assert_eq!(from_small.hori_origin, OriginOffset { x: 1, y: 1 });
    }

    #[test]
    fn test_normalize_small_vertical() {
        let small = GlyphMetrics::Small(SmallGlyphMetrics {
            height: 5,
            width: 4,
            bearing_x: -1,
            bearing_y: 2,
            advance: 7,
        });
        let metrics = small.normalize(MetricsDirection::Vertical);
        assert_eq!(metrics.hori_advance, 0);
        assert_eq!(metrics.hori_origin, OriginOffset { x: 0, y: 0 });
        assert_eq!(metrics.vert_origin, OriginOffset { x: -1, y: 2 });
        assert_eq!(metrics.vert_advance, 7);
    }
}
