//! Strike assembly: rebuilding per-size pixel fonts from decoded records.

use std::borrow::Cow;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use itertools::Itertools;
use log::{debug, error, warn};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::binary::read::ReadScope;
use crate::bitmap::ebdt::{
    BitmapSize, EbdtTable, EblcTable, GlyphRecord, MetricsDirection, SbitLineMetrics,
};
use crate::bitmap::{DecodedGlyph, MonoBitmap, NormalizedMetrics, OriginOffset};
use crate::emit::DumpRecord;
use crate::error::{ParseError, StrikeError};
use crate::tables::{HostFont, NameTable};
use crate::tag;

/// The reserved identifier of the undefined glyph.
pub const NOTDEF_GLYPH_ID: u16 = 0;

/// How component-reference glyphs (image formats 8 and 9) are handled.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CompositeMode {
    /// Flatten composites by overlaying their decoded components.
    Resolve,
    /// Legacy behavior: skip composite glyphs entirely.
    ///
    /// Skipped glyphs are absent from the glyph set and the character map
    /// of the strike; the strike itself still succeeds.
    Skip,
}

/// Ascent and descent of one layout axis, in pixels.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LineLayout {
    pub ascent: i16,
    pub descent: i16,
}

impl LineLayout {
    /// Descent is ≤ 0 by convention, but some source fonts store it
    /// unsigned.
    fn from_sbit(metrics: &SbitLineMetrics) -> LineLayout {
        let ascent = i16::from(metrics.ascender);
        let mut descent = i16::from(metrics.descender);
        if descent > 0 {
            descent = -descent;
        }
        LineLayout { ascent, descent }
    }
}

/// Weight of a dumped face.
#[allow(missing_docs)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum WeightName {
    Thin,
    ExtraLight,
    Light,
    #[default]
    Regular,
    Medium,
    SemiBold,
    Bold,
    ExtraBold,
    Black,
}

/// Serif style of a dumped face.
#[allow(missing_docs)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum SerifStyle {
    #[default]
    Serif,
    SansSerif,
}

/// Slant style of a dumped face.
#[allow(missing_docs)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum SlantStyle {
    #[default]
    Normal,
    Italic,
    Oblique,
}

/// Width style of a dumped face.
#[allow(missing_docs)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum WidthStyle {
    #[default]
    Monospaced,
    Duospaced,
    Proportional,
}

/// Configuration of one sub font within a dump batch.
#[derive(Debug, Clone)]
pub struct SubFontConfig {
    /// Base name used for output files and as a family-name fallback.
    pub font_name: String,
    pub weight_name: WeightName,
    pub serif_style: SerifStyle,
    pub slant_style: SlantStyle,
    pub width_style: WidthStyle,
    /// Version of the dump tooling, appended to the font version string.
    pub dump_version: String,
    /// ISO-8601 timestamp used for both created and modified times.
    pub timestamp: String,
}

impl SubFontConfig {
    /// A configuration with default styles.
    pub fn new(
        font_name: impl Into<String>,
        dump_version: impl Into<String>,
        timestamp: impl Into<String>,
    ) -> SubFontConfig {
        SubFontConfig {
            font_name: font_name.into(),
            weight_name: WeightName::default(),
            serif_style: SerifStyle::default(),
            slant_style: SlantStyle::default(),
            width_style: WidthStyle::default(),
            dump_version: dump_version.into(),
            timestamp: timestamp.into(),
        }
    }
}

/// Font-level metadata of a dumped strike.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrikeMetadata {
    /// Family name, qualified with the pixel size.
    pub family_name: String,
    /// Version string.
    pub version: String,
    /// Creation timestamp, ISO-8601.
    pub created: String,
    /// Modification timestamp, ISO-8601.
    pub modified: String,
    pub weight_name: WeightName,
    pub serif_style: SerifStyle,
    pub slant_style: SlantStyle,
    pub width_style: WidthStyle,
    pub manufacturer: Option<String>,
    pub designer: Option<String>,
    pub description: Option<String>,
    pub copyright: Option<String>,
    pub license: Option<String>,
    pub vendor_url: Option<String>,
    pub designer_url: Option<String>,
    pub license_url: Option<String>,
}

impl StrikeMetadata {
    fn new(names: &NameTable<'_>, config: &SubFontConfig, ppem: u8) -> StrikeMetadata {
        let family_base = names
            .string_for_id(NameTable::FONT_FAMILY_NAME)
            .unwrap_or_else(|| config.font_name.clone());
        let version = match names.string_for_id(NameTable::VERSION_STRING) {
            Some(version) => format!("{} - Dump {}", version, config.dump_version),
            None => format!("Dump {}", config.dump_version),
        };

        StrikeMetadata {
            family_name: format!("{} {}px", family_base, ppem),
            version,
            created: config.timestamp.clone(),
            modified: config.timestamp.clone(),
            weight_name: config.weight_name,
            serif_style: config.serif_style,
            slant_style: config.slant_style,
            width_style: config.width_style,
            manufacturer: names.string_for_id(NameTable::MANUFACTURER),
            designer: names.string_for_id(NameTable::DESIGNER),
            description: names.string_for_id(NameTable::DESCRIPTION),
            copyright: names.string_for_id(NameTable::COPYRIGHT_NOTICE),
            license: names.string_for_id(NameTable::LICENSE_DESCRIPTION),
            vendor_url: names.string_for_id(NameTable::VENDOR_URL),
            designer_url: names.string_for_id(NameTable::DESIGNER_URL),
            license_url: names.string_for_id(NameTable::LICENSE_URL),
        }
    }
}

/// One complete pixel font rebuilt from a bitmap strike.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FontStrike {
    /// Pixels per em of the strike, equal on both axes.
    pub ppem: u8,
    /// Font-level metadata.
    pub metadata: StrikeMetadata,
    /// Horizontal layout metrics, descent ≤ 0.
    pub hori: LineLayout,
    /// Vertical layout metrics, descent ≤ 0.
    pub vert: LineLayout,
    /// The glyph set. The undefined glyph is always present and first; the
    /// rest follow in the order they were first claimed by a code point.
    pub glyphs: Vec<DecodedGlyph>,
    /// Code point to glyph identifier mapping, restricted to glyphs present
    /// in the glyph set.
    pub character_map: BTreeMap<u32, u16>,
}

/// A strike that could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrikeFailure {
    /// Pixel size of the failed strike.
    pub ppem: u8,
    /// Why it failed.
    pub error: StrikeError,
}

/// Result of dumping one sub font.
#[derive(Debug)]
pub struct DumpReport {
    /// The strikes that decoded, one per pixel size, in directory order.
    pub strikes: Vec<FontStrike>,
    /// Strikes that failed. Failures never abort sibling strikes.
    pub failures: Vec<StrikeFailure>,
    /// Per sub-font summary for packaging.
    pub record: DumpRecord,
}

/// Dump every bitmap strike of a host font as a standalone pixel font.
///
/// Each strike is decoded independently; a failed strike is reported in the
/// [`DumpReport`] and does not affect its siblings. Fails early only when
/// the required tables are missing or their directories are unreadable.
pub fn dump_strikes<H: HostFont>(
    host: &H,
    config: &SubFontConfig,
    mode: CompositeMode,
) -> Result<DumpReport, ParseError> {
    let eblc_data = bitmap_table(host, tag::EBLC, tag::BLOC)?;
    let ebdt_data = bitmap_table(host, tag::EBDT, tag::BDAT)?;
    let name_data = host
        .table_data(tag::NAME)?
        .ok_or(ParseError::MissingTable(tag::NAME))?;

    let eblc = ReadScope::new(&eblc_data).read::<EblcTable<'_>>()?;
    let ebdt = ReadScope::new(&ebdt_data).read::<EbdtTable<'_>>()?;
    let names = ReadScope::new(&name_data).read::<NameTable<'_>>()?;

    let mut character_map = host.character_map()?;
    character_map.sort_by_key(|&(code_point, _)| code_point);

    let mut strikes = Vec::new();
    let mut failures = Vec::new();
    for size in &eblc.strikes {
        let ppem = size.info.ppem_y;
        match build_strike(size, &ebdt, &names, &character_map, config, mode) {
            Ok(strike) => {
                debug!(
                    "{}: decoded {}px strike with {} glyphs",
                    config.font_name,
                    ppem,
                    strike.glyphs.len()
                );
                strikes.push(strike);
            }
            Err(err) => {
                error!("{}: {}px strike failed: {}", config.font_name, ppem, err);
                failures.push(StrikeFailure { ppem, error: err });
            }
        }
    }

    let mut ppem_sizes = strikes.iter().map(|strike| strike.ppem).collect::<Vec<_>>();
    ppem_sizes.sort_unstable();
    let record = DumpRecord {
        font_name: config.font_name.clone(),
        family_name: names
            .string_for_id(NameTable::FONT_FAMILY_NAME)
            .unwrap_or_else(|| config.font_name.clone()),
        ppem_sizes,
    };

    Ok(DumpReport {
        strikes,
        failures,
        record,
    })
}

/// Fetch a bitmap table, falling back to its Apple alias tag.
fn bitmap_table<'a, H: HostFont>(
    host: &'a H,
    primary: u32,
    alias: u32,
) -> Result<Cow<'a, [u8]>, ParseError> {
    match host.table_data(primary)? {
        Some(data) => Ok(data),
        None => host
            .table_data(alias)?
            .ok_or(ParseError::MissingTable(primary)),
    }
}

/// Rebuild one strike.
///
/// `character_map` must be sorted by code point.
fn build_strike<'a>(
    size: &BitmapSize<'a>,
    ebdt: &EbdtTable<'a>,
    names: &NameTable<'_>,
    character_map: &[(u32, u16)],
    config: &SubFontConfig,
    mode: CompositeMode,
) -> Result<FontStrike, StrikeError> {
    let info = &size.info;
    info.check_monochrome()?;
    let ppem = info.ppem_y;
    let hori = LineLayout::from_sbit(&info.hori);
    let vert = LineLayout::from_sbit(&info.vert);
    let direction = info.metrics_direction();

    // Gather raw records; a glyph identifier may appear only once per strike.
    let mut records: FxHashMap<u16, GlyphRecord<'_>> = FxHashMap::default();
    for (glyph_id, record) in size.glyph_records(ebdt)? {
        if records.insert(glyph_id, record).is_some() {
            return Err(StrikeError::DuplicateGlyphIdentifier(glyph_id));
        }
    }

    // Decode direct-bitmap glyphs first so composites overlay fully decoded
    // components.
    let mut arena: FxHashMap<u16, DecodedGlyph> = FxHashMap::default();
    let mut pending = Vec::new();
    for glyph_id in records.keys().copied().sorted() {
        let record = &records[&glyph_id];
        if record.is_composite() {
            match mode {
                CompositeMode::Resolve => pending.push(glyph_id),
                CompositeMode::Skip => warn!(
                    "skipping glyph {}: {}",
                    glyph_id,
                    StrikeError::UnimplementedBitmapFormat(record.image_format().code())
                ),
            }
            continue;
        }
        let metrics = record.metrics().normalize(direction);
        let bitmap = record
            .decode_bitmap(info.bit_depth)
            .map_err(|_| StrikeError::MalformedBitmapRecord { glyph_id })?;
        arena.insert(
            glyph_id,
            DecodedGlyph {
                glyph_id,
                name: glyph_name(glyph_id),
                metrics,
                bitmap,
            },
        );
    }

    // Resolve composites in dependency order. A component may itself be a
    // composite as long as no reference cycle exists.
    while !pending.is_empty() {
        let mut deferred = Vec::new();
        let mut progressed = false;
        for &glyph_id in &pending {
            let record = &records[&glyph_id];
            // NOTE(unwrap): only composite records are queued
            let components = record.components().unwrap();
            let missing = components
                .iter()
                .map(|component| component.glyph_id)
                .find(|component| !arena.contains_key(component));
            match missing {
                None => {
                    let glyph = resolve_composite(glyph_id, record, direction, &arena)?;
                    arena.insert(glyph_id, glyph);
                    progressed = true;
                }
                Some(component) if !records.contains_key(&component) => {
                    // The strike never stores this glyph, so the composite
                    // can never resolve.
                    return Err(StrikeError::UnresolvedComponentReference {
                        glyph_id,
                        component,
                    });
                }
                Some(_) => deferred.push(glyph_id),
            }
        }
        if !progressed && !deferred.is_empty() {
            return Err(StrikeError::CompositeCycleDetected(deferred[0]));
        }
        pending = deferred;
    }

    // The undefined glyph is guaranteed, synthesized when the strike does
    // not store one.
    arena.entry(NOTDEF_GLYPH_ID).or_insert_with(|| DecodedGlyph {
        glyph_id: NOTDEF_GLYPH_ID,
        name: glyph_name(NOTDEF_GLYPH_ID),
        metrics: NormalizedMetrics {
            width: 0,
            height: 0,
            hori_origin: OriginOffset { x: 0, y: 0 },
            hori_advance: ppem,
            vert_origin: OriginOffset { x: 0, y: 0 },
            vert_advance: ppem,
        },
        bitmap: MonoBitmap::new(0, 0),
    });

    // Walk the character map in code point order. The first code point to
    // claim a glyph determines glyph order; further code points mapping the
    // same glyph only extend the character map.
    let mut glyphs = vec![arena[&NOTDEF_GLYPH_ID].clone()];
    let mut claimed = FxHashSet::default();
    claimed.insert(NOTDEF_GLYPH_ID);
    let mut char_to_glyph = BTreeMap::new();
    for &(code_point, glyph_id) in character_map {
        if !arena.contains_key(&glyph_id) {
            continue;
        }
        match char_to_glyph.entry(code_point) {
            Entry::Occupied(_) => continue,
            Entry::Vacant(entry) => {
                entry.insert(glyph_id);
            }
        }
        if claimed.insert(glyph_id) {
            glyphs.push(arena[&glyph_id].clone());
        }
    }

    let metadata = StrikeMetadata::new(names, config, ppem);

    Ok(FontStrike {
        ppem,
        metadata,
        hori,
        vert,
        glyphs,
        character_map: char_to_glyph,
    })
}

fn resolve_composite(
    glyph_id: u16,
    record: &GlyphRecord<'_>,
    direction: MetricsDirection,
    arena: &FxHashMap<u16, DecodedGlyph>,
) -> Result<DecodedGlyph, StrikeError> {
    let metrics = record.metrics().normalize(direction);
    let mut canvas = MonoBitmap::new(usize::from(metrics.width), usize::from(metrics.height));
    // NOTE(unwrap): callers only pass composite records
    let components = record.components().unwrap();
    for component in components.iter() {
        let base = arena.get(&component.glyph_id).ok_or(
            StrikeError::UnresolvedComponentReference {
                glyph_id,
                component: component.glyph_id,
            },
        )?;
        canvas.draw(
            &base.bitmap,
            i32::from(component.x_offset),
            i32::from(component.y_offset),
        );
    }

    Ok(DecodedGlyph {
        glyph_id,
        name: glyph_name(glyph_id),
        metrics,
        bitmap: canvas,
    })
}

/// Glyph name used in output fonts.
fn glyph_name(glyph_id: u16) -> String {
    if glyph_id == NOTDEF_GLYPH_ID {
        String::from(".notdef")
    } else {
        format!("g{:05}", glyph_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sbit_line_metrics(ascender: i8, descender: i8) -> SbitLineMetrics {
        SbitLineMetrics {
            ascender,
            descender,
            width_max: 0,
            caret_slope_numerator: 0,
            caret_slope_denominator: 0,
            caret_offset: 0,
            min_origin_sb: 0,
            min_advance_sb: 0,
            max_before_bl: 0,
            min_after_bl: 0,
            pad1: 0,
            pad2: 0,
        }
    }

    #[test]
    fn test_descent_sign_corrected() {
        let layout = LineLayout::from_sbit(&sbit_line_metrics(7, 2));
        assert_eq!(layout, LineLayout { ascent: 7, descent: -2 });
    }

    #[test]
    fn test_descent_sign_preserved() {
        let layout = LineLayout::from_sbit(&sbit_line_metrics(6, -2));
        assert_eq!(layout, LineLayout { ascent: 6, descent: -2 });
    }

    #[test]
    fn test_glyph_name() {
        assert_eq!(glyph_name(0), ".notdef");
        assert_eq!(glyph_name(42), "g00042");
    }
}
