//! Host font tables and the boundary to the container parser.

use std::borrow::Cow;

use encoding_rs::{DecoderResult, MACINTOSH, UTF_16BE};

use crate::binary::read::{ReadArray, ReadBinary, ReadCtxt, ReadFrom, ReadScope};
use crate::binary::U16Be;
use crate::error::ParseError;

/// The host font container.
///
/// The container parser that locates tables inside an OpenType font (or
/// collection) is not part of this crate. Anything that can hand over raw
/// table bytes and the font's best character mapping can drive strike
/// extraction.
pub trait HostFont {
    /// Return the raw bytes of the table with the given tag, if present.
    fn table_data(&self, tag: u32) -> Result<Option<Cow<'_, [u8]>>, ParseError>;

    /// The best available (code point, glyph id) relation of the font.
    fn character_map(&self) -> Result<Vec<(u32, u16)>, ParseError>;

    /// Check whether the font has the table with the given tag.
    fn has_table(&self, tag: u32) -> bool {
        matches!(self.table_data(tag), Ok(Some(_)))
    }
}

/// `name` table
///
/// <https://docs.microsoft.com/en-us/typography/opentype/spec/name>
pub struct NameTable<'a> {
    pub string_storage: ReadScope<'a>,
    pub name_records: ReadArray<'a, NameRecord>,
}

/// Record within the `name` table
pub struct NameRecord {
    pub platform_id: u16,
    pub encoding_id: u16,
    pub language_id: u16,
    pub name_id: u16,
    pub length: u16,
    pub offset: u16,
}

enum NameEncoding {
    Utf16Be,
    AppleRoman,
}

impl<'a> NameTable<'a> {
    pub const COPYRIGHT_NOTICE: u16 = 0;
    pub const FONT_FAMILY_NAME: u16 = 1;
    pub const VERSION_STRING: u16 = 5;
    pub const MANUFACTURER: u16 = 8;
    pub const DESIGNER: u16 = 9;
    pub const DESCRIPTION: u16 = 10;
    pub const VENDOR_URL: u16 = 11;
    pub const DESIGNER_URL: u16 = 12;
    pub const LICENSE_DESCRIPTION: u16 = 13;
    pub const LICENSE_URL: u16 = 14;

    /// Resolve the string with the given name id.
    ///
    /// When a font carries the name in several platform encodings the best
    /// scoring one is decoded, preferring Unicode encodings over Apple Roman.
    pub fn string_for_id(&self, name_id: u16) -> Option<String> {
        let mut best = 0;
        let mut result = None;
        for name_record in self.name_records.iter() {
            if name_record.name_id != name_id {
                continue;
            }
            let offset = usize::from(name_record.offset);
            let length = usize::from(name_record.length);
            let name_data = match self.string_storage.offset_length(offset, length) {
                Ok(scope) => scope.data(),
                Err(_) => continue,
            };
            if let Some((score, encoding)) = score_encoding(
                name_record.platform_id,
                name_record.encoding_id,
                name_record.language_id,
            ) {
                if best < score {
                    if let Some(name) = decode_name(encoding, name_data) {
                        result = Some(name);
                        best = score;
                    }
                }
            }
        }
        result
    }
}

impl<'a> ReadBinary<'a> for NameTable<'a> {
    type HostType = Self;

    fn read(ctxt: &mut ReadCtxt<'a>) -> Result<Self, ParseError> {
        let scope = ctxt.scope();

        let format = ctxt.read_u16be()?;
        ctxt.check(format <= 1)?;
        let count = usize::from(ctxt.read_u16be()?);
        let string_offset = usize::from(ctxt.read_u16be()?);
        let string_storage = scope.offset(string_offset);
        let name_records = ctxt.read_array::<NameRecord>(count)?;
        // Format 1 language tag records are not needed for name lookup.

        Ok(NameTable {
            string_storage,
            name_records,
        })
    }
}

impl<'a> ReadFrom<'a> for NameRecord {
    type ReadType = ((U16Be, U16Be, U16Be), (U16Be, U16Be, U16Be));

    fn from(
        ((platform_id, encoding_id, language_id), (name_id, length, offset)): (
            (u16, u16, u16),
            (u16, u16, u16),
        ),
    ) -> Self {
        NameRecord {
            platform_id,
            encoding_id,
            language_id,
            name_id,
            length,
            offset,
        }
    }
}

fn score_encoding(
    platform_id: u16,
    encoding_id: u16,
    language_id: u16,
) -> Option<(usize, NameEncoding)> {
    match (platform_id, encoding_id, language_id) {
        // Windows; Unicode full repertoire
        (3, 10, _) => Some((1000, NameEncoding::Utf16Be)),

        // Unicode; Unicode full repertoire
        (0, 6, 0) => Some((900, NameEncoding::Utf16Be)),

        // Unicode; Unicode 2.0 and onwards semantics, Unicode full repertoire
        (0, 4, 0) => Some((800, NameEncoding::Utf16Be)),

        // Windows; Unicode BMP
        (3, 1, 0x409) => Some((750, NameEncoding::Utf16Be)),
        (3, 1, lang) if lang != 0x409 => Some((700, NameEncoding::Utf16Be)),

        // Unicode; Unicode 2.0 and onwards semantics, Unicode BMP only
        (0, 3, 0) => Some((600, NameEncoding::Utf16Be)),

        // Unicode; ISO/IEC 10646 semantics
        (0, 2, 0) => Some((500, NameEncoding::Utf16Be)),

        // Unicode; Unicode 1.1 semantics
        (0, 1, 0) => Some((400, NameEncoding::Utf16Be)),

        // Unicode; Unicode 1.0 semantics
        (0, 0, 0) => Some((300, NameEncoding::Utf16Be)),

        // Windows, Symbol
        (3, 0, _) => Some((200, NameEncoding::Utf16Be)),

        // Apple Roman
        (1, 0, 0) => Some((150, NameEncoding::AppleRoman)),
        (1, 0, lang) if lang != 0 => Some((100, NameEncoding::AppleRoman)),
        _ => None,
    }
}

fn decode_name(encoding: NameEncoding, data: &[u8]) -> Option<String> {
    let mut decoder = match encoding {
        NameEncoding::Utf16Be => UTF_16BE.new_decoder(),
        NameEncoding::AppleRoman => MACINTOSH.new_decoder(),
    };
    if let Some(size) = decoder.max_utf8_buffer_length(data.len()) {
        let mut s = String::with_capacity(size);
        let (res, _read) = decoder.decode_to_string_without_replacement(data, &mut s, true);
        match res {
            DecoderResult::InputEmpty => Some(s),
            DecoderResult::OutputFull => None, // should not happen
            DecoderResult::Malformed(_, _) => None,
        }
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use byteorder::{BigEndian, WriteBytesExt};

    use super::*;

    fn utf16be(s: &str) -> Vec<u8> {
        s.encode_utf16()
            .flat_map(|unit| unit.to_be_bytes())
            .collect()
    }

    fn build_name_table(names: &[(u16, &str)]) -> Vec<u8> {
        let mut storage = Vec::new();
        let mut records = Vec::new();
        for &(name_id, value) in names {
            let encoded = utf16be(value);
            records.push((name_id, storage.len(), encoded.len()));
            storage.extend_from_slice(&encoded);
        }

        let mut data = Vec::new();
        data.write_u16::<BigEndian>(0).unwrap(); // format
        data.write_u16::<BigEndian>(names.len() as u16).unwrap(); // count
        data.write_u16::<BigEndian>(6 + 12 * names.len() as u16)
            .unwrap(); // stringOffset
        for (name_id, offset, length) in records {
            data.write_u16::<BigEndian>(3).unwrap(); // platformID: Windows
            data.write_u16::<BigEndian>(1).unwrap(); // encodingID: Unicode BMP
            data.write_u16::<BigEndian>(0x409).unwrap(); // languageID: en-US
            data.write_u16::<BigEndian>(name_id).unwrap();
            data.write_u16::<BigEndian>(length as u16).unwrap();
            data.write_u16::<BigEndian>(offset as u16).unwrap();
        }
        data.extend_from_slice(&storage);
        data
    }

    #[test]
    fn test_string_for_id() {
        let data = build_name_table(&[
            (NameTable::FONT_FAMILY_NAME, "Test Mono"),
            (NameTable::VERSION_STRING, "Version 4.7"),
        ]);
        let name = ReadScope::new(&data).read::<NameTable<'_>>().unwrap();

        assert_eq!(
            name.string_for_id(NameTable::FONT_FAMILY_NAME).as_deref(),
            Some("Test Mono")
        );
        assert_eq!(
            name.string_for_id(NameTable::VERSION_STRING).as_deref(),
            Some("Version 4.7")
        );
        assert_eq!(name.string_for_id(NameTable::DESIGNER), None);
    }
}
