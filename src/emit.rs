//! The boundary to the output font serializer and packaging.
//!
//! Serializing a [`FontStrike`](crate::strike::FontStrike) into OpenType,
//! WOFF or legacy bitmap formats is not part of this crate; a serializer
//! plugs in through [`StrikeSink`].

use log::{error, info};

use crate::strike::FontStrike;

/// Output format tags accepted by a [`StrikeSink`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum OutputFormat {
    /// OpenType with CFF outlines.
    Otf,
    /// WOFF-compressed OpenType.
    OtfWoff,
    /// WOFF2-compressed OpenType.
    OtfWoff2,
    /// TrueType.
    Ttf,
    /// WOFF-compressed TrueType.
    TtfWoff,
    /// WOFF2-compressed TrueType.
    TtfWoff2,
    /// Glyph Bitmap Distribution Format.
    Bdf,
    /// Portable Compiled Format.
    Pcf,
}

impl OutputFormat {
    /// The file extension for this format.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Otf => "otf",
            OutputFormat::OtfWoff => "otf.woff",
            OutputFormat::OtfWoff2 => "otf.woff2",
            OutputFormat::Ttf => "ttf",
            OutputFormat::TtfWoff => "ttf.woff",
            OutputFormat::TtfWoff2 => "ttf.woff2",
            OutputFormat::Bdf => "bdf",
            OutputFormat::Pcf => "pcf",
        }
    }
}

/// The output file name for one (strike, format) pair.
pub fn output_file_name(font_name: &str, ppem: u8, format: OutputFormat) -> String {
    format!("{}-{}px.{}", font_name, ppem, format.extension())
}

/// Consumer of assembled strikes.
///
/// Implementations serialize one strike into one output format, typically
/// writing a file named by [`output_file_name`].
pub trait StrikeSink {
    /// Error raised by the serializer.
    type Error: std::error::Error;

    /// Serialize one strike in the given format.
    fn emit(&mut self, strike: &FontStrike, format: OutputFormat) -> Result<(), Self::Error>;
}

/// An output that could not be produced.
///
/// Emission failures are scoped to one (strike, format) pair and do not
/// abort other outputs.
#[derive(Debug)]
pub struct EmitFailure<E> {
    /// Family name of the affected strike.
    pub family_name: String,
    /// Pixel size of the affected strike.
    pub ppem: u8,
    /// The format that failed.
    pub format: OutputFormat,
    /// The serializer error.
    pub error: E,
}

/// Emit every strike in every requested format.
///
/// Failures are collected and returned; output files are independent, so
/// one failed output never blocks the rest.
pub fn emit_strikes<S: StrikeSink>(
    sink: &mut S,
    strikes: &[FontStrike],
    formats: &[OutputFormat],
) -> Vec<EmitFailure<S::Error>> {
    let mut failures = Vec::new();
    for strike in strikes {
        for &format in formats {
            match sink.emit(strike, format) {
                Ok(()) => info!(
                    "make font: '{}' as {}",
                    strike.metadata.family_name,
                    format.extension()
                ),
                Err(err) => {
                    error!(
                        "emitting '{}' as {} failed: {}",
                        strike.metadata.family_name,
                        format.extension(),
                        err
                    );
                    failures.push(EmitFailure {
                        family_name: strike.metadata.family_name.clone(),
                        ppem: strike.ppem,
                        format,
                        error: err,
                    });
                }
            }
        }
    }
    failures
}

/// Per sub-font summary handed to archive and web-manifest packaging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpRecord {
    /// Base name of the sub font.
    pub font_name: String,
    /// Family name resolved from the host font.
    pub family_name: String,
    /// Pixel sizes that were dumped, ascending.
    pub ppem_sizes: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_file_name() {
        assert_eq!(
            output_file_name("test-mono", 12, OutputFormat::OtfWoff2),
            "test-mono-12px.otf.woff2"
        );
        assert_eq!(
            output_file_name("test-mono", 8, OutputFormat::Bdf),
            "test-mono-8px.bdf"
        );
    }
}
