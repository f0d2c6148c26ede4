//! Parsed AVIF container: the header pass shared by inspect, decode and
//! metadata extraction
//!
//! Parsing never touches pixel data. Everything here borrows from the
//! caller's buffer and is dropped at the end of the call that created it.

use crate::boxes::{self, ItemMetadata};
use crate::error::{Error, Result};
use crate::image::ImageInfo;
use enough::Unstoppable;
use std::borrow::Cow;
use whereat::at;
use zenavif_parse::{AV1Metadata, AvifParser, ColorInformation, DecodeConfig};

/// The `[offset, offset + length)` window of `bytes`
pub(crate) fn source_range(bytes: &[u8], offset: usize, length: usize) -> Result<&[u8]> {
    offset
        .checked_add(length)
        .and_then(|end| bytes.get(offset..end))
        .ok_or_else(|| {
            at(Error::InvalidRange {
                offset,
                length,
                size: bytes.len(),
            })
        })
}

/// Header facts for one AVIF file plus the parser that yields its payloads
pub(crate) struct ParsedContainer<'a> {
    pub(crate) parser: AvifParser<'a>,
    metadata: ItemMetadata<'a>,
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) bit_depth: u8,
    pub(crate) has_alpha: bool,
    /// Sample count for image sequences, `None` for still images
    pub(crate) sequence_len: Option<usize>,
    pub(crate) duration: f64,
}

impl<'a> ParsedContainer<'a> {
    /// Parse container headers and item metadata
    pub(crate) fn parse(data: &'a [u8]) -> Result<Self> {
        let config = DecodeConfig::default().lenient(true);
        let parser = AvifParser::from_bytes_with_config(data, &config, &Unstoppable)
            .map_err(|e| at(Error::from(e)))?;
        let metadata = boxes::scan(data)?;

        let sequence_len = parser
            .animation_info()
            .map(|info| info.frame_count)
            .filter(|&n| n > 0);

        let mut duration_ms = 0u64;
        if let Some(count) = sequence_len {
            for index in 0..count {
                let frame = parser.frame(index).map_err(|e| at(Error::from(e)))?;
                duration_ms += u64::from(frame.duration_ms);
            }
        }

        // Sequence header of the first coded payload
        let first_payload: Cow<'_, [u8]> = if sequence_len.is_some() {
            parser.frame(0).map_err(|e| at(Error::from(e)))?.data
        } else if parser.grid_config().is_some() {
            parser.tile_data(0).map_err(|e| at(Error::from(e)))?
        } else {
            parser.primary_data().map_err(|e| at(Error::from(e)))?
        };
        let av1 = AV1Metadata::parse_av1_bitstream(&first_payload).map_err(|e| at(Error::from(e)))?;

        let (width, height) = if sequence_len.is_some() {
            (av1.max_frame_width.get(), av1.max_frame_height.get())
        } else if let Some(extent) = metadata.extent {
            extent
        } else if let Some(grid) = parser.grid_config() {
            grid_size(grid.output_width, grid.output_height, grid.columns, grid.rows, &av1)
        } else {
            (av1.max_frame_width.get(), av1.max_frame_height.get())
        };

        let has_alpha = parser.alpha_data().is_some();
        let container = Self {
            width,
            height,
            bit_depth: av1.bit_depth,
            has_alpha,
            sequence_len,
            duration: duration_ms as f64 / 1000.0,
            metadata,
            parser,
        };
        log::debug!(
            "parsed AVIF {}x{} {}-bit alpha={} frames={} icc={} exif={}",
            container.width,
            container.height,
            container.bit_depth,
            container.has_alpha,
            container.frame_count(),
            container.icc().is_some(),
            container.metadata.exif.is_some(),
        );
        Ok(container)
    }

    /// 1 for still images
    pub(crate) fn frame_count(&self) -> usize {
        self.sequence_len.unwrap_or(1)
    }

    /// Embedded ICC profile bytes, if any
    ///
    /// Comes from the `colr` box the parser associates with the primary
    /// item or the sequence track; an empty profile counts as absent.
    pub(crate) fn icc(&self) -> Option<&[u8]> {
        match self.parser.color_info()? {
            ColorInformation::IccProfile(data) if !data.is_empty() => Some(&data[..]),
            _ => None,
        }
    }

    /// Embedded Exif bytes, if any
    pub(crate) fn exif(&self) -> Option<&[u8]> {
        self.metadata.exif.as_deref()
    }

    pub(crate) fn info(&self) -> ImageInfo {
        ImageInfo {
            width: self.width,
            height: self.height,
            bit_depth: self.bit_depth,
            has_alpha: self.has_alpha,
            frame_count: u32::try_from(self.frame_count()).unwrap_or(u32::MAX),
            duration: self.duration,
            has_icc_profile: self.icc().is_some(),
            has_exif: self.metadata.exif.is_some(),
        }
    }
}

/// Grid canvas size; a zero output size means "columns × tile size"
fn grid_size(width: u32, height: u32, columns: u8, rows: u8, tile: &AV1Metadata) -> (u32, u32) {
    if width > 0 && height > 0 {
        (width, height)
    } else {
        (
            tile.max_frame_width.get() * u32::from(columns),
            tile.max_frame_height.get() * u32::from(rows),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn range_inside_buffer() {
        let bytes = [1u8, 2, 3, 4, 5];
        assert_eq!(source_range(&bytes, 1, 3).unwrap(), &[2, 3, 4]);
        assert_eq!(source_range(&bytes, 5, 0).unwrap(), &[] as &[u8]);
        assert_eq!(source_range(&bytes, 0, 5).unwrap(), &bytes);
    }

    #[test]
    fn range_outside_buffer() {
        let bytes = [0u8; 4];
        for (offset, length) in [(0, 5), (3, 2), (5, 0), (usize::MAX, 2)] {
            let err = source_range(&bytes, offset, length).unwrap_err().into_inner();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        }
    }

    #[test]
    fn garbage_does_not_parse() {
        let err = ParsedContainer::parse(b"definitely not an avif file")
            .err()
            .map(|e| e.into_inner().kind());
        assert_eq!(err, Some(ErrorKind::Io));
    }
}
