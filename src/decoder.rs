//! Decoder session: one parse-then-decode lifecycle over a borrowed buffer
//!
//! Uses the rav1d-safe managed API; no unsafe code. Every AV1 decoder and
//! decoded frame is a local of the call that created it, so all of them are
//! released on every return path.

#![deny(unsafe_code)]

use crate::container::{ParsedContainer, source_range};
use crate::convert::{merge_alpha, stitch, yuv_to_rgb};
use crate::error::{Error, Result};
use crate::image::{ImageInfo, RgbPixels};
use rav1d_safe::src::managed::{Decoder as Rav1dDecoder, Frame, Settings};
use whereat::at;

/// Single-threaded AV1 decoder
fn new_decoder() -> Result<Rav1dDecoder> {
    let settings = Settings {
        threads: 1,
        apply_grain: true,
        ..Default::default()
    };
    Rav1dDecoder::with_settings(settings).map_err(|e| at(Error::Decode(e.to_string())))
}

/// Feed one temporal unit and return the picture it produced
fn decode_unit(decoder: &mut Rav1dDecoder, data: &[u8], what: &str) -> Result<Frame> {
    let frame = match decoder
        .decode(data)
        .map_err(|e| at(Error::Decode(format!("{what}: {e}"))))?
    {
        Some(frame) => Some(frame),
        None => decoder
            .get_frame()
            .map_err(|e| at(Error::Decode(format!("{what}: {e}"))))?,
    };
    frame.ok_or_else(|| at(Error::Decode(format!("{what}: no frame returned"))))
}

/// Header pass plus on-demand frame rendering for one AVIF buffer
pub(crate) struct DecoderSession<'a> {
    container: ParsedContainer<'a>,
}

impl<'a> DecoderSession<'a> {
    /// Wrap `[offset, offset + length)` of `bytes` and parse its headers
    pub(crate) fn open(bytes: &'a [u8], offset: usize, length: usize) -> Result<Self> {
        let data = source_range(bytes, offset, length)?;
        Ok(Self {
            container: ParsedContainer::parse(data)?,
        })
    }

    pub(crate) fn info(&self) -> ImageInfo {
        self.container.info()
    }

    pub(crate) fn container(&self) -> &ParsedContainer<'a> {
        &self.container
    }

    /// Decode one frame to 8-bit RGB(A)
    ///
    /// `None` selects the first frame. Image sequences decode samples
    /// `0..=index` in order; still images only have index 0.
    pub(crate) fn render(&self, frame_index: Option<usize>) -> Result<RgbPixels> {
        let index = frame_index.unwrap_or(0);
        let count = self.container.frame_count();
        if index >= count {
            return Err(at(Error::FrameOutOfRange { index, count }));
        }

        let pixels = if self.container.sequence_len.is_some() {
            self.render_sequence_frame(index)?
        } else if self.container.parser.grid_config().is_some() {
            self.render_grid()?
        } else {
            self.render_still()?
        };
        log::debug!(
            "decoded frame {index}: {}x{} alpha={}",
            pixels.width(),
            pixels.height(),
            pixels.has_alpha()
        );
        Ok(pixels)
    }

    fn render_still(&self) -> Result<RgbPixels> {
        let parser = &self.container.parser;
        let has_alpha = self.container.has_alpha;

        let mut decoder = new_decoder()?;
        let primary = parser.primary_data().map_err(|e| at(Error::from(e)))?;
        let color = decode_unit(&mut decoder, &primary, "primary item")?;
        let mut pixels = yuv_to_rgb(&color, has_alpha)?;

        if let Some(alpha_data) = parser.alpha_data() {
            let alpha_data = alpha_data.map_err(|e| at(Error::from(e)))?;
            let mut alpha_decoder = new_decoder()?;
            let alpha = decode_unit(&mut alpha_decoder, &alpha_data, "alpha item")?;
            merge_alpha(&mut pixels, &alpha, parser.premultiplied_alpha())?;
        }
        Ok(pixels)
    }

    fn render_grid(&self) -> Result<RgbPixels> {
        let parser = &self.container.parser;
        let Some(grid) = parser.grid_config() else {
            return Err(at(Error::Decode("grid configuration missing".into())));
        };
        let tile_count = parser.grid_tile_count();
        let expected = usize::from(grid.rows) * usize::from(grid.columns);
        if tile_count != expected {
            return Err(at(Error::Decode(format!(
                "grid declares {expected} tiles but has {tile_count}"
            ))));
        }
        if self.container.has_alpha {
            log::warn!("alpha on grid images is not decoded; alpha will be opaque");
        }

        let mut decoder = new_decoder()?;
        let mut tiles = Vec::with_capacity(tile_count);
        for i in 0..tile_count {
            let data = parser.tile_data(i).map_err(|e| at(Error::from(e)))?;
            let frame = decode_unit(&mut decoder, &data, "grid tile")?;
            tiles.push(yuv_to_rgb(&frame, self.container.has_alpha)?);
        }
        stitch(
            tiles,
            usize::from(grid.columns),
            self.container.width as usize,
            self.container.height as usize,
        )
    }

    fn render_sequence_frame(&self, index: usize) -> Result<RgbPixels> {
        let parser = &self.container.parser;
        if self.container.has_alpha {
            log::warn!("alpha tracks of image sequences are not decoded; alpha will be opaque");
        }

        // Later samples predict from earlier ones, so decode from the start
        let mut decoder = new_decoder()?;
        let mut target = None;
        for i in 0..=index {
            let sample = parser.frame(i).map_err(|e| at(Error::from(e)))?;
            let frame = decode_unit(&mut decoder, &sample.data, "sequence frame")?;
            if i == index {
                target = Some(frame);
            }
        }
        let frame = target.ok_or_else(|| at(Error::FrameOutOfRange {
            index,
            count: self.container.frame_count(),
        }))?;
        yuv_to_rgb(&frame, self.container.has_alpha)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn open_rejects_bad_range_before_parsing() {
        let err = DecoderSession::open(&[0u8; 8], 4, 8)
            .err()
            .map(|e| e.into_inner().kind());
        assert_eq!(err, Some(ErrorKind::InvalidArgument));
    }

    #[test]
    fn open_rejects_empty_input() {
        let err = DecoderSession::open(&[], 0, 0)
            .err()
            .map(|e| e.into_inner().kind());
        assert_eq!(err, Some(ErrorKind::Io));
    }
}
