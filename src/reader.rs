//! Per-image reader over one AVIF buffer
//!
//! Mirrors an image-reader plugin: headers are read once on first use, each
//! index can be decoded on demand, and metadata is only offered when the
//! file actually carries some.

use crate::error::{Error, Result};
use crate::image::{DecodeResult, ImageInfo};
use std::cell::OnceCell;
use whereat::at;

/// ICC and Exif payloads of one image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageMetadata {
    /// Raw Exif (TIFF) bytes
    pub exif: Option<Vec<u8>>,
    /// Raw ICC profile bytes
    pub icc_profile: Option<Vec<u8>>,
}

/// Lazy reader over a complete AVIF file held in memory
///
/// # Example
///
/// ```no_run
/// let data = std::fs::read("image.avif").unwrap();
/// let reader = zenavif_io::Reader::new(&data);
/// for i in 0..reader.num_images().unwrap() {
///     let frame = reader.read(i).unwrap();
///     println!("{}x{}", frame.width, frame.height);
/// }
/// ```
#[derive(Debug)]
pub struct Reader<'a> {
    data: &'a [u8],
    info: OnceCell<ImageInfo>,
}

impl<'a> Reader<'a> {
    /// Wrap `data`; nothing is parsed yet
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            info: OnceCell::new(),
        }
    }

    /// Header information, parsed on first call
    pub fn info(&self) -> Result<&ImageInfo> {
        if let Some(info) = self.info.get() {
            return Ok(info);
        }
        let info = crate::inspect(self.data, 0, self.data.len())?;
        Ok(self.info.get_or_init(|| info))
    }

    /// Number of frames
    pub fn num_images(&self) -> Result<usize> {
        Ok(self.info()?.frame_count as usize)
    }

    fn check_index(&self, index: usize) -> Result<&ImageInfo> {
        let info = self.info()?;
        let count = info.frame_count as usize;
        if index >= count {
            return Err(at(Error::FrameOutOfRange { index, count }));
        }
        Ok(info)
    }

    /// Width of frame `index`
    pub fn width(&self, index: usize) -> Result<u32> {
        Ok(self.check_index(index)?.width)
    }

    /// Height of frame `index`
    pub fn height(&self, index: usize) -> Result<u32> {
        Ok(self.check_index(index)?.height)
    }

    /// Decode frame `index`
    pub fn read(&self, index: usize) -> Result<DecodeResult> {
        let info = self.check_index(index)?;
        let len = self.data.len();
        if info.frame_count > 1 {
            let index = i32::try_from(index).map_err(|_| {
                at(Error::FrameOutOfRange {
                    index,
                    count: info.frame_count as usize,
                })
            })?;
            crate::decode_frame(None, self.data, 0, len, index)
        } else {
            crate::decode(None, self.data, 0, len)
        }
    }

    /// Exif and ICC of frame `index`, `None` when the file has neither
    pub fn metadata(&self, index: usize) -> Result<Option<ImageMetadata>> {
        let info = self.check_index(index)?;
        if !info.has_exif && !info.has_icc_profile {
            return Ok(None);
        }
        let len = self.data.len();
        Ok(Some(ImageMetadata {
            exif: crate::get_exif(self.data, 0, len)?,
            icc_profile: crate::get_icc_profile(self.data, 0, len)?,
        }))
    }
}
