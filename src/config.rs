//! Encoder configuration and decoder options

use crate::error::{Error, Result};
use whereat::at;

/// Configuration for AVIF encoding
///
/// Every field is always inside its domain: setters validate and leave the
/// previous value in place on rejection.
///
/// # Example
///
/// ```
/// use zenavif_io::EncoderConfig;
///
/// let config = EncoderConfig::new().with_quality(80).unwrap().with_speed(8).unwrap();
/// assert_eq!(config.quality(), 80);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderConfig {
    pub(crate) quality: u8,
    pub(crate) speed: u8,
    pub(crate) bit_depth: u8,
    pub(crate) lossless: bool,
}

impl EncoderConfig {
    /// Defaults used for new configs and for reads through a null handle
    pub const DEFAULT: Self = Self {
        quality: 60,
        speed: 6,
        bit_depth: 8,
        lossless: false,
    };

    /// Create a new encoder configuration with default settings
    ///
    /// Defaults: quality 60, speed 6, 8-bit, lossy
    pub fn new() -> Self {
        Self::default()
    }

    /// Encoding quality, 0 (worst) to 100 (best)
    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Encoding speed, 0 (slowest) to 10 (fastest)
    pub fn speed(&self) -> u8 {
        self.speed
    }

    /// Output bit depth: 8, 10 or 12
    pub fn bit_depth(&self) -> u8 {
        self.bit_depth
    }

    /// Whether lossless mode overrides quality
    pub fn lossless(&self) -> bool {
        self.lossless
    }

    /// Set encoding quality
    pub fn set_quality(&mut self, quality: i32) -> Result<()> {
        self.quality = Self::check_quality(quality)?;
        Ok(())
    }

    /// Set encoding speed
    pub fn set_speed(&mut self, speed: i32) -> Result<()> {
        self.speed = Self::check_speed(speed)?;
        Ok(())
    }

    /// Set output bit depth
    pub fn set_bit_depth(&mut self, bit_depth: i32) -> Result<()> {
        self.bit_depth = Self::check_bit_depth(bit_depth)?;
        Ok(())
    }

    /// Enable or disable lossless mode
    ///
    /// When enabled, color and alpha are both coded losslessly and the
    /// numeric quality is ignored.
    pub fn set_lossless(&mut self, lossless: bool) {
        self.lossless = lossless;
    }

    /// Builder form of [`set_quality`](Self::set_quality)
    pub fn with_quality(mut self, quality: i32) -> Result<Self> {
        self.set_quality(quality)?;
        Ok(self)
    }

    /// Builder form of [`set_speed`](Self::set_speed)
    pub fn with_speed(mut self, speed: i32) -> Result<Self> {
        self.set_speed(speed)?;
        Ok(self)
    }

    /// Builder form of [`set_bit_depth`](Self::set_bit_depth)
    pub fn with_bit_depth(mut self, bit_depth: i32) -> Result<Self> {
        self.set_bit_depth(bit_depth)?;
        Ok(self)
    }

    /// Builder form of [`set_lossless`](Self::set_lossless)
    pub fn with_lossless(mut self, lossless: bool) -> Self {
        self.lossless = lossless;
        self
    }

    pub(crate) fn check_quality(quality: i32) -> Result<u8> {
        match u8::try_from(quality) {
            Ok(q) if q <= 100 => Ok(q),
            _ => Err(at(Error::InvalidConfig(format!(
                "Quality must be between 0 and 100, got: {quality}"
            )))),
        }
    }

    pub(crate) fn check_speed(speed: i32) -> Result<u8> {
        match u8::try_from(speed) {
            Ok(s) if s <= 10 => Ok(s),
            _ => Err(at(Error::InvalidConfig(format!(
                "Speed must be between 0 and 10, got: {speed}"
            )))),
        }
    }

    pub(crate) fn check_bit_depth(bit_depth: i32) -> Result<u8> {
        match bit_depth {
            8 | 10 | 12 => Ok(bit_depth as u8),
            _ => Err(at(Error::InvalidConfig(format!(
                "Bit depth must be 8, 10, or 12, got: {bit_depth}"
            )))),
        }
    }
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Options for AVIF decoding
///
/// Both flags are stored and reported but decoding and metadata extraction
/// currently return ICC and EXIF regardless of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderOptions {
    pub(crate) ignore_icc: bool,
    pub(crate) ignore_exif: bool,
}

impl DecoderOptions {
    /// Defaults used for new options and for reads through a null handle
    pub const DEFAULT: Self = Self {
        ignore_icc: false,
        ignore_exif: false,
    };

    /// Create new decoder options with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the caller asked to skip the ICC profile
    pub fn ignore_icc(&self) -> bool {
        self.ignore_icc
    }

    /// Whether the caller asked to skip EXIF
    pub fn ignore_exif(&self) -> bool {
        self.ignore_exif
    }

    /// Set the ignore-ICC flag
    pub fn set_ignore_icc(&mut self, ignore: bool) {
        self.ignore_icc = ignore;
    }

    /// Set the ignore-EXIF flag
    pub fn set_ignore_exif(&mut self, ignore: bool) {
        self.ignore_exif = ignore;
    }

    /// Builder form of [`set_ignore_icc`](Self::set_ignore_icc)
    pub fn with_ignore_icc(mut self, ignore: bool) -> Self {
        self.ignore_icc = ignore;
        self
    }

    /// Builder form of [`set_ignore_exif`](Self::set_ignore_exif)
    pub fn with_ignore_exif(mut self, ignore: bool) -> Self {
        self.ignore_exif = ignore;
        self
    }
}

impl Default for DecoderOptions {
    fn default() -> Self {
        Self::DEFAULT
    }
}
