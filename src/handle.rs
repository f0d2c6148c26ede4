//! Owned opaque handles for configuration records
//!
//! A handle either owns one heap-allocated record or is null. Getters on a
//! null handle return the record's `DEFAULT`; setters still validate their
//! argument but otherwise do nothing. Dropping a handle (or calling
//! [`Handle::delete`]) releases the record.

use crate::config::{DecoderOptions, EncoderConfig};
use crate::error::Result;

/// Owned handle to a configuration record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handle<T>(Option<Box<T>>);

/// Handle to an [`EncoderConfig`]
pub type EncoderConfigHandle = Handle<EncoderConfig>;

/// Handle to a [`DecoderOptions`]
pub type DecoderOptionsHandle = Handle<DecoderOptions>;

impl<T: Default> Handle<T> {
    /// Allocate a record with default values
    pub fn create() -> Self {
        Self(Some(Box::default()))
    }
}

impl<T> Handle<T> {
    /// A handle that refers to nothing
    pub const fn null() -> Self {
        Self(None)
    }

    /// Whether this handle refers to nothing
    pub fn is_null(&self) -> bool {
        self.0.is_none()
    }

    /// Borrow the record, `None` for a null handle
    ///
    /// This is the form the crate-level encode/decode functions accept.
    pub fn get(&self) -> Option<&T> {
        self.0.as_deref()
    }

    /// Mutably borrow the record
    pub fn get_mut(&mut self) -> Option<&mut T> {
        self.0.as_deref_mut()
    }

    /// Release the record
    pub fn delete(self) {
        drop(self);
    }
}

impl<T> Default for Handle<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T> From<T> for Handle<T> {
    fn from(record: T) -> Self {
        Self(Some(Box::new(record)))
    }
}

impl Handle<EncoderConfig> {
    fn record(&self) -> &EncoderConfig {
        self.get().unwrap_or(&EncoderConfig::DEFAULT)
    }

    /// Quality, or the default for a null handle
    pub fn quality(&self) -> u8 {
        self.record().quality
    }

    /// Speed, or the default for a null handle
    pub fn speed(&self) -> u8 {
        self.record().speed
    }

    /// Bit depth, or the default for a null handle
    pub fn bit_depth(&self) -> u8 {
        self.record().bit_depth
    }

    /// Lossless flag, or the default for a null handle
    pub fn lossless(&self) -> bool {
        self.record().lossless
    }

    /// Validate and store quality
    pub fn set_quality(&mut self, quality: i32) -> Result<()> {
        let quality = EncoderConfig::check_quality(quality)?;
        if let Some(config) = self.get_mut() {
            config.quality = quality;
        }
        Ok(())
    }

    /// Validate and store speed
    pub fn set_speed(&mut self, speed: i32) -> Result<()> {
        let speed = EncoderConfig::check_speed(speed)?;
        if let Some(config) = self.get_mut() {
            config.speed = speed;
        }
        Ok(())
    }

    /// Validate and store bit depth
    pub fn set_bit_depth(&mut self, bit_depth: i32) -> Result<()> {
        let bit_depth = EncoderConfig::check_bit_depth(bit_depth)?;
        if let Some(config) = self.get_mut() {
            config.bit_depth = bit_depth;
        }
        Ok(())
    }

    /// Store the lossless flag
    pub fn set_lossless(&mut self, lossless: bool) {
        if let Some(config) = self.get_mut() {
            config.lossless = lossless;
        }
    }
}

impl Handle<DecoderOptions> {
    fn record(&self) -> &DecoderOptions {
        self.get().unwrap_or(&DecoderOptions::DEFAULT)
    }

    /// Ignore-ICC flag, or the default for a null handle
    pub fn ignore_icc(&self) -> bool {
        self.record().ignore_icc
    }

    /// Ignore-EXIF flag, or the default for a null handle
    pub fn ignore_exif(&self) -> bool {
        self.record().ignore_exif
    }

    /// Store the ignore-ICC flag
    pub fn set_ignore_icc(&mut self, ignore: bool) {
        if let Some(options) = self.get_mut() {
            options.ignore_icc = ignore;
        }
    }

    /// Store the ignore-EXIF flag
    pub fn set_ignore_exif(&mut self, ignore: bool) {
        if let Some(options) = self.get_mut() {
            options.ignore_exif = ignore;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn created_handle_holds_defaults() {
        let handle = EncoderConfigHandle::create();
        assert!(!handle.is_null());
        assert_eq!(handle.get(), Some(&EncoderConfig::DEFAULT));
        handle.delete();
    }

    #[test]
    fn null_getters_return_defaults() {
        let handle = EncoderConfigHandle::null();
        assert_eq!(handle.quality(), 60);
        assert_eq!(handle.speed(), 6);
        assert_eq!(handle.bit_depth(), 8);
        assert!(!handle.lossless());

        let options = DecoderOptionsHandle::null();
        assert!(!options.ignore_icc());
        assert!(!options.ignore_exif());
    }

    #[test]
    fn null_setters_are_silent_noops() {
        let mut handle = EncoderConfigHandle::null();
        handle.set_quality(90).unwrap();
        handle.set_speed(2).unwrap();
        handle.set_bit_depth(10).unwrap();
        handle.set_lossless(true);
        assert!(handle.is_null());
        assert_eq!(handle.quality(), 60);
        assert!(!handle.lossless());

        let mut options = DecoderOptionsHandle::null();
        options.set_ignore_icc(true);
        assert!(!options.ignore_icc());
    }

    #[test]
    fn null_setters_still_validate() {
        let mut handle = EncoderConfigHandle::null();
        let err = handle.set_quality(101).unwrap_err().into_inner();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(handle.set_speed(11).is_err());
        assert!(handle.set_bit_depth(16).is_err());
    }

    #[test]
    fn setters_store_and_reject() {
        let mut handle = EncoderConfigHandle::create();
        handle.set_quality(0).unwrap();
        handle.set_speed(10).unwrap();
        handle.set_bit_depth(12).unwrap();
        handle.set_lossless(true);
        assert!(handle.set_quality(-1).is_err());
        assert_eq!(handle.quality(), 0);
        assert_eq!(handle.speed(), 10);
        assert_eq!(handle.bit_depth(), 12);
        assert!(handle.lossless());

        let mut options = DecoderOptionsHandle::create();
        options.set_ignore_exif(true);
        assert!(options.ignore_exif());
        assert!(!options.ignore_icc());
    }
}
