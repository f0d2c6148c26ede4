//! Item metadata walker for the HEIF `meta` box
//!
//! The container parser hands out AV1 payloads and the colour box but not
//! the Exif item or the primary item's `ispe`. This module reads just the
//! boxes needed for those two (`pitm`, `iinf`, `iloc`, `iref`, `iprp`,
//! `idat`) straight out of the caller's buffer.
//! See ISO 14496-12:2015 § 8.11 and ISO 23008-12 § 9.

use crate::error::{Error, Result};
use byteorder::{BigEndian, ReadBytesExt};
use std::borrow::Cow;
use std::io::{Cursor, Read};
use whereat::at;

type FourCC = [u8; 4];

/// Metadata pulled from the `meta` box
#[derive(Debug, Default)]
pub(crate) struct ItemMetadata<'a> {
    /// Exif payload with its 4-byte TIFF header offset removed
    pub exif: Option<Cow<'a, [u8]>>,
    /// `ispe` width and height of the primary item
    pub extent: Option<(u32, u32)>,
}

fn truncated(_: std::io::Error) -> whereat::At<Error> {
    at(Error::Metadata("truncated box"))
}

struct Bmff<'a> {
    kind: FourCC,
    body: &'a [u8],
}

/// Iterates sibling boxes in a byte range
struct Boxes<'a> {
    rest: &'a [u8],
}

impl<'a> Boxes<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { rest: data }
    }
}

impl<'a> Iterator for Boxes<'a> {
    type Item = Result<Bmff<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.rest.is_empty() {
            return None;
        }
        match split_box(self.rest) {
            Ok((b, rest)) => {
                self.rest = rest;
                Some(Ok(b))
            }
            Err(e) => {
                self.rest = &[];
                Some(Err(e))
            }
        }
    }
}

fn split_box(data: &[u8]) -> Result<(Bmff<'_>, &[u8])> {
    let mut c = Cursor::new(data);
    let size32 = c.read_u32::<BigEndian>().map_err(truncated)?;
    let mut kind = [0u8; 4];
    c.read_exact(&mut kind).map_err(truncated)?;
    let size = match size32 {
        // box runs to the end of its parent
        0 => data.len() as u64,
        1 => c.read_u64::<BigEndian>().map_err(truncated)?,
        n => u64::from(n),
    };
    let header = c.position();
    if size < header || size > data.len() as u64 {
        return Err(at(Error::Metadata("box size out of bounds")));
    }
    let (whole, rest) = data.split_at(size as usize);
    Ok((
        Bmff {
            kind,
            body: &whole[header as usize..],
        },
        rest,
    ))
}

/// Split a FullBox body into (version, flags, payload)
fn full_box(body: &[u8]) -> Result<(u8, u32, &[u8])> {
    if body.len() < 4 {
        return Err(at(Error::Metadata("truncated full box header")));
    }
    let flags = u32::from_be_bytes([0, body[1], body[2], body[3]]);
    Ok((body[0], flags, &body[4..]))
}

/// Read an `iloc`-style field of 0, 4 or 8 bytes
fn read_sized(c: &mut Cursor<&[u8]>, size: u8) -> Result<u64> {
    match size {
        0 => Ok(0),
        4 => Ok(u64::from(c.read_u32::<BigEndian>().map_err(truncated)?)),
        8 => c.read_u64::<BigEndian>().map_err(truncated),
        _ => Err(at(Error::Metadata("iloc field size must be 0, 4 or 8"))),
    }
}

fn read_id(c: &mut Cursor<&[u8]>, wide: bool) -> Result<u32> {
    if wide {
        c.read_u32::<BigEndian>().map_err(truncated)
    } else {
        Ok(u32::from(c.read_u16::<BigEndian>().map_err(truncated)?))
    }
}

#[derive(Debug)]
struct Location {
    item: u32,
    construction_method: u8,
    base_offset: u64,
    /// (offset, length); length 0 means "to the end of the source"
    extents: Vec<(u64, u64)>,
}

#[derive(Debug)]
enum Property {
    Extent(u32, u32),
    Other,
}

#[derive(Debug, Default)]
struct Meta<'a> {
    primary: Option<u32>,
    /// (item id, item type)
    items: Vec<(u32, FourCC)>,
    locations: Vec<Location>,
    /// (from item, to item) for `cdsc` references
    describes: Vec<(u32, u32)>,
    /// ipco children in order; ipma indices are 1-based into this
    properties: Vec<Property>,
    /// (item id, property index)
    associations: Vec<(u32, u16)>,
    idat: Option<&'a [u8]>,
}

impl<'a> Meta<'a> {
    fn parse(body: &'a [u8]) -> Result<Self> {
        let (_, _, children) = full_box(body)?;
        let mut meta = Meta::default();
        for b in Boxes::new(children) {
            let b = b?;
            match &b.kind {
                b"pitm" => {
                    let (version, _, payload) = full_box(b.body)?;
                    meta.primary = Some(read_id(&mut Cursor::new(payload), version != 0)?);
                }
                b"iinf" => meta.read_iinf(b.body)?,
                b"iloc" => meta.read_iloc(b.body)?,
                b"iref" => meta.read_iref(b.body)?,
                b"iprp" => {
                    for p in Boxes::new(b.body) {
                        let p = p?;
                        match &p.kind {
                            b"ipco" => meta.read_ipco(p.body)?,
                            b"ipma" => meta.read_ipma(p.body)?,
                            _ => {}
                        }
                    }
                }
                b"idat" => meta.idat = Some(b.body),
                _ => {}
            }
        }
        Ok(meta)
    }

    fn read_iinf(&mut self, body: &'a [u8]) -> Result<()> {
        let (version, _, payload) = full_box(body)?;
        let skip = if version == 0 { 2 } else { 4 };
        let entries = payload
            .get(skip..)
            .ok_or_else(|| at(Error::Metadata("truncated iinf")))?;
        for b in Boxes::new(entries) {
            let b = b?;
            if &b.kind != b"infe" {
                continue;
            }
            let (version, _, payload) = full_box(b.body)?;
            // item_type only exists from version 2 on
            if version < 2 {
                continue;
            }
            let mut c = Cursor::new(payload);
            let id = read_id(&mut c, version >= 3)?;
            let _protection_index = c.read_u16::<BigEndian>().map_err(truncated)?;
            let mut item_type = [0u8; 4];
            c.read_exact(&mut item_type).map_err(truncated)?;
            self.items.push((id, item_type));
        }
        Ok(())
    }

    fn read_iloc(&mut self, body: &'a [u8]) -> Result<()> {
        let (version, _, payload) = full_box(body)?;
        if version > 2 {
            return Err(at(Error::Metadata("unsupported iloc version")));
        }
        let mut c = Cursor::new(payload);
        let sizes = c.read_u8().map_err(truncated)?;
        let (offset_size, length_size) = (sizes >> 4, sizes & 0x0f);
        let sizes = c.read_u8().map_err(truncated)?;
        let base_offset_size = sizes >> 4;
        let index_size = if version >= 1 { sizes & 0x0f } else { 0 };
        let item_count = read_id(&mut c, version == 2)?;

        for _ in 0..item_count {
            let item = read_id(&mut c, version == 2)?;
            let construction_method = if version >= 1 {
                (c.read_u16::<BigEndian>().map_err(truncated)? & 0x0f) as u8
            } else {
                0
            };
            let _data_reference_index = c.read_u16::<BigEndian>().map_err(truncated)?;
            let base_offset = read_sized(&mut c, base_offset_size)?;
            let extent_count = c.read_u16::<BigEndian>().map_err(truncated)?;
            let mut extents = Vec::with_capacity(usize::from(extent_count));
            for _ in 0..extent_count {
                let _extent_index = read_sized(&mut c, index_size)?;
                let offset = read_sized(&mut c, offset_size)?;
                let length = read_sized(&mut c, length_size)?;
                extents.push((offset, length));
            }
            self.locations.push(Location {
                item,
                construction_method,
                base_offset,
                extents,
            });
        }
        Ok(())
    }

    fn read_iref(&mut self, body: &'a [u8]) -> Result<()> {
        let (version, _, payload) = full_box(body)?;
        for b in Boxes::new(payload) {
            let b = b?;
            if &b.kind != b"cdsc" {
                continue;
            }
            let mut c = Cursor::new(b.body);
            let from = read_id(&mut c, version != 0)?;
            let count = c.read_u16::<BigEndian>().map_err(truncated)?;
            for _ in 0..count {
                let to = read_id(&mut c, version != 0)?;
                self.describes.push((from, to));
            }
        }
        Ok(())
    }

    fn read_ipco(&mut self, body: &'a [u8]) -> Result<()> {
        for b in Boxes::new(body) {
            let b = b?;
            let property = match &b.kind {
                b"ispe" => {
                    let (_, _, payload) = full_box(b.body)?;
                    let mut c = Cursor::new(payload);
                    let width = c.read_u32::<BigEndian>().map_err(truncated)?;
                    let height = c.read_u32::<BigEndian>().map_err(truncated)?;
                    Property::Extent(width, height)
                }
                _ => Property::Other,
            };
            // every child counts toward the 1-based ipma index
            self.properties.push(property);
        }
        Ok(())
    }

    fn read_ipma(&mut self, body: &'a [u8]) -> Result<()> {
        let (version, flags, payload) = full_box(body)?;
        let mut c = Cursor::new(payload);
        let entry_count = c.read_u32::<BigEndian>().map_err(truncated)?;
        for _ in 0..entry_count {
            let item = read_id(&mut c, version >= 1)?;
            let association_count = c.read_u8().map_err(truncated)?;
            for _ in 0..association_count {
                // top bit is the `essential` flag
                let index = if flags & 1 == 1 {
                    c.read_u16::<BigEndian>().map_err(truncated)? & 0x7fff
                } else {
                    u16::from(c.read_u8().map_err(truncated)? & 0x7f)
                };
                self.associations.push((item, index));
            }
        }
        Ok(())
    }

    /// Properties associated with `item`, in association order
    fn properties_of(&self, item: u32) -> impl Iterator<Item = &Property> + '_ {
        self.associations
            .iter()
            .filter(move |(id, _)| *id == item)
            .filter_map(move |&(_, index)| {
                let index = usize::from(index).checked_sub(1)?;
                self.properties.get(index)
            })
    }

    fn exif_item(&self) -> Option<u32> {
        let mut exif = self
            .items
            .iter()
            .filter(|(_, kind)| kind == b"Exif")
            .map(|&(id, _)| id);
        let first = exif.clone().next()?;
        let describing_primary = exif.find(|id| {
            self.primary
                .is_some_and(|p| self.describes.contains(&(*id, p)))
        });
        Some(describing_primary.unwrap_or(first))
    }

    fn payload(&self, file: &'a [u8], item: u32) -> Result<Cow<'a, [u8]>> {
        let loc = self
            .locations
            .iter()
            .find(|l| l.item == item)
            .ok_or_else(|| at(Error::Metadata("item has no location")))?;
        let source = match loc.construction_method {
            0 => file,
            1 => self
                .idat
                .ok_or_else(|| at(Error::Metadata("idat item without idat box")))?,
            _ => return Err(at(Error::Unsupported("item construction method"))),
        };
        let mut parts = loc
            .extents
            .iter()
            .map(|&(offset, length)| extent(source, loc.base_offset, offset, length));
        match loc.extents.len() {
            0 => Err(at(Error::Metadata("item has no extents"))),
            1 => parts
                .next()
                .unwrap_or_else(|| Err(at(Error::Metadata("item has no extents"))))
                .map(Cow::Borrowed),
            _ => {
                let mut joined = Vec::new();
                for part in parts {
                    joined.extend_from_slice(part?);
                }
                Ok(Cow::Owned(joined))
            }
        }
    }
}

fn extent(source: &[u8], base: u64, offset: u64, length: u64) -> Result<&[u8]> {
    let out_of_bounds = || at(Error::Metadata("item extent out of bounds"));
    let start = base.checked_add(offset).ok_or_else(out_of_bounds)?;
    let start = usize::try_from(start).map_err(|_| out_of_bounds())?;
    let end = if length == 0 {
        source.len()
    } else {
        let length = usize::try_from(length).map_err(|_| out_of_bounds())?;
        start.checked_add(length).ok_or_else(out_of_bounds)?
    };
    source.get(start..end).ok_or_else(out_of_bounds)
}

/// Read Exif and `ispe` for the primary item of `file`
///
/// Files without a top-level `meta` box (bare image sequences) yield empty
/// metadata.
pub(crate) fn scan(file: &[u8]) -> Result<ItemMetadata<'_>> {
    let mut meta_body = None;
    for b in Boxes::new(file) {
        let b = b?;
        if &b.kind == b"meta" {
            meta_body = Some(b.body);
            break;
        }
    }
    let Some(body) = meta_body else {
        return Ok(ItemMetadata::default());
    };
    let meta = Meta::parse(body)?;

    let mut out = ItemMetadata::default();
    if let Some(primary) = meta.primary {
        out.extent = meta.properties_of(primary).find_map(|property| match property {
            Property::Extent(w, h) => Some((*w, *h)),
            Property::Other => None,
        });
    }

    if let Some(item) = meta.exif_item() {
        let payload = meta.payload(file, item)?;
        if payload.len() < 4 {
            return Err(at(Error::Metadata("Exif payload shorter than its header")));
        }
        // drop exif_tiff_header_offset
        let exif = match payload {
            Cow::Borrowed(b) => Cow::Borrowed(&b[4..]),
            Cow::Owned(mut v) => {
                v.drain(..4);
                Cow::Owned(v)
            }
        };
        if !exif.is_empty() {
            out.exif = Some(exif);
        }
    }
    Ok(out)
}
