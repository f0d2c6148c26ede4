//! Hand-assembled AVIF containers around AV1 payloads from the crate's own
//! encoder: colour profiles, grids and image sequences that the encoder
//! never writes itself.

#![allow(dead_code)]

use zenavif_io::{EncoderConfig, encode_rgb};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn bx(kind: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let mut out = ((body.len() + 8) as u32).to_be_bytes().to_vec();
    out.extend_from_slice(kind);
    out.extend_from_slice(body);
    out
}

pub fn full(kind: &[u8; 4], version: u8, flags: u32, body: &[u8]) -> Vec<u8> {
    let mut payload = flags.to_be_bytes().to_vec();
    payload[0] = version;
    payload.extend_from_slice(body);
    bx(kind, &payload)
}

fn u32s(values: &[u32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_be_bytes()).collect()
}

/// First box of type `kind` anywhere in `data`, header included
fn find_box<'a>(data: &'a [u8], kind: &[u8; 4]) -> &'a [u8] {
    let at = data
        .windows(4)
        .position(|w| w == kind)
        .expect("box present in encoder output");
    let start = at - 4;
    let size = u32::from_be_bytes(data[start..at].try_into().expect("4 bytes")) as usize;
    &data[start..start + size]
}

/// Lossless AV1 still of one solid colour
pub struct Coded {
    /// OBUs of the colour item
    pub obus: Vec<u8>,
    /// The `av1C` property box
    pub av1c: Vec<u8>,
}

pub fn solid(rgb: [u8; 3], width: u32, height: u32) -> Coded {
    let config = EncoderConfig::new()
        .with_speed(10)
        .expect("valid speed")
        .with_lossless(true);
    let pixels = rgb.repeat((width * height) as usize);
    let avif = encode_rgb(Some(&config), &pixels, width, height, width as usize * 3)
        .expect("encode should succeed");
    let mdat = find_box(&avif, b"mdat");
    Coded {
        obus: mdat[8..].to_vec(),
        av1c: find_box(&avif, b"av1C").to_vec(),
    }
}

pub fn ispe(width: u32, height: u32) -> Vec<u8> {
    full(b"ispe", 0, 0, &u32s(&[width, height]))
}

pub fn colr_icc(icc: &[u8]) -> Vec<u8> {
    let mut body = b"prof".to_vec();
    body.extend_from_slice(icc);
    bx(b"colr", &body)
}

pub struct Item<'a> {
    pub id: u16,
    pub kind: &'a [u8; 4],
    pub data: &'a [u8],
    /// 1-based indices into the property list
    pub properties: &'a [u8],
}

/// ftyp + meta + mdat holding every item's data
///
/// `dimg` lists the tiles the primary item is derived from.
pub fn heif(
    brand: &[u8; 4],
    primary: u16,
    items: &[Item<'_>],
    properties: &[Vec<u8>],
    dimg: &[u16],
) -> Vec<u8> {
    let mut ftyp = brand.to_vec();
    ftyp.extend_from_slice(&0u32.to_be_bytes());
    ftyp.extend_from_slice(brand);
    ftyp.extend_from_slice(b"mif1miaf");
    let ftyp = bx(b"ftyp", &ftyp);

    let meta = |mdat_start: u32| {
        let mut iinf = (items.len() as u16).to_be_bytes().to_vec();
        for item in items {
            let mut infe = item.id.to_be_bytes().to_vec();
            infe.extend_from_slice(&0u16.to_be_bytes());
            infe.extend_from_slice(item.kind);
            infe.push(0);
            iinf.extend(full(b"infe", 2, 0, &infe));
        }

        // version 0, 4-byte offsets and lengths, no base offset
        let mut iloc = vec![0x44, 0x00];
        iloc.extend_from_slice(&(items.len() as u16).to_be_bytes());
        let mut offset = mdat_start;
        for item in items {
            iloc.extend_from_slice(&item.id.to_be_bytes());
            iloc.extend_from_slice(&0u16.to_be_bytes());
            iloc.extend_from_slice(&1u16.to_be_bytes());
            iloc.extend(u32s(&[offset, item.data.len() as u32]));
            offset += item.data.len() as u32;
        }

        let mut ipma = (items.len() as u32).to_be_bytes().to_vec();
        for item in items {
            ipma.extend_from_slice(&item.id.to_be_bytes());
            ipma.push(item.properties.len() as u8);
            ipma.extend_from_slice(item.properties);
        }
        let mut iprp = bx(b"ipco", &properties.concat());
        iprp.extend(full(b"ipma", 0, 0, &ipma));

        let mut body = full(b"hdlr", 0, 0, &[0, 0, 0, 0, b'p', b'i', b'c', b't', 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        body.extend(full(b"pitm", 0, 0, &primary.to_be_bytes()));
        body.extend(full(b"iinf", 0, 0, &iinf));
        body.extend(full(b"iloc", 0, 0, &iloc));
        if !dimg.is_empty() {
            let mut refs = primary.to_be_bytes().to_vec();
            refs.extend_from_slice(&(dimg.len() as u16).to_be_bytes());
            for id in dimg {
                refs.extend_from_slice(&id.to_be_bytes());
            }
            body.extend(full(b"iref", 0, 0, &bx(b"dimg", &refs)));
        }
        body.extend(bx(b"iprp", &iprp));
        full(b"meta", 0, 0, &body)
    };

    // field widths are fixed, so the layout does not depend on the offsets
    let mdat_start = (ftyp.len() + meta(0).len() + 8) as u32;
    let mut file = ftyp;
    file.extend(meta(mdat_start));
    let data: Vec<u8> = items.iter().flat_map(|item| item.data.iter().copied()).collect();
    file.extend(bx(b"mdat", &data));
    file
}

/// Still image with the given extra properties on its primary item
pub fn still_with(coded: &Coded, width: u32, height: u32, extra: &[Vec<u8>]) -> Vec<u8> {
    let mut properties = vec![coded.av1c.clone(), ispe(width, height)];
    properties.extend(extra.iter().cloned());
    let indices: Vec<u8> = (1..=properties.len() as u8).collect();
    heif(
        b"avif",
        1,
        &[Item {
            id: 1,
            kind: b"av01",
            data: &coded.obus,
            properties: &indices,
        }],
        &properties,
        &[],
    )
}

/// 2x2 grid of `tile`x`tile` solid tiles in row-major order
pub fn grid(colors: [[u8; 3]; 4], tile: u32) -> Vec<u8> {
    let tiles: Vec<Coded> = colors.iter().map(|&c| solid(c, tile, tile)).collect();
    let size = (tile * 2) as u16;
    // ImageGrid: version, flags, rows-1, columns-1, 16-bit output size
    let mut grid_data = vec![0, 0, 1, 1];
    grid_data.extend_from_slice(&size.to_be_bytes());
    grid_data.extend_from_slice(&size.to_be_bytes());

    let properties = vec![
        tiles[0].av1c.clone(),
        ispe(tile, tile),
        ispe(tile * 2, tile * 2),
    ];
    let mut items = vec![Item {
        id: 1,
        kind: b"grid",
        data: &grid_data,
        properties: &[3],
    }];
    for (i, coded) in tiles.iter().enumerate() {
        items.push(Item {
            id: i as u16 + 2,
            kind: b"av01",
            data: &coded.obus,
            properties: &[1, 2],
        });
    }
    heif(b"avif", 1, &items, &properties, &[2, 3, 4, 5])
}

/// Image sequence: one sample per colour, each `delta_ms` long, with the
/// first sample doubling as the primary item
pub fn sequence(colors: &[[u8; 3]], size: u32, delta_ms: u32) -> Vec<u8> {
    let samples: Vec<Coded> = colors.iter().map(|&c| solid(c, size, size)).collect();
    let mut file = still_with(&samples[0], size, size, &[]);
    file[8..12].copy_from_slice(b"avis");

    let count = samples.len() as u32;
    let moov = |first_offset: u32| {
        let mut offsets = Vec::with_capacity(samples.len());
        let mut offset = first_offset;
        for s in &samples {
            offsets.push(offset);
            offset += s.obus.len() as u32;
        }
        let sizes: Vec<u32> = samples.iter().map(|s| s.obus.len() as u32).collect();

        let mut stbl = full(b"stts", 0, 0, &u32s(&[1, count, delta_ms]));
        stbl.extend(full(b"stsc", 0, 0, &u32s(&[1, 1, 1, 1])));
        let mut stsz = u32s(&[0, count]);
        stsz.extend(u32s(&sizes));
        stbl.extend(full(b"stsz", 0, 0, &stsz));
        let mut stco = u32s(&[count]);
        stco.extend(u32s(&offsets));
        stbl.extend(full(b"stco", 0, 0, &stco));

        let mut mdhd = u32s(&[0, 0, 1000, count * delta_ms]);
        mdhd.extend_from_slice(&[0x55, 0xc4, 0, 0]);
        let mut mdia = full(b"mdhd", 0, 0, &mdhd);
        mdia.extend(bx(b"minf", &bx(b"stbl", &stbl)));
        bx(b"moov", &bx(b"trak", &bx(b"mdia", &mdia)))
    };

    let first_offset = (file.len() + moov(0).len() + 8) as u32;
    file.extend(moov(first_offset));
    let data: Vec<u8> = samples.iter().flat_map(|s| s.obus.iter().copied()).collect();
    file.extend(bx(b"mdat", &data));
    file
}

pub fn argb([r, g, b]: [u8; 3]) -> u32 {
    0xFF00_0000 | u32::from(r) << 16 | u32::from(g) << 8 | u32::from(b)
}
