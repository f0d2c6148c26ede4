//! Color conversion between decoded AV1 frames, interleaved RGB(A), and
//! the 4:4:4 planes handed to the encoder.
//!
//! Decoding delegates the YCbCr math to the `yuv` crate and always lands on
//! 8 bits per channel; 10/12-bit sources are converted at native depth and
//! rounded down afterwards. Identity-matrix (GBR) frames are copied
//! channel-for-channel so lossless files survive bit-exact.

#![deny(unsafe_code)]

use crate::error::{Error, Result};
use crate::image::{EncodeMatrix, RgbInput, RgbPixels, YuvImage};
use imgref::{Img, ImgVec};
use rav1d_safe::src::managed::{
    ColorRange as Rav1dColorRange, Frame, MatrixCoefficients as Rav1dMatrixCoefficients,
    PixelLayout, Planes,
};
use rgb::{ComponentBytes, Rgb, Rgba};
use whereat::at;
use yuv::{
    YuvChromaSubsampling, YuvConversionMode, YuvGrayImage, YuvPlanarImage, YuvPlanarImageMut,
    YuvRange, YuvStandardMatrix,
};

/// rav1d matrix coefficients to the yuv crate's matrix
///
/// `None` means identity (GBR), which the yuv crate has no kernel for.
fn to_yuv_matrix(mc: Rav1dMatrixCoefficients) -> Option<YuvStandardMatrix> {
    match mc {
        Rav1dMatrixCoefficients::Identity => None,
        Rav1dMatrixCoefficients::BT709 => Some(YuvStandardMatrix::Bt709),
        Rav1dMatrixCoefficients::BT2020NCL | Rav1dMatrixCoefficients::BT2020CL => {
            Some(YuvStandardMatrix::Bt2020)
        }
        Rav1dMatrixCoefficients::SMPTE240 => Some(YuvStandardMatrix::Smpte240),
        // BT.601, BT.470BG, FCC and everything unspecified
        _ => Some(YuvStandardMatrix::Bt601),
    }
}

fn to_yuv_range(range: Rav1dColorRange) -> YuvRange {
    match range {
        Rav1dColorRange::Full => YuvRange::Full,
        Rav1dColorRange::Limited => YuvRange::Limited,
    }
}

/// Round a `depth`-bit sample to 8 bits
#[inline]
fn down_to_8(v: u16, depth: u8) -> u8 {
    let max = (1u32 << depth) - 1;
    ((u32::from(v) * 255 + max / 2) / max).min(255) as u8
}

/// Scale an 8-bit sample up to `depth` bits
#[inline]
fn up_from_8(v: u8, depth: u8) -> u16 {
    if depth == 8 {
        return u16::from(v);
    }
    let max = (1u32 << depth) - 1;
    ((u32::from(v) * max + 127) / 255) as u16
}

/// Scale a limited-range sample to full range at the same depth
#[inline]
fn limited_to_full(v: u16, depth: u8) -> u16 {
    let max = (1u32 << depth) - 1;
    let lo = 16u32 << (depth - 8);
    let span = 219u32 << (depth - 8);
    (u32::from(v).saturating_sub(lo) * max / span).min(max) as u16
}

fn missing_plane() -> whereat::At<Error> {
    at(Error::Decode("decoded frame is missing a chroma plane".into()))
}

/// Convert a decoded frame to 8-bit interleaved pixels
///
/// The output is RGBA when `has_alpha` (alpha initialized to 255, see
/// [`merge_alpha`]) and RGB otherwise, tightly packed at the frame's
/// display size.
pub(crate) fn yuv_to_rgb(frame: &Frame, has_alpha: bool) -> Result<RgbPixels> {
    let width = frame.width() as usize;
    let height = frame.height() as usize;
    let layout = frame.pixel_layout();
    let color = frame.color_info();
    let range = to_yuv_range(color.color_range);

    let Some(matrix) = to_yuv_matrix(color.matrix_coefficients) else {
        if !matches!(layout, PixelLayout::I444) {
            return Err(at(Error::Unsupported(
                "identity matrix requires 4:4:4 chroma",
            )));
        }
        return gbr_to_rgb(frame, width, height, has_alpha);
    };

    let channels = if has_alpha { 4 } else { 3 };
    let rgb_stride = (width * channels) as u32;

    let bytes = match frame.planes() {
        Planes::Depth8(planes) => {
            let y = planes.y();
            let mut out = vec![0u8; width * height * channels];
            let status = if matches!(layout, PixelLayout::I400) {
                let gray = YuvGrayImage {
                    y_plane: y.as_slice(),
                    y_stride: y.stride() as u32,
                    width: width as u32,
                    height: height as u32,
                };
                if has_alpha {
                    yuv::yuv400_to_rgba(&gray, &mut out, rgb_stride, range, matrix)
                } else {
                    yuv::yuv400_to_rgb(&gray, &mut out, rgb_stride, range, matrix)
                }
            } else {
                let u = planes.u().ok_or_else(missing_plane)?;
                let v = planes.v().ok_or_else(missing_plane)?;
                let planar = YuvPlanarImage {
                    y_plane: y.as_slice(),
                    y_stride: y.stride() as u32,
                    u_plane: u.as_slice(),
                    u_stride: u.stride() as u32,
                    v_plane: v.as_slice(),
                    v_stride: v.stride() as u32,
                    width: width as u32,
                    height: height as u32,
                };
                match (layout, has_alpha) {
                    (PixelLayout::I420, false) => {
                        yuv::yuv420_to_rgb(&planar, &mut out, rgb_stride, range, matrix)
                    }
                    (PixelLayout::I420, true) => {
                        yuv::yuv420_to_rgba(&planar, &mut out, rgb_stride, range, matrix)
                    }
                    (PixelLayout::I422, false) => {
                        yuv::yuv422_to_rgb(&planar, &mut out, rgb_stride, range, matrix)
                    }
                    (PixelLayout::I422, true) => {
                        yuv::yuv422_to_rgba(&planar, &mut out, rgb_stride, range, matrix)
                    }
                    (_, false) => yuv::yuv444_to_rgb(&planar, &mut out, rgb_stride, range, matrix),
                    (_, true) => yuv::yuv444_to_rgba(&planar, &mut out, rgb_stride, range, matrix),
                }
            };
            status.map_err(|e| at(Error::ColorConversion(e)))?;
            out
        }
        Planes::Depth16(planes) => {
            let depth = frame.bit_depth();
            let y = planes.y();
            let mut out = vec![0u16; width * height * channels];
            let status = if matches!(layout, PixelLayout::I400) {
                let gray = YuvGrayImage {
                    y_plane: y.as_slice(),
                    y_stride: y.stride() as u32,
                    width: width as u32,
                    height: height as u32,
                };
                match (depth, has_alpha) {
                    (10, false) => yuv::y010_to_rgb10(&gray, &mut out, rgb_stride, range, matrix),
                    (10, true) => yuv::y010_to_rgba10(&gray, &mut out, rgb_stride, range, matrix),
                    (12, false) => yuv::y012_to_rgb12(&gray, &mut out, rgb_stride, range, matrix),
                    (12, true) => yuv::y012_to_rgba12(&gray, &mut out, rgb_stride, range, matrix),
                    _ => return Err(at(Error::Unsupported("bit depth"))),
                }
            } else {
                let u = planes.u().ok_or_else(missing_plane)?;
                let v = planes.v().ok_or_else(missing_plane)?;
                let planar = YuvPlanarImage {
                    y_plane: y.as_slice(),
                    y_stride: y.stride() as u32,
                    u_plane: u.as_slice(),
                    u_stride: u.stride() as u32,
                    v_plane: v.as_slice(),
                    v_stride: v.stride() as u32,
                    width: width as u32,
                    height: height as u32,
                };
                let (s, r, m) = (rgb_stride, range, matrix);
                match (depth, layout, has_alpha) {
                    (10, PixelLayout::I420, false) => yuv::i010_to_rgb10(&planar, &mut out, s, r, m),
                    (10, PixelLayout::I420, true) => yuv::i010_to_rgba10(&planar, &mut out, s, r, m),
                    (10, PixelLayout::I422, false) => yuv::i210_to_rgb10(&planar, &mut out, s, r, m),
                    (10, PixelLayout::I422, true) => yuv::i210_to_rgba10(&planar, &mut out, s, r, m),
                    (10, _, false) => yuv::i410_to_rgb10(&planar, &mut out, s, r, m),
                    (10, _, true) => yuv::i410_to_rgba10(&planar, &mut out, s, r, m),
                    (12, PixelLayout::I420, false) => yuv::i012_to_rgb12(&planar, &mut out, s, r, m),
                    (12, PixelLayout::I420, true) => yuv::i012_to_rgba12(&planar, &mut out, s, r, m),
                    (12, PixelLayout::I422, false) => yuv::i212_to_rgb12(&planar, &mut out, s, r, m),
                    (12, PixelLayout::I422, true) => yuv::i212_to_rgba12(&planar, &mut out, s, r, m),
                    (12, _, false) => yuv::i412_to_rgb12(&planar, &mut out, s, r, m),
                    (12, _, true) => yuv::i412_to_rgba12(&planar, &mut out, s, r, m),
                    _ => return Err(at(Error::Unsupported("bit depth"))),
                }
            };
            status.map_err(|e| at(Error::ColorConversion(e)))?;
            out.into_iter().map(|v| down_to_8(v, depth)).collect()
        }
    };

    Ok(interleaved_to_pixels(&bytes, width, height, has_alpha))
}

/// Wrap tightly packed interleaved bytes as typed pixels
fn interleaved_to_pixels(bytes: &[u8], width: usize, height: usize, has_alpha: bool) -> RgbPixels {
    if has_alpha {
        let buf = bytes
            .chunks_exact(4)
            .map(|p| Rgba {
                r: p[0],
                g: p[1],
                b: p[2],
                a: p[3],
            })
            .collect();
        RgbPixels::Rgba8(ImgVec::new(buf, width, height))
    } else {
        let buf = bytes
            .chunks_exact(3)
            .map(|p| Rgb {
                r: p[0],
                g: p[1],
                b: p[2],
            })
            .collect();
        RgbPixels::Rgb8(ImgVec::new(buf, width, height))
    }
}

/// Identity-matrix frames: Y carries G, U carries B, V carries R
fn gbr_to_rgb(frame: &Frame, width: usize, height: usize, has_alpha: bool) -> Result<RgbPixels> {
    let channels = if has_alpha { 4 } else { 3 };
    let mut out = vec![255u8; width * height * channels];
    match frame.planes() {
        Planes::Depth8(planes) => {
            let (g, b, r) = (
                planes.y(),
                planes.u().ok_or_else(missing_plane)?,
                planes.v().ok_or_else(missing_plane)?,
            );
            for (row, dst) in out.chunks_exact_mut(width * channels).enumerate() {
                let (gr, br, rr) = (g.row(row), b.row(row), r.row(row));
                for (x, px) in dst.chunks_exact_mut(channels).enumerate() {
                    px[0] = rr[x];
                    px[1] = gr[x];
                    px[2] = br[x];
                }
            }
        }
        Planes::Depth16(planes) => {
            let depth = frame.bit_depth();
            let (g, b, r) = (
                planes.y(),
                planes.u().ok_or_else(missing_plane)?,
                planes.v().ok_or_else(missing_plane)?,
            );
            for (row, dst) in out.chunks_exact_mut(width * channels).enumerate() {
                let (gr, br, rr) = (g.row(row), b.row(row), r.row(row));
                for (x, px) in dst.chunks_exact_mut(channels).enumerate() {
                    px[0] = down_to_8(rr[x], depth);
                    px[1] = down_to_8(gr[x], depth);
                    px[2] = down_to_8(br[x], depth);
                }
            }
        }
    }
    Ok(interleaved_to_pixels(&out, width, height, has_alpha))
}

/// Overwrite the alpha channel of `pixels` from a decoded alpha frame
///
/// The alpha frame's luma plane is the alpha channel. Limited-range alpha
/// is expanded, and premultiplied color is divided back out.
pub(crate) fn merge_alpha(pixels: &mut RgbPixels, alpha: &Frame, premultiplied: bool) -> Result<()> {
    let RgbPixels::Rgba8(img) = pixels else {
        return Err(at(Error::Unsupported("cannot add alpha to an RGB image")));
    };
    let (width, height) = (img.width(), img.height());
    if alpha.width() as usize != width || alpha.height() as usize != height {
        return Err(at(Error::Unsupported("alpha size mismatch")));
    }
    let limited = matches!(alpha.color_info().color_range, Rav1dColorRange::Limited);
    let depth = alpha.bit_depth();

    let planes = alpha.planes();
    for (y, row) in img.rows_mut().enumerate() {
        match &planes {
            Planes::Depth8(p) => {
                let plane = p.y();
                for (px, &a) in row.iter_mut().zip(plane.row(y)) {
                    px.a = if limited {
                        limited_to_full(u16::from(a), 8) as u8
                    } else {
                        a
                    };
                }
            }
            Planes::Depth16(p) => {
                let plane = p.y();
                for (px, &a) in row.iter_mut().zip(plane.row(y)) {
                    let a = if limited { limited_to_full(a, depth) } else { a };
                    px.a = down_to_8(a, depth);
                }
            }
        }
        if premultiplied {
            unpremultiply8(row);
        }
    }
    Ok(())
}

/// Undo premultiplied alpha in place
fn unpremultiply8(row: &mut [Rgba<u8>]) {
    for px in row.iter_mut() {
        if px.a != 0 && px.a != 255 {
            let a = u32::from(px.a);
            px.r = ((u32::from(px.r) * 255 + a / 2) / a).min(255) as u8;
            px.g = ((u32::from(px.g) * 255 + a / 2) / a).min(255) as u8;
            px.b = ((u32::from(px.b) * 255 + a / 2) / a).min(255) as u8;
        }
    }
}

/// Place equally sized tiles row-major onto a `width`×`height` canvas
///
/// Tiles hanging over the right or bottom edge are clipped.
pub(crate) fn stitch(
    tiles: Vec<RgbPixels>,
    columns: usize,
    width: usize,
    height: usize,
) -> Result<RgbPixels> {
    let Some(first) = tiles.first() else {
        return Err(at(Error::Decode("grid has no tiles".into())));
    };
    if first.has_alpha() {
        let tiles = tiles
            .into_iter()
            .map(|t| match t {
                RgbPixels::Rgba8(img) => Ok(img),
                RgbPixels::Rgb8(_) => Err(at(Error::Unsupported("mixed tile formats"))),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(RgbPixels::Rgba8(stitch_tiles(&tiles, columns, width, height)?))
    } else {
        let tiles = tiles
            .into_iter()
            .map(|t| match t {
                RgbPixels::Rgb8(img) => Ok(img),
                RgbPixels::Rgba8(_) => Err(at(Error::Unsupported("mixed tile formats"))),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(RgbPixels::Rgb8(stitch_tiles(&tiles, columns, width, height)?))
    }
}

fn stitch_tiles<P: Copy + Default>(
    tiles: &[ImgVec<P>],
    columns: usize,
    width: usize,
    height: usize,
) -> Result<ImgVec<P>> {
    let (tile_w, tile_h) = match tiles.first() {
        Some(t) => (t.width(), t.height()),
        None => return Err(at(Error::Decode("grid has no tiles".into()))),
    };
    if columns == 0 || tiles.iter().any(|t| t.width() != tile_w || t.height() != tile_h) {
        return Err(at(Error::Unsupported("grid tiles differ in size")));
    }
    let mut canvas = ImgVec::new(vec![P::default(); width * height], width, height);
    for (i, tile) in tiles.iter().enumerate() {
        let x0 = (i % columns) * tile_w;
        let y0 = (i / columns) * tile_h;
        if x0 >= width || y0 >= height {
            continue;
        }
        let copy_w = tile_w.min(width - x0);
        for (dy, src) in tile.rows().take(height - y0).enumerate() {
            let start = (y0 + dy) * width + x0;
            canvas.buf_mut()[start..start + copy_w].copy_from_slice(&src[..copy_w]);
        }
    }
    Ok(canvas)
}

/// BT.601 full-range planes for 10-bit targets, which the yuv crate has
/// no 8-bit-input kernel for
fn bt601_sample(r: u8, g: u8, b: u8, depth: u8) -> [u16; 3] {
    const KR: f32 = 0.299;
    const KB: f32 = 0.114;
    const KG: f32 = 1.0 - KR - KB;
    let max = ((1u32 << depth) - 1) as f32;
    let bias = (1u32 << (depth - 1)) as f32;
    let (r, g, b) = (f32::from(r) / 255.0, f32::from(g) / 255.0, f32::from(b) / 255.0);
    let y = KR * r + KG * g + KB * b;
    let cb = (b - y) / (2.0 * (1.0 - KB));
    let cr = (r - y) / (2.0 * (1.0 - KR));
    [
        (y * max).round().clamp(0.0, max) as u16,
        (cb * max + bias).round().clamp(0.0, max) as u16,
        (cr * max + bias).round().clamp(0.0, max) as u16,
    ]
}

/// 8-bit BT.601 full-range planes through the yuv crate
fn bt601_planes_8(input: &RgbInput<'_>, rows: &[u8]) -> Result<Vec<[u16; 3]>> {
    let too_large = || at(Error::Unsupported("image too large for color conversion"));
    let width = u32::try_from(input.width).map_err(|_| too_large())?;
    let height = u32::try_from(input.height).map_err(|_| too_large())?;
    let stride = u32::try_from(input.stride).map_err(|_| too_large())?;

    let mut planar = YuvPlanarImageMut::<u8>::alloc(width, height, YuvChromaSubsampling::Yuv444);
    let status = if input.has_alpha {
        yuv::rgba_to_yuv444(
            &mut planar,
            rows,
            stride,
            YuvRange::Full,
            YuvStandardMatrix::Bt601,
            YuvConversionMode::Balanced,
        )
    } else {
        yuv::rgb_to_yuv444(
            &mut planar,
            rows,
            stride,
            YuvRange::Full,
            YuvStandardMatrix::Bt601,
            YuvConversionMode::Balanced,
        )
    };
    status.map_err(|e| at(Error::ColorConversion(e)))?;

    let y = planar.y_plane.borrow();
    let u = planar.u_plane.borrow();
    let v = planar.v_plane.borrow();
    Ok(y.iter()
        .zip(u)
        .zip(v)
        .map(|((&y, &u), &v)| [u16::from(y), u16::from(u), u16::from(v)])
        .collect())
}

/// Fill `target` with the 4:4:4 coded form of `input`
///
/// `target` supplies geometry, depth and matrix; its planes (and alpha when
/// `input.has_alpha`) are overwritten. Rows are read at `input.stride`, so
/// padding between rows is skipped.
pub fn rgb_to_yuv(input: &RgbInput<'_>, target: &mut YuvImage) -> Result<()> {
    if input.width == 0 || input.height == 0 {
        return Err(at(Error::InvalidDimensions {
            width: u32::try_from(input.width).unwrap_or(u32::MAX),
            height: u32::try_from(input.height).unwrap_or(u32::MAX),
        }));
    }
    if target.width != input.width || target.height != input.height {
        return Err(at(Error::Unsupported("target image size differs from input")));
    }
    if !matches!(target.depth, 8 | 10) {
        return Err(at(Error::Unsupported("encoder planes must be 8 or 10 bits")));
    }
    let bpp = input.bytes_per_pixel();
    let row_bytes = input.row_bytes().ok_or_else(|| {
        at(Error::BufferTooShort {
            needed: usize::MAX,
            actual: input.data.len(),
        })
    })?;
    let needed = input.height.checked_mul(input.stride).unwrap_or(usize::MAX);
    if input.stride < row_bytes || input.data.len() < needed {
        return Err(at(Error::BufferTooShort {
            needed,
            actual: input.data.len(),
        }));
    }

    let depth = target.depth;
    let data = &input.data[..needed];
    let rows = Img::new_stride(data, row_bytes, input.height, input.stride);
    let count = input.width * input.height;

    let alpha = input.has_alpha.then(|| {
        rows.rows()
            .flat_map(|row| row.chunks_exact(bpp).map(|px| up_from_8(px[3], depth)))
            .collect::<Vec<_>>()
    });
    let planes = match target.matrix {
        EncodeMatrix::Bt601 if depth == 8 => bt601_planes_8(input, data)?,
        matrix => {
            let mut planes = Vec::with_capacity(count);
            for row in rows.rows() {
                for px in row.chunks_exact(bpp) {
                    let (r, g, b) = (px[0], px[1], px[2]);
                    planes.push(match matrix {
                        EncodeMatrix::Identity => {
                            [up_from_8(g, depth), up_from_8(b, depth), up_from_8(r, depth)]
                        }
                        EncodeMatrix::Bt601 => bt601_sample(r, g, b, depth),
                    });
                }
            }
            planes
        }
    };

    target.pixels = planes;
    target.alpha = alpha;
    Ok(())
}

/// Pack decoded pixels into ARGB words, `(a << 24) | (r << 16) | (g << 8) | b`
///
/// RGB input gets a = 255.
pub fn pack_argb(pixels: &RgbPixels) -> Vec<u32> {
    #[inline]
    fn argb(a: u8, r: u8, g: u8, b: u8) -> u32 {
        (u32::from(a) << 24) | (u32::from(r) << 16) | (u32::from(g) << 8) | u32::from(b)
    }
    match pixels {
        RgbPixels::Rgb8(img) => img.buf().iter().map(|p| argb(255, p.r, p.g, p.b)).collect(),
        RgbPixels::Rgba8(img) => img.buf().iter().map(|p| argb(p.a, p.r, p.g, p.b)).collect(),
    }
}

/// Split ARGB words into interleaved RGB or RGBA bytes
pub fn unpack_argb(pixels: &[u32], with_alpha: bool) -> Vec<u8> {
    if with_alpha {
        let rgba: Vec<Rgba<u8>> = pixels
            .iter()
            .map(|&p| Rgba {
                r: (p >> 16) as u8,
                g: (p >> 8) as u8,
                b: p as u8,
                a: (p >> 24) as u8,
            })
            .collect();
        rgba.as_bytes().to_vec()
    } else {
        let rgb: Vec<Rgb<u8>> = pixels
            .iter()
            .map(|&p| Rgb {
                r: (p >> 16) as u8,
                g: (p >> 8) as u8,
                b: p as u8,
            })
            .collect();
        rgb.as_bytes().to_vec()
    }
}
