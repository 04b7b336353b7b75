//! Compress and decompress DXTn/BCn texture data.
//!
//! Surfaces are processed as 4x4 texel blocks. Compression consumes BGRA8
//! pixels (1, 2 and 3 channel sources are promoted first) and produces the
//! standardized BC1-BC5 block layouts, including the scaled YCoCg variant
//! used for high quality color. Decompression inverts each format back to
//! RGBA ordered pixels and can reconstruct normal map z channels.
//!
//! ```
//! use dxtn::{compress, decompress, EncodeOptions, Format};
//!
//! let bgra = vec![255u8; 4 * 4 * 4];
//! let mut blocks = vec![0u8; dxtn::mip_size(4, 4, Format::Bc1).unwrap()];
//! compress(&mut blocks, &bgra, Format::Bc1, 4, 4, 4, 1, EncodeOptions::default())?;
//!
//! let mut rgba = vec![0u8; 4 * 4 * 4];
//! decompress(&mut rgba, &blocks, Format::Bc1, 4, 4, 4, false)?;
//! # Ok::<(), dxtn::SurfaceError>(())
//! ```

mod bcn;
mod error;
mod rgba;

pub use error::SurfaceError;

/// Supported block compression formats.
///
/// The DXT5 based variants ([Format::Bc3Normal], [Format::Rxgb],
/// [Format::Aexp], [Format::Ycocg]) share the BC3 block layout and differ
/// only in how the channels are interpreted by consumers.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
#[cfg_attr(feature = "strum", derive(strum::EnumIter))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Format {
    Bc1,
    Bc2,
    Bc3,
    /// BC3 with the x channel swizzled into alpha for normal maps.
    Bc3Normal,
    Bc4,
    Bc5,
    /// BC3 with red carried in alpha.
    Rxgb,
    /// BC3 with an exponent carried in alpha.
    Aexp,
    /// BC3 carrying YCoCg data without chroma scaling.
    Ycocg,
    /// BC3 carrying YCoCg data with a per block chroma scale.
    YcocgScaled,
}

impl Format {
    /// The size in bytes of one compressed 4x4 block.
    pub const fn block_size_in_bytes(&self) -> usize {
        match self {
            Format::Bc1 | Format::Bc4 => 8,
            _ => 16,
        }
    }
}

/// The error metric used when fitting color endpoints.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorMetric {
    Uniform,
    /// Weight channel errors by perceived brightness.
    #[default]
    Perceptual,
}

/// Additional compressor parameters.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EncodeOptions {
    pub metric: ErrorMetric,
}

/// The maximum number of mipmaps for a surface with the given dimension.
pub fn max_mipmap_count(max_dimension: u32) -> u32 {
    // log2(x) + 1
    u32::BITS - max_dimension.leading_zeros()
}

/// The dimension of the given mip level, halving and flooring to 1.
pub fn mip_dimension(dimension: u32, mipmap: u32) -> u32 {
    (dimension >> mipmap).max(1)
}

/// The compressed size in bytes of a single mip level.
///
/// Returns [None] on arithmetic overflow.
pub fn mip_size(width: u32, height: u32, format: Format) -> Option<usize> {
    div_round_up(width as usize, bcn::BLOCK_WIDTH)
        .checked_mul(div_round_up(height as usize, bcn::BLOCK_HEIGHT))?
        .checked_mul(format.block_size_in_bytes())
}

/// The combined compressed size in bytes of `mipmaps` mip levels.
///
/// Returns [None] on arithmetic overflow.
pub fn mipmapped_size(width: u32, height: u32, mipmaps: u32, format: Format) -> Option<usize> {
    let mut total = 0usize;
    for mipmap in 0..mipmaps {
        let size = mip_size(
            mip_dimension(width, mipmap),
            mip_dimension(height, mipmap),
            format,
        )?;
        total = total.checked_add(size)?;
    }
    Some(total)
}

fn texel_count(width: u32, height: u32, mipmaps: u32) -> Option<usize> {
    let mut total = 0usize;
    for mipmap in 0..mipmaps {
        let texels = (mip_dimension(width, mipmap) as usize)
            .checked_mul(mip_dimension(height, mipmap) as usize)?;
        total = total.checked_add(texels)?;
    }
    Some(total)
}

fn div_round_up(x: usize, d: usize) -> usize {
    (x + d - 1) / d
}

/// Compresses a mipmap chain of `src` pixels to `format` blocks in `dst`.
///
/// `src` holds the mip levels concatenated from largest to smallest with
/// `bytes_per_pixel` of 1 (gray), 2 (gray + alpha), 3 (RGB) or 4 (BGRA);
/// smaller layouts are promoted to BGRA before block processing.
/// `dst` must have space for [mipmapped_size] bytes.
pub fn compress(
    dst: &mut [u8],
    src: &[u8],
    format: Format,
    width: u32,
    height: u32,
    bytes_per_pixel: u32,
    mipmaps: u32,
    options: EncodeOptions,
) -> Result<(), SurfaceError> {
    if width == 0 || height == 0 {
        return Err(SurfaceError::ZeroSizedSurface { width, height });
    }

    if !(1..=4).contains(&bytes_per_pixel) {
        return Err(SurfaceError::UnsupportedBytesPerPixel { bytes_per_pixel });
    }

    let max_mipmaps = max_mipmap_count(width.max(height));
    if mipmaps == 0 || mipmaps > max_mipmaps {
        return Err(SurfaceError::UnexpectedMipmapCount {
            mipmaps,
            max_mipmaps,
        });
    }

    let texels = texel_count(width, height, mipmaps)
        .ok_or(SurfaceError::PixelCountWouldOverflow { width, height })?;

    let expected_src = texels
        .checked_mul(bytes_per_pixel as usize)
        .ok_or(SurfaceError::PixelCountWouldOverflow { width, height })?;
    if src.len() < expected_src {
        return Err(SurfaceError::NotEnoughData {
            expected: expected_src,
            actual: src.len(),
        });
    }

    let expected_dst = mipmapped_size(width, height, mipmaps, format)
        .ok_or(SurfaceError::PixelCountWouldOverflow { width, height })?;
    if dst.len() < expected_dst {
        return Err(SurfaceError::NotEnoughData {
            expected: expected_dst,
            actual: dst.len(),
        });
    }

    let bgra = rgba::bgra8_from_source(&src[..expected_src], bytes_per_pixel);
    bcn::encode::compress_surface(dst, &bgra, format, width, height, mipmaps, options)
}

/// Decompresses a single mip level of `format` blocks to RGBA ordered
/// pixels, writing `bytes_per_pixel` channels per texel.
///
/// When `normal_map` is set, the z channel is reconstructed from the two
/// stored channels for the normal carrying formats.
pub fn decompress(
    dst: &mut [u8],
    src: &[u8],
    format: Format,
    width: u32,
    height: u32,
    bytes_per_pixel: u32,
    normal_map: bool,
) -> Result<(), SurfaceError> {
    if width == 0 || height == 0 {
        return Err(SurfaceError::ZeroSizedSurface { width, height });
    }

    if !(1..=4).contains(&bytes_per_pixel) {
        return Err(SurfaceError::UnsupportedBytesPerPixel { bytes_per_pixel });
    }

    let expected_src = mip_size(width, height, format)
        .ok_or(SurfaceError::PixelCountWouldOverflow { width, height })?;
    if src.len() < expected_src {
        return Err(SurfaceError::NotEnoughData {
            expected: expected_src,
            actual: src.len(),
        });
    }

    let expected_dst = (width as usize)
        .checked_mul(height as usize)
        .and_then(|texels| texels.checked_mul(bytes_per_pixel as usize))
        .ok_or(SurfaceError::PixelCountWouldOverflow { width, height })?;
    if dst.len() < expected_dst {
        return Err(SurfaceError::NotEnoughData {
            expected: expected_dst,
            actual: dst.len(),
        });
    }

    bcn::decode::decompress_surface(
        dst,
        src,
        format,
        width as usize,
        height as usize,
        bytes_per_pixel as usize,
        normal_map,
    );
    Ok(())
}
