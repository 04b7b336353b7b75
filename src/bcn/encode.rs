use super::{alpha, color, extract_block, ycocg, BLOCK_BYTES, BLOCK_HEIGHT, BLOCK_WIDTH, CHANNELS};
use crate::{mip_size, EncodeOptions, Format, SurfaceError};

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Compresses a BGRA8 mipmap chain into `dst`.
///
/// Buffer lengths and dimensions are validated by the caller.
pub(crate) fn compress_surface(
    dst: &mut [u8],
    src: &[u8],
    format: Format,
    width: u32,
    height: u32,
    mipmaps: u32,
    options: EncodeOptions,
) -> Result<(), SurfaceError> {
    let mut src_offset = 0;
    let mut dst_offset = 0;
    let mut w = width;
    let mut h = height;

    for _ in 0..mipmaps {
        let compressed = mip_size(w, h, format).ok_or(SurfaceError::PixelCountWouldOverflow {
            width: w,
            height: h,
        })?;
        let uncompressed = w as usize * h as usize * CHANNELS;

        compress_level(
            &mut dst[dst_offset..dst_offset + compressed],
            &src[src_offset..src_offset + uncompressed],
            format,
            w as usize,
            h as usize,
            options,
        );

        src_offset += uncompressed;
        dst_offset += compressed;
        w = (w >> 1).max(1);
        h = (h >> 1).max(1);
    }

    Ok(())
}

fn compress_level(
    dst: &mut [u8],
    src: &[u8],
    format: Format,
    width: usize,
    height: usize,
    options: EncodeOptions,
) {
    let metric = options.metric;

    match format {
        Format::Bc1 => for_each_block(dst, src, width, height, 8, |out, block| {
            color::encode_color_block(out, &block, true, metric);
        }),
        Format::Bc2 => for_each_block(dst, src, width, height, 16, |out, block| {
            alpha::encode_flat_alpha(&mut out[..8], &block);
            color::encode_color_block(&mut out[8..], &block, false, metric);
        }),
        Format::Bc4 => for_each_block(dst, src, width, height, 8, |out, block| {
            alpha::encode_gradient(out, &block, 2);
        }),
        Format::Bc5 => for_each_block(dst, src, width, height, 16, |out, block| {
            alpha::encode_gradient(&mut out[..8], &block, 1);
            alpha::encode_gradient(&mut out[8..], &block, 2);
        }),
        Format::YcocgScaled => for_each_block(dst, src, width, height, 16, |out, mut block| {
            alpha::encode_gradient(&mut out[..8], &block, 3);
            ycocg::encode_ycocg_block(&mut out[8..], &mut block);
        }),
        // Every remaining format carries a DXT5 style record.
        _ => for_each_block(dst, src, width, height, 16, |out, block| {
            alpha::encode_gradient(&mut out[..8], &block, 3);
            color::encode_color_block(&mut out[8..], &block, false, metric);
        }),
    }
}

/// Runs the block encoder over every 4x4 block of the level. Each row of
/// blocks writes a disjoint range of `dst`, so rows can encode in parallel.
fn for_each_block<F>(
    dst: &mut [u8],
    src: &[u8],
    width: usize,
    height: usize,
    block_size: usize,
    encode: F,
) where
    F: Fn(&mut [u8], [u8; BLOCK_BYTES]) + Send + Sync,
{
    let blocks_x = (width + BLOCK_WIDTH - 1) / BLOCK_WIDTH;
    let row_size = blocks_x * block_size;

    #[cfg(feature = "rayon")]
    let rows = dst.par_chunks_mut(row_size);
    #[cfg(not(feature = "rayon"))]
    let rows = dst.chunks_mut(row_size);

    rows.enumerate().for_each(|(by, row)| {
        let y = by * BLOCK_HEIGHT;
        for (bx, out) in row.chunks_mut(block_size).enumerate() {
            let block = extract_block(src, bx * BLOCK_WIDTH, y, width, height);
            encode(out, block);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorMetric;

    fn checker(width: usize, height: usize) -> Vec<u8> {
        let mut data = Vec::with_capacity(width * height * 4);
        for y in 0..height {
            for x in 0..width {
                if (x + y) % 2 == 0 {
                    data.extend_from_slice(&[0, 0, 0, 255]);
                } else {
                    data.extend_from_slice(&[255, 255, 255, 255]);
                }
            }
        }
        data
    }

    #[test]
    fn bc1_level_block_layout() {
        let src = checker(8, 4);
        let mut dst = [0u8; 16];
        compress_level(
            &mut dst,
            &src,
            Format::Bc1,
            8,
            4,
            EncodeOptions::default(),
        );

        // Two blocks of identical content encode identically.
        assert_eq!(&dst[..8], &dst[8..]);
        assert_ne!(&dst[..8], &[0u8; 8]);
    }

    #[test]
    fn bc5_encodes_independent_planes() {
        // Green and red channels hold different gradients.
        let mut src = vec![0u8; 4 * 4 * 4];
        for (i, texel) in src.chunks_exact_mut(4).enumerate() {
            texel[1] = (i * 16) as u8;
            texel[2] = 255 - (i * 16) as u8;
            texel[3] = 255;
        }

        let mut dst = [0u8; 16];
        compress_level(
            &mut dst,
            &src,
            Format::Bc5,
            4,
            4,
            EncodeOptions::default(),
        );

        // First block holds the green plane, second the red plane.
        assert_eq!(dst[0], 240);
        assert_eq!(dst[1], 0);
        assert_eq!(dst[8], 255);
        assert_eq!(dst[9], 15);
    }

    #[test]
    fn mip_chain_advances_offsets() {
        let width = 8;
        let height = 8;
        let mipmaps = 4;

        // Concatenated 8x8, 4x4, 2x2, 1x1 levels.
        let mut src = Vec::new();
        for level in 0..mipmaps {
            let w = (width >> level).max(1) as usize;
            let h = (height >> level).max(1) as usize;
            src.extend(std::iter::repeat([255u8, 255, 255, 255]).take(w * h).flatten());
        }

        let total = crate::mipmapped_size(width, height, mipmaps, Format::Bc1).unwrap();
        let mut dst = vec![0u8; total];
        compress_surface(
            &mut dst,
            &src,
            Format::Bc1,
            width,
            height,
            mipmaps,
            EncodeOptions::default(),
        )
        .unwrap();

        // Uniform white takes the single color path in every level,
        // including the 1x1 edge replicated block at the end.
        assert_eq!(&dst[48..50], &0xffffu16.to_le_bytes());
        assert_eq!(&dst[52..56], &0xaaaa_aaaau32.to_le_bytes());
    }

    #[test]
    fn metric_changes_encoding_choices() {
        let mut src = vec![0u8; 4 * 4 * 4];
        for (i, texel) in src.chunks_exact_mut(4).enumerate() {
            // Mixed colors so the perceptual weights can matter.
            texel[0] = (i * 15) as u8;
            texel[1] = 255 - (i * 13) as u8;
            texel[2] = (i * 7) as u8;
            texel[3] = 255;
        }

        let mut uniform = [0u8; 8];
        let mut perceptual = [0u8; 8];
        compress_level(
            &mut uniform,
            &src,
            Format::Bc1,
            4,
            4,
            EncodeOptions {
                metric: ErrorMetric::Uniform,
            },
        );
        compress_level(
            &mut perceptual,
            &src,
            Format::Bc1,
            4,
            4,
            EncodeOptions {
                metric: ErrorMetric::Perceptual,
            },
        );

        // Both are valid encodings of the same block; the index grids
        // need not match, but the headers must be well formed.
        assert_ne!(&uniform, &[0u8; 8]);
        assert_ne!(&perceptual, &[0u8; 8]);
    }
}
