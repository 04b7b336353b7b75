mod alpha;
mod color;
mod math;
mod ycocg;

pub mod decode;
pub mod encode;

pub(crate) const BLOCK_WIDTH: usize = 4;
pub(crate) const BLOCK_HEIGHT: usize = 4;
pub(crate) const CHANNELS: usize = 4;

/// Bytes in one uncompressed 4x4 BGRA block.
pub(crate) const BLOCK_BYTES: usize = BLOCK_WIDTH * BLOCK_HEIGHT * CHANNELS;

// Row and column remap for partial edge blocks, indexed by
// (valid texels - 1) * 4 + position. Out of range positions repeat
// the last valid row or column.
const EDGE_REMAP: [usize; 16] = [
    0, 0, 0, 0, //
    0, 1, 0, 1, //
    0, 1, 2, 0, //
    0, 1, 2, 3, //
];

/// Reads the 4x4 BGRA block at `(x, y)`, replicating edge texels when the
/// surface dimensions are not multiples of the block dimensions.
pub(crate) fn extract_block(
    src: &[u8],
    x: usize,
    y: usize,
    width: usize,
    height: usize,
) -> [u8; BLOCK_BYTES] {
    let mut block = [0u8; BLOCK_BYTES];

    let bw = (width - x).min(BLOCK_WIDTH);
    let bh = (height - y).min(BLOCK_HEIGHT);

    for i in 0..BLOCK_HEIGHT {
        let by = EDGE_REMAP[(bh - 1) * 4 + i] + y;
        for j in 0..BLOCK_WIDTH {
            let bx = EDGE_REMAP[(bw - 1) * 4 + j] + x;
            let texel = (by * width + bx) * CHANNELS;
            let out = i * BLOCK_WIDTH * CHANNELS + j * CHANNELS;
            block[out..out + CHANNELS].copy_from_slice(&src[texel..texel + CHANNELS]);
        }
    }

    block
}

/// Scatters a decoded 4x4 block into the surface, writing `bytes_per_pixel`
/// channels per texel and clipping to the surface extent.
pub(crate) fn put_block(
    dst: &mut [u8],
    block: &[u8; BLOCK_BYTES],
    bx: usize,
    by: usize,
    width: usize,
    height: usize,
    bytes_per_pixel: usize,
) {
    for y in 0..BLOCK_HEIGHT {
        if by + y >= height {
            break;
        }
        let mut d = ((by + y) * width + bx) * bytes_per_pixel;
        for x in 0..BLOCK_WIDTH {
            if bx + x >= width {
                break;
            }
            let texel = y * BLOCK_WIDTH * CHANNELS + x * CHANNELS;
            dst[d..d + bytes_per_pixel].copy_from_slice(&block[texel..texel + bytes_per_pixel]);
            d += bytes_per_pixel;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bgra_surface(width: usize, height: usize) -> Vec<u8> {
        // Each texel encodes its own coordinates for easy assertions.
        let mut data = Vec::with_capacity(width * height * CHANNELS);
        for y in 0..height {
            for x in 0..width {
                data.extend_from_slice(&[x as u8, y as u8, 0, 255]);
            }
        }
        data
    }

    #[test]
    fn extract_block_interior() {
        let src = bgra_surface(8, 8);
        let block = extract_block(&src, 4, 4, 8, 8);
        for i in 0..4 {
            for j in 0..4 {
                let texel = i * 16 + j * 4;
                assert_eq!(&block[texel..texel + 4], &[4 + j as u8, 4 + i as u8, 0, 255]);
            }
        }
    }

    #[test]
    fn extract_block_replicates_edges() {
        // The source slice is sized exactly, so any out of bounds read panics.
        let src = bgra_surface(5, 5);
        let block = extract_block(&src, 4, 4, 5, 5);
        for texel in block.chunks_exact(4) {
            assert_eq!(texel, &[4, 4, 0, 255]);
        }
    }

    #[test]
    fn extract_block_replicates_partial_columns() {
        let src = bgra_surface(6, 4);
        let block = extract_block(&src, 4, 0, 6, 4);
        for i in 0..4 {
            for j in 0..4 {
                let texel = i * 16 + j * 4;
                // Two valid columns remain, repeating 0, 1, 0, 1.
                let x = 4 + [0, 1, 0, 1][j];
                assert_eq!(&block[texel..texel + 4], &[x as u8, i as u8, 0, 255]);
            }
        }
    }

    #[test]
    fn put_block_clips_to_surface() {
        let mut dst = vec![0u8; 5 * 5 * 4];
        let block = [200u8; BLOCK_BYTES];
        put_block(&mut dst, &block, 4, 4, 5, 5, 4);

        for y in 0..5 {
            for x in 0..5 {
                let texel = (y * 5 + x) * 4;
                let expected = if x == 4 && y == 4 { 200 } else { 0 };
                assert_eq!(dst[texel], expected, "texel ({x}, {y})");
            }
        }
    }

    #[test]
    fn put_block_partial_channels() {
        let mut dst = vec![0u8; 4 * 4 * 2];
        let mut block = [0u8; BLOCK_BYTES];
        for (i, texel) in block.chunks_exact_mut(4).enumerate() {
            texel.copy_from_slice(&[i as u8, 100 + i as u8, 200, 255]);
        }
        put_block(&mut dst, &block, 0, 0, 4, 4, 2);

        for i in 0..16 {
            assert_eq!(dst[i * 2], i as u8);
            assert_eq!(dst[i * 2 + 1], 100 + i as u8);
        }
    }
}
