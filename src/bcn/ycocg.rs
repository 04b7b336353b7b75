use super::color::{lerp13, pack_rgb565};
use super::BLOCK_BYTES;

const INSET_SHIFT: i32 = 4;

fn chroma_min_max(block: &[u8; BLOCK_BYTES]) -> ([u8; 3], [u8; 3]) {
    let mut min = [0, 255, 255];
    let mut max = [0, 0, 0];

    for texel in block.chunks_exact(4) {
        min[2] = min[2].min(texel[2]);
        min[1] = min[1].min(texel[1]);
        max[2] = max[2].max(texel[2]);
        max[1] = max[1].max(texel[1]);
    }

    (min, max)
}

/// Expands the chroma range around the neutral midpoint by the largest
/// power of two scale that still fits, recording `scale - 1` in the spare
/// low bits of the blue channel of both endpoints.
fn scale_chroma(block: &mut [u8; BLOCK_BYTES], min: &mut [u8; 3], max: &mut [u8; 3]) {
    let m = (min[2] as i32 - 128)
        .abs()
        .max((min[1] as i32 - 128).abs())
        .max((max[2] as i32 - 128).abs())
        .max((max[1] as i32 - 128).abs());

    let scale = if m <= 31 {
        4
    } else if m <= 63 {
        2
    } else {
        1
    };

    min[2] = ((min[2] as i32 - 128) * scale + 128) as u8;
    min[1] = ((min[1] as i32 - 128) * scale + 128) as u8;
    min[0] = ((scale - 1) << 3) as u8;

    max[2] = ((max[2] as i32 - 128) * scale + 128) as u8;
    max[1] = ((max[1] as i32 - 128) * scale + 128) as u8;
    max[0] = ((scale - 1) << 3) as u8;

    for texel in block.chunks_exact_mut(4) {
        texel[2] = ((texel[2] as i32 - 128) * scale + 128) as u8;
        texel[1] = ((texel[1] as i32 - 128) * scale + 128) as u8;
    }
}

/// Insets the chroma bounding box to reduce ringing and snaps the corners
/// to the 5/6 bit grid.
fn inset_chroma_bbox(min: &mut [u8; 3], max: &mut [u8; 3]) {
    let inset2 = (max[2] as i32 - min[2] as i32) - ((1 << (INSET_SHIFT - 1)) - 1);
    let inset1 = (max[1] as i32 - min[1] as i32) - ((1 << (INSET_SHIFT - 1)) - 1);

    let mini2 = (((min[2] as i32) << INSET_SHIFT) + inset2) >> INSET_SHIFT;
    let mini1 = (((min[1] as i32) << INSET_SHIFT) + inset1) >> INSET_SHIFT;

    let maxi2 = (((max[2] as i32) << INSET_SHIFT) - inset2) >> INSET_SHIFT;
    let maxi1 = (((max[1] as i32) << INSET_SHIFT) - inset1) >> INSET_SHIFT;

    let mini2 = mini2.max(0);
    let mini1 = mini1.max(0);

    let maxi2 = maxi2.min(255);
    let maxi1 = maxi1.min(255);

    min[2] = ((mini2 & 0xf8) | (mini2 >> 5)) as u8;
    min[1] = ((mini1 & 0xfc) | (mini1 >> 6)) as u8;

    max[2] = ((maxi2 & 0xf8) | (maxi2 >> 5)) as u8;
    max[1] = ((maxi1 & 0xfc) | (maxi1 >> 6)) as u8;
}

/// Picks the inscribed diagonal that most texels agree with, swapping the
/// green endpoint channel when more than half fall on the wrong side.
/// A degenerate box keeps the current diagonal.
fn select_chroma_diagonal(block: &[u8; BLOCK_BYTES], min: &mut [u8; 3], max: &mut [u8; 3]) {
    let mid2 = ((min[2] as i32 + max[2] as i32 + 1) >> 1) as u8;
    let mid1 = ((min[1] as i32 + max[1] as i32 + 1) >> 1) as u8;

    let mut side = 0;
    for texel in block.chunks_exact(4) {
        let b0 = texel[2] >= mid2;
        let b1 = texel[1] >= mid1;
        side += u32::from(b0 ^ b1);
    }

    if side > 8 && min[2] != max[2] {
        std::mem::swap(&mut min[1], &mut max[1]);
    }
}

/// Encodes one 8 byte color block from the chroma channels of a
/// luma-chroma block.
pub(super) fn encode_ycocg_block(dst: &mut [u8], block: &mut [u8; BLOCK_BYTES]) {
    let (mut min, mut max) = chroma_min_max(block);
    scale_chroma(block, &mut min, &mut max);
    inset_chroma_bbox(&mut min, &mut max);
    select_chroma_diagonal(block, &mut min, &mut max);

    let mut colors = [[0u8; 3]; 4];
    colors[0] = max;
    colors[1] = min;
    lerp13(&mut colors[2], &max, &min);
    lerp13(&mut colors[3], &min, &max);

    let mut mask = 0u32;
    for (i, texel) in block.chunks_exact(4).enumerate() {
        let c0 = texel[2] as i32;
        let c1 = texel[1] as i32;

        let d = colors.map(|c| (c[2] as i32 - c0).abs() + (c[1] as i32 - c1).abs());

        let b0 = d[0] > d[3];
        let b1 = d[1] > d[2];
        let b2 = d[0] > d[2];
        let b3 = d[1] > d[3];
        let b4 = d[2] > d[3];

        let x0 = b1 & b2;
        let x1 = b0 & b3;
        let x2 = b0 & b4;

        let idx = (x2 as u32) | (((x0 | x1) as u32) << 1);
        mask |= idx << (2 * i);
    }

    dst[0..2].copy_from_slice(&pack_rgb565(&colors[0]).to_le_bytes());
    dst[2..4].copy_from_slice(&pack_rgb565(&colors[1]).to_le_bytes());
    dst[4..8].copy_from_slice(&mask.to_le_bytes());
}
