use std::sync::OnceLock;

use super::math::Vec4;
use super::BLOCK_BYTES;
use crate::ErrorMetric;

const GRID: Vec4 = Vec4::new(31.0, 63.0, 31.0, 0.0);
const GRID_RCP: Vec4 = Vec4::new(1.0 / 31.0, 1.0 / 63.0, 1.0 / 31.0, 0.0);
const HALF: Vec4 = Vec4::splat(0.5);
const EPSILON: f32 = 1e-4;

const MAX_ITERATIONS: usize = 4;

fn metric_weights(metric: ErrorMetric) -> Vec4 {
    match metric {
        ErrorMetric::Uniform => Vec4::new(1.0, 1.0, 1.0, 0.0),
        ErrorMetric::Perceptual => Vec4::new(0.2126, 0.7152, 0.0722, 0.0),
    }
}

/// Snaps endpoint components to the 5/6/5 color grid.
fn quantize565(v: Vec4) -> Vec4 {
    (GRID * v + HALF).trunc() * GRID_RCP
}

pub(super) fn mul8bit(a: i32, b: i32) -> i32 {
    let t = a * b + 128;
    (t + (t >> 8)) >> 8
}

/// Packs an 8-bit BGR color to RGB565 with correct rounding.
pub(super) fn pack_rgb565(c: &[u8]) -> u16 {
    ((mul8bit(c[2] as i32, 31) << 11) | (mul8bit(c[1] as i32, 63) << 5) | mul8bit(c[0] as i32, 31))
        as u16
}

/// Unpacks RGB565 to 8-bit BGR with bit replication.
fn unpack_rgb565(dst: &mut [u8; 3], v: u16) {
    let r = (v >> 11) & 0x1f;
    let g = (v >> 5) & 0x3f;
    let b = v & 0x1f;

    dst[0] = ((b << 3) | (b >> 2)) as u8;
    dst[1] = ((g << 2) | (g >> 4)) as u8;
    dst[2] = ((r << 3) | (r >> 2)) as u8;
}

/// Interpolates at the 1/3 point between `a` and `b` with the truncating
/// `(2a + b) / 3` from the S3TC specification.
pub(super) fn lerp13(dst: &mut [u8; 3], a: &[u8; 3], b: &[u8; 3]) {
    dst[0] = ((2 * a[0] as u16 + b[0] as u16) / 3) as u8;
    dst[1] = ((2 * a[1] as u16 + b[1] as u16) / 3) as u8;
    dst[2] = ((2 * a[2] as u16 + b[2] as u16) / 3) as u8;
}

fn bgr24(block: &[u8; BLOCK_BYTES], texel: usize) -> u32 {
    u32::from_le_bytes([block[texel * 4], block[texel * 4 + 1], block[texel * 4 + 2], 0])
}

/// Per block working set for fitting two color endpoints to 16 texels.
pub(super) struct ColorBlock {
    points: [Vec4; 16],
    metric: Vec4,
    max: Vec4,
    min: Vec4,
    alpha_mask: u32,
    single: bool,
}

impl ColorBlock {
    fn new(block: &[u8; BLOCK_BYTES], punch_through: bool, metric: ErrorMetric) -> Self {
        let mut alpha_mask = 0u32;
        let mut single = true;
        let mut points = [Vec4::ZERO; 16];

        let c0 = bgr24(block, 0);
        for i in 0..16 {
            if punch_through && block[4 * i + 3] < 128 {
                alpha_mask |= 3 << (2 * i);
            }

            points[i] = Vec4::new(
                block[4 * i] as f32 / 255.0,
                block[4 * i + 1] as f32 / 255.0,
                block[4 * i + 2] as f32 / 255.0,
                0.0,
            );

            single &= bgr24(block, i) == c0;
        }

        // Bounding box extents.
        let mut min = Vec4::splat(1.0);
        let mut max = Vec4::ZERO;
        for p in &points {
            min = min.min(*p);
            max = max.max(*p);
        }

        // Select the diagonal tracking the dominant color variation.
        let center = (max + min) * HALF;
        let mut cov = Vec4::ZERO;
        for p in &points {
            let t = *p - center;
            cov += t * t.splat_z();
        }
        if cov.x < 0.0 {
            std::mem::swap(&mut max.x, &mut min.x);
        }
        if cov.y < 0.0 {
            std::mem::swap(&mut max.y, &mut min.y);
        }

        // Inset the box to counter quantization bias.
        let inset = (max - min) * (1.0 / 16.0);
        let max = (max - inset).clamp01();
        let min = (min + inset).clamp01();

        Self {
            points,
            metric: metric_weights(metric),
            max: quantize565(max),
            min: quantize565(min),
            alpha_mask,
            single,
        }
    }

    /// Fits a 3 color palette (max, min, midpoint), reserving index 3 for
    /// punch-through texels. Returns the best index grid found and leaves
    /// the best endpoints in `self`.
    fn compress3(&mut self) -> u32 {
        let mut best_error = f32::MAX;
        let mut best_iteration = 0;
        let mut best_indices = 0u32;

        let mut max = self.max;
        let mut min = self.min;

        let mut iteration = 0;
        loop {
            let palette = [max, min, (max + min) * HALF];

            let mut indices = 0u32;
            let mut error = 0.0f32;

            for i in 0..16 {
                if (self.alpha_mask >> (2 * i)) & 3 == 3 {
                    indices |= 3 << (2 * i);
                    continue;
                }

                let t0 = (self.points[i] - palette[0]) * self.metric;
                let t1 = (self.points[i] - palette[1]) * self.metric;
                let t2 = (self.points[i] - palette[2]) * self.metric;
                let d = [t0.dot(t0), t1.dot(t1), t2.dot(t2)];

                let idx = if d[0] < d[1] && d[0] < d[2] {
                    0
                } else if d[1] < d[2] {
                    1
                } else {
                    2
                };

                indices |= (idx as u32) << (2 * i);
                error += d[idx];
            }

            if error < best_error {
                best_error = error;
                best_iteration = iteration;
                best_indices = indices;
                self.max = max;
                self.min = min;
            }

            if best_iteration != iteration {
                break;
            }

            iteration += 1;
            if iteration == MAX_ITERATIONS {
                break;
            }

            if let Some((a, b)) = self.optimize_endpoints(indices, true) {
                max = a;
                min = b;
            }
        }

        best_indices
    }

    /// Fits a 4 color palette (max, min, two 1/3 interpolants).
    fn compress4(&mut self) -> u32 {
        let mut best_error = f32::MAX;
        let mut best_iteration = 0;
        let mut best_indices = 0u32;

        let mut max = self.max;
        let mut min = self.min;

        let mut iteration = 0;
        loop {
            let palette = [
                max,
                min,
                max * (2.0 / 3.0) + min * (1.0 / 3.0),
                max * (1.0 / 3.0) + min * (2.0 / 3.0),
            ];

            let mut indices = 0u32;
            let mut error = 0.0f32;

            for i in 0..16 {
                let t0 = (self.points[i] - palette[0]) * self.metric;
                let t1 = (self.points[i] - palette[1]) * self.metric;
                let t2 = (self.points[i] - palette[2]) * self.metric;
                let t3 = (self.points[i] - palette[3]) * self.metric;
                let d = [t0.dot(t0), t1.dot(t1), t2.dot(t2), t3.dot(t3)];

                let b0 = d[0] > d[3];
                let b1 = d[1] > d[2];
                let b2 = d[0] > d[2];
                let b3 = d[1] > d[3];
                let b4 = d[2] > d[3];

                let x0 = b1 & b2;
                let x1 = b0 & b3;
                let x2 = b0 & b4;

                let idx = (x2 as u32) | (((x0 | x1) as u32) << 1);

                indices |= idx << (2 * i);
                error += d[idx as usize];
            }

            if error < best_error {
                best_error = error;
                best_iteration = iteration;
                best_indices = indices;
                self.max = max;
                self.min = min;
            }

            if best_iteration != iteration {
                break;
            }

            iteration += 1;
            if iteration == MAX_ITERATIONS {
                break;
            }

            if let Some((a, b)) = self.optimize_endpoints(indices, false) {
                max = a;
                min = b;
            }
        }

        best_indices
    }

    /// Refits both endpoints by weighted least squares, treating each texel's
    /// index as a blend fraction and solving the 2x2 normal equations.
    /// Returns `None` when the system is near degenerate.
    fn optimize_endpoints(&self, indices: u32, three_color: bool) -> Option<(Vec4, Vec4)> {
        let mut alpha2_sum = 0.0f32;
        let mut beta2_sum = 0.0f32;
        let mut alphabeta_sum = 0.0f32;
        let mut alphax_sum = Vec4::ZERO;
        let mut betax_sum = Vec4::ZERO;

        for i in 0..16 {
            let bits = (indices >> (2 * i)) & 3;

            // Punch-through texels don't constrain the endpoints.
            if three_color && bits == 3 {
                continue;
            }

            let mut beta = (bits & 1) as f32;
            if bits & 2 != 0 {
                beta = if three_color { 0.5 } else { (1.0 + beta) / 3.0 };
            }
            let alpha = 1.0 - beta;

            alpha2_sum += alpha * alpha;
            beta2_sum += beta * beta;
            alphabeta_sum += alpha * beta;
            alphax_sum += self.points[i] * alpha;
            betax_sum += self.points[i] * beta;
        }

        let factor = alpha2_sum * beta2_sum - alphabeta_sum * alphabeta_sum;
        if factor < EPSILON {
            return None;
        }

        let a = (alphax_sum * beta2_sum - betax_sum * alphabeta_sum) * (1.0 / factor);
        let b = (betax_sum * alpha2_sum - alphax_sum * alphabeta_sum) * (1.0 / factor);

        Some((quantize565(a.clamp01()), quantize565(b.clamp01())))
    }

    fn endpoints_to_565(&self) -> (u16, u16) {
        let ta = GRID * self.max + HALF;
        let tb = GRID * self.min + HALF;

        let max16 = (((ta.z as i32).clamp(0, 31) << 11)
            | ((ta.y as i32).clamp(0, 63) << 5)
            | (ta.x as i32).clamp(0, 31)) as u16;
        let min16 = (((tb.z as i32).clamp(0, 31) << 11)
            | ((tb.y as i32).clamp(0, 63) << 5)
            | (tb.x as i32).clamp(0, 31)) as u16;

        (max16, min16)
    }
}

/// Optimal single color match tables for the 5 and 6 bit channels,
/// minimizing the error of the 2/3 interpolant against the repeated value.
fn match_tables() -> (&'static [[u8; 2]; 256], &'static [[u8; 2]; 256]) {
    static OMATCH5: OnceLock<[[u8; 2]; 256]> = OnceLock::new();
    static OMATCH6: OnceLock<[[u8; 2]; 256]> = OnceLock::new();

    let omatch5 = OMATCH5.get_or_init(|| prepare_match_table(32, |c| (c << 3) | (c >> 2)));
    let omatch6 = OMATCH6.get_or_init(|| prepare_match_table(64, |c| (c << 2) | (c >> 4)));
    (omatch5, omatch6)
}

fn prepare_match_table(size: i32, expand: fn(i32) -> i32) -> [[u8; 2]; 256] {
    let mut table = [[0u8; 2]; 256];

    for (value, entry) in table.iter_mut().enumerate() {
        let mut best_error = i32::MAX;
        for mn in 0..size {
            for mx in 0..size {
                let mine = expand(mn);
                let maxe = expand(mx);
                let lerp = (2 * maxe + mine) / 3;

                // Small penalty for wide ranges so flat areas dither less.
                let mut error = (lerp - value as i32).abs();
                error += (maxe - mine).abs() * 3 / 100;

                if error < best_error {
                    best_error = error;
                    *entry = [mx as u8, mn as u8];
                }
            }
        }
    }

    table
}

/// Encodes one 8 byte color block from a 4x4 BGRA block.
pub(super) fn encode_color_block(
    dst: &mut [u8],
    block: &[u8; BLOCK_BYTES],
    punch_through: bool,
    metric: ErrorMetric,
) {
    let mut dxtb = ColorBlock::new(block, punch_through, metric);

    let mut max16;
    let mut min16;
    let mut indices;

    if dxtb.single {
        let (omatch5, omatch6) = match_tables();

        max16 = ((omatch5[block[2] as usize][0] as u16) << 11)
            | ((omatch6[block[1] as usize][0] as u16) << 5)
            | omatch5[block[0] as usize][0] as u16;
        min16 = ((omatch5[block[2] as usize][1] as u16) << 11)
            | ((omatch6[block[1] as usize][1] as u16) << 5)
            | omatch5[block[0] as usize][1] as u16;

        // Every texel selects the 2/3 interpolant.
        indices = 0xaaaa_aaaa;

        if dxtb.alpha_mask != 0 {
            indices |= dxtb.alpha_mask;
            if max16 > min16 {
                std::mem::swap(&mut max16, &mut min16);
            }
        } else if max16 < min16 {
            std::mem::swap(&mut max16, &mut min16);
            indices ^= 0x5555_5555;
        }
    } else if punch_through && dxtb.alpha_mask != 0 {
        indices = dxtb.compress3();
        let (a, b) = dxtb.endpoints_to_565();
        max16 = a;
        min16 = b;

        if max16 > min16 {
            std::mem::swap(&mut max16, &mut min16);

            // Remap indices 0 <-> 1, leaving 2 and 3 alone.
            let mut remapped = 0u32;
            for i in 0..16 {
                let mut bits = (indices >> (2 * i)) & 3;
                if bits & 2 == 0 {
                    bits ^= 1;
                }
                remapped |= bits << (2 * i);
            }
            indices = remapped;
        }
    } else {
        indices = dxtb.compress4();
        let (a, b) = dxtb.endpoints_to_565();
        max16 = a;
        min16 = b;

        if max16 < min16 {
            std::mem::swap(&mut max16, &mut min16);
            indices ^= 0x5555_5555;
        }
    }

    dst[0..2].copy_from_slice(&max16.to_le_bytes());
    dst[2..4].copy_from_slice(&min16.to_le_bytes());
    dst[4..8].copy_from_slice(&indices.to_le_bytes());
}

/// Decodes one 8 byte color block into the RGBA block scratch.
///
/// `four_color` forces 4 color blending regardless of endpoint order.
/// `punch_through` emits transparent black for index 3 in 3 color mode.
pub(super) fn decode_color_block(
    block: &mut [u8; BLOCK_BYTES],
    src: &[u8],
    four_color: bool,
    punch_through: bool,
) {
    let c0 = u16::from_le_bytes([src[0], src[1]]);
    let c1 = u16::from_le_bytes([src[2], src[3]]);

    let mut colors = [[0u8; 3]; 4];
    unpack_rgb565(&mut colors[0], c0);
    unpack_rgb565(&mut colors[1], c1);

    if c0 > c1 || four_color {
        let (head, tail) = colors.split_at_mut(2);
        lerp13(&mut tail[0], &head[0], &head[1]);
        lerp13(&mut tail[1], &head[1], &head[0]);
    } else {
        for i in 0..3 {
            colors[2][i] = ((colors[0][i] as u16 + colors[1][i] as u16 + 1) >> 1) as u8;
            colors[3][i] = 0;
        }
    }

    let mut d = 0;
    for y in 0..4 {
        let mut bits = src[4 + y];
        for _ in 0..4 {
            let idx = (bits & 0x03) as usize;
            block[d] = colors[idx][2];
            block[d + 1] = colors[idx][1];
            block[d + 2] = colors[idx][0];
            if punch_through {
                block[d + 3] = if c0 <= c1 && idx == 3 { 0 } else { 255 };
            }
            bits >>= 2;
            d += 4;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform_block(texel: [u8; 4]) -> [u8; BLOCK_BYTES] {
        let mut block = [0u8; BLOCK_BYTES];
        for t in block.chunks_exact_mut(4) {
            t.copy_from_slice(&texel);
        }
        block
    }

    fn two_tone_block(a: [u8; 4], b: [u8; 4]) -> [u8; BLOCK_BYTES] {
        let mut block = [0u8; BLOCK_BYTES];
        for (i, t) in block.chunks_exact_mut(4).enumerate() {
            t.copy_from_slice(if i % 2 == 0 { &a } else { &b });
        }
        block
    }

    #[test]
    fn single_color_uses_match_tables() {
        let block = uniform_block([255, 255, 255, 255]);
        let mut dst = [0u8; 8];
        encode_color_block(&mut dst, &block, false, ErrorMetric::Uniform);

        // White maps every channel to the top grid value on both endpoints,
        // so no swap happens and the index pattern is the plain 2/3 pattern.
        assert_eq!(u16::from_le_bytes([dst[0], dst[1]]), 0xffff);
        assert_eq!(u16::from_le_bytes([dst[2], dst[3]]), 0xffff);
        assert_eq!(u32::from_le_bytes([dst[4], dst[5], dst[6], dst[7]]), 0xaaaa_aaaa);
    }

    #[test]
    fn single_color_swaps_to_complement_pattern() {
        let (omatch5, omatch6) = match_tables();
        let block = uniform_block([130, 60, 10, 255]);
        let mut dst = [0u8; 8];
        encode_color_block(&mut dst, &block, false, ErrorMetric::Uniform);

        let max16 = ((omatch5[10][0] as u16) << 11)
            | ((omatch6[60][0] as u16) << 5)
            | omatch5[130][0] as u16;
        let min16 = ((omatch5[10][1] as u16) << 11)
            | ((omatch6[60][1] as u16) << 5)
            | omatch5[130][1] as u16;

        let c0 = u16::from_le_bytes([dst[0], dst[1]]);
        let c1 = u16::from_le_bytes([dst[2], dst[3]]);
        let indices = u32::from_le_bytes([dst[4], dst[5], dst[6], dst[7]]);

        if max16 < min16 {
            assert_eq!((c0, c1), (min16, max16));
            assert_eq!(indices, 0xffff_ffff);
        } else {
            assert_eq!((c0, c1), (max16, min16));
            assert_eq!(indices, 0xaaaa_aaaa);
        }
    }

    #[test]
    fn single_color_punch_through_forces_three_color_order() {
        let block = uniform_block([255, 255, 255, 0]);
        let mut dst = [0u8; 8];
        encode_color_block(&mut dst, &block, true, ErrorMetric::Uniform);

        let c0 = u16::from_le_bytes([dst[0], dst[1]]);
        let c1 = u16::from_le_bytes([dst[2], dst[3]]);
        let indices = u32::from_le_bytes([dst[4], dst[5], dst[6], dst[7]]);

        // All texels are transparent, so every index is 3 and the
        // endpoint order must signal 3 color mode.
        assert!(c0 <= c1);
        assert_eq!(indices, 0xffff_ffff);
    }

    #[test]
    fn black_white_block_recovers_exact_endpoints() {
        let block = two_tone_block([0, 0, 0, 255], [255, 255, 255, 255]);
        let mut dst = [0u8; 8];
        encode_color_block(&mut dst, &block, false, ErrorMetric::Uniform);

        let c0 = u16::from_le_bytes([dst[0], dst[1]]);
        let c1 = u16::from_le_bytes([dst[2], dst[3]]);
        assert_eq!((c0, c1), (0xffff, 0x0000));

        let mut decoded = [0u8; BLOCK_BYTES];
        decode_color_block(&mut decoded, &dst, true, false);
        for (texel, original) in decoded.chunks_exact(4).zip(block.chunks_exact(4)) {
            assert_eq!(&texel[..3], &[original[2], original[1], original[0]]);
        }
    }

    #[test]
    fn four_tone_block_roundtrips_within_grid_step() {
        // Four tones on the segment between two representable endpoints.
        let tones: [[u8; 4]; 4] = [
            [0, 0, 0, 255],
            [82, 84, 82, 255],
            [165, 168, 165, 255],
            [248, 252, 248, 255],
        ];
        let mut block = [0u8; BLOCK_BYTES];
        for (i, t) in block.chunks_exact_mut(4).enumerate() {
            t.copy_from_slice(&tones[i % 4]);
        }

        let mut dst = [0u8; 8];
        encode_color_block(&mut dst, &block, false, ErrorMetric::Uniform);

        let mut decoded = [0u8; BLOCK_BYTES];
        decode_color_block(&mut decoded, &dst, true, false);

        for (texel, original) in decoded.chunks_exact(4).zip(block.chunks_exact(4)) {
            let bgr = [texel[2], texel[1], texel[0]];
            for c in 0..3 {
                let delta = (bgr[c] as i16 - original[c] as i16).abs();
                assert!(delta <= 8, "channel {c}: {} vs {}", bgr[c], original[c]);
            }
        }
    }

    #[test]
    fn punch_through_texels_decode_transparent_black() {
        let block = two_tone_block([0, 0, 0, 0], [255, 255, 255, 255]);
        let mut dst = [0u8; 8];
        encode_color_block(&mut dst, &block, true, ErrorMetric::Uniform);

        let c0 = u16::from_le_bytes([dst[0], dst[1]]);
        let c1 = u16::from_le_bytes([dst[2], dst[3]]);
        assert!(c0 <= c1);

        let mut decoded = [255u8; BLOCK_BYTES];
        decode_color_block(&mut decoded, &dst, false, true);
        for (i, texel) in decoded.chunks_exact(4).enumerate() {
            if i % 2 == 0 {
                assert_eq!(texel, &[0, 0, 0, 0]);
            } else {
                assert_eq!(texel[3], 255);
            }
        }
    }

    #[test]
    fn encoding_is_deterministic() {
        let mut block = [0u8; BLOCK_BYTES];
        for (i, t) in block.chunks_exact_mut(4).enumerate() {
            t.copy_from_slice(&[(i * 13) as u8, (i * 31) as u8, (255 - i * 7) as u8, 255]);
        }

        let mut a = [0u8; 8];
        let mut b = [0u8; 8];
        encode_color_block(&mut a, &block, false, ErrorMetric::Perceptual);
        encode_color_block(&mut b, &block, false, ErrorMetric::Perceptual);
        assert_eq!(a, b);
    }

    #[test]
    fn refit_degenerate_indices_leaves_endpoints_unchanged() {
        let block = two_tone_block([10, 20, 30, 255], [10, 20, 31, 255]);
        let dxtb = ColorBlock::new(&block, false, ErrorMetric::Uniform);

        // All texels on one palette entry makes the normal equations
        // singular, so the refit must bail out.
        assert!(dxtb.optimize_endpoints(0, false).is_none());
        assert!(dxtb.optimize_endpoints(0xffff_ffff, true).is_none());
    }

    #[test]
    fn three_color_mode_decodes_midpoint() {
        // c0 <= c1 selects the midpoint palette without transparency
        // outside of punch-through formats.
        let mut src = [0u8; 8];
        src[0..2].copy_from_slice(&0x0000u16.to_le_bytes());
        src[2..4].copy_from_slice(&0xffffu16.to_le_bytes());
        src[4..8].copy_from_slice(&0xaaaa_aaaau32.to_le_bytes());

        let mut decoded = [77u8; BLOCK_BYTES];
        decode_color_block(&mut decoded, &src, false, false);
        for texel in decoded.chunks_exact(4) {
            assert_eq!(&texel[..3], &[128, 128, 128]);
            // The alpha channel is left for the caller's alpha decoder.
            assert_eq!(texel[3], 77);
        }
    }
}
