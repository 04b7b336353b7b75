use super::BLOCK_BYTES;

/// Encodes the alpha channel with the flat 4 bit quantizer, two texels
/// per byte.
pub(super) fn encode_flat_alpha(dst: &mut [u8], block: &[u8; BLOCK_BYTES]) {
    let alpha = &block[3..];
    for i in 0..8 {
        let a1 = alpha[8 * i];
        let a2 = alpha[8 * i + 4];
        dst[i] = ((a2 >> 4) << 4) | (a1 >> 4);
    }
}

/// Decodes a flat 4 bit alpha block, writing every 4th byte of `block`.
pub(super) fn decode_flat_alpha(block: &mut [u8], src: &[u8]) {
    let mut d = 0;
    for y in 0..4 {
        let mut bits = u16::from_le_bytes([src[2 * y], src[2 * y + 1]]);
        for _ in 0..4 {
            block[d] = ((bits & 0x0f) * 17) as u8;
            bits >>= 4;
            d += 4;
        }
    }
}

/// Encodes one channel of the block with the 8 level gradient codec.
///
/// The min/max pair is stored followed by 16 3-bit indices chosen with the
/// bias that makes them optimal for the selected endpoints:
/// <http://fgiesen.wordpress.com/2009/12/15/dxt5-alpha-block-index-determination/>
pub(super) fn encode_gradient(dst: &mut [u8], block: &[u8; BLOCK_BYTES], channel: usize) {
    let mut mn = block[channel];
    let mut mx = block[channel];
    for i in 1..16 {
        let v = block[channel + 4 * i];
        mx = mx.max(v);
        mn = mn.min(v);
    }

    dst[0] = mx;
    dst[1] = mn;

    let dist = mx as i32 - mn as i32;
    let dist4 = dist * 4;
    let dist2 = dist * 2;
    let mut bias = if dist < 8 { dist - 1 } else { dist / 2 + 2 };
    bias -= mn as i32 * 7;

    let mut acc = 0u32;
    let mut shift = 0;
    let mut out = 2;

    for i in 0..16 {
        let mut a = block[channel + 4 * i] as i32 * 7 + bias;

        // Linear scale index between 0 (value = min) and 7 (value = max).
        let mut idx = 0;
        if a >= dist4 {
            idx = 4;
            a -= dist4;
        }
        if a >= dist2 {
            idx += 2;
            a -= dist2;
        }
        idx += i32::from(a >= dist);

        // Remap so 0 and 1 address the stored extremes.
        idx = -idx & 7;
        idx ^= i32::from(idx < 2);

        acc |= (idx as u32) << shift;
        shift += 3;
        if shift >= 8 {
            dst[out] = acc as u8;
            out += 1;
            acc >>= 8;
            shift -= 8;
        }
    }
}

/// Decodes an 8 level gradient block, writing every 4th byte of `block`.
///
/// Narrow surfaces skip the indices of the clipped columns, matching the
/// encoder's block layout for widths below 4.
pub(super) fn decode_gradient(block: &mut [u8], src: &[u8], width: usize) {
    let a0 = src[0];
    let a1 = src[1];
    let mut bits = u64::from_le_bytes(src[..8].try_into().unwrap()) >> 16;

    let mut d = 0;
    for _ in 0..4 {
        for _ in 0..4 {
            let code = (bits & 0x07) as u32;
            block[d] = if code == 0 {
                a0
            } else if code == 1 {
                a1
            } else if a0 > a1 {
                (((8 - code) * a0 as u32 + (code - 1) * a1 as u32) / 7) as u8
            } else if code >= 6 {
                if code == 6 {
                    0
                } else {
                    255
                }
            } else {
                (((6 - code) * a0 as u32 + (code - 1) * a1 as u32) / 5) as u8
            };
            bits >>= 3;
            d += 4;
        }
        if width < 4 {
            bits >>= 3 * (4 - width);
        }
    }
}
