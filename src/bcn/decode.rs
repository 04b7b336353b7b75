use super::{alpha, color, put_block, BLOCK_BYTES, BLOCK_HEIGHT, BLOCK_WIDTH};
use crate::Format;

/// Decompresses one mip level of compressed blocks into RGBA ordered
/// pixels, writing `bytes_per_pixel` channels per texel.
pub(crate) fn decompress_surface(
    dst: &mut [u8],
    src: &[u8],
    format: Format,
    width: usize,
    height: usize,
    bytes_per_pixel: usize,
    normal_map: bool,
) {
    let mut s = 0;

    for y in (0..height).step_by(BLOCK_HEIGHT) {
        for x in (0..width).step_by(BLOCK_WIDTH) {
            // Prefill so the channels a format doesn't store decode opaque.
            let mut block = [255u8; BLOCK_BYTES];

            match format {
                Format::Bc1 => {
                    color::decode_color_block(&mut block, &src[s..s + 8], false, true);
                    s += 8;
                }
                Format::Bc2 => {
                    alpha::decode_flat_alpha(&mut block[3..], &src[s..s + 8]);
                    color::decode_color_block(&mut block, &src[s + 8..s + 16], false, false);
                    s += 16;
                }
                Format::Bc4 => {
                    alpha::decode_gradient(&mut block, &src[s..s + 8], width);
                    s += 8;
                }
                Format::Bc5 => {
                    alpha::decode_gradient(&mut block, &src[s + 8..s + 16], width);
                    alpha::decode_gradient(&mut block[1..], &src[s..s + 8], width);
                    s += 16;
                }
                // The remaining formats all carry a DXT5 style record.
                _ => {
                    alpha::decode_gradient(&mut block[3..], &src[s..s + 8], width);
                    color::decode_color_block(&mut block, &src[s + 8..s + 16], true, false);
                    s += 16;
                }
            }

            if normal_map {
                reconstruct_normals(&mut block, format);
            }

            put_block(dst, &block, x, y, width, height, bytes_per_pixel);
        }
    }
}

fn reconstruct_normals(block: &mut [u8; BLOCK_BYTES], format: Format) {
    for texel in block.chunks_exact_mut(4) {
        match format {
            Format::Bc3 | Format::Bc3Normal | Format::Rxgb => {
                // X rides in alpha, Y in green; the displaced byte keeps
                // the alpha channel occupied.
                let tmp = texel[0];
                let [x, y, z] = make_normal(texel[3], texel[1]);
                texel[0] = x;
                texel[1] = y;
                texel[2] = z;
                texel[3] = tmp;
            }
            Format::Bc5 => {
                let [x, y, z] = make_normal(texel[0], texel[1]);
                texel[0] = x;
                texel[1] = y;
                texel[2] = z;
            }
            _ => {}
        }
    }
}

/// Derives the third channel of a tangent space normal from the two
/// decoded channels under a unit length assumption.
fn make_normal(x: u8, y: u8) -> [u8; 3] {
    let nx = 2.0 * (x as f32 / 255.0) - 1.0;
    let ny = 2.0 * (y as f32 / 255.0) - 1.0;
    let d = 1.0 - nx * nx + ny * ny;
    let nz = if d > 0.0 { d.sqrt() } else { 0.0 };

    let z = (255.0 * (nz + 1.0) / 2.0) as i32;
    [x, y, z.clamp(0, 255) as u8]
}
