use std::borrow::Cow;

use bytemuck::{Pod, Zeroable};

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct GrayAlpha8([u8; 2]);

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct Rgb8([u8; 3]);

/// Promotes a 1, 2 or 3 channel source to BGRA8 for block processing.
/// 4 channel sources are already BGRA8 and borrow unchanged.
pub(crate) fn bgra8_from_source(src: &[u8], bytes_per_pixel: u32) -> Cow<'_, [u8]> {
    match bytes_per_pixel {
        1 => Cow::Owned(bgra8_from_gray8(src)),
        2 => Cow::Owned(bgra8_from_gray_alpha8(src)),
        3 => Cow::Owned(bgra8_from_rgb8(src)),
        _ => Cow::Borrowed(src),
    }
}

fn bgra8_from_gray8(src: &[u8]) -> Vec<u8> {
    let mut bgra = Vec::with_capacity(src.len() * 4);
    for &gray in src {
        bgra.extend_from_slice(&[gray, gray, gray, 255]);
    }
    bgra
}

fn bgra8_from_gray_alpha8(src: &[u8]) -> Vec<u8> {
    let pixels: &[GrayAlpha8] = bytemuck::cast_slice(src);
    let mut bgra = Vec::with_capacity(pixels.len() * 4);
    for GrayAlpha8([gray, alpha]) in pixels {
        bgra.extend_from_slice(&[*gray, *gray, *gray, *alpha]);
    }
    bgra
}

fn bgra8_from_rgb8(src: &[u8]) -> Vec<u8> {
    let pixels: &[Rgb8] = bytemuck::cast_slice(src);
    let mut bgra = Vec::with_capacity(pixels.len() * 4);
    for Rgb8([r, g, b]) in pixels {
        bgra.extend_from_slice(&[*b, *g, *r, 255]);
    }
    bgra
}
