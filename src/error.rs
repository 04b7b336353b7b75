use thiserror::Error;

#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("surface dimensions {width} x {height} contain no pixels")]
    ZeroSizedSurface { width: u32, height: u32 },

    #[error("surface pixel count {width} x {height} would overflow")]
    PixelCountWouldOverflow { width: u32, height: u32 },

    #[error("expected surface to have at least {expected} bytes but found {actual}")]
    NotEnoughData { expected: usize, actual: usize },

    #[error("source data with {bytes_per_pixel} bytes per pixel is not supported")]
    UnsupportedBytesPerPixel { bytes_per_pixel: u32 },

    #[error("mipmap count {mipmaps} exceeds the maximum expected mipmap count of {max_mipmaps}")]
    UnexpectedMipmapCount { mipmaps: u32, max_mipmaps: u32 },
}
