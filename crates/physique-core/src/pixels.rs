//! Read-only pixel access for colour sampling.

use image::RgbImage;
use thiserror::Error;

/// Failures while reading pixels. The skin-tone classifier turns these into
/// an error record instead of propagating them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SamplingError {
    #[error(
        "pixel buffer holds {actual} bytes, expected {expected} for {width}x{height} {order:?}"
    )]
    MalformedBuffer {
        expected: usize,
        actual: usize,
        width: u32,
        height: u32,
        order: ChannelOrder,
    },
    #[error("region ({x0},{y0})-({x1},{y1}) lies outside {width}x{height} image")]
    RegionOutOfBounds {
        x0: u32,
        y0: u32,
        x1: u32,
        y1: u32,
        width: u32,
        height: u32,
    },
    #[error("cannot average an empty region")]
    EmptyRegion,
}

/// Byte layout of a single pixel in the source buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelOrder {
    Rgb,
    Bgr,
    Rgba,
    Bgra,
}

impl ChannelOrder {
    pub fn channels(self) -> usize {
        match self {
            ChannelOrder::Rgb | ChannelOrder::Bgr => 3,
            ChannelOrder::Rgba | ChannelOrder::Bgra => 4,
        }
    }

    /// Reorder a raw pixel into `[r, g, b]`.
    fn to_rgb(self, px: &[u8]) -> [u8; 3] {
        match self {
            ChannelOrder::Rgb | ChannelOrder::Rgba => [px[0], px[1], px[2]],
            ChannelOrder::Bgr | ChannelOrder::Bgra => [px[2], px[1], px[0]],
        }
    }
}

/// Axis-aligned pixel rectangle, half-open: `[x0, x1) × [y0, y1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl Region {
    /// Square of half-width `half` centred on `(cx, cy)`, clamped to a
    /// `width × height` image. A centre far outside the image yields an
    /// empty region.
    pub fn around(cx: i32, cy: i32, half: i32, width: u32, height: u32) -> Self {
        let clamp = |v: i64, max: u32| v.clamp(0, i64::from(max)) as u32;
        let (cx, cy, half) = (i64::from(cx), i64::from(cy), i64::from(half));
        let x0 = clamp(cx - half, width);
        let x1 = clamp(cx + half, width).max(x0);
        let y0 = clamp(cy - half, height);
        let y1 = clamp(cy + half, height).max(y0);
        Self { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> u32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> u32 {
        self.y1 - self.y0
    }

    pub fn area(&self) -> u64 {
        u64::from(self.width()) * u64::from(self.height())
    }

    pub fn is_empty(&self) -> bool {
        self.area() == 0
    }
}

/// Borrowed view over a packed, row-major pixel buffer.
#[derive(Debug, Clone, Copy)]
pub struct PixelBuffer<'a> {
    data: &'a [u8],
    width: u32,
    height: u32,
    order: ChannelOrder,
}

impl<'a> PixelBuffer<'a> {
    /// Wrap a raw buffer, checking its length against the declared size.
    pub fn new(
        data: &'a [u8],
        width: u32,
        height: u32,
        order: ChannelOrder,
    ) -> Result<Self, SamplingError> {
        let expected = width as usize * height as usize * order.channels();
        if data.len() != expected {
            return Err(SamplingError::MalformedBuffer {
                expected,
                actual: data.len(),
                width,
                height,
                order,
            });
        }
        Ok(Self {
            data,
            width,
            height,
            order,
        })
    }

    /// Zero-copy view of a decoded RGB image.
    pub fn from_rgb(image: &'a RgbImage) -> Self {
        Self {
            data: image.as_raw(),
            width: image.width(),
            height: image.height(),
            order: ChannelOrder::Rgb,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Mean colour of `region` as floating-point `[r, g, b]`.
    pub fn mean_rgb(&self, region: &Region) -> Result<[f64; 3], SamplingError> {
        if region.x1 > self.width || region.y1 > self.height {
            return Err(SamplingError::RegionOutOfBounds {
                x0: region.x0,
                y0: region.y0,
                x1: region.x1,
                y1: region.y1,
                width: self.width,
                height: self.height,
            });
        }
        if region.is_empty() {
            return Err(SamplingError::EmptyRegion);
        }

        let channels = self.order.channels();
        let stride = self.width as usize * channels;
        let mut sum = [0u64; 3];

        for y in region.y0..region.y1 {
            let row_start = y as usize * stride;
            let start = row_start + region.x0 as usize * channels;
            let end = row_start + region.x1 as usize * channels;
            let row = &self.data[start..end];
            for px in row.chunks_exact(channels) {
                let [r, g, b] = self.order.to_rgb(px);
                sum[0] += u64::from(r);
                sum[1] += u64::from(g);
                sum[2] += u64::from(b);
            }
        }

        let n = region.area() as f64;
        Ok([sum[0] as f64 / n, sum[1] as f64 / n, sum[2] as f64 / n])
    }
}
