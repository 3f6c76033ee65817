use std::fmt;

use crate::IMG_SIZE;

/// Image channels, in storage order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// Occupancy mask, `0` or `255`.
    Mask = 0,
    /// One-pixel wall outline, `0` or `255`.
    Boundary = 1,
    /// Gaussian door marker, `0..=255`.
    Door = 2,
}

impl Channel {
    pub const ALL: [Self; 3] = [Self::Mask, Self::Boundary, Self::Door];
}

/// A channel-major `3 × 64 × 64` byte image.
#[derive(Clone, PartialEq, Eq)]
pub struct RasterImage {
    data: Box<[u8]>,
}

impl RasterImage {
    pub const CHANNELS: usize = Channel::ALL.len();
    pub const PIXELS: usize = IMG_SIZE * IMG_SIZE;
    pub const LEN: usize = Self::CHANNELS * Self::PIXELS;

    #[must_use]
    pub fn blank() -> Self {
        Self {
            data: vec![0; Self::LEN].into_boxed_slice(),
        }
    }

    /// Wraps raw channel-major bytes, or returns `None` on a length mismatch.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        (bytes.len() == Self::LEN).then(|| Self { data: bytes.into() })
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    fn offset(channel: Channel, row: usize, col: usize) -> usize {
        debug_assert!(row < IMG_SIZE && col < IMG_SIZE);
        channel as usize * Self::PIXELS + row * IMG_SIZE + col
    }

    #[must_use]
    pub fn get(&self, channel: Channel, row: usize, col: usize) -> u8 {
        self.data[Self::offset(channel, row, col)]
    }

    pub fn set(&mut self, channel: Channel, row: usize, col: usize, value: u8) {
        self.data[Self::offset(channel, row, col)] = value;
    }

    #[must_use]
    pub fn channel(&self, channel: Channel) -> &[u8] {
        let start = channel as usize * Self::PIXELS;
        &self.data[start..start + Self::PIXELS]
    }

    /// Number of non-zero pixels in a channel.
    #[must_use]
    pub fn count_nonzero(&self, channel: Channel) -> usize {
        self.channel(channel).iter().filter(|&&v| v != 0).count()
    }

    /// `(min_row, max_row, min_col, max_col)` of the non-zero pixels in a channel.
    #[must_use]
    pub fn occupied_bounds(&self, channel: Channel) -> Option<(usize, usize, usize, usize)> {
        let pixels = self.channel(channel);
        let mut bounds: Option<(usize, usize, usize, usize)> = None;
        for (i, _) in pixels.iter().enumerate().filter(|&(_, &v)| v != 0) {
            let (row, col) = (i / IMG_SIZE, i % IMG_SIZE);
            bounds = Some(match bounds {
                None => (row, row, col, col),
                Some((r0, r1, c0, c1)) => (r0.min(row), r1.max(row), c0.min(col), c1.max(col)),
            });
        }
        bounds
    }

    /// Pixel values scaled to `[0, 1]`, in storage order.
    #[must_use]
    pub fn to_unit_f32(&self) -> Vec<f32> {
        self.data.iter().map(|&v| f32::from(v) / 255.0).collect()
    }

    /// Builds a new image by reading each output pixel from `source(row, col)`.
    pub(crate) fn remap<F>(&self, source: F) -> Self
    where
        F: Fn(usize, usize) -> (usize, usize),
    {
        let mut out = Self::blank();
        for channel in Channel::ALL {
            for row in 0..IMG_SIZE {
                for col in 0..IMG_SIZE {
                    let (r, c) = source(row, col);
                    out.set(channel, row, col, self.get(channel, r, c));
                }
            }
        }
        out
    }
}

impl fmt::Debug for RasterImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RasterImage")
            .field("mask", &self.count_nonzero(Channel::Mask))
            .field("boundary", &self.count_nonzero(Channel::Boundary))
            .field("door", &self.count_nonzero(Channel::Door))
            .finish()
    }
}

impl Default for RasterImage {
    fn default() -> Self {
        Self::blank()
    }
}
