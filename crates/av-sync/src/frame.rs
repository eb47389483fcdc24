//! Planar YUV 4:2:0 picture owned by the video consumer.

use std::time::Duration;

/// One plane of a [`Frame`] with its row stride in bytes.
#[derive(Clone, Copy, Debug)]
pub struct Plane<'a> {
    pub data: &'a [u8],
    pub stride: usize,
}

/// Three pixel planes (luma plus two half-resolution chroma planes).
///
/// Plane sizes are fixed at construction and the buffers are overwritten in place on
/// every read; no frame history is kept.
#[derive(Clone, Debug)]
pub struct Frame {
    width: usize,
    height: usize,
    y: Vec<u8>,
    u: Vec<u8>,
    v: Vec<u8>,
    /// Presentation timestamp supplied by the source, if it has one.
    pub pts: Option<Duration>,
}

impl Frame {
    /// Allocate zeroed planes for a `width` x `height` picture.
    pub fn new(width: u32, height: u32) -> Self {
        let width = width as usize;
        let height = height as usize;
        let chroma = (width / 2) * (height / 2);
        Self {
            width,
            height,
            y: vec![0; width * height],
            u: vec![0; chroma],
            v: vec![0; chroma],
            pts: None,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Luma plane size in bytes.
    pub fn luma_len(&self) -> usize {
        self.y.len()
    }

    /// Size of each chroma plane in bytes.
    pub fn chroma_len(&self) -> usize {
        self.u.len()
    }

    /// Total bytes of one frame in a raw planar file.
    pub fn byte_len(&self) -> usize {
        self.y.len() + self.u.len() + self.v.len()
    }

    /// Y, U, V planes with their strides.
    pub fn planes(&self) -> [Plane<'_>; 3] {
        let chroma_stride = self.width / 2;
        [
            Plane {
                data: &self.y,
                stride: self.width,
            },
            Plane {
                data: &self.u,
                stride: chroma_stride,
            },
            Plane {
                data: &self.v,
                stride: chroma_stride,
            },
        ]
    }

    /// Mutable Y, U, V buffers for sources to fill.
    pub fn planes_mut(&mut self) -> [&mut [u8]; 3] {
        [
            self.y.as_mut_slice(),
            self.u.as_mut_slice(),
            self.v.as_mut_slice(),
        ]
    }
}
