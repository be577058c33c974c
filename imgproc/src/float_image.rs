use image::GrayImage;

/// Single-channel f32 image, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct FloatImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<f32>,
}

impl FloatImage {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0.0; width * height],
        }
    }

    pub fn from_vec(width: usize, height: usize, data: Vec<f32>) -> Self {
        assert_eq!(data.len(), width * height, "data length must equal width*height");
        Self {
            width,
            height,
            data,
        }
    }

    /// Converts an 8-bit image to `[0, 1]` intensities.
    pub fn from_gray(gray: &GrayImage) -> Self {
        let data = gray.as_raw().iter().map(|&v| v as f32 / 255.0).collect();
        Self {
            width: gray.width() as usize,
            height: gray.height() as usize,
            data,
        }
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.width + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: f32) {
        self.data[y * self.width + x] = value;
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Element-wise `self - other`.
    pub fn sub(&self, other: &FloatImage) -> FloatImage {
        assert_eq!((self.width, self.height), (other.width, other.height));
        let data = self
            .data
            .iter()
            .zip(other.data.iter())
            .map(|(a, b)| a - b)
            .collect();
        FloatImage::from_vec(self.width, self.height, data)
    }
}
