use image::GrayImage;

/// Summed-area tables over a grayscale image, one row and column larger
/// than the image so that `rect_sum` needs no bounds special cases.
pub struct IntegralImage {
    stride: usize,
    sum: Vec<u64>,
    sq_sum: Vec<u64>,
}

impl IntegralImage {
    pub fn new(image: &GrayImage) -> Self {
        let (width, height) = (image.width() as usize, image.height() as usize);
        let stride = width + 1;
        let mut sum = vec![0u64; stride * (height + 1)];
        let mut sq_sum = vec![0u64; stride * (height + 1)];

        for y in 0..height {
            let mut row_sum = 0u64;
            let mut row_sq_sum = 0u64;
            for x in 0..width {
                let v = image.get_pixel(x as u32, y as u32).0[0] as u64;
                row_sum += v;
                row_sq_sum += v * v;
                let at = (y + 1) * stride + x + 1;
                sum[at] = sum[at - stride] + row_sum;
                sq_sum[at] = sq_sum[at - stride] + row_sq_sum;
            }
        }

        Self {
            stride,
            sum,
            sq_sum,
        }
    }

    fn corners(&self, table: &[u64], x: u32, y: u32, w: u32, h: u32) -> u64 {
        let (x, y, w, h) = (x as usize, y as usize, w as usize, h as usize);
        let top = y * self.stride;
        let bottom = (y + h) * self.stride;
        table[bottom + x + w] + table[top + x] - table[top + x + w] - table[bottom + x]
    }

    pub fn rect_sum(&self, x: u32, y: u32, w: u32, h: u32) -> u64 {
        self.corners(&self.sum, x, y, w, h)
    }

    pub fn rect_sq_sum(&self, x: u32, y: u32, w: u32, h: u32) -> u64 {
        self.corners(&self.sq_sum, x, y, w, h)
    }
}
