use std::borrow::Cow;
use std::path::Path;

use image::GrayImage;
use image::imageops::{self, FilterType};

use super::cascade::{Cascade, CascadeError, HaarFeature};
use super::grouping::{GROUP_EPS, group_rectangles};
use super::integral::IntegralImage;
use super::{FaceDetector, FaceRect};

/// Windows with `area / sqrt(area * sq_sum - sum^2)` at or above this are
/// skipped, which is a standard deviation of roughly ten grey levels.
const MIN_CONTRAST: f64 = 0.1;

#[derive(Debug, Clone, Copy)]
pub struct DetectorParams {
    /// Ratio between consecutive pyramid levels.
    pub scale_factor: f64,
    /// Hits a detection needs beyond the first to survive grouping.
    pub min_neighbors: usize,
}

impl Default for DetectorParams {
    fn default() -> Self {
        Self {
            scale_factor: 1.1,
            min_neighbors: 4,
        }
    }
}

/// Multi-scale sliding-window detector over a boosted Haar cascade.
pub struct HaarDetector {
    cascade: Cascade,
    params: DetectorParams,
}

impl HaarDetector {
    pub fn new(cascade: Cascade, params: DetectorParams) -> Self {
        Self { cascade, params }
    }

    pub fn from_file(path: impl AsRef<Path>, params: DetectorParams) -> Result<Self, CascadeError> {
        Ok(Self::new(Cascade::from_file(path)?, params))
    }

    pub fn cascade(&self) -> &Cascade {
        &self.cascade
    }

    /// Every window the cascade accepts, before grouping, in original image
    /// coordinates.
    pub fn detect_raw(&self, image: &GrayImage) -> Vec<FaceRect> {
        let (image_w, image_h) = image.dimensions();
        let (win_w, win_h) = (self.cascade.window_width, self.cascade.window_height);
        let mut hits = Vec::new();

        let mut factor = 1.0_f64;
        loop {
            let window_w = (win_w as f64 * factor).round_ties_even() as u32;
            let window_h = (win_h as f64 * factor).round_ties_even() as u32;
            if window_w > image_w || window_h > image_h {
                break;
            }

            let scaled_w = (image_w as f64 / factor).round_ties_even() as u32;
            let scaled_h = (image_h as f64 / factor).round_ties_even() as u32;
            if scaled_w < win_w || scaled_h < win_h {
                break;
            }

            let scaled: Cow<'_, GrayImage> = if scaled_w == image_w && scaled_h == image_h {
                Cow::Borrowed(image)
            } else {
                Cow::Owned(imageops::resize(image, scaled_w, scaled_h, FilterType::Triangle))
            };
            let integral = IntegralImage::new(&scaled);

            let step = if factor > 2.0 { 1 } else { 2 };
            for y in (0..=scaled_h - win_h).step_by(step as usize) {
                let mut x = 0;
                while x <= scaled_w - win_w {
                    let result = self.evaluate(&integral, x, y);
                    if result > 0 {
                        hits.push(FaceRect {
                            x: (x as f64 * factor).round_ties_even() as i32,
                            y: (y as f64 * factor).round_ties_even() as i32,
                            width: window_w as i32,
                            height: window_h as i32,
                        });
                    }
                    // rejected by the very first stage: nothing nearby either
                    if result == 0 {
                        x += step;
                    }
                    x += step;
                }
            }

            factor *= self.params.scale_factor;
        }

        hits
    }

    /// Runs the cascade on the window at `(x, y)`. Returns 1 when every stage
    /// passes, -1 for a window without enough contrast to evaluate, otherwise
    /// minus the index of the rejecting stage.
    fn evaluate(&self, integral: &IntegralImage, x: u32, y: u32) -> i32 {
        let (w, h) = (self.cascade.window_width, self.cascade.window_height);
        let area = ((w - 2) * (h - 2)) as f64;
        let sum = integral.rect_sum(x + 1, y + 1, w - 2, h - 2) as f64;
        let sq_sum = integral.rect_sq_sum(x + 1, y + 1, w - 2, h - 2) as f64;
        let variance = area * sq_sum - sum * sum;
        // flat and low-contrast windows never reach the stages
        if variance <= 0.0 {
            return -1;
        }
        let norm = variance.sqrt();
        if area / norm >= MIN_CONTRAST {
            return -1;
        }

        for (index, stage) in self.cascade.stages.iter().enumerate() {
            let mut stage_sum = 0.0;
            for weak in &stage.classifiers {
                let mut link = 0i32;
                loop {
                    let node = &weak.nodes[link as usize];
                    let feature = &self.cascade.features[node.feature];
                    let value = feature_value(integral, x, y, feature) / norm;
                    link = if value < node.threshold {
                        node.left
                    } else {
                        node.right
                    };
                    if link <= 0 {
                        break;
                    }
                }
                stage_sum += weak.leaves[link.unsigned_abs() as usize];
            }
            if stage_sum < stage.threshold {
                return -(index as i32);
            }
        }
        1
    }
}

fn feature_value(integral: &IntegralImage, x: u32, y: u32, feature: &HaarFeature) -> f64 {
    feature
        .rects
        .iter()
        .map(|r| r.weight * integral.rect_sum(x + r.x, y + r.y, r.width, r.height) as f64)
        .sum()
}

impl FaceDetector for HaarDetector {
    fn detect(&self, image: &GrayImage) -> Vec<FaceRect> {
        let hits = self.detect_raw(image);
        let faces = group_rectangles(&hits, self.params.min_neighbors, GROUP_EPS);
        tracing::debug!(
            raw = hits.len(),
            grouped = faces.len(),
            width = image.width(),
            height = image.height(),
            "haar detection finished"
        );
        faces
    }
}

#[cfg(test)]
mod tests {
    use image::Luma;

    use super::*;
    use crate::detection::cascade::tests::{EDGE_CASCADE, TREE_CASCADE};

    fn edge_detector(params: DetectorParams) -> HaarDetector {
        HaarDetector::new(Cascade::from_xml(EDGE_CASCADE).unwrap(), params)
    }

    /// Dark left of `edge`, bright from `edge` on.
    fn edge_image(width: u32, height: u32, edge: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, _| Luma([if x < edge { 0 } else { 255 }]))
    }

    // a scale factor this large keeps the pyramid to a single level
    const SINGLE_SCALE: DetectorParams = DetectorParams {
        scale_factor: 10.0,
        min_neighbors: 0,
    };

    #[test]
    fn uniform_image_has_no_hits() {
        let detector = edge_detector(DetectorParams::default());
        let image = GrayImage::from_pixel(40, 30, Luma([0]));
        assert!(detector.detect_raw(&image).is_empty());
        assert!(detector.detect(&image).is_empty());
    }

    #[test]
    fn windows_straddling_the_edge_fire() {
        let detector = edge_detector(SINGLE_SCALE);
        let hits = detector.detect_raw(&edge_image(12, 8, 6));
        let expected: Vec<FaceRect> = [0, 2, 4]
            .into_iter()
            .map(|y| FaceRect {
                x: 4,
                y,
                width: 4,
                height: 4,
            })
            .collect();
        assert_eq!(hits, expected);
    }

    #[test]
    fn reversed_edge_does_not_fire() {
        let detector = edge_detector(SINGLE_SCALE);
        let image = GrayImage::from_fn(12, 8, |x, _| Luma([if x < 6 { 255 } else { 0 }]));
        assert!(detector.detect_raw(&image).is_empty());
    }

    #[test]
    fn zero_neighbours_reports_raw_hits() {
        let detector = edge_detector(SINGLE_SCALE);
        let image = edge_image(12, 8, 6);
        assert_eq!(detector.detect(&image), detector.detect_raw(&image));
    }

    #[test]
    fn image_smaller_than_window_is_skipped() {
        let detector = edge_detector(DetectorParams::default());
        assert!(detector.detect_raw(&edge_image(3, 3, 1)).is_empty());
    }

    #[test]
    fn larger_scales_report_larger_windows() {
        let detector = edge_detector(DetectorParams {
            scale_factor: 2.0,
            min_neighbors: 0,
        });
        let hits = detector.detect_raw(&edge_image(16, 16, 6));
        assert!(hits.iter().any(|r| r.width == 4));
        assert!(hits.iter().any(|r| r.width == 8));
        assert!(hits.iter().all(|r| r.x + r.width <= 16 && r.y + r.height <= 16));
    }

    #[test]
    fn low_contrast_edge_does_not_fire() {
        let detector = edge_detector(SINGLE_SCALE);
        let image = GrayImage::from_fn(12, 8, |x, _| Luma([if x < 6 { 100 } else { 110 }]));
        assert!(detector.detect_raw(&image).is_empty());
    }

    #[test]
    fn flat_window_is_refused_before_the_stages() {
        let detector = edge_detector(SINGLE_SCALE);
        let integral = IntegralImage::new(&GrayImage::from_pixel(4, 4, Luma([0])));
        assert_eq!(detector.evaluate(&integral, 0, 0), -1);
    }

    /// Columns are (top, bottom) grey levels; rows 0-1 are top, 2-3 bottom.
    fn column_image(columns: &[(u8, u8)]) -> GrayImage {
        GrayImage::from_fn(columns.len() as u32, 4, |x, y| {
            let (top, bottom) = columns[x as usize];
            Luma([if y < 2 { top } else { bottom }])
        })
    }

    // x=0 flat, x=2 passes stage 0 but fails stage 1, x=4 and x=6 pass both
    const TREE_COLUMNS: [(u8, u8); 10] = [
        (0, 0),
        (0, 0),
        (0, 0),
        (0, 0),
        (60, 60),
        (60, 60),
        (128, 255),
        (128, 255),
        (255, 255),
        (255, 255),
    ];

    #[test]
    fn tree_cascade_reports_the_rejecting_stage() {
        let detector = HaarDetector::new(Cascade::from_xml(TREE_CASCADE).unwrap(), SINGLE_SCALE);
        let integral = IntegralImage::new(&column_image(&TREE_COLUMNS));
        assert_eq!(detector.evaluate(&integral, 0, 0), -1);
        assert_eq!(detector.evaluate(&integral, 2, 0), -1);
        assert_eq!(detector.evaluate(&integral, 4, 0), 1);
        assert_eq!(detector.evaluate(&integral, 6, 0), 1);

        // bright-left window dies in the first stage
        let reversed = IntegralImage::new(&column_image(&[(255, 255), (255, 255), (0, 0), (0, 0)]));
        assert_eq!(detector.evaluate(&reversed, 0, 0), 0);
    }

    #[test]
    fn later_stage_rejection_keeps_the_normal_step() {
        let detector = HaarDetector::new(Cascade::from_xml(TREE_CASCADE).unwrap(), SINGLE_SCALE);
        let hits = detector.detect_raw(&column_image(&TREE_COLUMNS));
        let expected: Vec<FaceRect> = [4, 6]
            .into_iter()
            .map(|x| FaceRect {
                x,
                y: 0,
                width: 4,
                height: 4,
            })
            .collect();
        assert_eq!(hits, expected);
    }
}
