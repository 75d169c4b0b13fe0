use image::imageops;
use image::GrayImage;
use latency_probe_common::config::ClassifierConfig;
use latency_probe_common::event::Aux;
use tracing::debug;

use crate::frame::CapturedFrame;

/// Caption plus the numeric metrics it was derived from.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub caption: String,
    pub aux: Aux,
}

/// Produces a short caption for each frame.
///
/// Implementations may keep state between calls (motion needs the previous
/// frame), hence `&mut self`.
pub trait FrameClassifier {
    fn classify(&mut self, frame: &CapturedFrame) -> Classification;

    /// Human-readable name for logging.
    fn name(&self) -> &str {
        "unnamed"
    }
}

pub const LABEL_BRIGHT: &str = "Claro";
pub const LABEL_DARK: &str = "Escuro";
pub const LABEL_MEDIUM: &str = "Ilum. media";
pub const LABEL_MOTION: &str = "Movimento";
pub const LABEL_STILL: &str = "Parado";

/// Illumination + motion classifier.
///
/// Brightness is the mean luma of the raw frame. Motion is the mean absolute
/// difference between the blurred luma of this frame and the previous one;
/// the first frame, and any frame whose resolution differs from its
/// predecessor, reports zero motion.
pub struct BrightnessMotionClassifier {
    config: ClassifierConfig,
    prev_blurred: Option<GrayImage>,
}

impl BrightnessMotionClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self {
            config,
            prev_blurred: None,
        }
    }

    fn mean(gray: &GrayImage) -> f64 {
        let count = gray.pixels().len();
        if count == 0 {
            return 0.0;
        }
        gray.pixels().map(|p| p.0[0] as f64).sum::<f64>() / count as f64
    }

    fn mean_abs_diff(a: &GrayImage, b: &GrayImage) -> f64 {
        let count = a.pixels().len();
        if count == 0 {
            return 0.0;
        }
        a.pixels()
            .zip(b.pixels())
            .map(|(x, y)| (x.0[0] as f64 - y.0[0] as f64).abs())
            .sum::<f64>()
            / count as f64
    }

    fn illumination_label(&self, brightness: f64) -> &'static str {
        if brightness > self.config.bright_threshold {
            LABEL_BRIGHT
        } else if brightness < self.config.dark_threshold {
            LABEL_DARK
        } else {
            LABEL_MEDIUM
        }
    }

    fn motion_label(&self, motion_level: f64) -> &'static str {
        if motion_level > self.config.motion_threshold {
            LABEL_MOTION
        } else {
            LABEL_STILL
        }
    }
}

impl FrameClassifier for BrightnessMotionClassifier {
    fn classify(&mut self, frame: &CapturedFrame) -> Classification {
        let gray = frame.luma();
        let brightness = Self::mean(&gray);

        let blurred = if self.config.blur_sigma > 0.0 {
            imageops::blur(&gray, self.config.blur_sigma)
        } else {
            gray
        };

        let motion_level = match &self.prev_blurred {
            Some(prev) if prev.dimensions() == blurred.dimensions() => {
                Self::mean_abs_diff(&blurred, prev)
            }
            _ => 0.0,
        };
        self.prev_blurred = Some(blurred);

        let caption = format!(
            "{} | {}",
            self.illumination_label(brightness),
            self.motion_label(motion_level)
        );
        debug!(
            seq = frame.seq,
            brightness = format!("{:.2}", brightness),
            motion_level = format!("{:.2}", motion_level),
            caption,
            "frame classified"
        );

        Classification {
            caption,
            aux: Aux::from([
                ("brightness".to_string(), brightness),
                ("motion_level".to_string(), motion_level),
            ]),
        }
    }

    fn name(&self) -> &str {
        "brightness-motion"
    }
}
