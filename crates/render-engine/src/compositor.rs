//! Onion-skin compositor: overlays faded previous frames on the live frame.
//!
//! Each stored frame `i` steps back from the live frame is added on top
//! with weight `opacity / i`. The live frame keeps weight 1.0 and layers are
//! not normalized against each other, so the sum is clamped to the channel
//! range once at the end.

use std::path::Path;

use image::imageops::{self, FilterType};
use image::RgbaImage;
use stopframe_project_model::{ProjectMetadata, Timeline};

/// Blend `recent` (most recent first) over `live`.
///
/// Uses `min(layer_count, recent.len())` layers. Frames whose size differs
/// from `live` are resized to it. With no layers or a non-positive opacity
/// the result equals `live`.
pub fn composite(
    live: &RgbaImage,
    recent: &[RgbaImage],
    base_opacity: f32,
    layer_count: usize,
) -> RgbaImage {
    let layers = layer_count.min(recent.len());
    let opacity = f64::from(base_opacity.clamp(0.0, 1.0));
    if layers == 0 || opacity <= 0.0 {
        return live.clone();
    }

    let (width, height) = live.dimensions();
    let mut acc: Vec<f64> = live.as_raw().iter().map(|&c| f64::from(c)).collect();

    for (i, frame) in recent.iter().take(layers).enumerate() {
        let weight = opacity / (i + 1) as f64;
        let resized;
        let layer = if frame.dimensions() == (width, height) {
            frame
        } else {
            resized = imageops::resize(frame, width, height, FilterType::Triangle);
            &resized
        };

        for (sum, &channel) in acc.iter_mut().zip(layer.as_raw().iter()) {
            *sum += f64::from(channel) * weight;
        }
    }

    let pixels = acc.into_iter().map(|c| c.clamp(0.0, 255.0) as u8).collect();
    RgbaImage::from_raw(width, height, pixels).unwrap_or_else(|| live.clone())
}

/// Decode frame files for compositing, skipping any that fail to load.
pub fn load_recent_frames<'a>(paths: impl IntoIterator<Item = &'a Path>) -> Vec<RgbaImage> {
    paths
        .into_iter()
        .filter_map(|path| match image::open(path) {
            Ok(img) => Some(img.to_rgba8()),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable onion layer");
                None
            }
        })
        .collect()
}

/// Onion-skin settings taken from project metadata.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OnionSkin {
    /// Weight of the frame one step back, in `[0, 1]`.
    pub opacity: f32,
    pub layers: usize,
}

impl OnionSkin {
    pub fn from_metadata(meta: &ProjectMetadata) -> Self {
        Self {
            opacity: meta.onion_opacity_fraction(),
            layers: meta.onion_layer_count as usize,
        }
    }

    /// Composite `live` with the newest frames of `timeline`.
    pub fn render(&self, live: &RgbaImage, timeline: &Timeline) -> RgbaImage {
        if self.layers == 0 || self.opacity <= 0.0 || timeline.is_empty() {
            return live.clone();
        }
        let recent = load_recent_frames(timeline.recent(self.layers).map(|f| f.path()));
        composite(live, &recent, self.opacity, self.layers)
    }
}
