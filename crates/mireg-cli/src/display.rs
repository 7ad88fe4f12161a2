//! Side-by-side window/level display model.
//!
//! [`MultiImageDisplay`] holds one panel per volume with its own intensity
//! window and axial slice position. Nothing is drawn on screen; a panel's
//! current slice can be rendered to 8-bit grayscale and the state is
//! reported as text.

use std::fmt;

use burn::tensor::backend::Backend;
use mireg_core::Image;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DisplayError {
    #[error("Length mismatch: {expected} images but {actual} {what}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid window {0}: window width must be positive")]
    InvalidWindow(f64),

    #[error("Invalid percentile range [{lo}, {hi}]: expected 0 <= lo < hi <= 100")]
    InvalidPercentileRange { lo: f64, hi: f64 },

    #[error("Invalid figure size ({width}, {height}): both sides must be positive")]
    InvalidFigureSize { width: f64, height: f64 },

    #[error("Panel {index} out of range ({panels} panels)")]
    PanelOutOfRange { index: usize, panels: usize },

    #[error("Slice {slice} out of range ({slices} slices)")]
    SliceOutOfRange { slice: usize, slices: usize },

    #[error("Image '{0}' has no voxels")]
    EmptyImage(String),
}

pub type Result<T> = std::result::Result<T, DisplayError>;

/// Intensity window given as width and center.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowLevel {
    pub window: f64,
    pub level: f64,
}

impl WindowLevel {
    /// Soft tissue window for CT in Hounsfield units.
    pub const CT: Self = Self {
        window: 932.0,
        level: 180.0,
    };

    pub const MR: Self = Self {
        window: 286.0,
        level: 143.0,
    };

    pub fn new(window: f64, level: f64) -> Result<Self> {
        if !(window.is_finite() && window > 0.0) || !level.is_finite() {
            return Err(DisplayError::InvalidWindow(window));
        }
        Ok(Self { window, level })
    }

    /// `[level - window/2, level + window/2]`
    pub fn intensity_range(&self) -> (f64, f64) {
        let half = self.window / 2.0;
        (self.level - half, self.level + half)
    }
}

impl From<[f64; 2]> for WindowLevel {
    fn from([window, level]: [f64; 2]) -> Self {
        Self { window, level }
    }
}

/// One displayed volume.
#[derive(Debug, Clone)]
pub struct Panel {
    title: String,
    /// `[z, y, x]`
    shape: [usize; 3],
    voxels: Vec<f32>,
    slider_bounds: (f64, f64),
    intensity_range: (f64, f64),
    slice: usize,
}

impl Panel {
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn shape(&self) -> [usize; 3] {
        self.shape
    }

    pub fn num_slices(&self) -> usize {
        self.shape[0]
    }

    /// Current axial slice.
    pub fn slice(&self) -> usize {
        self.slice
    }

    /// Limits of the intensity slider, from the percentile range.
    pub fn slider_bounds(&self) -> (f64, f64) {
        self.slider_bounds
    }

    /// Intensities mapped to black and white.
    pub fn intensity_range(&self) -> (f64, f64) {
        self.intensity_range
    }

    fn apply_window(&mut self, wl: WindowLevel) {
        let (lo, hi) = wl.intensity_range();
        let (min, max) = self.slider_bounds;
        self.intensity_range = (lo.clamp(min, max), hi.clamp(min, max));
    }

    fn render(&self) -> Vec<u8> {
        let [_, ny, nx] = self.shape;
        let start = self.slice * ny * nx;
        let (lo, hi) = self.intensity_range;
        let width = hi - lo;
        self.voxels[start..start + ny * nx]
            .iter()
            .map(|&v| {
                let v = f64::from(v);
                if width <= 0.0 {
                    return if v >= hi { 255 } else { 0 };
                }
                ((v - lo) / width * 255.0).clamp(0.0, 255.0).round() as u8
            })
            .collect()
    }
}

impl fmt::Display for Panel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [nz, ny, nx] = self.shape;
        write!(
            f,
            "{}: {}x{}x{} voxels, slice {}/{}, intensity [{:.1}, {:.1}], slider [{:.1}, {:.1}]",
            self.title,
            nx,
            ny,
            nz,
            self.slice,
            nz,
            self.intensity_range.0,
            self.intensity_range.1,
            self.slider_bounds.0,
            self.slider_bounds.1
        )
    }
}

/// Linear interpolation between closest ranks of sorted values.
fn percentile(sorted: &[f32], p: f64) -> f64 {
    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let below = rank.floor() as usize;
    let above = rank.ceil() as usize;
    let frac = rank - below as f64;
    f64::from(sorted[below]) * (1.0 - frac) + f64::from(sorted[above]) * frac
}

#[derive(Debug, Clone)]
pub struct MultiImageDisplay {
    panels: Vec<Panel>,
    figure_size: (f64, f64),
}

impl MultiImageDisplay {
    pub const DEFAULT_FIGURE_SIZE: (f64, f64) = (8.0, 4.0);
    pub const DEFAULT_PERCENTILE_RANGE: (f64, f64) = (0.0, 100.0);

    /// Builds one panel per image.
    ///
    /// Every argument is validated before any voxel is read; panels without
    /// a window/level show the full slider range. Each panel starts on its
    /// middle axial slice.
    pub fn new<B: Backend>(
        images: &[Image<B, 3>],
        titles: &[&str],
        figure_size: (f64, f64),
        window_levels: Option<&[WindowLevel]>,
        percentile_range: (f64, f64),
    ) -> Result<Self> {
        if titles.len() != images.len() {
            return Err(DisplayError::LengthMismatch {
                what: "titles",
                expected: images.len(),
                actual: titles.len(),
            });
        }
        if let Some(wls) = window_levels {
            if wls.len() != images.len() {
                return Err(DisplayError::LengthMismatch {
                    what: "window levels",
                    expected: images.len(),
                    actual: wls.len(),
                });
            }
            if let Some(bad) = wls.iter().find(|wl| !(wl.window > 0.0)) {
                return Err(DisplayError::InvalidWindow(bad.window));
            }
        }
        let (lo, hi) = percentile_range;
        if !(0.0 <= lo && lo < hi && hi <= 100.0) {
            return Err(DisplayError::InvalidPercentileRange { lo, hi });
        }
        let (width, height) = figure_size;
        if !(width > 0.0 && height > 0.0) {
            return Err(DisplayError::InvalidFigureSize { width, height });
        }

        let mut panels = Vec::with_capacity(images.len());
        for (i, (image, title)) in images.iter().zip(titles).enumerate() {
            let voxels = image.to_vec();
            if voxels.is_empty() {
                return Err(DisplayError::EmptyImage(title.to_string()));
            }
            let mut sorted = voxels.clone();
            sorted.sort_by(f32::total_cmp);
            let slider_bounds = (percentile(&sorted, lo), percentile(&sorted, hi));
            let shape = image.shape();

            let mut panel = Panel {
                title: title.to_string(),
                shape,
                voxels,
                slider_bounds,
                intensity_range: slider_bounds,
                slice: shape[0] / 2,
            };
            if let Some(wls) = window_levels {
                panel.apply_window(wls[i]);
            }
            panels.push(panel);
        }

        Ok(Self { panels, figure_size })
    }

    pub fn panels(&self) -> &[Panel] {
        &self.panels
    }

    pub fn figure_size(&self) -> (f64, f64) {
        self.figure_size
    }

    fn panel_mut(&mut self, index: usize) -> Result<&mut Panel> {
        let panels = self.panels.len();
        self.panels
            .get_mut(index)
            .ok_or(DisplayError::PanelOutOfRange { index, panels })
    }

    /// Moves the intensity window of panel `index`, clamped to its slider.
    pub fn set_window_level(&mut self, index: usize, wl: WindowLevel) -> Result<()> {
        if !(wl.window > 0.0) {
            return Err(DisplayError::InvalidWindow(wl.window));
        }
        self.panel_mut(index)?.apply_window(wl);
        Ok(())
    }

    pub fn set_slice(&mut self, index: usize, slice: usize) -> Result<()> {
        let panel = self.panel_mut(index)?;
        if slice >= panel.num_slices() {
            return Err(DisplayError::SliceOutOfRange {
                slice,
                slices: panel.num_slices(),
            });
        }
        panel.slice = slice;
        Ok(())
    }

    /// Current slice of panel `index` as row-major 8-bit grayscale.
    pub fn render_slice(&self, index: usize) -> Result<Vec<u8>> {
        self.panels
            .get(index)
            .map(Panel::render)
            .ok_or(DisplayError::PanelOutOfRange {
                index,
                panels: self.panels.len(),
            })
    }

    pub fn summary(&self) -> Vec<String> {
        let (w, h) = self.figure_size;
        std::iter::once(format!("{} panels, figure {}x{}", self.panels.len(), w, h))
            .chain(self.panels.iter().map(|p| p.to_string()))
            .collect()
    }
}
