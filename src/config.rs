//! World configuration: clip planes, scroll tuning and widget placement.

use crate::vr::interaction::InteractionConfig;
use crate::vr::math::Vec3;

/// Where and how large a widget is created during scene setup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WidgetPlacement {
    pub position: Vec3,
    pub pixel_width: u32,
    pub pixel_height: u32,
    pub world_width: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorldConfig {
    pub near_clip: f32,
    pub far_clip: f32,
    pub scroll_factor: f32,
    pub clear_color: [f32; 4],
    /// Display density (dpi) at which UI widgets use their nominal pixel size.
    pub density_baseline: f32,
    pub browser: WidgetPlacement,
    /// Nominal URL bar size; pixel dimensions are scaled by display density.
    pub url_bar: WidgetPlacement,
    pub primary_button: u32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            near_clip: 0.1,
            far_clip: 100.0,
            scroll_factor: 20.0,
            clear_color: [0.15, 0.15, 0.15, 1.0],
            density_baseline: 420.0,
            browser: WidgetPlacement {
                position: Vec3::new(0.0, -3.0, -18.0),
                pixel_width: 1920,
                pixel_height: 1080,
                world_width: 16.0,
            },
            url_bar: WidgetPlacement {
                position: Vec3::new(0.0, 7.15, -18.0),
                pixel_width: 1920,
                pixel_height: 275,
                world_width: 9.0,
            },
            primary_button: 0,
        }
    }
}

impl WorldConfig {
    /// UI scale for a display density. Unknown or non-positive densities
    /// scale by 1.
    pub fn ui_scale(&self, density: Option<f32>) -> f32 {
        match density {
            Some(d) if d > 0.0 && self.density_baseline > 0.0 => d / self.density_baseline,
            _ => 1.0,
        }
    }

    /// URL bar pixel size at the given display density.
    pub fn url_bar_pixels(&self, density: Option<f32>) -> (u32, u32) {
        let scale = self.ui_scale(density);
        let scaled = |px: u32| ((px as f32 * scale).round() as u32).max(1);
        (scaled(self.url_bar.pixel_width), scaled(self.url_bar.pixel_height))
    }

    pub fn interaction(&self) -> InteractionConfig {
        InteractionConfig {
            far_clip: self.far_clip,
            scroll_factor: self.scroll_factor,
            primary_button: self.primary_button,
        }
    }
}
