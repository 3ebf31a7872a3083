//! Tray icons, drawn at runtime.

use std::sync::LazyLock;

use image::{Rgba, RgbaImage};
use sotto_core::MicState;

const ICON_SIZE: u32 = 32;

const COLOR_IDLE: (u8, u8, u8) = (158, 158, 158);
const COLOR_RECORDING: (u8, u8, u8) = (239, 83, 80);
const COLOR_PROCESSING: (u8, u8, u8) = (255, 202, 40);

static ICON_IDLE: LazyLock<tray_icon::Icon> = LazyLock::new(|| circle_icon(COLOR_IDLE));
static ICON_RECORDING: LazyLock<tray_icon::Icon> = LazyLock::new(|| circle_icon(COLOR_RECORDING));
static ICON_PROCESSING: LazyLock<tray_icon::Icon> = LazyLock::new(|| circle_icon(COLOR_PROCESSING));

/// Tray presentation for each microphone state.
pub trait IconExt {
    fn icon(&self) -> tray_icon::Icon;
    fn tooltip(&self) -> &'static str;
}

impl IconExt for MicState {
    fn icon(&self) -> tray_icon::Icon {
        match self {
            MicState::Idle => ICON_IDLE.clone(),
            MicState::Recording => ICON_RECORDING.clone(),
            MicState::Processing => ICON_PROCESSING.clone(),
        }
    }

    fn tooltip(&self) -> &'static str {
        match self {
            MicState::Idle => "sotto - ready",
            MicState::Recording => "sotto - recording...",
            MicState::Processing => "sotto - transcribing...",
        }
    }
}

/// A filled circle on a transparent square.
fn circle_icon((r, g, b): (u8, u8, u8)) -> tray_icon::Icon {
    let mut image = RgbaImage::new(ICON_SIZE, ICON_SIZE);
    let center = (ICON_SIZE as f32 - 1.0) / 2.0;
    let radius = ICON_SIZE as f32 / 2.0 - 2.0;

    for (x, y, pixel) in image.enumerate_pixels_mut() {
        let dx = x as f32 - center;
        let dy = y as f32 - center;
        if dx * dx + dy * dy <= radius * radius {
            *pixel = Rgba([r, g, b, 255]);
        }
    }

    let (width, height) = image.dimensions();
    tray_icon::Icon::from_rgba(image.into_raw(), width, height).expect("Failed to build icon")
}
