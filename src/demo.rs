use std::f32::consts::PI;
use std::time::Duration;

use crate::draw::DrawDevice;
use crate::script::Script;
use crate::types::Point;

/// Something that can draw one frame at a time.
pub trait Scene {
    fn draw(&mut self, device: &mut dyn DrawDevice);
}

/// Circle with a diamond rotating inside it, half a degree per frame.
#[derive(Debug, Default)]
pub struct BasicScene {
    frame: u32,
}

impl Scene for BasicScene {
    fn draw(&mut self, device: &mut dyn DrawDevice) {
        device.set_intensity(0.3);
        device.set_point(Point::ORIGIN);
        device.draw_circle(0.5);

        let rad = self.frame as f32 / 360.0 * PI;
        self.frame = self.frame.wrapping_add(1);
        let (sinr, cosr) = rad.sin_cos();
        let rotate = |x: f32, y: f32| Point::new(cosr * x - sinr * y, sinr * x + cosr * y);

        device.set_intensity(0.25);
        device.set_point(rotate(0.0, 0.0));
        for (x, y) in [(0.0, 0.5), (0.5, 0.0), (0.0, -0.5), (-0.5, 0.0), (0.0, 0.5)] {
            device.draw_line(rotate(x, y), None);
        }
    }
}

impl Scene for Script {
    fn draw(&mut self, device: &mut dyn DrawDevice) {
        self.play_next(device);
    }
}

/// Render frames until `frames` have been submitted (0 = no limit) or the
/// device stops draining. Returns the number of frames submitted.
pub fn render_loop(
    device: &mut dyn DrawDevice,
    scene: &mut dyn Scene,
    frames: u64,
    timeout: Duration,
) -> anyhow::Result<u64> {
    let _span = tracing::info_span!("render").entered();
    let mut submitted = 0;
    while frames == 0 || submitted < frames {
        device.begin();
        scene.draw(device);
        if !device.wait_sync(timeout) {
            tracing::warn!(submitted, "device stalled, stopping");
            break;
        }
        device.submit()?;
        submitted += 1;
    }
    tracing::info!(submitted, "render loop finished");
    Ok(submitted)
}
