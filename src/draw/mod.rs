pub mod trace;

use std::time::Duration;

use crate::types::{DEFAULT_INTENSITY, GraphicsPrimitive, Point, Rectangle, VIEWPORT};

/// Drawing surface shared by every output backend.
///
/// A frame is `begin`, any number of drawing calls, `submit`. Callers
/// pace themselves with `wait_sync` before building the next frame.
pub trait DrawDevice {
    /// Block until the backend wants more data. `false` means the
    /// backend stalled past `timeout` and the render loop should stop.
    fn wait_sync(&mut self, timeout: Duration) -> bool;

    fn begin(&mut self);

    /// Hand the recorded frame to the encoder.
    fn submit(&mut self) -> anyhow::Result<()>;

    fn viewport(&self) -> Rectangle {
        VIEWPORT
    }

    fn set_point(&mut self, p: Point);

    fn set_intensity(&mut self, intensity: f32);

    /// Circle around the current point.
    fn draw_circle(&mut self, radius: f32);

    /// Line from the current point to `to`, which becomes the current
    /// point. A non-negative `intensity` takes effect after this line.
    fn draw_line(&mut self, to: Point, intensity: Option<f32>);
}

/// Accumulates one frame of primitives between `begin` and `submit`.
#[derive(Clone, Debug)]
pub struct Recorder {
    current_point: Point,
    current_intensity: f32,
    frame: Vec<GraphicsPrimitive>,
}

impl Default for Recorder {
    fn default() -> Self {
        Self {
            current_point: Point::ORIGIN,
            current_intensity: DEFAULT_INTENSITY,
            frame: Vec::new(),
        }
    }
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discards anything not yet submitted and resets point and intensity.
    pub fn begin(&mut self) {
        self.frame.clear();
        self.current_intensity = DEFAULT_INTENSITY;
        self.current_point = Point::ORIGIN;
    }

    pub fn set_intensity(&mut self, intensity: f32) {
        self.current_intensity = intensity;
    }

    pub fn set_point(&mut self, p: Point) {
        self.current_point = p;
        self.frame.push(GraphicsPrimitive::Sync {
            point: p,
            intensity: self.current_intensity,
        });
    }

    pub fn draw_line(&mut self, to: Point, intensity: Option<f32>) {
        let from_intensity = self.current_intensity;
        if let Some(i) = intensity.filter(|i| *i >= 0.0) {
            self.current_intensity = i;
        }
        let from = self.current_point;
        self.current_point = to;
        self.frame.push(GraphicsPrimitive::Line {
            from,
            to,
            intensity: from_intensity,
        });
    }

    pub fn draw_circle(&mut self, radius: f32) {
        self.frame.push(GraphicsPrimitive::Circle {
            center: self.current_point,
            radius,
            intensity: self.current_intensity,
        });
    }

    pub fn frame(&self) -> &[GraphicsPrimitive] {
        &self.frame
    }

    pub fn current_point(&self) -> Point {
        self.current_point
    }

    pub fn current_intensity(&self) -> f32 {
        self.current_intensity
    }
}

/// Implements the recording half of [`DrawDevice`] by delegating to a
/// `recorder: Recorder` field.
macro_rules! delegate_recorder {
    () => {
        fn begin(&mut self) {
            self.recorder.begin();
        }

        fn set_point(&mut self, p: $crate::types::Point) {
            self.recorder.set_point(p);
        }

        fn set_intensity(&mut self, intensity: f32) {
            self.recorder.set_intensity(intensity);
        }

        fn draw_circle(&mut self, radius: f32) {
            self.recorder.draw_circle(radius);
        }

        fn draw_line(&mut self, to: $crate::types::Point, intensity: Option<f32>) {
            self.recorder.draw_line(to, intensity);
        }
    };
}

pub(crate) use delegate_recorder;
