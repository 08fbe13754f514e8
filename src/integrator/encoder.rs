use std::convert::Infallible;

use ft_protocol::{FT_DAC_MAX, FTSample};

use crate::config::IntegratorConfig;
use crate::draw::trace::{self, BeamWriter, Density};
use crate::types::{GraphicsPrimitive, Point};

/// Map a coordinate in `[-0.5, 0.5]` to a 12-bit DAC code, clamping
/// anything outside.
pub fn dac_map(c: f32) -> u16 {
    let max = FT_DAC_MAX as f32;
    ((c + 0.5) * max).round().clamp(0.0, max) as u16
}

/// Drive model of the RC integrator and the sample densities used
/// against it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DriveParams {
    pub scale: [f32; 2],
    /// Transit time per unit distance, in microseconds at intensity 1.
    pub speed_scale: f32,
    pub density: Density,
    /// Integrator time constant R·C in seconds.
    pub rc: f32,
    pub settle_us: u16,
    pub hold_us: u16,
}

impl From<&IntegratorConfig> for DriveParams {
    fn from(config: &IntegratorConfig) -> Self {
        Self {
            scale: config.scale,
            speed_scale: config.speed_scale,
            density: Density {
                circle: config.circle_density as f32,
                line: config.line_density as f32,
            },
            rc: config.r_ohms * config.c_farads,
            settle_us: config.settle_us,
            hold_us: config.hold_us,
        }
    }
}

impl Default for DriveParams {
    fn default() -> Self {
        Self::from(&IntegratorConfig::default())
    }
}

/// Turns a frame into integrator drive samples.
#[derive(Debug)]
pub struct IntegratorEncoder {
    params: DriveParams,
    samples: Vec<FTSample>,
    /// Most samples kept per frame; the rest are only counted.
    budget: usize,
    dropped: usize,
}

impl Default for IntegratorEncoder {
    fn default() -> Self {
        Self::new(DriveParams::default())
    }
}

impl IntegratorEncoder {
    pub fn new(params: DriveParams) -> Self {
        Self {
            params,
            samples: Vec::new(),
            budget: usize::MAX,
            dropped: 0,
        }
    }

    /// Cap the samples stored per frame, normally the framer's packet
    /// budget. Geometry past the cap is traced but not stored.
    pub fn set_sample_budget(&mut self, budget: usize) {
        self.budget = budget;
    }

    /// Samples the last frame produced beyond the budget.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn params(&self) -> &DriveParams {
        &self.params
    }

    pub fn set_scale(&mut self, x: f32, y: f32) {
        self.params.scale = [x, y];
    }

    /// Encode `frame`, replacing the previous frame's samples.
    pub fn encode(&mut self, frame: &[GraphicsPrimitive]) -> &[FTSample] {
        self.samples.clear();
        let mut writer = DriveWriter {
            params: &self.params,
            reference: Point::ORIGIN,
            out: &mut self.samples,
            budget: self.budget,
            dropped: 0,
        };
        let Ok(points) = trace::trace_frame(frame, self.params.density, &mut writer);
        self.dropped = writer.dropped;
        tracing::trace!(
            points,
            samples = self.samples.len(),
            dropped = self.dropped,
            "integrator frame encoded"
        );
        &self.samples
    }

    pub fn samples(&self) -> &[FTSample] {
        &self.samples
    }
}

/// Emits samples while tracking where the integrator output actually is.
struct DriveWriter<'a> {
    params: &'a DriveParams,
    /// Last commanded absolute position.
    reference: Point,
    out: &'a mut Vec<FTSample>,
    budget: usize,
    dropped: usize,
}

impl DriveWriter<'_> {
    fn emit(&mut self, sample: FTSample) {
        if self.out.len() < self.budget {
            self.out.push(sample);
        } else {
            self.dropped += 1;
        }
    }
}

impl BeamWriter for DriveWriter<'_> {
    type Error = Infallible;

    fn anchor(&mut self, p: Point) -> Result<(), Infallible> {
        let p = p.scaled(self.params.scale);
        self.emit(FTSample::reset(dac_map(p.x), dac_map(p.y), self.params.settle_us));
        self.emit(FTSample::hold(self.params.hold_us));
        self.reference = p;
        Ok(())
    }

    fn trace(&mut self, p: Point, intensity: f32) -> Result<(), Infallible> {
        let p = p.scaled(self.params.scale);
        let t = self.params.speed_scale * self.reference.distance(p) * intensity * 1e-6;
        // Nothing to integrate over a zero-length or zero-speed move
        if t.is_nan() || t <= 0.0 {
            return Ok(());
        }
        let vx = self.params.rc * -(p.x - self.reference.x) / t;
        let vy = self.params.rc * -(p.y - self.reference.y) / t;
        let wait = (t * 1e6).round().min(u16::MAX as f32) as u16;
        self.emit(FTSample::delta(
            dac_map(self.reference.x + vx),
            dac_map(self.reference.y + vy),
            wait,
        ));
        self.reference = p;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dac_map_endpoints() {
        assert_eq!(dac_map(0.0), 2048);
        assert_eq!(dac_map(-0.5), 0);
        assert_eq!(dac_map(0.5), 4095);
        assert_eq!(dac_map(10.0), 4095);
        assert_eq!(dac_map(-10.0), 0);
    }

    #[test]
    fn sync_emits_reset_then_hold() {
        let mut enc = IntegratorEncoder::default();
        let samples = enc.encode(&[GraphicsPrimitive::Sync {
            point: Point::new(0.5, -0.5),
            intensity: 0.5,
        }]);
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0], FTSample::reset(4095, 0, 50));
        assert!(samples[1].nodac());
        assert_eq!(samples[1].wait, 4);
    }

    #[test]
    fn line_after_sync_is_one_delta_sample() {
        let mut enc = IntegratorEncoder::default();
        let samples = enc.encode(&[
            GraphicsPrimitive::Sync {
                point: Point::new(0.0, 0.0),
                intensity: 1.0,
            },
            GraphicsPrimitive::Line {
                from: Point::new(0.0, 0.0),
                to: Point::new(0.1, 0.0),
                intensity: 1.0,
            },
        ]);
        assert_eq!(samples.len(), 3);
        let delta = samples[2];
        assert!(delta.dx() && delta.dy());
        assert!(!delta.nodac());
        // t = 5000 * 0.1 * 1e-6 s = 500 us
        assert_eq!(delta.wait, 500);
        // Vd = 4.7e-4 * -0.1 / 5e-4 = -0.094
        assert_eq!(delta.x(), dac_map(-0.094));
        assert_eq!(delta.y(), 2048);
    }

    #[test]
    fn chained_lines_skip_the_shared_vertex() {
        let mut enc = IntegratorEncoder::default();
        let samples = enc.encode(&[
            GraphicsPrimitive::Sync {
                point: Point::new(-0.2, 0.0),
                intensity: 0.5,
            },
            GraphicsPrimitive::Line {
                from: Point::new(-0.2, 0.0),
                to: Point::new(0.2, 0.0),
                intensity: 0.5,
            },
            GraphicsPrimitive::Line {
                from: Point::new(0.2, 0.0),
                to: Point::new(0.2, 0.2),
                intensity: 0.5,
            },
        ]);
        // reset + hold + one delta per line; the repeated start point of
        // the second line has zero length and emits nothing
        assert_eq!(samples.len(), 4);
        assert!(samples[2..].iter().all(|s| s.dx()));
    }

    #[test]
    fn circle_is_anchor_plus_path() {
        let mut enc = IntegratorEncoder::default();
        let samples = enc.encode(&[GraphicsPrimitive::Circle {
            center: Point::ORIGIN,
            radius: 0.4,
            intensity: 0.5,
        }]);
        // steps = round(50 * 0.4 * 0.5) = 10
        assert_eq!(samples.len(), 2 + 10);
        assert!(!samples[0].dx());
        assert!(samples[1].nodac());
        assert!(samples[2..].iter().all(|s| s.dx() && s.dy() && s.wait > 0));
    }

    #[test]
    fn wait_is_clamped() {
        let mut enc = IntegratorEncoder::new(DriveParams {
            speed_scale: 1.0e9,
            ..DriveParams::default()
        });
        let samples = enc.encode(&[GraphicsPrimitive::Line {
            from: Point::ORIGIN,
            to: Point::new(0.5, 0.0),
            intensity: 1.0,
        }]);
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].wait, u16::MAX);
    }

    #[test]
    fn oversized_circle_stops_storing_at_budget() {
        let mut enc = IntegratorEncoder::default();
        enc.set_sample_budget(10);
        let samples = enc.encode(&[GraphicsPrimitive::Circle {
            center: Point::ORIGIN,
            radius: 1000.0,
            intensity: 0.5,
        }]);
        assert_eq!(samples.len(), 10);
        // steps = round(50 * 1000 * 0.5) = 25000, plus reset and hold
        assert_eq!(enc.dropped(), 25_002 - 10);

        // The count resets with the next frame
        enc.encode(&[GraphicsPrimitive::Sync {
            point: Point::ORIGIN,
            intensity: 0.5,
        }]);
        assert_eq!(enc.samples().len(), 2);
        assert_eq!(enc.dropped(), 0);
    }

    #[test]
    fn scale_applies_before_mapping() {
        let mut enc = IntegratorEncoder::default();
        enc.set_scale(-1.0, 0.5);
        let samples = enc.encode(&[GraphicsPrimitive::Sync {
            point: Point::new(0.5, 0.5),
            intensity: 0.5,
        }]);
        assert_eq!(samples[0].x(), 0);
        assert_eq!(samples[0].y(), dac_map(0.25));
    }
}
