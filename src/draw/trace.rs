//! Primitive traversal shared by the audio and integrator encoders.
//!
//! Both encoders walk a frame the same way and differ only in what a
//! beam position turns into, so geometry and step counts live here and
//! the encoders implement [`BeamWriter`].

use std::f32::consts::TAU;

use crate::types::{GraphicsPrimitive, Point};

/// Segments per unit of `radius * intensity` for audio circles.
pub const AUDIO_CIRCLE_DENSITY: f32 = 50.0 * SPEED_MULTIPLIER;
/// Segments per unit of `length * intensity` for audio lines.
pub const AUDIO_LINE_DENSITY: f32 = 12.0 * SPEED_MULTIPLIER;

const SPEED_MULTIPLIER: f32 = 5.0;

/// Sample density of a traversal.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Density {
    pub circle: f32,
    /// Zero traces every line as a single segment.
    pub line: f32,
}

impl Density {
    pub const AUDIO: Density = Density {
        circle: AUDIO_CIRCLE_DENSITY,
        line: AUDIO_LINE_DENSITY,
    };
}

/// Receives beam positions in traversal order.
pub trait BeamWriter {
    type Error;

    /// Put the beam at `p` without a traced path leading there (sync
    /// points and the first vertex of a circle).
    fn anchor(&mut self, p: Point) -> Result<(), Self::Error>;

    /// Move the beam along a straight path to `p`.
    fn trace(&mut self, p: Point, intensity: f32) -> Result<(), Self::Error>;
}

/// Per-pass traversal state.
#[derive(Clone, Copy, Debug, Default)]
pub struct EncodeCursor {
    /// The previous primitive was a sync, so its point is already written.
    pub sync_point: bool,
}

pub fn circle_steps(radius: f32, intensity: f32, density: f32) -> usize {
    ((density * radius * intensity).round() as i64).max(1) as usize
}

pub fn line_steps(length: f32, intensity: f32, density: f32) -> usize {
    ((density * length * intensity + 0.5).round() as i64).max(1) as usize
}

/// Walk `frame` in order, feeding `writer`. Returns the number of beam
/// positions emitted.
pub fn trace_frame<W: BeamWriter>(
    frame: &[GraphicsPrimitive],
    density: Density,
    writer: &mut W,
) -> Result<usize, W::Error> {
    let mut cursor = EncodeCursor::default();
    let mut points = 0;
    for primitive in frame {
        points += trace_primitive(primitive, density, &mut cursor, writer)?;
    }
    Ok(points)
}

pub fn trace_primitive<W: BeamWriter>(
    primitive: &GraphicsPrimitive,
    density: Density,
    cursor: &mut EncodeCursor,
    writer: &mut W,
) -> Result<usize, W::Error> {
    match *primitive {
        GraphicsPrimitive::Sync { point, .. } => {
            writer.anchor(point)?;
            cursor.sync_point = true;
            Ok(1)
        }
        GraphicsPrimitive::Line {
            from,
            to,
            intensity,
        } => {
            let steps = line_steps(from.distance(to), intensity, density.line);
            let skip = usize::from(cursor.sync_point);
            for i in skip..=steps {
                writer.trace(from.lerp(to, i as f32 / steps as f32), intensity)?;
            }
            cursor.sync_point = false;
            Ok(steps + 1 - skip)
        }
        GraphicsPrimitive::Circle {
            center,
            radius,
            intensity,
        } => {
            let steps = circle_steps(radius, intensity, density.circle);
            let angle_step = TAU / steps as f32;
            let vertex = |i: usize| {
                let a = i as f32 * angle_step;
                Point::new(center.x + radius * a.sin(), center.y + radius * a.cos())
            };
            writer.anchor(vertex(0))?;
            for i in 1..=steps {
                writer.trace(vertex(i), intensity)?;
            }
            cursor.sync_point = false;
            Ok(steps + 1)
        }
    }
}
