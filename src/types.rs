/// Intensity in effect after `begin`.
pub const DEFAULT_INTENSITY: f32 = 0.5;

/// Visible area in normalized device coordinates.
pub const VIEWPORT: Rectangle = Rectangle {
    left: -0.5,
    top: -0.5,
    right: 0.5,
    bottom: 0.5,
};

/// A position in normalized device coordinates. The visible range is
/// `[-0.5, 0.5]` on both axes; encoders accept anything.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const ORIGIN: Point = Point { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Point) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn lerp(self, to: Point, t: f32) -> Point {
        Point {
            x: self.x + (to.x - self.x) * t,
            y: self.y + (to.y - self.y) * t,
        }
    }

    /// Per-axis multiply, used for axis scale and flip.
    pub fn scaled(self, scale: [f32; 2]) -> Point {
        Point {
            x: self.x * scale[0],
            y: self.y * scale[1],
        }
    }
}

impl std::fmt::Display for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.3}, {:.3})", self.x, self.y)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rectangle {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

/// One recorded drawing operation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GraphicsPrimitive {
    Circle {
        center: Point,
        radius: f32,
        intensity: f32,
    },
    Line {
        from: Point,
        to: Point,
        intensity: f32,
    },
    /// Move the beam to `point` and let it settle without drawing.
    Sync { point: Point, intensity: f32 },
}

impl GraphicsPrimitive {
    pub fn intensity(&self) -> f32 {
        match *self {
            GraphicsPrimitive::Circle { intensity, .. }
            | GraphicsPrimitive::Line { intensity, .. }
            | GraphicsPrimitive::Sync { intensity, .. } => intensity,
        }
    }
}
