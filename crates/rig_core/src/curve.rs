//! Curve shapes used to draw proxy guides and root controls.

use rig_math::Vec3;

/// A named, shape-describing curve.
///
/// The backend decides how to draw it; the core only needs the control points
/// to be usable.
#[derive(Clone, Debug, PartialEq)]
pub struct Curve {
    /// Curve name (also the default name of the built guide)
    pub name: String,

    /// Control points in object space
    pub points: Vec<Vec3>,

    /// Curve degree (1 = linear, 3 = cubic)
    pub degree: u8,

    /// Whether the last point connects back to the first
    pub closed: bool,
}

impl Curve {
    /// Create a new curve.
    pub fn new(name: impl Into<String>, points: Vec<Vec3>, degree: u8, closed: bool) -> Self {
        Self {
            name: name.into(),
            points,
            degree,
            closed,
        }
    }

    /// Check that the curve can be drawn.
    pub fn is_curve_valid(&self) -> bool {
        if !matches!(self.degree, 1 | 3) {
            return false;
        }
        if self.points.len() <= self.degree as usize {
            return false;
        }
        self.points.iter().all(|p| p.is_finite())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Three-axis cross with a diamond around it, used for proxy guides.
    pub fn proxy_joint() -> Self {
        let points = vec![
            Vec3::new(-1.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.0, -1.0, 0.0),
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(0.0, 0.0, -1.0),
            Vec3::new(-1.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, -1.0),
        ];
        Self::new("proxy_joint", points, 1, false)
    }

    /// Flat circle of `radius` in the XZ plane.
    pub fn circle(name: impl Into<String>, radius: f32, segments: usize) -> Self {
        let segments = segments.max(4);
        let points = (0..segments)
            .map(|i| {
                let angle = i as f32 / segments as f32 * std::f32::consts::TAU;
                Vec3::new(angle.cos() * radius, 0.0, angle.sin() * radius)
            })
            .collect();
        Self::new(name, points, 3, true)
    }

    /// Root anchor of the proxy hierarchy.
    pub fn proxy_root() -> Self {
        Self::circle("root_proxy", 30.0, 8)
    }

    /// Root control of the built rig.
    pub fn rig_root() -> Self {
        Self::circle("root_ctrl", 40.0, 8)
    }
}
