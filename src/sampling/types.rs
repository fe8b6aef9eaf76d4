//! Core type definitions for the sampling module.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// WGSL value type for shader expressions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueType {
    F32,
    Vec2,
    Vec3,
    Vec4,
}

/// A typed WGSL expression.
#[derive(Clone, Debug, PartialEq)]
pub struct TypedExpr {
    pub ty: ValueType,
    pub expr: String,
}

impl TypedExpr {
    pub fn new(expr: impl Into<String>, ty: ValueType) -> Self {
        Self {
            ty,
            expr: expr.into(),
        }
    }
}

/// Name of a GPU resource (source texture, LUT texture).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceName(Arc<str>);

impl ResourceName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ResourceName {
    fn from(s: String) -> Self {
        ResourceName(Arc::from(s.as_str()))
    }
}

impl From<&str> for ResourceName {
    fn from(s: &str) -> Self {
        ResourceName(Arc::from(s))
    }
}

impl AsRef<str> for ResourceName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ResourceName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Axis-aligned rectangle in source texel coordinates.
///
/// `x1 < x0` (or `y1 < y0`) flips the sampled image along that axis.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rect2D {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl Rect2D {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Rectangle covering a whole `width` x `height` image.
    pub fn full(width: u32, height: u32) -> Self {
        Self::new(0.0, 0.0, width as f32, height as f32)
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }
}
