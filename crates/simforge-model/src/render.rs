//! Render-sync binding between one GENERIC entity and the instanced renderer.

use serde::Serialize;

/// World property holding the instanced model, when none is configured.
pub const DEFAULT_MODEL_PROPERTY: &str = "cube_model";
/// World property holding the GPU buffer handle, when none is configured.
pub const DEFAULT_BUFFER_PROPERTY: &str = "vbo_id";
/// Hand-written full-scene renderers that render sync replaces.
pub const DEFAULT_SUPPRESSED: &[&str] = &["RenderAllCubes", "RenderScene"];

/// Validated render-sync description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderSync {
    /// Name from the `[gcomponent <Name>]` header.
    pub component: String,
    /// GENERIC entity whose instances are drawn.
    pub entity: String,
    pub model: String,
    pub buffer: String,
    /// Global LOOP systems dropped from the schedule.
    pub suppress: Vec<String>,
    pub visibility: Option<VisibilitySync>,
    pub transform: Option<TransformSync>,
    pub color: Option<ColorSync>,
}

/// Instance alpha follows a boolean property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VisibilitySync {
    pub when: String,
    pub otherwise: HiddenStyle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HiddenStyle {
    AlphaZero,
}

/// Instance translation follows three scalar fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransformSync {
    /// Only refresh the transform while this property is true.
    pub update_when: Option<String>,
    pub kind: TransformKind,
    /// Storage fields for x, y and z.
    pub axes: [String; 3],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TransformKind {
    Translation,
}

/// Instance colour follows a packed `0xRRGGBB` property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColorSync {
    pub kind: ColorKind,
    pub from: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ColorKind {
    HexToRgba,
}

impl RenderSync {
    /// Whether `system` is replaced by the generated sync routine.
    pub fn suppresses(&self, system: &str) -> bool {
        self.suppress.iter().any(|s| s == system)
    }
}
