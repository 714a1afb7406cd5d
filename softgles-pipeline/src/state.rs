//! Mutable pipeline state.
//!
//! Everything a command can modify between draws lives in one coherent,
//! explicitly-passed struct; no component reads ambient or static state.
//! Independent contexts are therefore just independent values.

use crate::clip::MAX_USER_CLIP_PLANES;
use crate::error::PipelineError;
use crate::lighting::Material;
use crate::math::{Mat4, Vec4, IDENTITY_4X4};
use crate::texture::MAX_TEXTURE_UNITS;

// ---------------------------------------------------------------------------
// Current attribute state
// ---------------------------------------------------------------------------

/// The attribute values a committed vertex snapshots.
///
/// Attributes other than position are "sticky": a vertex that does not
/// restate its color or normal carries the previous values forward.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurrentState {
    pub color: Vec4,
    pub normal: Vec4,
    pub texcoord: [Vec4; MAX_TEXTURE_UNITS],
}

impl Default for CurrentState {
    fn default() -> Self {
        Self {
            color: [1.0, 1.0, 1.0, 1.0],
            normal: [0.0, 0.0, 1.0, 0.0],
            texcoord: [[0.0, 0.0, 0.0, 1.0]; MAX_TEXTURE_UNITS],
        }
    }
}

// ---------------------------------------------------------------------------
// Viewport
// ---------------------------------------------------------------------------

/// Viewport transform parameters (maps normalized device coordinates to
/// window space) plus the depth range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: 640.0,
            height: 480.0,
            near: 0.0,
            far: 1.0,
        }
    }
}

impl Viewport {
    /// Map an NDC position to window coordinates.
    pub fn to_window(&self, ndc: Vec4) -> [f32; 3] {
        [
            self.x + (ndc[0] + 1.0) * 0.5 * self.width,
            self.y + (ndc[1] + 1.0) * 0.5 * self.height,
            self.near + (ndc[2] + 1.0) * 0.5 * (self.far - self.near),
        ]
    }
}

// ---------------------------------------------------------------------------
// Fog
// ---------------------------------------------------------------------------

/// Fog falloff selector.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum FogMode {
    Linear,
    #[default]
    Exp,
    Exp2,
}

/// Per-vertex fog evaluation state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fog {
    pub enabled: bool,
    pub mode: FogMode,
    pub density: f32,
    pub start: f32,
    pub end: f32,
}

impl Default for Fog {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: FogMode::default(),
            density: 1.0,
            start: 0.0,
            end: 1.0,
        }
    }
}

impl Fog {
    /// Fog blend factor for an eye-space depth, clamped to [0, 1].
    /// 1 means unfogged.
    pub fn factor(&self, depth: f32) -> f32 {
        let f = match self.mode {
            FogMode::Linear => {
                let span = self.end - self.start;
                if span != 0.0 {
                    (self.end - depth) / span
                } else {
                    1.0
                }
            }
            FogMode::Exp => (-self.density * depth).exp(),
            FogMode::Exp2 => {
                let d = self.density * depth;
                (-(d * d)).exp()
            }
        };
        f.clamp(0.0, 1.0)
    }
}

// ---------------------------------------------------------------------------
// Shading
// ---------------------------------------------------------------------------

/// Flat vs. smooth interpolation of vertex colors.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ShadeModel {
    Flat,
    #[default]
    Smooth,
}

// ---------------------------------------------------------------------------
// Pipeline state
// ---------------------------------------------------------------------------

/// Complete mutable state of one geometry-pipeline context.
#[derive(Debug, Clone)]
pub struct PipelineState {
    pub current: CurrentState,

    // -- Transform (consumed read-only; built by the caller) -------------
    pub modelview: Mat4,
    pub projection: Mat4,
    pub viewport: Viewport,

    // -- Shading ---------------------------------------------------------
    pub lighting: bool,
    pub normalize_normals: bool,
    pub shade_model: ShadeModel,
    pub scene_ambient: Vec4,
    pub front_material: Material,
    pub back_material: Material,
    pub fog: Fog,

    // -- User clip planes (eye-space equations) --------------------------
    pub clip_planes: [Vec4; MAX_USER_CLIP_PLANES],
    pub clip_plane_mask: u8,

    // -- Raster position -------------------------------------------------
    pub raster_valid: bool,
    pub raster_window: Vec4,
}

impl PipelineState {
    pub fn new() -> Self {
        Self {
            current: CurrentState::default(),
            modelview: IDENTITY_4X4,
            projection: IDENTITY_4X4,
            viewport: Viewport::default(),
            lighting: false,
            normalize_normals: false,
            shade_model: ShadeModel::default(),
            scene_ambient: [0.2, 0.2, 0.2, 1.0],
            front_material: Material::default(),
            back_material: Material::default(),
            fog: Fog::default(),
            clip_planes: [[0.0; 4]; MAX_USER_CLIP_PLANES],
            clip_plane_mask: 0,
            raster_valid: true,
            raster_window: [0.0, 0.0, 0.0, 1.0],
        }
    }

    /// Reset to power-on defaults.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Store the eye-space plane equation for a user clip plane.
    pub fn set_clip_plane(&mut self, index: usize, plane: Vec4) -> Result<(), PipelineError> {
        if index >= MAX_USER_CLIP_PLANES {
            return Err(PipelineError::invalid_enum("set_clip_plane", index as u32));
        }
        self.clip_planes[index] = plane;
        Ok(())
    }

    /// Enable or disable a user clip plane.
    pub fn enable_clip_plane(&mut self, index: usize, on: bool) -> Result<(), PipelineError> {
        if index >= MAX_USER_CLIP_PLANES {
            return Err(PipelineError::invalid_enum(
                "enable_clip_plane",
                index as u32,
            ));
        }
        if on {
            self.clip_plane_mask |= 1 << index;
        } else {
            self.clip_plane_mask &= !(1 << index);
        }
        Ok(())
    }
}

impl Default for PipelineState {
    fn default() -> Self {
        Self::new()
    }
}
