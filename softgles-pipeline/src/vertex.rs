//! The per-vertex working record and its lifecycle transforms.
//!
//! One record travels Empty -> Attributed -> Eye-Transformed ->
//! Clip-Transformed/Outcoded, is handed to the assembler, and — for
//! vertices that survive the clip decision — finishes with the window
//! transform. The record is reset between vertices, never reallocated,
//! and every transition recomputes from the authoritative earlier fields
//! so re-entering a state is harmless.

use crate::clip::{frustum_outcode, user_outcode, ClipFlags};
use crate::math::{dot4, normalize3, transform, transform_direction, Vec4};
use crate::state::{CurrentState, PipelineState};
use crate::texture::{TexGenMode, TextureManager, MAX_TEXTURE_UNITS};

/// Working state for one vertex as it moves through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    /// Object-space position as submitted.
    pub object: Vec4,
    /// Object-space normal snapshot.
    pub normal: Vec4,
    /// Normal transformed into eye space (valid when lighting is on).
    pub eye_normal: Vec4,
    /// Resolved front-face color, channels in [0, 1].
    pub color: Vec4,
    /// Resolved back-face color (equals `color` unless lighting is on).
    pub back_color: Vec4,
    /// Per-unit texture coordinates after generation.
    pub texcoord: [Vec4; MAX_TEXTURE_UNITS],

    /// Eye-space position (modelview applied).
    pub eye: Vec4,
    /// Clip-space position (projection applied).
    pub clip: Vec4,
    /// Normalized device coordinates (perspective divide applied).
    pub ndc: Vec4,
    /// Window coordinates; `w` carries 1/clip.w for perspective-correct
    /// attribute interpolation downstream.
    pub window: Vec4,

    /// Fog blend factor in [0, 1], 1 = unfogged.
    pub fog: f32,
    /// Clip outcode; recomputed whenever `clip` changes.
    pub outcode: ClipFlags,
}

impl Vertex {
    pub fn new() -> Self {
        Self {
            object: [0.0, 0.0, 0.0, 1.0],
            normal: [0.0, 0.0, 1.0, 0.0],
            eye_normal: [0.0, 0.0, 1.0, 0.0],
            color: [1.0, 1.0, 1.0, 1.0],
            back_color: [1.0, 1.0, 1.0, 1.0],
            texcoord: [[0.0, 0.0, 0.0, 1.0]; MAX_TEXTURE_UNITS],
            eye: [0.0, 0.0, 0.0, 1.0],
            clip: [0.0, 0.0, 0.0, 1.0],
            ndc: [0.0, 0.0, 0.0, 1.0],
            window: [0.0, 0.0, 0.0, 1.0],
            fog: 1.0,
            outcode: ClipFlags::empty(),
        }
    }

    /// Reset to the pristine state for reuse.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    // -- Empty -> Attributed --------------------------------------------

    /// Populate the record from a committed position and the current
    /// attribute state. Colors and texcoords are snapshots: later changes
    /// to the current state must not affect this vertex.
    pub fn attribute(&mut self, position: Vec4, current: &CurrentState) {
        self.object = position;
        self.normal = current.normal;
        self.color = current.color;
        self.back_color = current.color;
        self.texcoord = current.texcoord;
        self.outcode = ClipFlags::empty();
    }

    // -- Attributed -> Eye-Transformed -----------------------------------

    /// Apply the modelview transform; when lighting needs it, carry the
    /// normal into eye space as well.
    pub fn transform_eye(&mut self, st: &PipelineState) {
        self.eye = transform(&st.modelview, self.object);
        if st.lighting {
            self.eye_normal = transform_direction(&st.modelview, self.normal);
            if st.normalize_normals {
                normalize3(&mut self.eye_normal);
            }
        }
    }

    /// Replace pass-through texcoords on enabled units with generated
    /// ones. Requires the eye position, so this runs after
    /// `transform_eye`.
    pub fn apply_texgen(&mut self, textures: &TextureManager) {
        for i in 0..MAX_TEXTURE_UNITS {
            let unit = textures.unit(i);
            if !unit.enabled {
                continue;
            }
            for (coord, gen) in unit.texgen.iter().enumerate() {
                match gen.mode {
                    TexGenMode::Off => {}
                    TexGenMode::ObjectLinear => {
                        self.texcoord[i][coord] = dot4(gen.plane, self.object);
                    }
                    TexGenMode::EyeLinear => {
                        self.texcoord[i][coord] = dot4(gen.plane, self.eye);
                    }
                }
            }
        }
    }

    // -- Eye-Transformed -> Clip-Transformed -> Outcoded ------------------

    /// Apply the projection transform and immediately recompute the
    /// outcode from the new clip position. The two always travel
    /// together so the outcode can never be read stale.
    pub fn project_to_clip(&mut self, st: &PipelineState) {
        self.clip = transform(&st.projection, self.eye);
        self.outcode = frustum_outcode(self.clip)
            | user_outcode(&st.clip_planes, st.clip_plane_mask, self.eye);
    }

    // -- Accepted/Clipped -> Window-Transformed ---------------------------

    /// Perspective divide, viewport map, and fog evaluation.
    pub fn transform_window(&mut self, st: &PipelineState) {
        let w = self.clip[3];
        let inv_w = if w != 0.0 { 1.0 / w } else { 0.0 };
        self.ndc = [
            self.clip[0] * inv_w,
            self.clip[1] * inv_w,
            self.clip[2] * inv_w,
            1.0,
        ];
        let [wx, wy, wz] = st.viewport.to_window(self.ndc);
        self.window = [wx, wy, wz, inv_w];
        self.fog = if st.fog.enabled {
            st.fog.factor(self.eye[2].abs())
        } else {
            1.0
        };
    }
}

impl Default for Vertex {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{Fog, FogMode};

    #[test]
    fn attribute_snapshots_current_state() {
        let mut current = CurrentState::default();
        current.color = [0.5, 0.25, 0.125, 1.0];

        let mut v = Vertex::new();
        v.attribute([1.0, 2.0, 3.0, 1.0], &current);

        // Changing current state afterwards must not leak into the vertex.
        current.color = [0.0, 0.0, 0.0, 0.0];
        assert_eq!(v.color, [0.5, 0.25, 0.125, 1.0]);
        assert_eq!(v.object, [1.0, 2.0, 3.0, 1.0]);
    }

    #[test]
    fn eye_and_clip_transforms_compose() {
        let mut st = PipelineState::new();
        st.modelview[14] = -5.0; // translate z by -5

        let mut v = Vertex::new();
        v.attribute([0.0, 0.0, 0.0, 1.0], &st.current);
        v.transform_eye(&st);
        assert_eq!(v.eye, [0.0, 0.0, -5.0, 1.0]);

        v.project_to_clip(&st);
        assert_eq!(v.clip, [0.0, 0.0, -5.0, 1.0]);
        // z < -w, so the near bit is set in the same step.
        assert_eq!(v.outcode, ClipFlags::NEAR);
    }

    #[test]
    fn transitions_are_idempotent() {
        let mut st = PipelineState::new();
        st.modelview[12] = 2.0;

        let mut v = Vertex::new();
        v.attribute([1.0, 0.0, 0.0, 1.0], &st.current);
        v.transform_eye(&st);
        v.project_to_clip(&st);
        let (eye, clip, code) = (v.eye, v.clip, v.outcode);

        // Re-entering earlier states recomputes the same values.
        v.transform_eye(&st);
        v.project_to_clip(&st);
        assert_eq!(v.eye, eye);
        assert_eq!(v.clip, clip);
        assert_eq!(v.outcode, code);
    }

    #[test]
    fn window_transform_carries_inverse_w() {
        let mut st = PipelineState::new();
        st.viewport.width = 200.0;
        st.viewport.height = 100.0;

        let mut v = Vertex::new();
        v.clip = [1.0, -1.0, 0.0, 2.0];
        v.transform_window(&st);

        assert_eq!(v.ndc[0], 0.5);
        assert_eq!(v.ndc[1], -0.5);
        assert_eq!(v.window[3], 0.5);
        assert_eq!(v.window[0], 150.0);
        assert_eq!(v.window[1], 25.0);
    }

    #[test]
    fn fog_is_evaluated_from_eye_depth() {
        let mut st = PipelineState::new();
        st.fog = Fog {
            enabled: true,
            mode: FogMode::Linear,
            density: 1.0,
            start: 0.0,
            end: 10.0,
        };

        let mut v = Vertex::new();
        v.eye = [0.0, 0.0, -5.0, 1.0];
        v.clip = [0.0, 0.0, 0.0, 1.0];
        v.transform_window(&st);
        assert!((v.fog - 0.5).abs() < 1e-6);

        st.fog.enabled = false;
        v.transform_window(&st);
        assert_eq!(v.fog, 1.0);
    }

    #[test]
    fn normals_transform_only_under_lighting() {
        let mut st = PipelineState::new();
        st.modelview[0] = 2.0; // scale x

        let mut current = CurrentState::default();
        current.normal = [1.0, 0.0, 0.0, 0.0];

        let mut v = Vertex::new();
        v.attribute([0.0; 4], &current);
        v.transform_eye(&st);
        // Lighting off: eye normal untouched.
        assert_eq!(v.eye_normal, [0.0, 0.0, 1.0, 0.0]);

        st.lighting = true;
        st.normalize_normals = true;
        v.transform_eye(&st);
        assert_eq!(v.eye_normal, [1.0, 0.0, 0.0, 0.0]);
    }
}
