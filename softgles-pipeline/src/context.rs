//! The `GeometryPipeline` facade: the command surface callers drive.
//!
//! Owns one context's full mutable state (attribute currents, transform
//! snapshot, texture namespace, assembly buffers) and routes both the
//! immediate-mode and array-mode command paths through the same vertex
//! lifecycle. Single-threaded by design: one context, one driving thread,
//! no interior locking.

use log::debug;

use crate::arrays::{ArraySet, ElementIndices};
use crate::assemble::{Assembler, Rasterizer, Topology};
use crate::error::PipelineError;
use crate::fixed::{fixed_to_f32, Fixed};
use crate::lighting::{resolve_lit_color, LightAccumulator, Material, MaterialFace, NoLights};
use crate::math::{Mat4, Vec4};
use crate::state::PipelineState;
use crate::texture::{TextureManager, MAX_TEXTURE_UNITS};
use crate::vertex::Vertex;

/// One software geometry-pipeline context.
pub struct GeometryPipeline {
    /// All per-context mutable state except textures and assembly buffers.
    pub state: PipelineState,
    /// Texture namespace and unit bindings.
    pub textures: TextureManager,
    assembler: Assembler,
    lights: Box<dyn LightAccumulator>,
    /// Working vertex record, reset (not reallocated) between vertices.
    vertex: Vertex,
}

impl GeometryPipeline {
    pub fn new() -> Self {
        Self {
            state: PipelineState::new(),
            textures: TextureManager::new(),
            assembler: Assembler::new(),
            lights: Box::new(NoLights),
            vertex: Vertex::new(),
        }
    }

    /// Reset everything to power-on defaults, keeping the installed
    /// light accumulator.
    pub fn reset(&mut self) {
        self.state.reset();
        self.textures = TextureManager::new();
        self.assembler = Assembler::new();
        self.vertex.reset();
    }

    /// Install the light-accumulation collaborator consulted per vertex
    /// while lighting is enabled.
    pub fn set_lights(&mut self, lights: Box<dyn LightAccumulator>) {
        self.lights = lights;
    }

    // -- Transform snapshot (built by the caller's matrix stack) ---------

    pub fn set_modelview(&mut self, m: Mat4) {
        self.state.modelview = m;
    }

    pub fn set_projection(&mut self, m: Mat4) {
        self.state.projection = m;
    }

    pub fn set_viewport(&mut self, x: f32, y: f32, width: f32, height: f32) {
        self.state.viewport.x = x;
        self.state.viewport.y = y;
        self.state.viewport.width = width;
        self.state.viewport.height = height;
    }

    pub fn set_depth_range(&mut self, near: f32, far: f32) {
        self.state.viewport.near = near;
        self.state.viewport.far = far;
    }

    // -- Material state --------------------------------------------------

    fn for_faces(&mut self, face: MaterialFace, f: impl Fn(&mut Material)) {
        match face {
            MaterialFace::Front => f(&mut self.state.front_material),
            MaterialFace::Back => f(&mut self.state.back_material),
            MaterialFace::FrontAndBack => {
                f(&mut self.state.front_material);
                f(&mut self.state.back_material);
            }
        }
    }

    pub fn set_material_ambient(&mut self, face: MaterialFace, color: Vec4) {
        self.for_faces(face, |m| m.ambient = color);
    }

    pub fn set_material_diffuse(&mut self, face: MaterialFace, color: Vec4) {
        self.for_faces(face, |m| m.diffuse = color);
    }

    pub fn set_material_specular(&mut self, face: MaterialFace, color: Vec4) {
        self.for_faces(face, |m| m.specular = color);
    }

    pub fn set_material_emissive(&mut self, face: MaterialFace, color: Vec4) {
        self.for_faces(face, |m| m.emissive = color);
    }

    pub fn set_material_shininess(&mut self, face: MaterialFace, exponent: f32) {
        self.for_faces(face, |m| m.shininess = exponent);
    }

    // -- Current attribute state, one setter per encoding ----------------

    pub fn color_4f32(&mut self, r: f32, g: f32, b: f32, a: f32) {
        self.state.current.color = [r, g, b, a];
    }

    pub fn color_4u8(&mut self, r: u8, g: u8, b: u8, a: u8) {
        self.state.current.color = [
            r as f32 / 255.0,
            g as f32 / 255.0,
            b as f32 / 255.0,
            a as f32 / 255.0,
        ];
    }

    pub fn color_4i16(&mut self, r: i16, g: i16, b: i16, a: i16) {
        self.state.current.color = [
            r as f32 / 32767.0,
            g as f32 / 32767.0,
            b as f32 / 32767.0,
            a as f32 / 32767.0,
        ];
    }

    pub fn color_4x(&mut self, r: Fixed, g: Fixed, b: Fixed, a: Fixed) {
        self.state.current.color = [
            fixed_to_f32(r),
            fixed_to_f32(g),
            fixed_to_f32(b),
            fixed_to_f32(a),
        ];
    }

    pub fn normal_3f32(&mut self, x: f32, y: f32, z: f32) {
        self.state.current.normal = [x, y, z, 0.0];
    }

    pub fn normal_3i8(&mut self, x: i8, y: i8, z: i8) {
        self.normal_3f32(x as f32, y as f32, z as f32);
    }

    pub fn normal_3i16(&mut self, x: i16, y: i16, z: i16) {
        self.normal_3f32(x as f32, y as f32, z as f32);
    }

    pub fn normal_3x(&mut self, x: Fixed, y: Fixed, z: Fixed) {
        self.normal_3f32(fixed_to_f32(x), fixed_to_f32(y), fixed_to_f32(z));
    }

    pub fn texcoord_4f32(
        &mut self,
        unit: usize,
        s: f32,
        t: f32,
        r: f32,
        q: f32,
    ) -> Result<(), PipelineError> {
        if unit >= MAX_TEXTURE_UNITS {
            return Err(PipelineError::invalid_enum("texcoord", unit as u32));
        }
        self.state.current.texcoord[unit] = [s, t, r, q];
        Ok(())
    }

    pub fn texcoord_2f32(&mut self, unit: usize, s: f32, t: f32) -> Result<(), PipelineError> {
        self.texcoord_4f32(unit, s, t, 0.0, 1.0)
    }

    pub fn texcoord_2i8(&mut self, unit: usize, s: i8, t: i8) -> Result<(), PipelineError> {
        self.texcoord_2f32(unit, s as f32, t as f32)
    }

    pub fn texcoord_2i16(&mut self, unit: usize, s: i16, t: i16) -> Result<(), PipelineError> {
        self.texcoord_2f32(unit, s as f32, t as f32)
    }

    pub fn texcoord_2x(&mut self, unit: usize, s: Fixed, t: Fixed) -> Result<(), PipelineError> {
        self.texcoord_2f32(unit, fixed_to_f32(s), fixed_to_f32(t))
    }

    // -- Immediate mode --------------------------------------------------

    /// Open a primitive under `topology`.
    pub fn begin(&mut self, topology: Topology) -> Result<(), PipelineError> {
        self.assembler.begin(topology)
    }

    /// Close the open primitive, flushing loop/polygon finalization into
    /// the rasterizer.
    pub fn end(&mut self, rast: &mut dyn Rasterizer) -> Result<(), PipelineError> {
        let unit_mask = self.textures.enabled_unit_mask();
        self.assembler.end(&self.state, unit_mask, rast)
    }

    pub fn vertex_2f32(
        &mut self,
        x: f32,
        y: f32,
        rast: &mut dyn Rasterizer,
    ) -> Result<(), PipelineError> {
        self.commit([x, y, 0.0, 1.0], rast)
    }

    pub fn vertex_3f32(
        &mut self,
        x: f32,
        y: f32,
        z: f32,
        rast: &mut dyn Rasterizer,
    ) -> Result<(), PipelineError> {
        self.commit([x, y, z, 1.0], rast)
    }

    pub fn vertex_4f32(
        &mut self,
        x: f32,
        y: f32,
        z: f32,
        w: f32,
        rast: &mut dyn Rasterizer,
    ) -> Result<(), PipelineError> {
        self.commit([x, y, z, w], rast)
    }

    pub fn vertex_3i8(
        &mut self,
        x: i8,
        y: i8,
        z: i8,
        rast: &mut dyn Rasterizer,
    ) -> Result<(), PipelineError> {
        self.commit([x as f32, y as f32, z as f32, 1.0], rast)
    }

    pub fn vertex_3i16(
        &mut self,
        x: i16,
        y: i16,
        z: i16,
        rast: &mut dyn Rasterizer,
    ) -> Result<(), PipelineError> {
        self.commit([x as f32, y as f32, z as f32, 1.0], rast)
    }

    pub fn vertex_3x(
        &mut self,
        x: Fixed,
        y: Fixed,
        z: Fixed,
        rast: &mut dyn Rasterizer,
    ) -> Result<(), PipelineError> {
        self.commit([fixed_to_f32(x), fixed_to_f32(y), fixed_to_f32(z), 1.0], rast)
    }

    /// Commit one vertex: snapshot attributes, run the lifecycle through
    /// outcoding, and feed the assembler.
    fn commit(&mut self, position: Vec4, rast: &mut dyn Rasterizer) -> Result<(), PipelineError> {
        self.vertex.attribute(position, &self.state.current);
        self.vertex.transform_eye(&self.state);
        self.vertex.apply_texgen(&self.textures);

        if self.state.lighting {
            self.vertex.color = resolve_lit_color(
                &self.state.front_material,
                self.state.scene_ambient,
                self.lights.as_ref(),
                self.vertex.eye,
                self.vertex.eye_normal,
            );
            let n = self.vertex.eye_normal;
            self.vertex.back_color = resolve_lit_color(
                &self.state.back_material,
                self.state.scene_ambient,
                self.lights.as_ref(),
                self.vertex.eye,
                [-n[0], -n[1], -n[2], 0.0],
            );
        }

        self.vertex.project_to_clip(&self.state);

        let unit_mask = self.textures.enabled_unit_mask();
        self.assembler
            .vertex(self.vertex, &self.state, unit_mask, rast)
    }

    // -- Raster position -------------------------------------------------

    /// Run a position through the vertex lifecycle and latch it as the
    /// current raster position; a position outside the clip volume marks
    /// the raster state invalid instead.
    pub fn set_raster_pos(&mut self, position: Vec4) {
        let mut v = Vertex::new();
        v.attribute(position, &self.state.current);
        v.transform_eye(&self.state);
        v.project_to_clip(&self.state);

        if v.outcode.is_empty() {
            v.transform_window(&self.state);
            self.state.raster_valid = true;
            self.state.raster_window = v.window;
        } else {
            self.state.raster_valid = false;
        }
    }

    // -- Array mode ------------------------------------------------------

    /// Fetch index `i` from every set array, update the current state,
    /// and commit a vertex when a position stream is present.
    pub fn array_element(
        &mut self,
        arrays: &ArraySet<'_>,
        index: usize,
        rast: &mut dyn Rasterizer,
    ) -> Result<(), PipelineError> {
        if let Some(ptr) = &arrays.color {
            self.state.current.color = ptr.fetch(index);
        }
        if let Some(ptr) = &arrays.normal {
            self.state.current.normal = ptr.fetch(index);
        }
        for unit in 0..MAX_TEXTURE_UNITS {
            if let Some(ptr) = &arrays.texcoord[unit] {
                self.state.current.texcoord[unit] = ptr.fetch(index);
            }
        }
        if let Some(ptr) = &arrays.position {
            let position = ptr.fetch(index);
            self.commit(position, rast)?;
        }
        Ok(())
    }

    /// Assemble `count` consecutive array elements starting at `first`
    /// under `topology`.
    pub fn draw_arrays(
        &mut self,
        arrays: &ArraySet<'_>,
        topology: Topology,
        first: usize,
        count: usize,
        rast: &mut dyn Rasterizer,
    ) -> Result<(), PipelineError> {
        if arrays.position.is_none() {
            debug!("draw_arrays: no position array set, nothing will be emitted");
        }
        self.begin(topology)?;
        for i in 0..count {
            self.array_element(arrays, first + i, rast)?;
        }
        self.end(rast)
    }

    /// Assemble indexed array elements under `topology`.
    pub fn draw_elements(
        &mut self,
        arrays: &ArraySet<'_>,
        topology: Topology,
        indices: ElementIndices<'_>,
        rast: &mut dyn Rasterizer,
    ) -> Result<(), PipelineError> {
        if arrays.position.is_none() {
            debug!("draw_elements: no position array set, nothing will be emitted");
        }
        self.begin(topology)?;
        for i in 0..indices.len() {
            self.array_element(arrays, indices.get(i), rast)?;
        }
        self.end(rast)
    }
}

impl Default for GeometryPipeline {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attrib::ArraySource;

    #[derive(Default)]
    struct Recorder {
        points: Vec<Vertex>,
        lines: Vec<(Vertex, Vertex)>,
        polygons: Vec<Vec<Vertex>>,
    }

    impl Rasterizer for Recorder {
        fn point(&mut self, v: &Vertex) {
            self.points.push(*v);
        }
        fn line(&mut self, a: &Vertex, b: &Vertex) {
            self.lines.push((*a, *b));
        }
        fn polygon(&mut self, vertices: &[Vertex]) {
            self.polygons.push(vertices.to_vec());
        }
    }

    #[test]
    fn immediate_mode_triangle_reaches_the_rasterizer() {
        let mut gp = GeometryPipeline::new();
        let mut rec = Recorder::default();

        gp.begin(Topology::Triangles).unwrap();
        gp.vertex_3f32(-0.5, -0.5, 0.0, &mut rec).unwrap();
        gp.vertex_3f32(0.5, -0.5, 0.0, &mut rec).unwrap();
        gp.vertex_3f32(0.0, 0.5, 0.0, &mut rec).unwrap();
        gp.end(&mut rec).unwrap();

        assert_eq!(rec.polygons.len(), 1);
        // Default viewport is 640x480; the apex lands mid-width.
        let apex = rec.polygons[0][2].window;
        assert!((apex[0] - 320.0).abs() < 1e-3);
        assert!((apex[1] - 360.0).abs() < 1e-3);
    }

    #[test]
    fn color_snapshot_does_not_track_later_changes() {
        let mut gp = GeometryPipeline::new();
        let mut rec = Recorder::default();

        gp.begin(Topology::Triangles).unwrap();
        gp.color_4f32(1.0, 0.0, 0.0, 1.0);
        gp.vertex_3f32(-0.5, -0.5, 0.0, &mut rec).unwrap();
        gp.color_4f32(0.0, 1.0, 0.0, 1.0);
        gp.vertex_3f32(0.5, -0.5, 0.0, &mut rec).unwrap();
        gp.color_4f32(0.0, 0.0, 1.0, 1.0);
        gp.vertex_3f32(0.0, 0.5, 0.0, &mut rec).unwrap();
        gp.end(&mut rec).unwrap();

        let poly = &rec.polygons[0];
        assert_eq!(poly[0].color, [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(poly[1].color, [0.0, 1.0, 0.0, 1.0]);
        assert_eq!(poly[2].color, [0.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn stale_attributes_carry_forward() {
        let mut gp = GeometryPipeline::new();
        let mut rec = Recorder::default();

        gp.color_4u8(255, 128, 0, 255);
        gp.begin(Topology::Points).unwrap();
        gp.vertex_3f32(0.0, 0.0, 0.0, &mut rec).unwrap();
        gp.vertex_3f32(0.25, 0.0, 0.0, &mut rec).unwrap();
        gp.end(&mut rec).unwrap();

        // Both points snapshot the same sticky color.
        assert_eq!(rec.points[0].color, rec.points[1].color);
        assert!((rec.points[0].color[1] - 128.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn fixed_point_vertices_match_float_vertices() {
        let mut gp = GeometryPipeline::new();
        let mut rec = Recorder::default();

        gp.begin(Topology::Points).unwrap();
        gp.vertex_3x(1 << 15, -(1 << 15), 0, &mut rec).unwrap();
        gp.vertex_3f32(0.5, -0.5, 0.0, &mut rec).unwrap();
        gp.end(&mut rec).unwrap();

        assert_eq!(rec.points[0].clip, rec.points[1].clip);
    }

    #[test]
    fn lighting_resolves_from_materials_not_current_color() {
        let mut gp = GeometryPipeline::new();
        let mut rec = Recorder::default();

        gp.state.lighting = true;
        gp.state.scene_ambient = [1.0, 1.0, 1.0, 1.0];
        gp.set_material_ambient(MaterialFace::Front, [0.0, 0.0, 0.0, 1.0]);
        gp.set_material_emissive(MaterialFace::Front, [0.0, 0.5, 0.0, 1.0]);
        gp.color_4f32(1.0, 0.0, 0.0, 1.0); // must be ignored under lighting

        gp.begin(Topology::Points).unwrap();
        gp.vertex_3f32(0.0, 0.0, 0.0, &mut rec).unwrap();
        gp.end(&mut rec).unwrap();

        let c = rec.points[0].color;
        assert_eq!(c[0], 0.0);
        assert!((c[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn draw_arrays_follows_the_same_path() {
        let mut gp = GeometryPipeline::new();
        let mut rec = Recorder::default();

        let positions: [f32; 9] = [-0.5, -0.5, 0.0, 0.5, -0.5, 0.0, 0.0, 0.5, 0.0];
        let colors: [i8; 12] = [-1, 0, 0, -1, 0, -1, 0, -1, 0, 0, -1, -1];

        let mut arrays = ArraySet::new();
        arrays
            .set_position(3, 0, ArraySource::Float(&positions))
            .unwrap();
        arrays.set_color(4, 0, ArraySource::Byte(&colors)).unwrap();

        gp.draw_arrays(&arrays, Topology::Triangles, 0, 3, &mut rec)
            .unwrap();

        assert_eq!(rec.polygons.len(), 1);
        assert_eq!(rec.polygons[0][0].color, [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(rec.polygons[0][1].color, [0.0, 1.0, 0.0, 1.0]);
    }

    #[test]
    fn draw_elements_reuses_vertices_by_index() {
        let mut gp = GeometryPipeline::new();
        let mut rec = Recorder::default();

        // A quad as two triangles over four stored vertices.
        let positions: [f32; 12] = [
            -0.5, -0.5, 0.0, //
            0.5, -0.5, 0.0, //
            0.5, 0.5, 0.0, //
            -0.5, 0.5, 0.0,
        ];
        let indices: [u8; 6] = [0, 1, 2, 0, 2, 3];

        let mut arrays = ArraySet::new();
        arrays
            .set_position(3, 0, ArraySource::Float(&positions))
            .unwrap();

        gp.draw_elements(
            &arrays,
            Topology::Triangles,
            ElementIndices::U8(&indices),
            &mut rec,
        )
        .unwrap();

        assert_eq!(rec.polygons.len(), 2);
        assert_eq!(rec.polygons[0][0].clip, rec.polygons[1][0].clip);
    }

    #[test]
    fn array_element_without_position_only_updates_currents() {
        let mut gp = GeometryPipeline::new();
        let mut rec = Recorder::default();

        let colors: [f32; 4] = [0.25, 0.5, 0.75, 1.0];
        let mut arrays = ArraySet::new();
        arrays.set_color(4, 0, ArraySource::Float(&colors)).unwrap();

        gp.begin(Topology::Points).unwrap();
        gp.array_element(&arrays, 0, &mut rec).unwrap();
        gp.end(&mut rec).unwrap();

        assert!(rec.points.is_empty());
        assert_eq!(gp.state.current.color, [0.25, 0.5, 0.75, 1.0]);
    }

    #[test]
    fn raster_pos_validity_follows_the_clip_volume() {
        let mut gp = GeometryPipeline::new();

        gp.set_raster_pos([0.0, 0.0, 0.0, 1.0]);
        assert!(gp.state.raster_valid);
        assert_eq!(gp.state.raster_window[0], 320.0);
        assert_eq!(gp.state.raster_window[1], 240.0);

        gp.set_raster_pos([5.0, 0.0, 0.0, 1.0]);
        assert!(!gp.state.raster_valid);
    }

    #[test]
    fn texcoord_unit_is_validated() {
        let mut gp = GeometryPipeline::new();
        assert!(gp.texcoord_2f32(0, 0.5, 0.5).is_ok());
        let err = gp.texcoord_2f32(MAX_TEXTURE_UNITS, 0.5, 0.5).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidEnum { .. }));
    }

    #[test]
    fn texgen_overrides_current_texcoords() {
        let mut gp = GeometryPipeline::new();
        let mut rec = Recorder::default();

        gp.textures.set_unit_enabled(true);
        gp.textures
            .set_texgen(
                0,
                crate::texture::TexGenMode::ObjectLinear,
                [1.0, 0.0, 0.0, 0.0],
            )
            .unwrap();

        gp.texcoord_2f32(0, 9.0, 9.0).unwrap();
        gp.begin(Topology::Points).unwrap();
        gp.vertex_3f32(0.25, 0.0, 0.0, &mut rec).unwrap();
        gp.end(&mut rec).unwrap();

        let tc = rec.points[0].texcoord[0];
        assert!((tc[0] - 0.25).abs() < 1e-6); // generated from object x
        assert_eq!(tc[1], 9.0); // t untouched, generation is per coordinate
    }
}
