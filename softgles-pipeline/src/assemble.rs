//! Primitive assembly: per-topology vertex bookkeeping and emission.
//!
//! The assembler buffers committed vertices under the topology declared by
//! `begin`, applies the trivial accept/reject decision per primitive, runs
//! the clipper when a primitive straddles the volume, finishes surviving
//! vertices with the window transform, and hands them to the rasterizer
//! collaborator.

use smallvec::SmallVec;

use crate::clip::{clip_line, clip_polygon, ClipEnv};
use crate::error::PipelineError;
use crate::state::{PipelineState, ShadeModel};
use crate::vertex::Vertex;

/// Hard cap on vertices accumulated for a single `Polygon` primitive.
pub const MAX_POLYGON_VERTICES: usize = 1024;

/// Vertex-to-primitive grouping rule declared by `begin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topology {
    Points,
    Lines,
    LineStrip,
    LineLoop,
    Triangles,
    TriangleStrip,
    TriangleFan,
    Quads,
    QuadStrip,
    Polygon,
}

/// Downstream consumer of finished, window-space primitives.
///
/// Filled primitives arrive as convex polygons of 3+ vertices; the
/// consumer owns any further decomposition into triangles or spans.
pub trait Rasterizer {
    fn point(&mut self, v: &Vertex);
    fn line(&mut self, a: &Vertex, b: &Vertex);
    fn polygon(&mut self, vertices: &[Vertex]);
}

// ---------------------------------------------------------------------------
// Emission helpers
// ---------------------------------------------------------------------------

fn clip_env<'a>(st: &'a PipelineState, unit_mask: u8) -> ClipEnv<'a> {
    ClipEnv {
        user_planes: &st.clip_planes,
        plane_mask: st.clip_plane_mask,
        lighting: st.lighting,
        unit_mask,
    }
}

fn emit_point(mut v: Vertex, st: &PipelineState, rast: &mut dyn Rasterizer) {
    if !v.outcode.is_empty() {
        return;
    }
    v.transform_window(st);
    rast.point(&v);
}

fn emit_line(
    mut a: Vertex,
    mut b: Vertex,
    st: &PipelineState,
    unit_mask: u8,
    rast: &mut dyn Rasterizer,
) {
    if !(a.outcode & b.outcode).is_empty() {
        return; // trivially rejected
    }

    // Flat shading takes the segment's second vertex as submitted, before
    // clipping can replace it with an interpolated point.
    let flat_color = b.color;

    let or_codes = a.outcode | b.outcode;
    if !or_codes.is_empty() {
        let env = clip_env(st, unit_mask);
        if !clip_line(&mut a, &mut b, or_codes, &env) {
            return; // outside, or degenerated to a point
        }
    }

    a.transform_window(st);
    b.transform_window(st);

    if st.shade_model == ShadeModel::Flat {
        a.color = flat_color;
        b.color = flat_color;
    }

    rast.line(&a, &b);
}

/// Twice the signed area of a polygon in window space; positive means
/// counter-clockwise (front-facing).
fn signed_area(verts: &[Vertex]) -> f32 {
    let mut area = 0.0;
    for i in 0..verts.len() {
        let a = verts[i].window;
        let b = verts[(i + 1) % verts.len()].window;
        area += a[0] * b[1] - b[0] * a[1];
    }
    area
}

fn emit_filled(
    verts: &[Vertex],
    provoking: &Vertex,
    st: &PipelineState,
    unit_mask: u8,
    rast: &mut dyn Rasterizer,
) {
    let mut and_codes = verts[0].outcode;
    let mut or_codes = verts[0].outcode;
    for v in &verts[1..] {
        and_codes &= v.outcode;
        or_codes |= v.outcode;
    }
    if !and_codes.is_empty() {
        return; // every vertex outside the same plane
    }

    let mut scratch: SmallVec<[Vertex; 16]> = SmallVec::from_slice(verts);
    if !or_codes.is_empty() {
        let env = clip_env(st, unit_mask);
        if !clip_polygon(&mut scratch, or_codes, &env) {
            return; // clipped below three vertices
        }
    }

    for v in scratch.iter_mut() {
        v.transform_window(st);
    }

    // Face selection happens after projection: back-facing lit primitives
    // swap in the back-material color.
    let front = signed_area(&scratch) >= 0.0;
    if st.lighting && !front {
        for v in scratch.iter_mut() {
            v.color = v.back_color;
        }
    }

    if st.shade_model == ShadeModel::Flat {
        let color = if st.lighting && !front {
            provoking.back_color
        } else {
            provoking.color
        };
        for v in scratch.iter_mut() {
            v.color = color;
        }
    }

    rast.polygon(&scratch);
}

// ---------------------------------------------------------------------------
// Assembler
// ---------------------------------------------------------------------------

/// Per-topology vertex bookkeeping between `begin` and `end`.
///
/// Buffers are cleared, not reallocated, across primitives and begin/end
/// pairs.
pub struct Assembler {
    topology: Option<Topology>,
    /// Vertices received since `begin`.
    count: usize,
    /// Group buffer for triangles, quads, quad-strip pairs, and polygons.
    pending: Vec<Vertex>,
    /// First vertex: fan center, line-loop start.
    start: Vertex,
    /// Retained vertices for strip reuse.
    prev0: Vertex,
    prev1: Vertex,
}

impl Assembler {
    pub fn new() -> Self {
        Self {
            topology: None,
            count: 0,
            pending: Vec::new(),
            start: Vertex::new(),
            prev0: Vertex::new(),
            prev1: Vertex::new(),
        }
    }

    /// Topology of the open primitive, if `begin` is active.
    pub fn topology(&self) -> Option<Topology> {
        self.topology
    }

    /// Start a new primitive. Rejected while a previous one is open.
    pub fn begin(&mut self, topology: Topology) -> Result<(), PipelineError> {
        if self.topology.is_some() {
            return Err(PipelineError::invalid_operation(
                "begin",
                "previous begin was not ended",
            ));
        }
        self.topology = Some(topology);
        self.count = 0;
        self.pending.clear();
        Ok(())
    }

    /// Feed one fully transformed, outcoded vertex.
    pub fn vertex(
        &mut self,
        v: Vertex,
        st: &PipelineState,
        unit_mask: u8,
        rast: &mut dyn Rasterizer,
    ) -> Result<(), PipelineError> {
        let topology = self.topology.ok_or_else(|| {
            PipelineError::invalid_operation("vertex", "no begin is active")
        })?;

        match topology {
            Topology::Points => emit_point(v, st, rast),

            Topology::Lines => {
                if self.count % 2 == 0 {
                    self.prev0 = v;
                } else {
                    emit_line(self.prev0, v, st, unit_mask, rast);
                }
            }

            Topology::LineStrip => {
                if self.count > 0 {
                    emit_line(self.prev1, v, st, unit_mask, rast);
                }
                self.prev1 = v;
            }

            Topology::LineLoop => {
                if self.count == 0 {
                    self.start = v;
                } else {
                    emit_line(self.prev1, v, st, unit_mask, rast);
                }
                self.prev1 = v;
            }

            Topology::Triangles => {
                self.pending.push(v);
                if self.pending.len() == 3 {
                    emit_filled(&self.pending, &v, st, unit_mask, rast);
                    self.pending.clear();
                }
            }

            Topology::TriangleStrip => match self.count {
                0 => self.prev0 = v,
                1 => self.prev1 = v,
                n => {
                    // Alternate winding so every triangle faces the same
                    // way as the first.
                    let tri = if (n - 2) % 2 == 0 {
                        [self.prev0, self.prev1, v]
                    } else {
                        [self.prev1, self.prev0, v]
                    };
                    emit_filled(&tri, &v, st, unit_mask, rast);
                    self.prev0 = self.prev1;
                    self.prev1 = v;
                }
            },

            Topology::TriangleFan => match self.count {
                0 => self.start = v,
                1 => self.prev1 = v,
                _ => {
                    let tri = [self.start, self.prev1, v];
                    emit_filled(&tri, &v, st, unit_mask, rast);
                    self.prev1 = v;
                }
            },

            Topology::Quads => {
                self.pending.push(v);
                if self.pending.len() == 4 {
                    emit_filled(&self.pending, &v, st, unit_mask, rast);
                    self.pending.clear();
                }
            }

            Topology::QuadStrip => match self.count {
                0 => self.prev0 = v,
                1 => self.prev1 = v,
                _ => {
                    self.pending.push(v);
                    if self.pending.len() == 2 {
                        let a = self.pending[0];
                        let b = self.pending[1];
                        // Strip order: the retained pair forms the leading
                        // edge, the new pair arrives swapped.
                        let quad = [self.prev0, self.prev1, b, a];
                        emit_filled(&quad, &b, st, unit_mask, rast);
                        self.prev0 = a;
                        self.prev1 = b;
                        self.pending.clear();
                    }
                }
            },

            Topology::Polygon => {
                if self.pending.len() >= MAX_POLYGON_VERTICES {
                    return Err(PipelineError::invalid_operation(
                        "vertex",
                        "polygon exceeds the maximum vertex count",
                    ));
                }
                self.pending.push(v);
            }
        }

        self.count += 1;
        Ok(())
    }

    /// Finish the open primitive: close a line loop, flush an accumulated
    /// polygon, silently drop incomplete groups.
    pub fn end(
        &mut self,
        st: &PipelineState,
        unit_mask: u8,
        rast: &mut dyn Rasterizer,
    ) -> Result<(), PipelineError> {
        let topology = self.topology.take().ok_or_else(|| {
            PipelineError::invalid_operation("end", "no begin is active")
        })?;

        match topology {
            Topology::LineLoop => {
                if self.count >= 2 {
                    emit_line(self.prev1, self.start, st, unit_mask, rast);
                }
            }
            Topology::Polygon => {
                if self.pending.len() >= 3 {
                    let provoking = self.pending[0];
                    emit_filled(&self.pending, &provoking, st, unit_mask, rast);
                }
            }
            _ => {}
        }

        self.pending.clear();
        self.count = 0;
        Ok(())
    }
}

impl Default for Assembler {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
