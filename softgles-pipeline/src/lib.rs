//! Fixed-function geometry pipeline for the softgles software renderer.
//!
//! This crate turns a stream of per-vertex attribute commands (or vertex
//! array descriptors) into validated, clipped, window-space primitives
//! ready for scan conversion. It owns the pipeline's mutable state — the
//! current attribute registers, texture namespace and unit bindings,
//! material state, and primitive-assembly buffers — as one explicit
//! context, [`GeometryPipeline`].
//!
//! The rasterizer that consumes finished primitives and the light
//! accumulation that feeds lit vertex colors are collaborators behind the
//! [`Rasterizer`] and [`LightAccumulator`] traits; nothing here touches
//! pixels, performs I/O, or blocks. One context is driven by one thread
//! at a time.
//!
//! ```
//! use softgles_pipeline::{GeometryPipeline, Rasterizer, Topology, Vertex};
//!
//! struct CountingRasterizer(usize);
//!
//! impl Rasterizer for CountingRasterizer {
//!     fn point(&mut self, _: &Vertex) {}
//!     fn line(&mut self, _: &Vertex, _: &Vertex) {}
//!     fn polygon(&mut self, _: &[Vertex]) {
//!         self.0 += 1;
//!     }
//! }
//!
//! let mut gp = GeometryPipeline::new();
//! let mut rast = CountingRasterizer(0);
//!
//! gp.begin(Topology::Triangles).unwrap();
//! gp.color_4u8(255, 0, 0, 255);
//! gp.vertex_3f32(-0.5, -0.5, 0.0, &mut rast).unwrap();
//! gp.vertex_3f32(0.5, -0.5, 0.0, &mut rast).unwrap();
//! gp.vertex_3f32(0.0, 0.5, 0.0, &mut rast).unwrap();
//! gp.end(&mut rast).unwrap();
//!
//! assert_eq!(rast.0, 1);
//! ```

pub mod arrays;
pub mod assemble;
pub mod attrib;
pub mod clip;
pub mod context;
pub mod error;
pub mod fixed;
pub mod lighting;
pub mod math;
pub mod state;
pub mod texture;
pub mod vertex;

pub use arrays::{ArraySet, AttribPointer, ElementIndices};
pub use assemble::{Assembler, Rasterizer, Topology};
pub use attrib::{ArraySource, AttribKind, AttribType};
pub use clip::ClipFlags;
pub use context::GeometryPipeline;
pub use error::PipelineError;
pub use lighting::{LightAccumulator, Material, MaterialFace, NoLights};
pub use state::{Fog, FogMode, PipelineState, ShadeModel, Viewport};
pub use texture::{TexParameter, TextureManager, TextureTarget};
pub use vertex::Vertex;
