//! Vertex array descriptors and the array fetcher.
//!
//! A descriptor is a non-owning view over caller-owned storage; the caller
//! guarantees the logical layout (component count, stride) matches the
//! storage for the duration of the draw call. The fetcher performs no
//! layout validation at draw time — a descriptor that lies about its
//! stride will panic on slice indexing rather than read out of bounds,
//! but silent misreads within bounds are the caller's problem.

use crate::attrib::{ArraySource, AttribKind};
use crate::error::PipelineError;
use crate::math::Vec4;
use crate::texture::MAX_TEXTURE_UNITS;

/// Descriptor for one attribute stream of a vertex array draw.
#[derive(Debug, Clone, Copy)]
pub struct AttribPointer<'a> {
    kind: AttribKind,
    size: usize,
    stride: usize,
    source: ArraySource<'a>,
}

impl<'a> AttribPointer<'a> {
    /// Build a descriptor, validating the component count against the
    /// attribute's legal range. The stride is counted in storage units;
    /// 0 means tightly packed (stride = component count).
    pub fn new(
        kind: AttribKind,
        size: usize,
        stride: usize,
        source: ArraySource<'a>,
    ) -> Result<Self, PipelineError> {
        let (min, max) = kind.component_range();
        if size < min || size > max {
            return Err(PipelineError::invalid_enum("attrib_pointer", size as u32));
        }
        Ok(Self {
            kind,
            size,
            stride,
            source,
        })
    }

    pub fn kind(&self) -> AttribKind {
        self.kind
    }

    fn effective_stride(&self) -> usize {
        if self.stride == 0 {
            self.size
        } else {
            self.stride
        }
    }

    /// Fetch and decode the attribute for `index`.
    ///
    /// Missing components take the attribute's defaults (position w = 1,
    /// texcoord q = 1, ...).
    pub fn fetch(&self, index: usize) -> Vec4 {
        let base = index * self.effective_stride();
        let mut out = self.kind.default_components();
        for c in 0..self.size {
            out[c] = self.source.fetch_component(self.kind, base + c);
        }
        out
    }
}

/// The set of attribute streams for array-mode drawing.
///
/// Arrays that are not set simply leave the corresponding current state
/// untouched during the draw; a draw without a position array emits no
/// vertices at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArraySet<'a> {
    pub(crate) position: Option<AttribPointer<'a>>,
    pub(crate) normal: Option<AttribPointer<'a>>,
    pub(crate) color: Option<AttribPointer<'a>>,
    pub(crate) texcoord: [Option<AttribPointer<'a>>; MAX_TEXTURE_UNITS],
}

impl<'a> ArraySet<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_position(
        &mut self,
        size: usize,
        stride: usize,
        source: ArraySource<'a>,
    ) -> Result<(), PipelineError> {
        self.position = Some(AttribPointer::new(
            AttribKind::Position,
            size,
            stride,
            source,
        )?);
        Ok(())
    }

    pub fn set_normal(
        &mut self,
        stride: usize,
        source: ArraySource<'a>,
    ) -> Result<(), PipelineError> {
        self.normal = Some(AttribPointer::new(AttribKind::Normal, 3, stride, source)?);
        Ok(())
    }

    pub fn set_color(
        &mut self,
        size: usize,
        stride: usize,
        source: ArraySource<'a>,
    ) -> Result<(), PipelineError> {
        self.color = Some(AttribPointer::new(AttribKind::Color, size, stride, source)?);
        Ok(())
    }

    /// Set the texcoord stream for one texture unit.
    pub fn set_texcoord(
        &mut self,
        unit: usize,
        size: usize,
        stride: usize,
        source: ArraySource<'a>,
    ) -> Result<(), PipelineError> {
        if unit >= MAX_TEXTURE_UNITS {
            return Err(PipelineError::invalid_enum("set_texcoord", unit as u32));
        }
        self.texcoord[unit] = Some(AttribPointer::new(
            AttribKind::TexCoord,
            size,
            stride,
            source,
        )?);
        Ok(())
    }

    pub fn clear_position(&mut self) {
        self.position = None;
    }

    pub fn clear_normal(&mut self) {
        self.normal = None;
    }

    pub fn clear_color(&mut self) {
        self.color = None;
    }

    pub fn clear_texcoord(&mut self, unit: usize) {
        if unit < MAX_TEXTURE_UNITS {
            self.texcoord[unit] = None;
        }
    }
}

/// Typed index stream for `draw_elements`.
///
/// The source profile supports 8- and 16-bit indices only; the slice
/// length doubles as the element count.
#[derive(Debug, Clone, Copy)]
pub enum ElementIndices<'a> {
    U8(&'a [u8]),
    U16(&'a [u16]),
}

impl<'a> ElementIndices<'a> {
    pub fn len(&self) -> usize {
        match self {
            ElementIndices::U8(s) => s.len(),
            ElementIndices::U16(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, i: usize) -> usize {
        match self {
            ElementIndices::U8(s) => s[i] as usize,
            ElementIndices::U16(s) => s[i] as usize,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tightly_packed_fetch() {
        let data: [f32; 9] = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        let ptr =
            AttribPointer::new(AttribKind::Position, 3, 0, ArraySource::Float(&data)).unwrap();
        assert_eq!(ptr.fetch(0), [0.0, 1.0, 2.0, 1.0]);
        assert_eq!(ptr.fetch(2), [6.0, 7.0, 8.0, 1.0]);
    }

    #[test]
    fn explicit_stride_skips_padding() {
        // xyz plus one unit of padding per vertex.
        let data: [f32; 8] = [0.0, 1.0, 2.0, 99.0, 3.0, 4.0, 5.0, 99.0];
        let ptr =
            AttribPointer::new(AttribKind::Position, 3, 4, ArraySource::Float(&data)).unwrap();
        assert_eq!(ptr.fetch(1), [3.0, 4.0, 5.0, 1.0]);
    }

    #[test]
    fn normal_requires_three_components() {
        let data: [f32; 4] = [0.0; 4];
        let err = AttribPointer::new(AttribKind::Normal, 2, 0, ArraySource::Float(&data))
            .unwrap_err();
        assert_eq!(
            err,
            PipelineError::InvalidEnum {
                call: "attrib_pointer",
                value: 2
            }
        );
    }

    #[test]
    fn color_byte_fetch_normalizes() {
        let data: [i8; 8] = [-1, -1, 0, -1, 0, 0, -1, -1];
        let ptr = AttribPointer::new(AttribKind::Color, 4, 0, ArraySource::Byte(&data)).unwrap();
        assert_eq!(ptr.fetch(0), [1.0, 1.0, 0.0, 1.0]);
        assert_eq!(ptr.fetch(1), [0.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn short_positions_fill_defaults() {
        let data: [i16; 4] = [10, 20, 30, 40];
        let ptr =
            AttribPointer::new(AttribKind::Position, 2, 0, ArraySource::Short(&data)).unwrap();
        // Two supplied components, z and w from defaults.
        assert_eq!(ptr.fetch(1), [30.0, 40.0, 0.0, 1.0]);
    }

    #[test]
    fn element_indices_widths() {
        let bytes = [1u8, 2, 3];
        let shorts = [300u16, 4];
        assert_eq!(ElementIndices::U8(&bytes).get(2), 3);
        assert_eq!(ElementIndices::U16(&shorts).get(0), 300);
        assert_eq!(ElementIndices::U8(&bytes).len(), 3);
    }
}
