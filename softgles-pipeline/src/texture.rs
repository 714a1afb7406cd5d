//! Texture object namespace and per-unit binding state.
//!
//! The manager exclusively owns every texture object. Units hold names,
//! not references; name 0 addresses a shared per-target default object
//! that always exists and can never be deleted. A texture object's
//! dimensionality is fixed by its first bind and immutable afterwards.
//!
//! Raw parameter values arrive as integer codes and are decoded through
//! closed enums before any state is touched, so an illegal code rejects
//! the whole call.

use std::collections::HashMap;

use log::warn;

use crate::error::PipelineError;
use crate::math::Vec4;

/// Number of parallel texture units.
pub const MAX_TEXTURE_UNITS: usize = 4;

/// Upper bound on mip levels per texture object (2048x2048 base level).
pub const MAX_MIP_LEVELS: usize = 12;

// ---------------------------------------------------------------------------
// Enumerated state
// ---------------------------------------------------------------------------

/// Texture dimensionality, fixed at first bind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TextureTarget {
    Tex1D = 0,
    Tex2D = 1,
    Tex3D = 2,
}

impl TextureTarget {
    pub const COUNT: usize = 3;

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Per-axis wrap behavior.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WrapMode {
    Clamp = 0,
    #[default]
    Repeat = 1,
}

impl WrapMode {
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Self::Clamp),
            1 => Some(Self::Repeat),
            _ => None,
        }
    }
}

/// Minification filter, including the four mipmapped variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MinFilter {
    Nearest = 0,
    Linear = 1,
    NearestMipmapNearest = 2,
    LinearMipmapNearest = 3,
    NearestMipmapLinear = 4,
    LinearMipmapLinear = 5,
}

impl MinFilter {
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Self::Nearest),
            1 => Some(Self::Linear),
            2 => Some(Self::NearestMipmapNearest),
            3 => Some(Self::LinearMipmapNearest),
            4 => Some(Self::NearestMipmapLinear),
            5 => Some(Self::LinearMipmapLinear),
            _ => None,
        }
    }
}

impl Default for MinFilter {
    fn default() -> Self {
        Self::NearestMipmapLinear
    }
}

/// Magnification filter; mipmap variants are not legal here.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MagFilter {
    Nearest = 0,
    #[default]
    Linear = 1,
}

impl MagFilter {
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Self::Nearest),
            1 => Some(Self::Linear),
            _ => None,
        }
    }
}

/// Which object parameter a `set_parameter` call addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TexParameter {
    WrapS,
    WrapT,
    WrapR,
    MinFilter,
    MagFilter,
}

/// Texture environment combine mode for a unit.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EnvMode {
    #[default]
    Modulate = 0,
    Decal = 1,
    Blend = 2,
    Replace = 3,
    Add = 4,
}

impl EnvMode {
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Self::Modulate),
            1 => Some(Self::Decal),
            2 => Some(Self::Blend),
            3 => Some(Self::Replace),
            4 => Some(Self::Add),
            _ => None,
        }
    }
}

/// Coordinate generation mode for one of s/t/r/q.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum TexGenMode {
    /// Pass the current texcoord through.
    #[default]
    Off,
    /// Dot the plane against the object-space position.
    ObjectLinear,
    /// Dot the plane against the eye-space position.
    EyeLinear,
}

/// Generation state for a single texture coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TexGen {
    pub mode: TexGenMode,
    pub plane: Vec4,
}

// ---------------------------------------------------------------------------
// Objects and units
// ---------------------------------------------------------------------------

/// One mip level's image data and layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MipLevel {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub border: u32,
    pub data: Vec<u8>,
}

/// Caller-supplied image for `set_image`.
#[derive(Debug, Clone)]
pub struct TexImage {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub data: Vec<u8>,
}

/// A named texture object: dimensionality, mip chain, sampling parameters.
#[derive(Debug, Clone)]
pub struct TextureObject {
    name: u32,
    target: Option<TextureTarget>,
    levels: [Option<MipLevel>; MAX_MIP_LEVELS],
    pub wrap_s: WrapMode,
    pub wrap_t: WrapMode,
    pub wrap_r: WrapMode,
    pub min_filter: MinFilter,
    pub mag_filter: MagFilter,
}

impl TextureObject {
    fn new(name: u32, target: Option<TextureTarget>) -> Self {
        Self {
            name,
            target,
            levels: std::array::from_fn(|_| None),
            wrap_s: WrapMode::default(),
            wrap_t: WrapMode::default(),
            wrap_r: WrapMode::default(),
            min_filter: MinFilter::default(),
            mag_filter: MagFilter::default(),
        }
    }

    pub fn name(&self) -> u32 {
        self.name
    }

    /// Dimensionality, `None` until the first bind fixes it.
    pub fn target(&self) -> Option<TextureTarget> {
        self.target
    }

    pub fn level(&self, level: usize) -> Option<&MipLevel> {
        self.levels.get(level).and_then(|l| l.as_ref())
    }
}

/// Per-unit binding and coordinate-generation state.
#[derive(Debug, Clone)]
pub struct TextureUnit {
    pub enabled: bool,
    /// Bound object name per dimensionality; 0 = shared default object.
    bound: [u32; TextureTarget::COUNT],
    pub texgen: [TexGen; 4],
    pub env_mode: EnvMode,
    pub env_color: Vec4,
}

impl TextureUnit {
    fn new() -> Self {
        // GL-style default generation planes: s and t along x and y.
        let plane = |i: usize| -> Vec4 {
            match i {
                0 => [1.0, 0.0, 0.0, 0.0],
                1 => [0.0, 1.0, 0.0, 0.0],
                _ => [0.0, 0.0, 0.0, 0.0],
            }
        };
        Self {
            enabled: false,
            bound: [0; TextureTarget::COUNT],
            texgen: std::array::from_fn(|i| TexGen {
                mode: TexGenMode::Off,
                plane: plane(i),
            }),
            env_mode: EnvMode::default(),
            env_color: [0.0, 0.0, 0.0, 0.0],
        }
    }

    pub fn bound_name(&self, target: TextureTarget) -> u32 {
        self.bound[target.index()]
    }
}

// ---------------------------------------------------------------------------
// Manager
// ---------------------------------------------------------------------------

/// Owner of the texture namespace and all unit state.
#[derive(Debug)]
pub struct TextureManager {
    objects: HashMap<u32, TextureObject>,
    /// The never-deletable name-0 objects, one per dimensionality.
    defaults: [TextureObject; TextureTarget::COUNT],
    units: [TextureUnit; MAX_TEXTURE_UNITS],
    active: usize,
}

impl TextureManager {
    pub fn new() -> Self {
        Self {
            objects: HashMap::new(),
            defaults: [
                TextureObject::new(0, Some(TextureTarget::Tex1D)),
                TextureObject::new(0, Some(TextureTarget::Tex2D)),
                TextureObject::new(0, Some(TextureTarget::Tex3D)),
            ],
            units: std::array::from_fn(|_| TextureUnit::new()),
            active: 0,
        }
    }

    // -- Namespace -------------------------------------------------------

    /// Reserve the first `n` unused names (>= 1), each backed by a
    /// placeholder object whose dimensionality is not yet fixed.
    pub fn generate_names(&mut self, n: usize) -> Vec<u32> {
        let mut out = Vec::with_capacity(n);
        let mut candidate = 1u32;
        while out.len() < n {
            if !self.objects.contains_key(&candidate) {
                self.objects
                    .insert(candidate, TextureObject::new(candidate, None));
                out.push(candidate);
            }
            candidate += 1;
        }
        out
    }

    /// Delete objects by name. Units bound to a deleted name revert to
    /// the shared default. Name 0 and unknown names are ignored.
    pub fn delete_names(&mut self, names: &[u32]) {
        for &name in names {
            if name == 0 {
                warn!("delete_names: name 0 is reserved and never deletable");
                continue;
            }
            if self.objects.remove(&name).is_none() {
                continue;
            }
            for unit in &mut self.units {
                for slot in &mut unit.bound {
                    if *slot == name {
                        *slot = 0;
                    }
                }
            }
        }
    }

    // -- Unit selection --------------------------------------------------

    pub fn set_active_unit(&mut self, unit: usize) -> Result<(), PipelineError> {
        if unit >= MAX_TEXTURE_UNITS {
            return Err(PipelineError::invalid_enum("set_active_unit", unit as u32));
        }
        self.active = unit;
        Ok(())
    }

    pub fn active_unit(&self) -> usize {
        self.active
    }

    /// Enable or disable texturing on the active unit.
    pub fn set_unit_enabled(&mut self, enabled: bool) {
        self.units[self.active].enabled = enabled;
    }

    pub fn unit(&self, unit: usize) -> &TextureUnit {
        &self.units[unit]
    }

    /// Bitmask of units with texturing enabled, one bit per unit.
    pub fn enabled_unit_mask(&self) -> u8 {
        let mut mask = 0u8;
        for (i, unit) in self.units.iter().enumerate() {
            if unit.enabled {
                mask |= 1 << i;
            }
        }
        mask
    }

    // -- Binding ---------------------------------------------------------

    /// Bind `name` to `target` on the active unit.
    ///
    /// Name 0 reverts to the shared default object. The first bind of a
    /// generated name fixes its dimensionality; a later bind under a
    /// different target is an invalid operation and changes nothing.
    pub fn bind(&mut self, target: TextureTarget, name: u32) -> Result<(), PipelineError> {
        if name != 0 {
            match self.objects.get_mut(&name) {
                Some(obj) => match obj.target {
                    Some(fixed) if fixed != target => {
                        return Err(PipelineError::invalid_operation(
                            "bind",
                            "texture name is already bound to a different target",
                        ));
                    }
                    Some(_) => {}
                    None => obj.target = Some(target),
                },
                // Binding an ungenerated name creates the object, as the
                // source pipeline allows.
                None => {
                    self.objects
                        .insert(name, TextureObject::new(name, Some(target)));
                }
            }
        }

        let slot = &mut self.units[self.active].bound[target.index()];
        if *slot == name {
            return Ok(()); // rebinding the current name is a no-op
        }
        *slot = name;
        Ok(())
    }

    /// The object currently bound to `target` on `unit`, falling back to
    /// the shared default object for name 0.
    pub fn current_object(&self, unit: usize, target: TextureTarget) -> &TextureObject {
        let name = self.units[unit].bound[target.index()];
        if name == 0 {
            &self.defaults[target.index()]
        } else {
            // Deletion resets bindings, so a non-zero bound name exists.
            &self.objects[&name]
        }
    }

    fn current_object_mut(&mut self, target: TextureTarget) -> &mut TextureObject {
        let name = self.units[self.active].bound[target.index()];
        if name == 0 {
            return &mut self.defaults[target.index()];
        }
        // Deletion resets bindings, so a non-zero bound name exists.
        match self.objects.get_mut(&name) {
            Some(obj) => obj,
            None => &mut self.defaults[target.index()],
        }
    }

    // -- Object parameters -----------------------------------------------

    /// Set a sampling parameter on the object bound to `target`.
    ///
    /// `code` is validated against the legal set for `param` before any
    /// state changes; an illegal code rejects the call outright.
    pub fn set_parameter(
        &mut self,
        target: TextureTarget,
        param: TexParameter,
        code: u32,
    ) -> Result<(), PipelineError> {
        let illegal = || PipelineError::invalid_enum("set_parameter", code);
        match param {
            TexParameter::WrapS => {
                let wrap = WrapMode::from_code(code).ok_or_else(illegal)?;
                self.current_object_mut(target).wrap_s = wrap;
            }
            TexParameter::WrapT => {
                let wrap = WrapMode::from_code(code).ok_or_else(illegal)?;
                self.current_object_mut(target).wrap_t = wrap;
            }
            TexParameter::WrapR => {
                let wrap = WrapMode::from_code(code).ok_or_else(illegal)?;
                self.current_object_mut(target).wrap_r = wrap;
            }
            TexParameter::MinFilter => {
                let filter = MinFilter::from_code(code).ok_or_else(illegal)?;
                self.current_object_mut(target).min_filter = filter;
            }
            TexParameter::MagFilter => {
                let filter = MagFilter::from_code(code).ok_or_else(illegal)?;
                self.current_object_mut(target).mag_filter = filter;
            }
        }
        Ok(())
    }

    /// Store image data at a mip level of the object bound to `target`.
    pub fn set_image(
        &mut self,
        target: TextureTarget,
        level: usize,
        border: u32,
        image: TexImage,
    ) -> Result<(), PipelineError> {
        if level >= MAX_MIP_LEVELS {
            return Err(PipelineError::invalid_operation(
                "set_image",
                "mip level exceeds the configured maximum",
            ));
        }
        self.current_object_mut(target).levels[level] = Some(MipLevel {
            width: image.width,
            height: image.height,
            depth: image.depth,
            border,
            data: image.data,
        });
        Ok(())
    }

    // -- Environment and coordinate generation ---------------------------

    /// Set the active unit's environment mode (raw code) and color.
    pub fn set_env(&mut self, mode_code: u32, color: Vec4) -> Result<(), PipelineError> {
        let mode = EnvMode::from_code(mode_code)
            .ok_or_else(|| PipelineError::invalid_enum("set_env", mode_code))?;
        let unit = &mut self.units[self.active];
        unit.env_mode = mode;
        unit.env_color = color;
        Ok(())
    }

    /// Configure generation for one coordinate (0..4 = s/t/r/q) of the
    /// active unit.
    pub fn set_texgen(
        &mut self,
        coord: usize,
        mode: TexGenMode,
        plane: Vec4,
    ) -> Result<(), PipelineError> {
        if coord >= 4 {
            return Err(PipelineError::invalid_enum("set_texgen", coord as u32));
        }
        self.units[self.active].texgen[coord] = TexGen { mode, plane };
        Ok(())
    }
}

impl Default for TextureManager {
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

    #[test]
    fn generate_names_fills_gaps() {
        let mut mgr = TextureManager::new();
        let first = mgr.generate_names(3);
        assert_eq!(first, vec![1, 2, 3]);

        mgr.delete_names(&[2]);
        let more = mgr.generate_names(2);
        assert_eq!(more, vec![2, 4]);
    }

    #[test]
    fn generated_names_are_distinct_and_nonzero() {
        let mut mgr = TextureManager::new();
        let names = mgr.generate_names(16);
        let mut sorted = names.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), 16);
        assert!(names.iter().all(|&n| n >= 1));
    }

    #[test]
    fn bind_fixes_dimensionality() {
        let mut mgr = TextureManager::new();
        let name = mgr.generate_names(1)[0];
        mgr.bind(TextureTarget::Tex2D, name).unwrap();

        let err = mgr.bind(TextureTarget::Tex3D, name).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidOperation { .. }));

        // The 2D binding must be untouched by the failed call.
        assert_eq!(mgr.unit(0).bound_name(TextureTarget::Tex2D), name);
        assert_eq!(mgr.unit(0).bound_name(TextureTarget::Tex3D), 0);
    }

    #[test]
    fn bind_zero_falls_back_to_default() {
        let mut mgr = TextureManager::new();
        let name = mgr.generate_names(1)[0];
        mgr.bind(TextureTarget::Tex2D, name).unwrap();
        mgr.bind(TextureTarget::Tex2D, 0).unwrap();

        let current = mgr.current_object(0, TextureTarget::Tex2D);
        assert_eq!(current.name(), 0);

        // The default object survives deletion attempts.
        mgr.delete_names(&[0]);
        assert_eq!(mgr.current_object(0, TextureTarget::Tex2D).name(), 0);
    }

    #[test]
    fn delete_resets_unit_bindings() {
        let mut mgr = TextureManager::new();
        let name = mgr.generate_names(1)[0];
        mgr.bind(TextureTarget::Tex2D, name).unwrap();
        mgr.delete_names(&[name]);
        assert_eq!(mgr.unit(0).bound_name(TextureTarget::Tex2D), 0);
    }

    #[test]
    fn set_parameter_rejects_illegal_codes() {
        let mut mgr = TextureManager::new();
        let name = mgr.generate_names(1)[0];
        mgr.bind(TextureTarget::Tex2D, name).unwrap();

        // Mipmapped codes are not legal for the mag filter.
        let err = mgr
            .set_parameter(TextureTarget::Tex2D, TexParameter::MagFilter, 2)
            .unwrap_err();
        assert_eq!(
            err,
            PipelineError::InvalidEnum {
                call: "set_parameter",
                value: 2
            }
        );
        // Parameter unchanged by the rejected call.
        assert_eq!(
            mgr.current_object(0, TextureTarget::Tex2D).mag_filter,
            MagFilter::Linear
        );

        mgr.set_parameter(TextureTarget::Tex2D, TexParameter::MinFilter, 5)
            .unwrap();
        assert_eq!(
            mgr.current_object(0, TextureTarget::Tex2D).min_filter,
            MinFilter::LinearMipmapLinear
        );
    }

    #[test]
    fn set_image_respects_mip_bound() {
        let mut mgr = TextureManager::new();
        let name = mgr.generate_names(1)[0];
        mgr.bind(TextureTarget::Tex2D, name).unwrap();

        let image = TexImage {
            width: 4,
            height: 4,
            depth: 1,
            data: vec![0; 64],
        };
        mgr.set_image(TextureTarget::Tex2D, 0, 0, image.clone())
            .unwrap();
        assert!(mgr
            .current_object(0, TextureTarget::Tex2D)
            .level(0)
            .is_some());

        let err = mgr
            .set_image(TextureTarget::Tex2D, MAX_MIP_LEVELS, 0, image)
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidOperation { .. }));
    }

    #[test]
    fn enabled_unit_mask_tracks_units() {
        let mut mgr = TextureManager::new();
        assert_eq!(mgr.enabled_unit_mask(), 0);
        mgr.set_unit_enabled(true);
        mgr.set_active_unit(2).unwrap();
        mgr.set_unit_enabled(true);
        assert_eq!(mgr.enabled_unit_mask(), 0b0101);
    }

    #[test]
    fn rebinding_current_name_is_a_noop() {
        let mut mgr = TextureManager::new();
        let name = mgr.generate_names(1)[0];
        mgr.bind(TextureTarget::Tex1D, name).unwrap();
        mgr.bind(TextureTarget::Tex1D, name).unwrap();
        assert_eq!(mgr.unit(0).bound_name(TextureTarget::Tex1D), name);
    }
}
