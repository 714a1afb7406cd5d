//! Clip outcodes and line/polygon clipping.
//!
//! Frustum planes are tested in homogeneous clip space (`-w <= x,y,z <= w`),
//! user planes in eye space against caller-supplied plane equations.
//! Primitive-level trivial accept/reject lives in the assembler; this
//! module only clips primitives that genuinely straddle the volume, plane
//! by plane, and only against the planes present in the OR of the
//! outcodes.
//!
//! Intersection parameters are always computed from the *out* vertex
//! toward the *in* vertex so that shared clipped edges of adjacent
//! primitives produce identical points and cannot crack.

use bitflags::bitflags;
use smallvec::SmallVec;

use crate::math::{dot4, lerp4, Vec4};
use crate::vertex::Vertex;

/// Maximum number of user-defined clip planes.
pub const MAX_USER_CLIP_PLANES: usize = 6;

bitflags! {
    /// One bit per violated clip plane; empty means trivially inside.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ClipFlags: u16 {
        const LEFT   = 1 << 0;
        const RIGHT  = 1 << 1;
        const BOTTOM = 1 << 2;
        const TOP    = 1 << 3;
        const NEAR   = 1 << 4;
        const FAR    = 1 << 5;
        const USER0  = 1 << 6;
        const USER1  = 1 << 7;
        const USER2  = 1 << 8;
        const USER3  = 1 << 9;
        const USER4  = 1 << 10;
        const USER5  = 1 << 11;

        const FRUSTUM = Self::LEFT.bits()
            | Self::RIGHT.bits()
            | Self::BOTTOM.bits()
            | Self::TOP.bits()
            | Self::NEAR.bits()
            | Self::FAR.bits();
    }
}

impl ClipFlags {
    /// Flag for frustum plane `i` in `FRUSTUM_PLANES` order.
    pub const fn frustum_plane(i: usize) -> Self {
        Self::from_bits_retain(1 << i)
    }

    /// Flag for user clip plane `i`.
    pub const fn user_plane(i: usize) -> Self {
        Self::from_bits_retain(1 << (6 + i))
    }
}

/// The six canonical clip-space plane equations, in outcode bit order.
/// `dot(plane, clip_position) < 0` means outside.
const FRUSTUM_PLANES: [Vec4; 6] = [
    [1.0, 0.0, 0.0, 1.0],  // left:   x >= -w
    [-1.0, 0.0, 0.0, 1.0], // right:  x <=  w
    [0.0, 1.0, 0.0, 1.0],  // bottom: y >= -w
    [0.0, -1.0, 0.0, 1.0], // top:    y <=  w
    [0.0, 0.0, 1.0, 1.0],  // near:   z >= -w
    [0.0, 0.0, -1.0, 1.0], // far:    z <=  w
];

/// Frustum outcode of a clip-space position.
///
/// The checks are independent, not else-chained: with w < 0 a coordinate
/// can violate both opposing planes at once.
pub fn frustum_outcode(clip: Vec4) -> ClipFlags {
    let [x, y, z, w] = clip;
    let neg_w = -w;
    let mut codes = ClipFlags::empty();

    if x < neg_w {
        codes |= ClipFlags::LEFT;
    }
    if x > w {
        codes |= ClipFlags::RIGHT;
    }
    if y < neg_w {
        codes |= ClipFlags::BOTTOM;
    }
    if y > w {
        codes |= ClipFlags::TOP;
    }
    if z < neg_w {
        codes |= ClipFlags::NEAR;
    }
    if z > w {
        codes |= ClipFlags::FAR;
    }

    codes
}

/// User-plane outcode of an eye-space position against the enabled planes.
pub fn user_outcode(
    planes: &[Vec4; MAX_USER_CLIP_PLANES],
    enabled_mask: u8,
    eye: Vec4,
) -> ClipFlags {
    let mut codes = ClipFlags::empty();
    let mut mask = enabled_mask;
    for i in 0..MAX_USER_CLIP_PLANES {
        if mask == 0 {
            break;
        }
        if mask & 1 != 0 && dot4(planes[i], eye) < 0.0 {
            codes |= ClipFlags::user_plane(i);
        }
        mask >>= 1;
    }
    codes
}

/// Everything attribute interpolation needs to know while clipping.
#[derive(Debug, Clone, Copy)]
pub struct ClipEnv<'a> {
    pub user_planes: &'a [Vec4; MAX_USER_CLIP_PLANES],
    pub plane_mask: u8,
    pub lighting: bool,
    /// Bitmask of texture units whose coordinates must be interpolated.
    pub unit_mask: u8,
}

/// Build the vertex where the edge from `out` to `inside` meets a plane.
///
/// `t` must have been computed from the out vertex toward the in vertex.
/// The outcode of the new vertex is recomputed immediately from its new
/// clip position, never carried over.
fn interpolate(out: &Vertex, inside: &Vertex, t: f32, env: &ClipEnv<'_>) -> Vertex {
    let mut v = *inside;
    v.clip = lerp4(out.clip, inside.clip, t);
    v.eye = lerp4(out.eye, inside.eye, t);
    v.color = lerp4(out.color, inside.color, t);
    v.back_color = lerp4(out.back_color, inside.back_color, t);
    if env.lighting {
        v.eye_normal = lerp4(out.eye_normal, inside.eye_normal, t);
    }
    let mut units = env.unit_mask;
    let mut i = 0;
    while units != 0 {
        if units & 1 != 0 {
            v.texcoord[i] = lerp4(out.texcoord[i], inside.texcoord[i], t);
        }
        units >>= 1;
        i += 1;
    }
    v.outcode = frustum_outcode(v.clip) | user_outcode(env.user_planes, env.plane_mask, v.eye);
    v
}

/// One Sutherland-Hodgman pass of a closed polygon against a single plane.
fn clip_polygon_plane<F>(verts: &mut SmallVec<[Vertex; 16]>, dist: F, env: &ClipEnv<'_>)
where
    F: Fn(&Vertex) -> f32,
{
    let mut out: SmallVec<[Vertex; 16]> = SmallVec::new();

    let mut s = verts[verts.len() - 1];
    let mut s_dist = dist(&s);

    for i in 0..verts.len() {
        let p = verts[i];
        let p_dist = dist(&p);

        if p_dist >= 0.0 {
            if s_dist < 0.0 {
                // Entering: s is out, p is in.
                let t = s_dist / (s_dist - p_dist);
                out.push(interpolate(&s, &p, t, env));
            }
            out.push(p);
        } else if s_dist >= 0.0 {
            // Leaving: p is out, s is in.
            let t = p_dist / (p_dist - s_dist);
            out.push(interpolate(&p, &s, t, env));
        }
        // Both out: nothing survives this edge.

        s = p;
        s_dist = p_dist;
    }

    *verts = out;
}

/// Clip a polygon against every plane present in `codes`.
///
/// User planes run first (they need eye coordinates, which frustum passes
/// do not maintain), then frustum planes. Returns `false` when the
/// polygon degenerates below three vertices; the caller drops it silently.
pub fn clip_polygon(
    verts: &mut SmallVec<[Vertex; 16]>,
    codes: ClipFlags,
    env: &ClipEnv<'_>,
) -> bool {
    for i in 0..MAX_USER_CLIP_PLANES {
        if codes.contains(ClipFlags::user_plane(i)) {
            let plane = env.user_planes[i];
            clip_polygon_plane(verts, |v| dot4(plane, v.eye), env);
            if verts.len() < 3 {
                return false;
            }
        }
    }

    for (i, plane) in FRUSTUM_PLANES.iter().enumerate() {
        if codes.contains(ClipFlags::frustum_plane(i)) {
            clip_polygon_plane(verts, |v| dot4(*plane, v.clip), env);
            if verts.len() < 3 {
                return false;
            }
        }
    }

    true
}

/// Clip a line segment in place against every plane present in `codes`.
///
/// Returns `false` when the segment is entirely outside or degenerates to
/// a single point; the caller drops it silently.
pub fn clip_line(a: &mut Vertex, b: &mut Vertex, codes: ClipFlags, env: &ClipEnv<'_>) -> bool {
    for i in 0..MAX_USER_CLIP_PLANES {
        if !codes.contains(ClipFlags::user_plane(i)) {
            continue;
        }
        let plane = env.user_planes[i];
        if !clip_line_plane(a, b, |v| dot4(plane, v.eye), env) {
            return false;
        }
    }

    for (i, plane) in FRUSTUM_PLANES.iter().enumerate() {
        if !codes.contains(ClipFlags::frustum_plane(i)) {
            continue;
        }
        if !clip_line_plane(a, b, |v| dot4(*plane, v.clip), env) {
            return false;
        }
    }

    // A segment clipped down to a single point is dropped, not rendered.
    if a.clip == b.clip {
        return false;
    }

    true
}

fn clip_line_plane<F>(a: &mut Vertex, b: &mut Vertex, dist: F, env: &ClipEnv<'_>) -> bool
where
    F: Fn(&Vertex) -> f32,
{
    let d1 = dist(a);
    let d2 = dist(b);

    if d1 < 0.0 {
        if d2 < 0.0 {
            return false; // both endpoints outside this plane
        }
        let t = d1 / (d1 - d2);
        *a = interpolate(a, b, t, env);
    } else if d2 < 0.0 {
        let t = d2 / (d2 - d1);
        *b = interpolate(b, a, t, env);
    }

    true
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
