//! Multiple importance sampling weights for the vertex-cache bidirectional
//! estimator (spec.md §4.8 "VertexCacheBidir"). Every technique (direct
//! emitter hit, next-event estimation, a bidirectional connection, the
//! light tracer) is weighed by the balance heuristic against every other
//! way the same full light path could have been sampled.
//!
//! Indexing convention used throughout this module (the spec's prose is
//! 1-indexed; this is the 0-indexed array realization of it): a
//! hypothetical full path of `numPdfs` edges is numbered `0..numPdfs`,
//! edge `0` being the one leaving the camera. `camera_to_light[i]` is the
//! pdf of sampling edge `i` in the direction the camera subpath would have
//! sampled it (ancestor-to-successor, walking away from the camera);
//! `light_to_camera[i]` is the pdf of sampling the same edge walking away
//! from the light. `k` is the array index of the last vertex contributed
//! by the camera subpath; slots `0..=k` come from the camera path, slots
//! `k+1..numPdfs` come from the light subpath (or, for next-event/emitter
//! hits, are synthesized directly by the caller).

use crate::float::Float;
use crate::path_cache::PathCache;

/// A camera subpath as accumulated by the camera-side random walk (spec.md
/// §3 "Camera path"). Unlike light paths, a camera path has no cache-wide
/// ancestor indirection — it is always a simple chain, so only the
/// immediately-preceding vertex's slot is ever read.
#[derive(Clone, Debug, Default)]
pub struct CameraPath {
    pub pdf_from_ancestor: Vec<Float>,
    /// Reverse pdf towards the ancestor; filled in one step late, exactly
    /// as for the cached light path (spec.md §3 "Camera path" invariant).
    pub pdf_to_ancestor: Vec<Float>,
}

impl CameraPath {
    pub fn len(&self) -> usize {
        self.pdf_from_ancestor.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pdf_from_ancestor.is_empty()
    }
}

/// Two parallel, edge-indexed pdf arrays for a hypothetical full path
/// (spec.md §3 "Bidir pdf view"). Sized fresh to `numPdfs` per call site
/// rather than pooled: a `Vec` this small is cheap next to the shadow
/// ray and BSDF evaluations already paid for every connection attempt
/// (spec.md §9 "on-stack scratch arrays... the MIS math does not care
/// about allocation site").
#[derive(Clone, Debug)]
pub struct BidirPathPdfs {
    camera_to_light: Vec<Float>,
    light_to_camera: Vec<Float>,
}

impl BidirPathPdfs {
    pub fn new(num_pdfs: usize) -> Self {
        Self { camera_to_light: vec![0.0; num_pdfs], light_to_camera: vec![0.0; num_pdfs] }
    }

    pub fn num_pdfs(&self) -> usize {
        self.camera_to_light.len()
    }

    pub fn set_camera_to_light(&mut self, i: usize, v: Float) {
        if i < self.camera_to_light.len() {
            self.camera_to_light[i] = v;
        }
    }

    pub fn set_light_to_camera(&mut self, i: usize, v: Float) {
        if i < self.light_to_camera.len() {
            self.light_to_camera[i] = v;
        }
    }

    pub fn camera_to_light(&self, i: usize) -> Float {
        self.camera_to_light.get(i).copied().unwrap_or(0.0)
    }

    pub fn light_to_camera(&self, i: usize) -> Float {
        self.light_to_camera.get(i).copied().unwrap_or(0.0)
    }
}

/// `GatherCameraPdfs`: copy the camera path's own per-vertex pdfs into
/// slots `0..=k`. `camera_to_light[i]` is available the instant vertex `i`
/// is hit; `light_to_camera[i]` (the reverse pdf of edge `i`, stored on
/// vertex `i+1`) is only available once vertex `i+1` has been hit, i.e.
/// for `i <= k - 2` — slot `k-1` (the edge leaving the last gathered
/// camera vertex) is left for the call site to fill with a freshly
/// computed connection-dependent reverse pdf.
pub fn gather_camera_pdfs(path: &CameraPath, k: usize, pdfs: &mut BidirPathPdfs) {
    for i in 0..=k.min(path.len().saturating_sub(1)) {
        pdfs.set_camera_to_light(i, path.pdf_from_ancestor[i]);
    }
    for i in 0..k.saturating_sub(1) {
        pdfs.set_light_to_camera(i, path.pdf_to_ancestor[i + 1]);
    }
}

/// `GatherLightPdfs`: walk the cached light path from `ancestor_of_connected`
/// (the connected light vertex's ancestor) back to the path's root,
/// filling slots `start_slot, start_slot + 1, ...`. The edge immediately
/// adjacent to the connected vertex (`start_slot`) is deliberately *not*
/// filled here for `camera_to_light` — the connected vertex's reverse pdf
/// depends on the new connection direction, so the call site supplies it
/// (`pdfLightReverse`/`pdfReverse`); every deeper edge reuses the cached
/// pdfs verbatim, since the connection only perturbs the one edge it
/// replaces.
pub fn gather_light_pdfs(cache: &PathCache, path: usize, ancestor_of_connected: u32, start_slot: usize, pdfs: &mut BidirPathPdfs) {
    let mut slot = start_slot;
    let mut idx = ancestor_of_connected;
    loop {
        let v = cache.vertex(path, idx);
        pdfs.set_light_to_camera(slot, v.pdf_from_ancestor);
        if idx == 0 {
            break;
        }
        pdfs.set_camera_to_light(slot, v.pdf_to_ancestor);
        idx = v.ancestor;
        slot += 1;
    }
}

/// `BidirSelectDensity`: `(1/cacheSize) * NumConnections * NumLightPaths`,
/// exactly zero when the cache is empty (spec.md §4.8).
pub fn bidir_select_density(cache: &PathCache, num_connections: u32, num_light_paths: u32) -> Float {
    crate::vertex_selector::bidir_select_density(cache, num_connections, num_light_paths)
}

/// `CameraPathReciprocals(k, pdfs)`: the running balance-heuristic product
/// walking from the connection point back towards the camera, optionally
/// adding the bidir-connection technique's own density at every
/// intermediate vertex and the light-tracer's density at the very end
/// (spec.md §4.8).
pub fn camera_path_reciprocals(k: usize, pdfs: &BidirPathPdfs, enable_connections: bool, enable_light_tracer: bool, bidir_density: Float, num_light_paths: Float) -> Float {
    let mut reciprocal = 1.0;
    let mut sum = 0.0;
    let mut i = k;
    while i >= 1 {
        reciprocal *= ratio(pdfs.light_to_camera(i), pdfs.camera_to_light(i));
        if enable_connections {
            sum += reciprocal * bidir_density;
        }
        i -= 1;
    }
    if enable_light_tracer {
        sum += reciprocal * ratio(pdfs.light_to_camera(0), pdfs.camera_to_light(0)) * num_light_paths;
    }
    sum
}

/// `LightPathReciprocals(k, N, pdfs)`: symmetric running product walking
/// from the connection point towards the light root. The last
/// accumulated reciprocal (after the loop) is always added back in — it
/// represents whichever technique (next-event or a direct hit) generated
/// the final slot the caller has already written (spec.md §4.8).
pub fn light_path_reciprocals(k: usize, num_pdfs: usize, pdfs: &BidirPathPdfs, enable_connections: bool, bidir_density: Float) -> Float {
    let mut reciprocal = 1.0;
    let mut sum = 0.0;
    for i in (k + 1)..num_pdfs {
        reciprocal *= ratio(pdfs.camera_to_light(i), pdfs.light_to_camera(i));
        if i < num_pdfs.saturating_sub(2) && enable_connections {
            sum += reciprocal * bidir_density;
        }
    }
    sum + reciprocal
}

fn ratio(numerator: Float, denominator: Float) -> Float {
    if denominator <= 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

/// Shared config knobs the four MIS sites need; mirrors
/// `config::IntegratorFlags` plus the two path counts that scale the
/// light-tracer and bidir-connection densities.
#[derive(Clone, Copy, Debug)]
pub struct MisContext {
    pub enable_hitting: bool,
    pub enable_connections: bool,
    pub enable_light_tracer: bool,
    pub bidir_select_density: Float,
    pub num_light_paths: Float,
}

/// `EmitterHitMis`: weight for a camera subpath whose last vertex carries
/// emission directly (spec.md §4.8).
pub fn emitter_hit_mis(camera_path: &CameraPath, pdf_emit: Float, pdf_next_event: Float, ctx: &MisContext) -> Float {
    let num_cam_vertices = camera_path.len();
    if num_cam_vertices <= 1 {
        return 1.0;
    }
    let num_pdfs = num_cam_vertices;
    let k = num_cam_vertices - 1;
    let mut pdfs = BidirPathPdfs::new(num_pdfs);
    gather_camera_pdfs(camera_path, k, &mut pdfs);
    pdfs.set_light_to_camera(num_pdfs.saturating_sub(2), pdf_emit);

    let pdf_this = camera_path.pdf_from_ancestor[k];
    if pdf_this <= 0.0 {
        return 0.0;
    }
    let rho = 1.0
        + pdf_next_event / pdf_this
        + camera_path_reciprocals(
            k.saturating_sub(1),
            &pdfs,
            ctx.enable_connections,
            ctx.enable_light_tracer,
            ctx.bidir_select_density,
            ctx.num_light_paths,
        ) / pdf_this;
    1.0 / rho
}

/// `NextEventMis`: weight for a shadow-ray sample toward an emitter or the
/// background (spec.md §4.8).
pub fn next_event_mis(camera_path: &CameraPath, pdf_emit: Float, pdf_next_event: Float, pdf_hit: Float, pdf_reverse: Float, ctx: &MisContext) -> Float {
    let num_cam_vertices = camera_path.len();
    let num_pdfs = num_cam_vertices + 1;
    let k = num_cam_vertices - 1;
    let mut pdfs = BidirPathPdfs::new(num_pdfs);
    gather_camera_pdfs(camera_path, k, &mut pdfs);
    pdfs.set_camera_to_light(k, camera_path.pdf_from_ancestor[k]);
    pdfs.set_light_to_camera(num_pdfs - 2, pdf_emit);
    if num_pdfs > 2 {
        pdfs.set_light_to_camera(num_pdfs - 3, pdf_reverse);
    }

    if pdf_next_event <= 0.0 {
        return 0.0;
    }
    let hit_term = if ctx.enable_hitting { pdf_hit / pdf_next_event } else { 0.0 };
    let rho = 1.0
        + hit_term
        + camera_path_reciprocals(k, &pdfs, ctx.enable_connections, ctx.enable_light_tracer, ctx.bidir_select_density, ctx.num_light_paths) / pdf_next_event;
    1.0 / rho
}

/// `BidirConnectMis`: weight for a camera-to-cached-light-vertex
/// connection (spec.md §4.8). `light_vertex_depth` and `light_vertex_ancestor`
/// identify the connected vertex's position in its own cached path so the
/// deeper, unperturbed part of the light subpath's pdfs can be gathered.
#[allow(clippy::too_many_arguments)]
pub fn bidir_connect_mis(
    camera_path: &CameraPath,
    cache: &PathCache,
    path: usize,
    light_vertex_depth: u32,
    light_vertex_ancestor: u32,
    pdf_camera_reverse: Float,
    pdf_camera_to_light: Float,
    pdf_light_reverse: Float,
    pdf_light_to_camera: Float,
    pdf_next_event: Float,
    ctx: &MisContext,
) -> Float {
    let num_cam_vertices = camera_path.len();
    let num_pdfs = num_cam_vertices + light_vertex_depth as usize + 1;
    let k = num_cam_vertices - 1;
    let mut pdfs = BidirPathPdfs::new(num_pdfs);
    gather_camera_pdfs(camera_path, k, &mut pdfs);
    gather_light_pdfs(cache, path, light_vertex_ancestor, k + 2, &mut pdfs);

    if k > 0 {
        pdfs.set_light_to_camera(k - 1, pdf_camera_reverse);
    }
    pdfs.set_camera_to_light(k, camera_path.pdf_from_ancestor[k]);
    pdfs.set_light_to_camera(k, pdf_light_to_camera);
    pdfs.set_camera_to_light(k + 1, pdf_camera_to_light);
    pdfs.set_camera_to_light(k + 2, pdf_light_reverse + pdf_next_event);

    if ctx.bidir_select_density <= 0.0 {
        return 1.0;
    }
    let rho = 1.0
        + (camera_path_reciprocals(k, &pdfs, ctx.enable_connections, ctx.enable_light_tracer, ctx.bidir_select_density, ctx.num_light_paths)
            + light_path_reciprocals(k, num_pdfs, &pdfs, ctx.enable_connections, ctx.bidir_select_density))
            / ctx.bidir_select_density;
    1.0 / rho
}

/// `LightTracerMis`: weight for a cached light vertex splatted directly
/// onto the image plane (spec.md §4.8).
pub fn light_tracer_mis(
    cache: &PathCache,
    path: usize,
    vertex_index: u32,
    vertex_ancestor: u32,
    vertex_depth: u32,
    pdf_cam_to_primary: Float,
    pdf_reverse: Float,
    pdf_next_event: Float,
    ctx: &MisContext,
) -> Float {
    let num_pdfs = vertex_depth as usize + 1;
    let mut pdfs = BidirPathPdfs::new(num_pdfs);
    gather_light_pdfs(cache, path, vertex_ancestor, 2, &mut pdfs);
    let _ = vertex_index;
    pdfs.set_camera_to_light(0, pdf_cam_to_primary);
    if num_pdfs > 1 {
        pdfs.set_camera_to_light(1, pdf_reverse + pdf_next_event);
    }

    if ctx.num_light_paths <= 0.0 {
        return 1.0;
    }
    let rho = 1.0 + light_path_reciprocals(0, num_pdfs, &pdfs, ctx.enable_connections, ctx.bidir_select_density) / ctx.num_light_paths;
    1.0 / rho
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_camera_path(len: usize, pdf: Float) -> CameraPath {
        CameraPath { pdf_from_ancestor: vec![pdf; len], pdf_to_ancestor: vec![pdf; len] }
    }

    #[test]
    fn single_vertex_emitter_hit_has_unit_weight() {
        let path = flat_camera_path(1, 1.0);
        let ctx = MisContext { enable_hitting: true, enable_connections: false, enable_light_tracer: false, bidir_select_density: 0.0, num_light_paths: 0.0 };
        assert_eq!(emitter_hit_mis(&path, 1.0, 0.0, &ctx), 1.0);
    }

    #[test]
    fn camera_path_reciprocals_with_all_techniques_disabled_is_zero() {
        let pdfs = BidirPathPdfs::new(3);
        let ctx = MisContext { enable_hitting: true, enable_connections: false, enable_light_tracer: false, bidir_select_density: 0.0, num_light_paths: 0.0 };
        assert_eq!(camera_path_reciprocals(2, &pdfs, ctx.enable_connections, ctx.enable_light_tracer, ctx.bidir_select_density, ctx.num_light_paths), 0.0);
    }

    #[test]
    fn gather_camera_pdfs_leaves_last_reverse_slot_for_caller() {
        let path = flat_camera_path(4, 2.0);
        let mut pdfs = BidirPathPdfs::new(4);
        gather_camera_pdfs(&path, 3, &mut pdfs);
        // Slots 0..=3 of camera_to_light come straight from the path.
        for i in 0..=3 {
            assert_eq!(pdfs.camera_to_light(i), 2.0);
        }
        // light_to_camera[2] (= k - 1) was deliberately left at zero.
        assert_eq!(pdfs.light_to_camera(2), 0.0);
        assert_eq!(pdfs.light_to_camera(1), 2.0);
    }

    #[test]
    fn next_event_mis_with_zero_next_event_pdf_is_zero() {
        let path = flat_camera_path(2, 1.0);
        let ctx = MisContext { enable_hitting: true, enable_connections: true, enable_light_tracer: false, bidir_select_density: 1.0, num_light_paths: 4.0 };
        assert_eq!(next_event_mis(&path, 1.0, 0.0, 1.0, 1.0, &ctx), 0.0);
    }

    #[test]
    fn next_event_mis_matching_hit_pdf_is_one_half_without_connections() {
        // With a single alternative technique (direct hit) of equal pdf and
        // connections/light-tracer disabled, the balance heuristic must
        // split the weight evenly.
        let path = flat_camera_path(1, 1.0);
        let ctx = MisContext { enable_hitting: true, enable_connections: false, enable_light_tracer: false, bidir_select_density: 0.0, num_light_paths: 0.0 };
        let w = next_event_mis(&path, 1.0, 2.0, 2.0, 1.0, &ctx);
        assert!((w - 0.5).abs() < 1e-9);
    }
}
