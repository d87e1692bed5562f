//! Render configuration (spec.md §6.3 determinism inputs, §9 design
//! notes). Mirrors the teacher's `pt_renderer::config::RenderConfig` shape
//! (a flat, `Copy` settings struct consumed by the coordinator) but
//! generalized to the bidirectional technique set.

use crate::float::Float;

/// Which of the four MIS techniques are active. All default on except the
/// light tracer, matching most BDPT references' default configuration.
#[derive(Clone, Copy, Debug)]
pub struct IntegratorFlags {
    pub enable_hitting: bool,
    pub enable_connections: bool,
    pub enable_light_tracer: bool,
}

impl Default for IntegratorFlags {
    fn default() -> Self {
        Self { enable_hitting: true, enable_connections: true, enable_light_tracer: true }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct RenderConfig {
    pub width: u32,
    pub height: u32,
    pub num_iterations: u32,
    pub num_light_paths: u32,
    pub max_depth: u32,
    pub min_depth: u32,
    pub num_connections: u32,
    pub num_shadow_rays: u32,
    pub base_seed_camera: u64,
    pub base_seed_light: u64,
    pub flags: IntegratorFlags,
    /// §6.3: when set, `FrameBuffer::splat` routes through a fixed-order
    /// reduction instead of the lock-free CAS loop, so two runs with
    /// identical seeds are bitwise identical.
    pub deterministic: bool,
    /// Open question (spec.md §9): the core random-walk engine terminates
    /// by depth only. This is an optional, off-by-default extension point
    /// mirroring the teacher's BDPT walk, which already divides a survival
    /// probability out of the path pdf so MIS stays consistent if enabled.
    pub russian_roulette: Option<Float>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 512,
            height: 512,
            num_iterations: 16,
            num_light_paths: 512 * 512,
            max_depth: 5,
            min_depth: 0,
            num_connections: 1,
            num_shadow_rays: 1,
            base_seed_camera: 0xC030114,
            base_seed_light: 0x13C0_FEFE,
            flags: IntegratorFlags::default(),
            deterministic: false,
            russian_roulette: None,
        }
    }
}
