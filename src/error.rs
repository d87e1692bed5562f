//! Structural error types (spec.md §7). Numerical/sampling failures are
//! never represented here — they recover locally to `Color::black()`/zero
//! pdf, per §7's propagation policy. Only structural misconfiguration and
//! worker-level iteration failures are surfaced through `Result`.

use thiserror::Error;

/// Returned by `Scene::prepare`. Refused up front, never mid-render
/// (spec.md §7 "Structural errors... are refused up front at
/// Scene.Prepare, not during render").
#[derive(Error, Debug)]
pub enum PrepareError {
    #[error("scene has no camera")]
    NoCamera,
    #[error("scene has no emitters and no background")]
    NoEmittersOrBackground,
}

/// Returned by the top-level render driver when a worker panics or a
/// collaborator trait returns an unrecoverable error mid-iteration
/// (spec.md §7 "Per-iteration exception in a worker").
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("iteration {iteration} failed: {source}")]
    Iteration {
        iteration: u32,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}
