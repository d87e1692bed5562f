//! The scene container and its external collaborator traits (spec.md
//! §4.10, §6.1). Cyclic references collapse to an arena + stable indices
//! (spec.md §9): meshes, materials and emitters live in append-only
//! `Vec`s owned by `Scene`, the single lifetime anchor.

use cgmath::{Point2, Point3, Vector3};

use crate::background::Background;
use crate::error::PrepareError;
use crate::float::Float;
use crate::geometry::{Ray, SurfacePoint};
use crate::material::GenericMaterial;
use crate::mesh::Mesh;
use crate::sampling::Rng;
use crate::color::Color;
use crate::emitter::Emitter;

/// A ray-scene intersection, carrying the indices needed to look up the
/// hit primitive's material and (if any) emitter in the scene's arenas.
#[derive(Clone, Debug)]
pub struct Hit {
    pub point: SurfacePoint,
    pub material: usize,
    pub emitter: Option<usize>,
}

/// Ray-triangle intersection acceleration is an external collaborator
/// (spec.md §1 Non-goals); this is the fixed interface it must expose.
pub trait Intersector: Send + Sync {
    fn trace(&self, ray: &Ray) -> Option<Hit>;
    fn is_occluded(&self, shadow_ray: &Ray) -> bool;
    fn leaves_scene(&self, ray: &Ray) -> bool;
}

/// `GenerateRay`'s result: the primary ray, its pixel-area pdf, and the
/// camera's initial importance weight.
#[derive(Clone, Debug)]
pub struct GeneratedRay {
    pub ray: Ray,
    pub pdf_area: Float,
    pub weight: Color,
}

/// `SampleResponse`'s result: which pixel a light-subpath vertex projects
/// to, the camera's solid-angle pdf of having sampled that direction
/// (callers convert to area measure themselves via
/// [`crate::sampling::surface_area_to_solid_angle`], since the camera has
/// no notion of the connected surface's normal), and the importance
/// weight (spec.md §4.7 `SplatLightVertices`).
#[derive(Clone, Copy, Debug)]
pub struct CameraResponse {
    pub pixel: (u32, u32),
    pub pdf_emit: Float,
    pub weight: Color,
}

/// The camera collaborator (spec.md §6.1).
pub trait Camera: Send + Sync {
    fn generate_ray(&self, film_pos: Point2<Float>, rng: &mut Rng) -> GeneratedRay;

    /// `None` when `point` does not project onto the visible film plane.
    fn sample_response(&self, point: Point3<Float>, rng: &mut Rng) -> Option<CameraResponse>;

    fn world_to_film(&self, point: Point3<Float>) -> Option<Point2<Float>>;

    /// Jacobian from solid angle (at the camera) to pixel area, used by
    /// legacy importance-function paths (spec.md §6.1).
    fn solid_angle_to_pixel_jacobian(&self, dir: Vector3<Float>) -> Float;

    /// The lens point itself, needed by the light tracer to build a shadow
    /// ray towards the camera (spec.md §4.7 `SplatLightVertices`) without a
    /// second round trip through `sample_response`.
    fn position(&self) -> Point3<Float>;
}

/// Owns the scene's arenas and its three external collaborators. Built
/// incrementally (`add_mesh`/`add_material`/`add_emitter`/`with_camera`/
/// `with_background`), then validated once by [`Scene::prepare`].
pub struct Scene {
    pub meshes: Vec<Mesh>,
    pub materials: Vec<GenericMaterial>,
    pub emitters: Vec<Emitter>,
    pub intersector: Box<dyn Intersector>,
    pub camera: Option<Box<dyn Camera>>,
    pub background: Option<Box<dyn Background>>,
    pub center: Point3<Float>,
    pub radius: Float,
}

impl Scene {
    pub fn new(intersector: Box<dyn Intersector>) -> Self {
        Self {
            meshes: Vec::new(),
            materials: Vec::new(),
            emitters: Vec::new(),
            intersector,
            camera: None,
            background: None,
            center: Point3::new(0.0, 0.0, 0.0),
            radius: 1.0,
        }
    }

    pub fn add_mesh(&mut self, mesh: Mesh) -> usize {
        self.meshes.push(mesh);
        self.meshes.len() - 1
    }

    pub fn add_material(&mut self, material: GenericMaterial) -> usize {
        self.materials.push(material);
        self.materials.len() - 1
    }

    pub fn add_emitter(&mut self, emitter: Emitter) -> usize {
        self.emitters.push(emitter);
        self.emitters.len() - 1
    }

    pub fn with_camera(&mut self, camera: Box<dyn Camera>) {
        self.camera = Some(camera);
    }

    pub fn with_background(&mut self, background: Box<dyn Background>) {
        self.background = Some(background);
    }

    pub fn set_bounds(&mut self, center: Point3<Float>, radius: Float) {
        self.center = center;
        self.radius = radius;
    }

    /// Total power of all emitters, used for light-source importance
    /// (currently uniform selection is used elsewhere, but this is exposed
    /// for collaborators that want power-proportional selection).
    pub fn total_emitted_power(&self) -> Color {
        self.emitters.iter().fold(Color::black(), |acc, e| acc + e.total_power())
    }

    /// Structural validation, refused up front rather than during render
    /// (spec.md §7). Also hands the scene bounds to the background, since
    /// its rays originate on the bounding sphere (spec.md §4.4).
    pub fn prepare(&mut self) -> Result<(), PrepareError> {
        if self.camera.is_none() {
            return Err(PrepareError::NoCamera);
        }
        if self.emitters.is_empty() && self.background.is_none() {
            return Err(PrepareError::NoEmittersOrBackground);
        }
        if let Some(background) = self.background.as_mut() {
            background.prepare(self.center, self.radius);
        }
        Ok(())
    }

    /// Probability that next-event estimation or a light-path start picks
    /// the background over the discrete emitter list (spec.md §4.6, §4.7):
    /// `1/(1+|emitters|)` if a background is present, else zero.
    pub fn background_probability(&self) -> Float {
        if self.background.is_some() {
            1.0 / (1.0 + self.emitters.len() as Float)
        } else {
            0.0
        }
    }
}
