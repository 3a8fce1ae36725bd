//! Artwork factory: artwork description → detached scene subtree.
//!
//! A unit is a container group holding the surface box (tagged
//! `ArtworkSurface`, carrying the frame hook) and an optional label panel
//! (tagged `LabelPanel`, starting hidden). The container's local origin is
//! the surface's vertical center; the caller inserts it with `attach`.

pub mod label;

use std::f32::consts::PI;
use std::fmt;

use glam::Vec3;

use crate::error::ArtworkError;
use crate::net::image::ImageLoader;
use crate::panel::PanelOpacity;
use crate::scene::{
    FrameHook, Geometry, Material, Node, NodeId, Role, SceneGraph, Shading, Side, Transform,
};
use crate::sketch::{self, RenderMode, SketchLimits, SketchRuntime};
use crate::texture::Texture;

pub const DEFAULT_WIDTH: f32 = 5.0;
pub const DEFAULT_HEIGHT: f32 = 3.0;
pub const DEFAULT_DEPTH: f32 = 0.01;
/// Texture pixels per scene unit.
pub const DEFAULT_RESOLUTION: f32 = 250.0;
/// Longest sketch surface edge in pixels.
pub const MAX_SURFACE_EDGE: u32 = 4096;

/// Label panel placement relative to the surface center.
pub const PANEL_OFFSET: Vec3 = Vec3::new(0.5, -1.4, 2.0);
pub const PANEL_TILT: f32 = -0.15 * PI;
pub const PANEL_SIZE: (f32, f32) = (2.0, 1.0);

/// Called with the surface node on every tick the unit is focused.
pub type UpdateFn = Box<dyn FnMut(&mut Node)>;

#[derive(Debug, Clone, PartialEq)]
pub enum ArtworkSource {
    Program { code: String, seed: Option<u64> },
    Image { url: String },
}

/// Where the container goes in its parent's frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Placement {
    pub position: Vec3,
    /// Euler XYZ, radians.
    pub rotation: Vec3,
}

impl Placement {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            rotation: Vec3::ZERO,
        }
    }

    pub fn with_rotation(mut self, rotation: Vec3) -> Self {
        self.rotation = rotation;
        self
    }
}

/// Construction input for one artwork. Unset sizes fall back to the
/// `DEFAULT_*` constants.
#[derive(Default)]
pub struct ArtworkSpec {
    pub name: Option<String>,
    pub source: Option<ArtworkSource>,
    pub width: Option<f32>,
    pub height: Option<f32>,
    pub depth: Option<f32>,
    pub resolution: Option<f32>,
    pub label: Option<String>,
    pub update: Option<UpdateFn>,
    pub placement: Option<Placement>,
    pub render_mode: Option<RenderMode>,
}

impl fmt::Debug for ArtworkSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtworkSpec")
            .field("name", &self.name)
            .field("source", &self.source)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("depth", &self.depth)
            .field("resolution", &self.resolution)
            .field("label", &self.label)
            .field("update", &self.update.is_some())
            .field("placement", &self.placement)
            .field("render_mode", &self.render_mode)
            .finish()
    }
}

impl ArtworkSpec {
    pub fn program(code: impl Into<String>) -> Self {
        Self {
            source: Some(ArtworkSource::Program {
                code: code.into(),
                seed: None,
            }),
            ..Self::default()
        }
    }

    pub fn image(url: impl Into<String>) -> Self {
        Self {
            source: Some(ArtworkSource::Image { url: url.into() }),
            ..Self::default()
        }
    }

    /// Ignored for image artworks.
    pub fn with_seed(mut self, value: u64) -> Self {
        if let Some(ArtworkSource::Program { seed, .. }) = &mut self.source {
            *seed = Some(value);
        }
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_size(mut self, width: f32, height: f32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    pub fn with_depth(mut self, depth: f32) -> Self {
        self.depth = Some(depth);
        self
    }

    pub fn with_resolution(mut self, resolution: f32) -> Self {
        self.resolution = Some(resolution);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_update(mut self, update: impl FnMut(&mut Node) + 'static) -> Self {
        self.update = Some(Box::new(update));
        self
    }

    pub fn with_placement(mut self, placement: Placement) -> Self {
        self.placement = Some(placement);
        self
    }

    pub fn with_render_mode(mut self, mode: RenderMode) -> Self {
        self.render_mode = Some(mode);
        self
    }

    fn display_name(&self) -> String {
        if let Some(name) = &self.name {
            return name.clone();
        }
        self.label
            .as_deref()
            .and_then(|l| l.lines().next())
            .filter(|l| !l.trim().is_empty())
            .unwrap_or("artwork")
            .to_string()
    }
}

/// Texture pixel size for a surface: `round(w × res) × round(h × res)`,
/// each at least 1.
pub fn surface_size(width: f32, height: f32, resolution: f32) -> (u32, u32) {
    let px = |units: f32| (units * resolution).round().max(1.0) as u32;
    (px(width), px(height))
}

/// Built, not yet inserted artwork.
pub struct ArtworkUnit {
    pub container: Node,
    pub surface: Option<Node>,
    pub panel: Option<Node>,
    /// The live texture, when the surface has one.
    pub texture: Option<Texture>,
    /// Why the unit came out degraded, if it did.
    pub error: Option<ArtworkError>,
}

/// Ids of an inserted unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacedUnit {
    pub container: NodeId,
    pub surface: Option<NodeId>,
    pub panel: Option<NodeId>,
}

impl ArtworkUnit {
    /// Insert the container under `parent`, then its children.
    pub fn attach(self, scene: &mut SceneGraph, parent: NodeId) -> PlacedUnit {
        let container = scene.add(parent, self.container);
        let surface = self.surface.map(|node| scene.add(container, node));
        let panel = self.panel.map(|node| scene.add(container, node));
        PlacedUnit {
            container,
            surface,
            panel,
        }
    }

    pub fn is_textured(&self) -> bool {
        self.texture.is_some()
    }
}

impl fmt::Debug for ArtworkUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtworkUnit")
            .field("container", &self.container.name)
            .field("surface", &self.surface.is_some())
            .field("panel", &self.panel.is_some())
            .field("textured", &self.texture.is_some())
            .field("error", &self.error)
            .finish()
    }
}

/// Builds artwork units; holds what every build shares.
#[derive(Debug, Clone, Default)]
pub struct ArtworkFactory {
    loader: ImageLoader,
    limits: SketchLimits,
}

impl ArtworkFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_loader(mut self, loader: ImageLoader) -> Self {
        self.loader = loader;
        self
    }

    pub fn with_limits(mut self, limits: SketchLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn loader(&self) -> &ImageLoader {
        &self.loader
    }

    /// Build one unit. Never fails: problems degrade the unit and are
    /// recorded on `ArtworkUnit::error`.
    pub fn build(&self, mut spec: ArtworkSpec) -> ArtworkUnit {
        let name = spec.display_name();
        let mut container = Node::group(name.clone());
        if let Some(placement) = spec.placement {
            container.transform.position = placement.position;
            container.transform.rotation = placement.rotation;
        }

        let width = spec.width.unwrap_or(DEFAULT_WIDTH);
        let height = spec.height.unwrap_or(DEFAULT_HEIGHT);
        let depth = spec.depth.unwrap_or(DEFAULT_DEPTH);
        let resolution = spec.resolution.unwrap_or(DEFAULT_RESOLUTION);
        let sizes_ok = [width, height, depth, resolution]
            .iter()
            .all(|v| v.is_finite() && *v > 0.0)
            && (width.max(height) * resolution).round() <= MAX_SURFACE_EDGE as f32;

        let source = match spec.source.take() {
            Some(source) if sizes_ok => source,
            _ => {
                log::warn!("[{}] {}; leaving the container empty", name, ArtworkError::MisconfiguredSpec);
                return ArtworkUnit {
                    container,
                    surface: None,
                    panel: None,
                    texture: None,
                    error: Some(ArtworkError::MisconfiguredSpec),
                };
            }
        };

        let mut runtime: Option<SketchRuntime> = None;
        let mut error = None;
        let texture = match source {
            ArtworkSource::Program { code, seed } => {
                let (w_px, h_px) = surface_size(width, height, resolution);
                let mode = spec.render_mode.unwrap_or_default();
                match sketch::compile(&name, &code, seed, w_px, h_px, mode, &self.limits) {
                    Ok(rt) => {
                        let texture = rt.texture().clone();
                        runtime = Some(rt);
                        Some(texture)
                    }
                    Err(e) => {
                        log::warn!("[{}] {}; using an untextured surface", name, e);
                        error = Some(ArtworkError::Compile(e));
                        None
                    }
                }
            }
            ArtworkSource::Image { url } => {
                let texture = Texture::empty();
                // Fire and forget; the slot fills whenever the thread finishes.
                let _ = self.loader.request(&url, texture.clone());
                Some(texture)
            }
        };

        let material = Material {
            shading: Shading::Basic,
            map: texture.clone(),
            side: Side::Double,
            ..Material::default()
        };
        let mut update = spec.update.take();
        let hook: FrameHook = Box::new(move |node: &mut Node| {
            if let Some(update) = update.as_mut() {
                update(node);
            }
            if let Some(rt) = runtime.as_mut() {
                rt.advance();
            }
        });
        let surface = Node::mesh(
            format!("{}/surface", name),
            Geometry::Box {
                width,
                height,
                depth,
            },
            material,
        )
        .with_role(Role::ArtworkSurface)
        .with_frame_hook(hook);

        let panel = spec.label.as_deref().map(|text| label_panel(&name, text));

        log::debug!(
            "[{}] built {}x{}x{} surface (textured: {}, label: {})",
            name,
            width,
            height,
            depth,
            texture.is_some(),
            panel.is_some()
        );

        ArtworkUnit {
            container,
            surface: Some(surface),
            panel,
            texture,
            error,
        }
    }
}

fn label_panel(name: &str, text: &str) -> Node {
    let (width, height) = PANEL_SIZE;
    let material = Material {
        shading: Shading::Basic,
        map: Some(Texture::from_image(label::rasterize_label(text))),
        transparent: true,
        side: Side::Double,
        ..Material::default()
    };
    let mut transform = Transform::from_position(PANEL_OFFSET);
    transform.rotation.x = PANEL_TILT;
    Node::mesh(format!("{}/label", name), Geometry::Plane { width, height }, material)
        .with_transform(transform)
        .with_role(Role::LabelPanel(PanelOpacity::hidden()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::cell::Cell;
    use std::rc::Rc;

    const SOLID: &str = "fn draw() { background(20, 40, 60); }";

    fn geometry(node: &Node) -> Geometry {
        node.mesh_ref().unwrap().geometry
    }

    #[test]
    fn defaults_give_a_five_by_three_board() {
        let unit = ArtworkFactory::new().build(ArtworkSpec::program(SOLID).with_seed(1));
        assert!(unit.error.is_none());
        let surface = unit.surface.as_ref().unwrap();
        assert!(surface.is_artwork_surface());
        assert!(surface.has_frame_hook());
        assert_eq!(
            geometry(surface),
            Geometry::Box {
                width: 5.0,
                height: 3.0,
                depth: 0.01
            }
        );
        let material = &surface.mesh_ref().unwrap().material;
        assert_eq!(material.side, Side::Double);
        assert!(!material.transparent);
        assert_eq!(unit.texture.as_ref().unwrap().dimensions(), Some((1250, 750)));
        assert!(unit.panel.is_none());
    }

    #[test]
    fn surface_material_shares_the_runtime_texture() {
        let unit = ArtworkFactory::new().build(
            ArtworkSpec::program(SOLID)
                .with_seed(1)
                .with_size(1.0, 1.0)
                .with_resolution(10.0),
        );
        let surface = unit.surface.as_ref().unwrap();
        assert!(surface
            .texture()
            .unwrap()
            .same_slot(unit.texture.as_ref().unwrap()));
    }

    #[test]
    fn compile_failure_degrades_to_untextured_surface() {
        let unit = ArtworkFactory::new().build(
            ArtworkSpec::program("let nothing = 0;").with_label("Broken\npiece"),
        );
        let surface = unit.surface.as_ref().unwrap();
        assert!(surface.texture().is_none());
        assert!(!unit.is_textured());
        assert!(matches!(unit.error, Some(ArtworkError::Compile(_))));
        // The label still gets a panel.
        assert!(unit.panel.is_some());
    }

    #[test]
    fn missing_source_yields_empty_container() {
        let unit = ArtworkFactory::new().build(ArtworkSpec::default().with_label("orphan"));
        assert!(unit.surface.is_none());
        assert!(unit.panel.is_none());
        assert!(matches!(unit.error, Some(ArtworkError::MisconfiguredSpec)));

        let mut scene = SceneGraph::new();
        let root = scene.root();
        let placed = unit.attach(&mut scene, root);
        assert!(scene.get(placed.container).unwrap().children().is_empty());
    }

    #[test]
    fn non_positive_size_is_misconfigured() {
        let unit = ArtworkFactory::new().build(ArtworkSpec::program(SOLID).with_size(0.0, 3.0));
        assert!(unit.surface.is_none());
        assert!(matches!(unit.error, Some(ArtworkError::MisconfiguredSpec)));
    }

    #[test]
    fn oversized_surface_is_misconfigured() {
        let unit = ArtworkFactory::new()
            .build(ArtworkSpec::program("fn draw() {}").with_resolution(1.0e9));
        assert!(unit.surface.is_none());
        assert!(matches!(unit.error, Some(ArtworkError::MisconfiguredSpec)));

        let edge = MAX_SURFACE_EDGE as f32;
        let unit = ArtworkFactory::new()
            .build(ArtworkSpec::program(SOLID).with_size(edge / 100.0, 1.0).with_resolution(100.0));
        assert!(unit.error.is_none());
        let unit = ArtworkFactory::new()
            .build(ArtworkSpec::program(SOLID).with_size(1.0, edge / 100.0 + 0.1).with_resolution(100.0));
        assert!(matches!(unit.error, Some(ArtworkError::MisconfiguredSpec)));
    }

    #[test]
    fn non_ascii_color_in_sketch_degrades_to_compile_error() {
        let unit = ArtworkFactory::new().build(
            ArtworkSpec::program(r##"fn draw() { background("#é1"); }"##).with_resolution(10.0),
        );
        assert!(!unit.is_textured());
        assert!(unit.surface.is_some());
        assert!(matches!(unit.error, Some(ArtworkError::Compile(_))));
    }

    #[test]
    fn name_and_depth_reach_the_surface() {
        let unit = ArtworkFactory::new().build(
            ArtworkSpec::program(SOLID)
                .with_name("tide")
                .with_depth(0.2)
                .with_resolution(10.0),
        );
        assert_eq!(unit.container.name, "tide");
        let surface = unit.surface.as_ref().unwrap();
        assert_eq!(surface.name, "tide/surface");
        assert!(matches!(geometry(surface), Geometry::Box { depth, .. } if depth == 0.2));
    }

    #[test]
    fn label_panel_is_hidden_tilted_and_offset() {
        let unit = ArtworkFactory::new().build(
            ArtworkSpec::program(SOLID)
                .with_seed(3)
                .with_resolution(10.0)
                .with_label("Title\nby someone"),
        );
        let panel = unit.panel.as_ref().unwrap();
        assert!(panel.is_label_panel());
        assert_eq!(panel.panel().unwrap().value(), 0.0);
        assert_eq!(panel.effective_opacity(), 0.0);
        assert_eq!(panel.transform.position, PANEL_OFFSET);
        assert!((panel.transform.rotation.x + 0.15 * PI).abs() < 1e-6);
        assert_eq!(
            geometry(panel),
            Geometry::Plane {
                width: 2.0,
                height: 1.0
            }
        );
        let material = &panel.mesh_ref().unwrap().material;
        assert!(material.transparent);
        assert_eq!(material.side, Side::Double);
        assert_eq!(
            panel.texture().unwrap().dimensions(),
            Some((label::LABEL_WIDTH, label::LABEL_HEIGHT))
        );
    }

    #[test]
    fn attach_inserts_under_parent_with_placement() {
        let unit = ArtworkFactory::new().build(
            ArtworkSpec::program(SOLID)
                .with_resolution(4.0)
                .with_label("x")
                .with_placement(Placement::at(Vec3::new(-2.0, 2.0, -4.0))),
        );
        let mut scene = SceneGraph::new();
        let root = scene.root();
        let placed = unit.attach(&mut scene, root);
        let container = scene.get(placed.container).unwrap();
        assert_eq!(container.transform.position, Vec3::new(-2.0, 2.0, -4.0));
        assert_eq!(
            container.children(),
            &[placed.surface.unwrap(), placed.panel.unwrap()]
        );
    }

    #[test]
    fn frame_hook_runs_update_then_advances() {
        let calls = Rc::new(Cell::new(0));
        let seen = Rc::clone(&calls);
        let unit = ArtworkFactory::new().build(
            ArtworkSpec::program("fn draw() { background(frameCount); }")
                .with_seed(1)
                .with_size(1.0, 1.0)
                .with_resolution(4.0)
                .with_update(move |node| {
                    assert!(node.is_artwork_surface());
                    seen.set(seen.get() + 1);
                }),
        );
        let texture = unit.texture.clone().unwrap();
        let mut scene = SceneGraph::new();
        let root = scene.root();
        let placed = unit.attach(&mut scene, root);
        let surface = placed.surface.unwrap();

        assert!(scene.run_frame_hook(surface));
        assert!(scene.run_frame_hook(surface));
        assert_eq!(calls.get(), 2);
        assert_eq!(texture.version(), 3);
        assert_eq!(texture.snapshot().unwrap().get_pixel(0, 0)[0], 2);
    }

    #[test]
    fn image_artwork_has_no_runtime_and_fills_later() {
        let dir = std::env::temp_dir().join(format!("sketch-gallery-art-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        image::RgbaImage::from_pixel(4, 4, image::Rgba([1, 2, 3, 255]))
            .save(dir.join("art.png"))
            .unwrap();

        let factory = ArtworkFactory::new().with_loader(ImageLoader::new().with_base_dir(&dir));
        let unit = factory.build(ArtworkSpec::image("art.png").with_seed(9));
        let texture = unit.texture.clone().unwrap();
        assert!(unit.error.is_none());

        for _ in 0..500 {
            if texture.is_loaded() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        assert_eq!(texture.dimensions(), Some((4, 4)));

        // The hook has nothing to advance.
        let mut scene = SceneGraph::new();
        let root = scene.root();
        let placed = unit.attach(&mut scene, root);
        scene.run_frame_hook(placed.surface.unwrap());
        assert_eq!(texture.version(), 1);
    }

    proptest! {
        #[test]
        fn surface_size_rounds_each_axis(
            w in 0.01f32..20.0,
            h in 0.01f32..20.0,
            res in 1.0f32..400.0,
        ) {
            let (pw, ph) = surface_size(w, h, res);
            prop_assert_eq!(pw, ((w * res).round() as u32).max(1));
            prop_assert_eq!(ph, ((h * res).round() as u32).max(1));
        }
    }
}
