//! Scene/render layer interface.
//!
//! The engine owns node hierarchy, GPU state and geometry; the core only
//! creates and arranges nodes, culls the scene into a [`DrawList`] and asks
//! for the list to be drawn from a camera.

use std::rc::Rc;

use crate::vr::geometry::Aabb;
use crate::vr::math::Mat4;

/// Engine node handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

/// Engine camera handle, owned by the device layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CameraHandle(pub u32);

/// Opaque platform surface the host renders widget content into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceRef(pub u64);

/// What the engine should build for a node. Geometry construction is the
/// engine's concern.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Textured widget panel sampling the named surface texture.
    WidgetPanel {
        surface_name: String,
        bounds: Aabb,
        curve_radius: Option<f32>,
    },
    /// Highlight shown on a widget while a controller points at it.
    WidgetPointer,
    /// Transform node tracking a controller, optionally loading a model.
    Controller { index: usize, model: Option<String> },
    /// Ray mesh shared by every controller.
    ControllerPointer,
    Floor,
}

/// Nodes selected by culling, drawn once per eye.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrawList {
    nodes: Vec<NodeId>,
}

impl DrawList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.nodes.clear();
    }

    pub fn push(&mut self, node: NodeId) {
        self.nodes.push(node);
    }

    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Notified by the platform surface-texture factory.
pub trait SurfaceTextureObserver {
    fn surface_created(&self, name: &str, surface: SurfaceRef);
    fn surface_destroyed(&self, name: &str);
    fn surface_creation_failed(&self, name: &str, reason: &str);
}

/// Rendering engine driven by the frame orchestrator.
pub trait RenderContext {
    /// Lazily set up GL state. Returns false when the context is not ready
    /// yet; the caller retries on a later frame.
    fn initialize_gl(&mut self) -> bool;
    fn shutdown_gl(&mut self);
    /// Advance time-based scene updates.
    fn update(&mut self);

    fn lookup_surface(&self, name: &str) -> Option<SurfaceRef>;
    fn add_surface_observer(&mut self, observer: Rc<dyn SurfaceTextureObserver>);
    fn remove_surface_observer(&mut self, observer: &Rc<dyn SurfaceTextureObserver>);

    fn create_node(&mut self, kind: NodeKind) -> NodeId;
    fn add_child(&mut self, parent: NodeId, child: NodeId);
    fn add_to_root(&mut self, node: NodeId);
    fn remove_from_root(&mut self, node: NodeId);
    fn set_transform(&mut self, node: NodeId, transform: &Mat4);
    fn set_enabled(&mut self, node: NodeId, enabled: bool);

    fn cull(&mut self, draw_list: &mut DrawList);
    fn draw(&mut self, draw_list: &DrawList, camera: CameraHandle);
}
