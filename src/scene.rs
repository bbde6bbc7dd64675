//! Surface, view and output registry consumed by the seat
//!
//! The seat never owns surfaces. It asks the [`Scene`] what lies under a
//! point, which client a surface belongs to and where the outputs are, and
//! relies on the host to report destruction through the seat's
//! `*_destroyed` entry points.

use crate::geometry::{Fixed, Point, Rect};
use crate::object::{ClientId, OutputId, SurfaceId, ViewId};
use log::debug;
use std::collections::HashMap;

/// Result of a hit test
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pick {
    pub view: ViewId,
    pub surface: SurfaceId,
    /// Hit position in the surface's local coordinates
    pub local: Point,
}

/// Output geometry in the global compositor space
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Output {
    pub id: OutputId,
    pub geometry: Rect,
}

/// Role already taken by a surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleConflict {
    pub surface: SurfaceId,
    pub existing: &'static str,
    pub requested: &'static str,
}

pub trait Scene {
    /// Topmost input-accepting view at `position`.
    fn pick(&self, position: Point) -> Option<Pick>;

    fn surface_of(&self, view: ViewId) -> Option<SurfaceId>;

    /// Owning client, or `None` for surfaces without a protocol resource.
    fn client_of(&self, surface: SurfaceId) -> Option<ClientId>;

    fn to_local(&self, view: ViewId, position: Point) -> Point;

    fn outputs(&self) -> Vec<Output>;

    fn output(&self, id: OutputId) -> Option<Output> {
        self.outputs().into_iter().find(|o| o.id == id)
    }

    fn role(&self, surface: SurfaceId) -> Option<&'static str>;

    /// Gives `surface` a role. Re-assigning the same role succeeds.
    fn assign_role(&mut self, surface: SurfaceId, role: &'static str) -> Result<(), RoleConflict>;
}

/// One mapped view in a [`StackScene`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneView {
    pub view: ViewId,
    pub surface: SurfaceId,
    pub client: Option<ClientId>,
    pub geometry: Rect,
}

/// A z-ordered list of rectangles plus an output layout
///
/// Good enough for headless hosts, replay scripts and tests. Views are kept
/// bottom to top; the last mapped view is picked first.
#[derive(Debug, Default, Clone)]
pub struct StackScene {
    views: Vec<SceneView>,
    outputs: Vec<Output>,
    roles: HashMap<SurfaceId, &'static str>,
}

impl StackScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_output(&mut self, id: OutputId, geometry: Rect) -> Output {
        let output = Output { id, geometry };
        self.outputs.retain(|o| o.id != id);
        self.outputs.push(output);
        output
    }

    pub fn remove_output(&mut self, id: OutputId) -> Option<Output> {
        let index = self.outputs.iter().position(|o| o.id == id)?;
        Some(self.outputs.remove(index))
    }

    /// Maps a view on top of the stack.
    pub fn map_view(
        &mut self,
        view: ViewId,
        surface: SurfaceId,
        client: Option<ClientId>,
        geometry: Rect,
    ) {
        self.views.retain(|v| v.view != view);
        self.views.push(SceneView {
            view,
            surface,
            client,
            geometry,
        });
    }

    pub fn unmap_view(&mut self, view: ViewId) -> Option<SceneView> {
        let index = self.views.iter().position(|v| v.view == view)?;
        Some(self.views.remove(index))
    }

    /// Drops every view of `surface` and its role.
    pub fn destroy_surface(&mut self, surface: SurfaceId) -> Vec<ViewId> {
        let removed = self
            .views
            .iter()
            .filter(|v| v.surface == surface)
            .map(|v| v.view)
            .collect();
        self.views.retain(|v| v.surface != surface);
        self.roles.remove(&surface);
        removed
    }

    pub fn raise(&mut self, view: ViewId) -> bool {
        match self.unmap_view(view) {
            Some(entry) => {
                self.views.push(entry);
                true
            }
            None => false,
        }
    }

    pub fn move_view(&mut self, view: ViewId, x: i32, y: i32) -> bool {
        match self.views.iter_mut().find(|v| v.view == view) {
            Some(entry) => {
                entry.geometry.x = x;
                entry.geometry.y = y;
                true
            }
            None => false,
        }
    }

    pub fn views(&self) -> &[SceneView] {
        &self.views
    }

    fn find(&self, view: ViewId) -> Option<&SceneView> {
        self.views.iter().find(|v| v.view == view)
    }
}

impl Scene for StackScene {
    fn pick(&self, position: Point) -> Option<Pick> {
        self.views
            .iter()
            .rev()
            .find(|v| v.geometry.contains_point(position))
            .map(|v| Pick {
                view: v.view,
                surface: v.surface,
                local: self.to_local(v.view, position),
            })
    }

    fn surface_of(&self, view: ViewId) -> Option<SurfaceId> {
        self.find(view).map(|v| v.surface)
    }

    fn client_of(&self, surface: SurfaceId) -> Option<ClientId> {
        self.views
            .iter()
            .find(|v| v.surface == surface)
            .and_then(|v| v.client)
    }

    fn to_local(&self, view: ViewId, position: Point) -> Point {
        match self.find(view) {
            Some(v) => position.offset(
                -Fixed::from_int(v.geometry.x),
                -Fixed::from_int(v.geometry.y),
            ),
            None => position,
        }
    }

    fn outputs(&self) -> Vec<Output> {
        self.outputs.clone()
    }

    fn role(&self, surface: SurfaceId) -> Option<&'static str> {
        self.roles.get(&surface).copied()
    }

    fn assign_role(&mut self, surface: SurfaceId, role: &'static str) -> Result<(), RoleConflict> {
        match self.roles.get(&surface) {
            Some(&existing) if existing != role => Err(RoleConflict {
                surface,
                existing,
                requested: role,
            }),
            Some(_) => Ok(()),
            None => {
                debug!("{} takes role {}", surface, role);
                self.roles.insert(surface, role);
                Ok(())
            }
        }
    }
}
