//! Focus routing shared by every device class
//!
//! A [`FocusRouter`] owns one device's binding bucket and its current focus
//! target. On a focus change it sends leave to the old client's bindings,
//! swaps the focused partition back, moves the new client's bindings in and
//! sends them enter, issuing serials as it goes. What enter and leave look
//! like on the wire differs per class and is supplied by a [`FocusEmitter`].

use crate::bucket::{Partition, ResourceBucket};
use crate::event::{DeviceKind, Outbox, SeatSignal};
use crate::geometry::Point;
use crate::listener::{DestroyListeners, ListenerToken, Subscriber, Watched};
use crate::object::{ClientId, ObjectRef, SurfaceId, ViewId};
use crate::scene::{Pick, Scene};
use crate::serial::{Serial, SerialCounter};
use log::debug;
use std::marker::PhantomData;

/// Type-level tag for a device class
pub trait DeviceClass {
    const KIND: DeviceKind;
}

#[derive(Debug)]
pub struct PointerClass;
#[derive(Debug)]
pub struct KeyboardClass;
#[derive(Debug)]
pub struct TouchClass;
#[derive(Debug)]
pub struct TabletToolClass;

impl DeviceClass for PointerClass {
    const KIND: DeviceKind = DeviceKind::Pointer;
}
impl DeviceClass for KeyboardClass {
    const KIND: DeviceKind = DeviceKind::Keyboard;
}
impl DeviceClass for TouchClass {
    const KIND: DeviceKind = DeviceKind::Touch;
}
impl DeviceClass for TabletToolClass {
    const KIND: DeviceKind = DeviceKind::TabletTool;
}

/// What a device is focused on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FocusTarget {
    /// Keyboard focus is per surface and carries no view
    pub view: Option<ViewId>,
    pub surface: SurfaceId,
    /// `None` when the surface has no protocol resource
    pub client: Option<ClientId>,
}

impl FocusTarget {
    pub fn from_pick(scene: &dyn Scene, pick: &Pick) -> Self {
        Self {
            view: Some(pick.view),
            surface: pick.surface,
            client: scene.client_of(pick.surface),
        }
    }

    pub fn view(scene: &dyn Scene, view: ViewId) -> Option<Self> {
        let surface = scene.surface_of(view)?;
        Some(Self {
            view: Some(view),
            surface,
            client: scene.client_of(surface),
        })
    }

    pub fn surface(scene: &dyn Scene, surface: SurfaceId) -> Self {
        Self {
            view: None,
            surface,
            client: scene.client_of(surface),
        }
    }
}

/// Shared seat plumbing every router and grab needs
pub struct RoutingContext<'a> {
    pub serials: &'a SerialCounter,
    pub out: &'a mut Outbox,
    pub listeners: &'a mut DestroyListeners,
}

impl<'a> RoutingContext<'a> {
    pub fn new(
        serials: &'a SerialCounter,
        out: &'a mut Outbox,
        listeners: &'a mut DestroyListeners,
    ) -> Self {
        Self {
            serials,
            out,
            listeners,
        }
    }

    pub fn reborrow(&mut self) -> RoutingContext<'_> {
        RoutingContext {
            serials: self.serials,
            out: self.out,
            listeners: self.listeners,
        }
    }
}

/// Class-specific enter and leave traffic
pub trait FocusEmitter<D: DeviceClass> {
    /// Devices that never announce focus (touch) skip serials entirely.
    fn announces(&self) -> bool {
        true
    }

    fn leave(&mut self, out: &mut Outbox, binding: ObjectRef, serial: Serial, surface: SurfaceId);

    /// Runs once for the entering client, before any of its bindings get
    /// `enter`.
    fn before_enter(&mut self, _out: &mut Outbox, _client: ClientId, _serial: Serial) {}

    fn enter(
        &mut self,
        out: &mut Outbox,
        binding: ObjectRef,
        serial: Serial,
        target: &FocusTarget,
        local: Point,
    );
}

/// Emitter for devices without enter/leave traffic
#[derive(Debug, Default)]
pub struct SilentFocus;

impl<D: DeviceClass> FocusEmitter<D> for SilentFocus {
    fn announces(&self) -> bool {
        false
    }

    fn leave(&mut self, _: &mut Outbox, _: ObjectRef, _: Serial, _: SurfaceId) {}

    fn enter(&mut self, _: &mut Outbox, _: ObjectRef, _: Serial, _: &FocusTarget, _: Point) {}
}

#[derive(Debug)]
pub struct FocusRouter<D: DeviceClass> {
    bucket: ResourceBucket,
    focus: Option<FocusTarget>,
    local: Option<Point>,
    focus_serial: Serial,
    subscriber: Subscriber,
    view_listener: Option<ListenerToken>,
    surface_listener: Option<ListenerToken>,
    _class: PhantomData<D>,
}

impl<D: DeviceClass> FocusRouter<D> {
    pub fn new(subscriber: Subscriber) -> Self {
        Self {
            bucket: ResourceBucket::new(),
            focus: None,
            local: None,
            focus_serial: Serial::default(),
            subscriber,
            view_listener: None,
            surface_listener: None,
            _class: PhantomData,
        }
    }

    pub fn focus(&self) -> Option<FocusTarget> {
        self.focus
    }

    pub fn focus_surface(&self) -> Option<SurfaceId> {
        self.focus.map(|f| f.surface)
    }

    pub fn focus_view(&self) -> Option<ViewId> {
        self.focus.and_then(|f| f.view)
    }

    pub fn focus_client(&self) -> Option<ClientId> {
        self.focus.and_then(|f| f.client)
    }

    pub fn focus_serial(&self) -> Serial {
        self.focus_serial
    }

    pub fn local(&self) -> Option<Point> {
        self.local
    }

    /// Updates the local coordinates without a focus transition.
    pub fn set_local(&mut self, local: Option<Point>) {
        self.local = local;
    }

    pub fn bucket(&self) -> &ResourceBucket {
        &self.bucket
    }

    pub fn focused(&self) -> impl Iterator<Item = ObjectRef> + '_ {
        self.bucket.focused()
    }

    /// Adds a client binding in the partition its client belongs in.
    pub fn add_binding(&mut self, object: ObjectRef) -> Partition {
        let partition = if self.focus_client() == Some(object.client) {
            Partition::Focused
        } else {
            Partition::Unfocused
        };
        self.bucket.insert(object, partition);
        partition
    }

    pub fn remove_binding(&mut self, object: ObjectRef) -> Option<Partition> {
        self.bucket.remove(object)
    }

    pub fn remove_client(&mut self, client: ClientId) -> Vec<ObjectRef> {
        self.bucket.remove_client(client)
    }

    /// Moves focus to `target`.
    ///
    /// Returns false, and sends nothing, when the surface and local
    /// coordinates are unchanged. A different view of the same surface is
    /// adopted silently.
    ///
    /// [`SeatSignal::FocusChanged`] fires only when the focused surface
    /// changes. Re-entering the same surface at new local coordinates sends
    /// leave and enter to clients but no signal.
    pub fn set_focus<E: FocusEmitter<D>>(
        &mut self,
        target: Option<FocusTarget>,
        local: Option<Point>,
        ctx: &mut RoutingContext<'_>,
        emitter: &mut E,
    ) -> bool {
        let old_surface = self.focus_surface();
        let new_surface = target.map(|t| t.surface);

        if old_surface == new_surface && self.local == local {
            if self.focus_view() != target.and_then(|t| t.view) {
                self.focus = target;
                self.watch(ctx.listeners);
            }
            return false;
        }

        let announces = emitter.announces();

        if let Some(old) = self.focus {
            if announces && self.bucket.has_focused() {
                let serial = ctx.serials.next_serial();
                let leaving: Vec<ObjectRef> = self.bucket.focused().collect();
                for binding in leaving {
                    emitter.leave(ctx.out, binding, serial, old.surface);
                }
            }
        }
        self.bucket.unfocus_all();

        self.focus = target;
        self.local = local;

        if let Some(target) = target {
            if let Some(client) = target.client {
                if self.bucket.focus_client(client) > 0 && announces {
                    let serial = ctx.serials.next_serial();
                    emitter.before_enter(ctx.out, client, serial);
                    let position = local.unwrap_or_default();
                    let entering: Vec<ObjectRef> = self.bucket.focused().collect();
                    for binding in entering {
                        emitter.enter(ctx.out, binding, serial, &target, position);
                    }
                    self.focus_serial = serial;
                }
            }
        }

        self.watch(ctx.listeners);

        if old_surface != new_surface {
            debug!(
                "{:?} focus {:?} -> {:?}",
                D::KIND,
                old_surface,
                new_surface
            );
            ctx.out.signal(SeatSignal::FocusChanged {
                device: D::KIND,
                surface: new_surface,
            });
        }

        true
    }

    /// Forgets the destroy subscriptions after one of them fired.
    pub fn forget_listeners(&mut self, listeners: &mut DestroyListeners) {
        listeners.cancel_slot(&mut self.view_listener);
        listeners.cancel_slot(&mut self.surface_listener);
    }

    fn watch(&mut self, listeners: &mut DestroyListeners) {
        self.forget_listeners(listeners);
        if let Some(target) = self.focus {
            if let Some(view) = target.view {
                self.view_listener = Some(listeners.subscribe(Watched::View(view), self.subscriber));
            }
            self.surface_listener =
                Some(listeners.subscribe(Watched::Surface(target.surface), self.subscriber));
        }
    }
}
