//! Host Document
//!
//! The widget's view of the hosting page: somewhere to mount the embedded
//! surface with its overlay and close affordance, and a window-level
//! `message` listener. Events flow back to the widget through an
//! `EventSink`, so the document never calls into the widget directly.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tokio::sync::mpsc;
use url::Url;

use checkout_core::{CrossContextMessage, InboundMessage, ParentChannel, Result, TargetOrigin};

/// What the user clicked on the mounted surface
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DismissTarget {
    CloseButton,
    /// The backdrop outside the surface
    Overlay,
    /// Inside the surface; never a dismissal
    Content,
}

/// Event delivered from the document to the widget
#[derive(Clone, Debug, PartialEq)]
pub enum HostEvent {
    Message(InboundMessage),
    Dismiss(DismissTarget),
}

pub type EventSink = mpsc::UnboundedSender<HostEvent>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SurfaceId(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(pub u64);

/// Document the widget mounts into
pub trait HostDocument {
    /// Mount the surface at `src` with its overlay. Dismiss clicks go to
    /// `events`.
    fn attach(&self, src: &Url, events: EventSink) -> Result<SurfaceId>;

    fn detach(&self, surface: SurfaceId) -> Result<()>;

    /// Register a window `message` listener forwarding into `events`
    fn add_message_listener(&self, events: EventSink) -> Result<ListenerId>;

    fn remove_message_listener(&self, listener: ListenerId) -> Result<()>;
}

struct MountedSurface {
    src: Url,
    events: EventSink,
}

#[derive(Default)]
struct DocumentState {
    surfaces: BTreeMap<SurfaceId, MountedSurface>,
    listeners: BTreeMap<ListenerId, EventSink>,
    operations: Vec<&'static str>,
    next_id: u64,
}

impl DocumentState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-process document
///
/// Stands in for the hosting page in tests and in the runner. Clones share
/// the same document.
#[derive(Clone)]
pub struct MemoryDocument {
    origin: String,
    state: Arc<Mutex<DocumentState>>,
}

impl MemoryDocument {
    /// Document for a page served from `origin`
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            state: Arc::new(Mutex::new(DocumentState::default())),
        }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn surface_count(&self) -> usize {
        self.lock().surfaces.len()
    }

    pub fn listener_count(&self) -> usize {
        self.lock().listeners.len()
    }

    /// Address of the most recently mounted surface
    pub fn surface_url(&self) -> Option<Url> {
        self.lock().surfaces.values().last().map(|s| s.src.clone())
    }

    /// `attach`, `detach`, `listen` and `unlisten`, in call order
    pub fn operations(&self) -> Vec<&'static str> {
        self.lock().operations.clone()
    }

    /// Deliver a `message` event from `origin` to every listener. Returns
    /// how many listeners received it.
    pub fn post(&self, origin: &str, data: Value) -> usize {
        let state = self.lock();
        state
            .listeners
            .values()
            .filter(|sink| {
                sink.send(HostEvent::Message(InboundMessage::new(origin, data.clone())))
                    .is_ok()
            })
            .count()
    }

    /// Simulate a click on every mounted surface
    pub fn click(&self, target: DismissTarget) {
        for surface in self.lock().surfaces.values() {
            let _ = surface.events.send(HostEvent::Dismiss(target));
        }
    }

    /// Parent handle for a surface served from `surface_origin`
    pub fn parent_channel(&self, surface_origin: impl Into<String>) -> MemoryParent {
        MemoryParent {
            document: self.clone(),
            surface_origin: surface_origin.into(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, DocumentState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl HostDocument for MemoryDocument {
    fn attach(&self, src: &Url, events: EventSink) -> Result<SurfaceId> {
        let mut state = self.lock();
        let id = SurfaceId(state.next_id());
        state.surfaces.insert(
            id,
            MountedSurface {
                src: src.clone(),
                events,
            },
        );
        state.operations.push("attach");
        Ok(id)
    }

    fn detach(&self, surface: SurfaceId) -> Result<()> {
        let mut state = self.lock();
        state.surfaces.remove(&surface);
        state.operations.push("detach");
        Ok(())
    }

    fn add_message_listener(&self, events: EventSink) -> Result<ListenerId> {
        let mut state = self.lock();
        let id = ListenerId(state.next_id());
        state.listeners.insert(id, events);
        state.operations.push("listen");
        Ok(id)
    }

    fn remove_message_listener(&self, listener: ListenerId) -> Result<()> {
        let mut state = self.lock();
        state.listeners.remove(&listener);
        state.operations.push("unlisten");
        Ok(())
    }
}

/// The embedded surface's handle on a `MemoryDocument`
///
/// Posts are dropped silently when the target origin does not match the
/// document, as `postMessage` does.
#[derive(Clone)]
pub struct MemoryParent {
    document: MemoryDocument,
    surface_origin: String,
}

impl ParentChannel for MemoryParent {
    fn post(&self, message: &CrossContextMessage, target: &TargetOrigin) -> Result<()> {
        if !target.admits(self.document.origin()) {
            tracing::debug!(target = %target, origin = %self.document.origin(), "Target origin mismatch, message dropped");
            return Ok(());
        }
        self.document.post(&self.surface_origin, message.to_value()?);
        Ok(())
    }
}
