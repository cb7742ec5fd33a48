#![doc = r"Core runtime for Vista: stateful components mounted into viewports of a live document tree."]

pub mod collections;
pub mod component;
pub mod identity;
pub mod instance;
pub mod memo;
pub mod patch;
pub mod platform;
pub mod registry;
pub mod runtime;
pub mod shared_state;
pub mod viewport;

pub use component::{
    AlwaysRedraw, Component, ComponentDefinition, EmitTarget, EventScope, RedrawPolicy,
    ReferentialChange, StructuralChange,
};
pub use identity::{IdentityRegistry, ObjectId};
pub use instance::{Instance, InstancePhase, RedrawStats};
pub use memo::{
    memo_stamp, FingerprintValue, Fingerprinter, MemoStamp, MemoStats, Producer, ProducerId,
    Props, RenderCache, RenderContext,
};
pub use platform::RuntimeScheduler;
pub use registry::{ComponentRegistry, InstanceRegistry, MountedInstance};
pub use runtime::{DefaultScheduler, Runtime, RuntimeHandle, RuntimeOptions};
pub use shared_state::{SharedState, SharedStates, StateListener, MAX_NOTIFY_DEPTH};
pub use viewport::{discover, viewport, ReconcileReport, ViewportResolver, DEFAULT_VIEWPORT_MARKER};

pub use vista_dom::{h, text, Document, Event, Node};

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    /// An event reached an instance whose component has no handler for it
    /// in the scope it arrived through.
    MissingHandler {
        component: String,
        scope: EventScope,
        event: String,
    },
    /// The node passed as a mount point carries no `id` attribute.
    MissingViewportId,
    /// No component definition is registered under the viewport's id.
    UnknownComponent { id: String },
    /// An instance is already mounted under this id.
    DuplicateMountPoint { id: String },
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::MissingHandler {
                component,
                scope,
                event,
            } => write!(
                f,
                "component `{component}` has no {scope} handler for event `{event}`"
            ),
            RuntimeError::MissingViewportId => f.write_str("viewport has no id attribute"),
            RuntimeError::UnknownComponent { id } => {
                write!(f, "no component registered for viewport `{id}`")
            }
            RuntimeError::DuplicateMountPoint { id } => {
                write!(f, "an instance is already mounted at `{id}`")
            }
        }
    }
}

impl std::error::Error for RuntimeError {}
