//! Testing utilities and harness for Vista

pub mod testing;

pub use testing::*;

pub mod prelude {
    pub use crate::testing::*;
    pub use vista_core::{
        h, text, viewport, Component, EmitTarget, Event, EventScope, MountedInstance, Node,
        RuntimeError, SharedState,
    };
}
