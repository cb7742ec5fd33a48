//! Document tree primitives for the Vista runtime.
//!
//! This crate holds everything the runtime treats as an external
//! collaborator: a reference-counted mutable tree of element and text
//! nodes, a minimal event system with window and document targets, a
//! small element construction helper and the [`morph`] primitive that
//! patches one tree into the shape of another.

mod document;
pub mod event;
pub mod html;
pub mod morph;
pub mod node;

pub use document::Document;
pub use event::{Event, EventTarget, Listener};
pub use html::{h, text, ElementBuilder};
pub use morph::{morph, DefaultMorphHooks, MorphHooks, MorphStats};
pub use node::{Node, WeakNode};
