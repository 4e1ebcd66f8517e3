//! Scope stack - nested lexical scoping and produced-binding routing
//!
//! The analyzer keeps one [`Stack`] per traversal. Each [`Frame`] decides
//! how names resolve at its level, where declarations land, and what a
//! binding produced by a subtree means there.

pub mod frame;
pub mod stack;

pub use frame::{Flow, Frame, SelectScope, Source};
pub use stack::Stack;
