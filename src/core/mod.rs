//! Core collaborator surfaces.
//!
//! The logic tree only reaches the outside world through the types in
//! this module: the per-call context and the graph-node capabilities.

use std::rc::Rc;

pub mod context;
pub mod graph;
pub mod memory;

// Re-export core types
pub use context::LogicContext;
pub use graph::{GraphNode, GraphRoot, NodePosition, ObservableNode};
pub use memory::{MemoryGraph, MemoryNode};

/// Pointer identity for shared handles, trait objects included.
///
/// Compares data addresses only; vtable pointers are not stable across
/// codegen units.
pub(crate) fn same_target<T: ?Sized, U: ?Sized>(a: &Rc<T>, b: &Rc<U>) -> bool {
    std::ptr::eq(Rc::as_ptr(a) as *const (), Rc::as_ptr(b) as *const ())
}
