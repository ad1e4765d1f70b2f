//! Logic Context
//!
//! The read-only bag of values and capabilities handed to every
//! tick/frame entry point. The logic tree never owns anything in here.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use crate::core::graph::GraphRoot;

/// Per-call context passed down the processor tree.
#[derive(Clone, Default)]
pub struct LogicContext {
    /// Number of logic ticks processed so far.
    pub tick: u64,
    /// Number of frames processed so far.
    pub frame: u64,
    /// Logic time in seconds since the engine started.
    pub time: f64,
    /// Duration of one logic tick in seconds.
    pub tick_duration: f64,
    /// Scene graph root (if a graph collaborator is attached).
    graph: Option<Rc<dyn GraphRoot>>,
    /// Opaque device handler (input/audio), downcast on demand.
    devices: Option<Rc<dyn Any>>,
}

impl LogicContext {
    /// Create a context for the given tick duration.
    pub fn new(tick_duration: f64) -> Self {
        Self {
            tick_duration,
            ..Self::default()
        }
    }

    /// Attach a graph root.
    pub fn with_graph(mut self, graph: Rc<dyn GraphRoot>) -> Self {
        self.graph = Some(graph);
        self
    }

    /// Attach a device handler.
    pub fn with_devices(mut self, devices: Rc<dyn Any>) -> Self {
        self.devices = Some(devices);
        self
    }

    /// Graph root, if any.
    pub fn graph(&self) -> Option<&Rc<dyn GraphRoot>> {
        self.graph.as_ref()
    }

    /// Device handler downcast to its concrete type.
    pub fn devices<T: 'static>(&self) -> Option<&T> {
        self.devices.as_ref().and_then(|d| d.downcast_ref::<T>())
    }
}

impl fmt::Debug for LogicContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogicContext")
            .field("tick", &self.tick)
            .field("frame", &self.frame)
            .field("time", &self.time)
            .field("tick_duration", &self.tick_duration)
            .field("graph", &self.graph.is_some())
            .field("devices", &self.devices.is_some())
            .finish()
    }
}
