//! Small arithmetic helpers shared by the allocator and the layout engine.

pub(crate) mod layout;
pub(crate) mod size;
