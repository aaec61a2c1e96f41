//! Linear-algebra helpers shared by reference systems.

pub mod sparse;
