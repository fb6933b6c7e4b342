//! Pure detection algorithms. Nothing in here touches a database.

pub mod extract;
pub mod graph;
pub mod muting;
pub mod nominal;
pub mod smoothing;
