// handlers/mod.rs - route handlers by area
//
// Public: root, health
// Authenticated (principal only): principal
// Tenant-scoped (principal + resolved tenant): everything else

pub mod courses;
pub mod data;
pub mod levels;
pub mod members;
pub mod progress;
pub mod root;
pub mod tenant;
