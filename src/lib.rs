#[macro_use]
extern crate provenance_system_kit;

pub mod deployments;
pub mod frontend;
