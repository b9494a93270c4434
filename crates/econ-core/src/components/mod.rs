//! ECS Components
//!
//! Entity components for agents and the world resources the systems share.

pub mod agent;
pub mod world;

pub use agent::*;
pub use world::*;
