//! Player Metabolism - stamina and boost simulation for active players

pub mod core;
pub mod ecs;
pub mod entity;
pub mod simulation;
