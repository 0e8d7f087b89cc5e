pub mod world;

pub use world::MetabolismWorld;
