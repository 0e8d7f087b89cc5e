pub mod metabolism;
pub mod pool;

pub use metabolism::{Activity, MetabolismState};
pub use pool::ResourcePool;
