pub mod capability;
pub mod cooldown;
pub mod effects;
pub mod tick;

pub use capability::{CapabilityProbe, GrantTable, NoCapabilities, PermissionProbe, PermissionStore};
pub use effects::{dispatch, Effect, EffectSink, Exertion, RecordingSink};
pub use tick::{Phase, StepOutcome, TickEngine};
