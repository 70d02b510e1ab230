// Use cases layer: session workflows on top of the domain rules.

pub mod context;
pub mod lifecycle;
pub mod membership;
pub mod reconcile;
pub mod simulation;
pub mod sync;
pub mod types;

pub use context::SessionContext;
pub use types::{
    Command, FrameOutput, Inbound, InputPayload, LifecycleWrite, ParticipantRecord, Profile,
    RenderState, WorldPayload,
};
