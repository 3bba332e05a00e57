//! Dockwright release pipeline
//!
//! `Controller` consumes inbound events and runs fetch, build and push for
//! each release request, reporting progress through an `EventSink`.

pub mod controller;
pub mod error;
pub mod events;
pub mod locks;
pub mod stages;

pub use controller::{Controller, Outcome};
pub use error::{PipelineError, Result, SinkError, StageError};
pub use events::{EventSink, MemorySink};
pub use locks::WorkspaceLocks;
pub use stages::{BuildStage, FetchStage, PublishStage};
