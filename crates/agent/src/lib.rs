//! Association Scheduling & Execution Subsystem: the scheduler core
//! (Expression Parser, Association Cache, Compliance Store, Schedule
//! Manager, Execution Signal Bus, Task Pool, Processor) plus the bundled
//! collaborator implementations the CLI wires up by default.

pub mod audit;
pub mod bookkeeping;
pub mod cache;
pub mod cancel;
pub mod cli;
pub mod collaborators;
pub mod compliance;
pub mod control_plane;
pub mod expression;
pub mod local;
pub mod pool;
pub mod processor;
pub mod runs;
pub mod schedule_manager;
pub mod signal;
pub mod state;
