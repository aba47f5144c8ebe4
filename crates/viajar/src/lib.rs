//! Viajar: Journey-Based API Testing
//!
//! Viajar (Spanish: "to travel") models application behavior as
//! journeys through a state space. Named checkpoints snapshot every
//! participating system, so a branch can explore multiple alternative
//! continuations from the same state without interference, and a
//! resource-lifecycle graph tracks every entity created during a run
//! for precondition checks and cascading cleanup.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                     VIAJAR Architecture                          │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌───────────┐   ┌─────────────┐   ┌─────────────────────────┐   │
//! │  │ Journey   │   │ Journey     │   │ ResourceGraph + Context │   │
//! │  │ (steps,   │──►│ Runner      │──►│ checkpoint / rollback   │   │
//! │  │ branches) │   │             │   │ per sibling path        │   │
//! │  └───────────┘   └─────────────┘   └─────────────────────────┘   │
//! │  ┌───────────┐   ┌─────────────┐   ┌─────────────────────────┐   │
//! │  │ Dimension │   │ Explorer    │   │ Collaborator ports      │   │
//! │  │ space     │──►│ BFS/DFS/MCTS│──►│ (http, cache, mail, …)  │   │
//! │  └───────────┘   └─────────────┘   └─────────────────────────┘   │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use viajar::journey::Journey;
//! use viajar::runner::JourneyRunner;
//! use viajar::graph::ResourceGraph;
//! use viajar::context::Context;
//! use viajar::schema::{ResourceSchema, ResourceType};
//!
//! let schema = ResourceSchema::from_types(vec![
//!     ResourceType::new("user"),
//! ]).unwrap();
//!
//! let journey = Journey::builder("smoke")
//!     .step("create user", |ctx| {
//!         ctx.graph.create("user", "u1", None, None)?;
//!         Ok(())
//!     })
//!     .checkpoint("ready")
//!     .branch("continuations", "ready", |b| {
//!         b.path("delete", |p| p.step("destroy", |ctx| {
//!             ctx.graph.destroy("user", "u1")
//!         }))
//!         .path("keep", |p| p.step("still there", |ctx| {
//!             assert!(ctx.graph.exists("user", "u1"));
//!             Ok(())
//!         }))
//!     })
//!     .build()
//!     .unwrap();
//!
//! let mut runner = JourneyRunner::new(ResourceGraph::new(schema), Context::new());
//! let report = runner.run(&journey).unwrap();
//! assert!(report.passed());
//! ```

#![warn(missing_docs)]
// Lints are configured in workspace Cargo.toml [workspace.lints.clippy]

/// Named checkpoints and the restorable-collaborator contract.
pub mod checkpoint;
/// Shared step context with scoped views and a client registry.
pub mod context;
/// Combinatorial dimension space for coverage targets.
pub mod dimension;
/// Autonomous state-space exploration (BFS/DFS/MCTS).
pub mod explorer;
/// Runtime resource graph with cascade destroy and rollback.
pub mod graph;
/// HTTP client abstraction and scripted stub.
pub mod http;
/// Schema inference from a parsed API specification.
pub mod infer;
/// Declarative journey model and builder.
pub mod journey;
/// Named infrastructure ports (cache, mail, search, queue, clock).
pub mod ports;
/// Crate error and result types.
pub mod result;
/// Journey execution engine.
pub mod runner;
/// Resource type schema.
pub mod schema;

pub use checkpoint::{sanitize_checkpoint_name, Restorable, SharedSystem, SystemCheckpoint};
pub use context::{Context, ContextSnapshot};
pub use dimension::{Combination, Dimension, DimensionSpace};
pub use explorer::{
    Action, ActionOutcome, ExplorationReport, Explorer, RuntimeContext, Seed, StateFingerprint,
    StopCondition,
};
pub use graph::{Resource, ResourceGraph, ResourceKey, ResourceSnapshot};
pub use infer::infer_schema;
pub use journey::{Journey, JourneyBuilder, Path, Step, StepContext};
pub use result::{ViajarError, ViajarResult};
pub use runner::{Issue, JourneyReport, JourneyRunner, RunnerConfig, Severity};
pub use schema::{ResourceSchema, ResourceType};
