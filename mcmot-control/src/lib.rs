//! Control plane: per-cycle context, pipeline/node execution (C9), and
//! phase resolution (C10).

mod context;
mod error;
mod phase_engine;
mod pipeline;
mod publisher;
mod runner;
mod scheduler;

pub use context::{Context, Paths};
pub use error::{Error, Result};
pub use phase_engine::{
    DebouncedResolver, LoggingPhaseChangeObserver, PhaseChangeObserver, PhaseResolver, SinglePhaseResolver,
    StalePolicy, TimeWindowResolver,
};
pub use pipeline::{
    DefaultFormatter, DispatchNode, Dispatcher, FormatNode, Formatter, IngestionNode, LoggingDispatcher,
    Node, NoOpRuleEngine, Pipeline, RuleEngine, RulesNode, TaskOutcome, TrackingNode,
};
pub use publisher::{HttpPublisher, MqttPublisher, PhasePublisher, PublisherOrchestrator};
pub use runner::{run_workflow, LoopReport, LoopTask, RunnerConfig, StartupTask};
pub use scheduler::{PhasePolicy, Registry};
