pub mod engine;
pub mod router;
pub mod states;

pub use engine::DecisionEngine;
pub use router::{
    Advance, ChainPosition, ChainRouter, Route, RouteKey, RouteStage, RoutingError, RoutingTable,
};
pub use states::{
    Actor, Decision, DecisionCommand, DecisionPayload, Recipient, RecordSnapshot, RequestDecided,
    WorkflowEvent,
};
