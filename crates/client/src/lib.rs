//! Client side of shellcache: everything between a controlled page and the
//! network.
//!
//! This crate provides the network transport, the request model, the
//! exclusion rules, the cache-first router and the worker lifecycle that
//! installs and retires cache generations.

pub mod fetch;
pub mod lifecycle;
pub mod request;
pub mod router;
pub mod rules;

#[cfg(test)]
pub(crate) mod testing;

pub use fetch::{FetchConfig, HttpTransport, Transport, TransportError};
pub use lifecycle::{
    ActivationReport, ClientRegistry, GenerationManager, InstallReport, LifecycleState, ShellWorker, StartReport,
};
pub use request::{InterceptedRequest, RequestMode, ShellResponse};
pub use router::{RouteDecision, Routed, Router};
pub use rules::{ExclusionRule, ExclusionRules};
