//! Client-side realtime pipeline for the eye interface: attaches to the
//! gesture backend, falls back to simulation, and turns whatever arrives
//! into presentation commands.

pub mod connection;
pub mod event_mapper;
pub mod presentation;
mod scheduler;
pub mod session;
pub mod settings;
pub mod simulation;
pub mod transport;

pub use connection::{ConnectionManager, ConnectionState};
pub use event_mapper::EventMapper;
pub use presentation::{DiagnosticSink, Presentation, TracingDiagnostics};
pub use session::{SessionCommand, SessionController, SessionHandle, SessionSnapshot};
pub use settings::PipelineSettings;
pub use simulation::SimulationSource;
pub use transport::{LinkConnector, WebSocketConnector};

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;
