pub mod actions;
pub mod config;
pub mod directives;
pub mod dispatch;
pub mod dom;
pub mod engine;
pub mod filter;
pub mod log;
pub mod remote;
pub mod scheduler;
pub mod value;
pub mod walk;

pub use config::{Config, LogRouting};
pub use dispatch::DirectiveKind;
pub use dom::{Document, InsertLocation, NodeId, OpenRequest};
pub use engine::{Engine, TrapOp, INDICATOR_ID, INIT_ELEMENT_ID, R_OK, TRAP_CLASS};
pub use filter::FilterVerdict;
pub use log::{LogEntry, LogLevel, LogSink, MemorySink, StdSink};
pub use remote::{HttpTransport, Transport, TransportReply};
pub use scheduler::{Scheduler, TimerHandle};
