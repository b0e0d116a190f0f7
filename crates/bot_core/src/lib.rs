pub mod router;
pub mod screens;
pub mod service;
pub mod transport;

pub use router::{ActionRouter, Reply, DEFAULT_GREETINGS};
pub use screens::{ActionTarget, Screen, ScreenAction, ScreenLimits};
pub use service::{deliver, handle_event, serve};
pub use transport::{ChatTransport, InboundEvent, ReplyTarget};
