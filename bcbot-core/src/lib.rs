// ABOUTME: Session manager for a single long-lived chat bot connection
// ABOUTME: Lifecycle controller, command dispatcher, event buffer, config and metrics

pub mod buffer;
pub mod commands;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod metrics;
pub mod paths;
pub mod session;

pub use buffer::{Event, EventBuffer, DEFAULT_EVENT_CAPACITY};
pub use config::{Config, StartBotRequest, Transport};
pub use dispatcher::CommandDispatcher;
pub use error::{BotError, BotResult, ErrorKind};
pub use session::{SessionController, SessionFailure, SessionSettings, SessionState, SessionStatus};

// Re-export adapter types
pub use bcbot_client::{BotConfig, ChatClient, ClientRegistry, EventKind, MockClient};
