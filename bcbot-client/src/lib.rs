// ABOUTME: Chat client adapter boundary for the bcbot session manager.
// ABOUTME: Capability traits, inbound event records, a serialized session handle and a mock client.

pub mod config;
pub mod error;
pub mod event;
pub mod handle;
pub mod registry;
pub mod traits;
pub mod types;

pub mod backends;

pub use backends::mock::MockClient;
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use event::{EventKind, InboundEvent};
pub use handle::SessionHandle;
pub use registry::{ClientFactory, ClientRegistry};
pub use traits::{ChatClient, ChatSession, Connection};
pub use types::{BotConfig, HistoryQuery, Member, RoomParams, RoomQuery, RoomSummary, SessionInfo};
