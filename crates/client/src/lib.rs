pub mod engine;
pub mod events;

pub use engine::EngineClient;
pub use events::{subscribe_events, SubscribeError};
