//! Event bus adapters.
//!
//! - `RedisEventBus` - Redis pub/sub broker used in production
//! - `InMemoryEventBus` - In-process bus for tests

mod in_memory;
mod redis_bus;

pub use in_memory::InMemoryEventBus;
pub use redis_bus::RedisEventBus;
