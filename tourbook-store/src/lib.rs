pub mod app_config;
pub mod booking_repo;
pub mod database;
pub mod events;
pub mod limit_repo;
pub mod mailer;
pub mod memory_repo;
pub mod redis_repo;

pub use booking_repo::StoreBookingRepository;
pub use database::DbClient;
pub use events::EventProducer;
pub use limit_repo::StoreBookingLimitRepository;
pub use mailer::{HttpMailer, LogMailer};
pub use memory_repo::InMemoryStore;
pub use redis_repo::RedisClient;
