//! SeaORM repositories

pub mod app_state;
pub mod channel;
pub mod source;

pub use app_state::AppStateSeaOrmRepository;
pub use channel::ChannelSeaOrmRepository;
pub use source::SourceSeaOrmRepository;
