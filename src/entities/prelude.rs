pub use super::app_state::Entity as AppState;
pub use super::channels::Entity as Channels;
pub use super::sources::Entity as Sources;
