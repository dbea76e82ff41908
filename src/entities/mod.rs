//! SeaORM entities

pub mod prelude;

pub mod app_state;
pub mod channels;
pub mod sources;
