pub mod channel;
pub mod store;
pub mod tiles;
