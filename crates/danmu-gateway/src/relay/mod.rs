pub mod broadcast;
pub mod liveness;
pub mod registry;
pub mod stream;
