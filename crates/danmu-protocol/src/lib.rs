pub mod frames;
pub mod message;
