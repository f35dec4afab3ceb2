pub mod app;
pub mod appearance;
pub mod config;
pub mod configurations;
pub mod error;
pub mod events;
pub mod interruption;
pub mod layout;
pub mod presenter;
pub mod segments;
pub mod spin;
pub mod storage;
pub mod sys;

pub use error::WheelError;
