pub mod macros;
pub mod protocol;
pub mod types;
