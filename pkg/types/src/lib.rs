pub mod config;
pub mod endpoint;
pub mod policy;
pub mod upstream;
pub mod validate;
