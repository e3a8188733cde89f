//! Resource implementations

pub mod server;

pub use server::ServerResource;
