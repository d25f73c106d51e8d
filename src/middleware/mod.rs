pub mod auth;
pub mod client_ip;

pub use auth::*;
pub use client_ip::*;
