pub mod config;
pub mod destination;
pub mod error;
pub mod frame;
pub mod session_info;
pub mod state;
