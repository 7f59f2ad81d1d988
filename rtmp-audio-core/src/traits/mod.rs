pub mod capture_source;
pub mod encoder;
pub mod observer;
pub mod permission;
pub mod transport;
