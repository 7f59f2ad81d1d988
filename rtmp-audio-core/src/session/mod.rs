pub mod controller;
pub(crate) mod notifier;
pub(crate) mod pump;
