#![deny(clippy::all, clippy::pedantic, clippy::nursery)]

pub mod daemon;
pub mod dispatcher;
pub mod supervisor;
pub mod types;
pub mod worker;
