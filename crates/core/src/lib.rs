#![forbid(unsafe_code)]

pub mod error;
pub mod model;
pub mod scoring;
pub mod subjects;
pub mod time;
pub mod timer;
pub mod validation;

pub use error::Error;
pub use time::Clock;
