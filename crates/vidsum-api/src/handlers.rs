//! Request handlers.

pub mod cache;
pub mod health;
pub mod jobs;
pub mod summaries;
pub mod uploads;

pub use cache::*;
pub use health::*;
pub use jobs::*;
pub use summaries::*;
pub use uploads::*;
