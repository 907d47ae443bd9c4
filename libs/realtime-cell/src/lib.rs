pub mod dashboard;
pub mod error;
pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use dashboard::*;
pub use error::*;
pub use models::*;
pub use router::{realtime_routes, RealtimeState};
pub use services::*;
