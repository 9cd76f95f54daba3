//! TokenScope HTTP API
//! JSON routes and SSE streams for the dashboard

pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod stream;
pub mod types;

pub use handlers::AppState;
pub use middleware::start_cleanup_task;
pub use routes::create_router;
pub use types::*;
