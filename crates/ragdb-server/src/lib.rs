//! RagDB server library: shared state and the `/api` router.

pub mod routes;
pub mod state;

pub use routes::build_router;
pub use state::AppState;
