pub mod auth;
pub mod error;
pub mod leaderboard;
pub mod mentor;
pub mod middleware;
pub mod routes;
pub mod service;
pub mod state;
pub mod store;
pub mod threads;
pub mod users;

pub use routes::router;
pub use state::{AppState, AppStateInner};
