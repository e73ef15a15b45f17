pub mod auth;
pub mod database;
pub mod network;
pub mod routes;
pub mod schema;
pub mod state;
pub mod structs;

pub use state::AppState;
