pub mod protocol;
pub mod rest;
pub mod state;
pub mod ws_handler;

// Re-export the handlers to make them easily accessible
// to the binary that builds the router.
pub use rest::{clear_passport_handler, get_passport_handler, health_handler};
pub use ws_handler::ws_handler;
