// Adapters between the session use cases and the shared store.

pub mod protocol;
pub mod runtime;
pub mod session_loop;
pub mod store;
pub mod utils;
