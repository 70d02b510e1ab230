pub mod domain;
pub mod frameworks;
pub mod interface_adapters;
pub mod use_cases;

pub use frameworks::runtime::{RunError, run, run_with_config};
pub use interface_adapters::runtime::{RuntimeSettings, SessionHandle, host_session, join_session};
pub use interface_adapters::store::memory::InMemoryStore;
