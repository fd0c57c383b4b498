pub mod email;
pub mod ids;
pub mod logging;

pub use tracing;

/// Control signal broadcast to long-running components.
#[derive(Debug, Clone, Copy)]
pub enum Signal {
    Shutdown,
}
