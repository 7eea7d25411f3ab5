pub mod blocking;
pub mod logging;
pub mod time;

pub use blocking::run_blocking;
pub use logging::init_logging;
