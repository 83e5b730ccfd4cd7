mod config;
mod session;
mod terminal;
mod watch;

pub use config::*;
pub use session::*;
pub use terminal::*;
pub use watch::*;
