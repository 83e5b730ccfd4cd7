mod aliases;
mod content;
mod entry;
mod options;
mod tools;

pub use aliases::*;
pub use content::*;
pub use entry::*;
pub use options::*;
pub use tools::*;
