mod category;
mod entry;
mod money;
mod summary;

pub use category::*;
pub use entry::*;
pub use money::*;
pub use summary::*;
