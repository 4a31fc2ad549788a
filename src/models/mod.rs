pub mod edit;
pub mod telegram;

pub use edit::*;
pub use telegram::*;
