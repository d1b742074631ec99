pub mod context;
pub mod history;
pub mod risk;

pub use context::*;
pub use history::*;
pub use risk::*;
