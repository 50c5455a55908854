mod batch;
pub use batch::*;
mod json;
pub use json::*;
