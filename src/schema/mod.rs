pub mod message;
pub mod webhook;

pub use message::*;
pub use webhook::*;
