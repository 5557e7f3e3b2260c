pub extern crate uuid;

mod error;
mod message;
mod session_store;
mod types;

pub use error::*;
pub use message::*;
pub use session_store::*;
pub use types::*;
