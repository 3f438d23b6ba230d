// author: kodeholic (powered by Claude)

pub mod kind;
pub mod message;
pub mod router;

pub use router::{dispatch, ws_handler, AppState};
