//! Wire model and handler contract shared by the RPC server, its clients and
//! the operations they register.

pub mod macros;
pub mod model;
pub mod traits;

pub use model::args::{ArgumentError, Args};
pub use model::broadcast::{HEARTBEAT_INTERVAL, HEARTBEAT_TOLERANCE, HEARTBEAT_TOPIC};
pub use model::reply::CallReply;
pub use model::request::CallRequest;
pub use traits::handler::Handler;

#[doc(hidden)]
pub mod __private {
    pub use anyhow;
    pub use serde_json;
}

pub mod prelude {
    pub use crate::model::args::Args;
    pub use crate::model::reply::CallReply;
    pub use crate::operation;
    pub use crate::traits::handler::Handler;
    pub use serde_json::{json, Value};
}
