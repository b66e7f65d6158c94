pub mod address;
pub mod builder;
pub mod channel;
pub mod codec;
pub mod error;
pub mod transport;
pub(self) mod transports;

pub use address::Address;
pub use builder::{bind_publisher, bind_replier, connect_requester, connect_subscriber};
pub use channel::{BroadcastChannel, ReplyChannel};
pub use error::CommsError;
