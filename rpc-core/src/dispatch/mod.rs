pub mod dispatcher;
pub mod registry;
mod trace;

pub use dispatcher::{DispatchError, Dispatcher};
pub use registry::{FunctionRegistry, OperationNotFound};
