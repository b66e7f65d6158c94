pub mod args;
pub mod broadcast;
pub mod reply;
pub mod request;
