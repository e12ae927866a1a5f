pub mod connection;
pub mod dispatcher;
pub mod router;

pub use dispatcher::{Audience, Dispatcher, Outbound};
