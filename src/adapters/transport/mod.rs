//! Transport adapter: event table between sockets and the chat router.

pub mod dispatcher;

pub use dispatcher::EventDispatcher;
