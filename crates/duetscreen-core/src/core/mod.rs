//! Link-level events shared by the poller and the UI

pub mod event;

pub use event::{Connectivity, ConnectivityDispatcher, ConnectivityEvent};
