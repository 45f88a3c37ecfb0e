//! Emergency message bridge.
//!
//! [`router::DispatchRouter`] turns a `(channel, phone, message)` triple into
//! an SMS or a WhatsApp hand-off. The `app` module serves it over HTTP.

pub mod app;
pub mod config;
pub mod error;
pub mod handlers;
pub mod phone;
pub mod router;
pub mod segment;
pub mod transport;
pub mod types;

pub use config::DispatchConfig;
pub use error::DispatchError;
pub use router::{Channel, Delivery, DispatchRequest, DispatchRouter, Dispatched};
