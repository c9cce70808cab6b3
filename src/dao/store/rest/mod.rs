//! REST/SSE implementation of [`crate::dao::store::SharedStore`] for
//! RTDB-compatible hosted stores.

mod config;
mod error;
mod store;
mod stream;

pub use config::RestConfig;
pub use error::{RestDaoError, RestResult};
pub use store::RestStore;
