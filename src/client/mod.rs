//! Dashboard client: HTTP access, a local copy of the data and derived views.

pub mod api;
pub mod store;
pub mod views;

pub use api::{ApiClient, ClientError, ClientResult};
pub use store::{DashboardStore, StoreError, WorkerUpdate};
