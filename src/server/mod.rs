pub mod config;
mod http_layers;
mod live;
pub mod metrics;
mod responses;
pub mod server;
pub(self) mod session;
pub mod state;

pub use config::ServerConfig;
pub use http_layers::*;
pub use responses::ApiError;
pub use server::{make_app, run_server};
