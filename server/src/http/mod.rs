mod dto;
mod error;
mod handlers;
mod server;
mod state;


pub use dto::{ErrorResponse, ListParams, PullParams};
pub use error::{ApiError, ApiResult};
pub use server::{router, shutdown_signal, start_server};
pub use state::AppState;
