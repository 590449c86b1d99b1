pub mod enums;
pub mod error;
pub mod models;
pub mod schema;
pub mod state;
pub mod utils;

pub use enums::*;
pub use error::{ApiError, ApiResult};
pub use utils::DbPool;
