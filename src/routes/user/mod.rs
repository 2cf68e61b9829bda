mod handler;
mod model;

pub use handler::{configure_segments, delete_user, get_user, get_user_segments, save_user};
pub use model::{ConfigureSegmentsRequest, SaveUserRequest, UserResponse, UserSegmentsResponse};
