mod handler;
mod model;

pub use handler::{
    delete_segment, expire_segments, get_segment, get_segments, save_segment,
};
pub use model::{ExpireResponse, SaveSegmentRequest, SegmentResponse, SegmentsResponse};
