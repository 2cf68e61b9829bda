use serde::{Deserialize, Serialize};

use crate::database::models::segment::SegmentEntity;

#[derive(Debug, Deserialize)]
pub struct SaveSegmentRequest {
    #[serde(alias = "name")]
    pub slug: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SegmentResponse {
    pub segment_id: i64,
    pub slug: String,
}

impl From<SegmentEntity> for SegmentResponse {
    fn from(segment: SegmentEntity) -> Self {
        Self {
            segment_id: segment.id,
            slug: segment.slug,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SegmentsResponse {
    pub segments: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExpireResponse {
    pub expired: u64,
}
