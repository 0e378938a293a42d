use serde::Serialize;
use utoipa::ToSchema;

use crate::models::ImageFile;

#[derive(Debug, Serialize, ToSchema)]
pub struct UploadedImage {
    #[serde(flatten)]
    pub file: ImageFile,
    pub url: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct ImageList {
    #[schema(value_type = Vec<UploadedImage>)]
    pub items: Vec<UploadedImage>,
}
