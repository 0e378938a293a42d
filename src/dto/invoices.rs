use serde::Serialize;
use utoipa::ToSchema;

use crate::models::Invoice;

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct InvoiceList {
    #[schema(value_type = Vec<Invoice>)]
    pub items: Vec<Invoice>,
}
