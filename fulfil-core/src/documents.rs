use async_trait::async_trait;
use fulfil_shared::Masked;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::CoreError;

/// Who receives the parcel. Fields fall back to the customer on record when
/// the order notes carry no override.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Recipient {
    pub name: Option<String>,
    pub phone: Option<Masked<String>>,
    pub address: Option<String>,
    pub city: Option<String>,
}

impl Recipient {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.phone.is_none() && self.address.is_none() && self.city.is_none()
    }
}

/// Data handed to the renderer for a shipping guide / manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingGuidePayload {
    pub order_id: Uuid,
    pub order_number: String,
    pub carrier_id: Uuid,
    pub carrier_name: String,
    pub recipient: Recipient,
    pub total_amount: i64,
    /// Amount the carrier must collect at the door, if any
    pub collect_on_delivery: Option<i64>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RenderedGuide {
    pub reference: String,
    pub tracking_number: Option<String>,
}

#[async_trait]
pub trait DocumentRenderer: Send + Sync {
    async fn render_shipping_guide(
        &self,
        payload: &ShippingGuidePayload,
    ) -> Result<RenderedGuide, CoreError>;
}

/// Renderer that fabricates references without producing a document.
pub struct MockDocumentRenderer {
    pub assign_tracking: bool,
}

impl MockDocumentRenderer {
    pub fn new() -> Self {
        Self { assign_tracking: false }
    }

    pub fn with_tracking() -> Self {
        Self { assign_tracking: true }
    }
}

impl Default for MockDocumentRenderer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentRenderer for MockDocumentRenderer {
    async fn render_shipping_guide(
        &self,
        payload: &ShippingGuidePayload,
    ) -> Result<RenderedGuide, CoreError> {
        tracing::info!(
            "Rendering shipping guide for order {} via {}",
            payload.order_number,
            payload.carrier_name
        );

        let tracking_number = self
            .assign_tracking
            .then(|| format!("TRK-{}", &payload.order_id.simple().to_string()[..10].to_uppercase()));

        Ok(RenderedGuide {
            reference: format!("GUIA-{}", payload.order_number),
            tracking_number,
        })
    }
}
