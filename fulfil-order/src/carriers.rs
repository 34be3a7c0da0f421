use chrono::Utc;
use fulfil_core::{Actor, Capability};
use uuid::Uuid;

use crate::error::{OrderError, OrderResult};
use crate::guards::{illegal, require};
use crate::models::OrderSummary;
use crate::records::{Carrier, CarrierChangeLog};
use crate::repository::Stores;
use crate::rules::EngineRules;
use crate::writer::OrderWriter;

/// Shipping carrier registry plus carrier reassignment on orders.
pub struct CarrierDirectory {
    stores: Stores,
    writer: OrderWriter,
    rules: EngineRules,
}

impl CarrierDirectory {
    pub fn new(stores: Stores, writer: OrderWriter, rules: EngineRules) -> Self {
        Self { stores, writer, rules }
    }

    pub async fn register_carrier(&self, name: &str, actor: &Actor) -> OrderResult<Carrier> {
        require(actor, &[Capability::ManageCarriers], "register carrier")?;

        let name = name.trim();
        if name.is_empty() {
            return Err(OrderError::Validation("carrier name is required".to_string()));
        }

        let carrier = Carrier::new(name);
        self.stores.carriers.insert(&carrier).await?;
        tracing::info!("Registered carrier {} ({})", carrier.name, carrier.id);
        Ok(carrier)
    }

    pub async fn set_carrier_active(&self, carrier_id: Uuid, active: bool, actor: &Actor) -> OrderResult<Carrier> {
        require(actor, &[Capability::ManageCarriers], "update carrier")?;

        let carrier = self
            .stores
            .carriers
            .set_active(carrier_id, active)
            .await?
            .ok_or_else(|| OrderError::not_found("carrier", carrier_id))?;
        tracing::info!("Carrier {} active={}", carrier.name, carrier.active);
        Ok(carrier)
    }

    pub async fn list_carriers(&self, active_only: bool) -> OrderResult<Vec<Carrier>> {
        Ok(self.stores.carriers.list(active_only).await?)
    }

    pub async fn get_carrier(&self, carrier_id: Uuid) -> OrderResult<Carrier> {
        self.stores
            .carriers
            .get(carrier_id)
            .await?
            .ok_or_else(|| OrderError::not_found("carrier", carrier_id))
    }

    /// Carrier for a new assignment: must exist and be active.
    pub async fn assignable(&self, carrier_id: Uuid) -> OrderResult<Carrier> {
        let carrier = self.get_carrier(carrier_id).await?;
        if !carrier.active {
            return Err(OrderError::Validation(format!(
                "carrier {} is inactive",
                carrier.name
            )));
        }
        Ok(carrier)
    }

    /// Move an order to another carrier.
    ///
    /// Delivered and cancelled orders are locked unless `override_lock` is
    /// set by an actor allowed to override. Any real change drops the
    /// tracking number and the generated guide.
    pub async fn change_carrier(
        &self,
        order_id: Uuid,
        carrier_id: Uuid,
        reason: &str,
        override_lock: bool,
        actor: &Actor,
    ) -> OrderResult<OrderSummary> {
        require(actor, &[Capability::ManageLogistics], "change carrier")?;
        if override_lock {
            require(actor, &[Capability::OverrideLocks], "override carrier lock")?;
        }
        let reason = self.rules.reason("reason", reason).map_err(OrderError::Validation)?;

        let order = self.writer.load(order_id).await?;

        if order.status.is_terminal() && !override_lock {
            return Err(illegal(&order, "change_carrier"));
        }
        if order.is_pickup() {
            return Err(OrderError::Validation(
                "pickup orders cannot reference a carrier".to_string(),
            ));
        }
        if order.carrier_id == Some(carrier_id) {
            tracing::debug!("Order {} already uses carrier {}", order.order_number, carrier_id);
            return Ok(OrderSummary::from(&order));
        }

        let carrier = self.assignable(carrier_id).await?;

        let mut after = order.clone();
        after.set_carrier(Some(carrier.id));
        let after = self.writer.commit(&order, after, "change_carrier", actor).await?;

        let log = CarrierChangeLog {
            id: Uuid::new_v4(),
            order_id,
            old_carrier_id: order.carrier_id,
            new_carrier_id: carrier.id,
            changed_by: actor.id,
            reason: reason.to_string(),
            overridden: override_lock && order.status.is_terminal(),
            created_at: Utc::now(),
        };
        if let Err(e) = self.stores.carrier_changes.append(&log).await {
            tracing::warn!("Carrier change for order {} not audited: {}", order.order_number, e);
        }

        Ok(OrderSummary::from(&after))
    }

    pub async fn changes_for(&self, order_id: Uuid) -> OrderResult<Vec<CarrierChangeLog>> {
        Ok(self.stores.carrier_changes.list_for(order_id).await?)
    }
}
