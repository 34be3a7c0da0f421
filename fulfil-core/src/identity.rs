use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

use crate::CoreError;

/// A single permission the engine checks before applying a transition.
///
/// Role names never reach the engine; the identity adapter maps whatever the
/// deployment uses (roles, permission strings) onto this set once per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    ClassifyOrders,
    ReviewPayments,
    CollectCash,
    RegisterCash,
    ManageLogistics,
    ManagePackaging,
    DeliverOrders,
    ManageCarriers,
    CancelOrders,
    OverrideLocks,
}

impl Capability {
    pub const ALL: [Capability; 10] = [
        Capability::ClassifyOrders,
        Capability::ReviewPayments,
        Capability::CollectCash,
        Capability::RegisterCash,
        Capability::ManageLogistics,
        Capability::ManagePackaging,
        Capability::DeliverOrders,
        Capability::ManageCarriers,
        Capability::CancelOrders,
        Capability::OverrideLocks,
    ];

    fn bit(self) -> u16 {
        1 << (self as u16)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::ClassifyOrders => "classify_orders",
            Capability::ReviewPayments => "review_payments",
            Capability::CollectCash => "collect_cash",
            Capability::RegisterCash => "register_cash",
            Capability::ManageLogistics => "manage_logistics",
            Capability::ManagePackaging => "manage_packaging",
            Capability::DeliverOrders => "deliver_orders",
            Capability::ManageCarriers => "manage_carriers",
            Capability::CancelOrders => "cancel_orders",
            Capability::OverrideLocks => "override_locks",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == raw.trim())
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bitset of [`Capability`] values.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CapabilitySet(u16);

impl CapabilitySet {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn all() -> Self {
        Capability::ALL.into_iter().collect()
    }

    pub fn with(mut self, capability: Capability) -> Self {
        self.insert(capability);
        self
    }

    pub fn insert(&mut self, capability: Capability) {
        self.0 |= capability.bit();
    }

    pub fn remove(&mut self, capability: Capability) {
        self.0 &= !capability.bit();
    }

    pub fn contains(&self, capability: Capability) -> bool {
        self.0 & capability.bit() != 0
    }

    pub fn contains_any(&self, capabilities: &[Capability]) -> bool {
        capabilities.iter().any(|c| self.contains(*c))
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = Capability> + '_ {
        Capability::ALL.into_iter().filter(|c| self.contains(*c))
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        let mut set = CapabilitySet::empty();
        for capability in iter {
            set.insert(capability);
        }
        set
    }
}

impl fmt::Debug for CapabilitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// The caller of an engine operation, as resolved by the identity service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub display_name: String,
    pub capabilities: CapabilitySet,
}

impl Actor {
    pub fn new(id: Uuid, display_name: impl Into<String>, capabilities: CapabilitySet) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            capabilities,
        }
    }

    /// Actor used by background ingestion (invoicing webhooks).
    pub fn system() -> Self {
        Self::new(
            Uuid::nil(),
            "system",
            CapabilitySet::empty()
                .with(Capability::ClassifyOrders)
                .with(Capability::CancelOrders),
        )
    }

    pub fn can(&self, capability: Capability) -> bool {
        self.capabilities.contains(capability)
    }

    pub fn can_any(&self, capabilities: &[Capability]) -> bool {
        self.capabilities.contains_any(capabilities)
    }
}

#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Resolve a bearer credential into an actor with its capabilities
    async fn resolve(&self, credential: &str) -> Result<Actor, CoreError>;
}

/// Fixed credential table, used by tests and local runs.
#[derive(Default)]
pub struct StaticIdentityResolver {
    actors: HashMap<String, Actor>,
}

impl StaticIdentityResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_actor(mut self, credential: impl Into<String>, actor: Actor) -> Self {
        self.actors.insert(credential.into(), actor);
        self
    }
}

#[async_trait]
impl IdentityResolver for StaticIdentityResolver {
    async fn resolve(&self, credential: &str) -> Result<Actor, CoreError> {
        tracing::debug!("Resolving static credential");
        self.actors
            .get(credential)
            .cloned()
            .ok_or_else(|| CoreError::IdentityError("unknown credential".to_string()))
    }
}
