use async_trait::async_trait;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use fulfil_core::{Actor, Capability, CapabilitySet, CoreError, IdentityResolver};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

// ============================================================================
// JWT Claims
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StaffClaims {
    pub sub: String,
    pub name: String,
    pub role: String,
    #[serde(default)]
    pub permissions: Vec<String>,
    pub exp: usize,
}

/// Department roles and what they may do. Extra grants arrive as
/// `permissions` entries named after [`Capability`].
pub fn role_capabilities(role: &str) -> CapabilitySet {
    use Capability::*;

    let granted: &[Capability] = match role.trim().to_ascii_uppercase().as_str() {
        "ADMIN" | "SUPER_ADMIN" => &Capability::ALL,
        "FACTURACION" => &[ClassifyOrders, CancelOrders],
        "CARTERA" => &[ReviewPayments, RegisterCash, CollectCash],
        "LOGISTICA" => &[ManageLogistics, ManagePackaging, ManageCarriers, RegisterCash],
        "EMPAQUE" => &[ManagePackaging],
        "MENSAJERO" => &[DeliverOrders],
        _ => &[],
    };
    granted.iter().copied().collect()
}

// ============================================================================
// Identity resolver
// ============================================================================

pub struct JwtIdentityResolver {
    key: DecodingKey,
}

impl JwtIdentityResolver {
    pub fn new(secret: &str) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

#[async_trait]
impl IdentityResolver for JwtIdentityResolver {
    async fn resolve(&self, credential: &str) -> Result<Actor, CoreError> {
        let token_data = decode::<StaffClaims>(credential, &self.key, &Validation::default())
            .map_err(|e| CoreError::IdentityError(e.to_string()))?;
        let claims = token_data.claims;

        let id = Uuid::parse_str(&claims.sub)
            .map_err(|_| CoreError::IdentityError(format!("subject is not a user id: {}", claims.sub)))?;

        let mut capabilities = role_capabilities(&claims.role);
        for permission in &claims.permissions {
            match Capability::parse(permission) {
                Some(capability) => capabilities.insert(capability),
                None => tracing::debug!("Ignoring unknown permission {} for {}", permission, claims.sub),
            }
        }

        Ok(Actor::new(id, claims.name, capabilities))
    }
}

// ============================================================================
// Staff Authentication Middleware
// ============================================================================

/// Resolve the bearer token into an [`Actor`] and stash it in the request
/// extensions for the handlers.
pub async fn actor_middleware(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    // 1. Extract token
    let TypedHeader(Authorization(bearer)) =
        bearer.ok_or_else(|| AppError::AuthenticationError("Missing bearer token".to_string()))?;

    // 2. Resolve identity
    let actor = state.identity.resolve(bearer.token()).await.map_err(|e| {
        tracing::debug!("Rejected credential: {}", e);
        AppError::AuthenticationError("Invalid or expired token".to_string())
    })?;

    // 3. Inject actor
    req.extensions_mut().insert(actor);

    Ok(next.run(req).await)
}
