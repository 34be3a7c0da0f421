pub mod auth;

pub use auth::{actor_middleware, JwtIdentityResolver, StaffClaims};
