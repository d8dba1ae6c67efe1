//! Entity traits: identity, plus the tenant boundary a record lives in.

use crate::TenantId;

/// A record with a stable identity across updates.
pub trait Entity {
    /// Strongly-typed identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Human-readable kind, used in `NotFound` errors and log lines.
    const KIND: &'static str;

    fn id(&self) -> &Self::Id;
}

/// Marks records that belong to exactly one tenant.
///
/// Stores use this to refuse cross-tenant reads and writes.
pub trait TenantScoped {
    fn tenant_id(&self) -> TenantId;
}
