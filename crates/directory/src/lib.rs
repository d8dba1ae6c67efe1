//! `ums-directory`: tenants and the records that live inside them.
//!
//! Organizations, users, roles, privileges and legal entities are all
//! tenant-scoped: every operation names the tenant, and records of one tenant
//! are never visible from another.

pub mod records;
pub mod service;
pub mod store;

pub use records::{
    LegalEntity, LegalEntityDraft, LegalEntityPatch, LegalEntityType, Organization,
    OrganizationDraft, OrganizationPatch, Privilege, PrivilegeDraft, PrivilegePatch, Record, Role,
    RoleDraft, RolePatch, Tenant, TenantDraft, TenantPatch, User, UserDraft, UserPatch,
};
pub use service::{Collection, Directory, TenantRegistry};
pub use store::{InMemoryTenantStore, TenantStore};
