//! `ums-core`: shared building blocks for the user-management console.
//!
//! Identifiers, the domain error model, the clock abstraction and the email
//! syntax check. No IO.

pub mod clock;
pub mod email;
pub mod entity;
pub mod error;
pub mod id;

pub use clock::{Clock, ManualClock, SystemClock};
pub use email::is_valid_email;
pub use entity::{Entity, TenantScoped};
pub use error::{DomainError, DomainResult};
pub use id::{
    LegalEntityId, OrganizationId, PrivilegeId, RoleId, TenantId, UserId,
};
