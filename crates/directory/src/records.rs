//! Directory records: tenants and the five tenant-scoped entity kinds.
//!
//! Each kind comes with a `*Draft` (create input) and a `*Patch` (partial
//! update, `None` keeps the current value).

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use ums_core::{
    DomainError, DomainResult, Entity, LegalEntityId, OrganizationId, PrivilegeId, RoleId,
    TenantId, TenantScoped, UserId, is_valid_email,
};

static CURRENCY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z]{3}$").expect("currency pattern compiles"));

fn require(field: &str, value: &str) -> DomainResult<()> {
    if value.trim().is_empty() {
        return Err(DomainError::validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

fn check_email(value: &str) -> DomainResult<()> {
    if !is_valid_email(value) {
        return Err(DomainError::validation(format!("invalid email: {value:?}")));
    }
    Ok(())
}

fn check_optional_email(value: Option<&str>) -> DomainResult<()> {
    value.map_or(Ok(()), check_email)
}

fn set<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

fn set_some<T>(slot: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *slot = value;
    }
}

/// Behaviour shared by the tenant-scoped record kinds.
pub trait Record:
    Entity<Id: Copy + Ord + Default + Send + Sync + 'static> + TenantScoped + Clone + Send + Sync + 'static
{
    type Draft;
    type Patch;

    fn from_draft(
        id: Self::Id,
        tenant_id: TenantId,
        draft: Self::Draft,
        now: DateTime<Utc>,
    ) -> DomainResult<Self>;

    /// Apply and re-validate. On error `self` may be partially modified;
    /// callers patch a copy.
    fn apply_patch(&mut self, patch: Self::Patch) -> DomainResult<()>;

    fn touch(&mut self, now: DateTime<Utc>);

    fn created_at(&self) -> DateTime<Utc>;

    /// Reason this record cannot coexist with `other` in one tenant.
    fn conflicts_with(&self, _other: &Self) -> Option<String> {
        None
    }

    /// Organization this record belongs to, if it references one.
    fn organization_id(&self) -> Option<OrganizationId> {
        None
    }
}

// ---------------------------------------------------------------------------
// Tenant
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: TenantId,
    pub name: String,
    pub description: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub industry: Option<String>,
    /// Whole currency units.
    pub annual_revenue: Option<u64>,
    pub employee_count: Option<u32>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantDraft {
    pub name: String,
    pub description: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub industry: Option<String>,
    pub annual_revenue: Option<u64>,
    pub employee_count: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub industry: Option<String>,
    pub annual_revenue: Option<u64>,
    pub employee_count: Option<u32>,
    pub active: Option<bool>,
}

impl Tenant {
    pub fn from_draft(id: TenantId, draft: TenantDraft, now: DateTime<Utc>) -> DomainResult<Self> {
        let tenant = Self {
            id,
            name: draft.name,
            description: draft.description,
            email: draft.email,
            phone: draft.phone,
            website: draft.website,
            industry: draft.industry,
            annual_revenue: draft.annual_revenue,
            employee_count: draft.employee_count,
            active: true,
            created_at: now,
            updated_at: now,
        };
        tenant.validate()?;
        Ok(tenant)
    }

    pub fn apply_patch(&mut self, patch: TenantPatch) -> DomainResult<()> {
        set(&mut self.name, patch.name);
        set_some(&mut self.description, patch.description);
        set_some(&mut self.email, patch.email);
        set_some(&mut self.phone, patch.phone);
        set_some(&mut self.website, patch.website);
        set_some(&mut self.industry, patch.industry);
        set_some(&mut self.annual_revenue, patch.annual_revenue);
        set_some(&mut self.employee_count, patch.employee_count);
        set(&mut self.active, patch.active);
        self.validate()
    }

    fn validate(&self) -> DomainResult<()> {
        require("tenant name", &self.name)?;
        check_optional_email(self.email.as_deref())
    }
}

impl Entity for Tenant {
    type Id = TenantId;
    const KIND: &'static str = "tenant";

    fn id(&self) -> &TenantId {
        &self.id
    }
}

// ---------------------------------------------------------------------------
// Organization
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: OrganizationId,
    pub tenant_id: TenantId,
    pub name: String,
    pub description: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub industry: Option<String>,
    pub employee_count: Option<u32>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationDraft {
    pub name: String,
    pub description: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub industry: Option<String>,
    pub employee_count: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub industry: Option<String>,
    pub employee_count: Option<u32>,
    pub active: Option<bool>,
}

impl Entity for Organization {
    type Id = OrganizationId;
    const KIND: &'static str = "organization";

    fn id(&self) -> &OrganizationId {
        &self.id
    }
}

impl TenantScoped for Organization {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

impl Organization {
    fn validate(&self) -> DomainResult<()> {
        require("organization name", &self.name)?;
        check_optional_email(self.email.as_deref())
    }
}

impl Record for Organization {
    type Draft = OrganizationDraft;
    type Patch = OrganizationPatch;

    fn from_draft(
        id: OrganizationId,
        tenant_id: TenantId,
        draft: OrganizationDraft,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let org = Self {
            id,
            tenant_id,
            name: draft.name,
            description: draft.description,
            email: draft.email,
            phone: draft.phone,
            website: draft.website,
            industry: draft.industry,
            employee_count: draft.employee_count,
            active: true,
            created_at: now,
            updated_at: now,
        };
        org.validate()?;
        Ok(org)
    }

    fn apply_patch(&mut self, patch: OrganizationPatch) -> DomainResult<()> {
        set(&mut self.name, patch.name);
        set_some(&mut self.description, patch.description);
        set_some(&mut self.email, patch.email);
        set_some(&mut self.phone, patch.phone);
        set_some(&mut self.website, patch.website);
        set_some(&mut self.industry, patch.industry);
        set_some(&mut self.employee_count, patch.employee_count);
        set(&mut self.active, patch.active);
        self.validate()
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub tenant_id: TenantId,
    pub organization_id: Option<OrganizationId>,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    /// Role names.
    pub roles: Vec<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDraft {
    pub organization_id: Option<OrganizationId>,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPatch {
    pub organization_id: Option<OrganizationId>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// Replaces the whole role list.
    pub roles: Option<Vec<String>>,
    pub active: Option<bool>,
}

impl User {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }

    fn validate(&self) -> DomainResult<()> {
        check_email(&self.email)?;
        require("first name", &self.first_name)?;
        if self.roles.iter().any(|r| r.trim().is_empty()) {
            return Err(DomainError::validation("role names cannot be empty"));
        }
        Ok(())
    }
}

impl Entity for User {
    type Id = UserId;
    const KIND: &'static str = "user";

    fn id(&self) -> &UserId {
        &self.id
    }
}

impl TenantScoped for User {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

impl Record for User {
    type Draft = UserDraft;
    type Patch = UserPatch;

    fn from_draft(
        id: UserId,
        tenant_id: TenantId,
        draft: UserDraft,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let user = Self {
            id,
            tenant_id,
            organization_id: draft.organization_id,
            email: draft.email,
            first_name: draft.first_name,
            last_name: draft.last_name,
            roles: draft.roles,
            active: true,
            created_at: now,
            updated_at: now,
        };
        user.validate()?;
        Ok(user)
    }

    fn apply_patch(&mut self, patch: UserPatch) -> DomainResult<()> {
        set_some(&mut self.organization_id, patch.organization_id);
        set(&mut self.email, patch.email);
        set(&mut self.first_name, patch.first_name);
        set(&mut self.last_name, patch.last_name);
        set(&mut self.roles, patch.roles);
        set(&mut self.active, patch.active);
        self.validate()
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn conflicts_with(&self, other: &Self) -> Option<String> {
        self.email
            .eq_ignore_ascii_case(&other.email)
            .then(|| format!("email {} already in use", self.email))
    }

    fn organization_id(&self) -> Option<OrganizationId> {
        self.organization_id
    }
}

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub tenant_id: TenantId,
    pub name: String,
    pub description: Option<String>,
    /// Privilege names granted by this role.
    pub privileges: Vec<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDraft {
    pub name: String,
    pub description: Option<String>,
    pub privileges: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolePatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub privileges: Option<Vec<String>>,
    pub active: Option<bool>,
}

impl Role {
    pub fn grants(&self, privilege: &str) -> bool {
        self.active && self.privileges.iter().any(|p| p == privilege)
    }
}

impl Entity for Role {
    type Id = RoleId;
    const KIND: &'static str = "role";

    fn id(&self) -> &RoleId {
        &self.id
    }
}

impl TenantScoped for Role {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

impl Record for Role {
    type Draft = RoleDraft;
    type Patch = RolePatch;

    fn from_draft(
        id: RoleId,
        tenant_id: TenantId,
        draft: RoleDraft,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        require("role name", &draft.name)?;
        Ok(Self {
            id,
            tenant_id,
            name: draft.name,
            description: draft.description,
            privileges: draft.privileges,
            active: true,
            created_at: now,
            updated_at: now,
        })
    }

    fn apply_patch(&mut self, patch: RolePatch) -> DomainResult<()> {
        set(&mut self.name, patch.name);
        set_some(&mut self.description, patch.description);
        set(&mut self.privileges, patch.privileges);
        set(&mut self.active, patch.active);
        require("role name", &self.name)
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn conflicts_with(&self, other: &Self) -> Option<String> {
        (self.name == other.name).then(|| format!("role {} already exists", self.name))
    }
}

// ---------------------------------------------------------------------------
// Privilege
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Privilege {
    pub id: PrivilegeId,
    pub tenant_id: TenantId,
    pub name: String,
    pub description: Option<String>,
    /// Resource the privilege applies to (e.g. `users`).
    pub resource: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivilegeDraft {
    pub name: String,
    pub description: Option<String>,
    pub resource: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivilegePatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub resource: Option<String>,
    pub active: Option<bool>,
}

impl Privilege {
    fn validate(&self) -> DomainResult<()> {
        require("privilege name", &self.name)?;
        require("privilege resource", &self.resource)
    }
}

impl Entity for Privilege {
    type Id = PrivilegeId;
    const KIND: &'static str = "privilege";

    fn id(&self) -> &PrivilegeId {
        &self.id
    }
}

impl TenantScoped for Privilege {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

impl Record for Privilege {
    type Draft = PrivilegeDraft;
    type Patch = PrivilegePatch;

    fn from_draft(
        id: PrivilegeId,
        tenant_id: TenantId,
        draft: PrivilegeDraft,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let privilege = Self {
            id,
            tenant_id,
            name: draft.name,
            description: draft.description,
            resource: draft.resource,
            active: true,
            created_at: now,
            updated_at: now,
        };
        privilege.validate()?;
        Ok(privilege)
    }

    fn apply_patch(&mut self, patch: PrivilegePatch) -> DomainResult<()> {
        set(&mut self.name, patch.name);
        set_some(&mut self.description, patch.description);
        set(&mut self.resource, patch.resource);
        set(&mut self.active, patch.active);
        self.validate()
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn conflicts_with(&self, other: &Self) -> Option<String> {
        (self.name == other.name).then(|| format!("privilege {} already exists", self.name))
    }
}

// ---------------------------------------------------------------------------
// Legal entity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LegalEntityType {
    ParentEntity,
    Subsidiary,
    Branch,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegalEntity {
    pub id: LegalEntityId,
    pub tenant_id: TenantId,
    pub name: String,
    pub legal_name: String,
    pub legal_entity_type: LegalEntityType,
    pub address: Option<String>,
    pub incorporation_date: Option<NaiveDate>,
    /// At most one per tenant.
    pub is_default: bool,
    pub registration_number: Option<String>,
    pub tax_identifier: Option<String>,
    /// ISO country name or code, free-form.
    pub jurisdiction_country: String,
    /// ISO 4217 code, e.g. `USD`.
    pub functional_currency: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegalEntityDraft {
    pub name: String,
    pub legal_name: String,
    pub legal_entity_type: LegalEntityType,
    pub address: Option<String>,
    pub incorporation_date: Option<NaiveDate>,
    pub is_default: bool,
    pub registration_number: Option<String>,
    pub tax_identifier: Option<String>,
    pub jurisdiction_country: String,
    pub functional_currency: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegalEntityPatch {
    pub name: Option<String>,
    pub legal_name: Option<String>,
    pub legal_entity_type: Option<LegalEntityType>,
    pub address: Option<String>,
    pub incorporation_date: Option<NaiveDate>,
    pub is_default: Option<bool>,
    pub registration_number: Option<String>,
    pub tax_identifier: Option<String>,
    pub jurisdiction_country: Option<String>,
    pub functional_currency: Option<String>,
}

impl LegalEntity {
    fn validate(&self) -> DomainResult<()> {
        require("legal entity name", &self.name)?;
        require("legal name", &self.legal_name)?;
        require("jurisdiction country", &self.jurisdiction_country)?;
        if !CURRENCY_PATTERN.is_match(&self.functional_currency) {
            return Err(DomainError::validation(format!(
                "functional currency must be a three-letter ISO code, got {:?}",
                self.functional_currency
            )));
        }
        Ok(())
    }
}

impl Entity for LegalEntity {
    type Id = LegalEntityId;
    const KIND: &'static str = "legal entity";

    fn id(&self) -> &LegalEntityId {
        &self.id
    }
}

impl TenantScoped for LegalEntity {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

impl Record for LegalEntity {
    type Draft = LegalEntityDraft;
    type Patch = LegalEntityPatch;

    fn from_draft(
        id: LegalEntityId,
        tenant_id: TenantId,
        draft: LegalEntityDraft,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let entity = Self {
            id,
            tenant_id,
            name: draft.name,
            legal_name: draft.legal_name,
            legal_entity_type: draft.legal_entity_type,
            address: draft.address,
            incorporation_date: draft.incorporation_date,
            is_default: draft.is_default,
            registration_number: draft.registration_number,
            tax_identifier: draft.tax_identifier,
            jurisdiction_country: draft.jurisdiction_country,
            functional_currency: draft.functional_currency,
            created_at: now,
            updated_at: now,
        };
        entity.validate()?;
        Ok(entity)
    }

    fn apply_patch(&mut self, patch: LegalEntityPatch) -> DomainResult<()> {
        set(&mut self.name, patch.name);
        set(&mut self.legal_name, patch.legal_name);
        set(&mut self.legal_entity_type, patch.legal_entity_type);
        set_some(&mut self.address, patch.address);
        set_some(&mut self.incorporation_date, patch.incorporation_date);
        set(&mut self.is_default, patch.is_default);
        set_some(&mut self.registration_number, patch.registration_number);
        set_some(&mut self.tax_identifier, patch.tax_identifier);
        set(&mut self.jurisdiction_country, patch.jurisdiction_country);
        set(&mut self.functional_currency, patch.functional_currency);
        self.validate()
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn conflicts_with(&self, other: &Self) -> Option<String> {
        (self.is_default && other.is_default)
            .then(|| format!("{} is already the default legal entity", other.name))
    }
}
