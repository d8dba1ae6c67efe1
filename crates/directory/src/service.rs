use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use chrono::NaiveDate;
use uuid::Uuid;

use ums_core::{Clock, DomainError, DomainResult, Entity, OrganizationId, SystemClock, TenantId};

use crate::records::*;
use crate::store::{InMemoryTenantStore, TenantStore};

/// Global registry of tenants.
pub struct TenantRegistry {
    tenants: RwLock<HashMap<TenantId, Tenant>>,
    clock: Arc<dyn Clock>,
}

impl TenantRegistry {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            tenants: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Ordered by creation time.
    pub fn list(&self) -> Vec<Tenant> {
        let mut tenants: Vec<Tenant> = match self.tenants.read() {
            Ok(map) => map.values().cloned().collect(),
            Err(_) => return vec![],
        };
        tenants.sort_by_key(|t| (t.created_at, t.id));
        tenants
    }

    pub fn get(&self, id: TenantId) -> DomainResult<Tenant> {
        self.tenants
            .read()
            .ok()
            .and_then(|map| map.get(&id).cloned())
            .ok_or(DomainError::not_found(Tenant::KIND))
    }

    pub fn contains(&self, id: TenantId) -> bool {
        self.tenants.read().map(|m| m.contains_key(&id)).unwrap_or(false)
    }

    pub fn create(&self, draft: TenantDraft) -> DomainResult<Tenant> {
        self.create_with_id(TenantId::new(), draft)
    }

    fn create_with_id(&self, id: TenantId, draft: TenantDraft) -> DomainResult<Tenant> {
        let tenant = Tenant::from_draft(id, draft, self.clock.now())?;
        let mut map = self
            .tenants
            .write()
            .map_err(|_| DomainError::conflict("tenant registry lock poisoned"))?;
        map.insert(tenant.id, tenant.clone());
        tracing::info!(tenant_id = %tenant.id, name = %tenant.name, "tenant created");
        Ok(tenant)
    }

    pub fn update(&self, id: TenantId, patch: TenantPatch) -> DomainResult<Tenant> {
        let mut map = self
            .tenants
            .write()
            .map_err(|_| DomainError::conflict("tenant registry lock poisoned"))?;
        let current = map.get(&id).ok_or(DomainError::not_found(Tenant::KIND))?;

        let mut next = current.clone();
        next.apply_patch(patch)?;
        next.updated_at = self.clock.now();
        map.insert(id, next.clone());
        Ok(next)
    }

    fn remove(&self, id: TenantId) -> DomainResult<Tenant> {
        let mut map = self
            .tenants
            .write()
            .map_err(|_| DomainError::conflict("tenant registry lock poisoned"))?;
        map.remove(&id).ok_or(DomainError::not_found(Tenant::KIND))
    }
}

/// Answers whether an organization exists in a tenant.
type OrganizationLookup = Arc<dyn Fn(TenantId, OrganizationId) -> bool + Send + Sync>;

/// CRUD over one tenant-scoped record kind.
///
/// Writes are serialized per collection, so the uniqueness check and the
/// store write happen as one step.
pub struct Collection<R: Record> {
    store: Arc<InMemoryTenantStore<R::Id, R>>,
    tenants: Arc<TenantRegistry>,
    clock: Arc<dyn Clock>,
    organizations: Option<OrganizationLookup>,
    writes: Mutex<()>,
}

impl<R: Record> Collection<R> {
    fn new(tenants: Arc<TenantRegistry>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store: Arc::new(InMemoryTenantStore::new()),
            tenants,
            clock,
            organizations: None,
            writes: Mutex::new(()),
        }
    }

    /// Reject records pointing at an organization `lookup` does not know.
    fn with_organizations(mut self, lookup: OrganizationLookup) -> Self {
        self.organizations = Some(lookup);
        self
    }

    fn write_guard(&self) -> DomainResult<MutexGuard<'_, ()>> {
        self.writes
            .lock()
            .map_err(|_| DomainError::conflict(format!("{} collection lock poisoned", R::KIND)))
    }

    /// Records of `tenant_id`, ordered by creation time.
    pub fn list(&self, tenant_id: TenantId) -> Vec<R> {
        let mut records = self.store.list(tenant_id);
        records.sort_by_key(|r| (r.created_at(), *r.id()));
        records
    }

    pub fn get(&self, tenant_id: TenantId, id: R::Id) -> DomainResult<R> {
        self.store
            .get(tenant_id, &id)
            .ok_or(DomainError::not_found(R::KIND))
    }

    /// Assigns a fresh id; the record starts active.
    pub fn create(&self, tenant_id: TenantId, draft: R::Draft) -> DomainResult<R> {
        if !self.tenants.contains(tenant_id) {
            return Err(DomainError::not_found(Tenant::KIND));
        }

        let id = R::Id::default();
        let record = R::from_draft(id, tenant_id, draft, self.clock.now())?;
        self.ensure_organization(tenant_id, &record)?;

        let _write = self.write_guard()?;
        self.ensure_unique(tenant_id, &record)?;
        self.store.upsert(tenant_id, id, record.clone());

        tracing::debug!(%tenant_id, kind = R::KIND, "record created");
        Ok(record)
    }

    /// Apply `patch` and bump `updated_at`. The stored record is left
    /// unchanged if the patch does not validate.
    pub fn update(&self, tenant_id: TenantId, id: R::Id, patch: R::Patch) -> DomainResult<R> {
        let _write = self.write_guard()?;
        let mut next = self.get(tenant_id, id)?;
        next.apply_patch(patch)?;
        self.ensure_organization(tenant_id, &next)?;
        self.ensure_unique(tenant_id, &next)?;
        next.touch(self.clock.now());
        self.store.upsert(tenant_id, id, next.clone());
        Ok(next)
    }

    pub fn delete(&self, tenant_id: TenantId, id: R::Id) -> DomainResult<()> {
        let _write = self.write_guard()?;
        if self.store.remove(tenant_id, &id).is_none() {
            return Err(DomainError::not_found(R::KIND));
        }
        tracing::debug!(%tenant_id, kind = R::KIND, "record deleted");
        Ok(())
    }

    fn ensure_unique(&self, tenant_id: TenantId, record: &R) -> DomainResult<()> {
        let clash = self
            .store
            .list(tenant_id)
            .iter()
            .filter(|other| other.id() != record.id())
            .find_map(|other| record.conflicts_with(other));
        match clash {
            Some(reason) => Err(DomainError::conflict(reason)),
            None => Ok(()),
        }
    }

    fn ensure_organization(&self, tenant_id: TenantId, record: &R) -> DomainResult<()> {
        match (record.organization_id(), &self.organizations) {
            (Some(org_id), Some(exists)) if !exists(tenant_id, org_id) => {
                Err(DomainError::not_found(Organization::KIND))
            }
            _ => Ok(()),
        }
    }

    fn clear_tenant(&self, tenant_id: TenantId) {
        self.store.clear_tenant(tenant_id);
    }
}

/// Entry point for directory data: the tenant registry plus one collection
/// per tenant-scoped record kind.
pub struct Directory {
    tenants: Arc<TenantRegistry>,
    pub organizations: Collection<Organization>,
    pub users: Collection<User>,
    pub roles: Collection<Role>,
    pub privileges: Collection<Privilege>,
    pub legal_entities: Collection<LegalEntity>,
}

impl Directory {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let tenants = Arc::new(TenantRegistry::new(clock.clone()));
        let organizations = Collection::<Organization>::new(tenants.clone(), clock.clone());
        let org_store = organizations.store.clone();
        let users = Collection::new(tenants.clone(), clock.clone()).with_organizations(Arc::new(
            move |tenant_id: TenantId, org_id: OrganizationId| {
                org_store.get(tenant_id, &org_id).is_some()
            },
        ));
        Self {
            organizations,
            users,
            roles: Collection::new(tenants.clone(), clock.clone()),
            privileges: Collection::new(tenants.clone(), clock.clone()),
            legal_entities: Collection::new(tenants.clone(), clock),
            tenants,
        }
    }

    pub fn tenants(&self) -> &TenantRegistry {
        &self.tenants
    }

    /// Delete a tenant together with every record it owns.
    pub fn delete_tenant(&self, id: TenantId) -> DomainResult<()> {
        let tenant = self.tenants.remove(id)?;
        self.organizations.clear_tenant(id);
        self.users.clear_tenant(id);
        self.roles.clear_tenant(id);
        self.privileges.clear_tenant(id);
        self.legal_entities.clear_tenant(id);
        tracing::info!(tenant_id = %id, name = %tenant.name, "tenant deleted");
        Ok(())
    }

    /// Demo data: two tenants with one record of each kind. Tenant ids are
    /// stable across runs.
    pub fn seeded() -> DomainResult<Self> {
        Self::seeded_with(Arc::new(SystemClock))
    }

    pub fn seeded_with(clock: Arc<dyn Clock>) -> DomainResult<Self> {
        let directory = Self::new(clock);
        directory.seed_tenant(DemoTenant {
            id: 1,
            name: "Tenant One",
            domain: "acme.com",
            industry: "Tech",
            org: "Acme HQ",
            annual_revenue: 1_000_000,
            employees: 100,
            user: ("alice", "Alice", "Smith"),
            role: ("Admin", "Administrator role", &["manage_users", "manage_tenants"]),
            privilege: ("manage_users", "Can manage users", "users"),
            legal: ("Acme Holdings", "Acme Holdings LLC", LegalEntityType::ParentEntity, "USA", "USD"),
        })?;
        directory.seed_tenant(DemoTenant {
            id: 2,
            name: "Tenant Two",
            domain: "beta.com",
            industry: "Finance",
            org: "Beta Branch",
            annual_revenue: 2_000_000,
            employees: 200,
            user: ("bob", "Bob", "Jones"),
            role: ("User", "Standard user role", &["view_data"]),
            privilege: ("view_data", "Can view data", "dashboard"),
            legal: ("Beta Finance", "Beta Finance GmbH", LegalEntityType::Subsidiary, "Germany", "EUR"),
        })?;
        Ok(directory)
    }

    fn seed_tenant(&self, demo: DemoTenant) -> DomainResult<TenantId> {
        let id = TenantId::from_uuid(Uuid::from_u128(demo.id));
        let draft = TenantDraft {
            name: demo.name.to_string(),
            description: Some(format!("{} demo tenant", demo.org)),
            email: Some(format!("admin@{}", demo.domain)),
            website: Some(demo.domain.to_string()),
            industry: Some(demo.industry.to_string()),
            annual_revenue: Some(demo.annual_revenue),
            employee_count: Some(demo.employees),
            ..Default::default()
        };
        let tenant = self.tenants.create_with_id(id, draft)?;
        let t = tenant.id;

        let org = self.organizations.create(
            t,
            OrganizationDraft {
                name: demo.org.to_string(),
                email: Some(format!("hq@{}", demo.domain)),
                industry: Some(demo.industry.to_string()),
                employee_count: Some(demo.employees / 2),
                ..Default::default()
            },
        )?;

        let (role_name, role_description, role_privileges) = demo.role;
        self.roles.create(
            t,
            RoleDraft {
                name: role_name.to_string(),
                description: Some(role_description.to_string()),
                privileges: role_privileges.iter().map(|p| p.to_string()).collect(),
            },
        )?;

        let (login, first_name, last_name) = demo.user;
        self.users.create(
            t,
            UserDraft {
                organization_id: Some(org.id),
                email: format!("{login}@{}", demo.domain),
                first_name: first_name.to_string(),
                last_name: last_name.to_string(),
                roles: vec![role_name.to_string()],
            },
        )?;

        let (privilege, privilege_description, resource) = demo.privilege;
        self.privileges.create(
            t,
            PrivilegeDraft {
                name: privilege.to_string(),
                description: Some(privilege_description.to_string()),
                resource: resource.to_string(),
            },
        )?;

        let (name, legal_name, legal_entity_type, country, currency) = demo.legal;
        self.legal_entities.create(
            t,
            LegalEntityDraft {
                name: name.to_string(),
                legal_name: legal_name.to_string(),
                legal_entity_type,
                address: None,
                incorporation_date: NaiveDate::from_ymd_opt(2020, 1, 1),
                is_default: true,
                registration_number: None,
                tax_identifier: None,
                jurisdiction_country: country.to_string(),
                functional_currency: currency.to_string(),
            },
        )?;

        Ok(t)
    }
}

struct DemoTenant {
    /// Fixed so sessions persisted by an earlier run still name a known tenant.
    id: u128,
    name: &'static str,
    domain: &'static str,
    industry: &'static str,
    org: &'static str,
    annual_revenue: u64,
    employees: u32,
    user: (&'static str, &'static str, &'static str),
    role: (&'static str, &'static str, &'static [&'static str]),
    privilege: (&'static str, &'static str, &'static str),
    legal: (&'static str, &'static str, LegalEntityType, &'static str, &'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use ums_core::{ManualClock, RoleId};

    fn directory() -> (ManualClock, Directory) {
        let clock = ManualClock::starting_now();
        let directory = Directory::seeded_with(Arc::new(clock.clone())).unwrap();
        (clock, directory)
    }

    fn tenant_named(directory: &Directory, name: &str) -> TenantId {
        directory
            .tenants()
            .list()
            .into_iter()
            .find(|t| t.name == name)
            .map(|t| t.id)
            .unwrap()
    }

    #[test]
    fn seeded_directory_has_one_of_each_per_tenant() {
        let (_, directory) = directory();
        assert_eq!(directory.tenants().list().len(), 2);

        for tenant in directory.tenants().list() {
            assert_eq!(directory.organizations.list(tenant.id).len(), 1);
            assert_eq!(directory.users.list(tenant.id).len(), 1);
            assert_eq!(directory.roles.list(tenant.id).len(), 1);
            assert_eq!(directory.privileges.list(tenant.id).len(), 1);
            assert_eq!(directory.legal_entities.list(tenant.id).len(), 1);
        }
    }

    #[test]
    fn records_of_another_tenant_are_invisible() {
        let (_, directory) = directory();
        let one = tenant_named(&directory, "Tenant One");
        let two = tenant_named(&directory, "Tenant Two");
        let alice = directory.users.list(one).remove(0);

        assert_eq!(
            directory.users.get(two, alice.id),
            Err(DomainError::NotFound("user"))
        );
        assert_eq!(
            directory.users.delete(two, alice.id),
            Err(DomainError::NotFound("user"))
        );
        assert!(directory.users.get(one, alice.id).is_ok());
    }

    #[test]
    fn update_of_missing_record_is_not_found() {
        let (_, directory) = directory();
        let one = tenant_named(&directory, "Tenant One");

        let err = directory
            .roles
            .update(one, RoleId::new(), RolePatch::default())
            .unwrap_err();
        assert_eq!(err, DomainError::NotFound("role"));
    }

    #[test]
    fn update_bumps_updated_at_only() {
        let (clock, directory) = directory();
        let one = tenant_named(&directory, "Tenant One");
        let org = directory.organizations.list(one).remove(0);

        clock.advance(Duration::minutes(5));
        let updated = directory
            .organizations
            .update(
                one,
                org.id,
                OrganizationPatch {
                    name: Some("Acme Global".into()),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(updated.name, "Acme Global");
        assert_eq!(updated.created_at, org.created_at);
        assert_eq!(updated.updated_at, clock.now());
    }

    #[test]
    fn invalid_patch_leaves_stored_record_untouched() {
        let (_, directory) = directory();
        let one = tenant_named(&directory, "Tenant One");
        let alice = directory.users.list(one).remove(0);

        let result = directory.users.update(
            one,
            alice.id,
            UserPatch {
                email: Some("nope".into()),
                ..Default::default()
            },
        );

        assert!(result.is_err());
        assert_eq!(directory.users.get(one, alice.id).unwrap(), alice);
    }

    #[test]
    fn duplicate_user_email_conflicts_within_a_tenant_only() {
        let (_, directory) = directory();
        let one = tenant_named(&directory, "Tenant One");
        let two = tenant_named(&directory, "Tenant Two");
        let draft = UserDraft {
            email: "alice@acme.com".into(),
            first_name: "Alice".into(),
            ..Default::default()
        };

        let err = directory
            .users
            .create(one, draft.clone())
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
        assert!(directory.users.create(two, draft).is_ok());
    }

    #[test]
    fn concurrent_creates_with_one_email_admit_a_single_user() {
        let (_, directory) = directory();
        let one = tenant_named(&directory, "Tenant One");
        let draft = UserDraft {
            email: "carol@acme.com".into(),
            first_name: "Carol".into(),
            ..Default::default()
        };

        let created = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| directory.users.create(one, draft.clone())))
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(Result::is_ok)
                .count()
        });

        assert_eq!(created, 1);
        assert_eq!(directory.users.list(one).len(), 2);
    }

    #[test]
    fn user_cannot_reference_another_tenants_organization() {
        let (_, directory) = directory();
        let one = tenant_named(&directory, "Tenant One");
        let two = tenant_named(&directory, "Tenant Two");
        let beta_org = directory.organizations.list(two).remove(0);
        let alice = directory.users.list(one).remove(0);

        let err = directory
            .users
            .create(
                one,
                UserDraft {
                    organization_id: Some(beta_org.id),
                    email: "dave@acme.com".into(),
                    first_name: "Dave".into(),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert_eq!(err, DomainError::NotFound("organization"));

        let err = directory
            .users
            .update(
                one,
                alice.id,
                UserPatch {
                    organization_id: Some(beta_org.id),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert_eq!(err, DomainError::NotFound("organization"));
        assert_eq!(directory.users.get(one, alice.id).unwrap(), alice);
    }

    #[test]
    fn create_under_unknown_tenant_is_not_found() {
        let (_, directory) = directory();
        let err = directory
            .roles
            .create(
                TenantId::new(),
                RoleDraft {
                    name: "Auditor".into(),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert_eq!(err, DomainError::NotFound("tenant"));
    }

    #[test]
    fn deleting_a_tenant_drops_its_records() {
        let (_, directory) = directory();
        let one = tenant_named(&directory, "Tenant One");
        let two = tenant_named(&directory, "Tenant Two");

        directory.delete_tenant(one).unwrap();

        assert_eq!(directory.tenants().get(one), Err(DomainError::NotFound("tenant")));
        assert!(directory.users.list(one).is_empty());
        assert_eq!(directory.users.list(two).len(), 1);
        assert_eq!(directory.delete_tenant(one), Err(DomainError::NotFound("tenant")));
    }

    #[test]
    fn seeded_tenant_ids_are_stable() {
        let (_, first) = directory();
        let (_, second) = directory();
        assert_eq!(
            tenant_named(&first, "Tenant Two"),
            tenant_named(&second, "Tenant Two")
        );
    }

    #[test]
    fn tenant_update_applies_patch() {
        let (_, directory) = directory();
        let one = tenant_named(&directory, "Tenant One");

        let updated = directory
            .tenants()
            .update(
                one,
                TenantPatch {
                    active: Some(false),
                    ..Default::default()
                },
            )
            .unwrap();

        assert!(!updated.active);
        assert_eq!(updated.name, "Tenant One");
    }
}
