use leptos::*;

use super::{ErrorReporter, TransientError};
use crate::{
    api::{ApiClient, ApiError, Id, Organization},
    utils::{
        storage::{keys, Storage},
        validation,
    },
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrganizationState {
    pub organizations: Vec<Organization>,
    pub current: Option<Organization>,
    pub loading: bool,
    pub error: Option<ApiError>,
}

impl TransientError for OrganizationState {
    fn error_slot(&mut self) -> &mut Option<ApiError> {
        &mut self.error
    }
}

impl OrganizationState {
    pub fn find(&self, id: &Id) -> Option<&Organization> {
        self.organizations.iter().find(|org| &org.id == id)
    }

    /// Replaces the entry with the same id, or appends.
    fn upsert(&mut self, org: Organization) {
        match self.organizations.iter_mut().find(|o| o.id == org.id) {
            Some(existing) => *existing = org.clone(),
            None => self.organizations.push(org.clone()),
        }
        if self.current.as_ref().map(|c| &c.id) == Some(&org.id) {
            self.current = Some(org);
        }
    }

    fn remove(&mut self, id: &Id) {
        self.organizations.retain(|org| &org.id != id);
        if self.current.as_ref().map(|c| &c.id) == Some(id) {
            self.current = None;
        }
    }

    /// Points `current` at the fresh copy of itself, or drops it when the
    /// organization is gone.
    fn reconcile_current(&mut self) {
        self.current = self
            .current
            .take()
            .and_then(|current| self.find(&current.id).cloned());
    }
}

fn validate_id(id: &Id) -> Result<(), ApiError> {
    if id.is_blank() {
        return Err(ApiError::validation("Organization id is required"));
    }
    Ok(())
}

/// Organizations owned by the signed-in user and the one currently selected.
#[derive(Clone)]
pub struct OrganizationStore {
    state: RwSignal<OrganizationState>,
    api: ApiClient,
    storage: Storage,
    errors: ErrorReporter,
}

impl OrganizationStore {
    pub fn new(api: ApiClient, storage: Storage, errors: ErrorReporter) -> Self {
        Self {
            state: create_rw_signal(OrganizationState::default()),
            api,
            storage,
            errors,
        }
    }

    pub fn state(&self) -> RwSignal<OrganizationState> {
        self.state
    }

    pub fn snapshot(&self) -> OrganizationState {
        self.state.get_untracked()
    }

    pub fn current(&self) -> Option<Organization> {
        self.state.with_untracked(|s| s.current.clone())
    }

    fn persist(&self, state: &OrganizationState) {
        self.storage.set(keys::USER_ORGANIZATIONS, &state.organizations);
        self.storage
            .set_optional(keys::CURRENT_ORGANIZATION, state.current.as_ref());
    }

    /// Applies `change` to a copy of the state, persists it and publishes it
    /// in one update.
    fn commit(&self, change: impl FnOnce(&mut OrganizationState)) {
        let mut next = self.snapshot();
        change(&mut next);
        next.loading = false;
        self.persist(&next);
        self.state.set(next);
    }

    pub fn hydrate(&self) {
        let organizations = self
            .storage
            .get::<Vec<Organization>>(keys::USER_ORGANIZATIONS)
            .unwrap_or_default();
        let current = self.storage.get::<Organization>(keys::CURRENT_ORGANIZATION);
        self.state.update(|s| {
            s.organizations = organizations;
            s.current = current;
            if !s.organizations.is_empty() {
                s.reconcile_current();
            }
        });
    }

    pub async fn list(&self) -> Result<Vec<Organization>, ApiError> {
        self.errors.begin(self.state, |s| s.loading = true);
        match self.api.list_organizations().await {
            Ok(organizations) => {
                self.commit(|s| {
                    s.organizations = organizations.clone();
                    s.reconcile_current();
                });
                Ok(organizations)
            }
            Err(err) => {
                self.errors.fail(self.state, &err, |s| s.loading = false);
                Err(err)
            }
        }
    }

    /// Adds the organization once the backend has confirmed it.
    pub async fn create(&self, name: &str) -> Result<Organization, ApiError> {
        validation::require(name, "Organization name")?;
        self.errors.begin(self.state, |s| s.loading = true);
        match self.api.create_organization(name.trim()).await {
            Ok(org) => {
                self.commit(|s| s.upsert(org.clone()));
                log::info!("Organization {} created", org.id);
                Ok(org)
            }
            Err(err) => {
                self.errors.fail(self.state, &err, |s| s.loading = false);
                Err(err)
            }
        }
    }

    pub async fn update(&self, id: &Id, name: &str) -> Result<Organization, ApiError> {
        validate_id(id)?;
        validation::require(name, "Organization name")?;
        self.errors.begin(self.state, |s| s.loading = true);
        match self.api.update_organization(id, name.trim()).await {
            Ok(org) => {
                self.commit(|s| s.upsert(org.clone()));
                Ok(org)
            }
            Err(err) => {
                self.errors.fail(self.state, &err, |s| s.loading = false);
                Err(err)
            }
        }
    }

    pub async fn delete(&self, id: &Id) -> Result<(), ApiError> {
        validate_id(id)?;
        self.errors.begin(self.state, |s| s.loading = true);
        match self.api.delete_organization(id).await {
            Ok(()) => {
                self.commit(|s| s.remove(id));
                log::info!("Organization {} deleted", id);
                Ok(())
            }
            Err(err) => {
                self.errors.fail(self.state, &err, |s| s.loading = false);
                Err(err)
            }
        }
    }

    /// Local selection only; nothing is sent to the backend.
    pub fn set_current(&self, org: Organization) {
        self.storage.set(keys::CURRENT_ORGANIZATION, &org);
        self.state.update(|s| s.current = Some(org));
    }

    pub fn clear_current(&self) {
        self.storage.remove(keys::CURRENT_ORGANIZATION);
        self.state.update(|s| s.current = None);
    }

    pub fn reset(&self) {
        self.storage.clear(keys::ORGANIZATION);
        self.state.set(OrganizationState::default());
    }

    pub(crate) fn invalidator(&self) -> impl Fn() + 'static {
        let state = self.state;
        let storage = self.storage.clone();
        move || {
            storage.clear(keys::ORGANIZATION);
            state.try_set(OrganizationState::default());
        }
    }
}


#[cfg(all(test, not(target_arch = "wasm32")))]
mod host_tests {
    use super::*;
    use crate::test_support::{
        fixtures::{organization, organization_json},
        ssr::{with_runtime, with_runtime_async},
    };
    use httpmock::prelude::*;
    use serde_json::json;

    fn store(server: &MockServer, storage: &Storage) -> OrganizationStore {
        let api = ApiClient::new_with_base_url(server.url("/api"));
        api.set_bearer(Some("tok-1".into()));
        OrganizationStore::new(api, storage.clone(), ErrorReporter::default())
    }

    #[tokio::test]
    async fn update_renames_listed_and_current_organization() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET)
                .path("/api/organizations")
                .header("authorization", "Bearer tok-1");
            then.status(200).json_body(json!([organization_json(1, "Acme")]));
        });
        let update = server.mock(|when, then| {
            when.method(PUT)
                .path("/api/organizations/1")
                .json_body(json!({ "name": "Acme Corp" }));
            then.status(200).json_body(organization_json(1, "Acme Corp"));
        });

        with_runtime_async(|| async {
            let storage = Storage::memory();
            let orgs = store(&server, &storage);
            orgs.list().await.unwrap();
            orgs.set_current(organization(1, "Acme"));

            orgs.update(&Id::from(1), "Acme Corp").await.unwrap();
            update.assert();

            let state = orgs.snapshot();
            assert_eq!(state.organizations, vec![organization(1, "Acme Corp")]);
            assert_eq!(state.current, Some(organization(1, "Acme Corp")));
            assert_eq!(
                storage.get::<Organization>(keys::CURRENT_ORGANIZATION),
                Some(organization(1, "Acme Corp"))
            );
        })
        .await;
    }

    #[tokio::test]
    async fn delete_clears_current_pointer() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(DELETE).path("/api/organizations/1");
            then.status(204);
        });

        with_runtime_async(|| async {
            let storage = Storage::memory();
            let orgs = store(&server, &storage);
            let acme = organization(1, "Acme");
            orgs.set_current(acme.clone());
            assert_eq!(orgs.current(), Some(acme.clone()));

            orgs.delete(&acme.id).await.unwrap();
            assert_eq!(orgs.current(), None);
            assert!(storage.raw(keys::CURRENT_ORGANIZATION).is_none());
        })
        .await;
    }

    #[tokio::test]
    async fn create_adds_only_confirmed_organization() {
        let server = MockServer::start_async().await;
        let mut create = server.mock(|when, then| {
            when.method(POST)
                .path("/api/organizations")
                .json_body(json!({ "name": "Acme" }));
            then.status(201).json_body(organization_json(1, "Acme"));
        });

        with_runtime_async(|| async {
            let orgs = store(&server, &Storage::memory());
            let created = orgs.create("  Acme ").await.unwrap();
            assert_eq!(created, organization(1, "Acme"));
            assert_eq!(orgs.snapshot().organizations, vec![organization(1, "Acme")]);

            create.delete();
            server.mock(|when, then| {
                when.method(POST).path("/api/organizations");
                then.status(403)
                    .json_body(json!({ "message": "Plan limit reached" }));
            });
            let before = orgs.snapshot();
            let err = orgs.create("Globex").await.unwrap_err();
            assert_eq!(err.status_code(), Some(403));
            let after = orgs.snapshot();
            assert_eq!(after.organizations, before.organizations);
            assert_eq!(after.error, Some(err));
            assert!(!after.loading);
        })
        .await;
    }

    #[tokio::test]
    async fn blank_input_never_reaches_backend() {
        let server = MockServer::start_async().await;
        let any = server.mock(|when, then| {
            when.path_contains("/api/organizations");
            then.status(200).json_body(organization_json(1, "Acme"));
        });

        with_runtime_async(|| async {
            let orgs = store(&server, &Storage::memory());
            assert!(matches!(orgs.create("   ").await, Err(ApiError::Validation(_))));
            assert!(matches!(
                orgs.update(&Id::from(1), "").await,
                Err(ApiError::Validation(_))
            ));
            assert!(matches!(
                orgs.delete(&Id::new(" ")).await,
                Err(ApiError::Validation(_))
            ));
            assert_eq!(any.hits(), 0);
            assert!(orgs.snapshot().error.is_none());
        })
        .await;
    }

    #[tokio::test]
    async fn list_drops_current_when_organization_vanished() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/api/organizations");
            then.status(200).json_body(json!([organization_json(2, "Globex")]));
        });

        with_runtime_async(|| async {
            let storage = Storage::memory();
            let orgs = store(&server, &storage);
            orgs.set_current(organization(1, "Acme"));
            orgs.list().await.unwrap();
            assert!(orgs.current().is_none());
            assert_eq!(
                storage.get::<Vec<Organization>>(keys::USER_ORGANIZATIONS),
                Some(vec![organization(2, "Globex")])
            );
        })
        .await;
    }

    #[test]
    fn hydrate_restores_cache_and_current() {
        with_runtime(|| {
            let storage = Storage::memory();
            storage.set(
                keys::USER_ORGANIZATIONS,
                &vec![organization(1, "Acme Corp"), organization(2, "Globex")],
            );
            storage.set(keys::CURRENT_ORGANIZATION, &organization(1, "Acme"));
            let orgs = OrganizationStore::new(
                ApiClient::new_with_base_url("http://127.0.0.1:9/api"),
                storage.clone(),
                ErrorReporter::default(),
            );
            orgs.hydrate();
            let first = orgs.snapshot();
            orgs.hydrate();
            assert_eq!(orgs.snapshot(), first);
            assert_eq!(first.organizations.len(), 2);
            assert_eq!(first.current, Some(organization(1, "Acme Corp")));

            orgs.reset();
            assert_eq!(orgs.snapshot(), OrganizationState::default());
            assert!(storage.raw(keys::USER_ORGANIZATIONS).is_none());
        });
    }
}
