//! PolicyService - entry point for policy-governed operations.
//!
//! Holds the service privilege and threads it through the labeled store.
//! Every operation takes the request's [`Context`] and returns results
//! labeled with what the computation observed.

use bson::{doc, Bson, Document};
use hearth_label::{Component, Context, Label, Labeled, Principal, Privilege};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::PolicyConfig;
use crate::db::{DocumentStore, MongoStore};
use crate::entity::{App, Project, User};
use crate::groups;
use crate::merge;
use crate::repo::{validate_path, HttpRepoService, RepoService};
use crate::store::{PolicyStore, Record};
use crate::types::{AppId, PolicyError, ProjectId};

/// Policy-governed access to users, projects and apps.
pub struct PolicyService {
    config: PolicyConfig,
    privilege: Privilege,
    store: PolicyStore,
    repos: Arc<dyn RepoService>,
}

impl PolicyService {
    /// Create a service, minting the privilege for the configured service
    /// principal.
    pub fn new(
        config: PolicyConfig,
        store: Arc<dyn DocumentStore>,
        repos: Arc<dyn RepoService>,
    ) -> Result<Self, PolicyError> {
        config.validate()?;
        let privilege = Privilege::mint(config.service_principal.as_str());
        Self::with_privilege(config, privilege, store, repos)
    }

    /// Create a service around an existing privilege.
    ///
    /// Fails with [`PolicyError::MalformedPrivilege`] unless the privilege
    /// stands for exactly one principal.
    pub fn with_privilege(
        config: PolicyConfig,
        privilege: Privilege,
        store: Arc<dyn DocumentStore>,
        repos: Arc<dyn RepoService>,
    ) -> Result<Self, PolicyError> {
        let store = PolicyStore::new(store, config.collections.clone(), &privilege)?;
        info!(service = %store.service(), "Policy service ready");
        Ok(Self {
            config,
            privilege,
            store,
            repos,
        })
    }

    /// Connect to MongoDB and the repository service named in `config`.
    pub async fn connect(config: PolicyConfig) -> Result<Self, PolicyError> {
        config.validate()?;
        let store = MongoStore::connect(&config.mongo.uri, &config.mongo.database).await?;
        let repos = HttpRepoService::new(&config.repo_service).map_err(|e| PolicyError::Config(e.to_string()))?;
        Self::new(config, Arc::new(store), Arc::new(repos))
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    /// The principal the service privilege stands for.
    pub fn service_principal(&self) -> &Principal {
        self.store.service()
    }

    pub fn store(&self) -> &PolicyStore {
        &self.store
    }

    // ------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------

    /// The user called `name`, created on first reference.
    pub async fn get_or_create_user(&self, ctx: &mut Context, name: &str) -> Result<Labeled<User>, PolicyError> {
        let user = match self.store.find_by_p::<User>(ctx, &self.privilege, "_id", name).await? {
            Some(user) => user,
            None => {
                let written = self
                    .store
                    .insert(ctx, &self.privilege, Record::Plain(User::new(name)))
                    .await?;
                info!(user = %name, "Created user");
                written.entity
            }
        };
        Ok(ctx.endorse(&self.privilege, user))
    }

    /// The user called `name`, labeled with what the read observed.
    pub async fn find_user(&self, ctx: &mut Context, name: &str) -> Result<Option<Labeled<User>>, PolicyError> {
        let found = self.store.find_by(ctx, "_id", name).await?;
        Ok(found.map(|user| ctx.endorse(&self.privilege, user)))
    }

    async fn own_user(&self, ctx: &mut Context) -> Result<User, PolicyError> {
        let name = ctx.actor().to_string();
        let user = self.get_or_create_user(ctx, &name).await?;
        Ok(ctx.unlabel(user))
    }

    /// Merge `proposed` into the acting user's profile.
    pub async fn partial_user_update(
        &self,
        ctx: &mut Context,
        proposed: Labeled<Document>,
    ) -> Result<Labeled<User>, PolicyError> {
        let proposed = ctx.unlabel(proposed);
        let user = self.own_user(ctx).await?;
        let updated = merge::partial_update(&user, &proposed)?;
        debug!(user = %updated.name, "Merged user update");
        Ok(ctx.endorse(&self.privilege, updated))
    }

    /// Add the key in `proposed` to the acting user.
    pub async fn add_user_key(&self, ctx: &mut Context, proposed: Labeled<Document>) -> Result<Labeled<User>, PolicyError> {
        let proposed = ctx.unlabel(proposed);
        let user = self.own_user(ctx).await?;
        let updated = merge::add_key(&user, &proposed)?;
        Ok(ctx.endorse(&self.privilege, updated))
    }

    /// Remove the key named by `_delete` from the acting user.
    pub async fn del_user_key(&self, ctx: &mut Context, proposed: Labeled<Document>) -> Result<Labeled<User>, PolicyError> {
        let proposed = ctx.unlabel(proposed);
        let user = self.own_user(ctx).await?;
        Ok(ctx.endorse(&self.privilege, merge::delete_key(&user, &proposed)))
    }

    pub async fn save_user(&self, ctx: &mut Context, record: Record<User>) -> Result<(), PolicyError> {
        self.store.save(ctx, &self.privilege, record).await
    }

    // ------------------------------------------------------------------
    // Projects
    // ------------------------------------------------------------------

    /// Build a project owned by the actor from `proposed`, forking when it
    /// names a `_fork` source.
    pub async fn mk_project(&self, ctx: &mut Context, proposed: Labeled<Document>) -> Result<Labeled<Project>, PolicyError> {
        let proposed = ctx.unlabel(proposed);
        let requester = ctx.actor().to_string();

        let project = match merge::fork_source(&proposed)? {
            Some(source_id) => {
                let source = self
                    .store
                    .find_by_p::<Project>(ctx, &self.privilege, "_id", source_id)
                    .await?
                    .ok_or_else(|| PolicyError::NotFound(format!("project {}", source_id)))?;
                let fork = merge::fork_project(&source, &requester, &proposed)?;

                // The fork carries the source's confidentiality.
                self.store.find_by::<Project>(ctx, "_id", source_id).await?;
                debug!(source = %source_id, owner = %requester, "Built fork");
                fork
            }
            None => merge::new_project(&requester, &proposed)?,
        };

        Ok(ctx.endorse(&self.privilege, project))
    }

    /// Insert a project, then create or fork its repository.
    ///
    /// The repository call happens only after the insert succeeds. If it
    /// fails the project document stays in place.
    pub async fn create_project(&self, ctx: &mut Context, record: Record<Project>) -> Result<ProjectId, PolicyError> {
        let written = self.store.insert(ctx, &self.privilege, record).await?;
        let project = written.entity;
        let id = written
            .id
            .as_object_id()
            .ok_or_else(|| PolicyError::ValidationFailure(format!("project id {} is not an ObjectId", written.id)))?;
        info!(id = %id, owner = %project.owner, name = %project.name, "Created project");

        let outcome = match project.forked_from {
            Some(source_id) => {
                let source = self
                    .store
                    .find_by_p::<Project>(ctx, &self.privilege, "_id", source_id)
                    .await?
                    .ok_or_else(|| PolicyError::NotFound(format!("project {}", source_id)))?;
                self.repos
                    .fork_repo(&source.owner, &source.name, &project.owner, &project.name)
                    .await
            }
            None => self.repos.create_repo(&project.owner, &project.name).await,
        };

        if let Err(err) = outcome {
            warn!(
                id = %id,
                owner = %project.owner,
                name = %project.name,
                error = %err,
                "Project stored but repository setup failed"
            );
            return Err(err.into());
        }

        Ok(id)
    }

    pub async fn find_project(&self, ctx: &mut Context, id: ProjectId) -> Result<Option<Labeled<Project>>, PolicyError> {
        let found = self.store.find_by(ctx, "_id", id).await?;
        Ok(found.map(|project| ctx.endorse(&self.privilege, project)))
    }

    /// Merge `proposed` into the stored project. Identity fields never
    /// change.
    pub async fn partial_project_update(
        &self,
        ctx: &mut Context,
        id: ProjectId,
        proposed: Labeled<Document>,
    ) -> Result<Labeled<Project>, PolicyError> {
        let proposed = ctx.unlabel(proposed);
        let stored: Project = self
            .store
            .find_by(ctx, "_id", id)
            .await?
            .ok_or_else(|| PolicyError::NotFound(format!("project {}", id)))?;
        let updated = merge::partial_project_update(&stored, &proposed)?;
        Ok(ctx.endorse(&self.privilege, updated))
    }

    pub async fn save_project(&self, ctx: &mut Context, record: Record<Project>) -> Result<(), PolicyError> {
        self.store.save(ctx, &self.privilege, record).await
    }

    /// Record `project_id` in the owner's project list.
    pub async fn update_user_with_proj_id(
        &self,
        ctx: &mut Context,
        user_name: &str,
        project_id: ProjectId,
    ) -> Result<(), PolicyError> {
        let project = self
            .store
            .find_by_p::<Project>(ctx, &self.privilege, "_id", project_id)
            .await?
            .ok_or_else(|| PolicyError::NotFound(format!("project {}", project_id)))?;
        if project.owner != user_name {
            return Err(PolicyError::PermissionError(format!(
                "{} does not own project {}",
                user_name, project_id
            )));
        }

        let user = self.get_or_create_user(ctx, user_name).await?;
        let mut user: User = ctx.unlabel(user);
        if user.projects.contains(&project_id) {
            debug!(user = %user_name, project = %project_id, "Project already linked");
            return Ok(());
        }
        user.projects.push(project_id);
        let endorsed = ctx.endorse(&self.privilege, user);
        self.save_user(ctx, Record::Labeled(endorsed)).await
    }

    /// Fetch an object from the repository of `owner/project`.
    ///
    /// Paths that could leave the repository are refused before anything
    /// else happens.
    pub async fn fetch_repo_object(
        &self,
        ctx: &mut Context,
        owner: &str,
        project: &str,
        path: &str,
    ) -> Result<Option<Labeled<serde_json::Value>>, PolicyError> {
        let path = validate_path(path)?;
        let found = self
            .store
            .find_where::<Project>(ctx, &doc! { "owner": owner, "name": project })
            .await?
            .ok_or_else(|| PolicyError::NotFound(format!("project {}/{}", owner, project)))?;

        let object = self.repos.fetch(&found.owner, &found.name, path).await?;
        Ok(object.map(|value| ctx.endorse(&self.privilege, value)))
    }

    // ------------------------------------------------------------------
    // Apps
    // ------------------------------------------------------------------

    /// Register an app owned by the actor.
    pub async fn create_app(&self, ctx: &mut Context, proposed: Labeled<Document>) -> Result<AppId, PolicyError> {
        let proposed = ctx.unlabel(proposed);
        let name = proposed
            .get_str("name")
            .map_err(|_| PolicyError::ValidationFailure("app needs a name".into()))?;
        if name.trim().is_empty() {
            return Err(PolicyError::ValidationFailure("app needs a name".into()));
        }
        let id = match proposed.get("_id") {
            Some(Bson::String(id)) if !id.is_empty() => id.clone(),
            _ => name.to_string(),
        };
        let app = App {
            id,
            name: name.to_string(),
            title: proposed.get_str("title").unwrap_or(name).to_string(),
            description: proposed.get_str("description").unwrap_or_default().to_string(),
            owner: ctx.actor().to_string(),
        };

        let endorsed = ctx.endorse(&self.privilege, app);
        let written = self.store.insert(ctx, &self.privilege, Record::Labeled(endorsed)).await?;
        info!(app = %written.entity.id, owner = %written.entity.owner, "Registered app");
        Ok(written.entity.id)
    }

    pub async fn find_app(&self, ctx: &mut Context, id: &str) -> Result<Option<Labeled<App>>, PolicyError> {
        let found = self.store.find_by(ctx, "_id", id).await?;
        Ok(found.map(|app| ctx.endorse(&self.privilege, app)))
    }

    // ------------------------------------------------------------------
    // Groups
    // ------------------------------------------------------------------

    /// Concrete members of `principal`; itself unless it is a group.
    pub async fn expand_group(&self, principal: &Principal) -> BTreeSet<Principal> {
        groups::expand(&self.store, principal).await
    }

    /// Whether the actor satisfies `component` once its groups are expanded.
    pub async fn actor_satisfies(&self, ctx: &Context, component: &Component) -> bool {
        let wanted = Label::new(component.clone(), Component::Public);
        let table = groups::table(&self.store, &[&wanted]).await;
        ctx.actor_satisfies(&component.expand(&table))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::repo::{MemoryRepoService, RepoCall};

    fn service() -> (PolicyService, Arc<MemoryRepoService>) {
        let repos = Arc::new(MemoryRepoService::new());
        let svc = PolicyService::new(PolicyConfig::default(), Arc::new(MemoryStore::new()), repos.clone()).unwrap();
        (svc, repos)
    }

    fn request(ctx: &Context, doc: Document) -> Labeled<Document> {
        Labeled::new(ctx.label().clone(), doc)
    }

    #[test]
    fn test_malformed_privilege_rejected() {
        let both = Component::all_of(["hearth", "root"]).unwrap();
        let err = PolicyService::with_privilege(
            PolicyConfig::default(),
            Privilege::mint_component(both),
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryRepoService::new()),
        )
        .err()
        .unwrap();
        assert!(matches!(err, PolicyError::MalformedPrivilege(_)));
    }

    #[tokio::test]
    async fn test_get_or_create_user_is_idempotent() {
        let (svc, _) = service();
        let mut ctx = Context::new("alice");
        let first = svc.get_or_create_user(&mut ctx, "alice").await.unwrap();
        let second = svc.get_or_create_user(&mut ctx, "alice").await.unwrap();
        assert!(first.label().integrity.implies(&Component::principal("hearth")));
        assert_eq!(ctx.unlabel(first), ctx.unlabel(second));
    }

    #[tokio::test]
    async fn test_user_update_roundtrip() {
        let (svc, _) = service();
        let mut ctx = Context::new("alice");
        let proposed = request(&ctx, doc! { "city": "Porto", "_id": "mallory" });
        let updated = svc.partial_user_update(&mut ctx, proposed).await.unwrap();
        svc.save_user(&mut ctx, Record::Labeled(updated)).await.unwrap();

        let stored = svc.find_user(&mut ctx, "alice").await.unwrap().unwrap();
        let stored = ctx.unlabel(stored);
        assert_eq!(stored.city.as_deref(), Some("Porto"));
        assert!(svc.find_user(&mut ctx, "mallory").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_other_users_update_is_denied() {
        let (svc, _) = service();
        let mut alice = Context::new("alice");
        svc.get_or_create_user(&mut alice, "alice").await.unwrap();

        let mut mallory = Context::new("mallory");
        let mut forged = User::new("alice");
        forged.city = Some("Nowhere".into());
        let endorsed = mallory.endorse(&svc.privilege, forged);
        let err = svc
            .save_user(&mut mallory, Record::Labeled(endorsed))
            .await
            .unwrap_err();
        assert!(err.is_denied());
    }

    #[tokio::test]
    async fn test_create_project_creates_repo() {
        let (svc, repos) = service();
        let mut ctx = Context::new("alice");
        let proposal = request(&ctx, doc! { "name": "foo", "public": "on" });
        let project = svc
            .mk_project(&mut ctx, proposal)
            .await
            .unwrap();
        let id = svc.create_project(&mut ctx, Record::Labeled(project)).await.unwrap();

        assert_eq!(
            repos.calls().await,
            vec![RepoCall::Create {
                owner: "alice".into(),
                name: "foo".into()
            }]
        );
        let stored = svc.find_project(&mut ctx, id).await.unwrap().unwrap();
        let stored = ctx.unlabel(stored);
        assert!(stored.is_public());
    }

    #[tokio::test]
    async fn test_denied_insert_makes_no_repo_call() {
        let (svc, repos) = service();
        let mut ctx = Context::new("mallory");
        let err = svc
            .create_project(&mut ctx, Record::Plain(Project::new("carol", "bar")))
            .await
            .unwrap_err();
        assert!(err.is_denied());
        assert!(repos.calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_update_user_with_proj_id() {
        let (svc, _) = service();
        let mut ctx = Context::new("alice");
        let id = svc
            .create_project(&mut ctx, Record::Plain(Project::new("alice", "foo")))
            .await
            .unwrap();

        svc.update_user_with_proj_id(&mut ctx, "alice", id).await.unwrap();
        svc.update_user_with_proj_id(&mut ctx, "alice", id).await.unwrap();
        let alice = svc.find_user(&mut ctx, "alice").await.unwrap().unwrap();
        let alice = ctx.unlabel(alice);
        assert_eq!(alice.projects, vec![id]);

        let err = svc.update_user_with_proj_id(&mut ctx, "bob", id).await.unwrap_err();
        assert!(matches!(err, PolicyError::PermissionError(_)));
    }

    #[tokio::test]
    async fn test_create_and_find_app() {
        let (svc, _) = service();
        let mut ctx = Context::new("erin");
        let proposal = request(&ctx, doc! { "name": "blog", "description": "posts" });
        let id = svc
            .create_app(&mut ctx, proposal)
            .await
            .unwrap();
        assert_eq!(id, "blog");

        let mut reader = Context::new("frank");
        let app = svc.find_app(&mut reader, "blog").await.unwrap().unwrap();
        let app = reader.unlabel(app);
        assert_eq!(app.owner, "erin");
        assert_eq!(app.title, "blog");
        assert!(reader.label().secrecy.is_public());

        let proposal = request(&ctx, doc! {});
        let err = svc.create_app(&mut ctx, proposal).await.unwrap_err();
        assert!(matches!(err, PolicyError::ValidationFailure(_)));
    }

    #[tokio::test]
    async fn test_actor_satisfies_through_groups() {
        let (svc, _) = service();
        let mut carol = Context::new("carol");
        let mut project = Project::new("carol", "team");
        project.collaborators = vec!["dave".into()];
        let id = svc.create_project(&mut carol, Record::Plain(project)).await.unwrap();

        let writers = Component::principal(groups::GroupRef::can_write(&id));
        assert!(svc.actor_satisfies(&Context::new("dave"), &writers).await);
        assert!(!svc.actor_satisfies(&Context::new("erin"), &writers).await);
    }
}
