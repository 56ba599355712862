//! Labeled access to the document store.
//!
//! Every read taints the requesting [`Context`] with the label of the
//! document it returns. Writes go through [`PolicyStore::insert_or_save`],
//! which runs under a scoped downgrade justified by the service privilege
//! and checks the destination label computed from the document itself.

use bson::{Bson, Document};
use hearth_label::{Component, Context, Label, Labeled, Principal, Privilege, PrivilegeId};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::CollectionNames;
use crate::db::{DocumentStore, StoreError};
use crate::entity::Entity;
use crate::groups;
use crate::types::PolicyError;

/// Kind of write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOp {
    Insert,
    Save,
}

/// A document to write, either plain or carrying the label it was
/// produced under.
#[derive(Debug, Clone)]
pub enum Record<T> {
    Plain(T),
    Labeled(Labeled<T>),
}

impl<T> From<Labeled<T>> for Record<T> {
    fn from(labeled: Labeled<T>) -> Self {
        Self::Labeled(labeled)
    }
}

/// Result of a successful write.
#[derive(Debug, Clone)]
pub struct Written<T> {
    /// The document's `_id`
    pub id: Bson,
    /// The entity as written
    pub entity: T,
}

/// The document store seen through the entity label policies.
#[derive(Clone)]
pub struct PolicyStore {
    store: Arc<dyn DocumentStore>,
    collections: CollectionNames,
    service: Principal,
    authority: PrivilegeId,
}

impl PolicyStore {
    /// Build a store that acts for the owner of `privilege`.
    ///
    /// Privileged operations accept only this very privilege; another mint
    /// for the same principal is refused with
    /// [`PolicyError::ForeignPrivilege`].
    pub fn new(
        store: Arc<dyn DocumentStore>,
        collections: CollectionNames,
        privilege: &Privilege,
    ) -> Result<Self, PolicyError> {
        let service = privilege.owner()?.clone();
        Ok(Self {
            store,
            collections,
            service,
            authority: privilege.id(),
        })
    }

    /// The service principal labels are computed with.
    pub fn service(&self) -> &Principal {
        &self.service
    }

    fn authorize(&self, privilege: &Privilege) -> Result<(), PolicyError> {
        if privilege.id() == self.authority {
            Ok(())
        } else {
            warn!(privilege = ?privilege, "Refusing privilege not issued to this store");
            Err(PolicyError::ForeignPrivilege(format!("{:?}", privilege)))
        }
    }

    fn collection<E: Entity>(&self) -> &str {
        E::KIND.name(&self.collections)
    }

    fn check_searchable<'a, E: Entity>(&self, fields: impl IntoIterator<Item = &'a str>) -> Result<(), PolicyError> {
        for field in fields {
            if !E::is_searchable(field) {
                return Err(PolicyError::UnsearchableField {
                    collection: self.collection::<E>().to_string(),
                    field: field.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Read without tainting anyone. Only for trusted callers that never
    /// hand the result to a request.
    pub(crate) async fn lookup<E: Entity>(&self, key: &str, value: &Bson) -> Result<Option<E>, PolicyError> {
        self.check_searchable::<E>([key])?;
        let found = self.store.find_by(self.collection::<E>(), key, value).await?;
        Ok(found.map(bson::from_document).transpose()?)
    }

    async fn lookup_where<E: Entity>(&self, selector: &Document) -> Result<Option<E>, PolicyError> {
        self.check_searchable::<E>(selector.keys().map(String::as_str))?;
        let found = self.store.find_where(self.collection::<E>(), selector).await?;
        Ok(found.map(bson::from_document).transpose()?)
    }

    /// Find the first entity whose `key` equals `value`, tainting `ctx` with
    /// its label.
    pub async fn find_by<E: Entity>(
        &self,
        ctx: &mut Context,
        key: &str,
        value: impl Into<Bson> + Send,
    ) -> Result<Option<E>, PolicyError> {
        let found = self.lookup::<E>(key, &value.into()).await?;
        if let Some(entity) = &found {
            ctx.taint(&entity.label(&self.service));
        }
        Ok(found)
    }

    /// [`PolicyStore::find_by`], tainting only by what `privilege` cannot
    /// declassify.
    pub async fn find_by_p<E: Entity>(
        &self,
        ctx: &mut Context,
        privilege: &Privilege,
        key: &str,
        value: impl Into<Bson> + Send,
    ) -> Result<Option<E>, PolicyError> {
        self.authorize(privilege)?;
        let found = self.lookup::<E>(key, &value.into()).await?;
        if let Some(entity) = &found {
            ctx.taint_p(privilege, &entity.label(&self.service));
        }
        Ok(found)
    }

    /// Find the first entity matching every field of `selector`.
    pub async fn find_where<E: Entity>(&self, ctx: &mut Context, selector: &Document) -> Result<Option<E>, PolicyError> {
        let found = self.lookup_where::<E>(selector).await?;
        if let Some(entity) = &found {
            ctx.taint(&entity.label(&self.service));
        }
        Ok(found)
    }

    pub async fn find_where_p<E: Entity>(
        &self,
        ctx: &mut Context,
        privilege: &Privilege,
        selector: &Document,
    ) -> Result<Option<E>, PolicyError> {
        self.authorize(privilege)?;
        let found = self.lookup_where::<E>(selector).await?;
        if let Some(entity) = &found {
            ctx.taint_p(privilege, &entity.label(&self.service));
        }
        Ok(found)
    }

    pub async fn insert<E: Entity>(
        &self,
        ctx: &mut Context,
        privilege: &Privilege,
        record: Record<E>,
    ) -> Result<Written<E>, PolicyError> {
        self.insert_or_save(ctx, privilege, WriteOp::Insert, record).await
    }

    pub async fn save<E: Entity>(&self, ctx: &mut Context, privilege: &Privilege, record: Record<E>) -> Result<(), PolicyError> {
        self.insert_or_save(ctx, privilege, WriteOp::Save, record).await?;
        Ok(())
    }

    /// Write `record` on behalf of `ctx`, vouched for by `privilege`.
    ///
    /// A labeled record is observed first and its label lowered to public
    /// secrecy with the privilege added to its integrity. The write then runs
    /// with `ctx` moved to `(Public, I ∧ P)`, where `I` is the caller's
    /// integrity. Both the scoped label and the lowered record label must
    /// flow to the destination label, after group expansion, without further
    /// privilege. A save must also be allowed to overwrite whatever is
    /// stored under the same `_id`. The caller's label is restored however
    /// this returns.
    pub async fn insert_or_save<E: Entity>(
        &self,
        ctx: &mut Context,
        privilege: &Privilege,
        op: WriteOp,
        record: Record<E>,
    ) -> Result<Written<E>, PolicyError> {
        self.authorize(privilege)?;
        let collection = self.collection::<E>().to_string();

        let (entity, record_label) = match record {
            Record::Plain(entity) => (entity, None),
            Record::Labeled(labeled) => {
                let original = labeled.label().clone();
                let entity = ctx.unlabel(labeled);
                let lowered = Label::new(Component::Public, original.integrity.join(privilege.component()));
                ctx.check_relabel(&original, &lowered, Some(privilege))?;
                (entity, Some(lowered))
            }
        };

        let target = entity.label(&self.service);
        let document = bson::to_document(&entity)?;
        let existing = match op {
            WriteOp::Insert => None,
            WriteOp::Save => {
                let id = document
                    .get("_id")
                    .ok_or_else(|| StoreError::MissingId(collection.clone()))?;
                self.store
                    .find_by(&collection, "_id", id)
                    .await?
                    .map(bson::from_document::<E>)
                    .transpose()?
                    .map(|stored| stored.label(&self.service))
            }
        };

        let elevated = Label::new(Component::Public, ctx.label().integrity.join(privilege.component()));
        let scoped = ctx.downgrade_scoped(privilege, elevated)?;

        let mut involved = vec![&target, scoped.label()];
        involved.extend(record_label.as_ref());
        involved.extend(existing.as_ref());
        let groups = groups::table(self, &involved).await;

        let destination = target.expand(&groups);
        let current = scoped.label().expand(&groups);
        let checked = current
            .check_flow(&destination, None)
            .and_then(|()| match &record_label {
                Some(label) => label.expand(&groups).check_flow(&destination, None),
                None => Ok(()),
            })
            .and_then(|()| match &existing {
                Some(stored) => current.check_flow(&stored.expand(&groups), None),
                None => Ok(()),
            });
        if let Err(err) = checked {
            warn!(
                actor = %scoped.actor(),
                collection = %collection,
                error = %err,
                "Write denied"
            );
            return Err(err.into());
        }

        let id = match op {
            WriteOp::Insert => self.store.insert(&collection, document).await?,
            WriteOp::Save => {
                let id = document.get("_id").cloned().unwrap_or(Bson::Null);
                self.store.save(&collection, document).await?;
                id
            }
        };

        debug!(actor = %scoped.actor(), collection = %collection, id = %id, op = ?op, "Write committed");
        drop(scoped);

        Ok(Written { id, entity })
    }
}
