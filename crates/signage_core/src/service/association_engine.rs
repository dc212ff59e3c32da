//! Association engine: the only writer of link rows.
//!
//! # Responsibility
//! - Create, fully replace, add to, remove from and cascade-delete the
//!   item/site and bulletin/site link sets.
//! - Run every step of one operation inside the caller's `UnitOfWork`.
//!
//! # Invariants
//! - Counterparts are validated before any link row is written; a failed
//!   validation aborts the unit, which rolls back earlier writes of the same
//!   call (including a just-inserted entity or just-deleted links).
//! - A new item/site link copies the item's nominal duration once. Later
//!   nominal-duration edits never rewrite existing links.
//! - Full replace resets surviving pairs to the nominal duration unless
//!   `EngineConfig::preserve_on_replace` is set.
//! - Cascade delete removes links before the entity row.
//! - Concurrent full replaces on one anchor are last-commit-wins; the pair
//!   unique indexes only prevent duplicate rows.

use crate::config::EngineConfig;
use crate::db::{DbError, UnitOfWork};
use crate::model::entity::{
    Bulletin, BulletinDraft, Entity, EntityDraft, EntityKind, EntityPatch, Item, ItemDraft, ItemId,
    ModelValidationError, Site, SiteDraft, SiteId,
};
use crate::model::link::{ItemSiteLink, LinkDirection};
use crate::repo::entity_repo::{EntityStore, SqliteEntityStore};
use crate::repo::link_repo::{InsertOutcome, LinkRepository, SqliteLinkRepository};
use crate::repo::RepoError;
use crate::service::link_validator::{dedup_ids, LinkValidator};
use log::warn;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type AssociationResult<T> = Result<T, AssociationError>;

/// Errors surfaced by association operations. Any of them means the whole
/// requested mutation did not happen.
#[derive(Debug)]
pub enum AssociationError {
    /// Some counterpart ids do not name a live entity.
    ValidationFailed { kind: EntityKind, missing: Vec<i64> },
    /// Addressed item/site pair does not exist.
    LinkNotFound { item_id: ItemId, site_id: SiteId },
    /// Supplied value violates its domain constraint.
    InvalidArgument(String),
    /// A pair unique index rejected an insert during create or replace.
    StorageConflict {
        direction: LinkDirection,
        anchor_id: i64,
        counterpart_id: i64,
    },
    /// Anchor entity does not exist.
    EntityNotFound { kind: EntityKind, id: i64 },
    /// The unit could not begin, run or commit.
    TransactionFailure(DbError),
    /// Other repository failure.
    Repo(RepoError),
    /// Write succeeded but read-back did not match.
    InconsistentState(&'static str),
}

impl AssociationError {
    /// Stable code used in log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ValidationFailed { .. } => "validation_failed",
            Self::LinkNotFound { .. } => "link_not_found",
            Self::InvalidArgument(_) => "invalid_argument",
            Self::StorageConflict { .. } => "storage_conflict",
            Self::EntityNotFound { .. } => "entity_not_found",
            Self::TransactionFailure(_) => "transaction_failure",
            Self::Repo(_) => "repo_error",
            Self::InconsistentState(_) => "inconsistent_state",
        }
    }
}

impl Display for AssociationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ValidationFailed { kind, missing } => {
                write!(f, "unknown {kind} ids: {missing:?}")
            }
            Self::LinkNotFound { item_id, site_id } => {
                write!(f, "no link between item {item_id} and site {site_id}")
            }
            Self::InvalidArgument(message) => write!(f, "invalid argument: {message}"),
            Self::StorageConflict {
                direction,
                anchor_id,
                counterpart_id,
            } => write!(
                f,
                "concurrent link write detected ({direction}: {anchor_id} -> {counterpart_id})"
            ),
            Self::EntityNotFound { kind, id } => write!(f, "{kind} not found: {id}"),
            Self::TransactionFailure(err) => write!(f, "transaction failed: {err}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::InconsistentState(details) => write!(f, "inconsistent state: {details}"),
        }
    }
}

impl Error for AssociationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::TransactionFailure(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for AssociationError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound { kind, id } => Self::EntityNotFound { kind, id },
            RepoError::Validation(err) => Self::InvalidArgument(err.to_string()),
            RepoError::Db(err) => Self::TransactionFailure(err),
            other => Self::Repo(other),
        }
    }
}

impl From<DbError> for AssociationError {
    fn from(value: DbError) -> Self {
        Self::TransactionFailure(value)
    }
}

impl From<ModelValidationError> for AssociationError {
    fn from(value: ModelValidationError) -> Self {
        Self::InvalidArgument(value.to_string())
    }
}

/// Net effect of one link mutation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkChange {
    pub created: usize,
    pub removed: usize,
}

/// What to do when the pair unique index rejects an insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConflictPolicy {
    Fail,
    TreatAsLinked,
}

/// Link mutation engine. Stateless apart from its config; every call works
/// on the unit it is handed.
#[derive(Debug, Clone, Default)]
pub struct AssociationEngine {
    config: EngineConfig,
}

impl AssociationEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Inserts a new entity and links it to `counterpart_ids`.
    ///
    /// `direction` must be anchored on the draft's kind.
    pub fn create_with_links(
        &self,
        uow: &UnitOfWork<'_>,
        draft: &EntityDraft,
        direction: LinkDirection,
        counterpart_ids: &[i64],
    ) -> AssociationResult<Entity> {
        ensure_anchor_kind(direction, draft.kind())?;
        let store = SqliteEntityStore::try_new(uow.conn())?;

        let anchor = match draft {
            EntityDraft::Item(draft) => Entity::Item(store.insert_item(draft)?),
            EntityDraft::Site(draft) => Entity::Site(store.insert_site(draft)?),
            EntityDraft::Bulletin(draft) => Entity::Bulletin(store.insert_bulletin(draft)?),
        };

        self.link_to(uow, &anchor, direction, counterpart_ids, ConflictPolicy::Fail)?;
        Ok(anchor)
    }

    /// Creates an item linked to `site_ids`.
    pub fn create_item_with_sites(
        &self,
        uow: &UnitOfWork<'_>,
        draft: &ItemDraft,
        site_ids: &[SiteId],
    ) -> AssociationResult<Item> {
        match self.create_with_links(
            uow,
            &EntityDraft::Item(draft.clone()),
            LinkDirection::ItemToSites,
            site_ids,
        )? {
            Entity::Item(item) => Ok(item),
            _ => Err(AssociationError::InconsistentState("item create returned another kind")),
        }
    }

    /// Creates a site linked to `item_ids` and `bulletin_ids`.
    pub fn create_site_with_links(
        &self,
        uow: &UnitOfWork<'_>,
        draft: &SiteDraft,
        item_ids: &[ItemId],
        bulletin_ids: &[i64],
    ) -> AssociationResult<Site> {
        let created = self.create_with_links(
            uow,
            &EntityDraft::Site(draft.clone()),
            LinkDirection::SiteToItems,
            item_ids,
        )?;
        self.link_to(
            uow,
            &created,
            LinkDirection::SiteToBulletins,
            bulletin_ids,
            ConflictPolicy::Fail,
        )?;
        match created {
            Entity::Site(site) => Ok(site),
            _ => Err(AssociationError::InconsistentState("site create returned another kind")),
        }
    }

    /// Creates a bulletin linked to `site_ids`.
    pub fn create_bulletin_with_sites(
        &self,
        uow: &UnitOfWork<'_>,
        draft: &BulletinDraft,
        site_ids: &[SiteId],
    ) -> AssociationResult<Bulletin> {
        match self.create_with_links(
            uow,
            &EntityDraft::Bulletin(draft.clone()),
            LinkDirection::BulletinToSites,
            site_ids,
        )? {
            Entity::Bulletin(bulletin) => Ok(bulletin),
            _ => Err(AssociationError::InconsistentState(
                "bulletin create returned another kind",
            )),
        }
    }

    /// Destructive full replace of the anchor's link set.
    ///
    /// Counterparts omitted from `counterpart_ids` lose their link and its
    /// play duration.
    pub fn replace_links(
        &self,
        uow: &UnitOfWork<'_>,
        direction: LinkDirection,
        anchor_id: i64,
        counterpart_ids: &[i64],
    ) -> AssociationResult<LinkChange> {
        let store = SqliteEntityStore::try_new(uow.conn())?;
        let links = SqliteLinkRepository::try_new(uow.conn())?;
        let anchor = load_anchor(&store, direction, anchor_id)?;

        let preserved: BTreeMap<i64, i64> =
            if self.config.preserve_on_replace && direction.carries_play_duration() {
                links
                    .list_links(direction, anchor_id)?
                    .into_iter()
                    .filter_map(|row| row.play_duration_secs.map(|secs| (row.counterpart_id, secs)))
                    .collect()
            } else {
                BTreeMap::new()
            };

        let removed = links.delete_all_for(direction, anchor_id)?;
        let requested = dedup_ids(counterpart_ids);
        let resolved =
            LinkValidator::new(&store).resolve(direction.counterpart_kind(), &requested)?;

        let created = insert_links(
            &links,
            direction,
            &anchor,
            &resolved,
            &preserved,
            ConflictPolicy::Fail,
        )?;
        Ok(LinkChange { created, removed })
    }

    /// Links the anchor to counterparts it is not linked to yet.
    pub fn add_links(
        &self,
        uow: &UnitOfWork<'_>,
        direction: LinkDirection,
        anchor_id: i64,
        counterpart_ids: &[i64],
    ) -> AssociationResult<LinkChange> {
        let store = SqliteEntityStore::try_new(uow.conn())?;
        let anchor = load_anchor(&store, direction, anchor_id)?;
        let created = self.link_to(
            uow,
            &anchor,
            direction,
            counterpart_ids,
            ConflictPolicy::TreatAsLinked,
        )?;
        Ok(LinkChange {
            created,
            removed: 0,
        })
    }

    /// Unlinks exactly the listed counterparts. Absent pairs are ignored.
    pub fn remove_links(
        &self,
        uow: &UnitOfWork<'_>,
        direction: LinkDirection,
        anchor_id: i64,
        counterpart_ids: &[i64],
    ) -> AssociationResult<LinkChange> {
        let links = SqliteLinkRepository::try_new(uow.conn())?;
        let removed = links.delete_pairs(direction, anchor_id, &dedup_ids(counterpart_ids))?;
        Ok(LinkChange {
            created: 0,
            removed,
        })
    }

    /// Overrides how long one item plays at one site.
    pub fn set_play_duration(
        &self,
        uow: &UnitOfWork<'_>,
        item_id: ItemId,
        site_id: SiteId,
        seconds: i64,
    ) -> AssociationResult<ItemSiteLink> {
        if seconds <= 0 {
            return Err(AssociationError::InvalidArgument(format!(
                "play duration must be a positive number of seconds, got {seconds}"
            )));
        }

        let links = SqliteLinkRepository::try_new(uow.conn())?;
        if !links.update_play_duration(item_id, site_id, seconds)? {
            return Err(AssociationError::LinkNotFound { item_id, site_id });
        }
        links
            .get_item_site_link(item_id, site_id)?
            .ok_or(AssociationError::InconsistentState(
                "updated link not found in read-back",
            ))
    }

    /// Removes every link of the entity, then the entity itself.
    ///
    /// Returns the number of link rows removed.
    pub fn cascade_delete(
        &self,
        uow: &UnitOfWork<'_>,
        kind: EntityKind,
        id: i64,
    ) -> AssociationResult<usize> {
        let store = SqliteEntityStore::try_new(uow.conn())?;
        let links = SqliteLinkRepository::try_new(uow.conn())?;
        if !store.exists(kind, id, true)? {
            return Err(AssociationError::EntityNotFound { kind, id });
        }

        let mut removed = 0;
        for direction in directions_anchored_on(kind) {
            removed += links.delete_all_for(*direction, id)?;
        }
        store.hard_delete(kind, id)?;
        Ok(removed)
    }

    /// Applies a field patch and, when `relink` is given, fully replaces the
    /// anchor's links on that direction, all in one unit.
    pub fn update_with_links(
        &self,
        uow: &UnitOfWork<'_>,
        id: i64,
        patch: &EntityPatch,
        relink: Option<(LinkDirection, &[i64])>,
    ) -> AssociationResult<Entity> {
        let store = SqliteEntityStore::try_new(uow.conn())?;
        let kind = patch.kind();
        let current = store
            .get_entity(kind, id, true)?
            .ok_or(AssociationError::EntityNotFound { kind, id })?;

        let updated = match (current, patch) {
            (Entity::Item(mut item), EntityPatch::Item(patch)) => {
                patch.apply_to(&mut item);
                store.update_item(&item)?;
                Entity::Item(item)
            }
            (Entity::Site(mut site), EntityPatch::Site(patch)) => {
                patch.apply_to(&mut site);
                store.update_site(&site)?;
                Entity::Site(site)
            }
            (Entity::Bulletin(mut bulletin), EntityPatch::Bulletin(patch)) => {
                patch.apply_to(&mut bulletin);
                store.update_bulletin(&bulletin)?;
                Entity::Bulletin(bulletin)
            }
            _ => {
                return Err(AssociationError::InconsistentState(
                    "loaded entity kind differs from patch kind",
                ))
            }
        };

        if let Some((direction, counterpart_ids)) = relink {
            ensure_anchor_kind(direction, kind)?;
            self.replace_links(uow, direction, id, counterpart_ids)?;
        }
        Ok(updated)
    }

    fn link_to(
        &self,
        uow: &UnitOfWork<'_>,
        anchor: &Entity,
        direction: LinkDirection,
        counterpart_ids: &[i64],
        policy: ConflictPolicy,
    ) -> AssociationResult<usize> {
        ensure_anchor_kind(direction, anchor.kind())?;
        let store = SqliteEntityStore::try_new(uow.conn())?;
        let links = SqliteLinkRepository::try_new(uow.conn())?;

        let requested = dedup_ids(counterpart_ids);
        let resolved =
            LinkValidator::new(&store).resolve(direction.counterpart_kind(), &requested)?;

        let existing = links.linked_ids(direction, anchor.id())?;
        let fresh: Vec<Entity> = resolved
            .into_iter()
            .filter(|counterpart| !existing.contains(&counterpart.id()))
            .collect();

        insert_links(&links, direction, anchor, &fresh, &BTreeMap::new(), policy)
    }
}

fn insert_links(
    links: &impl LinkRepository,
    direction: LinkDirection,
    anchor: &Entity,
    counterparts: &[Entity],
    preserved: &BTreeMap<i64, i64>,
    policy: ConflictPolicy,
) -> AssociationResult<usize> {
    let mut created = 0;
    for counterpart in counterparts {
        let play_duration_secs = preserved
            .get(&counterpart.id())
            .copied()
            .or_else(|| default_play_duration(direction, anchor, counterpart));

        match links.insert_link(direction, anchor.id(), counterpart.id(), play_duration_secs)? {
            InsertOutcome::Inserted => created += 1,
            InsertOutcome::Conflict => match policy {
                ConflictPolicy::TreatAsLinked => {
                    warn!(
                        "event=link_conflict module=association status=skipped direction={} anchor_id={} counterpart_id={}",
                        direction,
                        anchor.id(),
                        counterpart.id()
                    );
                }
                ConflictPolicy::Fail => {
                    return Err(AssociationError::StorageConflict {
                        direction,
                        anchor_id: anchor.id(),
                        counterpart_id: counterpart.id(),
                    });
                }
            },
        }
    }
    Ok(created)
}

/// Nominal duration of whichever endpoint is the item, for item/site links.
fn default_play_duration(
    direction: LinkDirection,
    anchor: &Entity,
    counterpart: &Entity,
) -> Option<i64> {
    if !direction.carries_play_duration() {
        return None;
    }
    match (anchor, counterpart) {
        (Entity::Item(item), _) | (_, Entity::Item(item)) => Some(item.duration_secs),
        _ => None,
    }
}

fn load_anchor(
    store: &impl EntityStore,
    direction: LinkDirection,
    anchor_id: i64,
) -> AssociationResult<Entity> {
    let kind = direction.anchor_kind();
    store
        .get_entity(kind, anchor_id, true)?
        .ok_or(AssociationError::EntityNotFound {
            kind,
            id: anchor_id,
        })
}

fn ensure_anchor_kind(direction: LinkDirection, kind: EntityKind) -> AssociationResult<()> {
    if direction.anchor_kind() != kind {
        return Err(AssociationError::InvalidArgument(format!(
            "direction {direction} cannot be anchored on a {kind}"
        )));
    }
    Ok(())
}

fn directions_anchored_on(kind: EntityKind) -> &'static [LinkDirection] {
    match kind {
        EntityKind::Item => &[LinkDirection::ItemToSites],
        EntityKind::Bulletin => &[LinkDirection::BulletinToSites],
        EntityKind::Site => &[LinkDirection::SiteToItems, LinkDirection::SiteToBulletins],
    }
}
