//! Entity store contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD over `items`, `sites` and `bulletins`.
//! - Resolve id sets to live rows for link validation.
//!
//! # Invariants
//! - Write paths validate model fields before SQL mutations.
//! - `get_many` never returns archived rows.
//! - `hard_delete` removes the row itself; link cleanup is the association
//!   engine's job (the schema cascade is the backstop).

use super::{bool_to_int, ensure_tables_ready, id_batches, is_unique_violation, parse_flag};
use super::{RepoError, RepoResult};
use crate::model::entity::{
    Bulletin, BulletinDraft, BulletinId, Entity, EntityKind, Item, ItemDraft, ItemId, ItemStatus,
    Site, SiteDraft, SiteId,
};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::BTreeSet;

const ITEM_SELECT_SQL: &str = "SELECT
    id,
    title,
    description,
    image_url,
    video_url,
    status,
    duration_secs,
    is_archived,
    created_at,
    updated_at
FROM items";

const SITE_SELECT_SQL: &str = "SELECT
    id,
    name,
    address,
    is_archived,
    created_at,
    updated_at
FROM sites";

const BULLETIN_SELECT_SQL: &str = "SELECT
    id,
    title,
    document_url,
    is_archived,
    created_at,
    updated_at
FROM bulletins";

const SITE_NAME_INDEX: &str = "sites.name";

/// Durable record storage for items, sites and bulletins.
pub trait EntityStore {
    fn insert_item(&self, draft: &ItemDraft) -> RepoResult<Item>;
    fn insert_site(&self, draft: &SiteDraft) -> RepoResult<Site>;
    fn insert_bulletin(&self, draft: &BulletinDraft) -> RepoResult<Bulletin>;

    fn get_item(&self, id: ItemId, include_archived: bool) -> RepoResult<Option<Item>>;
    fn get_site(&self, id: SiteId, include_archived: bool) -> RepoResult<Option<Site>>;
    fn get_bulletin(&self, id: BulletinId, include_archived: bool)
        -> RepoResult<Option<Bulletin>>;
    fn get_entity(
        &self,
        kind: EntityKind,
        id: i64,
        include_archived: bool,
    ) -> RepoResult<Option<Entity>>;
    /// Loads the live (non-archived) rows among `ids`, ordered by id.
    fn get_many(&self, kind: EntityKind, ids: &BTreeSet<i64>) -> RepoResult<Vec<Entity>>;

    fn exists(&self, kind: EntityKind, id: i64, include_archived: bool) -> RepoResult<bool>;

    fn update_item(&self, item: &Item) -> RepoResult<()>;
    fn update_site(&self, site: &Site) -> RepoResult<()>;
    fn update_bulletin(&self, bulletin: &Bulletin) -> RepoResult<()>;

    /// Toggles the soft-delete flag. Links are kept.
    fn set_archived(&self, kind: EntityKind, id: i64, archived: bool) -> RepoResult<()>;
    fn hard_delete(&self, kind: EntityKind, id: i64) -> RepoResult<()>;

    fn list_items(&self, include_archived: bool) -> RepoResult<Vec<Item>>;
    fn list_sites(&self, include_archived: bool) -> RepoResult<Vec<Site>>;
    fn list_bulletins(&self, include_archived: bool) -> RepoResult<Vec<Bulletin>>;
}

/// SQLite-backed entity store.
pub struct SqliteEntityStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteEntityStore<'conn> {
    /// Constructs a store from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_tables_ready(conn, &["items", "sites", "bulletins"])?;
        Ok(Self { conn })
    }

    fn query_items(&self, sql: &str, bind_values: Vec<Value>) -> RepoResult<Vec<Item>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_item_row(row)?);
        }
        Ok(items)
    }

    fn query_sites(&self, sql: &str, bind_values: Vec<Value>) -> RepoResult<Vec<Site>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut sites = Vec::new();
        while let Some(row) = rows.next()? {
            sites.push(parse_site_row(row)?);
        }
        Ok(sites)
    }

    fn query_bulletins(&self, sql: &str, bind_values: Vec<Value>) -> RepoResult<Vec<Bulletin>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut bulletins = Vec::new();
        while let Some(row) = rows.next()? {
            bulletins.push(parse_bulletin_row(row)?);
        }
        Ok(bulletins)
    }
}

impl EntityStore for SqliteEntityStore<'_> {
    fn insert_item(&self, draft: &ItemDraft) -> RepoResult<Item> {
        draft.validate()?;

        self.conn.execute(
            "INSERT INTO items (
                title,
                description,
                image_url,
                video_url,
                status,
                duration_secs
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                draft.title.as_str(),
                draft.description.as_str(),
                draft.image_url.as_deref(),
                draft.video_url.as_deref(),
                item_status_to_db(draft.status),
                draft.duration_secs,
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        self.get_item(id, true)?
            .ok_or_else(|| RepoError::InvalidData(format!("inserted item {id} not readable")))
    }

    fn insert_site(&self, draft: &SiteDraft) -> RepoResult<Site> {
        draft.validate()?;

        self.conn
            .execute(
                "INSERT INTO sites (name, address) VALUES (?1, ?2);",
                params![draft.name.as_str(), draft.address.as_str()],
            )
            .map_err(|err| map_unique(err, SITE_NAME_INDEX))?;

        let id = self.conn.last_insert_rowid();
        self.get_site(id, true)?
            .ok_or_else(|| RepoError::InvalidData(format!("inserted site {id} not readable")))
    }

    fn insert_bulletin(&self, draft: &BulletinDraft) -> RepoResult<Bulletin> {
        draft.validate()?;

        self.conn.execute(
            "INSERT INTO bulletins (title, document_url) VALUES (?1, ?2);",
            params![draft.title.as_str(), draft.document_url.as_deref()],
        )?;

        let id = self.conn.last_insert_rowid();
        self.get_bulletin(id, true)?
            .ok_or_else(|| RepoError::InvalidData(format!("inserted bulletin {id} not readable")))
    }

    fn get_item(&self, id: ItemId, include_archived: bool) -> RepoResult<Option<Item>> {
        let sql = format!("{ITEM_SELECT_SQL} WHERE id = ?1 AND (?2 = 1 OR is_archived = 0);");
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params![id, bool_to_int(include_archived)])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_item_row(row)?));
        }
        Ok(None)
    }

    fn get_site(&self, id: SiteId, include_archived: bool) -> RepoResult<Option<Site>> {
        let sql = format!("{SITE_SELECT_SQL} WHERE id = ?1 AND (?2 = 1 OR is_archived = 0);");
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params![id, bool_to_int(include_archived)])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_site_row(row)?));
        }
        Ok(None)
    }

    fn get_bulletin(
        &self,
        id: BulletinId,
        include_archived: bool,
    ) -> RepoResult<Option<Bulletin>> {
        let sql =
            format!("{BULLETIN_SELECT_SQL} WHERE id = ?1 AND (?2 = 1 OR is_archived = 0);");
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params![id, bool_to_int(include_archived)])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_bulletin_row(row)?));
        }
        Ok(None)
    }

    fn get_entity(
        &self,
        kind: EntityKind,
        id: i64,
        include_archived: bool,
    ) -> RepoResult<Option<Entity>> {
        let entity = match kind {
            EntityKind::Item => self.get_item(id, include_archived)?.map(Entity::Item),
            EntityKind::Site => self.get_site(id, include_archived)?.map(Entity::Site),
            EntityKind::Bulletin => self
                .get_bulletin(id, include_archived)?
                .map(Entity::Bulletin),
        };
        Ok(entity)
    }

    fn get_many(&self, kind: EntityKind, ids: &BTreeSet<i64>) -> RepoResult<Vec<Entity>> {
        let mut entities = Vec::new();
        // Batches are ascending and disjoint, so appending keeps id order.
        for bind_values in id_batches(ids) {
            let placeholders = vec!["?"; bind_values.len()].join(", ");
            let filter =
                format!(" WHERE is_archived = 0 AND id IN ({placeholders}) ORDER BY id ASC;");

            match kind {
                EntityKind::Item => entities.extend(
                    self.query_items(&format!("{ITEM_SELECT_SQL}{filter}"), bind_values)?
                        .into_iter()
                        .map(Entity::Item),
                ),
                EntityKind::Site => entities.extend(
                    self.query_sites(&format!("{SITE_SELECT_SQL}{filter}"), bind_values)?
                        .into_iter()
                        .map(Entity::Site),
                ),
                EntityKind::Bulletin => entities.extend(
                    self.query_bulletins(&format!("{BULLETIN_SELECT_SQL}{filter}"), bind_values)?
                        .into_iter()
                        .map(Entity::Bulletin),
                ),
            }
        }
        Ok(entities)
    }

    fn exists(&self, kind: EntityKind, id: i64, include_archived: bool) -> RepoResult<bool> {
        let found = self
            .conn
            .query_row(
                &format!(
                    "SELECT 1 FROM {} WHERE id = ?1 AND (?2 = 1 OR is_archived = 0);",
                    kind.table()
                ),
                params![id, bool_to_int(include_archived)],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn update_item(&self, item: &Item) -> RepoResult<()> {
        item.validate()?;

        let changed = self.conn.execute(
            "UPDATE items
             SET
                title = ?1,
                description = ?2,
                image_url = ?3,
                video_url = ?4,
                status = ?5,
                duration_secs = ?6,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?7;",
            params![
                item.title.as_str(),
                item.description.as_str(),
                item.image_url.as_deref(),
                item.video_url.as_deref(),
                item_status_to_db(item.status),
                item.duration_secs,
                item.id,
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound {
                kind: EntityKind::Item,
                id: item.id,
            });
        }
        Ok(())
    }

    fn update_site(&self, site: &Site) -> RepoResult<()> {
        site.validate()?;

        let changed = self
            .conn
            .execute(
                "UPDATE sites
                 SET
                    name = ?1,
                    address = ?2,
                    updated_at = (strftime('%s', 'now') * 1000)
                 WHERE id = ?3;",
                params![site.name.as_str(), site.address.as_str(), site.id],
            )
            .map_err(|err| map_unique(err, SITE_NAME_INDEX))?;

        if changed == 0 {
            return Err(RepoError::NotFound {
                kind: EntityKind::Site,
                id: site.id,
            });
        }
        Ok(())
    }

    fn update_bulletin(&self, bulletin: &Bulletin) -> RepoResult<()> {
        bulletin.validate()?;

        let changed = self.conn.execute(
            "UPDATE bulletins
             SET
                title = ?1,
                document_url = ?2,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?3;",
            params![
                bulletin.title.as_str(),
                bulletin.document_url.as_deref(),
                bulletin.id
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound {
                kind: EntityKind::Bulletin,
                id: bulletin.id,
            });
        }
        Ok(())
    }

    fn set_archived(&self, kind: EntityKind, id: i64, archived: bool) -> RepoResult<()> {
        let changed = self.conn.execute(
            &format!(
                "UPDATE {}
                 SET
                    is_archived = ?1,
                    updated_at = (strftime('%s', 'now') * 1000)
                 WHERE id = ?2;",
                kind.table()
            ),
            params![bool_to_int(archived), id],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound { kind, id });
        }
        Ok(())
    }

    fn hard_delete(&self, kind: EntityKind, id: i64) -> RepoResult<()> {
        let changed = self.conn.execute(
            &format!("DELETE FROM {} WHERE id = ?1;", kind.table()),
            [id],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound { kind, id });
        }
        Ok(())
    }

    fn list_items(&self, include_archived: bool) -> RepoResult<Vec<Item>> {
        self.query_items(
            &format!("{ITEM_SELECT_SQL} WHERE (?1 = 1 OR is_archived = 0) ORDER BY id ASC;"),
            vec![Value::Integer(bool_to_int(include_archived))],
        )
    }

    fn list_sites(&self, include_archived: bool) -> RepoResult<Vec<Site>> {
        self.query_sites(
            &format!("{SITE_SELECT_SQL} WHERE (?1 = 1 OR is_archived = 0) ORDER BY id ASC;"),
            vec![Value::Integer(bool_to_int(include_archived))],
        )
    }

    fn list_bulletins(&self, include_archived: bool) -> RepoResult<Vec<Bulletin>> {
        self.query_bulletins(
            &format!("{BULLETIN_SELECT_SQL} WHERE (?1 = 1 OR is_archived = 0) ORDER BY id ASC;"),
            vec![Value::Integer(bool_to_int(include_archived))],
        )
    }
}

fn map_unique(err: rusqlite::Error, index: &'static str) -> RepoError {
    if is_unique_violation(&err) {
        RepoError::UniqueViolation(index)
    } else {
        err.into()
    }
}

fn parse_item_row(row: &Row<'_>) -> RepoResult<Item> {
    let status_text: String = row.get("status")?;
    let status = parse_item_status(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid item status `{status_text}` in items.status"))
    })?;

    let item = Item {
        id: row.get("id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        image_url: row.get("image_url")?,
        video_url: row.get("video_url")?,
        status,
        duration_secs: row.get("duration_secs")?,
        is_archived: parse_flag(row.get("is_archived")?, "items.is_archived")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    };
    item.validate()?;
    Ok(item)
}

fn parse_site_row(row: &Row<'_>) -> RepoResult<Site> {
    Ok(Site {
        id: row.get("id")?,
        name: row.get("name")?,
        address: row.get("address")?,
        is_archived: parse_flag(row.get("is_archived")?, "sites.is_archived")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn parse_bulletin_row(row: &Row<'_>) -> RepoResult<Bulletin> {
    Ok(Bulletin {
        id: row.get("id")?,
        title: row.get("title")?,
        document_url: row.get("document_url")?,
        is_archived: parse_flag(row.get("is_archived")?, "bulletins.is_archived")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn item_status_to_db(status: ItemStatus) -> &'static str {
    match status {
        ItemStatus::Active => "active",
        ItemStatus::Inactive => "inactive",
    }
}

fn parse_item_status(value: &str) -> Option<ItemStatus> {
    match value {
        "active" => Some(ItemStatus::Active),
        "inactive" => Some(ItemStatus::Inactive),
        _ => None,
    }
}
