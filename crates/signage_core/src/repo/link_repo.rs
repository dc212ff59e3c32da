//! Link table contracts and SQLite implementation.
//!
//! # Responsibility
//! - Own every SQL statement that touches `item_sites` / `bulletin_sites`.
//! - Report unique-index rejections as a distinct insert outcome.
//!
//! # Invariants
//! - Rows are addressed through `LinkDirection`, so both sides of a
//!   relation share one code path.
//! - Link listings are ordered by `link_seq` (creation order).
//! - This layer does not validate endpoints; callers resolve them first.

use super::{ensure_tables_ready, id_batches, is_unique_violation, RepoError, RepoResult};
use crate::model::entity::{BulletinId, ItemId, SiteId};
use crate::model::link::{BulletinSiteLink, ItemSiteLink, LinkDirection, LinkRow, Relation};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::collections::BTreeSet;

/// Result of one link insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// The pair unique index rejected the row.
    Conflict,
}

/// Repository interface for link rows.
pub trait LinkRepository {
    /// Inserts one link. `play_duration_secs` is required for item/site
    /// links and ignored for bulletin/site links.
    fn insert_link(
        &self,
        direction: LinkDirection,
        anchor_id: i64,
        counterpart_id: i64,
        play_duration_secs: Option<i64>,
    ) -> RepoResult<InsertOutcome>;
    /// Deletes every link of `anchor_id` on this direction's relation.
    fn delete_all_for(&self, direction: LinkDirection, anchor_id: i64) -> RepoResult<usize>;
    /// Deletes the listed pairs; absent pairs are ignored.
    fn delete_pairs(
        &self,
        direction: LinkDirection,
        anchor_id: i64,
        counterpart_ids: &BTreeSet<i64>,
    ) -> RepoResult<usize>;
    /// Counterpart ids currently linked to `anchor_id`.
    fn linked_ids(&self, direction: LinkDirection, anchor_id: i64) -> RepoResult<BTreeSet<i64>>;
    /// Raw link rows of `anchor_id`, in creation order.
    fn list_links(&self, direction: LinkDirection, anchor_id: i64) -> RepoResult<Vec<LinkRow>>;
    fn get_item_site_link(
        &self,
        item_id: ItemId,
        site_id: SiteId,
    ) -> RepoResult<Option<ItemSiteLink>>;
    fn get_bulletin_site_link(
        &self,
        bulletin_id: BulletinId,
        site_id: SiteId,
    ) -> RepoResult<Option<BulletinSiteLink>>;
    /// Returns `false` when the pair does not exist.
    fn update_play_duration(
        &self,
        item_id: ItemId,
        site_id: SiteId,
        play_duration_secs: i64,
    ) -> RepoResult<bool>;
}

/// SQLite-backed link repository.
pub struct SqliteLinkRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteLinkRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_tables_ready(conn, &["item_sites", "bulletin_sites"])?;
        Ok(Self { conn })
    }
}

impl LinkRepository for SqliteLinkRepository<'_> {
    fn insert_link(
        &self,
        direction: LinkDirection,
        anchor_id: i64,
        counterpart_id: i64,
        play_duration_secs: Option<i64>,
    ) -> RepoResult<InsertOutcome> {
        let (owner_id, site_id) = direction.to_pair(anchor_id, counterpart_id);
        let result = match direction.relation() {
            Relation::ItemSite => {
                let duration = play_duration_secs.ok_or_else(|| {
                    RepoError::InvalidData(format!(
                        "item/site link ({owner_id}, {site_id}) requires a play duration"
                    ))
                })?;
                self.conn.execute(
                    "INSERT INTO item_sites (item_id, site_id, play_duration_secs)
                     VALUES (?1, ?2, ?3);",
                    params![owner_id, site_id, duration],
                )
            }
            Relation::BulletinSite => self.conn.execute(
                "INSERT INTO bulletin_sites (bulletin_id, site_id) VALUES (?1, ?2);",
                params![owner_id, site_id],
            ),
        };

        match result {
            Ok(_) => Ok(InsertOutcome::Inserted),
            Err(err) if is_unique_violation(&err) => Ok(InsertOutcome::Conflict),
            Err(err) => Err(err.into()),
        }
    }

    fn delete_all_for(&self, direction: LinkDirection, anchor_id: i64) -> RepoResult<usize> {
        let removed = self.conn.execute(
            &format!(
                "DELETE FROM {} WHERE {} = ?1;",
                direction.table(),
                direction.anchor_column()
            ),
            [anchor_id],
        )?;
        Ok(removed)
    }

    fn delete_pairs(
        &self,
        direction: LinkDirection,
        anchor_id: i64,
        counterpart_ids: &BTreeSet<i64>,
    ) -> RepoResult<usize> {
        let mut removed = 0;
        for batch in id_batches(counterpart_ids) {
            let placeholders = vec!["?"; batch.len()].join(", ");
            let sql = format!(
                "DELETE FROM {} WHERE {} = ? AND {} IN ({placeholders});",
                direction.table(),
                direction.anchor_column(),
                direction.counterpart_column()
            );
            let mut bind_values = vec![Value::Integer(anchor_id)];
            bind_values.extend(batch);

            removed += self.conn.execute(&sql, params_from_iter(bind_values))?;
        }
        Ok(removed)
    }

    fn linked_ids(&self, direction: LinkDirection, anchor_id: i64) -> RepoResult<BTreeSet<i64>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM {} WHERE {} = ?1;",
            direction.counterpart_column(),
            direction.table(),
            direction.anchor_column()
        ))?;
        let mut rows = stmt.query([anchor_id])?;
        let mut ids = BTreeSet::new();
        while let Some(row) = rows.next()? {
            ids.insert(row.get::<_, i64>(0)?);
        }
        Ok(ids)
    }

    fn list_links(&self, direction: LinkDirection, anchor_id: i64) -> RepoResult<Vec<LinkRow>> {
        let duration_column = if direction.carries_play_duration() {
            "play_duration_secs"
        } else {
            "NULL"
        };
        let mut stmt = self.conn.prepare(&format!(
            "SELECT
                {} AS counterpart_id,
                {duration_column} AS play_duration_secs,
                created_at
             FROM {}
             WHERE {} = ?1
             ORDER BY link_seq ASC;",
            direction.counterpart_column(),
            direction.table(),
            direction.anchor_column()
        ))?;
        let mut rows = stmt.query([anchor_id])?;
        let mut links = Vec::new();
        while let Some(row) = rows.next()? {
            links.push(LinkRow {
                counterpart_id: row.get("counterpart_id")?,
                play_duration_secs: row.get("play_duration_secs")?,
                created_at: row.get("created_at")?,
            });
        }
        Ok(links)
    }

    fn get_item_site_link(
        &self,
        item_id: ItemId,
        site_id: SiteId,
    ) -> RepoResult<Option<ItemSiteLink>> {
        let link = self
            .conn
            .query_row(
                "SELECT item_id, site_id, play_duration_secs, created_at
                 FROM item_sites
                 WHERE item_id = ?1 AND site_id = ?2;",
                params![item_id, site_id],
                |row| {
                    Ok(ItemSiteLink {
                        item_id: row.get("item_id")?,
                        site_id: row.get("site_id")?,
                        play_duration_secs: row.get("play_duration_secs")?,
                        created_at: row.get("created_at")?,
                    })
                },
            )
            .optional()?;
        Ok(link)
    }

    fn get_bulletin_site_link(
        &self,
        bulletin_id: BulletinId,
        site_id: SiteId,
    ) -> RepoResult<Option<BulletinSiteLink>> {
        let link = self
            .conn
            .query_row(
                "SELECT bulletin_id, site_id, created_at
                 FROM bulletin_sites
                 WHERE bulletin_id = ?1 AND site_id = ?2;",
                params![bulletin_id, site_id],
                |row| {
                    Ok(BulletinSiteLink {
                        bulletin_id: row.get("bulletin_id")?,
                        site_id: row.get("site_id")?,
                        created_at: row.get("created_at")?,
                    })
                },
            )
            .optional()?;
        Ok(link)
    }

    fn update_play_duration(
        &self,
        item_id: ItemId,
        site_id: SiteId,
        play_duration_secs: i64,
    ) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "UPDATE item_sites
             SET play_duration_secs = ?3
             WHERE item_id = ?1 AND site_id = ?2;",
            params![item_id, site_id, play_duration_secs],
        )?;
        Ok(changed > 0)
    }
}
