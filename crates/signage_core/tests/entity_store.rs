use signage_core::db::open_db_in_memory;
use signage_core::{
    BulletinDraft, EntityKind, EntityStore, ItemDraft, ItemStatus, RepoError, SiteDraft,
    SqliteEntityStore,
};
use std::collections::BTreeSet;

#[test]
fn insert_and_get_round_trip_all_three_kinds() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteEntityStore::try_new(&conn).unwrap();

    let mut draft = ItemDraft::new("Spring promo", 30);
    draft.video_url = Some("https://cdn.example.com/spring.mp4".to_string());
    let item = store.insert_item(&draft).unwrap();
    let site = store.insert_site(&SiteDraft::new("Lobby", "1 Main St")).unwrap();
    let bulletin = store
        .insert_bulletin(&BulletinDraft::new(
            "Fire drill",
            Some("docs/drill.pdf".to_string()),
        ))
        .unwrap();

    let loaded = store.get_item(item.id, false).unwrap().unwrap();
    assert_eq!(loaded, item);
    assert_eq!(loaded.status, ItemStatus::Active);
    assert_eq!(loaded.duration_secs, 30);
    assert!(loaded.created_at > 0);

    assert_eq!(store.get_site(site.id, false).unwrap().unwrap().name, "Lobby");
    assert_eq!(
        store
            .get_bulletin(bulletin.id, false)
            .unwrap()
            .unwrap()
            .document_url
            .as_deref(),
        Some("docs/drill.pdf")
    );
    assert!(store.exists(EntityKind::Site, site.id, false).unwrap());
    assert!(!store.exists(EntityKind::Site, 999, true).unwrap());
}

#[test]
fn insert_rejects_invalid_drafts_before_sql() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteEntityStore::try_new(&conn).unwrap();

    assert!(matches!(
        store.insert_item(&ItemDraft::new("promo", -5)),
        Err(RepoError::Validation(_))
    ));
    assert!(matches!(
        store.insert_site(&SiteDraft::new("  ", "")),
        Err(RepoError::Validation(_))
    ));
    assert!(store.list_items(true).unwrap().is_empty());
    assert!(store.list_sites(true).unwrap().is_empty());
}

#[test]
fn duplicate_site_name_maps_to_unique_violation() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteEntityStore::try_new(&conn).unwrap();

    store.insert_site(&SiteDraft::new("Lobby", "")).unwrap();
    let err = store.insert_site(&SiteDraft::new("Lobby", "elsewhere")).unwrap_err();

    assert!(matches!(err, RepoError::UniqueViolation("sites.name")));
}

#[test]
fn update_persists_patched_fields() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteEntityStore::try_new(&conn).unwrap();
    let mut item = store.insert_item(&ItemDraft::new("promo", 30)).unwrap();

    item.title = "promo v2".to_string();
    item.status = ItemStatus::Inactive;
    item.duration_secs = 45;
    store.update_item(&item).unwrap();

    let loaded = store.get_item(item.id, false).unwrap().unwrap();
    assert_eq!(loaded.title, "promo v2");
    assert_eq!(loaded.status, ItemStatus::Inactive);
    assert_eq!(loaded.duration_secs, 45);
}

#[test]
fn archived_rows_are_hidden_from_live_reads_until_restored() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteEntityStore::try_new(&conn).unwrap();
    let first = store.insert_site(&SiteDraft::new("Lobby", "")).unwrap();
    let second = store.insert_site(&SiteDraft::new("Cafe", "")).unwrap();

    store.set_archived(EntityKind::Site, first.id, true).unwrap();

    assert!(store.get_site(first.id, false).unwrap().is_none());
    assert!(store.get_site(first.id, true).unwrap().unwrap().is_archived);
    let ids: BTreeSet<i64> = [first.id, second.id].into_iter().collect();
    let live = store.get_many(EntityKind::Site, &ids).unwrap();
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].id(), second.id);
    assert_eq!(store.list_sites(false).unwrap().len(), 1);
    assert_eq!(store.list_sites(true).unwrap().len(), 2);

    store.set_archived(EntityKind::Site, first.id, false).unwrap();
    assert_eq!(store.get_many(EntityKind::Site, &ids).unwrap().len(), 2);
}

#[test]
fn get_many_orders_by_id_and_skips_unknown_ids() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteEntityStore::try_new(&conn).unwrap();
    let first = store.insert_item(&ItemDraft::new("a", 10)).unwrap();
    let second = store.insert_item(&ItemDraft::new("b", 20)).unwrap();

    let ids: BTreeSet<i64> = [second.id, 404, first.id].into_iter().collect();
    let found: Vec<i64> = store
        .get_many(EntityKind::Item, &ids)
        .unwrap()
        .iter()
        .map(|entity| entity.id())
        .collect();

    assert_eq!(found, vec![first.id, second.id]);
}

#[test]
fn get_many_accepts_id_sets_beyond_the_sql_variable_limit() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteEntityStore::try_new(&conn).unwrap();
    let first = store.insert_item(&ItemDraft::new("a", 10)).unwrap();
    let second = store.insert_item(&ItemDraft::new("b", 20)).unwrap();

    let mut ids: BTreeSet<i64> = (1_000..41_000).collect();
    ids.insert(first.id);
    ids.insert(second.id);
    let found: Vec<i64> = store
        .get_many(EntityKind::Item, &ids)
        .unwrap()
        .iter()
        .map(|entity| entity.id())
        .collect();

    assert_eq!(found, vec![first.id, second.id]);
}

#[test]
fn hard_delete_and_archive_of_missing_row_return_not_found() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteEntityStore::try_new(&conn).unwrap();

    assert!(matches!(
        store.hard_delete(EntityKind::Bulletin, 77),
        Err(RepoError::NotFound {
            kind: EntityKind::Bulletin,
            id: 77
        })
    ));
    assert!(matches!(
        store.set_archived(EntityKind::Item, 78, true),
        Err(RepoError::NotFound {
            kind: EntityKind::Item,
            id: 78
        })
    ));
}
