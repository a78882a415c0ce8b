//! File-backed gateway behaviour.

use chrono::NaiveDate;
use levelmirror_model::{CatalogRecord, ExternalId, ScreenImage, ZipFileInfo};
use levelmirror_store::{Relation, SqliteGateway, StoreError};
use tempfile::tempdir;

fn level(id: u64) -> CatalogRecord {
    CatalogRecord::new(
        id,
        format!("Level {id}"),
        "TR4",
        NaiveDate::from_ymd_opt(2023, 5, 1).unwrap(),
    )
    .with_author("Lara")
    .with_genre("Tomb")
}

#[test]
fn reopen_keeps_records() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("mirror.db");

    {
        let gateway = SqliteGateway::open(&path).unwrap();
        gateway
            .transaction(|tx| {
                tx.insert_record(&level(1))?;
                tx.insert_record(&level(2))
            })
            .unwrap();
    }

    let gateway = SqliteGateway::open(&path).unwrap();
    assert_eq!(gateway.record_count().unwrap(), 2);
    assert_eq!(gateway.find_record(ExternalId(2)).unwrap().unwrap().1, level(2));
}

#[test]
fn delete_cleans_every_relation() {
    let dir = tempdir().unwrap();
    let gateway = SqliteGateway::open(dir.path().join("mirror.db")).unwrap();
    let zip = ZipFileInfo {
        name: "1-Level.zip".into(),
        size_mib: 12.5,
        md5: "0cc175b9c0f1b6a831c399e269772661".into(),
        url: "https://www.trle.net/levels/1-Level.zip".into(),
        release: None,
        version: Some("1.1".into()),
    };
    let screen = ScreenImage {
        md5: "92eb5ffee6ae2fec3ad71c777531578f".into(),
        data: vec![0xFF, 0xD8, 0xFF],
    };

    gateway
        .transaction(|tx| {
            let key = tx.insert_record(&level(1))?;
            tx.upsert_zip(&zip)?;
            tx.add_relation(key, Relation::ZipFile, &zip.md5)?;
            tx.upsert_screen(&screen)?;
            tx.add_relation(key, Relation::Screen, &screen.md5)?;
            Ok::<_, StoreError>(())
        })
        .unwrap();

    assert!(gateway
        .transaction(|tx| tx.delete_record(ExternalId(1)))
        .unwrap());

    // Every orphaned lookup row is gone: re-linking a content row now fails.
    let key = gateway.transaction(|tx| tx.insert_record(&level(2))).unwrap();
    let err = gateway
        .transaction(|tx| tx.add_relation(key, Relation::ZipFile, &zip.md5))
        .unwrap_err();
    assert!(matches!(err, StoreError::MissingLookup { .. }));
    assert_eq!(gateway.record_count().unwrap(), 1);
}
