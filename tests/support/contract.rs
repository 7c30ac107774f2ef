//! Behaviour every driver has to show, written once against the trait and
//! run by each driver's test file.

use futures::TryStreamExt;
use object_storage_drivers::{ByteRange, ObjectStorage, StorageError};
use std::collections::HashSet;
use tokio::io::AsyncReadExt;

use super::{hundred_bytes, key, reader};

pub async fn read(storage: &dyn ObjectStorage, name: &str, range: ByteRange) -> Vec<u8> {
    let mut reader = storage.get(&key(name), range).await.unwrap();
    let mut buf = Vec::new();
    reader.read_to_end(&mut buf).await.unwrap();
    buf
}

pub async fn put(storage: &dyn ObjectStorage, name: &str, data: impl Into<Vec<u8>>) {
    storage.put(&key(name), reader(data)).await.unwrap();
}

pub async fn create_is_idempotent(storage: &dyn ObjectStorage) {
    storage.create().await.unwrap();
    storage.create().await.unwrap();
}

pub async fn empty_container_lists_nothing(storage: &dyn ObjectStorage) {
    let objects = storage.list("", "", 100).await.unwrap();
    assert!(objects.is_empty());
}

/// Walks the listing with the previous page's last key as the marker
pub async fn list_continuation_yields_each_object_once(
    storage: &dyn ObjectStorage,
    count: usize,
    page_size: usize,
) {
    let mut expected = Vec::new();
    for i in 0..count {
        let name = format!("pages/{:03}", i);
        put(storage, &name, vec![b'x'; i + 1]).await;
        expected.push(name);
    }
    // Outside the prefix, must never show up
    put(storage, "other/000", "noise").await;

    let mut seen = Vec::new();
    let mut marker = String::new();
    let mut calls = 0;
    loop {
        let page = storage.list("pages/", &marker, page_size).await.unwrap();
        calls += 1;
        assert!(calls <= count + 2, "listing does not terminate");
        assert!(page.len() <= page_size);
        let Some(last) = page.last() else {
            break;
        };
        marker = last.key.clone();
        seen.extend(page.into_iter().map(|o| o.key));
    }

    assert_eq!(seen, expected);
    let unique: HashSet<_> = seen.iter().collect();
    assert_eq!(unique.len(), count);

    let stale = storage.list("pages/", "pages/999", page_size).await.unwrap();
    assert!(stale.is_empty());
}

pub async fn independent_listings_do_not_interfere(storage: &dyn ObjectStorage) {
    for i in 0..5 {
        put(storage, &format!("walk/{}", i), "x").await;
    }

    let mut first = storage.start_listing("walk/", 2);
    let mut second = storage.start_listing("walk/", 2);

    let a = first.next_page().await.unwrap().unwrap();
    let b = second.next_page().await.unwrap().unwrap();
    assert_eq!(a.len(), 2);
    assert_eq!(
        a.iter().map(|o| &o.key).collect::<Vec<_>>(),
        b.iter().map(|o| &o.key).collect::<Vec<_>>()
    );

    let rest = first.collect_all().await.unwrap();
    assert_eq!(rest.len(), 3);

    let streamed: Vec<_> = storage
        .start_listing("walk/", 2)
        .into_stream()
        .map_ok(|o| o.key)
        .try_collect()
        .await
        .unwrap();
    assert_eq!(streamed, vec!["walk/0", "walk/1", "walk/2", "walk/3", "walk/4"]);
}

pub async fn range_reads_are_exact(storage: &dyn ObjectStorage) {
    let data = hundred_bytes();
    put(storage, "ranged", data.clone()).await;

    assert_eq!(read(storage, "ranged", ByteRange::new(5, 10)).await, data[5..15]);
    assert_eq!(read(storage, "ranged", ByteRange::new(95, 0)).await, data[95..]);
    assert_eq!(read(storage, "ranged", ByteRange::full()).await, data);
    // Past the end is clamped
    assert_eq!(read(storage, "ranged", ByteRange::new(90, 50)).await, data[90..]);

    let err = storage
        .get(&key("ranged"), ByteRange::new(100, 1))
        .await
        .err()
        .unwrap();
    assert!(matches!(err, StorageError::RangeNotSatisfiable { .. }));
}

pub async fn deleted_objects_are_gone(storage: &dyn ObjectStorage) {
    put(storage, "doomed", "bye").await;
    storage.exists(&key("doomed")).await.unwrap();
    storage.delete(&key("doomed")).await.unwrap();

    let err = storage
        .get(&key("doomed"), ByteRange::full())
        .await
        .err()
        .unwrap();
    assert!(err.is_not_found());
    assert!(storage.exists(&key("doomed")).await.unwrap_err().is_not_found());
    assert!(storage.delete(&key("doomed")).await.unwrap_err().is_not_found());
}

pub async fn copy_preserves_content(storage: &dyn ObjectStorage) {
    put(storage, "original", hundred_bytes()).await;
    let before = read(storage, "original", ByteRange::full()).await;

    storage.copy(&key("duplicate"), &key("original")).await.unwrap();

    assert_eq!(read(storage, "duplicate", ByteRange::full()).await, before);
    assert_eq!(read(storage, "original", ByteRange::full()).await, before);

    let err = storage
        .copy(&key("nowhere"), &key("missing"))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

pub async fn overwrite_replaces_whole_object(storage: &dyn ObjectStorage) {
    put(storage, "replaced", vec![b'a'; 64]).await;
    put(storage, "replaced", "short").await;

    assert_eq!(read(storage, "replaced", ByteRange::full()).await, b"short");
}

pub async fn listed_objects_carry_sizes(storage: &dyn ObjectStorage) {
    put(storage, "sized/a", vec![0u8; 3]).await;
    put(storage, "sized/b", vec![0u8; 7]).await;

    let objects = storage.list("sized/", "", 10).await.unwrap();
    let sizes: Vec<_> = objects.iter().map(|o| (o.key.as_str(), o.size)).collect();
    assert_eq!(sizes, vec![("sized/a", 3), ("sized/b", 7)]);
    assert!(objects.iter().all(|o| o.mtime > 0));
}

pub async fn special_character_keys_round_trip(storage: &dyn ObjectStorage) {
    put(storage, "dir/a~b#1", "special").await;
    put(storage, "dir/plain", "plain").await;

    let listed: Vec<_> = storage
        .list("", "", 10)
        .await
        .unwrap()
        .into_iter()
        .map(|o| o.key)
        .collect();
    assert_eq!(listed, vec!["dir/a~b#1", "dir/plain"]);

    let narrowed = storage.list("dir/a~", "", 10).await.unwrap();
    assert_eq!(narrowed.len(), 1);
    assert_eq!(narrowed[0].key, "dir/a~b#1");

    assert_eq!(
        read(storage, &narrowed[0].key, ByteRange::full()).await,
        b"special"
    );
}
