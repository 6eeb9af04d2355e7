//! Shared fixtures: a seeded catalog over in-memory backends.
#![allow(dead_code)]

use lectern::cache::MemoryCacheStore;
use lectern::config::Config;
use lectern::delivery::{DeliveryService, DeliverySettings};
use lectern::model::{Course, Lecture, Module, VideoContent};
use lectern::server::{router, state::AppState};
use lectern::storage::{MemoryStorage, ObjectStorage};
use lectern::store::MemoryStore;
use std::collections::HashMap;
use std::sync::Arc;

pub const PAID_COURSE: &str = "rust-101";
pub const FREE_COURSE: &str = "free-course";

/// Object that the catalog references but storage never received.
pub const MISSING_OBJECT_LECTURE: &str = "lifetimes";

fn lecture(id: &str, is_preview: bool, key: Option<&str>) -> Lecture {
    Lecture {
        id: id.to_string(),
        title: format!("Lecture {id}"),
        is_preview,
        order: 0,
        video_content: key.map(|key| VideoContent {
            r2_key: Some(key.to_string()),
            url: None,
        }),
    }
}

/// Paid course:
/// - m0: `intro`, `ownership`
/// - m1: `traits` (preview), `lifetimes` (object missing), `macros` (no video)
pub fn paid_course() -> Course {
    Course {
        id: PAID_COURSE.to_string(),
        title: "Rust 101".to_string(),
        is_free: false,
        price: 49.0,
        modules: vec![
            Module {
                id: "m0".to_string(),
                title: "Getting started".to_string(),
                lectures: vec![
                    lecture("intro", false, Some("videos/rust-101/intro.mp4")),
                    lecture("ownership", false, Some("videos/rust-101/ownership.mp4")),
                ],
            },
            Module {
                id: "m1".to_string(),
                title: "Going further".to_string(),
                lectures: vec![
                    lecture("traits", true, Some("videos/rust-101/traits.mp4")),
                    lecture(
                        MISSING_OBJECT_LECTURE,
                        false,
                        Some("videos/rust-101/lifetimes.mp4"),
                    ),
                    lecture("macros", false, None),
                ],
            },
        ],
    }
}

/// Free course with two plain lectures, `l0` and `l1`.
pub fn free_course() -> Course {
    Course {
        id: FREE_COURSE.to_string(),
        title: "Intro to Cargo".to_string(),
        is_free: true,
        price: 0.0,
        modules: vec![Module {
            id: "m0".to_string(),
            title: "Basics".to_string(),
            lectures: vec![
                lecture("l0", false, Some("videos/free/l0.mp4")),
                lecture("l1", false, Some("videos/free/l1.mp4")),
            ],
        }],
    }
}

pub fn seeded_store() -> MemoryStore {
    let store = MemoryStore::new();
    store.upsert_course(paid_course());
    store.upsert_course(free_course());
    store
}

pub async fn seeded_storage() -> Arc<MemoryStorage> {
    let storage = Arc::new(MemoryStorage::new("https://media.example.com").unwrap());
    for key in [
        "videos/rust-101/intro.mp4",
        "videos/rust-101/ownership.mp4",
        "videos/rust-101/traits.mp4",
        "videos/free/l0.mp4",
        "videos/free/l1.mp4",
    ] {
        storage
            .put_object(key, vec![0; 16], "video/mp4", HashMap::new())
            .await
            .unwrap();
    }
    storage
}

pub struct Harness {
    pub service: DeliveryService,
    pub store: MemoryStore,
    pub storage: Arc<MemoryStorage>,
}

pub async fn harness(settings: DeliverySettings) -> Harness {
    let store = seeded_store();
    let storage = seeded_storage().await;
    let service = DeliveryService::new(
        Arc::new(store.clone()),
        storage.clone(),
        Arc::new(MemoryCacheStore::new()),
        settings,
    );
    Harness {
        service,
        store,
        storage,
    }
}

pub const INTERNAL_TOKEN: &str = "internal-test-token";

/// Dev config with rate limiting off unless a test turns it on.
pub fn test_config() -> Config {
    Config {
        port: 0,
        rate_limit_max_requests: 0,
        internal_api_token: Some(INTERNAL_TOKEN.to_string()),
        ..Config::dev()
    }
}

/// Router over the seeded backends, plus the store for arranging records.
pub async fn test_app(config: Config) -> (axum::Router, MemoryStore) {
    let store = seeded_store();
    let storage = seeded_storage().await;
    let state = AppState::with_backends(
        config,
        Arc::new(store.clone()),
        storage.clone(),
        Arc::new(MemoryCacheStore::new()),
    )
    .with_media(storage.as_ref().clone());
    (router(state), store)
}
