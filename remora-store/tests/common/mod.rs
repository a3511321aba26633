//! Shared test helpers for store tests.

#![allow(dead_code)]

use remora_model::{FieldDescriptor, RecordSchema, SchemaRegistry};
use remora_store::{Repository, SaveOptions};
use serde_json::json;
use std::sync::Arc;

/// Registry with the post/user/hobby shapes the store tests work with.
pub fn registry() -> Arc<SchemaRegistry> {
    Arc::new(
        SchemaRegistry::new()
            .with(RecordSchema::new(
                "post",
                vec![
                    FieldDescriptor::scalar("title"),
                    FieldDescriptor::relation("user", "user"),
                    FieldDescriptor::relation_list("hobbies", "hobby"),
                    FieldDescriptor::relation_list("likes", "like").computed(),
                ],
            ))
            .with(RecordSchema::new(
                "user",
                vec![FieldDescriptor::scalar("name")],
            ))
            .with(RecordSchema::new(
                "hobby",
                vec![
                    FieldDescriptor::scalar("name"),
                    FieldDescriptor::scalar("postId"),
                ],
            ))
            .with(RecordSchema::new("like", vec![])),
    )
}

pub fn post_repo() -> Repository {
    Repository::new("post", registry()).unwrap()
}

pub fn user_repo() -> Repository {
    Repository::new("user", registry()).unwrap()
}

pub fn hobby_repo() -> Repository {
    Repository::new("hobby", registry()).unwrap()
}

/// Seeds three posts with ids 1..=3.
pub fn seed_posts(repo: &mut Repository) {
    repo.save(
        json!([
            {"id": 1, "title": "A Post"},
            {"id": 2, "title": "B Post"},
            {"id": 3, "title": "C Post"},
        ]),
        SaveOptions::default(),
    )
    .unwrap();
}
