//! Data model shared by the client and the synchronizer.
//!
//! # Design
//! `Item`, `CreateItem` and `UpdateItem` mirror the mock-server's schema but
//! are defined independently; integration tests catch any schema drift.
//! `ItemKey` and `ListItem` never cross the wire. They describe the local
//! cache, where an entry may exist before the server has assigned it an id.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A single item as the server returns it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Item {
    pub id: i64,
    pub title: String,
    pub completed: bool,
}

/// Request payload for creating a new item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateItem {
    pub title: String,
    #[serde(default)]
    pub completed: bool,
}

/// Request payload for updating an existing item. Only the fields present in
/// the JSON are applied; omitted fields remain unchanged on the server.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

/// Identity of a cache entry.
///
/// `Placeholder` values are handed out by the synchronizer while a create is
/// in flight. They come from a counter, not from the server, so the two
/// spaces can never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKey {
    Server(i64),
    Placeholder(u64),
}

impl ItemKey {
    pub fn server_id(self) -> Option<i64> {
        match self {
            ItemKey::Server(id) => Some(id),
            ItemKey::Placeholder(_) => None,
        }
    }

    pub fn is_placeholder(self) -> bool {
        matches!(self, ItemKey::Placeholder(_))
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemKey::Server(id) => write!(f, "{id}"),
            ItemKey::Placeholder(n) => write!(f, "placeholder-{n}"),
        }
    }
}

/// One row of the cached list, as rendered by the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListItem {
    pub key: ItemKey,
    pub title: String,
    pub completed: bool,
}

impl From<Item> for ListItem {
    fn from(item: Item) -> Self {
        Self {
            key: ItemKey::Server(item.id),
            title: item.title,
            completed: item.completed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_item_omits_absent_fields() {
        let body = serde_json::to_value(UpdateItem {
            title: None,
            completed: Some(true),
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({ "completed": true }));
    }

    #[test]
    fn list_item_from_server_item_uses_server_key() {
        let row = ListItem::from(Item {
            id: 42,
            title: "Buy milk".to_string(),
            completed: false,
        });
        assert_eq!(row.key, ItemKey::Server(42));
        assert_eq!(row.key.server_id(), Some(42));
    }

    #[test]
    fn placeholder_key_has_no_server_id() {
        let key = ItemKey::Placeholder(3);
        assert!(key.is_placeholder());
        assert_eq!(key.server_id(), None);
        assert_eq!(key.to_string(), "placeholder-3");
    }
}
