use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{EntityKind, SyncEntity};

/// An item on hand in the household pantry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PantryItem {
    pub id: Uuid,
    pub name: String,
    pub category: Option<String>,
    pub quantity: f64,
    pub unit: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PantryItem {
    pub fn new(name: impl Into<String>, quantity: f64, unit: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            category: None,
            quantity,
            unit: unit.into(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

impl SyncEntity for PantryItem {
    const KIND: EntityKind = EntityKind::PantryItems;
    const INDEX_COLUMNS: &'static [&'static str] = &["category"];

    fn id(&self) -> Uuid {
        self.id
    }

    fn updated_at(&self) -> Option<DateTime<Utc>> {
        Some(self.updated_at)
    }

    fn index_values(&self) -> Vec<Option<String>> {
        vec![self.category.clone()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pantry_item_new() {
        let item = PantryItem::new("Flour", 2.0, "kg");

        assert_eq!(item.name, "Flour");
        assert_eq!(item.quantity, 2.0);
        assert_eq!(item.unit, "kg");
        assert!(item.category.is_none());
    }

    #[test]
    fn test_pantry_item_json_roundtrip() {
        let item = PantryItem::new("Flour", 2.0, "kg").with_category("baking");

        let json = serde_json::to_string(&item).unwrap();
        let parsed: PantryItem = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.id, item.id);
        assert_eq!(parsed.category.as_deref(), Some("baking"));
    }
}
