use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{EntityKind, SyncEntity};

/// A planned set of recipes for one meal on one date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Menu {
    pub id: Uuid,
    pub date: NaiveDate,
    pub meal: String,
    pub title: String,
    pub recipe_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Menu {
    pub fn new(date: NaiveDate, meal: impl Into<String>, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            date,
            meal: meal.into(),
            title: title.into(),
            recipe_ids: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_recipes(mut self, recipe_ids: Vec<Uuid>) -> Self {
        self.recipe_ids = recipe_ids;
        self
    }
}

impl SyncEntity for Menu {
    const KIND: EntityKind = EntityKind::Menus;
    const INDEX_COLUMNS: &'static [&'static str] = &["menu_date"];

    fn id(&self) -> Uuid {
        self.id
    }

    fn updated_at(&self) -> Option<DateTime<Utc>> {
        Some(self.updated_at)
    }

    fn index_values(&self) -> Vec<Option<String>> {
        vec![Some(self.date.to_string())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_menu_new() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
        let menu = Menu::new(date, "dinner", "Soup Night");

        assert_eq!(menu.date, date);
        assert_eq!(menu.meal, "dinner");
        assert!(menu.recipe_ids.is_empty());
    }

    #[test]
    fn test_menu_index_on_date() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
        let menu = Menu::new(date, "dinner", "Soup Night");

        assert_eq!(menu.index_values(), vec![Some("2025-01-15".to_string())]);
    }

    #[test]
    fn test_menu_json_roundtrip() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
        let menu = Menu::new(date, "dinner", "Soup Night").with_recipes(vec![Uuid::new_v4()]);

        let json = serde_json::to_string(&menu).unwrap();
        let parsed: Menu = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.id, menu.id);
        assert_eq!(parsed.date, menu.date);
        assert_eq!(parsed.recipe_ids, menu.recipe_ids);
    }
}
