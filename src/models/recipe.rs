use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{EntityKind, SyncEntity};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipe {
    pub id: Uuid,
    pub title: String,
    pub instructions: String,
    pub category: Option<String>,
    pub servings: Option<i32>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Recipe {
    pub fn new(title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            instructions: String::new(),
            category: None,
            servings: None,
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }
}

impl SyncEntity for Recipe {
    const KIND: EntityKind = EntityKind::Recipes;
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
    fn test_recipe_new() {
        let recipe = Recipe::new("Tomato Soup");

        assert_eq!(recipe.title, "Tomato Soup");
        assert!(recipe.category.is_none());
        assert!(recipe.tags.is_empty());
        assert_eq!(recipe.created_at, recipe.updated_at);
    }

    #[test]
    fn test_recipe_with_category() {
        let recipe = Recipe::new("Tomato Soup").with_category("soups");
        assert_eq!(recipe.category.as_deref(), Some("soups"));
        assert_eq!(recipe.index_values(), vec![Some("soups".to_string())]);
    }

    #[test]
    fn test_recipe_json_roundtrip() {
        let recipe = Recipe::new("Tomato Soup")
            .with_category("soups")
            .with_instructions("Simmer the tomatoes, then blend.")
            .with_tags(vec!["vegetarian".to_string()]);

        let json = serde_json::to_string(&recipe).unwrap();
        let parsed: Recipe = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.id, recipe.id);
        assert_eq!(parsed.title, recipe.title);
        assert_eq!(parsed.instructions, "Simmer the tomatoes, then blend.");
        assert_eq!(parsed.tags, recipe.tags);
    }
}
