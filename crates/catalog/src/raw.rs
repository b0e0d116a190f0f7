use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;
use shared::domain::{Category, Ingredient, RecipeId, RecipeRecord, RecipeSummary};

const INGREDIENT_SLOTS: usize = 20;

#[derive(Debug, Deserialize)]
pub(crate) struct MealsEnvelope<T> {
    pub(crate) meals: Option<Vec<T>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CategoriesEnvelope {
    #[serde(default)]
    pub(crate) categories: Option<Vec<RawCategory>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawCategory {
    #[serde(rename = "strCategory")]
    name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawMeal {
    #[serde(rename = "idMeal")]
    id: String,
    #[serde(rename = "strMeal")]
    name: String,
    #[serde(rename = "strCategory", default)]
    category: Option<String>,
    #[serde(rename = "strArea", default)]
    area: Option<String>,
    #[serde(rename = "strMealThumb", default)]
    thumbnail: Option<String>,
    #[serde(rename = "strInstructions", default)]
    instructions: Option<String>,
    #[serde(rename = "strYoutube", default)]
    youtube: Option<String>,
    /// `strIngredientN` / `strMeasureN` columns.
    #[serde(flatten)]
    slots: HashMap<String, Value>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawMealSummary {
    #[serde(rename = "idMeal")]
    id: String,
    #[serde(rename = "strMeal")]
    name: String,
    #[serde(rename = "strMealThumb", default)]
    thumbnail: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl RawMeal {
    fn slot(&self, key: &str) -> Option<&str> {
        self.slots.get(key).and_then(Value::as_str)
    }

    fn ingredients(&self) -> Vec<Ingredient> {
        (1..=INGREDIENT_SLOTS)
            .filter_map(|n| {
                let name = self.slot(&format!("strIngredient{n}"))?.trim();
                if name.is_empty() {
                    return None;
                }
                let measure = self
                    .slot(&format!("strMeasure{n}"))
                    .map(str::trim)
                    .unwrap_or_default();
                Some(Ingredient {
                    name: name.to_string(),
                    measure: measure.to_string(),
                })
            })
            .collect()
    }
}

impl From<RawMeal> for RecipeRecord {
    fn from(raw: RawMeal) -> Self {
        let ingredients = raw.ingredients();
        RecipeRecord {
            id: RecipeId(raw.id),
            name: raw.name,
            category: raw.category.unwrap_or_default(),
            area: raw.area.unwrap_or_default(),
            image: non_blank(raw.thumbnail),
            ingredients,
            instructions: raw.instructions.unwrap_or_default(),
            video: non_blank(raw.youtube),
        }
    }
}

impl From<RawMealSummary> for RecipeSummary {
    fn from(raw: RawMealSummary) -> Self {
        RecipeSummary {
            id: RecipeId(raw.id),
            name: raw.name,
            thumbnail: non_blank(raw.thumbnail),
        }
    }
}

impl From<RawCategory> for Category {
    fn from(raw: RawCategory) -> Self {
        Category { name: raw.name }
    }
}
