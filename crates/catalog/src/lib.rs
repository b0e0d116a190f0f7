use async_trait::async_trait;
use shared::{
    domain::{Category, RecipeId, RecipeRecord, RecipeSummary},
    error::BotError,
};
use thiserror::Error;

mod mealdb;
mod raw;

pub use mealdb::{MealDbCatalog, DEFAULT_MEALDB_URL};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("catalog has no matching record")]
    NotFound,
    #[error("catalog request failed: {0}")]
    Transient(String),
}

impl From<reqwest::Error> for CatalogError {
    fn from(value: reqwest::Error) -> Self {
        CatalogError::Transient(value.to_string())
    }
}

impl From<CatalogError> for BotError {
    fn from(value: CatalogError) -> Self {
        match value {
            CatalogError::NotFound => BotError::not_found(value.to_string()),
            CatalogError::Transient(_) => BotError::transient(value.to_string()),
        }
    }
}

/// Read-only view of the external recipe catalog.
///
/// Implementations translate responses into domain records and nothing more:
/// no retries, truncation or formatting happen at this layer. An empty result
/// is reported as [`CatalogError::NotFound`].
#[async_trait]
pub trait RecipeCatalog: Send + Sync {
    async fn fetch_by_id(&self, id: &RecipeId) -> Result<RecipeRecord, CatalogError>;
    async fn fetch_random(&self) -> Result<RecipeRecord, CatalogError>;
    async fn search(&self, query: &str) -> Result<Vec<RecipeRecord>, CatalogError>;
    async fn list_categories(&self) -> Result<Vec<Category>, CatalogError>;
    async fn list_by_category(&self, category: &str)
        -> Result<Vec<RecipeSummary>, CatalogError>;
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
