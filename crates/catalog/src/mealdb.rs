use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use shared::domain::{Category, RecipeId, RecipeRecord, RecipeSummary};
use tracing::debug;
use url::Url;

use crate::{
    raw::{CategoriesEnvelope, MealsEnvelope, RawMeal, RawMealSummary},
    CatalogError, RecipeCatalog,
};

pub const DEFAULT_MEALDB_URL: &str = "https://www.themealdb.com/api/json/v1/1";

/// TheMealDB HTTP adapter.
#[derive(Clone)]
pub struct MealDbCatalog {
    http: Client,
    base_url: Url,
}

impl MealDbCatalog {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build catalog http client")?;
        Self::with_client(http, base_url)
    }

    pub fn with_client(http: Client, base_url: &str) -> anyhow::Result<Self> {
        let mut base_url =
            Url::parse(base_url).with_context(|| format!("invalid catalog url '{base_url}'"))?;
        // Endpoints are joined relative to the last path segment.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
    ) -> Result<T, CatalogError> {
        let url = self
            .base_url
            .join(endpoint)
            .map_err(|e| CatalogError::Transient(format!("invalid endpoint {endpoint}: {e}")))?;
        debug!(%url, ?query, "catalog request");
        let response = self
            .http
            .get(url)
            .query(query)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json::<T>().await?)
    }

    async fn meals<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>, CatalogError> {
        let envelope: MealsEnvelope<T> = self.get_json(endpoint, query).await?;
        match envelope.meals {
            Some(meals) if !meals.is_empty() => Ok(meals),
            _ => Err(CatalogError::NotFound),
        }
    }

    async fn first_meal(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
    ) -> Result<RecipeRecord, CatalogError> {
        let meals: Vec<RawMeal> = self.meals(endpoint, query).await?;
        meals
            .into_iter()
            .next()
            .map(RecipeRecord::from)
            .ok_or(CatalogError::NotFound)
    }
}

#[async_trait]
impl RecipeCatalog for MealDbCatalog {
    async fn fetch_by_id(&self, id: &RecipeId) -> Result<RecipeRecord, CatalogError> {
        self.first_meal("lookup.php", &[("i", id.as_str())]).await
    }

    async fn fetch_random(&self) -> Result<RecipeRecord, CatalogError> {
        self.first_meal("random.php", &[]).await
    }

    async fn search(&self, query: &str) -> Result<Vec<RecipeRecord>, CatalogError> {
        let meals: Vec<RawMeal> = self.meals("search.php", &[("s", query)]).await?;
        Ok(meals.into_iter().map(RecipeRecord::from).collect())
    }

    async fn list_categories(&self) -> Result<Vec<Category>, CatalogError> {
        let envelope: CategoriesEnvelope = self.get_json("categories.php", &[]).await?;
        match envelope.categories {
            Some(categories) if !categories.is_empty() => {
                Ok(categories.into_iter().map(Category::from).collect())
            }
            _ => Err(CatalogError::NotFound),
        }
    }

    async fn list_by_category(
        &self,
        category: &str,
    ) -> Result<Vec<RecipeSummary>, CatalogError> {
        let meals: Vec<RawMealSummary> = self.meals("filter.php", &[("c", category)]).await?;
        Ok(meals.into_iter().map(RecipeSummary::from).collect())
    }
}
