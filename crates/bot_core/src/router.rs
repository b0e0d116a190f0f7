use std::sync::Arc;

use catalog::{CatalogError, RecipeCatalog};
use shared::{
    domain::{FavoriteEntry, RecipeId, RecipeRecord, UserId},
    error::{BotError, ErrorCode},
    protocol::{Action, RecipeView},
};
use storage::{AddOutcome, FavoritesStore, StoreError};
use tracing::{debug, error, info, warn};

use crate::screens::{self, Screen, ScreenLimits};

pub const DEFAULT_GREETINGS: &[&str] = &["hello", "привет"];

const STORE_UNAVAILABLE: &str = "❌ Something went wrong. Please try again later.";

/// Output of one inbound event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    pub notice: Option<String>,
    pub screen: Option<Screen>,
}

impl Reply {
    pub fn screen(screen: Screen) -> Self {
        Self {
            notice: None,
            screen: Some(screen),
        }
    }

    pub fn notice(notice: impl Into<String>) -> Self {
        Self {
            notice: Some(notice.into()),
            screen: None,
        }
    }

    pub fn with_notice(mut self, notice: impl Into<String>) -> Self {
        self.notice = Some(notice.into());
        self
    }
}

/// Routes action tokens and free text to the store, the catalog and the
/// screen builders. Every failure is folded into the returned [`Reply`].
#[derive(Clone)]
pub struct ActionRouter {
    store: FavoritesStore,
    catalog: Arc<dyn RecipeCatalog>,
    limits: ScreenLimits,
    greetings: Vec<String>,
}

impl ActionRouter {
    pub fn new(store: FavoritesStore, catalog: Arc<dyn RecipeCatalog>) -> Self {
        Self {
            store,
            catalog,
            limits: ScreenLimits::default(),
            greetings: DEFAULT_GREETINGS.iter().map(|g| g.to_string()).collect(),
        }
    }

    pub fn with_greetings(mut self, greetings: Vec<String>) -> Self {
        self.greetings = greetings
            .into_iter()
            .map(|g| g.trim().to_lowercase())
            .filter(|g| !g.is_empty())
            .collect();
        self
    }

    pub fn store(&self) -> &FavoritesStore {
        &self.store
    }

    pub async fn handle_action(&self, user_id: UserId, token: &str) -> Reply {
        match Action::decode(token) {
            Ok(action) => self.dispatch(user_id, action).await,
            Err(err) => {
                warn!(user_id = %user_id, token, error = %err, "rejected action token");
                notice_for(&BotError::from(err))
            }
        }
    }

    pub async fn dispatch(&self, user_id: UserId, action: Action) -> Reply {
        debug!(user_id = %user_id, action = %action, "dispatching action");
        match action {
            Action::OpenMainMenu => Reply::screen(screens::main_menu()),
            Action::OpenSearchMenu => Reply::screen(screens::search_menu()),
            Action::OpenSearchByName => Reply::screen(screens::search_prompt()),
            Action::OpenFavorites => self.favorites(user_id).await,
            Action::RandomRecipe => self.random(user_id).await,
            Action::OpenCategories => self.categories().await,
            Action::Category { name } => self.category(&name).await,
            Action::ViewRecipe { recipe_id } | Action::SelectRecipe { recipe_id } => {
                self.detail(user_id, &recipe_id).await
            }
            Action::Favorite { recipe_id, view } => self.favorite(user_id, &recipe_id, view).await,
            Action::Unfavorite { recipe_id, view } => {
                self.unfavorite(user_id, &recipe_id, view).await
            }
            Action::RatePrompt { recipe_id } => self.rate_prompt(user_id, &recipe_id).await,
            Action::SetRating { recipe_id, rating } => {
                self.set_rating(user_id, &recipe_id, rating).await
            }
        }
    }

    /// Free text: commands, greetings, otherwise a search by name.
    pub async fn handle_text(
        &self,
        user_id: UserId,
        display_name: Option<&str>,
        text: &str,
    ) -> Reply {
        let text = text.trim();
        if text.is_empty() {
            return Reply::screen(screens::search_prompt());
        }

        if let Some(command) = text.strip_prefix('/') {
            let command = command.split_whitespace().next().unwrap_or_default();
            // Group chats address commands as `/start@botname`.
            let command = command.split('@').next().unwrap_or_default();
            return match command {
                "start" => Reply::screen(screens::welcome(display_name)),
                "test" => self.health_notice().await,
                _ => Reply::screen(screens::main_menu())
                    .with_notice("🤔 Unknown command. Use the menu below."),
            };
        }

        if self.is_greeting(text) {
            debug!(user_id = %user_id, "greeting received");
            let name = display_name.map(str::trim).filter(|n| !n.is_empty());
            return Reply::notice(match name {
                Some(name) => format!("Hello, {name}! 👋 Send /start to open the menu."),
                None => "Hello! 👋 Send /start to open the menu.".to_string(),
            });
        }

        self.search(user_id, text).await
    }

    fn is_greeting(&self, text: &str) -> bool {
        let lowered = text.to_lowercase();
        self.greetings.iter().any(|g| lowered.contains(g.as_str()))
    }

    async fn health_notice(&self) -> Reply {
        match self.store.health_check().await {
            Ok(()) => Reply::notice("✅ Bot is running. Favorites database is reachable."),
            Err(err) => {
                error!(error = %err, "store health check failed");
                Reply::notice("❌ Favorites database is unavailable.")
            }
        }
    }

    async fn search(&self, user_id: UserId, query: &str) -> Reply {
        info!(user_id = %user_id, query, "searching recipes by name");
        match self.catalog.search(query).await {
            Ok(recipes) => Reply::screen(screens::search_results(query, &recipes, &self.limits)),
            Err(err) => catalog_failure(err, screens::search_not_found(query), Action::OpenSearchByName),
        }
    }

    async fn favorites(&self, user_id: UserId) -> Reply {
        match self.store.list(user_id).await {
            Ok(entries) => Reply::screen(screens::favorites(&entries, &self.limits)),
            Err(err) => store_failure(user_id, err),
        }
    }

    async fn random(&self, user_id: UserId) -> Reply {
        let recipe = match self.catalog.fetch_random().await {
            Ok(recipe) => recipe,
            Err(err) => {
                return catalog_failure(err, screens::random_not_found(), Action::RandomRecipe)
            }
        };
        match self.store.get(user_id, &recipe.id).await {
            Ok(entry) => Reply::screen(screens::random_recipe(
                &recipe,
                entry.as_ref(),
                &self.limits,
            )),
            Err(err) => store_failure(user_id, err),
        }
    }

    async fn categories(&self) -> Reply {
        match self.catalog.list_categories().await {
            Ok(categories) => Reply::screen(screens::category_list(&categories)),
            Err(err) => catalog_failure(err, screens::categories_not_found(), Action::OpenCategories),
        }
    }

    async fn category(&self, name: &str) -> Reply {
        match self.catalog.list_by_category(name).await {
            Ok(recipes) => Reply::screen(screens::category_results(name, &recipes, &self.limits)),
            Err(err) => catalog_failure(
                err,
                screens::category_not_found(name),
                Action::Category {
                    name: name.to_string(),
                },
            ),
        }
    }

    async fn fetch(&self, recipe_id: &RecipeId) -> Result<RecipeRecord, Reply> {
        self.catalog.fetch_by_id(recipe_id).await.map_err(|err| {
            catalog_failure(
                err,
                screens::recipe_not_found(),
                Action::ViewRecipe {
                    recipe_id: recipe_id.clone(),
                },
            )
        })
    }

    async fn lookup(
        &self,
        user_id: UserId,
        recipe_id: &RecipeId,
    ) -> Result<Option<FavoriteEntry>, Reply> {
        self.store
            .get(user_id, recipe_id)
            .await
            .map_err(|err| store_failure(user_id, err))
    }

    fn recipe_screen(
        &self,
        view: RecipeView,
        recipe: &RecipeRecord,
        entry: Option<&FavoriteEntry>,
    ) -> Screen {
        match view {
            RecipeView::Detail => screens::recipe_detail(recipe, entry, &self.limits),
            RecipeView::Random => screens::random_recipe(recipe, entry, &self.limits),
        }
    }

    async fn view_screen(
        &self,
        user_id: UserId,
        recipe_id: &RecipeId,
        view: RecipeView,
    ) -> Result<Screen, Reply> {
        let recipe = self.fetch(recipe_id).await?;
        let entry = self.lookup(user_id, recipe_id).await?;
        Ok(self.recipe_screen(view, &recipe, entry.as_ref()))
    }

    async fn detail(&self, user_id: UserId, recipe_id: &RecipeId) -> Reply {
        self.view_screen(user_id, recipe_id, RecipeView::Detail)
            .await
            .map_or_else(|reply| reply, Reply::screen)
    }

    async fn favorite(&self, user_id: UserId, recipe_id: &RecipeId, view: RecipeView) -> Reply {
        let recipe = match self.fetch(recipe_id).await {
            Ok(recipe) => recipe,
            Err(reply) => return reply,
        };
        let notice = match self.store.add(user_id, &recipe).await {
            Ok(AddOutcome::Added) => {
                info!(user_id = %user_id, recipe_id = %recipe_id, "favorite added");
                "✅ Added to favorites!"
            }
            Ok(AddOutcome::AlreadyExists) => "ℹ️ This recipe is already in your favorites.",
            Err(err) => return store_failure(user_id, err),
        };
        match self.lookup(user_id, recipe_id).await {
            Ok(entry) => {
                Reply::screen(self.recipe_screen(view, &recipe, entry.as_ref())).with_notice(notice)
            }
            Err(reply) => reply,
        }
    }

    async fn unfavorite(&self, user_id: UserId, recipe_id: &RecipeId, view: RecipeView) -> Reply {
        let notice = match self.store.remove(user_id, recipe_id).await {
            Ok(true) => {
                info!(user_id = %user_id, recipe_id = %recipe_id, "favorite removed");
                "🗑️ Removed from favorites."
            }
            Ok(false) => "ℹ️ This recipe is not in your favorites.",
            Err(err) => return store_failure(user_id, err),
        };
        match self.view_screen(user_id, recipe_id, view).await {
            Ok(screen) => Reply::screen(screen).with_notice(notice),
            // The removal already happened; still confirm it.
            Err(reply) => reply.with_notice(notice),
        }
    }

    async fn rate_prompt(&self, user_id: UserId, recipe_id: &RecipeId) -> Reply {
        match self.store.get(user_id, recipe_id).await {
            Ok(Some(entry)) => Reply::screen(screens::rating_prompt(&entry)),
            Ok(None) => notice_for(&BotError::from(StoreError::NotFavorited {
                user_id,
                recipe_id: recipe_id.clone(),
            })),
            Err(err) => store_failure(user_id, err),
        }
    }

    async fn set_rating(&self, user_id: UserId, recipe_id: &RecipeId, rating: i64) -> Reply {
        let rating = match self.store.set_rating(user_id, recipe_id, rating).await {
            Ok(rating) => rating,
            Err(err) => return store_failure(user_id, err),
        };
        info!(user_id = %user_id, recipe_id = %recipe_id, rating = rating.value(), "rating saved");

        let notice = format!("✅ Rating {} saved!", rating.stars());
        match self
            .view_screen(user_id, recipe_id, RecipeView::Detail)
            .await
        {
            Ok(screen) => Reply::screen(screen).with_notice(notice),
            Err(reply) => reply.with_notice(notice),
        }
    }
}

fn notice_for(err: &BotError) -> Reply {
    Reply::notice(match err.code {
        ErrorCode::NotFavorited => "❌ Add the recipe to your favorites first.",
        ErrorCode::Validation => "❌ Invalid request. Please use the buttons.",
        ErrorCode::NotFound => "❌ Not found.",
        ErrorCode::TransientFailure => STORE_UNAVAILABLE,
    })
}

fn store_failure(user_id: UserId, err: StoreError) -> Reply {
    let err = BotError::from(err);
    if err.code == ErrorCode::TransientFailure {
        error!(user_id = %user_id, error = %err, "favorites store failure");
    } else {
        debug!(user_id = %user_id, error = %err, "favorites request rejected");
    }
    notice_for(&err)
}

fn catalog_failure(err: CatalogError, not_found: Screen, retry: Action) -> Reply {
    match err {
        CatalogError::NotFound => Reply::screen(not_found),
        CatalogError::Transient(reason) => {
            warn!(error = %reason, retry = %retry, "recipe catalog unavailable");
            Reply::screen(screens::service_unavailable(retry))
        }
    }
}

#[cfg(test)]
#[path = "tests/router_tests.rs"]
mod tests;
