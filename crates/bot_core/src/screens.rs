use shared::{
    domain::{Category, FavoriteEntry, Rating, RecipeRecord, RecipeSummary},
    protocol::{Action, RecipeView},
};

/// Telegram refuses message bodies above this many characters.
pub const MAX_BODY_CHARS: usize = 4096;

const ELLIPSIS: &str = "...";
const LABEL_ELLIPSIS: &str = "…";

/// Truncation and paging bounds used when rendering screens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenLimits {
    pub detail_instructions_chars: usize,
    pub random_summary_chars: usize,
    pub detail_ingredients: usize,
    pub search_results: usize,
    pub category_results: usize,
    pub favorites: usize,
    pub favorite_label_chars: usize,
    pub result_label_chars: usize,
}

impl Default for ScreenLimits {
    fn default() -> Self {
        Self {
            detail_instructions_chars: 500,
            random_summary_chars: 200,
            detail_ingredients: 10,
            search_results: 5,
            category_results: 10,
            favorites: 10,
            favorite_label_chars: 20,
            result_label_chars: 25,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionTarget {
    Route(Action),
    /// Opened by the chat client, never routed back.
    External(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenAction {
    pub label: String,
    pub target: ActionTarget,
}

impl ScreenAction {
    pub fn route(label: impl Into<String>, action: Action) -> Self {
        Self {
            label: label.into(),
            target: ActionTarget::Route(action),
        }
    }

    pub fn external(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            target: ActionTarget::External(url.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screen {
    body: String,
    rows: Vec<Vec<ScreenAction>>,
}

impl Screen {
    pub fn new(body: impl Into<String>) -> Self {
        let body = body.into();
        Self {
            body: truncate_with(&body, MAX_BODY_CHARS - ELLIPSIS.len(), ELLIPSIS),
            rows: Vec::new(),
        }
    }

    pub fn row(mut self, actions: Vec<ScreenAction>) -> Self {
        if !actions.is_empty() {
            self.rows.push(actions);
        }
        self
    }

    pub fn button(self, action: ScreenAction) -> Self {
        self.row(vec![action])
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn rows(&self) -> &[Vec<ScreenAction>] {
        &self.rows
    }

    pub fn actions(&self) -> impl Iterator<Item = &ScreenAction> {
        self.rows.iter().flatten()
    }

    pub fn routed(&self) -> Vec<&Action> {
        self.actions()
            .filter_map(|a| match &a.target {
                ActionTarget::Route(action) => Some(action),
                ActionTarget::External(_) => None,
            })
            .collect()
    }

    pub fn has_action(&self, action: &Action) -> bool {
        self.routed().into_iter().any(|a| a == action)
    }
}

fn truncate_with(text: &str, max_chars: usize, marker: &str) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}{marker}", &text[..cut]),
        None => text.to_string(),
    }
}

fn label(prefix: &str, name: &str, max_chars: usize) -> String {
    format!("{prefix} {}", truncate_with(name, max_chars, LABEL_ELLIPSIS))
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn back_to_main() -> ScreenAction {
    ScreenAction::route("🔙 Back", Action::OpenMainMenu)
}

fn home() -> ScreenAction {
    ScreenAction::route("🏠 Main menu", Action::OpenMainMenu)
}

fn back_to_search() -> ScreenAction {
    ScreenAction::route("🔙 Back", Action::OpenSearchMenu)
}

fn main_menu_rows(screen: Screen) -> Screen {
    screen
        .button(ScreenAction::route("🔍 Search recipes", Action::OpenSearchMenu))
        .button(ScreenAction::route("❤️ My favorite recipes", Action::OpenFavorites))
}

pub fn main_menu() -> Screen {
    main_menu_rows(Screen::new("🍳 Main menu\n\nChoose an action:"))
}

/// Shown for `/start`.
pub fn welcome(display_name: Option<&str>) -> Screen {
    let greeting = match non_blank(display_name) {
        Some(name) => format!("Hello, {name}! 👋"),
        None => "Hello! 👋".to_string(),
    };
    main_menu_rows(Screen::new(format!(
        "{greeting}\n\n🍳 Welcome to the Cooking Bot!\n\nChoose an action:"
    )))
}

pub fn search_menu() -> Screen {
    Screen::new("🔍 Recipe search\n\nChoose how to search:")
        .button(ScreenAction::route("🎲 Random recipe", Action::RandomRecipe))
        .button(ScreenAction::route("📝 Search by name", Action::OpenSearchByName))
        .button(ScreenAction::route("📂 Search by category", Action::OpenCategories))
        .button(back_to_main())
}

pub fn search_prompt() -> Screen {
    Screen::new(
        "📝 Search by name\n\n\
         Type the name of the dish you are looking for.\n\
         For example: chicken, pasta, cake\n\n\
         💡 Tip: English names give the best results.",
    )
    .button(back_to_search())
}

/// Two categories per row; an odd trailing category sits alone.
pub fn category_list(categories: &[Category]) -> Screen {
    let mut screen = Screen::new("📂 Recipe categories\n\nPick a category to browse:");
    for pair in categories.chunks(2) {
        screen = screen.row(
            pair.iter()
                .map(|c| {
                    ScreenAction::route(
                        c.name.clone(),
                        Action::Category {
                            name: c.name.clone(),
                        },
                    )
                })
                .collect(),
        );
    }
    screen.button(back_to_search())
}

fn remaining_note(total: usize, shown: usize) -> Option<String> {
    (total > shown).then(|| format!("\n... and {} more recipes", total - shown))
}

pub fn search_results(query: &str, recipes: &[RecipeRecord], limits: &ScreenLimits) -> Screen {
    let shown = &recipes[..recipes.len().min(limits.search_results)];
    let mut body = format!("🔍 Search results for '{query}':\n\n");
    let mut buttons = Vec::with_capacity(shown.len());
    for (i, recipe) in shown.iter().enumerate() {
        body.push_str(&format!("{}. {} ({})\n", i + 1, recipe.name, recipe.category));
        buttons.push(ScreenAction::route(
            label("👁️", &recipe.name, limits.result_label_chars),
            Action::SelectRecipe {
                recipe_id: recipe.id.clone(),
            },
        ));
    }
    if let Some(note) = remaining_note(recipes.len(), shown.len()) {
        body.push_str(&note);
    }

    let mut screen = Screen::new(body);
    for button in buttons {
        screen = screen.button(button);
    }
    screen
        .button(ScreenAction::route("🔍 New search", Action::OpenSearchByName))
        .button(home())
}

pub fn search_not_found(query: &str) -> Screen {
    Screen::new(format!(
        "❌ No recipes found\n\n\
         Nothing matched '{query}'.\n\
         Try:\n\
         • Other dish names (chicken, pasta, cake)\n\
         • English names\n\
         • Searching by category"
    ))
    .button(ScreenAction::route("🔍 Try another search", Action::OpenSearchByName))
    .button(home())
}

pub fn category_results(
    category: &str,
    recipes: &[RecipeSummary],
    limits: &ScreenLimits,
) -> Screen {
    let shown = &recipes[..recipes.len().min(limits.category_results)];
    let mut body = format!("📂 Recipes in '{category}':\n\n");
    let mut buttons = Vec::with_capacity(shown.len());
    for (i, recipe) in shown.iter().enumerate() {
        body.push_str(&format!("{}. {}\n", i + 1, recipe.name));
        buttons.push(ScreenAction::route(
            label("👁️", &recipe.name, limits.result_label_chars),
            Action::SelectRecipe {
                recipe_id: recipe.id.clone(),
            },
        ));
    }
    if let Some(note) = remaining_note(recipes.len(), shown.len()) {
        body.push_str(&note);
    }

    let mut screen = Screen::new(body);
    for button in buttons {
        screen = screen.button(button);
    }
    screen
        .button(ScreenAction::route(
            "🔙 Back to categories",
            Action::OpenCategories,
        ))
        .button(home())
}

pub fn category_not_found(category: &str) -> Screen {
    Screen::new(format!(
        "❌ No recipes found\n\nThere are no recipes in '{category}' yet."
    ))
    .button(ScreenAction::route(
        "🔙 Back to categories",
        Action::OpenCategories,
    ))
}

fn rating_line(rating: Rating) -> String {
    if rating.is_rated() {
        rating.stars()
    } else {
        "❌ No rating".to_string()
    }
}

pub fn favorites(entries: &[FavoriteEntry], limits: &ScreenLimits) -> Screen {
    if entries.is_empty() {
        return Screen::new(
            "❤️ My favorite recipes\n\n\
             You have no favorite recipes yet.\n\
             Find a recipe and add it to your favorites!",
        )
        .button(back_to_main());
    }

    let shown = &entries[..entries.len().min(limits.favorites)];
    let mut body = String::from("❤️ My favorite recipes:\n\n");
    let mut buttons = Vec::with_capacity(shown.len());
    for (i, entry) in shown.iter().enumerate() {
        body.push_str(&format!(
            "{}. {}\n   {}\n\n",
            i + 1,
            entry.recipe_name,
            rating_line(entry.rating)
        ));
        buttons.push(ScreenAction::route(
            label("👁️", &entry.recipe_name, limits.favorite_label_chars),
            Action::ViewRecipe {
                recipe_id: entry.recipe_id.clone(),
            },
        ));
    }

    let mut screen = Screen::new(body);
    for button in buttons {
        screen = screen.button(button);
    }
    screen.button(back_to_main())
}

fn favorite_toggle(
    recipe: &RecipeRecord,
    favorite: Option<&FavoriteEntry>,
    view: RecipeView,
) -> ScreenAction {
    let recipe_id = recipe.id.clone();
    match favorite {
        Some(_) => ScreenAction::route(
            "🗑️ Remove from favorites",
            Action::Unfavorite { recipe_id, view },
        ),
        None => ScreenAction::route("❤️ Add to favorites", Action::Favorite { recipe_id, view }),
    }
}

fn video_section(recipe: &RecipeRecord) -> Option<(String, ScreenAction)> {
    let url = non_blank(recipe.video.as_deref())?;
    Some((
        format!("\n\n🎥 Video recipe:\n📺 {url}"),
        ScreenAction::external("🎥 Watch the video", url),
    ))
}

pub fn recipe_detail(
    recipe: &RecipeRecord,
    favorite: Option<&FavoriteEntry>,
    limits: &ScreenLimits,
) -> Screen {
    let mut body = format!(
        "🍳 {}\n\n📋 Category: {}\n🌍 Cuisine: {}\n",
        recipe.name, recipe.category, recipe.area
    );
    if let Some(entry) = favorite.filter(|e| e.rating.is_rated()) {
        body.push_str(&format!("⭐ Your rating: {}\n", entry.rating.stars()));
    }

    body.push_str("\n📋 Ingredients:\n");
    let ingredients: Vec<String> = recipe
        .ingredients
        .iter()
        .filter(|i| !i.name.trim().is_empty())
        .take(limits.detail_ingredients)
        .map(|i| match i.measure.trim() {
            "" => format!("• {}", i.name.trim()),
            measure => format!("• {measure} {}", i.name.trim()),
        })
        .collect();
    body.push_str(&ingredients.join("\n"));

    body.push_str("\n\n📝 Instructions:\n");
    body.push_str(&truncate_with(
        &recipe.instructions,
        limits.detail_instructions_chars,
        ELLIPSIS,
    ));

    let video = video_section(recipe);
    if let Some((text, _)) = &video {
        body.push_str(text);
    }

    let mut screen =
        Screen::new(body).button(favorite_toggle(recipe, favorite, RecipeView::Detail));
    if favorite.is_some() {
        screen = screen.button(ScreenAction::route(
            "⭐ Rate this recipe",
            Action::RatePrompt {
                recipe_id: recipe.id.clone(),
            },
        ));
    }
    if let Some((_, watch)) = video {
        screen = screen.button(watch);
    }
    screen.button(back_to_main())
}

/// Condensed detail view for the random pick.
pub fn random_recipe(
    recipe: &RecipeRecord,
    favorite: Option<&FavoriteEntry>,
    limits: &ScreenLimits,
) -> Screen {
    let mut body = format!(
        "🎲 Random recipe:\n\n🍳 {}\n\n📋 Category: {}\n🌍 Cuisine: {}\n\n📝 In short:\n",
        recipe.name, recipe.category, recipe.area
    );
    body.push_str(&truncate_with(
        &recipe.instructions,
        limits.random_summary_chars,
        ELLIPSIS,
    ));

    let video = video_section(recipe);
    if let Some((text, _)) = &video {
        body.push_str(text);
    }

    let mut screen = Screen::new(body)
        .button(favorite_toggle(recipe, favorite, RecipeView::Random))
        .button(ScreenAction::route(
            "👁️ More details",
            Action::ViewRecipe {
                recipe_id: recipe.id.clone(),
            },
        ));
    if let Some((_, watch)) = video {
        screen = screen.button(watch);
    }
    screen
        .button(ScreenAction::route("🎲 Another recipe", Action::RandomRecipe))
        .button(back_to_search())
}

pub fn rating_prompt(entry: &FavoriteEntry) -> Screen {
    let mut screen = Screen::new(format!(
        "⭐ Rate the recipe\n\nRecipe: {}\n\nPick from 1 to 5 stars:",
        entry.recipe_name
    ));
    for stars in 1..=5_i64 {
        screen = screen.button(ScreenAction::route(
            "⭐".repeat(stars as usize),
            Action::SetRating {
                recipe_id: entry.recipe_id.clone(),
                rating: stars,
            },
        ));
    }
    screen.button(ScreenAction::route(
        "🔙 Back to recipe",
        Action::SelectRecipe {
            recipe_id: entry.recipe_id.clone(),
        },
    ))
}

pub fn recipe_not_found() -> Screen {
    Screen::new("❌ Recipe not found\n\nIt may have been removed from the catalog.")
        .button(ScreenAction::route("🔍 Search recipes", Action::OpenSearchMenu))
        .button(home())
}

pub fn random_not_found() -> Screen {
    Screen::new("❌ Could not fetch a random recipe.")
        .button(ScreenAction::route("🎲 Try again", Action::RandomRecipe))
        .button(back_to_search())
}

pub fn categories_not_found() -> Screen {
    Screen::new("❌ Could not load recipe categories.")
        .button(ScreenAction::route("🔄 Try again", Action::OpenCategories))
        .button(back_to_search())
}

/// Catalog unreachable; `retry` repeats the failed action.
pub fn service_unavailable(retry: Action) -> Screen {
    Screen::new("⚠️ The recipe service is not responding. Please try again later.")
        .button(ScreenAction::route("🔄 Try again", retry))
        .button(home())
}

#[cfg(test)]
#[path = "tests/screens_tests.rs"]
mod tests;
