use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{domain::RecipeId, error::BotError};

const SEPARATOR: char = ':';
const ESCAPE: char = '\\';
const RANDOM_VIEW: &str = "random";

/// Screen a favorite toggle sits on; toggling re-renders that screen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecipeView {
    #[default]
    Detail,
    Random,
}

/// A user-selectable action. Travels through the chat transport as an opaque
/// token produced by [`Action::encode`] and read back by [`Action::decode`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum Action {
    OpenSearchMenu,
    OpenFavorites,
    OpenMainMenu,
    RandomRecipe,
    OpenSearchByName,
    OpenCategories,
    Favorite {
        recipe_id: RecipeId,
        #[serde(default)]
        view: RecipeView,
    },
    Unfavorite {
        recipe_id: RecipeId,
        #[serde(default)]
        view: RecipeView,
    },
    ViewRecipe { recipe_id: RecipeId },
    Category { name: String },
    SelectRecipe { recipe_id: RecipeId },
    RatePrompt { recipe_id: RecipeId },
    SetRating { recipe_id: RecipeId, rating: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionParseError {
    #[error("empty action token")]
    Empty,
    #[error("unknown action verb '{0}'")]
    UnknownVerb(String),
    #[error("action '{verb}' expects {expected} argument(s), got {actual}")]
    Arity {
        verb: String,
        expected: usize,
        actual: usize,
    },
    #[error("invalid escape sequence in action token")]
    InvalidEscape,
    #[error("rating '{0}' is not an integer")]
    InvalidRating(String),
    #[error("unknown recipe view '{0}'")]
    UnknownView(String),
}

impl From<ActionParseError> for BotError {
    fn from(value: ActionParseError) -> Self {
        BotError::validation(value.to_string())
    }
}

impl Action {
    pub fn verb(&self) -> &'static str {
        match self {
            Action::OpenSearchMenu => "open-search-menu",
            Action::OpenFavorites => "open-favorites",
            Action::OpenMainMenu => "open-main-menu",
            Action::RandomRecipe => "random-recipe",
            Action::OpenSearchByName => "open-search-by-name",
            Action::OpenCategories => "open-categories",
            Action::Favorite { .. } => "favorite",
            Action::Unfavorite { .. } => "unfavorite",
            Action::ViewRecipe { .. } => "view-recipe",
            Action::Category { .. } => "category",
            Action::SelectRecipe { .. } => "select-recipe",
            Action::RatePrompt { .. } => "rate-prompt",
            Action::SetRating { .. } => "set-rating",
        }
    }

    fn arguments(&self) -> Vec<String> {
        match self {
            Action::OpenSearchMenu
            | Action::OpenFavorites
            | Action::OpenMainMenu
            | Action::RandomRecipe
            | Action::OpenSearchByName
            | Action::OpenCategories => Vec::new(),
            Action::Favorite { recipe_id, view } | Action::Unfavorite { recipe_id, view } => {
                match view {
                    RecipeView::Detail => vec![recipe_id.0.clone()],
                    RecipeView::Random => vec![recipe_id.0.clone(), RANDOM_VIEW.to_string()],
                }
            }
            Action::ViewRecipe { recipe_id }
            | Action::SelectRecipe { recipe_id }
            | Action::RatePrompt { recipe_id } => vec![recipe_id.0.clone()],
            Action::Category { name } => vec![name.clone()],
            Action::SetRating { recipe_id, rating } => {
                vec![recipe_id.0.clone(), rating.to_string()]
            }
        }
    }

    pub fn encode(&self) -> String {
        let mut token = self.verb().to_string();
        for argument in self.arguments() {
            token.push(SEPARATOR);
            escape_into(&argument, &mut token);
        }
        token
    }

    pub fn decode(token: &str) -> Result<Self, ActionParseError> {
        if token.is_empty() {
            return Err(ActionParseError::Empty);
        }

        let mut parts = split_escaped(token)?;
        let verb = parts.remove(0);
        let args = parts;

        let expect = |expected: usize| {
            if args.len() == expected {
                Ok(())
            } else {
                Err(ActionParseError::Arity {
                    verb: verb.clone(),
                    expected,
                    actual: args.len(),
                })
            }
        };

        let action = match verb.as_str() {
            "open-search-menu" => expect(0).map(|_| Action::OpenSearchMenu)?,
            "open-favorites" => expect(0).map(|_| Action::OpenFavorites)?,
            "open-main-menu" => expect(0).map(|_| Action::OpenMainMenu)?,
            "random-recipe" => expect(0).map(|_| Action::RandomRecipe)?,
            "open-search-by-name" => expect(0).map(|_| Action::OpenSearchByName)?,
            "open-categories" => expect(0).map(|_| Action::OpenCategories)?,
            "favorite" | "unfavorite" => {
                // A bare id means the detail screen.
                let view = match args.len() {
                    1 => RecipeView::Detail,
                    2 if args[1] == RANDOM_VIEW => RecipeView::Random,
                    2 => return Err(ActionParseError::UnknownView(args[1].clone())),
                    n => expect(if n == 0 { 1 } else { 2 }).map(|_| RecipeView::Detail)?,
                };
                let recipe_id = RecipeId(args[0].clone());
                if verb == "favorite" {
                    Action::Favorite { recipe_id, view }
                } else {
                    Action::Unfavorite { recipe_id, view }
                }
            }
            "view-recipe" | "select-recipe" | "rate-prompt" => {
                expect(1)?;
                let recipe_id = RecipeId(args[0].clone());
                match verb.as_str() {
                    "view-recipe" => Action::ViewRecipe { recipe_id },
                    "select-recipe" => Action::SelectRecipe { recipe_id },
                    _ => Action::RatePrompt { recipe_id },
                }
            }
            "category" => {
                expect(1)?;
                Action::Category {
                    name: args[0].clone(),
                }
            }
            "set-rating" => {
                expect(2)?;
                let rating = args[1]
                    .trim()
                    .parse::<i64>()
                    .map_err(|_| ActionParseError::InvalidRating(args[1].clone()))?;
                Action::SetRating {
                    recipe_id: RecipeId(args[0].clone()),
                    rating,
                }
            }
            _ => return Err(ActionParseError::UnknownVerb(verb)),
        };
        Ok(action)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for Action {
    type Err = ActionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::decode(s)
    }
}

fn escape_into(argument: &str, out: &mut String) {
    for ch in argument.chars() {
        if ch == SEPARATOR || ch == ESCAPE {
            out.push(ESCAPE);
        }
        out.push(ch);
    }
}

fn split_escaped(token: &str) -> Result<Vec<String>, ActionParseError> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut chars = token.chars();

    while let Some(ch) = chars.next() {
        match ch {
            ESCAPE => match chars.next() {
                Some(next) if next == SEPARATOR || next == ESCAPE => current.push(next),
                _ => return Err(ActionParseError::InvalidEscape),
            },
            SEPARATOR => parts.push(std::mem::take(&mut current)),
            other => current.push(other),
        }
    }
    parts.push(current);
    Ok(parts)
}
