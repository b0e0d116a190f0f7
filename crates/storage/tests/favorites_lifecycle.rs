use std::str::FromStr;

use shared::domain::{Ingredient, Rating, RecipeId, RecipeRecord, UserId};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Row,
};
use storage::{AddOutcome, FavoritesStore, StoreError};

fn teriyaki() -> RecipeRecord {
    RecipeRecord {
        id: RecipeId::new("52772"),
        name: "Teriyaki Chicken Casserole".to_string(),
        category: "Chicken".to_string(),
        area: "Japanese".to_string(),
        image: Some("https://www.themealdb.com/images/media/meals/wvpsxx1468256321.jpg".to_string()),
        ingredients: vec![Ingredient {
            name: "soy sauce".to_string(),
            measure: "3/4 cup".to_string(),
        }],
        instructions: "Preheat oven to 350° F.".to_string(),
        video: Some("https://www.youtube.com/watch?v=4aZr5hZXP_s".to_string()),
    }
}

#[tokio::test]
async fn favorite_rate_and_remove_lifecycle() {
    let store = FavoritesStore::new("sqlite::memory:").await.expect("db");
    let user = UserId(42);
    let record = teriyaki();

    assert_eq!(store.add(user, &record).await.expect("add"), AddOutcome::Added);

    let listed = store.list(user).await.expect("list");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].rating, Rating::UNRATED);

    store
        .set_rating(user, &record.id, 4)
        .await
        .expect("set rating");
    let entry = store
        .get(user, &record.id)
        .await
        .expect("get")
        .expect("entry");
    assert_eq!(entry.rating.value(), 4);

    store.remove(user, &record.id).await.expect("remove");
    assert!(store.list(user).await.expect("list").is_empty());
    assert!(matches!(
        store.set_rating(user, &record.id, 4).await,
        Err(StoreError::NotFavorited { .. })
    ));
}

#[tokio::test]
async fn favorites_survive_reopening_the_database() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = format!(
        "sqlite://{}",
        dir.path().join("favorites.db").to_string_lossy().replace('\\', "/")
    );
    let user = UserId(1);

    {
        let store = FavoritesStore::new(&url).await.expect("db");
        store.add(user, &teriyaki()).await.expect("add");
        store
            .set_rating(user, &RecipeId::new("52772"), 5)
            .await
            .expect("rate");
        store.pool().close().await;
    }

    let reopened = FavoritesStore::new(&url).await.expect("reopen");
    let entry = reopened
        .get(user, &RecipeId::new("52772"))
        .await
        .expect("get")
        .expect("entry persisted");
    assert_eq!(entry.rating.value(), 5);
}

#[tokio::test]
async fn legacy_schema_gains_rating_column_without_losing_rows() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = format!(
        "sqlite://{}",
        dir.path().join("legacy.db").to_string_lossy().replace('\\', "/")
    );

    let legacy_pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(
            SqliteConnectOptions::from_str(&url)
                .expect("options")
                .create_if_missing(true),
        )
        .await
        .expect("legacy pool");
    sqlx::query(
        "CREATE TABLE favorite_recipes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            recipe_id TEXT NOT NULL,
            recipe_name TEXT NOT NULL,
            recipe_image TEXT,
            recipe_instructions TEXT,
            added_date TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
            UNIQUE(user_id, recipe_id)
        )",
    )
    .execute(&legacy_pool)
    .await
    .expect("legacy table");
    sqlx::query(
        "INSERT INTO favorite_recipes (user_id, recipe_id, recipe_name, recipe_image, recipe_instructions)
         VALUES (10, '52772', 'Teriyaki Chicken Casserole', NULL, 'old snapshot')",
    )
    .execute(&legacy_pool)
    .await
    .expect("legacy row");
    legacy_pool.close().await;

    let store = FavoritesStore::new(&url).await.expect("migrated store");
    let columns = sqlx::query("PRAGMA table_info(favorite_recipes)")
        .fetch_all(store.pool())
        .await
        .expect("pragma");
    assert!(columns
        .iter()
        .any(|row| row.get::<String, _>("name") == "rating"));

    let entry = store
        .get(UserId(10), &RecipeId::new("52772"))
        .await
        .expect("get")
        .expect("legacy entry kept");
    assert_eq!(entry.rating, Rating::UNRATED);
    assert_eq!(entry.recipe_instructions.as_deref(), Some("old snapshot"));

    store
        .set_rating(UserId(10), &RecipeId::new("52772"), 3)
        .await
        .expect("legacy entry can be rated");
}
