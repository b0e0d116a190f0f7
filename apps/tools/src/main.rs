use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use shared::domain::{RecipeId, UserId};
use storage::FavoritesStore;

#[derive(Parser, Debug)]
#[command(about = "Operator tools for the recipe bot favorites database")]
struct Cli {
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://./data/recipes.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the favorites table or add missing columns.
    Migrate,
    List {
        #[arg(long)]
        user_id: i64,
    },
    Remove {
        #[arg(long)]
        user_id: i64,
        #[arg(long)]
        recipe_id: String,
    },
    Rate {
        #[arg(long)]
        user_id: i64,
        #[arg(long)]
        recipe_id: String,
        #[arg(long)]
        rating: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let store = FavoritesStore::new(&cli.database_url).await?;

    match cli.command {
        Command::Migrate => {
            println!("schema ready at {}", cli.database_url);
        }
        Command::List { user_id } => {
            let entries = store.list(UserId(user_id)).await?;
            if entries.is_empty() {
                println!("user {user_id} has no favorites");
            }
            for entry in entries {
                println!(
                    "{}\t{}\trating={}\tadded={}",
                    entry.recipe_id,
                    entry.recipe_name,
                    entry.rating.value(),
                    entry.added_at.format("%Y-%m-%d %H:%M:%S")
                );
            }
        }
        Command::Remove { user_id, recipe_id } => {
            let removed = store
                .remove(UserId(user_id), &RecipeId::new(recipe_id.as_str()))
                .await?;
            if removed {
                println!("removed recipe {recipe_id} for user {user_id}");
            } else {
                println!("recipe {recipe_id} was not a favorite of user {user_id}");
            }
        }
        Command::Rate {
            user_id,
            recipe_id,
            rating,
        } => {
            let rating = store
                .set_rating(UserId(user_id), &RecipeId::new(recipe_id.as_str()), rating)
                .await
                .with_context(|| format!("failed to rate recipe {recipe_id}"))?;
            println!("rated recipe {recipe_id} for user {user_id}: {}", rating.stars());
        }
    }

    Ok(())
}
