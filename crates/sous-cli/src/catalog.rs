//! Recipe catalog and dashboard commands

use sous_ai::{RecipeDetail, RecipeSummary, SystemStats};

use crate::render::truncate_chars;

/// Render a recipe id, which the backend sends as a number or a string
fn recipe_id(id: &serde_json::Value) -> String {
    match id {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn format_stats(stats: &SystemStats) -> String {
    [
        ("Recipes", stats.total_recipes),
        ("Ingredients", stats.total_ingredients),
        ("Documents", stats.total_documents),
        ("Vector indices", stats.vector_indices),
        ("Queries answered", stats.total_queries),
    ]
    .iter()
    .map(|(label, value)| format!("{:<18} {}", label, value))
    .collect::<Vec<_>>()
    .join("\n")
}

pub fn format_recipe_line(recipe: &RecipeSummary) -> String {
    let mut line = format!(
        "{:>4}  {}{}",
        recipe_id(&recipe.id),
        if recipe.favorite { "★ " } else { "" },
        recipe.name
    );
    let details: Vec<&str> = [recipe.difficulty.as_deref(), recipe.time.as_deref()]
        .into_iter()
        .flatten()
        .collect();
    if !details.is_empty() {
        line.push_str(&format!("  ({})", details.join(", ")));
    }
    if let Some(description) = recipe.description.as_deref().filter(|d| !d.is_empty()) {
        line.push_str(&format!("\n      {}", truncate_chars(description, 60)));
    }
    line
}

pub fn format_recipes(recipes: &[RecipeSummary]) -> String {
    if recipes.is_empty() {
        return "No recipes found.".to_string();
    }
    recipes
        .iter()
        .map(format_recipe_line)
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_recipe(recipe: &RecipeDetail) -> String {
    let summary = &recipe.summary;
    let mut out = vec![format!("{} (#{})", summary.name, recipe_id(&summary.id))];
    if let Some(description) = summary.description.as_deref() {
        out.push(description.to_string());
    }
    if !summary.tags.is_empty() {
        out.push(format!("Tags: {}", summary.tags.join(", ")));
    }
    if !recipe.ingredients.is_empty() {
        out.push(String::new());
        out.push("Ingredients:".to_string());
        out.extend(
            recipe
                .ingredients
                .iter()
                .map(|i| format!("  - {} {}", i.name, i.amount).trim_end().to_string()),
        );
    }
    if !recipe.steps.is_empty() {
        out.push(String::new());
        out.push("Steps:".to_string());
        out.extend(
            recipe
                .steps
                .iter()
                .enumerate()
                .map(|(n, step)| format!("  {}. {}", n + 1, step)),
        );
    }
    out.join("\n")
}
