use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Suggestions produced by the recipe service.
///
/// The payload shape belongs to the AI service and is kept as raw JSON. The
/// accessors cover the parts the client reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecipeSuggestions(pub Value);

impl RecipeSuggestions {
    /// The recipe entries, whether the payload is a bare array or wraps it in
    /// a `recipes` field.
    pub fn recipes(&self) -> &[Value] {
        match &self.0 {
            Value::Array(items) => items,
            Value::Object(map) => map
                .get("recipes")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or(&[]),
            _ => &[],
        }
    }

    pub fn titles(&self) -> Vec<String> {
        self.recipes()
            .iter()
            .filter_map(|recipe| {
                recipe
                    .get("title")
                    .or_else(|| recipe.get("name"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .collect()
    }
}

/// Ingredient names to deduct from the kitchen after cooking.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConsumeIngredientsRequest(pub Vec<String>);
