use axum::{extract::State, Json};
use serde::Deserialize;

use crate::{error::ApiError, models::suggestion::MenuSuggestion, AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateMenuRequest {
    pub prompt: Option<String>,
    pub menu_type: Option<String>,
}

/// POST /api/ai/generate — ask the configured provider for dish
/// suggestions. A provider answer we cannot parse is still a 200 with the
/// raw-response shape; only upstream failures become errors.
pub async fn generate_menu(
    State(state): State<AppState>,
    Json(body): Json<GenerateMenuRequest>,
) -> Result<Json<MenuSuggestion>, ApiError> {
    let prompt = body
        .prompt
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| ApiError::Validation("Prompt is required".into()))?;

    let suggestion = state.ai.generate(prompt, body.menu_type.as_deref()).await?;
    Ok(Json(suggestion))
}
