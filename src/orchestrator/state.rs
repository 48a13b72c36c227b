use serde::Serialize;
use std::fmt;

use crate::history::HistoryLedger;
use crate::ingredients::IngredientSet;
use crate::models::Recipe;

/// Loading sub-step, for user feedback only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    IdentifyingIngredients,
    GeneratingRecipes,
    GeneratingImages,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Phase::IdentifyingIngredients => "Identifying ingredients...",
            Phase::GeneratingRecipes => "Generating recipes...",
            Phase::GeneratingImages => "Generating images...",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Idle,
    Loading(Phase),
    Failed(String),
}

/// Everything a front end needs to render.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ViewState {
    pub ingredients: IngredientSet,
    pub recipes: Vec<Recipe>,
    pub loading: Option<Phase>,
    pub error: Option<String>,
    pub history: HistoryLedger,
    pub history_open: bool,
}

impl ViewState {
    pub fn is_loading(&self) -> bool {
        self.loading.is_some()
    }

    pub fn status(&self) -> Status {
        match (&self.loading, &self.error) {
            (Some(phase), _) => Status::Loading(*phase),
            (None, Some(message)) => Status::Failed(message.clone()),
            (None, None) => Status::Idle,
        }
    }
}
