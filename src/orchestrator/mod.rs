//! Generation workflows and the observable state they drive.
//!
//! Every workflow takes a request ticket when it starts. After each await it
//! only touches shared state if its ticket is still the latest, so results
//! from a superseded request are dropped instead of overwriting newer ones.

mod state;


pub use state::{Phase, Status, ViewState};

use futures::future::join_all;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;

use crate::codec::{self, EncodedImage};
use crate::error::{RecipeMuseError, Result};
use crate::history::HistoryEntry;
use crate::models::{Recipe, RecipeImage};
use crate::service::GenerationService;

pub struct GenerationOrchestrator {
    service: Arc<dyn GenerationService>,
    state: watch::Sender<ViewState>,
    latest_request: AtomicU64,
}

/// Clears `loading` on drop if its request is still the latest one.
struct LoadingGuard<'a> {
    orchestrator: &'a GenerationOrchestrator,
    ticket: u64,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.orchestrator
            .update_if_current(self.ticket, |state| state.loading = None);
    }
}

impl GenerationOrchestrator {
    pub fn new(service: Arc<dyn GenerationService>) -> Self {
        let (state, _) = watch::channel(ViewState::default());
        Self {
            service,
            state,
            latest_request: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> ViewState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.state.subscribe()
    }

    pub fn history(&self) -> Vec<Arc<HistoryEntry>> {
        self.state.borrow().history.list().to_vec()
    }

    pub fn add_ingredient(&self, name: &str) -> bool {
        self.state
            .send_if_modified(|state| state.ingredients.add(name))
    }

    pub fn remove_ingredient(&self, index: usize) -> Option<String> {
        let mut removed = None;
        self.state.send_if_modified(|state| {
            removed = state.ingredients.remove_at(index);
            removed.is_some()
        });
        removed
    }

    pub fn show_history(&self) {
        self.set_history_open(true);
    }

    pub fn close_history(&self) {
        self.set_history_open(false);
    }

    fn set_history_open(&self, open: bool) {
        self.state.send_if_modified(|state| {
            let changed = state.history_open != open;
            state.history_open = open;
            changed
        });
    }

    /// Generate recipes for the current ingredient list.
    pub async fn generate(&self) {
        let ingredients = self.state.borrow().ingredients.to_vec();
        self.generate_from_ingredients(ingredients).await;
    }

    pub async fn generate_from_ingredients(&self, ingredients: Vec<String>) {
        if ingredients.is_empty() {
            tracing::debug!("Ignoring generate request with no ingredients");
            return;
        }

        let guard = self.begin(Phase::GeneratingRecipes);
        let ticket = guard.ticket;
        tracing::info!(
            "Request {}: generating recipes for [{}]",
            ticket,
            ingredients.join(", ")
        );

        let recipes = match self.service.generate_recipes(&ingredients).await {
            Ok(recipes) => recipes,
            Err(e) => {
                self.fail(ticket, &e);
                return;
            }
        };

        if !self.update_if_current(ticket, |state| {
            state.loading = Some(Phase::GeneratingImages)
        }) {
            tracing::debug!("Request {}: superseded, discarding recipes", ticket);
            return;
        }

        let outcomes = join_all(
            recipes
                .iter()
                .map(|recipe| self.service.generate_image(recipe)),
        )
        .await;
        let recipes = attach_images(recipes, outcomes);
        let illustrated = recipes.iter().filter(|r| r.has_image()).count();

        let committed = self.update_if_current(ticket, |state| {
            let entry = HistoryEntry::new(ingredients, recipes.clone());
            state.recipes = recipes;
            state.history.append(entry);
        });

        if committed {
            tracing::info!(
                "Request {}: stored recipes ({} illustrated)",
                ticket,
                illustrated
            );
        } else {
            tracing::debug!("Request {}: superseded, discarding illustrated recipes", ticket);
        }
    }

    /// Identify ingredients in a photo and merge them into the live set.
    pub async fn identify_from_image(&self, path: impl AsRef<Path>) {
        let guard = self.begin(Phase::IdentifyingIngredients);
        let path = path.as_ref();
        tracing::info!(
            "Request {}: identifying ingredients in {}",
            guard.ticket,
            path.display()
        );

        match codec::encode_file(path).await {
            Ok(encoded) => self.identify_encoded(guard.ticket, encoded).await,
            Err(e) => self.fail(guard.ticket, &e),
        }
    }

    pub async fn upload_image(&self, path: impl AsRef<Path>) {
        self.identify_from_image(path).await;
    }

    pub async fn identify_from_bytes(&self, bytes: &[u8], mime_type: &str) {
        let guard = self.begin(Phase::IdentifyingIngredients);
        tracing::info!(
            "Request {}: identifying ingredients in {} bytes of {}",
            guard.ticket,
            bytes.len(),
            mime_type
        );

        let encoded = codec::encode_bytes(bytes, mime_type);
        self.identify_encoded(guard.ticket, encoded).await;
    }

    async fn identify_encoded(&self, ticket: u64, encoded: EncodedImage) {
        if encoded.is_empty() {
            self.fail(ticket, &RecipeMuseError::EmptyImage);
            return;
        }
        if !encoded.is_supported() {
            self.fail(ticket, &RecipeMuseError::UnsupportedImage(encoded.mime_type));
            return;
        }

        let names = match self
            .service
            .identify_ingredients(&encoded.data, &encoded.mime_type)
            .await
        {
            Ok(names) => names,
            Err(e) => {
                self.fail(ticket, &e);
                return;
            }
        };

        let count = names.len();
        if self.update_if_current(ticket, |state| state.ingredients.merge_identified(names)) {
            tracing::info!("Request {}: merged {} identified ingredients", ticket, count);
        } else {
            tracing::debug!("Request {}: superseded, discarding identified ingredients", ticket);
        }
    }

    /// Replace live ingredients and recipes with a history snapshot.
    /// Any in-flight workflow is superseded.
    pub fn recall_history(&self, entry: &HistoryEntry) {
        self.state.send_modify(|state| {
            let ticket = self.latest_request.fetch_add(1, Ordering::SeqCst) + 1;
            tracing::info!("Request {}: recalling history entry {}", ticket, entry.id);
            state.ingredients.replace_all(&entry.ingredients);
            state.recipes = entry.recipes.clone();
            state.error = None;
            state.loading = None;
            state.history_open = false;
        });
    }

    pub fn select_history(&self, id: &str) -> bool {
        let entry = self.state.borrow().history.get(id);
        match entry {
            Some(entry) => {
                self.recall_history(&entry);
                true
            }
            None => {
                tracing::warn!("History entry {} not found", id);
                false
            }
        }
    }

    /// Take a new ticket and enter `phase`, clearing any stale error and recipes.
    fn begin(&self, phase: Phase) -> LoadingGuard<'_> {
        let mut ticket = 0;
        self.state.send_modify(|state| {
            ticket = self.latest_request.fetch_add(1, Ordering::SeqCst) + 1;
            state.loading = Some(phase);
            state.error = None;
            state.recipes.clear();
        });
        LoadingGuard {
            orchestrator: self,
            ticket,
        }
    }

    fn is_current(&self, ticket: u64) -> bool {
        self.latest_request.load(Ordering::SeqCst) == ticket
    }

    /// Apply `update` atomically, but only while `ticket` is the latest request.
    fn update_if_current<F>(&self, ticket: u64, update: F) -> bool
    where
        F: FnOnce(&mut ViewState),
    {
        self.state.send_if_modified(|state| {
            if !self.is_current(ticket) {
                return false;
            }
            update(state);
            true
        })
    }

    fn fail(&self, ticket: u64, err: &RecipeMuseError) {
        tracing::error!("Request {} failed: {}", ticket, err);
        let message = err.user_message();
        if !self.update_if_current(ticket, |state| state.error = Some(message)) {
            tracing::debug!("Request {}: superseded, discarding error", ticket);
        }
    }
}

/// Pair each recipe with its image outcome by position. A failed image leaves
/// the recipe without one.
fn attach_images(recipes: Vec<Recipe>, outcomes: Vec<Result<RecipeImage>>) -> Vec<Recipe> {
    recipes
        .into_iter()
        .zip(outcomes)
        .map(|(recipe, outcome)| match outcome {
            Ok(image) => recipe.with_image(image),
            Err(e) => {
                tracing::warn!("Image generation failed for '{}': {}", recipe.name, e);
                recipe
            }
        })
        .collect()
}
