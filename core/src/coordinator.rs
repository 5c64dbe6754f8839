use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU8, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use chrono::Local;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::category::classify;
use crate::error::CoordinatorError;
use crate::generator::ShoppingListGenerator;
use crate::models::{
    DateWindow, ItemSource, NewManualItem, ShoppingListCategory, ShoppingListItem,
    validate_item_name, validate_quantity,
};
use crate::ports::{
    MealPlanQueue, RecipeSource, ShoppingListStore, group_by_category, load_queued_recipes,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Quiet period before a scheduled regeneration runs.
    pub debounce: Duration,
    /// Consecutive `retry_last` attempts allowed before refusing.
    pub max_retries: u32,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(500),
            max_retries: 3,
        }
    }
}

/// Snapshot published to subscribers.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ListState {
    pub items: Vec<ShoppingListItem>,
    pub loading: bool,
    pub error: Option<String>,
}

impl ListState {
    /// Non-empty categories in display order.
    #[must_use]
    pub fn grouped(&self) -> BTreeMap<ShoppingListCategory, Vec<ShoppingListItem>> {
        group_by_category(self.items.clone())
    }

    #[must_use]
    pub fn flat(&self) -> &[ShoppingListItem] {
        &self.items
    }

    #[must_use]
    pub fn checked_count(&self) -> usize {
        self.items.iter().filter(|i| i.checked).count()
    }
}

/// The collaborators a coordinator drives.
#[derive(Clone)]
pub struct CoordinatorPorts {
    pub store: Arc<dyn ShoppingListStore>,
    pub recipes: Arc<dyn RecipeSource>,
    pub queue: Arc<dyn MealPlanQueue>,
}

impl CoordinatorPorts {
    /// Use one backend for all three ports.
    pub fn from_backend<B>(backend: B) -> Self
    where
        B: ShoppingListStore + RecipeSource + MealPlanQueue + 'static,
    {
        let backend = Arc::new(backend);
        Self {
            store: backend.clone(),
            recipes: backend.clone(),
            queue: backend,
        }
    }
}

/// A mutation that can be replayed by `retry_last`.
#[derive(Debug, Clone)]
enum Action {
    AddManual(NewManualItem),
    SetChecked { id: String, checked: bool },
    Delete(String),
    RemoveRecipe(String),
    DeleteMany(Vec<String>),
    ClearAll,
    Regenerate,
}

impl Action {
    fn label(&self) -> &'static str {
        match self {
            Action::AddManual(_) => "add_manual_item",
            Action::SetChecked { .. } => "toggle_checked",
            Action::Delete(_) => "delete_item",
            Action::RemoveRecipe(_) => "remove_recipe",
            Action::DeleteMany(_) => "clear_checked",
            Action::ClearAll => "clear_all",
            Action::Regenerate => "regenerate",
        }
    }
}

/// What a successful persistence call means for local state.
enum Persisted {
    Done,
    Replace { id: String, item: ShoppingListItem },
}

const TIMER_WAITING: u8 = 0;
const TIMER_STARTED: u8 = 1;
const TIMER_CANCELLED: u8 = 2;

struct PendingRegeneration {
    phase: Arc<AtomicU8>,
    handle: JoinHandle<Result<()>>,
}

impl PendingRegeneration {
    /// Stop the timer if it has not fired yet. A regeneration already in
    /// flight is left to finish.
    fn cancel(&self) -> bool {
        let cancelled = self
            .phase
            .compare_exchange(TIMER_WAITING, TIMER_CANCELLED, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();
        if cancelled {
            self.handle.abort();
        }
        cancelled
    }
}

struct Shared {
    ports: CoordinatorPorts,
    generator: ShoppingListGenerator,
    window: DateWindow,
    config: CoordinatorConfig,
    state: watch::Sender<ListState>,
    last_failed: Mutex<Option<Action>>,
    retries: AtomicU32,
    // Serializes regenerations so a fired timer and a flush never interleave
    regenerating: tokio::sync::Mutex<()>,
}

/// Owns the observable list the front end renders.
///
/// Mutations are applied locally first, then persisted. A failed call puts
/// the pre-image back and records the action for a bounded number of
/// explicit retries. Meal-plan changes trigger a debounced regeneration.
pub struct ListCoordinator {
    shared: Arc<Shared>,
    pending: Mutex<Option<PendingRegeneration>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ListCoordinator {
    pub fn new(ports: CoordinatorPorts, window: DateWindow, config: CoordinatorConfig) -> Self {
        let (state, _) = watch::channel(ListState::default());
        let generator = ShoppingListGenerator::new(ports.store.clone());
        Self {
            shared: Arc::new(Shared {
                ports,
                generator,
                window,
                config,
                state,
                last_failed: Mutex::new(None),
                retries: AtomicU32::new(0),
                regenerating: tokio::sync::Mutex::new(()),
            }),
            pending: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn window(&self) -> DateWindow {
        self.shared.window
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ListState> {
        self.shared.state.subscribe()
    }

    #[must_use]
    pub fn state(&self) -> ListState {
        self.shared.state.borrow().clone()
    }

    /// Replace local state with the persisted list.
    pub async fn load(&self) -> Result<()> {
        self.shared.state.send_modify(|s| s.loading = true);
        match self.shared.ports.store.get_all().await {
            Ok(items) => {
                self.shared.state.send_modify(|s| {
                    s.items = items;
                    s.loading = false;
                    s.error = None;
                });
                Ok(())
            }
            Err(err) => {
                self.shared.state.send_modify(|s| {
                    s.loading = false;
                    s.error = Some(err.to_string());
                });
                Err(err)
            }
        }
    }

    pub async fn add_manual_item(&self, input: NewManualItem) -> Result<()> {
        let checked_name = validate_item_name(&input.name)
            .and_then(|name| validate_quantity(input.quantity).map(|()| name));
        let name = match checked_name {
            Ok(name) => name,
            Err(err) => {
                self.shared
                    .state
                    .send_modify(|s| s.error = Some(err.to_string()));
                return Err(err.into());
            }
        };
        self.begin_action();
        self.shared
            .execute(Action::AddManual(NewManualItem { name, ..input }))
            .await
    }

    pub async fn toggle_checked(&self, id: &str) -> Result<()> {
        let current = self
            .shared
            .state
            .borrow()
            .items
            .iter()
            .find(|i| i.id == id)
            .map(|i| i.checked);
        let Some(checked) = current else {
            bail!("Shopping list item not found");
        };
        self.begin_action();
        self.shared
            .execute(Action::SetChecked {
                id: id.to_string(),
                checked: !checked,
            })
            .await
    }

    pub async fn delete_item(&self, id: &str) -> Result<()> {
        self.begin_action();
        self.shared.execute(Action::Delete(id.to_string())).await
    }

    /// Drop every row attributed to `recipe_id`.
    pub async fn remove_recipe(&self, recipe_id: &str) -> Result<()> {
        self.begin_action();
        self.shared
            .execute(Action::RemoveRecipe(recipe_id.to_string()))
            .await
    }

    pub async fn clear_checked(&self) -> Result<()> {
        let ids: Vec<String> = self
            .shared
            .state
            .borrow()
            .items
            .iter()
            .filter(|i| i.checked)
            .map(|i| i.id.clone())
            .collect();
        if ids.is_empty() {
            return Ok(());
        }
        self.begin_action();
        self.shared.execute(Action::DeleteMany(ids)).await
    }

    pub async fn clear_all(&self) -> Result<()> {
        self.begin_action();
        self.shared.execute(Action::ClearAll).await
    }

    /// Rebuild recipe rows from the meal-plan queue right away.
    pub async fn regenerate(&self) -> Result<()> {
        self.begin_action();
        self.shared.regenerate().await
    }

    /// Restart the debounce timer. Only the last trigger in a burst regenerates.
    pub fn schedule_regeneration(&self) {
        let mut pending = lock(&self.pending);
        if let Some(previous) = pending.take() {
            previous.cancel();
        }

        let phase = Arc::new(AtomicU8::new(TIMER_WAITING));
        let shared = Arc::clone(&self.shared);
        let task_phase = Arc::clone(&phase);
        let delay = self.shared.config.debounce;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if task_phase
                .compare_exchange(TIMER_WAITING, TIMER_STARTED, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
            {
                return Ok(());
            }
            shared.regenerate().await
        });
        debug!(?delay, "regeneration scheduled");
        *pending = Some(PendingRegeneration { phase, handle });
    }

    /// Run a scheduled regeneration now instead of waiting out the timer.
    /// Does nothing when nothing is scheduled.
    pub async fn flush(&self) -> Result<()> {
        let Some(pending) = lock(&self.pending).take() else {
            return Ok(());
        };
        if pending.cancel() {
            self.shared.regenerate().await
        } else {
            pending
                .handle
                .await
                .map_err(|e| anyhow!("Regeneration task failed: {e}"))?
        }
    }

    /// Replay the last failed action.
    pub async fn retry_last(&self) -> Result<()> {
        let Some(action) = lock(&self.shared.last_failed).clone() else {
            return Err(CoordinatorError::NothingToRetry.into());
        };

        let max = self.shared.config.max_retries;
        if self.shared.retries.load(Ordering::SeqCst) >= max {
            let err = CoordinatorError::RetryLimitReached { max };
            self.shared
                .state
                .send_modify(|s| s.error = Some(err.to_string()));
            return Err(err.into());
        }
        let attempt = self.shared.retries.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(action = action.label(), attempt, "retrying");

        let result = match action {
            Action::Regenerate => self.shared.regenerate().await,
            other => self.shared.execute(other).await,
        };
        if result.is_ok() {
            self.shared.retries.store(0, Ordering::SeqCst);
            *lock(&self.shared.last_failed) = None;
        }
        result
    }

    /// Cancel a scheduled regeneration that has not fired yet.
    pub fn shutdown(&self) {
        if let Some(pending) = lock(&self.pending).take() {
            if pending.cancel() {
                debug!("cancelled scheduled regeneration");
            }
        }
    }

    /// A fresh user action supersedes the last failure and its retry budget.
    fn begin_action(&self) {
        self.shared.retries.store(0, Ordering::SeqCst);
        *lock(&self.shared.last_failed) = None;
    }
}

impl Drop for ListCoordinator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl Shared {
    fn items(&self) -> Vec<ShoppingListItem> {
        self.state.borrow().items.clone()
    }

    fn record_failure(&self, action: Action) {
        *lock(&self.last_failed) = Some(action);
    }

    /// Apply optimistically, persist, and roll back to the pre-image on failure.
    async fn execute(&self, action: Action) -> Result<()> {
        let before = self.items();
        let mut optimistic = before.clone();
        apply_locally(&mut optimistic, &action);
        self.state.send_modify(|s| {
            s.items = optimistic;
            s.error = None;
        });

        match self.persist(&action).await {
            Ok(Persisted::Done) => Ok(()),
            Ok(Persisted::Replace { id, item }) => {
                self.state.send_modify(|s| {
                    if let Some(slot) = s.items.iter_mut().find(|i| i.id == id) {
                        *slot = item;
                    }
                });
                Ok(())
            }
            Err(err) => {
                warn!(action = action.label(), error = %err, "persisting failed, rolled back");
                self.state.send_modify(|s| {
                    s.items = before;
                    s.error = Some(err.to_string());
                });
                self.record_failure(action);
                Err(err)
            }
        }
    }

    async fn persist(&self, action: &Action) -> Result<Persisted> {
        let store = &self.ports.store;
        match action {
            Action::AddManual(input) => {
                let item = self.generator.add_manual_item(input.clone()).await?;
                Ok(Persisted::Replace {
                    id: placeholder_id(input),
                    item,
                })
            }
            Action::SetChecked { id, checked } => {
                let item = store.update_checked_state(id, *checked).await?;
                Ok(Persisted::Replace {
                    id: id.clone(),
                    item,
                })
            }
            Action::Delete(id) => {
                store.delete_item(id).await?;
                Ok(Persisted::Done)
            }
            Action::RemoveRecipe(recipe_id) => {
                self.generator.remove_recipe_ingredients(recipe_id).await?;
                Ok(Persisted::Done)
            }
            Action::DeleteMany(ids) => {
                store.delete_items(ids).await?;
                Ok(Persisted::Done)
            }
            Action::ClearAll => {
                self.generator.clear_all_items().await?;
                Ok(Persisted::Done)
            }
            Action::Regenerate => bail!("Regeneration is not applied optimistically"),
        }
    }

    /// Not optimistic: on failure the previous items stay visible.
    async fn regenerate(&self) -> Result<()> {
        let _guard = self.regenerating.lock().await;
        self.state.send_modify(|s| s.loading = true);

        let result = async {
            let recipes = load_queued_recipes(
                self.ports.queue.as_ref(),
                self.ports.recipes.as_ref(),
                &self.window,
            )
            .await?;
            self.generator.regenerate_list(&recipes).await
        }
        .await;

        match result {
            Ok(items) => {
                debug!(items = items.len(), "regenerated shopping list");
                self.state.send_modify(|s| {
                    s.items = items;
                    s.loading = false;
                    s.error = None;
                });
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "regeneration failed, keeping previous list");
                self.state.send_modify(|s| {
                    s.loading = false;
                    s.error = Some(err.to_string());
                });
                self.record_failure(Action::Regenerate);
                Err(err)
            }
        }
    }
}

/// Temporary id for an optimistic manual row, derived from the input so the
/// persisted row can replace it.
fn placeholder_id(input: &NewManualItem) -> String {
    format!("pending:{}", input.name)
}

fn apply_locally(items: &mut Vec<ShoppingListItem>, action: &Action) {
    match action {
        Action::AddManual(input) => {
            items.push(ShoppingListItem {
                id: placeholder_id(input),
                name: input.name.clone(),
                quantity: input.quantity,
                unit: input.unit,
                checked: false,
                recipe_id: None,
                meal_plan_id: None,
                category: input.category.unwrap_or_else(|| classify(&input.name)),
                source: ItemSource::Manual,
                original_name: None,
                created_at: Local::now().to_rfc3339(),
            });
            items.sort_by_key(|i| i.category);
        }
        Action::SetChecked { id, checked } => {
            if let Some(item) = items.iter_mut().find(|i| &i.id == id) {
                item.checked = *checked;
            }
        }
        Action::Delete(id) => items.retain(|i| &i.id != id),
        Action::RemoveRecipe(recipe_id) => {
            items.retain(|i| i.recipe_id.as_deref() != Some(recipe_id.as_str()));
        }
        Action::DeleteMany(ids) => items.retain(|i| !ids.contains(&i.id)),
        Action::ClearAll => items.clear(),
        Action::Regenerate => {}
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::error::{ValidationError, is_validation_error};
    use crate::models::{Ingredient, MeasurementUnit, NewMealPlanEntry};
    use crate::testing::RecordingStore;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 10).unwrap()
    }

    fn coordinator(store: &Arc<RecordingStore>) -> ListCoordinator {
        let ports = CoordinatorPorts {
            store: store.clone(),
            recipes: Arc::new(store.inner.clone()),
            queue: Arc::new(store.inner.clone()),
        };
        ListCoordinator::new(ports, DateWindow::starting(day(), 7), CoordinatorConfig::default())
    }

    fn plan_recipe(store: &RecordingStore, name: &str, ingredients: &[Ingredient]) -> String {
        store
            .inner
            .with_db(|db| {
                let recipe = db.create_recipe(name)?;
                for ingredient in ingredients {
                    db.add_recipe_ingredient(&recipe.id, ingredient)?;
                }
                db.add_meal_plan_entry(&NewMealPlanEntry {
                    recipe_id: recipe.id.clone(),
                    date: day(),
                    meal_type: "dinner".to_string(),
                })?;
                Ok(recipe.id)
            })
            .unwrap()
    }

    fn manual(name: &str) -> NewManualItem {
        NewManualItem {
            name: name.to_string(),
            ..Default::default()
        }
    }

    fn regenerations(store: &RecordingStore) -> usize {
        store
            .calls()
            .iter()
            .filter(|c| *c == "delete_by_source(recipe)")
            .count()
    }

    #[tokio::test]
    async fn test_add_manual_item_replaces_placeholder() {
        let store = RecordingStore::new();
        let coordinator = coordinator(&store);
        coordinator.add_manual_item(manual(" batteries ")).await.unwrap();

        let state = coordinator.state();
        assert_eq!(state.items.len(), 1);
        let item = &state.items[0];
        assert_eq!(item.name, "batteries");
        assert!(!item.id.starts_with("pending:"));
        assert_eq!(item.category, ShoppingListCategory::Other);
        assert_eq!(state.error, None);
    }

    #[tokio::test]
    async fn test_failed_add_rolls_back_and_retries() {
        let store = RecordingStore::new();
        let coordinator = coordinator(&store);
        coordinator.add_manual_item(manual("milk")).await.unwrap();
        let before = coordinator.state().items;

        store.fail("create_item");
        let err = coordinator.add_manual_item(manual("tape")).await.unwrap_err();
        assert_eq!(err.to_string(), "simulated create_item failure");
        let state = coordinator.state();
        assert_eq!(state.items, before);
        assert_eq!(state.error.as_deref(), Some("simulated create_item failure"));

        store.recover("create_item");
        coordinator.retry_last().await.unwrap();
        let state = coordinator.state();
        assert_eq!(state.items.len(), 2);
        assert_eq!(state.error, None);
        assert!(state.items.iter().all(|i| !i.id.starts_with("pending:")));

        let err = coordinator.retry_last().await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<CoordinatorError>(),
            Some(&CoordinatorError::NothingToRetry)
        );
    }

    #[tokio::test]
    async fn test_validation_error_skips_store_and_retry() {
        let store = RecordingStore::new();
        let coordinator = coordinator(&store);

        let err = coordinator.add_manual_item(manual("   ")).await.unwrap_err();
        assert!(is_validation_error(&err));
        assert_eq!(
            coordinator.state().error.as_deref(),
            Some(ValidationError::EmptyName.to_string().as_str())
        );
        assert!(store.calls().is_empty());
        assert!(coordinator.retry_last().await.is_err());
    }

    #[tokio::test]
    async fn test_toggle_and_delete_roll_back_on_failure() {
        let store = RecordingStore::new();
        let coordinator = coordinator(&store);
        coordinator.add_manual_item(manual("eggs")).await.unwrap();
        let id = coordinator.state().items[0].id.clone();

        coordinator.toggle_checked(&id).await.unwrap();
        assert!(coordinator.state().items[0].checked);
        assert_eq!(coordinator.state().checked_count(), 1);

        store.fail("update_checked_state");
        assert!(coordinator.toggle_checked(&id).await.is_err());
        assert!(coordinator.state().items[0].checked);

        store.fail("delete_item");
        assert!(coordinator.delete_item(&id).await.is_err());
        assert_eq!(coordinator.state().items.len(), 1);

        assert!(coordinator.toggle_checked("missing").await.is_err());
    }

    #[tokio::test]
    async fn test_retry_limit() {
        let store = RecordingStore::new();
        let coordinator = coordinator(&store);
        coordinator.add_manual_item(manual("eggs")).await.unwrap();
        let id = coordinator.state().items[0].id.clone();

        store.fail("delete_item");
        assert!(coordinator.delete_item(&id).await.is_err());
        for _ in 0..3 {
            let err = coordinator.retry_last().await.unwrap_err();
            assert_eq!(err.to_string(), "simulated delete_item failure");
        }
        let err = coordinator.retry_last().await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<CoordinatorError>(),
            Some(&CoordinatorError::RetryLimitReached { max: 3 })
        );
        assert_eq!(coordinator.state().items.len(), 1);

        // A new user action starts a fresh budget
        store.recover("delete_item");
        coordinator.delete_item(&id).await.unwrap();
        assert!(coordinator.state().items.is_empty());
    }

    #[tokio::test]
    async fn test_clear_checked_and_remove_recipe() {
        let store = RecordingStore::new();
        let recipe_id = plan_recipe(
            &store,
            "Omelette",
            &[Ingredient::new("eggs", Some(3.0), None)],
        );
        let coordinator = coordinator(&store);
        coordinator.regenerate().await.unwrap();
        coordinator.add_manual_item(manual("bread")).await.unwrap();

        let bread = coordinator
            .state()
            .items
            .iter()
            .find(|i| i.name == "bread")
            .map(|i| i.id.clone())
            .unwrap();
        coordinator.toggle_checked(&bread).await.unwrap();
        coordinator.clear_checked().await.unwrap();
        let names: Vec<String> = coordinator.state().items.into_iter().map(|i| i.name).collect();
        assert_eq!(names, vec!["egg"]);

        coordinator.remove_recipe(&recipe_id).await.unwrap();
        assert!(coordinator.state().items.is_empty());
        assert!(store.inner.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_clear_checked_matches_store() {
        let store = RecordingStore::new();
        let coordinator = coordinator(&store);
        for name in ["milk", "eggs", "bread"] {
            coordinator.add_manual_item(manual(name)).await.unwrap();
        }
        let ids: Vec<String> = coordinator.state().items.iter().map(|i| i.id.clone()).collect();
        coordinator.toggle_checked(&ids[0]).await.unwrap();
        coordinator.toggle_checked(&ids[2]).await.unwrap();

        store.reset_calls();
        store.fail("delete_items");
        assert!(coordinator.clear_checked().await.is_err());
        assert_eq!(store.calls(), vec!["delete_items(2)"]);

        let sorted = |mut items: Vec<ShoppingListItem>| {
            items.sort_by(|a, b| a.id.cmp(&b.id));
            items
        };
        let persisted = store.inner.get_all().await.unwrap();
        assert_eq!(persisted.len(), 3);
        assert_eq!(sorted(coordinator.state().items), sorted(persisted));

        store.recover("delete_items");
        coordinator.retry_last().await.unwrap();
        let names: Vec<String> = coordinator.state().items.into_iter().map(|i| i.name).collect();
        assert_eq!(names, vec!["eggs"]);
        assert_eq!(store.inner.get_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_regenerate_failure_keeps_previous_items() {
        let store = RecordingStore::new();
        plan_recipe(
            &store,
            "Pancakes",
            &[
                Ingredient::new("milk", Some(1.0), Some(MeasurementUnit::Cup)),
                Ingredient::new("flour", Some(2.0), Some(MeasurementUnit::Cup)),
            ],
        );
        let coordinator = coordinator(&store);
        coordinator.regenerate().await.unwrap();
        let before = coordinator.state();
        assert_eq!(before.items.len(), 2);
        assert!(!before.loading);

        store.fail("create_bulk");
        assert!(coordinator.regenerate().await.is_err());
        let after = coordinator.state();
        assert_eq!(after.items, before.items);
        assert!(!after.loading);
        assert_eq!(after.error.as_deref(), Some("simulated create_bulk failure"));

        store.recover("create_bulk");
        coordinator.retry_last().await.unwrap();
        assert_eq!(coordinator.state().items.len(), 2);
        assert_eq!(coordinator.state().error, None);
    }

    #[tokio::test]
    async fn test_load_and_grouped_view() {
        let store = RecordingStore::new();
        let generator = ShoppingListGenerator::new(store.clone());
        generator.add_manual_item(manual("tape")).await.unwrap();
        generator.add_manual_item(manual("apples")).await.unwrap();

        let coordinator = coordinator(&store);
        let mut rx = coordinator.subscribe();
        coordinator.load().await.unwrap();
        assert!(rx.has_changed().unwrap());

        let state = rx.borrow_and_update().clone();
        let grouped = state.grouped();
        let keys: Vec<ShoppingListCategory> = grouped.keys().copied().collect();
        assert_eq!(keys, vec![ShoppingListCategory::Produce, ShoppingListCategory::Other]);
        assert_eq!(state.flat().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_of_triggers_regenerates_once() {
        let store = RecordingStore::new();
        plan_recipe(&store, "Toast", &[Ingredient::new("bread", Some(2.0), Some(MeasurementUnit::Slice))]);
        let coordinator = coordinator(&store);

        for _ in 0..3 {
            coordinator.schedule_regeneration();
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        assert_eq!(regenerations(&store), 0);

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(regenerations(&store), 1);
        assert_eq!(coordinator.state().items.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_runs_pending_regeneration_now() {
        let store = RecordingStore::new();
        plan_recipe(&store, "Toast", &[Ingredient::new("bread", Some(2.0), None)]);
        let coordinator = coordinator(&store);

        coordinator.schedule_regeneration();
        coordinator.flush().await.unwrap();
        assert_eq!(regenerations(&store), 1);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(regenerations(&store), 1);

        // Nothing pending
        coordinator.flush().await.unwrap();
        assert_eq!(regenerations(&store), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_and_drop_cancel_timer() {
        let store = RecordingStore::new();
        let coordinator = coordinator(&store);
        coordinator.schedule_regeneration();
        coordinator.shutdown();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(regenerations(&store), 0);

        let dropped = self::coordinator(&store);
        dropped.schedule_regeneration();
        drop(dropped);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(regenerations(&store), 0);
    }
}
