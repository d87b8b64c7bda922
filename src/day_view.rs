//! A live view of the expenses attributed to a selected day.
//!
//! A [DayView] owns a background task that reloads the selected day's expenses
//! whenever the selection changes or the store reports a new expense for that
//! day. Consumers subscribe to a [watch] channel that always holds the latest
//! snapshot.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use tokio::{
    sync::{broadcast, watch},
    task::JoinHandle,
};

use crate::{
    Error,
    day::Day,
    expense::Expense,
    stores::{ExpenseStore, StoreChange},
};

/// The expenses for one day, most recent first.
#[derive(Debug, Clone, PartialEq)]
pub struct DaySnapshot {
    /// The day the expenses are attributed to.
    pub day: Day,
    /// The day's expenses, most recent first.
    ///
    /// Empty when `error` is set.
    pub expenses: Vec<Expense>,
    /// Why the day's expenses could not be loaded, if they could not.
    pub error: Option<Arc<Error>>,
}

impl DaySnapshot {
    /// A snapshot of `day` with no expenses.
    pub fn empty(day: Day) -> Self {
        Self {
            day,
            expenses: Vec::new(),
            error: None,
        }
    }

    fn failed(day: Day, error: Error) -> Self {
        Self {
            day,
            expenses: Vec::new(),
            error: Some(Arc::new(error)),
        }
    }

    /// The sum of the amounts in the snapshot.
    pub fn total(&self) -> f64 {
        self.expenses.iter().map(|expense| expense.amount).sum()
    }
}

/// A subscription to the expenses of a selected day.
///
/// Selecting a new day supersedes the previous selection: a reload that was
/// started for an older selection is discarded rather than published, so
/// subscribers never see an older day's expenses after a newer day's.
///
/// A reload that fails is published as a snapshot with its `error` set, so
/// subscribers learn that the list for the selected day is unavailable.
///
/// Dropping the view stops the background task. Stored expenses are not
/// affected.
pub struct DayView {
    selection: watch::Sender<Day>,
    snapshots: watch::Receiver<DaySnapshot>,
    generation: Arc<AtomicU64>,
    task: JoinHandle<()>,
}

impl DayView {
    /// Start watching the expenses for `day`.
    ///
    /// Until the first reload finishes, subscribers see an empty list for `day`.
    ///
    /// # Panics
    /// Panics if called outside of a Tokio runtime.
    pub fn spawn<S>(store: S, day: Day) -> Self
    where
        S: ExpenseStore + Clone + Send + Sync + 'static,
    {
        let (selection, selection_receiver) = watch::channel(day);
        let (snapshot_sender, snapshots) = watch::channel(DaySnapshot::empty(day));
        let generation = Arc::new(AtomicU64::new(0));

        // Subscribe before the first reload so no insert can slip between them.
        let changes = store.subscribe();

        let task = tokio::spawn(reload_loop(
            store,
            selection_receiver,
            changes,
            generation.clone(),
            snapshot_sender,
        ));

        Self {
            selection,
            snapshots,
            generation,
            task,
        }
    }

    /// Show the expenses for `day` instead of the current selection.
    pub fn select(&self, day: Day) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.selection.send_replace(day);
        tracing::debug!("Selected day {day}");
    }

    /// The currently selected day.
    pub fn selected(&self) -> Day {
        *self.selection.borrow()
    }

    /// A clone of the latest snapshot.
    pub fn latest(&self) -> DaySnapshot {
        self.snapshots.borrow().clone()
    }

    /// Listen for snapshots.
    ///
    /// The receiver starts out marked as changed, so its first
    /// [changed](watch::Receiver::changed) call resolves immediately with the
    /// latest snapshot.
    pub fn subscribe(&self) -> watch::Receiver<DaySnapshot> {
        let mut receiver = self.snapshots.clone();
        receiver.mark_changed();
        receiver
    }
}

impl Drop for DayView {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn reload_loop<S>(
    store: S,
    mut selection: watch::Receiver<Day>,
    mut changes: broadcast::Receiver<StoreChange>,
    generation: Arc<AtomicU64>,
    snapshots: watch::Sender<DaySnapshot>,
) where
    S: ExpenseStore + Clone + Send + Sync + 'static,
{
    loop {
        // Read the generation before the day so a concurrent `select` always
        // leaves them mismatched rather than silently matching an old day.
        let requested = generation.load(Ordering::Acquire);
        let day = *selection.borrow_and_update();

        let snapshot = load_day(store.clone(), day).await;

        if generation.load(Ordering::Acquire) != requested {
            tracing::debug!("Discarding expenses for day {day}, a newer day was selected");
            continue;
        }

        if let Some(snapshot) = snapshot {
            snapshots.send_replace(snapshot);
        }

        if !wait_for_change(&mut selection, &mut changes, day).await {
            break;
        }
    }
}

/// Returns `None` only if the blocking query never finished, e.g. during
/// runtime shutdown.
async fn load_day<S>(store: S, day: Day) -> Option<DaySnapshot>
where
    S: ExpenseStore + Send + 'static,
{
    match tokio::task::spawn_blocking(move || store.query_by_date(day)).await {
        Ok(Ok(expenses)) => Some(DaySnapshot {
            day,
            expenses,
            error: None,
        }),
        Ok(Err(error)) => {
            tracing::error!("Could not load expenses for day {day}: {error}");
            Some(DaySnapshot::failed(day, error))
        }
        Err(error) => {
            tracing::error!("Loading expenses for day {day} did not finish: {error}");
            None
        }
    }
}

/// Wait until the selection changes or an expense is added to `day`.
///
/// Returns `false` once the view that owns the selection has been dropped.
async fn wait_for_change(
    selection: &mut watch::Receiver<Day>,
    changes: &mut broadcast::Receiver<StoreChange>,
    day: Day,
) -> bool {
    loop {
        tokio::select! {
            changed = selection.changed() => return changed.is_ok(),
            change = changes.recv() => match change {
                Ok(change) if change.day() == day => return true,
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("Missed {skipped} store change(s), reloading day {day}");
                    return true;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return selection.changed().await.is_ok();
                }
            },
        }
    }
}
