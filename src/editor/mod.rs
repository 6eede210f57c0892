//! Note editor draft lifecycle: dirty tracking against the last persisted
//! snapshot, idle-interval autosave, explicit save, status decay and the
//! navigation guard. The controller is poll-driven; the host calls [`poll`]
//! on its tick loop and the controller decides when a save is due.
//!
//! [`poll`]: DraftController::poll

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::config::AutoSaveConfig;
use crate::model::{Note, PrivacyLevel};
use crate::remote::TableStore;
use crate::services::NotesService;

mod draft;
mod store;

pub use draft::{Draft, FieldSnapshot};
pub use store::{DraftKey, DraftRecord, DraftStore, FileDraftStore, MemoryDraftStore};

/// Time source for the idle timer and the status display windows. Injected so
/// the whole lifecycle is deterministic under test.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;

    fn wall(&self) -> OffsetDateTime;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn wall(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> Instant {
        (**self).now()
    }

    fn wall(&self) -> OffsetDateTime {
        (**self).wall()
    }
}

impl<S: DraftStore + ?Sized> DraftStore for Arc<S>
where
    Arc<S>: Send,
{
    fn get(&self, key: DraftKey) -> Result<Option<DraftRecord>> {
        (**self).get(key)
    }

    fn set(&self, key: DraftKey, record: &DraftRecord) -> Result<()> {
        (**self).set(key, record)
    }

    fn remove(&self, key: DraftKey) -> Result<()> {
        (**self).remove(key)
    }

    fn list(&self, user_id: Uuid) -> Result<Vec<DraftRecord>> {
        (**self).list(user_id)
    }
}

/// Save indicator as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveStatus {
    Idle,
    Dirty,
    Saving,
    Saved,
    Error { message: String },
}

#[derive(Debug)]
enum Phase {
    Idle,
    Dirty,
    Saving,
    Saved { since: Instant },
    Error { message: String, since: Instant },
}

/// What a save attempt did. Failures are part of the lifecycle, not errors;
/// the draft stays dirty and the user decides whether to retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    /// Blank drafts are never sent; nothing changed.
    Skipped,
    Failed {
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationGuard {
    Proceed,
    PromptUnsaved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveChoice {
    SaveAndLeave,
    Discard,
    Cancel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaveOutcome {
    Left,
    Stayed { reason: Option<String> },
}

pub struct DraftController<R, S, C> {
    notes: NotesService<R>,
    store: S,
    clock: C,
    config: AutoSaveConfig,
    draft: Draft,
    phase: Phase,
    dirty_since: Option<Instant>,
    last_saved_at: Option<OffsetDateTime>,
}

impl<R, S, C> DraftController<R, S, C>
where
    R: TableStore,
    S: DraftStore,
    C: Clock,
{
    /// Open the editor over an existing note or a blank draft. Returns the
    /// controller plus a surviving fallback draft, if one differs from the
    /// persisted snapshot; the caller offers it for recovery.
    pub fn open(
        notes: NotesService<R>,
        store: S,
        clock: C,
        config: AutoSaveConfig,
        user_id: Uuid,
        note: Option<&Note>,
    ) -> Result<(Self, Option<DraftRecord>)> {
        let draft = match note {
            Some(note) => Draft::from_note(note),
            None => Draft::new(user_id),
        };
        let recovery = if config.fallback_drafts {
            store
                .get(DraftKey::for_draft(&draft))?
                .filter(|record| record_differs(record, &draft))
        } else {
            None
        };
        let controller = Self {
            notes,
            store,
            clock,
            config,
            draft,
            phase: Phase::Idle,
            dirty_since: None,
            last_saved_at: note.map(|note| note.updated_at),
        };
        Ok((controller, recovery))
    }

    pub fn draft(&self) -> &Draft {
        &self.draft
    }

    pub fn is_dirty(&self) -> bool {
        self.draft.is_dirty()
    }

    pub fn last_saved_at(&self) -> Option<OffsetDateTime> {
        self.last_saved_at
    }

    pub fn status(&self) -> SaveStatus {
        match &self.phase {
            Phase::Idle => SaveStatus::Idle,
            Phase::Dirty => SaveStatus::Dirty,
            Phase::Saving => SaveStatus::Saving,
            Phase::Saved { .. } => SaveStatus::Saved,
            Phase::Error { message, .. } => SaveStatus::Error {
                message: message.clone(),
            },
        }
    }

    /// Adopt a recovered fallback draft as the working copy. The adopted
    /// edits count as already-idle so the next poll saves them immediately.
    pub fn adopt_recovery(&mut self, record: &DraftRecord) {
        self.draft.title = record.title.clone();
        self.draft.content = record.content.clone();
        self.draft.category_id = record.category_id;
        self.draft.privacy_level = record.privacy_level;
        self.draft.is_encrypted = record.is_encrypted;
        let now = self.clock.now();
        self.dirty_since = Some(
            now.checked_sub(self.config.idle_interval())
                .unwrap_or(now),
        );
        self.phase = Phase::Dirty;
    }

    pub fn set_title(&mut self, title: &str) -> Result<()> {
        if self.draft.title == title {
            return Ok(());
        }
        self.draft.title = title.to_string();
        self.after_edit()
    }

    pub fn set_content(&mut self, content: &str) -> Result<()> {
        if self.draft.content == content {
            return Ok(());
        }
        self.draft.content = content.to_string();
        self.after_edit()
    }

    pub fn set_category(&mut self, category_id: Option<Uuid>) -> Result<()> {
        if self.draft.category_id == category_id {
            return Ok(());
        }
        self.draft.category_id = category_id;
        self.after_edit()
    }

    pub fn set_privacy(&mut self, privacy: PrivacyLevel) -> Result<()> {
        if self.draft.privacy_level == privacy {
            return Ok(());
        }
        self.draft.privacy_level = privacy;
        self.after_edit()
    }

    pub fn set_encrypted(&mut self, encrypted: bool) -> Result<()> {
        if self.draft.is_encrypted == encrypted {
            return Ok(());
        }
        self.draft.is_encrypted = encrypted;
        self.after_edit()
    }

    /// Decay transient statuses. Called from [`poll`]; hosts that render a
    /// status line between polls may also call it directly.
    ///
    /// [`poll`]: Self::poll
    pub fn tick(&mut self) {
        let now = self.clock.now();
        let expired = match &self.phase {
            Phase::Saved { since } => {
                now.duration_since(*since) >= self.config.saved_display()
            }
            Phase::Error { since, .. } => {
                now.duration_since(*since) >= self.config.error_display()
            }
            _ => false,
        };
        if expired {
            self.phase = if self.draft.is_dirty() {
                Phase::Dirty
            } else {
                Phase::Idle
            };
        }
    }

    /// Drive the autosave timer: fires exactly one save once the draft has
    /// been dirty and untouched for the idle interval.
    pub async fn poll(&mut self) -> Result<Option<SaveOutcome>> {
        self.tick();
        if !self.config.enabled || !self.draft.is_dirty() || self.draft.is_blank() {
            return Ok(None);
        }
        let due = self
            .dirty_since
            .map(|since| self.clock.now().duration_since(since) >= self.config.idle_interval())
            .unwrap_or(false);
        if !due {
            return Ok(None);
        }
        self.save().await.map(Some)
    }

    /// Persist the draft to the remote. Blank drafts are skipped without a
    /// network call; failures surface as an [`SaveOutcome::Failed`] value and
    /// leave the draft dirty with no automatic retry.
    pub async fn save(&mut self) -> Result<SaveOutcome> {
        if self.draft.is_blank() {
            return Ok(SaveOutcome::Skipped);
        }
        self.phase = Phase::Saving;
        let result = match self.draft.note_id {
            Some(note_id) => {
                self.notes
                    .update(self.draft.user_id, note_id, self.draft.to_patch())
                    .await
            }
            None => self.notes.create(self.draft.to_new_note()).await,
        };
        match result {
            Ok(saved) => {
                // The first save assigns an id, which moves the fallback key.
                let stale_key = DraftKey::for_draft(&self.draft);
                self.draft.reconcile(&saved);
                self.dirty_since = None;
                self.last_saved_at = Some(saved.updated_at);
                self.phase = Phase::Saved {
                    since: self.clock.now(),
                };
                if self.config.fallback_drafts {
                    self.store.remove(stale_key)?;
                    self.store.remove(DraftKey::for_draft(&self.draft))?;
                }
                Ok(SaveOutcome::Saved)
            }
            Err(err) => {
                let message = err.to_string();
                tracing::warn!(error = %message, "draft save failed");
                // The timer is cancelled so the failure is not retried until
                // the user edits or saves again.
                self.dirty_since = None;
                self.phase = Phase::Error {
                    message: message.clone(),
                    since: self.clock.now(),
                };
                Ok(SaveOutcome::Failed { message })
            }
        }
    }

    pub fn navigation_guard(&self) -> NavigationGuard {
        if self.draft.is_dirty() {
            NavigationGuard::PromptUnsaved
        } else {
            NavigationGuard::Proceed
        }
    }

    /// Resolve the unsaved-changes prompt. Leaving, by any route, cancels the
    /// pending autosave timer.
    pub async fn leave(&mut self, choice: LeaveChoice) -> Result<LeaveOutcome> {
        match choice {
            LeaveChoice::SaveAndLeave => match self.save().await? {
                SaveOutcome::Failed { message } => Ok(LeaveOutcome::Stayed {
                    reason: Some(message),
                }),
                SaveOutcome::Saved | SaveOutcome::Skipped => {
                    self.dirty_since = None;
                    Ok(LeaveOutcome::Left)
                }
            },
            LeaveChoice::Discard => {
                if self.config.fallback_drafts {
                    self.store.remove(DraftKey::for_draft(&self.draft))?;
                }
                self.dirty_since = None;
                Ok(LeaveOutcome::Left)
            }
            LeaveChoice::Cancel => Ok(LeaveOutcome::Stayed { reason: None }),
        }
    }

    fn after_edit(&mut self) -> Result<()> {
        if self.draft.is_dirty() {
            self.phase = Phase::Dirty;
            self.dirty_since = Some(self.clock.now());
            if self.config.fallback_drafts {
                self.store
                    .set(DraftKey::for_draft(&self.draft), &DraftRecord::capture(&self.draft))?;
            }
        } else {
            // The edit restored the snapshot values.
            self.phase = Phase::Idle;
            self.dirty_since = None;
            if self.config.fallback_drafts {
                self.store.remove(DraftKey::for_draft(&self.draft))?;
            }
        }
        Ok(())
    }
}

fn record_differs(record: &DraftRecord, draft: &Draft) -> bool {
    record.title != draft.title
        || record.content != draft.content
        || record.category_id != draft.category_id
        || record.privacy_level != draft.privacy_level
        || record.is_encrypted != draft.is_encrypted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryRemote;
    use assert_matches::assert_matches;
    use parking_lot::Mutex;
    use std::time::Duration;

    struct ManualClock {
        now: Mutex<Instant>,
    }

    impl ManualClock {
        fn new() -> Arc<Self> {
            // Pre-aged so "already idle" instants can be represented.
            let base = Instant::now();
            Arc::new(Self {
                now: Mutex::new(base + Duration::from_secs(3600)),
            })
        }

        fn advance(&self, by: Duration) {
            let mut now = self.now.lock();
            *now += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            *self.now.lock()
        }

        fn wall(&self) -> OffsetDateTime {
            OffsetDateTime::now_utc()
        }
    }

    struct Harness {
        remote: Arc<MemoryRemote>,
        store: Arc<MemoryDraftStore>,
        clock: Arc<ManualClock>,
        user_id: Uuid,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                remote: Arc::new(MemoryRemote::new()),
                store: Arc::new(MemoryDraftStore::new()),
                clock: ManualClock::new(),
                user_id: Uuid::new_v4(),
            }
        }

        fn open(
            &self,
            note: Option<&Note>,
        ) -> DraftController<MemoryRemote, Arc<MemoryDraftStore>, Arc<ManualClock>> {
            let (controller, _) = DraftController::open(
                NotesService::new(Arc::clone(&self.remote)),
                Arc::clone(&self.store),
                Arc::clone(&self.clock),
                AutoSaveConfig::default(),
                self.user_id,
                note,
            )
            .unwrap();
            controller
        }
    }

    const IDLE: Duration = Duration::from_secs(30);

    #[tokio::test]
    async fn typing_then_idle_autosaves_exactly_once() {
        let harness = Harness::new();
        let mut editor = harness.open(None);

        editor.set_content("Hello").unwrap();
        assert_eq!(editor.status(), SaveStatus::Dirty);

        harness.clock.advance(Duration::from_secs(10));
        assert_eq!(editor.poll().await.unwrap(), None);

        harness.clock.advance(IDLE);
        assert_eq!(editor.poll().await.unwrap(), Some(SaveOutcome::Saved));
        assert_eq!(editor.status(), SaveStatus::Saved);
        assert_eq!(harness.remote.row_count("notes"), 1);

        // Nothing further is dirty, so nothing further fires.
        harness.clock.advance(IDLE);
        assert_eq!(editor.poll().await.unwrap(), None);
        assert_eq!(harness.remote.row_count("notes"), 1);
    }

    #[tokio::test]
    async fn every_edit_resets_the_idle_timer() {
        let harness = Harness::new();
        let mut editor = harness.open(None);

        editor.set_content("a").unwrap();
        harness.clock.advance(Duration::from_secs(20));
        editor.set_content("ab").unwrap();
        harness.clock.advance(Duration::from_secs(20));
        // 40 s since the first edit but only 20 s since the last one.
        assert_eq!(editor.poll().await.unwrap(), None);

        harness.clock.advance(Duration::from_secs(10));
        assert_eq!(editor.poll().await.unwrap(), Some(SaveOutcome::Saved));
    }

    #[tokio::test]
    async fn blank_draft_save_is_a_no_op() {
        let harness = Harness::new();
        let mut editor = harness.open(None);
        editor.set_title("   ").unwrap();

        assert_eq!(editor.save().await.unwrap(), SaveOutcome::Skipped);
        assert_eq!(editor.status(), SaveStatus::Idle);
        assert_eq!(harness.remote.row_count("notes"), 0);
    }

    #[tokio::test]
    async fn success_clears_dirty_and_records_last_saved() {
        let harness = Harness::new();
        let mut editor = harness.open(None);
        editor.set_title("T").unwrap();
        assert!(editor.last_saved_at().is_none());

        assert_eq!(editor.save().await.unwrap(), SaveOutcome::Saved);
        assert!(!editor.is_dirty());
        assert!(editor.last_saved_at().is_some());
        // The fallback copy is gone once the remote owns the content.
        assert!(harness.store.list(harness.user_id).unwrap().is_empty());
    }

    #[tokio::test]
    async fn failure_keeps_dirty_and_does_not_retry_on_its_own() {
        let harness = Harness::new();
        let mut editor = harness.open(None);
        editor.set_content("precious").unwrap();

        harness.remote.set_offline(true);
        harness.clock.advance(IDLE);
        let outcome = editor.poll().await.unwrap();
        assert_matches!(outcome, Some(SaveOutcome::Failed { .. }));
        assert_matches!(editor.status(), SaveStatus::Error { .. });
        assert!(editor.is_dirty());

        // Still offline; no automatic retry however long we wait.
        harness.clock.advance(IDLE * 4);
        assert_eq!(editor.poll().await.unwrap(), None);

        // An explicit retry once connectivity returns succeeds.
        harness.remote.set_offline(false);
        assert_eq!(editor.save().await.unwrap(), SaveOutcome::Saved);
        assert!(!editor.is_dirty());
    }

    #[tokio::test]
    async fn statuses_decay_after_their_display_windows() {
        let harness = Harness::new();
        let mut editor = harness.open(None);
        editor.set_title("T").unwrap();
        editor.save().await.unwrap();
        assert_eq!(editor.status(), SaveStatus::Saved);

        harness.clock.advance(Duration::from_secs(2));
        editor.tick();
        assert_eq!(editor.status(), SaveStatus::Idle);

        editor.set_title("T2").unwrap();
        harness.remote.set_offline(true);
        editor.save().await.unwrap();
        assert_matches!(editor.status(), SaveStatus::Error { .. });

        harness.clock.advance(Duration::from_secs(3));
        editor.tick();
        assert_eq!(editor.status(), SaveStatus::Dirty);
    }

    #[tokio::test]
    async fn connectivity_failures_surface_the_actionable_message() {
        let harness = Harness::new();
        let mut editor = harness.open(None);
        editor.set_content("x").unwrap();
        harness.remote.set_offline(true);

        let outcome = editor.save().await.unwrap();
        assert_matches!(
            outcome,
            SaveOutcome::Failed { message } if message == crate::error::CONNECTIVITY_MESSAGE
        );
    }

    #[tokio::test]
    async fn navigation_guard_prompts_only_while_dirty() {
        let harness = Harness::new();
        let mut editor = harness.open(None);
        assert_eq!(editor.navigation_guard(), NavigationGuard::Proceed);

        editor.set_content("unsaved").unwrap();
        assert_eq!(editor.navigation_guard(), NavigationGuard::PromptUnsaved);

        editor.save().await.unwrap();
        assert_eq!(editor.navigation_guard(), NavigationGuard::Proceed);
    }

    #[tokio::test]
    async fn leave_choices_resolve_the_prompt() {
        let harness = Harness::new();
        let mut editor = harness.open(None);
        editor.set_content("unsaved").unwrap();

        assert_eq!(
            editor.leave(LeaveChoice::Cancel).await.unwrap(),
            LeaveOutcome::Stayed { reason: None }
        );
        assert!(editor.is_dirty());

        harness.remote.set_offline(true);
        assert_matches!(
            editor.leave(LeaveChoice::SaveAndLeave).await.unwrap(),
            LeaveOutcome::Stayed { reason: Some(_) }
        );
        assert!(editor.is_dirty());

        harness.remote.set_offline(false);
        assert_eq!(
            editor.leave(LeaveChoice::SaveAndLeave).await.unwrap(),
            LeaveOutcome::Left
        );
        assert_eq!(harness.remote.row_count("notes"), 1);
    }

    #[tokio::test]
    async fn discard_drops_the_fallback_copy() {
        let harness = Harness::new();
        let mut editor = harness.open(None);
        editor.set_content("scratch").unwrap();
        assert_eq!(harness.store.list(harness.user_id).unwrap().len(), 1);

        assert_eq!(
            editor.leave(LeaveChoice::Discard).await.unwrap(),
            LeaveOutcome::Left
        );
        assert!(harness.store.list(harness.user_id).unwrap().is_empty());
        assert_eq!(harness.remote.row_count("notes"), 0);
    }

    #[tokio::test]
    async fn surviving_draft_is_offered_and_adopted_for_immediate_save() {
        let harness = Harness::new();

        // First session crashes with unsaved edits.
        {
            let mut editor = harness.open(None);
            editor.set_content("rescued").unwrap();
        }

        let (mut editor, recovery) = DraftController::open(
            NotesService::new(Arc::clone(&harness.remote)),
            Arc::clone(&harness.store),
            Arc::clone(&harness.clock),
            AutoSaveConfig::default(),
            harness.user_id,
            None,
        )
        .unwrap();
        let record = recovery.expect("recovery offered");
        assert_eq!(record.content, "rescued");

        editor.adopt_recovery(&record);
        // Adopted edits are already past the idle window.
        assert_eq!(editor.poll().await.unwrap(), Some(SaveOutcome::Saved));
        assert_eq!(harness.remote.row_count("notes"), 1);
    }

    #[tokio::test]
    async fn editing_back_to_the_saved_values_returns_to_idle() {
        let harness = Harness::new();
        let mut editor = harness.open(None);
        editor.set_title("T").unwrap();
        editor.save().await.unwrap();
        harness.clock.advance(Duration::from_secs(2));
        editor.tick();

        editor.set_title("T2").unwrap();
        assert_eq!(editor.status(), SaveStatus::Dirty);
        editor.set_title("T").unwrap();
        assert_eq!(editor.status(), SaveStatus::Idle);
        assert_eq!(editor.navigation_guard(), NavigationGuard::Proceed);
    }
}
