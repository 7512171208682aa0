use std::collections::HashMap;
use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use signin_core::config::AttendanceSettings;
use signin_core::types::Location;
use signin_scheduler::{next_daily_deadline, Clock, DelayedEvents, NamedEvent, Ticker};
use tracing::{debug, error, info, instrument, warn};

use crate::error::{AttendanceError, Result};
use crate::record::AttendanceRecord;
use crate::report;
use crate::storage::Storage;
use crate::view::{AttendanceView, Confirmation, PresentEntry};

/// Badge text that signs everyone out (case-insensitive).
pub const ALL_OUT_COMMAND: &str = "AllOutNow";

/// Everything the scan path and the clock both mutate. One lock guards it all.
struct ManagerState {
    records: HashMap<String, AttendanceRecord>,
    /// Name of the last accepted scan; equal scans are dropped until reset.
    last_scan: Option<String>,
    /// Mutations since the last successful save.
    dirty: usize,
    events: DelayedEvents,
    settings: AttendanceSettings,
    total: Duration,
}

type Handler = fn(&Shared, &mut ManagerState, NaiveDateTime);

/// Handler table for the scheduler. Events without a handler are inert.
fn handler_for(event: NamedEvent) -> Option<Handler> {
    match event {
        NamedEvent::ResetLastScan => Some(Shared::on_reset_last_scan),
        NamedEvent::UpdateTotalTime => Some(Shared::on_update_total_time),
        NamedEvent::SignOutRemaining => Some(Shared::on_sign_out_remaining),
        NamedEvent::ClearDisplayStatus => None,
    }
}

/// State plus the collaborators, shared between the manager and its clock task.
struct Shared {
    state: Mutex<ManagerState>,
    storage: Arc<dyn Storage>,
    view: Arc<dyn AttendanceView>,
    clock: Arc<dyn Clock>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, ManagerState> {
        self.state.lock().expect("attendance state poisoned")
    }

    /// One scheduler pass: run the handler of every expired event.
    fn poll(&self) {
        let mut guard = self.lock();
        let now = self.clock.now();
        for event in NamedEvent::ALL {
            let Some(handler) = handler_for(event) else {
                continue;
            };
            if guard.events.has_expired(event, now) {
                debug!(%event, "timer fired");
                handler(self, &mut guard, now);
            }
        }
    }

    fn on_reset_last_scan(&self, state: &mut ManagerState, _now: NaiveDateTime) {
        if let Some(name) = state.last_scan.take() {
            debug!(%name, "debounce window elapsed");
        }
    }

    fn on_update_total_time(&self, state: &mut ManagerState, now: NaiveDateTime) {
        self.recompute_total(state, now);
        state
            .events
            .set(NamedEvent::UpdateTotalTime, state.settings.total_time_interval);
    }

    fn on_sign_out_remaining(&self, state: &mut ManagerState, now: NaiveDateTime) {
        let count = self.sign_out_present(state, now);
        info!(count, "end-of-day sweep");
        if count > 0 {
            if let Err(e) = self.commit(state) {
                error!(error = %e, "commit after sweep failed; changes kept in memory");
            }
            self.view
                .status(&format!("Signed out {count} remaining at {}", now.format("%H:%M")));
            self.recompute_total(state, now);
        }
        let next = next_daily_deadline(now, state.settings.sign_out_offset);
        state.events.set_at(NamedEvent::SignOutRemaining, next);
    }

    /// Close every open session with an Out scan. Returns how many closed.
    fn sign_out_present(&self, state: &mut ManagerState, now: NaiveDateTime) -> usize {
        let mut count = 0;
        for record in state.records.values_mut().filter(|r| r.is_present()) {
            record.sign_in_or_out(Location::Out, now);
            count += 1;
        }
        state.dirty += count;
        if count > 0 {
            self.publish_present(state);
        }
        count
    }

    fn recompute_total(&self, state: &mut ManagerState, now: NaiveDateTime) {
        let since = state.settings.count_since;
        let start = since.and_time(NaiveTime::MIN);
        state.total = state
            .records
            .values()
            .fold(Duration::zero(), |acc, r| acc + r.total_time_since(start, now));
        self.view.total_time(state.total, since);
    }

    fn publish_present(&self, state: &ManagerState) {
        self.view.present_changed(&present_list(state));
    }

    /// Save when something changed. The counter is only cleared on success.
    fn commit(&self, state: &mut ManagerState) -> Result<bool> {
        if state.dirty == 0 {
            return Ok(false);
        }
        let records = sorted_records(state);
        self.storage.save(&records)?;
        info!(changes = state.dirty, records = records.len(), "changes committed");
        state.dirty = 0;
        Ok(true)
    }
}

fn present_list(state: &ManagerState) -> Vec<PresentEntry> {
    let mut present: Vec<PresentEntry> = state
        .records
        .values()
        .filter_map(PresentEntry::from_record)
        .collect();
    present.sort_by(|a, b| a.name.cmp(&b.name));
    present
}

fn sorted_records(state: &ManagerState) -> Vec<AttendanceRecord> {
    let mut records: Vec<AttendanceRecord> = state.records.values().cloned().collect();
    records.sort_by(|a, b| a.name().cmp(b.name()));
    records
}

/// The single authority over attendance records.
///
/// Scan callers and the background clock both go through one lock, held for
/// the whole of each scan-to-commit sequence and each timer handler.
pub struct AttendanceManager {
    shared: Arc<Shared>,
    confirm: Option<Confirmation>,
    ticker: Mutex<Option<Ticker>>,
}

impl AttendanceManager {
    /// Load prior records, publish the initial view and arm the recurring timers.
    ///
    /// The clock is not started; call [`start_clock`](Self::start_clock) from
    /// inside a Tokio runtime, or drive [`poll`](Self::poll) directly.
    pub fn new(
        storage: Arc<dyn Storage>,
        view: Arc<dyn AttendanceView>,
        clock: Arc<dyn Clock>,
        settings: AttendanceSettings,
    ) -> Result<Self> {
        let records: HashMap<String, AttendanceRecord> = storage
            .load()?
            .into_iter()
            .map(|r| (r.name().to_string(), r))
            .collect();
        let now = clock.now();

        let mut events = DelayedEvents::new(Arc::clone(&clock));
        events.set(NamedEvent::UpdateTotalTime, settings.total_time_interval);
        events.set_at(
            NamedEvent::SignOutRemaining,
            next_daily_deadline(now, settings.sign_out_offset),
        );

        let shared = Arc::new(Shared {
            state: Mutex::new(ManagerState {
                records,
                last_scan: None,
                dirty: 0,
                events,
                settings,
                total: Duration::zero(),
            }),
            storage,
            view,
            clock,
        });

        {
            let mut guard = shared.lock();
            shared.publish_present(&guard);
            shared.recompute_total(&mut guard, now);
            info!(
                records = guard.records.len(),
                present = present_list(&guard).len(),
                "attendance manager started"
            );
        }

        Ok(Self {
            shared,
            confirm: None,
            ticker: Mutex::new(None),
        })
    }

    /// Install the operator confirmation used by [`sign_all_out`](Self::sign_all_out).
    pub fn with_confirmation(mut self, confirm: Confirmation) -> Self {
        self.confirm = Some(confirm);
        self
    }

    /// Feed one raw scan into the manager.
    ///
    /// Unrecognised text and repeats of the last accepted badge are ignored.
    /// A persistence failure is returned after the status has been shown;
    /// the change stays in memory and is retried by the next commit.
    #[instrument(skip(self, text))]
    pub fn handle_scan_data(&self, text: &str) -> Result<()> {
        if text.trim().eq_ignore_ascii_case(ALL_OUT_COMMAND) {
            info!("all-out command scanned");
            return self.sign_all_out().map(|_| ());
        }

        let Some(parsed) = AttendanceRecord::parse(text) else {
            debug!("scan ignored: not a badge");
            return Ok(());
        };

        let mut guard = self.shared.lock();
        let state = &mut *guard;
        if state.last_scan.as_deref() == Some(parsed.name()) {
            debug!(name = parsed.name(), "scan ignored: repeat within debounce window");
            return Ok(());
        }

        let now = self.shared.clock.now();
        let name = parsed.name().to_string();
        let role = parsed.role();
        let record = state.records.entry(name.clone()).or_insert(parsed);
        record.set_role(role);
        let outcome = record.toggle(now);

        let committed = if outcome.succeeded {
            state.dirty += 1;
            info!(%name, location = %outcome.location, "attendance changed");
            self.shared.publish_present(state);
            let committed = self.shared.commit(state);
            self.shared.view.status(&outcome.status);
            committed.map(|_| ())
        } else {
            self.shared.view.status(&outcome.status);
            Ok(())
        };

        state.last_scan = Some(name);
        state
            .events
            .set(NamedEvent::ResetLastScan, state.settings.debounce_window);

        if let Err(ref e) = committed {
            warn!(error = %e, dirty = state.dirty, "commit failed");
        }
        committed
    }

    /// Sign out everyone currently in, after asking the operator.
    ///
    /// Returns how many people were signed out. Fails with
    /// [`AttendanceError::MissingConfirmation`] when no confirmation source
    /// was installed.
    #[instrument(skip(self))]
    pub fn sign_all_out(&self) -> Result<usize> {
        let confirm = self
            .confirm
            .as_ref()
            .ok_or(AttendanceError::MissingConfirmation)?;

        // Ask before locking: the operator may take a while to answer.
        if !confirm() {
            info!("sign-all-out declined");
            self.shared.view.status("Sign out all cancelled");
            return Ok(0);
        }

        let mut guard = self.shared.lock();
        let state = &mut *guard;
        let now = self.shared.clock.now();
        let count = self.shared.sign_out_present(state, now);
        info!(count, "signed everyone out");
        self.shared.view.status(&format!(
            "Signed out {count} at {}",
            now.format("%H:%M")
        ));
        self.shared.commit(state)?;
        Ok(count)
    }

    /// Sign out everyone still in without asking. Does not commit.
    #[instrument(skip(self))]
    pub fn sign_remaining_out(&self) -> usize {
        let mut guard = self.shared.lock();
        let now = self.shared.clock.now();
        let count = self.shared.sign_out_present(&mut guard, now);
        info!(count, "signed remaining out");
        count
    }

    /// Drop scans dated before `cutoff` from every record. Does not commit.
    #[instrument(skip(self))]
    pub fn prune(&self, cutoff: NaiveDate) -> usize {
        let mut guard = self.shared.lock();
        let state = &mut *guard;
        let removed: usize = state.records.values_mut().map(|r| r.prune(cutoff)).sum();
        state.dirty += 1;
        self.shared.publish_present(state);
        info!(removed, "records pruned");
        removed
    }

    /// Persist all records if anything changed. Returns whether a write happened.
    pub fn commit(&self) -> Result<bool> {
        let mut guard = self.shared.lock();
        self.shared.commit(&mut guard)
    }

    /// Run one scheduler pass now. This is what the clock calls on each tick.
    pub fn poll(&self) {
        self.shared.poll();
    }

    /// Take new settings without restarting.
    ///
    /// A new recompute interval or count-since date re-arms the recompute and
    /// refreshes the total immediately. A new sign-out offset re-arms the
    /// sweep. The debounce window applies from the next accepted scan; the
    /// clock period from the next [`start_clock`](Self::start_clock).
    #[instrument(skip(self, settings))]
    pub fn apply_settings(&self, settings: AttendanceSettings) {
        let mut guard = self.shared.lock();
        let state = &mut *guard;
        let now = self.shared.clock.now();
        let old = std::mem::replace(&mut state.settings, settings);

        if old.total_time_interval != state.settings.total_time_interval
            || old.count_since != state.settings.count_since
        {
            state
                .events
                .set(NamedEvent::UpdateTotalTime, state.settings.total_time_interval);
            self.shared.recompute_total(state, now);
        }
        if old.sign_out_offset != state.settings.sign_out_offset {
            let next = next_daily_deadline(now, state.settings.sign_out_offset);
            state.events.set_at(NamedEvent::SignOutRemaining, next);
        }
        if old.clock_interval != state.settings.clock_interval {
            debug!("clock period change applies on next start");
        }
        info!(settings = ?state.settings, "settings applied");
    }

    /// Start the background clock. No-op if it is already running.
    pub fn start_clock(&self) {
        let mut ticker = self.ticker.lock().expect("ticker slot poisoned");
        if ticker.is_some() {
            return;
        }
        let period = self.shared.lock().settings.clock_interval;
        let shared = Arc::clone(&self.shared);
        *ticker = Some(Ticker::spawn(period, move || shared.poll()));
    }

    /// Stop the clock, waiting for a tick in progress. Safe to call repeatedly.
    pub async fn shutdown(&self) {
        let ticker = self.ticker.lock().expect("ticker slot poisoned").take();
        if let Some(mut ticker) = ticker {
            ticker.stop().await;
            info!("attendance clock stopped");
        }
    }

    pub fn is_clock_running(&self) -> bool {
        self.ticker
            .lock()
            .expect("ticker slot poisoned")
            .as_ref()
            .is_some_and(Ticker::is_running)
    }

    /// Write the CSV summary of every record since the configured date.
    pub fn write_report<W: Write>(&self, out: W) -> Result<()> {
        let (records, since) = {
            let guard = self.shared.lock();
            (sorted_records(&guard), guard.settings.count_since)
        };
        report::write_summary(&records, since, self.shared.clock.now(), out)
    }

    // --- read-only snapshots -------------------------------------------------

    /// People currently signed in, sorted by name.
    pub fn present(&self) -> Vec<PresentEntry> {
        present_list(&self.shared.lock())
    }

    /// Copy of every record, sorted by name.
    pub fn records(&self) -> Vec<AttendanceRecord> {
        sorted_records(&self.shared.lock())
    }

    pub fn record(&self, name: &str) -> Option<AttendanceRecord> {
        self.shared.lock().records.get(name).cloned()
    }

    /// Running total as of the last recompute.
    pub fn total_time(&self) -> Duration {
        self.shared.lock().total
    }

    pub fn dirty_count(&self) -> usize {
        self.shared.lock().dirty
    }

    pub fn last_scan(&self) -> Option<String> {
        self.shared.lock().last_scan.clone()
    }

    pub fn settings(&self) -> AttendanceSettings {
        self.shared.lock().settings.clone()
    }

    /// Pending deadline of a timer, if armed.
    pub fn deadline(&self, event: NamedEvent) -> Option<NaiveDateTime> {
        self.shared.lock().events.deadline(event)
    }
}
