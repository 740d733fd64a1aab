//! Idle Monitor
//!
//! Client-resident inactivity tracker. Owns its own timers as an explicit
//! state machine (Active -> Warning -> Idle) instead of loose window-level
//! listeners, so the whole construct is testable without a browser.
//!
//! The monitor runs on the client alongside the invalidation stream but is
//! independent of the server components: when the countdown hits zero it
//! emits one signout message, and the surrounding client glue performs the
//! actual logout (invalidate the current token, redirect to login with a
//! reason code).

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{interval, sleep_until, Instant};

/// Activity signals occurring within this window of the previous reset are
/// coalesced rather than each re-arming the timer.
const ACTIVITY_COALESCE: Duration = Duration::from_secs(1);

/// User interaction kinds the monitor can observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivitySignal {
    PointerMove,
    Click,
    KeyPress,
    Scroll,
    Touch,
}

impl ActivitySignal {
    pub const ALL: [ActivitySignal; 5] = [
        ActivitySignal::PointerMove,
        ActivitySignal::Click,
        ActivitySignal::KeyPress,
        ActivitySignal::Scroll,
        ActivitySignal::Touch,
    ];
}

/// Why the monitor asked for a signout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignoutReason {
    Inactivity,
}

/// Monitor state, observable through `IdleMonitor::subscribe`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdleState {
    Active,
    /// Visible countdown; `remaining_secs` decrements once per second
    Warning { remaining_secs: u64 },
    /// Terminal until a fresh monitor is spawned after the next login
    Idle,
}

/// Idle monitor configuration.
#[derive(Debug, Clone)]
pub struct IdleMonitorConfig {
    /// When false the monitor is inert: state stays Active and nothing
    /// ever fires, but the rest of the session machinery is untouched
    pub enabled: bool,

    /// Total inactivity budget
    pub timeout: Duration,

    /// Warning window before the budget runs out
    pub warning_time: Duration,

    /// Which interaction kinds count as activity
    pub watched_signals: Vec<ActivitySignal>,
}

impl IdleMonitorConfig {
    pub fn new(timeout: Duration, warning_time: Duration) -> Self {
        Self {
            enabled: true,
            timeout,
            warning_time,
            watched_signals: ActivitySignal::ALL.to_vec(),
        }
    }

    fn watches(&self, signal: ActivitySignal) -> bool {
        self.watched_signals.contains(&signal)
    }
}

impl From<&crate::config::IdleSettings> for IdleMonitorConfig {
    fn from(settings: &crate::config::IdleSettings) -> Self {
        Self {
            enabled: settings.enabled,
            timeout: settings.timeout(),
            warning_time: settings.warning_time(),
            watched_signals: ActivitySignal::ALL.to_vec(),
        }
    }
}

enum Command {
    Activity(ActivitySignal),
    Reset,
}

/// Handle to a running idle monitor.
///
/// Dropping the handle (or calling `dispose`) tears down the timer task;
/// no timers survive a page/view transition.
pub struct IdleMonitor {
    command_tx: mpsc::UnboundedSender<Command>,
    state_rx: watch::Receiver<IdleState>,
    task: tokio::task::JoinHandle<()>,
}

impl IdleMonitor {
    /// Spawn a monitor. Signout requests are delivered on `signout_tx`
    /// exactly once, when the warning countdown reaches zero.
    pub fn spawn(config: IdleMonitorConfig, signout_tx: mpsc::Sender<SignoutReason>) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(IdleState::Active);
        let task = tokio::spawn(run(config, command_rx, state_tx, signout_tx));
        Self {
            command_tx,
            state_rx,
            task,
        }
    }

    /// Report a user interaction. Signals within 1 s of the previous reset
    /// are coalesced; signals of unwatched kinds are ignored.
    pub fn record_activity(&self, signal: ActivitySignal) {
        let _ = self.command_tx.send(Command::Activity(signal));
    }

    /// Restore the full inactivity budget unconditionally (bypasses
    /// coalescing), e.g. after a token refresh.
    pub fn reset(&self) {
        let _ = self.command_tx.send(Command::Reset);
    }

    /// Current state snapshot.
    pub fn state(&self) -> IdleState {
        self.state_rx.borrow().clone()
    }

    /// Watch state transitions (Warning countdown updates once per second).
    pub fn subscribe(&self) -> watch::Receiver<IdleState> {
        self.state_rx.clone()
    }

    /// Tear down the monitor and cancel its timers synchronously.
    pub fn dispose(self) {
        self.task.abort();
    }
}

impl Drop for IdleMonitor {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(
    config: IdleMonitorConfig,
    mut commands: mpsc::UnboundedReceiver<Command>,
    state_tx: watch::Sender<IdleState>,
    signout_tx: mpsc::Sender<SignoutReason>,
) {
    if !config.enabled {
        // Inert monitor: drain commands so callers never notice, fire nothing.
        while commands.recv().await.is_some() {}
        return;
    }

    let active_window = config.timeout.saturating_sub(config.warning_time);
    let mut last_reset = Instant::now();

    'active: loop {
        let _ = state_tx.send(IdleState::Active);
        let warn_at = last_reset + active_window;

        // Active: wait for either the warning deadline or a budget reset.
        loop {
            tokio::select! {
                cmd = commands.recv() => match cmd {
                    None => return,
                    Some(Command::Reset) => {
                        last_reset = Instant::now();
                        continue 'active;
                    }
                    Some(Command::Activity(signal)) if config.watches(signal) => {
                        if last_reset.elapsed() >= ACTIVITY_COALESCE {
                            last_reset = Instant::now();
                            continue 'active;
                        }
                    }
                    Some(Command::Activity(_)) => {}
                },
                _ = sleep_until(warn_at) => break,
            }
        }

        // Warning: visible one-second countdown. Any watched activity
        // cancels it and restores the full budget.
        let mut remaining = config.warning_time.as_secs();
        let _ = state_tx.send(IdleState::Warning {
            remaining_secs: remaining,
        });
        let mut countdown = interval(Duration::from_secs(1));
        countdown.tick().await; // first tick completes immediately

        loop {
            tokio::select! {
                cmd = commands.recv() => match cmd {
                    None => return,
                    Some(Command::Reset) => {
                        last_reset = Instant::now();
                        continue 'active;
                    }
                    Some(Command::Activity(signal)) if config.watches(signal) => {
                        last_reset = Instant::now();
                        continue 'active;
                    }
                    Some(Command::Activity(_)) => {}
                },
                _ = countdown.tick() => {
                    remaining = remaining.saturating_sub(1);
                    if remaining == 0 {
                        let _ = state_tx.send(IdleState::Idle);
                        if signout_tx.send(SignoutReason::Inactivity).await.is_err() {
                            tracing::debug!("Signout receiver dropped before idle logout");
                        }
                        return;
                    }
                    let _ = state_tx.send(IdleState::Warning { remaining_secs: remaining });
                }
            }
        }
    }
}
