//! Phase engine (component C10): time-window and debounced phase
//! resolution, sharing the `resolve(now, latest_event_time) -> Phase`
//! capability.
//!
//! Grounded on `phase_engine.py`'s `TimeWindowPhaseEngine`/
//! `DebouncedPhaseEngine` pair, plus the original's pluggable
//! `SinglePhaseSchedulerEngine` fallback (§3 of the expanded spec) used
//! when no schedule windows are configured.

use chrono::{DateTime, FixedOffset, NaiveTime, Utc};
use mcmot_types::Phase;

/// Shared capability: resolve the current phase given the cycle clock and
/// (if any) the timestamp of the most recently ingested edge event.
pub trait PhaseResolver: Send {
    fn resolve(&mut self, now: DateTime<Utc>, latest_event_time: Option<DateTime<Utc>>) -> Phase;
}

/// Trivial fallback resolver: always the same phase. Used when no time
/// windows are configured.
pub struct SinglePhaseResolver {
    phase: Phase,
}

impl SinglePhaseResolver {
    pub fn new(phase: Phase) -> Self {
        Self { phase }
    }
}

impl PhaseResolver for SinglePhaseResolver {
    fn resolve(&mut self, _now: DateTime<Utc>, _latest_event_time: Option<DateTime<Utc>>) -> Phase {
        self.phase.clone()
    }
}

fn window_contains(t: NaiveTime, start: NaiveTime, end: NaiveTime) -> bool {
    if start <= end {
        t >= start && t < end
    } else {
        t >= start || t < end
    }
}

/// Resolves `working`/`non_working` from a list of half-open local-time
/// windows (§4.10).
pub struct TimeWindowResolver {
    windows: Vec<(NaiveTime, NaiveTime)>,
    offset: FixedOffset,
    working_phase: Phase,
    non_working_phase: Phase,
}

impl TimeWindowResolver {
    pub fn new(windows: Vec<(NaiveTime, NaiveTime)>, offset: FixedOffset) -> Self {
        Self {
            windows,
            offset,
            working_phase: Phase::new("working", true),
            non_working_phase: Phase::new("non_working", false),
        }
    }
}

impl PhaseResolver for TimeWindowResolver {
    fn resolve(&mut self, now: DateTime<Utc>, _latest_event_time: Option<DateTime<Utc>>) -> Phase {
        let local_time = now.with_timezone(&self.offset).time();
        let in_window = self.windows.iter().any(|&(start, end)| window_contains(local_time, start, end));
        if in_window {
            self.working_phase.clone()
        } else {
            self.non_working_phase.clone()
        }
    }
}

/// Policy applied when no event has arrived within `stale_seconds`.
#[derive(Debug, Clone)]
pub enum StalePolicy {
    Freeze,
    Unknown(Phase),
}

/// Layers hysteresis and staleness handling over any inner [`PhaseResolver`]
/// (§4.10 "Debounced").
pub struct DebouncedResolver {
    inner: Box<dyn PhaseResolver>,
    stable_seconds: f64,
    stale_seconds: f64,
    stale_policy: StalePolicy,
    stable: Option<Phase>,
    pending: Option<(Phase, DateTime<Utc>)>,
}

impl DebouncedResolver {
    pub fn new(inner: Box<dyn PhaseResolver>, stable_seconds: f64, stale_seconds: f64, stale_policy: StalePolicy) -> Self {
        Self { inner, stable_seconds, stale_seconds, stale_policy, stable: None, pending: None }
    }

    fn is_stale(&self, now: DateTime<Utc>, latest_event_time: Option<DateTime<Utc>>) -> bool {
        if self.stale_seconds <= 0.0 {
            return false;
        }
        match latest_event_time {
            Some(t) => (now - t).num_milliseconds() as f64 / 1000.0 > self.stale_seconds,
            None => true,
        }
    }
}

impl PhaseResolver for DebouncedResolver {
    fn resolve(&mut self, now: DateTime<Utc>, latest_event_time: Option<DateTime<Utc>>) -> Phase {
        if self.stable.is_none() {
            let initial = self.inner.resolve(now, latest_event_time);
            self.stable = Some(initial.clone());
            return initial;
        }

        if self.is_stale(now, latest_event_time) {
            return match &self.stale_policy {
                StalePolicy::Freeze => self.stable.clone().expect("stable set above"),
                StalePolicy::Unknown(phase) => phase.clone(),
            };
        }

        let candidate = self.inner.resolve(now, latest_event_time);
        let stable = self.stable.clone().expect("stable set above");
        if candidate == stable {
            self.pending = None;
            return stable;
        }

        let reference_time = latest_event_time.unwrap_or(now);
        match &self.pending {
            Some((pending_phase, _)) if *pending_phase != candidate => {
                self.pending = Some((candidate, reference_time));
            }
            None => {
                self.pending = Some((candidate, reference_time));
            }
            _ => {}
        }

        if let Some((pending_phase, pending_since)) = self.pending.clone() {
            let elapsed = (reference_time - pending_since).num_milliseconds() as f64 / 1000.0;
            if elapsed >= self.stable_seconds {
                self.stable = Some(pending_phase.clone());
                self.pending = None;
                return pending_phase;
            }
        }

        stable
    }
}

/// Hook invoked whenever the resolved phase differs from the previous
/// cycle's, grounded on the original's pluggable phase-change callback
/// (`phase_change.py::BasePhaseChangeEngine`). Default behavior just logs.
pub trait PhaseChangeObserver: Send {
    fn on_phase_change(&mut self, previous: Option<&Phase>, current: &Phase);
}

pub struct LoggingPhaseChangeObserver;

impl PhaseChangeObserver for LoggingPhaseChangeObserver {
    fn on_phase_change(&mut self, previous: Option<&Phase>, current: &Phase) {
        match previous {
            Some(prev) => tracing::info!(from = %prev.name, to = %current.name, "phase changed"),
            None => tracing::info!(to = %current.name, "initial phase resolved"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn t(secs: i64) -> DateTime<Utc> {
        DateTime::UNIX_EPOCH + Duration::seconds(secs)
    }

    struct ScriptedResolver(Vec<Phase>, usize);
    impl PhaseResolver for ScriptedResolver {
        fn resolve(&mut self, _now: DateTime<Utc>, _latest: Option<DateTime<Utc>>) -> Phase {
            let phase = self.0[self.1.min(self.0.len() - 1)].clone();
            self.1 += 1;
            phase
        }
    }

    #[test]
    fn single_phase_resolver_always_returns_the_same_phase() {
        let mut resolver = SinglePhaseResolver::new(Phase::new("working", true));
        assert_eq!(resolver.resolve(t(0), None), Phase::new("working", true));
        assert_eq!(resolver.resolve(t(100), None), Phase::new("working", true));
    }

    #[test]
    fn time_window_resolver_handles_midnight_wraparound() {
        let windows = vec![(NaiveTime::from_hms_opt(22, 0, 0).unwrap(), NaiveTime::from_hms_opt(6, 0, 0).unwrap())];
        let mut resolver = TimeWindowResolver::new(windows, FixedOffset::east_opt(0).unwrap());
        let at_23 = DateTime::parse_from_rfc3339("2026-01-01T23:00:00Z").unwrap().with_timezone(&Utc);
        let at_12 = DateTime::parse_from_rfc3339("2026-01-01T12:00:00Z").unwrap().with_timezone(&Utc);
        assert_eq!(resolver.resolve(at_23, None).name, "working");
        assert_eq!(resolver.resolve(at_12, None).name, "non_working");
    }

    // Scenario 4: hysteresis. PHASE_STABLE_SECONDS=180, flip working->non_working for 120s then back.
    #[test]
    fn hysteresis_holds_stable_phase_through_a_short_flip() {
        let working = Phase::new("working", true);
        let non_working = Phase::new("non_working", false);
        let inner = ScriptedResolver(
            vec![working.clone(), non_working.clone(), non_working.clone(), working.clone()],
            0,
        );
        let mut debounced = DebouncedResolver::new(Box::new(inner), 180.0, 0.0, StalePolicy::Freeze);

        assert_eq!(debounced.resolve(t(0), Some(t(0))), working);
        assert_eq!(debounced.resolve(t(10), Some(t(10))), working); // flips to non_working candidate, not yet stable
        assert_eq!(debounced.resolve(t(130), Some(t(130))), working); // 120s elapsed, still under 180s
        assert_eq!(debounced.resolve(t(140), Some(t(140))), working); // reverts to working before threshold
    }

    #[test]
    fn candidate_persisting_past_stable_seconds_is_promoted() {
        let working = Phase::new("working", true);
        let non_working = Phase::new("non_working", false);
        let inner = ScriptedResolver(vec![working.clone(), non_working.clone(), non_working.clone()], 0);
        let mut debounced = DebouncedResolver::new(Box::new(inner), 10.0, 0.0, StalePolicy::Freeze);

        assert_eq!(debounced.resolve(t(0), Some(t(0))), working);
        assert_eq!(debounced.resolve(t(1), Some(t(1))), working);
        assert_eq!(debounced.resolve(t(20), Some(t(20))), non_working);
    }

    // P9: staleness never reports a newly resolved candidate.
    #[test]
    fn stale_freeze_policy_holds_last_stable_phase() {
        let working = Phase::new("working", true);
        let non_working = Phase::new("non_working", false);
        let inner = ScriptedResolver(vec![working.clone(), non_working], 0);
        let mut debounced = DebouncedResolver::new(Box::new(inner), 10.0, 5.0, StalePolicy::Freeze);
        assert_eq!(debounced.resolve(t(0), Some(t(0))), working);
        // No event within stale window: candidate would be non_working, but freeze must win.
        assert_eq!(debounced.resolve(t(100), Some(t(0))), working);
    }

    #[test]
    fn stale_unknown_policy_reports_the_configured_unknown_phase() {
        let working = Phase::new("working", true);
        let unknown = Phase::new("unknown", false);
        let inner = ScriptedResolver(vec![working.clone()], 0);
        let mut debounced = DebouncedResolver::new(Box::new(inner), 10.0, 5.0, StalePolicy::Unknown(unknown.clone()));
        debounced.resolve(t(0), Some(t(0)));
        assert_eq!(debounced.resolve(t(100), Some(t(0))), unknown);
    }

    #[test]
    fn logging_observer_runs_without_panicking_on_first_and_subsequent_calls() {
        let mut observer = LoggingPhaseChangeObserver;
        let working = Phase::new("working", true);
        let non_working = Phase::new("non_working", false);
        observer.on_phase_change(None, &working);
        observer.on_phase_change(Some(&working), &non_working);
    }
}
