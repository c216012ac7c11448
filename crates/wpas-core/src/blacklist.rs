//! Blacklist and retry policy.
//!
//! All recovery timing lives here: per-BSSID failure counts with their
//! reconnect delays, and per-profile temporary disabling.

use crate::{
    profile::NetworkProfile,
    suite::Akm,
    types::MacAddr,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Failure counters for one BSSID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlacklistEntry {
    /// Failures in the current cycle.
    pub count: u32,
    /// Failures carried over from earlier cycles.
    pub carried: u32,
}

impl BlacklistEntry {
    /// Count used for back-off decisions.
    pub fn cumulative(&self) -> u32 {
        self.count.saturating_add(self.carried)
    }
}

/// Per-BSSID failure list.
#[derive(Debug, Clone, Default)]
pub struct Blacklist {
    entries: BTreeMap<MacAddr, BlacklistEntry>,
}

impl Blacklist {
    /// Record a failure; returns the cumulative count.
    pub fn add(&mut self, bssid: MacAddr) -> u32 {
        let entry = self.entries.entry(bssid).or_default();
        entry.count = entry.count.saturating_add(1);
        entry.cumulative()
    }

    /// Entry for `bssid`.
    pub fn get(&self, bssid: &MacAddr) -> Option<&BlacklistEntry> {
        self.entries.get(bssid)
    }

    /// Failures in the current cycle, zero when unknown.
    pub fn count(&self, bssid: &MacAddr) -> u32 {
        self.entries.get(bssid).map_or(0, |e| e.count)
    }

    /// Whether `bssid` has failed in the current cycle.
    pub fn is_blacklisted(&self, bssid: &MacAddr) -> bool {
        self.count(bssid) > 0
    }

    /// Forget `bssid` after a successful connection.
    pub fn remove(&mut self, bssid: &MacAddr) -> bool {
        self.entries.remove(bssid).is_some()
    }

    /// Begin a new cycle: every current count is carried over.
    pub fn start_cycle(&mut self) {
        for entry in self.entries.values_mut() {
            entry.carried = entry.carried.saturating_add(entry.count);
            entry.count = 0;
        }
    }

    /// Drop carried-over counts, as on an explicit network selection.
    pub fn clear_carried(&mut self) {
        for entry in self.entries.values_mut() {
            entry.carried = 0;
        }
        self.entries.retain(|_, e| e.count > 0);
    }

    /// Number of tracked BSSIDs.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Reconnect delay for a cumulative failure count.
pub fn reconnect_delay(count: u32) -> Duration {
    let ms = match count {
        0 | 1 => 100,
        2 => 500,
        3 => 1000,
        4 => 5000,
        _ => 10_000,
    };
    Duration::from_millis(ms)
}

/// Base temporary-disable duration for a profile failure count.
pub fn disable_duration(failures: u32) -> Duration {
    let secs = match failures {
        f if f > 50 => 300,
        f if f > 10 => 120,
        f if f > 5 => 90,
        f if f > 3 => 60,
        f if f > 2 => 30,
        f if f > 1 => 20,
        _ => 10,
    };
    Duration::from_secs(secs)
}

/// Owns the blacklist and applies failure policy to profiles.
#[derive(Debug)]
pub struct RetryManager {
    blacklist: Blacklist,
    threshold: u32,
    rng: StdRng,
}

impl RetryManager {
    /// Manager escalating to a profile failure above `threshold` BSSID failures.
    pub fn new(threshold: u32) -> Self {
        Self::with_rng(threshold, StdRng::from_entropy())
    }

    /// Manager with a caller-supplied jitter source.
    pub fn with_rng(threshold: u32, rng: StdRng) -> Self {
        Self {
            blacklist: Blacklist::default(),
            threshold,
            rng,
        }
    }

    /// The blacklist.
    pub fn blacklist(&self) -> &Blacklist {
        &self.blacklist
    }

    /// Mutable blacklist.
    pub fn blacklist_mut(&mut self) -> &mut Blacklist {
        &mut self.blacklist
    }

    /// A connection attempt against `bssid` failed.
    ///
    /// Returns the delay before the next scan.
    pub fn connection_failed(
        &mut self,
        profile: &mut NetworkProfile,
        bssid: MacAddr,
        akm: Akm,
        now: Instant,
    ) -> Duration {
        let count = self.blacklist.add(bssid);
        if count > self.threshold {
            self.auth_failed(profile, akm, now, "CONN_FAILED");
        }
        let delay = reconnect_delay(count);
        info!(
            "Connection to {} failed (count={}); next attempt in {} ms",
            bssid,
            count,
            delay.as_millis()
        );
        delay
    }

    /// Record an authentication failure against the profile and disable it
    /// temporarily.
    pub fn auth_failed(&mut self, profile: &mut NetworkProfile, akm: Akm, now: Instant, reason: &str) {
        profile.auth_failures = profile.auth_failures.saturating_add(1);
        let failures = profile.auth_failures;
        let mut duration = disable_duration(failures);
        if akm.is_ieee8021x() && failures > 1 {
            let jitter = self.rng.gen_range(0..u64::from(failures) * 10);
            duration += Duration::from_secs(jitter);
        }
        let until = now + duration;
        if profile.disabled_until.map_or(true, |current| until > current) {
            profile.disabled_until = Some(until);
        }
        info!(
            "Network {} temporarily disabled: auth_failures={} duration={}s reason={}",
            profile.id,
            failures,
            duration.as_secs(),
            reason
        );
    }

    /// Lift a temporary disable; failure count is cleared only when asked.
    pub fn clear_temp_disabled(&mut self, profile: &mut NetworkProfile, clear_failures: bool) {
        profile.disabled_until = None;
        if clear_failures {
            profile.auth_failures = 0;
        }
    }

    /// Explicit operator selection of `profile`.
    pub fn network_selected(&mut self, profile: &mut NetworkProfile) {
        self.clear_temp_disabled(profile, true);
        profile.config_error = None;
        self.blacklist.clear_carried();
    }

    /// Connection to `bssid` completed.
    pub fn connection_succeeded(&mut self, profile: &mut NetworkProfile, bssid: &MacAddr) {
        self.blacklist.remove(bssid);
        if profile.auth_failures > 0 || profile.disabled_until.is_some() {
            debug!("Clearing failure state of network {}", profile.id);
        }
        self.clear_temp_disabled(profile, true);
    }
}
