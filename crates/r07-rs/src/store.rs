// crates/r07-rs/src/store.rs
//! The authoritative runtime state aggregator.
//!
//! [`PumpRuntimeStore`] is the single owner of the canonical
//! [`PumpRuntimeState`]; every mutation returns a fresh snapshot copy, so
//! observers only ever see complete, consistent states and never hold a
//! reference into the store.

use crate::types::{FillInfo, NozzleEvent, PumpState, TotalCounters};

/// Authorization outcome injected by the RFID side.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AuthContext {
    pub authorized: bool,
    pub uid_hex: String,
    pub user_id: String,
    pub plate: String,
    /// Per-card volume quota in liters; `<= 0` means unlimited.
    pub limit_liters: f64,
}

/// Snapshot of everything the terminal knows about the dispenser and the
/// current cardholder. A plain value type, cheap to clone.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PumpRuntimeState {
    // Dispenser side
    pub pump_state: PumpState,
    pub nozzle_out: bool,

    // Sale tracking. The dispenser reports a totalizer-style volume, so the
    // per-sale figure is derived against a baseline captured at sale start.
    pub last_fill: FillInfo,
    pub current_fill_volume_l: f64,
    pub has_current_fill: bool,
    pub last_fill_volume_l: f64,
    pub has_last_fill: bool,

    pub totals: TotalCounters,

    // RFID / authorization
    pub last_card_uid: String,
    pub last_card_auth_ok: bool,
    pub last_card_user_id: String,
    pub last_card_plate: String,

    // Per-card limit accounting
    pub limit_liters: f64,
    pub has_limit: bool,
    pub remaining_limit_liters: f64,

    // Latches driving the presentation layer
    pub auth_active: bool,
    pub sale_active: bool,
}

/// Single-writer store. Writer contexts must be serialized externally (the
/// worker runtime guards it with a mutex); readers work on snapshots.
#[derive(Debug, Default)]
pub struct PumpRuntimeStore {
    state: PumpRuntimeState,

    // Baseline for deriving per-sale liters from the totalizer feed.
    fill_baseline_volume_l: f64,
    have_fill_baseline: bool,
    last_sale_volume_l: f64,
}

impl PumpRuntimeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read-only access to the canonical state.
    pub fn state(&self) -> &PumpRuntimeState {
        &self.state
    }

    /// Returns everything to defaults.
    pub fn reset(&mut self) -> PumpRuntimeState {
        self.state = PumpRuntimeState::default();
        self.fill_baseline_volume_l = 0.0;
        self.have_fill_baseline = false;
        self.last_sale_volume_l = 0.0;
        self.snapshot()
    }

    /// Applies a dispenser status report.
    pub fn update_from_status(&mut self, status: PumpState) -> PumpRuntimeState {
        self.state.pump_state = status;

        match status {
            PumpState::Filling => {
                // Entering FILLING starts a new sale: drop any stale baseline
                // so the first fill report of this sale re-captures it.
                if !self.state.sale_active {
                    self.have_fill_baseline = false;
                    self.last_sale_volume_l = 0.0;
                }
                self.state.sale_active = true;
            }
            PumpState::FillingCompleted
            | PumpState::MaxAmount
            | PumpState::Reset
            | PumpState::SwitchedOff => {
                self.state.sale_active = false;
            }
            _ => {}
        }

        self.snapshot()
    }

    /// Applies an incremental fill / fill-record report.
    pub fn update_from_fill(&mut self, fill: FillInfo) -> PumpRuntimeState {
        self.state.last_fill = fill;

        let total = fill.volume_l;

        if self.state.sale_active {
            if !self.have_fill_baseline {
                self.fill_baseline_volume_l = total;
                self.have_fill_baseline = true;
            }

            let cur = (total - self.fill_baseline_volume_l).max(0.0);
            self.state.current_fill_volume_l = cur;
            self.state.has_current_fill = true;

            self.last_sale_volume_l = cur;
            self.state.last_fill_volume_l = cur;
            self.state.has_last_fill = true;

            if self.state.limit_liters > 0.0 {
                self.state.remaining_limit_liters =
                    (self.state.limit_liters - self.last_sale_volume_l).max(0.0);
            } else {
                self.state.remaining_limit_liters = 0.0;
            }
        } else {
            // Outside an active sale the per-sale figure stays zero and the
            // latched last-sale volume is left alone.
            self.state.current_fill_volume_l = 0.0;
            self.state.has_current_fill = false;
            if self.state.has_limit {
                self.state.remaining_limit_liters = self.state.limit_liters;
            } else {
                self.state.remaining_limit_liters = 0.0;
            }
        }

        self.snapshot()
    }

    /// Applies a totalizer report.
    pub fn update_from_totals(&mut self, totals: TotalCounters) -> PumpRuntimeState {
        self.state.totals = totals;
        self.snapshot()
    }

    /// Applies a nozzle position change.
    pub fn update_from_nozzle(&mut self, ev: NozzleEvent) -> PumpRuntimeState {
        let prev_out = self.state.nozzle_out;
        self.state.nozzle_out = ev.nozzle_out;

        // Return-to-holster edge closes the fill cycle: the next sale must
        // capture a fresh baseline.
        if prev_out && !ev.nozzle_out {
            self.state.current_fill_volume_l = 0.0;
            self.state.has_current_fill = false;
            self.have_fill_baseline = false;
        }

        self.snapshot()
    }

    /// Applies an authorization result from the RFID side.
    pub fn update_from_auth(&mut self, auth: &AuthContext) -> PumpRuntimeState {
        self.state.last_card_uid = auth.uid_hex.clone();
        self.state.last_card_user_id = auth.user_id.clone();
        self.state.last_card_plate = auth.plate.clone();
        self.state.last_card_auth_ok = auth.authorized;
        self.state.auth_active = auth.authorized;

        self.state.limit_liters = auth.limit_liters;
        self.state.has_limit = auth.limit_liters > 0.0;

        // No liters dispensed yet under this authorization.
        if self.state.has_limit {
            self.state.remaining_limit_liters = self.state.limit_liters;
        } else {
            self.state.remaining_limit_liters = 0.0;
        }

        self.snapshot()
    }

    /// Drops the authorization latch. Invoked by the presentation layer's
    /// "authorized but never dispensed" idle timer.
    ///
    /// The last card identity fields are kept; only the authorization and
    /// limit bookkeeping are cleared.
    pub fn clear_auth(&mut self) -> PumpRuntimeState {
        self.state.auth_active = false;
        self.state.last_card_auth_ok = false;

        self.state.limit_liters = 0.0;
        self.state.has_limit = false;
        self.state.remaining_limit_liters = 0.0;

        self.snapshot()
    }

    fn snapshot(&self) -> PumpRuntimeState {
        self.state.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill(volume_l: f64) -> FillInfo {
        FillInfo {
            volume_l,
            amount: volume_l * 2.0,
        }
    }

    fn invariants(s: &PumpRuntimeState) {
        if s.has_current_fill {
            assert!(s.current_fill_volume_l >= 0.0);
        }
        if s.has_limit {
            assert!(s.limit_liters > 0.0);
            assert!(s.remaining_limit_liters >= 0.0);
            assert!(s.remaining_limit_liters <= s.limit_liters);
        }
    }

    #[test]
    fn test_filling_starts_sale_and_baseline_capture() {
        let mut store = PumpRuntimeStore::new();

        let s = store.update_from_status(PumpState::Filling);
        assert!(s.sale_active);

        // Totalizer at 1000.0 L when the sale starts.
        let s = store.update_from_fill(fill(1000.0));
        assert!(s.has_current_fill);
        assert_eq!(s.current_fill_volume_l, 0.0);

        let s = store.update_from_fill(fill(1005.0));
        assert_eq!(s.current_fill_volume_l, 5.0);
        assert_eq!(s.last_fill_volume_l, 5.0);
        assert!(s.has_last_fill);
        invariants(&s);
    }

    #[test]
    fn test_terminal_states_clear_sale_but_keep_last_fill() {
        let mut store = PumpRuntimeStore::new();
        store.update_from_status(PumpState::Filling);
        store.update_from_fill(fill(100.0));
        store.update_from_fill(fill(107.5));

        let s = store.update_from_status(PumpState::FillingCompleted);
        assert!(!s.sale_active);
        assert!(s.has_last_fill);
        assert_eq!(s.last_fill_volume_l, 7.5);

        // Fill reports after completion do not disturb the latched volume.
        let s = store.update_from_fill(fill(107.5));
        assert!(!s.has_current_fill);
        assert_eq!(s.current_fill_volume_l, 0.0);
        assert_eq!(s.last_fill_volume_l, 7.5);
    }

    #[test]
    fn test_terminal_status_never_creates_baseline() {
        let mut store = PumpRuntimeStore::new();
        store.update_from_status(PumpState::Reset);
        let s = store.update_from_fill(fill(500.0));
        assert!(!s.has_current_fill);
        assert!(!store.have_fill_baseline);
    }

    #[test]
    fn test_negative_totalizer_delta_clamps_to_zero() {
        let mut store = PumpRuntimeStore::new();
        store.update_from_status(PumpState::Filling);
        store.update_from_fill(fill(100.0));
        let s = store.update_from_fill(fill(99.0));
        assert_eq!(s.current_fill_volume_l, 0.0);
        invariants(&s);
    }

    #[test]
    fn test_nozzle_return_edge_clears_current_fill_and_baseline() {
        let mut store = PumpRuntimeStore::new();
        store.update_from_nozzle(NozzleEvent { nozzle_out: true });
        store.update_from_status(PumpState::Filling);
        store.update_from_fill(fill(100.0));
        store.update_from_fill(fill(104.0));

        let s = store.update_from_nozzle(NozzleEvent { nozzle_out: false });
        assert!(!s.nozzle_out);
        assert!(!s.has_current_fill);
        assert_eq!(s.current_fill_volume_l, 0.0);
        // Last sale stays latched for the transaction recorder.
        assert_eq!(s.last_fill_volume_l, 4.0);
        assert!(!store.have_fill_baseline);

        // A second sale starts from a fresh baseline even though the
        // totalizer kept counting.
        store.update_from_status(PumpState::FillingCompleted);
        store.update_from_status(PumpState::Filling);
        store.update_from_fill(fill(104.0));
        let s = store.update_from_fill(fill(106.0));
        assert_eq!(s.current_fill_volume_l, 2.0);
    }

    #[test]
    fn test_auth_applies_card_and_limit() {
        let mut store = PumpRuntimeStore::new();
        let s = store.update_from_auth(&AuthContext {
            authorized: true,
            uid_hex: "32A0AB04".into(),
            user_id: "7".into(),
            plate: "34 AB 123".into(),
            limit_liters: 40.0,
        });
        assert!(s.auth_active && s.last_card_auth_ok);
        assert!(s.has_limit);
        assert_eq!(s.remaining_limit_liters, 40.0);
        invariants(&s);
    }

    #[test]
    fn test_limit_tracks_fill_and_clamps_at_zero() {
        let mut store = PumpRuntimeStore::new();
        store.update_from_auth(&AuthContext {
            authorized: true,
            uid_hex: "AA".into(),
            user_id: "1".into(),
            plate: String::new(),
            limit_liters: 10.0,
        });
        store.update_from_status(PumpState::Filling);
        store.update_from_fill(fill(0.0));

        let s = store.update_from_fill(fill(4.0));
        assert_eq!(s.remaining_limit_liters, 6.0);
        invariants(&s);

        // Overshoot past the quota clamps instead of going negative.
        let s = store.update_from_fill(fill(12.0));
        assert_eq!(s.remaining_limit_liters, 0.0);
        invariants(&s);
    }

    #[test]
    fn test_unauthorized_card_clears_latch() {
        let mut store = PumpRuntimeStore::new();
        store.update_from_auth(&AuthContext {
            authorized: true,
            uid_hex: "AA".into(),
            user_id: "1".into(),
            plate: String::new(),
            limit_liters: 0.0,
        });
        let s = store.update_from_auth(&AuthContext {
            authorized: false,
            uid_hex: "BB".into(),
            ..AuthContext::default()
        });
        assert!(!s.auth_active && !s.last_card_auth_ok);
        assert!(!s.has_limit);
    }

    #[test]
    fn test_clear_auth_keeps_identity_clears_limit() {
        let mut store = PumpRuntimeStore::new();
        store.update_from_auth(&AuthContext {
            authorized: true,
            uid_hex: "32A0AB04".into(),
            user_id: "7".into(),
            plate: "34 AB 123".into(),
            limit_liters: 40.0,
        });
        let s = store.clear_auth();
        assert!(!s.auth_active && !s.last_card_auth_ok);
        assert!(!s.has_limit);
        assert_eq!(s.remaining_limit_liters, 0.0);
        assert_eq!(s.last_card_uid, "32A0AB04");
    }

    #[test]
    fn test_reset_restores_defaults() {
        let mut store = PumpRuntimeStore::new();
        store.update_from_status(PumpState::Filling);
        store.update_from_fill(fill(50.0));
        let s = store.reset();
        assert_eq!(s, PumpRuntimeState::default());
    }

    #[test]
    fn test_limit_invariant_over_interleavings() {
        // Limit invariant must hold over an arbitrary event mix.
        let mut store = PumpRuntimeStore::new();
        let auth = AuthContext {
            authorized: true,
            uid_hex: "AA".into(),
            user_id: "1".into(),
            plate: String::new(),
            limit_liters: 5.0,
        };
        let events: Vec<Box<dyn Fn(&mut PumpRuntimeStore) -> PumpRuntimeState>> = vec![
            Box::new(|st| st.update_from_status(PumpState::Filling)),
            Box::new(|st| st.update_from_fill(fill(10.0))),
            Box::new(|st| st.update_from_nozzle(NozzleEvent { nozzle_out: true })),
            Box::new(|st| st.update_from_fill(fill(13.0))),
            Box::new(|st| st.update_from_status(PumpState::FillingCompleted)),
            Box::new(|st| st.update_from_fill(fill(30.0))),
            Box::new(|st| st.update_from_nozzle(NozzleEvent { nozzle_out: false })),
            Box::new(|st| st.update_from_status(PumpState::Filling)),
            Box::new(|st| st.update_from_fill(fill(31.0))),
        ];
        store.update_from_auth(&auth);
        for ev in &events {
            let s = ev(&mut store);
            invariants(&s);
        }
    }
}
