//! Dependency relation formulas for both CPM passes.
//!
//! Each dependency type links one end of the predecessor to one end of the
//! successor. Both passes derive their bound from the same anchor table so the
//! forward and backward formulas cannot drift apart.

use crate::types::DependencyType;

/// Which end of an activity a relation attaches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    Start,
    Finish,
}

/// Scheduling pass direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    /// Successor's earliest start from the predecessor's early window.
    Forward,
    /// Predecessor's latest finish from the successor's late window.
    Backward,
}

/// Start/finish day offsets of one activity (early or late, depending on pass).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: i64,
    pub finish: i64,
}

impl Window {
    fn at(&self, anchor: Anchor) -> i64 {
        match anchor {
            Anchor::Start => self.start,
            Anchor::Finish => self.finish,
        }
    }
}

/// (predecessor anchor, successor anchor) per dependency type.
const ANCHORS: [(DependencyType, Anchor, Anchor); 4] = [
    (DependencyType::FinishToStart, Anchor::Finish, Anchor::Start),
    (DependencyType::StartToStart, Anchor::Start, Anchor::Start),
    (DependencyType::FinishToFinish, Anchor::Finish, Anchor::Finish),
    (DependencyType::StartToFinish, Anchor::Start, Anchor::Finish),
];

/// Anchors for a dependency type.
pub fn anchors(dep_type: DependencyType) -> (Anchor, Anchor) {
    ANCHORS
        .iter()
        .find(|(t, _, _)| *t == dep_type)
        .map(|(_, pred, succ)| (*pred, *succ))
        .unwrap_or((Anchor::Finish, Anchor::Start))
}

/// Bound imposed by one edge on the activity being computed.
///
/// * `Forward`: `other` is the predecessor's early window; the result is a
///   lower bound on the successor's earliest start.
/// * `Backward`: `other` is the successor's late window; the result is an
///   upper bound on the predecessor's latest finish.
///
/// `duration` is the duration of the activity being computed. Arithmetic
/// saturates, so extreme lags pin the bound instead of wrapping.
pub fn bound(dep_type: DependencyType, pass: Pass, other: Window, lag: i64, duration: i64) -> i64 {
    let (pred_anchor, succ_anchor) = anchors(dep_type);
    match pass {
        Pass::Forward => {
            let t = other.at(pred_anchor).saturating_add(lag);
            match succ_anchor {
                Anchor::Start => t,
                Anchor::Finish => t.saturating_sub(duration),
            }
        }
        Pass::Backward => {
            let t = other.at(succ_anchor).saturating_sub(lag);
            match pred_anchor {
                Anchor::Finish => t,
                Anchor::Start => t.saturating_add(duration),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRED_EARLY: Window = Window { start: 2, finish: 5 };
    const SUCC_LATE: Window = Window { start: 10, finish: 14 };

    #[test]
    fn test_forward_formulas() {
        // successor duration 4, lag 1
        let fwd = |t| bound(t, Pass::Forward, PRED_EARLY, 1, 4);
        assert_eq!(fwd(DependencyType::FinishToStart), 5 + 1);
        assert_eq!(fwd(DependencyType::StartToStart), 2 + 1);
        assert_eq!(fwd(DependencyType::FinishToFinish), 5 + 1 - 4);
        assert_eq!(fwd(DependencyType::StartToFinish), 2 + 1 - 4);
    }

    #[test]
    fn test_backward_formulas() {
        // predecessor duration 3, lag 1
        let bwd = |t| bound(t, Pass::Backward, SUCC_LATE, 1, 3);
        assert_eq!(bwd(DependencyType::FinishToStart), 10 - 1);
        assert_eq!(bwd(DependencyType::StartToStart), 10 - 1 + 3);
        assert_eq!(bwd(DependencyType::FinishToFinish), 14 - 1);
        assert_eq!(bwd(DependencyType::StartToFinish), 14 - 1 + 3);
    }

    #[test]
    fn test_extreme_lag_saturates() {
        let fwd = bound(DependencyType::FinishToStart, Pass::Forward, PRED_EARLY, i64::MAX, 4);
        assert_eq!(fwd, i64::MAX);
        let bwd = bound(DependencyType::FinishToStart, Pass::Backward, SUCC_LATE, i64::MIN, 3);
        assert_eq!(bwd, i64::MAX);
        let sf = bound(DependencyType::StartToFinish, Pass::Forward, PRED_EARLY, i64::MIN, 4);
        assert_eq!(sf, i64::MIN);
    }

    #[test]
    fn test_passes_are_inverse() {
        // Placing the successor exactly at its forward bound must make the
        // predecessor's backward bound equal its own finish.
        for dep_type in DependencyType::ALL {
            for lag in [-2, 0, 3] {
                let pred = Window { start: 4, finish: 7 };
                let succ_duration = 5;
                let succ_start = bound(dep_type, Pass::Forward, pred, lag, succ_duration);
                let succ = Window {
                    start: succ_start,
                    finish: succ_start + succ_duration,
                };
                let pred_finish = bound(dep_type, Pass::Backward, succ, lag, pred.finish - pred.start);
                assert_eq!(pred_finish, pred.finish, "{} lag {}", dep_type, lag);
            }
        }
    }
}
