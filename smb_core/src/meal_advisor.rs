//! Default meal/high-IOB relaxation advisor.

use crate::config::MealAdvisorCfg;
use crate::ports::{MealAdvisor, MealDecisionInput, MealRelaxDecision};

/// Relaxes SMB restrictions during an active meal when IOB is already high.
///
/// The damping factor is the remaining IOB headroom as a fraction of the
/// relaxation band, clamped to `[min_factor, 1.0]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MealIobAdvisor {
    cfg: MealAdvisorCfg,
}

impl MealIobAdvisor {
    pub fn new(cfg: MealAdvisorCfg) -> Self {
        Self { cfg }
    }
}

impl MealAdvisor for MealIobAdvisor {
    fn decide(&self, i: &MealDecisionInput) -> MealRelaxDecision {
        let no = MealRelaxDecision {
            relax: false,
            damping_factor: 1.0,
        };
        let inputs = [i.bg, i.delta, i.eventual_bg, i.target_bg, i.iob, i.max_iob];
        if !i.meal_mode || inputs.iter().any(|v| !v.is_finite()) || i.max_iob <= 0.0 {
            return no;
        }
        let rising = i.bg >= i.target_bg + self.cfg.min_rise_above_target && i.delta >= 0.0;
        let iob_floor = i.max_iob * self.cfg.iob_fraction;
        if !(rising && i.eventual_bg > i.target_bg && i.iob >= iob_floor) {
            return no;
        }
        let band = (i.max_iob - iob_floor).max(f64::EPSILON);
        let headroom = (i.max_iob - i.iob) / band;
        MealRelaxDecision {
            relax: true,
            damping_factor: headroom.clamp(self.cfg.min_factor, 1.0),
        }
    }
}
