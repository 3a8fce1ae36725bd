//! Label panel visibility.
//!
//! One continuous opacity scalar per panel. Every tick starts with `decay`;
//! a panel the pick ray hit then gets `reveal`, which replaces that tick's
//! decay instead of stacking on top of it. A `reveal` with no pending decay
//! steps up from the current value.

/// Multiplicative fade applied on ticks where the panel is not hit.
pub const PANEL_DECAY: f32 = 0.9;
/// Additive ramp applied on ticks where the panel is hit.
pub const PANEL_REVEAL_STEP: f32 = 0.1;

/// Opacity of one label panel, always within [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PanelOpacity {
    value: f32,
    /// Value before a decay no reveal has consumed yet.
    pre_decay: Option<f32>,
}

impl PanelOpacity {
    /// New panels start hidden.
    pub fn hidden() -> Self {
        Self::default()
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn is_hidden(&self) -> bool {
        self.value <= 0.0
    }

    /// Default per-tick rule: `o' = max(0, o × 0.9)`.
    pub fn decay(&mut self) {
        self.pre_decay = Some(self.value);
        self.value = (self.value * PANEL_DECAY).max(0.0);
    }

    /// Focused rule: `o' = min(1, o + 0.1)`, measured from the value the
    /// panel had before this tick's decay, or from the current value when
    /// there was none.
    pub fn reveal(&mut self) {
        let base = self.pre_decay.take().unwrap_or(self.value);
        self.value = (base + PANEL_REVEAL_STEP).min(1.0);
    }
}
