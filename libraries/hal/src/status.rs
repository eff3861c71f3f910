//! Status light interface

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorState {
    Idle,
    Recording,
    Fault,
}

/// Single-colour status light. The implementation owns the colour mapping.
pub trait StatusIndicator {
    fn set_state(&mut self, state: IndicatorState);
}
