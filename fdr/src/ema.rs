/// Exponential moving average over pressure readings
///
/// Undefined until seeded with a first accepted reading; after that every
/// update blends `alpha * raw + (1 - alpha) * previous`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PressureFilter {
    alpha: f32,
    value: Option<f32>,
}

impl PressureFilter {
    pub fn new(alpha: f32) -> Self {
        Self { alpha, value: None }
    }

    pub fn value(&self) -> Option<f32> {
        self.value
    }

    pub fn is_initialized(&self) -> bool {
        self.value.is_some()
    }

    /// Initialize with `raw`. Has no effect once initialized.
    pub fn seed(&mut self, raw: f32) {
        if self.value.is_none() {
            self.value = Some(raw);
        }
    }

    /// Blend `raw` into the average. Does nothing before the filter is seeded.
    pub fn update(&mut self, raw: f32) -> Option<f32> {
        if let Some(previous) = self.value {
            self.value = Some(self.alpha * raw + (1.0 - self.alpha) * previous);
        }
        self.value
    }

    pub fn reset(&mut self) {
        self.value = None;
    }
}
