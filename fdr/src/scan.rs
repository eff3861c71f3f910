/// Resumable sweep over a range of bus addresses
///
/// The cursor lets a bus scan be spread across several control-loop cycles
/// instead of blocking one cycle for the whole sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusScan {
    next: u16,
    last: u16,
    responding: u8,
}

impl BusScan {
    pub fn new(first: u8, last: u8) -> Self {
        Self {
            next: first as u16,
            last: last as u16,
            responding: 0,
        }
    }

    /// Next address to probe, or `None` once the sweep is complete
    pub fn next_address(&mut self) -> Option<u8> {
        if self.next > self.last {
            return None;
        }
        let address = self.next as u8;
        self.next += 1;
        Some(address)
    }

    /// Count a device that acknowledged its probe
    pub fn record_response(&mut self) {
        self.responding = self.responding.saturating_add(1);
    }

    pub fn responding(&self) -> u8 {
        self.responding
    }

    pub fn is_finished(&self) -> bool {
        self.next > self.last
    }
}
