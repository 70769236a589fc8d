/// The two scalars the polling loop carries between iterations.
/// Nothing here survives a restart.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollState {
    /// Wall-clock seconds taken at the top of the latest iteration.
    pub current_timestamp: Option<i64>,
    /// Last place observed from the rank source.
    pub current_place: Option<u32>,
}

impl PollState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_tick(&mut self, now: i64) {
        self.current_timestamp = Some(now);
    }

    pub fn record_place(&mut self, place: u32) {
        self.current_place = Some(place);
    }

    /// True before the first iteration has run.
    pub fn is_first_tick(&self) -> bool {
        self.current_timestamp.is_none()
    }
}
