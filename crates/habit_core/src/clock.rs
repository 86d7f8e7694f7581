use chrono::{Duration, Local, NaiveDate, NaiveDateTime, Utc};
use parking_lot::RwLock;

/// Source of "now" for every calendar decision. All moments are local wall-clock time;
/// a day starts at local midnight.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;

    fn epoch_millis(&self) -> i64;

    fn today(&self) -> NaiveDate {
        self.now().date()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }

    fn epoch_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Clock that only moves when told to. Used to simulate days passing.
#[derive(Debug)]
pub struct ManualClock {
    now: RwLock<NaiveDateTime>,
}

impl ManualClock {
    pub fn new(start: NaiveDateTime) -> Self {
        Self {
            now: RwLock::new(start),
        }
    }

    pub fn set(&self, moment: NaiveDateTime) {
        *self.now.write() = moment;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.write();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.read()
    }

    fn epoch_millis(&self) -> i64 {
        self.now().and_utc().timestamp_millis()
    }
}
