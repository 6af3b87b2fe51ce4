//! Want hooks: extra routing rules consulted for every message.

use std::ops::ControlFlow;

use dashmap::DashMap;
use metric_tags::MetricMessage;

use super::interest::LaneCounts;
use crate::error::{DirectorError, DirectorResult};

/// Adds lanes for a message after exact and search interest have run.
///
/// `wants` has one slot per lane; set a slot to send the message there.
/// Returning `Break` stops later hooks from running.
pub trait WantHook: Send + Sync {
    fn want(&self, message: &MetricMessage<'_>, wants: &mut [bool]) -> ControlFlow<()>;
}

/// Sends every message to one lane.
#[derive(Debug, Clone, Copy)]
pub struct SubscribeAll {
    lane: usize,
}

impl SubscribeAll {
    pub fn new(lane: usize) -> Self {
        Self { lane }
    }
}

impl WantHook for SubscribeAll {
    fn want(&self, _message: &MetricMessage<'_>, wants: &mut [bool]) -> ControlFlow<()> {
        if let Some(slot) = wants.get_mut(self.lane) {
            *slot = true;
        }
        ControlFlow::Continue(())
    }
}

/// Sends every message from an account to the lanes subscribed to it.
pub struct AccountInterest {
    lanes: usize,
    accounts: DashMap<u64, LaneCounts>,
}

impl AccountInterest {
    pub fn new(lanes: usize) -> Self {
        Self {
            lanes,
            accounts: DashMap::new(),
        }
    }

    /// Add `delta` to `lane`'s subscription count for `account`.
    pub fn adjust(&self, account: u64, lane: usize, delta: i32) -> DirectorResult<u32> {
        if lane >= self.lanes {
            return Err(DirectorError::LaneOutOfRange {
                lane,
                lanes: self.lanes,
            });
        }
        let counts = match self.accounts.get(&account) {
            Some(counts) => counts,
            None => self
                .accounts
                .entry(account)
                .or_insert_with(|| LaneCounts::new(self.lanes))
                .downgrade(),
        };
        counts.adjust(lane, delta)
    }
}

impl WantHook for AccountInterest {
    fn want(&self, message: &MetricMessage<'_>, wants: &mut [bool]) -> ControlFlow<()> {
        if let Some(account) = message.id.account_id
            && let Some(counts) = self.accounts.get(&account)
        {
            counts.mark(wants);
        }
        ControlFlow::Continue(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metric_tags::{NoitField, decode_line};

    const LINE: &str = "M\t1526493506.214\tweb`http`c_77_1`4766c496-2173-4f60-9607-6449d29cac56\tfoo\ti\t1";

    #[test]
    fn test_subscribe_all_ignores_bad_lane() {
        let message = decode_line(LINE.as_bytes(), NoitField::Auto).unwrap();
        let mut wants = [false; 2];
        assert!(SubscribeAll::new(1).want(&message, &mut wants).is_continue());
        assert_eq!(wants, [false, true]);
        let mut wants = [false; 2];
        let _ = SubscribeAll::new(5).want(&message, &mut wants);
        assert_eq!(wants, [false, false]);
    }

    #[test]
    fn test_account_interest() {
        let message = decode_line(LINE.as_bytes(), NoitField::Auto).unwrap();
        assert_eq!(message.id.account_id, Some(77));

        let hook = AccountInterest::new(3);
        hook.adjust(77, 2, 1).unwrap();
        hook.adjust(78, 0, 1).unwrap();
        let mut wants = [false; 3];
        let _ = hook.want(&message, &mut wants);
        assert_eq!(wants, [false, false, true]);

        hook.adjust(77, 2, -1).unwrap();
        let mut wants = [false; 3];
        let _ = hook.want(&message, &mut wants);
        assert_eq!(wants, [false; 3]);
    }

    #[test]
    fn test_account_interest_rejects_bad_lane() {
        let hook = AccountInterest::new(2);
        let err = hook.adjust(1, 5, 1).unwrap_err();
        assert!(matches!(
            err,
            DirectorError::LaneOutOfRange { lane: 5, lanes: 2 }
        ));
        assert_eq!(err.error_code(), "lane_out_of_range");
        // nothing was registered for the account
        assert!(hook.accounts.get(&1).is_none());
        assert_eq!(hook.adjust(1, 1, 1).unwrap(), 1);
    }
}
