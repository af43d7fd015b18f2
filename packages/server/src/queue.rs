//! Single-slot, latest-wins handoff between the device reader and the
//! broadcast loop.

use std::sync::{Mutex, PoisonError};

use joybridge_shared::JoystickSnapshot;

/// Holds at most one snapshot. Publishing replaces whatever has not been
/// taken yet, so the consumer only ever sees the newest state.
#[derive(Debug, Default)]
pub struct SnapshotSlot {
    latest: Mutex<Option<JoystickSnapshot>>,
}

impl SnapshotSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `snapshot`, dropping any snapshot not yet taken.
    ///
    /// Returns `true` if an unconsumed snapshot was overwritten.
    pub fn publish(&self, snapshot: JoystickSnapshot) -> bool {
        let mut latest = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
        latest.replace(snapshot).is_some()
    }

    /// Remove and return the pending snapshot, if any
    pub fn take(&self) -> Option<JoystickSnapshot> {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    pub fn is_pending(&self) -> bool {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::BTreeMap, sync::Arc, thread};

    use super::*;

    fn snapshot(value: i32) -> JoystickSnapshot {
        JoystickSnapshot::new(BTreeMap::from([(0, value)]), BTreeMap::new())
    }

    #[test]
    fn test_take_from_empty_slot() {
        // テスト項目: 空のスロットからは何も取り出せない
        // given (前提条件):
        let slot = SnapshotSlot::new();

        // when (操作):
        let result = slot.take();

        // then (期待する結果):
        assert_eq!(result, None);
        assert!(!slot.is_pending());
    }

    #[test]
    fn test_latest_snapshot_wins() {
        // テスト項目: 取り出し前に 2 回書き込むと、最新のスナップショットだけが残る
        // given (前提条件):
        let slot = SnapshotSlot::new();

        // when (操作):
        let first_overwrote = slot.publish(snapshot(1));
        let second_overwrote = slot.publish(snapshot(2));

        // then (期待する結果):
        assert!(!first_overwrote);
        assert!(second_overwrote);
        assert_eq!(slot.take(), Some(snapshot(2)));
        assert_eq!(slot.take(), None);
    }

    #[test]
    fn test_publish_after_take() {
        // テスト項目: 取り出し後の書き込みは上書き扱いにならない
        // given (前提条件):
        let slot = SnapshotSlot::new();
        slot.publish(snapshot(1));
        slot.take();

        // when (操作):
        let overwrote = slot.publish(snapshot(3));

        // then (期待する結果):
        assert!(!overwrote);
        assert_eq!(slot.take(), Some(snapshot(3)));
    }

    #[test]
    fn test_concurrent_producer_leaves_last_value() {
        // テスト項目: 別スレッドから連続して書き込んでも最後の値だけが観測される
        // given (前提条件):
        let slot = Arc::new(SnapshotSlot::new());
        let producer_slot = slot.clone();

        // when (操作):
        thread::spawn(move || {
            for value in 0..1000 {
                producer_slot.publish(snapshot(value));
            }
        })
        .join()
        .unwrap();

        // then (期待する結果):
        assert_eq!(slot.take(), Some(snapshot(999)));
        assert_eq!(slot.take(), None);
    }
}
