//! Joystick state as it travels from the device reader to the clients.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Axis and button state decoded from one device report line.
///
/// Ids that the device did not report have no entry. On the wire the ids
/// are JSON object keys (strings) and button states are JSON booleans:
///
/// ```text
/// {"axes":{"0":-16500},"buttons":{"32":false}}
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoystickSnapshot {
    /// Axis id to raw device value (roughly -33000..=33000, unvalidated)
    #[serde(default)]
    pub axes: BTreeMap<u32, i32>,
    /// Button id to pressed state
    #[serde(default)]
    pub buttons: BTreeMap<u32, bool>,
}

impl JoystickSnapshot {
    pub fn new(axes: BTreeMap<u32, i32>, buttons: BTreeMap<u32, bool>) -> Self {
        Self { axes, buttons }
    }

    /// `true` when neither an axis nor a button was reported
    pub fn is_empty(&self) -> bool {
        self.axes.is_empty() && self.buttons.is_empty()
    }

    pub fn axis(&self, id: u32) -> Option<i32> {
        self.axes.get(&id).copied()
    }

    pub fn button(&self, id: u32) -> Option<bool> {
        self.buttons.get(&id).copied()
    }
}
