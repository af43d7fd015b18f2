//! Decoding of `jstest` status lines into [`JoystickSnapshot`]s.
//!
//! A status line looks like:
//!
//! ```text
//! Axes:  0:  1500  1:     0  3:  -200 Buttons:  0:off  1:off 32:on
//! ```
//!
//! Decoding is pure: the result depends only on the given line.

use std::{collections::BTreeMap, sync::LazyLock};

use joybridge_shared::JoystickSnapshot;
use regex::Regex;

static AXES_SECTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Axes:\s+(.*?)(?:Buttons:|$)").expect("axes section regex"));
static AXIS_PAIR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+):\s*(-?\d+)").expect("axis pair regex"));
static BUTTONS_SECTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Buttons:\s+(.*)").expect("buttons section regex"));
static BUTTON_PAIR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+):(on|off)").expect("button pair regex"));

/// Decode one line of device output.
///
/// Lines without an `Axes:` marker produce no axes, lines without a
/// `Buttons:` marker produce no buttons. Unrecognized lines produce an empty
/// snapshot rather than an error.
pub fn decode_line(line: &str) -> JoystickSnapshot {
    JoystickSnapshot::new(decode_axes(line), decode_buttons(line))
}

fn decode_axes(line: &str) -> BTreeMap<u32, i32> {
    let Some(section) = AXES_SECTION.captures(line).and_then(|c| c.get(1)) else {
        return BTreeMap::new();
    };
    AXIS_PAIR
        .captures_iter(section.as_str())
        .filter_map(|pair| {
            let id = pair[1].parse().ok()?;
            let value = pair[2].parse().ok()?;
            Some((id, value))
        })
        .collect()
}

fn decode_buttons(line: &str) -> BTreeMap<u32, bool> {
    let Some(section) = BUTTONS_SECTION.captures(line).and_then(|c| c.get(1)) else {
        return BTreeMap::new();
    };
    BUTTON_PAIR
        .captures_iter(section.as_str())
        .filter_map(|pair| {
            let id = pair[1].parse().ok()?;
            Some((id, &pair[2] == "on"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_axes_and_buttons() {
        // テスト項目: 軸とボタンの両方を含む行が正しくデコードされる
        // given (前提条件):
        let line = "Axes: 0: 1500 3: -200 Buttons: 32:on";

        // when (操作):
        let snapshot = decode_line(line);

        // then (期待する結果):
        assert_eq!(snapshot.axes, BTreeMap::from([(0, 1500), (3, -200)]));
        assert_eq!(snapshot.buttons, BTreeMap::from([(32, true)]));
    }

    #[test]
    fn test_decode_jstest_padding() {
        // テスト項目: jstest が出力する桁揃えの空白を含む行もデコードできる
        // given (前提条件):
        let line = "Axes:  0:-16500  1:     0  2:-32767 Buttons:  0:off  1:on  2:off ";

        // when (操作):
        let snapshot = decode_line(line);

        // then (期待する結果):
        assert_eq!(
            snapshot.axes,
            BTreeMap::from([(0, -16500), (1, 0), (2, -32767)])
        );
        assert_eq!(
            snapshot.buttons,
            BTreeMap::from([(0, false), (1, true), (2, false)])
        );
    }

    #[test]
    fn test_decode_axes_without_buttons_section() {
        // テスト項目: Buttons マーカーが無い場合、軸は行末まで読まれボタンは空になる
        // given (前提条件):
        let line = "Axes: 0: 12 1: -7";

        // when (操作):
        let snapshot = decode_line(line);

        // then (期待する結果):
        assert_eq!(snapshot.axes, BTreeMap::from([(0, 12), (1, -7)]));
        assert!(snapshot.buttons.is_empty());
    }

    #[test]
    fn test_decode_buttons_without_axes_section() {
        // テスト項目: Axes マーカーが無い場合、軸は空になる
        // given (前提条件):
        let line = "Buttons: 4:on 5:off";

        // when (操作):
        let snapshot = decode_line(line);

        // then (期待する結果):
        assert!(snapshot.axes.is_empty());
        assert_eq!(snapshot.buttons, BTreeMap::from([(4, true), (5, false)]));
    }

    #[test]
    fn test_decode_unrelated_line_is_empty() {
        // テスト項目: どちらのマーカーも含まない行は空のスナップショットになる
        // given (前提条件):
        let lines = [
            "Driver version is 2.1.0.",
            "Joystick (Generic X-Box pad) has 8 axes (X, Y, Z, Rx, Ry, Rz, Hat0X, Hat0Y)",
            "Testing ... (interrupt to exit)",
            "",
        ];

        for line in lines {
            // when (操作):
            let snapshot = decode_line(line);

            // then (期待する結果):
            assert!(snapshot.is_empty(), "line {:?} should decode to nothing", line);
        }
    }

    #[test]
    fn test_decode_skips_values_out_of_range() {
        // テスト項目: 型の範囲を超える値のペアは読み飛ばされる
        // given (前提条件):
        let line = "Axes: 0: 99999999999 1: 5 Buttons: 99999999999:on 2:on";

        // when (操作):
        let snapshot = decode_line(line);

        // then (期待する結果):
        assert_eq!(snapshot.axes, BTreeMap::from([(1, 5)]));
        assert_eq!(snapshot.buttons, BTreeMap::from([(2, true)]));
    }

    #[test]
    fn test_decode_is_idempotent() {
        // テスト項目: 同じ行を何度デコードしても同じ結果になる
        // given (前提条件):
        let line = "Axes: 0: -16500 Buttons: 32:off";

        // when (操作):
        let first = decode_line(line);
        let second = decode_line(line);

        // then (期待する結果):
        assert_eq!(first, second);
    }
}
