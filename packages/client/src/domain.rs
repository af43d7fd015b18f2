//! Pure mapping and retry decisions for the control client.
//!
//! Nothing here touches the network or runs commands, which keeps the
//! arithmetic easy to test.

use std::{fmt, time::Duration};

/// Raw axis value treated as full deflection in the negative direction
pub const AXIS_MIN: f64 = -33000.0;
/// Raw axis value treated as full deflection in the positive direction
pub const AXIS_MAX: f64 = 33000.0;

const RECONNECT_BASE_DELAY: Duration = Duration::from_secs(1);
const RECONNECT_MAX_DELAY: Duration = Duration::from_secs(30);

/// Linearly map `x` from `[in_min, in_max]` onto `[out_min, out_max]`.
///
/// Values outside the input range map outside the output range.
pub fn map_range(x: f64, in_min: f64, in_max: f64, out_min: f64, out_max: f64) -> f64 {
    (x - in_min) * (out_max - out_min) / (in_max - in_min) + out_min
}

/// Fan speed percentage for a raw axis value.
///
/// The axis is inverted (pushing the stick forward reports negative values)
/// and the result is rounded and clamped to `0..=100`.
pub fn fan_speed_from_axis(value: i32) -> u8 {
    let percent = map_range(-f64::from(value), AXIS_MIN, AXIS_MAX, 0.0, 100.0);
    percent.round().clamp(0.0, 100.0) as u8
}

/// Desktop color-scheme preference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorScheme {
    Dark,
    Light,
}

impl ColorScheme {
    /// Dark while the toggle button is held, light otherwise
    pub fn from_pressed(pressed: bool) -> Self {
        if pressed { Self::Dark } else { Self::Light }
    }

    /// Value for `org.gnome.desktop.interface color-scheme`
    pub fn gsettings_value(&self) -> &'static str {
        match self {
            Self::Dark => "prefer-dark",
            Self::Light => "prefer-light",
        }
    }
}

impl fmt::Display for ColorScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dark => f.write_str("dark"),
            Self::Light => f.write_str("light"),
        }
    }
}

/// Check if the client should attempt to reconnect.
///
/// # Arguments
///
/// * `current_attempt` - Reconnection attempts made so far
/// * `max_attempts` - The maximum number of reconnection attempts allowed
pub fn should_attempt_reconnect(current_attempt: u32, max_attempts: u32) -> bool {
    current_attempt < max_attempts
}

/// Backoff before reconnection attempt `attempt` (1-based): 1s, 2s, 4s, ... capped at 30s
pub fn reconnect_delay(attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    RECONNECT_BASE_DELAY
        .saturating_mul(1 << exponent)
        .min(RECONNECT_MAX_DELAY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_range_endpoints_and_midpoint() {
        // テスト項目: 入力範囲の両端と中点が出力範囲の両端と中点に写される
        // given (前提条件) / when (操作) / then (期待する結果):
        assert_eq!(map_range(-33000.0, -33000.0, 33000.0, 0.0, 100.0), 0.0);
        assert_eq!(map_range(0.0, -33000.0, 33000.0, 0.0, 100.0), 50.0);
        assert_eq!(map_range(33000.0, -33000.0, 33000.0, 0.0, 100.0), 100.0);
    }

    #[test]
    fn test_map_range_is_monotonic_and_linear() {
        // テスト項目: 写像は単調増加かつ線形である
        // given (前提条件):
        let samples: Vec<f64> = (-33..=33).map(|i| f64::from(i) * 1000.0).collect();

        // when (操作):
        let mapped: Vec<f64> = samples
            .iter()
            .map(|x| map_range(*x, -33000.0, 33000.0, 0.0, 100.0))
            .collect();

        // then (期待する結果):
        for pair in mapped.windows(2) {
            assert!(pair[1] > pair[0]);
            assert!((pair[1] - pair[0] - 100.0 / 66.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_fan_speed_inverts_axis() {
        // テスト項目: 軸の値は反転されてファン速度に変換される
        // given (前提条件) / when (操作) / then (期待する結果):
        assert_eq!(fan_speed_from_axis(-33000), 100);
        assert_eq!(fan_speed_from_axis(-16500), 75);
        assert_eq!(fan_speed_from_axis(0), 50);
        assert_eq!(fan_speed_from_axis(16500), 25);
        assert_eq!(fan_speed_from_axis(33000), 0);
    }

    #[test]
    fn test_fan_speed_rounds_to_nearest() {
        // テスト項目: 端数は四捨五入される
        // given (前提条件):
        // -1000 → 51.515...、 -1300 → 51.969...
        // when (操作) / then (期待する結果):
        assert_eq!(fan_speed_from_axis(-1000), 52);
        assert_eq!(fan_speed_from_axis(-1300), 52);
        assert_eq!(fan_speed_from_axis(600), 49);
    }

    #[test]
    fn test_fan_speed_clamps_out_of_range_values() {
        // テスト項目: 範囲外の軸の値は 0〜100 にクランプされる
        // given (前提条件) / when (操作) / then (期待する結果):
        assert_eq!(fan_speed_from_axis(-40000), 100);
        assert_eq!(fan_speed_from_axis(i32::MIN), 100);
        assert_eq!(fan_speed_from_axis(40000), 0);
        assert_eq!(fan_speed_from_axis(i32::MAX), 0);
    }

    #[test]
    fn test_color_scheme_from_button() {
        // テスト項目: ボタンが押されていればダーク、離されていればライト
        // given (前提条件) / when (操作) / then (期待する結果):
        assert_eq!(ColorScheme::from_pressed(true), ColorScheme::Dark);
        assert_eq!(ColorScheme::from_pressed(false), ColorScheme::Light);
        assert_eq!(ColorScheme::Dark.gsettings_value(), "prefer-dark");
        assert_eq!(ColorScheme::Light.to_string(), "light");
    }

    #[test]
    fn test_should_attempt_reconnect_without_retries() {
        // テスト項目: 再接続回数の上限が 0 の場合、再接続しない
        // given (前提条件) / when (操作) / then (期待する結果):
        assert!(!should_attempt_reconnect(0, 0));
    }

    #[test]
    fn test_should_attempt_reconnect_within_limit() {
        // テスト項目: 再接続回数が上限未満の場合、再接続すべきと判定される
        // given (前提条件) / when (操作) / then (期待する結果):
        assert!(should_attempt_reconnect(0, 5));
        assert!(should_attempt_reconnect(4, 5));
    }

    #[test]
    fn test_should_attempt_reconnect_at_limit() {
        // テスト項目: 再接続回数が上限に達した場合、再接続すべきではないと判定される
        // given (前提条件) / when (操作) / then (期待する結果):
        assert!(!should_attempt_reconnect(5, 5));
    }

    #[test]
    fn test_reconnect_delay_backs_off_exponentially() {
        // テスト項目: 再接続の待機時間は指数的に増え、上限で頭打ちになる
        // given (前提条件) / when (操作) / then (期待する結果):
        assert_eq!(reconnect_delay(1), Duration::from_secs(1));
        assert_eq!(reconnect_delay(2), Duration::from_secs(2));
        assert_eq!(reconnect_delay(3), Duration::from_secs(4));
        assert_eq!(reconnect_delay(6), Duration::from_secs(30));
        assert_eq!(reconnect_delay(u32::MAX), Duration::from_secs(30));
    }
}
