//! Actuators: GPU fan control and desktop color scheme.
//!
//! Both are thin wrappers around external commands. Calls block until the
//! command exits, so async callers run them on the blocking pool.

use std::sync::{Arc, Mutex, PoisonError};

use crate::{command::CommandRunner, domain::ColorScheme, error::ActuatorError};

const NVIDIA_SETTINGS: &str = "nvidia-settings";
const GSETTINGS: &str = "gsettings";

/// Manual GPU fan control
#[cfg_attr(test, mockall::automock)]
pub trait FanControl: Send + Sync {
    /// Take manual control of the fan and set its target speed
    fn set_fan_speed(&self, gpu: u32, percent: u8) -> Result<(), ActuatorError>;

    /// Return the fan to automatic control
    fn reset_fan(&self, gpu: u32) -> Result<(), ActuatorError>;
}

/// Desktop color-scheme preference
#[cfg_attr(test, mockall::automock)]
pub trait ColorSchemeControl: Send + Sync {
    fn set_color_scheme(&self, scheme: ColorScheme) -> Result<(), ActuatorError>;
}

/// Fan control through `nvidia-settings`
///
/// Commands never overlap: a reset issued while a speed change is still
/// running waits for it, so the reset is always the last word.
pub struct NvidiaSettings {
    runner: Arc<dyn CommandRunner>,
    in_flight: Mutex<()>,
}

impl NvidiaSettings {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            in_flight: Mutex::new(()),
        }
    }

    fn run(&self, args: &[String]) -> Result<(), ActuatorError> {
        let _serial = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        self.runner.run(NVIDIA_SETTINGS, args)
    }

    fn fan_speed_args(gpu: u32, percent: u8) -> Vec<String> {
        vec![
            "-a".to_string(),
            format!("[gpu:{}]/GPUFanControlState=1", gpu),
            "-a".to_string(),
            format!("[fan:{}]/GPUTargetFanSpeed={}", gpu, percent.min(100)),
        ]
    }

    fn reset_args(gpu: u32) -> Vec<String> {
        vec!["-a".to_string(), format!("[gpu:{}]/GPUFanControlState=0", gpu)]
    }
}

impl FanControl for NvidiaSettings {
    fn set_fan_speed(&self, gpu: u32, percent: u8) -> Result<(), ActuatorError> {
        self.run(&Self::fan_speed_args(gpu, percent))
    }

    fn reset_fan(&self, gpu: u32) -> Result<(), ActuatorError> {
        self.run(&Self::reset_args(gpu))
    }
}

/// Color scheme through GNOME's `gsettings`
pub struct GnomeColorScheme {
    runner: Arc<dyn CommandRunner>,
}

impl GnomeColorScheme {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }
}

impl ColorSchemeControl for GnomeColorScheme {
    fn set_color_scheme(&self, scheme: ColorScheme) -> Result<(), ActuatorError> {
        let args = vec![
            "set".to_string(),
            "org.gnome.desktop.interface".to_string(),
            "color-scheme".to_string(),
            scheme.gsettings_value().to_string(),
        ];
        self.runner.run(GSETTINGS, &args)
    }
}

/// The actuators a control session drives
#[derive(Clone)]
pub struct Actuators {
    pub fan: Arc<dyn FanControl>,
    pub color_scheme: Arc<dyn ColorSchemeControl>,
}

impl Actuators {
    pub fn new(fan: Arc<dyn FanControl>, color_scheme: Arc<dyn ColorSchemeControl>) -> Self {
        Self { fan, color_scheme }
    }
}

#[cfg(test)]
mod tests {
    use mockall::predicate::eq;

    use super::*;
    use crate::command::MockCommandRunner;

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|arg| arg.to_string()).collect()
    }

    #[test]
    fn test_set_fan_speed_enables_manual_control() {
        // テスト項目: ファン速度設定は手動制御の有効化と目標速度を 1 回のコマンドで指定する
        // given (前提条件):
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .with(
                eq(NVIDIA_SETTINGS),
                eq(strings(&[
                    "-a",
                    "[gpu:1]/GPUFanControlState=1",
                    "-a",
                    "[fan:1]/GPUTargetFanSpeed=75",
                ])),
            )
            .times(1)
            .returning(|_, _| Ok(()));
        let fan = NvidiaSettings::new(Arc::new(runner));

        // when (操作):
        let result = fan.set_fan_speed(1, 75);

        // then (期待する結果):
        assert!(result.is_ok());
    }

    #[test]
    fn test_reset_fan_returns_to_automatic() {
        // テスト項目: リセットは手動制御を無効化する
        // given (前提条件):
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .with(
                eq(NVIDIA_SETTINGS),
                eq(strings(&["-a", "[gpu:0]/GPUFanControlState=0"])),
            )
            .times(1)
            .returning(|_, _| Ok(()));
        let fan = NvidiaSettings::new(Arc::new(runner));

        // when (操作):
        let result = fan.reset_fan(0);

        // then (期待する結果):
        assert!(result.is_ok());
    }

    #[test]
    fn test_reset_waits_for_running_speed_change() {
        // テスト項目: 実行中のファン速度設定がある場合、リセットはその完了後に実行される
        // given (前提条件):
        let order = Arc::new(Mutex::new(Vec::new()));
        let recorder = order.clone();
        let mut runner = MockCommandRunner::new();
        runner.expect_run().returning(move |_, args| {
            let reset = args.len() == 2;
            if !reset {
                std::thread::sleep(std::time::Duration::from_millis(200));
            }
            recorder
                .lock()
                .unwrap()
                .push(if reset { "reset" } else { "set" });
            Ok(())
        });
        let fan = Arc::new(NvidiaSettings::new(Arc::new(runner)));

        // when (操作):
        let setter = {
            let fan = fan.clone();
            std::thread::spawn(move || fan.set_fan_speed(0, 80))
        };
        std::thread::sleep(std::time::Duration::from_millis(50));
        let reset = fan.reset_fan(0);
        let set = setter.join().unwrap();

        // then (期待する結果):
        assert!(set.is_ok());
        assert!(reset.is_ok());
        assert_eq!(*order.lock().unwrap(), vec!["set", "reset"]);
    }

    #[test]
    fn test_set_color_scheme_uses_gsettings() {
        // テスト項目: カラースキームは gsettings の color-scheme キーに設定される
        // given (前提条件):
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .with(
                eq(GSETTINGS),
                eq(strings(&[
                    "set",
                    "org.gnome.desktop.interface",
                    "color-scheme",
                    "prefer-dark",
                ])),
            )
            .times(1)
            .returning(|_, _| Ok(()));
        let scheme = GnomeColorScheme::new(Arc::new(runner));

        // when (操作):
        let result = scheme.set_color_scheme(ColorScheme::Dark);

        // then (期待する結果):
        assert!(result.is_ok());
    }

    #[test]
    fn test_command_failure_is_returned() {
        // テスト項目: コマンドの失敗は ActuatorError として呼び出し元に返される
        // given (前提条件):
        let mut runner = MockCommandRunner::new();
        runner.expect_run().returning(|program, _| {
            Err(ActuatorError::NotFound {
                program: program.to_string(),
            })
        });
        let fan = NvidiaSettings::new(Arc::new(runner));

        // when (操作):
        let result = fan.set_fan_speed(0, 10);

        // then (期待する結果):
        assert!(matches!(result, Err(ActuatorError::NotFound { .. })));
    }
}
