//! Client configuration, built from the command line.

/// Which joystick inputs drive which actuators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlMapping {
    /// Axis mapped to fan speed (`--canal`)
    pub axis: u32,
    /// Button toggling dark mode
    pub button: u32,
    /// GPU (and fan) index passed to nvidia-settings
    pub gpu: u32,
}

impl Default for ControlMapping {
    fn default() -> Self {
        Self {
            axis: 0,
            button: 32,
            gpu: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub mapping: ControlMapping,
    /// Reconnection attempts after the first session ends; 0 exits right away
    pub max_reconnects: u32,
}

impl ClientConfig {
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 9999,
            mapping: ControlMapping::default(),
            max_reconnects: 0,
        }
    }
}
