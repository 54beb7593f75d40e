//! Device capability read model
//!
//! [`DeviceProfile`] is the JSON shape the control plane reports for a capture
//! device. It is a snapshot: built from live device state on every query and
//! discarded afterwards, never cached.

use serde::Serialize;

/// Snapshot of one capture device's capabilities and current settings
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceProfile {
    pub properties: DeviceProperties,
    pub exposure: ExposureInfo,
    pub zoom: ZoomInfo,
    pub auto_focus: AutoFocusInfo,
    pub flash: FlashInfo,
    pub torch: TorchInfo,
    pub low_light: LowLightInfo,
    pub iso: IsoInfo,
    pub white_balance: WhiteBalanceInfo,
    pub depth: DepthInfo,
}

/// Identity and format properties
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceProperties {
    pub unique_id: String,
    pub name: String,
    pub position: String,
    pub device_type: String,
    /// Resolution preset labels this device supports
    pub supported_presets: Vec<String>,
    /// Label of the currently active preset
    pub active_preset: String,
    pub frame_rate: f64,
}

/// Exposure bias range and current value
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExposureInfo {
    pub min_bias: f64,
    pub max_bias: f64,
    pub bias: f64,
    pub mode: String,
}

/// Zoom range and current value
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoomInfo {
    pub min: f64,
    pub max: f64,
    pub value: f64,
}

/// Autofocus capabilities
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoFocusInfo {
    pub supported: bool,
    pub point_of_interest_supported: bool,
    pub mode: String,
}

/// Flash availability
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlashInfo {
    pub available: bool,
}

/// Torch availability and state
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TorchInfo {
    pub available: bool,
    pub active: bool,
    pub level: f64,
}

/// Low-light boost capability and state
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LowLightInfo {
    pub supported: bool,
    pub enabled: bool,
}

/// ISO range and current value
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IsoInfo {
    pub min: f64,
    pub max: f64,
    pub value: f64,
}

/// White balance mode and gains
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WhiteBalanceInfo {
    pub mode: String,
    pub temperature: f64,
    pub tint: f64,
    pub max_gain: f64,
    pub grey_lock_supported: bool,
}

/// Depth capture capability and state
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepthInfo {
    pub supported: bool,
    pub enabled: bool,
}
