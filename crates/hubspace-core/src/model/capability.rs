// ── Capability tags ──
//
// Adapters ask "does this device support X" instead of relying on a
// device-class hierarchy. Tags are derived from the function classes a
// device declares.

use strum::{AsRefStr, Display, EnumIter, EnumString};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
pub enum Capability {
    #[strum(serialize = "power")]
    Power,
    #[strum(serialize = "brightness")]
    Brightness,
    #[strum(serialize = "color-temperature")]
    ColorTemperature,
    #[strum(serialize = "color-rgb")]
    ColorRgb,
    #[strum(serialize = "color-mode")]
    ColorMode,
    #[strum(serialize = "fan-speed")]
    FanSpeed,
    #[strum(serialize = "fan-reverse")]
    FanReverse,
    #[strum(serialize = "lock-control")]
    Lock,
    #[strum(serialize = "toggle")]
    Toggle,
    #[strum(serialize = "timer")]
    Timer,
    #[strum(serialize = "battery-level")]
    Battery,
    #[strum(serialize = "temperature")]
    Temperature,
    #[strum(serialize = "mode")]
    Mode,
    #[strum(serialize = "water-flow")]
    WaterFlow,
    #[strum(serialize = "wifi-ssid")]
    WifiSsid,
    #[strum(serialize = "available")]
    Availability,
}

impl Capability {
    /// The tag for a function class, if it is one adapters care about.
    pub fn from_function_class(function_class: &str) -> Option<Self> {
        function_class.parse().ok()
    }

    /// The function class that carries this capability's state.
    pub fn function_class(self) -> &'static str {
        match self {
            Self::Power => "power",
            Self::Brightness => "brightness",
            Self::ColorTemperature => "color-temperature",
            Self::ColorRgb => "color-rgb",
            Self::ColorMode => "color-mode",
            Self::FanSpeed => "fan-speed",
            Self::FanReverse => "fan-reverse",
            Self::Lock => "lock-control",
            Self::Toggle => "toggle",
            Self::Timer => "timer",
            Self::Battery => "battery-level",
            Self::Temperature => "temperature",
            Self::Mode => "mode",
            Self::WaterFlow => "water-flow",
            Self::WifiSsid => "wifi-ssid",
            Self::Availability => "available",
        }
    }
}
