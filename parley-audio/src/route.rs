use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Classification of the output the platform is currently playing through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AudioRoute {
    Speaker,
    Earpiece,
    WiredHeadset,
    Bluetooth,
}

impl AudioRoute {
    /// Best guess based on how platforms commonly name their output ports.
    pub fn classify(port_name: &str) -> Self {
        let name = port_name.to_lowercase();
        if ["bluetooth", "airpods", "hands-free", "a2dp"]
            .iter()
            .any(|needle| name.contains(needle))
        {
            AudioRoute::Bluetooth
        } else if ["headphone", "headset", "wired"]
            .iter()
            .any(|needle| name.contains(needle))
        {
            AudioRoute::WiredHeadset
        } else if ["earpiece", "receiver"]
            .iter()
            .any(|needle| name.contains(needle))
        {
            AudioRoute::Earpiece
        } else {
            AudioRoute::Speaker
        }
    }
}

impl Display for AudioRoute {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            AudioRoute::Speaker => write!(f, "speaker"),
            AudioRoute::Earpiece => write!(f, "earpiece"),
            AudioRoute::WiredHeadset => write!(f, "wired headset"),
            AudioRoute::Bluetooth => write!(f, "bluetooth"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PortOverride {
    /// Let the platform pick the output for the current category and mode.
    #[default]
    None,
    Speaker,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn classify_port_names() {
        assert_eq!(
            AudioRoute::classify("AirPods Pro"),
            AudioRoute::Bluetooth
        );
        assert_eq!(
            AudioRoute::classify("Headphones (Realtek Audio)"),
            AudioRoute::WiredHeadset
        );
        assert_eq!(AudioRoute::classify("Receiver"), AudioRoute::Earpiece);
        assert_eq!(
            AudioRoute::classify("MacBook Pro Speakers"),
            AudioRoute::Speaker
        );
    }
}
