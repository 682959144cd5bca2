//! Console status indicator

use std::sync::atomic::{AtomicU32, Ordering};
use tether_core::StatusColor;
use tether_runtime::StatusIndicator;
use tracing::info;

const COLORS: [StatusColor; 4] = [
    StatusColor::Provisioning,
    StatusColor::Connecting,
    StatusColor::Connected,
    StatusColor::Error,
];

/// Logs colour changes instead of driving an LED
#[derive(Debug, Default)]
pub struct ConsoleIndicator {
    last: AtomicU32,
}

impl ConsoleIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last written value as `0xRRGGBB`
    pub fn last_rgb(&self) -> u32 {
        self.last.load(Ordering::SeqCst)
    }
}

fn pack(red: u8, green: u8, blue: u8) -> u32 {
    (u32::from(red) << 16) | (u32::from(green) << 8) | u32::from(blue)
}

fn describe(red: u8, green: u8, blue: u8) -> &'static str {
    match COLORS.iter().find(|color| color.rgb() == (red, green, blue)) {
        Some(StatusColor::Provisioning) => "blue (provisioning)",
        Some(StatusColor::Connecting) => "yellow (connecting)",
        Some(StatusColor::Connected) => "green (connected)",
        Some(StatusColor::Error) => "red (error)",
        None => "custom",
    }
}

impl StatusIndicator for ConsoleIndicator {
    fn set_rgb(&self, red: u8, green: u8, blue: u8) {
        let value = pack(red, green, blue);
        if self.last.swap(value, Ordering::SeqCst) != value {
            info!("Status LED: {} #{:06x}", describe(red, green, blue), value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_last_colour() {
        let indicator = ConsoleIndicator::new();
        indicator.show(StatusColor::Connected);
        assert_eq!(indicator.last_rgb(), 0x00ff00);
        indicator.show(StatusColor::Error);
        assert_eq!(indicator.last_rgb(), 0xff0000);
    }

    #[test]
    fn test_describes_known_colours() {
        assert_eq!(describe(0, 0, 255), "blue (provisioning)");
        assert_eq!(describe(1, 2, 3), "custom");
    }
}
