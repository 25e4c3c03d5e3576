use serde::{Deserialize, Serialize};

/// Number of gesture categories the presentation layer displays.
pub const GESTURE_SLOT_COUNT: usize = 8;

macro_rules! index_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub usize);
    };
}

index_newtype!(SlotIndex);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    #[default]
    Idle,
    Starting,
    Active,
    Closing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Open,
    Closed,
}

/// Visual phase of the main eye, as requested from the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisualPhase {
    #[default]
    Dormant,
    Closed,
    Awakened,
    Closing,
}
