//! Host-side controller state handed to the machine once per frame.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoystickState {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
    /// Left button; the only button in one-button mode
    pub button1: bool,
    pub button2: bool,
}

/// Console panel. Difficulty switches read `true` in the A (pro) position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleSwitches {
    pub reset: bool,
    pub select: bool,
    pub pause: bool,
    pub left_difficulty_a: bool,
    pub right_difficulty_a: bool,
}

/// Light gun aim in framebuffer pixels (320 wide, from the top visible line).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightGun {
    pub x: u32,
    pub y: u32,
    pub trigger: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSnapshot {
    pub players: [JoystickState; 2],
    pub console: ConsoleSwitches,
    pub light_gun: Option<LightGun>,
}

impl InputSnapshot {
    /// Snapshot with only player 0 set.
    pub fn player0(joystick: JoystickState) -> Self {
        Self {
            players: [joystick, JoystickState::default()],
            ..Default::default()
        }
    }
}
