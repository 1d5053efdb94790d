//! RIOT (6532) - I/O ports and interval timer for the Atari 7800
//!
//! On the 7800 the RIOT's registers live directly in the shared address
//! space, so this module keeps only the state that is not visible there
//! (output latches and the timer's running count) and writes the visible
//! registers into the [`AddressSpace`] as they change.
//!
//! # I/O Ports
//!
//! ### Port A (SWCHA / CTLSWA)
//! Joysticks, active low (0 = pressed):
//! - Bits 7-4: Player 0 right, left, down, up
//! - Bits 3-0: Player 1 right, left, down, up
//!
//! A light gun in port 0 pulls bit 4 low while its trigger is held.
//!
//! ### Port B (SWCHB / CTLSWB)
//! Console switches:
//! - Bit 0: Reset (active low)
//! - Bit 1: Select (active low)
//! - Bit 3: Pause (active low)
//! - Bit 6: Left difficulty (1 = A/Pro, 0 = B/Amateur)
//! - Bit 7: Right difficulty
//!
//! Bits whose CTLSW bit is 1 are outputs and read back the latched value
//! (DRA/DRB). Port B bits 2 and 4 select two-button joystick mode for
//! players 0 and 1 when driven low as outputs.
//!
//! # Interval Timer
//!
//! - **TIM1T/TIM8T/TIM64T/T1024T** ($294-$297, mirrored at $29C-$29F)
//! - **INTIM** ($284): remaining count / interval
//! - **INTFLG** ($285): bit 7 set once on expiry
//!
//! After expiry the timer keeps counting at one tick per clock and INTIM
//! reads the low byte of the negative count. Once it passes -255 the timer
//! stops and reads 0 until restarted.

use crate::address_space::AddressSpace;
use crate::input::InputSnapshot;
use emu_core::logging::{log, LogCategory, LogLevel};

pub const SWCHA: u16 = 0x280;
pub const CTLSWA: u16 = 0x281;
pub const SWCHB: u16 = 0x282;
pub const CTLSWB: u16 = 0x283;
pub const INTIM: u16 = 0x284;
pub const INTFLG: u16 = 0x285;
pub const INPT0: u16 = 0x08;
pub const INPT4: u16 = 0x0C;

/// Persistent RIOT state carried by version 2 save states.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RiotSnapshot {
    pub dra: u8,
    pub drb: u8,
    pub timing: bool,
    pub timer_register: u16,
    pub intervals: u8,
    pub clocks: u16,
}

#[derive(Debug, Clone)]
pub struct Riot {
    /// Port A output latch
    dra: u8,
    /// Port B output latch
    drb: u8,
    timing: bool,
    /// Address of the last timer register written
    timer_register: u16,
    /// Initial count of the last timer start
    intervals: u8,
    /// CPU cycles per timer tick
    clocks: u16,
    /// Remaining CPU cycles, negative after expiry
    current_time: i32,
    elapsed: bool,
}

impl Default for Riot {
    fn default() -> Self {
        Self::new()
    }
}

impl Riot {
    pub fn new() -> Self {
        Self {
            dra: 0,
            drb: 0,
            timing: false,
            timer_register: 0,
            intervals: 0,
            clocks: 1,
            current_time: 0,
            elapsed: false,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn is_timing(&self) -> bool {
        self.timing
    }

    /// Publish controller and console state into the port registers.
    pub fn set_input_snapshot(&self, input: &InputSnapshot, space: &mut AddressSpace) {
        let mut swcha = 0u8;
        for (player, stick) in input.players.iter().enumerate() {
            let shift = if player == 0 { 4 } else { 0 };
            let bits = (stick.right as u8) << 3
                | (stick.left as u8) << 2
                | (stick.down as u8) << 1
                | stick.up as u8;
            swcha |= bits << shift;
        }
        if input.light_gun.is_some_and(|gun| gun.trigger) {
            swcha |= 0x10;
        }
        let swcha = !swcha;

        let console = &input.console;
        let mut swchb = 0x3Fu8;
        if console.reset {
            swchb &= !0x01;
        }
        if console.select {
            swchb &= !0x02;
        }
        if console.pause {
            swchb &= !0x08;
        }
        if console.left_difficulty_a {
            swchb |= 0x40;
        }
        if console.right_difficulty_a {
            swchb |= 0x80;
        }

        let ctlswa = space.read_byte(CTLSWA);
        let ctlswb = space.read_byte(CTLSWB);
        space.write_byte(SWCHA, (swcha & !ctlswa) | (self.dra & ctlswa));
        space.write_byte(SWCHB, (swchb & !ctlswb) | (self.drb & ctlswb));

        for (player, stick) in input.players.iter().enumerate() {
            let select = if player == 0 { 0x04 } else { 0x10 };
            let two_button = ctlswb & select != 0 && self.drb & select == 0;
            let inpt = INPT0 + 2 * player as u16;
            let fire = INPT4 + player as u16;
            if two_button {
                space.write_byte(inpt, if stick.button1 { 0x80 } else { 0 });
                space.write_byte(inpt + 1, if stick.button2 { 0x80 } else { 0 });
                space.write_byte(fire, 0x80);
            } else {
                space.write_byte(inpt, 0);
                space.write_byte(inpt + 1, 0);
                let pressed = stick.button1 || stick.button2;
                space.write_byte(fire, if pressed { 0 } else { 0x80 });
            }
        }
    }

    /// Latch a write to SWCHA; output bits show up immediately.
    pub fn set_output_latch_a(&mut self, space: &mut AddressSpace, data: u8) {
        self.dra = data;
        let ctl = space.read_byte(CTLSWA);
        let swcha = space.read_byte(SWCHA);
        space.write_byte(SWCHA, (swcha & !ctl) | (data & ctl));
    }

    /// Latch a write to SWCHB; output bits show up immediately.
    pub fn set_output_latch_b(&mut self, space: &mut AddressSpace, data: u8) {
        self.drb = data;
        let ctl = space.read_byte(CTLSWB);
        let swchb = space.read_byte(SWCHB);
        space.write_byte(SWCHB, (swchb & !ctl) | (data & ctl));
    }

    /// Start the timer from a write of `count` to one of the TIMxT registers.
    pub fn start_timer(&mut self, space: &mut AddressSpace, register: u16, count: u8) {
        self.clocks = match register & 3 {
            0 => 1,
            1 => 8,
            2 => 64,
            _ => 1024,
        };
        self.timer_register = register;
        self.intervals = count;
        self.current_time = self.clocks as i32 * count as i32;
        self.timing = true;
        self.elapsed = false;
        space.write_byte(INTIM, count);
        let flag = space.read_byte(INTFLG);
        space.write_byte(INTFLG, flag & 0x7F);
    }

    /// Count down by `cycles` CPU cycles.
    pub fn advance_timer(&mut self, space: &mut AddressSpace, cycles: u32) {
        if !self.timing {
            return;
        }
        self.current_time -= cycles as i32;

        if !self.elapsed {
            if self.current_time > 0 {
                space.write_byte(INTIM, (self.current_time / self.clocks as i32) as u8);
                return;
            }
            self.elapsed = true;
            let flag = space.read_byte(INTFLG);
            space.write_byte(INTFLG, flag | 0x80);
            log(LogCategory::Timer, LogLevel::Trace, || {
                format!("RIOT: timer expired ({} x {})", self.intervals, self.clocks)
            });
        }

        if self.current_time >= -255 {
            space.write_byte(INTIM, self.current_time as u8);
        } else {
            space.write_byte(INTIM, 0);
            self.timing = false;
        }
    }

    pub fn snapshot(&self) -> RiotSnapshot {
        RiotSnapshot {
            dra: self.dra,
            drb: self.drb,
            timing: self.timing,
            timer_register: self.timer_register,
            intervals: self.intervals,
            clocks: self.clocks,
        }
    }

    /// Restore from a save state. The running count is rebuilt from INTIM
    /// and INTFLG, which must already be back in `space`.
    ///
    /// A raised flag, or an INTIM above the programmed count, means the
    /// timer had expired and INTIM holds the low byte of the negative count.
    pub fn restore(&mut self, snapshot: &RiotSnapshot, space: &AddressSpace) {
        self.dra = snapshot.dra;
        self.drb = snapshot.drb;
        self.timing = snapshot.timing;
        self.timer_register = snapshot.timer_register;
        self.intervals = snapshot.intervals;
        self.clocks = snapshot.clocks.max(1);

        let intim = space.read_byte(INTIM);
        self.elapsed = space.read_byte(INTFLG) & 0x80 != 0 || intim > self.intervals;
        self.current_time = if !self.elapsed {
            intim as i32 * self.clocks as i32
        } else if intim == 0 {
            0
        } else {
            intim as i32 - 256
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{ConsoleSwitches, JoystickState, LightGun};

    #[test]
    fn test_timer_counts_down() {
        let mut space = AddressSpace::new();
        let mut riot = Riot::new();
        riot.start_timer(&mut space, 0x296, 10);
        assert!(riot.is_timing());
        assert_eq!(space.read_byte(INTIM), 10);

        riot.advance_timer(&mut space, 64);
        assert_eq!(space.read_byte(INTIM), 9);
        riot.advance_timer(&mut space, 100);
        assert_eq!(space.read_byte(INTIM), 7);
        assert_eq!(space.read_byte(INTFLG) & 0x80, 0);
    }

    #[test]
    fn test_timer_two_stage_underflow() {
        let mut space = AddressSpace::new();
        let mut riot = Riot::new();
        riot.start_timer(&mut space, 0x295, 2);

        // Expiry sets the flag once and reads zero
        riot.advance_timer(&mut space, 16);
        assert_eq!(space.read_byte(INTIM), 0);
        assert_eq!(space.read_byte(INTFLG) & 0x80, 0x80);

        // Then the count runs negative one tick per cycle
        space.write_byte(INTFLG, 0);
        riot.advance_timer(&mut space, 3);
        assert_eq!(space.read_byte(INTIM), 0xFD);
        assert_eq!(space.read_byte(INTFLG), 0, "flag is not raised twice");
        riot.advance_timer(&mut space, 252);
        assert_eq!(space.read_byte(INTIM), 0x01);
        assert!(riot.is_timing());

        // Past -255 the timer stops
        riot.advance_timer(&mut space, 1);
        assert_eq!(space.read_byte(INTIM), 0);
        assert!(!riot.is_timing());
        riot.advance_timer(&mut space, 100);
        assert_eq!(space.read_byte(INTIM), 0);
    }

    #[test]
    fn test_timer_mirrors_and_intervals() {
        let mut space = AddressSpace::new();
        let mut riot = Riot::new();
        riot.start_timer(&mut space, 0x29F, 1);
        riot.advance_timer(&mut space, 1023);
        assert_eq!(space.read_byte(INTFLG) & 0x80, 0);
        riot.advance_timer(&mut space, 1);
        assert_eq!(space.read_byte(INTFLG) & 0x80, 0x80);

        riot.start_timer(&mut space, 0x294, 5);
        assert_eq!(space.read_byte(INTFLG) & 0x80, 0, "restart clears the flag");
        riot.advance_timer(&mut space, 2);
        assert_eq!(space.read_byte(INTIM), 3);
    }

    #[test]
    fn test_joystick_mapping() {
        let mut space = AddressSpace::new();
        let riot = Riot::new();
        let mut input = InputSnapshot::default();
        input.players[0] = JoystickState {
            right: true,
            up: true,
            ..Default::default()
        };
        input.players[1].down = true;
        riot.set_input_snapshot(&input, &mut space);
        assert_eq!(space.read_byte(SWCHA), !0b1001_0010);
    }

    #[test]
    fn test_console_switches() {
        let mut space = AddressSpace::new();
        let riot = Riot::new();
        let input = InputSnapshot {
            console: ConsoleSwitches {
                reset: true,
                pause: true,
                left_difficulty_a: true,
                ..Default::default()
            },
            ..Default::default()
        };
        riot.set_input_snapshot(&input, &mut space);
        let swchb = space.read_byte(SWCHB);
        assert_eq!(swchb & 0x01, 0);
        assert_eq!(swchb & 0x02, 0x02);
        assert_eq!(swchb & 0x08, 0);
        assert_eq!(swchb & 0x40, 0x40);
        assert_eq!(swchb & 0x80, 0);
    }

    #[test]
    fn test_output_latch_overrides_inputs() {
        let mut space = AddressSpace::new();
        let mut riot = Riot::new();
        space.write_byte(CTLSWA, 0x0F);
        riot.set_output_latch_a(&mut space, 0x05);
        let mut input = InputSnapshot::default();
        input.players[1].up = true;
        riot.set_input_snapshot(&input, &mut space);
        // Player 1 bits are outputs, so the latch wins
        assert_eq!(space.read_byte(SWCHA), 0xF5);
    }

    #[test]
    fn test_one_button_mode() {
        let mut space = AddressSpace::new();
        let riot = Riot::new();
        let mut input = InputSnapshot::default();
        riot.set_input_snapshot(&input, &mut space);
        assert_eq!(space.read_byte(INPT4), 0x80);

        input.players[0].button2 = true;
        riot.set_input_snapshot(&input, &mut space);
        assert_eq!(space.read_byte(INPT4), 0);
        assert_eq!(space.read_byte(INPT0), 0);
        assert_eq!(space.read_byte(INPT4 + 1), 0x80);
    }

    #[test]
    fn test_two_button_mode() {
        let mut space = AddressSpace::new();
        let mut riot = Riot::new();
        space.write_byte(CTLSWB, 0x14);
        riot.set_output_latch_b(&mut space, 0x00);

        let mut input = InputSnapshot::default();
        input.players[0].button1 = true;
        input.players[1].button2 = true;
        riot.set_input_snapshot(&input, &mut space);
        assert_eq!(space.read_byte(INPT0), 0x80);
        assert_eq!(space.read_byte(INPT0 + 1), 0);
        assert_eq!(space.read_byte(INPT0 + 2), 0);
        assert_eq!(space.read_byte(INPT0 + 3), 0x80);
        assert_eq!(space.read_byte(INPT4), 0x80);
        assert_eq!(space.read_byte(INPT4 + 1), 0x80);
    }

    #[test]
    fn test_light_gun_trigger() {
        let mut space = AddressSpace::new();
        let riot = Riot::new();
        let input = InputSnapshot {
            light_gun: Some(LightGun {
                x: 10,
                y: 10,
                trigger: true,
            }),
            ..Default::default()
        };
        riot.set_input_snapshot(&input, &mut space);
        assert_eq!(space.read_byte(SWCHA) & 0x10, 0);
    }

    #[test]
    fn test_snapshot_restore() {
        let mut space = AddressSpace::new();
        let mut riot = Riot::new();
        riot.start_timer(&mut space, 0x296, 20);
        riot.advance_timer(&mut space, 640);
        let snap = riot.snapshot();
        assert_eq!(snap.clocks, 64);
        assert_eq!(snap.intervals, 20);

        let mut other = Riot::new();
        other.restore(&snap, &space);
        assert!(other.is_timing());
        other.advance_timer(&mut space, 64);
        assert_eq!(space.read_byte(INTIM), 9);
    }

    #[test]
    fn test_restore_after_expiry() {
        let mut space = AddressSpace::new();
        let mut riot = Riot::new();
        riot.start_timer(&mut space, 0x296, 1);
        riot.advance_timer(&mut space, 74);
        assert_eq!(space.read_byte(INTIM), 0xF6);
        assert_eq!(space.read_byte(INTFLG) & 0x80, 0x80);

        let mut restored_space = space.clone();
        let mut restored = Riot::new();
        restored.restore(&riot.snapshot(), &restored_space);

        space.write_byte(INTFLG, 0);
        restored_space.write_byte(INTFLG, 0);
        riot.advance_timer(&mut space, 1);
        restored.advance_timer(&mut restored_space, 1);
        assert_eq!(space.read_byte(INTIM), 0xF5);
        assert_eq!(restored_space.read_byte(INTIM), 0xF5);
        assert_eq!(restored_space.read_byte(INTFLG), 0, "expiry is not raised again");
    }

    #[test]
    fn test_restore_after_flag_read() {
        let mut space = AddressSpace::new();
        let mut riot = Riot::new();
        riot.start_timer(&mut space, 0x295, 4);
        riot.advance_timer(&mut space, 40);
        // Flag already acknowledged, INTIM reads -8
        space.write_byte(INTFLG, 0);
        assert_eq!(space.read_byte(INTIM), 0xF8);

        let mut restored = Riot::new();
        restored.restore(&riot.snapshot(), &space);
        restored.advance_timer(&mut space, 2);
        assert_eq!(space.read_byte(INTIM), 0xF6);
        assert_eq!(space.read_byte(INTFLG), 0);
    }

    #[test]
    fn test_single_clock_timer_expiry() {
        let mut space = AddressSpace::new();
        let mut riot = Riot::new();
        riot.start_timer(&mut space, 0x294, 5);
        riot.advance_timer(&mut space, 5);
        assert_eq!(space.read_byte(INTIM), 0);
        assert_eq!(space.read_byte(INTFLG) & 0x80, 0x80);
        assert!(riot.is_timing());

        space.write_byte(INTFLG, 0);
        riot.advance_timer(&mut space, 300);
        assert_eq!(space.read_byte(INTIM), 0);
        assert_eq!(space.read_byte(INTFLG), 0);
        assert!(!riot.is_timing());
    }
}
