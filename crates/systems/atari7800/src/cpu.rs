//! CPU wrapper for Atari 7800 (SALLY, a 6502 with halt support)

use emu_core::cpu_6502::{Cpu6502, Memory6502};

use crate::bus::Atari7800Bus;

/// Opcode and operand of `BIT INPT4`, the light gun polling instruction.
const BIT_ZERO_PAGE: u8 = 0x24;
const INPT4: u8 = 0x0C;

/// Cost of one executed instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    /// CPU cycles
    pub base: u32,
    /// MARIA cycles (four per CPU cycle)
    pub fine: u32,
}

/// Register file as stored in save states.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuRegisters {
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub p: u8,
    pub s: u8,
    pub pc: u16,
}

/// Atari 7800 CPU
#[derive(Debug)]
pub struct Atari7800Cpu {
    cpu: Cpu6502<Atari7800Bus>,
}

impl Atari7800Cpu {
    pub fn new(bus: Atari7800Bus) -> Self {
        Self {
            cpu: Cpu6502::new(bus),
        }
    }

    /// Reset the CPU, returning the cycles the sequence takes
    pub fn reset(&mut self) -> u32 {
        self.cpu.reset()
    }

    /// Execute one instruction
    pub fn step(&mut self) -> Step {
        let pc = self.cpu.pc;
        // TIA and RIOT accesses run on a slower clock; only the light gun
        // poll is timed closely enough to matter
        let half_cycle = self.cpu.memory.peek(pc) == BIT_ZERO_PAGE
            && self.cpu.memory.peek(pc.wrapping_add(1)) == INPT4;
        let base = self.cpu.step();
        let fine = (base << 2) + if half_cycle { 2 } else { 0 };
        Step { base, fine }
    }

    /// Take a non-maskable interrupt (MARIA display list interrupt)
    pub fn nmi(&mut self) -> u32 {
        self.cpu.trigger_nmi()
    }

    /// Take a maskable interrupt. Returns 0 when the I flag blocks it.
    pub fn irq(&mut self) -> u32 {
        self.cpu.trigger_irq()
    }

    pub fn bus(&self) -> &Atari7800Bus {
        &self.cpu.memory
    }

    pub fn bus_mut(&mut self) -> &mut Atari7800Bus {
        &mut self.cpu.memory
    }

    pub fn registers(&self) -> CpuRegisters {
        CpuRegisters {
            a: self.cpu.a,
            x: self.cpu.x,
            y: self.cpu.y,
            p: self.cpu.status,
            s: self.cpu.sp,
            pc: self.cpu.pc,
        }
    }

    pub fn set_registers(&mut self, regs: &CpuRegisters) {
        self.cpu.a = regs.a;
        self.cpu.x = regs.x;
        self.cpu.y = regs.y;
        self.cpu.status = regs.p;
        self.cpu.sp = regs.s;
        self.cpu.pc = regs.pc;
    }
}
