//! MOS 6502 CPU core implementation
//!
//! A generic 6502 core that any system can drive by implementing the
//! [`Memory6502`] trait. Instruction costs come from a per-opcode table; read
//! instructions that index across a page boundary and taken branches add their
//! penalty on top of the table value.
//!
//! Decimal mode follows NMOS behaviour: ADC derives N and V from the high
//! nibble before its final adjustment and C after it, SBC derives every flag
//! from the binary difference. Decimal ADC sets Z only when both operands and
//! the carry are zero.
//!
//! Indirect addressing matches the 7800's SALLY rather than the NMOS part:
//! a zero-page pointer at $FF takes its high byte from $0100, and
//! `JMP ($xxFF)` takes its high byte from the next page.
//!
//! Undocumented opcodes run as NOPs costing [`ILLEGAL_OPCODE_CYCLES`], so a
//! stray run of them still moves time forward. A masked IRQ consumes no
//! cycles because no entry sequence runs.

use crate::logging::{log, LogCategory, LogLevel};

/// Memory interface trait for the 6502 CPU
///
/// Systems using the 6502 must implement this trait to provide memory access.
pub trait Memory6502 {
    /// Read a byte from memory. Reads may have side effects on
    /// memory-mapped registers.
    fn read(&mut self, addr: u16) -> u8;

    /// Write a byte to memory at the given address
    fn write(&mut self, addr: u16, val: u8);

    /// Read a byte without triggering any register side effects.
    fn peek(&self, addr: u16) -> u8;
}

/// Status register bits.
pub mod flags {
    pub const CARRY: u8 = 0x01;
    pub const ZERO: u8 = 0x02;
    pub const IRQ_DISABLE: u8 = 0x04;
    pub const DECIMAL: u8 = 0x08;
    pub const BREAK: u8 = 0x10;
    pub const RESERVED: u8 = 0x20;
    pub const OVERFLOW: u8 = 0x40;
    pub const NEGATIVE: u8 = 0x80;
}

use flags::*;

pub const NMI_VECTOR: u16 = 0xFFFA;
pub const RESET_VECTOR: u16 = 0xFFFC;
pub const IRQ_VECTOR: u16 = 0xFFFE;

/// Cycles charged for opcodes outside the documented instruction set.
pub const ILLEGAL_OPCODE_CYCLES: u32 = 2;

/// Cycles consumed by the reset sequence.
pub const RESET_CYCLES: u32 = 6;

/// Cycles consumed by NMI and IRQ entry.
pub const INTERRUPT_CYCLES: u32 = 7;

/// Base cycle cost per opcode. Zero marks an undocumented opcode.
#[rustfmt::skip]
const CYCLE_TABLE: [u8; 256] = [
    7, 6, 0, 0, 0, 3, 5, 0, 3, 2, 2, 0, 0, 4, 6, 0,
    2, 5, 0, 0, 0, 4, 6, 0, 2, 4, 0, 0, 0, 4, 7, 0,
    6, 6, 0, 0, 3, 3, 5, 0, 4, 2, 2, 0, 4, 4, 6, 0,
    2, 5, 0, 0, 0, 4, 6, 0, 2, 4, 0, 0, 0, 4, 7, 0,
    6, 6, 0, 0, 0, 3, 5, 0, 3, 2, 2, 0, 3, 4, 6, 0,
    2, 5, 0, 0, 0, 4, 6, 0, 2, 4, 0, 0, 0, 4, 7, 0,
    6, 6, 0, 0, 0, 3, 5, 0, 4, 2, 2, 0, 5, 4, 6, 0,
    2, 5, 0, 0, 0, 4, 6, 0, 2, 4, 0, 0, 0, 4, 7, 0,
    0, 6, 0, 0, 3, 3, 3, 0, 2, 0, 2, 0, 4, 4, 4, 0,
    2, 6, 0, 0, 4, 4, 4, 0, 2, 5, 2, 0, 0, 5, 0, 0,
    2, 6, 2, 0, 3, 3, 3, 0, 2, 2, 2, 0, 4, 4, 4, 0,
    2, 5, 0, 0, 4, 4, 4, 0, 2, 4, 2, 0, 4, 4, 4, 0,
    2, 6, 0, 0, 3, 3, 5, 0, 2, 2, 2, 0, 4, 4, 6, 0,
    2, 5, 0, 0, 0, 4, 6, 0, 2, 4, 0, 0, 0, 4, 7, 0,
    2, 6, 0, 0, 3, 3, 5, 0, 2, 2, 2, 0, 4, 4, 6, 0,
    2, 5, 0, 0, 0, 4, 6, 0, 2, 4, 0, 0, 0, 4, 7, 0,
];

/// Operand addressing modes that resolve to an effective address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Immediate,
    ZeroPage,
    ZeroPageX,
    ZeroPageY,
    Absolute,
    AbsoluteX,
    AbsoluteY,
    IndirectX,
    IndirectY,
}

/// Addressing mode of the ORA/AND/EOR/ADC/STA/LDA/CMP/SBC column.
fn alu_mode(op: u8) -> Mode {
    match (op >> 2) & 7 {
        0 => Mode::IndirectX,
        1 => Mode::ZeroPage,
        2 => Mode::Immediate,
        3 => Mode::Absolute,
        4 => Mode::IndirectY,
        5 => Mode::ZeroPageX,
        6 => Mode::AbsoluteY,
        _ => Mode::AbsoluteX,
    }
}

/// Addressing mode of the memory forms of ASL/ROL/LSR/ROR/INC/DEC.
fn rmw_mode(op: u8) -> Mode {
    match (op >> 2) & 7 {
        1 => Mode::ZeroPage,
        3 => Mode::Absolute,
        5 => Mode::ZeroPageX,
        _ => Mode::AbsoluteX,
    }
}

/// MOS 6502 CPU state and execution engine
#[derive(Debug)]
pub struct Cpu6502<M: Memory6502> {
    /// Accumulator register
    pub a: u8,
    /// X index register
    pub x: u8,
    /// Y index register
    pub y: u8,
    /// Stack pointer (points to 0x0100 + sp)
    pub sp: u8,
    /// Status register (NV-BDIZC)
    pub status: u8,
    /// Program counter
    pub pc: u16,
    /// Total cycles executed
    pub cycles: u64,
    /// Memory interface
    pub memory: M,
}

impl<M: Memory6502> Cpu6502<M> {
    /// Create a new 6502 CPU in its power-on state
    pub fn new(memory: M) -> Self {
        Self {
            a: 0,
            x: 0,
            y: 0,
            sp: 0,
            status: RESERVED,
            pc: 0,
            cycles: 0,
            memory,
        }
    }

    /// Clear the registers and enter the program at the reset vector.
    ///
    /// The stack pointer is left at zero; programs set it up themselves.
    pub fn reset(&mut self) -> u32 {
        self.a = 0;
        self.x = 0;
        self.y = 0;
        self.sp = 0;
        self.status = IRQ_DISABLE | RESERVED | ZERO;
        self.cycles = 0;
        self.pc = self.vector(RESET_VECTOR);
        RESET_CYCLES
    }

    /// Replace the memory interface while preserving CPU state
    pub fn with_memory<N: Memory6502>(self, new_memory: N) -> Cpu6502<N> {
        Cpu6502 {
            a: self.a,
            x: self.x,
            y: self.y,
            sp: self.sp,
            status: self.status,
            pc: self.pc,
            cycles: self.cycles,
            memory: new_memory,
        }
    }

    #[inline]
    fn read(&mut self, addr: u16) -> u8 {
        self.memory.read(addr)
    }

    #[inline]
    fn write(&mut self, addr: u16, val: u8) {
        self.memory.write(addr, val);
    }

    /// Vectors are fetched without register side effects.
    fn vector(&self, addr: u16) -> u16 {
        let lo = self.memory.peek(addr) as u16;
        let hi = self.memory.peek(addr.wrapping_add(1)) as u16;
        (hi << 8) | lo
    }

    #[inline]
    fn fetch_u8(&mut self) -> u8 {
        let v = self.read(self.pc);
        self.pc = self.pc.wrapping_add(1);
        v
    }

    #[inline]
    fn fetch_u16(&mut self) -> u16 {
        let lo = self.fetch_u8() as u16;
        let hi = self.fetch_u8() as u16;
        (hi << 8) | lo
    }

    /// Read a pointer from page zero. A pointer at $FF takes its high byte
    /// from $0100.
    fn read_zero_page_pointer(&mut self, zp: u8) -> u16 {
        let lo = self.read(zp as u16) as u16;
        let hi = self.read(zp as u16 + 1) as u16;
        (hi << 8) | lo
    }

    /// Resolve an operand address. The flag reports an indexed page crossing.
    fn effective_address(&mut self, mode: Mode) -> (u16, bool) {
        match mode {
            Mode::Immediate => {
                let addr = self.pc;
                self.pc = self.pc.wrapping_add(1);
                (addr, false)
            }
            Mode::ZeroPage => (self.fetch_u8() as u16, false),
            Mode::ZeroPageX => (self.fetch_u8().wrapping_add(self.x) as u16, false),
            Mode::ZeroPageY => (self.fetch_u8().wrapping_add(self.y) as u16, false),
            Mode::Absolute => (self.fetch_u16(), false),
            Mode::AbsoluteX => {
                let base = self.fetch_u16();
                let addr = base.wrapping_add(self.x as u16);
                (addr, (base ^ addr) & 0xFF00 != 0)
            }
            Mode::AbsoluteY => {
                let base = self.fetch_u16();
                let addr = base.wrapping_add(self.y as u16);
                (addr, (base ^ addr) & 0xFF00 != 0)
            }
            Mode::IndirectX => {
                let zp = self.fetch_u8().wrapping_add(self.x);
                (self.read_zero_page_pointer(zp), false)
            }
            Mode::IndirectY => {
                let zp = self.fetch_u8();
                let base = self.read_zero_page_pointer(zp);
                let addr = base.wrapping_add(self.y as u16);
                (addr, (base ^ addr) & 0xFF00 != 0)
            }
        }
    }

    /// Fetch an operand for a read instruction, returning the page-cross penalty.
    fn read_operand(&mut self, mode: Mode) -> (u8, u32) {
        let (addr, crossed) = self.effective_address(mode);
        (self.read(addr), crossed as u32)
    }

    /// Read-modify-write on memory.
    fn modify(&mut self, mode: Mode, f: fn(&mut Self, u8) -> u8) {
        let (addr, _) = self.effective_address(mode);
        let val = self.read(addr);
        let result = f(self, val);
        self.write(addr, result);
    }

    #[inline]
    fn push_u8(&mut self, v: u8) {
        let addr = 0x0100 | self.sp as u16;
        self.write(addr, v);
        self.sp = self.sp.wrapping_sub(1);
    }

    #[inline]
    fn pop_u8(&mut self) -> u8 {
        self.sp = self.sp.wrapping_add(1);
        let addr = 0x0100 | self.sp as u16;
        self.read(addr)
    }

    fn push_u16(&mut self, v: u16) {
        self.push_u8((v >> 8) as u8);
        self.push_u8(v as u8);
    }

    fn pop_u16(&mut self) -> u16 {
        let lo = self.pop_u8() as u16;
        let hi = self.pop_u8() as u16;
        (hi << 8) | lo
    }

    fn interrupt(&mut self, vector: u16) {
        self.push_u16(self.pc);
        self.status &= !BREAK;
        self.push_u8(self.status);
        self.status |= IRQ_DISABLE;
        self.pc = self.vector(vector);
    }

    /// Enter the non-maskable interrupt handler. Returns the cycles consumed.
    pub fn trigger_nmi(&mut self) -> u32 {
        self.interrupt(NMI_VECTOR);
        self.cycles += INTERRUPT_CYCLES as u64;
        INTERRUPT_CYCLES
    }

    /// Enter the IRQ handler unless interrupts are disabled.
    /// Returns the cycles consumed, zero when the request was masked.
    pub fn trigger_irq(&mut self) -> u32 {
        if self.status & IRQ_DISABLE != 0 {
            return 0;
        }
        self.interrupt(IRQ_VECTOR);
        self.cycles += INTERRUPT_CYCLES as u64;
        INTERRUPT_CYCLES
    }

    #[inline]
    fn set_flag(&mut self, flag: u8, on: bool) {
        if on {
            self.status |= flag;
        } else {
            self.status &= !flag;
        }
    }

    #[inline]
    fn set_zero_and_negative(&mut self, v: u8) {
        self.set_flag(ZERO, v == 0);
        self.set_flag(NEGATIVE, v & 0x80 != 0);
    }

    fn adc(&mut self, data: u8) {
        let carry = (self.status & CARRY) as u16;
        let a = self.a;
        if self.status & DECIMAL != 0 {
            let mut lo = (a & 0x0F) as u16 + (data & 0x0F) as u16 + carry;
            let mut hi = (a >> 4) as u16 + (data >> 4) as u16;
            if lo > 9 {
                lo += 6;
                hi += 1;
            }
            self.set_flag(ZERO, a as u16 + data as u16 + carry == 0);
            self.set_flag(NEGATIVE, hi & 0x08 != 0);
            self.set_flag(OVERFLOW, !(a ^ data) & (((hi << 4) as u8) ^ a) & 0x80 != 0);
            if hi > 9 {
                hi += 6;
            }
            self.set_flag(CARRY, hi > 15);
            self.a = ((hi << 4) | (lo & 0x0F)) as u8;
        } else {
            let sum = a as u16 + data as u16 + carry;
            let result = sum as u8;
            self.set_flag(CARRY, sum > 0xFF);
            self.set_flag(OVERFLOW, !(a ^ data) & (a ^ result) & 0x80 != 0);
            self.a = result;
            self.set_zero_and_negative(result);
        }
    }

    fn sbc(&mut self, data: u8) {
        let borrow = (self.status & CARRY == 0) as u16;
        let a = self.a;
        let diff = (a as u16).wrapping_sub(data as u16).wrapping_sub(borrow);
        let result = diff as u8;
        self.set_flag(CARRY, diff & 0xFF00 == 0);
        self.set_flag(OVERFLOW, (a ^ data) & (a ^ result) & 0x80 != 0);
        self.set_zero_and_negative(result);
        if self.status & DECIMAL != 0 {
            let mut lo = ((a & 0x0F) as u16)
                .wrapping_sub((data & 0x0F) as u16)
                .wrapping_sub(borrow);
            let mut hi = ((a >> 4) as u16).wrapping_sub((data >> 4) as u16);
            if lo > 9 {
                lo = lo.wrapping_sub(6);
                hi = hi.wrapping_sub(1);
            }
            if hi > 9 {
                hi = hi.wrapping_sub(6);
            }
            self.a = ((hi << 4) | (lo & 0x0F)) as u8;
        } else {
            self.a = result;
        }
    }

    fn compare(&mut self, reg: u8, data: u8) {
        let result = reg.wrapping_sub(data);
        self.set_flag(CARRY, reg >= data);
        self.set_zero_and_negative(result);
    }

    fn bit(&mut self, data: u8) {
        self.set_flag(ZERO, self.a & data == 0);
        self.set_flag(OVERFLOW, data & 0x40 != 0);
        self.set_flag(NEGATIVE, data & 0x80 != 0);
    }

    fn asl(&mut self, v: u8) -> u8 {
        self.set_flag(CARRY, v & 0x80 != 0);
        let r = v << 1;
        self.set_zero_and_negative(r);
        r
    }

    fn lsr(&mut self, v: u8) -> u8 {
        self.set_flag(CARRY, v & 0x01 != 0);
        let r = v >> 1;
        self.set_zero_and_negative(r);
        r
    }

    fn rol(&mut self, v: u8) -> u8 {
        let carry_in = self.status & CARRY;
        self.set_flag(CARRY, v & 0x80 != 0);
        let r = (v << 1) | carry_in;
        self.set_zero_and_negative(r);
        r
    }

    fn ror(&mut self, v: u8) -> u8 {
        let carry_in = (self.status & CARRY) << 7;
        self.set_flag(CARRY, v & 0x01 != 0);
        let r = (v >> 1) | carry_in;
        self.set_zero_and_negative(r);
        r
    }

    fn inc(&mut self, v: u8) -> u8 {
        let r = v.wrapping_add(1);
        self.set_zero_and_negative(r);
        r
    }

    fn dec(&mut self, v: u8) -> u8 {
        let r = v.wrapping_sub(1);
        self.set_zero_and_negative(r);
        r
    }

    /// Take a relative branch when `condition` holds; returns the extra cycles.
    fn branch(&mut self, condition: bool) -> u32 {
        let offset = self.fetch_u8() as i8;
        if !condition {
            return 0;
        }
        let from = self.pc;
        self.pc = from.wrapping_add(offset as i16 as u16);
        if (from ^ self.pc) & 0xFF00 != 0 {
            2
        } else {
            1
        }
    }

    /// Execute one instruction and return cycles used.
    pub fn step(&mut self) -> u32 {
        let op = self.fetch_u8();
        let mut cycles = CYCLE_TABLE[op as usize] as u32;
        match op {
            // ORA
            0x01 | 0x05 | 0x09 | 0x0D | 0x11 | 0x15 | 0x19 | 0x1D => {
                let (v, extra) = self.read_operand(alu_mode(op));
                self.a |= v;
                self.set_zero_and_negative(self.a);
                cycles += extra;
            }
            // AND
            0x21 | 0x25 | 0x29 | 0x2D | 0x31 | 0x35 | 0x39 | 0x3D => {
                let (v, extra) = self.read_operand(alu_mode(op));
                self.a &= v;
                self.set_zero_and_negative(self.a);
                cycles += extra;
            }
            // EOR
            0x41 | 0x45 | 0x49 | 0x4D | 0x51 | 0x55 | 0x59 | 0x5D => {
                let (v, extra) = self.read_operand(alu_mode(op));
                self.a ^= v;
                self.set_zero_and_negative(self.a);
                cycles += extra;
            }
            // ADC
            0x61 | 0x65 | 0x69 | 0x6D | 0x71 | 0x75 | 0x79 | 0x7D => {
                let (v, extra) = self.read_operand(alu_mode(op));
                self.adc(v);
                cycles += extra;
            }
            // STA
            0x81 | 0x85 | 0x8D | 0x91 | 0x95 | 0x99 | 0x9D => {
                let (addr, _) = self.effective_address(alu_mode(op));
                self.write(addr, self.a);
            }
            // LDA
            0xA1 | 0xA5 | 0xA9 | 0xAD | 0xB1 | 0xB5 | 0xB9 | 0xBD => {
                let (v, extra) = self.read_operand(alu_mode(op));
                self.a = v;
                self.set_zero_and_negative(v);
                cycles += extra;
            }
            // CMP
            0xC1 | 0xC5 | 0xC9 | 0xCD | 0xD1 | 0xD5 | 0xD9 | 0xDD => {
                let (v, extra) = self.read_operand(alu_mode(op));
                self.compare(self.a, v);
                cycles += extra;
            }
            // SBC
            0xE1 | 0xE5 | 0xE9 | 0xED | 0xF1 | 0xF5 | 0xF9 | 0xFD => {
                let (v, extra) = self.read_operand(alu_mode(op));
                self.sbc(v);
                cycles += extra;
            }

            // ASL / ROL / LSR / ROR on the accumulator
            0x0A => self.a = self.asl(self.a),
            0x2A => self.a = self.rol(self.a),
            0x4A => self.a = self.lsr(self.a),
            0x6A => self.a = self.ror(self.a),
            // ASL / ROL / LSR / ROR / INC / DEC on memory
            0x06 | 0x0E | 0x16 | 0x1E => self.modify(rmw_mode(op), Self::asl),
            0x26 | 0x2E | 0x36 | 0x3E => self.modify(rmw_mode(op), Self::rol),
            0x46 | 0x4E | 0x56 | 0x5E => self.modify(rmw_mode(op), Self::lsr),
            0x66 | 0x6E | 0x76 | 0x7E => self.modify(rmw_mode(op), Self::ror),
            0xE6 | 0xEE | 0xF6 | 0xFE => self.modify(rmw_mode(op), Self::inc),
            0xC6 | 0xCE | 0xD6 | 0xDE => self.modify(rmw_mode(op), Self::dec),

            // LDX
            0xA2 | 0xA6 | 0xAE | 0xB6 | 0xBE => {
                let mode = match op {
                    0xA2 => Mode::Immediate,
                    0xA6 => Mode::ZeroPage,
                    0xAE => Mode::Absolute,
                    0xB6 => Mode::ZeroPageY,
                    _ => Mode::AbsoluteY,
                };
                let (v, extra) = self.read_operand(mode);
                self.x = v;
                self.set_zero_and_negative(v);
                cycles += extra;
            }
            // LDY
            0xA0 | 0xA4 | 0xAC | 0xB4 | 0xBC => {
                let mode = match op {
                    0xA0 => Mode::Immediate,
                    0xA4 => Mode::ZeroPage,
                    0xAC => Mode::Absolute,
                    0xB4 => Mode::ZeroPageX,
                    _ => Mode::AbsoluteX,
                };
                let (v, extra) = self.read_operand(mode);
                self.y = v;
                self.set_zero_and_negative(v);
                cycles += extra;
            }
            // STX
            0x86 | 0x8E | 0x96 => {
                let mode = match op {
                    0x86 => Mode::ZeroPage,
                    0x8E => Mode::Absolute,
                    _ => Mode::ZeroPageY,
                };
                let (addr, _) = self.effective_address(mode);
                self.write(addr, self.x);
            }
            // STY
            0x84 | 0x8C | 0x94 => {
                let mode = match op {
                    0x84 => Mode::ZeroPage,
                    0x8C => Mode::Absolute,
                    _ => Mode::ZeroPageX,
                };
                let (addr, _) = self.effective_address(mode);
                self.write(addr, self.y);
            }
            // CPX
            0xE0 | 0xE4 | 0xEC => {
                let mode = match op {
                    0xE0 => Mode::Immediate,
                    0xE4 => Mode::ZeroPage,
                    _ => Mode::Absolute,
                };
                let (v, _) = self.read_operand(mode);
                self.compare(self.x, v);
            }
            // CPY
            0xC0 | 0xC4 | 0xCC => {
                let mode = match op {
                    0xC0 => Mode::Immediate,
                    0xC4 => Mode::ZeroPage,
                    _ => Mode::Absolute,
                };
                let (v, _) = self.read_operand(mode);
                self.compare(self.y, v);
            }
            // BIT
            0x24 | 0x2C => {
                let mode = if op == 0x24 {
                    Mode::ZeroPage
                } else {
                    Mode::Absolute
                };
                let (v, _) = self.read_operand(mode);
                self.bit(v);
            }

            // Register transfers
            0xAA => {
                // TAX
                self.x = self.a;
                self.set_zero_and_negative(self.x);
            }
            0x8A => {
                // TXA
                self.a = self.x;
                self.set_zero_and_negative(self.a);
            }
            0xA8 => {
                // TAY
                self.y = self.a;
                self.set_zero_and_negative(self.y);
            }
            0x98 => {
                // TYA
                self.a = self.y;
                self.set_zero_and_negative(self.a);
            }
            0xBA => {
                // TSX
                self.x = self.sp;
                self.set_zero_and_negative(self.x);
            }
            // TXS
            0x9A => self.sp = self.x,
            0xE8 => {
                // INX
                self.x = self.x.wrapping_add(1);
                self.set_zero_and_negative(self.x);
            }
            0xC8 => {
                // INY
                self.y = self.y.wrapping_add(1);
                self.set_zero_and_negative(self.y);
            }
            0xCA => {
                // DEX
                self.x = self.x.wrapping_sub(1);
                self.set_zero_and_negative(self.x);
            }
            0x88 => {
                // DEY
                self.y = self.y.wrapping_sub(1);
                self.set_zero_and_negative(self.y);
            }

            // Flag instructions
            0x18 => self.status &= !CARRY,
            0x38 => self.status |= CARRY,
            0x58 => self.status &= !IRQ_DISABLE,
            0x78 => self.status |= IRQ_DISABLE,
            0xB8 => self.status &= !OVERFLOW,
            0xD8 => self.status &= !DECIMAL,
            0xF8 => self.status |= DECIMAL,
            // NOP
            0xEA => {}

            // Branches
            0x10 => cycles += self.branch(self.status & NEGATIVE == 0),
            0x30 => cycles += self.branch(self.status & NEGATIVE != 0),
            0x50 => cycles += self.branch(self.status & OVERFLOW == 0),
            0x70 => cycles += self.branch(self.status & OVERFLOW != 0),
            0x90 => cycles += self.branch(self.status & CARRY == 0),
            0xB0 => cycles += self.branch(self.status & CARRY != 0),
            0xD0 => cycles += self.branch(self.status & ZERO == 0),
            0xF0 => cycles += self.branch(self.status & ZERO != 0),

            // Stack
            0x48 => self.push_u8(self.a),
            0x68 => {
                // PLA
                self.a = self.pop_u8();
                self.set_zero_and_negative(self.a);
            }
            0x08 => {
                // PHP
                self.push_u8(self.status | BREAK | RESERVED);
            }
            0x28 => {
                // PLP
                self.status = self.pop_u8() | RESERVED;
            }

            // Control flow
            0x4C => {
                // JMP absolute
                self.pc = self.fetch_u16();
            }
            0x6C => {
                // JMP indirect
                let ptr = self.fetch_u16();
                let lo = self.read(ptr) as u16;
                let hi = self.read(ptr.wrapping_add(1)) as u16;
                self.pc = (hi << 8) | lo;
            }
            0x20 => {
                // JSR
                let target = self.fetch_u16();
                self.push_u16(self.pc.wrapping_sub(1));
                self.pc = target;
            }
            0x60 => {
                // RTS
                self.pc = self.pop_u16().wrapping_add(1);
            }
            0x40 => {
                // RTI
                self.status = self.pop_u8() | RESERVED;
                self.pc = self.pop_u16();
            }
            0x00 => {
                // BRK skips its padding byte
                self.pc = self.pc.wrapping_add(1);
                self.push_u16(self.pc);
                self.push_u8(self.status | BREAK | RESERVED);
                self.status |= IRQ_DISABLE;
                self.pc = self.vector(IRQ_VECTOR);
            }

            _ => {
                let pc = self.pc.wrapping_sub(1);
                log(LogCategory::CPU, LogLevel::Trace, || {
                    format!(
                        "CPU: undocumented opcode {:02X} at {:04X} treated as NOP",
                        op, pc
                    )
                });
                cycles = ILLEGAL_OPCODE_CYCLES;
            }
        }
        self.cycles += cycles as u64;
        cycles
    }
}

impl<M: Memory6502> crate::Cpu for Cpu6502<M> {
    fn reset(&mut self) {
        Cpu6502::reset(self);
    }

    fn step(&mut self) -> u32 {
        Cpu6502::step(self)
    }
}

/// Simple array-based memory implementation for testing
#[derive(Debug)]
pub struct ArrayMemory {
    pub data: [u8; 0x10000],
}

impl ArrayMemory {
    pub fn new() -> Self {
        Self { data: [0; 0x10000] }
    }

    /// Load a program into memory and set reset vector
    pub fn load_program(&mut self, offset: u16, data: &[u8]) {
        let off = offset as usize;
        self.data[off..off + data.len()].copy_from_slice(data);
        self.data[RESET_VECTOR as usize] = offset as u8;
        self.data[RESET_VECTOR as usize + 1] = (offset >> 8) as u8;
    }
}

impl Default for ArrayMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl Memory6502 for ArrayMemory {
    fn read(&mut self, addr: u16) -> u8 {
        self.data[addr as usize]
    }

    fn write(&mut self, addr: u16, val: u8) {
        self.data[addr as usize] = val;
    }

    fn peek(&self, addr: u16) -> u8 {
        self.data[addr as usize]
    }
}
