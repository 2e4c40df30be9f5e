use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive};

use crate::error::{Error, Result};
use crate::memory::Memory;

/// The low two decimal digits of an instruction word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Add,
    Mul,
    Input,
    Output,
    JumpIfTrue,
    JumpIfFalse,
    LessThan,
    Equals,
    AdjustBase,
    Halt,
}

impl Opcode {
    pub fn from_code(code: i64) -> Option<Self> {
        Some(match code {
            1 => Opcode::Add,
            2 => Opcode::Mul,
            3 => Opcode::Input,
            4 => Opcode::Output,
            5 => Opcode::JumpIfTrue,
            6 => Opcode::JumpIfFalse,
            7 => Opcode::LessThan,
            8 => Opcode::Equals,
            9 => Opcode::AdjustBase,
            99 => Opcode::Halt,
            _ => return None,
        })
    }

    /// Number of parameters following the instruction word.
    pub fn arity(self) -> usize {
        match self {
            Opcode::Add | Opcode::Mul | Opcode::LessThan | Opcode::Equals => 3,
            Opcode::JumpIfTrue | Opcode::JumpIfFalse => 2,
            Opcode::Input | Opcode::Output | Opcode::AdjustBase => 1,
            Opcode::Halt => 0,
        }
    }

    /// Index of the parameter that is written, if any.
    pub fn write_param(self) -> Option<usize> {
        match self {
            Opcode::Add | Opcode::Mul | Opcode::LessThan | Opcode::Equals => Some(2),
            Opcode::Input => Some(0),
            _ => None,
        }
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Add => "ADD",
            Opcode::Mul => "MUL",
            Opcode::Input => "IN",
            Opcode::Output => "OUT",
            Opcode::JumpIfTrue => "JNZ",
            Opcode::JumpIfFalse => "JZ",
            Opcode::LessThan => "LT",
            Opcode::Equals => "EQ",
            Opcode::AdjustBase => "ARB",
            Opcode::Halt => "HALT",
        }
    }
}

/// Parameter addressing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Position,
    Immediate,
    Relative,
}

impl Mode {
    fn from_digit(digit: i64) -> Option<Self> {
        match digit {
            0 => Some(Mode::Position),
            1 => Some(Mode::Immediate),
            2 => Some(Mode::Relative),
            _ => None,
        }
    }
}

/// One decoded operand: its addressing mode and the raw cell value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub mode: Mode,
    pub raw: BigInt,
}

impl Param {
    /// Effective value of a read operand.
    ///
    /// `address` is the instruction's own address, used only for error
    /// reporting.
    pub fn value(&self, mem: &Memory, relative_base: &BigInt, address: usize) -> Result<BigInt> {
        match self.mode {
            Mode::Immediate => Ok(self.raw.clone()),
            Mode::Position | Mode::Relative => {
                Ok(mem.get(self.target(relative_base, address)?))
            }
        }
    }

    /// Effective address of an operand. Immediate mode has no address, so
    /// using it as a write destination is fatal.
    pub fn target(&self, relative_base: &BigInt, address: usize) -> Result<usize> {
        let target = match self.mode {
            Mode::Position => self.raw.clone(),
            Mode::Relative => relative_base + &self.raw,
            Mode::Immediate => return Err(Error::ImmediateWrite { address }),
        };
        match target.to_usize() {
            Some(addr) => Ok(addr),
            None if target.is_negative() => Err(Error::NegativeAddress { address, target }),
            None => Err(Error::AddressOutOfRange { address, target }),
        }
    }
}

/// Decode state for a single instruction: where the instruction starts,
/// where the next operand lives, and the mode digits not yet consumed.
///
/// A fresh cursor is produced by [`decode`] for every fetch and consumed
/// by the execute step; nothing about it survives between instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub address: usize,
    next: usize,
    modes: i64,
}

impl Cursor {
    /// Read the next operand and its mode digit. Missing digits are mode 0.
    pub fn param(&mut self, mem: &Memory) -> Result<Param> {
        let digit = self.modes % 10;
        self.modes /= 10;
        let mode = Mode::from_digit(digit).ok_or(Error::InvalidMode {
            address: self.address,
            mode: digit,
        })?;
        let raw = mem.get(self.next);
        self.next += 1;
        Ok(Param { mode, raw })
    }

    /// Address just past the last operand consumed so far.
    pub fn next_address(&self) -> usize {
        self.next
    }
}

/// Fetch and decode the instruction word at `ip`.
pub fn decode(mem: &Memory, ip: usize) -> Result<(Opcode, Cursor)> {
    if !mem.contains(ip) {
        return Err(Error::InvalidProgramCounter { address: ip });
    }
    let word = mem.get(ip);
    let code = low_digits(&word, 100);
    let opcode = Opcode::from_code(code).ok_or(Error::InvalidOpcode {
        address: ip,
        opcode: code,
    })?;
    // No instruction has more than three operands; higher mode digits are
    // never read.
    let cursor = Cursor {
        address: ip,
        next: ip + 1,
        modes: low_digits(&(word / 100), 1000),
    };
    Ok((opcode, cursor))
}

/// `word % modulus`, truncated toward zero. The remainder always fits.
fn low_digits(word: &BigInt, modulus: i64) -> i64 {
    (word % modulus).to_i64().unwrap_or_default()
}

/// Pretty-print a linear-sweep disassembly of a program listing.
///
/// Cells that do not decode as an instruction (data, or words with bad
/// modes) are shown as `DATA` and the sweep continues at the next cell.
pub fn disassemble<T: Clone + Into<BigInt>>(program: &[T]) -> String {
    use std::fmt::Write;
    let mem = Memory::new(program);
    let mut out = String::new();
    let mut ip = 0;
    while ip < program.len() {
        let Some(line) = disassemble_one(&mem, ip, program.len()) else {
            let _ = writeln!(out, "{ip:05}: DATA {}", mem.get(ip));
            ip += 1;
            continue;
        };
        let (text, width) = line;
        let _ = writeln!(out, "{ip:05}: {text}");
        ip += width;
    }
    out
}

fn disassemble_one(mem: &Memory, ip: usize, len: usize) -> Option<(String, usize)> {
    let (opcode, mut cursor) = decode(mem, ip).ok()?;
    if ip + opcode.arity() >= len {
        return None;
    }
    let mut text = opcode.mnemonic().to_string();
    for i in 0..opcode.arity() {
        let param = cursor.param(mem).ok()?;
        if opcode.write_param() == Some(i) && param.mode == Mode::Immediate {
            return None;
        }
        let operand = match param.mode {
            Mode::Position => format!("[{}]", param.raw),
            Mode::Immediate => format!("{}", param.raw),
            Mode::Relative if param.raw.is_negative() => format!("[rb{}]", param.raw),
            Mode::Relative => format!("[rb+{}]", param.raw),
        };
        text.push(if i == 0 { ' ' } else { ',' });
        if i > 0 {
            text.push(' ');
        }
        text.push_str(&operand);
    }
    Some((text, 1 + opcode.arity()))
}
