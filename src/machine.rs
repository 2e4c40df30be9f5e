use std::collections::VecDeque;

use num_bigint::BigInt;
use num_traits::{ToPrimitive, Zero};

use crate::decode::{decode, Cursor, Opcode, Param};
use crate::error::{Error, Result};
use crate::memory::Memory;

/// Externally visible execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Running,
    AwaitingInput,
    Halted,
}

/// Result of executing a single instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// One instruction completed.
    Progressed,
    /// An input instruction found the queue empty. Nothing advanced.
    Suspended,
    /// The machine has halted (now or earlier).
    Halted,
}

/// What [`Machine::resume`] stopped on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Output(BigInt),
    AwaitingInput,
    Halted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Status {
    Running,
    /// Blocked on the input instruction at `ip`, holding its destination
    /// operand exactly as decoded.
    Suspended(Param),
    Halted,
}

/// One Intcode virtual machine.
///
/// Owns its memory and both I/O queues. Values are arbitrary-size
/// integers, so arithmetic never overflows. The only suspension point is an
/// input instruction that finds the input queue empty: the machine keeps
/// `ip` on that instruction and remembers the decoded destination, and the
/// next step after a [`feed`](Machine::feed) completes exactly that write.
/// From the output sequence's point of view this is indistinguishable from
/// the value having been available all along.
#[derive(Debug, Clone)]
pub struct Machine {
    memory: Memory,
    ip: usize,
    relative_base: BigInt,
    input: VecDeque<BigInt>,
    output: VecDeque<BigInt>,
    status: Status,
}

impl Machine {
    /// Load `program` at address 0 with `ip = 0`, `relative_base = 0`.
    pub fn new<T: Clone + Into<BigInt>>(program: &[T]) -> Self {
        Self {
            memory: Memory::new(program),
            ip: 0,
            relative_base: BigInt::zero(),
            input: VecDeque::new(),
            output: VecDeque::new(),
            status: Status::Running,
        }
    }

    /// Enqueue an input value. Never runs the machine.
    pub fn feed(&mut self, value: impl Into<BigInt>) {
        self.input.push_back(value.into());
    }

    /// Enqueue every byte of `text` as an input value.
    pub fn feed_ascii(&mut self, text: &str) {
        self.input.extend(text.bytes().map(BigInt::from));
    }

    pub fn state(&self) -> State {
        match self.status {
            Status::Running => State::Running,
            Status::Suspended(_) => State::AwaitingInput,
            Status::Halted => State::Halted,
        }
    }

    pub fn is_halted(&self) -> bool {
        self.status == Status::Halted
    }

    pub fn ip(&self) -> usize {
        self.ip
    }

    pub fn relative_base(&self) -> &BigInt {
        &self.relative_base
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn peek(&self, addr: usize) -> BigInt {
        self.memory.get(addr)
    }

    /// Patch a memory cell, typically before the first step.
    pub fn poke(&mut self, addr: usize, value: impl Into<BigInt>) {
        self.memory.set(addr, value.into());
    }

    /// Number of input values queued but not yet consumed.
    pub fn pending_inputs(&self) -> usize {
        self.input.len()
    }

    /// Execute one instruction.
    pub fn step(&mut self) -> Result<Step> {
        match &self.status {
            Status::Halted => return Ok(Step::Halted),
            Status::Suspended(dest) => {
                let dest = dest.clone();
                let Some(value) = self.input.pop_front() else {
                    return Ok(Step::Suspended);
                };
                self.store(&dest, value, self.ip)?;
                self.ip += 2;
                self.status = Status::Running;
                return Ok(Step::Progressed);
            }
            Status::Running => {}
        }

        let (opcode, mut cursor) = decode(&self.memory, self.ip)?;
        let address = cursor.address;
        match opcode {
            Opcode::Add | Opcode::Mul | Opcode::LessThan | Opcode::Equals => {
                let a = self.load(&mut cursor)?;
                let b = self.load(&mut cursor)?;
                let dest = cursor.param(&self.memory)?;
                let value = match opcode {
                    Opcode::Add => a + b,
                    Opcode::Mul => a * b,
                    Opcode::LessThan => BigInt::from(u8::from(a < b)),
                    _ => BigInt::from(u8::from(a == b)),
                };
                self.store(&dest, value, address)?;
                self.ip = cursor.next_address();
            }
            Opcode::Input => {
                let dest = cursor.param(&self.memory)?;
                // Reject a bad destination now rather than on resume.
                dest.target(&self.relative_base, address)?;
                match self.input.pop_front() {
                    Some(value) => {
                        self.store(&dest, value, address)?;
                        self.ip = cursor.next_address();
                    }
                    None => {
                        self.status = Status::Suspended(dest);
                        return Ok(Step::Suspended);
                    }
                }
            }
            Opcode::Output => {
                let value = self.load(&mut cursor)?;
                self.output.push_back(value);
                self.ip = cursor.next_address();
            }
            Opcode::JumpIfTrue | Opcode::JumpIfFalse => {
                let cond = self.load(&mut cursor)?;
                let target = self.load(&mut cursor)?;
                if cond.is_zero() != (opcode == Opcode::JumpIfTrue) {
                    self.ip = target
                        .to_usize()
                        .ok_or_else(|| Error::InvalidJump { address, target })?;
                } else {
                    self.ip = cursor.next_address();
                }
            }
            Opcode::AdjustBase => {
                let delta = self.load(&mut cursor)?;
                self.relative_base += delta;
                self.ip = cursor.next_address();
            }
            Opcode::Halt => {
                self.status = Status::Halted;
                return Ok(Step::Halted);
            }
        }
        Ok(Step::Progressed)
    }

    /// Run until an output is available, the machine blocks for input, or
    /// it halts. Queued outputs are always returned before `Halted`.
    pub fn resume(&mut self) -> Result<Event> {
        loop {
            if let Some(value) = self.output.pop_front() {
                return Ok(Event::Output(value));
            }
            match self.step()? {
                Step::Progressed => {}
                Step::Suspended => return Ok(Event::AwaitingInput),
                Step::Halted => return Ok(Event::Halted),
            }
        }
    }

    /// Next value of the output stream, or `None` once the program halts.
    ///
    /// Blocking on an empty input queue is reported as
    /// [`Error::AwaitingInput`]; the machine stays resumable.
    pub fn next_output(&mut self) -> Result<Option<BigInt>> {
        match self.resume()? {
            Event::Output(value) => Ok(Some(value)),
            Event::Halted => Ok(None),
            Event::AwaitingInput => Err(Error::AwaitingInput { address: self.ip }),
        }
    }

    /// Collect outputs until the machine blocks for input or halts.
    /// Check [`state`](Machine::state) to tell which.
    pub fn run_until_blocked(&mut self) -> Result<Vec<BigInt>> {
        let mut outputs = Vec::new();
        while let Event::Output(value) = self.resume()? {
            outputs.push(value);
        }
        Ok(outputs)
    }

    /// Feed all of `inputs`, then drain the output stream to the end.
    pub fn run_to_completion<T>(&mut self, inputs: &[T]) -> Result<Vec<BigInt>>
    where
        T: Clone + Into<BigInt>,
    {
        self.input.extend(inputs.iter().cloned().map(Into::into));
        self.outputs().collect()
    }

    /// Execute up to `step_limit` instructions without draining outputs.
    /// Returns the number of instructions completed. Stops early when the
    /// machine suspends or halts.
    pub fn run_bounded(&mut self, step_limit: usize) -> Result<usize> {
        let mut steps = 0;
        while steps < step_limit {
            match self.step()? {
                Step::Progressed => steps += 1,
                Step::Suspended | Step::Halted => break,
            }
        }
        Ok(steps)
    }

    /// The output stream as a single-pass iterator. Ends when the program
    /// halts; yields at most one error, after which it is exhausted.
    pub fn outputs(&mut self) -> Outputs<'_> {
        Outputs {
            machine: self,
            done: false,
        }
    }

    fn load(&self, cursor: &mut Cursor) -> Result<BigInt> {
        let param = cursor.param(&self.memory)?;
        param.value(&self.memory, &self.relative_base, cursor.address)
    }

    fn store(&mut self, dest: &Param, value: BigInt, address: usize) -> Result<()> {
        let target = dest.target(&self.relative_base, address)?;
        self.memory.set(target, value);
        Ok(())
    }
}

pub struct Outputs<'a> {
    machine: &'a mut Machine,
    done: bool,
}

impl Iterator for Outputs<'_> {
    type Item = Result<BigInt>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.machine.next_output() {
            Ok(Some(value)) => Some(Ok(value)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Run `program` on `inputs` in a fresh machine and return all outputs.
pub fn run<P, I>(program: &[P], inputs: &[I]) -> Result<Vec<BigInt>>
where
    P: Clone + Into<BigInt>,
    I: Clone + Into<BigInt>,
{
    Machine::new(program).run_to_completion(inputs)
}
