use num_bigint::BigInt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong while loading, executing, or composing
/// Intcode machines.
///
/// The first group of variants marks a malformed program. Execution is
/// deterministic, so a program that fails this way fails identically on
/// every run; [`Error::is_invalid_program`] picks them out.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid opcode {opcode} at address {address}")]
    InvalidOpcode { address: usize, opcode: i64 },

    #[error("invalid parameter mode {mode} in instruction at address {address}")]
    InvalidMode { address: usize, mode: i64 },

    #[error("immediate-mode write destination in instruction at address {address}")]
    ImmediateWrite { address: usize },

    #[error("negative effective address {target} in instruction at address {address}")]
    NegativeAddress { address: usize, target: BigInt },

    #[error("effective address {target} in instruction at address {address} is out of range")]
    AddressOutOfRange { address: usize, target: BigInt },

    #[error("jump to unaddressable target {target} from instruction at address {address}")]
    InvalidJump { address: usize, target: BigInt },

    /// Execution reached an address outside memory: past the loaded
    /// program and every cell written since.
    #[error("program counter {address} is outside memory")]
    InvalidProgramCounter { address: usize },

    /// The machine blocked on an input instruction with nothing to read.
    /// Not fatal: feed a value and resume.
    #[error("machine is awaiting input at address {address}")]
    AwaitingInput { address: usize },

    #[error("circuit finished without a signal from its last stage")]
    NoSignal,

    #[error("no machine in the circuit can make progress")]
    Deadlock,

    #[error("network did not settle within {ticks} ticks")]
    TickLimit { ticks: usize },

    #[error("node {node} halted in the middle of a packet")]
    IncompletePacket { node: usize },

    #[error("controller cannot interpret output {value}")]
    UnexpectedOutput { value: BigInt },

    #[error("invalid integer {token:?} at position {index} of program listing")]
    Parse {
        index: usize,
        token: String,
        #[source]
        source: num_bigint::ParseBigIntError,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for the fatal conditions caused by a malformed program.
    pub fn is_invalid_program(&self) -> bool {
        matches!(
            self,
            Error::InvalidOpcode { .. }
                | Error::InvalidMode { .. }
                | Error::ImmediateWrite { .. }
                | Error::NegativeAddress { .. }
                | Error::AddressOutOfRange { .. }
                | Error::InvalidJump { .. }
                | Error::InvalidProgramCounter { .. }
        )
    }
}
