pub mod error;
pub mod memory;
pub mod decode;
pub mod machine;
pub mod program;
pub mod amplifier;
pub mod network;
pub mod control;

pub use error::{Error, Result};
pub use machine::{Event, Machine, State, Step};
pub use num_bigint::BigInt;
