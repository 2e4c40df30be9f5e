use std::collections::HashMap;

use num_bigint::BigInt;

/// Addresses below this bound live in a contiguous vector; anything above
/// goes to a hash map so a stray far write cannot allocate gigabytes.
const DENSE_LIMIT: usize = 1 << 20;

/// Conceptually unbounded tape of arbitrary-size integers.
///
/// Every address reads as 0 until it is written. Reading an unset cell is
/// not an error and never allocates. Writes grow the dense prefix on demand
/// up to `DENSE_LIMIT`; beyond that they land in a sparse map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Memory {
    dense: Vec<BigInt>,
    sparse: HashMap<usize, BigInt>,
}

impl Memory {
    /// Copy `program` into addresses `0..program.len()`.
    pub fn new<T: Clone + Into<BigInt>>(program: &[T]) -> Self {
        Self {
            dense: program.iter().cloned().map(Into::into).collect(),
            sparse: HashMap::new(),
        }
    }

    #[inline]
    pub fn get(&self, addr: usize) -> BigInt {
        match self.dense.get(addr) {
            Some(v) => v.clone(),
            None => self.sparse.get(&addr).cloned().unwrap_or_default(),
        }
    }

    pub fn set(&mut self, addr: usize, value: BigInt) {
        if addr < self.dense.len() {
            self.dense[addr] = value;
        } else if addr < DENSE_LIMIT {
            self.dense.resize(addr + 1, BigInt::default());
            self.dense[addr] = value;
        } else {
            self.sparse.insert(addr, value);
        }
    }

    /// Whether `addr` holds the loaded program or has been written since.
    /// Cells zero-filled by a write past the end count as written.
    pub fn contains(&self, addr: usize) -> bool {
        addr < self.dense.len() || self.sparse.contains_key(&addr)
    }

    /// Length of the dense prefix: the loaded program plus any cells
    /// written contiguously past it.
    pub fn dense_len(&self) -> usize {
        self.dense.len()
    }

    /// The dense prefix as a slice.
    pub fn as_slice(&self) -> &[BigInt] {
        &self.dense
    }
}
