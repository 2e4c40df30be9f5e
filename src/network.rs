use std::collections::VecDeque;

use num_bigint::BigInt;
use num_traits::ToPrimitive;
use tracing::{debug, info, trace};

use crate::error::{Error, Result};
use crate::machine::{Event, Machine};

/// Value read by a node that polls an empty queue.
pub const NO_PACKET: i64 = -1;

/// Configuration for an all-to-all network simulation.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Number of addressable nodes (addresses `0..size`).
    pub size: usize,
    /// Consecutive idle ticks before the NAT wakes node 0.
    pub idle_ticks: usize,
    /// Give up after this many ticks.
    pub tick_limit: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            size: 50,
            idle_ticks: 2,
            tick_limit: 1_000_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub x: BigInt,
    pub y: BigInt,
}

/// Outcome of a completed simulation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    /// The first packet any node addressed outside the network.
    pub first_nat_packet: Packet,
    /// The `y` carried by two NAT deliveries in a row.
    pub repeated_y: BigInt,
    pub ticks: usize,
}

struct Node {
    machine: Machine,
    queue: VecDeque<Packet>,
    /// Output words of a packet still being emitted: dest, x, y.
    partial: Vec<BigInt>,
}

/// A set of machines running the same NIC program, exchanging
/// `(dest, x, y)` packets.
///
/// Each tick runs every node until it polls an empty queue, at which point
/// it reads [`NO_PACKET`] and yields to the next node. Packets addressed
/// outside `0..size` go to the NAT, which holds only the latest one and
/// delivers it to node 0 once the network has been idle for
/// `idle_ticks` ticks. Packets addressed to a halted node are dropped.
pub struct Network {
    nodes: Vec<Node>,
    config: NetworkConfig,
    nat: Option<Packet>,
    first_nat: Option<Packet>,
    last_delivered_y: Option<BigInt>,
    idle: usize,
    ticks: usize,
}

impl Network {
    /// Boot `config.size` nodes, feeding each its own address.
    pub fn new<T: Clone + Into<BigInt>>(program: &[T], config: NetworkConfig) -> Self {
        let nodes = (0..config.size)
            .map(|address| {
                let mut machine = Machine::new(program);
                machine.feed(address);
                Node {
                    machine,
                    queue: VecDeque::new(),
                    partial: Vec::with_capacity(3),
                }
            })
            .collect();
        Self {
            nodes,
            config,
            nat: None,
            first_nat: None,
            last_delivered_y: None,
            idle: 0,
            ticks: 0,
        }
    }

    /// The packet currently held by the NAT.
    pub fn nat(&self) -> Option<&Packet> {
        self.nat.as_ref()
    }

    pub fn ticks(&self) -> usize {
        self.ticks
    }

    /// Run one scheduling round over every node.
    ///
    /// Returns `Some(y)` when this tick's NAT delivery repeats the previous
    /// delivery's `y`.
    pub fn tick(&mut self) -> Result<Option<BigInt>> {
        self.ticks += 1;
        let mut active = false;

        for i in 0..self.nodes.len() {
            let sent = self.poll_node(i, &mut active)?;
            for (dest, packet) in sent {
                self.route(i, dest, packet);
            }
        }

        if active {
            self.idle = 0;
            return Ok(None);
        }
        self.idle += 1;
        if self.idle < self.config.idle_ticks {
            return Ok(None);
        }

        let Some(packet) = self.nat.clone() else {
            return Ok(None);
        };
        self.idle = 0;
        debug!(tick = self.ticks, x = %packet.x, y = %packet.y, "NAT wakes node 0");
        let y = packet.y.clone();
        self.deliver(0, packet);
        if self.last_delivered_y.as_ref() == Some(&y) {
            return Ok(Some(y));
        }
        self.last_delivered_y = Some(y);
        Ok(None)
    }

    /// Tick until the NAT delivers the same `y` twice in a row.
    pub fn run(&mut self) -> Result<Report> {
        loop {
            if self.ticks >= self.config.tick_limit {
                return Err(Error::TickLimit { ticks: self.ticks });
            }
            if let Some(repeated_y) = self.tick()? {
                let first_nat_packet = self.first_nat.clone().unwrap_or_else(|| Packet {
                    x: BigInt::default(),
                    y: repeated_y.clone(),
                });
                let report = Report {
                    first_nat_packet,
                    repeated_y,
                    ticks: self.ticks,
                };
                info!(?report, "network settled");
                return Ok(report);
            }
            if self.nodes.iter().all(|n| n.machine.is_halted()) {
                return Err(Error::Deadlock);
            }
        }
    }

    /// Run node `i` until it polls an empty queue or halts, returning the
    /// packets it sent.
    fn poll_node(&mut self, i: usize, active: &mut bool) -> Result<Vec<(BigInt, Packet)>> {
        let node = &mut self.nodes[i];
        let mut sent = Vec::new();
        if node.machine.is_halted() {
            return Ok(sent);
        }
        loop {
            match node.machine.resume()? {
                Event::Output(value) => {
                    node.partial.push(value);
                    if let [dest, x, y] = &mut node.partial[..] {
                        let packet = Packet {
                            x: std::mem::take(x),
                            y: std::mem::take(y),
                        };
                        sent.push((std::mem::take(dest), packet));
                        node.partial.clear();
                        *active = true;
                    }
                }
                Event::AwaitingInput => match node.queue.pop_front() {
                    Some(packet) => {
                        node.machine.feed(packet.x);
                        node.machine.feed(packet.y);
                        *active = true;
                    }
                    None => {
                        node.machine.feed(NO_PACKET);
                        break;
                    }
                },
                Event::Halted => {
                    if !node.partial.is_empty() {
                        return Err(Error::IncompletePacket { node: i });
                    }
                    debug!(node = i, "node halted");
                    break;
                }
            }
        }
        Ok(sent)
    }

    fn route(&mut self, from: usize, dest: BigInt, packet: Packet) {
        trace!(from, %dest, x = %packet.x, y = %packet.y, "packet");
        match dest.to_usize().filter(|&d| d < self.nodes.len()) {
            Some(to) => self.deliver(to, packet),
            None => {
                if self.first_nat.is_none() {
                    debug!(x = %packet.x, y = %packet.y, "first NAT packet");
                    self.first_nat = Some(packet.clone());
                }
                self.nat = Some(packet);
            }
        }
    }

    fn deliver(&mut self, to: usize, packet: Packet) {
        let Some(node) = self.nodes.get_mut(to) else {
            return;
        };
        if node.machine.is_halted() {
            trace!(to, x = %packet.x, y = %packet.y, "dropped packet for halted node");
            return;
        }
        node.queue.push_back(packet);
    }
}
