use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use num_traits::ToPrimitive;
use intcode::amplifier::{self, Wiring};
use intcode::control::{self, DroidMapper, HullPainter};
use intcode::decode::disassemble;
use intcode::network::{Network, NetworkConfig};
use intcode::program::load_program;
use intcode::{BigInt, Machine, Result};

#[derive(Parser)]
#[command(name = "intcode", about = "Intcode virtual machine and composition harnesses")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a program on the given inputs and print its outputs.
    Run {
        program: PathBuf,

        /// Input value (repeatable).
        #[arg(long = "input", short = 'i', allow_hyphen_values = true)]
        inputs: Vec<BigInt>,

        /// Feed stdin as ASCII and print outputs below 128 as text.
        #[arg(long)]
        ascii: bool,
    },

    /// Chain one machine per phase setting and print the final signal.
    Amplify {
        program: PathBuf,

        /// Connect the last stage back to the first.
        #[arg(long)]
        feedback: bool,

        /// Comma-separated phase settings. Omit to search every permutation
        /// of 0..5 (series) or 5..10 (feedback).
        #[arg(long, value_delimiter = ',')]
        phases: Option<Vec<i64>>,

        /// Signal injected into the first stage.
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        signal: BigInt,
    },

    /// Simulate an all-to-all network of NIC machines with a NAT.
    Network {
        program: PathBuf,

        /// Number of addressable nodes.
        #[arg(long, default_value_t = NetworkConfig::default().size)]
        size: usize,

        /// Consecutive idle ticks before the NAT wakes node 0.
        #[arg(long, default_value_t = NetworkConfig::default().idle_ticks)]
        idle_ticks: usize,

        /// Abort after this many ticks.
        #[arg(long, default_value_t = NetworkConfig::default().tick_limit)]
        tick_limit: usize,
    },

    /// Drive a hull painting robot and render the hull.
    Paint {
        program: PathBuf,

        /// Start on a white panel.
        #[arg(long)]
        start_white: bool,
    },

    /// Map the area around a repair droid.
    Map { program: PathBuf },

    /// Print a disassembly listing.
    Disasm { program: PathBuf },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match dispatch(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if err.is_invalid_program() {
                tracing::error!("invalid program: {err}");
            } else {
                tracing::error!("{err}");
            }
            ExitCode::FAILURE
        }
    }
}

fn dispatch(command: Command) -> Result<()> {
    match command {
        Command::Run {
            program,
            inputs,
            ascii,
        } => run(load_program(program)?, &inputs, ascii),
        Command::Amplify {
            program,
            feedback,
            phases,
            signal,
        } => amplify(load_program(program)?, feedback, phases, signal),
        Command::Network {
            program,
            size,
            idle_ticks,
            tick_limit,
        } => {
            let config = NetworkConfig {
                size,
                idle_ticks,
                tick_limit,
            };
            let report = Network::new(&load_program(program)?, config).run()?;
            println!(
                "first NAT packet: x={} y={}",
                report.first_nat_packet.x, report.first_nat_packet.y
            );
            println!("repeated NAT y: {}", report.repeated_y);
            eprintln!("settled after {} ticks", report.ticks);
            Ok(())
        }
        Command::Paint {
            program,
            start_white,
        } => {
            let mut machine = Machine::new(&load_program(program)?);
            let mut robot = HullPainter::new(i64::from(start_white));
            control::drive(&mut machine, &mut robot)?;
            println!("panels painted: {}", robot.painted_count());
            print!("{}", robot.render());
            Ok(())
        }
        Command::Map { program } => {
            let mut machine = Machine::new(&load_program(program)?);
            let mut droid = DroidMapper::new();
            control::drive(&mut machine, &mut droid)?;
            print!("{}", droid.render());
            match droid.oxygen() {
                Some((x, y)) => println!("oxygen system at ({x}, {y})"),
                None => println!("no oxygen system found"),
            }
            Ok(())
        }
        Command::Disasm { program } => {
            print!("{}", disassemble(&load_program(program)?));
            Ok(())
        }
    }
}

fn run(program: Vec<BigInt>, inputs: &[BigInt], ascii: bool) -> Result<()> {
    let mut machine = Machine::new(&program);
    if ascii {
        let text = std::io::read_to_string(std::io::stdin())?;
        machine.feed_ascii(&text);
    }
    for value in machine.run_to_completion(inputs)? {
        match value.to_u8() {
            Some(byte) if ascii && byte.is_ascii() => print!("{}", char::from(byte)),
            _ => println!("{value}"),
        }
    }
    Ok(())
}

fn amplify(
    program: Vec<BigInt>,
    feedback: bool,
    phases: Option<Vec<i64>>,
    signal: BigInt,
) -> Result<()> {
    let wiring = if feedback { Wiring::Feedback } else { Wiring::Series };
    match phases {
        Some(phases) => {
            let result = amplifier::Circuit::new(&program, &phases, wiring).run(signal)?;
            println!("{result}");
        }
        None => {
            let phase_set: Vec<i64> = if feedback { (5..10).collect() } else { (0..5).collect() };
            let (result, phases) = amplifier::best_phases(&program, &phase_set, wiring, signal)?;
            let listing: Vec<String> = phases.iter().map(i64::to_string).collect();
            println!("{result} (phases {})", listing.join(","));
        }
    }
    Ok(())
}
