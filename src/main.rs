//! Breadboard - DC circuit core demo runner
//!
//! Builds one of a few reference circuits, steps it and prints the result.
//!
//! # Usage
//!
//! ```bash
//! RUST_LOG=debug breadboard battery-led --resistance 10 --ticks 3
//! breadboard floating --json
//! ```

use std::error::Error;

use breadboard_core::{
    circuit::{validate_circuit, ComponentId},
    Circuit, Result, Simulator, SolveResult, SolverConfig,
};
use clap::{Parser, ValueEnum};

/// Reference circuits
#[derive(ValueEnum, Clone, Copy, Debug)]
enum Demo {
    /// Battery, resistor and LED in a loop
    BatteryLed,
    /// Battery, resistor and nothing else
    Resistor,
    /// Battery with its terminals wired together
    Short,
    /// Battery-LED loop plus a resistor with no wires
    Floating,
}

/// Quasi-static DC circuit solver demo
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Circuit to build
    #[arg(value_enum, default_value_t = Demo::BatteryLed)]
    demo: Demo,

    /// Battery voltage in volts
    #[arg(short, long, default_value_t = 5.0)]
    voltage: f64,

    /// Series resistance in ohms
    #[arg(short, long, default_value_t = 220.0)]
    resistance: f64,

    /// Insert the LED cathode-first
    #[arg(long)]
    reverse: bool,

    /// Number of ticks to step
    #[arg(short, long, default_value_t = 1)]
    ticks: u32,

    /// Tick length in seconds
    #[arg(long, default_value_t = 1.0 / 60.0)]
    dt: f64,

    /// Newton-Raphson iteration cap
    #[arg(long)]
    max_iterations: Option<usize>,

    /// Print the last result as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> std::result::Result<(), Box<dyn Error>> {
    env_logger::init();
    let args = Args::parse();

    let mut circuit = build(&args)?;
    for problem in validate_circuit(&circuit) {
        log::warn!("validation: {}", problem);
    }

    let mut config = SolverConfig::default();
    if let Some(max_iterations) = args.max_iterations {
        config = config.with_max_iterations(max_iterations);
    }
    let mut simulator = Simulator::with_config(config);

    let mut result = simulator.latest();
    for _ in 0..args.ticks.max(1) {
        result = simulator.step(&mut circuit, args.dt);
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&*result)?);
    } else {
        print_result(&circuit, &result);
    }
    Ok(())
}

fn build(args: &Args) -> Result<Circuit> {
    let mut circuit = Circuit::new(format!("{:?}", args.demo));
    let battery = circuit.add_from_tag("B1", "battery")?;
    circuit.set_property(battery, "voltage", args.voltage)?;

    if let Demo::Short = args.demo {
        circuit.connect_pins(battery, "positive", battery, "negative")?;
        return Ok(circuit);
    }

    let resistor = circuit.add_from_tag("R1", "resistor")?;
    circuit.set_property(resistor, "resistance", args.resistance)?;
    circuit.connect_pins(battery, "positive", resistor, "pin1")?;

    if let Demo::Resistor = args.demo {
        circuit.connect_pins(resistor, "pin2", battery, "negative")?;
        return Ok(circuit);
    }

    let led = circuit.add_from_tag("D1", "led")?;
    let (first, last) = if args.reverse {
        ("cathode", "anode")
    } else {
        ("anode", "cathode")
    };
    circuit.connect_pins(resistor, "pin2", led, first)?;
    circuit.connect_pins(led, last, battery, "negative")?;

    if let Demo::Floating = args.demo {
        circuit.add_from_tag("R2", "resistor")?;
    }
    Ok(circuit)
}

fn print_result(circuit: &Circuit, result: &SolveResult) {
    println!(
        "{} - tick {} at t = {:.3} s ({} iterations)",
        circuit.name, result.tick, result.time, result.iterations
    );
    if let Some(error) = &result.error {
        println!("error: {}", error);
    }
    for warning in &result.warnings {
        println!("warning: {}", warning);
    }

    println!("nodes:");
    for node in &result.nodes {
        let tag = match (node.ground, node.floating) {
            (true, _) => " (ground)",
            (_, true) => " (floating)",
            _ => "",
        };
        println!("  {}{}: {:.6} V", node.id, tag, node.voltage);
    }

    println!("components:");
    for reading in &result.components {
        println!(
            "  {} [{}]{}",
            name_of(circuit, reading.id),
            reading.component_type,
            brightness(reading.brightness)
        );
        let Some(component) = circuit.component(reading.id) else {
            continue;
        };
        for (pin, state) in component.pins().iter().zip(&reading.pins) {
            println!(
                "    {:<8} {:>10.6} V {:>12.6} mA",
                pin.name,
                state.voltage,
                state.current * 1e3
            );
        }
    }
}

fn name_of(circuit: &Circuit, id: ComponentId) -> String {
    circuit
        .component(id)
        .map_or_else(|| id.to_string(), |c| c.name.clone())
}

fn brightness(level: Option<f64>) -> String {
    level.map_or_else(String::new, |b| format!(" brightness {:.0}%", b * 100.0))
}
