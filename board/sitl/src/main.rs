use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use fdr::{AcquisitionConfig, BaroAcquisition, Recorder, RecorderConfig, Request, Response, Station};
use log::{error, info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use board::{ConsoleLight, ExportTarget, SystemClock};
use commands::Command;
use sim::{Part, SimBus};
use store::FsStore;

mod board;
mod commands;
mod sim;
mod store;

const PRIMARY_ADDRESS: u8 = 0x76;
const SECONDARY_ADDRESS: u8 = 0x77;

#[derive(Parser)]
#[command(name = "sitl")]
#[command(about = "Barometer flight data recorder running against a simulated bus", long_about = None)]
struct Args {
    /// Directory backing the persistent store
    #[arg(long, default_value = "./fdr-data")]
    data_dir: PathBuf,

    /// Control loop period in milliseconds
    #[arg(long, default_value_t = 5)]
    tick_ms: u64,

    /// Barometer installed on the simulated bus
    #[arg(long, value_enum, default_value_t = Part::Bme280)]
    part: Part,

    /// Install the barometer at 0x77 instead of 0x76
    #[arg(long, default_value_t = false)]
    secondary: bool,

    /// Wipe the data directory before the first mount
    #[arg(long, default_value_t = false)]
    format_on_start: bool,
}

type SitlStation = Station<SimBus, FsStore, ConsoleLight, SystemClock>;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let address = if args.secondary {
        SECONDARY_ADDRESS
    } else {
        PRIMARY_ADDRESS
    };
    let sensor = BaroAcquisition::new(SimBus::new(args.part, address), AcquisitionConfig::default());
    let recorder = Recorder::new(
        FsStore::new(&args.data_dir, args.format_on_start),
        ConsoleLight::default(),
        SystemClock::new(),
        RecorderConfig::default(),
    );
    let mut station = Station::new(sensor, recorder);
    station.initialize();

    let (tx, mut rx) = mpsc::unbounded_channel();
    tokio::spawn(read_console(tx));
    println!("{}", commands::HELP);

    let mut interval = tokio::time::interval(Duration::from_millis(args.tick_ms.max(1)));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut running = true;
    while running {
        interval.tick().await;
        station.step(|station| {
            while let Ok(command) = rx.try_recv() {
                if !serve(station, command) {
                    running = false;
                    break;
                }
            }
        });
    }

    station.recorder.stop(&mut station.sensor);
    info!("stopping");
    Ok(())
}

/// Returns false once the operator asked to quit
fn serve(station: &mut SitlStation, command: Command) -> bool {
    match command {
        Command::Quit => return false,
        Command::Request(request) => {
            let mut out = ExportTarget::Stdout(io::stdout());
            report(station.handle(request, &mut out));
        }
        Command::ExportTo(path) => match File::create(&path) {
            Ok(file) => {
                let response = station.handle(Request::Export, &mut ExportTarget::File(file));
                report(response);
                if let Response::Exported { .. } = response {
                    println!("written to {}", path.display());
                }
            }
            Err(e) => error!("cannot create {}: {}", path.display(), e),
        },
    }
    true
}

fn report(response: Response) {
    match response {
        Response::Reading {
            temperature,
            pressure,
        } => match temperature {
            Some(t) => println!("temperature {:.2} C, pressure {:.2} hPa", t, pressure),
            None => println!("pressure {:.2} hPa", pressure),
        },
        Response::NotReady => println!("sensor not ready"),
        Response::Started(plan) => println!(
            "recording {} s at {} Hz{}",
            plan.duration_s,
            plan.samples_per_second,
            if plan.clamped { " (rate clamped)" } else { "" }
        ),
        Response::Stopped => println!("recording stopped"),
        Response::Reset => println!("recording deleted"),
        Response::Exported { bytes } => println!("exported {} bytes", bytes),
        Response::Failed(e) => eprintln!("request failed: {}", e),
    }
}

/// Forward console lines to the control loop until stdin closes
async fn read_console(tx: mpsc::UnboundedSender<Command>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match Command::parse(&line) {
                Ok(Some(command)) => {
                    if tx.send(command).is_err() {
                        return;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    eprintln!("{:#}", e);
                    println!("{}", commands::HELP);
                }
            },
            Ok(None) => break,
            Err(e) => {
                warn!("console read failed: {}", e);
                break;
            }
        }
    }
    let _ = tx.send(Command::Quit);
}
