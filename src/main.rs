use city_traffic::config::{SimulationConfig, MAX_CARS, MAX_LIGHTS};
use city_traffic::monitoring::traffic_monitoring_system::{
    finished_line, run_console, write_trip_log,
};
use city_traffic::{SimResult, Simulation};
use clap::Parser;
use log::{error, info};
use std::collections::HashSet;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::time::interval;

/// Grid-based city traffic simulation.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Number of cars, 1 to 30
    #[arg(value_parser = clap::value_parser!(u16).range(1..=MAX_CARS as i64))]
    cars: Option<u16>,

    /// Number of traffic lights, 0 to 12
    #[arg(value_parser = clap::value_parser!(u16).range(0..=MAX_LIGHTS as i64))]
    lights: Option<u16>,

    /// JSON config file; positional counts and flags override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// City topology file instead of the built-in city
    #[arg(long)]
    grid: Option<PathBuf>,

    /// Seed for route generation and car speeds
    #[arg(long)]
    seed: Option<u64>,

    /// Write finished trips to this CSV file on exit
    #[arg(long)]
    trip_log: Option<PathBuf>,

    /// Print a JSON snapshot of the city every observe interval
    #[arg(long)]
    snapshots: bool,

    /// Do not read car ids from stdin
    #[arg(long)]
    no_console: bool,
}

impl Cli {
    fn into_config(self) -> SimResult<(SimulationConfig, Options)> {
        let mut config = match &self.config {
            Some(path) => SimulationConfig::from_json_file(path)?,
            None => SimulationConfig::default(),
        };
        if let Some(cars) = self.cars {
            config.cars = cars as usize;
        }
        if let Some(lights) = self.lights {
            config.lights = lights as usize;
        }
        if self.grid.is_some() {
            config.grid_path = self.grid;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        config.validate()?;
        let options = Options {
            trip_log: self.trip_log,
            snapshots: self.snapshots,
            console: !self.no_console,
        };
        Ok((config, options))
    }
}

struct Options {
    trip_log: Option<PathBuf>,
    snapshots: bool,
    console: bool,
}

/// Samples the city until every car has finished or Ctrl-C is pressed.
async fn observe(simulation: &Simulation, options: &Options) -> SimResult<()> {
    let mut ticker = interval(simulation.config().observe_interval());
    let mut reported = HashSet::new();
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping simulation");
                return Ok(());
            }
        }

        for car in simulation.finished().all() {
            if reported.insert(car.id) {
                info!("{}", finished_line(&car));
            }
        }
        if options.snapshots {
            println!("{}", serde_json::to_string(&simulation.snapshot())?);
        }
        if simulation.all_finished() {
            info!("All {} cars finished their routes", simulation.car_count());
            return Ok(());
        }
    }
}

async fn run(config: SimulationConfig, options: Options) -> SimResult<()> {
    let mut simulation = Simulation::new(config)?;
    simulation.start();

    if options.console {
        let city = Arc::clone(simulation.city());
        let car_count = simulation.car_count();
        // Detached: a blocked stdin read must not hold up exit.
        std::thread::spawn(move || run_console(city, car_count));
    }

    let observed = observe(&simulation, &options).await;
    simulation.shutdown();
    simulation.join().await;

    if let Some(path) = &options.trip_log {
        let rows = write_trip_log(path, simulation.finished())?;
        info!("Wrote {} trips to {}", rows, path.display());
    }
    observed
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let (config, options) = match Cli::parse().into_config() {
        Ok(parsed) => parsed,
        Err(err) => {
            eprintln!("{}", err);
            return ExitCode::FAILURE;
        }
    };

    match run(config, options).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{}", err);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(args)
    }

    #[test]
    fn counts_outside_their_ranges_are_rejected() {
        for args in [
            &["city_traffic", "31"][..],
            &["city_traffic", "0"],
            &["city_traffic", "5", "13"],
            &["city_traffic", "abc"],
            &["city_traffic", "5", "x"],
        ] {
            assert!(parse(args).is_err(), "{:?}", args);
        }
    }

    #[test]
    fn counts_inside_their_ranges_reach_the_config() {
        let (config, _) = parse(&["city_traffic", "5", "0"])
            .unwrap()
            .into_config()
            .unwrap();
        assert_eq!((config.cars, config.lights), (5, 0));
    }

    #[test]
    fn missing_counts_default_to_thirty_cars_and_twelve_lights() {
        let (config, options) = parse(&["city_traffic"]).unwrap().into_config().unwrap();
        assert_eq!((config.cars, config.lights), (MAX_CARS, MAX_LIGHTS));
        assert!(options.console);
        assert!(options.trip_log.is_none());
    }

    #[test]
    fn flags_override_the_defaults() {
        let (config, options) = parse(&[
            "city_traffic",
            "3",
            "--seed",
            "11",
            "--no-console",
            "--trip-log",
            "trips.csv",
        ])
        .unwrap()
        .into_config()
        .unwrap();
        assert_eq!(config.cars, 3);
        assert_eq!(config.seed, Some(11));
        assert!(!options.console);
        assert_eq!(options.trip_log, Some(PathBuf::from("trips.csv")));
    }
}
