use clap::{Arg, Command};
use distsim_network::Router;
use distsim_process::Simulation;
use distsim_propagate::{init, set_x, Config, SetX, HANDLER};
use distsim_runtime::clock;
use prometheus_client::{encoding::text::encode, registry::Registry};
use std::{str::FromStr, time::Duration};
use tracing::{error, info, Level};

#[tokio::main]
async fn main() {
    // Parse arguments
    let matches = Command::new("propagate")
        .about("propagate a value through a simulated network")
        .arg(Arg::new("config").long("config").required(false))
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .default_value("info"),
        )
        .get_matches();

    // Create logger
    let level = matches.get_one::<String>("log-level").unwrap();
    let level = Level::from_str(level).expect("Invalid log level");
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_line_number(true)
        .with_file(true)
        .init();

    // Load config
    let config = match matches.get_one::<String>("config") {
        Some(path) => {
            let file = std::fs::read_to_string(path).expect("Could not read config file");
            serde_yaml::from_str::<Config>(&file).expect("Could not parse config file")
        }
        None => Config::default(),
    };
    assert!(config.processes > 0, "at least one process is required");
    info!(?config, "loaded config");

    // Build network
    let mut registry = Registry::default();
    let router = Router::new(
        distsim_network::Config {
            error_rate: config.error_rate,
            seed: config.seed,
            clock: clock::Config {
                tick: Duration::from_millis(config.tick_ms),
                ..Default::default()
            },
        },
        &mut registry,
    )
    .expect("Invalid network config");

    // Create processes
    let mut simulation = Simulation::new(router.clone());
    simulation.register_handler(HANDLER, set_x);
    for id in 0..config.processes {
        simulation
            .create_process(id, SetX::default())
            .expect("Could not create process");
        simulation
            .assign_handler(id, HANDLER)
            .expect("Could not assign handler");
    }
    router.add_links_all_to_all(config.bidirectional, config.latency);
    if let Some(secs) = config.timer_secs {
        router.launch_timer(Duration::from_secs(secs));
    }

    // Run
    let start = init(config.value).expect("Could not encode init message");
    if let Err(err) = router.send_message(0, 0, &start) {
        error!(?err, "failed to start propagation");
    }
    tokio::time::sleep(Duration::from_secs(config.run_secs)).await;
    simulation.stop().await;

    // Report
    for process in simulation.processes() {
        println!("[{}]: x = {:?}", process.id(), process.state().x);
    }
    let mut buffer = String::new();
    encode(&mut buffer, &registry).expect("Could not encode metrics");
    info!(ticks = router.now(), "finished");
    println!("{buffer}");
}
