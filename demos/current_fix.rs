use std::net::IpAddr;

use clap::Parser;
use gpsd_fix::{
    fix::FixRecord,
    retry::RetryPolicy,
    session::{SessionConfig, blocking::Session},
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "127.0.0.1")]
    addr: IpAddr,
    #[arg(short, long, default_value = "2947")]
    port: u16,
    /// Polls to make while the receiver warms up
    #[arg(short, long, default_value = "5")]
    attempts: u32,
}

fn print_fix(fix: &FixRecord) {
    println!("Properties");
    println!("  mode                {:?}", fix.mode());
    println!("  satellites used     {}", fix.satellites_used());
    println!("  satellites visible  {:?}", fix.satellites_visible());
    println!("  device              {:?}", fix.device());

    println!("Methods");
    match fix.position() {
        Ok((lat, lon)) => println!("  position            {lat:.6}, {lon:.6}"),
        Err(e) => println!("  position            {e}"),
    }
    match fix.position_precision() {
        Ok((x, y)) => println!("  precision           {x} m, {y} m"),
        Err(e) => println!("  precision           {e}"),
    }
    match fix.movement() {
        Ok(m) => println!(
            "  movement            {} m/s, {} deg, {} m/s climb",
            m.speed, m.track, m.climb
        ),
        Err(e) => println!("  movement            {e}"),
    }
    match fix.altitude() {
        Ok(alt) => println!("  altitude            {alt} m"),
        Err(e) => println!("  altitude            {e}"),
    }
    match fix.time_in(&chrono::Local) {
        Ok(time) => println!("  local time          {time}"),
        Err(e) => println!("  local time          {e}"),
    }
    match fix.map_url() {
        Ok(url) => println!("  map                 {url}"),
        Err(e) => println!("  map                 {e}"),
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config = SessionConfig::default()
        .host(args.addr.to_string())
        .port(args.port);
    let mut session = Session::new(config);
    if let Err(e) = session.connect() {
        eprintln!("Cannot reach gpsd at {}:{}: {e}", args.addr, args.port);
        return;
    }

    if let Some(connection) = session.connection() {
        println!("GPSD Version: {}", connection.version().release);
    }

    let policy = RetryPolicy::new(args.attempts, gpsd_fix::retry::DEFAULT_DELAY);
    match policy.run(|_| session.fetch_current()) {
        Ok(fix) => print_fix(&fix),
        Err(e) => eprintln!("No report from gpsd: {e}"),
    }

    match session.device() {
        Ok(Some(device)) => println!(
            "Device\n  path {:?}\n  speed {:?} bps\n  driver {:?}",
            device.path, device.bps, device.driver
        ),
        Ok(None) => println!("Device\n  none attached"),
        Err(e) => eprintln!("Device: {e}"),
    }
}
