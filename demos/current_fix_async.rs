use std::net::IpAddr;

use clap::Parser;
use gpsd_fix::{
    retry::RetryPolicy,
    session::{Session, SessionConfig},
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "127.0.0.1")]
    addr: IpAddr,
    #[arg(short, long, default_value = "2947")]
    port: u16,
}

#[tokio::main]
async fn main() -> gpsd_fix::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let mut session = Session::new(
        SessionConfig::default()
            .host(args.addr.to_string())
            .port(args.port),
    );
    session.connect().await?;

    for path in session.list_devices().await? {
        println!("Device: {path}");
    }

    let policy = RetryPolicy::default();
    let mut attempt = 0;
    let fix = loop {
        attempt += 1;
        match session.fetch_current().await {
            Err(e) if e.is_transient() && attempt < policy.attempts() => {
                eprintln!("Waiting for a fix ({attempt}/{}): {e}", policy.attempts());
                tokio::time::sleep(policy.delay()).await;
            }
            other => break other?,
        }
    };

    println!("Mode: {:?}", fix.mode());
    match fix.position() {
        Ok((lat, lon)) => println!("Current position: lat {lat:6.3}, lon {lon:6.3}"),
        Err(e) => println!("Current position: {e}"),
    }
    if let Ok(url) = fix.map_url() {
        println!("Map: {url}");
    }
    Ok(())
}
