mod telemetry;

use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;
use telemetry::{generate_reading, Device, DeviceStatus};
use tracing::{error, info, warn};

#[derive(Debug, Parser)]
#[command(about = "Posts simulated temperature readings and device toggles")]
struct Args {
    /// Base URL of the sensor API
    #[arg(long, env = "SENSOR_URL", default_value = "http://localhost:4001")]
    sensor_url: String,

    /// Base URL of the device API
    #[arg(long, env = "DEVICE_URL", default_value = "http://localhost:5000")]
    device_url: String,

    /// Readings per second
    #[arg(long, env = "RATE", default_value_t = 5)]
    rate: u64,

    /// Number of distinct sensor names
    #[arg(long, env = "SENSORS", default_value_t = 4)]
    sensors: u32,

    /// Stop after this many readings
    #[arg(long, env = "COUNT")]
    count: Option<u64>,

    /// Toggle a random device every N readings, 0 disables
    #[arg(long, env = "TOGGLE_EVERY", default_value_t = 0)]
    toggle_every: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt::init();

    anyhow::ensure!(args.rate > 0, "--rate must be greater than zero");
    anyhow::ensure!(args.sensors > 0, "--sensors must be greater than zero");

    info!("Starting smarthome simulator");
    info!(
        "Sensor API: {}, Device API: {}, Rate: {} readings/s, Sensors: {}",
        args.sensor_url, args.device_url, args.rate, args.sensors
    );

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()?;
    let readings_url = format!("{}/api/temperatures", args.sensor_url.trim_end_matches('/'));
    let device_base = args.device_url.trim_end_matches('/').to_string();

    let mut rng = StdRng::from_entropy();
    let mut ticker = tokio::time::interval(Duration::from_millis(1000 / args.rate.min(1000)));
    let mut sent = 0u64;
    let mut failed = 0u64;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal");
                break;
            }
        }

        let attempt = sent + failed;
        let sensor = (attempt % u64::from(args.sensors)) as u32 + 1;
        let reading = generate_reading(&mut rng, sensor);
        match client.post(&readings_url).json(&reading).send().await {
            Ok(resp) if resp.status().is_success() => sent += 1,
            Ok(resp) => {
                failed += 1;
                warn!("Reading rejected with {}: {:?}", resp.status(), reading);
            }
            Err(e) => {
                failed += 1;
                error!("Failed to post reading: {}", e);
            }
        }

        let attempt = attempt + 1;
        if args.toggle_every > 0 && attempt % args.toggle_every == 0 {
            if let Err(e) = toggle_random_device(&client, &device_base, &mut rng).await {
                warn!("Device toggle failed: {}", e);
            }
        }

        if attempt % 100 == 0 {
            info!("Posted {} readings ({} failed)", sent, failed);
        }

        if args.count.is_some_and(|count| attempt >= count) {
            break;
        }
    }

    info!("Simulator stopped: {} readings posted, {} failed", sent, failed);
    Ok(())
}

async fn toggle_random_device(
    client: &reqwest::Client,
    base: &str,
    rng: &mut impl Rng,
) -> anyhow::Result<()> {
    let devices: Vec<Device> = client
        .get(format!("{}/api/devices", base))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    if devices.is_empty() {
        warn!("No devices provisioned, nothing to toggle");
        return Ok(());
    }

    let device = &devices[rng.gen_range(0..devices.len())];
    let toggled: DeviceStatus = client
        .post(format!("{}/api/device/{}/toggle", base, device.id))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    info!(
        "Toggled {} (id {}): {} -> {}",
        device.name, toggled.id, device.status, toggled.status
    );
    Ok(())
}
