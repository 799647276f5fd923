use daikin_skyport::{SkyportClient, DEFAULT_CONFIG_FILE};
use std::env;
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_secs(180);

#[tokio::main]
async fn main() -> daikin_skyport::Result<()> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    let conf = args
        .get(1)
        .cloned()
        .unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string());

    let mut builder = SkyportClient::builder()
        .config_file(&conf)
        .on_event(|event| {
            println!("{event:?}");
        })
        .on_snapshot(|t| {
            if let Some(temp) = t.indoor_temperature() {
                println!(
                    "[{}] {:.1}\u{00b0}C / {:.1}\u{00b0}F | mode: {:?} | preset: {:?} | fan: {:?}",
                    t.name,
                    temp.celsius(),
                    temp.fahrenheit(),
                    t.mode(),
                    t.preset(),
                    t.fan_setting(),
                );
            }
            if let Some(outdoor) = t.outdoor_temperature() {
                println!(
                    "Outdoor: {:.1}\u{00b0}C / {:.1}\u{00b0}F",
                    outdoor.celsius(),
                    outdoor.fahrenheit(),
                );
            }
        });

    if let (Ok(email), Ok(password)) = (env::var("SKYPORT_EMAIL"), env::var("SKYPORT_PASSWORD")) {
        builder = builder.credentials(email, password);
    }

    let mut client = builder.build()?;

    println!("Polling Daikin Skyport every {}s (tokens in {conf})", POLL_INTERVAL.as_secs());

    loop {
        if let Err(e) = client.update().await {
            eprintln!("Update error: {e}");
            if e.needs_reauth() {
                match client.login().await {
                    Ok(_) => println!("Logged in again"),
                    Err(daikin_skyport::Error::MissingCredentials) => {
                        eprintln!("Session expired; set SKYPORT_EMAIL and SKYPORT_PASSWORD to log in");
                        return Err(daikin_skyport::Error::MissingCredentials);
                    }
                    Err(e) => eprintln!("Login error: {e}"),
                }
            }
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}
