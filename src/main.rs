use std::path::PathBuf;

use tracing::info;

use frontdesk::engine::Engine;
use frontdesk::model::Money;

fn money(m: Money) -> String {
    m.round_dp(2).to_string()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let metrics_port: Option<u16> = std::env::var("FRONTDESK_METRICS_PORT")
        .ok()
        .and_then(|s| s.parse().ok());
    frontdesk::observability::init(metrics_port);

    let data_dir = std::env::var("FRONTDESK_DATA_DIR").unwrap_or_else(|_| "./data".into());
    std::fs::create_dir_all(&data_dir)?;
    let wal_path = std::env::var("FRONTDESK_WAL")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(&data_dir).join("frontdesk.wal"));

    let engine = Engine::new(wal_path.clone())?;
    info!("state replayed from {}", wal_path.display());

    let summaries = engine.summarize_all().await?;
    if summaries.is_empty() {
        println!("no bookings on file");
        return Ok(());
    }

    for s in summaries {
        println!(
            "booking {}: nights={} room={} services={} fee={} total={} prepaid={} balance={} => {}",
            s.booking_id,
            s.nights,
            money(s.room_total),
            money(s.services_total),
            money(s.fee),
            money(s.grand_total),
            money(s.prepayments_total),
            money(s.balance),
            s.status,
        );
        for guest in engine.booking_guests(s.booking_id).await? {
            println!(
                "  {} | {} | prepaid={}",
                guest.id,
                guest.full_name,
                money(guest.prepayment)
            );
        }
        let lines = engine.booking_services(s.booking_id).await?;
        if !lines.is_empty() {
            println!("  services:");
            for line in lines {
                println!(
                    "    {} | {} | unit={} x{} = {}",
                    line.service_id,
                    line.name,
                    money(line.unit_price),
                    line.units,
                    money(line.line_total)
                );
            }
        }
        println!("{}", "-".repeat(80));
    }

    Ok(())
}
