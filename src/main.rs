use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use booking_client::{config::Config, App};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.app.rust_log))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting booking client ({})", config.app.environment);

    let app = App::new(config).await?;

    // Вход по переменным окружения, если сессия не восстановилась
    if !app.session.is_authenticated() {
        if let (Ok(username), Ok(password)) =
            (std::env::var("BOOKING_USERNAME"), std::env::var("BOOKING_PASSWORD"))
        {
            if let Err(e) = app.session.login(&username, &password).await {
                warn!("Login failed: {}", e);
            }
        }
    }

    let events = app.events_view();
    let notifications = app.notifications_view();
    notifications.activate();
    if let Err(e) = events.activate().await {
        error!("Events list unavailable: {}", e);
    }

    let mut events_rx = events.watch();
    let mut notifications_rx = notifications.watch();
    print_events(&events_rx.borrow_and_update());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = events_rx.changed() => {
                if changed.is_err() { break; }
                print_events(&events_rx.borrow_and_update());
            }
            changed = notifications_rx.changed() => {
                if changed.is_err() { break; }
                for note in notifications_rx.borrow_and_update().iter() {
                    println!("  * {}", note.message);
                }
            }
            _ = tokio::time::sleep(Duration::from_secs(60)) => {
                if let Some(online) = notifications.online_users() {
                    info!("{} user(s) online", online.count);
                }
            }
        }
    }

    info!("Shutting down");
    events.deactivate();
    notifications.deactivate();
    app.connection.disconnect();
    Ok(())
}

fn print_events(events: &[booking_client::models::Event]) {
    println!("--- {} event(s) ---", events.len());
    for event in events {
        println!(
            "#{:<4} {:<32} {:>4}/{:<4} seats  {:>8.2}  {}",
            event.id,
            event.title,
            event.available_seats,
            event.total_seats,
            event.price,
            event.date.format("%Y-%m-%d %H:%M"),
        );
    }
}
