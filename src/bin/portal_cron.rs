use water_portal::{Config, init_tracing, mark_overdue, purge_expired};

fn print_usage(bin_name: &str) {
    eprintln!("Usage: {bin_name} <mark-overdue|purge-expired>");
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    let mut args = std::env::args();
    let bin_name = args.next().unwrap_or_else(|| "portal-cron".to_string());
    let command = args.next();

    if args.next().is_some() {
        print_usage(&bin_name);
        std::process::exit(2);
    }

    let config = match Config::load() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Failed to load configuration: {err}");
            std::process::exit(1);
        }
    };

    init_tracing(&config.logging.level, config.logging.json_format);

    let outcome = match command.as_deref() {
        Some("mark-overdue") => mark_overdue(&config)
            .await
            .map(|result| format!("Overdue run completed: bills_marked_overdue={}", result.bills_marked_overdue)),
        Some("purge-expired") => purge_expired(&config).await.map(|result| {
            format!(
                "Purge completed: sessions_purged={}, password_resets_purged={}",
                result.sessions_purged, result.password_resets_purged
            )
        }),
        _ => {
            print_usage(&bin_name);
            std::process::exit(2);
        }
    };

    match outcome {
        Ok(summary) => println!("{summary}"),
        Err(err) => {
            eprintln!("Cron job failed: {err}");
            std::process::exit(1);
        }
    }
}
