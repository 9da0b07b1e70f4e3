//! wifi-spot-bot — Telegram bot mapping open wi-fi access points.
//!
//! One single-threaded loop: long-poll the transport, dispatch each message
//! through the command layer, render, repeat. Handler errors are logged and
//! the loop keeps going; a failure of the polling call itself is fatal.

use std::path::Path;

use anyhow::{Context, Result};
use log::{error, info};

mod app;
mod command;
mod config;
mod coords;
mod font;
mod render;
mod telegram;
mod tiles;
mod viewport;
mod wigle;

use app::App;
use config::ApiKeys;
use telegram::Telegram;
use tiles::TileFetcher;
use wigle::Wigle;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let keys_path = std::env::args().nth(1).unwrap_or_else(|| config::DEFAULT_PATH.to_string());
    let keys = ApiKeys::load(Path::new(&keys_path)).context("loading startup credentials")?;

    let telegram = Telegram::new(&keys.telegram_key);
    let wigle = Wigle::new(&keys.wigle_key);
    let tiles = TileFetcher::new();
    let mut app = App::new(&telegram, &wigle, &wigle, &tiles);

    info!("Starting polling..");
    let mut offset = 0i64;
    loop {
        let updates = match telegram.poll(offset) {
            Ok(u) => u,
            Err(e) => {
                error!("polling for updates failed: {e:#}");
                return Err(e);
            }
        };
        for update in updates {
            offset = offset.max(update.update_id + 1);
            let Some(message) = update.message else { continue };
            let Some(from) = message.from.as_ref() else { continue };
            let user = from.id;
            info!(
                "User: {} {} {} Date: {}",
                user,
                from.first_name,
                from.last_name.as_deref().unwrap_or(""),
                message.date
            );

            let outcome = if let Some(text) = message.text.as_deref() {
                info!("Text: {text}");
                app.handle_text(user, text)
            } else if let Some(loc) = message.location.as_ref() {
                info!("Location: {}, {}", loc.latitude, loc.longitude);
                app.handle_location(user, loc.latitude, loc.longitude)
            } else {
                Ok(())
            };
            if let Err(e) = outcome {
                error!("handling update for user {user}: {e:#}");
            }
        }
    }
}
