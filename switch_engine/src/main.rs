#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
//! ** Switch Engine **
//! Loads map data and an optional switch snapshot, resolves every event page, and prints a
//! per-map report of declared switches, active pages and conditions.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use colored::Colorize;
use log::info;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use switch_engine::config::CONFIG_FILE;
use switch_engine::loader::load_snapshot;
use switch_engine::{Clock, GameMap, GameVariables, SwitchEngine, SystemClock, load_config, load_maps};

fn main() -> Result<()> {
    env_logger::init();
    let mut args = env::args().skip(1);
    let Some(maps_path) = args.next().map(PathBuf::from) else {
        bail!("usage: switch_engine <maps.ron> [snapshot.ron]");
    };
    let snapshot_path = args.next().map(PathBuf::from);

    let config = load_config(Path::new(CONFIG_FILE));
    let mut engine = SwitchEngine::new(config);
    let maps = load_maps(&maps_path).context("while loading map data")?;
    engine.scan(&maps);

    if let Some(path) = &snapshot_path {
        let snapshot = load_snapshot(path).context("while loading switch snapshot")?;
        engine.restore(&snapshot);
    }

    let clock = SystemClock;
    let now = clock.now();
    let removed = engine.cleanup_invalid(now);
    if removed > 0 {
        info!("{removed} invalid conditions removed before report");
    }
    let state = GameVariables::new();
    let stamp = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| now.to_string());

    println!("{}", "SWITCH ENGINE REPORT".bright_yellow().underline());
    println!("{} {}\n", "generated".dimmed(), stamp.dimmed());

    for def in &maps {
        let mut map = engine.load_map(def);
        let tick = engine.tick(now, &state, Some(&mut map));
        print_map(&engine, &map);
        for message in &tick.messages {
            println!("  {} {message}", "!".bright_magenta());
        }
    }

    let stats = engine.conditions().list_stats();
    println!(
        "\n{} {} total ({} timer, {} variable, {} gameswitch, {} inventory, {} corrupt)",
        "conditions:".bold(),
        stats.total,
        stats.timer,
        stats.variable,
        stats.game_switch,
        stats.inventory,
        stats.corrupt.to_string().bright_red()
    );
    for line in engine.conditions().describe(now) {
        println!("  {line}");
    }
    Ok(())
}

fn print_map(engine: &SwitchEngine, map: &GameMap) {
    println!("{} {} {}", "map".bold(), map.id.to_string().bright_blue(), map.name.bold());
    if let Some(switches) = engine.registry().query(map.id) {
        for (name, owners) in switches {
            let owners: Vec<String> = owners.iter().map(ToString::to_string).collect();
            println!("  {} {name:<10} events [{}]", "switch".green(), owners.join(", "));
        }
    }
    for (id, event) in &map.events {
        let page = match event.current_page() {
            Some(index) => format!("page {}", index + 1).bright_green(),
            None => "no page".dimmed(),
        };
        println!("  {} {id:>4} {:<16} {page}", "event".cyan(), event.name);
        for (key, value) in engine.store().custom_entries(map.id).filter(|(k, _)| k.owner == *id) {
            let state = if value { "ON".bright_green() } else { "OFF".red() };
            println!("        {} = {state}", key.name);
        }
    }
}
