//! Maintenance commands: statistics, clearing, and configuration display.

use std::path::Path;

use opal_cache::{LocalStore, Stats};
use opal_config::Settings;

use crate::Cli;

/// Executes the requested maintenance actions. Returns the exit code.
pub fn run(cli: &Cli, settings: &Settings) -> i32 {
    let cache_dir = Path::new(&settings.cache_dir);
    let store = LocalStore::new(cache_dir, settings.max_size);
    let mut code = 0;

    if cli.clear {
        match store.clear() {
            Ok(()) => println!("cache cleared"),
            Err(e) => {
                eprintln!("opal: {e}");
                code = 1;
            }
        }
    }

    if cli.clear || cli.zero_stats {
        let mut stats = Stats::load(cache_dir);
        stats.zero();
        if let Err(e) = stats.save(cache_dir) {
            eprintln!("opal: {e}");
            code = 1;
        } else if cli.zero_stats {
            println!("statistics zeroed");
        }
    }

    if cli.show_config {
        print_config(settings);
    }

    if cli.show_stats {
        if let Err(e) = print_stats(settings, &store) {
            eprintln!("opal: {e}");
            code = 1;
        }
    }

    code
}

fn print_config(settings: &Settings) {
    println!("cache directory: {}", settings.cache_dir);
    println!("max size:        {} bytes", settings.max_size);
    println!("disabled:        {}", settings.disabled);
    println!("direct mode:     {}", settings.direct_mode);
    println!("hard links:      {}", settings.hard_links);
    println!(
        "log file:        {}",
        settings.log_file.as_deref().unwrap_or("(none)")
    );
    println!("log level:       {}", settings.debug_level);
}

fn print_stats(settings: &Settings, store: &LocalStore) -> Result<(), opal_cache::CacheError> {
    let stats = Stats::load(Path::new(&settings.cache_dir));
    println!("entries:   {}", store.entry_count()?);
    println!(
        "size:      {} / {} bytes",
        store.size()?,
        settings.max_size
    );
    println!("hits:      {}", stats.hits);
    println!("misses:    {}", stats.misses);
    println!("evictions: {}", stats.evictions);
    match stats.hit_rate() {
        Some(rate) => println!("hit rate:  {rate:.1} %"),
        None => println!("hit rate:  n/a"),
    }
    Ok(())
}
