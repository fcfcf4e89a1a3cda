//! `seamix <song1> <song2> [output_dir]` — see spec.md §6/§7 for the CLI
//! contract: non-zero exit and `Error: <message>` on stderr on failure.

use clap::Parser;

use seamix::cli::Cli;
use seamix::config;
use seamix::orchestrator::{self, MixOptions};
use seamix::analysis::SubprocessAnalyzer;
use seamix::stems::{FsStemStore, SubprocessSeparator};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(config::default_config_path);
    let app_config = config::load_config(&config_path);

    let analyzer = SubprocessAnalyzer::new(
        &app_config.analysis.bpm_cmd,
        &app_config.analysis.key_cmd,
        &app_config.analysis.choruses_cmd,
        &app_config.analysis.verses_cmd,
    );
    let separator = SubprocessSeparator::new(&app_config.separation.cmd);
    let stem_store = FsStemStore::new(&app_config.stem_cache_dir, separator);

    let options = MixOptions {
        output_dir: cli.output_dir,
        keep_reference_cuts: cli.keep_reference_cuts,
    };

    match orchestrator::mix(&cli.song1, &cli.song2, &analyzer, &stem_store, &options) {
        Ok(path) => {
            println!("{}", path.display());
        }
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
