//! # APRS relay
//! Reads CubeSatSim beacon output on stdin, decodes every `APRS:` sentence
//! and publishes the records to an MQTT topic as JSON.
mod config;
mod mqtt;
mod publish;
mod relay;
mod store;

use std::{
    io::BufReader,
    process::ExitCode,
    sync::atomic::{AtomicBool, Ordering::SeqCst},
};

use cubesat_aprs::SentenceDecoder;

use config::{RelayArgs, RelayCfg};
use mqtt::MqttPublisher;
use publish::{ConsolePublisher, Publisher};
use relay::{run, spawn_reader, RelayContext};
use store::Archive;

static EXIT_FLAG: AtomicBool = AtomicBool::new(false);

fn serve<P: Publisher>(cfg: &RelayCfg, publisher: P, archive: Option<Archive>) {
    let decoder = SentenceDecoder::new(cfg.decoder_schema());
    let mut ctx = RelayContext::new(decoder, cfg.mqtt_topic.clone(), publisher, archive);
    println!("Listening for APRS data on stdin. Press Ctrl+C to exit.");
    let lines = spawn_reader(BufReader::new(std::io::stdin()));
    run(&mut ctx, &lines, &EXIT_FLAG);
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args: RelayArgs = argh::from_env();
    let cfg = match RelayCfg::resolve(&args) {
        Ok(cfg) => cfg,
        Err(e) => {
            log::error!("{e}");
            return ExitCode::FAILURE;
        }
    };
    if args.save_config {
        match cfg.store_default() {
            Ok(()) => log::info!("Stored configuration as default"),
            Err(e) => log::warn!("Could not store configuration: {e}"),
        }
    }
    if let Err(e) = ctrlc::set_handler(|| EXIT_FLAG.store(true, SeqCst)) {
        log::error!("Error setting Ctrl-C handler: {e}");
        return ExitCode::FAILURE;
    }
    let archive = match cfg.archive_dir.clone().map(|dir| Archive::new(dir, true)).transpose() {
        Ok(archive) => archive,
        Err(e) => {
            log::error!("Failed to create archive directory: {e}");
            return ExitCode::FAILURE;
        }
    };
    log::info!(
        "Decoding {} sentences ({} inertial readout)",
        cfg.schema,
        cfg.inertial
    );
    if args.dry_run {
        serve(&cfg, ConsolePublisher::stdout(), archive);
    } else {
        let publisher = match MqttPublisher::connect(cfg.mqtt_options()) {
            Ok(publisher) => publisher,
            Err(e) => {
                log::error!(
                    "Failed to connect to MQTT broker at {}:{}: {e}",
                    cfg.mqtt_host,
                    cfg.mqtt_port
                );
                return ExitCode::FAILURE;
            }
        };
        serve(&cfg, publisher, archive);
    }
    ExitCode::SUCCESS
}
