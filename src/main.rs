use clap::Parser;
use std::sync::Arc;
use wagate::cli::Cli;
use wagate::store::DeviceStore;
use wagate::transport::whatsapp::WhatsAppTransport;
use wagate::{gateway, logging};

#[tokio::main]
async fn main() {
    logging::init();

    let config = match Cli::parse().into_config() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "invalid configuration");
            std::process::exit(1);
        }
    };

    let devices = match DeviceStore::open(&config.store_path) {
        Ok(devices) => devices,
        Err(err) => {
            tracing::error!(error = %err, "device store unavailable");
            std::process::exit(1);
        }
    };
    let (transport, events) = WhatsAppTransport::new(devices);

    if let Err(err) = gateway::run(config, Arc::new(transport), events).await {
        tracing::error!(error = %err, "gateway failed to start");
        std::process::exit(1);
    }
}
