use std::io::stderr;
use std::sync::Arc;

use clap::Parser;
use common::logging::assemble_logger;
use cwlink::{FakeLogTransport, LogLinkEndpoint, Options};
use link_core::{LinkAddress, LinkEndpoint};
use overlay::LoggingDispatcher;
use slog::info;

/// Point-to-point log-stream client, mirroring original_source's
/// `examples/cwlink_client`: an Ethernet-framed endpoint with no lower
/// tun/tap device underneath it.
#[derive(Parser)]
#[command(about = "log-stream link client demo")]
struct Cli {
	#[arg(long, default_value = "42:42:42:42:42:42")]
	mac: String,

	#[arg(long, default_value = "TestNet")]
	net_name: String,
}

#[tokio::main]
async fn main() {
	let cli = Cli::parse();
	let logger = assemble_logger(stderr());

	let mac = match LinkAddress::parse_colon_hex(&cli.mac) {
		Ok(mac) => mac,
		Err(e) => {
			eprintln!("cwlink-client: invalid --mac: {e}");
			return;
		}
	};

	let transport = Arc::new(FakeLogTransport::new());
	let opts = Options {
		local: mac,
		remote: None,
		point_to_point: false,
		ethernet_header: true,
		net_name: cli.net_name,
	};
	let endpoint = match LogLinkEndpoint::new(transport, opts, logger.clone()) {
		Ok(endpoint) => endpoint,
		Err(e) => {
			eprintln!("cwlink-client: {e}");
			return;
		}
	};

	let dispatcher = LoggingDispatcher::new(logger.clone());
	endpoint.clone().attach(dispatcher);

	info!(logger, "cwlink-client: running, press Ctrl-C to exit");
	let _ = tokio::signal::ctrl_c().await;
	info!(logger, "cwlink-client: exiting");
}
