use std::io::stderr;
use std::sync::Arc;

use clap::Parser;
use common::logging::assemble_logger;
use link_core::{LinkAddress, LinkEndpoint};
use overlay::LoggingDispatcher;
use slog::info;
use taglink::{FakeTagTransport, TagLinkEndpoint};

/// Tag-ring link demo, mirroring original_source's `examples/taglink`: a
/// point-to-point endpoint addressed by a pair of fixed MAC addresses,
/// carrying packets as tags on a pair of resource ARNs.
#[derive(Parser)]
#[command(about = "tag-ring link demo")]
struct Cli {
	#[arg(long, default_value = "02:00:00:00:00:01")]
	local_mac: String,

	#[arg(long, default_value = "02:00:00:00:00:02")]
	remote_mac: String,

	#[arg(long, default_value = "arn:demo:local")]
	local_arn: String,

	#[arg(long, default_value = "arn:demo:remote")]
	remote_arn: String,
}

#[tokio::main]
async fn main() {
	let cli = Cli::parse();
	let logger = assemble_logger(stderr());

	let local = match LinkAddress::parse_colon_hex(&cli.local_mac) {
		Ok(a) => a,
		Err(e) => {
			eprintln!("taglink-demo: invalid --local-mac: {e}");
			return;
		}
	};
	let remote = match LinkAddress::parse_colon_hex(&cli.remote_mac) {
		Ok(a) => a,
		Err(e) => {
			eprintln!("taglink-demo: invalid --remote-mac: {e}");
			return;
		}
	};

	let transport = Arc::new(FakeTagTransport::new());
	let endpoint = TagLinkEndpoint::new(transport, cli.remote_arn, cli.local_arn, local, remote, logger.clone());

	let dispatcher = LoggingDispatcher::new(logger.clone());
	endpoint.clone().attach(dispatcher);

	info!(logger, "taglink-demo: running, press Ctrl-C to exit");
	let _ = tokio::signal::ctrl_c().await;
	info!(logger, "taglink-demo: exiting");
}
