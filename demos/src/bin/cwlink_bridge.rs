use std::io::stderr;
use std::sync::Arc;

use clap::Parser;
use common::logging::assemble_logger;
use cwlink::{FakeLogTransport, LogLinkBridge, Options};
use link_core::{LinkAddress, LinkEndpoint};
use overlay::VirtualEndpoint;
use slog::info;

/// Bridges a virtual lower endpoint (standing in for a real tun/tap
/// device, an out-of-scope external collaborator) through the log-stream
/// link. Mirrors original_source's `examples/cwlink_bridge`: `--tap`
/// selects an Ethernet-framed bridged segment, otherwise a point-to-point
/// link to a fixed remote address.
#[derive(Parser)]
#[command(about = "log-stream link bridge demo")]
struct Cli {
	#[arg(long)]
	tap: bool,

	#[arg(long, default_value = "74:74:74:74:74:74")]
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
			eprintln!("cwlink-bridge: invalid --mac: {e}");
			return;
		}
	};

	let (ethernet_header, point_to_point, remote) = if cli.tap {
		(true, false, None)
	} else {
		(false, true, LinkAddress::parse_colon_hex("11:22:33:44:55:66").ok())
	};

	let lower = VirtualEndpoint::new(mac.clone(), logger.new(slog::o!("component" => "virtual-lower")));

	let transport = Arc::new(FakeLogTransport::new());
	let opts = Options {
		local: mac,
		remote,
		point_to_point,
		ethernet_header,
		net_name: cli.net_name,
	};
	let bridge = match LogLinkBridge::new(transport, opts, lower, logger.clone()) {
		Ok(bridge) => bridge,
		Err(e) => {
			eprintln!("cwlink-bridge: {e}");
			return;
		}
	};

	let upper = overlay::LoggingDispatcher::new(logger.clone());
	bridge.clone().attach(upper);

	info!(logger, "cwlink-bridge: running, press Ctrl-C to exit");
	let _ = tokio::signal::ctrl_c().await;
	info!(logger, "cwlink-bridge: exiting");
}
