use std::time::Duration;

use clap::Parser;
use rudp::{Config, RudpListener};

/// Accepts one rudp connection at a time and echoes back whatever it receives.
#[derive(Parser, Debug)]
struct Args {
    /// Address to bind the listener to.
    #[arg(long, default_value = "0.0.0.0")]
    ip: String,

    /// Port to bind the listener to.
    #[arg(long, default_value_t = 34343)]
    port: u16,

    /// How long `accept` waits for a handshake before giving up, in milliseconds.
    #[arg(long, default_value_t = 60_000)]
    accept_timeout_ms: u64,
}

fn main() -> Result<(), rudp::Error> {
    env_logger::init();

    let args = Args::parse();
    let listener = RudpListener::bind((args.ip.as_str(), args.port), Config::default())?;
    println!(">>> listening on {}", listener.local_addr()?);

    loop {
        println!(">>> waiting for a connection...");
        let (stream, peer) = match listener.accept(Duration::from_millis(args.accept_timeout_ms)) {
            Ok(pair) => pair,
            Err(rudp::Error::HandshakeTimeout) => {
                println!(">>> no connection within the timeout, still listening");
                continue;
            }
            Err(e) => return Err(e),
        };
        println!(">>> accepted connection from {peer}");

        while stream.connected() {
            let data = stream.receive(Duration::from_secs(5))?;
            if data.is_empty() {
                continue;
            }

            println!(">>> received {} bytes, echoing back", data.len());
            stream.send(&data)?;
        }

        println!(">>> connection from {peer} closed");
    }
}
