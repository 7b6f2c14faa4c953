use std::io::{self, BufRead};
use std::time::Duration;

use clap::Parser;
use rudp::{Config, RudpStream};

/// Connects to a rudp echo server and relays stdin lines to it.
#[derive(Parser, Debug)]
struct Args {
    /// Server host to connect to.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to connect to.
    #[arg(long, default_value_t = 34343)]
    port: u16,

    /// Handshake deadline, in milliseconds.
    #[arg(long, default_value_t = 2000)]
    handshake_timeout_ms: u64,
}

fn main() -> Result<(), rudp::Error> {
    env_logger::init();

    let args = Args::parse();

    println!(">>> connecting to {}:{}...", args.host, args.port);
    let stream = RudpStream::connect(
        args.host.as_str(),
        args.port,
        Duration::from_millis(args.handshake_timeout_ms),
        Config::default(),
    )?;
    println!(">>> connected to {}", stream.peer_addr());

    for line in io::stdin().lock().lines() {
        let line = line.expect("reading stdin");
        if line.is_empty() {
            break;
        }

        stream.send(line.as_bytes())?;

        let echoed = stream.receive(Duration::from_secs(2))?;
        println!(">>> echo: {}", String::from_utf8_lossy(&echoed));
    }

    stream.close()?;
    Ok(())
}
