use clap::Parser;
use rtsp_signal::server::{AnnouncePolicy, BodyReadPolicy, UnimplementedPolicy};
use rtsp_signal::{Server, ServerConfig};
use std::io;

#[derive(Parser)]
#[command(
    name = "rtsp-signal-server",
    about = "RTSP signaling server for publishing clients"
)]
struct Args {
    /// Bind address (host:port)
    #[arg(long, short, default_value = "0.0.0.0:8554")]
    bind: String,

    /// Listen on this port instead of the one in --bind
    #[arg(long, short)]
    port: Option<u16>,

    /// Answer ANNOUNCE with 400 when its SDP does not parse
    #[arg(long)]
    strict_announce: bool,

    /// Answer methods without a handler with 501 instead of nothing
    #[arg(long)]
    reply_not_implemented: bool,

    /// Keep reading until the whole Content-Length body has arrived
    #[arg(long)]
    read_full_body: bool,
}

impl Args {
    fn bind_addr(&self) -> String {
        match self.port {
            Some(port) => {
                let host = self
                    .bind
                    .rsplit_once(':')
                    .map_or(self.bind.as_str(), |(host, _)| host);
                format!("{host}:{port}")
            }
            None => self.bind.clone(),
        }
    }

    fn config(&self) -> ServerConfig {
        let mut config = ServerConfig::default();
        if self.strict_announce {
            config.announce = AnnouncePolicy::RejectMalformed;
        }
        if self.reply_not_implemented {
            config.unimplemented = UnimplementedPolicy::NotImplemented;
        }
        if self.read_full_body {
            config.body_read = BodyReadPolicy::UntilComplete;
        }
        config
    }
}

fn main() {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let bind = args.bind_addr();

    let mut server = Server::with_config(&bind, args.config());

    if let Err(e) = server.start() {
        eprintln!("Failed to start server on {bind}: {e}");
        std::process::exit(1);
    }

    let addr = server
        .local_addr()
        .map_or_else(|_| bind.clone(), |addr| addr.to_string());
    println!("RTSP signaling server on {addr}, press Enter to stop");

    let mut input = String::new();
    if let Err(e) = io::stdin().read_line(&mut input) {
        eprintln!("Failed to read stdin: {e}");
    }

    server.stop();
}
