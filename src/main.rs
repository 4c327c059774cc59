mod bytes;
mod capture;
mod config;
mod emit;
mod inject;
mod ip;
mod packet;
mod protocol;
mod setup;
mod tcp_udp;


use std::future::Future;
use std::net::SocketAddrV4;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::capture::CaptureLoop;
use crate::config::{InterfaceConfig, Ipv4Cidr};
use crate::emit::TracingSink;
use crate::inject::Injector;
use crate::ip::HeaderLengthPolicy;


#[derive(Parser)]
#[clap(about = "Logs the IPv4 traffic routed into a TUN interface")]
struct Opts {
    /// Write logs to a daily-rotated file in this directory instead of stderr.
    #[clap(long, global = true)]
    log_dir: Option<PathBuf>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the TUN interface and log every unit read from it.
    Listen(ListenOpts),

    /// Send synthetic UDP traffic towards the TUN subnet (test utility).
    Inject(InjectOpts),
}

#[derive(clap::Args)]
struct ListenOpts {
    #[clap(long, default_value = config::INTERFACE_NAME)]
    name: String,

    #[clap(long, default_value = config::INTERFACE_CIDR)]
    cidr: Ipv4Cidr,

    #[clap(long, default_value_t = config::MTU)]
    mtu: u16,

    /// Where the transport payload starts inside the IPv4 header.
    #[clap(long, value_enum, default_value = "fixed")]
    header_length: HeaderLengthPolicy,

    /// Also log a hexdump of every unit (at debug level).
    #[clap(long)]
    hexdump: bool,

    /// Give up once this many reads in a row have failed. Unlimited by default.
    #[clap(long)]
    max_consecutive_read_errors: Option<u32>,

    /// Run the synthetic traffic injector alongside the capture.
    #[clap(long)]
    inject: bool,
}

#[derive(clap::Args)]
struct InjectOpts {
    #[clap(long, default_value_t = config::INJECT_TARGET)]
    target: SocketAddrV4,

    #[clap(long, default_value_t = config::INJECT_BIND_PORT)]
    bind_port: u16,

    /// Milliseconds between datagrams.
    #[clap(long, default_value_t = 1000)]
    interval_ms: u64,
}
impl InjectOpts {
    fn to_injector(&self) -> Injector {
        Injector {
            bind_port: self.bind_port,
            target: self.target,
            interval: Duration::from_millis(self.interval_ms),
        }
    }
}
impl Default for InjectOpts {
    fn default() -> Self {
        Self {
            target: config::INJECT_TARGET,
            bind_port: config::INJECT_BIND_PORT,
            interval_ms: 1000,
        }
    }
}


fn init_logging(log_dir: Option<&PathBuf>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "tun-sniff.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(writer)
                .init();
            Some(guard)
        },
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
            None
        },
    }
}


async fn forward_interrupt<F>(signal: F, stop_tx: watch::Sender<bool>)
where
    F: Future<Output = std::io::Result<()>>,
{
    match signal.await {
        Ok(()) => {
            info!("interrupted, shutting down");
            let _ = stop_tx.send(true);
        },
        Err(e) => {
            error!("failed to listen for Ctrl+C, clean shutdown unavailable: {}", e);
            // dropping the sender would end the capture
            std::future::pending::<()>().await;
        },
    }
}


fn stop_on_ctrl_c() -> watch::Receiver<bool> {
    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(forward_interrupt(tokio::signal::ctrl_c(), stop_tx));
    stop_rx
}


async fn listen(opts: ListenOpts) -> ExitCode {
    let interface_config = InterfaceConfig {
        name: opts.name,
        cidr: opts.cidr,
        mtu: opts.mtu,
    };
    let device = match setup::open_interface(&interface_config).await {
        Ok(d) => d,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        },
    };

    let stop = stop_on_ctrl_c();

    if opts.inject {
        let injector = InjectOpts::default().to_injector();
        let injector_stop = stop.clone();
        tokio::spawn(async move {
            if let Err(e) = injector.run(injector_stop).await {
                error!("{}", e);
            }
        });
    }

    let mut sink = TracingSink { hexdump: opts.hexdump };
    let capture = CaptureLoop::new(device, interface_config.mtu, stop)
        .header_length_policy(opts.header_length)
        .max_consecutive_read_errors(opts.max_consecutive_read_errors);
    match capture.run(&mut sink).await {
        Ok(stats) => {
            info!(units = stats.units, read_errors = stats.read_errors, "capture finished");
            ExitCode::SUCCESS
        },
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        },
    }
}


async fn inject(opts: InjectOpts) -> ExitCode {
    let stop = stop_on_ctrl_c();
    match opts.to_injector().run(stop).await {
        Ok(sent) => {
            info!(sent, "injector finished");
            ExitCode::SUCCESS
        },
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        },
    }
}


#[tokio::main]
async fn main() -> ExitCode {
    let opts = Opts::parse();
    let _guard = init_logging(opts.log_dir.as_ref());

    match opts.command {
        Command::Listen(listen_opts) => listen(listen_opts).await,
        Command::Inject(inject_opts) => inject(inject_opts).await,
    }
}
