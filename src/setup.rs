use std::process::ExitStatus;

use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::InterfaceConfig;


const IP_COMMAND: &str = "/sbin/ip";


#[derive(Debug, Error)]
pub enum SetupError {
    #[error("{0} is not supported on this platform")]
    UnsupportedPlatform(&'static str),

    #[error("failed to create TUN device {name}: {source}")]
    CreateDevice {
        name: String,
        #[source]
        source: tun::Error,
    },

    #[error("failed to run {command:?}: {source}")]
    CommandSpawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command:?} failed with {status}")]
    CommandFailed {
        command: String,
        status: ExitStatus,
    },
}


pub async fn open_interface(config: &InterfaceConfig) -> Result<tun::AsyncDevice, SetupError> {
    ensure_linux(std::env::consts::OS)?;

    let mut tun_config = tun::Configuration::default();
    tun_config
        .tun_name(&config.name)
        .address(config.cidr.address)
        .netmask(config.cidr.netmask())
        .mtu(config.mtu)
        .up();

    let device = tun::create_as_async(&tun_config)
        .map_err(|source| SetupError::CreateDevice {
            name: config.name.clone(),
            source,
        })?;
    info!(name = %config.name, cidr = %config.cidr, mtu = config.mtu, "TUN device is up");

    // keep IPv6 chatter (router solicitations etc.) out of the capture
    run_ip(&["-6", "addr", "flush", "dev", &config.name]).await?;

    Ok(device)
}


fn ensure_linux(os: &'static str) -> Result<(), SetupError> {
    if os == "linux" {
        Ok(())
    } else {
        Err(SetupError::UnsupportedPlatform(os))
    }
}


async fn run_ip(args: &[&str]) -> Result<(), SetupError> {
    let command = format!("{} {}", IP_COMMAND, args.join(" "));
    debug!(%command, "running");

    let status = Command::new(IP_COMMAND)
        .args(args)
        .status()
        .await
        .map_err(|source| SetupError::CommandSpawn {
            command: command.clone(),
            source,
        })?;
    if !status.success() {
        return Err(SetupError::CommandFailed { command, status });
    }
    Ok(())
}
