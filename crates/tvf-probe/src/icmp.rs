//! ICMP-style reachability fallback
//!
//! Raw ICMP sockets need elevated privileges, so the default prober runs the
//! platform `ping` utility once and reads its exit status.

use std::io;
use std::net::IpAddr;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

/// Extra time granted to the ping utility beyond its own deadline
const PROCESS_GRACE: Duration = Duration::from_millis(500);

/// Secondary reachability check used when the TCP probe fails
#[async_trait]
pub trait IcmpProber: Send + Sync {
    /// Returns `Ok(true)` if the host answered within `timeout`.
    ///
    /// An `Err` means the check itself could not be performed.
    async fn is_reachable(&self, ip: IpAddr, timeout: Duration) -> io::Result<bool>;
}

/// Runs the system `ping` utility with a single echo request
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemPing;

#[async_trait]
impl IcmpProber for SystemPing {
    async fn is_reachable(&self, ip: IpAddr, timeout: Duration) -> io::Result<bool> {
        let mut cmd = Command::new(ping_program(ip));
        cmd.args(ping_args(ip, timeout))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        match tokio::time::timeout(timeout + PROCESS_GRACE, cmd.status()).await {
            Ok(status) => Ok(status?.success()),
            Err(_) => {
                tracing::debug!("ping {} exceeded {:?}", ip, timeout);
                Ok(false)
            }
        }
    }
}

fn ping_program(ip: IpAddr) -> &'static str {
    #[cfg(target_os = "macos")]
    {
        if ip.is_ipv6() {
            return "ping6";
        }
    }

    let _ = ip;
    "ping"
}

fn ping_args(ip: IpAddr, timeout: Duration) -> Vec<String> {
    let secs = timeout.as_secs().max(1).to_string();
    let millis = timeout.as_millis().max(1).to_string();

    #[cfg(target_os = "windows")]
    {
        let _ = secs;
        vec!["-n".into(), "1".into(), "-w".into(), millis, ip.to_string()]
    }

    #[cfg(target_os = "macos")]
    {
        let _ = millis;
        if ip.is_ipv6() {
            vec!["-c".into(), "1".into(), ip.to_string()]
        } else {
            vec!["-c".into(), "1".into(), "-t".into(), secs, ip.to_string()]
        }
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        let _ = millis;
        vec!["-c".into(), "1".into(), "-W".into(), secs, ip.to_string()]
    }
}
