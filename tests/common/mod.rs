#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use lan_map_rs::error::ScanError;
use lan_map_rs::netdetect::TargetRange;
use lan_map_rs::ports::PortSpec;
use lan_map_rs::scanner::{ScanTool, ToolOutput};
use tokio_util::sync::CancellationToken;

/// Two hosts: 10.0.0.5 with ssh+http, 10.0.0.9 named printer-hp without open ports.
pub const TWO_HOST_REPORT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE nmaprun>
<nmaprun scanner="nmap" args="nmap -p 1-1024 -T4 -sS -oX - 10.0.0.0/24" start="1700000000" version="7.94">
<scaninfo type="syn" protocol="tcp" numservices="1024" services="1-1024"/>
<host starttime="1700000001" endtime="1700000003"><status state="up" reason="arp-response" reason_ttl="0"/>
<address addr="10.0.0.5" addrtype="ipv4"/>
<address addr="52:54:00:12:34:56" addrtype="mac" vendor="QEMU virtual NIC"/>
<hostnames></hostnames>
<ports><extraports state="closed" count="1022"><extrareasons reason="reset" count="1022"/></extraports>
<port protocol="tcp" portid="22"><state state="open" reason="syn-ack" reason_ttl="64"/><service name="ssh" method="table" conf="3"/></port>
<port protocol="tcp" portid="80"><state state="open" reason="syn-ack" reason_ttl="64"/><service name="http" method="table" conf="3"/></port>
</ports>
<times srtt="312" rttvar="114" to="100000"/>
</host>
<host><status state="up" reason="arp-response"/>
<address addr="10.0.0.9" addrtype="ipv4"/>
<hostnames><hostname name="printer-hp" type="PTR"/></hostnames>
<ports><extraports state="closed" count="1024"/></ports>
</host>
<runstats><finished time="1700000004" timestr="Tue Nov 14 22:13:24 2023" elapsed="3.21" exit="success"/><hosts up="2" down="254" total="256"/></runstats>
</nmaprun>
"#;

pub enum Behavior {
    Report(Vec<u8>),
    Fail(String),
    /// Runs until cancelled.
    Hang,
}

pub struct FakeTool {
    pub available: bool,
    pub behavior: Behavior,
    pub runs: AtomicUsize,
}

impl FakeTool {
    pub fn with_report(report: &str) -> Self {
        Self {
            available: true,
            behavior: Behavior::Report(report.as_bytes().to_vec()),
            runs: AtomicUsize::new(0),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::with_report(TWO_HOST_REPORT)
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            behavior: Behavior::Fail(message.to_string()),
            ..Self::with_report("")
        }
    }

    pub fn hanging() -> Self {
        Self {
            behavior: Behavior::Hang,
            ..Self::with_report("")
        }
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScanTool for FakeTool {
    fn name(&self) -> &str {
        "nmap"
    }

    async fn is_available(&self) -> bool {
        self.available
    }

    async fn run(
        &self,
        target: &TargetRange,
        ports: &PortSpec,
        cancel: CancellationToken,
    ) -> Result<ToolOutput, ScanError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        let command = format!("nmap -p {ports} -T4 -sS -oX - {target}");
        match &self.behavior {
            Behavior::Report(bytes) => Ok(ToolOutput {
                command,
                stdout: bytes.clone(),
            }),
            Behavior::Fail(msg) => Err(ScanError::ToolExecution(msg.clone())),
            Behavior::Hang => {
                tokio::select! {
                    _ = cancel.cancelled() => Err(ScanError::Cancelled),
                    _ = tokio::time::sleep(Duration::from_secs(60)) => Err(ScanError::Timeout(Duration::from_secs(60))),
                }
            }
        }
    }
}
