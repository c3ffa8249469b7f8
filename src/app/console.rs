//! Console command execution.
//!
//! Turns a parsed [`ConsoleCommand`] into reply text on the session. Side
//! effects that outlive the reply (restart, format notification) are
//! returned as a [`ConsoleOutcome`] for the controller to carry out.

use super::commands::{ConsoleCommand, command_list};
use super::ports::{
    ASSET_PATH, CommandHandler, ConsoleSession, FilesystemPort, NetworkPort, SystemPort,
};
use crate::config::MaintConfig;
use crate::error::ConsoleError;

/// What the controller must do after the reply was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleOutcome {
    Done,
    Reboot,
    Formatted,
}

/// Everything a command may read or touch.
pub struct ConsoleEnv<'a> {
    pub config: &'a MaintConfig,
    pub network: &'a dyn NetworkPort,
    pub system: &'a dyn SystemPort,
    /// Present only while the upload service is live.
    pub fs: Option<&'a mut dyn FilesystemPort>,
    pub external: Option<&'a mut dyn CommandHandler>,
}

/// Greeting sent to every new console client.
pub fn greeting(fs_available: bool) -> String {
    format!("\r\n[TREX] telnet ready. cmds: {}\r\n", command_list(fs_available))
}

/// Execute one line. `Err(Unrecognized)` means nobody claimed it and the
/// caller should answer `?`.
pub fn execute(
    line: &str,
    env: ConsoleEnv<'_>,
    out: &mut dyn ConsoleSession,
) -> Result<ConsoleOutcome, ConsoleError> {
    let ConsoleEnv {
        config,
        network,
        system,
        fs,
        external,
    } = env;
    let fs_available = fs.is_some();

    match ConsoleCommand::parse(line, fs_available) {
        ConsoleCommand::Help => {
            out.write_str(&format!("{}\r\n", command_list(fs_available)));
        }
        ConsoleCommand::Ip => out.write_str(&format!("IP: {}\r\n", network.ip())),
        ConsoleCommand::Rssi => out.write_str(&format!("RSSI: {} dBm\r\n", network.rssi())),
        ConsoleCommand::Free => out.write_str(&format!("Heap: {}\r\n", system.free_heap())),
        ConsoleCommand::Whoami => out.write_str(&format!(
            "{} id={} type={}\r\n",
            config.host,
            config.station_id,
            config.station_type.label()
        )),
        ConsoleCommand::Reboot => return Ok(ConsoleOutcome::Reboot),
        ConsoleCommand::Usage(usage) => out.write_str(&format!("usage: {}\r\n", usage)),
        ConsoleCommand::Other(text) => {
            let handled = match external {
                Some(handler) => handler.handle(text, out),
                None => false,
            };
            if !handled {
                return Err(ConsoleError::Unrecognized);
            }
        }
        cmd => {
            // Only filesystem commands remain, and parse yields them only
            // when `fs` is present.
            let Some(fs) = fs else {
                return Err(ConsoleError::Unrecognized);
            };
            return Ok(run_fs(cmd, fs, out));
        }
    }
    Ok(ConsoleOutcome::Done)
}

fn run_fs(
    cmd: ConsoleCommand<'_>,
    fs: &mut dyn FilesystemPort,
    out: &mut dyn ConsoleSession,
) -> ConsoleOutcome {
    match cmd {
        ConsoleCommand::Df => {
            out.write_str(&format!(
                "FS: {}/{} bytes\r\n",
                fs.used_bytes(),
                fs.total_bytes()
            ));
        }
        ConsoleCommand::Ls => match fs.list() {
            Ok(entries) if entries.is_empty() => out.write_str("(empty)\r\n"),
            Ok(entries) => {
                for e in entries {
                    out.write_str(&format!("{} {}\r\n", e.path, e.size));
                }
            }
            Err(e) => out.write_str(&format!("ERR {}\r\n", e)),
        },
        ConsoleCommand::Stat(path) => match fs.stat(path.unwrap_or(ASSET_PATH)) {
            Ok(e) => out.write_str(&format!("{} {} bytes\r\n", e.path, e.size)),
            Err(e) => out.write_str(&format!("ERR {}\r\n", e)),
        },
        ConsoleCommand::Rm(path) => match fs.remove(path) {
            Ok(()) => out.write_str(&format!("removed {}\r\n", path)),
            Err(e) => out.write_str(&format!("ERR {}\r\n", e)),
        },
        ConsoleCommand::Format => match fs.format() {
            Ok(()) => {
                out.write_str("format ok\r\n");
                return ConsoleOutcome::Formatted;
            }
            Err(e) => out.write_str(&format!("ERR {}\r\n", e)),
        },
        _ => {}
    }
    ConsoleOutcome::Done
}
