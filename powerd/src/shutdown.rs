//! Host power-off collaborator.

use std::process::Command;

use log::info;
use power_core::error::ShutdownError;
use power_core::orchestrator::SystemPower;

/// Command issued to power the host down.
const POWEROFF_COMMAND: &str = "/sbin/poweroff";

/// Invokes the operating system's power-off command.
pub struct Poweroff;

impl SystemPower for Poweroff {
    fn power_off(&mut self) -> Result<(), ShutdownError> {
        info!("running {POWEROFF_COMMAND}");
        match Command::new(POWEROFF_COMMAND).output() {
            Ok(output) if output.status.success() => Ok(()),
            Ok(output) => {
                let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
                combined.push_str(&String::from_utf8_lossy(&output.stderr));
                Err(ShutdownError::new(
                    &format!("{} exited with {}", POWEROFF_COMMAND, output.status),
                    combined.trim(),
                ))
            }
            Err(err) => Err(ShutdownError::new(
                &format!("{POWEROFF_COMMAND} could not be started: {err}"),
                "",
            )),
        }
    }
}
