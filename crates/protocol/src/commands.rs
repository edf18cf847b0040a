//! Outbound command name remapping.
//!
//! Deployments can rename the generic command tokens the UI uses into the
//! vendor-specific opcodes a hub firmware expects (for example `"REBOOT"` →
//! `"SYS_REBOOT_CMD_PLACEHOLDER"`). The table is supplied externally via
//! configuration; unmapped names pass through unchanged.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Externally supplied command → opcode lookup table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandMap(pub HashMap<String, String>);

impl CommandMap {
    /// Resolves a command name to the opcode to put on the wire.
    pub fn resolve<'a>(&'a self, command: &'a str) -> &'a str {
        self.0.get(command).map_or(command, String::as_str)
    }
}
