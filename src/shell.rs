//! Command table for the operator shell.
//!
//! The core never parses command lines.  A front end tokenizes input and
//! hands the argument array to [`Node::run_shell`](crate::node::Node::run_shell),
//! which looks the first token up here.

use heapless::Vec;

use crate::error::ShellError;
use crate::payload::ModuleId;

/// Maximum number of registered commands.
pub const MAX_SHELL_COMMANDS: usize = 16;

/// Result of running a shell command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellStatus {
    Ok,
    /// Missing or unparsable arguments.
    Usage,
    /// The command ran and failed.
    Failed,
}

/// Commands implemented by the node itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeCommand {
    Join,
    Cmd,
    ListModules,
    ListConfig,
    Set,
}

impl NodeCommand {
    /// Every built-in with its name and help text.
    pub const ALL: [(&'static str, &'static str, NodeCommand); 5] = [
        ("join", "join the network", NodeCommand::Join),
        ("cmd", "cmd <modid> <hex> -- send command to a local module", NodeCommand::Cmd),
        ("lsmod", "list loaded modules", NodeCommand::ListModules),
        ("lscfg", "print node settings", NodeCommand::ListConfig),
        ("set", "set <key> <value> -- change a node setting", NodeCommand::Set),
    ];
}

/// Who handles a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandHandler {
    Node(NodeCommand),
    Module(ModuleId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShellCommand {
    pub name: &'static str,
    pub help: &'static str,
    pub handler: CommandHandler,
}

/// Append-only command table.
#[derive(Debug, Default)]
pub struct CommandTable {
    commands: Vec<ShellCommand, MAX_SHELL_COMMANDS>,
}

impl CommandTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_command(
        &mut self,
        name: &'static str,
        help: &'static str,
        handler: CommandHandler,
    ) -> Result<(), ShellError> {
        if self.find(name).is_some() {
            return Err(ShellError::Duplicate);
        }
        self.commands
            .push(ShellCommand {
                name,
                help,
                handler,
            })
            .map_err(|_| ShellError::TableFull)
    }

    pub fn find(&self, name: &str) -> Option<&ShellCommand> {
        self.commands.iter().find(|c| c.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ShellCommand> {
        self.commands.iter()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
