//! Console command parsing.
//!
//! One line in, one [`ConsoleCommand`] out. The command word is matched
//! case-insensitively; arguments keep their case so filesystem paths
//! survive.

/// Built-in commands, always available.
pub const BASE_COMMANDS: &str = "help, ip, rssi, free, whoami, reboot";

/// Extra commands while the upload filesystem is live.
pub const FS_COMMANDS: &str = "df, ls, stat, rm, format";

/// Parsed console line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand<'a> {
    Help,
    Ip,
    Rssi,
    Free,
    Whoami,
    Reboot,
    Df,
    Ls,
    /// `None` means the fixed asset path.
    Stat(Option<&'a str>),
    Rm(&'a str),
    Format,
    /// Known command with a missing argument.
    Usage(&'static str),
    /// Not a built-in; offered to the external handler (trimmed, original
    /// case). A blank line lands here as `Other("")`.
    Other(&'a str),
}

impl<'a> ConsoleCommand<'a> {
    /// Parse `line`. Filesystem commands are only recognised when
    /// `fs_available`; otherwise they fall through to [`ConsoleCommand::Other`].
    pub fn parse(line: &'a str, fs_available: bool) -> Self {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((w, r)) => (w, r.trim()),
            None => (line, ""),
        };
        let arg = (!rest.is_empty()).then_some(rest);

        let builtin = match word.to_ascii_lowercase().as_str() {
            "help" => Some(Self::Help),
            "ip" => Some(Self::Ip),
            "rssi" => Some(Self::Rssi),
            "free" => Some(Self::Free),
            "whoami" => Some(Self::Whoami),
            "reboot" => Some(Self::Reboot),
            "df" if fs_available => Some(Self::Df),
            "ls" if fs_available => Some(Self::Ls),
            "stat" if fs_available => Some(Self::Stat(arg)),
            "rm" if fs_available => Some(match arg {
                Some(path) => Self::Rm(path),
                None => Self::Usage("rm <path>"),
            }),
            "format" if fs_available => Some(Self::Format),
            _ => None,
        };

        builtin.unwrap_or(Self::Other(line))
    }
}

/// Comma-separated command list for the greeting and `help`.
pub fn command_list(fs_available: bool) -> String {
    if fs_available {
        format!("{}, {}", BASE_COMMANDS, FS_COMMANDS)
    } else {
        BASE_COMMANDS.to_string()
    }
}
