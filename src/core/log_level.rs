//! Log level definitions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Severity of a message.
///
/// `All` and `None` are sentinels used only for thresholds: a minimum level of `All`
/// enables everything and `None` disables a logger or writer. They are never attached
/// to an actual message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[derive(Default)]
pub enum LogLevel {
    All = 0,
    Trace = 1,
    Debug = 2,
    #[default]
    Info = 3,
    Warn = 4,
    Error = 5,
    Fatal = 6,
    None = 7,
}

/// Naming convention used when rendering a level as text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LevelFormat {
    /// `Trace`, `Debug`, `Info`, `Warn`, `Error`, `Fatal`
    #[default]
    Short,
    /// `Trace`, `Debug`, `Information`, `Warning`, `Error`, `Fatal`
    Long,
    /// `TRC`, `DBG`, `INF`, `WRN`, `ERR`, `FTL`
    Tri,
    /// `T`, `D`, `I`, `W`, `E`, `F`
    Char,
}

impl LevelFormat {
    /// Parse a template format specifier (`short`, `long`, `tri`, `char`)
    pub fn parse(spec: &str) -> Option<Self> {
        match spec.to_ascii_lowercase().as_str() {
            "short" => Some(LevelFormat::Short),
            "long" => Some(LevelFormat::Long),
            "tri" => Some(LevelFormat::Tri),
            "char" => Some(LevelFormat::Char),
            _ => None,
        }
    }
}

impl LogLevel {
    /// Number of levels including both sentinels
    pub const COUNT: usize = 8;

    /// Levels that can be attached to a message, lowest first
    pub const MESSAGE_LEVELS: [LogLevel; 6] = [
        LogLevel::Trace,
        LogLevel::Debug,
        LogLevel::Info,
        LogLevel::Warn,
        LogLevel::Error,
        LogLevel::Fatal,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// `true` for `All` and `None`
    #[inline]
    pub const fn is_sentinel(self) -> bool {
        matches!(self, LogLevel::All | LogLevel::None)
    }

    pub fn to_str(&self) -> &'static str {
        match self {
            LogLevel::All => "ALL",
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Fatal => "FATAL",
            LogLevel::None => "NONE",
        }
    }

    /// Render this level using one of the template naming conventions
    pub fn name(&self, format: LevelFormat) -> &'static str {
        match format {
            LevelFormat::Short => match self {
                LogLevel::All => "All",
                LogLevel::Trace => "Trace",
                LogLevel::Debug => "Debug",
                LogLevel::Info => "Info",
                LogLevel::Warn => "Warn",
                LogLevel::Error => "Error",
                LogLevel::Fatal => "Fatal",
                LogLevel::None => "None",
            },
            LevelFormat::Long => match self {
                LogLevel::All => "All",
                LogLevel::Trace => "Trace",
                LogLevel::Debug => "Debug",
                LogLevel::Info => "Information",
                LogLevel::Warn => "Warning",
                LogLevel::Error => "Error",
                LogLevel::Fatal => "Fatal",
                LogLevel::None => "None",
            },
            LevelFormat::Tri => match self {
                LogLevel::All => "ALL",
                LogLevel::Trace => "TRC",
                LogLevel::Debug => "DBG",
                LogLevel::Info => "INF",
                LogLevel::Warn => "WRN",
                LogLevel::Error => "ERR",
                LogLevel::Fatal => "FTL",
                LogLevel::None => "NON",
            },
            LevelFormat::Char => match self {
                LogLevel::All => "A",
                LogLevel::Trace => "T",
                LogLevel::Debug => "D",
                LogLevel::Info => "I",
                LogLevel::Warn => "W",
                LogLevel::Error => "E",
                LogLevel::Fatal => "F",
                LogLevel::None => "N",
            },
        }
    }

    #[cfg(feature = "console")]
    pub fn color_code(&self) -> colored::Color {
        use colored::Color::*;
        match self {
            LogLevel::All | LogLevel::Trace => BrightBlack,
            LogLevel::Debug => Blue,
            LogLevel::Info => Green,
            LogLevel::Warn => Yellow,
            LogLevel::Error => Red,
            LogLevel::Fatal | LogLevel::None => BrightRed,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.to_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "ALL" => Ok(LogLevel::All),
            "TRACE" | "TRC" => Ok(LogLevel::Trace),
            "DEBUG" | "DBG" => Ok(LogLevel::Debug),
            "INFO" | "INFORMATION" | "INF" => Ok(LogLevel::Info),
            "WARN" | "WARNING" | "WRN" => Ok(LogLevel::Warn),
            "ERROR" | "ERR" => Ok(LogLevel::Error),
            "FATAL" | "FTL" => Ok(LogLevel::Fatal),
            "NONE" => Ok(LogLevel::None),
            _ => Err(format!("Invalid log level: '{}'", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering_with_sentinels() {
        assert!(LogLevel::All < LogLevel::Trace);
        assert!(LogLevel::Fatal < LogLevel::None);
        assert!(LogLevel::Info < LogLevel::Warn);
        assert_eq!(LogLevel::None.index(), LogLevel::COUNT - 1);
    }

    #[test]
    fn test_level_names() {
        assert_eq!(LogLevel::Info.name(LevelFormat::Short), "Info");
        assert_eq!(LogLevel::Info.name(LevelFormat::Long), "Information");
        assert_eq!(LogLevel::Warn.name(LevelFormat::Tri), "WRN");
        assert_eq!(LogLevel::Fatal.name(LevelFormat::Char), "F");
    }

    #[test]
    fn test_parse_aliases() {
        assert_eq!("warning".parse::<LogLevel>(), Ok(LogLevel::Warn));
        assert_eq!("Information".parse::<LogLevel>(), Ok(LogLevel::Info));
        assert_eq!("none".parse::<LogLevel>(), Ok(LogLevel::None));
        assert!("verbose".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_level_format_parse() {
        assert_eq!(LevelFormat::parse("TRI"), Some(LevelFormat::Tri));
        assert_eq!(LevelFormat::parse("bogus"), None);
    }

    #[test]
    fn test_display_respects_padding() {
        assert_eq!(format!("{:<5}|", LogLevel::Info), "INFO |");
    }
}
