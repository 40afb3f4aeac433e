use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Which traversal strategy a runtime uses.
///
/// - `Sequential`: every system runs on the thread that started the pass.
/// - `Concurrent`: systems run on per-affinity worker pools (default).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraverserKind {
    Sequential,
    #[default]
    Concurrent,
}

impl TraverserKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TraverserKind::Sequential => "sequential",
            TraverserKind::Concurrent => "concurrent",
        }
    }
}

impl fmt::Display for TraverserKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TraverserKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sequential" => Ok(TraverserKind::Sequential),
            "concurrent" => Ok(TraverserKind::Concurrent),
            other => Err(format!(
                "invalid traverser: {other} (expected \"sequential\" or \"concurrent\")"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("Sequential".parse(), Ok(TraverserKind::Sequential));
        assert_eq!(" concurrent ".parse(), Ok(TraverserKind::Concurrent));
        assert!("parallel".parse::<TraverserKind>().is_err());
    }

    #[test]
    fn defaults_to_concurrent() {
        assert_eq!(TraverserKind::default(), TraverserKind::Concurrent);
    }
}
