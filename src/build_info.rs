use std::fmt;

/// Values stamped by build.rs
#[derive(Debug, Clone, Copy)]
pub struct BuildInfo {
    pub version: &'static str,
    pub built_at: &'static str,
    /// `git describe` output, `-dirty` when the tree had local changes
    pub revision: &'static str,
    pub target: &'static str,
    pub profile: &'static str,
}

pub const BUILD_INFO: BuildInfo = BuildInfo {
    version: env!("CARGO_PKG_VERSION"),
    built_at: env!("LANEVIS_BUILD_TIME"),
    revision: env!("LANEVIS_GIT_DESCRIBE"),
    target: env!("LANEVIS_TARGET"),
    profile: env!("LANEVIS_PROFILE"),
};

impl BuildInfo {
    pub fn is_dirty(&self) -> bool {
        self.revision.ends_with("-dirty")
    }
}

/// Multi-line text for `--version`
impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.version)?;
        writeln!(f, "revision: {}", self.revision)?;
        writeln!(f, "built:    {}", self.built_at)?;
        write!(f, "target:   {} ({})", self.target, self.profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_starts_with_version() {
        let text = BUILD_INFO.to_string();
        assert!(text.starts_with(env!("CARGO_PKG_VERSION")));
        assert!(text.contains("revision: "));
        assert_eq!(text.lines().count(), 4);
    }

    #[test]
    fn test_dirty_flag() {
        let info = BuildInfo { revision: "a1b2c3d-dirty", ..BUILD_INFO };
        assert!(info.is_dirty());
        let info = BuildInfo { revision: "a1b2c3d", ..BUILD_INFO };
        assert!(!info.is_dirty());
    }
}
