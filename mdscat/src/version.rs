use std::fmt;

use once_cell::sync::OnceCell;

pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}


fn built_time() -> &'static str {
    static INSTANCE: OnceCell<String> = OnceCell::new();
    INSTANCE.get_or_init(|| {
        built::util::strptime(built_info::BUILT_TIME_UTC)
            .with_timezone(&built::chrono::offset::Local)
            .to_string()
    })
    .as_str()
}


const LOGO: &str = r"
+--------------------------------------------------------+
|                   _                     _              |
|    _ __ ___   __| | ___  ___ __ _  ___| |_            |
|   | '_ ` _ \ / _` |/ __|/ __/ _` |/ _ \ __|           |
|   | | | | | | (_| |\__ \ (_| (_| |  __/ |_            |
|   |_| |_| |_|\__,_||___/\___\__,_|\___|\__|           |
|                                                        |
|      neutron scattering observables from MD runs       |
+--------------------------------------------------------+";


/// Build metadata printed by `mdscat --help` and `--version`.
#[derive(Debug)]
pub struct Version {
    name:           &'static str,
    version_str:    &'static str,
    built_time:     &'static str,
    git_hash_long:  Option<&'static str>,
    git_hash_short: Option<&'static str>,
    git_dirty:      Option<bool>,

    host:           &'static str,
    profile:        &'static str,
    rustc:          &'static str,
    target:         &'static str,
}


impl Version {
    pub fn new() -> Self {
        Self {
            name:           built_info::PKG_NAME,
            version_str:    built_info::PKG_VERSION,
            built_time:     built_time(),
            git_hash_long:  built_info::GIT_COMMIT_HASH,
            git_hash_short: built_info::GIT_COMMIT_HASH_SHORT,
            git_dirty:      built_info::GIT_DIRTY,
            host:           built_info::HOST,
            profile:        built_info::PROFILE,
            rustc:          built_info::RUSTC_VERSION,
            target:         built_info::TARGET,
        }
    }
}


impl Default for Version {
    fn default() -> Self {
        Self::new()
    }
}


/// `{:#}` adds the build details.
impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", LOGO.trim())?;
        writeln!(f)?;
        writeln!(f, "{} {} ({})", self.name, self.version_str,
            self.git_hash_short.unwrap_or("NO GIT INFO"))?;
        writeln!(f, "    built on {} at {}", self.host, self.built_time)?;

        if f.alternate() {
            writeln!(f, "    git hash:       {}{}",
                self.git_hash_long.unwrap_or("NO GIT INFO"),
                if self.git_dirty.unwrap_or(false) { " (dirty)" } else { "" })?;
            writeln!(f, "    build profile:  {}", self.profile)?;
            writeln!(f, "    rustc version:  {}", self.rustc)?;
            writeln!(f, "    build target:   {}", self.target)?;
        }
        Ok(())
    }
}
