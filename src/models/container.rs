// Container identity and host family

/// A running container as returned by the listing call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerRef {
    pub id: String,
    pub name: String,
}

impl ContainerRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Broad OS category of the Docker host; decides which counters are present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HostFamily {
    #[default]
    Posix,
    Windows,
}

impl HostFamily {
    /// Parse Docker's `os_type` (e.g. "linux", "windows"). Anything but windows is Posix.
    pub fn from_os_type(s: &str) -> Self {
        if s.eq_ignore_ascii_case("windows") {
            HostFamily::Windows
        } else {
            HostFamily::Posix
        }
    }
}
