use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::Path;
use std::process::Command;

/// The real user/group a root-elevated process should act as, resolved
/// from `SUDO_UID`/`SUDO_GID` when present (spec.md §6's environment
/// contract). Falls back to the current effective ids otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RealIdentity {
    pub uid: u32,
    pub gid: u32,
}

pub fn real_identity() -> RealIdentity {
    let uid = std::env::var("SUDO_UID")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or_else(|| nix::unistd::getuid().as_raw());
    let gid = std::env::var("SUDO_GID")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or_else(|| nix::unistd::getgid().as_raw());
    RealIdentity { uid, gid }
}

pub fn is_root() -> bool {
    nix::unistd::Uid::effective().is_root()
}

/// Owning (uid, gid) of a path, used for secure-link ownership checks and
/// directory-owner propagation in `makedirs`.
pub fn path_owner(path: &Path) -> std::io::Result<(u32, u32)> {
    let meta = fs::symlink_metadata(path)?;
    Ok((meta.uid(), meta.gid()))
}

/// Best-effort test of whether the current process can write to `dir`, used
/// by root detection instead of a direct libc `access()` call: probes with
/// a throwaway temp file.
pub fn can_write_dir(dir: &Path) -> bool {
    if !dir.is_dir() {
        return false;
    }
    let probe = dir.join(format!(".dotty-write-probe-{}", std::process::id()));
    match fs::File::create(&probe) {
        Ok(_) => {
            let _ = fs::remove_file(&probe);
            true
        }
        Err(_) => false,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatingSystem {
    MacOS,
    Linux(LinuxDistro),
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinuxDistro {
    Debian,
    Ubuntu,
    Fedora,
    RHEL,
    CentOS,
    RedHat,
    Arch,
    Manjaro,
    Other(String),
}

/// Detect the current operating system
pub fn detect_os() -> OperatingSystem {
    if cfg!(target_os = "macos") {
        return OperatingSystem::MacOS;
    }

    if cfg!(target_os = "linux") {
        return OperatingSystem::Linux(detect_linux_distro());
    }

    OperatingSystem::Unknown
}

/// Detect Linux distribution from /etc/os-release
fn detect_linux_distro() -> LinuxDistro {
    // Try to read /etc/os-release
    if let Ok(content) = fs::read_to_string("/etc/os-release") {
        for line in content.lines() {
            if line.starts_with("ID=") {
                let id = line
                    .trim_start_matches("ID=")
                    .trim_matches('"')
                    .to_lowercase();
                return match id.as_str() {
                    "debian" => LinuxDistro::Debian,
                    "ubuntu" => LinuxDistro::Ubuntu,
                    "fedora" => LinuxDistro::Fedora,
                    "rhel" => LinuxDistro::RHEL,
                    "centos" => LinuxDistro::CentOS,
                    "redhat" => LinuxDistro::RedHat,
                    "arch" => LinuxDistro::Arch,
                    "manjaro" => LinuxDistro::Manjaro,
                    other => LinuxDistro::Other(other.to_string()),
                };
            }
        }
    }

    // Fallback: try lsb_release
    if let Ok(output) = Command::new("lsb_release").arg("-is").output() {
        if output.status.success() {
            let distro = String::from_utf8_lossy(&output.stdout)
                .trim()
                .to_lowercase();
            return match distro.as_str() {
                "debian" => LinuxDistro::Debian,
                "ubuntu" => LinuxDistro::Ubuntu,
                "fedora" => LinuxDistro::Fedora,
                "redhat" => LinuxDistro::RedHat,
                "arch" => LinuxDistro::Arch,
                other => LinuxDistro::Other(other.to_string()),
            };
        }
    }

    LinuxDistro::Other("unknown".to_string())
}

/// Check if running on macOS
pub fn is_macos() -> bool {
    matches!(detect_os(), OperatingSystem::MacOS)
}

/// Check if running on Linux
pub fn is_linux() -> bool {
    matches!(detect_os(), OperatingSystem::Linux(_))
}

/// Get OS name as string (for filtering hooks)
pub fn os_name() -> String {
    match detect_os() {
        OperatingSystem::MacOS => "macos".to_string(),
        OperatingSystem::Linux(_) => "linux".to_string(),
        OperatingSystem::Unknown => "unknown".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_os() {
        let os = detect_os();
        assert!(!matches!(os, OperatingSystem::Unknown));
    }

    #[test]
    fn test_os_name() {
        let name = os_name();
        assert!(name == "macos" || name == "linux");
    }
}
