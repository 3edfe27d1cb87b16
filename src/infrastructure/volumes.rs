//! Volume listing and privilege probe
//!
//! Enumerates candidate volumes by probing drive letters and reports
//! whether the process can open raw volume handles at all. Both are
//! Windows-centric; other hosts see an empty volume list and an
//! euid-based elevation check, which keeps image-file workflows
//! usable everywhere.

use crate::domain::entities::Volume;
#[cfg(windows)]
use crate::domain::entities::VolumeSpec;
#[cfg(windows)]
use crate::infrastructure::encryption;
use serde::{Deserialize, Serialize};

/// Wire-facing result of `check-privilege`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrivilegeReport {
    pub is_admin: bool,
    pub message: String,
}

/// Probes process elevation
pub fn check_privilege() -> PrivilegeReport {
    let is_admin = is_elevated();
    PrivilegeReport {
        is_admin,
        message: if is_admin {
            "running with administrator privileges".to_string()
        } else {
            "not running as administrator; raw volume access will be refused".to_string()
        },
    }
}

/// Lists volumes eligible for scanning
pub fn list_volumes() -> Vec<Volume> {
    #[cfg(windows)]
    {
        list_volumes_windows()
    }
    #[cfg(not(windows))]
    {
        Vec::new()
    }
}

#[cfg(windows)]
fn list_volumes_windows() -> Vec<Volume> {
    let mut volumes = Vec::new();

    for letter in b'A'..=b'Z' {
        let letter = letter as char;
        let root = format!("{letter}:\\");
        if !std::path::Path::new(&root).exists() {
            continue;
        }

        let (label, filesystem) = win::volume_information(&root);
        let (total_space, free_space) = win::disk_space(&root);
        let gate = encryption::status(&VolumeSpec::DriveLetter(letter));

        volumes.push(Volume {
            mount: format!("{letter}:"),
            label,
            total_space,
            free_space,
            filesystem,
            encryption: gate.state,
        });
    }

    volumes
}

/// True when the process can expect raw volume handles to open
pub fn is_elevated() -> bool {
    #[cfg(windows)]
    {
        win::token_is_elevated()
    }
    #[cfg(unix)]
    {
        rustix::process::geteuid().is_root()
    }
    #[cfg(not(any(windows, unix)))]
    {
        false
    }
}

#[cfg(windows)]
mod win {
    use std::ffi::c_void;
    use windows_sys::Win32::Foundation::{CloseHandle, HANDLE};
    use windows_sys::Win32::Security::{
        GetTokenInformation, TokenElevation, TOKEN_ELEVATION, TOKEN_QUERY,
    };
    use windows_sys::Win32::Storage::FileSystem::{
        GetDiskFreeSpaceExW, GetVolumeInformationW,
    };
    use windows_sys::Win32::System::Threading::{GetCurrentProcess, OpenProcessToken};

    fn to_wide(s: &str) -> Vec<u16> {
        s.encode_utf16().chain(std::iter::once(0)).collect()
    }

    fn from_wide(buf: &[u16]) -> String {
        let end = buf.iter().position(|&c| c == 0).unwrap_or(buf.len());
        String::from_utf16_lossy(&buf[..end])
    }

    /// (label, filesystem name) for a root path like "C:\"
    pub(super) fn volume_information(root: &str) -> (String, String) {
        let wide_root = to_wide(root);
        let mut label = [0u16; 256];
        let mut fs_name = [0u16; 256];

        let ok = unsafe {
            GetVolumeInformationW(
                wide_root.as_ptr(),
                label.as_mut_ptr(),
                label.len() as u32,
                std::ptr::null_mut(),
                std::ptr::null_mut(),
                std::ptr::null_mut(),
                fs_name.as_mut_ptr(),
                fs_name.len() as u32,
            )
        };

        if ok == 0 {
            return ("Local Disk".to_string(), "Unknown".to_string());
        }

        let label = from_wide(&label);
        let label = if label.is_empty() {
            "Local Disk".to_string()
        } else {
            label
        };
        (label, from_wide(&fs_name))
    }

    /// (total, free) bytes for a root path
    pub(super) fn disk_space(root: &str) -> (u64, u64) {
        let wide_root = to_wide(root);
        let mut free_to_caller = 0u64;
        let mut total = 0u64;
        let mut free = 0u64;

        let ok = unsafe {
            GetDiskFreeSpaceExW(
                wide_root.as_ptr(),
                &mut free_to_caller,
                &mut total,
                &mut free,
            )
        };

        if ok == 0 {
            (0, 0)
        } else {
            (total, free_to_caller)
        }
    }

    pub(super) fn token_is_elevated() -> bool {
        unsafe {
            let mut token: HANDLE = std::ptr::null_mut();
            if OpenProcessToken(GetCurrentProcess(), TOKEN_QUERY, &mut token) == 0 {
                return false;
            }

            let mut elevation = TOKEN_ELEVATION { TokenIsElevated: 0 };
            let mut size = std::mem::size_of::<TOKEN_ELEVATION>() as u32;
            let ok = GetTokenInformation(
                token,
                TokenElevation,
                &mut elevation as *mut _ as *mut c_void,
                size,
                &mut size,
            );
            CloseHandle(token);

            ok != 0 && elevation.TokenIsElevated != 0
        }
    }
}
