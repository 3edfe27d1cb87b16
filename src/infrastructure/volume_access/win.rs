//! Windows FSCTL plumbing shared by the raw and mediated engines
//!
//! The structures mirror the DeviceIoControl contracts; the FSCTL
//! codes are defined locally to keep the call sites self-contained.

#![allow(clippy::upper_case_acronyms)]

use crate::domain::repositories::{JournalEvent, VolumeAccessError, VolumeGeometry};
use crate::infrastructure::file_systems::ntfs::parse_usn_batch;
use std::ffi::c_void;
use std::fs::File;
use std::os::windows::io::AsRawHandle;
use tracing::{debug, warn};
use windows_sys::Win32::Foundation::{CloseHandle, GetLastError, HANDLE};
use windows_sys::Win32::Security::{
    AdjustTokenPrivileges, LookupPrivilegeValueW, LUID_AND_ATTRIBUTES, SE_PRIVILEGE_ENABLED,
    TOKEN_ADJUST_PRIVILEGES, TOKEN_PRIVILEGES, TOKEN_QUERY,
};
use windows_sys::Win32::System::Threading::{GetCurrentProcess, OpenProcessToken};
use windows_sys::Win32::System::IO::DeviceIoControl;

const FSCTL_GET_NTFS_VOLUME_DATA: u32 = 0x0009_0064;
const FSCTL_QUERY_USN_JOURNAL: u32 = 0x0009_00F4;
const FSCTL_READ_USN_JOURNAL: u32 = 0x0009_00BB;

/// ERROR_HANDLE_EOF: the journal has been read to its end
const ERROR_HANDLE_EOF: u32 = 38;
/// ERROR_JOURNAL_ENTRY_DELETED: the requested range has been purged
const ERROR_JOURNAL_ENTRY_DELETED: u32 = 1181;

/// Upper bound on journal records read per scan
const MAX_JOURNAL_RECORDS: u64 = 10_000_000;

#[repr(C)]
#[derive(Default)]
struct NTFS_VOLUME_DATA_BUFFER {
    volume_serial_number: i64,
    number_sectors: i64,
    total_clusters: i64,
    free_clusters: i64,
    total_reserved: i64,
    bytes_per_sector: u32,
    bytes_per_cluster: u32,
    bytes_per_file_record_segment: u32,
    clusters_per_file_record_segment: u32,
    mft_valid_data_length: i64,
    mft_start_lcn: i64,
    mft2_start_lcn: i64,
    mft_zone_start: i64,
    mft_zone_end: i64,
}

#[repr(C)]
#[derive(Default)]
struct USN_JOURNAL_DATA {
    usn_journal_id: u64,
    first_usn: i64,
    next_usn: i64,
    lowest_valid_usn: i64,
    max_usn: i64,
    maximum_size: u64,
    allocation_delta: u64,
}

#[repr(C)]
struct READ_USN_JOURNAL_DATA {
    start_usn: i64,
    reason_mask: u32,
    return_only_on_close: u32,
    timeout: u64,
    bytes_to_wait_for: u64,
    usn_journal_id: u64,
}

/// Volume parameters via FSCTL_GET_NTFS_VOLUME_DATA, for the mediated
/// engine which never parses the boot sector itself
pub(crate) fn ntfs_volume_data(
    volume: &File,
) -> Result<(VolumeGeometry, u64), VolumeAccessError> {
    let mut data = NTFS_VOLUME_DATA_BUFFER::default();
    let mut returned: u32 = 0;

    let ok = unsafe {
        DeviceIoControl(
            volume.as_raw_handle() as HANDLE,
            FSCTL_GET_NTFS_VOLUME_DATA,
            std::ptr::null(),
            0,
            &mut data as *mut _ as *mut c_void,
            std::mem::size_of::<NTFS_VOLUME_DATA_BUFFER>() as u32,
            &mut returned,
            std::ptr::null_mut(),
        )
    };

    if ok == 0 {
        let err = unsafe { GetLastError() };
        return Err(VolumeAccessError::UnsupportedFilesystem(format!(
            "FSCTL_GET_NTFS_VOLUME_DATA failed: error {err}"
        )));
    }

    let geometry = VolumeGeometry {
        bytes_per_sector: data.bytes_per_sector,
        cluster_size: data.bytes_per_cluster,
        mft_record_size: data.bytes_per_file_record_segment,
        total_size: data.number_sectors as u64 * data.bytes_per_sector as u64,
    };
    let mft_valid_length = data.mft_valid_data_length.max(0) as u64;
    Ok((geometry, mft_valid_length))
}

/// Reads the USN change journal, delete events and everything else;
/// the caller filters
pub(crate) fn read_usn_journal(volume: &File) -> Result<Vec<JournalEvent>, VolumeAccessError> {
    let handle = volume.as_raw_handle() as HANDLE;

    let mut journal = USN_JOURNAL_DATA::default();
    let mut returned: u32 = 0;
    let ok = unsafe {
        DeviceIoControl(
            handle,
            FSCTL_QUERY_USN_JOURNAL,
            std::ptr::null(),
            0,
            &mut journal as *mut _ as *mut c_void,
            std::mem::size_of::<USN_JOURNAL_DATA>() as u32,
            &mut returned,
            std::ptr::null_mut(),
        )
    };
    if ok == 0 {
        let err = unsafe { GetLastError() };
        debug!(error = err, "volume has no readable USN journal");
        return Ok(Vec::new());
    }

    let mut read_request = READ_USN_JOURNAL_DATA {
        start_usn: journal.first_usn,
        reason_mask: u32::MAX,
        return_only_on_close: 0,
        timeout: 0,
        bytes_to_wait_for: 0,
        usn_journal_id: journal.usn_journal_id,
    };

    let mut buffer = vec![0u8; 64 * 1024];
    let mut events = Vec::new();
    let mut records_read = 0u64;

    loop {
        let mut returned: u32 = 0;
        let ok = unsafe {
            DeviceIoControl(
                handle,
                FSCTL_READ_USN_JOURNAL,
                &read_request as *const _ as *const c_void,
                std::mem::size_of::<READ_USN_JOURNAL_DATA>() as u32,
                buffer.as_mut_ptr() as *mut c_void,
                buffer.len() as u32,
                &mut returned,
                std::ptr::null_mut(),
            )
        };

        if ok == 0 {
            let err = unsafe { GetLastError() };
            if err != ERROR_HANDLE_EOF && err != ERROR_JOURNAL_ENTRY_DELETED {
                warn!(error = err, "USN journal read stopped early");
            }
            break;
        }
        if returned < 8 {
            break;
        }

        let (next_usn, batch) = parse_usn_batch(&buffer[..returned as usize]);
        records_read += batch.len() as u64;
        events.extend(batch);

        if next_usn <= read_request.start_usn || records_read > MAX_JOURNAL_RECORDS {
            break;
        }
        read_request.start_usn = next_usn;
    }

    debug!(events = events.len(), "USN journal scan complete");
    Ok(events)
}

/// Enables SeBackupPrivilege so `$MFT` can be opened through the
/// filesystem; failure is reported but not fatal, the open itself
/// will surface the real error
pub(crate) fn enable_backup_privilege() -> Result<(), VolumeAccessError> {
    // "SeBackupPrivilege" as UTF-16, NUL-terminated
    let name: Vec<u16> = "SeBackupPrivilege\0".encode_utf16().collect();

    unsafe {
        let mut token: HANDLE = std::ptr::null_mut();
        if OpenProcessToken(
            GetCurrentProcess(),
            TOKEN_ADJUST_PRIVILEGES | TOKEN_QUERY,
            &mut token,
        ) == 0
        {
            return Err(VolumeAccessError::AccessBlocked(format!(
                "OpenProcessToken failed: error {}",
                GetLastError()
            )));
        }

        let mut privileges = TOKEN_PRIVILEGES {
            PrivilegeCount: 1,
            Privileges: [LUID_AND_ATTRIBUTES {
                Luid: std::mem::zeroed(),
                Attributes: SE_PRIVILEGE_ENABLED,
            }],
        };

        if LookupPrivilegeValueW(
            std::ptr::null(),
            name.as_ptr(),
            &mut privileges.Privileges[0].Luid,
        ) == 0
        {
            CloseHandle(token);
            return Err(VolumeAccessError::AccessBlocked(format!(
                "LookupPrivilegeValueW failed: error {}",
                GetLastError()
            )));
        }

        let adjusted = AdjustTokenPrivileges(
            token,
            0,
            &privileges,
            0,
            std::ptr::null_mut(),
            std::ptr::null_mut(),
        );
        let err = GetLastError();
        CloseHandle(token);

        if adjusted == 0 || err != 0 {
            return Err(VolumeAccessError::AccessBlocked(format!(
                "AdjustTokenPrivileges failed: error {err}"
            )));
        }
    }

    Ok(())
}
