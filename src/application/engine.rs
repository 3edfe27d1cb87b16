//! Engine selection
//!
//! Maps the encryption gate's verdict to a volume access engine,
//! deterministically: unlocked-but-encrypted volumes go straight to
//! the mediated engine, everything else gets raw access with an
//! explicit mediated fallback when raw reads are blocked. Shared by
//! the scan and recovery entry points so both sides of the engine
//! agree on the routing.

use crate::domain::entities::{CarveSkipReason, EncryptionState, VolumeSpec};
use crate::domain::repositories::{VolumeAccess, VolumeAccessError};
use crate::infrastructure::volume_access::RawVolume;
use tracing::{info, warn};

/// Selects and opens the engine for a volume
///
/// The second element records why carving will not be possible, when
/// the routing already determines that.
pub fn select_engine(
    spec: &VolumeSpec,
    gate_state: EncryptionState,
) -> Result<(Box<dyn VolumeAccess>, Option<CarveSkipReason>), VolumeAccessError> {
    match gate_state {
        EncryptionState::Locked => Err(VolumeAccessError::VolumeUnavailable(
            "volume is encrypted and locked".to_string(),
        )),
        EncryptionState::Unlocked => {
            info!(volume = %spec, "encrypted volume, selecting mediated engine");
            let volume = open_mediated(spec)?;
            Ok((volume, Some(CarveSkipReason::EncryptedVolume)))
        }
        EncryptionState::NotEncrypted => match RawVolume::open(spec) {
            Ok(volume) => Ok((Box::new(volume), None)),
            Err(VolumeAccessError::AccessBlocked(detail)) => {
                warn!(%detail, "raw access blocked, falling back to mediated engine");
                let volume = open_mediated(spec).map_err(|err| {
                    VolumeAccessError::AccessBlocked(format!(
                        "raw access blocked ({detail}) and mediated engine unavailable: {err}"
                    ))
                })?;
                Ok((volume, Some(CarveSkipReason::RawAccessBlocked)))
            }
            Err(err) => Err(err),
        },
    }
}

fn open_mediated(spec: &VolumeSpec) -> Result<Box<dyn VolumeAccess>, VolumeAccessError> {
    #[cfg(windows)]
    {
        use crate::infrastructure::volume_access::MediatedVolume;
        Ok(Box::new(MediatedVolume::open(spec)?))
    }
    #[cfg(not(windows))]
    {
        let _ = spec;
        Err(VolumeAccessError::AccessBlocked(
            "OS-mediated metadata access is only available on Windows".to_string(),
        ))
    }
}
