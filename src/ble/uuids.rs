//! BLE Service and Characteristic UUIDs.
//!
//! Contains the UUID constants used for sensor band communication.

use uuid::Uuid;

// Band Sensor Service (custom)
/// Sensor band custom service UUID.
pub const BAND_SERVICE_UUID: Uuid = Uuid::from_u128(0xf364_1400_00b0_4240_ba50_05ca45bf8abc);
/// Accelerometer characteristic UUID (Notify). Carries 10-byte sensor frames.
pub const ACCELERATION_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0xf364_1404_00b0_4240_ba50_05ca45bf8abc);
/// PPG characteristic UUID (Notify). Not decoded by this crate.
pub const PPG_CHARACTERISTIC_UUID: Uuid = Uuid::from_u128(0xf364_1403_00b0_4240_ba50_05ca45bf8abc);

/// Check whether `uuid` matches the `target` identifier.
///
/// Matching is a case-insensitive substring test, since some platforms
/// case-fold or pad identifiers.
pub fn uuid_matches(uuid: &Uuid, target: &str) -> bool {
    let target = target.trim().to_ascii_lowercase();
    if target.is_empty() {
        return false;
    }
    uuid.hyphenated().to_string().contains(&target) || uuid.simple().to_string().contains(&target)
}
