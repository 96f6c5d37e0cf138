//! Utility functions for identifier generation

use bech32::Bech32m;
use uuid7::uuid7;

use crate::error::{EnrollmentError, Result};

pub const ENROLLMENT_HRP: &str = "enr_";

// construct a unique id then encode using bech32
pub fn new_uuid_to_bech32(hrp: &str) -> Result<String> {
    let hrp = bech32::Hrp::parse(hrp).map_err(|e| EnrollmentError::validation(e.to_string()))?;
    bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())
        .map_err(|e| EnrollmentError::validation(e.to_string()))
}

pub fn new_enrollment_id() -> Result<String> {
    new_uuid_to_bech32(ENROLLMENT_HRP)
}
