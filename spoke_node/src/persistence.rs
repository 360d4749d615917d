//! Versioned, checksummed node record.
//!
//! The record has a fixed byte layout and is never a dump of an in-memory
//! struct. Multi-byte fields are little-endian.
//!
//! ```text
//! offset  size  field
//! ──────  ────  ─────────────────────────────────────────
//!  0      1     magic (0xA5)
//!  1      1     schema version (2)
//!  2      1     device id
//!  3      1     dir_cw_high (0/1)
//!  4      2     steps per rev
//!  6      4     deg per sec (f32)
//! 10      2     encoder zero (raw ticks)
//! 12      1     spoke count
//! 13      8     slot filled flags (first N used)
//! 21      8     reserved; byte 21 holds the window index
//! 29      4     CRC-32 of all 33 bytes with this field zeroed
//! ```

use crate::hardware::RecordStore;
use crc_any::CRCu32;
use spoke_common::consts::{
    MAX_DEG_PER_SEC, MAX_SPOKES, MIN_DEG_PER_SEC_EXCLUSIVE, MIN_SPOKES, RAW_TICK_MASK,
    STEPS_PER_REV_RANGE,
};
use spoke_common::node::config::FactoryDefaults;
use static_assertions::const_assert_eq;
use thiserror::Error;
use tracing::{debug, info, warn};

/// First byte of every record.
pub const RECORD_MAGIC: u8 = 0xA5;

/// Layout revision. Version 2 stores the window index in the first
/// reserved byte.
pub const SCHEMA_VERSION: u8 = 2;

/// Encoded record size.
pub const RECORD_LEN: usize = 33;

const SLOTS_OFFSET: usize = 13;
const WINDOW_OFFSET: usize = 21;
const CHECKSUM_OFFSET: usize = 29;
const SLOT_CAPACITY: usize = MAX_SPOKES as usize;

const_assert_eq!(SLOTS_OFFSET + SLOT_CAPACITY, WINDOW_OFFSET);
const_assert_eq!(CHECKSUM_OFFSET + 4, RECORD_LEN);

/// Why a stored record was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    /// Nothing stored yet.
    #[error("No record stored")]
    Missing,

    /// Fewer bytes than a record.
    #[error("Record too short: {0} bytes")]
    Short(usize),

    /// More bytes than a record.
    #[error("Record too long: {0} bytes")]
    Oversized(usize),

    /// Wrong first byte.
    #[error("Bad magic {0:#04x}")]
    BadMagic(u8),

    /// Unsupported layout revision.
    #[error("Unsupported schema version {0}")]
    BadVersion(u8),

    /// Checksum mismatch.
    #[error("Checksum mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    BadChecksum {
        /// Checksum found in the record
        stored: u32,
        /// Checksum of the record contents
        computed: u32,
    },

    /// Fields decode but make no sense.
    #[error("Invalid field: {0}")]
    Invalid(String),
}

/// Storage failure. Fatal to the node.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PersistenceError {
    /// The store could not be read.
    #[error("Failed to read record: {0}")]
    Read(String),

    /// The store could not be written.
    #[error("Failed to write record: {0}")]
    Write(String),
}

/// Decoded record contents.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedRecord {
    /// Owning device id.
    pub device_id: u8,
    /// Direction pin level meaning clockwise.
    pub dir_cw_high: bool,
    /// Driver steps per motor revolution.
    pub steps_per_rev: u16,
    /// Wheel speed in degrees per second.
    pub deg_per_sec: f32,
    /// Raw encoder reading that corresponds to 0°.
    pub encoder_zero: u16,
    /// Number of slots.
    pub spoke_count: u8,
    /// Occupancy; entries past `spoke_count` are stored as zero.
    pub slots: [bool; SLOT_CAPACITY],
    /// Slot at the window.
    pub window_index: u8,
}

impl PersistedRecord {
    /// Factory record: canonical layout, window 0, zero at `encoder_zero`.
    pub fn factory(device_id: u8, defaults: &FactoryDefaults, encoder_zero: u16) -> Self {
        let mut slots = [false; SLOT_CAPACITY];
        for slot in slots
            .iter_mut()
            .take(usize::from(defaults.spoke_count))
            .skip(1)
        {
            *slot = true;
        }
        Self {
            device_id,
            dir_cw_high: defaults.dir_cw_high,
            steps_per_rev: defaults.steps_per_rev,
            deg_per_sec: defaults.deg_per_sec,
            encoder_zero: encoder_zero & RAW_TICK_MASK,
            spoke_count: defaults.spoke_count,
            slots,
            window_index: 0,
        }
    }

    /// Encode to the canonical layout with a fresh checksum.
    pub fn to_bytes(&self) -> [u8; RECORD_LEN] {
        let mut bytes = [0u8; RECORD_LEN];
        bytes[0] = RECORD_MAGIC;
        bytes[1] = SCHEMA_VERSION;
        bytes[2] = self.device_id;
        bytes[3] = u8::from(self.dir_cw_high);
        bytes[4..6].copy_from_slice(&self.steps_per_rev.to_le_bytes());
        bytes[6..10].copy_from_slice(&self.deg_per_sec.to_le_bytes());
        bytes[10..12].copy_from_slice(&self.encoder_zero.to_le_bytes());
        bytes[12] = self.spoke_count;
        for (i, filled) in self.slots.iter().enumerate() {
            bytes[SLOTS_OFFSET + i] = u8::from(*filled && i < usize::from(self.spoke_count));
        }
        bytes[WINDOW_OFFSET] = self.window_index;

        let crc = checksum(&bytes);
        bytes[CHECKSUM_OFFSET..].copy_from_slice(&crc.to_le_bytes());
        bytes
    }

    /// Decode and fully validate a stored record.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RecordError> {
        if bytes.len() > RECORD_LEN {
            return Err(RecordError::Oversized(bytes.len()));
        }
        let bytes: &[u8; RECORD_LEN] = bytes
            .try_into()
            .map_err(|_| RecordError::Short(bytes.len()))?;

        if bytes[0] != RECORD_MAGIC {
            return Err(RecordError::BadMagic(bytes[0]));
        }
        if bytes[1] != SCHEMA_VERSION {
            return Err(RecordError::BadVersion(bytes[1]));
        }

        let stored = u32::from_le_bytes([
            bytes[CHECKSUM_OFFSET],
            bytes[CHECKSUM_OFFSET + 1],
            bytes[CHECKSUM_OFFSET + 2],
            bytes[CHECKSUM_OFFSET + 3],
        ]);
        let computed = checksum(bytes);
        if stored != computed {
            return Err(RecordError::BadChecksum { stored, computed });
        }

        if bytes[3] > 1 {
            return Err(RecordError::Invalid(format!("dir_cw_high = {}", bytes[3])));
        }

        let mut slots = [false; SLOT_CAPACITY];
        for (i, slot) in slots.iter_mut().enumerate() {
            *slot = bytes[SLOTS_OFFSET + i] != 0;
        }

        let record = Self {
            device_id: bytes[2],
            dir_cw_high: bytes[3] == 1,
            steps_per_rev: u16::from_le_bytes([bytes[4], bytes[5]]),
            deg_per_sec: f32::from_le_bytes([bytes[6], bytes[7], bytes[8], bytes[9]]),
            encoder_zero: u16::from_le_bytes([bytes[10], bytes[11]]),
            spoke_count: bytes[12],
            slots,
            window_index: bytes[WINDOW_OFFSET],
        };
        record.validate()?;
        Ok(record)
    }

    /// Semantic checks on decoded fields.
    pub fn validate(&self) -> Result<(), RecordError> {
        if !(MIN_SPOKES..=MAX_SPOKES).contains(&self.spoke_count) {
            return Err(RecordError::Invalid(format!(
                "spoke count {}",
                self.spoke_count
            )));
        }
        if self.window_index >= self.spoke_count {
            return Err(RecordError::Invalid(format!(
                "window index {} with {} spokes",
                self.window_index, self.spoke_count
            )));
        }
        if !STEPS_PER_REV_RANGE.contains(&self.steps_per_rev) {
            return Err(RecordError::Invalid(format!(
                "steps per rev {}",
                self.steps_per_rev
            )));
        }
        if !(self.deg_per_sec > MIN_DEG_PER_SEC_EXCLUSIVE && self.deg_per_sec <= MAX_DEG_PER_SEC) {
            return Err(RecordError::Invalid(format!(
                "deg per sec {}",
                self.deg_per_sec
            )));
        }
        if self.encoder_zero > RAW_TICK_MASK {
            return Err(RecordError::Invalid(format!(
                "encoder zero {}",
                self.encoder_zero
            )));
        }
        Ok(())
    }
}

/// CRC-32 (IEEE, reflected) of `bytes` with the checksum field zeroed.
pub fn checksum(bytes: &[u8; RECORD_LEN]) -> u32 {
    let mut scratch = *bytes;
    scratch[CHECKSUM_OFFSET..].fill(0);
    let mut crc = CRCu32::crc32();
    crc.digest(&scratch);
    crc.get_crc()
}

/// How the record in use at boot came about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// A valid record was found.
    Loaded,
    /// The stored record was rejected and factory defaults were written.
    Initialized(RecordError),
}

/// Load the record, rebuilding and writing back factory defaults if the
/// stored one is missing or invalid.
///
/// `current_raw` becomes the encoder zero of a rebuilt record. The device id
/// always comes from configuration.
pub fn load_or_init(
    store: &mut dyn RecordStore,
    device_id: u8,
    defaults: &FactoryDefaults,
    current_raw: u16,
) -> Result<(PersistedRecord, LoadOutcome), PersistenceError> {
    let stored = store
        .read()
        .map_err(|e| PersistenceError::Read(e.to_string()))?;

    let decoded = match stored {
        Some(bytes) => PersistedRecord::from_bytes(&bytes),
        None => Err(RecordError::Missing),
    };

    match decoded {
        Ok(mut record) => {
            if record.device_id != device_id {
                info!(
                    "Record belongs to device {}, adopting configured id {}",
                    record.device_id, device_id
                );
                record.device_id = device_id;
                save(store, &record)?;
            }
            info!(
                "Loaded record: {} spokes, window {}, {} steps/rev",
                record.spoke_count, record.window_index, record.steps_per_rev
            );
            Ok((record, LoadOutcome::Loaded))
        }
        Err(reason) => {
            if reason == RecordError::Missing {
                info!("No stored record, writing factory defaults");
            } else {
                warn!("Discarding stored record ({}), writing factory defaults", reason);
            }
            let record = PersistedRecord::factory(device_id, defaults, current_raw);
            save(store, &record)?;
            Ok((record, LoadOutcome::Initialized(reason)))
        }
    }
}

/// Write `record` synchronously.
pub fn save(store: &mut dyn RecordStore, record: &PersistedRecord) -> Result<(), PersistenceError> {
    store
        .write(&record.to_bytes())
        .map_err(|e| PersistenceError::Write(e.to_string()))?;
    debug!(
        "Record written: window {}, slots {:?}",
        record.window_index,
        &record.slots[..usize::from(record.spoke_count.min(MAX_SPOKES))]
    );
    Ok(())
}
