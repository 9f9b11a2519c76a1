//! Wire protocol constants and tag memory geometry.

/// Request flags for addressed commands (addressed + high data rate)
pub const FLAGS_ADDRESSED: u8 = 0x22;

/// Request flags for the vendor probe (high data rate only)
pub const FLAGS_HIGH_RATE: u8 = 0x02;

/// Offset of the 8-byte UID inside an addressed command
pub const UID_OFFSET: usize = 2;

/// Size of one memory block in bytes
pub const BLOCK_LEN: usize = 8;

/// Most blocks a single transfer command may carry
pub const MAX_TRANSFER_BLOCKS: usize = 4;

/// Vendor code carried by the measurement probe
pub const VENDOR_CODE: u8 = 0x07;

/// Delay between the two probe exchanges while the sensor settles (ms)
pub const MEASUREMENT_SETTLE_MS: u64 = 42;

/// Deadline for retrying a failed exchange, measured from the last
/// successful exchange (ms)
pub const RESPONSE_TIMEOUT_MS: u64 = 1000;

// =============================================================================
// Command Opcodes
// =============================================================================

// Opcode constants (for convenience)
/// Opcode constant for READ_SINGLE_BLOCK (0x20)
pub const CMD_READ_SINGLE_BLOCK: u8 = 0x20;
/// Opcode constant for WRITE_SINGLE_BLOCK (0x21)
pub const CMD_WRITE_SINGLE_BLOCK: u8 = 0x21;
/// Opcode constant for READ_MULTIPLE_BLOCKS (0x23)
pub const CMD_READ_MULTIPLE_BLOCKS: u8 = 0x23;
/// Opcode constant for WRITE_MULTIPLE_BLOCKS (0x24)
pub const CMD_WRITE_MULTIPLE_BLOCKS: u8 = 0x24;
/// Opcode constant for the vendor measurement probe (0xB3)
pub const CMD_VENDOR_PROBE: u8 = 0xB3;

/// ISO 15693 command opcodes used by this stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum CommandCode {
    /// `READ_SINGLE_BLOCK` - Read one memory block
    ReadSingleBlock = 0x20,
    /// `WRITE_SINGLE_BLOCK` - Write one memory block
    WriteSingleBlock = 0x21,
    /// `READ_MULTIPLE_BLOCKS` - Read a run of memory blocks
    ReadMultipleBlocks = 0x23,
    /// `WRITE_MULTIPLE_BLOCKS` - Write a run of memory blocks
    WriteMultipleBlocks = 0x24,
    /// Vendor measurement probe
    VendorProbe = 0xB3,
}

impl CommandCode {
    /// Convert a u8 to `CommandCode`
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x20 => Some(Self::ReadSingleBlock),
            0x21 => Some(Self::WriteSingleBlock),
            0x23 => Some(Self::ReadMultipleBlocks),
            0x24 => Some(Self::WriteMultipleBlocks),
            0xB3 => Some(Self::VendorProbe),
            _ => None,
        }
    }

    /// Convert `CommandCode` to u8
    pub const fn to_u8(self) -> u8 {
        self as u8
    }
}

// =============================================================================
// Response Framing
// =============================================================================

/// Status byte value for a successful command
pub const STATUS_OK: u8 = 0x00;

// =============================================================================
// Tag Memory Geometry
// =============================================================================

/// Image address that maps to memory block 0
pub const BASE_ADDRESS: u32 = 0xF860;

/// One past the highest valid image address
pub const ADDRESS_LIMIT: u32 = 0x1_0000;

/// Length of the checksummed configuration header in bytes
pub const HEADER_LEN: usize = 0x18;

/// Memory block holding the program key
pub const PROGRAM_KEY_BLOCK: u8 = 39;

/// Image byte offset of the program key (relative to [`BASE_ADDRESS`])
pub const PROGRAM_KEY_OFFSET: usize = 0x13C;

/// Program key value marking an image produced by this stack
pub const PROGRAM_KEY_SENTINEL: u16 = 0x8001;

/// Lowest program key value marking an already programmed tag
pub const PROGRAMMED_THRESHOLD: u16 = 0x8000;

/// Minutes in a full 14-day sensor run; keys at or below this are
/// runtime counters of a sensor still in service
pub const SENSOR_RUNTIME_MINUTES: u16 = 14 * 24 * 60;

// =============================================================================
// Buffer Capacities
// =============================================================================

/// Capacity of an outgoing command buffer
pub const COMMAND_CAPACITY: usize = 48;

/// Capacity of a response payload buffer
pub const RESPONSE_CAPACITY: usize = 48;

/// Most commands one exchange batch may carry
pub const COMMAND_BATCH: usize = 16;

/// Capacity of a single image section's data
pub const SECTION_CAPACITY: usize = 2048;

/// Most sections an image may carry
pub const MAX_SECTIONS: usize = 8;
