//! Shared protocol constants for the LPTF framed transport

// Frame header: length u16 | type u8 | reserved u8
pub const HEADER_LEN: usize = 4;

// Largest content a single frame can carry (length field is u16)
pub const MAX_CONTENT_LEN: usize = u16::MAX as usize;

// Maximum payload of one BINARY_PART chunk. Fixed for interoperability.
pub const MAX_CHUNK_BYTES: usize = 8000;

// Default server port (matches the historical deployment)
pub const DEFAULT_PORT: u16 = 12345;

// Packet type IDs (keep numeric stable, ERROR is the ceiling)
pub mod packet_type {
    pub const REPLY: u8 = 0;
    pub const MESSAGE: u8 = 1;
    pub const COMMAND: u8 = 2;
    pub const BINARY_PART: u8 = 3;
    // Older revisions streamed FILE_PART (id + offset + data). Reserved, never sent.
    pub const FILE_PART: u8 = 4;
    pub const LOGIN: u8 = 5;
    pub const ERROR: u8 = 0xFF;

    pub fn name(t: u8) -> &'static str {
        match t {
            REPLY => "REPLY",
            MESSAGE => "MESSAGE",
            COMMAND => "COMMAND",
            BINARY_PART => "BINARY_PART",
            FILE_PART => "FILE_PART",
            LOGIN => "LOGIN",
            ERROR => "ERROR",
            _ => "UNKNOWN",
        }
    }
}

// Command names carried as the first NUL-terminated string of a COMMAND packet
pub mod command {
    pub const UPLOAD: &str = "UPLOAD";
    pub const DOWNLOAD: &str = "DOWNLOAD";
    pub const DELETE_FILE: &str = "RMFILE";
    pub const LIST: &str = "LIST";
    pub const MKDIR: &str = "MKDIR";
    pub const RMDIR: &str = "RMDIR";
    pub const RENAME_DIR: &str = "RNDIR";
    pub const TREE: &str = "TREE";
}

// Error codes carried in ERROR packets
pub mod error_code {
    pub const CMD_FAILURE: u8 = 0;
    pub const CMD_UNKNOWN: u8 = 1;
}

// Well-known reply/message bodies
pub mod status {
    pub const OK: &str = "OK";
    // Login challenge for a known user (REPLY refers to LOGIN)
    pub const PASSWORD: &str = "PASSWORD";
    // Login challenge for a first-time user (MESSAGE)
    pub const NEW_PASSWORD: &str = "NEW PASSWORD";
    pub const EMPTY_LISTING: &str = "(empty)";
    pub const NOT_IMPLEMENTED: &str = "Not Implemented";
    // Body of a chunk acknowledgement
    pub const ACK: u8 = 0;
}
