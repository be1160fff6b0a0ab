//! Commands carried by COMMAND packets
//!
//! Layout: command name, then each string argument (all NUL-terminated), then
//! any fixed-width integers in network byte order. Field order is fixed per
//! command and not self-describing.

use crate::error::{LptfError, Result};
use crate::packet::Packet;
use crate::protocol::{command as name, packet_type};
use crate::wire::{WireReader, WireWriter};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Upload { path: String, size: u32 },
    Download { path: String },
    DeleteFile { path: String },
    List { path: String },
    /// Create `dirname` inside `path`
    Mkdir { dirname: String, path: String },
    Rmdir { path: String },
    /// Rename the directory at `path` to `newname` (same parent)
    RenameDir { newname: String, path: String },
    Tree,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Upload { .. } => name::UPLOAD,
            Command::Download { .. } => name::DOWNLOAD,
            Command::DeleteFile { .. } => name::DELETE_FILE,
            Command::List { .. } => name::LIST,
            Command::Mkdir { .. } => name::MKDIR,
            Command::Rmdir { .. } => name::RMDIR,
            Command::RenameDir { .. } => name::RENAME_DIR,
            Command::Tree => name::TREE,
        }
    }

    /// String fields in wire order
    fn string_fields(&self) -> Vec<&str> {
        match self {
            Command::Upload { path, .. }
            | Command::Download { path }
            | Command::DeleteFile { path }
            | Command::List { path }
            | Command::Rmdir { path } => vec![path.as_str()],
            Command::Mkdir { dirname, path } => vec![dirname.as_str(), path.as_str()],
            Command::RenameDir { newname, path } => vec![newname.as_str(), path.as_str()],
            Command::Tree => vec![""],
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut w = WireWriter::new();
        w.put_cstr(self.name())?;
        for field in self.string_fields() {
            w.put_cstr(field)?;
        }
        if let Command::Upload { size, .. } = self {
            w.put_u32_be(*size);
        }
        Ok(w.finish())
    }

    pub fn to_packet(&self) -> Result<Packet> {
        Packet::new(packet_type::COMMAND, self.encode()?)
    }

    /// Decode a COMMAND packet. An unrecognised name is a protocol error.
    pub fn from_packet(packet: &Packet) -> Result<Self> {
        packet.expect_type(packet_type::COMMAND)?;
        Self::decode(packet.content())
    }

    /// Decode COMMAND packet content.
    pub fn decode(content: &[u8]) -> Result<Self> {
        let mut r = WireReader::new(content);
        let cmd = r.get_cstr()?;
        let command = match cmd.as_str() {
            name::UPLOAD => {
                let path = r.get_cstr()?;
                let size = r.get_u32_be()?;
                Command::Upload { path, size }
            }
            name::DOWNLOAD => Command::Download {
                path: r.get_cstr()?,
            },
            name::DELETE_FILE => Command::DeleteFile {
                path: r.get_cstr()?,
            },
            name::LIST => Command::List {
                path: r.get_cstr()?,
            },
            name::MKDIR => {
                let dirname = r.get_cstr()?;
                let path = r.get_cstr()?;
                Command::Mkdir { dirname, path }
            }
            name::RMDIR => Command::Rmdir {
                path: r.get_cstr()?,
            },
            name::RENAME_DIR => {
                let newname = r.get_cstr()?;
                let path = r.get_cstr()?;
                Command::RenameDir { newname, path }
            }
            name::TREE => Command::Tree,
            other => {
                return Err(LptfError::protocol(format!("unknown command {other:?}")));
            }
        };
        Ok(command)
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Upload { path, size } => write!(f, "{} {path:?} ({size} bytes)", self.name()),
            Command::Mkdir { dirname, path } | Command::RenameDir { newname: dirname, path } => {
                write!(f, "{} {path:?} {dirname:?}", self.name())
            }
            Command::Tree => f.write_str(self.name()),
            _ => write!(f, "{} {:?}", self.name(), self.string_fields()[0]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(c: Command) {
        let p = c.to_packet().unwrap();
        assert_eq!(Command::from_packet(&p).unwrap(), c);
    }

    #[test]
    fn every_command_round_trips() {
        round_trip(Command::Upload {
            path: "docs/report.pdf".into(),
            size: 20001,
        });
        round_trip(Command::Download { path: "a.txt".into() });
        round_trip(Command::DeleteFile { path: "".into() });
        round_trip(Command::List { path: "".into() });
        round_trip(Command::Mkdir {
            dirname: "new".into(),
            path: "parent/dir".into(),
        });
        round_trip(Command::Rmdir { path: "old".into() });
        round_trip(Command::RenameDir {
            newname: "b".into(),
            path: "x/a".into(),
        });
        round_trip(Command::Tree);
    }

    #[test]
    fn upload_layout_is_name_path_size() {
        let bytes = Command::Upload {
            path: "f".into(),
            size: 0x0102_0304,
        }
        .encode()
        .unwrap();
        assert_eq!(bytes, b"UPLOAD\0f\0\x01\x02\x03\x04");
    }

    #[test]
    fn tree_carries_an_empty_argument() {
        assert_eq!(Command::Tree.encode().unwrap(), b"TREE\0\0");
    }

    #[test]
    fn decode_reads_mkdir_fields_in_order() {
        assert_eq!(
            Command::decode(b"MKDIR\0photos\0trips/2024\0").unwrap(),
            Command::Mkdir {
                dirname: "photos".into(),
                path: "trips/2024".into()
            }
        );
    }

    #[test]
    fn unknown_command_is_a_protocol_error() {
        let p = Packet::new(packet_type::COMMAND, b"PS\0\0".to_vec()).unwrap();
        assert!(matches!(
            Command::from_packet(&p),
            Err(LptfError::Protocol(_))
        ));
    }

    #[test]
    fn upload_without_size_is_malformed() {
        let p = Packet::new(packet_type::COMMAND, b"UPLOAD\0f\0\x01".to_vec()).unwrap();
        assert!(matches!(
            Command::from_packet(&p),
            Err(LptfError::MalformedPacket(_))
        ));
    }

    #[test]
    fn non_command_packet_is_malformed() {
        let p = Packet::new(packet_type::MESSAGE, b"LIST\0\0".to_vec()).unwrap();
        assert!(matches!(
            Command::from_packet(&p),
            Err(LptfError::MalformedPacket(_))
        ));
    }
}
