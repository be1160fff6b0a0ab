//! Message builders and parsers built on the frame codec
//!
//! Each `build_*` has a matching `parse_*`. Every parser checks the packet
//! type first and fails with `MalformedPacket` when it does not match, so
//! callers never reinterpret a payload meant for another message.
//! [`Message`] is the single decode entry point used by the state machines.

use crate::command::Command;
use crate::error::{LptfError, Result};
use crate::packet::Packet;
use crate::protocol::{command as cmd_name, packet_type, status};
use crate::wire::{WireReader, WireWriter};

/// One decoded packet
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Message {
    Login { username: String },
    Text(String),
    Command(Command),
    Reply { refers_to: u8, content: Vec<u8> },
    Chunk(Vec<u8>),
    Error { refers_to: u8, code: u8, message: String },
}

impl Message {
    pub fn from_packet(packet: &Packet) -> Result<Self> {
        Ok(match packet.packet_type() {
            packet_type::LOGIN => Message::Login {
                username: parse_login(packet)?,
            },
            packet_type::MESSAGE => Message::Text(parse_message(packet)?),
            packet_type::COMMAND => Message::Command(Command::from_packet(packet)?),
            packet_type::REPLY => Message::Reply {
                refers_to: parse_reply_refers_to(packet)?,
                content: parse_reply_content(packet)?.to_vec(),
            },
            packet_type::BINARY_PART => Message::Chunk(parse_chunk(packet)?.to_vec()),
            packet_type::ERROR => Message::Error {
                refers_to: parse_error_refers_to(packet)?,
                code: parse_error_code(packet)?,
                message: parse_error_message(packet)?,
            },
            other => {
                return Err(LptfError::protocol(format!(
                    "unsupported packet type {} ({other})",
                    packet_type::name(other)
                )))
            }
        })
    }

    pub fn to_packet(&self) -> Result<Packet> {
        match self {
            Message::Login { username } => build_login(username),
            Message::Text(text) => build_message(text),
            Message::Command(c) => c.to_packet(),
            Message::Reply { refers_to, content } => build_reply(*refers_to, content),
            Message::Chunk(data) => build_chunk(data),
            Message::Error {
                refers_to,
                code,
                message,
            } => build_error(*refers_to, *code, message),
        }
    }

    /// Turn an ERROR message into the matching error value.
    pub fn into_remote_error(self) -> Option<LptfError> {
        match self {
            Message::Error {
                refers_to,
                code,
                message,
            } => Some(LptfError::Remote {
                refers_to,
                code,
                message,
            }),
            _ => None,
        }
    }
}

// LOGIN: raw username bytes

pub fn build_login(username: &str) -> Result<Packet> {
    if username.as_bytes().contains(&0) {
        return Err(LptfError::malformed("username contains NUL"));
    }
    Packet::new(packet_type::LOGIN, username.as_bytes().to_vec())
}

pub fn parse_login(packet: &Packet) -> Result<String> {
    packet.expect_type(packet_type::LOGIN)?;
    WireReader::new(packet.content()).get_cstr()
}

// MESSAGE: one NUL-terminated string

pub fn build_message(text: &str) -> Result<Packet> {
    let mut w = WireWriter::new();
    w.put_cstr(text)?;
    Packet::new(packet_type::MESSAGE, w.finish())
}

pub fn parse_message(packet: &Packet) -> Result<String> {
    packet.expect_type(packet_type::MESSAGE)?;
    WireReader::new(packet.content()).get_cstr()
}

// COMMAND: generic name + single argument form

pub fn build_command(name: &str, arg: &str) -> Result<Packet> {
    let mut w = WireWriter::new();
    w.put_cstr(name)?.put_cstr(arg)?;
    Packet::new(packet_type::COMMAND, w.finish())
}

pub fn parse_command_name(packet: &Packet) -> Result<String> {
    packet.expect_type(packet_type::COMMAND)?;
    WireReader::new(packet.content()).get_cstr()
}

pub fn parse_command_arg(packet: &Packet) -> Result<String> {
    packet.expect_type(packet_type::COMMAND)?;
    let mut r = WireReader::new(packet.content());
    r.get_cstr()?;
    r.get_cstr()
}

// REPLY: refers-to type byte + content

pub fn build_reply(refers_to: u8, content: &[u8]) -> Result<Packet> {
    let mut w = WireWriter::new();
    w.put_u8(refers_to).put_bytes(content);
    Packet::new(packet_type::REPLY, w.finish())
}

/// Reply whose content is a NUL-terminated status string such as `"OK"`.
pub fn build_status_reply(refers_to: u8, text: &str) -> Result<Packet> {
    let mut w = WireWriter::new();
    w.put_u8(refers_to).put_cstr(text)?;
    Packet::new(packet_type::REPLY, w.finish())
}

pub fn parse_reply_refers_to(packet: &Packet) -> Result<u8> {
    packet.expect_type(packet_type::REPLY)?;
    WireReader::new(packet.content()).get_u8()
}

pub fn parse_reply_content(packet: &Packet) -> Result<&[u8]> {
    packet.expect_type(packet_type::REPLY)?;
    let mut r = WireReader::new(packet.content());
    r.get_u8()?;
    Ok(r.rest())
}

pub fn parse_reply_status(packet: &Packet) -> Result<String> {
    packet.expect_type(packet_type::REPLY)?;
    let mut r = WireReader::new(packet.content());
    r.get_u8()?;
    r.get_cstr()
}

// ERROR: refers-to type byte + code byte + NUL-terminated message

pub fn build_error(refers_to: u8, code: u8, message: &str) -> Result<Packet> {
    let mut w = WireWriter::new();
    // a message carrying NUL is truncated rather than refused; errors must always be sendable
    let message = message.split('\0').next().unwrap_or_default();
    w.put_u8(refers_to).put_u8(code).put_cstr(message)?;
    Packet::new(packet_type::ERROR, w.finish())
}

/// Error packet describing a local failure.
pub fn build_error_from(refers_to: u8, err: &LptfError) -> Result<Packet> {
    build_error(refers_to, err.error_code(), &err.to_string())
}

pub fn parse_error_refers_to(packet: &Packet) -> Result<u8> {
    packet.expect_type(packet_type::ERROR)?;
    WireReader::new(packet.content()).get_u8()
}

pub fn parse_error_code(packet: &Packet) -> Result<u8> {
    packet.expect_type(packet_type::ERROR)?;
    let mut r = WireReader::new(packet.content());
    r.get_u8()?;
    r.get_u8()
}

pub fn parse_error_message(packet: &Packet) -> Result<String> {
    packet.expect_type(packet_type::ERROR)?;
    let mut r = WireReader::new(packet.content());
    r.get_u8()?;
    r.get_u8()?;
    r.get_cstr()
}

pub fn parse_error(packet: &Packet) -> Result<LptfError> {
    Ok(LptfError::Remote {
        refers_to: parse_error_refers_to(packet)?,
        code: parse_error_code(packet)?,
        message: parse_error_message(packet)?,
    })
}

// File transfer requests

pub fn build_upload_request(path: &str, filesize: u32) -> Result<Packet> {
    Command::Upload {
        path: path.to_string(),
        size: filesize,
    }
    .to_packet()
}

pub fn parse_upload_request(packet: &Packet) -> Result<(String, u32)> {
    match Command::from_packet(packet)? {
        Command::Upload { path, size } => Ok((path, size)),
        other => Err(LptfError::malformed(format!(
            "expected {} command, got {}",
            cmd_name::UPLOAD,
            other.name()
        ))),
    }
}

pub fn build_download_request(path: &str) -> Result<Packet> {
    build_command(cmd_name::DOWNLOAD, path)
}

pub fn parse_download_request(packet: &Packet) -> Result<String> {
    match Command::from_packet(packet)? {
        Command::Download { path } => Ok(path),
        other => Err(LptfError::malformed(format!(
            "expected {} command, got {}",
            cmd_name::DOWNLOAD,
            other.name()
        ))),
    }
}

/// Download accepted: 4-byte network-order file size
pub fn build_file_size_reply(size: u32) -> Result<Packet> {
    build_reply(packet_type::COMMAND, &size.to_be_bytes())
}

pub fn parse_file_size_reply(packet: &Packet) -> Result<u32> {
    packet.expect_type(packet_type::REPLY)?;
    let mut r = WireReader::new(packet.content());
    r.get_u8()?;
    r.get_u32_be()
}

// Directory requests

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DirectoryOp {
    Create,
    Remove,
    Rename,
}

/// `name` is the new directory's name for `Create` and the new name for
/// `Rename`; `Remove` takes none.
pub fn build_directory_request(op: DirectoryOp, path: &str, name: Option<&str>) -> Result<Packet> {
    let command = match (op, name) {
        (DirectoryOp::Create, Some(dirname)) => Command::Mkdir {
            dirname: dirname.to_string(),
            path: path.to_string(),
        },
        (DirectoryOp::Remove, None) => Command::Rmdir {
            path: path.to_string(),
        },
        (DirectoryOp::Rename, Some(newname)) => Command::RenameDir {
            newname: newname.to_string(),
            path: path.to_string(),
        },
        (op, name) => {
            return Err(LptfError::malformed(format!(
                "{op:?} directory request with name {name:?}"
            )))
        }
    };
    command.to_packet()
}

pub fn parse_directory_request(packet: &Packet) -> Result<Command> {
    match Command::from_packet(packet)? {
        c @ (Command::Mkdir { .. } | Command::Rmdir { .. } | Command::RenameDir { .. }) => Ok(c),
        other => Err(LptfError::malformed(format!(
            "{} is not a directory command",
            other.name()
        ))),
    }
}

// Chunks and acknowledgements

pub fn build_chunk(data: &[u8]) -> Result<Packet> {
    Packet::new(packet_type::BINARY_PART, data.to_vec())
}

pub fn parse_chunk(packet: &Packet) -> Result<&[u8]> {
    packet.expect_type(packet_type::BINARY_PART)?;
    Ok(packet.content())
}

pub fn build_ack() -> Result<Packet> {
    build_reply(packet_type::BINARY_PART, &[status::ACK])
}

pub fn is_ack(packet: &Packet) -> bool {
    packet.packet_type() == packet_type::REPLY
        && matches!(parse_reply_refers_to(packet), Ok(packet_type::BINARY_PART))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{error_code, MAX_CONTENT_LEN};

    #[test]
    fn login_round_trip() {
        for name in ["", "alice", "Ünïcode"] {
            assert_eq!(parse_login(&build_login(name).unwrap()).unwrap(), name);
        }
        assert!(build_login("a\0b").is_err());
    }

    #[test]
    fn message_round_trip_up_to_the_ceiling() {
        let longest = "m".repeat(MAX_CONTENT_LEN - 1);
        for text in ["", "secret", longest.as_str()] {
            let p = build_message(text).unwrap();
            assert_eq!(parse_message(&p).unwrap(), text);
        }
        assert!(build_message(&"m".repeat(MAX_CONTENT_LEN)).is_err());
    }

    #[test]
    fn command_name_and_arg() {
        let p = build_command("LIST", "some/dir").unwrap();
        assert_eq!(parse_command_name(&p).unwrap(), "LIST");
        assert_eq!(parse_command_arg(&p).unwrap(), "some/dir");

        let p = build_command("LIST", "").unwrap();
        assert_eq!(parse_command_arg(&p).unwrap(), "");
    }

    #[test]
    fn command_without_final_nul_is_terminated_for_callers() {
        let p = Packet::new(packet_type::COMMAND, b"RMFILE\0notes.txt".to_vec()).unwrap();
        assert_eq!(parse_command_arg(&p).unwrap(), "notes.txt");
        // frame is not mutated
        assert_eq!(p.content().last(), Some(&b't'));
    }

    #[test]
    fn reply_round_trip() {
        let p = build_status_reply(packet_type::COMMAND, status::OK).unwrap();
        assert_eq!(parse_reply_refers_to(&p).unwrap(), packet_type::COMMAND);
        assert_eq!(parse_reply_status(&p).unwrap(), "OK");
        assert_eq!(parse_reply_content(&p).unwrap(), b"OK\0");

        let p = build_reply(packet_type::LOGIN, &[]).unwrap();
        assert_eq!(parse_reply_content(&p).unwrap(), b"");
    }

    #[test]
    fn error_round_trip() {
        let p = build_error(packet_type::COMMAND, error_code::CMD_FAILURE, "The file doesn't exist.")
            .unwrap();
        assert_eq!(parse_error_refers_to(&p).unwrap(), packet_type::COMMAND);
        assert_eq!(parse_error_code(&p).unwrap(), error_code::CMD_FAILURE);
        assert_eq!(parse_error_message(&p).unwrap(), "The file doesn't exist.");
        match parse_error(&p).unwrap() {
            LptfError::Remote { code, .. } => assert_eq!(code, error_code::CMD_FAILURE),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn upload_and_download_requests() {
        let p = build_upload_request("dir/file.bin", u32::MAX).unwrap();
        assert_eq!(
            parse_upload_request(&p).unwrap(),
            ("dir/file.bin".to_string(), u32::MAX)
        );
        assert!(parse_download_request(&p).is_err());

        let p = build_download_request("dir/file.bin").unwrap();
        assert_eq!(parse_download_request(&p).unwrap(), "dir/file.bin");

        let p = build_file_size_reply(20001).unwrap();
        assert_eq!(parse_file_size_reply(&p).unwrap(), 20001);
        assert_eq!(&p.content()[1..], &20001u32.to_be_bytes());
    }

    #[test]
    fn directory_requests() {
        let p = build_directory_request(DirectoryOp::Create, "parent", Some("child")).unwrap();
        assert_eq!(
            parse_directory_request(&p).unwrap(),
            Command::Mkdir {
                dirname: "child".into(),
                path: "parent".into()
            }
        );
        let p = build_directory_request(DirectoryOp::Rename, "a/b", Some("c")).unwrap();
        assert_eq!(
            parse_directory_request(&p).unwrap(),
            Command::RenameDir {
                newname: "c".into(),
                path: "a/b".into()
            }
        );
        let p = build_directory_request(DirectoryOp::Remove, "a", None).unwrap();
        assert_eq!(
            parse_directory_request(&p).unwrap(),
            Command::Rmdir { path: "a".into() }
        );
        assert!(build_directory_request(DirectoryOp::Create, "a", None).is_err());
        assert!(parse_directory_request(&build_download_request("x").unwrap()).is_err());
    }

    #[test]
    fn parsers_reject_the_wrong_type() {
        let chunk = build_chunk(b"data").unwrap();
        assert!(matches!(parse_message(&chunk), Err(LptfError::MalformedPacket(_))));
        assert!(matches!(parse_reply_refers_to(&chunk), Err(LptfError::MalformedPacket(_))));
        assert!(matches!(parse_error_code(&chunk), Err(LptfError::MalformedPacket(_))));
        assert!(matches!(parse_login(&chunk), Err(LptfError::MalformedPacket(_))));
        assert_eq!(parse_chunk(&chunk).unwrap(), b"data");
    }

    #[test]
    fn ack_is_a_one_byte_reply_to_binary_part() {
        let ack = build_ack().unwrap();
        assert!(is_ack(&ack));
        assert_eq!(ack.content(), &[packet_type::BINARY_PART, status::ACK]);
        assert!(!is_ack(&build_status_reply(packet_type::COMMAND, "OK").unwrap()));
    }

    #[test]
    fn message_enum_round_trips() {
        let all = vec![
            Message::Login {
                username: "bob".into(),
            },
            Message::Text("pw".into()),
            Message::Command(Command::Tree),
            Message::Reply {
                refers_to: packet_type::LOGIN,
                content: b"OK\0".to_vec(),
            },
            Message::Chunk(vec![1, 2, 3]),
            Message::Error {
                refers_to: packet_type::COMMAND,
                code: error_code::CMD_UNKNOWN,
                message: "Not Implemented".into(),
            },
        ];
        for m in all {
            let p = m.to_packet().unwrap();
            assert_eq!(Message::from_packet(&p).unwrap(), m);
        }
    }

    #[test]
    fn unknown_type_is_a_protocol_error() {
        let p = Packet::new(packet_type::FILE_PART, vec![]).unwrap();
        assert!(matches!(Message::from_packet(&p), Err(LptfError::Protocol(_))));
    }
}
