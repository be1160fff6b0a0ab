//! Client verbs
//!
//! The protocol allows one command per connection, so every verb expects a
//! freshly logged-in stream and leaves it spent.

use crate::command::Command;
use crate::error::{LptfError, Result};
use crate::message::{self, DirectoryOp, Message};
use crate::net::{self, PacketStream};
use crate::progress::Progress;
use crate::protocol::{command as cmd_name, error_code, packet_type, status, MAX_CHUNK_BYTES};
use crate::transfer::{self, Termination, TransferSession};
use crate::url::ServerAddress;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::net::TcpStream;
use std::path::Path;

/// Outcome of one verb as shown to the user
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActionStatus {
    pub ok: bool,
    pub message: String,
}

impl ActionStatus {
    fn from_result(result: Result<String>) -> Self {
        match result {
            Ok(message) => Self { ok: true, message },
            Err(e) => Self {
                ok: false,
                message: e.to_string(),
            },
        }
    }
}

pub fn connect(addr: &ServerAddress) -> Result<TcpStream> {
    let stream = TcpStream::connect(addr.socket_addr())?;
    net::tune_socket(&stream);
    Ok(stream)
}

/// Text of a status reply, up to its terminating NUL.
fn status_text(content: &[u8]) -> String {
    let end = content.iter().position(|&b| b == 0).unwrap_or(content.len());
    String::from_utf8_lossy(&content[..end]).into_owned()
}

fn expect_ok<S: PacketStream + ?Sized>(stream: &mut S) -> Result<String> {
    let content = net::expect_reply(stream, packet_type::COMMAND)?;
    let text = status_text(&content);
    if text != status::OK {
        return Err(LptfError::protocol(format!("unexpected status {text:?}")));
    }
    Ok(text)
}

/// Run the login handshake. New users are registered with `password`.
pub fn login<S: PacketStream + ?Sized>(stream: &mut S, username: &str, password: &str) -> Result<()> {
    stream.write_packet(&message::build_login(username)?)?;
    match stream.read_message()? {
        Message::Reply { refers_to, content }
            if refers_to == packet_type::LOGIN && status_text(&content) == status::PASSWORD => {}
        Message::Text(t) if t == status::NEW_PASSWORD => {
            tracing::info!("registering new user {}", username);
        }
        Message::Error { message, .. } => return Err(LptfError::Auth(message)),
        other => {
            return Err(LptfError::protocol(format!(
                "unexpected login prompt {other:?}"
            )))
        }
    }
    stream.write_packet(&message::build_message(password)?)?;
    match net::expect_reply(stream, packet_type::LOGIN) {
        Ok(content) if status_text(&content) == status::OK => Ok(()),
        Ok(content) => Err(LptfError::Auth(status_text(&content))),
        Err(LptfError::Remote { message, .. }) => Err(LptfError::Auth(message)),
        Err(e) => Err(e),
    }
}

/// Fetch `remotepath` into `outpath`. A failed download removes `outpath`.
pub fn download<S: PacketStream + ?Sized>(
    stream: &mut S,
    outpath: &Path,
    remotepath: &str,
    progress: &dyn Progress,
) -> ActionStatus {
    ActionStatus::from_result(try_download(stream, outpath, remotepath, progress))
}

fn try_download<S: PacketStream + ?Sized>(
    stream: &mut S,
    outpath: &Path,
    remotepath: &str,
    progress: &dyn Progress,
) -> Result<String> {
    stream.write_packet(&message::build_download_request(remotepath)?)?;
    let content = net::expect_reply(stream, packet_type::COMMAND)?;
    let size: [u8; 4] = content
        .as_slice()
        .try_into()
        .map_err(|_| LptfError::malformed(format!("file size reply of {} bytes", content.len())))?;
    let size = u32::from_be_bytes(size) as u64;

    let file = match File::create(outpath) {
        Ok(f) => f,
        Err(e) => {
            stream.send_error(packet_type::BINARY_PART, error_code::CMD_FAILURE, &e.to_string());
            return Err(e.into());
        }
    };
    let mut writer = BufWriter::new(file);
    let mut session = TransferSession::new(Termination::Sized(size), MAX_CHUNK_BYTES)?;
    let result = transfer::receive_stream(stream, &mut writer, &mut session, progress);
    drop(writer);
    match result {
        Ok(n) => Ok(format!("downloaded {remotepath} ({n} bytes)")),
        Err(e) => {
            if let Err(rm) = fs::remove_file(outpath) {
                tracing::warn!("could not remove partial {}: {}", outpath.display(), rm);
            }
            Err(e)
        }
    }
}

/// Send `localpath` to the server as `remotename`.
pub fn upload<S: PacketStream + ?Sized>(
    stream: &mut S,
    remotename: &str,
    localpath: &Path,
    progress: &dyn Progress,
) -> ActionStatus {
    ActionStatus::from_result(try_upload(stream, remotename, localpath, progress))
}

fn try_upload<S: PacketStream + ?Sized>(
    stream: &mut S,
    remotename: &str,
    localpath: &Path,
    progress: &dyn Progress,
) -> Result<String> {
    let file = File::open(localpath)?;
    let len = file.metadata()?.len();
    let size = u32::try_from(len).map_err(|_| {
        LptfError::protocol(format!(
            "{} is {len} bytes; the protocol carries at most {} per file",
            localpath.display(),
            u32::MAX
        ))
    })?;

    stream.write_packet(&message::build_upload_request(remotename, size)?)?;
    expect_ok(stream)?;

    let mut reader = BufReader::new(file);
    let mut session = TransferSession::new(Termination::Sized(size as u64), MAX_CHUNK_BYTES)?;
    let n = transfer::send_stream(stream, &mut reader, &mut session, progress)?;
    Ok(format!("uploaded {remotename} ({n} bytes)"))
}

pub fn delete<S: PacketStream + ?Sized>(stream: &mut S, remotepath: &str) -> ActionStatus {
    ActionStatus::from_result((|| -> Result<String> {
        stream.write_packet(&message::build_command(cmd_name::DELETE_FILE, remotepath)?)?;
        expect_ok(stream)
    })())
}

/// Listing text of a remote directory (`(empty)` if it has no entries).
pub fn list<S: PacketStream + ?Sized>(stream: &mut S, path: &str) -> ActionStatus {
    ActionStatus::from_result((|| -> Result<String> {
        let cmd = Command::List {
            path: path.to_string(),
        };
        stream.write_packet(&cmd.to_packet()?)?;
        let content = net::expect_reply(stream, packet_type::COMMAND)?;
        Ok(status_text(&content))
    })())
}

pub fn mkdir<S: PacketStream + ?Sized>(stream: &mut S, name: &str, parent: &str) -> ActionStatus {
    ActionStatus::from_result(directory_request(
        stream,
        DirectoryOp::Create,
        parent,
        Some(name),
    ))
}

pub fn rmdir<S: PacketStream + ?Sized>(stream: &mut S, path: &str) -> ActionStatus {
    ActionStatus::from_result(directory_request(stream, DirectoryOp::Remove, path, None))
}

pub fn rename<S: PacketStream + ?Sized>(stream: &mut S, path: &str, newname: &str) -> ActionStatus {
    ActionStatus::from_result(directory_request(
        stream,
        DirectoryOp::Rename,
        path,
        Some(newname),
    ))
}

/// Every path under the user root, one per line.
pub fn tree<S: PacketStream + ?Sized>(stream: &mut S) -> ActionStatus {
    ActionStatus::from_result((|| -> Result<String> {
        stream.write_packet(&Command::Tree.to_packet()?)?;
        let mut listing = Vec::new();
        let mut session = TransferSession::new(Termination::ShortChunk, MAX_CHUNK_BYTES)?;
        transfer::receive_stream(
            stream,
            &mut listing,
            &mut session,
            &crate::progress::NoProgress,
        )?;
        Ok(String::from_utf8_lossy(&listing).into_owned())
    })())
}

/// MKDIR, RMDIR and RNDIR are all answered by a single OK.
fn directory_request<S: PacketStream + ?Sized>(
    stream: &mut S,
    op: DirectoryOp,
    path: &str,
    name: Option<&str>,
) -> Result<String> {
    stream.write_packet(&message::build_directory_request(op, path, name)?)?;
    expect_ok(stream)
}
