//! Server-side command actions
//!
//! Each action validates its paths against the user's sandbox first. Any
//! failure before data moves is answered with exactly one
//! `ERROR(COMMAND, ..)`; failures during a transfer are reported by the
//! transfer engine itself.

use crate::command::Command;
use crate::error::{LptfError, Result};
use crate::fs_enum;
use crate::logger::Logger;
use crate::message;
use crate::net::PacketStream;
use crate::progress::NoProgress;
use crate::protocol::{packet_type, status, MAX_CHUNK_BYTES};
use crate::sandbox::{self, Sandbox};
use crate::transfer::{self, Termination, TransferSession};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Cursor};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Everything an action needs to know about the logged-in user.
pub struct UserSession<'a> {
    pub username: String,
    pub root: PathBuf,
    pub sandbox: &'a Sandbox,
    pub logger: &'a dyn Logger,
}

impl UserSession<'_> {
    fn resolve(&self, rel: &str, required: bool) -> Result<PathBuf> {
        self.sandbox.resolve(&self.root, rel, required)
    }

    fn display(&self, path: &Path) -> String {
        match path.strip_prefix(&self.root) {
            Ok(rel) if rel.as_os_str().is_empty() => "/".to_string(),
            Ok(rel) => rel.display().to_string(),
            Err(_) => path.display().to_string(),
        }
    }
}

fn failure(kind: io::ErrorKind, msg: &str) -> LptfError {
    LptfError::Io(io::Error::new(kind, msg.to_string()))
}

/// Answer the command with one ERROR packet and hand the error back.
fn reject<S: PacketStream + ?Sized>(stream: &mut S, err: LptfError) -> LptfError {
    stream.send_error(packet_type::COMMAND, err.error_code(), &err.to_string());
    err
}

/// Run one command to completion.
pub fn execute<S: PacketStream + ?Sized>(
    stream: &mut S,
    session: &UserSession<'_>,
    command: &Command,
) -> Result<()> {
    session.logger.command(&session.username, &command.to_string());
    let result = match command {
        Command::Download { path } => send_file(stream, session, path),
        Command::Upload { path, size } => receive_file(stream, session, path, *size),
        Command::DeleteFile { path } => delete_file(stream, session, path),
        Command::List { path } => list_directory(stream, session, path),
        Command::Mkdir { dirname, path } => make_directory(stream, session, path, dirname),
        Command::Rmdir { path } => remove_directory(stream, session, path),
        Command::RenameDir { newname, path } => rename_directory(stream, session, path, newname),
        Command::Tree => send_tree(stream, session),
    };
    if let Err(e) = &result {
        session
            .logger
            .error(&session.username, command.name(), &e.to_string());
    }
    result
}

/// DOWNLOAD: reply with the size, then stream the file.
pub fn send_file<S: PacketStream + ?Sized>(
    stream: &mut S,
    session: &UserSession<'_>,
    rel: &str,
) -> Result<()> {
    let prepared = (|| -> Result<(PathBuf, File, u32)> {
        let path = session.resolve(rel, true)?;
        let size = fs_enum::get_file_size(&path)
            .map_err(|_| failure(io::ErrorKind::NotFound, "The file doesn't exist."))?;
        let size = u32::try_from(size)
            .map_err(|_| failure(io::ErrorKind::InvalidData, "The file is too large."))?;
        let file = File::open(&path)?;
        Ok((path, file, size))
    })();
    let (path, file, size) = prepared.map_err(|e| reject(stream, e))?;

    stream.write_packet(&message::build_file_size_reply(size)?)?;

    let started = Instant::now();
    let mut xfer = TransferSession::new(Termination::Sized(size as u64), MAX_CHUNK_BYTES)?;
    let mut reader = BufReader::new(file);
    let sent = transfer::send_stream(stream, &mut reader, &mut xfer, &NoProgress)?;
    session.logger.transfer(
        &session.username,
        Path::new(&session.display(&path)),
        sent,
        started.elapsed().as_secs_f64(),
    );
    tracing::info!("{} downloaded {} ({} bytes)", session.username, session.display(&path), sent);
    Ok(())
}

/// UPLOAD: accept with OK, then receive exactly `size` bytes.
///
/// A failed upload leaves the partial file in place.
pub fn receive_file<S: PacketStream + ?Sized>(
    stream: &mut S,
    session: &UserSession<'_>,
    rel: &str,
    size: u32,
) -> Result<()> {
    let prepared = (|| -> Result<(PathBuf, File)> {
        let path = session.resolve(rel, true)?;
        if path.is_dir() {
            return Err(failure(
                io::ErrorKind::AlreadyExists,
                "A directory with that name exists.",
            ));
        }
        let file = File::create(&path)
            .map_err(|_| failure(io::ErrorKind::Other, "Could not create file."))?;
        Ok((path, file))
    })();
    let (path, file) = prepared.map_err(|e| reject(stream, e))?;

    stream.write_packet(&message::build_status_reply(packet_type::COMMAND, status::OK)?)?;

    let started = Instant::now();
    let mut xfer = TransferSession::new(Termination::Sized(size as u64), MAX_CHUNK_BYTES)?;
    let mut writer = BufWriter::new(file);
    let received = transfer::receive_stream(stream, &mut writer, &mut xfer, &NoProgress)?;
    session.logger.transfer(
        &session.username,
        Path::new(&session.display(&path)),
        received,
        started.elapsed().as_secs_f64(),
    );
    tracing::info!("{} uploaded {} ({} bytes)", session.username, session.display(&path), received);
    Ok(())
}

/// RMFILE: regular files only.
pub fn delete_file<S: PacketStream + ?Sized>(
    stream: &mut S,
    session: &UserSession<'_>,
    rel: &str,
) -> Result<()> {
    let done = (|| -> Result<PathBuf> {
        let path = session.resolve(rel, true)?;
        if !path.is_file() {
            return Err(failure(io::ErrorKind::NotFound, "The file doesn't exist."));
        }
        fs::remove_file(&path)
            .map_err(|_| failure(io::ErrorKind::Other, "The file could not be removed."))?;
        Ok(path)
    })();
    let path = done.map_err(|e| reject(stream, e))?;
    stream.write_packet(&message::build_status_reply(packet_type::COMMAND, status::OK)?)?;
    tracing::info!("{} deleted {}", session.username, session.display(&path));
    Ok(())
}

/// LIST: one reply carrying the listing text, `(empty)` for an empty directory.
pub fn list_directory<S: PacketStream + ?Sized>(
    stream: &mut S,
    session: &UserSession<'_>,
    rel: &str,
) -> Result<()> {
    let built = (|| -> Result<crate::packet::Packet> {
        let path = session.resolve(rel, false)?;
        if !path.is_dir() {
            return Err(failure(io::ErrorKind::NotFound, "The folder doesn't exist."));
        }
        let listing = fs_enum::list_directory_content(&path)?;
        message::build_reply(packet_type::COMMAND, listing.as_bytes()).map_err(|_| {
            failure(
                io::ErrorKind::InvalidData,
                "The listing is too large for one reply, use TREE.",
            )
        })
    })();
    let reply = built.map_err(|e| reject(stream, e))?;
    stream.write_packet(&reply)?;
    Ok(())
}

/// MKDIR: create `dirname` inside the existing directory `parent`.
pub fn make_directory<S: PacketStream + ?Sized>(
    stream: &mut S,
    session: &UserSession<'_>,
    parent: &str,
    dirname: &str,
) -> Result<()> {
    let done = (|| -> Result<PathBuf> {
        sandbox::validate_target_name(dirname)?;
        let parent = session.resolve(parent, false)?;
        if !parent.is_dir() {
            return Err(failure(io::ErrorKind::NotFound, "The parent folder doesn't exist."));
        }
        let target = parent.join(dirname);
        if !sandbox::is_contained(&target, &session.root) {
            return Err(LptfError::SandboxViolation(dirname.to_string()));
        }
        if target.exists() {
            return Err(failure(io::ErrorKind::AlreadyExists, "The folder already exists."));
        }
        fs::create_dir(&target)?;
        Ok(target)
    })();
    let target = done.map_err(|e| reject(stream, e))?;
    stream.write_packet(&message::build_status_reply(packet_type::COMMAND, status::OK)?)?;
    tracing::info!("{} created {}", session.username, session.display(&target));
    Ok(())
}

/// RMDIR: remove a directory and everything below it. The root itself is refused.
pub fn remove_directory<S: PacketStream + ?Sized>(
    stream: &mut S,
    session: &UserSession<'_>,
    rel: &str,
) -> Result<()> {
    let done = (|| -> Result<PathBuf> {
        let path = session.resolve(rel, true)?;
        if sandbox::is_root(&path, &session.root) {
            return Err(LptfError::SandboxViolation("cannot remove the user root".into()));
        }
        if !path.is_dir() {
            return Err(failure(io::ErrorKind::NotFound, "The folder doesn't exist."));
        }
        fs::remove_dir_all(&path)
            .map_err(|_| failure(io::ErrorKind::Other, "The folder could not be removed."))?;
        Ok(path)
    })();
    let path = done.map_err(|e| reject(stream, e))?;
    stream.write_packet(&message::build_status_reply(packet_type::COMMAND, status::OK)?)?;
    tracing::info!("{} removed {}", session.username, session.display(&path));
    Ok(())
}

/// RNDIR: rename a directory in place (same parent).
pub fn rename_directory<S: PacketStream + ?Sized>(
    stream: &mut S,
    session: &UserSession<'_>,
    rel: &str,
    newname: &str,
) -> Result<()> {
    let done = (|| -> Result<PathBuf> {
        sandbox::validate_target_name(newname)?;
        let path = session.resolve(rel, true)?;
        if sandbox::is_root(&path, &session.root) {
            return Err(LptfError::SandboxViolation("cannot rename the user root".into()));
        }
        if !path.is_dir() {
            return Err(failure(io::ErrorKind::NotFound, "The folder doesn't exist."));
        }
        let parent = path
            .parent()
            .ok_or_else(|| LptfError::SandboxViolation(rel.to_string()))?;
        let dest = parent.join(newname);
        if !sandbox::is_contained(&dest, &session.root) {
            return Err(LptfError::SandboxViolation(newname.to_string()));
        }
        if dest.exists() {
            return Err(failure(io::ErrorKind::AlreadyExists, "The target name is taken."));
        }
        fs::rename(&path, &dest)?;
        Ok(dest)
    })();
    let dest = done.map_err(|e| reject(stream, e))?;
    stream.write_packet(&message::build_status_reply(packet_type::COMMAND, status::OK)?)?;
    tracing::info!("{} renamed {} to {}", session.username, rel, session.display(&dest));
    Ok(())
}

/// TREE: stream the whole user root; no reply precedes the chunks.
pub fn send_tree<S: PacketStream + ?Sized>(stream: &mut S, session: &UserSession<'_>) -> Result<()> {
    let listing = fs_enum::tree_listing(&session.root).map_err(|e| reject(stream, e))?;
    let mut xfer = TransferSession::new(Termination::ShortChunk, MAX_CHUNK_BYTES)?;
    let mut source = Cursor::new(listing.into_bytes());
    transfer::send_stream(stream, &mut source, &mut xfer, &NoProgress)?;
    tracing::debug!(
        "{} tree sent in {} chunks",
        session.username,
        xfer.chunks()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::NoopLogger;
    use crate::message::Message;
    use crate::packet::Packet;
    use crate::protocol::error_code;
    use std::collections::VecDeque;
    use tempfile::TempDir;

    /// Peer that acks every chunk and records everything it receives.
    #[derive(Default)]
    struct Recorder {
        inbound: VecDeque<Packet>,
        sent: Vec<Packet>,
    }

    impl PacketStream for Recorder {
        fn read_packet(&mut self) -> Result<Packet> {
            if let Some(p) = self.inbound.pop_front() {
                return Ok(p);
            }
            match self.sent.last() {
                Some(p) if p.packet_type() == packet_type::BINARY_PART => message::build_ack(),
                _ => Err(LptfError::Io(io::ErrorKind::UnexpectedEof.into())),
            }
        }
        fn write_packet(&mut self, packet: &Packet) -> Result<()> {
            self.sent.push(packet.clone());
            Ok(())
        }
    }

    fn with_session<F: FnOnce(&UserSession<'_>)>(f: F) -> TempDir {
        let tmp = TempDir::new().unwrap();
        let sandbox = Sandbox::new(tmp.path()).unwrap();
        let root = sandbox.root_for("alice").unwrap();
        let session = UserSession {
            username: "alice".into(),
            root,
            sandbox: &sandbox,
            logger: &NoopLogger,
        };
        f(&session);
        tmp
    }

    fn only_error(sent: &[Packet]) -> (u8, u8) {
        assert_eq!(sent.len(), 1, "expected exactly one packet, got {sent:?}");
        match Message::from_packet(&sent[0]).unwrap() {
            Message::Error {
                refers_to, code, ..
            } => (refers_to, code),
            other => panic!("expected error, got {other:?}"),
        }
    }

    fn ok_status(sent: &[Packet]) {
        assert_eq!(sent.len(), 1);
        assert_eq!(message::parse_reply_status(&sent[0]).unwrap(), "OK");
    }

    #[test]
    fn traversal_delete_is_rejected_without_mutation() {
        let tmp = TempDir::new().unwrap();
        let victim = tmp.path().join("victim.txt");
        fs::write(&victim, b"keep").unwrap();
        let sandbox = Sandbox::new(&tmp.path().join("srv")).unwrap();
        let session = UserSession {
            username: "alice".into(),
            root: sandbox.root_for("alice").unwrap(),
            sandbox: &sandbox,
            logger: &NoopLogger,
        };
        let mut peer = Recorder::default();
        let err = delete_file(&mut peer, &session, "../../victim.txt").unwrap_err();
        assert!(matches!(err, LptfError::SandboxViolation(_)));
        assert_eq!(
            only_error(&peer.sent),
            (packet_type::COMMAND, error_code::CMD_FAILURE)
        );
        assert!(victim.exists());
    }

    #[test]
    fn download_replies_size_then_streams_chunks() {
        with_session(|s| {
            fs::write(s.root.join("a.bin"), vec![5u8; 20001]).unwrap();
            let mut peer = Recorder::default();
            send_file(&mut peer, s, "a.bin").unwrap();
            assert_eq!(message::parse_file_size_reply(&peer.sent[0]).unwrap(), 20001);
            let sizes: Vec<_> = peer.sent[1..].iter().map(|p| p.len()).collect();
            assert_eq!(sizes, vec![8000, 8000, 4001]);
        });
    }

    #[test]
    fn download_of_missing_file_is_one_error() {
        with_session(|s| {
            let mut peer = Recorder::default();
            assert!(send_file(&mut peer, s, "nope.txt").is_err());
            assert_eq!(
                only_error(&peer.sent),
                (packet_type::COMMAND, error_code::CMD_FAILURE)
            );
        });
    }

    #[test]
    fn upload_accepts_then_writes_all_bytes() {
        with_session(|s| {
            let mut peer = Recorder::default();
            peer.inbound.push_back(message::build_chunk(&[1u8; 8000]).unwrap());
            peer.inbound.push_back(message::build_chunk(&[2u8; 10]).unwrap());
            receive_file(&mut peer, s, "up.bin", 8010).unwrap();
            assert_eq!(message::parse_reply_status(&peer.sent[0]).unwrap(), "OK");
            assert!(peer.sent[1..].iter().all(message::is_ack));
            assert_eq!(fs::read(s.root.join("up.bin")).unwrap().len(), 8010);
        });
    }

    #[test]
    fn upload_into_missing_directory_is_rejected() {
        with_session(|s| {
            let mut peer = Recorder::default();
            assert!(receive_file(&mut peer, s, "no/such/dir/f", 3).is_err());
            only_error(&peer.sent);
        });
    }

    #[test]
    fn empty_listing_is_the_empty_marker() {
        with_session(|s| {
            let mut peer = Recorder::default();
            list_directory(&mut peer, s, "").unwrap();
            assert_eq!(
                message::parse_reply_content(&peer.sent[0]).unwrap(),
                b"(empty)"
            );
        });
    }

    #[test]
    fn directory_lifecycle() {
        with_session(|s| {
            let mut peer = Recorder::default();
            make_directory(&mut peer, s, "", "photos").unwrap();
            ok_status(&peer.sent);
            assert!(s.root.join("photos").is_dir());

            let mut peer = Recorder::default();
            rename_directory(&mut peer, s, "photos", "pictures").unwrap();
            ok_status(&peer.sent);
            assert!(s.root.join("pictures").is_dir());
            assert!(!s.root.join("photos").exists());

            fs::write(s.root.join("pictures/x.jpg"), b"x").unwrap();
            let mut peer = Recorder::default();
            remove_directory(&mut peer, s, "pictures").unwrap();
            ok_status(&peer.sent);
            assert!(!s.root.join("pictures").exists());
        });
    }

    #[test]
    fn bad_target_names_and_root_operations_are_refused() {
        with_session(|s| {
            fs::create_dir(s.root.join("d")).unwrap();
            for (name, parent) in [("..", ""), ("", ""), ("/abs", ""), ("x", "../..")] {
                let mut peer = Recorder::default();
                assert!(make_directory(&mut peer, s, parent, name).is_err());
                only_error(&peer.sent);
            }
            let mut peer = Recorder::default();
            assert!(rename_directory(&mut peer, s, "d", "..").is_err());
            only_error(&peer.sent);

            let mut peer = Recorder::default();
            assert!(remove_directory(&mut peer, s, ".").is_err());
            only_error(&peer.sent);
            assert!(s.root.is_dir());

            let mut peer = Recorder::default();
            assert!(rename_directory(&mut peer, s, ".", "other").is_err());
            only_error(&peer.sent);
        });
    }

    #[test]
    fn tree_streams_listing_and_ends_short() {
        with_session(|s| {
            fs::create_dir(s.root.join("docs")).unwrap();
            fs::write(s.root.join("docs/a.txt"), b"a").unwrap();
            let mut peer = Recorder::default();
            send_tree(&mut peer, s).unwrap();
            assert_eq!(peer.sent.len(), 1);
            assert_eq!(peer.sent[0].content(), b"docs/\ndocs/a.txt\n");
        });
    }

    #[test]
    fn execute_dispatches_by_command() {
        with_session(|s| {
            let mut peer = Recorder::default();
            execute(
                &mut peer,
                s,
                &Command::Mkdir {
                    dirname: "new".into(),
                    path: "".into(),
                },
            )
            .unwrap();
            assert!(s.root.join("new").is_dir());
        });
    }
}
