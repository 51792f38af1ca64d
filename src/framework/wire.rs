//! Length-prefixed wire framing for the two control fds.
//!
//! This is this binary's own concrete realization of the framework wire
//! format the distilled spec leaves to a shared host library: every frame,
//! in either direction, is `[u32 BE total_len][u8 msg_type][payload]`,
//! grounded in the field-encoding idiom `neli` uses for its own wire
//! structs (`byteorder`-driven, explicit length-prefix fields).

use std::io::{self, Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

/// Severity attached to a `MESSAGE` frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Info,
    Error,
    Fatal,
}

impl Severity {
    fn to_byte(self) -> u8 {
        match self {
            Severity::Info => 0,
            Severity::Error => 1,
            Severity::Fatal => 2,
        }
    }
}

/// Frame types exchanged with the parent.
#[derive(Debug)]
pub enum Frame {
    ProbeReq { definition: String },
    OpenReq { definition: String },
    ConfigureReq { seqno: u32, channel: String },
    ProbeResp { channels: Vec<String> },
    OpenResp { success: bool, dlt: i32, message: String },
    ConfigureResp { seqno: u32, channel: String },
    Data { timestamp_us: u64, dlt: i32, caplen: u32, bytes: Vec<u8> },
    Message { severity: Severity, text: String },
}

const T_PROBEREQ: u8 = 1;
const T_OPENREQ: u8 = 2;
const T_CONFIGUREREQ: u8 = 3;
const T_PROBERESP: u8 = 4;
const T_OPENRESP: u8 = 5;
const T_CONFIGURERESP: u8 = 6;
const T_DATA: u8 = 7;
const T_MESSAGE: u8 = 8;

/// Write one frame to `w`, flushing its length prefix atomically (one
/// buffered write) so partial frames are never observed by the reader.
pub fn write_frame<W: Write>(w: &mut W, frame: &Frame) -> io::Result<()> {
    let mut payload = Vec::new();
    let msg_type = encode(&mut payload, frame)?;

    let mut out = Vec::with_capacity(5 + payload.len());
    out.write_u32::<BigEndian>(payload.len() as u32 + 1)?;
    out.write_u8(msg_type)?;
    out.extend_from_slice(&payload);
    w.write_all(&out)
}

fn encode(payload: &mut Vec<u8>, frame: &Frame) -> io::Result<u8> {
    match frame {
        Frame::ProbeReq { definition } => {
            write_string(payload, definition)?;
            Ok(T_PROBEREQ)
        }
        Frame::OpenReq { definition } => {
            write_string(payload, definition)?;
            Ok(T_OPENREQ)
        }
        Frame::ConfigureReq { seqno, channel } => {
            payload.write_u32::<BigEndian>(*seqno)?;
            write_string(payload, channel)?;
            Ok(T_CONFIGUREREQ)
        }
        Frame::ProbeResp { channels } => {
            payload.write_u32::<BigEndian>(channels.len() as u32)?;
            for c in channels {
                write_string(payload, c)?;
            }
            Ok(T_PROBERESP)
        }
        Frame::OpenResp { success, dlt, message } => {
            payload.write_u8(*success as u8)?;
            payload.write_i32::<BigEndian>(*dlt)?;
            write_string(payload, message)?;
            Ok(T_OPENRESP)
        }
        Frame::ConfigureResp { seqno, channel } => {
            payload.write_u32::<BigEndian>(*seqno)?;
            write_string(payload, channel)?;
            Ok(T_CONFIGURERESP)
        }
        Frame::Data { timestamp_us, dlt, caplen, bytes } => {
            payload.write_u64::<BigEndian>(*timestamp_us)?;
            payload.write_i32::<BigEndian>(*dlt)?;
            payload.write_u32::<BigEndian>(*caplen)?;
            payload.extend_from_slice(bytes);
            Ok(T_DATA)
        }
        Frame::Message { severity, text } => {
            payload.write_u8(severity.to_byte())?;
            write_string(payload, text)?;
            Ok(T_MESSAGE)
        }
    }
}

fn write_string(buf: &mut Vec<u8>, s: &str) -> io::Result<()> {
    buf.write_u32::<BigEndian>(s.len() as u32)?;
    buf.extend_from_slice(s.as_bytes());
    Ok(())
}

fn read_string<R: Read>(r: &mut R) -> io::Result<String> {
    let len = r.read_u32::<BigEndian>()? as usize;
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    String::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Read one frame from `r`. Returns `Ok(None)` on a clean EOF between
/// frames (the parent closed its end).
pub fn read_frame<R: Read>(r: &mut R) -> io::Result<Option<Frame>> {
    let total_len = match r.read_u32::<BigEndian>() {
        Ok(n) => n,
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    };
    if total_len == 0 {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "zero-length frame"));
    }
    let msg_type = r.read_u8()?;
    let remaining = total_len as usize - 1;
    let mut body = vec![0u8; remaining];
    r.read_exact(&mut body)?;
    let mut cursor = io::Cursor::new(body);

    let frame = match msg_type {
        T_PROBEREQ => Frame::ProbeReq { definition: read_string(&mut cursor)? },
        T_OPENREQ => Frame::OpenReq { definition: read_string(&mut cursor)? },
        T_CONFIGUREREQ => {
            let seqno = cursor.read_u32::<BigEndian>()?;
            let channel = read_string(&mut cursor)?;
            Frame::ConfigureReq { seqno, channel }
        }
        T_PROBERESP => {
            let n = cursor.read_u32::<BigEndian>()?;
            let mut channels = Vec::with_capacity(n as usize);
            for _ in 0..n {
                channels.push(read_string(&mut cursor)?);
            }
            Frame::ProbeResp { channels }
        }
        T_OPENRESP => {
            let success = cursor.read_u8()? != 0;
            let dlt = cursor.read_i32::<BigEndian>()?;
            let message = read_string(&mut cursor)?;
            Frame::OpenResp { success, dlt, message }
        }
        T_CONFIGURERESP => {
            let seqno = cursor.read_u32::<BigEndian>()?;
            let channel = read_string(&mut cursor)?;
            Frame::ConfigureResp { seqno, channel }
        }
        T_DATA => {
            let timestamp_us = cursor.read_u64::<BigEndian>()?;
            let dlt = cursor.read_i32::<BigEndian>()?;
            let caplen = cursor.read_u32::<BigEndian>()?;
            let mut bytes = Vec::new();
            cursor.read_to_end(&mut bytes)?;
            Frame::Data { timestamp_us, dlt, caplen, bytes }
        }
        T_MESSAGE => {
            let severity = match cursor.read_u8()? {
                0 => Severity::Info,
                1 => Severity::Error,
                _ => Severity::Fatal,
            };
            let text = read_string(&mut cursor)?;
            Frame::Message { severity, text }
        }
        other => {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unknown frame type {other}"),
            ))
        }
    };
    Ok(Some(frame))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn round_trips_configure_req() {
        let frame = Frame::ConfigureReq { seqno: 42, channel: "36VHT80".to_string() };
        let mut buf = Vec::new();
        write_frame(&mut buf, &frame).unwrap();
        let mut cursor = Cursor::new(buf);
        let back = read_frame(&mut cursor).unwrap().unwrap();
        match back {
            Frame::ConfigureReq { seqno, channel } => {
                assert_eq!(seqno, 42);
                assert_eq!(channel, "36VHT80");
            }
            other => panic!("wrong frame type: {other:?}"),
        }
    }

    #[test]
    fn round_trips_data_frame() {
        let frame = Frame::Data { timestamp_us: 123456, dlt: 127, caplen: 3, bytes: vec![1, 2, 3] };
        let mut buf = Vec::new();
        write_frame(&mut buf, &frame).unwrap();
        let mut cursor = Cursor::new(buf);
        let back = read_frame(&mut cursor).unwrap().unwrap();
        match back {
            Frame::Data { timestamp_us, dlt, caplen, bytes } => {
                assert_eq!(timestamp_us, 123456);
                assert_eq!(dlt, 127);
                assert_eq!(caplen, 3);
                assert_eq!(bytes, vec![1, 2, 3]);
            }
            other => panic!("wrong frame type: {other:?}"),
        }
    }

    #[test]
    fn clean_eof_returns_none() {
        let mut cursor = Cursor::new(Vec::<u8>::new());
        assert!(read_frame(&mut cursor).unwrap().is_none());
    }
}
