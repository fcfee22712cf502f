/*
 * Created on Sat Jul 11 2026
 *
 * This file is a part of Skyconf
 * Skyconf is a free and open-source YANG-driven configuration management
 * engine written by Sayan Nandan ("the Author") with the vision to provide
 * safe, transactional network configuration without compromising on
 * correctness or performance.
 *
 * Copyright (c) 2026, Sayan Nandan <ohsayan@outlook.com>
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 *
*/

//! # The session wire protocol
//!
//! Messages are length-prefixed records: a `u32` big-endian frame length
//! followed by a `u16` big-endian `op_type` and a kind-specific body.
//! Strings are NUL-terminated, blobs carry a `u32` length. Replies reuse the
//! framing with the reserved kinds `OK`, `ERR`, `REPLY` and `NOTIFY`.
//!
//! Both directions are implemented here: the server decodes requests and
//! encodes replies, while the encoders for requests (and decoders for
//! replies) power test clients.

use crate::merge::ModifyOp;
use crate::util::error::{ConfResult, Error};

// request kinds
pub const MSG_COMMIT: u16 = 1;
pub const MSG_VALIDATE: u16 = 2;
pub const MSG_CHANGE: u16 = 3;
pub const MSG_XMLPUT: u16 = 4;
pub const MSG_SAVE: u16 = 5;
pub const MSG_LOAD: u16 = 6;
pub const MSG_COPY: u16 = 7;
pub const MSG_LOCK: u16 = 8;
pub const MSG_UNLOCK: u16 = 9;
pub const MSG_KILL: u16 = 10;
pub const MSG_DEBUG: u16 = 11;
pub const MSG_CALL: u16 = 12;
pub const MSG_SUBSCRIPTION: u16 = 13;
pub const MSG_GET: u16 = 14;
// reply kinds
pub const MSG_OK: u16 = 100;
pub const MSG_ERR: u16 = 101;
pub const MSG_REPLY: u16 = 102;
pub const MSG_NOTIFY: u16 = 103;

/// Frames larger than this are rejected outright
pub const MAX_FRAME: usize = 64 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
/// A decoded session request
pub enum Request {
    Commit,
    Validate,
    /// Path-addressed edit (`change`): a keyed path plus an optional value
    Change {
        db: String,
        op: ModifyOp,
        xkey: String,
        value: Option<String>,
    },
    /// XML-payload edit (`xmlput`)
    XmlPut {
        db: String,
        op: ModifyOp,
        xml: String,
    },
    Save {
        db: String,
        snapshot: bool,
        filename: String,
    },
    Load {
        db: String,
        replace: bool,
        filename: String,
    },
    Copy {
        src: String,
        dst: String,
    },
    Lock {
        db: String,
    },
    Unlock {
        db: String,
    },
    Kill {
        session: u64,
    },
    Debug {
        level: u32,
    },
    Call {
        tag: String,
        payload: Vec<u8>,
    },
    Subscription {
        status: bool,
        stream: String,
        filter: Option<String>,
        starttime: Option<String>,
        stoptime: Option<String>,
    },
    Get {
        db: String,
        xpath: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A reply frame
pub enum Response {
    Ok,
    Err {
        kind: u16,
        suberrno: u32,
        reason: String,
    },
    Reply(Vec<u8>),
    Notify(Vec<u8>),
}

impl Response {
    pub fn err_from(e: &Error) -> Self {
        Self::Err {
            kind: e.kind().code(),
            suberrno: e.suberrno(),
            reason: e.reason().to_owned(),
        }
    }
}

// decoding

struct Cursor<'a> {
    buf: &'a [u8],
    at: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, at: 0 }
    }
    fn take(&mut self, n: usize) -> ConfResult<&'a [u8]> {
        if self.at + n > self.buf.len() {
            return Err(Error::malformed("truncated frame"));
        }
        let out = &self.buf[self.at..self.at + n];
        self.at += n;
        Ok(out)
    }
    fn u8(&mut self) -> ConfResult<u8> {
        Ok(self.take(1)?[0])
    }
    fn u16(&mut self) -> ConfResult<u16> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }
    fn u32(&mut self) -> ConfResult<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }
    fn u64(&mut self) -> ConfResult<u64> {
        let b = self.take(8)?;
        Ok(u64::from_be_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }
    fn cstr(&mut self) -> ConfResult<String> {
        let rest = &self.buf[self.at..];
        let nul = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| Error::malformed("unterminated string"))?;
        let out = core::str::from_utf8(&rest[..nul])
            .map_err(|_| Error::malformed("non-UTF8 string"))?
            .to_owned();
        self.at += nul + 1;
        Ok(out)
    }
    /// An optional string: empty encodes as absent
    fn opt_cstr(&mut self) -> ConfResult<Option<String>> {
        let s = self.cstr()?;
        Ok(if s.is_empty() { None } else { Some(s) })
    }
    fn blob(&mut self) -> ConfResult<Vec<u8>> {
        let len = self.u32()? as usize;
        if len > MAX_FRAME {
            return Err(Error::malformed("oversized blob"));
        }
        Ok(self.take(len)?.to_vec())
    }
    fn bool(&mut self) -> ConfResult<bool> {
        Ok(self.u8()? != 0)
    }
    fn done(&self) -> ConfResult<()> {
        if self.at == self.buf.len() {
            Ok(())
        } else {
            Err(Error::malformed("trailing bytes in frame"))
        }
    }
}

fn decode_op(code: u16) -> ConfResult<ModifyOp> {
    ModifyOp::from_code(code)
        .ok_or_else(|| Error::not_supported(format!("Unknown operation code {}", code)))
}

/// Decode a request frame (without the length prefix)
pub fn decode_request(frame: &[u8]) -> ConfResult<Request> {
    let mut c = Cursor::new(frame);
    let op_type = c.u16()?;
    let req = match op_type {
        MSG_COMMIT => Request::Commit,
        MSG_VALIDATE => Request::Validate,
        MSG_CHANGE => Request::Change {
            db: c.cstr()?,
            op: decode_op(c.u16()?)?,
            xkey: c.cstr()?,
            value: {
                let has = c.bool()?;
                let v = c.cstr()?;
                has.then_some(v)
            },
        },
        MSG_XMLPUT => Request::XmlPut {
            db: c.cstr()?,
            op: decode_op(c.u16()?)?,
            xml: String::from_utf8(c.blob()?)
                .map_err(|_| Error::malformed("non-UTF8 XML payload"))?,
        },
        MSG_SAVE => Request::Save {
            db: c.cstr()?,
            snapshot: c.bool()?,
            filename: c.cstr()?,
        },
        MSG_LOAD => Request::Load {
            db: c.cstr()?,
            replace: c.bool()?,
            filename: c.cstr()?,
        },
        MSG_COPY => Request::Copy {
            src: c.cstr()?,
            dst: c.cstr()?,
        },
        MSG_LOCK => Request::Lock { db: c.cstr()? },
        MSG_UNLOCK => Request::Unlock { db: c.cstr()? },
        MSG_KILL => Request::Kill { session: c.u64()? },
        MSG_DEBUG => Request::Debug { level: c.u32()? },
        MSG_CALL => Request::Call {
            tag: c.cstr()?,
            payload: c.blob()?,
        },
        MSG_SUBSCRIPTION => Request::Subscription {
            status: c.bool()?,
            stream: c.cstr()?,
            filter: c.opt_cstr()?,
            starttime: c.opt_cstr()?,
            stoptime: c.opt_cstr()?,
        },
        MSG_GET => Request::Get {
            db: c.cstr()?,
            xpath: c.cstr()?,
        },
        other => {
            return Err(Error::malformed(format!("Unexpected message: {}", other)))
        }
    };
    c.done()?;
    Ok(req)
}

/// Decode a reply frame (without the length prefix)
pub fn decode_response(frame: &[u8]) -> ConfResult<Response> {
    let mut c = Cursor::new(frame);
    let op_type = c.u16()?;
    let resp = match op_type {
        MSG_OK => Response::Ok,
        MSG_ERR => Response::Err {
            kind: c.u16()?,
            suberrno: c.u32()?,
            reason: c.cstr()?,
        },
        MSG_REPLY => Response::Reply(c.blob()?),
        MSG_NOTIFY => Response::Notify(c.blob()?),
        other => {
            return Err(Error::malformed(format!("Unexpected reply: {}", other)))
        }
    };
    c.done()?;
    Ok(resp)
}

// encoding

struct FrameBuilder {
    body: Vec<u8>,
}

impl FrameBuilder {
    fn new(op_type: u16) -> Self {
        let mut body = Vec::with_capacity(64);
        body.extend_from_slice(&op_type.to_be_bytes());
        Self { body }
    }
    fn u8(mut self, v: u8) -> Self {
        self.body.push(v);
        self
    }
    fn u16(mut self, v: u16) -> Self {
        self.body.extend_from_slice(&v.to_be_bytes());
        self
    }
    fn u32(mut self, v: u32) -> Self {
        self.body.extend_from_slice(&v.to_be_bytes());
        self
    }
    fn u64(mut self, v: u64) -> Self {
        self.body.extend_from_slice(&v.to_be_bytes());
        self
    }
    fn cstr(mut self, s: &str) -> Self {
        self.body.extend_from_slice(s.as_bytes());
        self.body.push(0);
        self
    }
    fn blob(mut self, b: &[u8]) -> Self {
        self.body.extend_from_slice(&(b.len() as u32).to_be_bytes());
        self.body.extend_from_slice(b);
        self
    }
    fn bool(self, v: bool) -> Self {
        self.u8(v as u8)
    }
    /// Prepend the length prefix and finish
    fn finish(self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.body.len() + 4);
        out.extend_from_slice(&(self.body.len() as u32).to_be_bytes());
        out.extend_from_slice(&self.body);
        out
    }
}

/// Encode a request into a complete frame (with length prefix)
pub fn encode_request(req: &Request) -> Vec<u8> {
    match req {
        Request::Commit => FrameBuilder::new(MSG_COMMIT).finish(),
        Request::Validate => FrameBuilder::new(MSG_VALIDATE).finish(),
        Request::Change {
            db,
            op,
            xkey,
            value,
        } => FrameBuilder::new(MSG_CHANGE)
            .cstr(db)
            .u16(op.code())
            .cstr(xkey)
            .bool(value.is_some())
            .cstr(value.as_deref().unwrap_or(""))
            .finish(),
        Request::XmlPut { db, op, xml } => FrameBuilder::new(MSG_XMLPUT)
            .cstr(db)
            .u16(op.code())
            .blob(xml.as_bytes())
            .finish(),
        Request::Save {
            db,
            snapshot,
            filename,
        } => FrameBuilder::new(MSG_SAVE)
            .cstr(db)
            .bool(*snapshot)
            .cstr(filename)
            .finish(),
        Request::Load {
            db,
            replace,
            filename,
        } => FrameBuilder::new(MSG_LOAD)
            .cstr(db)
            .bool(*replace)
            .cstr(filename)
            .finish(),
        Request::Copy { src, dst } => FrameBuilder::new(MSG_COPY).cstr(src).cstr(dst).finish(),
        Request::Lock { db } => FrameBuilder::new(MSG_LOCK).cstr(db).finish(),
        Request::Unlock { db } => FrameBuilder::new(MSG_UNLOCK).cstr(db).finish(),
        Request::Kill { session } => FrameBuilder::new(MSG_KILL).u64(*session).finish(),
        Request::Debug { level } => FrameBuilder::new(MSG_DEBUG).u32(*level).finish(),
        Request::Call { tag, payload } => {
            FrameBuilder::new(MSG_CALL).cstr(tag).blob(payload).finish()
        }
        Request::Subscription {
            status,
            stream,
            filter,
            starttime,
            stoptime,
        } => FrameBuilder::new(MSG_SUBSCRIPTION)
            .bool(*status)
            .cstr(stream)
            .cstr(filter.as_deref().unwrap_or(""))
            .cstr(starttime.as_deref().unwrap_or(""))
            .cstr(stoptime.as_deref().unwrap_or(""))
            .finish(),
        Request::Get { db, xpath } => FrameBuilder::new(MSG_GET).cstr(db).cstr(xpath).finish(),
    }
}

/// Encode a reply into a complete frame (with length prefix)
pub fn encode_response(resp: &Response) -> Vec<u8> {
    match resp {
        Response::Ok => FrameBuilder::new(MSG_OK).finish(),
        Response::Err {
            kind,
            suberrno,
            reason,
        } => FrameBuilder::new(MSG_ERR)
            .u16(*kind)
            .u32(*suberrno)
            .cstr(reason)
            .finish(),
        Response::Reply(bytes) => FrameBuilder::new(MSG_REPLY).blob(bytes).finish(),
        Response::Notify(bytes) => FrameBuilder::new(MSG_NOTIFY).blob(bytes).finish(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(req: Request) {
        let frame = encode_request(&req);
        let (len, rest) = frame.split_at(4);
        assert_eq!(
            u32::from_be_bytes([len[0], len[1], len[2], len[3]]) as usize,
            rest.len()
        );
        assert_eq!(decode_request(rest).unwrap(), req);
    }

    #[test]
    fn test_request_roundtrips() {
        roundtrip(Request::Commit);
        roundtrip(Request::Validate);
        roundtrip(Request::Change {
            db: "candidate".to_owned(),
            op: crate::merge::ModifyOp::Create,
            xkey: "/x/y[a=1]/v".to_owned(),
            value: Some("hello".to_owned()),
        });
        roundtrip(Request::Change {
            db: "candidate".to_owned(),
            op: crate::merge::ModifyOp::Delete,
            xkey: "/x/y[a=1]".to_owned(),
            value: None,
        });
        roundtrip(Request::XmlPut {
            db: "candidate".to_owned(),
            op: crate::merge::ModifyOp::Merge,
            xml: "<config><x/></config>".to_owned(),
        });
        roundtrip(Request::Save {
            db: "running".to_owned(),
            snapshot: true,
            filename: String::new(),
        });
        roundtrip(Request::Load {
            db: "candidate".to_owned(),
            replace: false,
            filename: "backup.xml".to_owned(),
        });
        roundtrip(Request::Copy {
            src: "running".to_owned(),
            dst: "candidate".to_owned(),
        });
        roundtrip(Request::Lock {
            db: "candidate".to_owned(),
        });
        roundtrip(Request::Unlock {
            db: "candidate".to_owned(),
        });
        roundtrip(Request::Kill { session: 42 });
        roundtrip(Request::Debug { level: 2 });
        roundtrip(Request::Call {
            tag: "streams".to_owned(),
            payload: vec![1, 2, 3],
        });
        roundtrip(Request::Subscription {
            status: true,
            stream: "NETCONF".to_owned(),
            filter: Some("event".to_owned()),
            starttime: Some("2026-07-11T00:00:00Z".to_owned()),
            stoptime: None,
        });
        roundtrip(Request::Get {
            db: "running".to_owned(),
            xpath: "/x".to_owned(),
        });
    }

    #[test]
    fn test_response_roundtrips() {
        for resp in [
            Response::Ok,
            Response::Err {
                kind: 6,
                suberrno: 0,
                reason: "lock failed: locked by 1".to_owned(),
            },
            Response::Reply(b"<config/>".to_vec()),
            Response::Notify(b"<notification/>".to_vec()),
        ] {
            let frame = encode_response(&resp);
            assert_eq!(decode_response(&frame[4..]).unwrap(), resp);
        }
    }

    #[test]
    fn test_bad_frames() {
        assert!(decode_request(&[]).is_err());
        assert!(decode_request(&[0, 99]).is_err());
        // truncated change
        let frame = encode_request(&Request::Lock {
            db: "candidate".to_owned(),
        });
        assert!(decode_request(&frame[4..frame.len() - 1]).is_err());
        // trailing garbage
        let mut frame = encode_request(&Request::Commit)[4..].to_vec();
        frame.push(7);
        assert!(decode_request(&frame).is_err());
    }
}
