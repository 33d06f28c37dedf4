//! 长度前缀帧编解码
//!
//! TCP 是字节流，需要自行划分消息边界：每帧由 4 字节大端长度和 JSON 载荷组成。

use crate::ProtocolError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io::{self, Read, Write};

/// 单帧载荷上限（1 MiB）
pub const MAX_FRAME_LEN: usize = 1 << 20;

/// 帧头长度
pub const HEADER_LEN: usize = 4;

/// 序列化载荷
pub fn encode_payload<T: Serialize>(value: &T) -> Result<Vec<u8>, ProtocolError> {
    Ok(serde_json::to_vec(value)?)
}

/// 反序列化载荷
pub fn decode_payload<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ProtocolError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// 写入一帧
pub fn write_frame<W: Write>(writer: &mut W, payload: &[u8]) -> Result<(), ProtocolError> {
    if payload.len() > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge {
            len: payload.len(),
            max: MAX_FRAME_LEN,
        });
    }

    let header = (payload.len() as u32).to_be_bytes();
    writer.write_all(&header).map_err(map_io)?;
    writer.write_all(payload).map_err(map_io)?;
    writer.flush().map_err(map_io)?;
    Ok(())
}

/// 读取一帧
///
/// 读到一半的帧遇到 EOF 同样视为对端断开。
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Vec<u8>, ProtocolError> {
    let mut header = [0u8; HEADER_LEN];
    reader.read_exact(&mut header).map_err(map_io)?;

    let len = u32::from_be_bytes(header) as usize;
    if len > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge {
            len,
            max: MAX_FRAME_LEN,
        });
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).map_err(map_io)?;
    Ok(payload)
}

/// IO 错误分类：超时与断开单独区分
pub(crate) fn map_io(e: io::Error) -> ProtocolError {
    match e.kind() {
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => ProtocolError::Timeout,
        io::ErrorKind::UnexpectedEof
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe => ProtocolError::Disconnected,
        _ => ProtocolError::Io(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Method, Request};
    use std::io::Cursor;

    #[test]
    fn test_frame_header_is_big_endian() {
        let mut buf = Vec::new();
        write_frame(&mut buf, b"abc").unwrap();
        assert_eq!(&buf[..HEADER_LEN], &[0, 0, 0, 3]);
        assert_eq!(&buf[HEADER_LEN..], b"abc");
    }

    #[test]
    fn test_read_request_frame() {
        let payload = encode_payload(&Request::new(Method::GetJointState)).unwrap();
        let mut buf = Vec::new();
        write_frame(&mut buf, &payload).unwrap();

        let mut cursor = Cursor::new(buf);
        let frame = read_frame(&mut cursor).unwrap();
        let request: Request = decode_payload(&frame).unwrap();
        assert_eq!(request.method().unwrap(), Method::GetJointState);
    }

    #[test]
    fn test_truncated_frame_is_disconnect() {
        let mut buf = Vec::new();
        write_frame(&mut buf, b"hello").unwrap();
        buf.truncate(HEADER_LEN + 2);

        let mut cursor = Cursor::new(buf);
        assert!(matches!(
            read_frame(&mut cursor),
            Err(ProtocolError::Disconnected)
        ));
    }

    #[test]
    fn test_oversized_header_rejected() {
        let header = ((MAX_FRAME_LEN + 1) as u32).to_be_bytes();
        let mut cursor = Cursor::new(header.to_vec());
        assert!(matches!(
            read_frame(&mut cursor),
            Err(ProtocolError::FrameTooLarge { .. })
        ));
    }

    #[test]
    fn test_malformed_payload() {
        let result: Result<Request, _> = decode_payload(b"not json");
        assert!(matches!(result, Err(ProtocolError::Malformed(_))));
    }
}
