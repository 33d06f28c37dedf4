//! 一问一答（lock-step）请求/应答通道
//!
//! 语义与 REQ/REP 套接字一致：
//! - 应答端在发出应答之前不能再接收请求，没有待应答请求时不能发出应答
//! - 请求端在收到应答之前不能再发送请求
//!
//! 违反时序的操作立即返回 [`ProtocolError::LockStep`]，不会被静默排队。
//! 对端在收到应答前发出的下一帧，无论在读取请求时还是在处理请求期间到达，都会被识别。

use crate::ProtocolError;
use crate::codec::{map_io, read_frame, write_frame};
use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

/// 带等待上限的接收结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Poll<T> {
    /// 收到一帧
    Ready(T),
    /// 等待期内没有数据（空闲节拍，不是错误）
    Idle,
}

/// `set_read_timeout(Some(0))` 会报错，最短等待 1ms
const MIN_WAIT: Duration = Duration::from_millis(1);

/// 应答端通道（服务端，每个已连接的对端一个）
pub struct ReplyChannel {
    stream: TcpStream,
    peer: SocketAddr,
    /// 是否有请求等待应答
    pending: bool,
    /// 帧开始后剩余字节的最长等待时间（实际取它与本次轮询等待的较小值）
    frame_timeout: Duration,
}

impl ReplyChannel {
    pub fn new(stream: TcpStream, frame_timeout: Duration) -> Result<Self, ProtocolError> {
        let peer = stream.peer_addr()?;
        stream.set_nonblocking(false)?;
        stream.set_nodelay(true)?;
        Ok(Self {
            stream,
            peer,
            pending: false,
            frame_timeout: frame_timeout.max(MIN_WAIT),
        })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// 是否有请求等待应答
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// 最多等待 `wait` 接收下一个请求帧
    ///
    /// # 返回
    /// - `Ok(Poll::Ready(frame))`: 收到完整请求，之后必须调用 [`send_reply`](Self::send_reply)
    /// - `Ok(Poll::Idle)`: 等待期内没有数据
    /// - `Err(ProtocolError::Disconnected)`: 对端关闭连接
    /// - `Err(ProtocolError::LockStep)`: 上一个请求尚未应答，或对端在应答前已发出下一个请求
    /// - `Err(ProtocolError::Timeout)`: 帧已开始，但剩余字节未在 `min(frame_timeout, wait)` 内到达
    pub fn poll_request(&mut self, wait: Duration) -> Result<Poll<Vec<u8>>, ProtocolError> {
        if self.pending {
            return Err(ProtocolError::LockStep(
                "previous request has not been replied to",
            ));
        }

        self.stream.set_read_timeout(Some(wait.max(MIN_WAIT)))?;
        let mut probe = [0u8; 1];
        match self.stream.peek(&mut probe) {
            Ok(0) => return Err(ProtocolError::Disconnected),
            Ok(_) => {},
            Err(e) => {
                return match map_io(e) {
                    ProtocolError::Timeout => Ok(Poll::Idle),
                    other => Err(other),
                };
            },
        }

        // 帧已开始：剩余字节的等待不超过一个轮询间隔，半帧不会推迟停止
        let rest = self.frame_timeout.min(wait.max(MIN_WAIT));
        self.stream.set_read_timeout(Some(rest))?;
        let frame = read_frame(&mut self.stream)?;

        if self.has_buffered_input()? {
            return Err(ProtocolError::LockStep(
                "peer sent a request before receiving the previous reply",
            ));
        }

        tracing::trace!(peer = %self.peer, len = frame.len(), "Received request frame");
        self.pending = true;
        Ok(Poll::Ready(frame))
    }

    /// 发送应答
    ///
    /// 处理请求期间对端已发出下一帧时返回 [`ProtocolError::LockStep`]，应答不会发出。
    pub fn send_reply(&mut self, payload: &[u8]) -> Result<(), ProtocolError> {
        if !self.pending {
            return Err(ProtocolError::LockStep("no request is awaiting a reply"));
        }
        if self.has_buffered_input()? {
            return Err(ProtocolError::LockStep(
                "peer sent a request before receiving the previous reply",
            ));
        }
        write_frame(&mut self.stream, payload)?;
        self.pending = false;
        Ok(())
    }

    /// 非阻塞检查接收缓冲区中是否已有下一帧的数据
    fn has_buffered_input(&self) -> Result<bool, ProtocolError> {
        self.stream.set_nonblocking(true)?;
        let mut probe = [0u8; 1];
        let result = self.stream.peek(&mut probe);
        self.stream.set_nonblocking(false)?;

        match result {
            Ok(n) => Ok(n > 0),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(false),
            Err(e) => Err(map_io(e)),
        }
    }
}

/// 请求端通道（客户端）
pub struct RequestChannel {
    stream: TcpStream,
    /// 是否已发出请求、正在等待应答
    awaiting: bool,
}

impl RequestChannel {
    /// 连接应答端
    ///
    /// `timeout` 同时用作连接超时和等待应答的超时。
    pub fn connect(addr: impl ToSocketAddrs, timeout: Duration) -> Result<Self, ProtocolError> {
        let timeout = timeout.max(MIN_WAIT);
        let mut last_err = None;

        for addr in addr.to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => {
                    stream.set_nodelay(true)?;
                    stream.set_read_timeout(Some(timeout))?;
                    tracing::debug!(%addr, "Connected to reply endpoint");
                    return Ok(Self {
                        stream,
                        awaiting: false,
                    });
                },
                Err(e) => last_err = Some(e),
            }
        }

        Err(ProtocolError::Io(last_err.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "address resolved to nothing")
        })))
    }

    /// 是否有请求正在等待应答
    pub fn is_awaiting(&self) -> bool {
        self.awaiting
    }

    /// 发送请求
    pub fn send(&mut self, payload: &[u8]) -> Result<(), ProtocolError> {
        if self.awaiting {
            return Err(ProtocolError::LockStep("a request is already outstanding"));
        }
        write_frame(&mut self.stream, payload)?;
        self.awaiting = true;
        Ok(())
    }

    /// 接收应答
    ///
    /// 超时后请求仍视为未完成：与 REQ 套接字相同，此时应丢弃该通道重新连接。
    pub fn recv(&mut self) -> Result<Vec<u8>, ProtocolError> {
        if !self.awaiting {
            return Err(ProtocolError::LockStep("no request is outstanding"));
        }
        let frame = read_frame(&mut self.stream)?;
        self.awaiting = false;
        Ok(frame)
    }
}
