use std::io;
use std::net::SocketAddr;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

pub struct BufferedStream {
    socket: TcpStream,
    buf: Vec<u8>,
    pos: usize,
    closed: bool,
}

impl BufferedStream {
    pub fn new(socket: TcpStream) -> Self {
        Self {
            socket,
            buf: Vec::new(),
            pos: 0,
            closed: false,
        }
    }

    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.socket.peer_addr()
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    fn buffered(&self) -> &[u8] {
        &self.buf[self.pos..]
    }

    // empty return means EOF
    pub async fn receive(&mut self, max: usize) -> io::Result<Vec<u8>> {
        if self.pos < self.buf.len() {
            let take = max.min(self.buf.len() - self.pos);
            let out = self.buf[self.pos..self.pos + take].to_vec();
            self.pos += take;
            return Ok(out);
        }
        let mut tmp = vec![0u8; max.max(1)];
        let n = self.socket.read(&mut tmp).await?;
        tmp.truncate(n);
        Ok(tmp)
    }

    pub async fn receive_exactly(&mut self, n: usize) -> io::Result<Vec<u8>> {
        let mut out = Vec::with_capacity(n);
        let avail = self.buf.len() - self.pos;
        if avail > 0 {
            let take = avail.min(n);
            out.extend_from_slice(&self.buf[self.pos..self.pos + take]);
            self.pos += take;
        }
        if out.len() < n {
            let mut rest = vec![0u8; n - out.len()];
            self.socket.read_exact(&mut rest).await?;
            out.extend_from_slice(&rest);
        }
        Ok(out)
    }

    pub async fn receive_until(&mut self, delim: u8, cap: usize) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        loop {
            if let Some(idx) = self.buffered().iter().position(|&b| b == delim) {
                out.extend_from_slice(&self.buffered()[..=idx]);
                self.pos += idx + 1;
                return Ok(out);
            }
            out.extend_from_slice(self.buffered());
            self.pos = self.buf.len();
            if out.len() > cap {
                return Err(io::Error::new(io::ErrorKind::InvalidData, "line too long"));
            }
            let mut tmp = [0u8; 4096];
            let n = self.socket.read(&mut tmp).await?;
            if n == 0 {
                return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "peer closed before delimiter"));
            }
            self.buf.clear();
            self.pos = 0;
            self.buf.extend_from_slice(&tmp[..n]);
        }
    }

    // multi-byte variant of receive_until; leftover bytes go back into buf
    pub async fn receive_until_delim(&mut self, delim: &[u8], cap: usize) -> io::Result<Vec<u8>> {
        let mut out = self.buf[self.pos..].to_vec();
        self.pos = self.buf.len();

        loop {
            if let Some(idx) = find_subslice(&out, delim) {
                let split_at = idx + delim.len();
                let leftover = out.split_off(split_at);
                self.buf = leftover;
                self.pos = 0;
                return Ok(out);
            }
            if out.len() > cap {
                return Err(io::Error::new(io::ErrorKind::InvalidData, "header block too long"));
            }
            let mut tmp = [0u8; 4096];
            let n = self.socket.read(&mut tmp).await?;
            if n == 0 {
                return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "peer closed before delimiter"));
            }
            out.extend_from_slice(&tmp[..n]);
        }
    }

    pub async fn send(&mut self, data: &[u8]) -> io::Result<()> {
        self.socket.write_all(data).await
    }

    pub async fn send_eof(&mut self) -> io::Result<()> {
        self.socket.shutdown().await
    }

    pub async fn close(&mut self) -> io::Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.socket.shutdown().await
    }

    pub fn into_split(self) -> (BufferedReadHalf, OwnedWriteHalf) {
        let leftover = self.buf[self.pos..].to_vec();
        let (read_half, write_half) = self.socket.into_split();
        (
            BufferedReadHalf {
                socket: read_half,
                buf: leftover,
                pos: 0,
            },
            write_half,
        )
    }
}

pub struct BufferedReadHalf {
    socket: OwnedReadHalf,
    buf: Vec<u8>,
    pos: usize,
}

impl BufferedReadHalf {
    pub async fn receive_into(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if self.pos < self.buf.len() {
            let take = out.len().min(self.buf.len() - self.pos);
            out[..take].copy_from_slice(&self.buf[self.pos..self.pos + take]);
            self.pos += take;
            return Ok(take);
        }
        self.socket.read(out).await
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
