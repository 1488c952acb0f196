//! Stream-socket link.
//!
//! Each message is written as a [`StreamHeader`] followed by the dest, source
//! and data segments. The transport is trusted for integrity and ordering, so
//! frames carry no checksum. A frame that cannot be parsed closes the link.
//!
//! One writer task drains an unbounded queue so `transmit` never blocks. One
//! reader task hands inbound frames to the node on the blocking pool, one at a
//! time. When either side stops, both stop and the link removes itself from
//! its node.

use std::io;
use std::sync::Arc;

use anyhow::{bail, Context};
use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};
use zerocopy::byteorder::{U16, U32};
use zerocopy::{AsBytes, FromBytes};

use cluck_core::config::StreamConfig;
use cluck_core::wire::StreamHeader;

use crate::link::Link;
use crate::node::{Node, NodeError, WeakNode};

pub struct StreamLink {
    name: String,
    outbound: mpsc::UnboundedSender<Bytes>,
    shutdown: broadcast::Sender<()>,
}

impl StreamLink {
    /// Attach `io` to `node` as link `name` and start its reader and writer
    /// tasks. Must be called from within a tokio runtime.
    pub fn spawn<S>(io: S, name: &str, node: &Node, config: &StreamConfig) -> Result<Arc<Self>, NodeError>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (outbound, queue) = mpsc::unbounded_channel();
        let (shutdown, _) = broadcast::channel(1);
        let link = Arc::new(Self {
            name: name.to_string(),
            outbound,
            shutdown: shutdown.clone(),
        });
        let as_link: Arc<dyn Link> = link.clone();
        node.add_link(name, as_link.clone())?;

        let (reader, writer) = tokio::io::split(io);
        tokio::spawn(write_loop(
            writer,
            queue,
            shutdown.clone(),
            shutdown.subscribe(),
            name.to_string(),
        ));

        let weak = node.downgrade();
        let name = name.to_string();
        let max_data = config.max_message_bytes;
        let mut stop = shutdown.subscribe();
        tokio::spawn(async move {
            let outcome = tokio::select! {
                result = read_loop(reader, &name, &weak, max_data) => result,
                _ = stop.recv() => Ok(()),
            };
            match outcome {
                Ok(()) => info!(link = %name, "stream link closed"),
                Err(e) => warn!(link = %name, error = %e, "stream link failed"),
            }
            let _ = shutdown.send(());
            if let Some(node) = weak.upgrade() {
                node.detach_link(&name, &as_link);
            }
        });

        Ok(link)
    }

    /// Open a TCP connection and attach it as link `name`.
    pub async fn connect<A: ToSocketAddrs>(
        addr: A,
        name: &str,
        node: &Node,
        config: &StreamConfig,
    ) -> anyhow::Result<Arc<Self>> {
        let stream = tokio::time::timeout(config.connect_timeout(), TcpStream::connect(addr))
            .await
            .context("stream connect timed out")??;
        stream.set_nodelay(true)?;
        let peer = stream.peer_addr()?;
        let link = Self::spawn(stream, name, node, config)?;
        info!(link = name, %peer, "stream link connected");
        Ok(link)
    }

    /// Accept connections forever, attaching each as `{prefix}-{n}`.
    pub async fn accept_loop(
        listener: TcpListener,
        prefix: &str,
        node: Node,
        config: StreamConfig,
    ) -> anyhow::Result<()> {
        info!(addr = %listener.local_addr()?, "accepting stream links");
        let mut next = 0u64;
        loop {
            let (stream, peer) = listener.accept().await?;
            if let Err(e) = stream.set_nodelay(true) {
                debug!(%peer, error = %e, "could not disable nagle");
            }
            let name = format!("{prefix}-{next}");
            next += 1;
            match Self::spawn(stream, &name, &node, &config) {
                Ok(_) => info!(link = %name, %peer, "accepted stream link"),
                Err(e) => warn!(%peer, error = %e, "rejected stream link"),
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stop both tasks. The link detaches from its node shortly after.
    pub fn close(&self) {
        let _ = self.shutdown.send(());
    }
}

impl Link for StreamLink {
    fn transmit(&self, dest: &str, source: &str, data: &[u8]) -> bool {
        match encode_frame(dest, source, data) {
            Some(frame) => self.outbound.send(frame).is_ok(),
            None => {
                warn!(link = %self.name, dest, "message too large for stream frame, dropped");
                false
            }
        }
    }
}

fn encode_frame(dest: &str, source: &str, data: &[u8]) -> Option<Bytes> {
    let header = StreamHeader {
        dest_len: U16::new(u16::try_from(dest.len()).ok()?),
        source_len: U16::new(u16::try_from(source.len()).ok()?),
        data_len: U32::new(u32::try_from(data.len()).ok()?),
    };
    let mut frame = BytesMut::with_capacity(StreamHeader::SIZE + header.body_len());
    frame.put_slice(header.as_bytes());
    frame.put_slice(dest.as_bytes());
    frame.put_slice(source.as_bytes());
    frame.put_slice(data);
    Some(frame.freeze())
}

async fn write_loop<W: AsyncWrite>(
    writer: W,
    mut queue: mpsc::UnboundedReceiver<Bytes>,
    shutdown: broadcast::Sender<()>,
    mut stop: broadcast::Receiver<()>,
    name: String,
) {
    tokio::pin!(writer);
    loop {
        tokio::select! {
            _ = stop.recv() => break,
            frame = queue.recv() => {
                let Some(frame) = frame else { break };
                if let Err(e) = writer.write_all(&frame).await {
                    warn!(link = %name, error = %e, "stream write failed");
                    let _ = shutdown.send(());
                    break;
                }
            }
        }
    }
    let _ = writer.shutdown().await;
    debug!(link = %name, "stream writer stopped");
}

async fn read_loop<R: AsyncRead>(reader: R, name: &str, node: &WeakNode, max_data: u32) -> anyhow::Result<()> {
    tokio::pin!(reader);
    let mut head = [0u8; StreamHeader::SIZE];
    loop {
        match reader.read_exact(&mut head).await {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(()),
            Err(e) => return Err(e.into()),
        }
        let header = StreamHeader::read_from(&head[..]).context("short stream header")?;
        let data_len = header.data_len.get();
        if data_len > max_data {
            bail!("peer sent {data_len} data bytes, limit is {max_data}");
        }

        let mut body = vec![0u8; header.body_len()];
        reader.read_exact(&mut body).await?;
        let (dest, rest) = body.split_at(header.dest_len.get() as usize);
        let (source, data) = rest.split_at(header.source_len.get() as usize);
        let dest = std::str::from_utf8(dest).context("destination is not UTF-8")?.to_owned();
        let source = std::str::from_utf8(source).context("source is not UTF-8")?.to_owned();
        let data = data.to_vec();

        // Dispatch runs channel code and other links' transmits, which may block.
        let (node, link) = (node.clone(), name.to_owned());
        let delivered = tokio::task::spawn_blocking(move || node.receive(&link, &dest, &source, &data))
            .await
            .context("dispatch task failed")?;
        if !delivered {
            return Ok(());
        }
    }
}
