use std::time::Duration;

use comms::{
    FrameReceiver, FrameSender,
    msg::{Command, Msg, Payload},
};
use futures::future::try_join_all;
use log::{debug, info};
use tokio::{
    net::{
        TcpListener, TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    runtime::Runtime,
    time::{self, Instant},
};

use super::{Rendezvous, Synchronizer, WorkerContext};
use crate::error::CoordinatorErr;

type NetRx = FrameReceiver<OwnedReadHalf>;
type NetTx = FrameSender<OwnedWriteHalf>;
type Result<T> = std::result::Result<T, CoordinatorErr>;

const CONNECT_RETRY: Duration = Duration::from_millis(100);

/// One end of a connection between the root and another rank.
struct Peer {
    rank: usize,
    rx: NetRx,
    tx: NetTx,
    buf: Vec<f32>,
}

impl Peer {
    fn new(rank: usize, stream: TcpStream) -> Self {
        let (rx, tx) = stream.into_split();
        let (rx, tx) = comms::channel(rx, tx);

        Self {
            rank,
            rx,
            tx,
            buf: Vec::new(),
        }
    }

    async fn recv_command(&mut self) -> Result<Command> {
        let msg: Msg<'_> = self.rx.recv_into(&mut self.buf).await?;

        match msg {
            Msg::Control(cmd) => Ok(cmd),
            other => Err(CoordinatorErr::Unexpected {
                expected: "control",
                got: other.kind(),
            }),
        }
    }

    async fn recv_payload(&mut self) -> Result<Payload<'_>> {
        let msg: Msg<'_> = self.rx.recv_into(&mut self.buf).await?;

        match msg {
            Msg::Data(payload) => Ok(payload),
            other => Err(CoordinatorErr::Unexpected {
                expected: "data",
                got: other.kind(),
            }),
        }
    }

    async fn recv_gradient(&mut self) -> Result<&[f32]> {
        match self.recv_payload().await? {
            Payload::Gradient(nums) => Ok(nums),
            other => Err(CoordinatorErr::Unexpected {
                expected: "data/gradient",
                got: Msg::Data(other).kind(),
            }),
        }
    }
}

/// The two shapes a member of the star topology can take.
enum Link {
    /// Rank 0, connected to every other rank in rank order.
    Root(Vec<Peer>),
    /// Any other rank, connected to rank 0 only.
    Leaf(Peer),
}

/// A fixed size group of workers that can average buffers among themselves.
///
/// The group is a star rooted at rank 0 over TCP. Every collective is a blocking call
/// that drives the sockets on a runtime owned by the group, so callers stay
/// synchronous.
pub struct ProcessGroup {
    runtime: Runtime,
    ctx: WorkerContext,
    link: Link,
}

impl ProcessGroup {
    /// Joins the group described by `rendezvous` as `rank`.
    ///
    /// Rank 0 listens at the rendezvous endpoint, the rest keep dialing it until they
    /// get through. Either way the whole setup must finish within `rendezvous.timeout`.
    ///
    /// # Arguments
    /// * `rendezvous` - The meeting point shared by every worker of the run.
    /// * `rank` - This worker's rank, in `0..world_size`.
    ///
    /// # Returns
    /// The ready group, or an error if it couldn't be fully established.
    pub fn setup(rendezvous: &Rendezvous, rank: usize) -> Result<Self> {
        let world_size = rendezvous.world_size;
        if rank >= world_size {
            return Err(CoordinatorErr::InvalidRank { rank, world_size });
        }

        let runtime = Runtime::new()?;
        let link = runtime.block_on(async {
            let deadline = Instant::now() + rendezvous.timeout;

            if rank == 0 {
                accept_peers(rendezvous, deadline).await.map(Link::Root)
            } else {
                join_root(rendezvous, rank, deadline).await.map(Link::Leaf)
            }
        })?;

        info!(rank = rank, world_size = world_size; "process group ready");

        Ok(Self {
            runtime,
            ctx: WorkerContext::new(rank, world_size),
            link,
        })
    }

    pub fn context(&self) -> WorkerContext {
        self.ctx
    }

    /// Replaces `buf` with the element-wise mean of every rank's `buf`.
    ///
    /// The root adds the buffers up in rank order, so every run of the same group sees
    /// the same rounding.
    pub fn all_reduce_mean(&mut self, buf: &mut [f32]) -> Result<()> {
        let world_size = self.ctx.world_size();
        let Self { runtime, link, .. } = self;

        runtime.block_on(async move {
            match link {
                Link::Root(peers) => {
                    let grads = try_join_all(peers.iter_mut().map(|p| p.recv_gradient())).await?;

                    for grad in grads {
                        check_len(grad.len(), buf.len())?;
                        buf.iter_mut().zip(grad).for_each(|(acc, g)| *acc += g);
                    }

                    let scale = 1. / world_size as f32;
                    buf.iter_mut().for_each(|x| *x *= scale);

                    let msg = Msg::Data(Payload::Reduced(buf));
                    for peer in peers.iter_mut() {
                        peer.tx.send(&msg).await?;
                    }
                }
                Link::Leaf(root) => {
                    root.tx.send(&Msg::Data(Payload::Gradient(buf))).await?;

                    match root.recv_payload().await? {
                        Payload::Reduced(mean) => {
                            check_len(mean.len(), buf.len())?;
                            buf.copy_from_slice(mean);
                        }
                        other => {
                            return Err(CoordinatorErr::Unexpected {
                                expected: "data/reduced",
                                got: Msg::Data(other).kind(),
                            });
                        }
                    }
                }
            }

            Ok::<_, CoordinatorErr>(())
        })
    }

    /// Overwrites every rank's `buf` with the one of rank 0.
    pub fn broadcast(&mut self, buf: &mut [f32]) -> Result<()> {
        let Self { runtime, link, .. } = self;

        runtime.block_on(async move {
            match link {
                Link::Root(peers) => {
                    let msg = Msg::Data(Payload::Params(buf));
                    for peer in peers.iter_mut() {
                        peer.tx.send(&msg).await?;
                    }
                }
                Link::Leaf(root) => match root.recv_payload().await? {
                    Payload::Params(params) => {
                        check_len(params.len(), buf.len())?;
                        buf.copy_from_slice(params);
                    }
                    other => {
                        return Err(CoordinatorErr::Unexpected {
                            expected: "data/params",
                            got: Msg::Data(other).kind(),
                        });
                    }
                },
            }

            Ok::<_, CoordinatorErr>(())
        })
    }

    /// Blocks until every rank of the group has reached this call.
    pub fn barrier(&mut self) -> Result<()> {
        let Self { runtime, link, .. } = self;

        runtime.block_on(async move {
            match link {
                Link::Root(peers) => {
                    for peer in peers.iter_mut() {
                        expect_barrier(peer.recv_command().await?)?;
                    }

                    let msg = Msg::Control(Command::Barrier);
                    for peer in peers.iter_mut() {
                        peer.tx.send(&msg).await?;
                    }
                }
                Link::Leaf(root) => {
                    root.tx.send(&Msg::Control(Command::Barrier)).await?;
                    expect_barrier(root.recv_command().await?)?;
                }
            }

            Ok::<_, CoordinatorErr>(())
        })
    }

    /// Waits for every rank and then closes the connections.
    pub fn teardown(mut self) -> Result<()> {
        self.barrier()?;

        let Self { runtime, link, ctx } = self;
        runtime.block_on(async move {
            let peers = match link {
                Link::Root(peers) => peers,
                Link::Leaf(root) => vec![root],
            };

            for mut peer in peers {
                debug!(rank = ctx.rank(); "closing connection with rank {}", peer.rank);
                peer.tx.send(&Msg::Control(Command::Disconnect)).await?;
                peer.tx.shutdown().await?;
            }

            Ok::<_, CoordinatorErr>(())
        })?;

        info!(rank = ctx.rank(); "process group released");
        Ok(())
    }
}

impl Synchronizer for ProcessGroup {
    fn reduce(&mut self, grad: &mut [f32]) -> Result<()> {
        self.all_reduce_mean(grad)
    }
}

/// Accepts every other rank of the group and welcomes them once all have joined.
async fn accept_peers(rendezvous: &Rendezvous, deadline: Instant) -> Result<Vec<Peer>> {
    let world_size = rendezvous.world_size;
    let endpoint = rendezvous.endpoint();

    let listener = TcpListener::bind(&endpoint)
        .await
        .map_err(|source| CoordinatorErr::Bind {
            addr: endpoint.clone(),
            source,
        })?;

    info!("waiting for {} worker(s) at {endpoint}", world_size - 1);

    let mut slots: Vec<Option<Peer>> = (1..world_size).map(|_| None).collect();
    let mut joined = 0;

    while joined < slots.len() {
        let waiting = || {
            let detail = format!("{} of {world_size} workers joined", joined + 1);
            timed_out(rendezvous, detail)
        };

        let (stream, addr) = time::timeout_at(deadline, listener.accept())
            .await
            .map_err(|_| waiting())??;
        stream.set_nodelay(true)?;

        let mut peer = Peer::new(0, stream);
        let cmd = time::timeout_at(deadline, peer.recv_command())
            .await
            .map_err(|_| waiting())??;

        let rank = match cmd {
            Command::Join { rank, world_size: got } if got == world_size => rank,
            Command::Join { world_size: got, .. } => {
                return Err(CoordinatorErr::WorldSizeMismatch {
                    got,
                    expected: world_size,
                });
            }
            _ => {
                return Err(CoordinatorErr::Unexpected {
                    expected: "join",
                    got: "control",
                });
            }
        };

        let slot = rank
            .checked_sub(1)
            .and_then(|i| slots.get_mut(i))
            .ok_or(CoordinatorErr::InvalidRank { rank, world_size })?;

        if slot.is_some() {
            return Err(CoordinatorErr::DuplicateRank(rank));
        }

        debug!(rank = rank; "worker joined from {addr}");
        peer.rank = rank;
        *slot = Some(peer);
        joined += 1;
    }

    let mut peers: Vec<_> = slots.into_iter().flatten().collect();
    let welcome = Msg::Control(Command::Welcome { world_size });
    for peer in peers.iter_mut() {
        peer.tx.send(&welcome).await?;
    }

    Ok(peers)
}

/// Dials rank 0 until it answers, announces `rank` and waits to be welcomed.
async fn join_root(rendezvous: &Rendezvous, rank: usize, deadline: Instant) -> Result<Peer> {
    let world_size = rendezvous.world_size;
    let endpoint = rendezvous.endpoint();

    let stream = loop {
        match time::timeout_at(deadline, TcpStream::connect(&endpoint)).await {
            Ok(Ok(stream)) => break stream,
            Ok(Err(e)) if Instant::now() + CONNECT_RETRY < deadline => {
                debug!(rank = rank; "{endpoint} not reachable yet: {e}");
                time::sleep(CONNECT_RETRY).await;
            }
            _ => {
                let detail = format!("rank {rank} could not reach {endpoint}");
                return Err(timed_out(rendezvous, detail));
            }
        }
    };
    stream.set_nodelay(true)?;

    let mut root = Peer::new(0, stream);
    root.tx
        .send(&Msg::Control(Command::Join { rank, world_size }))
        .await?;

    let cmd = time::timeout_at(deadline, root.recv_command())
        .await
        .map_err(|_| timed_out(rendezvous, format!("rank {rank} was never welcomed")))??;

    match cmd {
        Command::Welcome { world_size: got } if got == world_size => Ok(root),
        Command::Welcome { world_size: got } => Err(CoordinatorErr::WorldSizeMismatch {
            got,
            expected: world_size,
        }),
        _ => Err(CoordinatorErr::Unexpected {
            expected: "welcome",
            got: "control",
        }),
    }
}

fn expect_barrier(cmd: Command) -> Result<()> {
    match cmd {
        Command::Barrier => Ok(()),
        _ => Err(CoordinatorErr::Unexpected {
            expected: "barrier",
            got: "control",
        }),
    }
}

fn check_len(got: usize, expected: usize) -> Result<()> {
    if got != expected {
        return Err(CoordinatorErr::SizeMismatch { got, expected });
    }

    Ok(())
}

fn timed_out(rendezvous: &Rendezvous, detail: String) -> CoordinatorErr {
    CoordinatorErr::Timeout {
        waited: rendezvous.timeout,
        detail,
    }
}
